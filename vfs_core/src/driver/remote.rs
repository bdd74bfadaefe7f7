use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{Client, RequestBuilder, Response, Url};
use std::io;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tracing::{debug, error};

use crate::error::{AppError, Result};
use crate::models::PolicyType;
use super::{object_segments, ContentStream, StorageDriver};

/// Objects addressed as `{endpoint}/{prefix}/{source}` on an HTTP object
/// server: `GET` reads, `PUT` writes, `DELETE` removes.
#[derive(Debug, Clone)]
pub struct RemoteDriver {
    client: Client,
    endpoint: Url,
    prefix: Vec<String>,
    access_key: Option<String>,
}

impl RemoteDriver {
    pub fn new(
        endpoint: &str,
        prefix: &str,
        access_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AppError::Config(format!("Invalid remote endpoint {:?}: {}", endpoint, e)))?;

        if endpoint.cannot_be_a_base() {
            return Err(AppError::Config(format!("Remote endpoint {} cannot carry object paths", endpoint)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let prefix = prefix
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            client,
            endpoint,
            prefix,
            access_key,
        })
    }

    pub fn object_url(&self, source: &str) -> Result<Url> {
        let segments = object_segments(source)?;
        let mut url = self.endpoint.clone();

        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("Remote endpoint {} cannot carry object paths", self.endpoint)))?
            .pop_if_empty()
            .extend(self.prefix.iter().map(String::as_str))
            .extend(segments);

        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, method: &str, url: &Url, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request)
            .send()
            .await
            .map_err(|e| {
                error!("Remote {} {} failed: {}", method, url, e);
                AppError::IoFailed(format!("{} {} failed: {}", method, url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::IoFailed(format!("{} {} returned {}", method, url, status)));
        }

        Ok(response)
    }
}

#[async_trait]
impl StorageDriver for RemoteDriver {
    fn policy_type(&self) -> PolicyType {
        PolicyType::Remote
    }

    async fn open(&self, source: &str) -> Result<ContentStream> {
        let url = self.object_url(source)?;
        let response = self.send("GET", &url, self.client.get(url.clone())).await?;

        debug!("Streaming remote object {}", url);

        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));

        Ok(Box::pin(StreamReader::new(body)))
    }

    // TODO: stream the request body once uploads outgrow memory; the body
    // stream needs a Sync source, which ContentStream does not promise.
    async fn save(&self, mut stream: ContentStream, destination: &str) -> Result<u64> {
        let url = self.object_url(destination)?;

        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .await
            .map_err(|e| AppError::IoFailed(format!("Failed to read upload for {}: {}", url, e)))?;

        let size = data.len() as u64;
        self.send("PUT", &url, self.client.put(url.clone()).body(data)).await?;

        debug!("Stored {} bytes at {}", size, url);
        Ok(size)
    }

    async fn delete(&self, source: &str) -> Result<()> {
        let url = self.object_url(source)?;
        self.send("DELETE", &url, self.client.delete(url.clone())).await?;

        debug!("Deleted remote object {}", url);
        Ok(())
    }
}
