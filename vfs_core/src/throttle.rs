//! Bandwidth limiting for content delivery.

use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::future::Future;
use std::io;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;

type ByteRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct Limit {
    limiter: ByteRateLimiter,
    clock: DefaultClock,
    /// Bucket capacity, also the largest single read.
    burst: usize,
}

/// Reader paced to at most `bytes_per_second`, with at most one second worth
/// of bytes delivered as a burst. A limit of 0 passes reads straight through.
///
/// Waiting happens on a tokio timer owned by the reader, so dropping the
/// reader mid-wait cancels it.
pub struct ThrottledReader<R> {
    inner: R,
    limit: Option<Limit>,
    granted: usize,
    delay: Option<Pin<Box<Sleep>>>,
}

impl<R> ThrottledReader<R> {
    pub fn new(inner: R, bytes_per_second: u64) -> Self {
        let rate = u32::try_from(bytes_per_second).unwrap_or(u32::MAX);

        let limit = NonZeroU32::new(rate).map(|rate| Limit {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            clock: DefaultClock::default(),
            burst: rate.get() as usize,
        });

        Self {
            inner,
            limit,
            granted: 0,
            delay: None,
        }
    }

    pub fn is_limited(&self) -> bool {
        self.limit.is_some()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ThrottledReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        let limit = match &this.limit {
            Some(limit) => limit,
            None => return Pin::new(&mut this.inner).poll_read(cx, buf),
        };

        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        // Bytes are paid for before they are read. Whatever the inner reader
        // does not fill stays granted for the next call.
        while this.granted == 0 {
            if let Some(delay) = this.delay.as_mut() {
                ready!(delay.as_mut().poll(cx));
                this.delay = None;
            }

            let wanted = buf.remaining().min(limit.burst);
            let cells = NonZeroU32::new(wanted as u32).unwrap_or(NonZeroU32::MIN);

            match limit.limiter.check_n(cells) {
                Ok(Ok(())) => this.granted = wanted,
                Ok(Err(not_until)) => {
                    let wait = not_until.wait_time_from(limit.clock.now());
                    this.delay = Some(Box::pin(tokio::time::sleep(wait)));
                }
                Err(e) => return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, e.to_string()))),
            }
        }

        let allowed = this.granted.min(buf.remaining());
        let mut chunk = ReadBuf::new(buf.initialize_unfilled_to(allowed));
        ready!(Pin::new(&mut this.inner).poll_read(cx, &mut chunk))?;

        let read = chunk.filled().len();
        buf.advance(read);

        if read == 0 {
            this.granted = 0;
        } else {
            this.granted -= read;
        }

        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_zero_limit_passes_through() {
        let data = vec![7u8; 1024 * 1024];
        let mut reader = ThrottledReader::new(&data[..], 0);
        assert!(!reader.is_limited());

        let start = Instant::now();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, data);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_limit_paces_reads() {
        let data = vec![1u8; 3000];
        let mut reader = ThrottledReader::new(&data[..], 1000);
        assert!(reader.is_limited());

        let start = Instant::now();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(out.len(), 3000);
        // First second is the burst, the remaining 2000 bytes need ~2s.
        assert!(elapsed >= Duration::from_millis(1500), "finished too fast: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(10));
    }

    /// Hands out at most `chunk` bytes per read, like a chunked network body.
    struct Chunked {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl AsyncRead for Chunked {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let end = (self.pos + self.chunk.min(buf.remaining())).min(self.data.len());
            buf.put_slice(&self.data[self.pos..end]);
            self.pos = end;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_short_reads_keep_their_grant() {
        let inner = Chunked {
            data: vec![4u8; 1500],
            pos: 0,
            chunk: 100,
        };
        let mut reader = ThrottledReader::new(inner, 1000);

        let start = Instant::now();
        let mut out = Vec::new();
        let mut buf = [0u8; 1000];
        loop {
            let read = reader.read(&mut buf).await.unwrap();
            if read == 0 {
                break;
            }
            out.extend_from_slice(&buf[..read]);
        }
        let elapsed = start.elapsed();

        assert_eq!(out.len(), 1500);
        // One second of burst, then 500 bytes at 1000 B/s.
        assert!(elapsed >= Duration::from_millis(300), "finished too fast: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(3), "finished too slow: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_single_read_never_exceeds_burst() {
        let data = vec![0u8; 500];
        let mut reader = ThrottledReader::new(&data[..], 100);

        let mut buf = [0u8; 400];
        let read = reader.read(&mut buf).await.unwrap();
        assert_eq!(read, 100);
    }

    #[tokio::test]
    async fn test_abandoned_read_is_cancelled() {
        let data = vec![0u8; 1000];
        let mut reader = ThrottledReader::new(&data[..], 10);
        let mut out = Vec::new();

        let result = tokio::time::timeout(Duration::from_millis(200), reader.read_to_end(&mut out)).await;
        assert!(result.is_err());
        assert!(out.len() <= 10);
    }
}
