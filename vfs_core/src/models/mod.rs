pub mod file;
pub mod policy;
pub mod user;

pub use file::{File, Folder, NewFile};
pub use policy::{NewPolicy, Policy, PolicyId, PolicyType};
pub use user::{Group, User};
