//! Remote source access.
//!
//! - [`source`] - The `RemoteSource` trait the sync engine pulls from
//! - [`paginate`] - Offset pagination over any collection
//! - [`jira`] - Jira Cloud REST implementation

pub mod jira;
pub mod paginate;
pub mod source;

pub use jira::JiraClient;
pub use paginate::{fetch_all, fetch_collection};
pub use source::{Page, RemoteSource, Resource};
