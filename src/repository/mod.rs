//! Read-only sources of applications and directory records.
//!
//! The engine never owns application data: callers materialize a collection through an
//! [`ApplicationRepository`] and pass it in per query.

mod dataset;

pub use dataset::{Dataset, DatasetError};

use crate::engine::directory::Directory;
use crate::engine::domain::{Application, ApplicationId};

/// Storage abstraction so services and reports can run against any application source.
pub trait ApplicationRepository: Send + Sync {
    fn list(&self) -> Result<Vec<Application>, RepositoryError>;
    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn directory(&self) -> Result<Directory, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("application {0} not found")]
    NotFound(u64),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
