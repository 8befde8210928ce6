//! Job Source and Profile Store boundaries. The engine reads one posting and one
//! profile snapshot per attempt through these traits.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::models::{JobPosting, Profile};

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("job posting '{0}' not found")]
    PostingNotFound(String),

    #[error("profile '{0}' not found")]
    ProfileNotFound(String),
}

#[async_trait]
pub trait PostingProvider: Send + Sync {
    async fn posting(&self, job_id: &str) -> Result<JobPosting, CatalogError>;
}

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn profile(&self, profile_id: &str) -> Result<Profile, CatalogError>;
}

/// Snapshots registered over HTTP. Re-registering an id replaces the snapshot for
/// future attempts; attempts already running keep the copy they were given.
#[derive(Default)]
pub struct Catalog {
    postings: RwLock<HashMap<String, JobPosting>>,
    profiles: RwLock<HashMap<String, Profile>>,
}

impl Catalog {
    /// Returns true when an existing posting was replaced.
    pub fn put_posting(&self, posting: JobPosting) -> bool {
        debug!("Registering posting {} ({})", posting.id, posting.headline());
        let mut postings = self.postings.write().unwrap_or_else(PoisonError::into_inner);
        postings.insert(posting.id.clone(), posting).is_some()
    }

    /// Returns true when an existing profile was replaced.
    pub fn put_profile(&self, profile: Profile) -> bool {
        debug!("Registering profile {}", profile.profile_id);
        let mut profiles = self.profiles.write().unwrap_or_else(PoisonError::into_inner);
        profiles.insert(profile.profile_id.clone(), profile).is_some()
    }
}

#[async_trait]
impl PostingProvider for Catalog {
    async fn posting(&self, job_id: &str) -> Result<JobPosting, CatalogError> {
        self.postings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
            .ok_or_else(|| CatalogError::PostingNotFound(job_id.to_string()))
    }
}

#[async_trait]
impl ProfileProvider for Catalog {
    async fn profile(&self, profile_id: &str) -> Result<Profile, CatalogError> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(profile_id)
            .cloned()
            .ok_or_else(|| CatalogError::ProfileNotFound(profile_id.to_string()))
    }
}
