//! Settings store interface

use crate::error::PolicyResult;
use crate::profile::Profile;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Store of connection profiles and host settings
#[async_trait]
pub trait Settings: Send + Sync {
    fn profile_by_uuid(&self, uuid: Uuid) -> Option<Arc<dyn Profile>>;

    /// All profiles in the store's canonical order
    fn profiles_sorted(&self) -> Vec<Arc<dyn Profile>>;

    /// Commits a transient hostname through the store's hostname service.
    /// An error means the service is unavailable and the caller should fall
    /// back to setting the kernel hostname directly.
    async fn set_transient_hostname(&self, name: &str) -> PolicyResult<()>;
}
