//! Kernel platform shim interface

use crate::error::PolicyResult;

/// Kernel-level attributes of a network link
#[derive(Debug, Clone, Copy)]
pub struct PlatformLink {
    pub ifindex: i32,
    /// Interface index of the enslaving master, zero when not enslaved
    pub master: i32,
    /// Administrative up flag
    pub up: bool,
}

/// Narrow view of the kernel platform
pub trait Platform: Send + Sync {
    /// Kernel link attributes for `ifindex`, if the link exists
    fn link_get(&self, ifindex: i32) -> Option<PlatformLink>;

    /// Current kernel hostname
    fn hostname(&self) -> PolicyResult<String>;

    /// Sets the kernel hostname directly. Used only as a fallback when the
    /// settings store's hostname service is unavailable.
    fn set_hostname(&self, name: &str) -> PolicyResult<()>;

    /// Monotonic clock reading in seconds
    fn monotonic_seconds(&self) -> i64;
}
