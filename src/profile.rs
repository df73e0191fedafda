//! Stored connection profile interface
//!
//! Profiles are owned by the settings store. The engine reads their
//! auto-connect bookkeeping and updates it only through these operations.

use crate::types::BlockedReason;
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// A stored connection profile
pub trait Profile: Send + Sync {
    fn uuid(&self) -> Uuid;

    /// Human-readable profile name
    fn id(&self) -> &str;

    fn is_vpn(&self) -> bool;

    /// Auto-connect priority; higher wins
    fn autoconnect_priority(&self) -> i32;

    /// Timestamp of the last successful connection
    fn timestamp(&self) -> u64;

    fn is_visible(&self) -> bool;

    /// True when the profile may be picked for auto-activation: visible,
    /// not blocked, and with retries remaining
    fn can_autoconnect(&self) -> bool;

    fn autoconnect_retries(&self) -> u32;

    fn set_autoconnect_retries(&self, retries: u32);

    /// Restores the retry counter to the store's default
    fn reset_autoconnect_retries(&self);

    /// Monotonic second at which the retry counter may be restored;
    /// zero when no timed reset is pending
    fn autoconnect_retry_time(&self) -> i64;

    fn blocked_reason(&self) -> BlockedReason;

    fn set_blocked_reason(&self, reason: BlockedReason);

    /// Master reference of a slave profile: an interface name or a profile
    /// uuid, as stored
    fn master(&self) -> Option<String>;

    /// Slave type, set only on slave profiles
    fn slave_type(&self) -> Option<String>;

    fn is_slave(&self) -> bool {
        self.slave_type().is_some()
    }

    /// Declared secondary profiles, in activation order
    fn secondaries(&self) -> Vec<Uuid>;

    /// Drops cached secrets so the next activation requests fresh ones
    fn clear_secrets(&self);
}

/// Sort key for auto-activation candidates: priority first, most recently
/// used second. Callers must use a stable sort so equal-priority profiles
/// keep their recency order.
pub fn cmp_by_autoconnect_priority(a: &Arc<dyn Profile>, b: &Arc<dyn Profile>) -> Ordering {
    b.autoconnect_priority()
        .cmp(&a.autoconnect_priority())
        .then_with(|| b.timestamp().cmp(&a.timestamp()))
}
