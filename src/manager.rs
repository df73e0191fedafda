//! Manager interface
//!
//! The manager owns devices and active sessions and performs the actual
//! activation work; the engine only submits decisions to it. The manager
//! must outlive the engine.

use crate::device::Device;
use crate::error::PolicyResult;
use crate::profile::Profile;
use crate::session::ActiveSession;
use crate::types::{ActivationType, DeviceStateReason, Subject};
use std::sync::Arc;

/// Host-level network manager, as seen by the policy engine
pub trait Manager: Send + Sync {
    /// Whether the host is suspending or suspended
    fn is_sleeping(&self) -> bool;

    fn networking_enabled(&self) -> bool;

    /// Administratively configured hostname, if any
    fn hostname(&self) -> Option<String>;

    fn devices(&self) -> Vec<Arc<dyn Device>>;

    fn active_sessions(&self) -> Vec<Arc<dyn ActiveSession>>;

    /// The device currently bound to `profile`, if any
    fn profile_device(&self, profile: &dyn Profile) -> Option<Arc<dyn Device>>;

    /// Profiles eligible for activation right now (visible to some device)
    fn activatable_profiles(&self) -> Vec<Arc<dyn Profile>>;

    /// Starts activating `profile`. With `device` unset the manager picks
    /// one (VPNs re-activating inherit their previous base). Returns the
    /// new session.
    fn activate(
        &self,
        profile: Arc<dyn Profile>,
        specific_object: Option<&str>,
        device: Option<Arc<dyn Device>>,
        subject: Subject,
        activation_type: ActivationType,
    ) -> PolicyResult<Arc<dyn ActiveSession>>;

    /// Tears down the session at `session_path`
    fn deactivate(&self, session_path: &str, reason: DeviceStateReason) -> PolicyResult<()>;
}
