//! Dispatcher script hook interface

use serde::{Deserialize, Serialize};

/// Event classes forwarded to dispatcher scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatcherAction {
    /// The system hostname changed
    Hostname,
}

/// Invoker of externally installed dispatcher scripts
pub trait Dispatcher: Send + Sync {
    fn call(&self, action: DispatcherAction);
}
