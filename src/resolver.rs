//! Reverse-DNS resolver interface

use crate::error::PolicyResult;
use async_trait::async_trait;
use std::net::IpAddr;

/// Asynchronous reverse name resolution
#[async_trait]
pub trait HostnameResolver: Send + Sync {
    /// Resolves `addr` to a hostname
    async fn lookup_by_address(&self, addr: IpAddr) -> PolicyResult<String>;
}
