//! HTTP-only response types.

use serde::Serialize;
use utoipa::ToSchema;

/// Liveness and store sizes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Entries currently held by the result cache.
    pub cache_entries: usize,
    /// Identities with a live rate-limit record.
    pub tracked_clients: usize,
}
