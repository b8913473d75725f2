use honeycomb_common::{ServiceProfile, SyncStatus};
use serde::{Deserialize, Serialize};

/// Snapshot of the RouteTable's freshness, returned (and cached) by `ready()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncInfo {
    pub ready_at: i64,
    pub services: Vec<String>,
    pub status: SyncStatus,
}

impl SyncInfo {
    pub fn stale() -> Self {
        Self { ready_at: honeycomb_common::now_ms(), services: Vec::new(), status: SyncStatus::Stale }
    }

    pub fn fresh(profiles: &[ServiceProfile]) -> Self {
        Self {
            ready_at: honeycomb_common::now_ms(),
            services: profiles.iter().map(|p| p.name.clone()).collect(),
            status: SyncStatus::Fresh,
        }
    }
}
