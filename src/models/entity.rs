// Monitored domains and the immutable snapshot the registry swaps in

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One monitored CDN domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Provider-side domain id (used in API requests).
    pub id: String,
    /// Hostname; used as the `instanceId` label value.
    pub display_name: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Entity list in effect for one refresh interval. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub version: u64,
    pub fetched_at: DateTime<Utc>,
    pub entities: Vec<Entity>,
}

impl EntitySnapshot {
    /// Builds a snapshot, dropping later duplicates of an already seen id.
    pub fn new(version: u64, fetched_at: DateTime<Utc>, entities: Vec<Entity>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let entities = entities
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        Self {
            version,
            fetched_at,
            entities,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Seconds since this snapshot was fetched (0 if the clock went backwards).
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        let age = (now - self.fetched_at).num_milliseconds().max(0);
        age as f64 / 1000.0
    }
}
