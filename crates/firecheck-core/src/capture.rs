//! Capture files: a discovered snapshot saved for offline re-verification.

use crate::collector::{Admission, DiscoveredSet, EventCollector};
use firecheck_protocol::codec::WeaponFireDecoder;
use firecheck_protocol::WeaponFireEvent;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    /// Where the events were observed (e.g. "loopback").
    pub source: String,
    /// Seconds since the Unix epoch.
    pub captured_at: u64,
    pub event_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureLog {
    pub metadata: CaptureMetadata,
    pub events: Vec<WeaponFireEvent>,
}

impl CaptureLog {
    pub fn from_snapshot(source: impl Into<String>, snapshot: &DiscoveredSet) -> Self {
        let events: Vec<WeaponFireEvent> = snapshot.iter().cloned().collect();
        Self {
            metadata: CaptureMetadata {
                source: source.into(),
                captured_at: unix_seconds(),
                event_count: events.len(),
            },
            events,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path)?;
        let log: Self = serde_json::from_str(&json)?;
        if log.metadata.event_count != log.events.len() {
            warn!(
                "Capture header declares {} events but {} are present",
                log.metadata.event_count,
                log.events.len()
            );
        }
        Ok(log)
    }

    /// Feed every captured record through `collector`'s first-arrival rule.
    ///
    /// Returns how many records were admitted.
    pub fn replay_into<D: WeaponFireDecoder>(&self, collector: &EventCollector<D>) -> usize {
        self.events
            .iter()
            .filter(|&event| collector.insert_decoded(event.clone()) == Admission::Inserted)
            .count()
    }

    /// Rebuild the discovered set, applying the first-arrival rule.
    pub fn into_discovered(self) -> DiscoveredSet {
        DiscoveredSet::from_events(self.events)
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
