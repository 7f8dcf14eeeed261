//! Reading storage used by the route layer.
//!
//! Persistence proper lives outside this crate; [`ReadingStore`] is the seam
//! and [`MemoryStore`] keeps everything in process memory.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// A stored sensor measurement. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub id: u64,
    pub value: f64,
    pub mode: Option<u8>,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    #[serde(skip_serializing)]
    pub source_ip: String,
}

/// A measurement about to be stored
#[derive(Debug, Clone)]
pub struct NewReading {
    pub value: f64,
    pub mode: Option<u8>,
    pub source_ip: String,
    pub recorded_at: SystemTime,
}

/// One page of readings, newest first
#[derive(Debug, Clone, Serialize)]
pub struct ReadingPage {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
    pub readings: Vec<Reading>,
}

pub trait ReadingStore: Send + Sync {
    fn insert(&self, reading: NewReading) -> Reading;

    /// `page` is 1-based; pages past the end are empty
    fn page(&self, page: usize, per_page: usize) -> ReadingPage;

    /// Readings recorded at or after `start`, oldest first
    fn since(&self, start: SystemTime) -> Vec<Reading>;

    /// Returns false when no reading has this id
    fn delete(&self, id: u64) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`ReadingStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn unix_seconds(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl ReadingStore for MemoryStore {
    fn insert(&self, reading: NewReading) -> Reading {
        let stored = Reading {
            id: self.next_id.fetch_add(1, Ordering::Relaxed).saturating_add(1),
            value: reading.value,
            mode: reading.mode,
            timestamp: unix_seconds(reading.recorded_at),
            source_ip: reading.source_ip,
        };
        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stored.clone());
        stored
    }

    fn page(&self, page: usize, per_page: usize) -> ReadingPage {
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        let total = readings.len();
        let per_page = per_page.max(1);
        let pages = total.div_ceil(per_page);
        let skip = page.saturating_sub(1).saturating_mul(per_page);

        // Newest first by recorded time, ties broken by id
        let mut ordered: Vec<&Reading> = readings.iter().collect();
        ordered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        ReadingPage {
            page,
            per_page,
            total,
            pages,
            readings: ordered.into_iter().skip(skip).take(per_page).cloned().collect(),
        }
    }

    fn since(&self, start: SystemTime) -> Vec<Reading> {
        let start = unix_seconds(start);
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<Reading> = readings.iter().filter(|r| r.timestamp >= start).cloned().collect();
        found.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        found
    }

    fn delete(&self, id: u64) -> bool {
        let mut readings = self.readings.write().unwrap_or_else(PoisonError::into_inner);
        let before = readings.len();
        readings.retain(|r| r.id != id);
        readings.len() != before
    }

    fn len(&self) -> usize {
        self.readings.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
