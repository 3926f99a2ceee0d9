//! Process-wide store of the latest committed reading.
//!
//! One writer (the capture loop) and any number of readers (dashboard
//! handlers) share it. All access copies data in or out under a short
//! lock, so a snapshot can never observe half of a commit.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::reading::{CycleOutcome, ItemResult, Reading};

/// Cycle and upload counters, exposed on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub cycles: u64,
    pub successes: u64,
    pub partial_successes: u64,
    pub failures: u64,
    pub upload_failures: u64,
}

/// Why a field is absent from the latest reading. Carried alongside the
/// commit so readers can tell "never captured" from "last attempt failed".
#[derive(Debug, Clone, Default)]
pub struct CycleErrors {
    pub weight: Option<String>,
    pub camera: Option<String>,
    pub analysis: Option<String>,
}

#[derive(Default)]
struct Inner {
    weight: Option<f64>,
    image: Option<Arc<Vec<u8>>>,
    items: Option<Vec<ItemResult>>,
    captured_at: Option<DateTime<Utc>>,
    last_weight_error: Option<String>,
    last_camera_error: Option<String>,
    last_analysis_error: Option<String>,
    stats: CycleStats,
}

/// Point-in-time copy of the store.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub weight: Option<f64>,
    pub image: Option<Arc<Vec<u8>>>,
    pub items: Option<Vec<ItemResult>>,
    pub captured_at: Option<DateTime<Utc>>,
    pub last_weight_error: Option<String>,
    pub last_camera_error: Option<String>,
    pub last_analysis_error: Option<String>,
    pub stats: CycleStats,
}

#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<Inner>>,
}

impl StateStore {
    pub fn new() -> StateStore {
        StateStore::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a writer panicked mid-copy; the data
        // itself is plain values, so keep serving it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes whatever the cycle acquired. Fields the cycle missed keep
    /// their previous value; their error marker records why they are stale.
    pub fn commit(&self, reading: &Reading, errors: &CycleErrors) {
        debug_assert!(
            reading.analysis.is_none() || reading.image.is_some(),
            "analysis cannot land without the image it was derived from",
        );
        let mut inner = self.lock();
        if let Some(weight) = reading.weight {
            inner.weight = Some(weight);
            inner.last_weight_error = None;
        } else {
            inner.last_weight_error = errors.weight.clone();
        }
        if let Some(image) = &reading.image {
            inner.image = Some(Arc::clone(image));
            inner.last_camera_error = None;
        } else {
            inner.last_camera_error = errors.camera.clone();
        }
        if let Some(items) = &reading.analysis {
            inner.items = Some(items.clone());
            inner.last_analysis_error = None;
        } else if let Some(error) = &errors.analysis {
            inner.last_analysis_error = Some(error.clone());
        }
        inner.captured_at = Some(reading.captured_at);
    }

    pub fn record_outcome(&self, outcome: CycleOutcome) {
        let mut inner = self.lock();
        inner.stats.cycles += 1;
        match outcome {
            CycleOutcome::Success => inner.stats.successes += 1,
            CycleOutcome::Partial => inner.stats.partial_successes += 1,
            CycleOutcome::Failure => inner.stats.failures += 1,
        }
    }

    pub fn record_upload_failure(&self) {
        self.lock().stats.upload_failures += 1;
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.lock();
        StateSnapshot {
            weight: inner.weight,
            image: inner.image.clone(),
            items: inner.items.clone(),
            captured_at: inner.captured_at,
            last_weight_error: inner.last_weight_error.clone(),
            last_camera_error: inner.last_camera_error.clone(),
            last_analysis_error: inner.last_analysis_error.clone(),
            stats: inner.stats.clone(),
        }
    }
}
