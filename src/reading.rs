//! The data produced by one capture cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Presence verdict for one tracked ingredient inside its parent item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientResult {
    pub name: String,
    pub present: bool,
}

/// Presence verdict for one expected order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub name: String,
    pub present: bool,
    /// Per-ingredient verdicts, in the order the item declares them.
    /// Empty for items checked on presence alone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<IngredientResult>,
}

/// How a finished cycle is judged by the failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Weight, image, and (when expected) analysis all landed.
    Success,
    /// Weight and image landed but the expected analysis did not.
    Partial,
    /// The weight+image pair is incomplete.
    Failure,
}

/// Everything one cycle managed to acquire. Absent fields mean the
/// corresponding stage failed or was skipped.
#[derive(Debug, Clone)]
pub struct Reading {
    pub weight: Option<f64>,
    /// Encoded JPEG, shared so commit, upload, and analysis never copy it.
    pub image: Option<Arc<Vec<u8>>>,
    pub analysis: Option<Vec<ItemResult>>,
    /// Stamped when the cycle started, before any sampling.
    pub captured_at: DateTime<Utc>,
}

impl Reading {
    /// True when the cycle produced nothing worth committing.
    pub fn is_empty(&self) -> bool {
        self.weight.is_none() && self.image.is_none()
    }

    pub fn outcome(&self, analysis_expected: bool) -> CycleOutcome {
        if self.weight.is_none() || self.image.is_none() {
            CycleOutcome::Failure
        } else if analysis_expected && self.analysis.is_none() {
            CycleOutcome::Partial
        } else {
            CycleOutcome::Success
        }
    }
}
