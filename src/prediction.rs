//! prediction.rs — the scored, classified output record.
//!
//! A `PredictionResult` is built once by the orchestrator and never mutated.
//! It is the only schema that leaves the process (HTTP response and store
//! documents share it).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::ClinicalRecord;
use crate::scoring::Score;

/// Risk bucket derived from the clamped score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Diagnosis {
    HighRisk,
    ModerateRisk,
    LowRisk,
}

impl Diagnosis {
    /// Text shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            Diagnosis::HighRisk => "High Risk of Cirrhosis",
            Diagnosis::ModerateRisk => "Moderate Risk, Further Evaluation Recommended",
            Diagnosis::LowRisk => "Low Risk of Cirrhosis",
        }
    }

    /// Stable short name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Diagnosis::HighRisk => "high",
            Diagnosis::ModerateRisk => "moderate",
            Diagnosis::LowRisk => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    diagnosis: Diagnosis,
    /// Percent, in [0, 100].
    risk_score: f64,
    /// Percent, in [40, 100).
    confidence: f64,
    record: ClinicalRecord,
    timestamp: DateTime<Utc>,
    owner_id: Option<String>,
}

impl PredictionResult {
    pub fn new(
        score: &Score,
        record: ClinicalRecord,
        timestamp: DateTime<Utc>,
        owner_id: Option<String>,
    ) -> Self {
        Self {
            diagnosis: score.diagnosis,
            risk_score: score.risk_score,
            confidence: score.confidence,
            record,
            timestamp,
            owner_id,
        }
    }

    /// Copy of this result attributed to `owner`. The original is untouched.
    pub fn owned_by(&self, owner: &str) -> Self {
        Self {
            owner_id: Some(owner.to_string()),
            ..self.clone()
        }
    }

    pub fn diagnosis(&self) -> Diagnosis {
        self.diagnosis
    }
    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }
    pub fn confidence(&self) -> f64 {
        self.confidence
    }
    pub fn record(&self) -> &ClinicalRecord {
        &self.record
    }
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }
}
