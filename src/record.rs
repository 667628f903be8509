//! record.rs — clinical input as submitted and the validated record the engine scores.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

/// Raw form submission. Numeric fields may be missing; gender defaults to male
/// like the form's initial selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalInput {
    pub age: Option<i64>,
    #[serde(default)]
    pub gender: Gender,
    pub albumin: Option<f64>,
    pub alkaline_phosphatase: Option<f64>,
    pub alt: Option<f64>,
    pub ast: Option<f64>,
    pub bilirubin: Option<f64>,
}

/// Validated case, immutable once built. Fields are private so the only way in
/// is through `ClinicalInput::validate` or `ClinicalRecord::try_new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalRecord {
    age: u32,
    gender: Gender,
    /// g/dL
    albumin: f64,
    /// U/L
    alkaline_phosphatase: f64,
    /// U/L
    alt: f64,
    /// U/L
    ast: f64,
    /// mg/dL
    bilirubin: f64,
}

impl ClinicalInput {
    /// Check that every required field is present and sane.
    /// Missing fields are reported together, in form order.
    pub fn validate(&self) -> Result<ClinicalRecord, ValidationError> {
        let mut missing = Vec::new();
        if self.age.is_none() {
            missing.push("age");
        }
        let fields: [(&'static str, Option<f64>); 5] = [
            ("albumin", self.albumin),
            ("alkalinePhosphatase", self.alkaline_phosphatase),
            ("alt", self.alt),
            ("ast", self.ast),
            ("bilirubin", self.bilirubin),
        ];
        for (name, value) in fields.iter() {
            if value.is_none() {
                missing.push(*name);
            }
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let [albumin, alkaline_phosphatase, alt, ast, bilirubin] =
            fields.map(|(_, v)| v.unwrap_or_default());
        ClinicalRecord::try_new(
            self.age.unwrap_or_default(),
            self.gender,
            albumin,
            alkaline_phosphatase,
            alt,
            ast,
            bilirubin,
        )
    }
}

impl ClinicalRecord {
    pub fn try_new(
        age: i64,
        gender: Gender,
        albumin: f64,
        alkaline_phosphatase: f64,
        alt: f64,
        ast: f64,
        bilirubin: f64,
    ) -> Result<Self, ValidationError> {
        let age = u32::try_from(age)
            .ok()
            .filter(|a| *a > 0)
            .ok_or(ValidationError::InvalidAge(age))?;

        for (name, v) in [
            ("albumin", albumin),
            ("alkalinePhosphatase", alkaline_phosphatase),
            ("alt", alt),
            ("ast", ast),
            ("bilirubin", bilirubin),
        ] {
            if !v.is_finite() {
                return Err(ValidationError::NotFinite(name));
            }
        }

        Ok(Self {
            age,
            gender,
            albumin,
            alkaline_phosphatase,
            alt,
            ast,
            bilirubin,
        })
    }

    pub fn age(&self) -> u32 {
        self.age
    }
    pub fn gender(&self) -> Gender {
        self.gender
    }
    pub fn albumin(&self) -> f64 {
        self.albumin
    }
    pub fn alkaline_phosphatase(&self) -> f64 {
        self.alkaline_phosphatase
    }
    pub fn alt(&self) -> f64 {
        self.alt
    }
    pub fn ast(&self) -> f64 {
        self.ast
    }
    pub fn bilirubin(&self) -> f64 {
        self.bilirubin
    }
}
