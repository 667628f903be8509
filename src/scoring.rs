//! Risk scoring engine.
//!
//! Fixed weighted rules over a `ClinicalRecord`, plus a small jitter term:
//!
//! ```text
//! s = clamp(sum(triggered weights) + jitter, 0, 1)      jitter ∈ [-0.05, 0.05)
//! s >  0.7          -> HighRisk,     confidence ∈ [70, 100)
//! 0.4 < s <= 0.7    -> ModerateRisk, confidence ∈ [40, 70)
//! s <= 0.4          -> LowRisk,      confidence ∈ [70, 100)
//! ```
//!
//! Weights are kept as integer percentage points so sums like 0.70 are exact
//! and the strict `>` tie-break never depends on float rounding.
//! All randomness comes from a `RandomSource`; there is no hidden global RNG.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::prediction::Diagnosis;
use crate::record::{ClinicalRecord, Gender};

/// Uniform draws in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

/// Production source backed by `StdRng`.
pub struct StdRandom(StdRng);

impl StdRandom {
    pub fn from_os_rng() -> Self {
        Self(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for StdRandom {
    fn next_unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

/// Always returns the same value. `FixedRandom(0.5)` yields zero jitter.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

/// Replays a sequence of draws, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<f64>,
    pos: usize,
}

impl SequenceRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, pos: 0 }
    }
}

impl RandomSource for SequenceRandom {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.5;
        }
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v
    }
}

/// One weighted rule of the heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    AgeOver50,
    Female,
    LowAlbumin,
    HighAlkalinePhosphatase,
    ElevatedTransaminases,
    HighBilirubin,
}

impl RiskFactor {
    pub const ALL: [RiskFactor; 6] = [
        RiskFactor::AgeOver50,
        RiskFactor::Female,
        RiskFactor::LowAlbumin,
        RiskFactor::HighAlkalinePhosphatase,
        RiskFactor::ElevatedTransaminases,
        RiskFactor::HighBilirubin,
    ];

    /// Weight in percentage points (0.10 == 10).
    pub fn points(&self) -> u32 {
        match self {
            RiskFactor::AgeOver50 => 10,
            RiskFactor::Female => 5,
            RiskFactor::LowAlbumin => 20,
            RiskFactor::HighAlkalinePhosphatase => 15,
            RiskFactor::ElevatedTransaminases => 25,
            RiskFactor::HighBilirubin => 30,
        }
    }

    pub fn weight(&self) -> f64 {
        f64::from(self.points()) / 100.0
    }

    pub fn applies(&self, r: &ClinicalRecord) -> bool {
        match self {
            RiskFactor::AgeOver50 => r.age() > 50,
            RiskFactor::Female => r.gender() == Gender::Female,
            RiskFactor::LowAlbumin => r.albumin() < 3.5,
            RiskFactor::HighAlkalinePhosphatase => r.alkaline_phosphatase() > 150.0,
            RiskFactor::ElevatedTransaminases => r.alt() > 40.0 || r.ast() > 40.0,
            RiskFactor::HighBilirubin => r.bilirubin() > 1.2,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RiskFactor::AgeOver50 => "age > 50",
            RiskFactor::Female => "female",
            RiskFactor::LowAlbumin => "albumin < 3.5 g/dL",
            RiskFactor::HighAlkalinePhosphatase => "alkaline phosphatase > 150 U/L",
            RiskFactor::ElevatedTransaminases => "ALT or AST > 40 U/L",
            RiskFactor::HighBilirubin => "bilirubin > 1.2 mg/dL",
        }
    }
}

/// Half-width of the jitter interval, in percentage points.
const JITTER_POINTS: f64 = 5.0;
const HIGH_THRESHOLD: f64 = 0.7;
const MODERATE_THRESHOLD: f64 = 0.4;

/// Engine output before identity and timestamp are attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub diagnosis: Diagnosis,
    pub risk_score: f64,
    pub confidence: f64,
    /// Triggered rules, in table order.
    pub factors: Vec<RiskFactor>,
}

/// Sum of triggered weights in percentage points, without jitter or clamping.
pub fn triggered_points(record: &ClinicalRecord) -> (u32, Vec<RiskFactor>) {
    let factors: Vec<RiskFactor> = RiskFactor::ALL
        .iter()
        .copied()
        .filter(|f| f.applies(record))
        .collect();
    let points = factors.iter().map(RiskFactor::points).sum();
    (points, factors)
}

/// Classify a clamped unit score. Boundaries fall into the lower bucket.
pub fn classify(s: f64) -> Diagnosis {
    if s > HIGH_THRESHOLD {
        Diagnosis::HighRisk
    } else if s > MODERATE_THRESHOLD {
        Diagnosis::ModerateRisk
    } else {
        Diagnosis::LowRisk
    }
}

/// Half-open confidence interval `[lo, hi)` for a bucket, in percent.
pub fn confidence_range(diagnosis: Diagnosis) -> (f64, f64) {
    match diagnosis {
        Diagnosis::HighRisk | Diagnosis::LowRisk => (70.0, 100.0),
        Diagnosis::ModerateRisk => (40.0, 70.0),
    }
}

/// `lo + u * (hi - lo)`, kept strictly below `hi` (draws near 1 can round up to it).
fn draw_in(lo: f64, hi: f64, u: f64) -> f64 {
    let v = lo + u * (hi - lo);
    if v >= hi {
        below(hi)
    } else {
        v
    }
}

/// Largest f64 smaller than a positive finite `x`.
fn below(x: f64) -> f64 {
    f64::from_bits(x.to_bits() - 1)
}

pub struct RiskEngine {
    rng: Box<dyn RandomSource>,
}

impl RiskEngine {
    pub fn new(rng: Box<dyn RandomSource>) -> Self {
        Self { rng }
    }

    /// Engine backed by OS-seeded randomness.
    pub fn from_os_rng() -> Self {
        Self::new(Box::new(StdRandom::from_os_rng()))
    }

    /// Score one record. Draws twice from the random source: jitter, then confidence.
    pub fn score(&mut self, record: &ClinicalRecord) -> Score {
        let (points, factors) = triggered_points(record);

        let jitter = (self.unit() - 0.5) * 2.0 * JITTER_POINTS;
        let risk_score = (f64::from(points) + jitter).clamp(0.0, 100.0);
        let diagnosis = classify(risk_score / 100.0);

        let (lo, hi) = confidence_range(diagnosis);
        let confidence = draw_in(lo, hi, self.unit());

        tracing::debug!(
            target: "scoring",
            points,
            jitter,
            risk_score,
            diagnosis = diagnosis.as_str(),
            confidence,
            "record scored"
        );

        Score {
            diagnosis,
            risk_score,
            confidence,
            factors,
        }
    }

    /// Next draw, forced into `[0, 1)` so a misbehaving source cannot break the bounds.
    fn unit(&mut self) -> f64 {
        let u = self.rng.next_unit();
        if u.is_nan() {
            return 0.0;
        }
        u.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(age: i64, g: Gender, alb: f64, alp: f64, alt: f64, ast: f64, bili: f64) -> ClinicalRecord {
        ClinicalRecord::try_new(age, g, alb, alp, alt, ast, bili).unwrap()
    }

    fn baseline() -> ClinicalRecord {
        rec(30, Gender::Male, 4.0, 100.0, 20.0, 20.0, 0.8)
    }

    #[test]
    fn zero_jitter_score_is_exact_sum_of_weights() {
        // age + female + albumin = 0.35
        let r = rec(55, Gender::Female, 3.0, 100.0, 20.0, 20.0, 0.8);
        let mut engine = RiskEngine::new(Box::new(FixedRandom(0.5)));
        let s = engine.score(&r);
        assert_eq!(s.risk_score, 35.0);
        assert_eq!(s.diagnosis, Diagnosis::LowRisk);
        assert_eq!(
            s.factors,
            vec![RiskFactor::AgeOver50, RiskFactor::Female, RiskFactor::LowAlbumin]
        );
    }

    #[test]
    fn exactly_seventy_is_moderate_not_high() {
        // 0.10 + 0.05 + 0.25 + 0.30
        let r = rec(60, Gender::Female, 4.0, 100.0, 41.0, 20.0, 1.3);
        let mut engine = RiskEngine::new(Box::new(FixedRandom(0.5)));
        let s = engine.score(&r);
        assert_eq!(s.risk_score, 70.0);
        assert_eq!(s.diagnosis, Diagnosis::ModerateRisk);
        assert!((40.0..70.0).contains(&s.confidence));
    }

    #[test]
    fn exactly_forty_is_low_not_moderate() {
        // 0.10 + 0.30
        let r = rec(51, Gender::Male, 4.0, 100.0, 20.0, 20.0, 2.0);
        let mut engine = RiskEngine::new(Box::new(FixedRandom(0.5)));
        let s = engine.score(&r);
        assert_eq!(s.risk_score, 40.0);
        assert_eq!(s.diagnosis, Diagnosis::LowRisk);
        assert!((70.0..100.0).contains(&s.confidence));
    }

    #[test]
    fn thresholds_are_strict() {
        assert_eq!(classify(0.7), Diagnosis::ModerateRisk);
        assert_eq!(classify(0.700001), Diagnosis::HighRisk);
        assert_eq!(classify(0.4), Diagnosis::LowRisk);
        assert_eq!(classify(0.400001), Diagnosis::ModerateRisk);
        assert_eq!(classify(0.0), Diagnosis::LowRisk);
    }

    #[test]
    fn all_factors_clamp_to_hundred() {
        let r = rec(60, Gender::Female, 3.0, 200.0, 50.0, 30.0, 1.5);
        let (points, factors) = triggered_points(&r);
        assert_eq!(points, 105);
        assert_eq!(factors.len(), 6);

        // max positive jitter still clamps
        let mut engine = RiskEngine::new(Box::new(FixedRandom(0.999)));
        let s = engine.score(&r);
        assert_eq!(s.risk_score, 100.0);
        assert_eq!(s.diagnosis, Diagnosis::HighRisk);
    }

    #[test]
    fn negative_jitter_clamps_to_zero() {
        let mut engine = RiskEngine::new(Box::new(FixedRandom(0.0)));
        let s = engine.score(&baseline());
        assert_eq!(s.risk_score, 0.0);
        assert_eq!(s.diagnosis, Diagnosis::LowRisk);
        assert_eq!(s.confidence, 70.0);
    }

    #[test]
    fn jitter_can_push_seventy_into_high() {
        let r = rec(60, Gender::Female, 4.0, 100.0, 41.0, 20.0, 1.3);
        // first draw -> jitter +4, second -> confidence
        let mut engine = RiskEngine::new(Box::new(SequenceRandom::new(vec![0.9, 0.0])));
        let s = engine.score(&r);
        assert!((s.risk_score - 74.0).abs() < 1e-9);
        assert_eq!(s.diagnosis, Diagnosis::HighRisk);
        assert_eq!(s.confidence, 70.0);
    }

    #[test]
    fn out_of_range_draws_keep_confidence_below_hundred() {
        let r = rec(60, Gender::Female, 3.0, 200.0, 50.0, 30.0, 1.5);
        let mut engine = RiskEngine::new(Box::new(FixedRandom(1.5)));
        let s = engine.score(&r);
        assert!(s.confidence < 100.0);

        let mut engine = RiskEngine::new(Box::new(FixedRandom(f64::NAN)));
        let s = engine.score(&r);
        assert!((70.0..100.0).contains(&s.confidence));
    }

    #[test]
    fn draws_just_below_one_stay_inside_each_bucket() {
        let near_one = 1.0 - f64::EPSILON / 2.0;

        // all factors, zero jitter, then a near-1 confidence draw
        let high = rec(60, Gender::Female, 3.0, 200.0, 50.0, 30.0, 1.5);
        let mut engine = RiskEngine::new(Box::new(SequenceRandom::new(vec![0.5, near_one])));
        let s = engine.score(&high);
        assert_eq!(s.diagnosis, Diagnosis::HighRisk);
        assert!(s.confidence < 100.0, "got {}", s.confidence);
        assert!(s.confidence >= 70.0);

        // no factors
        let mut engine = RiskEngine::new(Box::new(SequenceRandom::new(vec![0.5, near_one])));
        let s = engine.score(&baseline());
        assert_eq!(s.diagnosis, Diagnosis::LowRisk);
        assert!(s.confidence < 100.0, "got {}", s.confidence);

        // 0.20 + 0.15 + 0.25: moderate bucket
        let moderate = rec(30, Gender::Male, 3.0, 200.0, 50.0, 20.0, 0.8);
        let mut engine = RiskEngine::new(Box::new(SequenceRandom::new(vec![0.5, near_one])));
        let s = engine.score(&moderate);
        assert_eq!(s.diagnosis, Diagnosis::ModerateRisk);
        assert!(s.confidence < 70.0, "got {}", s.confidence);
        assert!(s.confidence >= 40.0);
    }

    #[test]
    fn capped_draw_is_largest_value_below_upper_bound() {
        assert_eq!(draw_in(70.0, 100.0, 1.0), below(100.0));
        assert!(below(100.0) < 100.0);
        assert_eq!(draw_in(40.0, 70.0, 0.5), 55.0);
    }

    #[test]
    fn bounds_hold_for_random_draws() {
        let records = [
            baseline(),
            rec(60, Gender::Female, 3.0, 200.0, 50.0, 30.0, 1.5),
            rec(52, Gender::Male, 3.4, 160.0, 20.0, 20.0, 0.5),
            rec(40, Gender::Female, 3.6, 151.0, 20.0, 45.0, 1.0),
        ];
        let mut engine = RiskEngine::new(Box::new(StdRandom::seeded(7)));
        for _ in 0..500 {
            for r in records.iter() {
                let s = engine.score(r);
                assert!((0.0..=100.0).contains(&s.risk_score), "{:?}", s);
                assert!((40.0..100.0).contains(&s.confidence), "{:?}", s);
                assert_eq!(s.diagnosis, classify(s.risk_score / 100.0));
            }
        }
    }
}
