//! Live session quality scoring.
//!
//! Sensor readings arrive from the external metrics feed already scored in
//! [0, 100]. This module folds them into the live metrics, derives the
//! confidence and session quality values, and produces posture/eye/head
//! guidance for the user.

use crate::config::GuidanceConfig;
use crate::{LiveMetrics, MetricsReading};

/// Lowest breathing accuracy reported; readings below are treated as noise
pub const ACCURACY_FLOOR: f64 = 70.0;

/// Session quality seeded when a session begins
pub const INITIAL_SESSION_QUALITY: u32 = 85;

const POSTURE_WEIGHT: f64 = 0.25;
const EYE_CLOSURE_WEIGHT: f64 = 0.20;
const BREATH_RHYTHM_WEIGHT: f64 = 0.30;
const HEAD_STABILITY_WEIGHT: f64 = 0.15;
const CONSISTENCY_WEIGHT: f64 = 0.10;

/// Score how closely the time spent in a phase matches its target
///
/// `100 - 100 * |elapsed - target| / target`, floored at [`ACCURACY_FLOOR`].
pub fn breathing_accuracy(elapsed_seconds: f64, target_seconds: f64) -> f64 {
    if target_seconds <= 0.0 {
        return ACCURACY_FLOOR;
    }
    let timing_error = (elapsed_seconds - target_seconds).abs() / target_seconds;
    let score = (100.0 - timing_error * 100.0).max(0.0);
    score.max(ACCURACY_FLOOR)
}

/// Weighted session quality for the current metrics
///
/// Consistency loses two points per breath taken, a mild fatigue penalty.
pub fn session_quality(metrics: &LiveMetrics, breath_count: u32) -> u32 {
    let consistency = (100.0 - 2.0 * f64::from(breath_count)).max(0.0);

    let quality = metrics.posture * POSTURE_WEIGHT
        + metrics.eye_closure * EYE_CLOSURE_WEIGHT
        + metrics.breath_rhythm * BREATH_RHYTHM_WEIGHT
        + metrics.head_stability * HEAD_STABILITY_WEIGHT
        + consistency * CONSISTENCY_WEIGHT;

    quality.round().clamp(0.0, 100.0) as u32
}

/// Mean of the four sensor values, rounded
pub fn confidence(metrics: &LiveMetrics) -> u32 {
    let sum = metrics.posture + metrics.eye_closure + metrics.head_stability + metrics.breath_rhythm;
    let mean = sum / 4.0;
    mean.round().clamp(0.0, 100.0) as u32
}

/// Fold a feed reading into the live metrics and refresh the confidence
pub fn apply_reading(metrics: &mut LiveMetrics, reading: &MetricsReading) {
    metrics.posture = reading.posture.clamp(0.0, 100.0);
    metrics.eye_closure = reading.eye_closure.clamp(0.0, 100.0);
    metrics.head_stability = reading.head_stability.clamp(0.0, 100.0);
    metrics.breath_rhythm = reading.breath_rhythm.clamp(0.0, 100.0);
    metrics.confidence = confidence(metrics);
}

/// Coaching hints for metrics below the configured thresholds
pub fn guidance(metrics: &LiveMetrics, thresholds: &GuidanceConfig) -> Vec<&'static str> {
    let mut hints = Vec::new();

    if metrics.posture < thresholds.posture_threshold {
        hints.push("Gently straighten your spine and relax your shoulders");
    }
    if metrics.eye_closure < thresholds.eye_threshold {
        hints.push("Softly close your eyes for better focus");
    }
    if metrics.head_stability < thresholds.head_threshold {
        hints.push("Keep your head steady and centered");
    }

    hints
}
