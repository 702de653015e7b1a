//! The metrics engine: scores an algorithm's output against ground truth
//! for one (recording, array) unit.
//!
//! Association between estimated and ground-truth sources is deterministic
//! and greedy: truth sources, in dataset order, each claim the unclaimed
//! estimate with the lowest mean circular azimuth error over their
//! timestamp-matched rows; ties go to the lowest estimate index. Estimate
//! rows match a truth timestamp when they fall within half the median
//! valid-timestamp spacing of it. Estimates left unclaimed at the end are
//! false alarms.
//!
//! The engine is pure and never fails: degenerate inputs (no valid
//! timestamps, no estimates, withheld ground truth) produce NaN statistics
//! or an unscored placeholder, which callers inspect rather than catch.

use crate::algorithm::{AlgorithmOutput, SourceEstimate};
use crate::angles::circular_error;
use crate::truth::{GroundTruth, SourceTruth};

use serde::{Deserialize, Serialize};

/// The six evaluation scenario categories. The category decides which
/// statistics are reported: moving-source categories add tracking
/// continuity, multi-source categories exercise the association policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Task 1: one static source, static array.
    SingleStatic,
    /// Task 2: multiple static sources, static array.
    MultiStatic,
    /// Task 3: one moving source, static array.
    SingleMoving,
    /// Task 4: multiple moving sources, static array.
    MultiMoving,
    /// Task 5: one moving source, moving array.
    SingleMovingArray,
    /// Task 6: multiple moving sources, moving array.
    MultiMovingArray,
}

impl TaskKind {
    /// Maps a benchmark task number (1..=6) to its kind.
    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            1 => Some(TaskKind::SingleStatic),
            2 => Some(TaskKind::MultiStatic),
            3 => Some(TaskKind::SingleMoving),
            4 => Some(TaskKind::MultiMoving),
            5 => Some(TaskKind::SingleMovingArray),
            6 => Some(TaskKind::MultiMovingArray),
            _ => None,
        }
    }

    /// The benchmark task number.
    pub fn number(&self) -> u32 {
        match self {
            TaskKind::SingleStatic => 1,
            TaskKind::MultiStatic => 2,
            TaskKind::SingleMoving => 3,
            TaskKind::MultiMoving => 4,
            TaskKind::SingleMovingArray => 5,
            TaskKind::MultiMovingArray => 6,
        }
    }

    /// Whether this category can carry more than one simultaneous source.
    pub fn is_multi_source(&self) -> bool {
        matches!(
            self,
            TaskKind::MultiStatic | TaskKind::MultiMoving | TaskKind::MultiMovingArray
        )
    }

    /// Whether sources (or the array) move, making tracking continuity a
    /// reported statistic.
    pub fn is_tracking(&self) -> bool {
        !matches!(self, TaskKind::SingleStatic | TaskKind::MultiStatic)
    }
}

/// Error statistics for one ground-truth source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetrics {
    /// The ground-truth source this row scores.
    pub source_id: String,
    /// Id of the estimate this source claimed, if any.
    pub matched_estimate: Option<String>,
    /// Mean circular azimuth error over matched timestamps, radians.
    /// NaN when nothing matched.
    pub azimuth_mean_error: f64,
    /// Population variance of the circular azimuth error, radians squared.
    pub azimuth_error_variance: f64,
    /// Mean circular elevation error over matched timestamps, radians.
    pub elevation_mean_error: f64,
    /// Population variance of the circular elevation error.
    pub elevation_error_variance: f64,
    /// Fraction of valid timestamps with a matched estimate row. Zero when
    /// no estimate was claimed; NaN when there are no valid timestamps.
    pub detection_rate: f64,
    /// Fraction of consecutive valid-timestamp pairs where both ends
    /// matched. Only reported for tracking task kinds.
    pub continuity: Option<f64>,
}

/// The scored result for one (task, recording, array) unit. Immutable once
/// computed; aggregation across recordings happens downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    /// Which scenario category was scored.
    pub task: TaskKind,
    /// False when ground truth was withheld (evaluation datasets); all
    /// other fields are then empty placeholders.
    pub scored: bool,
    /// One entry per ground-truth source, in dataset order.
    pub sources: Vec<SourceMetrics>,
    /// Unclaimed estimates over total estimates. NaN when the algorithm
    /// produced no estimates at all.
    pub false_alarm_rate: f64,
}

impl MetricsResult {
    /// The placeholder for units where ground truth is withheld.
    fn unscored(task: TaskKind) -> Self {
        MetricsResult {
            task,
            scored: false,
            sources: Vec::new(),
            false_alarm_rate: f64::NAN,
        }
    }
}

/// Summary statistics for one task, aggregated over every scored unit the
/// run produced. NaN entries (unmatched sources, empty units) are left out
/// of the means instead of poisoning them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// The task being summarized.
    pub task: TaskKind,
    /// How many (recording, array) units were scored.
    pub units: usize,
    /// Ground-truth sources across all scored units.
    pub total_sources: usize,
    /// Mean of the per-source mean circular azimuth errors, radians.
    pub mean_azimuth_error: f64,
    /// Mean of the per-source mean circular elevation errors, radians.
    pub mean_elevation_error: f64,
    /// Mean per-source detection rate.
    pub mean_detection_rate: f64,
    /// Mean per-unit false-alarm rate.
    pub mean_false_alarm_rate: f64,
}

fn nan_safe_mean(values: impl Iterator<Item = f64>) -> f64 {
    let finite: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        f64::NAN
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    }
}

/// Aggregates one task's per-unit results into its summary. Unscored units
/// are skipped entirely.
pub fn summarize(task: TaskKind, results: &[MetricsResult]) -> TaskSummary {
    let scored: Vec<&MetricsResult> = results
        .iter()
        .filter(|r| r.scored && r.task == task)
        .collect();
    let sources: Vec<&SourceMetrics> = scored.iter().flat_map(|r| r.sources.iter()).collect();

    TaskSummary {
        task,
        units: scored.len(),
        total_sources: sources.len(),
        mean_azimuth_error: nan_safe_mean(sources.iter().map(|s| s.azimuth_mean_error)),
        mean_elevation_error: nan_safe_mean(sources.iter().map(|s| s.elevation_mean_error)),
        mean_detection_rate: nan_safe_mean(sources.iter().map(|s| s.detection_rate)),
        mean_false_alarm_rate: nan_safe_mean(scored.iter().map(|r| r.false_alarm_rate)),
    }
}

/// Scores one unit. Pure: no I/O, no global state, never panics on
/// degenerate input.
pub fn evaluate(task: TaskKind, truth: &GroundTruth, output: &AlgorithmOutput) -> MetricsResult {
    if truth.is_empty() {
        return MetricsResult::unscored(task);
    }

    let tolerance = match_tolerance(&truth.sources[0].time);
    let mut claimed = vec![false; output.sources.len()];
    let mut sources = Vec::with_capacity(truth.sources.len());

    for source in &truth.sources {
        let best = best_unclaimed_estimate(source, &output.sources, &claimed, tolerance);
        if let Some(idx) = best {
            claimed[idx] = true;
        }
        sources.push(score_source(task, source, best.map(|i| &output.sources[i]), tolerance));
    }

    // with no valid timestamps nothing is defined, false alarms included
    let false_alarm_rate = if truth.sources[0].time.is_empty() {
        f64::NAN
    } else {
        let unclaimed = claimed.iter().filter(|c| !**c).count();
        // 0/0 is NaN, which is the documented "no estimates" marker
        unclaimed as f64 / output.sources.len() as f64
    };
    MetricsResult {
        task,
        scored: true,
        sources,
        false_alarm_rate,
    }
}

/// Half the median spacing of the valid timestamps. An estimate row
/// further than this from every truth timestamp matches nothing. With
/// fewer than two timestamps there is no spacing to measure, so any row
/// can match.
fn match_tolerance(times: &[f64]) -> f64 {
    if times.len() < 2 {
        return f64::INFINITY;
    }
    let mut gaps: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    gaps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    gaps[gaps.len() / 2] / 2.0
}

/// For each truth timestamp, the index of the nearest estimate row within
/// tolerance. Ties resolve to the earlier row.
fn matched_rows(source: &SourceTruth, estimate: &SourceEstimate, tolerance: f64) -> Vec<Option<usize>> {
    source
        .time
        .iter()
        .map(|t| {
            let mut best: Option<(usize, f64)> = None;
            for (j, et) in estimate.time.iter().enumerate() {
                let d = (et - t).abs();
                if d <= tolerance && best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((j, d));
                }
            }
            best.map(|(j, _)| j)
        })
        .collect()
}

/// The greedy association step for one truth source: the unclaimed
/// estimate with the lowest mean circular azimuth error over its matched
/// rows. Lower index wins ties. Estimates with no matched rows are
/// unclaimable.
fn best_unclaimed_estimate(
    source: &SourceTruth,
    estimates: &[SourceEstimate],
    claimed: &[bool],
    tolerance: f64,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, estimate) in estimates.iter().enumerate() {
        if claimed[idx] {
            continue;
        }
        let rows = matched_rows(source, estimate, tolerance);
        let errors: Vec<f64> = rows
            .iter()
            .zip(&source.polar)
            .filter_map(|(row, polar)| row.map(|j| circular_error(estimate.azimuth[j], polar[0])))
            .collect();
        if errors.is_empty() {
            continue;
        }
        let score = errors.iter().sum::<f64>() / errors.len() as f64;
        if best.map_or(true, |(_, bs)| score < bs) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    (mean, variance)
}

/// Error statistics for one truth source against its claimed estimate, or
/// the all-missed statistics when nothing was claimed.
fn score_source(
    task: TaskKind,
    source: &SourceTruth,
    estimate: Option<&SourceEstimate>,
    tolerance: f64,
) -> SourceMetrics {
    let n_valid = source.time.len();

    let (matched, azimuth_errors, elevation_errors) = match estimate {
        Some(est) => {
            let rows = matched_rows(source, est, tolerance);
            let mut az = Vec::new();
            let mut el = Vec::new();
            for (row, polar) in rows.iter().zip(&source.polar) {
                if let Some(j) = row {
                    az.push(circular_error(est.azimuth[*j], polar[0]));
                    el.push(circular_error(est.elevation[*j], polar[1]));
                }
            }
            let matched: Vec<bool> = rows.iter().map(|r| r.is_some()).collect();
            (matched, az, el)
        }
        None => (vec![false; n_valid], Vec::new(), Vec::new()),
    };

    let (azimuth_mean_error, azimuth_error_variance) = mean_and_variance(&azimuth_errors);
    let (elevation_mean_error, elevation_error_variance) = mean_and_variance(&elevation_errors);

    let detection_rate = if n_valid == 0 {
        f64::NAN
    } else {
        matched.iter().filter(|m| **m).count() as f64 / n_valid as f64
    };

    let continuity = task.is_tracking().then(|| {
        if n_valid < 2 {
            f64::NAN
        } else {
            let continuous = matched.windows(2).filter(|w| w[0] && w[1]).count();
            continuous as f64 / (n_valid - 1) as f64
        }
    });

    SourceMetrics {
        source_id: source.id.clone(),
        matched_estimate: estimate.map(|e| e.id.clone()),
        azimuth_mean_error,
        azimuth_error_variance,
        elevation_mean_error,
        elevation_error_variance,
        detection_rate,
        continuity,
    }
}
