//! Progress and accuracy aggregation
//!
//! Progress and accuracy are never stored; they are recomputed from
//! evaluation rows over an assignment's effective scope (the explicit image
//! subset if one exists, else the whole image set). The only cached value is
//! the assignment completion flag, written by [`recompute_completion`].

use chrono::Utc;
use imgeval_common::db::Assignment;
use imgeval_common::Result;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use crate::db;

/// Number of confidence levels (scores 1..=5)
pub const CONFIDENCE_LEVELS: usize = 5;

/// Completion state of an evaluation scope
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub evaluated: i64,
    pub total: i64,
    /// `evaluated / total * 100`, 0 for an empty scope
    pub percentage: f64,
}

impl Progress {
    pub fn new(evaluated: i64, total: i64) -> Self {
        let evaluated = evaluated.clamp(0, total.max(0));
        let percentage = if total <= 0 {
            0.0
        } else {
            (evaluated as f64 / total as f64) * 100.0
        };

        Self {
            evaluated,
            total: total.max(0),
            percentage,
        }
    }

    /// Scope is non-empty and fully evaluated
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.evaluated == self.total
    }

    pub fn remaining(&self) -> i64 {
        self.total - self.evaluated
    }

    /// Sum several scopes into one
    pub fn combine<I: IntoIterator<Item = Progress>>(parts: I) -> Self {
        let (evaluated, total) = parts
            .into_iter()
            .fold((0, 0), |(e, t), p| (e + p.evaluated, t + p.total));
        Self::new(evaluated, total)
    }
}

/// One evaluation joined with the image's ground truth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOutcome {
    pub guessed_real: bool,
    pub actual_real: bool,
    pub confidence: i64,
}

impl EvaluationOutcome {
    pub fn is_correct(&self) -> bool {
        self.guessed_real == self.actual_real
    }
}

/// Share of evaluations at one confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceBucket {
    pub score: i64,
    pub count: i64,
    /// Percentage of all evaluated images; `None` when nothing was evaluated
    pub percentage: Option<f64>,
}

/// Correctness statistics over a set of evaluations
///
/// Percentages are `None` whenever their denominator is zero, so an empty
/// real-image subset never distorts the synthetic-image figure and vice
/// versa.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyStats {
    pub total_evaluated: i64,
    pub correct: i64,
    pub accuracy: Option<f64>,
    pub real_evaluated: i64,
    pub real_correct: i64,
    pub real_accuracy: Option<f64>,
    pub synth_evaluated: i64,
    pub synth_correct: i64,
    pub synth_accuracy: Option<f64>,
    pub confidence_distribution: Vec<ConfidenceBucket>,
}

impl AccuracyStats {
    pub fn from_outcomes(outcomes: &[EvaluationOutcome]) -> Self {
        let mut real_evaluated = 0;
        let mut real_correct = 0;
        let mut synth_evaluated = 0;
        let mut synth_correct = 0;
        let mut counts = [0i64; CONFIDENCE_LEVELS];

        for outcome in outcomes {
            if outcome.actual_real {
                real_evaluated += 1;
                if outcome.is_correct() {
                    real_correct += 1;
                }
            } else {
                synth_evaluated += 1;
                if outcome.is_correct() {
                    synth_correct += 1;
                }
            }

            // The store rejects scores outside 1..=5, so nothing is dropped here
            if let Some(slot) = usize::try_from(outcome.confidence - 1)
                .ok()
                .and_then(|i| counts.get_mut(i))
            {
                *slot += 1;
            }
        }

        let total_evaluated = real_evaluated + synth_evaluated;
        let correct = real_correct + synth_correct;

        let confidence_distribution = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| ConfidenceBucket {
                score: i as i64 + 1,
                count,
                percentage: percent(count, total_evaluated),
            })
            .collect();

        Self {
            total_evaluated,
            correct,
            accuracy: percent(correct, total_evaluated),
            real_evaluated,
            real_correct,
            real_accuracy: percent(real_correct, real_evaluated),
            synth_evaluated,
            synth_correct,
            synth_accuracy: percent(synth_correct, synth_evaluated),
            confidence_distribution,
        }
    }
}

fn percent(part: i64, whole: i64) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 / whole as f64 * 100.0)
    }
}

/// Progress of one assignment over its effective scope
pub async fn assignment_progress(
    conn: &mut SqliteConnection,
    assignment: &Assignment,
) -> Result<Progress> {
    let (evaluated, total) = db::assignments::scope_counts(conn, assignment).await?;
    Ok(Progress::new(evaluated, total))
}

/// Accuracy of one assignment's evaluations over its effective scope
pub async fn assignment_accuracy(
    conn: &mut SqliteConnection,
    assignment: &Assignment,
) -> Result<AccuracyStats> {
    let outcomes = db::assignments::scope_outcomes(conn, assignment).await?;
    Ok(AccuracyStats::from_outcomes(&outcomes))
}

/// Accuracy of every evaluation a clinician has recorded
pub async fn clinician_accuracy(
    conn: &mut SqliteConnection,
    clinician_id: i64,
) -> Result<AccuracyStats> {
    let outcomes = db::evaluations::outcomes_for_clinician(conn, clinician_id).await?;
    Ok(AccuracyStats::from_outcomes(&outcomes))
}

/// Recompute progress and cache completion on the assignment
///
/// Only ever moves an assignment to completed; resetting is the splitter's
/// job. Returns true when the flag flipped.
pub async fn recompute_completion(
    conn: &mut SqliteConnection,
    assignment: &Assignment,
) -> Result<bool> {
    if assignment.is_completed {
        return Ok(false);
    }

    let progress = assignment_progress(conn, assignment).await?;
    if !progress.is_complete() {
        return Ok(false);
    }

    db::assignments::mark_completed(conn, assignment.id, Utc::now()).await?;
    info!(
        "Assignment {} completed (clinician {}, {} images)",
        assignment.id, assignment.clinician_id, progress.total
    );
    Ok(true)
}
