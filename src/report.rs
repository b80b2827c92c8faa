use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;

use crate::model::{FailedBatch, MatchSource, RuleMatchResult, Transaction};

/// Final accounting for one run. Every extracted transaction appears in
/// exactly one of matched-by-rules, matched-by-classifier or
/// unmatched_indices; every input row is either extracted or inside a
/// failed batch's row range.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub extracted: usize,
    pub failed_rows: usize,
    pub failed_batches: Vec<FailedBatch>,
    pub retried_batches: usize,
    pub matched_by_rules: usize,
    pub matched_by_classifier: usize,
    pub unmatched_indices: Vec<usize>,
    pub duration: Duration,
}

pub fn build_report(
    total_rows: usize,
    transactions: &[Transaction],
    failed: &[FailedBatch],
    matches: &[RuleMatchResult],
    retried_batches: usize,
    duration: Duration,
) -> ImportReport {
    let matched_by_classifier = matches
        .iter()
        .filter(|m| m.source == MatchSource::Ai)
        .count();
    let matched_by_rules = matches.len() - matched_by_classifier;

    let matched_indices: HashSet<usize> = matches.iter().map(|m| m.transaction_index).collect();
    let unmatched_indices: Vec<usize> = transactions
        .iter()
        .map(|tx| tx.index)
        .filter(|index| !matched_indices.contains(index))
        .collect();

    let failed_rows = failed.iter().map(|f| f.row_range.len()).sum();

    ImportReport {
        total_rows,
        extracted: transactions.len(),
        failed_rows,
        failed_batches: failed.to_vec(),
        retried_batches,
        matched_by_rules,
        matched_by_classifier,
        unmatched_indices,
        duration,
    }
}
