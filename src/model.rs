use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One header-prefixed slice of the raw statement, the unit of external work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBatch {
    pub batch_index: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Global position within the run, `batch_index * batch_size + offset`.
    /// Sole ordering and deduplication key downstream.
    pub index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub counter_party: Option<String>,
    pub reference: Option<String>,
    pub balance: Option<f64>,
    /// Free-text label carried over from the source export, if any.
    pub label: Option<String>,
    /// 1-based row in the original file, header included.
    pub row_number: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Income,
    Expense,
    Partner,
    Financing,
    Investment,
    Excluded,
}

impl CategoryKind {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            CategoryKind::Income => Some(Direction::Inbound),
            CategoryKind::Expense => Some(Direction::Outbound),
            _ => None,
        }
    }

    pub fn affects_pnl(&self) -> bool {
        matches!(self, CategoryKind::Income | CategoryKind::Expense)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn allows(&self, amount: f64) -> bool {
        match self {
            Direction::Inbound => amount >= 0.0,
            Direction::Outbound => amount <= 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub code: String,
    pub kind: CategoryKind,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Negative patterns: a description matching one of these never keyword-matches
    /// this category, regardless of its keywords.
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub match_priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    UserRule,
    ContextRule,
    ExcelLabel,
    Keyword,
    AmountRule,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceImpact {
    Increases,
    Decreases,
    Neutral,
}

impl BalanceImpact {
    pub fn for_amount(kind: CategoryKind, amount: f64) -> Self {
        if kind == CategoryKind::Excluded {
            return BalanceImpact::Neutral;
        }
        if amount >= 0.0 {
            BalanceImpact::Increases
        } else {
            BalanceImpact::Decreases
        }
    }
}

/// At most one of these exists per transaction index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatchResult {
    pub transaction_index: usize,
    pub category_id: String,
    pub category_code: String,
    pub category_kind: CategoryKind,
    pub confidence: f64,
    pub source: MatchSource,
    pub reasoning: String,
    pub affects_pnl: bool,
    pub balance_impact: BalanceImpact,
}

/// 1-based inclusive file rows, header = row 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// A batch whose retries were exhausted. Recorded, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub batch_index: usize,
    pub row_range: RowRange,
    pub error: String,
    pub retry_count: u32,
}

/// Read-mostly snapshot written once per completed group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub successful_batches: usize,
    pub failed_batches: usize,
    pub retried_batches: usize,
    pub processed_transactions: usize,
    pub expected_transactions: usize,
    pub estimated_time_left: Option<Duration>,
    /// Highest retry count observed in the most recently completed group.
    pub current_retry_attempt: u32,
}

impl BatchProgress {
    pub fn new(total: usize, expected_transactions: usize) -> Self {
        Self {
            completed: 0,
            total,
            successful_batches: 0,
            failed_batches: 0,
            retried_batches: 0,
            processed_transactions: 0,
            expected_transactions,
            estimated_time_left: None,
            current_retry_attempt: 0,
        }
    }
}

/// Complete replayable snapshot of a cooperatively cancelled run.
/// Consumed exactly once by a resume, never partially applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    pub batches: Vec<RawBatch>,
    pub next_index: usize,
    pub collected_transactions: Vec<Transaction>,
    pub failed_batches: Vec<FailedBatch>,
}
