use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::Direction;

/// All operator-tunable matching data. Thresholds and counterparty names
/// live here, never in pipeline logic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub user_rules: Vec<UserRule>,
    #[serde(default)]
    pub context_rules: Vec<ContextRule>,
    #[serde(default)]
    pub labels: Vec<LabelEntry>,
    #[serde(default)]
    pub amount_rules: Vec<AmountRule>,
}

impl RuleSet {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).context("error reading rules file")?;
        let rules = serde_json::from_str(&raw).context("error parsing rules file")?;
        Ok(rules)
    }
}

/// Operator-authored pattern + amount-sign condition. Always wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRule {
    pub pattern: String,
    #[serde(default)]
    pub direction: Option<Direction>,
    pub category_code: String,
}

/// Structural heuristic: a counterparty and/or description prefix, with
/// optional bounds on the amount magnitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRule {
    #[serde(default)]
    pub counter_party: Option<String>,
    #[serde(default)]
    pub description_prefix: Option<String>,
    #[serde(default)]
    pub min_abs_amount: Option<f64>,
    #[serde(default)]
    pub max_abs_amount: Option<f64>,
    pub category_code: String,
    #[serde(default = "default_context_confidence")]
    pub confidence: f64,
}

/// Maps a source-export label to a category, with separate codes for the
/// inbound and outbound side where both exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEntry {
    pub label: String,
    #[serde(default)]
    pub inbound_code: Option<String>,
    #[serde(default)]
    pub outbound_code: Option<String>,
    #[serde(default = "default_label_confidence")]
    pub confidence: f64,
}

/// Buckets the absolute amount for one counterparty class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountRule {
    pub counter_party_contains: String,
    pub buckets: Vec<AmountBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountBucket {
    pub min_abs: f64,
    #[serde(default)]
    pub max_abs: Option<f64>,
    pub category_code: String,
    pub confidence: f64,
}

fn default_context_confidence() -> f64 {
    0.95
}

fn default_label_confidence() -> f64 {
    0.9
}
