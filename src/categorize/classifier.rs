use std::collections::HashSet;
use std::future::Future;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};

use crate::extraction::{executor::join_in_groups, retry::RetryPolicy};
use crate::model::{
    BalanceImpact, Category, MatchSource, RuleMatchResult, Transaction,
};

pub static CLASSIFIER_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .build()
        .expect("creating CLASSIFIER_CLIENT")
});

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRequest {
    pub transactions: Vec<Transaction>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
pub struct ClassificationResponse {
    #[serde(default)]
    pub results: Vec<ClassifierVerdict>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierVerdict {
    pub index: usize,
    pub category_code: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub affects_pnl: Option<bool>,
    #[serde(default)]
    pub balance_impact: Option<BalanceImpact>,
    #[serde(default)]
    pub counter_party: Option<String>,
}

/// The external fallback classifier, called only for transactions the
/// rule cascade left unresolved.
pub trait ClassifierService {
    fn classify(
        &self,
        request: ClassificationRequest,
    ) -> impl Future<Output = Result<ClassificationResponse>> + Send;
}

pub struct ClassifierClient {
    base_url: String,
    api_key: Option<String>,
}

impl ClassifierClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        }
    }
}

impl ClassifierService for ClassifierClient {
    async fn classify(&self, request: ClassificationRequest) -> Result<ClassificationResponse> {
        let mut req = CLASSIFIER_CLIENT
            .post(format!("{base}/classify", base = self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let res = req.send().await.context("error making classifier req")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("classifier req error {text} {status}"));
        }

        let res = res
            .json::<ClassificationResponse>()
            .await
            .context("error parsing classifier res")?;

        Ok(res)
    }
}

pub struct ClassifierRunner<'a, S> {
    service: &'a S,
    batch_size: usize,
    group_size: usize,
    retry: RetryPolicy,
}

impl<'a, S: ClassifierService> ClassifierRunner<'a, S> {
    pub fn new(service: &'a S, batch_size: usize, group_size: usize, retry: RetryPolicy) -> Self {
        Self {
            service,
            batch_size: batch_size.max(1),
            group_size,
            retry,
        }
    }

    /// Sends unresolved transactions to the classifier in bounded-parallel
    /// groups and merges the verdicts back by transaction index. A batch
    /// whose retries are exhausted simply contributes no results; the
    /// report accounts for its transactions as unmatched.
    pub async fn classify(
        &self,
        unresolved: &[Transaction],
        categories: &[Category],
    ) -> Vec<RuleMatchResult> {
        if unresolved.is_empty() {
            return vec![];
        }

        let batches: Vec<Vec<Transaction>> = unresolved
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        tracing::info!(
            transactions = unresolved.len(),
            batches = batches.len(),
            "sending unresolved transactions to classifier"
        );

        let verdicts = join_in_groups(batches, self.group_size, |batch| {
            self.classify_batch(batch, categories)
        })
        .await;

        let known: HashSet<usize> = unresolved.iter().map(|tx| tx.index).collect();
        let mut seen: HashSet<usize> = HashSet::new();
        let mut matched = Vec::new();

        for result in verdicts.into_iter().flatten() {
            if !known.contains(&result.transaction_index) {
                tracing::warn!(
                    index = result.transaction_index,
                    "classifier returned a verdict for an unknown transaction"
                );
                continue;
            }
            if !seen.insert(result.transaction_index) {
                tracing::warn!(
                    index = result.transaction_index,
                    "duplicate classifier verdict dropped"
                );
                continue;
            }
            matched.push(result);
        }

        matched.sort_by_key(|result| result.transaction_index);
        matched
    }

    async fn classify_batch(
        &self,
        batch: Vec<Transaction>,
        categories: &[Category],
    ) -> Vec<RuleMatchResult> {
        let mut last_error = String::new();

        for attempt in 0..self.retry.attempts() {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay_for(attempt - 1)).await;
            }

            let request = ClassificationRequest {
                transactions: batch.clone(),
                categories: categories.to_vec(),
            };

            match self.service.classify(request).await {
                Ok(res) => {
                    return res
                        .results
                        .into_iter()
                        .filter_map(|verdict| to_match_result(verdict, &batch, categories))
                        .collect();
                }
                Err(err) => {
                    last_error = format!("{err:#}");
                    tracing::warn!(attempt, "classifier attempt failed: {last_error}");
                }
            }
        }

        tracing::warn!(
            transactions = batch.len(),
            "classifier batch failed after retries: {last_error}"
        );
        vec![]
    }
}

fn to_match_result(
    verdict: ClassifierVerdict,
    batch: &[Transaction],
    categories: &[Category],
) -> Option<RuleMatchResult> {
    let tx = batch.iter().find(|tx| tx.index == verdict.index)?;

    let Some(category) = categories.iter().find(|c| c.code == verdict.category_code) else {
        tracing::warn!(
            index = verdict.index,
            code = %verdict.category_code,
            "classifier verdict references unknown category"
        );
        return None;
    };

    Some(RuleMatchResult {
        transaction_index: verdict.index,
        category_id: category.id.clone(),
        category_code: category.code.clone(),
        category_kind: category.kind,
        confidence: verdict.confidence.clamp(0.0, 1.0),
        source: MatchSource::Ai,
        reasoning: verdict.reasoning,
        affects_pnl: verdict.affects_pnl.unwrap_or_else(|| category.kind.affects_pnl()),
        balance_impact: verdict
            .balance_impact
            .unwrap_or_else(|| BalanceImpact::for_amount(category.kind, tx.amount)),
    })
}
