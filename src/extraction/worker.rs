use crate::model::{RawBatch, Transaction};

use super::{
    ExtractionService,
    client::{ExtractionMetadata, ExtractionRequest},
    retry::RetryPolicy,
};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult {
    Extracted {
        batch_index: usize,
        transactions: Vec<Transaction>,
        retries: u32,
    },
    Failed {
        batch_index: usize,
        error: String,
        retries: u32,
    },
}

impl BatchResult {
    pub fn retries(&self) -> u32 {
        match self {
            BatchResult::Extracted { retries, .. } => *retries,
            BatchResult::Failed { retries, .. } => *retries,
        }
    }

    pub fn was_retried(&self) -> bool {
        self.retries() > 0
    }
}

/// Runs one batch against the extraction service with bounded retry and
/// exponential backoff. A transport error, an unsuccessful response and a
/// structurally valid but empty result all count as transient failures.
/// Exhausted retries fail this batch only, never the siblings.
pub async fn process_batch<S: ExtractionService>(
    service: &S,
    batch: &RawBatch,
    total_batches: usize,
    batch_size: usize,
    file_name: &str,
    policy: &RetryPolicy,
) -> BatchResult {
    let mut last_error = String::new();

    for attempt in 0..policy.attempts() {
        if attempt > 0 {
            tokio::time::sleep(policy.delay_for(attempt - 1)).await;
        }

        let request = ExtractionRequest {
            content: batch.content.clone(),
            metadata: ExtractionMetadata {
                batch_index: batch.batch_index,
                total_batches,
                file_name: file_name.to_owned(),
                file_type: file_type_of(file_name).to_owned(),
            },
        };

        match service.extract(request).await {
            Ok(res) if res.success && !res.transactions.is_empty() => {
                let transactions = res
                    .transactions
                    .into_iter()
                    .enumerate()
                    .map(|(offset, row)| Transaction {
                        index: batch.batch_index * batch_size + offset,
                        row_number: batch.batch_index * batch_size + offset + 2,
                        date: row.date,
                        description: row.description,
                        amount: row.amount,
                        counter_party: row.counter_party,
                        reference: row.reference,
                        balance: row.balance,
                        label: row.label,
                    })
                    .collect();

                if attempt > 0 {
                    tracing::info!(
                        batch = batch.batch_index,
                        retries = attempt,
                        "batch recovered after retry"
                    );
                }

                return BatchResult::Extracted {
                    batch_index: batch.batch_index,
                    transactions,
                    retries: attempt,
                };
            }
            Ok(res) => {
                last_error = res
                    .error
                    .unwrap_or_else(|| "extraction returned no transactions".to_owned());
                tracing::warn!(
                    batch = batch.batch_index,
                    attempt,
                    "unusable extraction result: {last_error}"
                );
            }
            Err(err) => {
                last_error = format!("{err:#}");
                tracing::warn!(
                    batch = batch.batch_index,
                    attempt,
                    "extraction attempt failed: {last_error}"
                );
            }
        }
    }

    BatchResult::Failed {
        batch_index: batch.batch_index,
        error: last_error,
        retries: policy.max_retries,
    }
}

fn file_type_of(file_name: &str) -> &str {
    file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("txt")
}
