use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::model::{BatchProgress, FailedBatch, RawBatch, ResumeState, Transaction};
use crate::statement::splitter;

use super::{
    ExtractionService, assembler,
    retry::RetryPolicy,
    worker::{self, BatchResult},
};

/// Runs `items` through `task` in sequential groups of at most
/// `group_size`, joining every group before the next one starts. Peak
/// in-flight work is therefore bounded by `group_size`.
pub async fn join_in_groups<I, F, Fut, T>(items: Vec<I>, group_size: usize, mut task: F) -> Vec<T>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = T>,
{
    let group_size = group_size.max(1);
    let mut out = Vec::with_capacity(items.len());
    let mut iter = items.into_iter();

    loop {
        let group: Vec<Fut> = iter.by_ref().take(group_size).map(&mut task).collect();
        if group.is_empty() {
            break;
        }
        out.extend(join_all(group).await);
    }

    out
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub batch_size: usize,
    pub group_size: usize,
    pub retry: RetryPolicy,
    pub file_name: String,
}

#[derive(Debug)]
pub enum ExecutorOutcome {
    Completed {
        transactions: Vec<Transaction>,
        failed: Vec<FailedBatch>,
    },
    Paused(ResumeState),
}

pub struct BatchExecutor<'a, S> {
    service: &'a S,
    settings: ExecutorSettings,
    cancel: CancellationToken,
    progress: &'a watch::Sender<BatchProgress>,
}

impl<'a, S: ExtractionService> BatchExecutor<'a, S> {
    pub fn new(
        service: &'a S,
        settings: ExecutorSettings,
        cancel: CancellationToken,
        progress: &'a watch::Sender<BatchProgress>,
    ) -> Self {
        Self {
            service,
            settings,
            cancel,
            progress,
        }
    }

    /// Processes `batches[start_index..]` in bounded groups. Each worker
    /// owns its own result slot, so nothing here needs a lock; progress is
    /// written exactly once per joined group. A cancelled token pauses the
    /// run at the next group boundary and snapshots everything collected
    /// so far.
    pub async fn run(
        &self,
        batches: Vec<RawBatch>,
        start_index: usize,
        prior_transactions: Vec<Transaction>,
        prior_failed: Vec<FailedBatch>,
    ) -> ExecutorOutcome {
        let total_batches = batches.len();
        let expected_transactions = splitter::total_row_count(&batches);
        let group_size = self.settings.group_size.max(1);

        let mut slots: BTreeMap<usize, Vec<Transaction>> = BTreeMap::new();
        for tx in prior_transactions {
            slots
                .entry(tx.index / self.settings.batch_size)
                .or_default()
                .push(tx);
        }
        let mut failed = prior_failed;

        let mut progress = BatchProgress::new(total_batches, expected_transactions);
        progress.completed = start_index;
        progress.successful_batches = slots.len();
        progress.failed_batches = failed.len();
        progress.retried_batches = failed.iter().filter(|f| f.retry_count > 0).count();
        progress.processed_transactions = slots.values().map(Vec::len).sum();
        self.progress.send_replace(progress.clone());

        let started = Instant::now();
        let mut next_index = start_index;

        while next_index < total_batches {
            // cancellation is observed here only, with no group in flight
            if self.cancel.is_cancelled() {
                tracing::info!(next_index, "run paused, snapshotting collected state");
                return ExecutorOutcome::Paused(ResumeState {
                    next_index,
                    collected_transactions: assembler::flatten_slots(slots),
                    failed_batches: failed,
                    batches,
                });
            }

            let group_end = (next_index + group_size).min(total_batches);
            let results = join_all(batches[next_index..group_end].iter().map(|batch| {
                worker::process_batch(
                    self.service,
                    batch,
                    total_batches,
                    self.settings.batch_size,
                    &self.settings.file_name,
                    &self.settings.retry,
                )
            }))
            .await;

            let mut group_retry_max = 0;
            for result in results {
                if result.was_retried() {
                    progress.retried_batches += 1;
                    group_retry_max = group_retry_max.max(result.retries());
                }
                match result {
                    BatchResult::Extracted {
                        batch_index,
                        transactions,
                        ..
                    } => {
                        progress.successful_batches += 1;
                        progress.processed_transactions += transactions.len();
                        slots.insert(batch_index, transactions);
                    }
                    BatchResult::Failed {
                        batch_index,
                        error,
                        retries,
                    } => {
                        tracing::warn!(batch = batch_index, "batch permanently failed: {error}");
                        progress.failed_batches += 1;
                        failed.push(FailedBatch {
                            batch_index,
                            row_range: assembler::row_range(
                                batch_index,
                                self.settings.batch_size,
                                expected_transactions,
                            ),
                            error,
                            retry_count: retries,
                        });
                    }
                }
            }

            next_index = group_end;
            progress.completed = next_index;
            progress.current_retry_attempt = group_retry_max;
            progress.estimated_time_left = estimate_time_left(
                started.elapsed(),
                next_index - start_index,
                total_batches - next_index,
            );
            self.progress.send_replace(progress.clone());
            tracing::debug!(
                completed = progress.completed,
                total = progress.total,
                "group joined"
            );
        }

        let (transactions, failed) = assembler::assemble(slots, failed);
        ExecutorOutcome::Completed {
            transactions,
            failed,
        }
    }

    /// Re-enters the run from a pause snapshot. Merging the remaining
    /// batches with the snapshot produces the same result as an
    /// uninterrupted run.
    pub async fn resume(&self, state: ResumeState) -> ExecutorOutcome {
        tracing::info!(
            next_index = state.next_index,
            collected = state.collected_transactions.len(),
            "resuming from snapshot"
        );
        self.run(
            state.batches,
            state.next_index,
            state.collected_transactions,
            state.failed_batches,
        )
        .await
    }
}

fn estimate_time_left(elapsed: Duration, done: usize, remaining: usize) -> Option<Duration> {
    if done == 0 || remaining == 0 {
        return None;
    }
    Some(elapsed.mul_f64(remaining as f64 / done as f64))
}
