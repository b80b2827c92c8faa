use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::categorize::{
    self,
    classifier::{ClassifierRunner, ClassifierService},
    rules::RuleSet,
};
use crate::config::Config;
use crate::error::ImportError;
use crate::extraction::{
    ExtractionService,
    executor::{BatchExecutor, ExecutorOutcome, ExecutorSettings},
    retry::RetryPolicy,
};
use crate::model::{
    BatchProgress, Category, FailedBatch, RawBatch, ResumeState, RuleMatchResult, Transaction,
};
use crate::report::{self, ImportReport};
use crate::statement::splitter;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub concurrency: usize,
    pub classifier_batch_size: usize,
    pub retry: RetryPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            classifier_batch_size: config.classifier_batch_size,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_secs(config.retry_base_delay_secs),
            },
        }
    }
}

#[derive(Debug)]
pub struct ImportOutput {
    pub transactions: Vec<Transaction>,
    pub matches: Vec<RuleMatchResult>,
    pub report: ImportReport,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(ImportOutput),
    Paused(ResumeState),
}

/// The whole import: split, extract in bounded-parallel batches, assemble,
/// run the rule cascade, send the leftovers to the classifier, account for
/// every row. Partial success is a successful run with a non-empty failure
/// report, never an error.
pub struct ImportPipeline<E, C> {
    extraction: E,
    classifier: C,
    settings: PipelineSettings,
    cancel: CancellationToken,
    progress: watch::Sender<BatchProgress>,
}

impl<E: ExtractionService, C: ClassifierService> ImportPipeline<E, C> {
    pub fn new(
        extraction: E,
        classifier: C,
        settings: PipelineSettings,
        cancel: CancellationToken,
    ) -> Self {
        let (progress, _) = watch::channel(BatchProgress::new(0, 0));
        Self {
            extraction,
            classifier,
            settings,
            cancel,
            progress,
        }
    }

    pub fn progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    pub async fn run(
        &self,
        content: &str,
        file_name: &str,
        categories: &[Category],
        rules: &RuleSet,
    ) -> Result<PipelineOutcome, ImportError> {
        let batches = splitter::split_statement(content, self.settings.batch_size)?;
        tracing::info!(
            batches = batches.len(),
            rows = splitter::total_row_count(&batches),
            "statement split"
        );

        self.execute(batches, 0, vec![], vec![], file_name, categories, rules)
            .await
    }

    /// Consumes a pause snapshot and continues where the run left off.
    pub async fn resume(
        &self,
        state: ResumeState,
        file_name: &str,
        categories: &[Category],
        rules: &RuleSet,
    ) -> Result<PipelineOutcome, ImportError> {
        self.execute(
            state.batches,
            state.next_index,
            state.collected_transactions,
            state.failed_batches,
            file_name,
            categories,
            rules,
        )
        .await
    }

    async fn execute(
        &self,
        batches: Vec<RawBatch>,
        start_index: usize,
        prior_transactions: Vec<Transaction>,
        prior_failed: Vec<FailedBatch>,
        file_name: &str,
        categories: &[Category],
        rules: &RuleSet,
    ) -> Result<PipelineOutcome, ImportError> {
        let started = Instant::now();
        let total_rows = splitter::total_row_count(&batches);

        let executor = BatchExecutor::new(
            &self.extraction,
            ExecutorSettings {
                batch_size: self.settings.batch_size,
                group_size: self.settings.concurrency,
                retry: self.settings.retry,
                file_name: file_name.to_owned(),
            },
            self.cancel.clone(),
            &self.progress,
        );

        let (transactions, failed) = match executor
            .run(batches, start_index, prior_transactions, prior_failed)
            .await
        {
            ExecutorOutcome::Paused(state) => return Ok(PipelineOutcome::Paused(state)),
            ExecutorOutcome::Completed {
                transactions,
                failed,
            } => (transactions, failed),
        };

        if transactions.is_empty() {
            return Err(ImportError::NothingExtracted);
        }

        let cascade = categorize::classify(&transactions, categories, rules);
        tracing::info!(
            matched = cascade.matched.len(),
            unresolved = cascade.unresolved.len(),
            "rule cascade finished"
        );

        let runner = ClassifierRunner::new(
            &self.classifier,
            self.settings.classifier_batch_size,
            self.settings.concurrency,
            self.settings.retry,
        );
        let ai_matches = runner.classify(&cascade.unresolved, categories).await;

        let mut matches = cascade.matched;
        matches.extend(ai_matches);
        matches.sort_by_key(|m| m.transaction_index);

        let retried_batches = self.progress.borrow().retried_batches;
        let report = report::build_report(
            total_rows,
            &transactions,
            &failed,
            &matches,
            retried_batches,
            started.elapsed(),
        );

        Ok(PipelineOutcome::Completed(ImportOutput {
            transactions,
            matches,
            report,
        }))
    }
}
