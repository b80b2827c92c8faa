use std::future::Future;

use anyhow::Result;

pub mod assembler;
pub mod client;
pub mod executor;
pub mod retry;
pub mod worker;

use client::{ExtractionRequest, ExtractionResponse};

/// The external extraction service, per batch. Idempotent per batch
/// content, so retried calls are safe.
pub trait ExtractionService {
    fn extract(
        &self,
        request: ExtractionRequest,
    ) -> impl Future<Output = Result<ExtractionResponse>> + Send;
}
