#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),

    #[error("empty statement: {0}")]
    EmptyStatement(String),

    #[error("extraction produced no transactions")]
    NothingExtracted,
}
