use crate::http::Section;
use async_trait::async_trait;
use serde_json::Value;

pub mod builtins;

pub type PipeResult<T> = Result<T, PipeError>;

/// Pipe failures surface as 400 Bad Request.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Transformation failed: {0}")]
    Transformation(String),

    #[error("Internal pipe error: {0}")]
    Internal(String),
}

/// The parameter a pipe is transforming.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentMetadata<'a> {
    pub name: &'a str,
    pub section: Section,
    pub key: Option<&'a str>,
}

/// The Pipe trait for transformation and validation
///
/// Pipes run on the raw value of a bound parameter before casting and
/// validation, in global, class, method and parameter order.
#[async_trait]
pub trait Pipe: Send + Sync + 'static {
    async fn transform(&self, value: Value, metadata: ArgumentMetadata<'_>) -> PipeResult<Value>;
}
