use crate::config::AppConfig;
use crate::context::ExecutionContext;
use crate::error::PressmeshError;
use crate::http::{HttpRequest, HttpResponse};
use crate::pipe::PipeError;
use axum::http::StatusCode;
use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::Arc;
use strum_macros::{Display, EnumString, IntoStaticStr};

mod handler;
pub mod http;

pub use handler::ExceptionHandler;
pub use http::DefaultExceptionFilter;

/// Field name to messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Exception families.
///
/// Every kind is a subtype of [`ExceptionKind::Http`]; filters that accept
/// `Http` catch everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExceptionKind {
    Http,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    Validation,
    Internal,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
}

impl ExceptionKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::Http | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// The most specific kind for a status code.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::BadRequest,
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::METHOD_NOT_ALLOWED => Self::MethodNotAllowed,
            StatusCode::CONFLICT => Self::Conflict,
            StatusCode::UNPROCESSABLE_ENTITY => Self::Validation,
            StatusCode::INTERNAL_SERVER_ERROR => Self::Internal,
            StatusCode::NOT_IMPLEMENTED => Self::NotImplemented,
            StatusCode::BAD_GATEWAY => Self::BadGateway,
            StatusCode::SERVICE_UNAVAILABLE => Self::ServiceUnavailable,
            StatusCode::GATEWAY_TIMEOUT => Self::GatewayTimeout,
            _ => Self::Http,
        }
    }

    /// Whether an exception of this kind is caught by a filter accepting `other`.
    pub fn is_a(self, other: ExceptionKind) -> bool {
        self == other || other == Self::Http
    }
}

/// An HTTP-status-coded request failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HttpException {
    kind: ExceptionKind,
    status: StatusCode,
    message: String,
    reason: Option<String>,
    errors: Option<FieldErrors>,
    location: &'static Location<'static>,
    cause: Option<Arc<anyhow::Error>>,
}

impl HttpException {
    #[track_caller]
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: kind.status(),
            message: message.into(),
            reason: None,
            errors: None,
            location: Location::caller(),
            cause: None,
        }
    }

    /// Exception for an arbitrary status code.
    #[track_caller]
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        let mut exception = Self::new(ExceptionKind::from_status(status), message);
        exception.status = status;
        exception
    }

    #[track_caller]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::BadRequest, message)
    }

    #[track_caller]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Unauthorized, message)
    }

    #[track_caller]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Forbidden, message)
    }

    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::NotFound, message)
    }

    #[track_caller]
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::MethodNotAllowed, message)
    }

    #[track_caller]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Conflict, message)
    }

    /// Aggregated field validation failures.
    #[track_caller]
    pub fn validation(errors: FieldErrors) -> Self {
        Self::new(ExceptionKind::Validation, "Validation failed").with_errors(errors)
    }

    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Internal, message)
    }

    #[track_caller]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::NotImplemented, message)
    }

    #[track_caller]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::BadGateway, message)
    }

    #[track_caller]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ServiceUnavailable, message)
    }

    #[track_caller]
    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::GatewayTimeout, message)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_cause(mut self, cause: anyhow::Error) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attribute the exception to another source location.
    pub fn at(mut self, location: &'static Location<'static>) -> Self {
        self.location = location;
        self
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine readable code, e.g. `bad_request`.
    pub fn code(&self) -> &'static str {
        self.kind.into()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        self.errors.as_ref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_deref()
    }
}

/// Everything a pipeline stage can raise.
#[derive(Debug, thiserror::Error)]
pub enum Thrown {
    #[error(transparent)]
    Http(#[from] HttpException),

    /// The response is final; send it as-is.
    #[error("response finalized with status {}", .0.status())]
    Finalized(Box<HttpResponse>),

    #[error("{error}")]
    Other {
        error: anyhow::Error,
        location: &'static Location<'static>,
    },
}

impl Thrown {
    /// Stop the pipeline and send `response`.
    pub fn respond(response: HttpResponse) -> Self {
        Self::Finalized(Box::new(response))
    }

    #[track_caller]
    pub fn other(error: impl Into<anyhow::Error>) -> Self {
        Self::Other {
            error: error.into(),
            location: Location::caller(),
        }
    }
}

impl From<anyhow::Error> for Thrown {
    #[track_caller]
    fn from(error: anyhow::Error) -> Self {
        Self::Other {
            error,
            location: Location::caller(),
        }
    }
}

impl From<PressmeshError> for Thrown {
    #[track_caller]
    fn from(error: PressmeshError) -> Self {
        Self::Other {
            error: error.into(),
            location: Location::caller(),
        }
    }
}

impl From<PipeError> for Thrown {
    #[track_caller]
    fn from(error: PipeError) -> Self {
        Self::Http(HttpException::bad_request(error.to_string()))
    }
}

/// What an exception filter can see about the failed invocation.
pub struct ArgumentsHost<'a> {
    ctx: &'a ExecutionContext,
    config: &'a AppConfig,
}

impl<'a> ArgumentsHost<'a> {
    pub fn new(ctx: &'a ExecutionContext, config: &'a AppConfig) -> Self {
        Self { ctx, config }
    }

    pub fn context(&self) -> &ExecutionContext {
        self.ctx
    }

    pub fn config(&self) -> &AppConfig {
        self.config
    }

    pub fn request(&self) -> Option<Arc<HttpRequest>> {
        self.ctx.request()
    }

    pub fn is_rest(&self) -> bool {
        self.ctx.rest().is_some()
    }
}

/// Converts an exception into a response.
///
/// A filter only sees exceptions whose kind is in [`accepts`](Self::accepts);
/// an empty list accepts everything. Returning `Err` hands a (possibly new)
/// exception to the next filter, `Err(Thrown::Finalized(..))` sends a
/// response immediately.
///
/// # Example
/// ```rust,ignore
/// struct ValidationFilter;
///
/// impl ExceptionFilter for ValidationFilter {
///     fn accepts(&self) -> Vec<ExceptionKind> {
///         vec![ExceptionKind::Validation]
///     }
///
///     fn catch(&self, exception: &HttpException, _: &ArgumentsHost<'_>) -> Result<HttpResponse, Thrown> {
///         Ok(HttpResponse::json(exception.status(), json!({ "invalid": exception.errors() })))
///     }
/// }
/// ```
pub trait ExceptionFilter: Send + Sync + 'static {
    fn accepts(&self) -> Vec<ExceptionKind> {
        Vec::new()
    }

    fn catch(&self, exception: &HttpException, host: &ArgumentsHost<'_>) -> Result<HttpResponse, Thrown>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
