use crate::controller::RouteMetadata;
use crate::exception::Thrown;
use crate::http::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::sync::Arc;

mod consumer;
mod rule;

pub use consumer::{MiddlewareBuilder, MiddlewareConsumer, MiddlewareRegistration};
pub use rule::{MethodMatcher, PathPattern, RouteRule};

pub(crate) use rule::CompiledRule;

/// What a middleware decided.
#[derive(Debug)]
pub enum Outcome {
    /// Hand over to the next middleware and then the guards.
    Continue,
    /// Send this response and stop.
    Respond(HttpResponse),
}

/// Runs before guards with mutable access to the request and the response
/// draft.
///
/// # Example
/// ```rust,ignore
/// #[derive(Injectable)]
/// struct ApiKey;
///
/// #[async_trait]
/// impl Middleware for ApiKey {
///     async fn handle(&self, request: &mut HttpRequest, _: &mut HttpResponse) -> Result<Outcome, Thrown> {
///         match request.header("x-api-key") {
///             Some(_) => Ok(Outcome::Continue),
///             None => Ok(Outcome::Respond(HttpResponse::new(StatusCode::UNAUTHORIZED))),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, request: &mut HttpRequest, response: &mut HttpResponse) -> Result<Outcome, Thrown>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A registration with its middleware resolved and rules compiled.
pub(crate) struct CompiledMiddleware {
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) routes: Vec<CompiledRule>,
    pub(crate) excludes: Vec<CompiledRule>,
}

impl CompiledMiddleware {
    pub(crate) fn applies_to(&self, route: &RouteMetadata, request_path: &str) -> bool {
        self.routes.iter().any(|rule| rule.matches(route, request_path))
            && !self.excludes.iter().any(|rule| rule.matches(route, request_path))
    }
}

/// Run every applicable registration in order.
///
/// Returns the response of the first middleware that answers.
pub(crate) async fn run_middleware(
    registrations: &[CompiledMiddleware],
    route: &RouteMetadata,
    request: &mut HttpRequest,
    response: &mut HttpResponse,
) -> Result<Option<HttpResponse>, Thrown> {
    let request_path = request.path().to_string();
    for registration in registrations {
        if !registration.applies_to(route, &request_path) {
            continue;
        }
        for middleware in &registration.middleware {
            tracing::debug!(middleware = middleware.name(), route = route.name(), "running middleware");
            if let Outcome::Respond(early) = middleware.handle(request, response).await? {
                return Ok(Some(early));
            }
        }
    }
    Ok(None)
}
