use crate::context::ExecutionContext;
use crate::http::HttpRequest;
use crate::kernel::HttpKernel;
use axum::extract::{DefaultBodyLimit, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Mount every compiled route of `kernel` on an axum router.
///
/// Routes sharing a path shape are grouped into one method router and
/// mounted under placeholder names taken from their position, so `:id` and
/// `:slug` at the same segment share a node. The kernel binds the declared
/// names itself. Unknown paths and methods are answered by the kernel so
/// they get the same error format as pipeline failures. Request bodies are
/// capped at `max_body_bytes`.
pub fn build_router(kernel: Arc<HttpKernel>, max_body_bytes: usize) -> Router {
    let mut grouped: BTreeMap<String, MethodRouter> = BTreeMap::new();

    for (index, route) in kernel.routes().enumerate() {
        let filter = match MethodFilter::try_from(route.method().clone()) {
            Ok(filter) => filter,
            Err(_) => {
                tracing::warn!(route = %route, "method cannot be mounted on axum, skipping");
                continue;
            }
        };

        let kernel = Arc::clone(&kernel);
        let handler = move |request: Request| {
            let kernel = Arc::clone(&kernel);
            async move {
                match HttpRequest::from_axum(request).await {
                    Ok(request) => kernel.dispatch(index, request).await.into_response(),
                    Err(exception) => kernel
                        .exceptions()
                        .handle(&ExecutionContext::new(), exception.into())
                        .into_response(),
                }
            }
        };

        let path = route.shape().to_string();
        let method_router = grouped.remove(&path).unwrap_or_else(MethodRouter::new);
        grouped.insert(path, method_router.on(filter, handler));
    }

    let mut router = Router::new();
    for (path, method_router) in grouped {
        tracing::debug!(path = %path, "mounted route");
        router = router.route(&path, method_router);
    }

    let fallback = move |request: Request| {
        let kernel = Arc::clone(&kernel);
        async move { unmatched(&kernel, request).await }
    };
    router
        .method_not_allowed_fallback(fallback.clone())
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

async fn unmatched(kernel: &HttpKernel, request: Request) -> Response {
    match HttpRequest::from_axum(request).await {
        Ok(request) => kernel.handle(request).await.into_response(),
        Err(exception) => kernel
            .exceptions()
            .handle(&ExecutionContext::new(), exception.into())
            .into_response(),
    }
}
