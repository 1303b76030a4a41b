use crate::controller::RouteMetadata;
use crate::exception::ExceptionFilter;
use crate::hooks::HookMetadata;
use crate::http::{HttpRequest, ResponseHandle};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use uuid::Uuid;

/// State of one pipeline invocation, passed explicitly through every stage.
///
/// Cloning is cheap and clones share state, so a hook fired from inside a
/// handler sees (and nests on) the same hook stack.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextState>,
}

struct ContextState {
    id: Uuid,
    rest: Option<RestContext>,
    request: RwLock<Option<Arc<HttpRequest>>>,
    hooks: Mutex<Vec<Arc<HookContext>>>,
    filters: Mutex<Vec<Arc<dyn ExceptionFilter>>>,
}

/// The matched route and response draft of a REST request.
pub struct RestContext {
    route: Arc<RouteMetadata>,
    response: ResponseHandle,
}

impl RestContext {
    pub fn route(&self) -> &Arc<RouteMetadata> {
        &self.route
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }
}

/// One executing hook handler.
#[derive(Debug, Clone)]
pub struct HookContext {
    metadata: HookMetadata,
    arguments: Vec<Value>,
}

impl HookContext {
    pub fn new(metadata: HookMetadata, arguments: Vec<Value>) -> Self {
        Self { metadata, arguments }
    }

    pub fn metadata(&self) -> &HookMetadata {
        &self.metadata
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }
}

impl ExecutionContext {
    /// A context outside any request, e.g. for hooks fired by the host.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// A context that knows the request but not a route.
    pub fn with_request(request: Arc<HttpRequest>) -> Self {
        Self::build(None, Some(request))
    }

    pub fn for_route(route: Arc<RouteMetadata>, request: Arc<HttpRequest>, response: ResponseHandle) -> Self {
        Self::build(Some(RestContext { route, response }), Some(request))
    }

    fn build(rest: Option<RestContext>, request: Option<Arc<HttpRequest>>) -> Self {
        Self {
            inner: Arc::new(ContextState {
                id: Uuid::new_v4(),
                rest,
                request: RwLock::new(request),
                hooks: Mutex::new(Vec::new()),
                filters: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn rest(&self) -> Option<&RestContext> {
        self.inner.rest.as_ref()
    }

    pub fn route(&self) -> Option<&Arc<RouteMetadata>> {
        self.rest().map(RestContext::route)
    }

    pub fn response(&self) -> Option<&ResponseHandle> {
        self.rest().map(RestContext::response)
    }

    pub fn request(&self) -> Option<Arc<HttpRequest>> {
        self.inner
            .request
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish the request as modified by middleware.
    pub fn replace_request(&self, request: Arc<HttpRequest>) {
        *self.inner.request.write().unwrap_or_else(PoisonError::into_inner) = Some(request);
    }

    /// JSON when the request asks for it; HTML without a request.
    pub fn wants_json(&self) -> bool {
        self.request().is_some_and(|request| request.wants_json())
    }

    pub fn push_hook(&self, hook: HookContext) -> Arc<HookContext> {
        let hook = Arc::new(hook);
        self.hooks().push(Arc::clone(&hook));
        hook
    }

    pub fn pop_hook(&self) -> Option<Arc<HookContext>> {
        self.hooks().pop()
    }

    /// The innermost executing hook.
    pub fn current_hook(&self) -> Option<Arc<HookContext>> {
        self.hooks().last().cloned()
    }

    pub fn hook_depth(&self) -> usize {
        self.hooks().len()
    }

    /// Register invocation-scoped exception filters, returning a mark for
    /// [`truncate_filters`](Self::truncate_filters).
    pub fn push_filters(&self, filters: impl IntoIterator<Item = Arc<dyn ExceptionFilter>>) -> usize {
        let mut scoped = self.filters();
        let mark = scoped.len();
        scoped.extend(filters);
        mark
    }

    pub fn truncate_filters(&self, mark: usize) {
        self.filters().truncate(mark);
    }

    /// Scoped filters in registration order.
    pub fn scoped_filters(&self) -> Vec<Arc<dyn ExceptionFilter>> {
        self.filters().clone()
    }

    fn hooks(&self) -> std::sync::MutexGuard<'_, Vec<Arc<HookContext>>> {
        self.inner.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn filters(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn ExceptionFilter>>> {
        self.inner.filters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
