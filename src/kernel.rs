use crate::context::ExecutionContext;
use crate::controller::{
    Arguments, BoundController, CompiledParam, ErasedHandler, ParameterBinder, ResolvedConcerns, RouteMetadata,
};
use crate::di::{Container, DependencyResolver};
use crate::error::{PressmeshError, Result};
use crate::exception::{ExceptionHandler, HttpException, Thrown};
use crate::guard::Guard;
use crate::http::{HttpRequest, HttpResponse, ResponseBody, ResponseHandle, ViewRenderer};
use crate::interceptor::{CallHandler, InterceptorChain, InterceptorResult};
use crate::middleware::{run_middleware, CompiledMiddleware, MiddlewareRegistration};
use crate::module::ResolvedModule;
use crate::pipe::Pipe;
use crate::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::Instrument;

/// One method/path pair of a route with everything it needs resolved.
struct CompiledRoute {
    metadata: Arc<RouteMetadata>,
    class: Arc<ResolvedConcerns>,
    method: Arc<ResolvedConcerns>,
    /// Global, class and method pipes.
    pipes: Arc<Vec<Arc<dyn Pipe>>>,
    params: Arc<Vec<CompiledParam>>,
    interceptors: Arc<InterceptorChain>,
    handler: ErasedHandler,
}

/// The bound handler as the innermost call of the interceptor chain.
struct HandlerCall {
    handler: ErasedHandler,
    arguments: Arguments,
}

impl CallHandler for HandlerCall {
    fn handle(&self, ctx: ExecutionContext) -> BoxFuture<'_, InterceptorResult> {
        (self.handler)(ctx, self.arguments.clone())
    }
}

/// Compiled route table and the request pipeline.
///
/// # Example
/// ```rust,ignore
/// let response = app.kernel().handle(HttpRequest::get("/posts/7")).await;
/// assert_eq!(response.status(), StatusCode::OK);
/// ```
pub struct HttpKernel {
    routes: Vec<CompiledRoute>,
    seen: HashSet<(axum::http::Method, String)>,
    middleware: Vec<CompiledMiddleware>,
    globals: ResolvedConcerns,
    exceptions: Arc<ExceptionHandler>,
    binder: ParameterBinder,
    renderer: Option<Arc<dyn ViewRenderer>>,
}

impl HttpKernel {
    /// `globals` filters belong to `exceptions`; its guards, pipes and
    /// interceptors wrap every route.
    pub fn new(globals: ResolvedConcerns, exceptions: Arc<ExceptionHandler>, binder: ParameterBinder) -> Self {
        Self {
            routes: Vec::new(),
            seen: HashSet::new(),
            middleware: Vec::new(),
            globals,
            exceptions,
            binder,
            renderer: None,
        }
    }

    pub fn set_renderer(&mut self, renderer: Option<Arc<dyn ViewRenderer>>) {
        self.renderer = renderer;
    }

    pub fn exceptions(&self) -> &Arc<ExceptionHandler> {
        &self.exceptions
    }

    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteMetadata>> {
        self.routes.iter().map(|route| &route.metadata)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve and compile a module's middleware registration.
    pub fn register_middleware(
        &mut self,
        registration: &MiddlewareRegistration,
        resolver: &DependencyResolver,
        container: &Container,
        module: &ResolvedModule,
    ) -> Result<()> {
        let middleware = crate::di::Provided::resolve_all(&registration.middleware, resolver, container, module)?;
        let routes = registration
            .routes
            .iter()
            .map(|rule| rule.compile())
            .collect::<Result<Vec<_>>>()?;
        let excludes = registration
            .excludes
            .iter()
            .map(|rule| rule.compile())
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(module = module.name(), middleware = middleware.len(), rules = routes.len(), "compiled middleware");
        self.middleware.push(CompiledMiddleware {
            middleware,
            routes,
            excludes,
        });
        Ok(())
    }

    /// Compile every route of a bound controller.
    ///
    /// Fails when a method is already registered for a path of the same
    /// shape; `/users/:id` and `/users/:slug` count as the same path.
    pub fn register_controller(
        &mut self,
        controller: BoundController,
        resolver: &DependencyResolver,
        container: &Container,
        module: &ResolvedModule,
    ) -> Result<usize> {
        let class = Arc::new(ResolvedConcerns::resolve(&controller.concerns, resolver, container, module)?);
        let mut count = 0;

        for route in controller.routes {
            let method = Arc::new(ResolvedConcerns::resolve(&route.concerns, resolver, container, module)?);
            let params = Arc::new(
                route
                    .params
                    .iter()
                    .cloned()
                    .map(|param| CompiledParam::compile(param, resolver, container, module))
                    .collect::<Result<Vec<_>>>()?,
            );
            let pipes: Arc<Vec<Arc<dyn Pipe>>> = Arc::new(
                self.globals
                    .pipes
                    .iter()
                    .chain(&class.pipes)
                    .chain(&method.pipes)
                    .cloned()
                    .collect(),
            );
            let interceptors = Arc::new(InterceptorChain::new(
                self.globals
                    .interceptors
                    .iter()
                    .chain(&class.interceptors)
                    .chain(&method.interceptors)
                    .cloned()
                    .collect(),
            ));

            for (verb, path) in &route.bindings {
                let metadata = RouteMetadata::new(
                    route.name,
                    controller.type_name,
                    module.id(),
                    &controller.namespace,
                    verb.clone(),
                    path,
                    route.view.clone(),
                )?;
                if !self.seen.insert((verb.clone(), metadata.shape().to_string())) {
                    return Err(PressmeshError::route_registration(format!(
                        "route {metadata} conflicts with a route already registered for {verb} {}",
                        metadata.shape()
                    )));
                }
                tracing::debug!(route = %metadata, handler = route.name, controller = controller.type_name, "compiled route");

                self.routes.push(CompiledRoute {
                    metadata: Arc::new(metadata),
                    class: Arc::clone(&class),
                    method: Arc::clone(&method),
                    pipes: Arc::clone(&pipes),
                    params: Arc::clone(&params),
                    interceptors: Arc::clone(&interceptors),
                    handler: Arc::clone(&route.handler),
                });
                count += 1;
            }
        }
        Ok(count)
    }

    /// Route `request` by its path and method, then run the pipeline.
    ///
    /// The most specific matching path wins, segment by segment a literal
    /// beats a placeholder, before the method is looked at. A path no route
    /// matches is a 404; a path whose best match lacks the method is a 405.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let found = self.find(request.method(), request.path());
        if let Some(Some(index)) = found {
            return self.dispatch(index, request).await;
        }

        let exception = if found.is_some() {
            HttpException::method_not_allowed(format!("Method {} not allowed for {}", request.method(), request.path()))
        } else {
            HttpException::not_found(format!("No route found for {} {}", request.method(), request.path()))
        };
        let ctx = ExecutionContext::with_request(Arc::new(request));
        self.exceptions.handle(&ctx, exception.into())
    }

    /// `None` when no path matches, `Some(None)` when the best path has no
    /// route for `method`.
    fn find(&self, method: &axum::http::Method, path: &str) -> Option<Option<usize>> {
        let best = self
            .routes
            .iter()
            .map(|route| route.metadata.template())
            .filter(|template| template.is_match(path))
            .min_by(|a, b| a.segments().cmp(b.segments()))?;

        Some(self.routes.iter().position(|route| {
            route.metadata.shape() == best.shape() && route.metadata.method() == method
        }))
    }

    /// Run the pipeline of an already matched route.
    pub async fn dispatch(&self, index: usize, mut request: HttpRequest) -> HttpResponse {
        let Some(route) = self.routes.get(index) else {
            let ctx = ExecutionContext::with_request(Arc::new(request));
            return self
                .exceptions
                .handle(&ctx, HttpException::internal(format!("Unknown route index {index}")).into());
        };

        if let Some(params) = route.metadata.captures(request.path()) {
            request.set_params(params);
        }
        let response = ResponseHandle::default();
        let ctx = ExecutionContext::for_route(
            Arc::clone(&route.metadata),
            Arc::new(request.clone()),
            response.clone(),
        );
        let span = tracing::info_span!(
            "request",
            id = %ctx.id(),
            method = %route.metadata.method(),
            path = %request.path(),
        );

        async {
            match self.run(route, &ctx, request, &response).await {
                Ok(response) => response,
                Err(thrown) => self.exceptions.handle(&ctx, thrown),
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        route: &CompiledRoute,
        ctx: &ExecutionContext,
        mut request: HttpRequest,
        response: &ResponseHandle,
    ) -> std::result::Result<HttpResponse, Thrown> {
        let mut draft = response.snapshot();
        if let Some(early) = run_middleware(&self.middleware, &route.metadata, &mut request, &mut draft).await? {
            tracing::debug!(status = %early.status(), "middleware answered");
            return Ok(early);
        }
        response.replace(draft);
        let request = Arc::new(request);
        ctx.replace_request(Arc::clone(&request));

        ctx.push_filters(route.class.filters.iter().cloned());
        for guard in self.globals.guards.iter().chain(&route.class.guards) {
            check_guard(guard.as_ref(), ctx).await?;
        }
        ctx.push_filters(route.method.filters.iter().cloned());
        for guard in &route.method.guards {
            check_guard(guard.as_ref(), ctx).await?;
        }

        let arguments = self.binder.bind(&route.params, &route.pipes, &request, response).await?;
        let call = HandlerCall {
            handler: Arc::clone(&route.handler),
            arguments,
        };
        let value = route.interceptors.run(ctx, &call).await?;

        match route.metadata.view() {
            Some(view) => {
                let renderer = self
                    .renderer
                    .as_ref()
                    .ok_or_else(|| HttpException::internal(format!("No view renderer configured for view `{view}`")))?;
                let html = renderer.render(view, &value).map_err(Thrown::other)?;
                response.with(|draft| draft.set_body(ResponseBody::Html(html)));
            }
            None => response.with(|draft| draft.set_body(ResponseBody::Json(value))),
        }
        Ok(response.snapshot())
    }
}

async fn check_guard(guard: &dyn Guard, ctx: &ExecutionContext) -> std::result::Result<(), Thrown> {
    if guard.can_activate(ctx).await? {
        tracing::debug!(guard = guard.name(), "guard passed");
        Ok(())
    } else {
        tracing::debug!(guard = guard.name(), "guard denied request");
        Err(HttpException::unauthorized("Unauthorized").into())
    }
}
