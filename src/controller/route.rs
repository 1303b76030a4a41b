use crate::context::ExecutionContext;
use crate::controller::params::{Arguments, Param};
use crate::di::Provided;
use crate::error::{PressmeshError, Result};
use crate::exception::{ExceptionFilter, Thrown};
use crate::guard::Guard;
use crate::interceptor::Interceptor;
use crate::pipe::Pipe;
use crate::BoxFuture;
use axum::http::Method;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub(crate) type RouteHandler<C> = Arc<
    dyn Fn(Arc<C>, ExecutionContext, Arguments) -> BoxFuture<'static, std::result::Result<Value, Thrown>>
        + Send
        + Sync,
>;

/// Handler bound to its controller instance.
pub type ErasedHandler =
    Arc<dyn Fn(ExecutionContext, Arguments) -> BoxFuture<'static, std::result::Result<Value, Thrown>> + Send + Sync>;

/// Guards, interceptors, pipes and exception filters attached at one level.
#[derive(Clone, Default)]
pub struct Concerns {
    pub guards: Vec<Provided<dyn Guard>>,
    pub interceptors: Vec<Provided<dyn Interceptor>>,
    pub pipes: Vec<Provided<dyn Pipe>>,
    pub filters: Vec<Provided<dyn ExceptionFilter>>,
}

/// Builder methods shared by controller and route definitions.
macro_rules! concern_builders {
    () => {
        pub fn guard(mut self, guard: Provided<dyn Guard>) -> Self {
            self.concerns.guards.push(guard);
            self
        }

        pub fn interceptor(mut self, interceptor: Provided<dyn Interceptor>) -> Self {
            self.concerns.interceptors.push(interceptor);
            self
        }

        pub fn pipe(mut self, pipe: Provided<dyn Pipe>) -> Self {
            self.concerns.pipes.push(pipe);
            self
        }

        pub fn filter(mut self, filter: Provided<dyn ExceptionFilter>) -> Self {
            self.concerns.filters.push(filter);
            self
        }
    };
}

pub(crate) use concern_builders;

/// One handler method of a controller.
///
/// A route may be reachable through several method/path pairs.
///
/// # Example
/// ```rust,ignore
/// RouteDefinition::new("show")
///     .get("/:id")
///     .param(Param::path("id").int())
///     .handler(|this: Arc<PostController>, _ctx, args| async move {
///         this.posts.find(args.get::<i64>("id")?).await
///     })
/// ```
pub struct RouteDefinition<C> {
    name: &'static str,
    bindings: Vec<(Method, String)>,
    params: Vec<Param>,
    concerns: Concerns,
    view: Option<String>,
    handler: Option<RouteHandler<C>>,
}

impl<C: Send + Sync + 'static> RouteDefinition<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            bindings: Vec::new(),
            params: Vec::new(),
            concerns: Concerns::default(),
            view: None,
            handler: None,
        }
    }

    pub fn on(mut self, method: Method, path: &str) -> Self {
        self.bindings.push((method, path.to_string()));
        self
    }

    pub fn get(self, path: &str) -> Self {
        self.on(Method::GET, path)
    }

    pub fn post(self, path: &str) -> Self {
        self.on(Method::POST, path)
    }

    pub fn put(self, path: &str) -> Self {
        self.on(Method::PUT, path)
    }

    pub fn patch(self, path: &str) -> Self {
        self.on(Method::PATCH, path)
    }

    pub fn delete(self, path: &str) -> Self {
        self.on(Method::DELETE, path)
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Render the handler result with the configured view renderer.
    pub fn view(mut self, view: &str) -> Self {
        self.view = Some(view.to_string());
        self
    }

    concern_builders!();

    pub fn handler<F, Fut, R>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<C>, ExecutionContext, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, Thrown>> + Send + 'static,
        R: Serialize,
    {
        let erased: RouteHandler<C> = Arc::new(move |controller, ctx, args| {
            let result = handler(controller, ctx, args);
            Box::pin(async move {
                let value = result.await?;
                serde_json::to_value(value).map_err(Thrown::other)
            })
        });
        self.handler = Some(erased);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn bind(self, controller: &Arc<C>) -> Result<BoundRoute> {
        let owner = std::any::type_name::<C>();
        let handler = self.handler.ok_or_else(|| {
            PressmeshError::route_registration(format!("route `{owner}::{}` has no handler", self.name))
        })?;
        if self.bindings.is_empty() {
            return Err(PressmeshError::route_registration(format!(
                "route `{owner}::{}` declares no method and path",
                self.name
            )));
        }

        let controller = Arc::clone(controller);
        Ok(BoundRoute {
            name: self.name,
            bindings: self.bindings,
            params: self.params,
            concerns: self.concerns,
            view: self.view,
            handler: Arc::new(move |ctx: ExecutionContext, args: Arguments| handler(Arc::clone(&controller), ctx, args)),
        })
    }
}

/// A route definition with its controller instance captured.
#[derive(Clone)]
pub struct BoundRoute {
    pub name: &'static str,
    pub bindings: Vec<(Method, String)>,
    pub params: Vec<Param>,
    pub concerns: Concerns,
    pub view: Option<String>,
    pub handler: ErasedHandler,
}
