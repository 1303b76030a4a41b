use crate::di::{ClassProvider, Injectable, Instance, Token};
use crate::error::{PressmeshError, Result};
use crate::exception::ExceptionFilter;
use crate::guard::Guard;
use crate::interceptor::Interceptor;
use crate::module::ModuleId;
use crate::pipe::Pipe;
use crate::di::Provided;
use axum::http::Method;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

mod binder;
mod params;
mod path;
mod route;

pub use binder::{CompiledParam, ParameterBinder};
pub use params::{
    flatten_errors, Argument, Arguments, DtoBinder, Param, ParamKind, ParamType, Rule, ScalarType,
};
pub use path::{join, normalize, PathTemplate, Segment};
pub use route::{BoundRoute, Concerns, ErasedHandler, RouteDefinition};

use route::concern_builders;

/// A class whose routes are served under a namespace.
///
/// # Example
/// ```rust,ignore
/// #[derive(Injectable)]
/// pub struct PostController {
///     posts: Arc<PostService>,
/// }
///
/// impl Controller for PostController {
///     fn definition() -> ControllerDefinition<Self> {
///         ControllerDefinition::new("posts")
///             .guard(Provided::<dyn Guard>::of::<AuthGuard>())
///             .route(
///                 RouteDefinition::new("index")
///                     .get("/")
///                     .handler(|this: Arc<Self>, _ctx, _args| async move { Ok(this.posts.all()) }),
///             )
///     }
/// }
/// ```
pub trait Controller: Injectable {
    fn definition() -> ControllerDefinition<Self>;
}

/// Namespace, class-level concerns and routes of a controller.
pub struct ControllerDefinition<C> {
    namespace: String,
    concerns: Concerns,
    routes: Vec<RouteDefinition<C>>,
}

impl<C: Send + Sync + 'static> ControllerDefinition<C> {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: normalize(namespace),
            concerns: Concerns::default(),
            routes: Vec::new(),
        }
    }

    concern_builders!();

    pub fn route(mut self, route: RouteDefinition<C>) -> Self {
        self.routes.push(route);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Capture `controller` in every route handler.
    pub fn bind(self, controller: Arc<C>) -> Result<BoundController> {
        let mut names = HashSet::new();
        let mut routes = Vec::with_capacity(self.routes.len());
        for route in self.routes {
            if !names.insert(route.name()) {
                return Err(PressmeshError::route_registration(format!(
                    "route `{}::{}` is declared more than once",
                    std::any::type_name::<C>(),
                    route.name()
                )));
            }
            routes.push(route.bind(&controller)?);
        }

        Ok(BoundController {
            type_name: std::any::type_name::<C>(),
            namespace: self.namespace,
            concerns: self.concerns,
            routes,
        })
    }
}

/// A controller instance with its routes ready to compile.
pub struct BoundController {
    pub type_name: &'static str,
    pub namespace: String,
    pub concerns: Concerns,
    pub routes: Vec<BoundRoute>,
}

type BindFn = fn(Instance) -> Result<BoundController>;

fn bind_controller<C: Controller>(instance: Instance) -> Result<BoundController> {
    let controller = instance
        .downcast::<C>()
        .map_err(|_| PressmeshError::DowncastFailed {
            type_name: std::any::type_name::<C>().to_string(),
        })?;
    C::definition().bind(controller)
}

/// Controller class listed in module metadata.
#[derive(Clone)]
pub struct ControllerRef {
    provider: ClassProvider,
    bind: BindFn,
}

impl ControllerRef {
    pub fn of<C: Controller>() -> Self {
        Self {
            provider: ClassProvider::of::<C>(),
            bind: bind_controller::<C>,
        }
    }

    pub fn token(&self) -> &Token {
        self.provider.token()
    }

    pub fn type_name(&self) -> &'static str {
        self.provider.type_name()
    }

    pub fn provider(&self) -> &ClassProvider {
        &self.provider
    }

    /// Bind the resolved controller instance to its definition.
    pub fn bind(&self, instance: Instance) -> Result<BoundController> {
        (self.bind)(instance)
    }
}

impl fmt::Debug for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControllerRef({})", self.type_name())
    }
}

/// Static description of one method/path pair of a route.
#[derive(Debug, Clone)]
pub struct RouteMetadata {
    name: &'static str,
    controller: &'static str,
    module: ModuleId,
    namespace: String,
    method: Method,
    path: String,
    template: PathTemplate,
    view: Option<String>,
}

impl RouteMetadata {
    pub fn new(
        name: &'static str,
        controller: &'static str,
        module: ModuleId,
        namespace: &str,
        method: Method,
        path: &str,
        view: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            name,
            controller,
            module,
            namespace: normalize(namespace),
            method,
            path: normalize(path),
            template: PathTemplate::parse(&join(namespace, path))?,
            view,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fully qualified controller type name.
    pub fn controller(&self) -> &'static str {
        self.controller
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Route path without the namespace.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Namespace and path joined.
    pub fn full_path(&self) -> &str {
        self.template.path()
    }

    pub fn axum_path(&self) -> &str {
        self.template.axum_path()
    }

    /// See [`PathTemplate::shape`].
    pub fn shape(&self) -> &str {
        self.template.shape()
    }

    pub fn params(&self) -> &[String] {
        self.template.params()
    }

    pub fn view(&self) -> Option<&str> {
        self.view.as_deref()
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn captures(&self, request_path: &str) -> Option<Map<String, Value>> {
        self.template.captures(request_path)
    }

    /// `request_path` with the namespace prefix removed.
    pub fn relative_path<'a>(&self, request_path: &'a str) -> Option<&'a str> {
        if self.namespace == "/" {
            return Some(request_path);
        }
        let rest = request_path.strip_prefix(self.namespace.as_str())?;
        match rest {
            "" => Some("/"),
            rest if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }
}

impl fmt::Display for RouteMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.full_path())
    }
}

/// Guards, interceptors, pipes and filters of one level, resolved.
#[derive(Clone, Default)]
pub struct ResolvedConcerns {
    pub guards: Vec<Arc<dyn Guard>>,
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    pub pipes: Vec<Arc<dyn Pipe>>,
    pub filters: Vec<Arc<dyn ExceptionFilter>>,
}

impl ResolvedConcerns {
    pub fn resolve(
        concerns: &Concerns,
        resolver: &crate::di::DependencyResolver,
        container: &crate::di::Container,
        module: &crate::module::ResolvedModule,
    ) -> Result<Self> {
        Ok(Self {
            guards: Provided::resolve_all(&concerns.guards, resolver, container, module)?,
            interceptors: Provided::resolve_all(&concerns.interceptors, resolver, container, module)?,
            pipes: Provided::resolve_all(&concerns.pipes, resolver, container, module)?,
            filters: Provided::resolve_all(&concerns.filters, resolver, container, module)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::Dependencies;
    use crate::module::{Module, ModuleMetadata};

    #[derive(Default)]
    struct Site;

    impl Module for Site {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new().controller(ControllerRef::of::<Pages>())
        }
    }

    struct Pages;

    impl Injectable for Pages {
        fn construct(_: &mut Dependencies) -> Result<Self> {
            Ok(Pages)
        }
    }

    impl Controller for Pages {
        fn definition() -> ControllerDefinition<Self> {
            ControllerDefinition::new("pages/")
                .route(RouteDefinition::new("index").get("/").handler(|_, _, _| async { Ok("index") }))
                .route(
                    RouteDefinition::new("show")
                        .get(":slug")
                        .handler(|_, _, args| async move { args.get::<String>("slug") }),
                )
        }
    }

    #[test]
    fn routes_bind_to_the_controller() {
        let controller = ControllerRef::of::<Pages>();
        let bound = controller.bind(Arc::new(Pages)).unwrap();
        assert_eq!(bound.namespace, "/pages");
        assert_eq!(bound.routes.len(), 2);
        assert_eq!(bound.routes[1].bindings[0], (Method::GET, ":slug".to_string()));
    }

    #[test]
    fn routes_without_handler_are_rejected() {
        let definition = ControllerDefinition::<Pages>::new("pages").route(RouteDefinition::new("broken").get("/"));
        let err = definition.bind(Arc::new(Pages)).err().unwrap();
        assert!(err.to_string().contains("has no handler"), "{err}");
    }

    #[test]
    fn route_metadata_joins_namespace() {
        let route = RouteMetadata::new(
            "show",
            "Pages",
            ModuleId::of::<Site>(),
            "pages",
            Method::GET,
            ":slug/",
            None,
        )
        .unwrap();

        assert_eq!(route.full_path(), "/pages/:slug");
        assert_eq!(route.path(), "/:slug");
        assert_eq!(route.axum_path(), "/pages/{slug}");
        assert_eq!(route.relative_path("/pages/hello"), Some("/hello"));
        assert_eq!(route.relative_path("/pagesx/hello"), None);
        assert_eq!(route.to_string(), "GET /pages/:slug");
    }
}
