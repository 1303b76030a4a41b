//! Application Bootstrap
//!
//! Provides a high-level API for booting pressmesh applications from a root
//! module with integrated lifecycle management.

use super::{shutdown_signal, LifecycleManager};
use crate::config::{AppConfig, ConfigService};
use crate::context::ExecutionContext;
use crate::controller::{Concerns, ParameterBinder, ResolvedConcerns};
use crate::di::{Container, ContainerBuilder, DependencyResolver, Provided, Token};
use crate::error::{PressmeshError, Result};
use crate::exception::{ExceptionFilter, ExceptionHandler};
use crate::guard::Guard;
use crate::hooks::{Halt, HookDispatcher, HooksRegistrar};
use crate::http::{build_router, HttpRequest, HttpResponse, ViewRenderer};
use crate::interceptor::Interceptor;
use crate::kernel::HttpKernel;
use crate::middleware::MiddlewareConsumer;
use crate::module::{DiscoveryService, Module, ModuleRef, ModuleRegistry};
use crate::pipe::Pipe;
use serde_json::Value;
use std::sync::Arc;

/// A booted application
///
/// Holds the container, the module registry, the compiled request pipeline
/// and the hook table.
///
/// # Example
///
/// ```rust,ignore
/// let app = Application::builder()
///     .root::<AppModule>()
///     .config(AppConfig::from_env()?)
///     .build()
///     .await?;
///
/// let response = app.handle(HttpRequest::get("/posts")).await;
/// let title = app.apply_filters("the_title", json!("Hello"), vec![]).await?;
///
/// app.shutdown().await;
/// ```
pub struct Application {
    container: Arc<Container>,
    registry: Arc<ModuleRegistry>,
    kernel: Arc<HttpKernel>,
    hooks: Arc<HookDispatcher>,
    config: Arc<AppConfig>,
    lifecycle_manager: Arc<LifecycleManager>,
}

impl Application {
    /// Create a new application builder
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn kernel(&self) -> &Arc<HttpKernel> {
        &self.kernel
    }

    pub fn hooks(&self) -> &Arc<HookDispatcher> {
        &self.hooks
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn lifecycle_manager(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle_manager
    }

    /// Resolve a provider by its type token
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.container.resolve_as::<T>(&Token::of::<T>())
    }

    /// Route and run one request through the pipeline
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        self.kernel.handle(request).await
    }

    /// The compiled routes mounted on an axum router
    pub fn router(&self) -> axum::Router {
        build_router(Arc::clone(&self.kernel), self.config.max_body_bytes)
    }

    /// Fire an action hook outside any request
    pub async fn do_action(&self, name: &str, args: Vec<Value>) -> std::result::Result<(), Halt> {
        self.hooks.do_action(&ExecutionContext::new(), name, args).await
    }

    /// Apply a filter hook outside any request
    pub async fn apply_filters(&self, name: &str, value: Value, extra: Vec<Value>) -> std::result::Result<Value, Halt> {
        self.hooks
            .apply_filters(&ExecutionContext::new(), name, value, extra)
            .await
    }

    /// Serve the router until a shutdown signal, then shut down
    pub async fn serve(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        tracing::info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        self.shutdown().await;
        Ok(())
    }

    /// Perform graceful shutdown
    ///
    /// This will call the module destroy hooks.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application...");
        self.lifecycle_manager.call_module_destroy().await;
        tracing::info!("Application shutdown complete");
    }
}

/// Builder for Application
pub struct ApplicationBuilder {
    root: Option<ModuleRef>,
    config: Option<AppConfig>,
    globals: Concerns,
    renderer: Option<Arc<dyn ViewRenderer>>,
    hooks: Option<Arc<HookDispatcher>>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    /// Create a new application builder
    pub fn new() -> Self {
        Self {
            root: None,
            config: None,
            globals: Concerns::default(),
            renderer: None,
            hooks: None,
        }
    }

    /// Set the root module class
    pub fn root<M: Module + Default>(self) -> Self {
        self.root_module(ModuleRef::of::<M>())
    }

    /// Set the root module, e.g. a dynamic module
    pub fn root_module(mut self, module: impl Into<ModuleRef>) -> Self {
        self.root = Some(module.into());
        self
    }

    /// Framework settings; read from the environment when not set
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn global_guard(mut self, guard: Provided<dyn Guard>) -> Self {
        self.globals.guards.push(guard);
        self
    }

    pub fn global_interceptor(mut self, interceptor: Provided<dyn Interceptor>) -> Self {
        self.globals.interceptors.push(interceptor);
        self
    }

    pub fn global_pipe(mut self, pipe: Provided<dyn Pipe>) -> Self {
        self.globals.pipes.push(pipe);
        self
    }

    pub fn global_filter(mut self, filter: Provided<dyn ExceptionFilter>) -> Self {
        self.globals.filters.push(filter);
        self
    }

    pub fn view_renderer(mut self, renderer: impl ViewRenderer) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Share an existing hook table instead of creating one
    pub fn hook_dispatcher(mut self, hooks: Arc<HookDispatcher>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Build and initialize the application
    ///
    /// This will:
    /// 1. Discover and validate the module graph
    /// 2. Register every provider and controller, then instantiate singletons
    /// 3. Call module init hooks
    /// 4. Compile the exception handler, middleware, routes and hooks
    ///
    /// # Errors
    ///
    /// Returns the first boot failure; nothing is served in that case.
    pub async fn build(self) -> Result<Application> {
        let root = self
            .root
            .ok_or_else(|| PressmeshError::Config("no root module configured".into()))?;
        let config_service = Arc::new(ConfigService::new());
        let config = Arc::new(match self.config {
            Some(config) => config,
            None => AppConfig::from_service(&config_service)?,
        });
        let hooks = self.hooks.unwrap_or_default();

        tracing::info!("Starting application initialization...");

        let registry = Arc::new(DiscoveryService::new().discover_modules(root)?);

        let builder = ContainerBuilder::new()
            .register_arc(Arc::clone(&config))
            .register_arc(config_service)
            .register_arc(Arc::clone(&hooks))
            .register_arc(Arc::clone(&registry));
        let framework = builder.tokens();
        let container = Arc::new(builder.build());

        let resolver = DependencyResolver::new(Arc::clone(&registry), framework);
        resolver.register_providers(&container)?;
        resolver.instantiate_all(&container)?;

        let lifecycle_manager = Arc::new(LifecycleManager::new(Arc::clone(&registry)));
        lifecycle_manager.call_module_init().await?;

        let root = registry
            .root()
            .ok_or_else(|| PressmeshError::Internal("module registry is empty".into()))?;
        let mut globals = ResolvedConcerns::resolve(&self.globals, &resolver, &container, root)?;
        let exceptions = Arc::new(ExceptionHandler::new(
            std::mem::take(&mut globals.filters),
            Arc::clone(&config),
        ));

        let mut kernel = HttpKernel::new(globals, Arc::clone(&exceptions), ParameterBinder::new(config.cast_parameters));
        kernel.set_renderer(self.renderer);

        for module in registry.modules() {
            let Some(lifecycle) = module.lifecycle() else {
                continue;
            };
            let mut consumer = MiddlewareConsumer::new();
            lifecycle.configure(&mut consumer);
            for registration in consumer.registrations() {
                kernel.register_middleware(registration, &resolver, &container, module)?;
            }
        }

        let mut routes = 0;
        for module in registry.modules() {
            for controller in module.controllers() {
                let instance = container.resolve(controller.token())?;
                routes += kernel.register_controller(controller.bind(instance)?, &resolver, &container, module)?;
            }
        }
        tracing::info!("Compiled {} routes", routes);

        HooksRegistrar::new(Arc::clone(&hooks), exceptions).register(&resolver, &container)?;

        tracing::info!("Application initialization complete");

        Ok(Application {
            container,
            registry,
            kernel: Arc::new(kernel),
            hooks,
            config,
            lifecycle_manager,
        })
    }
}
