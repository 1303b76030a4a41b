//! Module lifecycle hook trait

use crate::middleware::MiddlewareConsumer;
use crate::module::ResolvedModule;
use async_trait::async_trait;

/// Opt-in callbacks of a module class.
///
/// Enabled with `#[module(..., lifecycle)]`, or by overriding
/// [`Module::lifecycle`](crate::module::Module::lifecycle).
///
/// # Example
///
/// ```rust,ignore
/// #[module(providers = [PostService], lifecycle)]
/// #[derive(Default)]
/// pub struct PostModule;
///
/// #[async_trait]
/// impl ModuleLifecycle for PostModule {
///     fn configure(&self, consumer: &mut MiddlewareConsumer) {
///         consumer
///             .apply([Provided::<dyn Middleware>::of::<NonceMiddleware>()])
///             .for_routes([RouteRule::from("/posts").method(Method::POST)]);
///     }
///
///     async fn on_module_init(&self, module: &ResolvedModule) -> anyhow::Result<()> {
///         tracing::info!("{} ready", module.name());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ModuleLifecycle: Send + Sync {
    /// Register middleware for this module's routes
    fn configure(&self, _consumer: &mut MiddlewareConsumer) {}

    /// Called once the providers of every module are instantiated
    ///
    /// Imported modules are initialized before the modules importing them.
    async fn on_module_init(&self, _module: &ResolvedModule) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on shutdown, in reverse initialization order
    async fn on_module_destroy(&self, _module: &ResolvedModule) -> anyhow::Result<()> {
        Ok(())
    }
}
