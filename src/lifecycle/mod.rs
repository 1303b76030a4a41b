//! Application Lifecycle Module
//!
//! Boots an application from its root module and tears it down again.
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Module discovery and validation
//!    ↓
//! 2. Provider and controller registration
//!    ↓
//! 3. Singleton instantiation          ← Injectable::on_module_init
//!    ↓
//! 4. Module init (imports first)      ← ModuleLifecycle::on_module_init
//!    ↓
//! 5. Exception handler, middleware, routes and hooks compiled
//!    ↓
//! [Serving...]
//!    ↓
//! 6. Shutdown signal (SIGTERM/SIGINT)
//!    ↓
//! 7. Module destroy (reverse order)   ← ModuleLifecycle::on_module_destroy
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pressmesh::lifecycle::Application;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = Application::builder()
//!         .root::<AppModule>()
//!         .global_interceptor(Provided::<dyn Interceptor>::of::<LoggingInterceptor>())
//!         .build()
//!         .await?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     app.serve(listener).await
//! }
//! ```

mod application;
mod manager;
mod shutdown;
mod traits;

pub use application::{Application, ApplicationBuilder};
pub use manager::LifecycleManager;
pub use shutdown::shutdown_signal;
pub use traits::ModuleLifecycle;
