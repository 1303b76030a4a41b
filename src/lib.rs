//! # Pressmesh
//!
//! Module resolution, dependency injection and request pipelines for Rust
//! applications hosted by a CMS.
//!
//! Applications are declared as a graph of modules. Booting the root module
//! discovers and validates the graph, instantiates every provider through a
//! scope-aware container, and compiles controllers and hook subscribers into
//! two pipelines:
//!
//! - **HTTP**: middleware → guards → parameter binding → interceptors →
//!   handler → optional view, with exception filters as the single recovery
//!   point. Served through axum or driven directly by the host.
//! - **Hooks**: named actions and filters with guards, checks and exception
//!   filters, dispatched by priority.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pressmesh::prelude::*;
//!
//! #[derive(Injectable)]
//! pub struct PostService;
//!
//! impl PostService {
//!     pub fn find(&self, id: i64) -> serde_json::Value {
//!         serde_json::json!({ "id": id })
//!     }
//! }
//!
//! #[derive(Injectable)]
//! pub struct PostController {
//!     posts: Arc<PostService>,
//! }
//!
//! impl Controller for PostController {
//!     fn definition() -> ControllerDefinition<Self> {
//!         ControllerDefinition::new("posts").route(
//!             RouteDefinition::new("show")
//!                 .get("/:id")
//!                 .param(Param::path("id").int())
//!                 .handler(|this: Arc<Self>, _ctx, args| async move {
//!                     Ok(this.posts.find(args.get("id")?))
//!                 }),
//!         )
//!     }
//! }
//!
//! #[module(controllers = [PostController], providers = [PostService])]
//! #[derive(Default)]
//! pub struct AppModule;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = Application::builder().root::<AppModule>().build().await?;
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     app.serve(listener).await
//! }
//! ```

extern crate self as pressmesh;

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod context;
pub mod controller;
pub mod di;
pub mod error;
pub mod exception;
pub mod guard;
pub mod hooks;
pub mod http;
pub mod interceptor;
pub mod kernel;
pub mod lifecycle;
pub mod middleware;
pub mod module;
pub mod pipe;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// Re-export core types
pub use context::ExecutionContext;
pub use di::{Container, ContainerBuilder, Injectable, Provided, Provider, Token};
pub use error::{PressmeshError, Result};
pub use exception::{HttpException, Thrown};
pub use lifecycle::{Application, ApplicationBuilder};
pub use module::Module;

// Re-export macros
pub use pressmesh_macro::{module, Injectable};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use pressmesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{AppConfig, ConfigService};
    pub use crate::context::ExecutionContext;
    pub use crate::controller::{Arguments, Controller, ControllerDefinition, ControllerRef, Param, RouteDefinition, Rule};
    pub use crate::di::{Container, Dependencies, Provided, Provider, Scope, Token};
    pub use crate::error::{PressmeshError, Result};
    pub use crate::exception::{ArgumentsHost, ExceptionFilter, ExceptionKind, HttpException, Thrown};
    pub use crate::guard::{Guard, GuardResult};
    pub use crate::hooks::{Check, HookDefinition, HookSubscriber};
    pub use crate::http::{HttpRequest, HttpResponse, ResponseHandle, ViewRenderer};
    pub use crate::interceptor::{Interceptor, InterceptorResult, LoggingInterceptor, Next};
    pub use crate::lifecycle::{Application, ModuleLifecycle};
    pub use crate::middleware::{Middleware, MiddlewareConsumer, Outcome, RouteRule};
    pub use crate::module::{DynamicModule, Entity, EntityRef, Module, ModuleMetadata, ModuleRef, ResolvedModule};
    pub use crate::pipe::builtins::*;
    pub use crate::pipe::{ArgumentMetadata, Pipe, PipeError, PipeResult};
    pub use crate::{module, Injectable};
    pub use async_trait::async_trait;
    pub use axum::http::{Method, StatusCode};
    pub use std::sync::Arc;
}
