use crate::context::ExecutionContext;
use crate::di::{Injectable, Instance, Provided};
use crate::error::{PressmeshError, Result};
use crate::exception::{ExceptionFilter, Thrown};
use crate::guard::Guard;
use crate::BoxFuture;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use strum_macros::{Display, EnumString};

mod dispatcher;
mod registrar;

pub use dispatcher::{Halt, HookCallback, HookDispatcher};
pub use registrar::{HookPipeline, HooksRegistrar};

/// Host event flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum HookKind {
    /// Fire-and-forget notification; results are discarded.
    Action,
    /// Value pipeline; each callback returns the next value.
    Filter,
}

/// What a hook handler is bound to and who declared it.
#[derive(Debug, Clone, PartialEq)]
pub struct HookMetadata {
    kind: HookKind,
    name: String,
    priority: i32,
    class: &'static str,
    method: &'static str,
}

impl HookMetadata {
    pub fn new(kind: HookKind, name: impl Into<String>, priority: i32, class: &'static str, method: &'static str) -> Self {
        Self {
            kind,
            name: name.into(),
            priority,
            class,
            method,
        }
    }

    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Declaring class.
    pub fn class(&self) -> &'static str {
        self.class
    }

    /// Declaring handler method.
    pub fn method(&self) -> &'static str {
        self.method
    }
}

/// Non-fatal precondition of a hook handler.
///
/// When a check fails the handler is skipped and one of the original call
/// arguments is returned instead, so filter hooks pass their value through.
#[async_trait]
pub trait Check: Send + Sync + 'static {
    async fn check(&self, ctx: &ExecutionContext) -> bool;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub(crate) type HookHandler<T> = Arc<
    dyn Fn(Arc<T>, ExecutionContext, Vec<Value>) -> BoxFuture<'static, std::result::Result<Value, Thrown>>
        + Send
        + Sync,
>;

pub(crate) type BoundHandler =
    Arc<dyn Fn(ExecutionContext, Vec<Value>) -> BoxFuture<'static, std::result::Result<Value, Thrown>> + Send + Sync>;

/// A hook handler declared by a [`HookSubscriber`].
///
/// # Example
/// ```rust,ignore
/// HookDefinition::filter("the_title", "decorate_title")
///     .priority(20)
///     .checks(vec![Provided::<dyn Check>::of::<IsFrontPage>()], 0)
///     .handler(|this: Arc<Self>, _ctx, args| async move {
///         Ok(this.decorate(args[0].as_str().unwrap_or_default()))
///     })
/// ```
pub struct HookDefinition<T> {
    kind: HookKind,
    name: String,
    method: &'static str,
    priority: i32,
    guards: Vec<Provided<dyn Guard>>,
    filters: Vec<Provided<dyn ExceptionFilter>>,
    checks: Vec<Provided<dyn Check>>,
    default_arg: usize,
    handler: Option<HookHandler<T>>,
}

impl<T: Send + Sync + 'static> HookDefinition<T> {
    /// Host default priority.
    pub const DEFAULT_PRIORITY: i32 = 10;

    fn new(kind: HookKind, name: &str, method: &'static str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            method,
            priority: Self::DEFAULT_PRIORITY,
            guards: Vec::new(),
            filters: Vec::new(),
            checks: Vec::new(),
            default_arg: 0,
            handler: None,
        }
    }

    pub fn action(name: &str, method: &'static str) -> Self {
        Self::new(HookKind::Action, name, method)
    }

    pub fn filter(name: &str, method: &'static str) -> Self {
        Self::new(HookKind::Filter, name, method)
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn guard(mut self, guard: Provided<dyn Guard>) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn exception_filter(mut self, filter: Provided<dyn ExceptionFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// On the first failing check return argument `default_arg` unchanged.
    pub fn checks(mut self, checks: Vec<Provided<dyn Check>>, default_arg: usize) -> Self {
        self.checks = checks;
        self.default_arg = default_arg;
        self
    }

    pub fn handler<F, Fut, R>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<T>, ExecutionContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, Thrown>> + Send + 'static,
        R: Serialize,
    {
        let erased: HookHandler<T> = Arc::new(move |subscriber, ctx, args| {
            let result = handler(subscriber, ctx, args);
            Box::pin(async move {
                let value = result.await?;
                serde_json::to_value(value).map_err(Thrown::other)
            })
        });
        self.handler = Some(erased);
        self
    }

    fn bind(self, subscriber: &Arc<T>) -> Result<BoundHook> {
        let class = std::any::type_name::<T>();
        let handler = self.handler.ok_or_else(|| {
            PressmeshError::route_registration(format!("hook `{class}::{}` has no handler", self.method))
        })?;
        let subscriber = Arc::clone(subscriber);

        Ok(BoundHook {
            metadata: HookMetadata::new(self.kind, self.name, self.priority, class, self.method),
            guards: self.guards,
            filters: self.filters,
            checks: self.checks,
            default_arg: self.default_arg,
            handler: Arc::new(move |ctx: ExecutionContext, args: Vec<Value>| handler(Arc::clone(&subscriber), ctx, args)),
        })
    }
}

/// A hook definition with its subscriber instance captured.
#[derive(Clone)]
pub struct BoundHook {
    pub metadata: HookMetadata,
    pub guards: Vec<Provided<dyn Guard>>,
    pub filters: Vec<Provided<dyn ExceptionFilter>>,
    pub checks: Vec<Provided<dyn Check>>,
    pub default_arg: usize,
    pub(crate) handler: BoundHandler,
}

/// A provider class that handles host events.
pub trait HookSubscriber: Injectable {
    fn hooks() -> Vec<HookDefinition<Self>>;
}

/// Binds the hook definitions of a resolved subscriber instance.
pub type HookBinder = fn(Instance) -> Result<Vec<BoundHook>>;

pub fn bind_subscriber<T: HookSubscriber>(instance: Instance) -> Result<Vec<BoundHook>> {
    let subscriber = instance
        .downcast::<T>()
        .map_err(|_| PressmeshError::DowncastFailed {
            type_name: std::any::type_name::<T>().to_string(),
        })?;
    T::hooks().into_iter().map(|hook| hook.bind(&subscriber)).collect()
}
