use crate::context::{ExecutionContext, HookContext};
use crate::di::{Container, DependencyResolver, Provided};
use crate::error::Result;
use crate::exception::{ExceptionFilter, ExceptionHandler, HttpException, Thrown};
use crate::guard::Guard;
use crate::hooks::{BoundHandler, BoundHook, Check, Halt, HookCallback, HookDispatcher, HookMetadata};
use crate::module::ResolvedModule;
use serde_json::Value;
use std::sync::Arc;

/// One hook handler with its guards, checks and filters resolved.
pub struct HookPipeline {
    metadata: HookMetadata,
    guards: Vec<Arc<dyn Guard>>,
    filters: Vec<Arc<dyn ExceptionFilter>>,
    checks: Vec<Arc<dyn Check>>,
    default_arg: usize,
    handler: BoundHandler,
    exceptions: Arc<ExceptionHandler>,
}

impl HookPipeline {
    pub fn compile(
        hook: BoundHook,
        resolver: &DependencyResolver,
        container: &Container,
        module: &ResolvedModule,
        exceptions: Arc<ExceptionHandler>,
    ) -> Result<Self> {
        Ok(Self {
            guards: Provided::resolve_all(&hook.guards, resolver, container, module)?,
            filters: Provided::resolve_all(&hook.filters, resolver, container, module)?,
            checks: Provided::resolve_all(&hook.checks, resolver, container, module)?,
            metadata: hook.metadata,
            default_arg: hook.default_arg,
            handler: hook.handler,
            exceptions,
        })
    }

    pub fn metadata(&self) -> &HookMetadata {
        &self.metadata
    }

    /// Run the handler for one host invocation.
    ///
    /// The hook context and scoped filters stay registered until any failure
    /// has been handled, so filters see the failing hook.
    pub async fn invoke(&self, ctx: &ExecutionContext, args: Vec<Value>) -> std::result::Result<Value, Halt> {
        ctx.push_hook(HookContext::new(self.metadata.clone(), args.clone()));
        let mark = ctx.push_filters(self.filters.iter().cloned());

        let result = match self.run(ctx, args).await {
            Ok(value) => Ok(value),
            Err(thrown) => Err(Halt(self.exceptions.handle(ctx, thrown))),
        };

        ctx.truncate_filters(mark);
        ctx.pop_hook();
        result
    }

    async fn run(&self, ctx: &ExecutionContext, args: Vec<Value>) -> std::result::Result<Value, Thrown> {
        for guard in &self.guards {
            if !guard.can_activate(ctx).await? {
                tracing::debug!(guard = guard.name(), hook = self.metadata.name(), "guard denied hook");
                return Err(HttpException::unauthorized("Unauthorized").into());
            }
        }

        for check in &self.checks {
            if !check.check(ctx).await {
                tracing::debug!(check = check.name(), hook = self.metadata.name(), "check failed, passing through");
                return args.get(self.default_arg).cloned().ok_or_else(|| {
                    HttpException::internal(format!(
                        "Hook check fallback argument {} out of range ({} arguments)",
                        self.default_arg,
                        args.len()
                    ))
                    .into()
                });
            }
        }

        (self.handler)(ctx.clone(), args).await
    }
}

/// Registers the hook handlers of every subscriber provider.
pub struct HooksRegistrar {
    dispatcher: Arc<HookDispatcher>,
    exceptions: Arc<ExceptionHandler>,
}

impl HooksRegistrar {
    pub fn new(dispatcher: Arc<HookDispatcher>, exceptions: Arc<ExceptionHandler>) -> Self {
        Self { dispatcher, exceptions }
    }

    /// Bind and register every declared hook, returning how many were added.
    pub fn register(&self, resolver: &DependencyResolver, container: &Container) -> Result<usize> {
        let mut count = 0;
        for module in resolver.registry().modules() {
            for definition in module.providers() {
                let Some(binder) = definition.hooks() else {
                    continue;
                };
                let subscriber = container.resolve(definition.token())?;
                for hook in binder(subscriber)? {
                    let pipeline =
                        HookPipeline::compile(hook, resolver, container, module, Arc::clone(&self.exceptions))?;
                    let metadata = pipeline.metadata().clone();
                    tracing::debug!(
                        hook = metadata.name(),
                        kind = %metadata.kind(),
                        priority = metadata.priority(),
                        class = metadata.class(),
                        method = metadata.method(),
                        "registering hook"
                    );

                    let pipeline = Arc::new(pipeline);
                    let callback: HookCallback = Arc::new(move |ctx, args| {
                        let pipeline = Arc::clone(&pipeline);
                        Box::pin(async move { pipeline.invoke(&ctx, args).await })
                    });
                    self.dispatcher
                        .add(metadata.kind(), metadata.name(), metadata.priority(), callback);
                    count += 1;
                }
            }
        }

        tracing::info!("Registered {} hooks", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::guard::GuardResult;
    use crate::hooks::{HookDefinition, HookKind};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Mutex;

    struct Deny;

    #[async_trait]
    impl Guard for Deny {
        async fn can_activate(&self, _ctx: &ExecutionContext) -> GuardResult {
            Ok(false)
        }
    }

    struct Never;

    #[async_trait]
    impl Check for Never {
        async fn check(&self, _ctx: &ExecutionContext) -> bool {
            false
        }
    }

    struct Titles {
        seen_depth: Mutex<Vec<usize>>,
    }

    fn pipeline(hook: BoundHook) -> HookPipeline {
        HookPipeline {
            guards: hook.guards.iter().filter_map(instance).collect(),
            filters: Vec::new(),
            checks: hook.checks.iter().filter_map(instance).collect(),
            metadata: hook.metadata,
            default_arg: hook.default_arg,
            handler: hook.handler,
            exceptions: Arc::new(ExceptionHandler::new(Vec::new(), Arc::new(AppConfig::default()))),
        }
    }

    fn instance<T: ?Sized>(provided: &Provided<T>) -> Option<Arc<T>> {
        match provided {
            Provided::Instance(instance) => Some(Arc::clone(instance)),
            Provided::Reference { .. } => None,
        }
    }

    fn bind(definition: HookDefinition<Titles>) -> BoundHook {
        let titles = Arc::new(Titles {
            seen_depth: Mutex::new(Vec::new()),
        });
        definition.bind(&titles).unwrap()
    }

    fn upper() -> HookDefinition<Titles> {
        HookDefinition::filter("the_title", "upper").handler(|this: Arc<Titles>, ctx: ExecutionContext, args| async move {
            this.seen_depth.lock().unwrap().push(ctx.hook_depth());
            Ok(args[0].as_str().unwrap_or_default().to_uppercase())
        })
    }

    #[tokio::test]
    async fn handler_runs_inside_a_hook_context() {
        let hook = bind(upper());
        assert_eq!(hook.metadata.kind(), HookKind::Filter);
        let pipeline = pipeline(hook);
        let ctx = ExecutionContext::new();

        let value = pipeline.invoke(&ctx, vec![json!("hello")]).await.unwrap();
        assert_eq!(value, json!("HELLO"));
        assert_eq!(ctx.hook_depth(), 0);
        assert!(ctx.scoped_filters().is_empty());
    }

    #[tokio::test]
    async fn failed_check_returns_the_selected_argument() {
        let pipeline = pipeline(bind(upper().checks(vec![Provided::<dyn Check>::instance(Never)], 1)));

        let value = pipeline
            .invoke(&ExecutionContext::new(), vec![json!("hello"), json!("fallback")])
            .await
            .unwrap();
        assert_eq!(value, json!("fallback"));
    }

    #[tokio::test]
    async fn out_of_range_check_argument_is_an_error() {
        let pipeline = pipeline(bind(upper().checks(vec![Provided::<dyn Check>::instance(Never)], 3)));

        let halt = pipeline
            .invoke(&ExecutionContext::new(), vec![json!("hello")])
            .await
            .err()
            .unwrap();
        assert_eq!(halt.0.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn denied_guard_is_unauthorized() {
        let pipeline = pipeline(bind(upper().guard(Provided::<dyn Guard>::instance(Deny))));
        let ctx = ExecutionContext::new();

        let halt = pipeline.invoke(&ctx, vec![json!("hello")]).await.err().unwrap();
        assert_eq!(halt.0.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.hook_depth(), 0);
    }
}
