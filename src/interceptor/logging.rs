use crate::context::ExecutionContext;
use crate::di::{Dependencies, Injectable};
use crate::interceptor::{Interceptor, InterceptorResult, Next};
use async_trait::async_trait;
use std::time::Instant;

/// An interceptor that logs handler timing and outcome
#[derive(Clone, Default)]
pub struct LoggingInterceptor;

impl Injectable for LoggingInterceptor {
    fn construct(_: &mut Dependencies) -> crate::Result<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> InterceptorResult {
        let target = match (ctx.route(), ctx.current_hook()) {
            (Some(route), _) => format!("{} {}", route.method(), route.full_path()),
            (None, Some(hook)) => format!("hook {}", hook.metadata().name()),
            (None, None) => "call".to_string(),
        };
        let start = Instant::now();

        tracing::info!("--> {}", target);

        match next.run(ctx).await {
            Ok(value) => {
                tracing::info!("<-- {} {:?}", target, start.elapsed());
                Ok(value)
            }
            Err(e) => {
                tracing::info!("<-- {} ERROR: {} {:?}", target, e, start.elapsed());
                Err(e)
            }
        }
    }
}
