use crate::context::ExecutionContext;
use crate::exception::Thrown;
use crate::BoxFuture;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

mod logging;

pub use logging::LoggingInterceptor;

/// standard return type for Interceptors
pub type InterceptorResult = Result<Value, Thrown>;

/// The innermost call wrapped by an interceptor chain
pub trait CallHandler: Send + Sync {
    fn handle(&self, ctx: ExecutionContext) -> BoxFuture<'_, InterceptorResult>;
}

enum Link {
    Handler,
    Interceptor {
        interceptor: Arc<dyn Interceptor>,
        next: Box<Link>,
    },
}

/// Represents the rest of the chain
pub struct Next<'a> {
    link: &'a Link,
    handler: &'a dyn CallHandler,
}

impl<'a> Next<'a> {
    /// Execute the next handler
    pub fn run(self, ctx: &'a ExecutionContext) -> BoxFuture<'a, InterceptorResult> {
        match self.link {
            Link::Handler => self.handler.handle(ctx.clone()),
            Link::Interceptor { interceptor, next } => interceptor.intercept(
                ctx,
                Next {
                    link: next,
                    handler: self.handler,
                },
            ),
        }
    }
}

/// The Interceptor trait
///
/// Interceptors run logic before and after the rest of the chain, may
/// replace its result, or return without calling `next` at all.
///
/// # Example
/// ```rust,ignore
/// struct Doubling;
///
/// #[async_trait]
/// impl Interceptor for Doubling {
///     async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> InterceptorResult {
///         let value = next.run(ctx).await?;
///         Ok(json!(value.as_i64().unwrap_or_default() * 2))
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> InterceptorResult;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Interceptors linked outermost first, ending at the handler.
pub struct InterceptorChain {
    head: Link,
    len: usize,
}

impl InterceptorChain {
    /// Fold right-to-left so the first interceptor becomes the outermost.
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        let len = interceptors.len();
        let head = interceptors
            .into_iter()
            .rev()
            .fold(Link::Handler, |next, interceptor| Link::Interceptor {
                interceptor,
                next: Box::new(next),
            });
        Self { head, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Interceptor names from outermost to innermost.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(self.len);
        let mut link = &self.head;
        while let Link::Interceptor { interceptor, next } = link {
            names.push(interceptor.name());
            link = &**next;
        }
        names
    }

    pub async fn run(&self, ctx: &ExecutionContext, handler: &dyn CallHandler) -> InterceptorResult {
        Next {
            link: &self.head,
            handler,
        }
        .run(ctx)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::HttpException;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recording {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Interceptor for Recording {
        async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> InterceptorResult {
            self.log.lock().unwrap().push(format!("{} before", self.label));
            let result = next.run(ctx).await;
            self.log.lock().unwrap().push(format!("{} after", self.label));
            result
        }

        fn name(&self) -> &'static str {
            self.label
        }
    }

    struct Doubling;

    #[async_trait]
    impl Interceptor for Doubling {
        async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> InterceptorResult {
            let value = next.run(ctx).await?;
            Ok(json!(value.as_i64().unwrap_or_default() * 2))
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Interceptor for ShortCircuit {
        async fn intercept(&self, _ctx: &ExecutionContext, _next: Next<'_>) -> InterceptorResult {
            Err(HttpException::forbidden("stop").into())
        }
    }

    struct Returns(Value, Arc<Mutex<Vec<String>>>);

    impl CallHandler for Returns {
        fn handle(&self, _ctx: ExecutionContext) -> BoxFuture<'_, InterceptorResult> {
            Box::pin(async move {
                self.1.lock().unwrap().push("handler".to_string());
                Ok(self.0.clone())
            })
        }
    }

    #[tokio::test]
    async fn first_interceptor_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new(vec![
            Arc::new(Recording { label: "global", log: log.clone() }),
            Arc::new(Recording { label: "method", log: log.clone() }),
        ]);
        assert_eq!(chain.names(), vec!["global", "method"]);

        let result = chain
            .run(&ExecutionContext::new(), &Returns(json!("ok"), log.clone()))
            .await
            .unwrap();
        assert_eq!(result, json!("ok"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["global before", "method before", "handler", "method after", "global after"]
        );
    }

    #[tokio::test]
    async fn interceptors_can_rewrite_results() {
        let chain = InterceptorChain::new(vec![Arc::new(Doubling)]);
        let log = Arc::new(Mutex::new(Vec::new()));
        let result = chain.run(&ExecutionContext::new(), &Returns(json!(21), log)).await.unwrap();
        assert_eq!(result, json!(42));
    }

    #[tokio::test]
    async fn interceptors_can_skip_the_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new(vec![Arc::new(ShortCircuit)]);
        let result = chain.run(&ExecutionContext::new(), &Returns(json!(1), log.clone())).await;
        assert!(matches!(result, Err(Thrown::Http(_))));
        assert!(log.lock().unwrap().is_empty());
    }
}
