use crate::context::ExecutionContext;
use crate::hooks::HookKind;
use crate::http::HttpResponse;
use crate::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// A hook pipeline failed; the formatted error response ends the dispatch.
#[derive(Debug, thiserror::Error)]
#[error("hook dispatch halted with status {}", .0.status())]
pub struct Halt(pub HttpResponse);

pub type HookCallback = Arc<dyn Fn(ExecutionContext, Vec<Value>) -> BoxFuture<'static, Result<Value, Halt>> + Send + Sync>;

#[derive(Clone)]
struct Registered {
    kind: HookKind,
    priority: i32,
    seq: u64,
    callback: HookCallback,
}

/// The host's named event table.
///
/// Callbacks run by ascending priority, then in registration order.
#[derive(Default)]
pub struct HookDispatcher {
    table: RwLock<HashMap<String, Vec<Registered>>>,
    seq: AtomicU64,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&self, name: &str, priority: i32, callback: HookCallback) {
        self.add(HookKind::Action, name, priority, callback);
    }

    pub fn add_filter(&self, name: &str, priority: i32, callback: HookCallback) {
        self.add(HookKind::Filter, name, priority, callback);
    }

    pub fn add(&self, kind: HookKind, name: &str, priority: i32, callback: HookCallback) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let callbacks = table.entry(name.to_string()).or_default();
        callbacks.push(Registered {
            kind,
            priority,
            seq,
            callback,
        });
        callbacks.sort_by_key(|registered| (registered.priority, registered.seq));
    }

    pub fn has(&self, name: &str) -> bool {
        self.count(name) > 0
    }

    pub fn count(&self, name: &str) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Run every action callback of `name` with `args`.
    pub async fn do_action(&self, ctx: &ExecutionContext, name: &str, args: Vec<Value>) -> Result<(), Halt> {
        for registered in self.snapshot(name, HookKind::Action) {
            (registered.callback)(ctx.clone(), args.clone()).await?;
        }
        Ok(())
    }

    /// Thread `value` through every filter callback of `name`.
    ///
    /// Each callback receives the running value followed by `extra`.
    pub async fn apply_filters(
        &self,
        ctx: &ExecutionContext,
        name: &str,
        mut value: Value,
        extra: Vec<Value>,
    ) -> Result<Value, Halt> {
        for registered in self.snapshot(name, HookKind::Filter) {
            let mut args = Vec::with_capacity(extra.len() + 1);
            args.push(value);
            args.extend(extra.iter().cloned());
            value = (registered.callback)(ctx.clone(), args).await?;
        }
        Ok(value)
    }

    fn snapshot(&self, name: &str, kind: HookKind) -> Vec<Registered> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let callbacks: Vec<Registered> = table
            .get(name)
            .map(|callbacks| callbacks.iter().filter(|r| r.kind == kind).cloned().collect())
            .unwrap_or_default();
        tracing::trace!(hook = name, %kind, callbacks = callbacks.len(), "dispatching hook");
        callbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Mutex;

    fn append(suffix: &'static str) -> HookCallback {
        Arc::new(move |_ctx, args| {
            Box::pin(async move {
                let value = args[0].as_str().unwrap_or_default().to_string();
                Ok(Value::String(value + suffix))
            })
        })
    }

    #[tokio::test]
    async fn filters_run_by_priority_then_registration() {
        let dispatcher = HookDispatcher::new();
        dispatcher.add_filter("the_title", 20, append("-late"));
        dispatcher.add_filter("the_title", 10, append("-first"));
        dispatcher.add_filter("the_title", 10, append("-second"));

        let value = dispatcher
            .apply_filters(&ExecutionContext::new(), "the_title", json!("t"), Vec::new())
            .await
            .unwrap();
        assert_eq!(value, json!("t-first-second-late"));
        assert_eq!(dispatcher.count("the_title"), 3);
        assert!(!dispatcher.has("the_content"));
    }

    #[tokio::test]
    async fn actions_receive_arguments() {
        let dispatcher = HookDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher.add_action(
            "save_post",
            10,
            Arc::new(move |_ctx, args| {
                sink.lock().unwrap().extend(args);
                Box::pin(async { Ok(Value::Null) })
            }),
        );

        dispatcher
            .do_action(&ExecutionContext::new(), "save_post", vec![json!(7)])
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![json!(7)]);
    }

    #[tokio::test]
    async fn halt_stops_dispatch() {
        let dispatcher = HookDispatcher::new();
        dispatcher.add_filter(
            "the_title",
            1,
            Arc::new(|_ctx, _args| Box::pin(async { Err(Halt(HttpResponse::new(StatusCode::UNAUTHORIZED))) })),
        );
        dispatcher.add_filter("the_title", 2, append("-never"));

        let halt = dispatcher
            .apply_filters(&ExecutionContext::new(), "the_title", json!("t"), Vec::new())
            .await
            .err()
            .unwrap();
        assert_eq!(halt.0.status(), StatusCode::UNAUTHORIZED);
    }
}
