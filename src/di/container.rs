use crate::di::{Scope, Token};
use crate::error::{PressmeshError, Result};
use dashmap::DashMap;
use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;

/// A type-erased resolved value.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Builds an instance; receives the container so it can resolve its own
/// dependencies.
pub type FactoryFn = Arc<dyn Fn(&Container) -> Result<Instance> + Send + Sync>;

thread_local! {
    // Tokens currently being materialised on this thread.
    static RESOLVING: RefCell<Vec<Token>> = const { RefCell::new(Vec::new()) };
}

#[derive(Clone)]
struct Binding {
    factory: FactoryFn,
    scope: Scope,
}

/// Thread-safe dependency injection container.
///
/// Bindings are written during boot. Singletons materialise lazily on the
/// first `get` and are cached; `make` always invokes the factory.
pub struct Container {
    bindings: DashMap<Token, Binding>,
    singletons: DashMap<Token, Instance>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
            singletons: DashMap::new(),
        }
    }

    /// Register a lazy singleton factory.
    pub fn set(&self, token: Token, factory: FactoryFn) -> &Self {
        self.bind(token, Scope::Singleton, factory)
    }

    /// Register a factory with an explicit lifetime.
    pub fn bind(&self, token: Token, scope: Scope, factory: FactoryFn) -> &Self {
        if self.bindings.contains_key(&token) {
            tracing::warn!(%token, "overriding existing container binding");
        }
        self.singletons.remove(&token);
        self.bindings.insert(token, Binding { factory, scope });
        self
    }

    /// Register an already-built singleton.
    pub fn set_instance(&self, token: Token, instance: Instance) -> &Self {
        let cached = instance.clone();
        self.bindings.insert(
            token.clone(),
            Binding {
                factory: Arc::new(move |_| Ok(cached.clone())),
                scope: Scope::Singleton,
            },
        );
        self.singletons.insert(token, instance);
        self
    }

    /// Materialise (once) and return the singleton for `token`.
    pub fn get(&self, token: &Token) -> Result<Instance> {
        if let Some(instance) = self.singletons.get(token) {
            return Ok(instance.clone());
        }
        // The factory may resolve other tokens, so no map guard is held
        // while it runs.
        let binding = self.binding(token)?;
        let instance = self.invoke(token, &binding)?;
        Ok(self
            .singletons
            .entry(token.clone())
            .or_insert(instance)
            .clone())
    }

    /// Build a fresh instance for `token`, never caching it.
    pub fn make(&self, token: &Token) -> Result<Instance> {
        let binding = self.binding(token)?;
        self.invoke(token, &binding)
    }

    /// `get` for singletons, `make` for transients.
    pub fn resolve(&self, token: &Token) -> Result<Instance> {
        match self.scope_of(token) {
            Some(Scope::Transient) => self.make(token),
            Some(Scope::Singleton) => self.get(token),
            None => Err(PressmeshError::DependencyNotFound {
                token: token.to_string(),
            }),
        }
    }

    /// Resolve and downcast to a concrete type.
    pub fn resolve_as<T: Send + Sync + 'static>(&self, token: &Token) -> Result<Arc<T>> {
        self.resolve(token)?
            .downcast::<T>()
            .map_err(|_| PressmeshError::DowncastFailed {
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn scope_of(&self, token: &Token) -> Option<Scope> {
        self.bindings.get(token).map(|binding| binding.scope)
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.bindings.contains_key(token)
    }

    /// Whether the singleton for `token` has already been built.
    pub fn is_materialized(&self, token: &Token) -> bool {
        self.singletons.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn binding(&self, token: &Token) -> Result<Binding> {
        self.bindings
            .get(token)
            .map(|binding| binding.clone())
            .ok_or_else(|| PressmeshError::DependencyNotFound {
                token: token.to_string(),
            })
    }

    fn invoke(&self, token: &Token, binding: &Binding) -> Result<Instance> {
        let cycle = RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(token) {
                let mut chain: Vec<String> = stack.iter().map(|t| t.short_name().to_string()).collect();
                chain.push(token.short_name().to_string());
                Some(chain.join(" -> "))
            } else {
                stack.push(token.clone());
                None
            }
        });
        if let Some(cycle) = cycle {
            return Err(PressmeshError::CircularDependency { cycle });
        }

        let _frame = ResolvingFrame;
        (binding.factory)(self)
    }
}

/// Pops the token pushed by `invoke`, also when the factory unwinds.
struct ResolvingFrame;

impl Drop for ResolvingFrame {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}
