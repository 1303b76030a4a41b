use crate::di::{Container, Token};
use std::sync::Arc;

/// Builder for the container the framework itself populates.
///
/// Everything registered here is a framework token: visible to every module
/// without an import.
///
/// # Example
/// ```rust,ignore
/// let builder = ContainerBuilder::new()
///     .register(AppConfig::default())
///     .register_trait::<dyn ViewRenderer>(Arc::new(TeraRenderer::new()));
/// let tokens = builder.tokens();
/// let container = builder.build();
/// ```
pub struct ContainerBuilder {
    container: Container,
    tokens: Vec<Token>,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            container: Container::new(),
            tokens: Vec::new(),
        }
    }

    /// Register a service instance under its type token
    pub fn register<T: Send + Sync + 'static>(self, instance: T) -> Self {
        self.register_arc(Arc::new(instance))
    }

    /// Register a shared service instance under its type token
    pub fn register_arc<T: Send + Sync + 'static>(mut self, instance: Arc<T>) -> Self {
        let token = Token::of::<T>();
        self.container.set_instance(token.clone(), instance);
        self.tokens.push(token);
        self
    }

    /// Register a trait object under the `dyn Trait` token
    ///
    /// The value is stored as `Arc<dyn Trait>` so dependents resolve it with
    /// `Dependencies::take_trait`.
    pub fn register_trait<Trait: ?Sized + Send + Sync + 'static>(mut self, instance: Arc<Trait>) -> Self {
        let token = Token::of::<Trait>();
        self.container.set_instance(token.clone(), Arc::new(instance));
        self.tokens.push(token);
        self
    }

    /// Tokens registered so far
    pub fn tokens(&self) -> Vec<Token> {
        self.tokens.clone()
    }

    /// Build the container
    pub fn build(self) -> Container {
        self.container
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
