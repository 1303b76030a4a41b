use crate::di::{Instance, Token};
use crate::error::{PressmeshError, Result};
use crate::module::ResolvedModule;
use std::collections::VecDeque;
use std::sync::Arc;

/// Trait for types the resolver can construct.
///
/// This trait is typically implemented automatically via the `#[derive(Injectable)]` macro.
///
/// # Example
/// ```rust,ignore
/// use pressmesh::Injectable;
/// use std::sync::Arc;
///
/// trait UserRepository: Send + Sync {}
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     // Resolved by the `dyn UserRepository` type token
///     repository: Arc<dyn UserRepository>,
///     // Resolved by an explicit string token
///     #[inject(token = "config.table_prefix")]
///     prefix: Arc<String>,
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructor dependency tokens, in the order `construct` takes them.
    fn dependencies() -> Vec<Token> {
        Vec::new()
    }

    /// Build an instance from resolved dependencies.
    ///
    /// # Errors
    /// Returns an error if a dependency is missing or has an unexpected type.
    fn construct(dependencies: &mut Dependencies) -> Result<Self>;

    /// Called once, right after construction, with the module that owns the
    /// provider.
    fn on_module_init(&self, _module: &ResolvedModule) -> Result<()> {
        Ok(())
    }
}

/// Resolved constructor arguments, consumed positionally.
#[derive(Default)]
pub struct Dependencies {
    values: VecDeque<(Token, Instance)>,
}

impl Dependencies {
    pub fn new(values: Vec<(Token, Instance)>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// Take the next argument as a concrete type.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        let (token, instance) = self.next::<T>()?;
        instance
            .downcast::<T>()
            .map_err(|_| PressmeshError::DowncastFailed {
                type_name: format!("{} (token {})", std::any::type_name::<T>(), token),
            })
    }

    /// Take the next argument as a trait object.
    ///
    /// Trait-object providers store an `Arc<dyn Trait>` inside the erased
    /// instance, so this unwraps one extra layer.
    pub fn take_trait<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        let (token, instance) = self.next::<T>()?;
        instance
            .downcast::<Arc<T>>()
            .map(|outer| Arc::clone(&*outer))
            .map_err(|_| PressmeshError::DowncastFailed {
                type_name: format!("{} (token {})", std::any::type_name::<T>(), token),
            })
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    fn next<T: ?Sized>(&mut self) -> Result<(Token, Instance)> {
        self.values
            .pop_front()
            .ok_or_else(|| PressmeshError::DependencyNotFound {
                token: std::any::type_name::<T>().to_string(),
            })
    }
}
