use crate::di::{ClassProvider, Container, DependencyResolver, Injectable, Instance};
use crate::error::{PressmeshError, Result};
use crate::exception::ExceptionFilter;
use crate::guard::Guard;
use crate::hooks::Check;
use crate::interceptor::Interceptor;
use crate::middleware::Middleware;
use crate::module::ResolvedModule;
use crate::pipe::Pipe;
use std::fmt;
use std::sync::Arc;

/// A cross-cutting component given either as a live instance or as a class
/// reference resolved through the container.
///
/// # Example
/// ```rust,ignore
/// ControllerDefinition::new("posts")
///     .guard(Provided::<dyn Guard>::of::<AuthGuard>())
///     .interceptor(Provided::<dyn Interceptor>::instance(LoggingInterceptor));
/// ```
pub enum Provided<T: ?Sized> {
    Instance(Arc<T>),
    Reference {
        class: ClassProvider,
        cast: fn(Instance) -> Option<Arc<T>>,
    },
}

impl<T: ?Sized> Clone for Provided<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Instance(instance) => Self::Instance(Arc::clone(instance)),
            Self::Reference { class, cast } => Self::Reference {
                class: class.clone(),
                cast: *cast,
            },
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provided<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("Provided::Instance"),
            Self::Reference { class, .. } => write!(f, "Provided::Reference({})", class.type_name()),
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Provided<T> {
    /// Resolve to a live instance.
    ///
    /// A reference uses the registered provider for its class when there is
    /// one, otherwise the class is autowired in the context of `module`.
    pub fn resolve(
        &self,
        resolver: &DependencyResolver,
        container: &Container,
        module: &ResolvedModule,
    ) -> Result<Arc<T>> {
        match self {
            Self::Instance(instance) => Ok(Arc::clone(instance)),
            Self::Reference { class, cast } => {
                let instance = if container.contains(class.token()) {
                    container.resolve(class.token())?
                } else {
                    resolver.autowire(container, module, class)?
                };
                cast(instance).ok_or_else(|| PressmeshError::DowncastFailed {
                    type_name: class.type_name().to_string(),
                })
            }
        }
    }

    pub fn resolve_all(
        items: &[Self],
        resolver: &DependencyResolver,
        container: &Container,
        module: &ResolvedModule,
    ) -> Result<Vec<Arc<T>>> {
        items
            .iter()
            .map(|item| item.resolve(resolver, container, module))
            .collect()
    }
}

macro_rules! provided_for {
    ($($component:ident),* $(,)?) => {
        $(
            impl Provided<dyn $component> {
                /// Reference to an injectable class.
                pub fn of<C: $component + Injectable>() -> Self {
                    fn cast<C: $component + Injectable>(instance: Instance) -> Option<Arc<dyn $component>> {
                        instance.downcast::<C>().ok().map(|concrete| concrete as Arc<dyn $component>)
                    }
                    Self::Reference {
                        class: ClassProvider::of::<C>(),
                        cast: cast::<C>,
                    }
                }

                /// A live instance.
                pub fn instance(component: impl $component) -> Self {
                    Self::Instance(Arc::new(component))
                }
            }

            impl<C: $component> From<Arc<C>> for Provided<dyn $component> {
                fn from(component: Arc<C>) -> Self {
                    Self::Instance(component)
                }
            }
        )*
    };
}

provided_for!(Guard, Interceptor, Pipe, ExceptionFilter, Middleware, Check);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::di::{Dependencies, Token};
    use crate::guard::GuardResult;
    use crate::module::{DiscoveryService, Module, ModuleMetadata, ModuleRef};
    use async_trait::async_trait;

    struct AllowAll;

    impl Injectable for AllowAll {
        fn construct(_: &mut Dependencies) -> Result<Self> {
            Ok(AllowAll)
        }
    }

    #[async_trait]
    impl Guard for AllowAll {
        async fn can_activate(&self, _ctx: &ExecutionContext) -> GuardResult {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct Root;

    impl Module for Root {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new()
        }
    }

    #[tokio::test]
    async fn references_are_autowired_once() {
        let registry = DiscoveryService::new().discover_modules(ModuleRef::of::<Root>()).unwrap();
        let resolver = DependencyResolver::new(Arc::new(registry), Vec::new());
        let container = Container::new();
        let module = resolver.registry().root().unwrap();

        let provided = Provided::<dyn Guard>::of::<AllowAll>();
        let first = provided.resolve(&resolver, &container, module).unwrap();
        let second = provided.resolve(&resolver, &container, module).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(container.contains(&Token::of::<AllowAll>()));
        assert!(first.can_activate(&ExecutionContext::new()).await.unwrap());
    }

    #[test]
    fn instances_are_used_as_is() {
        let guard = Arc::new(AllowAll);
        let provided: Provided<dyn Guard> = guard.clone().into();
        let registry = DiscoveryService::new().discover_modules(ModuleRef::of::<Root>()).unwrap();
        let resolver = DependencyResolver::new(Arc::new(registry), Vec::new());
        let module = resolver.registry().root().unwrap();

        let resolved = provided.resolve(&resolver, &Container::new(), module).unwrap();
        assert_eq!(Arc::as_ptr(&resolved) as *const u8, Arc::as_ptr(&guard) as *const u8);
    }
}
