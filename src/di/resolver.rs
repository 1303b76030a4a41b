use crate::di::{
    ClassProvider, Container, Dependencies, FactoryProvider, Instance, ProviderDefinition, Scope,
    Strategy, Token,
};
use crate::error::{PressmeshError, Result};
use crate::module::{ModuleId, ModuleRegistry, ResolvedModule};
use std::collections::HashSet;
use std::sync::Arc;

/// Instantiates providers with their dependencies, enforcing module
/// visibility.
///
/// A dependency of a provider in module `M` is visible when it is a
/// framework token, provided by `M` itself, exported by a module `M`
/// imports, or exported by a global module.
#[derive(Clone)]
pub struct DependencyResolver {
    registry: Arc<ModuleRegistry>,
    framework: Arc<HashSet<Token>>,
}

impl DependencyResolver {
    pub fn new(registry: Arc<ModuleRegistry>, framework: impl IntoIterator<Item = Token>) -> Self {
        Self {
            registry,
            framework: Arc::new(framework.into_iter().collect()),
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn is_framework_token(&self, token: &Token) -> bool {
        self.framework.contains(token)
    }

    pub fn module(&self, id: &ModuleId) -> Result<&ResolvedModule> {
        self.registry
            .get(id)
            .ok_or_else(|| PressmeshError::Internal(format!("module `{id}` is not registered")))
    }

    /// Check that `token` may be injected into a class of `module`.
    pub fn validate_dependency(&self, module: &ResolvedModule, token: &Token, target: &str) -> Result<()> {
        if self.is_framework_token(token) || module.provides(token) {
            return Ok(());
        }

        let location = format!("{}::{}", module.name(), short_type_name(target));

        let mut unexported = None;
        for import in module.imports() {
            let Some(imported) = self.registry.get(&import.id()) else {
                continue;
            };
            if imported.provides(token) {
                if imported.exports_token(token) {
                    return Ok(());
                }
                unexported = Some(imported.name());
            }
        }
        if let Some(owner) = unexported {
            return Err(PressmeshError::module_resolution(
                location,
                format!("`{token}` is provided by `{owner}` and must be exported before injecting"),
            ));
        }

        let mut unexported = None;
        for global in self.registry.globals() {
            if global.provides(token) {
                if global.exports_token(token) {
                    return Ok(());
                }
                unexported = Some(global.name());
            }
        }
        if let Some(owner) = unexported {
            return Err(PressmeshError::module_resolution(
                location,
                format!("`{token}` is provided by global module `{owner}` and must be exported before injecting"),
            ));
        }

        Err(PressmeshError::module_resolution(
            location,
            format!("undefined dependency `{token}`"),
        ))
    }

    /// Construct a class, resolving its dependencies from the container.
    pub fn resolve(
        &self,
        container: &Container,
        module: &ResolvedModule,
        class: &ClassProvider,
        validate: bool,
    ) -> Result<Instance> {
        let mut dependencies =
            self.collect(container, module, &class.dependencies(), class.type_name(), validate)?;
        let instance = class.build(&mut dependencies, module)?;
        tracing::debug!(module = module.name(), class = class.type_name(), "instantiated provider");
        Ok(instance)
    }

    /// Call a factory with its resolved dependencies.
    pub fn resolve_factory(
        &self,
        container: &Container,
        module: &ResolvedModule,
        factory: &FactoryProvider,
        validate: bool,
    ) -> Result<Instance> {
        let mut dependencies =
            self.collect(container, module, factory.dependencies(), factory.name(), validate)?;
        factory.call(&mut dependencies)
    }

    /// Build the value of a module provider.
    pub fn instantiate(
        &self,
        container: &Container,
        module: &ResolvedModule,
        definition: &ProviderDefinition,
    ) -> Result<Instance> {
        match definition.strategy() {
            Strategy::Class(class) => self.resolve(container, module, class, true),
            Strategy::Factory(factory) => self.resolve_factory(container, module, factory, true),
            Strategy::Value(value) => Ok(Arc::clone(value)),
        }
    }

    /// Check the visibility of every dependency without instantiating.
    pub fn validate_provider(&self, module: &ResolvedModule, definition: &ProviderDefinition) -> Result<()> {
        let target = definition.describe();
        for token in definition.dependencies() {
            self.validate_dependency(module, &token, &target)?;
        }
        Ok(())
    }

    /// Construct a class that is not registered as a provider and cache it
    /// as a singleton under its own token.
    pub fn autowire(&self, container: &Container, module: &ResolvedModule, class: &ClassProvider) -> Result<Instance> {
        let instance = self.resolve(container, module, class, false)?;
        container.set_instance(class.token().clone(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Bind a lazy factory for every provider and controller in the graph.
    pub fn register_providers(&self, container: &Container) -> Result<usize> {
        let mut count = 0;
        for module in self.registry.modules() {
            let module_id = module.id();

            for definition in module.providers() {
                let resolver = self.clone();
                let provider = definition.clone();
                container.bind(
                    definition.token().clone(),
                    definition.scope(),
                    Arc::new(move |container| {
                        let module = resolver.module(&module_id)?;
                        resolver.instantiate(container, module, &provider)
                    }),
                );
                count += 1;
            }

            for controller in module.controllers() {
                let resolver = self.clone();
                let class = controller.provider().clone();
                container.bind(
                    controller.token().clone(),
                    Scope::Singleton,
                    Arc::new(move |container| {
                        let module = resolver.module(&module_id)?;
                        resolver.resolve(container, module, &class, true)
                    }),
                );
                count += 1;
            }
        }

        tracing::info!("Registered {} providers and controllers", count);
        Ok(count)
    }

    /// Validate every provider and eagerly build singletons and controllers.
    ///
    /// Transient providers are only validated; they are built on demand.
    pub fn instantiate_all(&self, container: &Container) -> Result<()> {
        for module in self.registry.modules() {
            for definition in module.providers() {
                self.validate_provider(module, definition)?;
                if definition.scope() == Scope::Singleton {
                    container.get(definition.token())?;
                }
            }
            for controller in module.controllers() {
                container.get(controller.token())?;
            }
        }
        Ok(())
    }

    fn collect(
        &self,
        container: &Container,
        module: &ResolvedModule,
        tokens: &[Token],
        target: &str,
        validate: bool,
    ) -> Result<Dependencies> {
        let mut values = Vec::with_capacity(tokens.len());
        for token in tokens {
            if validate {
                self.validate_dependency(module, token, target)?;
            }
            values.push((token.clone(), container.resolve(token)?));
        }
        Ok(Dependencies::new(values))
    }
}

fn short_type_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Injectable, Provider};
    use crate::module::{DiscoveryService, Module, ModuleMetadata, ModuleRef};

    struct Repository;

    impl Injectable for Repository {
        fn construct(_: &mut Dependencies) -> Result<Self> {
            Ok(Repository)
        }
    }

    struct Service {
        repository: Arc<Repository>,
    }

    impl Injectable for Service {
        fn dependencies() -> Vec<Token> {
            vec![Token::of::<Repository>()]
        }

        fn construct(deps: &mut Dependencies) -> Result<Self> {
            Ok(Service {
                repository: deps.take()?,
            })
        }
    }

    #[derive(Default)]
    struct Exporting;

    impl Module for Exporting {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new()
                .provider(Provider::class::<Repository>())
                .export(Token::of::<Repository>())
        }
    }

    #[derive(Default)]
    struct Hiding;

    impl Module for Hiding {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new().provider(Provider::class::<Repository>())
        }
    }

    #[derive(Default)]
    struct UsesExported;

    impl Module for UsesExported {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new()
                .import(ModuleRef::of::<Exporting>())
                .provider(Provider::class::<Service>())
        }
    }

    #[derive(Default)]
    struct UsesHidden;

    impl Module for UsesHidden {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new()
                .import(ModuleRef::of::<Hiding>())
                .provider(Provider::class::<Service>())
        }
    }

    #[derive(Default)]
    struct GlobalExporting;

    impl Module for GlobalExporting {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new()
                .global(true)
                .provider(Provider::class::<Repository>())
                .export(Token::of::<Repository>())
        }
    }

    #[derive(Default)]
    struct GlobalHiding;

    impl Module for GlobalHiding {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new().global(true).provider(Provider::class::<Repository>())
        }
    }

    /// Provides `Service` without importing anything.
    #[derive(Default)]
    struct Consumer;

    impl Module for Consumer {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new().provider(Provider::class::<Service>())
        }
    }

    #[derive(Default)]
    struct WithGlobal;

    impl Module for WithGlobal {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new()
                .import(ModuleRef::of::<GlobalExporting>())
                .import(ModuleRef::of::<Consumer>())
        }
    }

    #[derive(Default)]
    struct WithHiddenGlobal;

    impl Module for WithHiddenGlobal {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new()
                .import(ModuleRef::of::<GlobalHiding>())
                .import(ModuleRef::of::<Consumer>())
        }
    }

    struct Auditor {
        repository: Arc<Repository>,
    }

    impl Injectable for Auditor {
        fn dependencies() -> Vec<Token> {
            vec![Token::of::<Repository>()]
        }

        fn construct(deps: &mut Dependencies) -> Result<Self> {
            Ok(Auditor {
                repository: deps.take()?,
            })
        }
    }

    #[derive(Default)]
    struct TransientRepository;

    impl Module for TransientRepository {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new()
                .provider(Provider::class::<Repository>().scope(Scope::Transient))
                .provider(Provider::class::<Service>())
                .provider(Provider::class::<Auditor>())
        }
    }

    #[derive(Default)]
    struct Orphan;

    impl Module for Orphan {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new().provider(Provider::class::<Service>())
        }
    }

    fn boot<M: Module + Default>() -> (DependencyResolver, Container) {
        let registry = DiscoveryService::new().discover_modules(ModuleRef::of::<M>()).unwrap();
        let resolver = DependencyResolver::new(Arc::new(registry), Vec::new());
        let container = Container::new();
        resolver.register_providers(&container).unwrap();
        (resolver, container)
    }

    #[test]
    fn exported_dependency_resolves_to_shared_singleton() {
        let (resolver, container) = boot::<UsesExported>();
        resolver.instantiate_all(&container).unwrap();

        let service = container.resolve_as::<Service>(&Token::of::<Service>()).unwrap();
        let repository = container.resolve_as::<Repository>(&Token::of::<Repository>()).unwrap();
        assert!(Arc::ptr_eq(&service.repository, &repository));
    }

    #[test]
    fn unexported_dependency_is_rejected() {
        let (resolver, container) = boot::<UsesHidden>();
        let err = resolver.instantiate_all(&container).err().unwrap();
        assert!(err.is_module_resolution());
        assert!(err.to_string().contains("must be exported before injecting"), "{err}");
        assert!(err.to_string().contains("UsesHidden::Service"), "{err}");
    }

    #[test]
    fn exports_of_global_modules_need_no_import() {
        let (resolver, container) = boot::<WithGlobal>();
        resolver.instantiate_all(&container).unwrap();

        let service = container.resolve_as::<Service>(&Token::of::<Service>()).unwrap();
        let repository = container.resolve_as::<Repository>(&Token::of::<Repository>()).unwrap();
        assert!(Arc::ptr_eq(&service.repository, &repository));
    }

    #[test]
    fn unexported_global_provider_is_rejected() {
        let (resolver, container) = boot::<WithHiddenGlobal>();
        let err = resolver.instantiate_all(&container).err().unwrap();
        assert!(err.is_module_resolution());
        assert!(err.to_string().contains("global module `GlobalHiding`"), "{err}");
        assert!(err.to_string().contains("must be exported before injecting"), "{err}");
    }

    #[test]
    fn transient_providers_are_built_per_dependent() {
        let (resolver, container) = boot::<TransientRepository>();
        resolver.instantiate_all(&container).unwrap();
        assert!(!container.is_materialized(&Token::of::<Repository>()));

        let service = container.resolve_as::<Service>(&Token::of::<Service>()).unwrap();
        let auditor = container.resolve_as::<Auditor>(&Token::of::<Auditor>()).unwrap();
        assert!(!Arc::ptr_eq(&service.repository, &auditor.repository));

        let first = container.resolve(&Token::of::<Repository>()).unwrap();
        let second = container.resolve(&Token::of::<Repository>()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_dependency_is_undefined() {
        let (resolver, container) = boot::<Orphan>();
        let err = resolver.instantiate_all(&container).err().unwrap();
        assert!(err.to_string().contains("undefined dependency"), "{err}");
    }

    #[test]
    fn framework_tokens_are_always_visible() {
        let registry = DiscoveryService::new().discover_modules(ModuleRef::of::<Orphan>()).unwrap();
        let resolver = DependencyResolver::new(Arc::new(registry), vec![Token::of::<Repository>()]);
        let module = resolver.registry().root().unwrap();
        resolver
            .validate_dependency(module, &Token::of::<Repository>(), "Service")
            .unwrap();
    }

    #[test]
    fn autowire_caches_the_instance() {
        let (resolver, container) = boot::<Exporting>();
        let module = resolver.registry().root().unwrap();
        let first = resolver.autowire(&container, module, &ClassProvider::of::<Service>()).unwrap();
        let second = container.get(&Token::of::<Service>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
