use crate::di::{Dependencies, Injectable, Instance, Token};
use crate::error::{PressmeshError, Result};
use crate::hooks::{HookBinder, HookSubscriber};
use crate::module::ResolvedModule;
use std::sync::Arc;
use strum_macros::{Display, EnumString};

/// Object lifetime of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Scope {
    /// One instance, materialised on first use and cached.
    #[default]
    Singleton,
    /// A fresh instance for every resolution.
    Transient,
}

type BuildFn = Arc<dyn Fn(&mut Dependencies, &ResolvedModule) -> Result<Instance> + Send + Sync>;
type FactoryFn = Arc<dyn Fn(&mut Dependencies) -> Result<Instance> + Send + Sync>;

/// Type-erased constructor of an [`Injectable`] class.
#[derive(Clone)]
pub struct ClassProvider {
    token: Token,
    type_name: &'static str,
    dependencies: fn() -> Vec<Token>,
    build: BuildFn,
}

impl ClassProvider {
    pub fn of<T: Injectable>() -> Self {
        Self {
            token: Token::of::<T>(),
            type_name: std::any::type_name::<T>(),
            dependencies: T::dependencies,
            build: Arc::new(|deps, module| {
                let instance = T::construct(deps)?;
                instance.on_module_init(module)?;
                Ok(Arc::new(instance) as Instance)
            }),
        }
    }

    /// Construct `T` and expose it as `Trait`.
    ///
    /// The erased instance holds an `Arc<Trait>`, matching
    /// [`Dependencies::take_trait`].
    pub fn bound<Trait, T>(cast: fn(Arc<T>) -> Arc<Trait>) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        Self {
            token: Token::of::<Trait>(),
            type_name: std::any::type_name::<T>(),
            dependencies: T::dependencies,
            build: Arc::new(move |deps, module| {
                let instance = T::construct(deps)?;
                instance.on_module_init(module)?;
                let erased: Arc<Trait> = cast(Arc::new(instance));
                Ok(Arc::new(erased) as Instance)
            }),
        }
    }

    /// Natural token of the class (its type, or the bound trait).
    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn dependencies(&self) -> Vec<Token> {
        (self.dependencies)()
    }

    pub fn build(&self, dependencies: &mut Dependencies, module: &ResolvedModule) -> Result<Instance> {
        (self.build)(dependencies, module)
    }
}

/// A factory function together with the tokens it consumes.
#[derive(Clone)]
pub struct FactoryProvider {
    name: &'static str,
    dependencies: Vec<Token>,
    call: FactoryFn,
}

impl FactoryProvider {
    pub fn new<T, F>(dependencies: Vec<Token>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut Dependencies) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            name: std::any::type_name::<F>(),
            dependencies,
            call: Arc::new(move |deps| Ok(Arc::new(factory(deps)?) as Instance)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn dependencies(&self) -> &[Token] {
        &self.dependencies
    }

    pub fn call(&self, dependencies: &mut Dependencies) -> Result<Instance> {
        (self.call)(dependencies)
    }
}

/// Provider declaration as written in a module.
///
/// Every strategy that was set is recorded so the exactly-one rule can be
/// checked when the module is resolved.
///
/// # Example
/// ```rust,ignore
/// Provider::class::<UserService>();
/// Provider::provide("config.page_size").use_value(20_usize);
/// Provider::provide(Token::of::<Clock>())
///     .use_factory(vec![], |_| Ok(Clock::system()))
///     .scope(Scope::Transient);
/// ```
#[derive(Clone, Default)]
pub struct Provider {
    provide: Option<Token>,
    use_class: Option<ClassProvider>,
    use_factory: Option<FactoryProvider>,
    use_value: Option<Instance>,
    scope: Scope,
    hooks: Option<HookBinder>,
}

impl Provider {
    /// Bare class shorthand: provide `T` by constructing `T`, singleton.
    pub fn class<T: Injectable>() -> Self {
        Self::provide(Token::of::<T>()).use_class::<T>()
    }

    /// A class that also declares hook handlers.
    pub fn subscriber<T: HookSubscriber>() -> Self {
        let mut provider = Self::class::<T>();
        provider.hooks = Some(crate::hooks::bind_subscriber::<T>);
        provider
    }

    /// Provide the `Trait` token by constructing `T`.
    pub fn bind<Trait, T>(cast: fn(Arc<T>) -> Arc<Trait>) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        Self {
            provide: Some(Token::of::<Trait>()),
            use_class: Some(ClassProvider::bound::<Trait, T>(cast)),
            ..Self::default()
        }
    }

    pub fn provide(token: impl Into<Token>) -> Self {
        Self {
            provide: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn use_class<T: Injectable>(mut self) -> Self {
        self.use_class = Some(ClassProvider::of::<T>());
        self
    }

    pub fn use_factory<T, F>(mut self, dependencies: Vec<Token>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut Dependencies) -> Result<T> + Send + Sync + 'static,
    {
        self.use_factory = Some(FactoryProvider::new(dependencies, factory));
        self
    }

    pub fn use_value<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.use_value = Some(Arc::new(value));
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn token(&self) -> Option<&Token> {
        self.provide.as_ref()
    }

    /// Check the declaration and freeze it.
    pub fn validate(self, location: &str) -> Result<ProviderDefinition> {
        let token = self.provide.ok_or_else(|| {
            PressmeshError::module_resolution(location, "provider is missing a `provide` token")
        })?;

        let mut strategies = Vec::with_capacity(1);
        if let Some(class) = self.use_class {
            strategies.push(Strategy::Class(class));
        }
        if let Some(factory) = self.use_factory {
            strategies.push(Strategy::Factory(factory));
        }
        if let Some(value) = self.use_value {
            strategies.push(Strategy::Value(value));
        }

        if strategies.len() != 1 {
            return Err(PressmeshError::module_resolution(
                location,
                format!(
                    "provider `{}` must define exactly one of use_class, use_factory or use_value (found {})",
                    token,
                    strategies.len()
                ),
            ));
        }

        Ok(ProviderDefinition {
            token,
            strategy: strategies.remove(0),
            scope: self.scope,
            hooks: self.hooks,
        })
    }
}

/// How a validated provider builds its value.
#[derive(Clone)]
pub enum Strategy {
    Class(ClassProvider),
    Factory(FactoryProvider),
    Value(Instance),
}

/// A validated provider owned by a resolved module.
#[derive(Clone)]
pub struct ProviderDefinition {
    token: Token,
    strategy: Strategy,
    scope: Scope,
    hooks: Option<HookBinder>,
}

impl ProviderDefinition {
    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn hooks(&self) -> Option<HookBinder> {
        self.hooks
    }

    pub fn dependencies(&self) -> Vec<Token> {
        match &self.strategy {
            Strategy::Class(class) => class.dependencies(),
            Strategy::Factory(factory) => factory.dependencies().to_vec(),
            Strategy::Value(_) => Vec::new(),
        }
    }

    /// Human readable description for diagnostics.
    pub fn describe(&self) -> String {
        match &self.strategy {
            Strategy::Class(class) => class.type_name().to_string(),
            Strategy::Factory(factory) => format!("{} for {}", factory.name(), self.token),
            Strategy::Value(_) => format!("value for {}", self.token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    impl Injectable for Plain {
        fn construct(_: &mut Dependencies) -> Result<Self> {
            Ok(Plain)
        }
    }

    #[test]
    fn bare_class_is_a_singleton_class_provider() {
        let definition = Provider::class::<Plain>().validate("AppModule").unwrap();
        assert_eq!(definition.token(), &Token::of::<Plain>());
        assert_eq!(definition.scope(), Scope::Singleton);
        assert!(matches!(definition.strategy(), Strategy::Class(_)));
    }

    #[test]
    fn exactly_one_strategy_is_required() {
        let none = Provider::provide("nothing").validate("AppModule");
        assert!(none.err().unwrap().is_module_resolution());

        let both = Provider::provide("both")
            .use_value(1_u8)
            .use_factory(vec![], |_| Ok(2_u8))
            .validate("AppModule");
        let message = both.err().unwrap().to_string();
        assert!(message.contains("exactly one"));
        assert!(message.contains("found 2"));
    }

    #[test]
    fn missing_token_is_rejected() {
        let err = Provider::default().use_value(1_u8).validate("AppModule").err().unwrap();
        assert!(err.to_string().contains("provide"));
    }

    #[test]
    fn scope_parses_from_text() {
        assert_eq!("transient".parse::<Scope>().unwrap(), Scope::Transient);
        assert_eq!(Scope::Singleton.to_string(), "Singleton");
    }
}
