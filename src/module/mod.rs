use crate::controller::ControllerRef;
use crate::di::{Provider, Token};
use crate::lifecycle::ModuleLifecycle;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

mod discovery;
mod resolved;

pub use discovery::{DiscoveryService, ModuleRegistry};
pub use resolved::ResolvedModule;

/// Trait for application modules
///
/// Modules are typically defined using the `#[module]` macro, which implements
/// this trait from the listed imports, providers, controllers, entities and
/// exports.
///
/// # Example
/// ```rust,ignore
/// use pressmesh::module;
///
/// #[module(
///     imports = [DatabaseModule],
///     controllers = [PostController],
///     providers = [PostService],
///     exports = [PostService],
/// )]
/// #[derive(Default)]
/// pub struct PostModule;
/// ```
pub trait Module: Send + Sync + 'static {
    /// Describe this module's composition.
    fn metadata(&self) -> ModuleMetadata;

    /// Lifecycle callbacks, when the module declares them.
    fn lifecycle(&self) -> Option<&dyn ModuleLifecycle> {
        None
    }
}

/// Identity of a module class.
#[derive(Clone, Copy)]
pub struct ModuleId {
    type_id: TypeId,
    name: &'static str,
}

impl ModuleId {
    pub fn of<M: Module>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    /// Fully qualified type name.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Unqualified type name.
    pub fn name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for ModuleId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModuleId {}

impl Hash for ModuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.name)
    }
}

/// Composition of a module.
#[derive(Clone, Default)]
pub struct ModuleMetadata {
    pub imports: Vec<ModuleRef>,
    pub providers: Vec<Provider>,
    pub controllers: Vec<ControllerRef>,
    pub entities: Vec<EntityRef>,
    pub exports: Vec<Token>,
    pub global: bool,
}

impl ModuleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import(mut self, module: impl Into<ModuleRef>) -> Self {
        self.imports.push(module.into());
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn controller(mut self, controller: ControllerRef) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn entity(mut self, entity: EntityRef) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn export(mut self, token: impl Into<Token>) -> Self {
        self.exports.push(token.into());
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }
}

/// Reference to a module class, optionally carrying a dynamic registration.
#[derive(Clone)]
pub struct ModuleRef {
    id: ModuleId,
    factory: fn() -> Arc<dyn Module>,
    dynamic: Option<Arc<DynamicModule>>,
}

fn instantiate<M: Module + Default>() -> Arc<dyn Module> {
    Arc::new(M::default())
}

impl ModuleRef {
    pub fn of<M: Module + Default>() -> Self {
        Self {
            id: ModuleId::of::<M>(),
            factory: instantiate::<M>,
            dynamic: None,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn instantiate(&self) -> Arc<dyn Module> {
        (self.factory)()
    }

    pub fn dynamic(&self) -> Option<&DynamicModule> {
        self.dynamic.as_deref()
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRef")
            .field("id", &self.id)
            .field("dynamic", &self.dynamic.is_some())
            .finish()
    }
}

/// Module configured at registration time, e.g. by a `for_root(..)` call.
///
/// Its entries are appended to the static metadata of the module class.
///
/// # Example
/// ```rust,ignore
/// impl DatabaseModule {
///     pub fn for_root(url: &str) -> DynamicModule {
///         DynamicModule::new::<Self>()
///             .provider(Provider::provide("database.url").use_value(url.to_string()))
///             .export("database.url")
///             .global(true)
///     }
/// }
/// ```
#[derive(Clone)]
pub struct DynamicModule {
    module: ModuleRef,
    imports: Vec<ModuleRef>,
    providers: Vec<Provider>,
    exports: Vec<Token>,
    global: Option<bool>,
}

impl DynamicModule {
    pub fn new<M: Module + Default>() -> Self {
        Self {
            module: ModuleRef::of::<M>(),
            imports: Vec::new(),
            providers: Vec::new(),
            exports: Vec::new(),
            global: None,
        }
    }

    pub fn import(mut self, module: impl Into<ModuleRef>) -> Self {
        self.imports.push(module.into());
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn export(mut self, token: impl Into<Token>) -> Self {
        self.exports.push(token.into());
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = Some(global);
        self
    }

    /// Merge the registration into the class metadata.
    pub(crate) fn extend(&self, metadata: &mut ModuleMetadata) {
        metadata.imports.extend(self.imports.iter().cloned());
        metadata.providers.extend(self.providers.iter().cloned());
        metadata.exports.extend(self.exports.iter().cloned());
        if let Some(global) = self.global {
            metadata.global = global;
        }
    }
}

impl From<DynamicModule> for ModuleRef {
    fn from(dynamic: DynamicModule) -> Self {
        let mut module = dynamic.module.clone();
        module.dynamic = Some(Arc::new(dynamic));
        module
    }
}

/// A persisted record type declared by a module, such as a custom post type.
pub trait Entity: Send + Sync + 'static {
    const POST_TYPE: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRef {
    type_id: TypeId,
    type_name: &'static str,
    post_type: &'static str,
}

impl EntityRef {
    pub fn of<E: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            post_type: E::POST_TYPE,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn post_type(&self) -> &'static str {
        self.post_type
    }
}
