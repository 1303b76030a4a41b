use crate::controller::ControllerRef;
use crate::di::{ProviderDefinition, Token};
use crate::error::{PressmeshError, Result};
use crate::lifecycle::ModuleLifecycle;
use crate::module::{EntityRef, Module, ModuleId, ModuleRef};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A module class bound to its validated metadata.
///
/// Built once per module during discovery and never mutated afterwards.
/// Other modules are referred to by [`ModuleId`] only.
pub struct ResolvedModule {
    id: ModuleId,
    instance: Arc<dyn Module>,
    parent: Option<ModuleId>,
    global: bool,
    imports: Vec<ModuleRef>,
    providers: Vec<ProviderDefinition>,
    provided: HashSet<Token>,
    exports: Vec<Token>,
    controllers: Vec<ControllerRef>,
    entities: Vec<EntityRef>,
}

impl ResolvedModule {
    /// Instantiate the module class and validate its metadata.
    pub fn new(module: &ModuleRef, parent: Option<ModuleId>) -> Result<Self> {
        let id = module.id();
        let instance = module.instantiate();
        let mut metadata = instance.metadata();
        if let Some(dynamic) = module.dynamic() {
            dynamic.extend(&mut metadata);
        }

        let name = id.name();

        let mut seen_imports = HashSet::new();
        for import in &metadata.imports {
            if !seen_imports.insert(import.id()) {
                return Err(PressmeshError::module_resolution(
                    format!("{name}::imports"),
                    format!("module `{}` is imported more than once", import.id()),
                ));
            }
        }

        let mut providers = Vec::with_capacity(metadata.providers.len());
        let mut provided = HashSet::new();
        for (index, provider) in metadata.providers.into_iter().enumerate() {
            let definition = provider.validate(&format!("{name}::providers[{index}]"))?;
            if !provided.insert(definition.token().clone()) {
                return Err(PressmeshError::module_resolution(
                    format!("{name}::providers[{index}]"),
                    format!("token `{}` is provided more than once", definition.token()),
                ));
            }
            providers.push(definition);
        }

        let mut seen_exports = HashSet::new();
        for token in &metadata.exports {
            if !seen_exports.insert(token.clone()) {
                return Err(PressmeshError::module_resolution(
                    format!("{name}::exports"),
                    format!("token `{token}` is exported more than once"),
                ));
            }
            if !provided.contains(token) {
                return Err(PressmeshError::module_resolution(
                    format!("{name}::exports"),
                    format!("exported token `{token}` is not provided by this module"),
                ));
            }
        }

        let mut seen_controllers = HashSet::new();
        for controller in &metadata.controllers {
            if !seen_controllers.insert(controller.token().clone()) {
                return Err(PressmeshError::module_resolution(
                    format!("{name}::controllers"),
                    format!("controller `{}` is declared more than once", controller.type_name()),
                ));
            }
        }

        let mut seen_entities = Vec::with_capacity(metadata.entities.len());
        for entity in &metadata.entities {
            if seen_entities.contains(entity) {
                return Err(PressmeshError::module_resolution(
                    format!("{name}::entities"),
                    format!("entity `{}` is declared more than once", entity.type_name()),
                ));
            }
            seen_entities.push(*entity);
        }

        Ok(Self {
            id,
            instance,
            parent,
            global: metadata.global,
            imports: metadata.imports,
            providers,
            provided,
            exports: metadata.exports,
            controllers: metadata.controllers,
            entities: metadata.entities,
        })
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// The module that imported this one first; `None` for the root.
    pub fn parent(&self) -> Option<ModuleId> {
        self.parent
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn instance(&self) -> &Arc<dyn Module> {
        &self.instance
    }

    pub fn lifecycle(&self) -> Option<&dyn ModuleLifecycle> {
        self.instance.lifecycle()
    }

    pub fn imports(&self) -> &[ModuleRef] {
        &self.imports
    }

    pub fn providers(&self) -> &[ProviderDefinition] {
        &self.providers
    }

    pub fn controllers(&self) -> &[ControllerRef] {
        &self.controllers
    }

    pub fn entities(&self) -> &[EntityRef] {
        &self.entities
    }

    pub fn exports(&self) -> &[Token] {
        &self.exports
    }

    pub fn provides(&self, token: &Token) -> bool {
        self.provided.contains(token)
    }

    pub fn exports_token(&self, token: &Token) -> bool {
        self.exports.contains(token)
    }
}

impl fmt::Debug for ResolvedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModule")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("global", &self.global)
            .field("providers", &self.provided.len())
            .field("exports", &self.exports)
            .finish()
    }
}
