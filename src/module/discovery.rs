use crate::error::{PressmeshError, Result};
use crate::module::{EntityRef, ModuleId, ModuleRef, ResolvedModule};
use std::collections::HashMap;

/// Flat index of every module reachable from the root.
///
/// Modules are stored in discovery order (root first) and referenced by
/// [`ModuleId`], so no resolved module embeds another.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<ResolvedModule>,
    index: HashMap<ModuleId, usize>,
}

impl ModuleRegistry {
    pub fn get(&self, id: &ModuleId) -> Option<&ResolvedModule> {
        self.index.get(id).map(|&position| &self.modules[position])
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.index.contains_key(id)
    }

    /// Modules in discovery order.
    pub fn modules(&self) -> &[ResolvedModule] {
        &self.modules
    }

    pub fn root(&self) -> Option<&ResolvedModule> {
        self.modules.first()
    }

    pub fn globals(&self) -> impl Iterator<Item = &ResolvedModule> {
        self.modules.iter().filter(|module| module.is_global())
    }

    /// Every entity declared anywhere in the graph.
    pub fn entities(&self) -> impl Iterator<Item = &EntityRef> {
        self.modules.iter().flat_map(|module| module.entities())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn insert(&mut self, module: ResolvedModule) {
        self.index.insert(module.id(), self.modules.len());
        self.modules.push(module);
    }
}

/// Walks the import graph from a root module.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoveryService;

impl DiscoveryService {
    pub fn new() -> Self {
        Self
    }

    /// Depth-first discovery of every module reachable from `root`.
    ///
    /// Each module is validated as it is reached. Import cycles are rejected
    /// with the full path, modules already discovered are skipped.
    pub fn discover_modules(&self, root: impl Into<ModuleRef>) -> Result<ModuleRegistry> {
        let mut registry = ModuleRegistry::default();
        let mut path = Vec::new();
        self.visit(&root.into(), None, &mut path, &mut registry)?;

        tracing::info!("Discovered {} modules", registry.len());
        Ok(registry)
    }

    fn visit(
        &self,
        module: &ModuleRef,
        parent: Option<ModuleId>,
        path: &mut Vec<ModuleId>,
        registry: &mut ModuleRegistry,
    ) -> Result<()> {
        let id = module.id();

        if let Some(start) = path.iter().position(|visited| *visited == id) {
            let mut cycle: Vec<&str> = path[start..].iter().map(|m| m.name()).collect();
            cycle.push(id.name());
            let location = parent.map(|p| format!("{p}::imports")).unwrap_or_else(|| id.name().to_string());
            return Err(PressmeshError::module_resolution(
                location,
                format!("circular module import {}", cycle.join(" -> ")),
            ));
        }

        if registry.contains(&id) {
            tracing::debug!(module = %id, "module already discovered");
            return Ok(());
        }

        let resolved = ResolvedModule::new(module, parent)?;
        let imports = resolved.imports().to_vec();
        tracing::debug!(
            module = %id,
            imports = imports.len(),
            providers = resolved.providers().len(),
            global = resolved.is_global(),
            "resolved module"
        );
        registry.insert(resolved);

        path.push(id);
        for import in &imports {
            self.visit(import, Some(id), path, registry)?;
        }
        path.pop();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::Provider;
    use crate::module::{Module, ModuleMetadata};

    macro_rules! test_module {
        ($name:ident $(, $import:ident)*) => {
            #[derive(Default)]
            struct $name;

            impl Module for $name {
                fn metadata(&self) -> ModuleMetadata {
                    ModuleMetadata::new()
                        $(.import(ModuleRef::of::<$import>()))*
                }
            }
        };
    }

    test_module!(Leaf);
    test_module!(Left, Leaf);
    test_module!(Right, Leaf);
    test_module!(Diamond, Left, Right);

    test_module!(Alpha, Beta);
    test_module!(Beta, Alpha);

    test_module!(First, Second);
    test_module!(Second, Third);
    test_module!(Third, First);

    #[derive(Default)]
    struct Broken;

    impl Module for Broken {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new().import(ModuleRef::of::<Leaf>()).export("missing")
        }
    }

    #[derive(Default)]
    struct Configurable;

    impl Module for Configurable {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new()
        }
    }

    #[test]
    fn diamond_imports_are_discovered_once() {
        let registry = DiscoveryService::new().discover_modules(ModuleRef::of::<Diamond>()).unwrap();

        let names: Vec<_> = registry.modules().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["Diamond", "Left", "Leaf", "Right"]);
        assert_eq!(registry.root().unwrap().name(), "Diamond");

        let leaf = registry.get(&ModuleId::of::<Leaf>()).unwrap();
        assert_eq!(leaf.parent(), Some(ModuleId::of::<Left>()));
    }

    #[test]
    fn direct_cycle_names_both_modules() {
        let err = DiscoveryService::new().discover_modules(ModuleRef::of::<Alpha>()).err().unwrap();
        assert!(err.is_module_resolution());
        assert!(err.to_string().contains("Alpha -> Beta -> Alpha"), "{err}");
    }

    #[test]
    fn longer_cycles_are_rejected_with_their_path() {
        let err = DiscoveryService::new().discover_modules(ModuleRef::of::<First>()).err().unwrap();
        assert!(err.to_string().contains("First -> Second -> Third -> First"), "{err}");
    }

    #[test]
    fn invalid_module_fails_discovery() {
        let err = DiscoveryService::new().discover_modules(ModuleRef::of::<Broken>()).err().unwrap();
        assert!(err.to_string().contains("Broken::exports"));
    }

    #[test]
    fn dynamic_registration_extends_metadata() {
        let root = crate::module::DynamicModule::new::<Configurable>()
            .provider(Provider::provide("site.name").use_value("Blog".to_string()))
            .export("site.name")
            .global(true);
        let registry = DiscoveryService::new().discover_modules(root).unwrap();

        let module = registry.root().unwrap();
        assert!(module.is_global());
        assert!(module.exports_token(&"site.name".into()));
        assert_eq!(registry.globals().count(), 1);
    }
}
