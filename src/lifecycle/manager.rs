//! Lifecycle Manager
//!
//! Runs module lifecycle hooks in dependency order.

use super::ModuleLifecycle;
use crate::error::{PressmeshError, Result};
use crate::module::{ModuleId, ModuleRegistry, ResolvedModule};
use std::sync::{Arc, Mutex, PoisonError};

/// Runs the lifecycle hooks of every module in a registry
///
/// Init hooks run in reverse discovery order, so imported modules are
/// initialized before the modules that import them. Destroy hooks run in
/// the reverse of the order init hooks completed.
///
/// # Example
///
/// ```rust,ignore
/// let manager = LifecycleManager::new(Arc::clone(&registry));
///
/// manager.call_module_init().await?;
/// // ... application runs ...
/// manager.call_module_destroy().await;
/// ```
pub struct LifecycleManager {
    registry: Arc<ModuleRegistry>,
    initialized: Mutex<Vec<ModuleId>>,
}

impl LifecycleManager {
    /// Create a new LifecycleManager
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            registry,
            initialized: Mutex::new(Vec::new()),
        }
    }

    /// Modules whose init hook completed, in completion order
    pub fn initialized(&self) -> Vec<ModuleId> {
        self.completed().clone()
    }

    /// Execute all module init hooks
    ///
    /// The first failure aborts with a lifecycle error naming the module.
    pub async fn call_module_init(&self) -> Result<usize> {
        tracing::info!("Calling module init hooks...");

        let mut count = 0;
        for module in self.registry.modules().iter().rev() {
            let Some(lifecycle) = module.lifecycle() else {
                continue;
            };
            tracing::debug!("Initializing: {}", module.name());
            lifecycle.on_module_init(module).await.map_err(|e| {
                tracing::error!("Module init failed for {}: {:#}", module.name(), e);
                PressmeshError::lifecycle(module.name(), format!("{e:#}"))
            })?;
            self.completed().push(module.id());
            count += 1;
            tracing::debug!("Initialized: {}", module.name());
        }

        tracing::info!("Module init complete ({} hooks executed)", count);
        Ok(count)
    }

    /// Execute all module destroy hooks
    ///
    /// Failures are logged and the remaining hooks still run.
    pub async fn call_module_destroy(&self) -> usize {
        tracing::info!("Calling module destroy hooks...");

        let order: Vec<ModuleId> = std::mem::take(&mut *self.completed());
        let mut count = 0;
        for id in order.iter().rev() {
            let Some(module) = self.registry.get(id) else {
                continue;
            };
            if let Some(lifecycle) = module.lifecycle() {
                if let Err(e) = destroy(lifecycle, module).await {
                    // Log error but continue with other hooks
                    tracing::error!("Module destroy failed for {}: {:#}", module.name(), e);
                }
                count += 1;
            }
        }

        tracing::info!("Module destroy complete ({} hooks executed)", count);
        count
    }

    fn completed(&self) -> std::sync::MutexGuard<'_, Vec<ModuleId>> {
        self.initialized.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn destroy(lifecycle: &dyn ModuleLifecycle, module: &ResolvedModule) -> anyhow::Result<()> {
    tracing::debug!("Destroying: {}", module.name());
    lifecycle.on_module_destroy(module).await
}
