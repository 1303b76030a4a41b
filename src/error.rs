use thiserror::Error;

pub type Result<T> = std::result::Result<T, PressmeshError>;

/// Boot-time failures.
///
/// These abort application startup and are never caught by the request or
/// hook pipelines.
#[derive(Debug, Error)]
pub enum PressmeshError {
    #[error("Module resolution failed at {location}: {message}")]
    ModuleResolution { location: String, message: String },

    #[error("Dependency not found: {token}")]
    DependencyNotFound { token: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Route registration failed: {message}")]
    RouteRegistration { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lifecycle hook failed for {module}: {message}")]
    Lifecycle { module: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PressmeshError {
    pub fn module_resolution(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModuleResolution {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn route_registration(message: impl Into<String>) -> Self {
        Self::RouteRegistration {
            message: message.into(),
        }
    }

    pub fn lifecycle(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lifecycle {
            module: module.into(),
            message: message.into(),
        }
    }

    pub fn is_module_resolution(&self) -> bool {
        matches!(self, Self::ModuleResolution { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_resolution_message_carries_location() {
        let err = PressmeshError::module_resolution("BlogModule::exports", "token `Foo` is not provided");
        assert!(err.is_module_resolution());
        assert_eq!(
            err.to_string(),
            "Module resolution failed at BlogModule::exports: token `Foo` is not provided"
        );
    }
}
