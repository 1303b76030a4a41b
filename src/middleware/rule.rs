use crate::controller::{PathTemplate, RouteMetadata};
use crate::error::{PressmeshError, Result};
use axum::http::Method;
use regex::Regex;

/// Path half of a [`RouteRule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// `*`: every route.
    Any,
    /// A route template such as `/users/:id`, or a concrete path.
    Exact(String),
    /// A regular expression over the full route path or the request path.
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    Any,
    Only(Vec<Method>),
}

impl MethodMatcher {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(methods) => methods.contains(method),
        }
    }
}

/// Selects routes for a middleware registration.
///
/// A bare string is an exact path (or `*`) for every method.
///
/// # Example
/// ```rust,ignore
/// RouteRule::from("/users/:id").method(Method::GET);
/// RouteRule::regex(r"^/admin/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    path: PathPattern,
    methods: MethodMatcher,
}

impl RouteRule {
    pub fn new(path: PathPattern) -> Self {
        Self {
            path,
            methods: MethodMatcher::Any,
        }
    }

    pub fn any() -> Self {
        Self::new(PathPattern::Any)
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::new(PathPattern::Regex(pattern.into()))
    }

    /// Restrict to `method`; may be repeated.
    pub fn method(mut self, method: Method) -> Self {
        match &mut self.methods {
            MethodMatcher::Any => self.methods = MethodMatcher::Only(vec![method]),
            MethodMatcher::Only(methods) => methods.push(method),
        }
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = MethodMatcher::Only(methods.into_iter().collect());
        self
    }

    pub fn path(&self) -> &PathPattern {
        &self.path
    }

    pub(crate) fn compile(&self) -> Result<CompiledRule> {
        let path = match &self.path {
            PathPattern::Any => CompiledPath::Any,
            PathPattern::Exact(raw) => CompiledPath::Exact {
                template: PathTemplate::parse(raw)?,
            },
            PathPattern::Regex(raw) => CompiledPath::Regex(Regex::new(raw).map_err(|e| {
                PressmeshError::route_registration(format!("invalid middleware pattern `{raw}`: {e}"))
            })?),
        };
        Ok(CompiledRule {
            path,
            methods: self.methods.clone(),
        })
    }
}

impl From<&str> for RouteRule {
    fn from(path: &str) -> Self {
        if path.trim() == "*" {
            Self::any()
        } else {
            Self::new(PathPattern::Exact(path.to_string()))
        }
    }
}

impl From<String> for RouteRule {
    fn from(path: String) -> Self {
        Self::from(path.as_str())
    }
}

#[derive(Debug)]
enum CompiledPath {
    Any,
    Exact { template: PathTemplate },
    Regex(Regex),
}

#[derive(Debug)]
pub(crate) struct CompiledRule {
    path: CompiledPath,
    methods: MethodMatcher,
}

impl CompiledRule {
    /// Whether the rule selects `route`, matched for `request_path`.
    ///
    /// Exact rules match the route template itself (with or without the
    /// controller namespace) or the concrete request path.
    pub(crate) fn matches(&self, route: &RouteMetadata, request_path: &str) -> bool {
        if !self.methods.matches(route.method()) {
            return false;
        }
        match &self.path {
            CompiledPath::Any => true,
            CompiledPath::Exact { template } => {
                template.path() == route.full_path()
                    || template.path() == route.path()
                    || template.is_match(request_path)
                    || route
                        .relative_path(request_path)
                        .is_some_and(|relative| template.is_match(relative))
            }
            CompiledPath::Regex(pattern) => pattern.is_match(route.full_path()) || pattern.is_match(request_path),
        }
    }
}
