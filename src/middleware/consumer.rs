use crate::di::Provided;
use crate::middleware::{Middleware, RouteRule};

/// Middleware applied to a set of routes.
#[derive(Clone)]
pub struct MiddlewareRegistration {
    pub middleware: Vec<Provided<dyn Middleware>>,
    pub routes: Vec<RouteRule>,
    pub excludes: Vec<RouteRule>,
}

/// Collects middleware registrations in `ModuleLifecycle::configure`.
///
/// # Example
/// ```rust,ignore
/// fn configure(&self, consumer: &mut MiddlewareConsumer) {
///     consumer
///         .apply([Provided::<dyn Middleware>::of::<AuthMiddleware>()])
///         .exclude(["/users/admin"])
///         .for_routes([RouteRule::from("/users/:id").method(Method::GET)]);
/// }
/// ```
#[derive(Clone, Default)]
pub struct MiddlewareConsumer {
    registrations: Vec<MiddlewareRegistration>,
}

impl MiddlewareConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a registration. Nothing is registered until `for_routes`.
    pub fn apply(&mut self, middleware: impl IntoIterator<Item = Provided<dyn Middleware>>) -> MiddlewareBuilder<'_> {
        MiddlewareBuilder {
            consumer: self,
            middleware: middleware.into_iter().collect(),
            excludes: Vec::new(),
        }
    }

    pub fn registrations(&self) -> &[MiddlewareRegistration] {
        &self.registrations
    }

    pub fn into_registrations(self) -> Vec<MiddlewareRegistration> {
        self.registrations
    }
}

pub struct MiddlewareBuilder<'a> {
    consumer: &'a mut MiddlewareConsumer,
    middleware: Vec<Provided<dyn Middleware>>,
    excludes: Vec<RouteRule>,
}

impl<'a> MiddlewareBuilder<'a> {
    pub fn exclude<R: Into<RouteRule>>(mut self, rules: impl IntoIterator<Item = R>) -> Self {
        self.excludes.extend(rules.into_iter().map(Into::into));
        self
    }

    pub fn for_routes<R: Into<RouteRule>>(self, rules: impl IntoIterator<Item = R>) -> &'a mut MiddlewareConsumer {
        self.consumer.registrations.push(MiddlewareRegistration {
            middleware: self.middleware,
            routes: rules.into_iter().map(Into::into).collect(),
            excludes: self.excludes,
        });
        self.consumer
    }
}
