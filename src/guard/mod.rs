use crate::context::ExecutionContext;
use crate::exception::Thrown;
use async_trait::async_trait;

/// Standard Result type for Guard
/// Ok(true) means allowed
/// Ok(false) means denied with 401 Unauthorized
/// Err(..) is handled like any other pipeline failure
pub type GuardResult = Result<bool, Thrown>;

/// The Guard trait
/// Implement this to protect routes and hooks
///
/// # Example
/// ```rust,ignore
/// #[derive(Injectable)]
/// struct AdminGuard;
///
/// #[async_trait]
/// impl Guard for AdminGuard {
///     async fn can_activate(&self, ctx: &ExecutionContext) -> GuardResult {
///         let role = ctx.request().and_then(|r| r.attribute("role").cloned());
///         Ok(role.as_ref().and_then(|r| r.as_str()) == Some("admin"))
///     }
/// }
/// ```
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    async fn can_activate(&self, ctx: &ExecutionContext) -> GuardResult;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
