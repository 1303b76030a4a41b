use serde_json::Value;

/// Templating collaborator used by routes that declare a view.
///
/// # Example
/// ```rust,ignore
/// struct Templates(tera::Tera);
///
/// impl ViewRenderer for Templates {
///     fn render(&self, view: &str, data: &Value) -> anyhow::Result<String> {
///         let context = tera::Context::from_serialize(data)?;
///         Ok(self.0.render(view, &context)?)
///     }
/// }
/// ```
pub trait ViewRenderer: Send + Sync + 'static {
    fn render(&self, view: &str, data: &Value) -> anyhow::Result<String>;
}
