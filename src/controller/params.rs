use crate::di::{Instance, Provided};
use crate::exception::{HttpException, Thrown};
use crate::http::{HttpRequest, ResponseHandle, Section};
use crate::pipe::Pipe;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use strum_macros::Display;
use validator::{Validate, ValidateEmail, ValidationErrors, ValidationErrorsKind};

use crate::exception::FieldErrors;

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Section(Section),
    /// The raw request.
    Request,
    /// The response draft.
    Response,
}

/// Built-in parameter types values are cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ScalarType {
    Any,
    Int,
    Float,
    Bool,
    String,
    Array,
    Object,
}

type Hydrate = Arc<dyn Fn(Value, &str) -> Result<Instance, HttpException> + Send + Sync>;

/// Deserializes and validates a DTO.
#[derive(Clone)]
pub struct DtoBinder {
    type_name: &'static str,
    hydrate: Hydrate,
}

impl DtoBinder {
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Validate + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            hydrate: Arc::new(|value, key| {
                let dto: T = serde_json::from_value(value).map_err(|e| {
                    let mut errors = FieldErrors::new();
                    errors.insert(key.to_string(), vec![e.to_string()]);
                    HttpException::validation(errors)
                })?;
                dto.validate()
                    .map_err(|errors| HttpException::validation(flatten_errors(&errors)))?;
                Ok(Arc::new(dto) as Instance)
            }),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn hydrate(&self, value: Value, key: &str) -> Result<Instance, HttpException> {
        (self.hydrate)(value, key)
    }
}

/// `validator` errors keyed by dotted field path (`author.email`, `tags[1].name`).
pub fn flatten_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut flat = FieldErrors::new();
    collect_errors(errors, "", &mut flat);
    flat
}

fn collect_errors(errors: &ValidationErrors, prefix: &str, flat: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(failures) => {
                let messages = flat.entry(path).or_default();
                for failure in failures {
                    messages.push(
                        failure
                            .message
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| format!("failed `{}` validation", failure.code)),
                    );
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_errors(nested, &path, flat),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_errors(nested, &format!("{path}[{index}]"), flat);
                }
            }
        }
    }
}

#[derive(Clone)]
pub enum ParamType {
    Scalar(ScalarType),
    Dto(DtoBinder),
}

impl fmt::Debug for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::Dto(dto) => write!(f, "dto {}", dto.type_name()),
        }
    }
}

type CustomCheck = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Explicit validation rule on a bound value.
#[derive(Clone)]
pub enum Rule {
    /// Not null, not an empty string, not an empty array.
    Required,
    Min(f64),
    Max(f64),
    /// Characters of a string or items of an array.
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    Email,
    OneOf(Vec<Value>),
    Custom { message: String, check: CustomCheck },
}

impl Rule {
    pub fn custom(message: impl Into<String>, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom {
            message: message.into(),
            check: Arc::new(check),
        }
    }

    /// The failure message, or `None` when `value` passes.
    pub fn check(&self, value: &Value) -> Option<String> {
        match self {
            Self::Required => match value {
                Value::Null => Some("is required".into()),
                Value::String(s) if s.is_empty() => Some("is required".into()),
                Value::Array(items) if items.is_empty() => Some("is required".into()),
                _ => None,
            },
            Self::Min(min) => match as_number(value) {
                Some(n) if n < *min => Some(format!("must be at least {min}")),
                Some(_) => None,
                None => Some("must be a number".into()),
            },
            Self::Max(max) => match as_number(value) {
                Some(n) if n > *max => Some(format!("must be at most {max}")),
                Some(_) => None,
                None => Some("must be a number".into()),
            },
            Self::MinLength(min) => match length(value) {
                Some(len) if len < *min => Some(format!("must have a length of at least {min}")),
                Some(_) => None,
                None => Some("must be a string or an array".into()),
            },
            Self::MaxLength(max) => match length(value) {
                Some(len) if len > *max => Some(format!("must have a length of at most {max}")),
                Some(_) => None,
                None => Some("must be a string or an array".into()),
            },
            Self::Pattern(pattern) => match value.as_str() {
                Some(s) if pattern.is_match(s) => None,
                Some(_) => Some(format!("must match {}", pattern.as_str())),
                None => Some("must be a string".into()),
            },
            Self::Email => match value.as_str() {
                Some(s) if s.validate_email() => None,
                _ => Some("must be a valid email address".into()),
            },
            Self::OneOf(allowed) => {
                if allowed.contains(value) {
                    None
                } else {
                    Some(format!("must be one of {}", Value::Array(allowed.clone())))
                }
            }
            Self::Custom { message, check } => (!check(value)).then(|| message.clone()),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("Required"),
            Self::Min(n) => write!(f, "Min({n})"),
            Self::Max(n) => write!(f, "Max({n})"),
            Self::MinLength(n) => write!(f, "MinLength({n})"),
            Self::MaxLength(n) => write!(f, "MaxLength({n})"),
            Self::Pattern(p) => write!(f, "Pattern({})", p.as_str()),
            Self::Email => f.write_str("Email"),
            Self::OneOf(values) => write!(f, "OneOf({values:?})"),
            Self::Custom { message, .. } => write!(f, "Custom({message})"),
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// A handler parameter declaration.
///
/// # Example
/// ```rust,ignore
/// RouteDefinition::new("update")
///     .put("/:id")
///     .param(Param::path("id").int())
///     .param(Param::body("title").string().rule(Rule::MinLength(3)))
///     .param(Param::query("notify").bool().default(false))
/// ```
#[derive(Clone)]
pub struct Param {
    pub(crate) name: String,
    pub(crate) kind: ParamKind,
    pub(crate) key: Option<String>,
    pub(crate) ty: ParamType,
    pub(crate) default: Option<Value>,
    pub(crate) cast: Option<bool>,
    pub(crate) pipes: Vec<Provided<dyn Pipe>>,
    pub(crate) rules: Vec<Rule>,
}

impl Param {
    fn new(kind: ParamKind, key: Option<&str>, name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            key: key.map(str::to_string),
            ty: ParamType::Scalar(ScalarType::Any),
            default: None,
            cast: None,
            pipes: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn body(key: &str) -> Self {
        Self::new(ParamKind::Section(Section::Body), Some(key), key)
    }

    /// The whole body.
    pub fn body_all() -> Self {
        Self::new(ParamKind::Section(Section::Body), None, "body")
    }

    pub fn query(key: &str) -> Self {
        Self::new(ParamKind::Section(Section::Query), Some(key), key)
    }

    /// Every query parameter as an object.
    pub fn query_all() -> Self {
        Self::new(ParamKind::Section(Section::Query), None, "query")
    }

    pub fn path(key: &str) -> Self {
        Self::new(ParamKind::Section(Section::Path), Some(key), key)
    }

    pub fn request() -> Self {
        Self::new(ParamKind::Request, None, "request")
    }

    pub fn response() -> Self {
        Self::new(ParamKind::Response, None, "response")
    }

    /// Name the argument is looked up by in [`Arguments`].
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn int(self) -> Self {
        self.scalar(ScalarType::Int)
    }

    pub fn float(self) -> Self {
        self.scalar(ScalarType::Float)
    }

    pub fn bool(self) -> Self {
        self.scalar(ScalarType::Bool)
    }

    pub fn string(self) -> Self {
        self.scalar(ScalarType::String)
    }

    pub fn array(self) -> Self {
        self.scalar(ScalarType::Array)
    }

    pub fn object(self) -> Self {
        self.scalar(ScalarType::Object)
    }

    fn scalar(mut self, scalar: ScalarType) -> Self {
        self.ty = ParamType::Scalar(scalar);
        self
    }

    /// Hydrate `T` and run its `validator` rules.
    pub fn dto<T>(mut self) -> Self
    where
        T: DeserializeOwned + Validate + Send + Sync + 'static,
    {
        self.ty = ParamType::Dto(DtoBinder::of::<T>());
        self
    }

    /// Value used when the key is absent; still cast and validated.
    pub fn default(mut self, value: impl Serialize) -> Self {
        self.default = Some(serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    pub fn cast(mut self, cast: bool) -> Self {
        self.cast = Some(cast);
        self
    }

    pub fn no_cast(self) -> Self {
        self.cast(false)
    }

    pub fn pipe(mut self, pipe: Provided<dyn Pipe>) -> Self {
        self.pipes.push(pipe);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Key used in messages: the lookup key, or the argument name.
    pub fn label(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("ty", &self.ty)
            .field("rules", &self.rules)
            .finish()
    }
}

/// A bound handler argument.
#[derive(Clone)]
pub enum Argument {
    Value(Value),
    Object { value: Value, instance: Instance },
    Request(Arc<HttpRequest>),
    Response(ResponseHandle),
}

/// Arguments for a handler, looked up by parameter name.
#[derive(Clone, Default)]
pub struct Arguments {
    items: Vec<(String, Argument)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, argument: Argument) {
        self.items.push((name.into(), argument));
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.items.iter().find(|(n, _)| n == name).map(|(_, argument)| argument)
    }

    /// The bound JSON value (also available for DTO parameters).
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.argument(name)? {
            Argument::Value(value) | Argument::Object { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Deserialize a bound value.
    #[track_caller]
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, Thrown> {
        let value = self
            .value(name)
            .ok_or_else(|| HttpException::internal(format!("No bound parameter named `{name}`")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| HttpException::bad_request(format!("Invalid parameter `{name}`: {e}")).into())
    }

    /// The hydrated DTO of a `Param::dto` parameter.
    #[track_caller]
    pub fn dto<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, Thrown> {
        match self.argument(name) {
            Some(Argument::Object { instance, .. }) => Arc::clone(instance)
                .downcast::<T>()
                .map_err(|_| HttpException::internal(format!("Parameter `{name}` is not a {}", std::any::type_name::<T>())).into()),
            _ => Err(HttpException::internal(format!("No DTO parameter named `{name}`")).into()),
        }
    }

    pub fn request(&self) -> Option<Arc<HttpRequest>> {
        self.items.iter().find_map(|(_, argument)| match argument {
            Argument::Request(request) => Some(Arc::clone(request)),
            _ => None,
        })
    }

    pub fn response(&self) -> Option<ResponseHandle> {
        self.items.iter().find_map(|(_, argument)| match argument {
            Argument::Response(response) => Some(response.clone()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rules_report_failures() {
        assert_eq!(Rule::Required.check(&json!("")), Some("is required".into()));
        assert_eq!(Rule::Min(3.0).check(&json!(2)), Some("must be at least 3".into()));
        assert_eq!(Rule::Max(3.0).check(&json!("2")), None);
        assert!(Rule::MinLength(3).check(&json!("ab")).is_some());
        assert!(Rule::MaxLength(1).check(&json!([1, 2])).is_some());
        assert!(Rule::Pattern(Regex::new(r"^\d+$").unwrap()).check(&json!("12a")).is_some());
        assert!(Rule::Email.check(&json!("ann@example.com")).is_none());
        assert!(Rule::Email.check(&json!("ann@localhost")).is_none());
        assert!(Rule::Email.check(&json!("a@-b.com")).is_some());
        assert!(Rule::Email.check(&json!("a@b_c.com")).is_some());
        assert!(Rule::Email.check(&json!(42)).is_some());
        assert!(Rule::OneOf(vec![json!("draft"), json!("publish")]).check(&json!("trash")).is_some());
        assert!(Rule::custom("must be even", |v| v.as_i64().is_some_and(|n| n % 2 == 0)).check(&json!(3)).is_some());
    }

    #[test]
    fn arguments_deserialize_by_name() {
        let mut args = Arguments::new();
        args.push("id", Argument::Value(json!(7)));
        args.push("tags", Argument::Value(json!(["a", "b"])));

        assert_eq!(args.get::<i64>("id").unwrap(), 7);
        assert_eq!(args.get::<Vec<String>>("tags").unwrap(), vec!["a", "b"]);
        assert!(matches!(args.get::<i64>("missing"), Err(Thrown::Http(_))));
        assert!(args.request().is_none());
    }

    #[test]
    fn defaults_are_serialized() {
        let param = Param::query("page").int().default(1);
        assert_eq!(param.default, Some(json!(1)));
        assert_eq!(param.label(), "page");
        assert_eq!(Param::body_all().label(), "body");
    }
}
