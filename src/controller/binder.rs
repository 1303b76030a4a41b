use crate::controller::params::{Argument, Arguments, Param, ParamKind, ParamType, ScalarType};
use crate::di::{Container, DependencyResolver, Provided};
use crate::error::Result;
use crate::exception::{FieldErrors, HttpException, Thrown};
use crate::http::{HttpRequest, ResponseHandle};
use crate::module::ResolvedModule;
use crate::pipe::{ArgumentMetadata, Pipe};
use serde_json::{Number, Value};
use std::sync::Arc;

/// A parameter declaration with its own pipes resolved.
#[derive(Clone)]
pub struct CompiledParam {
    param: Param,
    pipes: Vec<Arc<dyn Pipe>>,
}

impl CompiledParam {
    pub fn new(param: Param, pipes: Vec<Arc<dyn Pipe>>) -> Self {
        Self { param, pipes }
    }

    pub fn compile(
        param: Param,
        resolver: &DependencyResolver,
        container: &Container,
        module: &ResolvedModule,
    ) -> Result<Self> {
        let pipes = Provided::resolve_all(&param.pipes, resolver, container, module)?;
        Ok(Self::new(param, pipes))
    }

    pub fn param(&self) -> &Param {
        &self.param
    }
}

/// Extracts, transforms, casts and validates handler arguments.
#[derive(Debug, Clone, Copy)]
pub struct ParameterBinder {
    cast_parameters: bool,
}

impl Default for ParameterBinder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ParameterBinder {
    /// `cast_parameters` applies to parameters without their own cast flag.
    pub fn new(cast_parameters: bool) -> Self {
        Self { cast_parameters }
    }

    /// Bind every parameter in declaration order.
    ///
    /// `pipes` are the request-scoped pipes (global, class, then method)
    /// run before each parameter's own pipes. Rule failures of all
    /// parameters are reported together.
    pub async fn bind(
        &self,
        params: &[CompiledParam],
        pipes: &[Arc<dyn Pipe>],
        request: &Arc<HttpRequest>,
        response: &ResponseHandle,
    ) -> std::result::Result<Arguments, Thrown> {
        let mut arguments = Arguments::new();
        let mut failures = FieldErrors::new();

        for compiled in params {
            let param = &compiled.param;
            let section = match param.kind {
                ParamKind::Request => {
                    arguments.push(&param.name, Argument::Request(Arc::clone(request)));
                    continue;
                }
                ParamKind::Response => {
                    arguments.push(&param.name, Argument::Response(response.clone()));
                    continue;
                }
                ParamKind::Section(section) => section,
            };

            let label = param.label();
            let mut value = request
                .lookup(section, param.key.as_deref())
                .or_else(|| param.default.clone())
                .ok_or_else(|| HttpException::bad_request(format!("Missing required parameter: {label}")))?;

            let metadata = ArgumentMetadata {
                name: &param.name,
                section,
                key: param.key.as_deref(),
            };
            for pipe in pipes.iter().chain(&compiled.pipes) {
                value = pipe.transform(value, metadata).await?;
            }

            let argument = match &param.ty {
                ParamType::Scalar(scalar) => {
                    let cast = param.cast.unwrap_or(self.cast_parameters);
                    Argument::Value(cast_value(value, *scalar, cast, label)?)
                }
                ParamType::Dto(dto) => {
                    let instance = dto.hydrate(value.clone(), label)?;
                    Argument::Object { value, instance }
                }
            };

            let bound = match &argument {
                Argument::Value(value) | Argument::Object { value, .. } => value,
                _ => &Value::Null,
            };
            for rule in &param.rules {
                if let Some(message) = rule.check(bound) {
                    failures.entry(label.to_string()).or_default().push(message);
                }
            }

            tracing::trace!(param = %param.name, %section, "bound parameter");
            arguments.push(&param.name, argument);
        }

        if !failures.is_empty() {
            return Err(HttpException::validation(failures).into());
        }
        Ok(arguments)
    }
}

/// Cast `value` to `scalar`, or fail with a 400 naming the parameter.
///
/// Values already of the right type pass even when casting is off.
pub fn cast_value(value: Value, scalar: ScalarType, cast: bool, key: &str) -> std::result::Result<Value, HttpException> {
    if matches_type(&value, scalar) {
        return Ok(value);
    }
    let mismatch = || HttpException::bad_request(format!("Parameter {key} must be of type {scalar}"));
    if !cast {
        return Err(mismatch());
    }

    let cast = match (scalar, &value) {
        (ScalarType::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (ScalarType::Int, Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| Value::from(f as i64)),
        (ScalarType::Int, Value::Bool(b)) => Some(Value::from(i64::from(*b))),
        (ScalarType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (ScalarType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" | "" => Some(Value::Bool(false)),
            _ => None,
        },
        (ScalarType::Bool, Value::Number(n)) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
        (ScalarType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ScalarType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ScalarType::Array | ScalarType::Object, Value::String(s)) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(|parsed| matches_type(parsed, scalar)),
        _ => None,
    };
    cast.ok_or_else(mismatch)
}

fn matches_type(value: &Value, scalar: ScalarType) -> bool {
    match scalar {
        ScalarType::Any => true,
        ScalarType::Int => value.is_i64() || value.is_u64(),
        ScalarType::Float => value.is_number(),
        ScalarType::Bool => value.is_boolean(),
        ScalarType::String => value.is_string(),
        ScalarType::Array => value.is_array(),
        ScalarType::Object => value.is_object(),
    }
}
