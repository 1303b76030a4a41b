use crate::di::{Dependencies, Injectable};
use crate::pipe::{ArgumentMetadata, Pipe, PipeError, PipeResult};
use async_trait::async_trait;
use serde_json::Value;

/// A pipe that parses a string into an integer
#[derive(Default)]
pub struct ParseIntPipe;

impl Injectable for ParseIntPipe {
    fn construct(_: &mut Dependencies) -> crate::Result<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Pipe for ParseIntPipe {
    async fn transform(&self, value: Value, metadata: ArgumentMetadata<'_>) -> PipeResult<Value> {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| PipeError::Validation(format!("{} must be an integer", metadata.name))),
            _ => Err(PipeError::Validation(format!("{} must be an integer", metadata.name))),
        }
    }
}

/// A pipe that trims surrounding whitespace from strings, recursively
#[derive(Default)]
pub struct TrimPipe;

impl Injectable for TrimPipe {
    fn construct(_: &mut Dependencies) -> crate::Result<Self> {
        Ok(Self)
    }
}

fn trim(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(trim).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, trim(v))).collect()),
        other => other,
    }
}

#[async_trait]
impl Pipe for TrimPipe {
    async fn transform(&self, value: Value, _metadata: ArgumentMetadata<'_>) -> PipeResult<Value> {
        Ok(trim(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Section;
    use serde_json::json;

    const META: ArgumentMetadata<'static> = ArgumentMetadata {
        name: "page",
        section: Section::Query,
        key: Some("page"),
    };

    #[tokio::test]
    async fn parse_int_accepts_numeric_strings() {
        assert_eq!(ParseIntPipe.transform(json!(" 12 "), META).await.unwrap(), json!(12));
        assert_eq!(ParseIntPipe.transform(json!(3), META).await.unwrap(), json!(3));
        let err = ParseIntPipe.transform(json!("twelve"), META).await.unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: page must be an integer");
    }

    #[tokio::test]
    async fn trim_walks_nested_values() {
        let trimmed = TrimPipe
            .transform(json!({"title": "  Hi ", "tags": [" a "]}), META)
            .await
            .unwrap();
        assert_eq!(trimmed, json!({"title": "Hi", "tags": ["a"]}));
    }
}
