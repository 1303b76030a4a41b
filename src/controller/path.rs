use crate::error::{PressmeshError, Result};
use regex::Regex;
use serde_json::{Map, Value};

/// Kind of one path segment. Literals sort before placeholders, which is
/// the precedence matchit gives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Literal,
    Placeholder,
}

/// A route path with `:name` placeholders compiled to a matcher.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    path: String,
    pattern: Regex,
    params: Vec<String>,
    axum_path: String,
    /// Axum path with placeholders renamed by position (`/posts/{p0}`).
    shape: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Compile a path such as `/posts/:id/comments`.
    pub fn parse(path: &str) -> Result<Self> {
        let path = normalize(path);
        let mut pattern = String::from("^");
        let mut axum_path = String::new();
        let mut shape = String::new();
        let mut params = Vec::new();
        let mut segments = Vec::new();

        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            pattern.push('/');
            axum_path.push('/');
            shape.push('/');
            match placeholder(segment) {
                Some(name) => {
                    pattern.push_str(&format!("(?P<{name}>[^/]+)"));
                    axum_path.push_str(&format!("{{{name}}}"));
                    shape.push_str(&format!("{{p{}}}", params.len()));
                    params.push(name.to_string());
                    segments.push(Segment::Placeholder);
                }
                None => {
                    let literal = segment.replace('{', "{{").replace('}', "}}");
                    pattern.push_str(&regex::escape(segment));
                    axum_path.push_str(&literal);
                    shape.push_str(&literal);
                    segments.push(Segment::Literal);
                }
            }
        }
        if axum_path.is_empty() {
            axum_path.push('/');
            shape.push('/');
            pattern.push('/');
        }
        pattern.push_str("/?$");

        let pattern = Regex::new(&pattern)
            .map_err(|e| PressmeshError::route_registration(format!("invalid path `{path}`: {e}")))?;

        Ok(Self {
            path,
            pattern,
            params,
            axum_path,
            shape,
            segments,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The same template in axum syntax (`/posts/{id}`).
    pub fn axum_path(&self) -> &str {
        &self.axum_path
    }

    /// The axum path with placeholder names replaced by their position.
    ///
    /// Two templates with the same shape match exactly the same request
    /// paths, whatever their placeholders are called.
    pub fn shape(&self) -> &str {
        &self.shape
    }

    /// Segment kinds in order; the smaller of two matching templates is
    /// the more specific one.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// Placeholder values for a concrete path.
    pub fn captures(&self, path: &str) -> Option<Map<String, Value>> {
        let captures = self.pattern.captures(path)?;
        Some(
            self.params
                .iter()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|value| (name.clone(), Value::String(value.as_str().to_string())))
                })
                .collect(),
        )
    }
}

fn placeholder(segment: &str) -> Option<&str> {
    let name = segment.strip_prefix(':')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    (first.is_ascii_alphabetic() || first == '_')
        .then_some(name)
        .filter(|_| chars.all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

/// Collapse slashes: `posts//`, `/posts` and `posts` all become `/posts`.
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Namespace and route path as one normalized path.
pub fn join(namespace: &str, path: &str) -> String {
    normalize(&format!("{namespace}/{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholders_capture_segments() {
        let template = PathTemplate::parse("/posts/:id/comments/:comment_id").unwrap();
        assert_eq!(template.params(), ["id", "comment_id"]);
        assert_eq!(template.axum_path(), "/posts/{id}/comments/{comment_id}");

        let captures = template.captures("/posts/7/comments/9").unwrap();
        assert_eq!(captures["id"], json!("7"));
        assert_eq!(captures["comment_id"], json!("9"));
        assert!(template.captures("/posts/7").is_none());
    }

    #[test]
    fn shapes_ignore_placeholder_names() {
        let by_id = PathTemplate::parse("/users/:id").unwrap();
        let by_slug = PathTemplate::parse("/users/:slug").unwrap();
        assert_eq!(by_id.shape(), "/users/{p0}");
        assert_eq!(by_id.shape(), by_slug.shape());
        assert_ne!(by_id.axum_path(), by_slug.axum_path());
    }

    #[test]
    fn literal_segments_outrank_placeholders() {
        let admin = PathTemplate::parse("/users/admin").unwrap();
        let by_id = PathTemplate::parse("/users/:id").unwrap();
        assert!(admin.is_match("/users/admin") && by_id.is_match("/users/admin"));
        assert!(admin.segments() < by_id.segments());
        assert_eq!(by_id.segments(), [Segment::Literal, Segment::Placeholder]);
    }

    #[test]
    fn literal_braces_are_escaped_for_axum() {
        let template = PathTemplate::parse("/raw/{x}").unwrap();
        assert_eq!(template.axum_path(), "/raw/{{x}}");
        assert!(template.is_match("/raw/{x}"));
    }

    #[test]
    fn literals_are_escaped() {
        let template = PathTemplate::parse("/feed.xml").unwrap();
        assert!(template.is_match("/feed.xml"));
        assert!(!template.is_match("/feedxxml"));
    }

    #[test]
    fn joins_namespace_and_path() {
        assert_eq!(join("blog/v1/", "/posts/:id"), "/blog/v1/posts/:id");
        assert_eq!(join("", ""), "/");
        assert!(PathTemplate::parse("/").unwrap().is_match("/"));
        assert!(PathTemplate::parse("/posts").unwrap().is_match("/posts/"));
    }

    #[test]
    fn malformed_placeholders_are_literal() {
        let template = PathTemplate::parse("/a/:1b").unwrap();
        assert!(template.params().is_empty());
        assert!(template.is_match("/a/:1b"));
    }
}
