use crate::exception::{ArgumentsHost, ExceptionFilter, HttpException, Thrown};
use crate::http::HttpResponse;
use serde_json::{json, Map, Value};

/// The filter of last resort.
///
/// REST requests get `{code, message, data: {status, errors?, reason?, debug?}}`.
/// Other contexts get `{success: false, data: {..}}` JSON when the client asks
/// for it and an HTML page otherwise. `reason` is only shown in debug mode;
/// trace and location only for the configured verbose kinds.
#[derive(Default)]
pub struct DefaultExceptionFilter;

impl DefaultExceptionFilter {
    pub fn render(&self, exception: &HttpException, host: &ArgumentsHost<'_>, raised_by: Option<&str>) -> HttpResponse {
        let config = host.config();
        let status = exception.status();

        let mut data = Map::new();
        if let Some(errors) = exception.errors() {
            data.insert("errors".into(), json!(errors));
        }
        if config.debug {
            if let Some(reason) = exception.reason() {
                data.insert("reason".into(), json!(reason));
            }
        }
        if config.is_verbose(exception.kind()) {
            data.insert("debug".into(), debug_fields(exception, raised_by));
        }

        if host.is_rest() {
            data.insert("status".into(), json!(status.as_u16()));
            return HttpResponse::json(
                status,
                json!({
                    "code": exception.code(),
                    "message": exception.message(),
                    "data": data,
                }),
            );
        }

        if host.context().wants_json() {
            data.insert("statusCode".into(), json!(status.as_u16()));
            data.insert("message".into(), json!(exception.message()));
            data.insert("timestamp".into(), json!(chrono::Utc::now().to_rfc3339()));
            return HttpResponse::json(status, json!({ "success": false, "data": data }));
        }

        let title = format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or("Error"));
        let mut page = format!(
            "<!DOCTYPE html><html><head><title>{title}</title></head><body><h1>{title}</h1><p>{}</p>",
            escape_html(exception.message())
        );
        if let Some(Value::Object(debug)) = data.get("debug") {
            page.push_str("<pre>");
            page.push_str(&escape_html(&serde_json::to_string_pretty(debug).unwrap_or_default()));
            page.push_str("</pre>");
        }
        page.push_str("</body></html>");
        HttpResponse::html(status, page)
    }
}

impl ExceptionFilter for DefaultExceptionFilter {
    fn catch(&self, exception: &HttpException, host: &ArgumentsHost<'_>) -> Result<HttpResponse, Thrown> {
        Ok(self.render(exception, host, None))
    }
}

fn debug_fields(exception: &HttpException, raised_by: Option<&str>) -> Value {
    let location = exception.location();
    let trace: Vec<String> = exception
        .cause()
        .map(|cause| cause.chain().map(ToString::to_string).collect())
        .unwrap_or_default();
    json!({
        "file": location.file(),
        "line": location.line(),
        "trace": trace,
        "filter": raised_by,
    })
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::context::ExecutionContext;
    use crate::exception::{ExceptionKind, FieldErrors};
    use crate::http::{HttpRequest, ResponseBody};
    use std::sync::Arc;

    fn render(ctx: &ExecutionContext, config: &AppConfig, exception: &HttpException) -> HttpResponse {
        DefaultExceptionFilter.render(exception, &ArgumentsHost::new(ctx, config), Some("Filter"))
    }

    #[test]
    fn json_shape_without_debug() {
        let ctx = ExecutionContext::with_request(Arc::new(
            HttpRequest::get("/").with_header("accept", "application/json"),
        ));
        let exception = HttpException::internal("boom").with_reason("disk full");
        let response = render(&ctx, &AppConfig::default(), &exception);

        let body = response.json_body().unwrap();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["data"]["statusCode"], json!(500));
        assert_eq!(body["data"]["message"], json!("boom"));
        assert!(body["data"].get("reason").is_none());
        assert!(body["data"].get("debug").is_none());
        assert!(body["data"]["timestamp"].is_string());
    }

    #[test]
    fn debug_fields_only_for_verbose_kinds() {
        let ctx = ExecutionContext::with_request(Arc::new(
            HttpRequest::get("/").with_header("accept", "application/json"),
        ));
        let config = AppConfig::default().with_debug(true);

        let internal = render(&ctx, &config, &HttpException::internal("boom").with_reason("disk full"));
        let data = &internal.json_body().unwrap()["data"];
        assert_eq!(data["reason"], json!("disk full"));
        assert_eq!(data["debug"]["filter"], json!("Filter"));
        assert_eq!(data["debug"]["file"], json!(file!()));

        let mut errors = FieldErrors::new();
        errors.insert("title".into(), vec!["is required".into()]);
        let validation = render(&ctx, &config, &HttpException::validation(errors));
        let data = &validation.json_body().unwrap()["data"];
        assert_eq!(data["errors"]["title"], json!(["is required"]));
        assert!(data.get("debug").is_none());
        assert!(!config.is_verbose(ExceptionKind::Validation));
    }

    #[test]
    fn html_without_json_preference() {
        let response = render(
            &ExecutionContext::new(),
            &AppConfig::default(),
            &HttpException::not_found("No <route>"),
        );
        assert_eq!(response.status().as_u16(), 404);
        match response.body() {
            ResponseBody::Html(page) => {
                assert!(page.contains("404 Not Found"));
                assert!(page.contains("No &lt;route&gt;"));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }
}
