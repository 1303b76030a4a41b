use axum::body::Body;
use pressmesh::exception::ExceptionKind;
use pressmesh::http::ResponseBody;
use pressmesh::module::ModuleId;
use pressmesh::prelude::*;
use serde_json::{json, Value};
use std::result::Result;
use std::sync::Mutex;
use tower::ServiceExt;

#[derive(Injectable)]
struct Journal {
    #[inject(default)]
    entries: Mutex<Vec<String>>,
}

impl Journal {
    fn record(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

#[derive(Injectable)]
struct Doubling;

#[async_trait]
impl Interceptor for Doubling {
    async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> InterceptorResult {
        let value = next.run(ctx).await?;
        Ok(json!(value.as_i64().unwrap_or_default() * 2))
    }
}

#[derive(Injectable)]
struct RequireToken;

#[async_trait]
impl Guard for RequireToken {
    async fn can_activate(&self, ctx: &ExecutionContext) -> GuardResult {
        Ok(ctx.request().and_then(|r| r.header("x-token").map(|t| t == "secret")) == Some(true))
    }
}

#[derive(Injectable)]
struct Stamp;

#[async_trait]
impl Middleware for Stamp {
    async fn handle(&self, _request: &mut HttpRequest, response: &mut HttpResponse) -> Result<Outcome, Thrown> {
        response.insert_header("x-stamp", "1");
        Ok(Outcome::Continue)
    }
}

struct OnlyNotFound;

impl ExceptionFilter for OnlyNotFound {
    fn accepts(&self) -> Vec<ExceptionKind> {
        vec![ExceptionKind::NotFound]
    }

    fn catch(&self, _: &HttpException, _: &ArgumentsHost<'_>) -> Result<HttpResponse, Thrown> {
        Ok(HttpResponse::text(StatusCode::NOT_FOUND, "gone"))
    }
}

struct Templates;

impl ViewRenderer for Templates {
    fn render(&self, view: &str, data: &Value) -> anyhow::Result<String> {
        Ok(format!("<{view}>{}</{view}>", data["slug"].as_str().unwrap_or_default()))
    }
}

#[derive(Injectable)]
struct PostsController {
    journal: Arc<Journal>,
}

impl Controller for PostsController {
    fn definition() -> ControllerDefinition<Self> {
        ControllerDefinition::new("posts")
            .interceptor(Provided::<dyn Interceptor>::instance(LoggingInterceptor))
            .route(
                RouteDefinition::new("show")
                    .get("/:id")
                    .param(Param::path("id").int())
                    .handler(|_this: Arc<Self>, _ctx, args: Arguments| async move {
                        let id: i64 = args.get("id")?;
                        Ok(json!({ "id": id }))
                    }),
            )
            .route(
                RouteDefinition::new("double")
                    .get("/double/:n")
                    .param(Param::path("n").int())
                    .interceptor(Provided::<dyn Interceptor>::of::<Doubling>())
                    .handler(|_this: Arc<Self>, _ctx, args: Arguments| async move { args.get::<i64>("n") }),
            )
            .route(
                RouteDefinition::new("create")
                    .post("/")
                    .param(Param::body("title").string().rule(Rule::MinLength(3)))
                    .handler(|this: Arc<Self>, _ctx, args: Arguments| async move {
                        let title: String = args.get("title")?;
                        this.journal.record(format!("created {title}"));
                        Ok(json!({ "title": title }))
                    }),
            )
            .route(
                RouteDefinition::new("drafts")
                    .get("/drafts/all")
                    .guard(Provided::<dyn Guard>::of::<RequireToken>())
                    .handler(|_this: Arc<Self>, _ctx, _args: Arguments| async move { Ok(vec!["draft"]) }),
            )
            .route(
                RouteDefinition::new("page")
                    .get("/page/:slug")
                    .param(Param::path("slug"))
                    .view("article")
                    .handler(|_this: Arc<Self>, _ctx, args: Arguments| async move {
                        Ok(json!({ "slug": args.get::<String>("slug")? }))
                    }),
            )
            .route(
                RouteDefinition::new("broken")
                    .get("/broken/now")
                    .filter(Provided::<dyn ExceptionFilter>::instance(OnlyNotFound))
                    .handler(|_this: Arc<Self>, _ctx, _args: Arguments| async move {
                        Err::<Value, Thrown>(HttpException::bad_request("nope").into())
                    }),
            )
    }
}

struct Never;

#[async_trait]
impl Check for Never {
    async fn check(&self, _ctx: &ExecutionContext) -> bool {
        false
    }
}

#[derive(Injectable)]
struct TitleHooks {
    journal: Arc<Journal>,
}

impl HookSubscriber for TitleHooks {
    fn hooks() -> Vec<HookDefinition<Self>> {
        vec![
            HookDefinition::filter("the_title", "exclaim")
                .priority(20)
                .handler(|_this: Arc<Self>, _ctx, args: Vec<Value>| async move {
                    Ok(format!("{}!", args[0].as_str().unwrap_or_default()))
                }),
            HookDefinition::filter("the_title", "shout").handler(|_this: Arc<Self>, _ctx, args: Vec<Value>| async move {
                Ok(args[0].as_str().unwrap_or_default().to_uppercase())
            }),
            HookDefinition::filter("the_excerpt", "replace")
                .checks(vec![Provided::<dyn Check>::instance(Never)], 0)
                .handler(|_this: Arc<Self>, _ctx, _args: Vec<Value>| async move { Ok("replaced") }),
            HookDefinition::action("save_post", "remember").handler(|this: Arc<Self>, _ctx, args: Vec<Value>| async move {
                this.journal.record(format!("saved {}", args[0]));
                Ok(())
            }),
        ]
    }
}

#[module(providers = [Journal], exports = [Journal], global)]
#[derive(Default)]
struct StorageModule;

#[derive(Injectable)]
struct Revision;

#[derive(Injectable)]
struct Auditor {
    journal: Arc<Journal>,
    revision: Arc<Revision>,
}

#[derive(Injectable)]
struct Reviewer {
    revision: Arc<Revision>,
}

/// Reaches `Journal` through the global `StorageModule` without importing it.
#[module(
    providers = [Auditor, Reviewer, Provider::class::<Revision>().scope(Scope::Transient)],
    exports = [Auditor, Reviewer],
)]
#[derive(Default)]
struct AuditModule;

#[module(imports = [StorageModule, AuditModule])]
#[derive(Default)]
struct ArchiveModule;

#[module(providers = [Journal], global)]
#[derive(Default)]
struct PrivateStorageModule;

#[derive(Injectable)]
struct Archivist {
    journal: Arc<Journal>,
}

#[module(providers = [Archivist])]
#[derive(Default)]
struct ArchivistModule;

#[module(imports = [PrivateStorageModule, ArchivistModule])]
#[derive(Default)]
struct PrivateArchiveModule;

#[module(
    imports = [StorageModule],
    controllers = [PostsController],
    providers = [Provider::subscriber::<TitleHooks>()],
    lifecycle,
)]
#[derive(Default)]
struct BlogModule;

#[async_trait]
impl ModuleLifecycle for BlogModule {
    fn configure(&self, consumer: &mut MiddlewareConsumer) {
        consumer
            .apply([Provided::<dyn Middleware>::of::<Stamp>()])
            .for_routes([RouteRule::from("/posts/:id")]);
    }
}

async fn boot() -> Application {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Application::builder()
        .root::<BlogModule>()
        .config(AppConfig::default())
        .view_renderer(Templates)
        .build()
        .await
        .unwrap()
}

fn json_of(response: &HttpResponse) -> Value {
    response.json_body().cloned().unwrap_or(Value::Null)
}

#[tokio::test]
async fn path_parameters_are_cast() {
    let app = boot().await;
    let response = app.handle(HttpRequest::get("/posts/7")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(&response), json!({ "id": 7 }));
    assert_eq!(response.header("x-stamp"), Some("1"));
}

#[tokio::test]
async fn interceptors_wrap_the_handler() {
    let app = boot().await;
    let response = app.handle(HttpRequest::get("/posts/double/21")).await;

    assert_eq!(json_of(&response), json!(42));
    assert_eq!(response.header("x-stamp"), None);
}

#[tokio::test]
async fn body_parameters_are_required_and_validated() {
    let app = boot().await;

    let missing = app.handle(HttpRequest::post("/posts").with_body(json!({}))).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&missing)["message"], "Missing required parameter: title");

    let short = app.handle(HttpRequest::post("/posts").with_body(json!({ "title": "ab" }))).await;
    assert_eq!(short.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json_of(&short)["data"]["errors"]["title"].is_array());

    let created = app
        .handle(HttpRequest::post("/posts").with_body(json!({ "title": "Hello" })))
        .await;
    assert_eq!(json_of(&created), json!({ "title": "Hello" }));
    assert_eq!(app.resolve::<Journal>().unwrap().entries(), vec!["created Hello"]);
}

#[tokio::test]
async fn guards_deny_without_credentials() {
    let app = boot().await;

    let denied = app.handle(HttpRequest::get("/posts/drafts/all")).await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(&denied)["code"], "unauthorized");

    let allowed = app
        .handle(HttpRequest::get("/posts/drafts/all").with_header("x-token", "secret"))
        .await;
    assert_eq!(json_of(&allowed), json!(["draft"]));
}

#[tokio::test]
async fn views_render_html() {
    let app = boot().await;
    let response = app.handle(HttpRequest::get("/posts/page/hello")).await;

    assert!(matches!(response.body(), ResponseBody::Html(html) if html == "<article>hello</article>"));
}

#[tokio::test]
async fn unmatched_filters_fall_through_to_the_default() {
    let app = boot().await;
    let response = app.handle(HttpRequest::get("/posts/broken/now")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_of(&response),
        json!({ "code": "bad_request", "message": "nope", "data": { "status": 400 } })
    );
}

#[tokio::test]
async fn unknown_paths_and_methods() {
    let app = boot().await;

    let missing = app.handle(HttpRequest::get("/nowhere")).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let wrong = app.handle(HttpRequest::new(Method::DELETE, "/posts/7")).await;
    assert_eq!(wrong.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn router_serves_compiled_routes() {
    let app = boot().await;
    let request = axum::http::Request::builder()
        .uri("/posts/7")
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "id": 7 }));
}

#[tokio::test]
async fn filters_run_by_priority() {
    let app = boot().await;

    let title = app.apply_filters("the_title", json!("hello"), vec![]).await.unwrap();
    assert_eq!(title, json!("HELLO!"));

    let excerpt = app.apply_filters("the_excerpt", json!("original"), vec![]).await.unwrap();
    assert_eq!(excerpt, json!("original"));
}

#[tokio::test]
async fn actions_reach_subscribers() {
    let app = boot().await;
    app.do_action("save_post", vec![json!(12)]).await.unwrap();

    assert_eq!(app.resolve::<Journal>().unwrap().entries(), vec!["saved 12"]);
    assert!(app.hooks().has("save_post"));
}

#[tokio::test]
async fn lifecycle_modules_are_initialized_and_destroyed() {
    let app = boot().await;
    let manager = Arc::clone(app.lifecycle_manager());

    assert_eq!(manager.initialized(), vec![ModuleId::of::<BlogModule>()]);
    app.shutdown().await;
    assert!(manager.initialized().is_empty());
}

#[tokio::test]
async fn global_exports_resolve_without_imports() {
    let app = Application::builder()
        .root::<ArchiveModule>()
        .config(AppConfig::default())
        .build()
        .await
        .unwrap();

    let auditor = app.resolve::<Auditor>().unwrap();
    let journal = app.resolve::<Journal>().unwrap();
    assert!(Arc::ptr_eq(&auditor.journal, &journal));
}

#[tokio::test]
async fn transient_providers_differ_per_dependent() {
    let app = Application::builder()
        .root::<ArchiveModule>()
        .config(AppConfig::default())
        .build()
        .await
        .unwrap();

    let auditor = app.resolve::<Auditor>().unwrap();
    let reviewer = app.resolve::<Reviewer>().unwrap();
    assert!(!Arc::ptr_eq(&auditor.revision, &reviewer.revision));
}

#[tokio::test]
async fn unexported_global_providers_fail_boot() {
    let err = Application::builder()
        .root::<PrivateArchiveModule>()
        .config(AppConfig::default())
        .build()
        .await
        .err()
        .unwrap();

    assert!(err.to_string().contains("global module `PrivateStorageModule`"), "{err}");
    assert!(err.to_string().contains("must be exported before injecting"), "{err}");
}
