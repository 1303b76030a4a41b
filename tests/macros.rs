use pressmesh::di::{Dependencies, Instance};
use pressmesh::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct Fixed;

impl Clock for Fixed {
    fn now(&self) -> u64 {
        1_700_000_000
    }
}

#[derive(Injectable)]
struct Report {
    clock: Arc<dyn Clock>,
    #[inject(token = "report.title")]
    title: Arc<String>,
    #[inject(default)]
    runs: AtomicUsize,
}

#[derive(Injectable)]
struct Marker;

struct Page;

impl Entity for Page {
    const POST_TYPE: &'static str = "page";
}

#[module(
    providers = [
        Report,
        Provider::provide("report.title").use_value("Weekly".to_string()),
    ],
    entities = [Page],
    exports = [Report, "report.title"],
    global,
)]
#[derive(Default)]
struct ReportsModule;

#[module(imports = [ReportsModule], providers = [Marker], lifecycle)]
#[derive(Default)]
struct SiteModule;

#[async_trait]
impl ModuleLifecycle for SiteModule {}

#[test]
fn derive_lists_dependencies_in_field_order() {
    assert_eq!(
        Report::dependencies(),
        vec![Token::of::<dyn Clock>(), Token::named("report.title")]
    );
    assert!(Marker::dependencies().is_empty());
}

#[test]
fn derive_constructs_from_resolved_dependencies() {
    let clock: Arc<dyn Clock> = Arc::new(Fixed);
    let mut deps = Dependencies::new(vec![
        (Token::of::<dyn Clock>(), Arc::new(clock) as Instance),
        (Token::named("report.title"), Arc::new("Weekly".to_string()) as Instance),
    ]);

    let report = Report::construct(&mut deps).unwrap();
    assert_eq!(report.clock.now(), 1_700_000_000);
    assert_eq!(report.title.as_str(), "Weekly");
    assert_eq!(report.runs.load(Ordering::SeqCst), 0);
    assert_eq!(deps.remaining(), 0);
}

#[test]
fn module_attribute_expands_shorthands() {
    let metadata = ReportsModule.metadata();

    assert!(metadata.global);
    assert_eq!(metadata.providers.len(), 2);
    assert_eq!(metadata.exports, vec![Token::of::<Report>(), Token::named("report.title")]);
    assert_eq!(metadata.entities[0].post_type(), "page");
    assert!(ReportsModule.lifecycle().is_none());
}

#[test]
fn lifecycle_flag_exposes_the_module() {
    let metadata = SiteModule.metadata();

    assert!(!metadata.global);
    assert_eq!(metadata.imports.len(), 1);
    assert!(SiteModule.lifecycle().is_some());
}

#[tokio::test]
async fn unresolvable_trait_dependency_fails_boot() {
    let err = Application::builder()
        .root::<SiteModule>()
        .config(AppConfig::default())
        .build()
        .await
        .err()
        .unwrap();

    assert!(err.to_string().contains("undefined dependency"), "{err}");
}
