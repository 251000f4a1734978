use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use mirra_core::{BuildError, BuildReason, BuildRunConfig, DiagnosticKind, Pipeline};

struct Site {
    dir: tempfile::TempDir,
}

impl Site {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/layouts")).unwrap();
        fs::create_dir_all(dir.path().join("src/components")).unwrap();
        Self { dir }
    }

    fn src(&self, rel: &str) -> PathBuf {
        self.dir.path().join("src").join(rel)
    }

    fn out(&self, rel: &str) -> PathBuf {
        self.dir.path().join("docs").join(rel)
    }

    fn write(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.src(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.out(rel)).unwrap()
    }

    fn config(&self) -> BuildRunConfig {
        BuildRunConfig::new()
            .source_dir(self.dir.path().join("src"))
            .output_dir(self.dir.path().join("docs"))
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.config()).unwrap()
    }
}

fn touch_ahead(path: &Path, secs: u64) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(secs))
        .unwrap();
}

#[tokio::test]
async fn test_markdown_page_with_layout() {
    let site = Site::new();
    site.write(
        "layouts/default.html",
        "<html><head><title>{{ title || Site }}</title></head><body><main>{{ content }}</main></body></html>",
    );
    site.write("about.md", "---\nlayout: default.html\n---\n# About\nHello");

    let report = site.pipeline().run_build(false).await.unwrap();

    let html = site.read("about.html");
    assert!(html.contains("<title>Site</title>"));
    assert!(html.contains("<h1>About</h1>\n<p>Hello</p>"));
    assert!(!site.out("about.md").exists());
    assert!(!site.out("layouts").exists());
    assert!(report.is_clean());
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].title, "Site");
    assert_eq!(report.pages[0].url, "/about.html");
    assert_eq!(report.pages[0].content, "About Hello");
}

#[tokio::test]
async fn test_assets_are_copied_verbatim() {
    let site = Site::new();
    let bytes = [0u8, 159, 146, 150, b'{', b'{'];
    let path = site.src("img/logo.bin");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, bytes).unwrap();
    site.write("style.css", "body { content: '{{ x }}' }");

    let report = site.pipeline().run_build(false).await.unwrap();

    assert_eq!(fs::read(site.out("img/logo.bin")).unwrap(), bytes);
    assert_eq!(site.read("style.css"), "body { content: '{{ x }}' }");
    assert_eq!(report.copied.len(), 2);
    assert!(report.rendered.is_empty());
}

#[tokio::test]
async fn test_second_run_writes_nothing() {
    let site = Site::new();
    site.write("layouts/default.html", "<title>{{ title }}</title>{{ content }}");
    site.write("components/nav.html", "<nav>{{ title }}</nav>");
    site.write("index.html", "---\nlayout: default.html\ntitle: Home\n---\n<!-- nav.html --><p>Hi</p>");
    site.write("blog/post.md", "# Post");
    site.write("style.css", "body {}");

    let pipeline = site.pipeline();
    let first = pipeline.run_build(false).await.unwrap();
    assert_eq!(first.rendered.len(), 2);
    assert!(first.index_written);
    assert!(first.marker_written);

    let second = pipeline.run_build(false).await.unwrap();
    assert_eq!(second.writes(), 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.pages, first.pages);
}

#[tokio::test]
async fn test_forced_rebuild() {
    let site = Site::new();
    site.write("index.html", "<p>Hi</p>");
    site.write("style.css", "body {}");

    let pipeline = site.pipeline();
    pipeline.run_build(false).await.unwrap();
    let report = pipeline.run_build(true).await.unwrap();

    assert_eq!(report.rendered.len() + report.copied.len(), 2);
    assert!(
        report
            .rendered
            .iter()
            .chain(&report.copied)
            .all(|a| a.reason == BuildReason::Forced)
    );
}

#[tokio::test]
async fn test_shared_template_change_invalidates_markup() {
    let site = Site::new();
    let component = site.write("components/footer.html", "<footer>v1</footer>");
    site.write("index.html", "<!-- footer.html -->");
    site.write("about.md", "About");
    site.write("style.css", "body {}");

    let pipeline = site.pipeline();
    pipeline.run_build(false).await.unwrap();

    fs::write(&component, "<footer>v2</footer>").unwrap();
    touch_ahead(&component, 60);
    let report = pipeline.run_build(false).await.unwrap();

    assert_eq!(report.rendered.len(), 2);
    assert!(
        report
            .rendered
            .iter()
            .all(|a| a.reason == BuildReason::SharedTemplateChanged)
    );
    assert!(report.copied.is_empty());
    assert_eq!(site.read("index.html"), "<footer>v2</footer>");
}

#[tokio::test]
async fn test_source_change_rebuilds_only_that_file() {
    let site = Site::new();
    let page = site.write("index.html", "v1");
    site.write("other.html", "other");

    let pipeline = site.pipeline();
    pipeline.run_build(false).await.unwrap();

    fs::write(&page, "v2").unwrap();
    touch_ahead(&page, 60);
    let report = pipeline.run_build(false).await.unwrap();

    assert_eq!(report.rendered.len(), 1);
    assert_eq!(report.rendered[0].reason, BuildReason::SourceModified);
    assert_eq!(site.read("index.html"), "v2");
}

#[tokio::test]
async fn test_deletions_are_mirrored() {
    let site = Site::new();
    let css = site.write("style.css", "body {}");
    site.write("about.md", "# About");
    site.write("old/page.html", "old");

    let pipeline = site.pipeline();
    pipeline.run_build(false).await.unwrap();
    assert!(site.out("old/page.html").exists());

    fs::remove_file(css).unwrap();
    fs::remove_dir_all(site.src("old")).unwrap();
    let report = pipeline.run_build(false).await.unwrap();

    assert!(!site.out("style.css").exists());
    assert!(!site.out("old").exists());
    assert!(site.out("about.html").exists());
    assert!(site.out("pages.json").exists());
    assert!(site.out(".nojekyll").exists());
    assert_eq!(report.deleted.len(), 2);
    assert!(report.index_written);
}

#[tokio::test]
async fn test_cname_is_restored_into_source() {
    let site = Site::new();
    site.write("index.html", "home");
    let pipeline = site.pipeline();
    pipeline.run_build(false).await.unwrap();
    fs::write(site.out("CNAME"), "example.org").unwrap();

    let report = pipeline.run_build(false).await.unwrap();

    assert_eq!(fs::read_to_string(site.src("CNAME")).unwrap(), "example.org");
    assert!(site.out("CNAME").exists());
    assert_eq!(report.restored, vec![pipeline.config().source.join("CNAME")]);
}

#[tokio::test]
async fn test_component_scoping() {
    let site = Site::new();
    site.write("components/c.html", "[{{a}} {{b}}]");
    site.write("page.html", "---\na: 2\nb: 3\n---\n<!-- c.html, {a: 1} --> {{a}}");

    let report = site.pipeline().run_build(false).await.unwrap();

    assert_eq!(site.read("page.html"), "[1 3] 2");
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn test_template_errors_do_not_stop_the_build() {
    let site = Site::new();
    site.write("components/loop.html", "<!-- loop.html -->");
    site.write("broken.html", "<!-- missing.html -->\n{{ nobody }}\n<!-- loop.html -->");
    site.write("fine.html", "ok");

    let report = site.pipeline().run_build(false).await.unwrap();

    assert_eq!(
        site.read("broken.html"),
        "<!-- missing.html -->\n{{ nobody }}\n<!-- loop.html -->"
    );
    assert_eq!(site.read("fine.html"), "ok");
    assert!(report.failures.is_empty());

    let kinds: Vec<_> = report.diagnostics.iter().map(|d| &d.kind).collect();
    assert!(kinds.contains(&&DiagnosticKind::MissingComponent("missing.html".into())));
    assert!(kinds.contains(&&DiagnosticKind::MissingVariable("nobody".into())));
    assert!(
        kinds
            .iter()
            .any(|k| matches!(k, DiagnosticKind::CircularReference(_)))
    );
}

#[tokio::test]
async fn test_unreadable_file_is_isolated() {
    let site = Site::new();
    let bad = site.src("bad.html");
    fs::write(&bad, [0xff, 0xfe, 0xfd]).unwrap();
    site.write("good.html", "good");

    let report = site.pipeline().run_build(false).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("bad.html"));
    assert_eq!(site.read("good.html"), "good");
}

#[tokio::test]
async fn test_not_found_page_is_not_indexed() {
    let site = Site::new();
    site.write("404.html", "<title>Lost</title><main>Nothing here</main>");
    site.write("index.html", "<title>Home</title><main>Welcome</main>");

    let report = site.pipeline().run_build(false).await.unwrap();

    let urls: Vec<_> = report.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec!["/index.html"]);
    assert!(!site.read("pages.json").contains("Lost"));
}

#[tokio::test]
async fn test_missing_components_dir_is_structural() {
    let site = Site::new();
    fs::remove_dir_all(site.src("components")).unwrap();

    let err = Pipeline::new(site.config()).err().unwrap();
    assert!(matches!(err, BuildError::MissingComponentsDir(_)));

    let err = Pipeline::new(site.config().source_dir(site.dir.path().join("nope")))
        .err()
        .unwrap();
    assert!(matches!(err, BuildError::MissingSourceDir(_)));
}

#[tokio::test]
async fn test_observer_runs_after_each_build() {
    let site = Site::new();
    site.write("index.html", "home");
    let calls = Arc::new(AtomicUsize::new(0));

    let pipeline = {
        let calls = calls.clone();
        site.pipeline().on_build_complete(move |report| {
            assert!(!report.pages.is_empty());
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };
    pipeline.run_build(false).await.unwrap();
    pipeline.run_build(false).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(pipeline.build_root().is_absolute());
}

#[tokio::test]
async fn test_failed_write_is_retried_next_run() {
    let site = Site::new();
    let page = site.write("page.html", "<p>fresh</p>");
    touch_ahead(&page, 60);
    // A directory squatting on the output path makes every write fail.
    fs::create_dir_all(site.out("page.html/nested")).unwrap();
    fs::write(site.out("page.html/nested/old.txt"), "old").unwrap();

    let pipeline = site.pipeline();
    for _ in 0..2 {
        let report = pipeline.run_build(false).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("page.html"));
        assert_eq!(report.skipped, 0);
    }

    let leftovers: Vec<_> = fs::read_dir(site.out(""))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".mirra-"))
        .collect();
    assert!(leftovers.is_empty());

    fs::remove_dir_all(site.out("page.html")).unwrap();
    let report = pipeline.run_build(false).await.unwrap();
    assert!(report.failures.is_empty());
    assert_eq!(site.read("page.html"), "<p>fresh</p>");
}

#[tokio::test]
async fn test_index_failure_is_reported_not_fatal() {
    let site = Site::new();
    site.write("index.html", "<title>Home</title>");
    let calls = Arc::new(AtomicUsize::new(0));

    let config = BuildRunConfig {
        index_file: "missing/pages.json".into(),
        ..site.config()
    };
    let pipeline = {
        let calls = calls.clone();
        Pipeline::new(config).unwrap().on_build_complete(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };

    let report = pipeline.run_build(false).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("missing/pages.json"));
    assert!(!report.index_written);
    assert_eq!(report.pages.len(), 1);
    assert_eq!(site.read("index.html"), "<title>Home</title>");
    assert!(report.marker_written);
}

#[tokio::test]
async fn test_markup_wins_over_markdown_for_the_same_output() {
    let site = Site::new();
    site.write("about.md", "# From markdown");
    site.write("about.html", "<p>From markup</p>");

    let pipeline = site.pipeline();
    for _ in 0..2 {
        let report = pipeline.run_build(false).await.unwrap();
        assert_eq!(site.read("about.html"), "<p>From markup</p>");
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("about.md"));
    }
}

#[tokio::test]
async fn test_diagnostic_lines_point_into_the_source() {
    let site = Site::new();
    site.write("page.html", "---\ntitle: A\nauthor: B\n---\n\n\n<!-- missing.html -->");

    let report = site.pipeline().run_build(false).await.unwrap();

    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].line, Some(7));
}
