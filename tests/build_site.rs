//! End-to-end builds through the public library API.
//!
//! Each test lays out a small project in a temp directory, builds it and
//! inspects the mirrored output tree.

use sitepress::build::{BuildError, BuildEvent, build_site};
use sitepress::config::CONFIG_FILENAME;
use sitepress::context::{BuildContext, Mode};
use sitepress::optimize::CommandOptimizer;
use sitepress::script::{Bindings, Evaluator, ScriptError, ScriptEvaluator};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const TEMPLATE: &str = "\
<html><head><title>@title@</title>
<link href=\"@page_root@main.css\"></head>
<body>
#content#
</body></html>";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    // Backdate so outputs written by the build are strictly newer.
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        CONFIG_FILENAME,
        r#"{ "cvars": { "title": "Untitled" }, "optimize": {} }"#,
    );
    write(tmp.path(), "template.html", TEMPLATE);
    write(tmp.path(), "site/index.html", "<? cvars.title = \"Home\" ?><p>home</p>");
    write(
        tmp.path(),
        "site/docs/guide/intro.html",
        "<a href=\"@page_root@index.html\">up</a> <img src=\"@data_root@x.png\">",
    );
    write(tmp.path(), "site/main.css", "p {}");
    write(tmp.path(), "site/main.css~", "old");
    tmp
}

fn build(root: &Path, mode: Mode, force: bool) -> Result<sitepress::build::BuildSummary, BuildError> {
    let ctx = BuildContext::load(root, Path::new(CONFIG_FILENAME), mode, force)?;
    let optimizer = CommandOptimizer::new(ctx.config.optimize.clone());
    build_site(&ctx, &ScriptEvaluator, &optimizer, None)
}

#[test]
fn release_build_mirrors_site() {
    let tmp = project();
    let summary = build(tmp.path(), Mode::Release, false).unwrap();
    assert_eq!(summary.generated, 2);
    assert_eq!(summary.copied, 1);
    assert_eq!(summary.skipped, 1);

    let index = fs::read_to_string(tmp.path().join("release/index.html")).unwrap();
    assert_eq!(
        index,
        "<html><head><title>Home</title>\n<link href=\"/main.css\"></head>\n<body>\n<p>home</p>\n</body></html>"
    );
    let intro = fs::read_to_string(tmp.path().join("release/docs/guide/intro.html")).unwrap();
    assert!(intro.contains("<title>Untitled</title>"));
    assert!(intro.contains("<img src=\"/data/x.png\">"));
    assert_eq!(fs::read_to_string(tmp.path().join("release/main.css")).unwrap(), "p {}");
    assert!(!tmp.path().join("release/main.css~").exists());
}

#[test]
fn test_build_links_relative_to_each_page() {
    let tmp = project();
    build(tmp.path(), Mode::Test, false).unwrap();

    let intro = fs::read_to_string(tmp.path().join("test/docs/guide/intro.html")).unwrap();
    assert!(intro.contains("<link href=\"../../main.css\">"));
    assert!(intro.contains("<a href=\"../../index.html\">"));
    assert!(intro.contains("<img src=\"../../data/x.png\">"));

    let index = fs::read_to_string(tmp.path().join("test/index.html")).unwrap();
    assert!(index.contains("<link href=\"main.css\">"));
}

#[test]
fn rebuild_touches_only_stale_files() {
    let tmp = project();
    build(tmp.path(), Mode::Test, false).unwrap();
    let again = build(tmp.path(), Mode::Test, false).unwrap();
    assert_eq!(again.written(), 0);
    assert_eq!(again.up_to_date, 3);

    // Template changes invalidate every output.
    fs::write(tmp.path().join("template.html"), TEMPLATE.replace("<body>", "<body class=\"x\">")).unwrap();
    let after_template = build(tmp.path(), Mode::Test, false).unwrap();
    assert_eq!(after_template.written(), 3);

    let forced = build(tmp.path(), Mode::Test, true).unwrap();
    assert_eq!(forced.written(), 3);
}

#[test]
fn modes_write_separate_trees() {
    let tmp = project();
    build(tmp.path(), Mode::Release, false).unwrap();
    let test = build(tmp.path(), Mode::Test, false).unwrap();
    assert_eq!(test.written(), 3);
    assert!(tmp.path().join("release/index.html").exists());
    assert!(tmp.path().join("test/index.html").exists());
}

#[test]
fn pages_do_not_leak_cvars_into_each_other() {
    let tmp = project();
    write(tmp.path(), "site/a.html", "<? cvars.secret = \"a\" ?>");
    write(tmp.path(), "site/b.html", "<? print(defined(\"secret\")) ?>");
    let ctx = BuildContext::load(tmp.path(), Path::new(CONFIG_FILENAME), Mode::Test, false).unwrap();
    // Sequential, so a leak through shared state would show up deterministically.
    let mut config = ctx.config.clone();
    config.processing.max_processes = Some(1);
    let ctx = BuildContext::from_config(tmp.path(), config, Mode::Test, false, ctx.start).unwrap();
    build_site(&ctx, &ScriptEvaluator, &CommandOptimizer::default(), None).unwrap();

    let b = fs::read_to_string(tmp.path().join("test/b.html")).unwrap();
    assert!(b.contains("\nfalse\n"));
}

#[test]
fn script_error_names_the_page() {
    let tmp = project();
    write(tmp.path(), "site/bad.html", "<?\n  x = 1\n  print(y)\n?>");
    let err = build(tmp.path(), Mode::Test, false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad.html: content code block 1: line 3: undefined variable `y`"
    );
}

#[test]
fn missing_config_uses_defaults() {
    let tmp = project();
    fs::remove_file(tmp.path().join(CONFIG_FILENAME)).unwrap();
    write(tmp.path(), "site/index.html", "<? cvars.title = \"Home\" ?>");
    // Without config cvars the intro page has no title.
    fs::remove_file(tmp.path().join("site/docs/guide/intro.html")).unwrap();
    let summary = build(tmp.path(), Mode::Test, false).unwrap();
    assert_eq!(summary.generated, 1);
}

/// An evaluator that ignores the code and emits a fixed marker, to show the
/// scripting backend is pluggable.
struct Marker;

impl Evaluator for Marker {
    fn evaluate(&self, _code: &str, bindings: &mut Bindings) -> Result<String, ScriptError> {
        bindings.cvars.set("title", "from marker");
        Ok("[marker]".to_string())
    }
}

#[test]
fn custom_evaluator_plugs_in() {
    let tmp = project();
    let ctx = BuildContext::load(tmp.path(), Path::new(CONFIG_FILENAME), Mode::Test, false).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    build_site(&ctx, &Marker, &CommandOptimizer::new(BTreeMap::new()), Some(tx)).unwrap();

    let index = fs::read_to_string(tmp.path().join("test/index.html")).unwrap();
    assert!(index.contains("<title>from marker</title>"));
    assert!(index.contains("[marker]<p>home</p>"));
    assert_eq!(
        rx.iter()
            .filter(|e| matches!(e, BuildEvent::Generated { .. }))
            .count(),
        2
    );
}
