use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetdag::config::{ConfigFile, RawConfigFile};
use assetdag::errors::AssetdagError;
use assetdag::fs::mock::MockFileSystem;
use assetdag::fs::FileSystem;
use assetdag::pipeline::{Pipeline, PipelineContext};
use assetdag::reload::{ReloadEvent, ReloadHub};
use assetdag_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

const ROOT: &str = "/proj";

fn pipeline_from_toml(name: &str, src: &str) -> Result<Pipeline, Box<dyn Error>> {
    let raw: RawConfigFile = toml::from_str(src)?;
    let cfg = ConfigFile::try_from(raw)?;
    let pipeline_cfg = cfg
        .pipelines()
        .get(name)
        .ok_or_else(|| format!("no pipeline '{name}'"))?;
    Ok(Pipeline::from_config(name, pipeline_cfg)?)
}

fn ctx(fs: &MockFileSystem) -> PipelineContext {
    PipelineContext::new(Arc::new(fs.clone()), ROOT)
}

fn at(rel: &str) -> PathBuf {
    Path::new(ROOT).join(rel)
}

const IMAGES: &str = r#"
[pipeline.images]
src = ["app/images/src/*.*"]
dest = "app/images"

[[pipeline.images.stage]]
kind = "fanout"
branches = [
    [{ kind = "newer", dest = "app/images", extension = "avif" }, { kind = "rename", extension = "avif" }],
    [{ kind = "newer", dest = "app/images", extension = "webp" }, { kind = "rename", extension = "webp" }],
    [{ kind = "newer", dest = "app/images" }],
]
"#;

#[tokio::test]
async fn image_fanout_writes_three_variants_then_nothing() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(at("app/images/src/photo.jpg"), "JPEG");
    let images = pipeline_from_toml("images", IMAGES)?;

    let first = images.run(&ctx(&fs)).await?;
    assert_eq!(first.matched, 1);
    assert_eq!(
        first.written,
        vec![
            PathBuf::from("app/images/photo.avif"),
            PathBuf::from("app/images/photo.webp"),
            PathBuf::from("app/images/photo.jpg"),
        ]
    );
    assert_eq!(fs.write_count(), 3);
    assert!(fs.exists(&at("app/images/photo.avif")));

    // Nothing changed: every output is at least as new as the source.
    let second = images.run(&ctx(&fs)).await?;
    assert!(second.written.is_empty());
    assert_eq!(fs.write_count(), 3);

    Ok(())
}

const IMAGES_NO_SVG_AVIF: &str = r#"
[pipeline.images]
src = ["app/images/src/*.*"]
dest = "app/images"

[[pipeline.images.stage]]
kind = "fanout"
branches = [
    [
        { kind = "filter", src = ["app/images/src/*.*", "!app/images/src/*.svg"] },
        { kind = "rename", extension = "avif" },
    ],
    [{ kind = "rename", extension = "webp" }],
    [],
]
"#;

#[tokio::test]
async fn filtered_branch_skips_vector_images() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(at("app/images/src/icon.svg"), "<svg/>");
    fs.add_file(at("app/images/src/photo.jpg"), "JPEG");
    let images = pipeline_from_toml("images", IMAGES_NO_SVG_AVIF)?;

    let report = images.run(&ctx(&fs)).await?;

    assert_eq!(report.matched, 2);
    assert_eq!(report.written.len(), 5);
    assert!(fs.exists(&at("app/images/photo.avif")));
    assert!(fs.exists(&at("app/images/photo.webp")));
    assert!(fs.exists(&at("app/images/photo.jpg")));
    assert!(!fs.exists(&at("app/images/icon.avif")));
    assert!(fs.exists(&at("app/images/icon.webp")));
    assert!(fs.exists(&at("app/images/icon.svg")));
    Ok(())
}

#[tokio::test]
async fn touched_source_is_rebuilt_and_others_skipped() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(at("app/images/src/a.png"), "A");
    fs.add_file(at("app/images/src/b.png"), "B");
    let images = pipeline_from_toml("images", IMAGES)?;

    images.run(&ctx(&fs)).await?;
    assert_eq!(fs.write_count(), 6);

    fs.add_file(at("app/images/src/b.png"), "B2");
    let report = images.run(&ctx(&fs)).await?;
    assert_eq!(report.written.len(), 3);
    assert!(report.written.iter().all(|p| p.to_string_lossy().contains("/b.")));
    assert_eq!(fs.contents(at("app/images/b.png")), Some(b"B2".to_vec()));

    Ok(())
}

#[tokio::test]
async fn concat_orders_sources_by_pattern_list() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(at("app/js/main.js"), "main()");
    fs.add_file(at("node_modules/jquery/dist/jquery.js"), "jquery()");
    let scripts = pipeline_from_toml(
        "scripts",
        r#"
[pipeline.scripts]
src = ["node_modules/jquery/dist/jquery.js", "app/js/main.js"]
dest = "app/js"

[[pipeline.scripts.stage]]
kind = "concat"
file = "main.min.js"
"#,
    )?;

    let report = scripts.run(&ctx(&fs)).await?;
    assert_eq!(report.matched, 2);
    assert_eq!(report.written, vec![PathBuf::from("app/js/main.min.js")]);
    assert_eq!(
        fs.contents(at("app/js/main.min.js")),
        Some(b"jquery()\nmain()".to_vec())
    );
    Ok(())
}

#[tokio::test]
async fn empty_match_is_silent_unless_required() -> TestResult {
    let fs = MockFileSystem::new();
    let lenient = pipeline_from_toml(
        "styles",
        r#"
[pipeline.styles]
src = ["app/scss/*.scss"]
dest = "app/css"

[[pipeline.styles.stage]]
kind = "concat"
file = "style.min.css"
"#,
    )?;
    let report = lenient.run(&ctx(&fs)).await?;
    assert_eq!(report.matched, 0);
    assert!(report.written.is_empty());
    assert_eq!(fs.write_count(), 0);

    let strict = pipeline_from_toml(
        "styles",
        r#"
[pipeline.styles]
src = ["app/scss/*.scss"]
dest = "app/css"
allow_empty = false
"#,
    )?;
    let err = strict.run(&ctx(&fs)).await.unwrap_err();
    match err {
        AssetdagError::NoMatch { pipeline, patterns } => {
            assert_eq!(pipeline, "styles");
            assert_eq!(patterns, vec!["app/scss/*.scss".to_string()]);
        }
        other => panic!("expected NoMatch, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn explicit_base_keeps_directory_layout() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(at("app/css/style.min.css"), "css");
    fs.add_file(at("app/js/main.min.js"), "js");
    fs.add_file(at("app/index.html"), "<html>");
    fs.add_file(at("app/images/photo.avif"), "avif");
    let build = pipeline_from_toml(
        "build-project",
        r#"
[pipeline.build-project]
src = ["app/css/style.min.css", "app/js/main.min.js", "app/images/*.*", "app/*.html"]
dest = "dist"
base = "app"
"#,
    )?;

    build.run(&ctx(&fs)).await?;

    for out in [
        "dist/css/style.min.css",
        "dist/js/main.min.js",
        "dist/images/photo.avif",
        "dist/index.html",
    ] {
        assert!(fs.is_file(&at(out)), "missing {out}");
    }
    Ok(())
}

#[tokio::test]
async fn add_stage_merges_extra_sources() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(at("app/fonts/src/Inter.ttf"), "ttf");
    fs.add_file(at("app/fonts/src/Mono.woff"), "woff");
    let fonts = pipeline_from_toml(
        "fonts",
        r#"
[pipeline.fonts]
src = ["app/fonts/src/*.ttf"]
dest = "app/fonts"

[[pipeline.fonts.stage]]
kind = "newer"
dest = "app/fonts"
extension = "woff2"

[[pipeline.fonts.stage]]
kind = "rename"
extension = "woff2"

[[pipeline.fonts.stage]]
kind = "add"
src = ["app/fonts/src/*.woff", "app/fonts/src/*.woff2"]
"#,
    )?;

    let report = fonts.run(&ctx(&fs)).await?;
    assert_eq!(
        report.written,
        vec![
            PathBuf::from("app/fonts/Inter.woff2"),
            PathBuf::from("app/fonts/Mono.woff"),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn reload_enabled_sink_announces_each_write() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(at("app/scss/style.scss"), "body{}");
    let styles = pipeline_from_toml(
        "styles",
        r#"
[pipeline.styles]
src = ["app/scss/style.scss"]
dest = "app/css"
reload = true

[[pipeline.styles.stage]]
kind = "rename"
suffix = ".min"
extension = "css"
"#,
    )?;

    let hub = ReloadHub::default();
    let mut rx = hub.subscribe();
    let ctx = ctx(&fs).with_reload(hub);

    styles.run(&ctx).await?;

    assert_eq!(
        rx.recv().await?,
        ReloadEvent::Changed(PathBuf::from("app/css/style.min.css"))
    );
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn command_stage_pipes_through_external_program() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("app/js"))?;
    std::fs::write(dir.path().join("app/js/main.js"), "let x = 1;")?;

    let upper = pipeline_from_toml(
        "scripts",
        r#"
[pipeline.scripts]
src = ["app/js/main.js"]
dest = "app/js"

[[pipeline.scripts.stage]]
kind = "command"
cmd = "tr a-z A-Z"
extension = "min.js"
"#,
    )?;
    let ctx = PipelineContext::new(Arc::new(assetdag::fs::RealFileSystem), dir.path());
    upper.run(&ctx).await?;

    let out = std::fs::read_to_string(dir.path().join("app/js/main.min.js"))?;
    assert_eq!(out, "LET X = 1;");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_rejects_with_transform_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("app/scss"))?;
    std::fs::write(dir.path().join("app/scss/style.scss"), "body {")?;

    let styles = pipeline_from_toml(
        "styles",
        r#"
[pipeline.styles]
src = ["app/scss/style.scss"]
dest = "app/css"

[[pipeline.styles.stage]]
kind = "command"
cmd = "echo 'expected }' >&2; exit 3"
"#,
    )?;
    let ctx = PipelineContext::new(Arc::new(assetdag::fs::RealFileSystem), dir.path());
    let err = styles.run(&ctx).await.unwrap_err();

    match err {
        AssetdagError::Transform { path, message, .. } => {
            assert_eq!(path, PathBuf::from("app/scss/style.scss"));
            assert!(message.contains("expected }"), "message was {message}");
        }
        other => panic!("expected Transform, got {other:?}"),
    }
    assert!(!dir.path().join("app/css").exists());
    Ok(())
}
