use std::error::Error;
use std::fs;

use assetdag::config::{load_and_validate, StageConfig, TaskConfig};
use assetdag::errors::AssetdagError;
use assetdag::tasks::{TaskDef, TaskGraph};
use assetdag::{render_dry_run, render_list};
use assetdag_test_utils::builders::{
    reload_binding, run_binding, ConfigFileBuilder, PipelineConfigBuilder,
};

type TestResult = Result<(), Box<dyn Error>>;

const DEMO: &str = include_str!("../demos/Assetdag.toml");

#[test]
fn demo_config_loads_into_task_graph() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Assetdag.toml");
    fs::write(&path, DEMO)?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.config.default_task, "default");
    assert_eq!(
        cfg.tasks()["build"],
        TaskConfig::Sequence(vec!["clean-dist".into(), "build-project".into()])
    );
    match &cfg.pipelines()["images"].stages[0] {
        StageConfig::Fanout(fanout) => assert_eq!(fanout.branches.len(), 3),
        other => panic!("expected fanout, got {other:?}"),
    }

    let graph = TaskGraph::from_config(&cfg)?;
    assert!(matches!(graph.get("clean-dist"), Some(TaskDef::Clean(_))));
    assert!(matches!(graph.get("default"), Some(TaskDef::Parallel(_))));
    assert!(matches!(graph.get("watching"), Some(TaskDef::Watch(_))));
    assert!(graph.reaches_watch("default"));
    assert!(!graph.reaches_watch("build"));
    Ok(())
}

#[test]
fn list_and_dry_run_rendering() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_clean("clean-dist", "dist")
        .with_pipeline(
            "build-project",
            PipelineConfigBuilder::new(&["app/*.html"], "dist").base("app").build(),
        )
        .with_pipeline(
            "pages",
            PipelineConfigBuilder::new(&["app/pages/*.html"], "app").build(),
        )
        .with_sequence("build", &["clean-dist", "build-project"])
        .with_watch(
            "watching",
            vec![run_binding(&["app/pages/*"], "pages"), reload_binding(&["app/*.html"])],
        )
        .build();
    let graph = TaskGraph::from_config(&cfg)?;

    let list = render_list(&graph);
    assert!(list.lines().any(|l| l.starts_with("build ") && l.ends_with("sequence")));
    assert!(list.lines().any(|l| l.starts_with("watching") && l.ends_with("watch")));

    let plan = render_dry_run(&graph, "build");
    let lines: Vec<&str> = plan.lines().collect();
    assert_eq!(lines[1], "  build (sequence)");
    assert!(lines[2].starts_with("    clean-dist (clean): dist"));
    assert!(lines[3].starts_with("    build-project (pipeline)"));

    let watch_plan = render_dry_run(&graph, "watching");
    assert!(watch_plan.contains("-> run pages"));
    assert!(watch_plan.contains("-> reload"));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, AssetdagError::Io { .. }));
}

#[test]
fn unknown_stage_kind_is_a_parse_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Assetdag.toml");
    fs::write(
        &path,
        r#"
[pipeline.styles]
src = ["app/scss/style.scss"]
dest = "app/css"

[[pipeline.styles.stage]]
kind = "minify"
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, AssetdagError::Toml(_)));
    Ok(())
}

#[test]
fn sequence_with_unknown_child_is_rejected() {
    let err = ConfigFileBuilder::new()
        .with_clean("clean-dist", "dist")
        .with_sequence("build", &["clean-dist", "build-project"])
        .try_build()
        .unwrap_err();
    match err {
        AssetdagError::Config(msg) => assert!(msg.contains("build-project")),
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn invalid_glob_is_rejected() {
    let err = ConfigFileBuilder::new()
        .with_pipeline("bad", PipelineConfigBuilder::new(&["app/[js"], "out").build())
        .try_build()
        .unwrap_err();
    assert!(matches!(err, AssetdagError::Glob(_)));
}

#[test]
fn empty_config_is_rejected() {
    let err = ConfigFileBuilder::new().try_build().unwrap_err();
    assert!(matches!(err, AssetdagError::Config(_)));
}
