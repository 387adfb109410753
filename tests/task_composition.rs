use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetdag::errors::AssetdagError;
use assetdag::fs::mock::MockFileSystem;
use assetdag::fs::FileSystem;
use assetdag::pipeline::{
    DestSink, FileRecord, Pipeline, PipelineContext, SourceSet, Stage, StageFuture,
};
use assetdag::tasks::{TaskGraph, TaskRunner};
use assetdag_test_utils::builders::{ConfigFileBuilder, PipelineConfigBuilder};
use assetdag_test_utils::{init_tracing, with_timeout};
use proptest::prelude::*;

type TestResult = Result<(), Box<dyn Error>>;

const ROOT: &str = "/proj";

fn at(rel: &str) -> PathBuf {
    Path::new(ROOT).join(rel)
}

/// Sleeps, records its label, and passes records through.
#[derive(Debug)]
struct Probe {
    label: String,
    delay: Duration,
    log: Arc<Mutex<Vec<String>>>,
}

impl Stage for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    fn apply<'a>(&'a self, _ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.log.lock().unwrap().push(self.label.clone());
            Ok(records)
        })
    }
}

fn probed(
    name: &str,
    src: &str,
    dest: &str,
    delay: Duration,
    log: &Arc<Mutex<Vec<String>>>,
) -> Pipeline {
    let probe = Probe {
        label: name.to_string(),
        delay,
        log: Arc::clone(log),
    };
    Pipeline::new(
        name,
        SourceSet::new(&[src.to_string()], None).unwrap(),
        vec![Box::new(probe)],
        DestSink::new(dest, false),
    )
}

/// Panics on any input.
#[derive(Debug)]
struct Explode;

impl Stage for Explode {
    fn name(&self) -> &str {
        "explode"
    }

    fn apply<'a>(&'a self, _ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a> {
        Box::pin(async move {
            if !records.is_empty() {
                panic!("stage exploded");
            }
            Ok(records)
        })
    }
}

fn missing(name: &str) -> Pipeline {
    Pipeline::new(
        name,
        SourceSet::new(&["does/not/exist/*.css".to_string()], None).unwrap(),
        Vec::new(),
        DestSink::new("out", false),
    )
    .require_match()
}

fn runner(graph: TaskGraph, fs: &MockFileSystem) -> TaskRunner {
    TaskRunner::new(graph, PipelineContext::new(Arc::new(fs.clone()), ROOT))
}

#[tokio::test]
async fn sequence_stops_at_first_failure() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(at("src/b.txt"), "b");
    let log = Arc::new(Mutex::new(Vec::new()));

    let graph = TaskGraph::builder()
        .pipeline("a", missing("a"))
        .pipeline("b", probed("b", "src/b.txt", "out", Duration::ZERO, &log))
        .sequence("ab", &["a", "b"])
        .build()?;

    let err = runner(graph, &fs).run("ab").await.unwrap_err();

    assert!(matches!(err, AssetdagError::NoMatch { .. }));
    assert!(log.lock().unwrap().is_empty());
    assert!(!fs.exists(&at("out/b.txt")));
    Ok(())
}

#[tokio::test]
async fn parallel_waits_for_siblings_before_failing() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(at("src/b.txt"), "b");
    let log = Arc::new(Mutex::new(Vec::new()));

    let graph = TaskGraph::builder()
        .pipeline("a", missing("a"))
        .pipeline(
            "b",
            probed("b", "src/b.txt", "out", Duration::from_millis(100), &log),
        )
        .parallel("both", &["a", "b"])
        .build()?;

    let err = with_timeout(runner(graph, &fs).run("both")).await.unwrap_err();

    // B's write is durable by the time the aggregated error surfaces.
    assert_eq!(fs.contents(at("out/b.txt")), Some(b"b".to_vec()));
    match err {
        AssetdagError::Parallel { task, failures } => {
            assert_eq!(task, "both");
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "a");
            assert!(matches!(failures[0].1, AssetdagError::NoMatch { .. }));
        }
        other => panic!("expected Parallel, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn parallel_reports_every_failure_in_declaration_order() -> TestResult {
    let fs = MockFileSystem::new();
    let graph = TaskGraph::builder()
        .pipeline("x", missing("x"))
        .pipeline("y", missing("y"))
        .parallel("both", &["y", "x"])
        .build()?;

    let err = runner(graph, &fs).run("both").await.unwrap_err();
    match err {
        AssetdagError::Parallel { failures, .. } => {
            let names: Vec<_> = failures.iter().map(|(n, _)| n.as_str()).collect();
            assert_eq!(names, vec!["y", "x"]);
        }
        other => panic!("expected Parallel, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn parallel_names_the_child_that_panicked() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(at("src/ok.txt"), "ok");
    fs.add_file(at("src/boom.txt"), "boom");
    let log = Arc::new(Mutex::new(Vec::new()));

    let boom = Pipeline::new(
        "boom",
        SourceSet::new(&["src/boom.txt".to_string()], None)?,
        vec![Box::new(Explode)],
        DestSink::new("out", false),
    );
    let graph = TaskGraph::builder()
        .pipeline("ok", probed("ok", "src/ok.txt", "out", Duration::ZERO, &log))
        .pipeline("boom", boom)
        .parallel("both", &["ok", "boom"])
        .build()?;

    let err = with_timeout(runner(graph, &fs).run("both")).await.unwrap_err();

    assert_eq!(fs.contents(at("out/ok.txt")), Some(b"ok".to_vec()));
    match err {
        AssetdagError::Parallel { task, failures } => {
            assert_eq!(task, "both");
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "boom");
            assert!(matches!(&failures[0].1, AssetdagError::Panicked(name) if name == "boom"));
        }
        other => panic!("expected Parallel, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn parallel_children_overlap() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(at("src/a.txt"), "a");
    fs.add_file(at("src/b.txt"), "b");
    let log = Arc::new(Mutex::new(Vec::new()));
    let slow = Duration::from_millis(200);

    let graph = TaskGraph::builder()
        .pipeline("a", probed("a", "src/a.txt", "out", slow, &log))
        .pipeline("b", probed("b", "src/b.txt", "out", slow, &log))
        .parallel("both", &["a", "b"])
        .build()?;

    let started = std::time::Instant::now();
    runner(graph, &fs).run("both").await?;

    assert!(started.elapsed() < Duration::from_millis(390));
    assert_eq!(log.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn clean_of_missing_directory_succeeds() -> TestResult {
    let fs = MockFileSystem::new();
    let graph = TaskGraph::builder().clean("clean-dist", "dist").build()?;

    runner(graph, &fs).run("clean-dist").await?;
    Ok(())
}

#[tokio::test]
async fn clean_failure_aborts_sequence() -> TestResult {
    let fs = MockFileSystem::new();
    // `dist` is a file, so it cannot be removed as a directory.
    fs.add_file(at("dist"), "not a dir");
    fs.add_file(at("src/b.txt"), "b");
    let log = Arc::new(Mutex::new(Vec::new()));

    let graph = TaskGraph::builder()
        .clean("clean-dist", "dist")
        .pipeline("b", probed("b", "src/b.txt", "out", Duration::ZERO, &log))
        .sequence("build", &["clean-dist", "b"])
        .build()?;

    let err = runner(graph, &fs).run("build").await.unwrap_err();

    match err {
        AssetdagError::Clean { path, source } => {
            assert_eq!(path, at("dist"));
            assert_eq!(source.kind(), std::io::ErrorKind::NotADirectory);
        }
        other => panic!("expected Clean, got {other:?}"),
    }
    assert!(log.lock().unwrap().is_empty());
    assert!(!fs.exists(&at("out/b.txt")));
    Ok(())
}

#[tokio::test]
async fn unknown_task_is_reported() -> TestResult {
    let fs = MockFileSystem::new();
    let graph = TaskGraph::builder().clean("clean-dist", "dist").build()?;

    let err = runner(graph, &fs).run("deploy").await.unwrap_err();
    assert!(matches!(err, AssetdagError::TaskNotFound(name) if name == "deploy"));
    Ok(())
}

#[tokio::test]
async fn build_cleans_then_assembles_on_disk() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    std::fs::create_dir_all(root.join("dist/stale"))?;
    std::fs::write(root.join("dist/stale/old.css"), "old")?;
    std::fs::create_dir_all(root.join("app/css"))?;
    std::fs::write(root.join("app/css/style.min.css"), "body{}")?;
    std::fs::write(root.join("app/index.html"), "<html></html>")?;

    let cfg = ConfigFileBuilder::new()
        .with_clean("clean-dist", "dist")
        .with_pipeline(
            "build-project",
            PipelineConfigBuilder::new(&["app/css/style.min.css", "app/*.html"], "dist")
                .base("app")
                .build(),
        )
        .with_sequence("build", &["clean-dist", "build-project"])
        .build();
    let graph = TaskGraph::from_config(&cfg)?;
    let ctx = PipelineContext::new(Arc::new(assetdag::fs::RealFileSystem), root);

    TaskRunner::new(graph, ctx).run("build").await?;

    assert!(!root.join("dist/stale").exists());
    assert_eq!(std::fs::read_to_string(root.join("dist/css/style.min.css"))?, "body{}");
    assert!(root.join("dist/index.html").is_file());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Sequence children complete strictly in declaration order.
    #[test]
    fn sequence_preserves_order(delays in proptest::collection::vec(0u64..5, 1..6)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let fs = MockFileSystem::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut builder = TaskGraph::builder();
        let mut names = Vec::new();
        for (i, delay) in delays.iter().enumerate() {
            let name = format!("step_{i}");
            let src = format!("src/{name}.txt");
            fs.add_file(at(&src), name.as_bytes().to_vec());
            builder = builder.pipeline(
                &name,
                probed(&name, &src, "out", Duration::from_millis(*delay), &log),
            );
            names.push(name);
        }
        let graph = builder.sequence("all", &names).build().unwrap();

        rt.block_on(runner(graph, &fs).run("all")).unwrap();

        prop_assert_eq!(log.lock().unwrap().clone(), names);
    }
}
