// src/pipeline/stages.rs

//! Built-in stages and their construction from config.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::model::{
    AddOptions, CommandOptions, ConcatOptions, FilterOptions, RenameOptions, StageConfig,
};
use crate::errors::{AssetdagError, Result};
use crate::pipeline::freshness::NewerFilter;
use crate::pipeline::matcher::SourceSet;
use crate::pipeline::record::FileRecord;
use crate::pipeline::stage::{run_stages, PipelineContext, Stage, StageFuture};

/// Build a stage from its config entry.
pub fn build_stage(cfg: &StageConfig) -> Result<Box<dyn Stage>> {
    let stage: Box<dyn Stage> = match cfg {
        StageConfig::Concat(opts) => Box::new(Concat::new(opts.clone())),
        StageConfig::Rename(opts) => Box::new(Rename::new(opts.clone())),
        StageConfig::Newer(opts) => {
            Box::new(NewerFilter::new(&opts.dest, opts.extension.clone()))
        }
        StageConfig::Command(opts) => Box::new(ShellCommand::new(opts.clone())),
        StageConfig::Fanout(opts) => {
            let branches = opts
                .branches
                .iter()
                .map(|branch| build_stages(branch))
                .collect::<Result<Vec<_>>>()?;
            Box::new(Fanout::new(branches))
        }
        StageConfig::Add(opts) => Box::new(AddSources::new(opts)?),
        StageConfig::Filter(opts) => Box::new(Filter::new(opts)?),
    };
    Ok(stage)
}

pub fn build_stages(cfgs: &[StageConfig]) -> Result<Vec<Box<dyn Stage>>> {
    cfgs.iter().map(build_stage).collect()
}

/// Joins all inputs into one file (N to 1).
#[derive(Debug, Clone)]
pub struct Concat {
    opts: ConcatOptions,
}

impl Concat {
    pub fn new(opts: ConcatOptions) -> Self {
        Self { opts }
    }

    fn concat(&self, records: Vec<FileRecord>) -> Vec<FileRecord> {
        let Some(first) = records.first() else {
            return Vec::new();
        };
        let base = first.base.clone();
        let modified = records.iter().filter_map(|r| r.modified).max();

        let mut contents = Vec::new();
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                contents.extend_from_slice(self.opts.separator.as_bytes());
            }
            contents.extend_from_slice(&record.contents);
        }

        vec![FileRecord::new(base, &self.opts.file, contents).with_modified(modified)]
    }
}

impl Stage for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn apply<'a>(&'a self, _ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a> {
        Box::pin(std::future::ready(Ok(self.concat(records))))
    }
}

/// Rewrites the file name of every record (1 to 1).
#[derive(Debug, Clone)]
pub struct Rename {
    opts: RenameOptions,
}

impl Rename {
    pub fn new(opts: RenameOptions) -> Self {
        Self { opts }
    }

    fn rename(&self, record: &FileRecord) -> FileRecord {
        let dir = record
            .relative
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();

        let file_name = match &self.opts.file {
            Some(file) => file.clone(),
            None => {
                let stem = record
                    .relative
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let ext = match &self.opts.extension {
                    Some(ext) => ext.clone(),
                    None => record
                        .relative
                        .extension()
                        .map(|e| e.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                };
                let mut name = format!(
                    "{}{}{}",
                    self.opts.prefix.as_deref().unwrap_or(""),
                    stem,
                    self.opts.suffix.as_deref().unwrap_or("")
                );
                if !ext.is_empty() {
                    name.push('.');
                    name.push_str(&ext);
                }
                name
            }
        };

        record.with_relative(dir.join(file_name))
    }
}

impl Stage for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply<'a>(&'a self, _ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a> {
        let renamed = records.iter().map(|r| self.rename(r)).collect();
        Box::pin(std::future::ready(Ok(renamed)))
    }
}

/// Pipes every record through an external program (1 to 1).
///
/// The record's contents go to stdin; stdout becomes the new contents.
/// `ASSETDAG_FILE` and `ASSETDAG_BASE` tell the program which file it is
/// looking at. A non-zero exit status rejects the input.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    opts: CommandOptions,
}

impl ShellCommand {
    pub fn new(opts: CommandOptions) -> Self {
        Self { opts }
    }

    fn transform_error(&self, record: &FileRecord, message: impl Into<String>) -> AssetdagError {
        AssetdagError::Transform {
            stage: format!("command `{}`", self.opts.cmd),
            path: record.source_path(),
            message: message.into(),
        }
    }

    async fn run_one(&self, ctx: &PipelineContext, record: FileRecord) -> Result<FileRecord> {
        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.opts.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.opts.cmd);
            c
        };

        cmd.current_dir(&ctx.root)
            .env("ASSETDAG_FILE", &record.relative)
            .env("ASSETDAG_BASE", &record.base)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| self.transform_error(&record, format!("failed to spawn: {e}")))?;

        // Feed stdin from a separate task so a chatty program cannot
        // deadlock on a full stdout pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = record.contents.clone();
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&input).await {
                    // Programs that ignore stdin close it early.
                    debug!(error = %err, "stdin closed before all input was written");
                }
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.transform_error(&record, format!("failed to wait: {e}")))?;
        if let Some(writer) = writer {
            let _ = writer.await;
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                cmd = %self.opts.cmd,
                file = ?record.relative,
                exit_code = output.status.code().unwrap_or(-1),
                "transform command failed"
            );
            return Err(self.transform_error(
                &record,
                format!(
                    "exited with {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr
                ),
            ));
        }

        let out = record.with_contents(output.stdout);
        Ok(match &self.opts.extension {
            Some(ext) => out.with_extension(ext),
            None => out,
        })
    }
}

impl Stage for ShellCommand {
    fn name(&self) -> &str {
        "command"
    }

    fn apply<'a>(&'a self, ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(records.len());
            for record in records {
                out.push(self.run_one(ctx, record).await?);
            }
            Ok(out)
        })
    }
}

/// Runs several stage chains over the same input (1 to many).
///
/// Outputs are concatenated in branch order.
#[derive(Debug)]
pub struct Fanout {
    branches: Vec<Vec<Box<dyn Stage>>>,
}

impl Fanout {
    pub fn new(branches: Vec<Vec<Box<dyn Stage>>>) -> Self {
        Self { branches }
    }
}

impl Stage for Fanout {
    fn name(&self) -> &str {
        "fanout"
    }

    fn apply<'a>(&'a self, ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a> {
        Box::pin(async move {
            let mut out = Vec::new();
            for branch in &self.branches {
                out.extend(run_stages(branch, ctx, records.clone()).await?);
            }
            Ok(out)
        })
    }
}

/// Appends freshly matched source files to the stream.
#[derive(Debug, Clone)]
pub struct AddSources {
    sources: SourceSet,
}

impl AddSources {
    pub fn new(opts: &AddOptions) -> Result<Self> {
        Ok(Self {
            sources: SourceSet::new(&opts.src, opts.base.clone())?,
        })
    }
}

impl Stage for AddSources {
    fn name(&self) -> &str {
        "add"
    }

    fn apply<'a>(&'a self, ctx: &'a PipelineContext, mut records: Vec<FileRecord>) -> StageFuture<'a> {
        Box::pin(async move {
            for m in self.sources.resolve(ctx.fs.as_ref(), &ctx.root)? {
                records.push(ctx.load(&m)?);
            }
            Ok(records)
        })
    }
}

/// Drops records whose source path does not match.
#[derive(Debug, Clone)]
pub struct Filter {
    sources: SourceSet,
}

impl Filter {
    pub fn new(opts: &FilterOptions) -> Result<Self> {
        Ok(Self {
            sources: SourceSet::new(&opts.src, None)?,
        })
    }

    fn keep(&self, record: &FileRecord) -> bool {
        let rel = record.source_path();
        self.sources.matches(&rel.to_string_lossy())
    }
}

impl Stage for Filter {
    fn name(&self) -> &str {
        "filter"
    }

    fn apply<'a>(&'a self, _ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a> {
        Box::pin(async move {
            let before = records.len();
            let kept: Vec<FileRecord> = records.into_iter().filter(|r| self.keep(r)).collect();
            debug!(kept = kept.len(), dropped = before - kept.len(), "filter");
            Ok(kept)
        })
    }
}
