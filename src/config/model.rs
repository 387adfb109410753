// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// default_task = "default"
///
/// [pipeline.styles]
/// src = ["node_modules/normalize.css/normalize.css", "app/scss/style.scss"]
/// dest = "app/css"
/// reload = true
///
/// [[pipeline.styles.stage]]
/// kind = "concat"
/// file = "style.min.css"
///
/// [[pipeline.styles.stage]]
/// kind = "command"
/// cmd = "sass --stdin --style=compressed"
///
/// [clean.clean-dist]
/// path = "dist"
///
/// [task.build]
/// sequence = ["clean-dist", "build-project"]
///
/// [[watch.watching.bind]]
/// patterns = ["app/scss/**"]
/// task = "styles"
/// ```
///
/// This is the unvalidated form; see [`ConfigFile`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Asset pipelines from `[pipeline.<name>]`.
    #[serde(default)]
    pub pipeline: BTreeMap<String, PipelineConfig>,

    /// Directory removal tasks from `[clean.<name>]`.
    #[serde(default)]
    pub clean: BTreeMap<String, CleanConfig>,

    /// Composite tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Watch tasks from `[watch.<name>]`.
    #[serde(default)]
    pub watch: BTreeMap<String, WatchConfig>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pipeline: BTreeMap<String, PipelineConfig>,
    clean: BTreeMap<String, CleanConfig>,
    task: BTreeMap<String, TaskConfig>,
    watch: BTreeMap<String, WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            pipeline: raw.pipeline,
            clean: raw.clean,
            task: raw.task,
            watch: raw.watch,
        }
    }

    pub fn pipelines(&self) -> &BTreeMap<String, PipelineConfig> {
        &self.pipeline
    }

    pub fn cleans(&self) -> &BTreeMap<String, CleanConfig> {
        &self.clean
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn watches(&self) -> &BTreeMap<String, WatchConfig> {
        &self.watch
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Task run when none is named on the command line.
    #[serde(default = "default_task_name")]
    pub default_task: String,
}

fn default_task_name() -> String {
    "default".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default_task: default_task_name(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[pipeline.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Source globs; a leading `!` excludes.
    pub src: Vec<String>,

    /// Output directory (relative to the project root).
    pub dest: PathBuf,

    /// Base directory for output paths. Defaults to each pattern's glob base.
    #[serde(default)]
    pub base: Option<PathBuf>,

    /// If false, matching nothing is an error.
    #[serde(default = "default_true")]
    pub allow_empty: bool,

    /// Notify live-reload clients about every written file.
    #[serde(default)]
    pub reload: bool,

    #[serde(default, rename = "stage")]
    pub stages: Vec<StageConfig>,
}

/// One `[[pipeline.<name>.stage]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageConfig {
    Concat(ConcatOptions),
    Rename(RenameOptions),
    Newer(NewerOptions),
    Command(CommandOptions),
    Fanout(FanoutOptions),
    Add(AddOptions),
    Filter(FilterOptions),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConcatOptions {
    /// Output file name, relative to the first input's base.
    pub file: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "\n".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RenameOptions {
    /// Replace the whole file name (directories are kept).
    #[serde(default)]
    pub file: Option<String>,
    /// New extension without the dot; an empty string removes it.
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NewerOptions {
    /// Directory the outputs are compared against.
    pub dest: PathBuf,
    /// Extension of the output counterpart, if different from the source.
    #[serde(default)]
    pub extension: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CommandOptions {
    /// Shell command; reads the file on stdin and writes the result to stdout.
    pub cmd: String,
    /// Extension of the produced file, if it changes.
    #[serde(default)]
    pub extension: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FanoutOptions {
    /// Each branch sees the full input; outputs are concatenated in order.
    pub branches: Vec<Vec<StageConfig>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AddOptions {
    pub src: Vec<String>,
    #[serde(default)]
    pub base: Option<PathBuf>,
}

/// Keeps only records whose source path matches `src`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilterOptions {
    pub src: Vec<String>,
}

/// `[clean.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CleanConfig {
    pub path: PathBuf,
}

/// `[task.<name>]` section: exactly one of `sequence` or `parallel`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TaskConfig {
    Sequence(Vec<String>),
    Parallel(Vec<String>),
}

impl TaskConfig {
    pub fn children(&self) -> &[String] {
        match self {
            TaskConfig::Sequence(c) | TaskConfig::Parallel(c) => c,
        }
    }
}

/// `[watch.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default)]
    pub bind: Vec<BindingConfig>,
}

/// `[[watch.<name>.bind]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    pub patterns: Vec<String>,

    /// Task to re-run on change.
    #[serde(default)]
    pub task: Option<String>,

    /// Send a page reload instead of running a task.
    #[serde(default)]
    pub reload: bool,

    /// Ignore events for files whose contents did not change.
    #[serde(default)]
    pub use_hash: bool,
}
