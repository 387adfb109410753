#![allow(dead_code)]

use std::path::PathBuf;

use assetdag::config::{
    BindingConfig, CleanConfig, ConfigFile, PipelineConfig, RawConfigFile, StageConfig,
    TaskConfig, WatchConfig,
};
use assetdag::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
#[derive(Default)]
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_task(mut self, name: &str) -> Self {
        self.config.config.default_task = name.to_string();
        self
    }

    pub fn with_pipeline(mut self, name: &str, pipeline: PipelineConfig) -> Self {
        self.config.pipeline.insert(name.to_string(), pipeline);
        self
    }

    pub fn with_clean(mut self, name: &str, path: &str) -> Self {
        self.config.clean.insert(
            name.to_string(),
            CleanConfig {
                path: PathBuf::from(path),
            },
        );
        self
    }

    pub fn with_sequence(mut self, name: &str, children: &[&str]) -> Self {
        self.config
            .task
            .insert(name.to_string(), TaskConfig::Sequence(owned(children)));
        self
    }

    pub fn with_parallel(mut self, name: &str, children: &[&str]) -> Self {
        self.config
            .task
            .insert(name.to_string(), TaskConfig::Parallel(owned(children)));
        self
    }

    pub fn with_watch(mut self, name: &str, bindings: Vec<BindingConfig>) -> Self {
        self.config
            .watch
            .insert(name.to_string(), WatchConfig { bind: bindings });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

/// Builder for `PipelineConfig`.
pub struct PipelineConfigBuilder {
    pipeline: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new(src: &[&str], dest: &str) -> Self {
        Self {
            pipeline: PipelineConfig {
                src: owned(src),
                dest: PathBuf::from(dest),
                base: None,
                allow_empty: true,
                reload: false,
                stages: Vec::new(),
            },
        }
    }

    pub fn base(mut self, base: &str) -> Self {
        self.pipeline.base = Some(PathBuf::from(base));
        self
    }

    pub fn require_match(mut self) -> Self {
        self.pipeline.allow_empty = false;
        self
    }

    pub fn reload(mut self) -> Self {
        self.pipeline.reload = true;
        self
    }

    pub fn stage(mut self, stage: StageConfig) -> Self {
        self.pipeline.stages.push(stage);
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.pipeline
    }
}

/// A binding that re-runs `task` when any of `patterns` changes.
pub fn run_binding(patterns: &[&str], task: &str) -> BindingConfig {
    BindingConfig {
        patterns: owned(patterns),
        task: Some(task.to_string()),
        reload: false,
        use_hash: false,
    }
}

/// A binding that requests a full page reload.
pub fn reload_binding(patterns: &[&str]) -> BindingConfig {
    BindingConfig {
        patterns: owned(patterns),
        task: None,
        reload: true,
        use_hash: false,
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
