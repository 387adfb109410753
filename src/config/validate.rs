// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, RawConfigFile, StageConfig};
use crate::errors::{AssetdagError, Result};
use crate::pipeline::matcher::SourceSet;
use crate::tasks::graph::find_cycle;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_unique_names(cfg)?;
    validate_pipelines(cfg)?;
    validate_references(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn config_err(msg: impl Into<String>) -> AssetdagError {
    AssetdagError::Config(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.pipeline.is_empty() && cfg.clean.is_empty() && cfg.task.is_empty() && cfg.watch.is_empty()
    {
        return Err(config_err(
            "config must define at least one [pipeline.*], [clean.*], [task.*] or [watch.*] section",
        ));
    }
    Ok(())
}

/// Task names share one namespace across all sections.
fn validate_unique_names(cfg: &RawConfigFile) -> Result<()> {
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    let sections = [
        ("pipeline", cfg.pipeline.keys().collect::<Vec<_>>()),
        ("clean", cfg.clean.keys().collect()),
        ("task", cfg.task.keys().collect()),
        ("watch", cfg.watch.keys().collect()),
    ];

    for (section, names) in sections.iter() {
        for name in names {
            if let Some(previous) = owners.insert(name.as_str(), *section) {
                return Err(config_err(format!(
                    "task name '{}' is defined in both [{}] and [{}]",
                    name, previous, section
                )));
            }
        }
    }
    Ok(())
}

fn validate_pipelines(cfg: &RawConfigFile) -> Result<()> {
    for (name, p) in cfg.pipeline.iter() {
        if p.src.iter().all(|s| s.starts_with('!')) {
            return Err(config_err(format!(
                "pipeline '{}' needs at least one non-negated `src` pattern",
                name
            )));
        }
        SourceSet::new(&p.src, p.base.clone())?;
        validate_stages(name, &p.stages)?;
    }
    Ok(())
}

fn validate_stages(pipeline: &str, stages: &[StageConfig]) -> Result<()> {
    for stage in stages {
        match stage {
            StageConfig::Concat(opts) if opts.file.trim().is_empty() => {
                return Err(config_err(format!(
                    "pipeline '{}': concat stage needs a non-empty `file`",
                    pipeline
                )));
            }
            StageConfig::Command(opts) if opts.cmd.trim().is_empty() => {
                return Err(config_err(format!(
                    "pipeline '{}': command stage needs a non-empty `cmd`",
                    pipeline
                )));
            }
            StageConfig::Fanout(opts) => {
                if opts.branches.is_empty() {
                    return Err(config_err(format!(
                        "pipeline '{}': fanout stage needs at least one branch",
                        pipeline
                    )));
                }
                for branch in opts.branches.iter() {
                    validate_stages(pipeline, branch)?;
                }
            }
            StageConfig::Add(opts) => {
                SourceSet::new(&opts.src, opts.base.clone())?;
            }
            StageConfig::Filter(opts) => {
                if !opts.src.iter().any(|p| !p.starts_with('!')) {
                    return Err(config_err(format!(
                        "pipeline '{}': filter stage needs at least one positive pattern",
                        pipeline
                    )));
                }
                SourceSet::new(&opts.src, None)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_references(cfg: &RawConfigFile) -> Result<()> {
    let exists = |name: &str| {
        cfg.pipeline.contains_key(name)
            || cfg.clean.contains_key(name)
            || cfg.task.contains_key(name)
            || cfg.watch.contains_key(name)
    };

    for (name, task) in cfg.task.iter() {
        if task.children().is_empty() {
            return Err(config_err(format!("task '{}' has no children", name)));
        }
        for child in task.children() {
            if !exists(child.as_str()) {
                return Err(config_err(format!(
                    "task '{}' has unknown dependency '{}'",
                    name, child
                )));
            }
            if child == name {
                return Err(config_err(format!(
                    "task '{}' cannot contain itself",
                    name
                )));
            }
        }
    }

    for (name, watch) in cfg.watch.iter() {
        if watch.bind.is_empty() {
            return Err(config_err(format!("watch '{}' has no bindings", name)));
        }
        for binding in watch.bind.iter() {
            if binding.patterns.is_empty() {
                return Err(config_err(format!(
                    "watch '{}' has a binding without patterns",
                    name
                )));
            }
            match (&binding.task, binding.reload) {
                (Some(_), true) | (None, false) => {
                    return Err(config_err(format!(
                        "watch '{}': each binding needs exactly one of `task` or `reload = true`",
                        name
                    )));
                }
                (Some(task), false) if !exists(task.as_str()) => {
                    return Err(config_err(format!(
                        "watch '{}' binds unknown task '{}'",
                        name, task
                    )));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // A watch binding counts as an edge from the watch task to its target.
    let nodes = cfg
        .pipeline
        .keys()
        .chain(cfg.clean.keys())
        .chain(cfg.task.keys())
        .chain(cfg.watch.keys())
        .map(String::as_str);

    let task_edges = cfg.task.iter().flat_map(|(name, task)| {
        task.children()
            .iter()
            .map(move |child| (name.as_str(), child.as_str()))
    });
    let watch_edges = cfg.watch.iter().flat_map(|(name, watch)| {
        watch
            .bind
            .iter()
            .filter_map(|b| b.task.as_deref())
            .map(move |target| (name.as_str(), target))
    });

    match find_cycle(nodes, task_edges.chain(watch_edges)) {
        None => Ok(()),
        Some(node) => Err(AssetdagError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            node
        ))),
    }
}
