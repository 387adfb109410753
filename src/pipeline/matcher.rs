// src/pipeline/matcher.rs

//! Resolve glob patterns into an ordered list of source files.
//!
//! Patterns are evaluated against paths relative to the project root, using
//! forward slashes. A leading `!` turns a pattern into a negation; negations
//! apply to every positive pattern regardless of where they appear in the
//! list.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::errors::{AssetdagError, Result};
use crate::fs::FileSystem;

const GLOB_CHARS: &[char] = &['*', '?', '[', '{'];

/// One positive pattern plus the directory its matches are relative to.
#[derive(Clone)]
struct IncludePattern {
    pattern: String,
    matcher: GlobMatcher,
    /// Leading non-glob directories of the pattern.
    glob_base: String,
    /// True if the pattern names a single file.
    literal: bool,
}

/// A file picked up by a [`SourceSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMatch {
    /// Project-relative path, e.g. `app/scss/style.scss`.
    pub path: PathBuf,
    /// Base the record is rooted at, e.g. `app/scss`.
    pub base: PathBuf,
    /// `path` with `base` stripped, e.g. `style.scss`.
    pub relative: PathBuf,
}

/// Compiled positive + negated glob patterns.
#[derive(Clone)]
pub struct SourceSet {
    patterns: Vec<String>,
    includes: Vec<IncludePattern>,
    excludes: Option<GlobSet>,
    base_override: Option<PathBuf>,
}

impl fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSet")
            .field("patterns", &self.patterns)
            .field("base_override", &self.base_override)
            .finish_non_exhaustive()
    }
}

impl SourceSet {
    pub fn new(patterns: &[String], base_override: Option<PathBuf>) -> Result<Self> {
        let mut includes = Vec::new();
        let mut exclude_builder = GlobSetBuilder::new();
        let mut has_excludes = false;

        for raw in patterns {
            if let Some(negated) = raw.strip_prefix('!') {
                exclude_builder.add(compile(normalize(negated))?);
                has_excludes = true;
            } else {
                let pattern = normalize(raw).to_string();
                let (glob_base, literal) = glob_base(&pattern);
                includes.push(IncludePattern {
                    matcher: compile(&pattern)?.compile_matcher(),
                    pattern,
                    glob_base,
                    literal,
                });
            }
        }

        let excludes = if has_excludes {
            Some(exclude_builder.build()?)
        } else {
            None
        };

        Ok(Self {
            patterns: patterns.to_vec(),
            includes,
            excludes,
            base_override,
        })
    }

    /// Patterns as written in the config.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.excludes
            .as_ref()
            .is_some_and(|set| set.is_match(rel_path))
    }

    /// Returns true if `rel_path` matches a positive pattern and no negation.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.includes.iter().any(|inc| inc.matcher.is_match(rel_path))
            && !self.is_excluded(rel_path)
    }

    /// Walk `root` and return every matching file.
    ///
    /// Order follows the pattern list; within one pattern paths are sorted.
    /// A path matched by several patterns is reported once, at its first
    /// position.
    pub fn resolve(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<SourceMatch>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for inc in &self.includes {
            let mut found = if inc.literal {
                if fs.is_file(&root.join(&inc.pattern)) {
                    vec![inc.pattern.clone()]
                } else {
                    Vec::new()
                }
            } else {
                walk_matching(fs, root, &inc.glob_base, &inc.matcher)?
            };
            found.sort();

            for rel in found {
                if self.is_excluded(&rel) {
                    debug!(path = %rel, "excluded by negated pattern");
                    continue;
                }
                if !seen.insert(rel.clone()) {
                    continue;
                }
                out.push(self.make_match(&rel, &inc.glob_base));
            }
        }

        Ok(out)
    }

    fn make_match(&self, rel: &str, glob_base: &str) -> SourceMatch {
        let path = PathBuf::from(rel);
        let base = match &self.base_override {
            Some(base) if path.starts_with(base) => base.clone(),
            _ => PathBuf::from(glob_base),
        };
        let relative = path
            .strip_prefix(&base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        SourceMatch {
            path,
            base,
            relative,
        }
    }
}

fn normalize(pattern: &str) -> &str {
    pattern.trim_start_matches("./")
}

fn compile(pattern: &str) -> Result<globset::Glob> {
    Ok(GlobBuilder::new(pattern).literal_separator(true).build()?)
}

/// Split a pattern into its leading literal directories.
///
/// `app/images/src/*.*` has base `app/images/src`; a literal file path such
/// as `app/scss/style.scss` has its parent directory as base.
pub(crate) fn glob_base(pattern: &str) -> (String, bool) {
    let segments: Vec<&str> = pattern.split('/').collect();
    match segments.iter().position(|s| s.contains(GLOB_CHARS)) {
        Some(idx) => (segments[..idx].join("/"), false),
        None => {
            let parent = &segments[..segments.len().saturating_sub(1)];
            (parent.join("/"), true)
        }
    }
}

/// Collect all files under `root/start` whose root-relative path matches.
fn walk_matching(
    fs: &dyn FileSystem,
    root: &Path,
    start: &str,
    matcher: &GlobMatcher,
) -> Result<Vec<String>> {
    let start_dir = if start.is_empty() {
        root.to_path_buf()
    } else {
        root.join(start)
    };
    if !fs.is_dir(&start_dir) {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![start_dir];

    while let Some(dir) = stack.pop() {
        let entries = fs
            .read_dir(&dir)
            .map_err(|e| AssetdagError::io(&dir, e))?;
        for path in entries {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if matcher.is_match(&rel_str) {
                        files.push(rel_str);
                    }
                }
            }
        }
    }

    Ok(files)
}

/// Fail with [`AssetdagError::NoMatch`] when nothing matched.
pub fn require_matches(
    pipeline: &str,
    set: &SourceSet,
    matches: &[SourceMatch],
) -> Result<()> {
    if matches.is_empty() {
        return Err(AssetdagError::NoMatch {
            pipeline: pipeline.to_string(),
            patterns: set.patterns().to_vec(),
        });
    }
    Ok(())
}
