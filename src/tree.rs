//! Module tree processing - discovers modules, runs the pipeline, emits output
//!
//! Processing is split so nothing is written unless every module succeeds:
//! - [`plan_tree`] reads every file and runs the pipeline over every module,
//!   stopping at the first fatal error
//! - [`write_plan`] emits the finished plan into a guarded output root
//!
//! Module ids are paths relative to the input root with `/` separators.
//!
//! A patched module's own input map (`<id>.map`) no longer matches its text,
//! so it is never copied. With source maps on, a fresh one takes its place;
//! with them off, the module's trailing `sourceMappingURL` comment is dropped.

use crate::pipeline::{PatchedModule, TransformPipeline};
use crate::safety::{OutputGuard, SafetyError};
use crate::transform::TransformError;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// File extensions treated as compiled modules.
pub const MODULE_EXTENSIONS: [&str; 3] = ["js", "mjs", "cjs"];

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("module {path} is not valid UTF-8")]
    NonUtf8Module { path: PathBuf },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error("failed to serialize source map for {id}: {source}")]
    SourceMap {
        id: String,
        #[source]
        source: sourcemap::Error,
    },
}

/// A file found under the input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub id: String,
    pub path: PathBuf,
    pub is_module: bool,
}

/// A module after the pipeline ran over it.
#[derive(Debug, Clone)]
pub struct PlannedModule {
    pub id: String,
    pub source: PathBuf,
    pub original: String,
    /// `None` when no descriptor applied
    pub patched: Option<PatchedModule>,
}

#[derive(Debug, Clone)]
pub enum PlannedFile {
    Module(PlannedModule),
    /// Non-module file copied verbatim
    Asset { id: String, source: PathBuf },
}

#[derive(Debug, Clone, Default)]
pub struct TreePlan {
    pub files: Vec<PlannedFile>,
}

impl TreePlan {
    /// Modules at least one descriptor rewrote.
    pub fn patched(&self) -> impl Iterator<Item = (&PlannedModule, &PatchedModule)> {
        self.files.iter().filter_map(|file| match file {
            PlannedFile::Module(module) => module.patched.as_ref().map(|patched| (module, patched)),
            PlannedFile::Asset { .. } => None,
        })
    }

    pub fn module_count(&self) -> usize {
        self.files
            .iter()
            .filter(|file| matches!(file, PlannedFile::Module(_)))
            .count()
    }
}

/// Counts from [`write_plan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub patched: usize,
    pub copied: usize,
    pub source_maps: usize,
    /// Input maps of patched modules left out of the output
    pub stale_maps: usize,
}

pub fn is_module_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MODULE_EXTENSIONS.contains(&ext))
}

/// Module id for `path` relative to `root`.
pub fn module_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every regular file under `root`, sorted by id.
pub fn discover(root: &Path) -> Result<Vec<SourceFile>, TreeError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| TreeError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        files.push(SourceFile {
            id: module_id(root, &path),
            is_module: is_module_path(&path),
            path,
        });
    }
    files.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(files)
}

fn read_module(path: &Path) -> Result<String, TreeError> {
    let bytes = fs::read(path).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| TreeError::NonUtf8Module {
        path: path.to_path_buf(),
    })
}

/// Read every file under `root` and run `pipeline` over each module.
///
/// Stops at the first fatal transform error.
pub fn plan_tree(pipeline: &TransformPipeline, root: &Path) -> Result<TreePlan, TreeError> {
    let mut plan = TreePlan::default();

    for file in discover(root)? {
        if !file.is_module {
            plan.files.push(PlannedFile::Asset {
                id: file.id,
                source: file.path,
            });
            continue;
        }

        let original = read_module(&file.path)?;
        let patched = pipeline.transform(&file.id, &original)?;
        if patched.is_none() {
            debug!(module = %file.id, "passing through");
        }

        plan.files.push(PlannedFile::Module(PlannedModule {
            id: file.id,
            source: file.path,
            original,
            patched,
        }));
    }

    Ok(plan)
}

/// Result of running the pipeline over one module without stopping.
#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub id: String,
    pub original: String,
    pub outcome: Result<Option<PatchedModule>, TransformError>,
}

/// Run `pipeline` over every module under `root`, collecting every failure
/// instead of stopping at the first one. Used for read-only checks.
pub fn check_tree(pipeline: &TransformPipeline, root: &Path) -> Result<Vec<ModuleReport>, TreeError> {
    let mut reports = Vec::new();
    for file in discover(root)?.into_iter().filter(|file| file.is_module) {
        let original = read_module(&file.path)?;
        let outcome = pipeline.transform(&file.id, &original);
        reports.push(ModuleReport {
            id: file.id,
            original,
            outcome,
        });
    }
    Ok(reports)
}

/// Emit `plan` under the guarded output root.
///
/// With `source_maps`, every patched module gets a sibling `<file>.map` and a
/// trailing `sourceMappingURL` comment.
pub fn write_plan(
    plan: &TreePlan,
    guard: &OutputGuard,
    source_maps: bool,
) -> Result<WriteSummary, TreeError> {
    let mut summary = WriteSummary::default();
    let stale_maps: HashSet<String> = plan
        .patched()
        .map(|(module, _)| format!("{}.map", module.id))
        .collect();

    for file in &plan.files {
        match file {
            PlannedFile::Asset { id, source } => {
                if stale_maps.contains(id) {
                    debug!(asset = %id, "dropping input map of patched module");
                    summary.stale_maps += 1;
                    continue;
                }
                let target = guard.module_path(id)?;
                ensure_parent(&target)?;
                fs::copy(source, &target).map_err(|source| TreeError::Io {
                    path: target.clone(),
                    source,
                })?;
                summary.copied += 1;
            }
            PlannedFile::Module(module) => {
                let target = guard.module_path(&module.id)?;
                ensure_parent(&target)?;

                let Some(patched) = &module.patched else {
                    atomic_write(&target, module.original.as_bytes())?;
                    summary.copied += 1;
                    continue;
                };

                if !source_maps {
                    let text = strip_source_mapping_url(&patched.text);
                    atomic_write(&target, text.as_bytes())?;
                    summary.patched += 1;
                    continue;
                }

                let name = file_name(&module.id);
                let map_name = format!("{name}.map");
                let source_map = patched.position_map.to_source_map(
                    Some(name),
                    name,
                    &module.original,
                    &patched.text,
                );
                let mut json = Vec::new();
                source_map
                    .to_writer(&mut json)
                    .map_err(|source| TreeError::SourceMap {
                        id: module.id.clone(),
                        source,
                    })?;

                let text = with_source_mapping_url(&patched.text, &map_name);
                atomic_write(&target, text.as_bytes())?;
                atomic_write(&target.with_file_name(&map_name), &json)?;
                summary.patched += 1;
                summary.source_maps += 1;
            }
        }
    }

    Ok(summary)
}

fn file_name(module_id: &str) -> &str {
    module_id.rsplit('/').next().unwrap_or(module_id)
}

/// `text` without a trailing `sourceMappingURL` comment line.
pub fn strip_source_mapping_url(text: &str) -> &str {
    let trimmed = text.trim_end();
    let line_start = trimmed.rfind('\n').map_or(0, |idx| idx + 1);
    let last_line = trimmed[line_start..].trim_start();
    if last_line.starts_with("//# sourceMappingURL=") || last_line.starts_with("//@ sourceMappingURL=") {
        &text[..line_start]
    } else {
        text
    }
}

/// Point `text` at `map_name`, replacing any trailing `sourceMappingURL`
/// comment.
pub fn with_source_mapping_url(text: &str, map_name: &str) -> String {
    let text = strip_source_mapping_url(text);
    let mut out = String::with_capacity(text.len() + map_name.len() + 24);
    out.push_str(text);
    if !text.is_empty() && !text.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("//# sourceMappingURL=");
    out.push_str(map_name);
    out.push('\n');
    out
}

fn ensure_parent(path: &Path) -> Result<(), TreeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| TreeError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or nothing changes.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), TreeError> {
    let io_err = |source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    };

    // same directory keeps the rename on one filesystem
    let parent = path.parent().ok_or_else(|| {
        io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_id_uses_forward_slashes() {
        let root = Path::new("/tmp/in");
        let path = root.join("runtime").join("random.js");
        assert_eq!(module_id(root, &path), "runtime/random.js");
    }

    #[test]
    fn test_is_module_path() {
        assert!(is_module_path(Path::new("a/b.js")));
        assert!(is_module_path(Path::new("a/b.mjs")));
        assert!(is_module_path(Path::new("a/b.cjs")));
        assert!(!is_module_path(Path::new("a/b.js.map")));
        assert!(!is_module_path(Path::new("a/README")));
    }

    #[test]
    fn test_source_mapping_url_on_own_line() {
        assert_eq!(
            with_source_mapping_url("a();", "a.js.map"),
            "a();\n//# sourceMappingURL=a.js.map\n"
        );
        assert_eq!(
            with_source_mapping_url("a();\n", "a.js.map"),
            "a();\n//# sourceMappingURL=a.js.map\n"
        );
    }

    #[test]
    fn test_source_mapping_url_replaces_existing_comment() {
        assert_eq!(
            with_source_mapping_url("a();\n//# sourceMappingURL=old.js.map\n", "a.js.map"),
            "a();\n//# sourceMappingURL=a.js.map\n"
        );
        assert_eq!(
            with_source_mapping_url("//# sourceMappingURL=old.js.map", "a.js.map"),
            "//# sourceMappingURL=a.js.map\n"
        );
    }

    #[test]
    fn test_strip_source_mapping_url_keeps_other_text() {
        assert_eq!(strip_source_mapping_url("a();\n// note\n"), "a();\n// note\n");
        assert_eq!(
            strip_source_mapping_url("a();\n//@ sourceMappingURL=a.map\n\n"),
            "a();\n"
        );
    }

    #[test]
    fn test_write_plan_replaces_stale_input_map() {
        use crate::builtin::{self, RANDOM_SOURCE_ANCHOR};
        use crate::target::TargetEnvironment;

        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::create_dir_all(input.path().join("runtime")).unwrap();
        fs::write(
            input.path().join("runtime/random.js"),
            format!("{RANDOM_SOURCE_ANCHOR}\n//# sourceMappingURL=random.js.map\n"),
        )
        .unwrap();
        fs::write(input.path().join("runtime/random.js.map"), r#"{"stale":true}"#).unwrap();
        fs::write(input.path().join("runtime/prng.js.map"), r#"{"kept":true}"#).unwrap();

        let target = TargetEnvironment::Server;
        let pipeline = TransformPipeline::new(target, builtin::registry(target));
        let plan = plan_tree(&pipeline, input.path()).unwrap();
        let guard = OutputGuard::new(input.path(), output.path()).unwrap();
        let summary = write_plan(&plan, &guard, true).unwrap();
        assert_eq!(summary.stale_maps, 1);
        assert_eq!(summary.source_maps, 1);

        let map = fs::read(output.path().join("runtime/random.js.map")).unwrap();
        let map = sourcemap::SourceMap::from_slice(&map).unwrap();
        assert_eq!(map.get_source(0), Some("random.js"));
        assert!(map.get_token_count() > 0);

        let text = fs::read_to_string(output.path().join("runtime/random.js")).unwrap();
        assert_eq!(text.matches("sourceMappingURL").count(), 1);
        assert_eq!(
            fs::read_to_string(output.path().join("runtime/prng.js.map")).unwrap(),
            r#"{"kept":true}"#
        );
    }

    #[test]
    fn test_write_plan_without_maps_drops_stale_reference() {
        use crate::builtin::{self, RANDOM_SOURCE_ANCHOR};
        use crate::target::TargetEnvironment;

        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::create_dir_all(input.path().join("runtime")).unwrap();
        fs::write(
            input.path().join("runtime/random.js"),
            format!("{RANDOM_SOURCE_ANCHOR}\n//# sourceMappingURL=random.js.map\n"),
        )
        .unwrap();
        fs::write(input.path().join("runtime/random.js.map"), r#"{"stale":true}"#).unwrap();

        let target = TargetEnvironment::Browser;
        let pipeline = TransformPipeline::new(target, builtin::registry(target));
        let plan = plan_tree(&pipeline, input.path()).unwrap();
        let guard = OutputGuard::new(input.path(), output.path()).unwrap();
        write_plan(&plan, &guard, false).unwrap();

        assert!(!output.path().join("runtime/random.js.map").exists());
        let text = fs::read_to_string(output.path().join("runtime/random.js")).unwrap();
        assert!(!text.contains("sourceMappingURL"));
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.js");
        fs::write(&path, "old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_discover_sorted_and_classified() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/z.js"), "z").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("c.mjs"), "c").unwrap();

        let files = discover(dir.path()).unwrap();
        let ids: Vec<_> = files.iter().map(|file| file.id.as_str()).collect();
        assert_eq!(ids, vec!["a.json", "b/z.js", "c.mjs"]);
        assert!(!files[0].is_module);
        assert!(files[1].is_module);
    }
}
