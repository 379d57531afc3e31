//! Output path allocation.
//!
//! Every discovered resource gets a deterministic, collision-resistant
//! location in the output tree. Pages and components each get their own
//! directory (`pages/<name><digest>/index<ext>`); everything else lands
//! flat under its kind (`other/<name><digest><ext>`). The digest comes
//! from the resource path, so allocation is pure and stable across builds.

use crate::registry::ResourceKind;
use minipack_util::hash::short_hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which form of the resource path feeds the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathHashMode {
    /// Hash the absolute resource path. Output paths differ between
    /// checkouts at different locations.
    #[default]
    Absolute,
    /// Hash the path relative to the project root, for reproducible output
    /// trees across machines.
    ProjectRelative,
}

/// Replacement allocation hook supplied by the build front end.
///
/// Arguments: kind, file stem, digest, extension. The returned path is used
/// verbatim after stripping a leading `/`.
pub type OutputPathHook = dyn Fn(ResourceKind, &str, &str, &str) -> String + Send + Sync;

/// Deterministic output path allocator.
#[derive(Clone)]
pub struct OutputPaths {
    project_root: PathBuf,
    hash_mode: PathHashMode,
    custom: Option<Arc<OutputPathHook>>,
}

impl std::fmt::Debug for OutputPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPaths")
            .field("project_root", &self.project_root)
            .field("hash_mode", &self.hash_mode)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl OutputPaths {
    #[must_use]
    pub fn new(project_root: PathBuf, hash_mode: PathHashMode) -> Self {
        Self {
            project_root,
            hash_mode,
            custom: None,
        }
    }

    /// Install a custom allocation hook.
    #[must_use]
    pub fn with_custom(mut self, hook: Arc<OutputPathHook>) -> Self {
        self.custom = Some(hook);
        self
    }

    /// Short digest of a resource path, honoring the configured hash mode.
    #[must_use]
    pub fn path_hash(&self, resource_path: &str) -> String {
        if self.hash_mode == PathHashMode::ProjectRelative {
            if let Ok(rel) = Path::new(resource_path).strip_prefix(&self.project_root) {
                return short_hash(&rel.to_string_lossy());
            }
        }
        short_hash(resource_path)
    }

    /// Allocate the default output path for a resource.
    ///
    /// Total for any non-empty resource path; never fails.
    #[must_use]
    pub fn allocate(&self, resource_path: &str, kind: ResourceKind, ext: &str) -> String {
        let name = Path::new(resource_path)
            .file_stem()
            .map_or_else(|| "index".to_string(), |s| s.to_string_lossy().into_owned());
        let digest = self.path_hash(resource_path);

        if let Some(custom) = &self.custom {
            return custom(kind, &name, &digest, ext)
                .trim_start_matches('/')
                .to_string();
        }

        match kind {
            ResourceKind::Page | ResourceKind::Component => {
                format!("{}s/{name}{digest}/index{ext}", kind.as_str())
            }
            _ => format!("{}/{name}{digest}{ext}", kind.as_str()),
        }
    }

    /// Rename a colliding output path by splicing the digest of
    /// `resource_path` immediately before the final extension.
    ///
    /// Used exclusively by the registry's collision-rename path.
    #[must_use]
    pub fn conflict(&self, resource_path: &str, conflict_path: &str) -> String {
        let digest = self.path_hash(resource_path);
        let file_start = conflict_path.rfind('/').map_or(0, |i| i + 1);
        match conflict_path[file_start..].rfind('.') {
            Some(dot) => {
                let dot = file_start + dot;
                format!("{}{digest}{}", &conflict_path[..dot], &conflict_path[dot..])
            }
            None => format!("{conflict_path}{digest}"),
        }
    }
}

/// Join path segments with forward slashes, skipping empty parts.
///
/// Output paths are always posix-style regardless of host platform.
#[must_use]
pub fn join_posix(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.trim_matches('/'))
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> OutputPaths {
        OutputPaths::new(PathBuf::from("/project"), PathHashMode::Absolute)
    }

    #[test]
    fn test_page_gets_own_directory() {
        let out = paths().allocate("/project/src/pages/home.mini", ResourceKind::Page, ".js");
        assert!(out.starts_with("pages/home"));
        assert!(out.ends_with("/index.js"));
    }

    #[test]
    fn test_other_kind_is_flat() {
        let out = paths().allocate("/project/src/theme.json", ResourceKind::Other, ".json");
        assert!(out.starts_with("other/theme"));
        assert!(out.ends_with(".json"));
        assert!(!out.contains("/index"));
    }

    #[test]
    fn test_allocation_is_deterministic() {
        let a = paths().allocate("/p/a.mini", ResourceKind::Component, ".js");
        let b = paths().allocate("/p/a.mini", ResourceKind::Component, ".js");
        assert_eq!(a, b);
    }

    #[test]
    fn test_relative_hash_mode_ignores_checkout_location() {
        let a = OutputPaths::new(PathBuf::from("/home/a/proj"), PathHashMode::ProjectRelative)
            .path_hash("/home/a/proj/src/x.mini");
        let b = OutputPaths::new(PathBuf::from("/mnt/b/proj"), PathHashMode::ProjectRelative)
            .path_hash("/mnt/b/proj/src/x.mini");
        assert_eq!(a, b);
    }

    #[test]
    fn test_conflict_splices_before_extension() {
        let out = paths().conflict("/p/b.mini", "pages/x/index.js");
        assert!(out.starts_with("pages/x/index"));
        assert!(out.ends_with(".js"));
        assert_ne!(out, "pages/x/index.js");
    }

    #[test]
    fn test_conflict_without_extension_appends() {
        let out = paths().conflict("/p/b.mini", "pages/x/index");
        assert!(out.starts_with("pages/x/index"));
        assert!(out.len() > "pages/x/index".len());
    }

    #[test]
    fn test_custom_hook_wins() {
        let custom = paths().with_custom(Arc::new(|kind, name, digest, ext| {
            format!("/custom/{}/{name}-{digest}{ext}", kind.as_str())
        }));
        let out = custom.allocate("/p/a.mini", ResourceKind::Page, ".js");
        assert!(out.starts_with("custom/page/a-"));
    }

    #[test]
    fn test_join_posix() {
        assert_eq!(join_posix(&["sub", "pages/a/index"]), "sub/pages/a/index");
        assert_eq!(join_posix(&["", "pages/a"]), "pages/a");
    }
}
