//! Collaborator seams: path resolution, source reading, asset emission.
//!
//! The graph resolver only ever talks to these traits. Production wires in
//! the platform-aware resolver of the build pipeline; tests wire in the
//! defaults below over tempdir fixtures.

use crate::error::Error;
use crate::platform::Mode;
use crate::request::{parse_request, Query};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

/// A successfully resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// Canonical resource path (lexically normalized, extension applied).
    pub path: PathBuf,
    /// Query carried by the request string.
    pub query: Query,
}

/// Outcome of path resolution.
///
/// `Ignored` is the expected pruning signal for resources intentionally
/// excluded on the active platform; callers drop the reference instead of
/// erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedRequest),
    Ignored,
}

/// Platform-aware module resolution.
pub trait PathResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        context: &'a Path,
        request: &'a str,
    ) -> BoxFuture<'a, Result<Resolution, Error>>;
}

/// File contents provider.
pub trait SourceReader: Send + Sync {
    fn read<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<u8>, Error>>;
}

/// Receiver for verbatim-copied assets (worker directories).
///
/// `target` is relative to the output tree root.
pub trait AssetSink: Send + Sync {
    fn emit<'a>(&'a self, target: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, Result<(), Error>>;
}

/// Default reader backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn read<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<u8>, Error>> {
        Box::pin(async move { Ok(tokio::fs::read(path).await?) })
    }
}

/// Sink that collects emitted assets in memory; the default for sessions
/// without a configured output writer, and the fixture of choice in tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    assets: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    #[must_use]
    pub fn assets(&self) -> BTreeMap<String, Vec<u8>> {
        self.assets.lock().unwrap().clone()
    }
}

impl AssetSink for CollectingSink {
    fn emit<'a>(&'a self, target: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            self.assets.lock().unwrap().insert(target.to_string(), bytes);
            Ok(())
        })
    }
}

/// Sink that writes assets under an output directory.
#[derive(Debug, Clone)]
pub struct FsSink {
    out_dir: PathBuf,
}

impl FsSink {
    #[must_use]
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

impl AssetSink for FsSink {
    fn emit<'a>(&'a self, target: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let path = self.out_dir.join(target);
            minipack_util::fs::atomic_write(&path, &bytes)?;
            Ok(())
        })
    }
}

/// Default resolver: relative/absolute joining with extension, mode-variant
/// and directory-index probing.
///
/// Mode variants let one logical resource ship per-platform sources: for a
/// target mode `ali`, `comp.ali.mini` is preferred over `comp.mini`.
/// Requests matching a configured ignore prefix resolve to
/// [`Resolution::Ignored`].
#[derive(Debug, Clone)]
pub struct ExtensionResolver {
    mode: Mode,
    extensions: Vec<String>,
    ignored: Vec<String>,
}

/// Default extensions for probing, in order.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".mini", ".js", ".json"];

impl ExtensionResolver {
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            ignored: Vec::new(),
        }
    }

    /// Replace the probed extension list.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Requests whose path starts with any of these prefixes are ignored.
    #[must_use]
    pub fn with_ignored(mut self, ignored: Vec<String>) -> Self {
        self.ignored = ignored;
        self
    }

    fn candidates(&self, base: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mode = self.mode.as_str();

        if base.extension().is_some() {
            // Request names a concrete file: probe its mode variant first.
            if let (Some(stem), Some(ext)) = (base.file_stem(), base.extension()) {
                let variant = base.with_file_name(format!(
                    "{}.{mode}.{}",
                    stem.to_string_lossy(),
                    ext.to_string_lossy()
                ));
                out.push(variant);
            }
            out.push(base.to_path_buf());
            return out;
        }

        let base_str = base.to_string_lossy();
        for ext in &self.extensions {
            out.push(PathBuf::from(format!("{base_str}.{mode}{ext}")));
            out.push(PathBuf::from(format!("{base_str}{ext}")));
        }
        // Directory resolution
        for ext in &self.extensions {
            out.push(base.join(format!("index.{mode}{ext}")));
            out.push(base.join(format!("index{ext}")));
        }
        out
    }
}

impl PathResolver for ExtensionResolver {
    fn resolve<'a>(
        &'a self,
        context: &'a Path,
        request: &'a str,
    ) -> BoxFuture<'a, Result<Resolution, Error>> {
        Box::pin(async move {
            let parsed = parse_request(request);
            let raw = parsed.resource_path.as_str();

            let base = if Path::new(raw).is_absolute() {
                PathBuf::from(raw)
            } else {
                context.join(raw)
            };
            let base = clean_path(&base);

            let base_str = base.to_string_lossy();
            if self
                .ignored
                .iter()
                .any(|p| raw.starts_with(p.as_str()) || base_str.starts_with(p.as_str()))
            {
                return Ok(Resolution::Ignored);
            }

            for candidate in self.candidates(&base) {
                if tokio::fs::metadata(&candidate)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false)
                {
                    return Ok(Resolution::Resolved(ResolvedRequest {
                        path: candidate,
                        query: parsed.query,
                    }));
                }
            }

            Err(Error::resolution(context, request))
        })
    }
}

/// Lexically normalize a path: strip `.` components, fold `..` into their
/// parent. No filesystem access, no symlink resolution.
#[must_use]
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Whether a config value is a local asset request (as opposed to an
/// external URL or inline data).
#[must_use]
pub fn is_url_request(value: &str) -> bool {
    !value.is_empty() && !value.contains("://") && !value.starts_with("data:")
}
