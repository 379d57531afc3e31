//! Compilation session: the composition root for one build.
//!
//! Owns the shared registry, output allocator, diagnostics sink, and the
//! collaborator seams. The registry persists for the session lifetime, so a
//! session can be reused across incremental rebuilds; `reset_registry`
//! starts from scratch.

use crate::config::SessionOptions;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Error;
use crate::graph::AppResolver;
use crate::manifest::{
    extract_json_block, is_composite, parse_config, AppConfig, AppManifest, PageComponentConfig,
};
use crate::output::{OutputPathHook, OutputPaths};
use crate::registry::{ResourceKind, ResourceRegistry};
use crate::resolve::{
    AssetSink, CollectingSink, ExtensionResolver, FsReader, PathResolver, Resolution, SourceReader,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One compilation session over a project.
pub struct CompileSession {
    pub(crate) options: SessionOptions,
    pub(crate) output_paths: Arc<OutputPaths>,
    pub(crate) registry: ResourceRegistry,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) resolver: Arc<dyn PathResolver>,
    pub(crate) reader: Arc<dyn SourceReader>,
    pub(crate) sink: Arc<dyn AssetSink>,
    /// Sub-package roots flagged independent, with their init module (if an
    /// explicit one was declared).
    pub(crate) independent_roots: Mutex<BTreeMap<String, Option<PathBuf>>>,
}

impl CompileSession {
    /// Create a session with default collaborators: extension-probing
    /// resolver, fs reader, in-memory asset sink.
    pub fn new(options: SessionOptions) -> Result<Self, Error> {
        options.validate()?;
        let output_paths = Arc::new(OutputPaths::new(
            options.project_root.clone(),
            options.path_hash_mode,
        ));
        Ok(Self {
            resolver: Arc::new(ExtensionResolver::new(options.mode)),
            reader: Arc::new(FsReader),
            sink: Arc::new(CollectingSink::new()),
            registry: ResourceRegistry::new(Arc::clone(&output_paths)),
            diagnostics: Diagnostics::new(),
            independent_roots: Mutex::new(BTreeMap::new()),
            output_paths,
            options,
        })
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_reader(mut self, reader: Arc<dyn SourceReader>) -> Self {
        self.reader = reader;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn AssetSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Install a custom output path allocation hook.
    ///
    /// Rebuilds the allocator and the (still empty) registry bound to it;
    /// call before resolving anything.
    #[must_use]
    pub fn with_output_hook(mut self, hook: Arc<OutputPathHook>) -> Self {
        let output_paths = Arc::new(
            OutputPaths::new(self.options.project_root.clone(), self.options.path_hash_mode)
                .with_custom(hook),
        );
        self.registry = ResourceRegistry::new(Arc::clone(&output_paths));
        self.output_paths = output_paths;
        self
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Resolve the app-level resource into the final manifest.
    ///
    /// This is the fan-out root: pages, components, plugins, workers,
    /// packages and sub-packages are all resolved from here.
    pub async fn resolve_app(&self, request: &str) -> Result<AppManifest, Error> {
        let context = self.options.project_root.clone();
        let resolved = match self.resolver.resolve(&context, request).await? {
            Resolution::Resolved(r) => r,
            Resolution::Ignored => {
                return Err(Error::other(format!(
                    "app entry [{request}] is excluded on mode [{}]",
                    self.options.mode
                )));
            }
        };

        let config: AppConfig = self.read_config(&resolved.path).await?;
        let app_context = resolved
            .path
            .parent()
            .unwrap_or(&context)
            .to_path_buf();

        tracing::debug!(app = %resolved.path.display(), mode = %self.options.mode, "resolving app graph");
        AppResolver::new(self).resolve(config, &app_context).await
    }

    /// Resolve a page-level config: complete defaults and resolve its
    /// component references.
    pub async fn resolve_page_config(
        &self,
        request: &str,
        package_root: &str,
    ) -> Result<PageComponentConfig, Error> {
        self.resolve_leaf_config(request, package_root, false).await
    }

    /// Resolve a component-level config: force the `component` flag and
    /// resolve its component and generic references.
    pub async fn resolve_component_config(
        &self,
        request: &str,
        package_root: &str,
    ) -> Result<PageComponentConfig, Error> {
        self.resolve_leaf_config(request, package_root, true).await
    }

    /// Read a resource and parse its config, extracting the JSON block from
    /// composite sources first.
    pub(crate) async fn read_config<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<T, Error> {
        let bytes = self.reader.read(path).await?;
        let text = String::from_utf8_lossy(&bytes);
        let json = if is_composite(path) {
            extract_json_block(&text, path)?
        } else {
            &text
        };
        parse_config(json, path)
    }

    /// Registry snapshot query.
    #[must_use]
    pub fn output_path_for(
        &self,
        kind: ResourceKind,
        package_root: &str,
        resource_path: &str,
    ) -> Option<String> {
        self.registry.output_path_for(kind, package_root, resource_path)
    }

    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Drain collected warnings and non-fatal errors.
    #[must_use]
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    /// Independent sub-package roots seen so far, with their init modules.
    #[must_use]
    pub fn independent_roots(&self) -> BTreeMap<String, Option<PathBuf>> {
        self.independent_roots.lock().unwrap().clone()
    }

    pub(crate) fn record_independent(&self, root: &str, module: Option<PathBuf>) {
        self.independent_roots
            .lock()
            .unwrap()
            .entry(root.to_string())
            .or_insert(module);
    }

    /// Drop all registry records for a full, non-incremental rebuild.
    pub fn reset_registry(&self) {
        self.registry.reset();
        self.independent_roots.lock().unwrap().clear();
    }
}
