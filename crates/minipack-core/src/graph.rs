//! Graph resolver.
//!
//! Walks the app-level configuration and recursively resolves pages,
//! components, plugins, external package includes, sub-packages and worker
//! directories into the final output graph. The six app-root branches fan
//! out concurrently and join at a single barrier; sub-packages are visited
//! strictly in source order because the first-seen target root wins.
//!
//! Failure semantics: an `Ignored` resolution prunes the reference from its
//! parent collection; every other error aborts the enclosing barrier and
//! surfaces to the caller. No partial manifest is emitted for a failed app.

use crate::error::Error;
use crate::manifest::{
    is_composite, AppConfig, AppManifest, Independent, PackageConfig, PageEntry, PageRef,
    PluginConfig, SubPackageConfig, SubPackageManifest,
};
use crate::output::join_posix;
use crate::registry::{RegisterRequest, ResourceKind};
use crate::request::{add_query, Query};
use crate::resolve::{is_url_request, Resolution, ResolvedRequest};
use crate::rules::{fix_using_components, translate_tab_bar};
use crate::session::CompileSession;
use futures::future::{try_join_all, BoxFuture};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use walkdir::WalkDir;

/// Resolver state for one app root.
pub(crate) struct AppResolver<'s> {
    session: &'s CompileSession,
    /// Main-bundle pages; the first page is pinned to index 0 regardless of
    /// completion order.
    local_pages: Mutex<Vec<PageEntry>>,
    /// Sub-package manifests in declaration order.
    sub_packages: Mutex<Vec<SubPackageManifest>>,
    /// Target roots already claimed; first seen wins.
    seen_roots: Mutex<HashSet<String>>,
    /// Resolved page keys across the whole app, for global page dedup.
    page_keys: Mutex<HashSet<String>>,
}

impl<'s> AppResolver<'s> {
    pub(crate) fn new(session: &'s CompileSession) -> Self {
        Self {
            session,
            local_pages: Mutex::new(Vec::new()),
            sub_packages: Mutex::new(Vec::new()),
            seen_roots: Mutex::new(HashSet::new()),
            page_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Resolve the whole app graph and assemble the final manifest.
    pub(crate) async fn resolve(
        self,
        config: AppConfig,
        context: &Path,
    ) -> Result<AppManifest, Error> {
        let AppConfig {
            pages,
            mut using_components,
            packages,
            sub_packages,
            plugins,
            workers,
            mut tab_bar,
            mut option_menu,
            mut theme_location,
            rest,
        } = config;

        fix_using_components(
            &mut using_components,
            self.session.options.mode,
            &context.to_string_lossy(),
            &self.session.diagnostics,
        );

        // Tag the first page before fan-out so position 0 survives any
        // completion order.
        let mut page_requests = page_requests(&pages);
        if let Some(first) = page_requests.first_mut() {
            let mut query = Query::new();
            query.insert("isFirst".to_string(), "true".to_string());
            *first = add_query(first, &query);
        }

        let (_, using_components, plugins, (), (), (), ()) = futures::try_join!(
            self.process_pages(&page_requests, context, "", &self.local_pages),
            self.process_components(using_components, context, ""),
            self.process_plugins(plugins, context, ""),
            self.process_workers(workers.as_deref(), context),
            self.process_packages(packages, context),
            self.process_sub_packages(&sub_packages, context),
            self.process_custom_tab_bar(&mut tab_bar, context),
        )?;

        // Asset references in the remaining config fields.
        self.process_tab_bar_assets(&mut tab_bar, context).await?;
        self.process_option_menu_assets(&mut option_menu, context).await?;
        self.process_theme_location(&mut theme_location, context).await?;

        let pages = std::mem::take(&mut *self.local_pages.lock().unwrap());
        let sub_packages = std::mem::take(&mut *self.sub_packages.lock().unwrap())
            .into_iter()
            // A sub-package with no pages is not legal output.
            .filter(|sub| !sub.pages.is_empty())
            .collect();

        tracing::debug!(mode = %self.session.options.mode, "app graph assembled");
        Ok(AppManifest {
            pages,
            sub_packages,
            using_components,
            plugins,
            tab_bar,
            option_menu,
            theme_location,
            rest,
        })
    }

    async fn process_pages(
        &self,
        requests: &[String],
        context: &Path,
        tar_root: &str,
        collected: &Mutex<Vec<PageEntry>>,
    ) -> Result<(), Error> {
        try_join_all(
            requests
                .iter()
                .map(|request| self.process_page(request, context, tar_root, collected)),
        )
        .await?;
        Ok(())
    }

    async fn process_page(
        &self,
        request: &str,
        context: &Path,
        tar_root: &str,
        collected: &Mutex<Vec<PageEntry>>,
    ) -> Result<(), Error> {
        let resolved = match self.session.resolver.resolve(context, request).await? {
            Resolution::Resolved(resolved) => resolved,
            // Excluded on this platform: prune without error.
            Resolution::Ignored => return Ok(()),
        };
        let key = resolved.path.to_string_lossy().into_owned();

        {
            let mut keys = self.page_keys.lock().unwrap();
            if !keys.insert(key.clone()) {
                return Ok(());
            }
        }

        let allocated = self
            .session
            .output_paths
            .allocate(&key, ResourceKind::Page, "");
        let entry_path = join_posix(&[tar_root, &allocated]);
        let registration = self.session.registry.register(
            RegisterRequest {
                kind: ResourceKind::Page,
                package_root: tar_root,
                resource_path: &key,
                output_path: Some(&entry_path),
                record_only: false,
            },
            &self.session.diagnostics,
        )?;
        let entry_path = registration.output_path.unwrap_or(entry_path);

        let is_first = tar_root.is_empty() && resolved.query.get("isFirst").is_some();
        let entry = PageEntry {
            path: entry_path,
            is_first,
            query: resolved.query,
        };

        let mut list = collected.lock().unwrap();
        if is_first {
            list.insert(0, entry);
        } else {
            list.push(entry);
        }
        Ok(())
    }

    async fn process_components(
        &self,
        components: BTreeMap<String, String>,
        context: &Path,
        tar_root: &str,
    ) -> Result<BTreeMap<String, String>, Error> {
        let resolved = try_join_all(components.into_iter().map(|(name, request)| async move {
            Ok::<_, Error>(
                resolve_component_entry(self.session, &request, context, tar_root)
                    .await?
                    .map(|entry| (name, entry)),
            )
        }))
        .await?;
        Ok(resolved.into_iter().flatten().collect())
    }

    fn process_packages<'a>(
        &'a self,
        packages: Vec<String>,
        context: &'a Path,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            try_join_all(
                packages
                    .into_iter()
                    .map(|request| self.process_package(request, context)),
            )
            .await?;
            Ok(())
        })
    }

    /// Resolve one external package include: read it, splice its pages in
    /// (at the main root or at a caller-declared sub-package root), then
    /// recurse into its own includes.
    async fn process_package(&self, request: String, context: &Path) -> Result<(), Error> {
        let resolved = match self.session.resolver.resolve(context, &request).await? {
            Resolution::Resolved(resolved) => resolved,
            Resolution::Ignored => return Ok(()),
        };
        let ResolvedRequest { path, mut query } = resolved;

        let bytes = self.session.reader.read(&path).await?;
        let text = String::from_utf8_lossy(&bytes);
        let json = if is_composite(&path) {
            // A composite include declared independent ships its own script
            // block as the init module.
            if query.get("independent").map(String::as_str) == Some("true") {
                query.insert(
                    "independent".to_string(),
                    path.to_string_lossy().into_owned(),
                );
            }
            crate::manifest::extract_json_block(&text, &path)?
        } else {
            &text
        };
        let content: PackageConfig = crate::manifest::parse_config(json, &path)?;
        let nested = path.parent().unwrap_or(context).to_path_buf();

        if let Some(root) = query.remove("root") {
            let independent = query.remove("independent").map(|value| {
                if value == "true" {
                    Independent::Flag(true)
                } else {
                    Independent::Module(value)
                }
            });
            let rest: Map<String, Value> = query
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            // Only the output paths get the root prefix; the include's pages
            // still resolve next to the package file.
            let sub = SubPackageConfig {
                tar_root: Some(root),
                pages: content.pages,
                plugins: content.plugins,
                independent,
                rest,
                ..Default::default()
            };
            self.process_sub_package(&sub, &nested).await?;
        } else if !content.pages.is_empty() {
            self.process_pages(&page_requests(&content.pages), &nested, "", &self.local_pages)
                .await?;
        }

        if !content.packages.is_empty() {
            self.process_packages(content.packages, &nested).await?;
        }
        Ok(())
    }

    /// Sub-packages resolve strictly in declaration order: the first
    /// declaration of a target root wins and later ones are dropped.
    async fn process_sub_packages(
        &self,
        sub_packages: &[SubPackageConfig],
        context: &Path,
    ) -> Result<(), Error> {
        for sub in sub_packages {
            self.process_sub_package(sub, context).await?;
        }
        Ok(())
    }

    async fn process_sub_package(
        &self,
        sub: &SubPackageConfig,
        context: &Path,
    ) -> Result<(), Error> {
        if let Some(root) = &sub.root {
            if root.starts_with('.') {
                // Fatal to this sub-package, not to its siblings.
                self.session.diagnostics.error(
                    root,
                    Error::InvalidSubPackageRoot { root: root.clone() }.to_string(),
                );
                return Ok(());
            }
        }
        let tar_root = sub.tar_root().to_string();
        if tar_root.is_empty() {
            return Ok(());
        }
        {
            let mut seen = self.seen_roots.lock().unwrap();
            if !seen.insert(tar_root.clone()) {
                tracing::debug!(root = %tar_root, "duplicate sub-package root dropped");
                return Ok(());
            }
        }

        // Reserve the slot now so declaration order survives concurrent
        // completion of the children.
        let slot = {
            let mut subs = self.sub_packages.lock().unwrap();
            subs.push(SubPackageManifest {
                root: tar_root.clone(),
                ..Default::default()
            });
            subs.len() - 1
        };

        let context = context.join(sub.src_root());
        let collected = Mutex::new(Vec::new());
        let requests = page_requests(&sub.pages);
        let (independent, plugins, ()) = futures::try_join!(
            self.process_independent(sub.independent.as_ref(), &context, &tar_root),
            self.process_plugins(sub.plugins.clone(), &context, &tar_root),
            self.process_pages(&requests, &context, &tar_root, &collected),
        )?;

        let mut subs = self.sub_packages.lock().unwrap();
        let manifest = &mut subs[slot];
        manifest.pages = collected.into_inner().unwrap();
        manifest.plugins = plugins;
        manifest.independent = independent;
        manifest.rest = sub.rest.clone();
        Ok(())
    }

    /// Handle the `independent` field of a sub-package. Returns whether the
    /// sub-package is flagged independent in the output.
    async fn process_independent(
        &self,
        independent: Option<&Independent>,
        context: &Path,
        tar_root: &str,
    ) -> Result<bool, Error> {
        let Some(independent) = independent else {
            return Ok(false);
        };
        if !self.session.options.mode.capabilities().supports_independent {
            // The field is stripped on platforms without independent
            // sub-packages, never resolved.
            return Ok(false);
        }
        match independent {
            Independent::Flag(false) => Ok(false),
            Independent::Flag(true) => {
                self.session.record_independent(tar_root, None);
                Ok(true)
            }
            Independent::Module(request) => {
                match self.session.resolver.resolve(context, request).await? {
                    Resolution::Resolved(resolved) => {
                        self.session.registry.register(
                            RegisterRequest {
                                kind: ResourceKind::Other,
                                package_root: tar_root,
                                resource_path: &resolved.path.to_string_lossy(),
                                output_path: None,
                                record_only: true,
                            },
                            &self.session.diagnostics,
                        )?;
                        self.session
                            .record_independent(tar_root, Some(resolved.path));
                        Ok(true)
                    }
                    Resolution::Ignored => {
                        self.session.record_independent(tar_root, None);
                        Ok(true)
                    }
                }
            }
        }
    }

    async fn process_plugins(
        &self,
        plugins: BTreeMap<String, PluginConfig>,
        context: &Path,
        tar_root: &str,
    ) -> Result<BTreeMap<String, PluginConfig>, Error> {
        // Plugin export only exists on platforms that support it; elsewhere
        // the declarations pass through as authored.
        if plugins.is_empty() || !self.session.options.mode.capabilities().supports_plugins {
            return Ok(plugins);
        }
        let entries = try_join_all(
            plugins
                .into_iter()
                .map(|(name, plugin)| self.process_plugin(name, plugin, context, tar_root)),
        )
        .await?;
        Ok(entries.into_iter().collect())
    }

    async fn process_plugin(
        &self,
        name: String,
        mut plugin: PluginConfig,
        context: &Path,
        tar_root: &str,
    ) -> Result<(String, PluginConfig), Error> {
        let generics = std::mem::take(&mut plugin.generics_implementation);
        let export = plugin.export.take();

        let (generics, export) = futures::try_join!(
            async {
                let resolved = try_join_all(generics.into_iter().map(|(slot, components)| {
                    async move {
                        let components =
                            self.process_components(components, context, tar_root).await?;
                        Ok::<_, Error>((slot, components))
                    }
                }))
                .await?;
                Ok::<_, Error>(resolved.into_iter().collect::<BTreeMap<_, _>>())
            },
            async {
                let Some(request) = export else {
                    return Ok::<_, Error>(None);
                };
                match self.session.resolver.resolve(context, &request).await? {
                    Resolution::Ignored => Ok(None),
                    Resolution::Resolved(resolved) => {
                        let key = resolved.path.to_string_lossy().into_owned();
                        let allocated =
                            self.session
                                .output_paths
                                .allocate(&key, ResourceKind::Plugin, ".js");
                        let entry = join_posix(&[tar_root, &allocated]);
                        let registration = self.session.registry.register(
                            RegisterRequest {
                                kind: ResourceKind::Plugin,
                                package_root: tar_root,
                                resource_path: &key,
                                output_path: Some(&entry),
                                record_only: false,
                            },
                            &self.session.diagnostics,
                        )?;
                        Ok(registration.output_path)
                    }
                }
            }
        )?;

        plugin.generics_implementation = generics;
        plugin.export = export;
        Ok((name, plugin))
    }

    /// Copy a worker directory verbatim into the output tree.
    async fn process_workers(&self, workers: Option<&str>, context: &Path) -> Result<(), Error> {
        let Some(workers) = workers else {
            return Ok(());
        };
        let dir = context.join(workers);
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .map_or_else(|| Error::other("worker directory walk failed"), Error::Io)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let target = entry
                .path()
                .strip_prefix(context)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let bytes = self.session.reader.read(entry.path()).await?;
            self.session.sink.emit(&target, bytes).await?;
        }
        Ok(())
    }

    /// Resolve a declared custom tab bar component at its fixed output path.
    async fn process_custom_tab_bar(
        &self,
        tab_bar: &mut Option<Value>,
        context: &Path,
    ) -> Result<(), Error> {
        let Some(Value::Object(map)) = tab_bar else {
            return Ok(());
        };
        if map.get("custom").and_then(Value::as_bool) != Some(true) {
            return Ok(());
        }
        match self
            .session
            .resolver
            .resolve(context, "./custom-tab-bar/index")
            .await?
        {
            Resolution::Resolved(resolved) => {
                self.session.registry.register(
                    RegisterRequest {
                        kind: ResourceKind::Component,
                        package_root: "",
                        resource_path: &resolved.path.to_string_lossy(),
                        output_path: Some("custom-tab-bar/index"),
                        record_only: false,
                    },
                    &self.session.diagnostics,
                )?;
            }
            Resolution::Ignored => {
                map.remove("custom");
            }
        }
        Ok(())
    }

    /// Translate the tab bar to the target schema and re-point its icon
    /// assets at registered output paths.
    async fn process_tab_bar_assets(
        &self,
        tab_bar: &mut Option<Value>,
        context: &Path,
    ) -> Result<(), Error> {
        let Some(value) = tab_bar else {
            return Ok(());
        };
        translate_tab_bar(value, self.session.options.src_mode, self.session.options.mode);

        let schema = self.session.options.mode.capabilities().tab_bar;
        let Some(Value::Array(items)) = value.get_mut(schema.list_key) else {
            return Ok(());
        };
        for item in items {
            let Value::Object(item) = item else { continue };
            for key in [schema.icon_key, schema.active_icon_key] {
                if let Some(Value::String(request)) = item.get(key) {
                    if let Some(output) = self.resolve_asset(&request.clone(), context).await? {
                        item.insert(key.to_string(), Value::String(output));
                    }
                }
            }
        }
        Ok(())
    }

    async fn process_option_menu_assets(
        &self,
        option_menu: &mut Option<Value>,
        context: &Path,
    ) -> Result<(), Error> {
        let Some(schema) = self.session.options.mode.capabilities().option_menu else {
            return Ok(());
        };
        let Some(Value::Object(map)) = option_menu else {
            return Ok(());
        };
        if let Some(Value::String(request)) = map.get(schema.icon_key) {
            if let Some(output) = self.resolve_asset(&request.clone(), context).await? {
                map.insert(schema.icon_key.to_string(), Value::String(output));
            }
        }
        Ok(())
    }

    async fn process_theme_location(
        &self,
        theme_location: &mut Option<String>,
        context: &Path,
    ) -> Result<(), Error> {
        let Some(request) = theme_location.as_ref() else {
            return Ok(());
        };
        if let Some(output) = self.resolve_asset(&request.clone(), context).await? {
            *theme_location = Some(output);
        }
        Ok(())
    }

    /// Resolve a config-referenced asset (icon, theme file) and register it
    /// under [`ResourceKind::Other`]. External URLs pass through untouched.
    async fn resolve_asset(
        &self,
        request: &str,
        context: &Path,
    ) -> Result<Option<String>, Error> {
        if !is_url_request(request) {
            return Ok(None);
        }
        let resolved = match self.session.resolver.resolve(context, request).await? {
            Resolution::Resolved(resolved) => resolved,
            Resolution::Ignored => return Ok(None),
        };
        let key = resolved.path.to_string_lossy().into_owned();
        let ext = resolved
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let allocated = self
            .session
            .output_paths
            .allocate(&key, ResourceKind::Other, &ext);
        let registration = self.session.registry.register(
            RegisterRequest {
                kind: ResourceKind::Other,
                package_root: "",
                resource_path: &key,
                output_path: Some(&allocated),
                record_only: false,
            },
            &self.session.diagnostics,
        )?;
        Ok(registration.output_path)
    }
}

/// Resolve a component reference: register it under its package root and
/// return its output entry, or `None` when the platform excludes it.
/// `plugin://` references pass through untouched.
pub(crate) async fn resolve_component_entry(
    session: &CompileSession,
    request: &str,
    context: &Path,
    tar_root: &str,
) -> Result<Option<String>, Error> {
    if request.starts_with("plugin://") {
        return Ok(Some(request.to_string()));
    }
    let resolved = match session.resolver.resolve(context, request).await? {
        Resolution::Resolved(resolved) => resolved,
        Resolution::Ignored => return Ok(None),
    };
    let key = resolved.path.to_string_lossy().into_owned();
    let allocated = session
        .output_paths
        .allocate(&key, ResourceKind::Component, "");
    let entry = join_posix(&[tar_root, &allocated]);
    let registration = session.registry.register(
        RegisterRequest {
            kind: ResourceKind::Component,
            package_root: tar_root,
            resource_path: &key,
            output_path: Some(&entry),
            record_only: false,
        },
        &session.diagnostics,
    )?;
    Ok(registration.output_path)
}

fn page_requests(pages: &[PageRef]) -> Vec<String> {
    pages.iter().map(PageRef::request).collect()
}

impl CompileSession {
    /// Shared page/component-level resolution: complete defaults, apply
    /// platform rules, then resolve `usingComponents` and generic defaults
    /// concurrently.
    pub(crate) async fn resolve_leaf_config(
        &self,
        request: &str,
        package_root: &str,
        is_component: bool,
    ) -> Result<crate::manifest::PageComponentConfig, Error> {
        let project_context = self.options.project_root.clone();
        let resolved = match self.resolver.resolve(&project_context, request).await? {
            Resolution::Resolved(resolved) => resolved,
            Resolution::Ignored => return Err(Error::resolution(project_context, request)),
        };

        let mut config: crate::manifest::PageComponentConfig =
            self.read_config(&resolved.path).await?;
        config = config.completed(is_component);
        let resource = resolved.path.to_string_lossy().into_owned();
        fix_using_components(
            &mut config.using_components,
            self.options.mode,
            &resource,
            &self.diagnostics,
        );

        let context = resolved
            .path
            .parent()
            .unwrap_or(&project_context)
            .to_path_buf();

        // A resource-local source mode propagates into child requests.
        let mut inherited = Query::new();
        if let Some(mode) = resolved.query.get("mode") {
            inherited.insert("mode".to_string(), mode.clone());
        }

        let components: BTreeMap<String, String> = config
            .using_components
            .iter()
            .map(|(name, request)| (name.clone(), add_query(request, &inherited)))
            .collect();
        let generics = std::mem::take(&mut config.component_generics);

        let (components, generics) = futures::try_join!(
            async {
                let resolved = try_join_all(components.into_iter().map(|(name, request)| {
                    let context = &context;
                    async move {
                        Ok::<_, Error>(
                            resolve_component_entry(self, &request, context, package_root)
                                .await?
                                .map(|entry| (name, entry)),
                        )
                    }
                }))
                .await?;
                Ok::<_, Error>(resolved.into_iter().flatten().collect::<BTreeMap<_, _>>())
            },
            async {
                let resolved = try_join_all(generics.into_iter().map(|(name, mut generic)| {
                    let context = &context;
                    let inherited = &inherited;
                    async move {
                        if let Some(default) = generic.default.take() {
                            let request = add_query(&default, inherited);
                            generic.default =
                                resolve_component_entry(self, &request, context, package_root)
                                    .await?;
                        }
                        Ok::<_, Error>((name, generic))
                    }
                }))
                .await?;
                Ok::<_, Error>(resolved.into_iter().collect::<BTreeMap<_, _>>())
            }
        )?;

        config.using_components = components;
        config.component_generics = generics;
        Ok(config)
    }
}
