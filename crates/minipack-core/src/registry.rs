//! Process-wide resource registry.
//!
//! Maps `kind -> package root -> resource path -> output state` for every
//! resource discovered during resolution. The registry is owned by the
//! compilation session (never a module-level singleton) and persists across
//! incremental rebuilds until explicitly reset.
//!
//! Registration is idempotent: re-registering an identical `(kind, root,
//! path, outputPath)` tuple reports `already_outputted` instead of failing,
//! which concurrently resolving branches rely on. Two distinct resources
//! claiming one output path get the newcomer renamed with a path digest; two
//! explicit, differing assignments for one resource are a fatal conflict.

use crate::diagnostics::Diagnostics;
use crate::error::Error;
use crate::output::OutputPaths;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Category of a resource; each kind owns its own output-path namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Page,
    Component,
    Plugin,
    Other,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Component => "component",
            Self::Plugin => "plugin",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package root of the main bundle. An empty root normalizes to this.
pub const MAIN_PACKAGE: &str = "main";

/// Output state of a registered resource.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputState {
    /// Presence recorded, no concrete output path assigned yet.
    Recorded,
    /// Concrete output path; immutable once set.
    Output(String),
}

/// Result of a [`ResourceRegistry::register`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The (possibly renamed) output path, when one was assigned.
    pub output_path: Option<String>,
    /// True when the identical registration already existed.
    pub already_outputted: bool,
}

/// A registration request.
#[derive(Debug, Clone, Copy)]
pub struct RegisterRequest<'a> {
    pub kind: ResourceKind,
    pub package_root: &'a str,
    pub resource_path: &'a str,
    /// Concrete output path to assign, or `None` to only mark presence.
    pub output_path: Option<&'a str>,
    /// Only mark presence; any supplied `output_path` is ignored, no
    /// allocation, validation or renaming happens.
    pub record_only: bool,
}

type Namespace = HashMap<String, OutputState>;

/// Shared registry of every resource discovered in a compilation session.
#[derive(Debug)]
pub struct ResourceRegistry {
    allocator: Arc<OutputPaths>,
    inner: Mutex<HashMap<ResourceKind, HashMap<String, Namespace>>>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new(allocator: Arc<OutputPaths>) -> Self {
        Self {
            allocator,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Register a resource under `(kind, package root)`.
    ///
    /// See the module docs for the collision and idempotence rules. The lock
    /// is held for the whole check-and-write, so interleaved async callers
    /// observe registration as a single step.
    pub fn register(
        &self,
        req: RegisterRequest<'_>,
        diagnostics: &Diagnostics,
    ) -> Result<Registration, Error> {
        let root = normalize_root(req.package_root);
        let mut inner = self.inner.lock().unwrap();
        let namespace = inner
            .entry(req.kind)
            .or_default()
            .entry(root.to_string())
            .or_default();

        // Record-only registration marks presence and nothing else; a
        // supplied output path is not allocated or validated.
        let requested = match req.output_path {
            Some(requested) if !req.record_only => requested,
            _ => {
                namespace
                    .entry(req.resource_path.to_string())
                    .or_insert(OutputState::Recorded);
                return Ok(Registration {
                    output_path: None,
                    already_outputted: false,
                });
            }
        };

        match namespace.get(req.resource_path) {
            Some(OutputState::Output(existing)) => {
                if existing == requested {
                    Ok(Registration {
                        output_path: Some(existing.clone()),
                        already_outputted: true,
                    })
                } else {
                    Err(Error::ConflictingRegistration {
                        kind: req.kind,
                        resource_path: req.resource_path.to_string(),
                        existing: existing.clone(),
                        requested: requested.to_string(),
                    })
                }
            }
            None | Some(OutputState::Recorded) => {
                let mut output_path = requested.to_string();
                let conflict = namespace.iter().find_map(|(key, state)| match state {
                    OutputState::Output(p) if p == requested && key != req.resource_path => {
                        Some(key.clone())
                    }
                    _ => None,
                });
                if let Some(prior) = conflict {
                    output_path = self.allocator.conflict(req.resource_path, requested);
                    diagnostics.warn(
                        req.resource_path,
                        format!(
                            "{} [{}] is registered with outputPath [{requested}] which is \
                             already taken by [{prior}], renamed to [{output_path}]",
                            req.kind, req.resource_path
                        ),
                    );
                }
                tracing::debug!(
                    kind = %req.kind,
                    root = %root,
                    resource = %req.resource_path,
                    output = %output_path,
                    "registered resource"
                );
                namespace.insert(
                    req.resource_path.to_string(),
                    OutputState::Output(output_path.clone()),
                );
                Ok(Registration {
                    output_path: Some(output_path),
                    already_outputted: false,
                })
            }
        }
    }

    /// Look up the concrete output path assigned to a resource.
    #[must_use]
    pub fn output_path_for(
        &self,
        kind: ResourceKind,
        package_root: &str,
        resource_path: &str,
    ) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        match inner
            .get(&kind)?
            .get(normalize_root(package_root))?
            .get(resource_path)?
        {
            OutputState::Output(path) => Some(path.clone()),
            OutputState::Recorded => None,
        }
    }

    /// Whether a resource is known at all (sentinel or concrete).
    #[must_use]
    pub fn contains(&self, kind: ResourceKind, package_root: &str, resource_path: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .get(&kind)
            .and_then(|roots| roots.get(normalize_root(package_root)))
            .is_some_and(|ns| ns.contains_key(resource_path))
    }

    /// Number of records in one `(kind, package root)` namespace.
    #[must_use]
    pub fn namespace_len(&self, kind: ResourceKind, package_root: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .get(&kind)
            .and_then(|roots| roots.get(normalize_root(package_root)))
            .map_or(0, Namespace::len)
    }

    /// Drop all records, e.g. at the start of a full (non-incremental) build.
    pub fn reset(&self) {
        self.inner.lock().unwrap().clear();
    }
}

fn normalize_root(package_root: &str) -> &str {
    if package_root.is_empty() {
        MAIN_PACKAGE
    } else {
        package_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PathHashMode;
    use std::path::PathBuf;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new(Arc::new(OutputPaths::new(
            PathBuf::from("/project"),
            PathHashMode::Absolute,
        )))
    }

    fn page_req<'a>(path: &'a str, out: &'a str) -> RegisterRequest<'a> {
        RegisterRequest {
            kind: ResourceKind::Page,
            package_root: "",
            resource_path: path,
            output_path: Some(out),
            record_only: false,
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let reg = registry();
        let diags = Diagnostics::new();

        let first = reg.register(page_req("/a", "pages/x/index.js"), &diags).unwrap();
        assert!(!first.already_outputted);

        let second = reg.register(page_req("/a", "pages/x/index.js"), &diags).unwrap();
        assert!(second.already_outputted);
        assert_eq!(second.output_path.as_deref(), Some("pages/x/index.js"));
        assert_eq!(reg.namespace_len(ResourceKind::Page, "main"), 1);
    }

    #[test]
    fn test_collision_renames_newcomer_only() {
        let reg = registry();
        let diags = Diagnostics::new();

        reg.register(page_req("/a", "pages/x/index.js"), &diags).unwrap();
        let renamed = reg.register(page_req("/b", "pages/x/index.js"), &diags).unwrap();

        let out = renamed.output_path.unwrap();
        assert_ne!(out, "pages/x/index.js");
        assert!(out.starts_with("pages/x/index"));
        assert!(out.ends_with(".js"));
        assert_eq!(diags.warning_count(), 1);

        // The prior registration is untouched and still idempotent.
        let third = reg.register(page_req("/a", "pages/x/index.js"), &diags).unwrap();
        assert!(third.already_outputted);
    }

    #[test]
    fn test_conflicting_reregistration_is_fatal() {
        let reg = registry();
        let diags = Diagnostics::new();

        reg.register(page_req("/a", "pages/x/index.js"), &diags).unwrap();
        let err = reg.register(page_req("/a", "pages/y/index.js"), &diags).unwrap_err();
        assert!(matches!(err, Error::ConflictingRegistration { .. }));
    }

    #[test]
    fn test_record_only_sentinel_then_concrete() {
        let reg = registry();
        let diags = Diagnostics::new();

        let sentinel = reg
            .register(
                RegisterRequest {
                    kind: ResourceKind::Component,
                    package_root: "sub-a",
                    resource_path: "/c",
                    output_path: None,
                    record_only: true,
                },
                &diags,
            )
            .unwrap();
        assert_eq!(sentinel.output_path, None);
        assert!(reg.contains(ResourceKind::Component, "sub-a", "/c"));
        assert_eq!(reg.output_path_for(ResourceKind::Component, "sub-a", "/c"), None);

        // A later concrete registration upgrades the sentinel.
        let concrete = reg
            .register(
                RegisterRequest {
                    kind: ResourceKind::Component,
                    package_root: "sub-a",
                    resource_path: "/c",
                    output_path: Some("components/c1/index.js"),
                    record_only: false,
                },
                &diags,
            )
            .unwrap();
        assert!(!concrete.already_outputted);
        assert_eq!(
            reg.output_path_for(ResourceKind::Component, "sub-a", "/c").as_deref(),
            Some("components/c1/index.js")
        );
    }

    #[test]
    fn test_record_only_ignores_supplied_path() {
        let reg = registry();
        let diags = Diagnostics::new();

        let marked = reg
            .register(
                RegisterRequest {
                    kind: ResourceKind::Other,
                    package_root: "",
                    resource_path: "/init.js",
                    output_path: Some("other/init.js"),
                    record_only: true,
                },
                &diags,
            )
            .unwrap();
        assert_eq!(marked.output_path, None);
        assert!(reg.contains(ResourceKind::Other, "", "/init.js"));
        assert_eq!(reg.output_path_for(ResourceKind::Other, "", "/init.js"), None);
        assert_eq!(diags.warning_count(), 0);
    }

    #[test]
    fn test_namespaces_are_independent() {
        let reg = registry();
        let diags = Diagnostics::new();

        reg.register(page_req("/a", "pages/x/index.js"), &diags).unwrap();
        // Same output path in another kind's namespace: no collision.
        reg.register(
            RegisterRequest {
                kind: ResourceKind::Component,
                package_root: "",
                resource_path: "/b",
                output_path: Some("pages/x/index.js"),
                record_only: false,
            },
            &diags,
        )
        .unwrap();
        assert_eq!(diags.warning_count(), 0);
    }

    #[test]
    fn test_empty_root_aliases_main() {
        let reg = registry();
        let diags = Diagnostics::new();
        reg.register(page_req("/a", "pages/a/index.js"), &diags).unwrap();
        assert!(reg.contains(ResourceKind::Page, MAIN_PACKAGE, "/a"));
        assert!(reg.contains(ResourceKind::Page, "", "/a"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let reg = registry();
        let diags = Diagnostics::new();
        reg.register(page_req("/a", "pages/a/index.js"), &diags).unwrap();
        reg.reset();
        assert_eq!(reg.namespace_len(ResourceKind::Page, "main"), 0);
    }
}
