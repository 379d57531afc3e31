//! Declarative configuration model.
//!
//! Input side: the app-level config (`AppConfig`), externally included
//! package configs (`PackageConfig`), sub-package declarations, and
//! page/component-level configs. Unmodeled fields flow through untouched via
//! `#[serde(flatten)]` so platform-specific extras survive the build.
//!
//! Output side: the assembled `AppManifest` consumed by the build pipeline.
//! Each resolution stage takes a value and returns a new one; nothing is
//! mutated in place across stages.

use crate::error::Error;
use crate::request::{add_query, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Extension of composite single-file source units.
pub const COMPOSITE_EXT: &str = "mini";

/// A page reference in a `pages` list: plain path or `{ "src": … }` object.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PageRef {
    Path(String),
    Entry {
        src: String,
        #[serde(flatten)]
        rest: Map<String, Value>,
    },
}

impl PageRef {
    /// The request string for this reference, folding object fields into
    /// the query.
    #[must_use]
    pub fn request(&self) -> String {
        match self {
            Self::Path(p) => p.clone(),
            Self::Entry { src, rest } => {
                let mut query = Query::new();
                for (k, v) in rest {
                    query.insert(k.clone(), value_to_query_string(v));
                }
                add_query(src, &query)
            }
        }
    }
}

fn value_to_query_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The `independent` field of a sub-package: a bare flag, or the request of
/// an explicit init module.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Independent {
    Flag(bool),
    Module(String),
}

/// Plugin declaration; resolved in place, so it serializes back out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub generics_implementation: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A sub-package declaration as authored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubPackageConfig {
    pub root: Option<String>,
    /// Source directory offset; defaults to `root`.
    pub src_root: Option<String>,
    /// Target root in the output tree; defaults to `root`.
    pub tar_root: Option<String>,
    pub pages: Vec<PageRef>,
    pub plugins: BTreeMap<String, PluginConfig>,
    pub independent: Option<Independent>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl SubPackageConfig {
    #[must_use]
    pub fn tar_root(&self) -> &str {
        self.tar_root
            .as_deref()
            .or(self.root.as_deref())
            .unwrap_or("")
    }

    #[must_use]
    pub fn src_root(&self) -> &str {
        self.src_root
            .as_deref()
            .or(self.root.as_deref())
            .unwrap_or("")
    }
}

/// An externally included package config: pages and further includes at a
/// caller-declared root offset. Inclusion is transitive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageConfig {
    pub pages: Vec<PageRef>,
    pub packages: Vec<String>,
    pub plugins: BTreeMap<String, PluginConfig>,
}

/// The app-level entry configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub pages: Vec<PageRef>,
    pub using_components: BTreeMap<String, String>,
    pub packages: Vec<String>,
    #[serde(alias = "subpackages")]
    pub sub_packages: Vec<SubPackageConfig>,
    pub plugins: BTreeMap<String, PluginConfig>,
    /// A directory whose contents are copied verbatim into the output tree.
    pub workers: Option<String>,
    pub tab_bar: Option<Value>,
    pub option_menu: Option<Value>,
    pub theme_location: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A generic slot declaration in a component config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericDecl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Page- or component-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageComponentConfig {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub component: bool,
    pub using_components: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub component_generics: BTreeMap<String, GenericDecl>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl PageComponentConfig {
    /// Complete defaults: pages always expose a `usingComponents` map,
    /// components are always flagged `component: true`.
    #[must_use]
    pub fn completed(mut self, is_component: bool) -> Self {
        if is_component {
            self.component = true;
        }
        self
    }
}

/// A resolved page entry. Serializes as its output path; `is_first` and the
/// originating query survive only in memory for ordering and tagging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub path: String,
    pub is_first: bool,
    pub query: Query,
}

impl Serialize for PageEntry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

/// A resolved sub-package in the final manifest.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPackageManifest {
    pub root: String,
    pub pages: Vec<PageEntry>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub plugins: BTreeMap<String, PluginConfig>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub independent: bool,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// The final application manifest handed to the build pipeline.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppManifest {
    pub pages: Vec<PageEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_packages: Vec<SubPackageManifest>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub using_components: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub plugins: BTreeMap<String, PluginConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_bar: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_menu: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_location: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl AppManifest {
    /// Serialize the generated configuration artifact.
    pub fn to_json_pretty(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::other(e.to_string()))
    }
}

/// Parse a config file's text into `T`, attributing failures to `path`.
pub fn parse_config<T: serde::de::DeserializeOwned>(text: &str, path: &Path) -> Result<T, Error> {
    let text = if text.trim().is_empty() { "{}" } else { text };
    serde_json::from_str(text).map_err(|source| Error::MalformedSourceConfig {
        path: path.to_path_buf(),
        source,
    })
}

/// Whether a path names a composite single-file source unit.
#[must_use]
pub fn is_composite(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == COMPOSITE_EXT)
}

/// Extract the JSON block from a composite source unit.
///
/// Composite units carry their config in a
/// `<script type="application/json"> … </script>` block.
pub fn extract_json_block<'a>(source: &'a str, path: &Path) -> Result<&'a str, Error> {
    const OPEN: &str = "<script type=\"application/json\">";
    const CLOSE: &str = "</script>";

    let start = source.find(OPEN).map(|i| i + OPEN.len());
    let block = start.and_then(|s| source[s..].find(CLOSE).map(|e| &source[s..s + e]));
    block.ok_or_else(|| Error::MissingJsonBlock {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_ref_object_folds_query() {
        let refs: Vec<PageRef> =
            serde_json::from_str(r#"["./a", {"src": "./b", "async": true}]"#).unwrap();
        assert_eq!(refs[0].request(), "./a");
        assert_eq!(refs[1].request(), "./b?async=true");
    }

    #[test]
    fn test_sub_package_root_fallbacks() {
        let sub: SubPackageConfig =
            serde_json::from_str(r#"{"root": "pkg-a", "pages": ["./p"]}"#).unwrap();
        assert_eq!(sub.tar_root(), "pkg-a");
        assert_eq!(sub.src_root(), "pkg-a");

        let sub: SubPackageConfig =
            serde_json::from_str(r#"{"tarRoot": "out", "srcRoot": "src", "pages": []}"#).unwrap();
        assert_eq!(sub.tar_root(), "out");
        assert_eq!(sub.src_root(), "src");
    }

    #[test]
    fn test_subpackages_alias() {
        let app: AppConfig =
            serde_json::from_str(r#"{"subpackages": [{"root": "a", "pages": ["./p"]}]}"#).unwrap();
        assert_eq!(app.sub_packages.len(), 1);
    }

    #[test]
    fn test_independent_flag_or_module() {
        let sub: SubPackageConfig =
            serde_json::from_str(r#"{"root": "a", "independent": true}"#).unwrap();
        assert_eq!(sub.independent, Some(Independent::Flag(true)));

        let sub: SubPackageConfig =
            serde_json::from_str(r#"{"root": "a", "independent": "./init"}"#).unwrap();
        assert_eq!(
            sub.independent,
            Some(Independent::Module("./init".to_string()))
        );
    }

    #[test]
    fn test_unknown_fields_flow_through() {
        let app: AppConfig =
            serde_json::from_str(r#"{"window": {"navigationBarTitleText": "Hi"}}"#).unwrap();
        assert!(app.rest.contains_key("window"));

        let manifest = AppManifest {
            rest: app.rest,
            ..Default::default()
        };
        let out = manifest.to_json_pretty().unwrap();
        assert!(out.contains("navigationBarTitleText"));
    }

    #[test]
    fn test_page_entry_serializes_as_path() {
        let entry = PageEntry {
            path: "pages/home123/index".to_string(),
            is_first: true,
            query: Query::new(),
        };
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            "\"pages/home123/index\""
        );
    }

    #[test]
    fn test_completed_component_sets_flag() {
        let cfg = PageComponentConfig::default().completed(true);
        assert!(cfg.component);
        let out = serde_json::to_string(&cfg).unwrap();
        assert!(out.contains("\"component\":true"));
    }

    #[test]
    fn test_extract_json_block() {
        let src = "<template><view/></template>\n<script type=\"application/json\">\n{\"pages\": []}\n</script>\n";
        let block = extract_json_block(src, Path::new("/a.mini")).unwrap();
        assert!(block.contains("\"pages\""));

        let err = extract_json_block("<template/>", Path::new("/a.mini")).unwrap_err();
        assert!(matches!(err, Error::MissingJsonBlock { .. }));
    }

    #[test]
    fn test_parse_config_empty_is_empty_object() {
        let cfg: PageComponentConfig = parse_config("", Path::new("/x.json")).unwrap();
        assert!(!cfg.component);
    }
}
