//! Platform rule transforms over parsed configs.
//!
//! Applied between default completion and child resolution; each rule takes
//! a value and returns/edits it without touching shared state.

use crate::diagnostics::Diagnostics;
use crate::platform::Mode;
use serde_json::Value;
use std::collections::BTreeMap;

/// Translate a `tabBar` config from the source mode's key schema to the
/// target mode's (e.g. wx `list`/`iconPath` to ali `items`/`icon`).
pub fn translate_tab_bar(tab_bar: &mut Value, src_mode: Mode, target_mode: Mode) {
    if src_mode == target_mode {
        return;
    }
    let from = src_mode.capabilities().tab_bar;
    let to = target_mode.capabilities().tab_bar;
    if from == to {
        return;
    }

    let Value::Object(map) = tab_bar else { return };
    let Some(mut list) = map.remove(from.list_key) else {
        return;
    };
    if let Value::Array(items) = &mut list {
        for item in items {
            let Value::Object(item) = item else { continue };
            if let Some(icon) = item.remove(from.icon_key) {
                item.insert(to.icon_key.to_string(), icon);
            }
            if let Some(icon) = item.remove(from.active_icon_key) {
                item.insert(to.active_icon_key.to_string(), icon);
            }
        }
    }
    map.insert(to.list_key.to_string(), list);
}

/// Drop `plugin://` component references on platforms without plugin
/// support, with a warning naming the component.
pub fn fix_using_components(
    components: &mut BTreeMap<String, String>,
    mode: Mode,
    resource: &str,
    diagnostics: &Diagnostics,
) {
    if mode.capabilities().supports_plugins {
        return;
    }
    components.retain(|name, request| {
        if request.starts_with("plugin://") {
            diagnostics.warn(
                resource,
                format!(
                    "component [{name}] references [{request}], but plugins are not supported \
                     on mode [{mode}], the reference is dropped"
                ),
            );
            false
        } else {
            true
        }
    });
}
