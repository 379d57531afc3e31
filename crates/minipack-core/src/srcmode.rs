//! Cross-mode tagging.
//!
//! A resource authored for one platform dialect but compiled for another
//! needs its platform global rewritten to the unified accessor `mp`, its
//! ctor entry points routed through `createFactory`, and a source-mode
//! marker appended to cross-platform API calls so the runtime can convert
//! arguments. The decision is context-free per call-site: it depends only on
//! the enclosing resource's effective source mode and the target mode, never
//! on resolution order.

use crate::platform::Mode;
use crate::request::Query;
use regex_lite::Regex;

/// Unified global accessor injected in place of the platform global.
pub const UNIFIED_GLOBAL: &str = "mp";

/// Runtime APIs that behave identically on every platform; their call-sites
/// never receive a source-mode marker.
pub const MODE_AGNOSTIC_APIS: &[&str] = &[
    "createApp",
    "createPage",
    "createComponent",
    "createStore",
    "createStoreWithThis",
    "mixin",
    "injectMixins",
    "toPureObject",
    "observable",
    "watch",
    "use",
    "set",
    "remove",
    "delete",
    "setConvertRule",
    "getMixin",
    "getComputed",
    "implement",
];

/// The resource's effective source mode: local override, else global.
#[must_use]
pub fn effective_src_mode(query: &Query, global_src_mode: Mode) -> Mode {
    query
        .get("mode")
        .and_then(|m| Mode::parse(m))
        .unwrap_or(global_src_mode)
}

/// Whether any substitution applies at all.
#[must_use]
pub fn needs_trans(src_mode: Mode, target_mode: Mode) -> bool {
    src_mode != target_mode
}

/// Apply cross-mode tagging to a script source.
///
/// A no-op when source and target mode agree. Otherwise, in one pass over
/// the text:
/// 1. calls on the platform global or the unified accessor get one appended
///    `"__mp_src_mode_<mode>__"` marker argument, unless the callee is
///    mode-agnostic;
/// 2. ctor entry points (`App`, `Page`, `Component`, and `Behavior` on
///    targets without native behaviors) are rewritten through
///    `createFactory("…")`;
/// 3. the platform global identifier is rewritten to the unified accessor.
#[must_use]
pub fn tag_script(source: &str, src_mode: Mode, target_mode: Mode) -> String {
    if !needs_trans(src_mode, target_mode) {
        return source.to_string();
    }

    let global = src_mode.global_object();
    let tagged = inject_src_mode_markers(source, global, src_mode);
    let tagged = rewrite_ctors(&tagged, target_mode);
    replace_bare_ident(&tagged, global, UNIFIED_GLOBAL)
}

fn inject_src_mode_markers(source: &str, global: &str, src_mode: Mode) -> String {
    let pattern = format!(
        r"(^|[^.A-Za-z0-9_$])({global}|{UNIFIED_GLOBAL})\.([A-Za-z_$][A-Za-z0-9_$]*)\s*\("
    );
    let re = Regex::new(&pattern).unwrap();
    let marker = format!("\"__mp_src_mode_{src_mode}__\"");

    // Collect insertion points first so nested call-sites each get exactly
    // one marker without re-scanning rewritten text.
    let mut insertions: Vec<(usize, String)> = Vec::new();
    for caps in re.captures_iter(source) {
        let callee = caps.get(3).unwrap().as_str();
        if MODE_AGNOSTIC_APIS.contains(&callee) {
            continue;
        }
        let open = caps.get(0).unwrap().end() - 1;
        let Some(close) = matching_paren(source, open) else {
            continue;
        };
        let has_args = !source[open + 1..close].trim().is_empty();
        let text = if has_args {
            format!(", {marker}")
        } else {
            marker.clone()
        };
        insertions.push((close, text));
    }

    // Inner call-sites close before the outer ones they nest in; apply in
    // text order.
    insertions.sort_by_key(|(pos, _)| *pos);

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (pos, text) in insertions {
        out.push_str(&source[cursor..pos]);
        out.push_str(&text);
        cursor = pos;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Find the `)` matching the `(` at `open`, skipping string literals.
fn matching_paren(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn rewrite_ctors(source: &str, target_mode: Mode) -> String {
    let mut ctors = vec!["App", "Page", "Component"];
    // No native behaviors on these targets; route through the factory too.
    if matches!(target_mode, Mode::Ali | Mode::Web) {
        ctors.push("Behavior");
    }

    let mut out = source.to_string();
    for ctor in ctors {
        out = replace_call_ident(&out, ctor, &format!("createFactory(\"{ctor}\")"));
    }
    out
}

/// Replace free-standing occurrences of `ident` (not member accesses, not
/// substrings of longer identifiers) with `replacement`.
fn replace_bare_ident(source: &str, ident: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut abs = 0;
    while let Some(pos) = rest.find(ident) {
        let start = abs + pos;
        let end = start + ident.len();
        let prev_ok = start == 0
            || !matches!(source.as_bytes()[start - 1], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'$' | b'.');
        let next_ok = end >= source.len()
            || !matches!(source.as_bytes()[end], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'$');
        out.push_str(&rest[..pos]);
        if prev_ok && next_ok {
            out.push_str(replacement);
        } else {
            out.push_str(ident);
        }
        rest = &rest[pos + ident.len()..];
        abs = end;
    }
    out.push_str(rest);
    out
}

/// Like [`replace_bare_ident`] but only when the identifier is invoked as a
/// call (next non-whitespace char is `(`).
fn replace_call_ident(source: &str, ident: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut abs = 0;
    while let Some(pos) = rest.find(ident) {
        let start = abs + pos;
        let end = start + ident.len();
        let prev_ok = start == 0
            || !matches!(source.as_bytes()[start - 1], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'$' | b'.');
        let next_ok = end >= source.len()
            || !matches!(source.as_bytes()[end], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'$');
        let is_call = source[end..].trim_start().starts_with('(');
        out.push_str(&rest[..pos]);
        if prev_ok && next_ok && is_call {
            out.push_str(replacement);
        } else {
            out.push_str(ident);
        }
        rest = &rest[pos + ident.len()..];
        abs = end;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_mode_is_untouched() {
        let src = "wx.request({ url })\nPage({})";
        assert_eq!(tag_script(src, Mode::Wx, Mode::Wx), src);
    }

    #[test]
    fn test_api_call_gets_marker_and_unified_global() {
        let out = tag_script("wx.request({ url: u })", Mode::Wx, Mode::Ali);
        assert_eq!(out, "mp.request({ url: u }, \"__mp_src_mode_wx__\")");
    }

    #[test]
    fn test_empty_args_marker_without_comma() {
        let out = tag_script("wx.getSystemInfoSync()", Mode::Wx, Mode::Ali);
        assert_eq!(out, "mp.getSystemInfoSync(\"__mp_src_mode_wx__\")");
    }

    #[test]
    fn test_mode_agnostic_api_not_marked() {
        let out = tag_script("mp.createApp({ onLaunch })", Mode::Wx, Mode::Ali);
        assert_eq!(out, "mp.createApp({ onLaunch })");
    }

    #[test]
    fn test_ctor_rewrite() {
        let out = tag_script("Page({ data: {} })", Mode::Wx, Mode::Ali);
        assert_eq!(out, "createFactory(\"Page\")({ data: {} })");
    }

    #[test]
    fn test_behavior_only_on_targets_without_behaviors() {
        let out = tag_script("Behavior({})", Mode::Wx, Mode::Ali);
        assert_eq!(out, "createFactory(\"Behavior\")({})");

        let out = tag_script("Behavior({})", Mode::Wx, Mode::Swan);
        assert_eq!(out, "Behavior({})");
    }

    #[test]
    fn test_bare_global_replaced_but_not_members() {
        let out = tag_script("const api = wx; obj.wx.x(); wxy()", Mode::Wx, Mode::Ali);
        assert_eq!(out, "const api = mp; obj.wx.x(); wxy()");
    }

    #[test]
    fn test_marker_once_per_call_site_with_nesting() {
        let out = tag_script("wx.a(wx.b())", Mode::Wx, Mode::Ali);
        assert_eq!(
            out,
            "mp.a(mp.b(\"__mp_src_mode_wx__\"), \"__mp_src_mode_wx__\")"
        );
    }

    #[test]
    fn test_parens_inside_strings_skipped() {
        let out = tag_script("wx.a(\"(not a paren)\")", Mode::Wx, Mode::Ali);
        assert_eq!(out, "mp.a(\"(not a paren)\", \"__mp_src_mode_wx__\")");
    }

    #[test]
    fn test_effective_src_mode_prefers_local() {
        let mut query = Query::new();
        assert_eq!(effective_src_mode(&query, Mode::Wx), Mode::Wx);
        query.insert("mode".to_string(), "ali".to_string());
        assert_eq!(effective_src_mode(&query, Mode::Wx), Mode::Ali);
    }
}
