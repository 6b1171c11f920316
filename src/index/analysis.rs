//! Analysis-settings reconciliation.
//!
//! Definitions declare analyzer/tokenizer/filter settings locally; the
//! cluster has whatever the index was created with. This module collects the
//! local declarations, fetches the live ones, and computes compatibility, a
//! merged configuration for migration, and a human-readable diff.
//!
//! The cluster reports settings with every scalar stringified, so both sides
//! are canonicalized the same way before any comparison. Equality here is
//! byte-for-byte or nothing.

use crate::error::Result;
use crate::index::registry::SyncRegistry;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Analysis settings: section name ("analyzer", "tokenizer", "filter", ...)
/// to item name to canonicalized configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSettings {
    sections: BTreeMap<String, BTreeMap<String, Value>>,
}

impl AnalysisSettings {
    pub fn new() -> Self {
        AnalysisSettings::default()
    }

    pub fn insert(&mut self, section: &str, name: &str, config: Value) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(name.to_string(), canonicalize(&config));
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Fold another settings object into this one; the other side wins on
    /// per-item conflicts.
    pub fn extend(&mut self, other: &AnalysisSettings) {
        for (section, items) in &other.sections {
            let target = self.sections.entry(section.clone()).or_default();
            for (name, config) in items {
                target.insert(name.clone(), config.clone());
            }
        }
    }

    /// True iff every section/item in `self` is present in `live` with an
    /// exactly equal configuration. Extra live entries are fine.
    pub fn compatible_with(&self, live: &AnalysisSettings) -> bool {
        for (section, items) in &self.sections {
            let Some(live_items) = live.sections.get(section) else {
                return false;
            };
            for (name, config) in items {
                match live_items.get(name) {
                    Some(live_config) if live_config == config => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Live settings as the base, overwritten by `self` (local wins on
    /// conflict, union on presence).
    pub fn merge_over(&self, live: &AnalysisSettings) -> AnalysisSettings {
        let mut merged = live.clone();
        merged.extend(self);
        merged
    }

    pub fn to_value(&self) -> Value {
        let mut sections = Map::new();
        for (section, items) in &self.sections {
            let mut out = Map::new();
            for (name, config) in items {
                out.insert(name.clone(), config.clone());
            }
            sections.insert(section.clone(), Value::Object(out));
        }
        Value::Object(sections)
    }

    /// Parse a settings fragment like `{"analyzer": {"foo": {...}}}`,
    /// canonicalizing every item.
    pub fn from_value(value: &Value) -> AnalysisSettings {
        let mut settings = AnalysisSettings::new();
        let Some(sections) = value.as_object() else {
            return settings;
        };
        for (section, items) in sections {
            if let Some(items) = items.as_object() {
                for (name, config) in items {
                    settings.insert(section, name, config.clone());
                }
            }
        }
        settings
    }
}

/// Stringify every scalar, recursively, matching how the cluster reports
/// settings back (`true` becomes `"true"`, `2` becomes `"2"`).
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

/// Union of every registered definition's declared analysis for `using`.
pub fn collect_declared(registry: &SyncRegistry, using: &str) -> AnalysisSettings {
    let mut declared = AnalysisSettings::new();
    for definition in registry.definitions_for_connection(using) {
        declared.extend(definition.analysis());
    }
    declared
}

/// The live analysis settings of `using`'s index; empty when the index does
/// not exist yet.
pub fn fetch_live(registry: &SyncRegistry, using: &str) -> Result<AnalysisSettings> {
    let connection = registry.connection(using)?;
    if !connection.client.index_exists(&connection.index_name)? {
        return Ok(AnalysisSettings::new());
    }
    let settings = connection.client.get_settings(&connection.index_name)?;
    let analysis = &settings[&connection.index_name]["settings"]["index"]["analysis"];
    Ok(AnalysisSettings::from_value(analysis))
}

/// True iff everything declared locally for `using` is matched exactly on
/// the cluster. Reported, never raised: the caller decides what to do.
pub fn is_compatible(registry: &SyncRegistry, using: &str) -> Result<bool> {
    let declared = collect_declared(registry, using);
    let live = fetch_live(registry, using)?;
    Ok(declared.compatible_with(&live))
}

/// The configuration to migrate to: live settings with every local
/// declaration layered on top.
pub fn merged(registry: &SyncRegistry, using: &str) -> Result<AnalysisSettings> {
    let declared = collect_declared(registry, using);
    let live = fetch_live(registry, using)?;
    Ok(declared.merge_over(&live))
}

/// Structural text diff between live and declared settings, for diagnostics.
pub fn diff(registry: &SyncRegistry, using: &str) -> Result<String> {
    let declared = collect_declared(registry, using);
    let live = fetch_live(registry, using)?;
    Ok(render_diff(&live.to_value(), &declared.to_value()))
}

/// Apply the merged analysis settings to the live index. The index has to be
/// closed while analysis settings change, so this briefly takes it offline.
pub fn migrate(registry: &SyncRegistry, using: &str) -> Result<()> {
    let settings = merged(registry, using)?;
    let connection = registry.connection(using)?;
    tracing::info!(
        connection = %using,
        index = %connection.index_name,
        "migrating analysis settings"
    );
    connection.client.close_index(&connection.index_name)?;
    let result = connection.client.put_settings(
        &connection.index_name,
        &json!({"analysis": settings.to_value()}),
    );
    // reopen even when the settings write failed; a closed index serves nothing
    let reopen = connection.client.open_index(&connection.index_name);
    result.and(reopen)
}

/// Line diff of the two values, key-sorted and pretty-printed: unchanged
/// lines indented, removals prefixed `-`, additions prefixed `+`.
pub fn render_diff(a: &Value, b: &Value) -> String {
    let a = to_sorted_pretty(a);
    let b = to_sorted_pretty(b);
    let a_lines: Vec<&str> = a.lines().collect();
    let b_lines: Vec<&str> = b.lines().collect();

    // longest-common-subsequence table over the lines
    let mut lcs = vec![vec![0usize; b_lines.len() + 1]; a_lines.len() + 1];
    for i in (0..a_lines.len()).rev() {
        for j in (0..b_lines.len()).rev() {
            lcs[i][j] = if a_lines[i] == b_lines[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = String::new();
    let (mut i, mut j) = (0, 0);
    while i < a_lines.len() && j < b_lines.len() {
        if a_lines[i] == b_lines[j] {
            out.push_str("  ");
            out.push_str(a_lines[i]);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push_str("- ");
            out.push_str(a_lines[i]);
            i += 1;
        } else {
            out.push_str("+ ");
            out.push_str(b_lines[j]);
            j += 1;
        }
        out.push('\n');
    }
    for line in &a_lines[i..] {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
    for line in &b_lines[j..] {
        out.push_str("+ ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn to_sorted_pretty(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Value> =
                    map.iter().map(|(k, v)| (k, sort(v))).collect();
                json!(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_string_pretty(&sort(value)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(value: Value) -> AnalysisSettings {
        AnalysisSettings::from_value(&value)
    }

    // ── canonicalization ────────────────────────────────────────────────

    #[test]
    fn canonicalize_stringifies_scalars() {
        let value = json!({"a": 1, "b": [1, "c", 2.5], "d": true});
        assert_eq!(
            canonicalize(&value),
            json!({"a": "1", "b": ["1", "c", "2.5"], "d": "true"})
        );
    }

    #[test]
    fn declared_items_are_canonicalized_on_insert() {
        let mut s = AnalysisSettings::new();
        s.insert("filter", "shingle", json!({"max_shingle_size": 3}));
        assert_eq!(
            s.to_value(),
            json!({"filter": {"shingle": {"max_shingle_size": "3"}}})
        );
    }

    // ── compatibility ───────────────────────────────────────────────────

    #[test]
    fn declared_against_empty_live_is_incompatible() {
        let declared = settings(json!({"analyzer": {"foo": {"type": "custom"}}}));
        let live = AnalysisSettings::new();
        assert!(!declared.compatible_with(&live));
    }

    #[test]
    fn exact_match_is_compatible() {
        let declared = settings(json!({"analyzer": {"foo": {"type": "custom"}}}));
        let live = settings(json!({"analyzer": {"foo": {"type": "custom"}}}));
        assert!(declared.compatible_with(&live));
    }

    #[test]
    fn extra_live_entries_do_not_hurt() {
        let declared = settings(json!({"analyzer": {"foo": {"type": "custom"}}}));
        let live = settings(json!({
            "analyzer": {"foo": {"type": "custom"}, "bar": {"type": "standard"}},
            "filter": {"f": {"type": "stop"}},
        }));
        assert!(declared.compatible_with(&live));
    }

    #[test]
    fn value_mismatch_is_incompatible() {
        let declared = settings(json!({"analyzer": {"foo": {"type": "custom"}}}));
        let live = settings(json!({"analyzer": {"foo": {"type": "standard"}}}));
        assert!(!declared.compatible_with(&live));
    }

    #[test]
    fn missing_item_in_section_is_incompatible() {
        let declared = settings(json!({"analyzer": {"foo": {"type": "custom"}}}));
        let live = settings(json!({"analyzer": {"bar": {"type": "custom"}}}));
        assert!(!declared.compatible_with(&live));
    }

    #[test]
    fn empty_declared_is_always_compatible() {
        let live = settings(json!({"analyzer": {"bar": {"type": "custom"}}}));
        assert!(AnalysisSettings::new().compatible_with(&live));
    }

    // ── merge ───────────────────────────────────────────────────────────

    #[test]
    fn merge_unions_and_prefers_local() {
        let declared = settings(json!({"analyzer": {"foo": {"type": "custom"}}}));
        let live = settings(json!({"analyzer": {"bar": {"type": "standard"}}}));
        let merged = declared.merge_over(&live);
        assert_eq!(
            merged.to_value(),
            json!({"analyzer": {
                "bar": {"type": "standard"},
                "foo": {"type": "custom"},
            }})
        );
    }

    #[test]
    fn merge_overwrites_conflicting_items_with_local() {
        let declared = settings(json!({"analyzer": {"foo": {"type": "custom"}}}));
        let live = settings(json!({"analyzer": {"foo": {"type": "standard"}}}));
        let merged = declared.merge_over(&live);
        assert_eq!(
            merged.to_value(),
            json!({"analyzer": {"foo": {"type": "custom"}}})
        );
    }

    // ── diff rendering ──────────────────────────────────────────────────

    #[test]
    fn diff_marks_additions_and_removals() {
        let live = json!({"analyzer": {"bar": {"type": "standard"}}});
        let declared = json!({"analyzer": {"foo": {"type": "custom"}}});
        let diff = render_diff(&live, &declared);
        assert!(diff.lines().any(|l| l.starts_with("- ") && l.contains("bar")));
        assert!(diff.lines().any(|l| l.starts_with("+ ") && l.contains("foo")));
    }

    #[test]
    fn diff_of_equal_values_has_no_markers() {
        let v = json!({"analyzer": {"foo": {"type": "custom"}}});
        let diff = render_diff(&v, &v);
        assert!(diff.lines().all(|l| l.starts_with("  ")));
    }

    #[test]
    fn diff_output_is_key_sorted() {
        let v = json!({"b": 1, "a": 2});
        let diff = render_diff(&v, &v);
        let a_pos = diff.find("\"a\"").unwrap();
        let b_pos = diff.find("\"b\"").unwrap();
        assert!(a_pos < b_pos);
    }
}
