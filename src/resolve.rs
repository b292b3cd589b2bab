//! Field resolution against a fixed-priority chain of data sources.
//!
//! Resolution is key-major: the primary key is probed against every live
//! source (explicit, ambient, computed) before the first alias is tried.
//! Defaults only apply once every key has missed every live source.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::model::{
    Diagnostic, FieldDefinition, FieldValue, GraphicAnchor, PageCoordinateMap, ResolvedField,
    SourceTag,
};

pub const DEFAULT_NOT_AVAILABLE: &str = "k.A.";

/// A lookup provider in the resolution chain.
pub trait DataSource: Send + Sync {
    fn lookup(&self, key: &str) -> Option<FieldValue>;
}

impl DataSource for HashMap<String, FieldValue> {
    fn lookup(&self, key: &str) -> Option<FieldValue> {
        self.get(key).cloned()
    }
}

/// A source that never answers.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySource;

impl DataSource for EmptySource {
    fn lookup(&self, _key: &str) -> Option<FieldValue> {
        None
    }
}

/// Data source backed by a JSON object.
///
/// Keys are looked up verbatim first; a dotted key such as
/// `"pv.annual_yield"` then walks nested objects.
#[derive(Clone, Debug, Default)]
pub struct JsonSource {
    root: Map<String, Value>,
}

impl JsonSource {
    pub fn new(root: Map<String, Value>) -> Self {
        Self { root }
    }

    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(Error::config(format!(
                "data context must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())))
        })?;
        Self::from_value(serde_json::from_str(&text)?)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.root.insert(key.into(), value);
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl DataSource for JsonSource {
    fn lookup(&self, key: &str) -> Option<FieldValue> {
        if let Some(v) = self.root.get(key) {
            return FieldValue::from_json(v);
        }
        if !key.contains('.') {
            return None;
        }
        let mut parts = key.split('.');
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        FieldValue::from_json(current)
    }
}

/// Static fallbacks applied after every live source missed.
///
/// Field defaults win over category defaults. Neither is built in: any
/// product-line specific value has to come from configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct DefaultTable {
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub categories: HashMap<String, String>,
    #[serde(default = "default_marker")]
    pub not_available: String,
}

fn default_marker() -> String {
    DEFAULT_NOT_AVAILABLE.to_string()
}

impl Default for DefaultTable {
    fn default() -> Self {
        Self {
            fields: HashMap::new(),
            categories: HashMap::new(),
            not_available: default_marker(),
        }
    }
}

impl DefaultTable {
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            not_available: marker.into(),
            ..Self::default()
        }
    }
}

/// The ordered providers consulted for one generation call.
#[derive(Clone, Copy)]
pub struct DataSourceChain<'a> {
    explicit: &'a dyn DataSource,
    ambient: &'a dyn DataSource,
    computed: &'a dyn DataSource,
    defaults: &'a DefaultTable,
}

impl<'a> DataSourceChain<'a> {
    pub fn new(
        explicit: &'a dyn DataSource,
        ambient: &'a dyn DataSource,
        computed: &'a dyn DataSource,
        defaults: &'a DefaultTable,
    ) -> Self {
        Self {
            explicit,
            ambient,
            computed,
            defaults,
        }
    }

    fn live_sources(&self) -> [(SourceTag, &'a dyn DataSource); 3] {
        [
            (SourceTag::Explicit, self.explicit),
            (SourceTag::Ambient, self.ambient),
            (SourceTag::Computed, self.computed),
        ]
    }

    /// First live source answering `key` with a non-blank value, in
    /// priority order.
    pub fn lookup(&self, key: &str) -> Option<(SourceTag, FieldValue)> {
        self.live_sources().into_iter().find_map(|(tag, source)| {
            source
                .lookup(key)
                .filter(|v| !v.is_blank())
                .map(|v| (tag, v))
        })
    }

    pub fn defaults(&self) -> &'a DefaultTable {
        self.defaults
    }
}

/// Resolve a field with no coordinate definition at hand. The field is
/// treated as required and uncategorised.
pub fn resolve(name: &str, chain: &DataSourceChain<'_>, aliases: &[String]) -> ResolvedField {
    resolve_key(name, aliases, None, true, chain)
}

pub fn resolve_field(def: &FieldDefinition, chain: &DataSourceChain<'_>) -> ResolvedField {
    resolve_key(
        &def.name,
        &def.aliases,
        def.category.as_deref(),
        def.required,
        chain,
    )
}

fn resolve_key(
    name: &str,
    aliases: &[String],
    category: Option<&str>,
    required: bool,
    chain: &DataSourceChain<'_>,
) -> ResolvedField {
    let keys = std::iter::once(name).chain(aliases.iter().map(String::as_str));
    for key in keys {
        if let Some((source, value)) = chain.lookup(key) {
            return ResolvedField {
                name: name.to_string(),
                value: value.to_string(),
                source,
                fallback: false,
                matched_key: Some(key.to_string()),
                raw: Some(value),
            };
        }
    }

    let defaults = chain.defaults();
    let (value, source) = if let Some(v) = defaults.fields.get(name) {
        (v.clone(), SourceTag::FieldDefault)
    } else if let Some(v) = category.and_then(|c| defaults.categories.get(c)) {
        (v.clone(), SourceTag::CategoryDefault)
    } else if required {
        (defaults.not_available.clone(), SourceTag::NotAvailable)
    } else {
        (String::new(), SourceTag::Empty)
    };

    ResolvedField {
        name: name.to_string(),
        value,
        source,
        fallback: source != SourceTag::Empty,
        matched_key: None,
        raw: None,
    }
}

/// Every field and graphic value of one page, resolved once per render call.
#[derive(Clone, Debug, Default)]
pub struct ResolvedFieldSet {
    fields: Vec<ResolvedField>,
    graphics: Vec<ResolvedField>,
    index: HashMap<String, usize>,
    graphic_index: HashMap<String, usize>,
}

impl ResolvedFieldSet {
    pub fn push_field(&mut self, field: ResolvedField) {
        self.index.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
    }

    pub fn push_graphic(&mut self, field: ResolvedField) {
        self.graphic_index
            .insert(field.name.clone(), self.graphics.len());
        self.graphics.push(field);
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedField> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn graphic(&self, name: &str) -> Option<&ResolvedField> {
        self.graphic_index.get(name).map(|&i| &self.graphics[i])
    }

    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    pub fn graphics(&self) -> &[ResolvedField] {
        &self.graphics
    }

    /// Fields that fell through to a default or the not-available marker.
    pub fn fallbacks(&self) -> impl Iterator<Item = &ResolvedField> {
        self.fields.iter().filter(|f| f.fallback)
    }

    pub fn diagnostics(&self, page: u32) -> Vec<Diagnostic> {
        self.fallbacks()
            .map(|f| Diagnostic::ResolutionFallback {
                page,
                field: f.name.clone(),
                source: f.source,
            })
            .collect()
    }
}

fn resolve_graphic(anchor: &GraphicAnchor, chain: &DataSourceChain<'_>) -> ResolvedField {
    let mut resolved = resolve_key(anchor.value_key(), &anchor.aliases, None, false, chain);
    resolved.name = anchor.name.clone();
    resolved
}

pub fn resolve_page(map: &PageCoordinateMap, chain: &DataSourceChain<'_>) -> ResolvedFieldSet {
    let mut set = ResolvedFieldSet::default();
    for def in &map.fields {
        let resolved = resolve_field(def, chain);
        if resolved.fallback {
            log::debug!(
                "{}/page{}: '{}' resolved from {} ({:?})",
                map.variant,
                map.page,
                def.name,
                resolved.source,
                resolved.value,
            );
        }
        set.push_field(resolved);
    }
    for anchor in &map.graphics {
        set.push_graphic(resolve_graphic(anchor, chain));
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(value: Value) -> JsonSource {
        JsonSource::from_value(value).unwrap()
    }

    #[test]
    fn dotted_keys_walk_nested_objects() {
        let s = source(json!({"pv": {"annual_yield": 9120.5}, "pv.flat": "direct"}));
        assert_eq!(s.lookup("pv.annual_yield"), Some(FieldValue::Number(9120.5)));
        assert_eq!(s.lookup("pv.flat"), Some(FieldValue::Text("direct".into())));
        assert_eq!(s.lookup("pv.missing"), None);
    }

    #[test]
    fn null_and_blank_values_are_absent() {
        let s = source(json!({"a": null, "b": "   "}));
        assert_eq!(s.lookup("a"), None);
        assert_eq!(s.lookup("b"), None);
    }

    #[test]
    fn primary_key_beats_alias_in_higher_source() {
        let explicit = source(json!({"alias": "from-explicit-alias"}));
        let ambient = source(json!({"primary": "from-ambient-primary"}));
        let defaults = DefaultTable::default();
        let chain = DataSourceChain::new(&explicit, &ambient, &EmptySource, &defaults);
        let r = resolve("primary", &chain, &["alias".to_string()]);
        assert_eq!(r.value, "from-ambient-primary");
        assert_eq!(r.source, SourceTag::Ambient);
        assert_eq!(r.matched_key.as_deref(), Some("primary"));
    }

    #[test]
    fn field_default_wins_over_category_default() {
        let mut defaults = DefaultTable::default();
        defaults.fields.insert("inverter_warranty".into(), "10 Jahre".into());
        defaults.categories.insert("warranty".into(), "5 Jahre".into());
        let chain = DataSourceChain::new(&EmptySource, &EmptySource, &EmptySource, &defaults);
        let def: FieldDefinition = serde_json::from_value(json!({
            "name": "inverter_warranty", "x": 0, "y": 0, "category": "warranty"
        }))
        .unwrap();
        let r = resolve_field(&def, &chain);
        assert_eq!(r.value, "10 Jahre");
        assert_eq!(r.source, SourceTag::FieldDefault);
        assert!(r.fallback);
    }
}
