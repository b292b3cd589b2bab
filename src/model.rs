use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

/// Points per A4 page, portrait. Coordinate maps default to these.
pub const A4_WIDTH: f32 = 595.0;
pub const A4_HEIGHT: f32 = 842.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// What happens to text wider than a field's `max_width`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    #[default]
    Truncate,
    Wrap,
}

fn default_font() -> String {
    "Helvetica".to_string()
}

fn default_size() -> f32 {
    10.0
}

/// A named text slot on a background page.
///
/// `x`/`y` use a top-left origin: `y` is the distance from the top edge of
/// the page down to the text baseline. For right alignment `x` is the right
/// edge of the text, for center alignment its midpoint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(default = "default_size")]
    pub size: f32,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub max_width: Option<f32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub overflow: Overflow,
    #[serde(default)]
    pub line_height: Option<f32>,
}

/// Anchor for a computed ring/donut graphic.
///
/// Unlike fields, `x`/`y` are authored with a bottom-left origin.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphicAnchor {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub outer_radius: f32,
    pub inner_radius: f32,
    /// Key holding the percentage; the anchor name when absent.
    #[serde(default)]
    pub value_key: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub track_color: Option<String>,
    #[serde(default)]
    pub show_label: bool,
}

impl GraphicAnchor {
    pub fn value_key(&self) -> &str {
        self.value_key.as_deref().unwrap_or(&self.name)
    }
}

/// Placement definitions for one page of one document variant.
#[derive(Clone, Debug, PartialEq)]
pub struct PageCoordinateMap {
    pub variant: String,
    /// 1-based page number within the variant.
    pub page: u32,
    pub page_width: f32,
    pub page_height: f32,
    pub fields: Vec<FieldDefinition>,
    pub graphics: Vec<GraphicAnchor>,
}

impl PageCoordinateMap {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub type SharedCoordinateMap = Arc<PageCoordinateMap>;

/// A value produced by a data source.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl FieldValue {
    /// JSON `null` and blank strings count as absent.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(FieldValue::Flag(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
            serde_json::Value::String(s) => FieldValue::text(s),
            other => Some(FieldValue::Text(other.to_string())),
        }
    }

    pub fn text(s: &str) -> Option<Self> {
        if s.trim().is_empty() {
            None
        } else {
            Some(FieldValue::Text(s.to_string()))
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.trim().is_empty())
    }

    /// Numeric view of the value. Text such as `"42,5 %"` parses as 42.5.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Flag(_) => None,
            FieldValue::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .trim_end_matches('%')
                    .trim()
                    .replace(',', ".");
                cleaned.parse::<f64>().ok()
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Flag(b) => write!(f, "{b}"),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            FieldValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Which link of the data-source chain produced a resolved value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceTag {
    Explicit,
    Ambient,
    Computed,
    FieldDefault,
    CategoryDefault,
    NotAvailable,
    Empty,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceTag::Explicit => "explicit",
            SourceTag::Ambient => "ambient",
            SourceTag::Computed => "computed",
            SourceTag::FieldDefault => "field-default",
            SourceTag::CategoryDefault => "category-default",
            SourceTag::NotAvailable => "not-available",
            SourceTag::Empty => "empty",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedField {
    pub name: String,
    pub value: String,
    pub source: SourceTag,
    pub fallback: bool,
    /// The key or alias that matched, if a live source answered.
    pub matched_key: Option<String>,
    /// Typed value from the live source, kept for numeric consumers.
    pub raw: Option<FieldValue>,
}

impl ResolvedField {
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// A chart image handed over by the visualization collaborator.
#[derive(Clone, Debug, Default)]
pub struct ChartAsset {
    pub key: String,
    pub bytes: Option<Vec<u8>>,
    pub category: String,
    pub caption: String,
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ChartLayout {
    #[default]
    OnePerPage,
    TwoPerPage,
    FourPerPage,
}

impl ChartLayout {
    /// Unrecognized values fall back to one chart per page.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "one_per_page" | "1" | "one" => ChartLayout::OnePerPage,
            "two_per_page" | "2" | "two" => ChartLayout::TwoPerPage,
            "four_per_page" | "4" | "four" => ChartLayout::FourPerPage,
            other => {
                log::warn!("Unknown chart layout '{other}', using one_per_page");
                ChartLayout::OnePerPage
            }
        }
    }

    pub fn slots_per_page(self) -> usize {
        match self {
            ChartLayout::OnePerPage => 1,
            ChartLayout::TwoPerPage => 2,
            ChartLayout::FourPerPage => 4,
        }
    }
}

impl From<String> for ChartLayout {
    fn from(value: String) -> Self {
        ChartLayout::parse_lossy(&value)
    }
}

impl fmt::Display for ChartLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChartLayout::OnePerPage => "one_per_page",
            ChartLayout::TwoPerPage => "two_per_page",
            ChartLayout::FourPerPage => "four_per_page",
        };
        f.write_str(s)
    }
}

/// Non-fatal events recorded while generating one document.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    ResolutionFallback {
        page: u32,
        field: String,
        source: SourceTag,
    },
    Render {
        page: u32,
        element: String,
        reason: String,
    },
    Asset {
        key: String,
        reason: String,
    },
    Merge {
        reason: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ResolutionFallback {
                page,
                field,
                source,
            } => write!(f, "page {page}: field '{field}' fell back to {source}"),
            Diagnostic::Render {
                page,
                element,
                reason,
            } => write!(f, "page {page}: skipped '{element}': {reason}"),
            Diagnostic::Asset { key, reason } => write!(f, "chart '{key}' left blank: {reason}"),
            Diagnostic::Merge { reason } => write!(f, "chart pages dropped: {reason}"),
        }
    }
}

/// Final artifact of one generation call.
#[derive(Clone, Debug)]
pub struct MergeResult {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}
