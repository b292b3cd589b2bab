use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::Deserialize;

use crate::error::Error;
use crate::model::{
    A4_HEIGHT, A4_WIDTH, FieldDefinition, GraphicAnchor, PageCoordinateMap, SharedCoordinateMap,
};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CoordinateFile {
    #[serde(default)]
    page_width: Option<f32>,
    #[serde(default)]
    page_height: Option<f32>,
    #[serde(default)]
    fields: Vec<FieldDefinition>,
    #[serde(default)]
    graphics: Vec<GraphicAnchor>,
}

/// Variant identifiers name a single directory below the configured roots.
pub(crate) fn check_variant_name(variant: &str) -> Result<(), Error> {
    let bad = variant.is_empty()
        || variant == "."
        || variant.contains("..")
        || variant.contains(['/', '\\', ':']);
    if bad {
        return Err(Error::config(format!("invalid document variant '{variant}'")));
    }
    Ok(())
}

/// Path of the definition file for one (variant, page).
pub fn definition_path(root: &Path, variant: &str, page: u32) -> PathBuf {
    root.join(variant).join(format!("page{page}.json"))
}

/// Parse and validate one page definition.
pub fn parse_page(variant: &str, page: u32, text: &str) -> Result<PageCoordinateMap, Error> {
    let file: CoordinateFile = serde_json::from_str(text)
        .map_err(|e| Error::config(format!("{variant}/page{page}: {e}")))?;

    let page_width = file.page_width.unwrap_or(A4_WIDTH);
    let page_height = file.page_height.unwrap_or(A4_HEIGHT);
    if !(page_width > 0.0 && page_height > 0.0 && page_width.is_finite() && page_height.is_finite())
    {
        return Err(Error::config(format!(
            "{variant}/page{page}: invalid page size {page_width}x{page_height}"
        )));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for field in &file.fields {
        if field.name.trim().is_empty() {
            return Err(Error::config(format!("{variant}/page{page}: field without a name")));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(Error::config(format!(
                "{variant}/page{page}: duplicate field '{}'",
                field.name
            )));
        }
        if !field.x.is_finite() || !field.y.is_finite() {
            return Err(Error::config(format!(
                "{variant}/page{page}: field '{}' has a non-finite coordinate",
                field.name
            )));
        }
        if !(field.size > 0.0) {
            return Err(Error::config(format!(
                "{variant}/page{page}: field '{}' has font size {}",
                field.name, field.size
            )));
        }
        if field.max_width.is_some_and(|w| !(w > 0.0)) {
            return Err(Error::config(format!(
                "{variant}/page{page}: field '{}' has a non-positive max_width",
                field.name
            )));
        }
    }

    let mut seen_graphics: HashSet<&str> = HashSet::new();
    for g in &file.graphics {
        if !seen_graphics.insert(g.name.as_str()) {
            return Err(Error::config(format!(
                "{variant}/page{page}: duplicate graphic '{}'",
                g.name
            )));
        }
        if !g.x.is_finite() || !g.y.is_finite() {
            return Err(Error::config(format!(
                "{variant}/page{page}: graphic '{}' has a non-finite coordinate",
                g.name
            )));
        }
        if !(g.inner_radius >= 0.0 && g.outer_radius > g.inner_radius) {
            return Err(Error::config(format!(
                "{variant}/page{page}: graphic '{}' needs 0 <= inner_radius < outer_radius",
                g.name
            )));
        }
    }

    Ok(PageCoordinateMap {
        variant: variant.to_string(),
        page,
        page_width,
        page_height,
        fields: file.fields,
        graphics: file.graphics,
    })
}

/// Loads coordinate maps from `{root}/{variant}/page{N}.json`.
///
/// Definitions are static for the process lifetime, so each (variant, page)
/// is parsed once and shared afterwards.
pub struct CoordinateLoader {
    root: PathBuf,
    cache: RwLock<HashMap<(String, u32), SharedCoordinateMap>>,
}

impl CoordinateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load(&self, variant: &str, page: u32) -> Result<SharedCoordinateMap, Error> {
        check_variant_name(variant)?;
        let key = (variant.to_string(), page);
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(map) = cache.get(&key) {
                return Ok(Arc::clone(map));
            }
        }

        let path = definition_path(&self.root, variant, page);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::config(format!(
                "no coordinate map for {variant}/page{page} ({}): {e}",
                path.display()
            ))
        })?;
        let map = Arc::new(parse_page(variant, page, &text)?);
        log::debug!(
            "Loaded {}: {} fields, {} graphics",
            path.display(),
            map.fields.len(),
            map.graphics.len()
        );

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(cache.entry(key).or_insert(map)))
    }

    /// Load pages `1..=pages` of a variant, failing on the first bad page.
    pub fn load_variant(&self, variant: &str, pages: u32) -> Result<Vec<SharedCoordinateMap>, Error> {
        (1..=pages).map(|p| self.load(variant, p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_names_stay_inside_the_root() {
        for bad in ["", ".", "..", "../secrets", "a/b", "a\\b", "C:evil"] {
            assert!(check_variant_name(bad).unwrap_err().is_config(), "{bad:?}");
        }
        check_variant_name("heat-pump").unwrap();
        check_variant_name("standard_v2").unwrap();
    }

    #[test]
    fn defaults_page_size_to_a4() {
        let map = parse_page("standard", 1, r#"{"fields": []}"#).unwrap();
        assert_eq!(map.page_width, A4_WIDTH);
        assert_eq!(map.page_height, A4_HEIGHT);
    }

    #[test]
    fn rejects_unknown_alignment() {
        let err = parse_page(
            "standard",
            2,
            r#"{"fields": [{"name": "a", "x": 1, "y": 2, "alignment": "middle"}]}"#,
        )
        .unwrap_err();
        assert!(err.is_config(), "{err}");
    }

    #[test]
    fn rejects_non_numeric_coordinate() {
        let err = parse_page("standard", 3, r#"{"fields": [{"name": "a", "x": "left", "y": 2}]}"#)
            .unwrap_err();
        assert!(err.is_config(), "{err}");
    }

    #[test]
    fn rejects_inverted_ring_radii() {
        let err = parse_page(
            "standard",
            4,
            r#"{"graphics": [{"name": "r", "x": 1, "y": 2, "outer_radius": 10, "inner_radius": 12}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("inner_radius"));
    }
}
