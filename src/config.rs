use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::coords::check_variant_name;
use crate::error::Error;
use crate::fonts::fonts_from_env;
use crate::model::ChartLayout;
use crate::resolve::{DEFAULT_NOT_AVAILABLE, DefaultTable};

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantConfig {
    /// Number of background pages; coordinate maps and templates are
    /// expected for pages `1..=pages`.
    pub pages: u32,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub categories: HashMap<String, String>,
}

/// Generator configuration, read from a JSON file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    pub coordinates_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub variants: BTreeMap<String, VariantConfig>,
    #[serde(default)]
    pub fonts: BTreeMap<String, PathBuf>,
    #[serde(default = "default_marker")]
    pub not_available_marker: String,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub chart_layout: ChartLayout,
}

fn default_marker() -> String {
    DEFAULT_NOT_AVAILABLE.to_string()
}

impl GeneratorConfig {
    /// Minimal configuration rooted at two directories, with no variants.
    pub fn new(coordinates_dir: impl Into<PathBuf>, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            coordinates_dir: coordinates_dir.into(),
            templates_dir: templates_dir.into(),
            variants: BTreeMap::new(),
            fonts: BTreeMap::new(),
            not_available_marker: default_marker(),
            defaults: DefaultsConfig::default(),
            chart_layout: ChartLayout::default(),
        }
    }

    pub fn with_variant(mut self, name: impl Into<String>, pages: u32) -> Self {
        self.variants
            .insert(name.into(), VariantConfig { pages, label: None });
        self
    }

    /// Parse JSON text. Relative paths are resolved against `base_dir`.
    pub fn from_json(text: &str, base_dir: &Path) -> Result<Self, Error> {
        let mut config: GeneratorConfig = serde_json::from_str(text)
            .map_err(|e| Error::config(format!("invalid generator config: {e}")))?;
        config.resolve_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    /// Read a config file and merge fonts from `OFFER_COMPOSER_FONTS`.
    /// Fonts named in the file take precedence over the environment.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_json(&text, base_dir)?;
        for (name, font_path) in fonts_from_env() {
            config.fonts.entry(name).or_insert(font_path);
        }
        log::debug!(
            "Loaded config {}: {} variants, {} fonts",
            path.display(),
            config.variants.len(),
            config.fonts.len()
        );
        Ok(config)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let absolutize = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };
        absolutize(&mut self.coordinates_dir);
        absolutize(&mut self.templates_dir);
        self.fonts.values_mut().for_each(absolutize);
    }

    fn validate(&self) -> Result<(), Error> {
        for name in self.variants.keys() {
            check_variant_name(name)?;
        }
        if let Some((name, _)) = self.variants.iter().find(|(_, v)| v.pages == 0) {
            return Err(Error::config(format!("variant '{name}' has no pages")));
        }
        if self.not_available_marker.trim().is_empty() {
            return Err(Error::config("not_available_marker must not be blank"));
        }
        Ok(())
    }

    pub fn variant(&self, name: &str) -> Result<&VariantConfig, Error> {
        self.variants.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.variants.keys().map(String::as_str).collect();
            Error::config(format!(
                "unknown document variant '{name}' (known: {})",
                known.join(", ")
            ))
        })
    }

    pub fn default_table(&self) -> DefaultTable {
        DefaultTable {
            fields: self.defaults.fields.clone(),
            categories: self.defaults.categories.clone(),
            not_available: self.not_available_marker.clone(),
        }
    }
}
