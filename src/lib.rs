pub mod charts;
mod compose;
mod config;
mod coords;
mod error;
mod fonts;
mod model;
mod pdf;
mod resolve;
mod templates;

pub use charts::{ChartPage, ChartSlot, SlotBox, SlotContent};
pub use compose::{ComposedDocument, compose, media_box, merge_documents};
pub use config::{DefaultsConfig, GeneratorConfig, VariantConfig};
pub use coords::{CoordinateLoader, definition_path, parse_page};
pub use error::Error;
pub use fonts::{FontRegistry, fonts_from_env};
pub use model::*;
pub use pdf::{OverlayPage, PreparedImage, canvas_y, prepare_image, render_chart_pages, render_overlay};
pub use resolve::{
    DEFAULT_NOT_AVAILABLE, DataSource, DataSourceChain, DefaultTable, EmptySource, JsonSource,
    ResolvedFieldSet, resolve, resolve_field, resolve_page,
};
pub use templates::{TemplateStore, template_path};

use std::time::Instant;

use rayon::prelude::*;

/// Inputs specific to one document unit.
pub struct GenerationRequest {
    pub variant: String,
    /// Per-invocation form context; highest priority in the chain.
    pub context: Box<dyn DataSource>,
    pub charts: Vec<ChartAsset>,
    /// Overrides the configured chart layout.
    pub layout: Option<ChartLayout>,
}

impl GenerationRequest {
    pub fn new(variant: impl Into<String>, context: impl DataSource + 'static) -> Self {
        Self {
            variant: variant.into(),
            context: Box::new(context),
            charts: Vec::new(),
            layout: None,
        }
    }

    pub fn with_charts(mut self, charts: Vec<ChartAsset>, layout: Option<ChartLayout>) -> Self {
        self.charts = charts;
        self.layout = layout;
        self
    }
}

/// Lower-priority sources shared by every unit of a batch.
#[derive(Clone, Copy)]
pub struct SharedSources<'a> {
    pub ambient: &'a dyn DataSource,
    pub computed: &'a dyn DataSource,
}

impl Default for SharedSources<'_> {
    fn default() -> Self {
        Self {
            ambient: &EmptySource,
            computed: &EmptySource,
        }
    }
}

/// Produces offer documents for the variants of one configuration.
///
/// A `Generator` is immutable apart from its coordinate cache and can be
/// shared across threads.
pub struct Generator {
    config: GeneratorConfig,
    coords: CoordinateLoader,
    templates: TemplateStore,
    fonts: FontRegistry,
    defaults: DefaultTable,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Result<Self, Error> {
        let fonts = FontRegistry::from_files(&config.fonts)?;
        Ok(Self {
            coords: CoordinateLoader::new(&config.coordinates_dir),
            templates: TemplateStore::new(&config.templates_dir),
            defaults: config.default_table(),
            fonts,
            config,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Load every coordinate map and template of `variant`.
    pub fn check_variant(&self, variant: &str) -> Result<usize, Error> {
        let pages = self.config.variant(variant)?.pages;
        let maps = self.coords.load_variant(variant, pages)?;
        self.templates.load_variant(variant, pages)?;
        Ok(maps.iter().map(|m| m.fields.len() + m.graphics.len()).sum())
    }

    /// Generate one document. Fails only when the base document cannot be
    /// built (unknown variant, missing coordinate map or template, corrupt
    /// background). Chart problems degrade to `success = false`.
    pub fn generate(
        &self,
        request: &GenerationRequest,
        shared: SharedSources<'_>,
    ) -> Result<MergeResult, Error> {
        let t0 = Instant::now();
        let variant = request.variant.as_str();
        let pages = self.config.variant(variant)?.pages;

        let chain = DataSourceChain::new(
            request.context.as_ref(),
            shared.ambient,
            shared.computed,
            &self.defaults,
        );

        let mut diagnostics = Vec::new();
        let mut backgrounds = Vec::with_capacity(pages as usize);
        let mut overlays = Vec::with_capacity(pages as usize);
        for page in 1..=pages {
            let map = self.coords.load(variant, page)?;
            backgrounds.push(self.templates.load(variant, page)?);
            let resolved = resolve_page(&map, &chain);
            diagnostics.extend(resolved.diagnostics(page));
            let overlay = render_overlay(&map, &resolved, &self.fonts);
            diagnostics.extend(overlay.diagnostics.iter().cloned());
            overlays.push(overlay);
        }
        let t_overlay = t0.elapsed();

        let base = compose(&backgrounds, &overlays)?;
        let t_compose = t0.elapsed();

        let layout = request.layout.unwrap_or(self.config.chart_layout);
        let mut merged = merge_documents(&base, || {
            if request.charts.is_empty() {
                return Ok(None);
            }
            let chart_pages = charts::generate(&request.charts, layout);
            diagnostics.extend(charts::diagnostics(&chart_pages));
            render_chart_pages(&chart_pages, &self.fonts).map(Some)
        })?;
        let t_total = t0.elapsed();

        diagnostics.append(&mut merged.diagnostics);
        merged.diagnostics = diagnostics;

        log::info!(
            "Timing {variant}: overlay={:.1}ms, compose={:.1}ms, charts+merge={:.1}ms, total={:.1}ms ({} pages, {} bytes, {} diagnostics)",
            t_overlay.as_secs_f64() * 1000.0,
            (t_compose - t_overlay).as_secs_f64() * 1000.0,
            (t_total - t_compose).as_secs_f64() * 1000.0,
            t_total.as_secs_f64() * 1000.0,
            merged.page_count,
            merged.bytes.len(),
            merged.diagnostics.len(),
        );
        Ok(merged)
    }

    /// Generate many documents in parallel. Results keep request order and a
    /// failing unit never affects its siblings.
    pub fn generate_batch(
        &self,
        requests: &[GenerationRequest],
        shared: SharedSources<'_>,
    ) -> Vec<Result<MergeResult, Error>> {
        let t0 = Instant::now();
        let results: Vec<_> = requests
            .par_iter()
            .map(|request| self.generate(request, shared))
            .collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        log::info!(
            "Batch: {} documents, {} failed in {:.1}ms",
            results.len(),
            failed,
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        results
    }
}
