//! Renders the resolved fields and ring graphics of one page into a
//! single-page PDF that is later stamped onto the background template.

use crate::fonts::{FontRegistry, FontUsage};
use crate::model::{
    Diagnostic, FieldDefinition, FieldValue, GraphicAnchor, Overflow, PageCoordinateMap,
    ResolvedField,
};
use crate::resolve::ResolvedFieldSet;

use super::DocWriter;
use super::canvas::{Canvas, parse_color};
use super::text::{aligned_x, single_line, truncate_to_width, wrap_to_width};

const DEFAULT_TEXT_COLOR: [u8; 3] = [0, 0, 0];
const DEFAULT_RING_COLOR: [u8; 3] = [0x2E, 0x86, 0xC1];
const DEFAULT_TRACK_COLOR: [u8; 3] = [0xE6, 0xE6, 0xE6];
const RING_LABEL_FONT: &str = "Helvetica-Bold";
const DEFAULT_LINE_HEIGHT: f32 = 1.2;

pub struct OverlayPage {
    pub page: u32,
    pub width: f32,
    pub height: f32,
    /// Single-page PDF holding only the overlay layer.
    pub bytes: Vec<u8>,
    pub drawn_fields: usize,
    pub drawn_graphics: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Graphic anchors are authored with a bottom-left origin; the canvas
/// works top-down.
pub fn canvas_y(config_y: f32, page_height: f32) -> f32 {
    page_height - config_y
}

struct TextJob<'a> {
    def: &'a FieldDefinition,
    text: String,
    color: [u8; 3],
}

struct RingJob<'a> {
    anchor: &'a GraphicAnchor,
    percent: f32,
    fill: [u8; 3],
    track: [u8; 3],
}

fn plan_field<'a>(
    def: &'a FieldDefinition,
    resolved: Option<&ResolvedField>,
) -> Result<Option<TextJob<'a>>, String> {
    let Some(resolved) = resolved else {
        return Err("field was not resolved".into());
    };
    if resolved.is_empty() {
        // Only optional fields can end up empty; they are simply omitted
        return Ok(None);
    }
    let color = match &def.color {
        Some(spec) => parse_color(spec).map_err(|e| e.to_string())?,
        None => DEFAULT_TEXT_COLOR,
    };
    Ok(Some(TextJob {
        def,
        text: resolved.value.clone(),
        color,
    }))
}

fn plan_ring<'a>(
    anchor: &'a GraphicAnchor,
    resolved: Option<&ResolvedField>,
) -> Result<Option<RingJob<'a>>, String> {
    let Some(resolved) = resolved.filter(|r| !r.is_empty()) else {
        log::debug!("Ring '{}' has no value, skipped", anchor.name);
        return Ok(None);
    };
    let percent = resolved
        .raw
        .as_ref()
        .and_then(|v| v.as_number())
        .or_else(|| FieldValue::text(&resolved.value)?.as_number())
        .filter(|p| p.is_finite())
        .ok_or_else(|| format!("'{}' is not a percentage", resolved.value))?;
    let fill = match &anchor.color {
        Some(spec) => parse_color(spec).map_err(|e| e.to_string())?,
        None => DEFAULT_RING_COLOR,
    };
    let track = match &anchor.track_color {
        Some(spec) => parse_color(spec).map_err(|e| e.to_string())?,
        None => DEFAULT_TRACK_COLOR,
    };
    Ok(Some(RingJob {
        anchor,
        percent: percent.clamp(0.0, 100.0) as f32,
        fill,
        track,
    }))
}

fn ring_label(percent: f32) -> String {
    format!("{percent:.0} %")
}

/// Render one overlay page. Elements that cannot be drawn are skipped and
/// reported; the rest of the page is still produced.
pub fn render_overlay(
    map: &PageCoordinateMap,
    resolved: &ResolvedFieldSet,
    registry: &FontRegistry,
) -> OverlayPage {
    let t0 = std::time::Instant::now();
    let mut diagnostics = Vec::new();
    let mut skip = |element: &str, reason: String| {
        log::warn!("{}/page{}: skipping '{element}': {reason}", map.variant, map.page);
        diagnostics.push(Diagnostic::Render {
            page: map.page,
            element: element.to_string(),
            reason,
        });
    };

    // Phase 1: decide what gets drawn
    let mut text_jobs = Vec::new();
    for def in &map.fields {
        match plan_field(def, resolved.get(&def.name)) {
            Ok(Some(job)) => text_jobs.push(job),
            Ok(None) => {}
            Err(reason) => skip(&def.name, reason),
        }
    }
    let mut ring_jobs = Vec::new();
    for anchor in &map.graphics {
        match plan_ring(anchor, resolved.graphic(&anchor.name)) {
            Ok(Some(job)) => ring_jobs.push(job),
            Ok(None) => {}
            Err(reason) => skip(&anchor.name, reason),
        }
    }

    // Phase 2: fonts, subset to the characters actually drawn
    let mut usage = FontUsage::default();
    for job in &text_jobs {
        usage.add(&job.def.font, &job.text);
        if job.def.max_width.is_some() && job.def.overflow == Overflow::Truncate {
            usage.add(&job.def.font, "\u{2026}");
        }
    }
    for job in ring_jobs.iter().filter(|j| j.anchor.show_label) {
        usage.add(RING_LABEL_FONT, &ring_label(job.percent));
    }

    let mut writer = DocWriter::new(registry, &usage);
    let fonts = writer.fonts();

    // Phase 3: draw
    let mut canvas = Canvas::new(map.page_height, fonts);
    for job in &text_jobs {
        let def = job.def;
        let entry = fonts.get(&def.font);
        let lines = match (def.max_width, def.overflow) {
            (Some(w), Overflow::Wrap) => wrap_to_width(entry, &job.text, def.size, w),
            (Some(w), Overflow::Truncate) => {
                vec![truncate_to_width(entry, &single_line(&job.text), def.size, w)]
            }
            (None, _) => job.text.lines().map(single_line).collect(),
        };
        let pitch = def.size * def.line_height.unwrap_or(DEFAULT_LINE_HEIGHT);
        for (i, line) in lines.iter().enumerate() {
            let width = canvas.text_width(&def.font, def.size, line);
            let x = aligned_x(def.alignment, def.x, width);
            let y = def.y + i as f32 * pitch;
            canvas.text(&def.font, def.size, x, y, line, job.color);
        }
    }

    for job in &ring_jobs {
        let a = job.anchor;
        let cy = canvas_y(a.y, map.page_height);
        canvas.ring(
            a.x,
            cy,
            a.outer_radius,
            a.inner_radius,
            job.percent / 100.0,
            job.fill,
            job.track,
        );
        if a.show_label {
            let label = ring_label(job.percent);
            let size = (a.inner_radius * 0.45).max(6.0);
            let width = canvas.text_width(RING_LABEL_FONT, size, &label);
            canvas.text(
                RING_LABEL_FONT,
                size,
                a.x - width / 2.0,
                cy + size * 0.35,
                &label,
                DEFAULT_TEXT_COLOR,
            );
        }
    }

    let content = canvas.finish();
    writer.push_page(map.page_width, map.page_height, content);
    let bytes = writer.finish();

    log::debug!(
        "Overlay {}/page{}: {} fields, {} rings, {} skipped in {:.1}ms",
        map.variant,
        map.page,
        text_jobs.len(),
        ring_jobs.len(),
        diagnostics.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );

    OverlayPage {
        page: map.page,
        width: map.page_width,
        height: map.page_height,
        bytes,
        drawn_fields: text_jobs.len(),
        drawn_graphics: ring_jobs.len(),
        diagnostics,
    }
}
