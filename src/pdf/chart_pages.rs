use crate::charts::{ChartPage, SlotBox, SlotContent};
use crate::error::Error;
use crate::fonts::{FontRegistry, FontSet, FontUsage};
use crate::model::{A4_HEIGHT, A4_WIDTH};

use super::DocWriter;
use super::canvas::Canvas;
use super::text::{truncate_to_width, wrap_to_width};

const CAPTION_FONT: &str = "Helvetica-Bold";
const CAPTION_SIZE: f32 = 10.0;
const DESCRIPTION_FONT: &str = "Helvetica";
const DESCRIPTION_SIZE: f32 = 8.0;
const DESCRIPTION_MAX_LINES: usize = 2;
const TEXT_COLOR: [u8; 3] = [0x33, 0x33, 0x33];

/// Caption and description lines below an image whose bottom edge is at
/// `image_bottom`.
fn draw_captions(
    canvas: &mut Canvas<'_>,
    fonts: &FontSet,
    bounds: &SlotBox,
    image_bottom: f32,
    caption: &str,
    description: Option<&str>,
) {
    let mut baseline = image_bottom + CAPTION_SIZE + 4.0;
    if !caption.is_empty() {
        let line = truncate_to_width(fonts.get(CAPTION_FONT), caption, CAPTION_SIZE, bounds.width);
        let width = canvas.text_width(CAPTION_FONT, CAPTION_SIZE, &line);
        let x = bounds.x + (bounds.width - width) / 2.0;
        canvas.text(CAPTION_FONT, CAPTION_SIZE, x, baseline, &line, TEXT_COLOR);
        baseline += DESCRIPTION_SIZE * 1.4;
    }
    let Some(description) = description else {
        return;
    };
    let entry = fonts.get(DESCRIPTION_FONT);
    let mut lines = wrap_to_width(entry, description, DESCRIPTION_SIZE, bounds.width);
    if lines.len() > DESCRIPTION_MAX_LINES {
        let rest = lines[DESCRIPTION_MAX_LINES - 1..].join(" ");
        lines.truncate(DESCRIPTION_MAX_LINES - 1);
        lines.push(truncate_to_width(entry, &rest, DESCRIPTION_SIZE, bounds.width));
    }
    for line in &lines {
        let width = canvas.text_width(DESCRIPTION_FONT, DESCRIPTION_SIZE, line);
        let x = bounds.x + (bounds.width - width) / 2.0;
        canvas.text(DESCRIPTION_FONT, DESCRIPTION_SIZE, x, baseline, line, TEXT_COLOR);
        baseline += DESCRIPTION_SIZE * 1.3;
    }
}

/// Render chart pages into one A4 PDF. An empty page list is an
/// `Error::Render`; a zero-page PDF is never produced.
pub fn render_chart_pages(pages: &[ChartPage], registry: &FontRegistry) -> Result<Vec<u8>, Error> {
    if pages.is_empty() {
        return Err(Error::Render("no chart pages to render".into()));
    }
    let t0 = std::time::Instant::now();

    let mut usage = FontUsage::default();
    for slot in pages.iter().flat_map(|p| &p.slots) {
        match &slot.content {
            SlotContent::Chart {
                caption,
                description,
                ..
            } => {
                usage.add(CAPTION_FONT, caption);
                usage.add(CAPTION_FONT, "\u{2026}");
                if let Some(d) = description {
                    usage.add(DESCRIPTION_FONT, d);
                    usage.add(DESCRIPTION_FONT, "\u{2026}");
                }
            }
            SlotContent::Blank { caption, .. } => {
                usage.add(CAPTION_FONT, caption);
                usage.add(CAPTION_FONT, "\u{2026}");
            }
        }
    }

    let mut writer = DocWriter::new(registry, &usage);

    // Images first; resource names indexed like the slots
    let mut image_names: Vec<Vec<Option<String>>> = Vec::with_capacity(pages.len());
    for page in pages {
        let names = page
            .slots
            .iter()
            .map(|slot| match &slot.content {
                SlotContent::Chart { image, .. } => Some(writer.embed_image(image)),
                SlotContent::Blank { .. } => None,
            })
            .collect();
        image_names.push(names);
    }

    let fonts = writer.fonts();
    let mut contents = Vec::with_capacity(pages.len());
    for (page, names) in pages.iter().zip(&image_names) {
        let mut canvas = Canvas::new(A4_HEIGHT, fonts);
        for (slot, name) in page.slots.iter().zip(names) {
            let image_box = slot.bounds.image_box();
            match (&slot.content, name) {
                (
                    SlotContent::Chart {
                        image,
                        caption,
                        description,
                        ..
                    },
                    Some(name),
                ) => {
                    let (pw, ph) = image.pixel_size();
                    let placed = image_box.fit(pw, ph);
                    canvas.image(name, placed.x, placed.top, placed.width, placed.height);
                    draw_captions(
                        &mut canvas,
                        fonts,
                        &slot.bounds,
                        placed.bottom(),
                        caption,
                        description.as_deref(),
                    );
                }
                // Unusable image: the slot stays blank apart from its caption
                (SlotContent::Blank { caption, .. }, _) | (SlotContent::Chart { caption, .. }, None) => {
                    draw_captions(&mut canvas, fonts, &slot.bounds, image_box.bottom(), caption, None);
                }
            }
        }
        contents.push(canvas.finish());
    }

    for content in contents {
        writer.push_page(A4_WIDTH, A4_HEIGHT, content);
    }
    let bytes = writer.finish();

    log::info!(
        "Chart pages: {} pages, {} slots in {:.1}ms",
        pages.len(),
        pages.iter().map(|p| p.slots.len()).sum::<usize>(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(bytes)
}
