//! Chart page layout: distributes chart assets over A4 pages using one of the
//! fixed slot grids. Rendering the resulting pages lives in
//! `pdf::chart_pages`.

use crate::model::{A4_HEIGHT, A4_WIDTH, ChartAsset, ChartLayout, Diagnostic};
use crate::pdf::{PreparedImage, prepare_image};

pub const PAGE_MARGIN: f32 = 42.0;
pub const SLOT_GAP: f32 = 18.0;
/// Height reserved at the bottom of every slot for caption and description.
pub const CAPTION_BAND: f32 = 44.0;

/// Axis-aligned box in page space with a top-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotBox {
    pub x: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SlotBox {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// The part of the slot above the caption band.
    pub fn image_box(&self) -> SlotBox {
        SlotBox {
            height: (self.height - CAPTION_BAND).max(0.0),
            ..*self
        }
    }

    /// Largest box with the pixel aspect ratio that fits inside `self`,
    /// centred horizontally and vertically.
    pub fn fit(&self, px_width: u32, px_height: u32) -> SlotBox {
        if px_width == 0 || px_height == 0 {
            return *self;
        }
        let scale = (self.width / px_width as f32).min(self.height / px_height as f32);
        let width = px_width as f32 * scale;
        let height = px_height as f32 * scale;
        SlotBox {
            x: self.x + (self.width - width) / 2.0,
            top: self.top + (self.height - height) / 2.0,
            width,
            height,
        }
    }
}

/// Slot grid for one page of `layout`, row-major.
pub fn slot_boxes(layout: ChartLayout) -> Vec<SlotBox> {
    let area_w = A4_WIDTH - 2.0 * PAGE_MARGIN;
    let area_h = A4_HEIGHT - 2.0 * PAGE_MARGIN;
    let (cols, rows) = match layout {
        ChartLayout::OnePerPage => (1, 1),
        ChartLayout::TwoPerPage => (1, 2),
        ChartLayout::FourPerPage => (2, 2),
    };
    let cell_w = (area_w - SLOT_GAP * (cols - 1) as f32) / cols as f32;
    let cell_h = (area_h - SLOT_GAP * (rows - 1) as f32) / rows as f32;

    let mut boxes = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            boxes.push(SlotBox {
                x: PAGE_MARGIN + col as f32 * (cell_w + SLOT_GAP),
                top: PAGE_MARGIN + row as f32 * (cell_h + SLOT_GAP),
                width: cell_w,
                height: cell_h,
            });
        }
    }
    boxes
}

#[derive(Clone, Debug)]
pub enum SlotContent {
    Chart {
        key: String,
        category: String,
        image: PreparedImage,
        caption: String,
        description: Option<String>,
    },
    /// Asset could not be used; the slot keeps its place and caption.
    Blank {
        key: String,
        caption: String,
        reason: String,
    },
}

#[derive(Clone, Debug)]
pub struct ChartSlot {
    /// Position of the asset in the input list.
    pub index: usize,
    pub bounds: SlotBox,
    pub content: SlotContent,
}

#[derive(Clone, Debug)]
pub struct ChartPage {
    /// 1-based number within the chart section.
    pub number: usize,
    pub layout: ChartLayout,
    pub slots: Vec<ChartSlot>,
}

impl ChartPage {
    pub fn blank_slots(&self) -> impl Iterator<Item = &ChartSlot> {
        self.slots
            .iter()
            .filter(|s| matches!(s.content, SlotContent::Blank { .. }))
    }
}

fn slot_content(asset: &ChartAsset) -> SlotContent {
    let prepared = match &asset.bytes {
        None => Err("no image data".to_string()),
        Some(bytes) => prepare_image(bytes).map_err(|e| e.to_string()),
    };
    match prepared {
        Ok(image) => SlotContent::Chart {
            key: asset.key.clone(),
            category: asset.category.clone(),
            image,
            caption: asset.caption.clone(),
            description: asset.description.clone().filter(|d| !d.trim().is_empty()),
        },
        Err(reason) => {
            log::warn!("Chart '{}' left blank: {reason}", asset.key);
            SlotContent::Blank {
                key: asset.key.clone(),
                caption: asset.caption.clone(),
                reason,
            }
        }
    }
}

/// Lay out `assets` in order across pages of `layout`. Only slots that hold
/// an asset are materialized, so the last page may be partial.
pub fn generate(assets: &[ChartAsset], layout: ChartLayout) -> Vec<ChartPage> {
    let grid = slot_boxes(layout);
    assets
        .chunks(layout.slots_per_page())
        .enumerate()
        .map(|(page_idx, chunk)| ChartPage {
            number: page_idx + 1,
            layout,
            slots: chunk
                .iter()
                .zip(&grid)
                .enumerate()
                .map(|(slot_idx, (asset, bounds))| ChartSlot {
                    index: page_idx * grid.len() + slot_idx,
                    bounds: *bounds,
                    content: slot_content(asset),
                })
                .collect(),
        })
        .collect()
}

/// One `Diagnostic::Asset` per blank slot, in slot order.
pub fn diagnostics(pages: &[ChartPage]) -> Vec<Diagnostic> {
    pages
        .iter()
        .flat_map(ChartPage::blank_slots)
        .filter_map(|slot| match &slot.content {
            SlotContent::Blank { key, reason, .. } => Some(Diagnostic::Asset {
                key: key.clone(),
                reason: reason.clone(),
            }),
            SlotContent::Chart { .. } => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inside(inner: &SlotBox, outer: &SlotBox) -> bool {
        const EPS: f32 = 0.01;
        inner.x >= outer.x - EPS
            && inner.top >= outer.top - EPS
            && inner.x + inner.width <= outer.x + outer.width + EPS
            && inner.bottom() <= outer.bottom() + EPS
    }

    #[test]
    fn grids_stay_within_margins() {
        let page = SlotBox {
            x: PAGE_MARGIN,
            top: PAGE_MARGIN,
            width: A4_WIDTH - 2.0 * PAGE_MARGIN,
            height: A4_HEIGHT - 2.0 * PAGE_MARGIN,
        };
        for layout in [
            ChartLayout::OnePerPage,
            ChartLayout::TwoPerPage,
            ChartLayout::FourPerPage,
        ] {
            let boxes = slot_boxes(layout);
            assert_eq!(boxes.len(), layout.slots_per_page());
            assert!(boxes.iter().all(|b| inside(b, &page)), "{layout}");
        }
    }

    #[test]
    fn two_per_page_stacks_vertically() {
        let boxes = slot_boxes(ChartLayout::TwoPerPage);
        assert_eq!(boxes[0].x, boxes[1].x);
        assert_eq!(boxes[0].height, 370.0);
        assert_eq!(boxes[1].top, boxes[0].bottom() + SLOT_GAP);
    }

    #[test]
    fn four_per_page_is_row_major() {
        let boxes = slot_boxes(ChartLayout::FourPerPage);
        assert_eq!(boxes[0].top, boxes[1].top);
        assert!(boxes[1].x > boxes[0].x);
        assert_eq!(boxes[2].x, boxes[0].x);
        assert!(boxes[2].top > boxes[0].top);
        assert_eq!(boxes[0].width, 246.5);
    }

    #[test]
    fn fit_preserves_aspect_and_centres() {
        let slot = SlotBox {
            x: 0.0,
            top: 0.0,
            width: 200.0,
            height: 100.0,
        };
        let wide = slot.fit(400, 100);
        assert_eq!((wide.width, wide.height), (200.0, 50.0));
        assert_eq!(wide.top, 25.0);

        let tall = slot.fit(100, 200);
        assert_eq!((tall.width, tall.height), (50.0, 100.0));
        assert_eq!(tall.x, 75.0);
    }

    #[test]
    fn missing_bytes_yield_blank_slot_and_diagnostic() {
        let assets = vec![ChartAsset {
            key: "pv".into(),
            caption: "PV".into(),
            ..Default::default()
        }];
        let pages = generate(&assets, ChartLayout::OnePerPage);
        assert_eq!(pages.len(), 1);
        assert!(matches!(pages[0].slots[0].content, SlotContent::Blank { .. }));
        let diags = diagnostics(&pages);
        assert_eq!(diags.len(), 1);
        assert!(matches!(&diags[0], Diagnostic::Asset { key, .. } if key == "pv"));
    }

    #[test]
    fn no_assets_no_pages() {
        assert!(generate(&[], ChartLayout::FourPerPage).is_empty());
    }
}
