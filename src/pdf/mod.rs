mod canvas;
mod chart_pages;
mod images;
mod overlay;
mod text;

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref};

use crate::fonts::{FontRegistry, FontSet, FontUsage};

pub use chart_pages::render_chart_pages;
pub use images::{PreparedImage, prepare_image};
pub use overlay::{OverlayPage, canvas_y, render_overlay};

struct PageOut {
    width: f32,
    height: f32,
    content: Content,
}

/// Assembles a PDF written with pdf-writer: fonts and images first, then
/// page content streams, then the page tree.
pub(crate) struct DocWriter {
    pdf: Pdf,
    next_id: i32,
    catalog_id: Ref,
    pages_id: Ref,
    fonts: FontSet,
    images: Vec<(String, Ref)>,
    pages: Vec<PageOut>,
}

impl DocWriter {
    /// Start a document whose fonts cover the characters in `usage`.
    pub(crate) fn new(registry: &FontRegistry, usage: &FontUsage) -> Self {
        let mut pdf = Pdf::new();
        let catalog_id = Ref::new(1);
        let pages_id = Ref::new(2);
        let mut next_id = 3;
        let mut alloc = || {
            let r = Ref::new(next_id);
            next_id += 1;
            r
        };
        let fonts = FontSet::register(&mut pdf, &mut alloc, registry, usage);
        Self {
            pdf,
            next_id,
            catalog_id,
            pages_id,
            fonts,
            images: Vec::new(),
            pages: Vec::new(),
        }
    }

    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_id);
        self.next_id += 1;
        r
    }

    /// Write an image XObject and return its resource name.
    pub(crate) fn embed_image(&mut self, img: &PreparedImage) -> String {
        let next_id = &mut self.next_id;
        let mut alloc = || {
            let r = Ref::new(*next_id);
            *next_id += 1;
            r
        };
        let xobj_ref = images::embed_image(&mut self.pdf, &mut alloc, img);
        let name = format!("Im{}", self.images.len() + 1);
        self.images.push((name.clone(), xobj_ref));
        name
    }

    pub(crate) fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    pub(crate) fn push_page(&mut self, width: f32, height: f32, content: Content) {
        self.pages.push(PageOut {
            width,
            height,
            content,
        });
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        let pages = std::mem::take(&mut self.pages);
        let n = pages.len();
        let page_ids: Vec<Ref> = (0..n).map(|_| self.alloc()).collect();
        let content_ids: Vec<Ref> = (0..n).map(|_| self.alloc()).collect();

        self.pdf.catalog(self.catalog_id).pages(self.pages_id);
        self.pdf
            .pages(self.pages_id)
            .kids(page_ids.iter().copied())
            .count(n as i32);

        let font_pairs = self.fonts.resource_pairs();

        for (i, page) in pages.into_iter().enumerate() {
            let raw = page.content.finish();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
            self.pdf
                .stream(content_ids[i], &compressed)
                .filter(Filter::FlateDecode);

            let mut pdf_page = self.pdf.page(page_ids[i]);
            pdf_page
                .media_box(Rect::new(0.0, 0.0, page.width, page.height))
                .parent(self.pages_id)
                .contents(content_ids[i]);
            let mut resources = pdf_page.resources();
            {
                let mut fonts = resources.fonts();
                for (name, font_ref) in &font_pairs {
                    fonts.pair(Name(name.as_bytes()), *font_ref);
                }
            }
            if !self.images.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, xobj_ref) in &self.images {
                    xobjects.pair(Name(name.as_bytes()), *xobj_ref);
                }
            }
        }

        self.pdf.finish()
    }
}
