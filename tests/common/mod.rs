#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;

use offer_composer::{
    ChartAsset, FieldValue, Generator, GeneratorConfig, JsonSource, definition_path, template_path,
};
use pdf_writer::{Filter, Pdf, Rect, Ref};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const VARIANT: &str = "standard";

/// Temporary coordinate and template directories plus a matching config.
pub struct Fixture {
    pub dir: TempDir,
    pub config: GeneratorConfig,
}

impl Fixture {
    /// A variant with `pages` background pages, each carrying one required
    /// `customer_name` field.
    pub fn new(pages: u32) -> Self {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::new(dir.path().join("coords"), dir.path().join("templates"))
            .with_variant(VARIANT, pages);
        let fixture = Self { dir, config };
        for page in 1..=pages {
            fixture.write_map(VARIANT, page, &default_map());
            fixture.write_background(VARIANT, page);
        }
        fixture
    }

    pub fn write_map(&self, variant: &str, page: u32, map: &Value) {
        let path = definition_path(&self.config.coordinates_dir, variant, page);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_vec_pretty(map).unwrap()).unwrap();
    }

    pub fn write_background(&self, variant: &str, page: u32) {
        let path = template_path(&self.config.templates_dir, variant, page);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, background_pdf(page)).unwrap();
    }

    pub fn remove_background(&self, variant: &str, page: u32) {
        fs::remove_file(template_path(&self.config.templates_dir, variant, page)).unwrap();
    }

    pub fn remove_map(&self, variant: &str, page: u32) {
        fs::remove_file(definition_path(&self.config.coordinates_dir, variant, page)).unwrap();
    }

    pub fn generator(&self) -> Generator {
        Generator::new(self.config.clone()).unwrap()
    }
}

/// Route library logs through the test harness; `RUST_LOG=debug` shows them.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn default_map() -> Value {
    json!({
        "fields": [
            {"name": "customer_name", "x": 50, "y": 100, "size": 12,
             "required": true, "aliases": ["kunde_name"]}
        ]
    })
}

/// Single A4 page whose content stream carries a recognizable marker.
pub fn background_pdf(page: u32) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let catalog = Ref::new(1);
    let tree = Ref::new(2);
    let page_id = Ref::new(3);
    let content_id = Ref::new(4);

    pdf.catalog(catalog).pages(tree);
    pdf.pages(tree).kids([page_id]).count(1);
    pdf.page(page_id)
        .parent(tree)
        .media_box(Rect::new(0.0, 0.0, 595.0, 842.0))
        .contents(content_id);

    let content = format!("% {}\n0.9 g 20 20 100 50 re f\n", background_marker(page));
    let compressed = miniz_oxide::deflate::compress_to_vec_zlib(content.as_bytes(), 6);
    pdf.stream(content_id, &compressed)
        .filter(Filter::FlateDecode);
    pdf.finish()
}

pub fn background_marker(page: u32) -> String {
    format!("background-page-{page}")
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    image::RgbImage::from_pixel(width, height, image::Rgb([46, 134, 193]))
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

pub fn chart(key: &str, bytes: Option<Vec<u8>>) -> ChartAsset {
    ChartAsset {
        key: key.to_string(),
        bytes,
        category: "energy".to_string(),
        caption: format!("Chart {key}"),
        description: Some(format!("Description of {key}")),
    }
}

pub fn charts(n: usize) -> Vec<ChartAsset> {
    (0..n)
        .map(|i| chart(&format!("c{i}"), Some(png(40 + i as u32, 30))))
        .collect()
}

pub fn context(value: Value) -> JsonSource {
    JsonSource::from_value(value).unwrap()
}

pub fn source(pairs: &[(&str, &str)]) -> HashMap<String, FieldValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), FieldValue::Text(v.to_string())))
        .collect()
}

pub fn page_count(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes).unwrap().get_pages().len()
}

/// Decoded contents of every stream in the document, concatenated.
pub fn stream_text(bytes: &[u8]) -> String {
    let doc = lopdf::Document::load_mem(bytes).unwrap();
    let mut out = String::new();
    for object in doc.objects.values() {
        if let lopdf::Object::Stream(stream) = object {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            out.push_str(&String::from_utf8_lossy(&data));
            out.push('\n');
        }
    }
    out
}
