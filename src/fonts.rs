use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use pdf_writer::types::{CidFontType, FontFlags, SystemInfo, UnicodeCmap};
use pdf_writer::{Name, Pdf, Rect, Ref, Str};
use ttf_parser::Face;

use crate::error::Error;

pub(crate) const DEFAULT_FONT: &str = "Helvetica";

/// The standard PDF fonts every viewer provides.
const STANDARD_FONTS: [&str; 14] = [
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

/// How glyphs of a registered font are measured and encoded.
pub(crate) enum Glyphs {
    /// Standard font with WinAnsi encoding; widths for bytes 32..=255.
    WinAnsi(Vec<f32>),
    /// Embedded subset addressed by glyph id (Identity-H).
    Cid {
        gids: HashMap<char, u16>,
        widths: HashMap<char, f32>,
    },
}

pub(crate) struct FontEntry {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    pub(crate) glyphs: Glyphs,
}

impl FontEntry {
    /// Advance of `ch` in 1000-units; 0 for characters the font cannot show.
    pub(crate) fn char_width_1000(&self, ch: char) -> f32 {
        match &self.glyphs {
            Glyphs::WinAnsi(widths) => match char_to_winansi(ch) {
                b if b >= 32 => widths[(b - 32) as usize],
                _ => 0.0,
            },
            Glyphs::Cid { widths, .. } => widths.get(&ch).copied().unwrap_or(0.0),
        }
    }

    pub(crate) fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    pub(crate) fn has_char(&self, ch: char) -> bool {
        match &self.glyphs {
            Glyphs::WinAnsi(_) => char_to_winansi(ch) != 0,
            Glyphs::Cid { gids, .. } => gids.contains_key(&ch),
        }
    }

    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.glyphs {
            Glyphs::WinAnsi(_) => to_winansi_bytes(text),
            Glyphs::Cid { gids, .. } => encode_as_gids(text, gids),
        }
    }
}

/// Font files available for embedding, keyed by lowercase font name.
///
/// Names not registered here resolve to one of the standard PDF fonts.
#[derive(Default)]
pub struct FontRegistry {
    files: HashMap<String, (PathBuf, Vec<u8>)>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every configured font file. A missing or unparsable file is a
    /// configuration error.
    pub fn from_files(fonts: &BTreeMap<String, PathBuf>) -> Result<Self, Error> {
        let mut registry = Self::new();
        for (name, path) in fonts {
            registry.add_file(name, path)?;
        }
        Ok(registry)
    }

    pub fn add_file(&mut self, name: &str, path: &Path) -> Result<(), Error> {
        let data = std::fs::read(path).map_err(|e| {
            Error::config(format!("font '{name}' ({}): {e}", path.display()))
        })?;
        self.add_bytes(name, path.to_path_buf(), data)
    }

    pub fn add_bytes(&mut self, name: &str, origin: PathBuf, data: Vec<u8>) -> Result<(), Error> {
        if let Err(e) = Face::parse(&data, 0) {
            return Err(Error::config(format!(
                "font '{name}' ({}) is not a TrueType/OpenType font: {e}",
                origin.display()
            )));
        }
        self.files.insert(name.to_lowercase(), (origin, data));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(&name.to_lowercase()) || standard_font(name).is_some()
    }

    fn embedded(&self, name: &str) -> Option<&[u8]> {
        self.files.get(&name.to_lowercase()).map(|(_, d)| d.as_slice())
    }
}

/// Parse `OFFER_COMPOSER_FONTS` (`name=path` pairs separated like `PATH`).
pub fn fonts_from_env() -> BTreeMap<String, PathBuf> {
    let mut out = BTreeMap::new();
    let Ok(val) = std::env::var("OFFER_COMPOSER_FONTS") else {
        return out;
    };
    let sep = if cfg!(windows) { ';' } else { ':' };
    for part in val.split(sep) {
        let Some((name, path)) = part.split_once('=') else {
            if !part.trim().is_empty() {
                log::warn!("Ignoring OFFER_COMPOSER_FONTS entry without '=': {part}");
            }
            continue;
        };
        let (name, path) = (name.trim(), path.trim());
        if !name.is_empty() && !path.is_empty() {
            out.insert(name.to_string(), PathBuf::from(path));
        }
    }
    out
}

fn standard_font(name: &str) -> Option<&'static str> {
    STANDARD_FONTS
        .iter()
        .copied()
        .find(|f| f.eq_ignore_ascii_case(name.trim()))
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        _ => (0x80u8..=0x9F)
            .find(|&b| winansi_to_char(b) == c)
            .unwrap_or(0),
    }
}

/// Convert a UTF-8 string to WinAnsi bytes. Control and unmappable chars
/// are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .filter_map(|c| match c as u32 {
            0x0000..=0x001F => None,
            0x0020..=0x007F => Some(c as u8),
            _ => Some(char_to_winansi(c)).filter(|&b| b != 0),
        })
        .collect()
}

/// Encode UTF-8 text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars().filter(|c| !c.is_control()) {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.push((gid >> 8) as u8);
        out.push((gid & 0xFF) as u8);
    }
    out
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths(bold: bool) -> Vec<f32> {
    let scale = if bold { 1.06 } else { 1.0 };
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,                          // space
            33..=47 => 333.0,                     // punctuation
            48..=57 => 556.0,                     // digits
            58..=64 => 333.0,                     // more punctuation
            73 | 74 => 278.0,                     // I J (narrow uppercase)
            77 => 833.0,                          // M (wide)
            65..=90 => 667.0,                     // uppercase A-Z (average)
            91..=96 => 333.0,                     // brackets etc.
            102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
            109 | 119 => 833.0,                   // m w (wide)
            97..=122 => 556.0,                    // lowercase a-z (average)
            _ => 556.0,
        })
        .map(|w| w * scale)
        .collect()
}

fn standard_widths(base_font: &str) -> Vec<f32> {
    if base_font.starts_with("Courier") {
        vec![600.0; 224]
    } else {
        helvetica_widths(base_font.contains("Bold"))
    }
}

fn to_1000(value: f32, units_per_em: f32) -> f32 {
    value / units_per_em * 1000.0
}

/// Embed a configured TrueType/OpenType font as a Type0 font with
/// Identity-H encoding, subset to `used_chars`. `None` when the face cannot
/// be parsed.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    font_name: &str,
    font_data: &[u8],
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<Glyphs> {
    let face = Face::parse(font_data, 0).ok()?;
    let upem = face.units_per_em() as f32;

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut gids = HashMap::new();
    let mut widths = HashMap::new();
    let mut chars: Vec<char> = used_chars.iter().copied().collect();
    chars.sort_unstable();
    for ch in chars {
        let Some(gid) = face.glyph_index(ch) else {
            log::debug!("{font_name} has no glyph for {ch:?}");
            continue;
        };
        gids.insert(ch, remapper.remap(gid.0));
        let advance = face.glyph_hor_advance(gid).unwrap_or(0);
        widths.insert(ch, to_1000(advance as f32, upem));
    }

    let program = subsetter::subset(font_data, 0, &remapper).unwrap_or_else(|e| {
        log::warn!("Subsetting {font_name} failed ({e}), embedding the whole font");
        font_data.to_vec()
    });
    let program_len = i32::try_from(program.len()).ok()?;

    let file_ref = alloc();
    let descriptor_ref = alloc();
    let cid_ref = alloc();
    let cmap_ref = alloc();
    let base_font = font_name.replace(' ', "");

    pdf.stream(file_ref, &program)
        .pair(Name(b"Length1"), program_len);

    let bb = face.global_bounding_box();
    pdf.font_descriptor(descriptor_ref)
        .name(Name(base_font.as_bytes()))
        .flags(FontFlags::NON_SYMBOLIC)
        .bbox(Rect::new(
            to_1000(bb.x_min as f32, upem),
            to_1000(bb.y_min as f32, upem),
            to_1000(bb.x_max as f32, upem),
            to_1000(bb.y_max as f32, upem),
        ))
        .italic_angle(0.0)
        .ascent(to_1000(face.ascender() as f32, upem))
        .descent(to_1000(face.descender() as f32, upem))
        .cap_height(face.capital_height().map_or(700.0, |h| to_1000(h as f32, upem)))
        .stem_v(80.0)
        .font_file2(file_ref);

    let identity = || SystemInfo {
        registry: Str(b"Adobe"),
        ordering: Str(b"Identity"),
        supplement: 0,
    };

    let mut by_gid: Vec<(u16, f32)> = gids
        .iter()
        .map(|(ch, &gid)| (gid, widths[ch]))
        .collect();
    by_gid.sort_by_key(|&(gid, _)| gid);

    let mut cid = pdf.cid_font(cid_ref);
    cid.subtype(CidFontType::Type2)
        .base_font(Name(base_font.as_bytes()))
        .system_info(identity())
        .font_descriptor(descriptor_ref)
        .default_width(0.0)
        .cid_to_gid_map_predefined(Name(b"Identity"));
    if !by_gid.is_empty() {
        let mut w = cid.widths();
        for (gid, width) in by_gid {
            w.consecutive(gid, [width]);
        }
    }
    drop(cid);

    // Keeps stamped text searchable
    let cmap_name = format!("{base_font}-UTF16");
    let mut cmap = UnicodeCmap::new(Name(cmap_name.as_bytes()), identity());
    for (&ch, &gid) in &gids {
        cmap.pair(gid, ch);
    }
    pdf.stream(cmap_ref, cmap.finish().as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(base_font.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_ref)
        .to_unicode(cmap_ref);

    Some(Glyphs::Cid { gids, widths })
}

pub(crate) fn register_font(
    pdf: &mut Pdf,
    font_name: &str,
    pdf_name: String,
    alloc: &mut impl FnMut() -> Ref,
    registry: &FontRegistry,
    used_chars: &HashSet<char>,
) -> FontEntry {
    let font_ref = alloc();

    let embedded = registry
        .embedded(font_name)
        .and_then(|data| embed_truetype(pdf, font_ref, font_name, data, used_chars, alloc));

    let glyphs = match embedded {
        Some(glyphs) => {
            log::debug!("Embedded {font_name} as {pdf_name} ({} glyphs)", used_chars.len());
            glyphs
        }
        None => {
            let base_font = standard_font(font_name).unwrap_or_else(|| {
                log::warn!("Font '{font_name}' is not configured, using {DEFAULT_FONT}");
                DEFAULT_FONT
            });
            let mut font = pdf.type1_font(font_ref);
            font.base_font(Name(base_font.as_bytes()));
            if base_font != "Symbol" && base_font != "ZapfDingbats" {
                font.encoding_predefined(Name(b"WinAnsiEncoding"));
            }
            Glyphs::WinAnsi(standard_widths(base_font))
        }
    };

    FontEntry {
        pdf_name,
        font_ref,
        glyphs,
    }
}

/// Characters used per font name within one PDF being written.
#[derive(Default)]
pub(crate) struct FontUsage {
    chars: BTreeMap<String, HashSet<char>>,
}

impl FontUsage {
    pub(crate) fn add(&mut self, font: &str, text: &str) {
        let chars = self.chars.entry(font.to_string()).or_default();
        chars.extend(text.chars());
        chars.insert(' ');
    }
}

/// Fonts registered in one PDF, keyed by the font name used in layouts.
pub(crate) struct FontSet {
    entries: HashMap<String, FontEntry>,
    order: Vec<String>,
}

impl FontSet {
    pub(crate) fn register(
        pdf: &mut Pdf,
        alloc: &mut impl FnMut() -> Ref,
        registry: &FontRegistry,
        usage: &FontUsage,
    ) -> Self {
        let mut entries = HashMap::new();
        let mut order = Vec::new();
        for (name, used) in &usage.chars {
            let pdf_name = format!("F{}", order.len() + 1);
            let entry = register_font(pdf, name, pdf_name, alloc, registry, used);
            entries.insert(name.clone(), entry);
            order.push(name.clone());
        }
        if entries.is_empty() {
            let entry = register_font(
                pdf,
                DEFAULT_FONT,
                "F1".to_string(),
                alloc,
                registry,
                &HashSet::new(),
            );
            entries.insert(DEFAULT_FONT.to_string(), entry);
            order.push(DEFAULT_FONT.to_string());
        }
        Self { entries, order }
    }

    /// The entry for `name`, or the first registered font.
    pub(crate) fn get(&self, name: &str) -> &FontEntry {
        self.entries
            .get(name)
            .unwrap_or_else(|| &self.entries[&self.order[0]])
    }

    pub(crate) fn resource_pairs(&self) -> Vec<(String, Ref)> {
        self.order
            .iter()
            .map(|n| (self.entries[n].pdf_name.clone(), self.entries[n].font_ref))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winansi_maps_euro_and_latin1() {
        assert_eq!(to_winansi_bytes("€ äß"), vec![0x80, b' ', 0xE4, 0xDF]);
        assert_eq!(char_to_winansi('\u{2026}'), 0x85);
        assert_eq!(char_to_winansi('\u{4E2D}'), 0);
    }

    #[test]
    fn winansi_drops_control_chars() {
        assert_eq!(to_winansi_bytes("a\tb\r\n\u{7}c"), b"abc".to_vec());
    }

    #[test]
    fn standard_font_lookup_is_case_insensitive() {
        assert_eq!(standard_font("helvetica-bold"), Some("Helvetica-Bold"));
        assert_eq!(standard_font("Arial"), None);
        assert!(FontRegistry::new().contains("Times-Roman"));
    }

    #[test]
    fn rejects_bytes_that_are_not_a_font() {
        let mut registry = FontRegistry::new();
        let err = registry
            .add_bytes("Brand", PathBuf::from("brand.ttf"), b"nope".to_vec())
            .unwrap_err();
        assert!(err.is_config());
        assert!(!registry.contains("Brand"));
    }

    #[test]
    fn fallback_entry_measures_with_winansi_widths() {
        let mut pdf = Pdf::new();
        let mut next = 1;
        let mut alloc = || {
            next += 1;
            Ref::new(next)
        };
        let entry = register_font(
            &mut pdf,
            "Unknown Sans",
            "F1".into(),
            &mut alloc,
            &FontRegistry::new(),
            &HashSet::new(),
        );
        assert!(matches!(entry.glyphs, Glyphs::WinAnsi(_)));
        assert_eq!(entry.text_width("ii", 10.0), 5.56);
        assert_eq!(entry.encode("A\u{2026}"), vec![b'A', 0x85]);
    }

    #[test]
    fn courier_is_monospaced() {
        let widths = standard_widths("Courier");
        assert!(widths.iter().all(|&w| w == 600.0));
    }
}
