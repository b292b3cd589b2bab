use std::f32::consts::{FRAC_PI_2, TAU};

use pdf_writer::{Content, Name, Str};

use crate::error::Error;
use crate::fonts::FontSet;

/// Drawing surface with a top-left origin: y grows downwards.
/// Converts to PDF user space (bottom-left origin) on every operation.
pub(crate) struct Canvas<'a> {
    content: Content,
    page_height: f32,
    fonts: &'a FontSet,
    fill: Option<[u8; 3]>,
}

/// Parse `#RRGGBB`, `RRGGBB` or `0xRRGGBB`.
pub(crate) fn parse_color(spec: &str) -> Result<[u8; 3], Error> {
    let s = spec.trim();
    let hex = s
        .strip_prefix('#')
        .or_else(|| s.strip_prefix("0x"))
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Render(format!("invalid color '{spec}'")));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|_| Error::Render(format!("invalid color '{spec}'")))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(page_height: f32, fonts: &'a FontSet) -> Self {
        Self {
            content: Content::new(),
            page_height,
            fonts,
            fill: None,
        }
    }

    fn pdf_y(&self, y: f32) -> f32 {
        self.page_height - y
    }

    fn set_fill(&mut self, color: [u8; 3]) {
        if self.fill != Some(color) {
            let [r, g, b] = color;
            self.content
                .set_fill_rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
            self.fill = Some(color);
        }
    }

    pub(crate) fn text_width(&self, font: &str, size: f32, text: &str) -> f32 {
        self.fonts.get(font).text_width(text, size)
    }

    /// Draw one line of text with its left edge at `x` and baseline at `baseline_y`.
    pub(crate) fn text(
        &mut self,
        font: &str,
        size: f32,
        x: f32,
        baseline_y: f32,
        text: &str,
        color: [u8; 3],
    ) {
        if text.is_empty() {
            return;
        }
        let entry = self.fonts.get(font);
        let bytes = entry.encode(text);
        let y = self.pdf_y(baseline_y);
        self.set_fill(color);
        self.content.begin_text();
        self.content.set_font(Name(entry.pdf_name.as_bytes()), size);
        self.content.next_line(x, y);
        self.content.show(Str(&bytes));
        self.content.end_text();
    }

    /// Place an image XObject into the box whose top-left corner is (x, top).
    pub(crate) fn image(&mut self, name: &str, x: f32, top: f32, width: f32, height: f32) {
        let bottom = self.pdf_y(top + height);
        self.content.save_state();
        self.content.transform([width, 0.0, 0.0, height, x, bottom]);
        self.content.x_object(Name(name.as_bytes()));
        self.content.restore_state();
    }

    /// Ring (donut) centred at (cx, cy): a full track ring plus a clockwise
    /// arc from twelve o'clock covering `fraction` of the circle.
    pub(crate) fn ring(
        &mut self,
        cx: f32,
        cy: f32,
        outer: f32,
        inner: f32,
        fraction: f32,
        fill: [u8; 3],
        track: [u8; 3],
    ) {
        let cy = self.pdf_y(cy);
        let fraction = fraction.clamp(0.0, 1.0);

        self.set_fill(track);
        self.annulus(cx, cy, outer, inner);

        if fraction <= 0.0 {
            return;
        }
        self.set_fill(fill);
        if fraction >= 0.9999 {
            self.annulus(cx, cy, outer, inner);
            return;
        }

        let start = FRAC_PI_2;
        let sweep = -fraction * TAU;
        let end = start + sweep;
        self.content
            .move_to(cx + outer * start.cos(), cy + outer * start.sin());
        arc(&mut self.content, cx, cy, outer, start, sweep);
        if inner > 0.0 {
            self.content.line_to(cx + inner * end.cos(), cy + inner * end.sin());
            arc(&mut self.content, cx, cy, inner, end, -sweep);
        } else {
            self.content.line_to(cx, cy);
        }
        self.content.close_path();
        self.content.fill_nonzero();
    }

    fn annulus(&mut self, cx: f32, cy: f32, outer: f32, inner: f32) {
        self.content.move_to(cx + outer, cy);
        arc(&mut self.content, cx, cy, outer, 0.0, TAU);
        self.content.close_path();
        if inner > 0.0 {
            self.content.move_to(cx + inner, cy);
            arc(&mut self.content, cx, cy, inner, 0.0, TAU);
            self.content.close_path();
        }
        self.content.fill_even_odd();
    }

    pub(crate) fn finish(self) -> Content {
        self.content
    }
}

/// Append a circular arc as cubic Béziers, at most a quarter turn each.
/// The current point must already be the arc's start.
fn arc(content: &mut Content, cx: f32, cy: f32, r: f32, start: f32, sweep: f32) {
    let segments = (sweep.abs() / FRAC_PI_2).ceil().max(1.0) as usize;
    let delta = sweep / segments as f32;
    let k = 4.0 / 3.0 * (delta / 4.0).tan();
    let mut a0 = start;
    for _ in 0..segments {
        let a1 = a0 + delta;
        let (s0, c0) = a0.sin_cos();
        let (s1, c1) = a1.sin_cos();
        content.cubic_to(
            cx + r * (c0 - k * s0),
            cy + r * (s0 + k * c0),
            cx + r * (c1 + k * s1),
            cy + r * (s1 - k * c1),
            cx + r * c1,
            cy + r * s1,
        );
        a0 = a1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_color_notations() {
        assert_eq!(parse_color("#2E86C1").unwrap(), [0x2E, 0x86, 0xC1]);
        assert_eq!(parse_color("0xff0000").unwrap(), [255, 0, 0]);
        assert_eq!(parse_color(" 00ff00 ").unwrap(), [0, 255, 0]);
    }

    #[test]
    fn rejects_corrupt_colors() {
        for bad in ["", "#12345", "#GG0000", "red", "#1234567"] {
            assert!(parse_color(bad).is_err(), "{bad}");
        }
    }
}
