use crate::fonts::FontEntry;
use crate::model::Alignment;

const ELLIPSIS: char = '\u{2026}';

/// Left edge of a line of `width` anchored at `x` with the given alignment.
pub(super) fn aligned_x(alignment: Alignment, x: f32, width: f32) -> f32 {
    match alignment {
        Alignment::Left => x,
        Alignment::Center => x - width / 2.0,
        Alignment::Right => x - width,
    }
}

fn ellipsis_for(entry: &FontEntry) -> &'static str {
    if entry.has_char(ELLIPSIS) {
        "\u{2026}"
    } else {
        "..."
    }
}

/// Collapse `text` onto one line: whitespace controls become spaces, other
/// control characters are removed.
pub(super) fn single_line(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\t' | '\n' | '\r' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Cut `text` so that it fits `max_width`, marking the cut with an ellipsis.
pub(super) fn truncate_to_width(entry: &FontEntry, text: &str, size: f32, max_width: f32) -> String {
    if entry.text_width(text, size) <= max_width {
        return text.to_string();
    }
    let ellipsis = ellipsis_for(entry);
    let budget = max_width - entry.text_width(ellipsis, size);
    if budget <= 0.0 {
        return String::new();
    }
    let mut out = String::new();
    let mut width = 0.0f32;
    for ch in text.chars() {
        let w = entry.char_width_1000(ch) * size / 1000.0;
        if width + w > budget {
            break;
        }
        out.push(ch);
        width += w;
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push_str(ellipsis);
    out
}

/// Greedy word wrap at `max_width`. Words wider than a line are broken at
/// character boundaries. Explicit newlines always start a new line.
pub(super) fn wrap_to_width(entry: &FontEntry, text: &str, size: f32, max_width: f32) -> Vec<String> {
    let space_width = entry.text_width(" ", size);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0.0f32;

        for word in paragraph.split_whitespace() {
            let word_width = entry.text_width(word, size);

            if word_width > max_width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let mut chunk_width = 0.0f32;
                for ch in word.chars() {
                    let w = entry.char_width_1000(ch) * size / 1000.0;
                    if chunk_width + w > max_width && !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                        chunk_width = 0.0;
                    }
                    current.push(ch);
                    chunk_width += w;
                }
                current_width = chunk_width;
                continue;
            }

            if current.is_empty() {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + space_width + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += space_width + word_width;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
                current_width = word_width;
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::Glyphs;
    use pdf_writer::Ref;

    /// Every char 500 units wide: 5pt per char at size 10.
    fn fixed_entry() -> FontEntry {
        FontEntry {
            pdf_name: "F1".into(),
            font_ref: Ref::new(1),
            glyphs: Glyphs::WinAnsi(vec![500.0; 224]),
        }
    }

    #[test]
    fn alignment_anchors() {
        assert_eq!(aligned_x(Alignment::Left, 100.0, 40.0), 100.0);
        assert_eq!(aligned_x(Alignment::Center, 100.0, 40.0), 80.0);
        assert_eq!(aligned_x(Alignment::Right, 100.0, 40.0), 60.0);
    }

    #[test]
    fn truncation_keeps_short_text() {
        let e = fixed_entry();
        assert_eq!(truncate_to_width(&e, "short", 10.0, 100.0), "short");
    }

    #[test]
    fn truncation_appends_ellipsis_within_width() {
        let e = fixed_entry();
        let out = truncate_to_width(&e, "abcdefghijklmnop", 10.0, 40.0);
        assert!(out.ends_with('\u{2026}'));
        assert!(e.text_width(&out, 10.0) <= 40.0);
        assert_eq!(out, "abcdefg\u{2026}");
    }

    #[test]
    fn wrap_breaks_on_words_and_long_words() {
        let e = fixed_entry();
        let lines = wrap_to_width(&e, "aaaa bbbb cccccccccccc", 10.0, 40.0);
        assert_eq!(lines, vec!["aaaa", "bbbb", "cccccccc", "cccc"]);
    }

    #[test]
    fn single_line_replaces_control_whitespace() {
        assert_eq!(single_line("Musterstr. 1\r\n12345\tBerlin\u{0}"), "Musterstr. 1  12345 Berlin");
    }

    #[test]
    fn wrap_honours_newlines() {
        let e = fixed_entry();
        let lines = wrap_to_width(&e, "one\ntwo", 10.0, 500.0);
        assert_eq!(lines, vec!["one", "two"]);
    }
}
