mod common;

use offer_composer::charts::{self, SlotContent};
use offer_composer::{ChartLayout, Diagnostic, FontRegistry, render_chart_pages};

use common::{chart, charts, page_count, png};

fn slots_per_page(pages: &[offer_composer::ChartPage]) -> Vec<usize> {
    pages.iter().map(|p| p.slots.len()).collect()
}

#[test]
fn three_charts_one_per_page() {
    let pages = charts::generate(&charts(3), ChartLayout::OnePerPage);
    assert_eq!(slots_per_page(&pages), vec![1, 1, 1]);

    let pdf = render_chart_pages(&pages, &FontRegistry::new()).unwrap();
    assert_eq!(page_count(&pdf), 3);
}

#[test]
fn five_charts_two_per_page() {
    let pages = charts::generate(&charts(5), ChartLayout::TwoPerPage);
    assert_eq!(slots_per_page(&pages), vec![2, 2, 1]);

    let pdf = render_chart_pages(&pages, &FontRegistry::new()).unwrap();
    assert_eq!(page_count(&pdf), 3);
}

#[test]
fn nine_charts_four_per_page() {
    let pages = charts::generate(&charts(9), ChartLayout::FourPerPage);
    assert_eq!(slots_per_page(&pages), vec![4, 4, 1]);
    assert_eq!(pages[2].number, 3);
}

#[test]
fn order_is_row_major_then_page_major() {
    let pages = charts::generate(&charts(6), ChartLayout::FourPerPage);
    let keys: Vec<&str> = pages
        .iter()
        .flat_map(|p| &p.slots)
        .map(|s| match &s.content {
            SlotContent::Chart { key, .. } | SlotContent::Blank { key, .. } => key.as_str(),
        })
        .collect();
    assert_eq!(keys, vec!["c0", "c1", "c2", "c3", "c4", "c5"]);

    let first = &pages[0].slots;
    assert_eq!(first[0].bounds.top, first[1].bounds.top);
    assert!(first[2].bounds.top > first[0].bounds.top);
}

#[test]
fn empty_chart_list_produces_no_pages() {
    assert!(charts::generate(&[], ChartLayout::TwoPerPage).is_empty());
    assert!(render_chart_pages(&[], &FontRegistry::new()).is_err());
}

#[test]
fn corrupt_chart_leaves_blank_slot_and_continues() {
    let mut assets = charts(4);
    assets[1] = chart("broken", Some(b"\x89PNG\r\n\x1a\nnot really".to_vec()));
    let pages = charts::generate(&assets, ChartLayout::FourPerPage);

    assert_eq!(pages.len(), 1);
    assert!(matches!(pages[0].slots[1].content, SlotContent::Blank { .. }));
    for i in [0, 2, 3] {
        assert!(matches!(pages[0].slots[i].content, SlotContent::Chart { .. }));
    }

    let diagnostics = charts::diagnostics(&pages);
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(&diagnostics[0], Diagnostic::Asset { key, .. } if key == "broken"));

    let pdf = render_chart_pages(&pages, &FontRegistry::new()).unwrap();
    assert_eq!(page_count(&pdf), 1);
}

#[test]
fn unusable_chart_slot_shows_only_its_caption() {
    let pages = charts::generate(&[chart("missing", None)], ChartLayout::OnePerPage);
    let pdf = render_chart_pages(&pages, &FontRegistry::new()).unwrap();
    let text = common::stream_text(&pdf);

    assert!(text.contains("Chart missing"));
    assert!(!text.contains("Description of missing"));
    assert!(!text.contains(" re\n"), "no frame expected:\n{text}");
    assert!(!text.contains(" Do"), "no image expected:\n{text}");
}

#[test]
fn images_are_fitted_inside_their_slot() {
    let assets = vec![chart("wide", Some(png(400, 50))), chart("tall", Some(png(20, 300)))];
    let pages = charts::generate(&assets, ChartLayout::TwoPerPage);
    for slot in &pages[0].slots {
        let SlotContent::Chart { image, .. } = &slot.content else {
            panic!("expected chart in slot {}", slot.index);
        };
        let (w, h) = image.pixel_size();
        let area = slot.bounds.image_box();
        let placed = area.fit(w, h);
        assert!(placed.width <= area.width + 0.01);
        assert!(placed.height <= area.height + 0.01);
        let ratio = placed.width / placed.height;
        assert!((ratio - w as f32 / h as f32).abs() < 0.01);
    }
}

#[test]
fn captions_and_descriptions_are_drawn() {
    let pages = charts::generate(&charts(1), ChartLayout::OnePerPage);
    let pdf = render_chart_pages(&pages, &FontRegistry::new()).unwrap();
    let text = common::stream_text(&pdf);
    assert!(text.contains("Chart c0"));
    assert!(text.contains("Description of c0"));
}

#[test]
fn unknown_layout_falls_back_to_one_per_page() {
    assert_eq!(ChartLayout::parse_lossy("six_per_page"), ChartLayout::OnePerPage);
    assert_eq!(ChartLayout::parse_lossy("four-per-page"), ChartLayout::FourPerPage);
    assert_eq!(ChartLayout::parse_lossy("2"), ChartLayout::TwoPerPage);
}
