mod common;

use std::sync::Arc;

use offer_composer::{
    Alignment, CoordinateLoader, Overflow, TemplateStore, canvas_y, parse_page,
};
use serde_json::json;

use common::{Fixture, VARIANT};

#[test]
fn loads_full_definition() {
    let fixture = Fixture::new(1);
    fixture.write_map(
        VARIANT,
        1,
        &json!({
            "page_width": 595.0, "page_height": 842.0,
            "fields": [
                {"name": "customer_name", "x": 50, "y": 120, "font": "Helvetica-Bold",
                 "size": 12, "alignment": "left", "max_width": 200, "required": true,
                 "aliases": ["kunde_name"], "category": "customer", "color": "#000000",
                 "overflow": "truncate"},
                {"name": "total_price", "x": 545, "y": 700, "alignment": "right",
                 "overflow": "wrap", "max_width": 120}
            ],
            "graphics": [
                {"name": "autarky", "x": 300, "y": 588.5, "outer_radius": 40,
                 "inner_radius": 28, "color": "#2E86C1", "value_key": "autarky_percent"}
            ]
        }),
    );

    let loader = CoordinateLoader::new(&fixture.config.coordinates_dir);
    let map = loader.load(VARIANT, 1).unwrap();
    assert_eq!(map.fields.len(), 2);
    assert_eq!(map.fields[0].aliases, vec!["kunde_name".to_string()]);
    assert_eq!(map.fields[1].alignment, Alignment::Right);
    assert_eq!(map.fields[1].overflow, Overflow::Wrap);
    assert_eq!(map.fields[1].font, "Helvetica");
    assert_eq!(map.graphics[0].value_key(), "autarky_percent");
    assert_eq!(canvas_y(map.graphics[0].y, map.page_height), 253.5);
}

#[test]
fn repeated_loads_share_one_map() {
    let fixture = Fixture::new(2);
    let loader = CoordinateLoader::new(&fixture.config.coordinates_dir);
    let a = loader.load(VARIANT, 2).unwrap();
    let b = loader.load(VARIANT, 2).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn missing_definition_is_a_config_error() {
    let fixture = Fixture::new(1);
    let loader = CoordinateLoader::new(&fixture.config.coordinates_dir);
    assert!(loader.load(VARIANT, 9).unwrap_err().is_config());
    assert!(loader.load("premium", 1).unwrap_err().is_config());
}

#[test]
fn structurally_invalid_definitions_are_rejected() {
    let cases = [
        r#"{"fields": [{"name": "a", "x": 1, "y": 1}, {"name": "a", "x": 2, "y": 2}]}"#,
        r#"{"fields": [{"name": "a", "x": "left", "y": 1}]}"#,
        r#"{"fields": [{"name": "a", "x": 1, "y": 1, "alignment": "justify"}]}"#,
        r#"{"fields": [{"name": "a", "x": 1, "y": 1, "size": -3}]}"#,
        r#"{"graphics": [{"name": "g", "x": 1, "y": 1, "outer_radius": 10, "inner_radius": 10}]}"#,
        r#"{"fields": [], "unexpected": true}"#,
        r#"{"fields": [{"name": "a", "x": 1, "y": 1, "requried": true}]}"#,
        r#"{"fields": [{"name": "a", "x": 1, "y": 1, "alignement": "center"}]}"#,
        r##"{"graphics": [{"name": "g", "x": 1, "y": 1, "outer_radius": 10, "inner_radius": 5, "colour": "#fff"}]}"##,
        r#"not json"#,
    ];
    for text in cases {
        let err = parse_page(VARIANT, 1, text).unwrap_err();
        assert!(err.is_config(), "{text}: {err}");
    }
}

#[test]
fn load_variant_fails_on_first_bad_page() {
    let fixture = Fixture::new(3);
    fixture.write_map(VARIANT, 3, &json!({"fields": [{"name": "a"}]}));
    let loader = CoordinateLoader::new(&fixture.config.coordinates_dir);
    assert_eq!(loader.load(VARIANT, 1).unwrap().page, 1);
    assert!(loader.load_variant(VARIANT, 3).is_err());
}

#[test]
fn variant_cannot_escape_configured_directories() {
    let fixture = Fixture::new(1);
    let coords = CoordinateLoader::new(&fixture.config.coordinates_dir);
    let templates = TemplateStore::new(&fixture.config.templates_dir);

    // Both resolve to files that exist on disk
    let escaped = format!("../coords/{VARIANT}");
    assert!(coords.load(&escaped, 1).unwrap_err().is_config());
    let escaped = format!("../templates/{VARIANT}");
    assert!(templates.load(&escaped, 1).unwrap_err().is_config());

    assert!(coords.load(VARIANT, 1).is_ok());
    assert!(templates.load(VARIANT, 1).is_ok());
}
