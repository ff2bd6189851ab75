//! Parser-surface tests exercised through the crate's public `selector`
//! module rather than the module-internal unit tests.

use rfseeker::selector::parse;
use rfseeker::Error;

const ENGINES: &[&str] = &["css", "css:light", "xpath", "xpath:light", "text", "text:light", "id", "nth", "visible"];

#[test]
fn bare_body_defaults_to_css() {
    let parsed = parse("ul#list > li", ENGINES).unwrap();
    assert_eq!(parsed.parts.len(), 1);
    assert_eq!(parsed.parts[0].engine, "css");
    assert_eq!(parsed.parts[0].body, "ul#list > li");
}

#[test]
fn chain_with_quoted_body_keeps_embedded_chain_separator() {
    let parsed = parse(r#"div >> text="next >> step""#, ENGINES).unwrap();
    assert_eq!(parsed.parts.len(), 2);
    assert_eq!(parsed.parts[1].body, "next >> step");
}

#[test]
fn capture_mark_is_recorded_on_its_part() {
    let parsed = parse("section >> *css=button.primary", ENGINES).unwrap();
    assert!(!parsed.parts[0].capture);
    assert!(parsed.parts[1].capture);
    assert_eq!(parsed.capture_index(), Some(1));
}

#[test]
fn nth_after_capture_is_rejected() {
    let err = parse("*div >> button >> nth=0", ENGINES).unwrap_err();
    assert!(matches!(err, Error::NthAfterCapture));
}

#[test]
fn nth_before_capture_is_accepted() {
    let parsed = parse("li >> nth=2 >> *css=span", ENGINES).unwrap();
    assert_eq!(parsed.parts.len(), 3);
    assert!(parsed.parts[2].capture);
}

#[test]
fn unknown_engine_name_is_rejected() {
    let err = parse("totally-unknown=foo", ENGINES).unwrap_err();
    assert!(matches!(err, Error::UnknownEngine(name) if name == "totally-unknown"));
}

#[test]
fn light_variants_are_distinct_known_engines() {
    let parsed = parse("css:light=div", ENGINES).unwrap();
    assert_eq!(parsed.parts[0].engine, "css:light");
}
