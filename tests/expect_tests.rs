//! Assertion-core tests covering a representative slice of the `to.be.*`/
//! `to.have.*` expression table plus `deep_equals` edge cases.

use serde_json::json;

use rfseeker::dom::Dom;
use rfseeker::expect::{deep_equals, expect, ExpectExpression, ExpectParams};
use rfseeker::html_loader::load_document;
use rfseeker::selector::text::{ExpectedTextMatcher, TextMatcher};

fn matcher(s: &str) -> ExpectedTextMatcher {
    ExpectedTextMatcher { matcher: TextMatcher::Lax(s.to_string()), normalize_whitespace: true }
}

#[test]
fn to_be_checked_reads_the_checkbox_state() {
    // The HTML `checked` attribute is static markup; the live checked flag
    // is a separate piece of `Dom` state the host toggles, same as a real
    // DOM's `.checked` property diverges from the `checked` attribute.
    let html = r#"<html><body><input id="c" type="checkbox" /></body></html>"#;
    let mut dom = load_document(html);
    let root = dom.root();
    let checkbox = dom.descendants(root, false).into_iter().find(|&n| dom.node(n).tag_name() == Some("input")).unwrap();
    dom.set_checked(checkbox, true);

    let expr = ExpectExpression::parse("to.be.checked").unwrap();
    let result = expect(&dom, &expr, &[checkbox], &ExpectParams::default()).unwrap();
    assert!(result.pass);
}

#[test]
fn to_have_attribute_matches_against_the_named_attribute() {
    let html = r#"<html><body><a id="link" href="https://example.test">go</a></body></html>"#;
    let dom = load_document(html);
    let root = dom.root();
    let a = dom.descendants(root, false).into_iter().find(|&n| dom.node(n).tag_name() == Some("a")).unwrap();

    let expr = ExpectExpression::parse("to.have.attribute").unwrap();
    let params = ExpectParams {
        expression_arg: Some("href".to_string()),
        expected_text: vec![matcher("https://example.test")],
        ..Default::default()
    };
    let result = expect(&dom, &expr, &[a], &params).unwrap();
    assert!(result.pass);
}

#[test]
fn to_have_class_checks_the_raw_class_attribute() {
    let html = r#"<html><body><div id="d" class="card featured"></div></body></html>"#;
    let dom = load_document(html);
    let root = dom.root();
    let div = dom.descendants(root, false).into_iter().find(|&n| dom.node(n).tag_name() == Some("div")).unwrap();

    let expr = ExpectExpression::parse("to.have.class").unwrap();
    let params = ExpectParams { expected_text: vec![matcher("card featured")], ..Default::default() };
    let result = expect(&dom, &expr, &[div], &params).unwrap();
    assert!(result.pass);
}

#[test]
fn to_have_count_checks_the_resolved_element_count() {
    let dom = Dom::new();
    let expr = ExpectExpression::HaveCount;
    let params = ExpectParams { expected_number: Some(3), ..Default::default() };
    let result = expect(&dom, &expr, &[dom.root(), dom.root(), dom.root()], &params).unwrap();
    assert!(result.pass);
    assert_eq!(result.received.as_deref(), Some("3"));
}

#[test]
fn negation_flips_a_false_match_to_pass() {
    let html = r#"<html><body><div id="d">hello</div></body></html>"#;
    let dom = load_document(html);
    let root = dom.root();
    let div = dom.descendants(root, false).into_iter().find(|&n| dom.node(n).tag_name() == Some("div")).unwrap();

    let expr = ExpectExpression::parse("to.have.text").unwrap();
    let params = ExpectParams { expected_text: vec![matcher("goodbye")], is_not: true, ..Default::default() };
    let result = expect(&dom, &expr, &[div], &params).unwrap();
    assert!(result.pass);
}

#[test]
fn unknown_expression_is_rejected() {
    let err = ExpectExpression::parse("to.be.purple").unwrap_err();
    assert!(matches!(err, rfseeker::Error::UnknownExpectMatcher(e) if e == "to.be.purple"));
}

#[test]
fn deep_equals_compares_nested_arrays_of_objects() {
    let a = json!([{"id": 1, "tags": ["x", "y"]}, {"id": 2, "tags": []}]);
    let b = json!([{"tags": ["x", "y"], "id": 1}, {"id": 2, "tags": []}]);
    let c = json!([{"id": 1, "tags": ["x"]}, {"id": 2, "tags": []}]);
    assert!(deep_equals(&a, &b));
    assert!(!deep_equals(&a, &c));
}

#[test]
fn deep_equals_compares_objects_by_key_set() {
    assert!(deep_equals(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
    assert!(!deep_equals(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
}
