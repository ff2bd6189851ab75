//! End-to-end scenarios exercising the selector/action-readiness stack
//! together, one test per documented scenario.

use std::thread::sleep;
use std::time::Duration;

use rfseeker::action::{self, HitResult, StabilityState};
use rfseeker::dom::{Dom, NoopEventSink, Rect};
use rfseeker::expect::{expect, ExpectExpression, ExpectParams};
use rfseeker::html_loader::load_document;
use rfseeker::selector::text::{ExpectedTextMatcher, TextMatcher};
use rfseeker::{CoreConfig, DocumentContext, Error};

fn ctx() -> DocumentContext {
    DocumentContext::new(CoreConfig::default())
}

/// S1: chained css + text + nth resolves the second element across the
/// flattened match order, not the second child of the second `div.list`.
#[test]
fn s1_chained_css_text_nth() {
    let html = r#"<html><body>
        <div class="list">
            <span id="a1">Hello</span>
            <span id="a2">Hello</span>
        </div>
        <div class="list">
            <span id="b1">Hello</span>
            <span id="b2">Hello</span>
        </div>
    </body></html>"#;
    let dom = load_document(html);
    let root = dom.root();
    let ctx = ctx();

    let found = ctx.query_selector(&dom, root, "div.list >> text=Hello >> nth=1", true).unwrap().unwrap();
    assert_eq!(dom.node(found).attribute("id"), Some("a2"));
}

/// S2: a capture mark redirects the resolved element to an earlier part.
#[test]
fn s2_capture_mark_returns_earlier_part() {
    let html = r#"<html><body><section id="sec"><button>Go</button></section></body></html>"#;
    let dom = load_document(html);
    let root = dom.root();
    let ctx = ctx();

    let found = ctx.query_selector(&dom, root, "*section >> button", true).unwrap().unwrap();
    assert_eq!(dom.node(found).tag_name(), Some("section"));
}

/// S3: strict mode raises on more than one match.
#[test]
fn s3_strict_violation_on_multiple_matches() {
    let html = r#"<html><body><p class="x">one</p><p class="x">two</p></body></html>"#;
    let dom = load_document(html);
    let root = dom.root();
    let ctx = ctx();

    let err = ctx.query_selector(&dom, root, "p.x", true).unwrap_err();
    assert!(matches!(err, Error::StrictViolation { count: 2, .. }));
    let message = err.to_string();
    assert!(message.starts_with("strict mode violation: \"p.x\" resolved to 2 elements:"));
    assert!(message.contains("selector:"), "strict-violation previews should include a reverse-engineered selector");
}

/// S4: stability wait continues through a rect change, then resolves on the
/// second same-rect frame afterward (`stableRafCount` = 2).
#[test]
fn s4_stability_continues_through_a_change() {
    let mut state = StabilityState::new(2);
    let settled = Rect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
    let moved = Rect { x: 0.0, y: 0.0, width: 12.0, height: 10.0 };

    // First tick is always skipped outright.
    assert!(!state.tick(settled));
    sleep(Duration::from_millis(20));
    assert!(!state.tick(settled));
    sleep(Duration::from_millis(20));
    // A rect change resets the run, so the frame right after it can't have
    // settled yet.
    assert!(!state.tick(moved));
    sleep(Duration::from_millis(20));
    assert!(state.tick(moved));
}

/// S5: filling a number input rejects non-numeric text; a numeric string
/// passes validation but is still typed in key-by-key by the controller, so
/// `fill` only selects the current text and returns `needsinput`.
#[test]
fn s5_fill_number_input() {
    let html = r#"<html><body><input id="n" type="number" /></body></html>"#;
    let mut dom = load_document(html);
    let root = dom.root();
    let ctx = ctx();
    let mut sink = NoopEventSink;

    let input = ctx.query_selector(&dom, root, "#n", true).unwrap().unwrap();

    let err = action::fill(&mut dom, &mut sink, input, "abc").unwrap_err();
    assert!(matches!(err, Error::FillError(msg) if msg.contains("Cannot type text into input[type=number]")));

    let outcome = action::fill(&mut dom, &mut sink, input, "12").unwrap();
    assert_eq!(format!("{outcome:?}"), "NeedsInput");
    assert_eq!(dom.value(input), None, "the value is typed by the controller, never assigned directly");
    assert!(dom.selection(input).is_some(), "select_text must install a selection on the input");
}

/// S6: `to.have.text` with `normalizeWhiteSpace` collapses internal
/// whitespace before comparing; without it, the raw text does not match.
#[test]
fn s6_expect_text_normalizes_whitespace() {
    let mut dom = Dom::new();
    let root = dom.root();
    let div = dom.create_element(root, "div");
    dom.create_text(div, "  hello   world  ");

    let expr = ExpectExpression::parse("to.have.text").unwrap();

    let normalized = ExpectedTextMatcher { matcher: TextMatcher::Lax("hello world".to_string()), normalize_whitespace: true };
    let params = ExpectParams { expected_text: vec![normalized], ..Default::default() };
    let result = expect(&dom, &expr, &[div], &params).unwrap();
    assert!(result.pass);

    let unnormalized = ExpectedTextMatcher { matcher: TextMatcher::Strict("hello world".to_string()), normalize_whitespace: false };
    let params = ExpectParams { expected_text: vec![unnormalized], ..Default::default() };
    let result = expect(&dom, &expr, &[div], &params).unwrap();
    assert!(!result.pass);
}

/// S7: a dialog overlay sitting in front of a button makes
/// `check_hit_target_at` report the overlay as blocking, and since the hit
/// chain only reconnects with the button's ancestry one level down (at its
/// wrapping container, not at the button itself), the message names the
/// overlay's subtree per the mandated "... from <...> subtree" wording.
#[test]
fn s7_hit_target_blocked_by_overlay() {
    let html = r#"<html><body>
        <div id="wrap"><button id="b">Click</button></div>
        <div class="dialog" id="dialog">Overlay</div>
    </body></html>"#;
    let mut dom = load_document(html);
    let root = dom.root();
    let ctx = ctx();

    let button = ctx.query_selector(&dom, root, "#b", true).unwrap().unwrap();
    let wrap = ctx.query_selector(&dom, root, "#wrap", true).unwrap().unwrap();
    let dialog = ctx.query_selector(&dom, root, "css=div.dialog", true).unwrap().unwrap();

    // Give the dialog a shadow root so the hit-test loop descends into a
    // second scope and reports a two-element chain: [dialog, wrap].
    dom.attach_shadow_root(dialog);

    let calls = std::cell::Cell::new(0);
    let result = action::check_hit_target_at(&dom, button, (5.0, 5.0), |_dom, _scope, _point| {
        let n = calls.get();
        calls.set(n + 1);
        if n == 0 {
            Some(dialog)
        } else {
            Some(wrap)
        }
    });

    match result {
        HitResult::Blocked { description } => {
            assert!(description.contains("dialog"), "expected the overlay to be named as the blocker: {description}");
            assert!(description.contains("from <div"), "expected the mandated \"from <...> subtree\" wording: {description}");
            assert!(description.contains("subtree"), "expected the mandated \"from <...> subtree\" wording: {description}");
        }
        HitResult::Done => panic!("expected the overlay to block the hit test"),
    }
}
