//! Minimal example demonstrating fill() and expect() against a static fixture

use rfseeker::dom::NoopEventSink;
use rfseeker::expect::{expect, ExpectExpression, ExpectParams};
use rfseeker::html_loader::load_document;
use rfseeker::selector::text::{ExpectedTextMatcher, TextMatcher};
use rfseeker::{CoreConfig, DocumentContext};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("rfseeker - fill/expect example\n");

    let html = r#"<html><head><title>RF Minimal</title></head>
        <body><input id="name" type="text" /></body></html>"#;

    let mut dom = load_document(html);
    let root = dom.root();
    let ctx = DocumentContext::new(CoreConfig::default());

    let input = ctx
        .query_selector(&dom, root, "#name", true)?
        .expect("input present in fixture");

    let mut sink = NoopEventSink;
    let outcome = rfseeker::action::fill(&mut dom, &mut sink, input, "Hello RF")?;
    println!("fill outcome: {outcome:?}");

    let expr = ExpectExpression::parse("to.have.value")?;
    let matcher = ExpectedTextMatcher { matcher: TextMatcher::Lax("Hello RF".to_string()), normalize_whitespace: true };
    let params = ExpectParams { expected_text: vec![matcher], ..Default::default() };
    let result = expect(&dom, &expr, &[input], &params)?;
    println!("pass={} received={:?}", result.pass, result.received);

    println!("Done.");
    Ok(())
}
