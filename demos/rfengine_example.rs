//! Demonstrates a chained selector with an `nth` part and a capture mark

use rfseeker::html_loader::load_document;
use rfseeker::{CoreConfig, DocumentContext};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let html = r#"<html><body>
        <ul id="list">
            <li class="item">one</li>
            <li class="item">two</li>
            <li class="item">three</li>
        </ul>
    </body></html>"#;

    let dom = load_document(html);
    let root = dom.root();
    let ctx = DocumentContext::new(CoreConfig::default());

    let selector = "css=#list >> css=li.item >> nth=1";
    let second = ctx.query_selector(&dom, root, selector, true)?;
    match second {
        Some(id) => println!("second item: {}", dom.text_content(id)),
        None => println!("no match"),
    }

    // a capture mark (`*`) redirects the match to an earlier part in the
    // chain instead of the last one; here it resolves to the list itself.
    let captured = "*css=#list >> css=li.item";
    let all_items = ctx.query_selector_all(&dom, root, captured)?;
    println!("captured {} distinct list(s) containing .item", all_items.len());

    Ok(())
}
