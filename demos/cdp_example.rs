//! Basic example demonstrating selector resolution against a static document

use rfseeker::html_loader::load_document;
use rfseeker::{CoreConfig, DocumentContext};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("rfseeker - selector example\n");

    let html = r#"<html><body>
        <div id="app">
            <button class="primary" data-testid="submit">Submit</button>
            <button class="secondary">Cancel</button>
        </div>
    </body></html>"#;

    println!("Loading document ({} bytes)\n", html.len());
    let dom = load_document(html);
    let root = dom.root();

    let config = CoreConfig::default();
    println!("Creating context with config:");
    println!("  stable_raf_count: {}", config.stable_raf_count);
    println!("  browser_name: {}\n", config.browser_name);

    let ctx = DocumentContext::new(config);
    println!("Known engines: {:?}\n", ctx.engine_names());

    let selector = "css=#app >> css=button.primary";
    println!("Resolving: {selector}");
    match ctx.query_selector(&dom, root, selector, true)? {
        Some(id) => println!("Matched: {}\n", rfseeker::action::preview(&dom, id)),
        None => println!("No match\n"),
    }

    let all_buttons = "css=#app >> css=button";
    println!("Resolving all: {all_buttons}");
    for id in ctx.query_selector_all(&dom, root, all_buttons)? {
        println!("  {}", rfseeker::action::preview(&dom, id));
    }

    println!("\nDone!");
    Ok(())
}
