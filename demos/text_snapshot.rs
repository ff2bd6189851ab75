//! Text content example - demonstrates extracting an element's text content

use rfseeker::html_loader::load_document;
use rfseeker::{CoreConfig, DocumentContext};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("rfseeker - text content example\n");

    let documents = vec![
        r#"<html><head><title>Home</title></head><body><main id="content"><p>Welcome.</p></main></body></html>"#,
        r#"<html><head><title>About</title></head><body><main id="content"><p>About this crate.</p></main></body></html>"#,
    ];

    let ctx = DocumentContext::new(CoreConfig::default());

    for html in documents {
        println!("{}", "=".repeat(60));
        let dom = load_document(html);
        let root = dom.root();

        let title_id = ctx.query_selector(&dom, root, "css=title", true)?;
        if let Some(id) = title_id {
            println!("Title: {}", dom.text_content(id));
        }

        let content_id = ctx.query_selector(&dom, root, "#content", true)?;
        if let Some(id) = content_id {
            println!("Content text:");
            println!("{}", "-".repeat(60));
            println!("{}", dom.text_content(id));
        }
        println!("{}\n", "=".repeat(60));
    }

    println!("Done!");
    Ok(())
}
