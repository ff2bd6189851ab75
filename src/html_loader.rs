//! Loads a static HTML document into a [`Dom`] arena.
//!
//! This is how a host with no live layout engine (the CLI, or a test
//! fixture) gets elements into the arena in the first place: parse with
//! `scraper`'s `html5ever`-backed tree, then walk it once converting each
//! node into the mutable arena representation the rest of this crate
//! operates on. Every element gets an empty `Rect` by default — a real
//! embedding (e.g. a CDP-driven controller) is expected to push layout
//! updates onto the resulting `Dom` via `set_rect`/`set_display_none`/etc.
//! before running any action-readiness waits.

use scraper::{Html, Node as ScraperNode};

use crate::dom::Dom;

/// Parses `html` as a full document and returns a populated [`Dom`].
pub fn load_document(html: &str) -> Dom {
    let parsed = Html::parse_document(html);
    let mut dom = Dom::new();
    let root = dom.root();
    for child in parsed.tree.root().children() {
        copy_into(&mut dom, root, child);
    }
    dom
}

fn copy_into(dom: &mut Dom, parent: crate::dom::NodeId, scraper_node: ego_tree::NodeRef<ScraperNode>) {
    match scraper_node.value() {
        ScraperNode::Element(el) => {
            let tag = el.name();
            let id = dom.create_element(parent, tag);
            for (name, value) in el.attrs() {
                dom.set_attribute(id, name, value);
            }
            for child in scraper_node.children() {
                copy_into(dom, id, child);
            }
        }
        ScraperNode::Text(text) => {
            let data = text.text.to_string();
            if !data.trim().is_empty() {
                dom.create_text(parent, &data);
            }
        }
        _ => {
            for child in scraper_node.children() {
                copy_into(dom, parent, child);
            }
        }
    }
}
