//! One-line diagnostic previews of a DOM element, used by strict-mode
//! selector errors and hit-target divergence messages.

use crate::dom::{Dom, NodeData, NodeId};

use super::engine::ID_ATTR;

const MAX_ATTR_CHARS: usize = 50;
const MAX_TEXT_CHARS: usize = 50;

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "param" | "source" | "track" | "wbr"
    )
}

/// Attributes sorted by length (excluding `style` and the internal
/// round-trip id attribute), truncated to 50 characters, formatted as
/// ` name="value"` (or bare ` name` for empty-string values).
fn format_attrs(attributes: &std::collections::BTreeMap<String, String>) -> String {
    let mut attrs: Vec<(&String, &String)> = attributes.iter().filter(|(k, _)| k.as_str() != "style" && k.as_str() != ID_ATTR).collect();
    attrs.sort_by_key(|(k, v)| k.len() + v.len());
    let mut attr_str = String::new();
    for (k, v) in attrs {
        let piece = if v.is_empty() { format!(" {k}") } else { format!(" {k}=\"{v}\"") };
        if attr_str.len() + piece.len() > MAX_ATTR_CHARS {
            break;
        }
        attr_str.push_str(&piece);
    }
    attr_str
}

/// `<tag attr1 attr2="v">text</tag>`-shaped preview, attributes sorted by
/// length (excluding `style` and the internal round-trip id attribute),
/// truncated to 50 characters of attributes and 50 of text.
pub fn preview_node(dom: &Dom, id: NodeId) -> String {
    match &dom.node(id).data {
        NodeData::Text { data } => truncate(data, MAX_TEXT_CHARS),
        NodeData::Element { tag_name, attributes, .. } => {
            let attr_str = format_attrs(attributes);
            let text = truncate(&dom.text_content(id), MAX_TEXT_CHARS);
            if is_void_element(tag_name) {
                format!("<{tag_name}{attr_str}/>")
            } else {
                format!("<{tag_name}{attr_str}>{text}</{tag_name}>")
            }
        }
    }
}

/// Opening-tag-only rendering of an element (no children/text, no closing
/// tag) — used to name a "subtree root" in hit-target divergence
/// diagnostics without pulling in its (possibly large) contents.
pub fn opening_tag(dom: &Dom, id: NodeId) -> String {
    match &dom.node(id).data {
        NodeData::Text { data } => truncate(data, MAX_TEXT_CHARS),
        NodeData::Element { tag_name, attributes, .. } => format!("<{tag_name}{}>", format_attrs(attributes)),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('\u{2026}');
        out
    }
}

/// Preview used inside `Error::StrictViolation` messages: the node preview
/// plus a best-effort reconstructed selector (an `id`/`nth`-based anchor).
///
/// This is the one place element→selector generation is in scope (§1):
/// purely a diagnostic label, never fed back into the query evaluator.
pub fn describe_for_strict_error(dom: &Dom, id: NodeId) -> String {
    format!("  - {} (selector: {})", preview_node(dom, id), reverse_engineer_selector(dom, id))
}

/// Reconstructs a CSS-ish path that would resolve back to `id`: `#id` if one
/// is set, otherwise a `tag:nth-of-type(n) > tag:nth-of-type(n) > ...` path
/// up to the nearest ancestor `id` (or the document root).
fn reverse_engineer_selector(dom: &Dom, id: NodeId) -> String {
    if let Some(own_id) = dom.node(id).attribute("id").filter(|v| !v.is_empty()) {
        return format!("#{own_id}");
    }

    let mut segments = Vec::new();
    let mut current = id;
    loop {
        let Some(parent) = dom.parent(current) else { break };
        let tag = dom.node(current).tag_name().unwrap_or("*");
        let same_tag_siblings: Vec<NodeId> = dom.children(parent).iter().copied().filter(|&c| dom.node(c).tag_name() == Some(tag)).collect();
        let segment = if same_tag_siblings.len() > 1 {
            let position = same_tag_siblings.iter().position(|&c| c == current).unwrap_or(0) + 1;
            format!("{tag}:nth-of-type({position})")
        } else {
            tag.to_string()
        };
        segments.push(segment);

        if let Some(parent_id) = dom.node(parent).attribute("id").filter(|v| !v.is_empty()) {
            segments.push(format!("#{parent_id}"));
            break;
        }
        if parent == dom.root() {
            break;
        }
        current = parent;
    }
    segments.reverse();
    segments.join(" > ")
}
