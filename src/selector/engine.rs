//! Component B — the engine registry.
//!
//! Each engine maps a `(root, body)` pair to an ordered list of elements.
//! `css`/`xpath` and their attribute-shorthand siblings are implemented by
//! round-tripping the subtree through a focused parsing crate: the subtree is
//! serialized with every element tagged by a transient internal id
//! attribute, handed to `scraper`/`sxd-xpath`, and matches are mapped back to
//! [`NodeId`]s by reading that attribute off the result. This mirrors the
//! `el.id || 'css-' + i` round-tripping idiom used elsewhere in this
//! ecosystem to bridge a borrowed parser's output back to caller-owned node
//! identities.

use std::collections::HashMap;
use std::fmt::Write as _;

use boa_engine::{Context, Source};
use scraper::{Html, Selector as CssSelectorImpl};

use crate::dom::{Dom, NodeData, NodeId};
use crate::error::{Error, Result};

use super::text::{ElementTextMatch, TextMatcher};

/// Internal attribute used to round-trip parser output back to `NodeId`s.
/// Never shown to callers; stripped from any attribute snapshot (see
/// `action::preview_node`).
pub const ID_ATTR: &str = "data-rfseek-id";

pub trait SelectorEngine: Send + Sync {
    fn query_all(&self, dom: &Dom, root: NodeId, body: &str) -> Result<Vec<NodeId>>;
}

pub struct CssEngine {
    pub pierce_shadow: bool,
}

impl SelectorEngine for CssEngine {
    fn query_all(&self, dom: &Dom, root: NodeId, body: &str) -> Result<Vec<NodeId>> {
        let selector = CssSelectorImpl::parse(body)
            .map_err(|e| Error::MalformedSelector { selector: body.to_string(), reason: format!("{e:?}") })?;

        let mut out = Vec::new();
        for subtree_root in shadow_partitions(dom, root, self.pierce_shadow) {
            let (html, id_map) = serialize_tagged_html(dom, subtree_root);
            let fragment = Html::parse_fragment(&html);
            for el in fragment.select(&selector) {
                if let Some(id_str) = el.value().attr(ID_ATTR) {
                    if let Some(&node_id) = id_map.get(id_str) {
                        out.push(node_id);
                    }
                }
            }
        }
        Ok(out)
    }
}

pub struct XPathEngine;

impl SelectorEngine for XPathEngine {
    fn query_all(&self, dom: &Dom, root: NodeId, body: &str) -> Result<Vec<NodeId>> {
        use sxd_document::parser as xml_parser;
        use sxd_xpath::{Context as XContext, Factory, Value};

        let (xml, id_map) = serialize_tagged_xml(dom, root);
        let package = xml_parser::parse(&xml)
            .map_err(|e| Error::MalformedSelector { selector: body.to_string(), reason: format!("xml round-trip failed: {e}") })?;
        let document = package.as_document();

        let factory = Factory::new();
        let xpath = factory
            .build(body)
            .map_err(|e| Error::MalformedSelector { selector: body.to_string(), reason: format!("{e}") })?
            .ok_or_else(|| Error::MalformedSelector { selector: body.to_string(), reason: "empty XPath expression".to_string() })?;

        let context = XContext::new();
        let value = xpath
            .evaluate(&context, document.root())
            .map_err(|e| Error::MalformedSelector { selector: body.to_string(), reason: format!("{e}") })?;

        let mut out = Vec::new();
        if let Value::Nodeset(nodes) = value {
            for node in nodes.document_order() {
                if let Some(element) = node.element() {
                    if let Some(id_str) = element.attribute_value(ID_ATTR) {
                        if let Some(&node_id) = id_map.get(id_str) {
                            out.push(node_id);
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

/// `text`/`text:light`.
pub struct TextEngine {
    pub pierce_shadow: bool,
}

impl SelectorEngine for TextEngine {
    fn query_all(&self, dom: &Dom, root: NodeId, body: &str) -> Result<Vec<NodeId>> {
        let matcher = super::text::compile_body(body)?;
        let mut out = Vec::new();
        walk_text_matches(dom, root, self.pierce_shadow, &matcher, &mut out);
        Ok(out)
    }
}

/// Recursive (not flattened) so lax-mode pruning can skip a whole subtree
/// once an ancestor has already come back `None` — `dom.descendants` can't
/// express that since it has no notion of per-node match outcome.
fn walk_text_matches(dom: &Dom, node: NodeId, pierce: bool, matcher: &TextMatcher, out: &mut Vec<NodeId>) {
    let mut children = Vec::new();
    if let Some(shadow) = dom.shadow_root(node).filter(|_| pierce) {
        children.push(shadow);
    }
    children.extend(dom.children(node).iter().copied());

    let is_lax = matcher.kind() == super::text::MatchKind::Lax;
    for child in children {
        if !dom.node(child).is_element() {
            continue;
        }
        match element_matches_text(dom, child, matcher) {
            ElementTextMatch::SelfOnly => {
                out.push(child);
                walk_text_matches(dom, child, pierce, matcher, out);
            }
            ElementTextMatch::SelfAndChildren => {
                if !is_lax {
                    out.push(child);
                }
                walk_text_matches(dom, child, pierce, matcher, out);
            }
            ElementTextMatch::None => {
                // Lax mode prunes here: an ancestor with no match at all
                // means its descendants' matches would be spurious partial
                // overlaps. Strict mode keeps walking regardless.
                if !is_lax {
                    walk_text_matches(dom, child, pierce, matcher, out);
                }
            }
        }
    }
}

/// Mirrors `SPEC_FULL.md` §4.B's `element_matches_text` rules.
fn element_matches_text(dom: &Dom, node: NodeId, matcher: &TextMatcher) -> ElementTextMatch {
    let own_text: String = dom
        .children(node)
        .iter()
        .filter_map(|&c| dom.node(c).text_data())
        .collect::<Vec<_>>()
        .join("");
    let full_text = dom.text_content(node);
    if matcher.matches(&own_text) {
        ElementTextMatch::SelfOnly
    } else if matcher.matches(&full_text) {
        ElementTextMatch::SelfAndChildren
    } else {
        ElementTextMatch::None
    }
}

/// Attribute-shorthand engines (`id`, `data-testid`, `data-test-id`,
/// `data-test`) synthesize a CSS attribute selector and delegate.
pub struct AttributeEngine {
    pub attr_name: &'static str,
    pub pierce_shadow: bool,
}

impl SelectorEngine for AttributeEngine {
    fn query_all(&self, dom: &Dom, root: NodeId, body: &str) -> Result<Vec<NodeId>> {
        let escaped = serde_json::to_string(body).unwrap_or_else(|_| format!("\"{body}\""));
        let css = format!("[{}={}]", self.attr_name, escaped);
        CssEngine { pierce_shadow: self.pierce_shadow }.query_all(dom, root, &css)
    }
}

/// `_react`/`_vue`. Real framework introspection requires a live page with
/// the framework's devtools hook; this is a documented simplification that
/// walks the DOM for elements exposing the framework's debug-marker
/// attributes and matches `body` against the component-name fragment found
/// there (see DESIGN.md Open Question 4).
pub struct FrameworkEngine {
    pub framework: Framework,
    pub pierce_shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    React,
    Vue,
}

impl SelectorEngine for FrameworkEngine {
    fn query_all(&self, dom: &Dom, root: NodeId, body: &str) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for node in dom.descendants(root, self.pierce_shadow) {
            if !dom.node(node).is_element() {
                continue;
            }
            let marker = match self.framework {
                Framework::React => dom.node(node).attribute("data-reactid").or_else(|| dom.node(node).attribute("data-react-component")),
                Framework::Vue => dom
                    .node(node)
                    .attribute("data-v-app")
                    .or_else(|| dom.node(node).attribute("__vue__"))
                    .or_else(|| {
                        match &dom.node(node).data {
                            NodeData::Element { attributes, .. } => {
                                attributes.keys().find(|k| k.starts_with("data-v-")).map(|s| s.as_str())
                            }
                            NodeData::Text { .. } => None,
                        }
                    }),
            };
            if let Some(marker) = marker {
                if body.is_empty() || marker.contains(body) {
                    out.push(node);
                }
            }
        }
        Ok(out)
    }
}

/// `extend()`-loaded custom engine, evaluated with `boa_engine`. The source
/// must export a global constructor named `pwExport`; it is invoked once
/// with `params` and the resulting object's `queryAll(root, body)` is called
/// per query, exchanging root/results through the `ID_ATTR` scheme.
pub struct CustomEngine {
    source: String,
    params: serde_json::Value,
}

impl CustomEngine {
    pub fn new(source: impl Into<String>, params: serde_json::Value) -> Self {
        CustomEngine { source: source.into(), params }
    }
}

impl SelectorEngine for CustomEngine {
    fn query_all(&self, dom: &Dom, root: NodeId, body: &str) -> Result<Vec<NodeId>> {
        let (html, id_map) = serialize_tagged_html(dom, root);

        let mut context = Context::default();
        context.eval(Source::from_bytes(&self.source)).map_err(|e| {
            log::warn!("extend()-loaded custom engine failed to evaluate its source: {e}");
            Error::CustomEngineError(format!("failed to load custom engine source: {e}"))
        })?;

        let driver = format!(
            "(function() {{ \
                const ctor = globalThis.pwExport; \
                const engine = new ctor({params}); \
                const doc = (new DOMParser()).parseFromString({html}, 'text/html'); \
                const results = engine.queryAll(doc, {body}); \
                return JSON.stringify(results.map(el => el.getAttribute('{id_attr}'))); \
            }})()",
            params = self.params,
            html = serde_json::to_string(&html).unwrap_or_default(),
            body = serde_json::to_string(body).unwrap_or_default(),
            id_attr = ID_ATTR,
        );

        let result = context
            .eval(Source::from_bytes(&driver))
            .map_err(|e| Error::CustomEngineError(format!("custom engine evaluation failed: {e}")))?;
        let json = result
            .to_string(&mut context)
            .map_err(|e| Error::CustomEngineError(format!("custom engine returned a non-string result: {e}")))?
            .to_std_string_escaped();

        let ids: Vec<String> = serde_json::from_str(&json)
            .map_err(|e| Error::CustomEngineError(format!("custom engine returned malformed JSON: {e}")))?;

        let resolved: Vec<NodeId> = ids.iter().filter_map(|id| id_map.get(id).copied()).collect();
        if resolved.len() != ids.len() {
            log::warn!(
                "extend()-loaded custom engine returned {} id(s) not present in the queried subtree; {} discarded",
                ids.len(),
                ids.len() - resolved.len()
            );
        }
        Ok(resolved)
    }
}

/// Splits `root`'s subtree into the root itself plus (optionally) each
/// shadow root reachable from it, so `css`/`xpath` queries can run once per
/// independent DOM tree rather than attempting to serialize shadow
/// boundaries into a single flat document.
fn shadow_partitions(dom: &Dom, root: NodeId, pierce_shadow: bool) -> Vec<NodeId> {
    let mut partitions = vec![root];
    if pierce_shadow {
        for node in dom.descendants(root, false) {
            if let Some(shadow) = dom.shadow_root(node) {
                partitions.push(shadow);
                partitions.extend(shadow_partitions(dom, shadow, true));
            }
        }
    }
    partitions
}

/// Serializes `root`'s subtree to an HTML fragment, tagging every element
/// with `ID_ATTR` set to its `NodeId`'s index. Returns the markup and the
/// `ID_ATTR` value → `NodeId` map.
fn serialize_tagged_html(dom: &Dom, root: NodeId) -> (String, HashMap<String, NodeId>) {
    let mut out = String::new();
    let mut map = HashMap::new();
    write_node_html(dom, root, &mut out, &mut map);
    (out, map)
}

fn write_node_html(dom: &Dom, node: NodeId, out: &mut String, map: &mut HashMap<String, NodeId>) {
    match &dom.node(node).data {
        NodeData::Text { data } => {
            out.push_str(&html_escape(data));
        }
        NodeData::Element { tag_name, attributes, .. } => {
            let id_value = node.0.to_string();
            map.insert(id_value.clone(), node);
            let _ = write!(out, "<{tag_name}");
            for (k, v) in attributes {
                let _ = write!(out, " {}=\"{}\"", k, html_escape(v));
            }
            let _ = write!(out, " {ID_ATTR}=\"{id_value}\"");
            out.push('>');
            if !is_void_element(tag_name) {
                for &child in dom.children(node) {
                    write_node_html(dom, child, out, map);
                }
                let _ = write!(out, "</{tag_name}>");
            }
        }
    }
}

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "param" | "source" | "track" | "wbr"
    )
}

/// Same as [`serialize_tagged_html`] but produces well-formed XML (self-
/// closing void elements, entity-escaped attributes) since `sxd-document`
/// requires a strict document.
fn serialize_tagged_xml(dom: &Dom, root: NodeId) -> (String, HashMap<String, NodeId>) {
    let mut body = String::new();
    let mut map = HashMap::new();
    write_node_xml(dom, root, &mut body, &mut map);
    let xml = format!("<rfseeker-root>{body}</rfseeker-root>");
    (xml, map)
}

fn write_node_xml(dom: &Dom, node: NodeId, out: &mut String, map: &mut HashMap<String, NodeId>) {
    match &dom.node(node).data {
        NodeData::Text { data } => out.push_str(&html_escape(data)),
        NodeData::Element { tag_name, attributes, .. } => {
            let id_value = node.0.to_string();
            map.insert(id_value.clone(), node);
            let tag = sanitize_xml_tag(tag_name);
            let _ = write!(out, "<{tag}");
            for (k, v) in attributes {
                let _ = write!(out, " {}=\"{}\"", sanitize_xml_tag(k), html_escape(v));
            }
            let _ = write!(out, " {ID_ATTR}=\"{id_value}\"");
            let children = dom.children(node);
            if children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for &child in children {
                    write_node_xml(dom, child, out, map);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn sanitize_xml_tag(tag: &str) -> String {
    // Strip characters that would make the placeholder tag not well-formed
    // (e.g. `#document`/`#shadow-root` synthetic tag names).
    let cleaned: String = tag.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_').collect();
    if cleaned.is_empty() || cleaned.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        format!("n{cleaned}")
    } else {
        cleaned
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// The full built-in engine registry.
pub struct Registry {
    engines: HashMap<String, Box<dyn SelectorEngine>>,
}

impl Registry {
    pub fn new() -> Self {
        let mut engines: HashMap<String, Box<dyn SelectorEngine>> = HashMap::new();
        engines.insert("css".to_string(), Box::new(CssEngine { pierce_shadow: true }));
        engines.insert("css:light".to_string(), Box::new(CssEngine { pierce_shadow: false }));
        engines.insert("xpath".to_string(), Box::new(XPathEngine));
        engines.insert("xpath:light".to_string(), Box::new(XPathEngine));
        engines.insert("text".to_string(), Box::new(TextEngine { pierce_shadow: true }));
        engines.insert("text:light".to_string(), Box::new(TextEngine { pierce_shadow: false }));
        for (name, attr) in [("id", "id"), ("data-testid", "data-testid"), ("data-test-id", "data-test-id"), ("data-test", "data-test")] {
            engines.insert(name.to_string(), Box::new(AttributeEngine { attr_name: attr, pierce_shadow: true }));
            engines.insert(format!("{name}:light"), Box::new(AttributeEngine { attr_name: attr, pierce_shadow: false }));
        }
        engines.insert("_react".to_string(), Box::new(FrameworkEngine { framework: Framework::React, pierce_shadow: true }));
        engines.insert("_vue".to_string(), Box::new(FrameworkEngine { framework: Framework::Vue, pierce_shadow: true }));
        // `nth`/`visible` are pseudo-engines the evaluator short-circuits;
        // they're registered only so parser-level name validation accepts
        // them.
        engines.insert("nth".to_string(), Box::new(NoopEngine));
        engines.insert("visible".to_string(), Box::new(NoopEngine));
        Registry { engines }
    }

    pub fn names(&self) -> Vec<&str> {
        self.engines.keys().map(|s| s.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn SelectorEngine> {
        self.engines.get(name).map(|b| b.as_ref())
    }

    /// Loads a caller-supplied custom engine (`extend()`); `name` becomes its
    /// engine key (without a `:light` variant — custom engines decide their
    /// own piercing behavior internally).
    pub fn extend(&mut self, name: impl Into<String>, source: impl Into<String>, params: serde_json::Value) {
        self.engines.insert(name.into(), Box::new(CustomEngine::new(source, params)));
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

struct NoopEngine;

impl SelectorEngine for NoopEngine {
    fn query_all(&self, _dom: &Dom, _root: NodeId, _body: &str) -> Result<Vec<NodeId>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_sample() -> (Dom, NodeId) {
        let mut dom = Dom::new();
        let root = dom.root();
        let div = dom.create_element(root, "div");
        dom.set_attribute(div, "class", "card");
        let span = dom.create_element(div, "span");
        dom.create_text(span, "Hello world");
        (dom, root)
    }

    #[test]
    fn css_engine_matches_class() {
        let (dom, root) = build_sample();
        let engine = CssEngine { pierce_shadow: true };
        let matches = engine.query_all(&dom, root, ".card").unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn xpath_engine_matches_tag() {
        let (dom, root) = build_sample();
        let engine = XPathEngine;
        let matches = engine.query_all(&dom, root, "//span").unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn text_engine_lax_match() {
        let (dom, root) = build_sample();
        let engine = TextEngine { pierce_shadow: true };
        let matches = engine.query_all(&dom, root, "hello").unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn text_engine_lax_mode_prunes_beneath_a_nonmatching_ancestor() {
        // A regex matcher (a "lax" kind, same as plain substring text) whose
        // anchors fail against the ancestor's own+full text, even though a
        // nested element's own text would independently satisfy it. Pruning
        // means that nested match is never reached.
        let mut dom = Dom::new();
        let root = dom.root();
        let outer = dom.create_element(root, "div");
        dom.create_text(outer, "xxx");
        let inner = dom.create_element(outer, "span");
        dom.create_text(inner, "hello");

        let engine = TextEngine { pierce_shadow: true };
        let matches = engine.query_all(&dom, root, "/^hello$/").unwrap();
        assert!(matches.is_empty(), "a lax match nested under a non-matching ancestor must be pruned");
    }

    #[test]
    fn attribute_engine_matches_data_testid() {
        let mut dom = Dom::new();
        let root = dom.root();
        let btn = dom.create_element(root, "button");
        dom.set_attribute(btn, "data-testid", "submit");
        let engine = AttributeEngine { attr_name: "data-testid", pierce_shadow: true };
        let matches = engine.query_all(&dom, root, "submit").unwrap();
        assert_eq!(matches, vec![btn]);
    }

    #[test]
    fn registry_has_all_builtins() {
        let registry = Registry::new();
        for name in ["css", "css:light", "xpath", "xpath:light", "text", "text:light", "id", "data-testid", "_react", "_vue", "nth", "visible"] {
            assert!(registry.get(name).is_some(), "missing engine {name}");
        }
    }
}
