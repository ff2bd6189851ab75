//! rfseeker
//!
//! A Rust-native re-implementation of a remote browser-automation
//! framework's in-document element locator and action-readiness engine.
//!
//! This crate does not launch or speak to a real browser. It operates on an
//! in-process, arena-based DOM model ([`dom`]) that a host — a test
//! harness, a CDP-driven controller, or the bundled CLI loading a static
//! HTML file — constructs and mutates. [`DocumentContext`] wires the five
//! components together: the selector parser and engine registry
//! ([`selector`]), the query evaluator, the poll/progress runtime
//! ([`poll`]), and the action-readiness and assertion core ([`action`],
//! [`expect`]).
//!
//! # Example
//!
//! ```
//! use rfseeker::{CoreConfig, DocumentContext};
//!
//! let mut dom = rfseeker::html_loader::load_document(
//!     "<html><body><button id=\"go\">Go</button></body></html>",
//! );
//! let ctx = DocumentContext::new(CoreConfig::default());
//! let root = dom.root();
//! let button = ctx.query_selector(&dom, root, "#go", true).unwrap();
//! assert!(button.is_some());
//! ```

pub mod action;
pub mod dom;
pub mod error;
pub mod expect;
pub mod html_loader;
pub mod poll;
pub mod selector;

pub use error::{Error, Result};

use dom::{Dom, NodeId};
use selector::{parse, Registry};

/// Construction-time configuration for a [`DocumentContext`], matching the
/// source engine's registry-constructor inputs (§4.B).
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Consecutive same-rect frames required before an element is declared
    /// `stable` (see [`action::StabilityState`]).
    pub stable_raf_count: u32,
    /// Accepted for constructor-shape parity with the source engine; this
    /// host has no real animation-frame source, so `FrameScheduler::Raf` is
    /// always timer-backed regardless of this flag. It only changes which
    /// diagnostic label the scheduler reports (`"raf"` vs `"timeout"`).
    pub replace_raf_with_timeout: bool,
    /// Used only for diagnostic/error-stack handling parity; this crate
    /// never populates a stack on its errors, so the value is inert but
    /// kept for API parity with the source constructor.
    pub browser_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self { stable_raf_count: 2, replace_raf_with_timeout: false, browser_name: "rfseeker".to_string() }
    }
}

/// Facade gluing the selector engine registry, query evaluator, and
/// action-readiness core together for a single document (or nested browsing
/// context). One `DocumentContext` per document, matching the source
/// system's per-frame injected-script instance.
pub struct DocumentContext {
    config: CoreConfig,
    registry: Registry,
}

impl DocumentContext {
    pub fn new(config: CoreConfig) -> Self {
        DocumentContext { config, registry: Registry::new() }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The engine names this context currently recognizes (built-ins plus
    /// any loaded via [`DocumentContext::extend`]).
    pub fn engine_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Loads a caller-supplied custom engine (`extend()`, §6). `source` must
    /// export a global constructor named `pwExport`.
    pub fn extend(&mut self, name: impl Into<String>, source: impl Into<String>, params: serde_json::Value) {
        self.registry.extend(name, source, params);
    }

    /// Parses `selector` against this context's known engine names.
    pub fn parse_selector(&self, selector: &str) -> Result<selector::ParsedSelector> {
        parse(selector, &self.registry.names())
    }

    /// Resolves `selector` against `root`, returning at most one element.
    /// Fails with [`Error::StrictViolation`] if `strict` and more than one
    /// distinct element matched.
    pub fn query_selector(&self, dom: &Dom, root: NodeId, selector: &str, strict: bool) -> Result<Option<NodeId>> {
        let parsed = self.parse_selector(selector)?;
        log::trace!("query_selector({selector:?}, strict={strict})");
        self::selector::evaluator::query_selector(dom, &self.registry, root, &parsed, selector, strict, |d, id| d.is_visible(id))
    }

    /// Resolves `selector` against `root`, returning every deduplicated
    /// matching element in first-encounter order.
    pub fn query_selector_all(&self, dom: &Dom, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let parsed = self.parse_selector(selector)?;
        log::trace!("query_selector_all({selector:?})");
        self::selector::evaluator::query_selector_all(dom, &self.registry, root, &parsed, |d, id| d.is_visible(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html_loader::load_document;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.stable_raf_count, 2);
        assert!(!config.replace_raf_with_timeout);
    }

    #[test]
    fn document_context_resolves_a_selector() {
        let dom = load_document("<html><body><button id=\"go\">Go</button></body></html>");
        let ctx = DocumentContext::new(CoreConfig::default());
        let root = dom.root();
        let found = ctx.query_selector(&dom, root, "#go", true).unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn unknown_engine_is_rejected_up_front() {
        let dom = load_document("<html><body></body></html>");
        let ctx = DocumentContext::new(CoreConfig::default());
        let root = dom.root();
        let err = ctx.query_selector(&dom, root, "bogus=foo", true).unwrap_err();
        assert!(matches!(err, Error::UnknownEngine(e) if e == "bogus"));
    }
}
