//! Component C — executes a [`ParsedSelector`] against a root, honoring
//! capture marks, strict uniqueness, and per-call engine-result caching.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};

use super::engine::Registry;
use super::parser::{Part, ParsedSelector};
use super::preview::describe_for_strict_error;

#[derive(Debug, Clone, Copy)]
struct Match {
    element: NodeId,
    capture: Option<NodeId>,
}

/// Bracket for a single top-level `query_selector`/`query_selector_all` call.
/// Its `Drop` impl guarantees the per-call engine-result cache never leaks
/// past the call that created it, including on early `?`-return.
pub struct EvalScope<'a> {
    registry: &'a Registry,
    cache: RefCell<HashMap<(NodeId, usize), Vec<NodeId>>>,
}

impl<'a> EvalScope<'a> {
    pub fn begin(registry: &'a Registry) -> Self {
        EvalScope { registry, cache: RefCell::new(HashMap::new()) }
    }

    fn engine_query(&self, dom: &Dom, root: NodeId, part_index: usize, part: &Part) -> Result<Vec<NodeId>> {
        let key = (root, part_index);
        if let Some(cached) = self.cache.borrow().get(&key) {
            return Ok(cached.clone());
        }
        let engine = self
            .registry
            .get(&part.engine)
            .ok_or_else(|| Error::UnknownEngine(part.engine.clone()))?;
        let result = engine.query_all(dom, root, &part.body)?;
        self.cache.borrow_mut().insert(key, result.clone());
        Ok(result)
    }
}

impl Drop for EvalScope<'_> {
    fn drop(&mut self) {
        self.cache.borrow_mut().clear();
    }
}

fn is_truthy_token(body: &str) -> bool {
    !matches!(body.trim(), "" | "0" | "false")
}

fn run_parts(dom: &Dom, scope: &EvalScope, root: NodeId, selector: &ParsedSelector, is_visible: impl Fn(&Dom, NodeId) -> bool) -> Result<Vec<Match>> {
    let mut working = vec![Match { element: root, capture: None }];

    for (index, part) in selector.parts.iter().enumerate() {
        let base_engine = part.engine.split(':').next().unwrap_or(&part.engine);
        working = match base_engine {
            "nth" => apply_nth(&working, &part.body)?,
            "visible" => {
                let want = is_truthy_token(&part.body);
                working.into_iter().filter(|m| is_visible(dom, m.element) == want).collect()
            }
            _ => {
                let mut next = Vec::new();
                for m in &working {
                    let results = scope.engine_query(dom, m.element, index, part)?;
                    for element in results {
                        // A capture mark on this part means the elements it
                        // produces become the capture for every downstream
                        // match descending from them; otherwise the capture
                        // (if any) carries forward unchanged.
                        let capture = if part.capture { Some(element) } else { m.capture };
                        next.push(Match { element, capture });
                    }
                }
                next
            }
        };
    }

    Ok(working)
}

fn apply_nth(working: &[Match], body: &str) -> Result<Vec<Match>> {
    let distinct: Vec<Match> = dedup_matches(working);
    if body.trim() == "-1" {
        return Ok(distinct.last().copied().into_iter().collect());
    }
    let index: usize = body.trim().parse().map_err(|_| Error::MalformedSelector {
        selector: format!("nth={body}"),
        reason: "nth body must be \"0\", \"-1\", or a non-negative integer".to_string(),
    })?;
    Ok(distinct.get(index).copied().into_iter().collect())
}

fn dedup_matches(working: &[Match]) -> Vec<Match> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for m in working {
        let key = m.capture.unwrap_or(m.element);
        if seen.insert(key) {
            out.push(*m);
        }
    }
    out
}

/// Returns the deduplicated list of final elements (capture-projected),
/// preserving first-encounter order.
pub fn query_selector_all(dom: &Dom, registry: &Registry, root: NodeId, selector: &ParsedSelector, is_visible: impl Fn(&Dom, NodeId) -> bool) -> Result<Vec<NodeId>> {
    let scope = EvalScope::begin(registry);
    let matches = run_parts(dom, &scope, root, selector, is_visible)?;
    let deduped = dedup_matches(&matches);
    Ok(deduped.into_iter().map(|m| m.capture.unwrap_or(m.element)).collect())
}

/// Returns at most one element. If `strict` and more than one distinct
/// element matched, fails with [`Error::StrictViolation`] carrying up to 10
/// previews.
pub fn query_selector(
    dom: &Dom,
    registry: &Registry,
    root: NodeId,
    selector: &ParsedSelector,
    selector_text: &str,
    strict: bool,
    is_visible: impl Fn(&Dom, NodeId) -> bool,
) -> Result<Option<NodeId>> {
    let elements = query_selector_all(dom, registry, root, selector, is_visible)?;
    if elements.is_empty() {
        return Ok(None);
    }
    if strict && elements.len() > 1 {
        let previews = elements
            .iter()
            .take(10)
            .map(|&id| describe_for_strict_error(dom, id))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(Error::StrictViolation { selector: selector_text.to_string(), count: elements.len(), previews });
    }
    Ok(Some(elements[0]))
}
