//! Component E (part 2) — the expectation/assertion matcher.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::action::{element_state, ElementState};
use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};
use crate::poll::{self, PollHandle, PollStep, Progress, SchedulerKind};
use crate::selector::text::ExpectedTextMatcher;

#[derive(Debug, Clone)]
pub enum ExpectExpression {
    BeChecked,
    BeDisabled,
    BeEditable,
    BeEnabled,
    BeHidden,
    BeVisible,
    BeEmpty,
    BeFocused,
    HaveCount,
    HaveProperty,
    HaveAttribute,
    HaveClass,
    HaveCss,
    HaveId,
    HaveText,
    HaveTitle,
    HaveUrl,
    HaveValue,
    HaveTextArray,
    HaveClassArray,
}

impl ExpectExpression {
    pub fn parse(expression: &str) -> Result<Self> {
        Ok(match expression {
            "to.be.checked" => ExpectExpression::BeChecked,
            "to.be.disabled" => ExpectExpression::BeDisabled,
            "to.be.editable" => ExpectExpression::BeEditable,
            "to.be.enabled" => ExpectExpression::BeEnabled,
            "to.be.hidden" => ExpectExpression::BeHidden,
            "to.be.visible" => ExpectExpression::BeVisible,
            "to.be.empty" => ExpectExpression::BeEmpty,
            "to.be.focused" => ExpectExpression::BeFocused,
            "to.have.count" => ExpectExpression::HaveCount,
            "to.have.property" => ExpectExpression::HaveProperty,
            "to.have.attribute" => ExpectExpression::HaveAttribute,
            "to.have.class" => ExpectExpression::HaveClass,
            "to.have.css" => ExpectExpression::HaveCss,
            "to.have.id" => ExpectExpression::HaveId,
            "to.have.text" => ExpectExpression::HaveText,
            "to.have.title" => ExpectExpression::HaveTitle,
            "to.have.url" => ExpectExpression::HaveUrl,
            "to.have.value" => ExpectExpression::HaveValue,
            "to.have.text.array" => ExpectExpression::HaveTextArray,
            "to.have.class.array" => ExpectExpression::HaveClassArray,
            other => return Err(Error::UnknownExpectMatcher(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpectParams {
    pub is_not: bool,
    pub expected_number: Option<usize>,
    pub expected_value: Option<serde_json::Value>,
    pub expression_arg: Option<String>,
    pub expected_text: Vec<ExpectedTextMatcher>,
    pub use_inner_text: bool,
}

#[derive(Debug, Clone)]
pub struct ExpectResult {
    pub pass: bool,
    pub received: Option<String>,
    pub log: Vec<String>,
}

/// Evaluates `expression` against `elements` (already resolved by the
/// evaluator). Negation (`params.is_not`) inverts the pass criterion.
pub fn expect(dom: &Dom, expression: &ExpectExpression, elements: &[NodeId], params: &ExpectParams) -> Result<ExpectResult> {
    let mut log = Vec::new();
    let (raw_pass, received) = evaluate_raw(dom, expression, elements, params, &mut log)?;
    let pass = if params.is_not { !raw_pass } else { raw_pass };
    Ok(ExpectResult { pass, received, log })
}

/// Polls `resolve` (typically a selector re-query against `dom`) and
/// re-evaluates `expression` against the result on every tick. While the
/// assertion is not yet satisfying, the current received value is published
/// via [`Progress::set_intermediate_result`] and polling continues; once it
/// passes, the poll resolves with the passing [`ExpectResult`].
///
/// `resolve` is a plain closure rather than a selector string so this module
/// stays decoupled from the selector engine registry, the same way
/// [`crate::action::wait_for_element_states_and_perform_action`] decouples
/// the action it drives from the polling rig around it.
pub fn wait_for_expect<R>(
    dom: Arc<AsyncMutex<Dom>>,
    scheduler: SchedulerKind,
    resolve: R,
    expression: ExpectExpression,
    params: ExpectParams,
) -> impl std::future::Future<Output = (PollHandle, impl std::future::Future<Output = Result<ExpectResult>>)>
where
    R: Fn(&Dom) -> Result<Vec<NodeId>> + Send + Sync + 'static,
{
    let resolve = Arc::new(resolve);
    let expression = Arc::new(expression);
    let params = Arc::new(params);

    poll::run(scheduler, move |progress: Arc<Progress>| {
        let dom = dom.clone();
        let resolve = resolve.clone();
        let expression = expression.clone();
        let params = params.clone();
        async move {
            let guard = dom.lock().await;
            let elements = resolve(&guard)?;
            let result = expect(&guard, &expression, &elements, &params)?;
            drop(guard);

            if result.pass {
                return Ok(PollStep::Done(result));
            }
            if let Some(received) = &result.received {
                progress.set_intermediate_result(received.clone()).await;
            }
            progress.log_repeating(format!("waiting for {expression:?} to be satisfying")).await;
            Ok(PollStep::Continue)
        }
    })
}

fn evaluate_raw(dom: &Dom, expression: &ExpectExpression, elements: &[NodeId], params: &ExpectParams, log: &mut Vec<String>) -> Result<(bool, Option<String>)> {
    use ExpectExpression::*;

    if matches!(expression, HaveCount) {
        let count = elements.len();
        let expected = params.expected_number.unwrap_or(0);
        return Ok((count == expected, Some(count.to_string())));
    }

    let Some(&element) = elements.first() else {
        return Ok((false, None));
    };

    match expression {
        BeChecked => Ok((element_state(dom, element, ElementState::Checked).unwrap_or(false), None)),
        BeDisabled => Ok((element_state(dom, element, ElementState::Disabled)?, None)),
        BeEditable => Ok((element_state(dom, element, ElementState::Editable)?, None)),
        BeEnabled => Ok((element_state(dom, element, ElementState::Enabled)?, None)),
        BeHidden => Ok((element_state(dom, element, ElementState::Hidden)?, None)),
        BeVisible => Ok((element_state(dom, element, ElementState::Visible)?, None)),
        BeFocused => Ok((dom.focused == Some(element), None)),
        BeEmpty => {
            let value = match dom.node(element).tag_name() {
                Some("input") | Some("textarea") => dom.value(element).unwrap_or("").to_string(),
                _ => dom.text_content(element).trim().to_string(),
            };
            Ok((value.is_empty(), Some(value)))
        }
        HaveProperty => {
            let actual = resolve_property(dom, element, params.expression_arg.as_deref().unwrap_or(""));
            let expected = params.expected_value.clone().unwrap_or(serde_json::Value::Null);
            Ok((deep_equals(&actual, &expected), Some(actual.to_string())))
        }
        HaveAttribute => {
            let name = params.expression_arg.as_deref().unwrap_or("");
            let actual = dom.node(element).attribute(name).unwrap_or("").to_string();
            let pass = params.expected_text.first().map(|m| m.matches(&actual)).unwrap_or(false);
            log.push(format!("  - checking attribute \"{name}\""));
            Ok((pass, Some(actual)))
        }
        HaveClass => {
            let actual = dom.node(element).attribute("class").unwrap_or("").to_string();
            let pass = params.expected_text.first().map(|m| m.matches(&actual)).unwrap_or(false);
            Ok((pass, Some(actual)))
        }
        HaveCss => {
            // No CSS cascade engine in this crate; `css` reads directly off
            // the `style` attribute's matching declaration, same as a host
            // without computed styles would have to.
            let prop = params.expression_arg.as_deref().unwrap_or("");
            let actual = read_inline_style(dom, element, prop);
            let pass = params.expected_text.first().map(|m| m.matches(&actual)).unwrap_or(false);
            Ok((pass, Some(actual)))
        }
        HaveId => {
            let actual = dom.node(element).attribute("id").unwrap_or("").to_string();
            let pass = params.expected_text.first().map(|m| m.matches(&actual)).unwrap_or(false);
            Ok((pass, Some(actual)))
        }
        HaveText => {
            // This DOM has no layout engine, so there's no distinction
            // between `textContent` and a layout-aware `innerText`;
            // `use_inner_text` is accepted for API parity but both read the
            // same text content.
            let actual = dom.text_content(element);
            let pass = params.expected_text.first().map(|m| m.matches(&actual)).unwrap_or(false);
            Ok((pass, Some(actual)))
        }
        HaveTitle => {
            let title_node = dom.descendants(dom.root(), false).into_iter().find(|&n| dom.node(n).tag_name() == Some("title"));
            let actual = title_node.map(|n| dom.text_content(n)).unwrap_or_default();
            let pass = params.expected_text.first().map(|m| m.matches(&actual)).unwrap_or(false);
            Ok((pass, Some(actual)))
        }
        HaveUrl => {
            let actual = params.expression_arg.clone().unwrap_or_default();
            let pass = params.expected_text.first().map(|m| m.matches(&actual)).unwrap_or(false);
            Ok((pass, Some(actual)))
        }
        HaveValue => {
            let actual = dom.value(element).unwrap_or("").to_string();
            let pass = params.expected_text.first().map(|m| m.matches(&actual)).unwrap_or(false);
            Ok((pass, Some(actual)))
        }
        HaveTextArray => {
            if elements.len() != params.expected_text.len() {
                return Ok((false, Some(elements.len().to_string())));
            }
            let pass = elements.iter().zip(params.expected_text.iter()).all(|(&el, m)| m.matches(&dom.text_content(el)));
            Ok((pass, None))
        }
        HaveClassArray => {
            if elements.len() != params.expected_text.len() {
                return Ok((false, Some(elements.len().to_string())));
            }
            let pass = elements
                .iter()
                .zip(params.expected_text.iter())
                .all(|(&el, m)| m.matches(dom.node(el).attribute("class").unwrap_or("")));
            Ok((pass, None))
        }
        HaveCount => unreachable!("handled above"),
    }
}

fn resolve_property(dom: &Dom, element: NodeId, name: &str) -> serde_json::Value {
    match name {
        "tagName" => serde_json::Value::String(dom.node(element).tag_name().unwrap_or("").to_uppercase()),
        "value" => serde_json::Value::String(dom.value(element).unwrap_or("").to_string()),
        "checked" => serde_json::Value::Bool(dom.checked(element)),
        _ => serde_json::Value::String(dom.node(element).attribute(name).unwrap_or("").to_string()),
    }
}

fn read_inline_style(dom: &Dom, element: NodeId, prop: &str) -> String {
    let style = dom.node(element).attribute("style").unwrap_or("");
    for decl in style.split(';') {
        let mut parts = decl.splitn(2, ':');
        if let (Some(k), Some(v)) = (parts.next(), parts.next()) {
            if k.trim() == prop {
                return v.trim().to_string();
            }
        }
    }
    String::new()
}

/// Structural deep equality. `NaN == NaN` (matching `Object.is`-style
/// deep-equal semantics, not IEEE `==`); arrays compare element-wise;
/// objects compare by key set.
pub fn deep_equals(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value::*;
    match (a, b) {
        (Number(x), Number(y)) => {
            let (xf, yf) = (x.as_f64(), y.as_f64());
            match (xf, yf) {
                (Some(xf), Some(yf)) => (xf.is_nan() && yf.is_nan()) || xf == yf,
                _ => x == y,
            }
        }
        (Array(xs), Array(ys)) => xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| deep_equals(x, y)),
        (Object(xs), Object(ys)) => {
            xs.len() == ys.len() && xs.iter().all(|(k, v)| ys.get(k).map(|y| deep_equals(v, y)).unwrap_or(false))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::poll::ManualFrames;

    #[tokio::test]
    async fn wait_for_expect_publishes_intermediate_results_then_resolves() {
        let mut dom = Dom::new();
        let root = dom.root();
        let div = dom.create_element(root, "div");
        dom.create_text(div, "loading");
        let dom = Arc::new(AsyncMutex::new(dom));

        let frames = ManualFrames::new();
        let params = ExpectParams {
            expected_text: vec![ExpectedTextMatcher { matcher: crate::selector::text::TextMatcher::Strict("ready".to_string()), normalize_whitespace: false }],
            ..Default::default()
        };

        let (_handle, fut) = wait_for_expect(
            dom.clone(),
            SchedulerKind::Manual(frames.clone()),
            move |d: &Dom| Ok(vec![d.descendants(d.root(), false).into_iter().find(|&n| d.node(n).tag_name() == Some("div")).unwrap()]),
            ExpectExpression::HaveText,
            params,
        )
        .await;

        let dom_for_driver = dom.clone();
        let frames_for_driver = frames.clone();
        let driver = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            frames_for_driver.tick();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            {
                let mut guard = dom_for_driver.lock().await;
                let div = guard.descendants(guard.root(), false).into_iter().find(|&n| guard.node(n).tag_name() == Some("div")).unwrap();
                let child = guard.children(div)[0];
                if let crate::dom::NodeData::Text { data } = &mut guard.node_mut(child).data {
                    *data = "ready".to_string();
                }
            }
            frames_for_driver.tick();
        });

        let result = fut.await.unwrap();
        driver.await.unwrap();
        assert!(result.pass);
        assert_eq!(result.received.as_deref(), Some("ready"));
    }

    #[test]
    fn parses_known_expressions() {
        assert!(matches!(ExpectExpression::parse("to.be.visible").unwrap(), ExpectExpression::BeVisible));
        assert!(ExpectExpression::parse("to.be.bogus").is_err());
    }

    #[test]
    fn have_count_checks_length() {
        let dom = Dom::new();
        let expr = ExpectExpression::HaveCount;
        let params = ExpectParams { expected_number: Some(2), ..Default::default() };
        let result = expect(&dom, &expr, &[dom.root(), dom.root()], &params).unwrap();
        assert!(result.pass);
    }

    #[test]
    fn negation_inverts_pass() {
        let dom = Dom::new();
        let expr = ExpectExpression::HaveCount;
        let params = ExpectParams { expected_number: Some(5), is_not: true, ..Default::default() };
        let result = expect(&dom, &expr, &[dom.root()], &params).unwrap();
        assert!(result.pass);
    }

    #[test]
    fn deep_equals_arrays_elementwise() {
        assert!(deep_equals(&json!([1, 2, 3]), &json!([1, 2, 3])));
        assert!(!deep_equals(&json!([1, 2, 3]), &json!([1, 2])));
    }

    #[test]
    fn be_empty_checks_trimmed_text() {
        let mut dom = Dom::new();
        let root = dom.root();
        let div = dom.create_element(root, "div");
        dom.create_text(div, "   ");
        let result = expect(&dom, &ExpectExpression::BeEmpty, &[div], &ExpectParams::default()).unwrap();
        assert!(result.pass);
    }
}
