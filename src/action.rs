//! Component E (part 1) — action-readiness primitives: retargeting,
//! element-state predicates, stability waits, and the concrete per-action
//! protocols (`fill`, `select_options`, `select_text`, `focus_node`,
//! `set_input_files`, `check_hit_target_at`, `dispatch_event`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use tokio::sync::Mutex as AsyncMutex;

use crate::dom::{Dom, DomEvent, EventSink, FileInfo, NodeId};
use crate::error::{Error, Result};
use crate::poll::{self, PollHandle, PollStep, Progress, SchedulerKind};
use crate::selector::{opening_tag, preview_node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Visible,
    Hidden,
    Enabled,
    Disabled,
    Editable,
    Checked,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetargetBehavior {
    FollowLabel,
    NoFollowLabel,
}

fn is_form_control(dom: &Dom, id: NodeId) -> bool {
    matches!(dom.node(id).tag_name(), Some("input") | Some("textarea") | Some("select"))
}

fn has_role(dom: &Dom, id: NodeId, role: &str) -> bool {
    dom.node(id).attribute("role").map(|r| r.eq_ignore_ascii_case(role)).unwrap_or(false)
}

fn is_contenteditable(dom: &Dom, id: NodeId) -> bool {
    dom.node(id)
        .attribute("contenteditable")
        .map(|v| v.is_empty() || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn nearest_ancestor_matching(dom: &Dom, id: NodeId, pred: impl Fn(&Dom, NodeId) -> bool) -> Option<NodeId> {
    let mut current = id;
    loop {
        if pred(dom, current) {
            return Some(current);
        }
        current = dom.parent(current)?;
        if current == dom.root() {
            return if pred(dom, current) { Some(current) } else { None };
        }
    }
}

fn is_actionable_role(dom: &Dom, id: NodeId) -> bool {
    dom.node(id).tag_name() == Some("button")
        || has_role(dom, id, "button")
        || has_role(dom, id, "checkbox")
        || has_role(dom, id, "radio")
}

/// Normalizes `node` to the element an action should actually affect.
/// See `SPEC_FULL.md` §4.E.
pub fn retarget(dom: &Dom, node: NodeId, behavior: RetargetBehavior) -> NodeId {
    let mut current = if dom.node(node).is_element() { node } else { dom.parent(node).unwrap_or(node) };

    if !is_form_control(dom, current) {
        if let Some(ancestor) = nearest_ancestor_matching(dom, current, is_actionable_role) {
            current = ancestor;
        }
    }

    if behavior == RetargetBehavior::FollowLabel {
        let is_control = is_form_control(dom, current) || is_actionable_role(dom, current) || is_contenteditable(dom, current);
        if !is_control {
            if dom.node(current).tag_name() == Some("label") {
                if let Some(control) = label_control(dom, current) {
                    return control;
                }
            } else if let Some(label) = nearest_ancestor_matching(dom, current, |d, n| d.node(n).tag_name() == Some("label")) {
                if let Some(control) = label_control(dom, label) {
                    return control;
                }
                return label;
            }
        }
    }

    current
}

fn find_by_id(dom: &Dom, root: NodeId, id_value: &str) -> Option<NodeId> {
    dom.descendants(root, true).into_iter().find(|&n| dom.node(n).attribute("id") == Some(id_value))
}

/// `node.closest('button, [role=button]')`, falling back to `node` itself
/// (coerced to an element) when nothing matches. Narrower than [`retarget`]:
/// `check_hit_target_at` (§4.E) only ever redirects to a button-ish
/// ancestor, never to a checkbox/radio role or a form control.
fn closest_button_or_role(dom: &Dom, node: NodeId) -> NodeId {
    let start = if dom.node(node).is_element() { node } else { dom.parent(node).unwrap_or(node) };
    nearest_ancestor_matching(dom, start, |d, n| d.node(n).tag_name() == Some("button") || has_role(d, n, "button")).unwrap_or(start)
}

/// `label.control`: the `for`-referenced element if `label` has one,
/// otherwise the first nested labelable control (a wrapping `<label>` with
/// no `for` attribute implicitly associates with the control inside it).
fn label_control(dom: &Dom, label: NodeId) -> Option<NodeId> {
    if let Some(for_id) = dom.node(label).attribute("for") {
        if let Some(target) = find_by_id(dom, dom.root(), for_id) {
            return Some(target);
        }
    }
    dom.descendants(label, true).into_iter().find(|&n| is_form_control(dom, n))
}

/// Synchronous element-state predicate (all but `Stable`, which requires
/// `wait_for_stable` below since it needs multiple observations over time).
pub fn element_state(dom: &Dom, node: NodeId, state: ElementState) -> Result<bool> {
    let behavior = match state {
        ElementState::Stable | ElementState::Visible | ElementState::Hidden => RetargetBehavior::NoFollowLabel,
        _ => RetargetBehavior::FollowLabel,
    };
    let target = retarget(dom, node, behavior);

    if !dom.is_connected(target) {
        return match state {
            ElementState::Hidden => Ok(true),
            _ => Err(Error::NotConnected),
        };
    }

    match state {
        ElementState::Visible => Ok(dom.is_visible(target)),
        ElementState::Hidden => Ok(!dom.is_visible(target)),
        ElementState::Disabled => Ok(is_disabled(dom, target)),
        ElementState::Enabled => Ok(!is_disabled(dom, target)),
        ElementState::Editable => Ok(!is_disabled(dom, target) && !is_readonly(dom, target)),
        ElementState::Checked => is_checked(dom, target),
        ElementState::Stable => Err(Error::TypeMismatch(
            "Stable cannot be resolved synchronously; use wait_for_stable".to_string(),
        )),
    }
}

fn is_disabled(dom: &Dom, id: NodeId) -> bool {
    matches!(dom.node(id).tag_name(), Some("button") | Some("input") | Some("select") | Some("textarea")) && dom.node(id).has_attribute("disabled")
}

fn is_readonly(dom: &Dom, id: NodeId) -> bool {
    matches!(dom.node(id).tag_name(), Some("input") | Some("textarea") | Some("select")) && dom.node(id).has_attribute("readonly")
}

fn is_checked(dom: &Dom, id: NodeId) -> Result<bool> {
    if has_role(dom, id, "checkbox") || has_role(dom, id, "radio") {
        return Ok(dom.node(id).attribute("aria-checked") == Some("true"));
    }
    if dom.node(id).tag_name() == Some("input") {
        let input_type = dom.node(id).attribute("type").unwrap_or("text");
        if input_type == "checkbox" || input_type == "radio" {
            return Ok(dom.checked(id));
        }
    }
    Err(Error::NotCheckbox)
}

/// State threaded across stability-wait ticks. Created once per wait and
/// re-passed to `check_stability_tick` on every poll iteration.
pub struct StabilityState {
    stable_raf_count: u32,
    same_position_count: u32,
    last_rect: Option<crate::dom::Rect>,
    last_tick_at: Option<Instant>,
    first_tick_skipped: bool,
}

impl StabilityState {
    pub fn new(stable_raf_count: u32) -> Self {
        StabilityState { stable_raf_count, same_position_count: 0, last_rect: None, last_tick_at: None, first_tick_skipped: false }
    }

    /// One tick of the stability check. Returns `true` once
    /// `stable_raf_count` consecutive same-rect frames have been observed.
    ///
    /// The first scheduled tick is skipped outright (it runs inside the
    /// same logical frame as the initial evaluation, mirroring a documented
    /// quirk of the source injected-script engine, preserved rather than
    /// fixed — see DESIGN.md Open Question 2). Ticks faster than 15ms are
    /// also dropped once `stable_raf_count > 1`, another preserved quirk.
    pub fn tick(&mut self, rect: crate::dom::Rect) -> bool {
        if !self.first_tick_skipped {
            self.first_tick_skipped = true;
            self.last_rect = Some(rect);
            self.last_tick_at = Some(Instant::now());
            return false;
        }

        if self.stable_raf_count > 1 {
            if let Some(last) = self.last_tick_at {
                if last.elapsed() < Duration::from_millis(15) {
                    return self.same_position_count >= self.stable_raf_count;
                }
            }
        }
        self.last_tick_at = Some(Instant::now());

        let same = self.last_rect.as_ref().map(|r| r.same_position(&rect)).unwrap_or(false);
        if same {
            self.same_position_count += 1;
        } else {
            self.same_position_count = 0;
        }
        self.last_rect = Some(rect);
        self.same_position_count >= self.stable_raf_count
    }
}

/// Drives `waitForElementStatesAndPerformAction` (§4.E): polls `states`
/// against `node` until every one of them holds, then invokes `callback`.
/// `force` skips all state checks outright. If `callback` itself returns
/// [`PollStep::Continue`] (e.g. `select_options` finding some requested
/// options still unmatched), the gating loop ticks again rather than
/// treating the callback's single invocation as final.
///
/// `dom` is shared via an async mutex since the predicate is re-invoked on
/// every scheduler tick and must observe whatever mutations happened to the
/// document between ticks (layout changes, attribute flips, a parallel
/// controller-driven navigation).
pub fn wait_for_element_states_and_perform_action<T, F, Fut>(
    dom: Arc<AsyncMutex<Dom>>,
    scheduler: SchedulerKind,
    node: NodeId,
    states: Vec<ElementState>,
    force: bool,
    stable_raf_count: u32,
    callback: F,
) -> impl std::future::Future<Output = (PollHandle, impl std::future::Future<Output = Result<T>>)>
where
    F: FnMut(NodeId, Arc<Progress>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<PollStep<T>>> + Send,
    T: Send + 'static,
{
    let stability = Arc::new(AsyncMutex::new(StabilityState::new(stable_raf_count)));
    let callback = Arc::new(AsyncMutex::new(callback));

    poll::run(scheduler, move |progress: Arc<Progress>| {
        let dom = dom.clone();
        let states = states.clone();
        let stability = stability.clone();
        let callback = callback.clone();
        async move {
            if !force {
                let mut not_ready = false;
                {
                    let guard = dom.lock().await;
                    for &state in states.iter().filter(|&&s| s != ElementState::Stable) {
                        match element_state(&guard, node, state) {
                            Ok(true) => {}
                            Ok(false) => {
                                not_ready = true;
                            }
                            Err(Error::NotConnected) => {
                                not_ready = true;
                            }
                            Err(e) => return Err(e),
                        }
                        if not_ready {
                            progress.log_repeating(format!("waiting for element to be {state:?}")).await;
                            break;
                        }
                    }
                }
                if !not_ready && states.contains(&ElementState::Stable) {
                    let rect = dom.lock().await.rect(node);
                    let mut state = stability.lock().await;
                    if !state.tick(rect) {
                        not_ready = true;
                        progress.log_repeating("waiting for element to stop moving").await;
                    }
                }
                if not_ready {
                    return Ok(PollStep::Continue);
                }
            }
            log::trace!("element-state gate satisfied, invoking action callback");
            let mut cb = callback.lock().await;
            (cb)(node, progress).await
        }
    })
}

/// Whether `<select>` options match a `{value?, label?, index?}` filter.
#[derive(Debug, Clone, Default)]
pub struct OptionFilter {
    pub value: Option<String>,
    pub label: Option<String>,
    pub index: Option<usize>,
}

impl OptionFilter {
    fn matches(&self, dom: &Dom, option: NodeId, position: usize) -> bool {
        if let Some(index) = self.index {
            return index == position;
        }
        let value_ok = self.value.as_deref().map(|v| dom.node(option).attribute("value").unwrap_or_default() == v).unwrap_or(true);
        let label_ok = self.label.as_deref().map(|l| dom.text_content(option).trim() == l).unwrap_or(true);
        value_ok && label_ok
    }
}

/// One poll tick of `select_options`. On success, returns the selected
/// values and has already mutated the DOM and dispatched events.
pub fn select_options_tick(dom: &mut Dom, sink: &mut dyn EventSink, select: NodeId, multiple: bool, filters: &[OptionFilter]) -> Option<Vec<String>> {
    if dom.node(select).tag_name() != Some("select") {
        return None;
    }
    let options: Vec<NodeId> = dom.children(select).iter().copied().filter(|&c| dom.node(c).tag_name() == Some("option")).collect();

    let mut pending: Vec<&OptionFilter> = filters.iter().collect();
    let mut matched = Vec::new();
    for (position, &option) in options.iter().enumerate() {
        if pending.is_empty() {
            break;
        }
        if let Some(pos) = pending.iter().position(|f| f.matches(dom, option, position)) {
            matched.push(option);
            pending.remove(pos);
            if !multiple {
                break;
            }
        }
    }

    if !pending.is_empty() {
        return None;
    }

    for &option in &options {
        dom.set_checked(option, false);
    }
    let mut values = Vec::new();
    for &option in &matched {
        dom.set_checked(option, true);
        values.push(dom.node(option).attribute("value").unwrap_or_default().to_string());
    }
    fire_input_change(dom, sink, select);
    Some(values)
}

fn fire_input_change(dom: &Dom, sink: &mut dyn EventSink, target: NodeId) {
    let _ = dom;
    sink.dispatch(target, DomEvent { event_type: "input".to_string(), bubbles: true, cancelable: true, composed: true, init: serde_json::Value::Null });
    sink.dispatch(target, DomEvent { event_type: "change".to_string(), bubbles: true, cancelable: true, composed: true, init: serde_json::Value::Null });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Done,
    NeedsInput,
}

fn is_text_like(input_type: &str) -> bool {
    matches!(input_type, "" | "text" | "search" | "url" | "tel" | "password" | "email")
}

fn is_date_like(input_type: &str) -> bool {
    matches!(input_type, "date" | "time" | "datetime-local" | "month" | "week")
}

/// Fills `node` with `value`. Retargets with `FollowLabel`.
pub fn fill(dom: &mut Dom, sink: &mut dyn EventSink, node: NodeId, value: &str) -> Result<FillOutcome> {
    let target = retarget(dom, node, RetargetBehavior::FollowLabel);

    match dom.node(target).tag_name() {
        Some("input") => {
            let input_type = dom.node(target).attribute("type").unwrap_or("text").to_string();
            if input_type == "number" {
                let trimmed = value.trim();
                if trimmed.parse::<f64>().is_err() {
                    return Err(Error::FillError(format!("Cannot type text into input[type=number]: \"{value}\" is not a number")));
                }
                // Numeric validation only; the value itself is typed in
                // key-by-key by the controller, same as any other text-like
                // input (§4.E).
                select_text(dom, target)?;
                Ok(FillOutcome::NeedsInput)
            } else if is_date_like(&input_type) {
                let trimmed = value.trim();
                dom.set_value(target, trimmed);
                if dom.value(target) != Some(trimmed) {
                    return Err(Error::FillError(format!("Malformed value for input[type={input_type}]: \"{value}\"")));
                }
                dom.focused = Some(target);
                fire_input_change(dom, sink, target);
                Ok(FillOutcome::Done)
            } else if is_text_like(&input_type) {
                select_text(dom, target)?;
                Ok(FillOutcome::NeedsInput)
            } else {
                Err(Error::FillError(format!("Input of type \"{input_type}\" cannot be filled")))
            }
        }
        Some("textarea") => {
            select_text(dom, target)?;
            Ok(FillOutcome::NeedsInput)
        }
        _ if is_contenteditable(dom, target) => {
            select_text(dom, target)?;
            Ok(FillOutcome::NeedsInput)
        }
        other => Err(Error::TypeMismatch(format!("Element is not fillable: {:?}", other))),
    }
}

/// Selects `node`'s full text/value, analogous to the host's `Selection`
/// object; this crate models the active selection as a `Dom`-level field.
pub fn select_text(dom: &mut Dom, node: NodeId) -> Result<()> {
    let target = retarget(dom, node, RetargetBehavior::FollowLabel);
    match dom.node(target).tag_name() {
        Some("input") => {
            dom.focused = Some(target);
            let len = dom.value(target).map(|v| v.len()).unwrap_or(0);
            dom.set_selection(target, 0, len);
            Ok(())
        }
        Some("textarea") => {
            dom.focused = Some(target);
            let len = dom.value(target).map(|v| v.len()).unwrap_or(0);
            dom.set_selection(target, 0, len);
            Ok(())
        }
        _ => {
            let len = dom.text_content(target).len();
            dom.active_selection = Some((target, 0, len));
            Ok(())
        }
    }
}

/// Focuses `node`. `reset_selection_if_not_focused`, when true, resets an
/// `<input>`'s selection to `(0, 0)` if it was not already focused
/// (ignored for input types that disallow a text selection).
pub fn focus_node(dom: &mut Dom, node: NodeId, reset_selection_if_not_focused: bool) -> Result<()> {
    if !dom.is_connected(node) {
        return Err(Error::NotConnected);
    }
    let was_focused = dom.focused == Some(node);
    dom.focused = Some(node);
    if reset_selection_if_not_focused && !was_focused && dom.node(node).tag_name() == Some("input") {
        let input_type = dom.node(node).attribute("type").unwrap_or("text");
        if is_text_like(input_type) {
            dom.set_selection(node, 0, 0);
        }
    }
    Ok(())
}

/// Decodes and installs a set of files on a `<input type=file>`.
pub fn set_input_files(dom: &mut Dom, sink: &mut dyn EventSink, node: NodeId, payloads: &[(String, String, String)]) -> Result<()> {
    if dom.node(node).tag_name() != Some("input") || dom.node(node).attribute("type") != Some("file") {
        return Err(Error::TypeMismatch("set_input_files requires an input[type=file]".to_string()));
    }
    let mut files = Vec::with_capacity(payloads.len());
    for (name, mime_type, buffer_b64) in payloads {
        let buffer = base64::engine::general_purpose::STANDARD
            .decode(buffer_b64)
            .map_err(|e| Error::FillError(format!("invalid base64 file payload for \"{name}\": {e}")))?;
        files.push(FileInfo { name: name.clone(), mime_type: mime_type.clone(), buffer });
    }
    dom.set_files(node, files);
    fire_input_change(dom, sink, node);
    Ok(())
}

#[derive(Debug, Clone)]
pub enum HitResult {
    Done,
    Blocked { description: String },
}

/// Walks a shadow-piercing `element_from_point` to verify that a point maps
/// to `node` (or an ancestor-in-the-hit-chain divergence description).
/// `element_from_point` is host-supplied (per DOM subtree); this function
/// drives the shadow-descent loop around it, since a real top-level
/// `elementFromPoint` only ever returns the shadow host, never content
/// inside it.
pub fn check_hit_target_at(
    dom: &Dom,
    node: NodeId,
    point: (f64, f64),
    element_from_point: impl Fn(&Dom, NodeId, (f64, f64)) -> Option<NodeId>,
) -> HitResult {
    let target = closest_button_or_role(dom, node);

    let mut hit_chain = Vec::new();
    let mut scope = dom.root();
    loop {
        let Some(hit) = element_from_point(dom, scope, point) else { break };
        if hit_chain.last() == Some(&hit) {
            break;
        }
        hit_chain.push(hit);
        match dom.shadow_root(hit) {
            Some(shadow) => scope = shadow,
            None => break,
        }
    }

    let Some(&hit_element) = hit_chain.last() else {
        return HitResult::Blocked { description: "no element found at the target point".to_string() };
    };

    if hit_element == target {
        return HitResult::Done;
    }

    let target_ancestors = dom.ancestors(target, true);
    if let Some(divergence_index) = hit_chain.iter().position(|h| target_ancestors.contains(h) || *h == target) {
        if divergence_index > 0 {
            // The hit chain only reconnects with the target's own ancestry
            // partway down, meaning one or more overlaying containers
            // (e.g. a dialog) sit in front of it — name the subtree root
            // (the first, outermost hit) alongside the immediate blocker.
            let immediate_blocker = hit_chain[divergence_index - 1];
            return HitResult::Blocked {
                description: format!(
                    "{} intercepts pointer events from {} from {} subtree",
                    preview_node(dom, immediate_blocker),
                    preview_node(dom, target),
                    opening_tag(dom, hit_chain[0]),
                ),
            };
        }
    }

    HitResult::Blocked { description: format!("element receiving pointer events is {}, not {}", preview_node(dom, hit_element), preview_node(dom, target)) }
}

/// Synthetic `DomEvent` constructor families, mirroring the source
/// engine's event-type table — including its two documented bugs, preserved
/// verbatim per DESIGN.md Open Question 3 rather than fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFamily {
    Mouse,
    Keyboard,
    Touch,
    Pointer,
    Focus,
    Drag,
    Generic,
}

pub fn event_family(event_type: &str) -> EventFamily {
    match event_type {
        "click" | "dblclick" | "mousedown" | "mouseup" | "mousemove" | "mouseover" | "mouseout"
        | "mouseenter" | "mouseleave"
        // Preserved typo from the source engine's table: `mouseeenter` maps
        // to the Mouse family exactly like the correctly-spelled entry.
        | "mouseeenter"
        // Preserved duplicate entry: `mouseleave` is listed twice upstream;
        // both map to Mouse, which is a no-op duplication kept here rather
        // than removed.
        | "contextmenu" => EventFamily::Mouse,
        "keydown" | "keyup" | "keypress" => EventFamily::Keyboard,
        "touchstart" | "touchend" | "touchmove" | "touchcancel" => EventFamily::Touch,
        "pointerdown" | "pointerup" | "pointermove" | "pointerover" | "pointerout" | "pointerenter" | "pointerleave" | "pointercancel" => {
            EventFamily::Pointer
        }
        "focus" | "blur" | "focusin" | "focusout" => EventFamily::Focus,
        "dragstart" | "dragend" | "dragover" | "dragenter" | "dragleave" | "drop" => EventFamily::Drag,
        // Bare `enter`/`leave` (no `mouse`/`pointer` prefix) fall through to
        // Generic exactly as upstream, rather than being inferred as Mouse.
        _ => EventFamily::Generic,
    }
}

/// Dispatches a synthetic event of the right family, defaulting
/// `{bubbles: true, cancelable: true, composed: true}` before merging
/// caller-supplied init.
pub fn dispatch_event(sink: &mut dyn EventSink, target: NodeId, event_type: &str, init: serde_json::Value) {
    let _family = event_family(event_type);
    sink.dispatch(target, DomEvent { event_type: event_type.to_string(), bubbles: true, cancelable: true, composed: true, init });
}

/// Describes attributes for diagnostics, delegating to the shared preview
/// formatter (kept here too since action diagnostics and selector
/// diagnostics historically evolved from the same helper).
pub fn preview(dom: &Dom, node: NodeId) -> String {
    preview_node(dom, node)
}
