//! In-page routines evaluated against the live document.
//!
//! Kept as named function expressions so their effects stay identifiable in
//! DevTools traces. String payloads are embedded through JSON encoding,
//! never raw interpolation.

/// Visible labels treated as an invitation to dismiss an obstacle.
pub const DISMISS_LABELS: &[&str] = &[
    "dismiss",
    "decline",
    "skip",
    "cancel",
    "no thanks",
    "not now",
    "maybe later",
    "close",
];

/// Labels tried, in order, when activating the submission control.
pub const SUBMIT_LABELS: &[&str] = &["submit", "continue", "next", "unlock", "verify", "go"];

/// Labels tried when entering the flow from the landing screen.
pub const ENTRY_LABELS: &[&str] = &["start", "begin", "enter"];

/// Embed a Rust string into a script as a JS string literal.
pub(crate) fn js_string(s: &str) -> String {
    // Serializing a &str cannot fail; the fallback keeps this total anyway.
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// One dismissal pass: clicks obstacle controls by visible label, then
/// narrow glyph-only close affordances. Every activation sits in its own
/// fault boundary; elements routinely vanish between query and click while
/// the target re-renders. Returns the number of activations.
pub fn dismiss_pass() -> String {
    let labels = js_string_list(DISMISS_LABELS);
    format!(
        r#"(function dismissPass() {{
  const labels = {labels};
  let clicked = 0;
  const candidates = Array.from(document.querySelectorAll(
    'button, a, [role="button"], input[type="button"], span.close'));
  for (const el of candidates) {{
    const text = (el.innerText || el.value || '').trim().toLowerCase();
    try {{
      if (labels.some(l => text === l || text.startsWith(l))) {{
        el.click();
        clicked++;
      }} else if ((text === '×' || text === '✕' || text === 'x')
          && el.getBoundingClientRect().width < 48) {{
        el.click();
        clicked++;
      }}
    }} catch (e) {{ /* element went away mid-pass */ }}
  }}
  return clicked;
}})()"#
    )
}

/// Scroll to the document bottom and poke secondary UI that may gate the
/// code input: tab-like controls, collapsed reveals, radio inputs.
pub fn reveal_secondary() -> String {
    r#"(function revealSecondary() {
  window.scrollTo(0, document.body.scrollHeight);
  let poked = 0;
  const extras = Array.from(document.querySelectorAll(
    '[role="tab"], details:not([open]) summary, input[type="radio"], [aria-expanded="false"]'));
  for (const el of extras) {
    try { el.click(); poked++; } catch (e) { /* ignore */ }
  }
  return poked;
})()"#
        .to_string()
}

/// Write `code` into the step's input through the native value setter, then
/// dispatch the input/change pair reactive frameworks listen for. A plain
/// `el.value = x` goes through the framework's overridden setter without
/// notifying its change tracking, and the submission reads an empty model.
pub fn enter_code(code: &str) -> String {
    let code = js_string(code);
    format!(
        r#"(function commitCode() {{
  const code = {code};
  const input = document.querySelector(
    'input[type="text"], input[type="password"], input:not([type])');
  if (!input) return false;
  const setter = Object.getOwnPropertyDescriptor(
    window.HTMLInputElement.prototype, 'value').set;
  setter.call(input, code);
  input.dispatchEvent(new Event('input', {{ bubbles: true }}));
  input.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#
    )
}

/// Click the first interactive element whose visible label matches `label`.
pub fn click_visible(label: &str) -> String {
    let wanted = js_string(&label.to_lowercase());
    format!(
        r#"(function clickVisible() {{
  const wanted = {wanted};
  const candidates = Array.from(document.querySelectorAll(
    'button, a, [role="button"], input[type="submit"], input[type="button"]'));
  for (const el of candidates) {{
    const text = (el.innerText || el.value || '').trim().toLowerCase();
    if (text === wanted || text.startsWith(wanted)) {{
      try {{ el.click(); return true; }} catch (e) {{ /* gone */ }}
    }}
  }}
  return false;
}})()"#
    )
}

/// Drive the SPA router straight to `route` by mutating the history stack
/// and synthesizing the navigation event the router listens for. Escape
/// hatch for the terminal step, whose own validation never reports success.
pub fn force_route(route: &str) -> String {
    let route = js_string(route);
    format!(
        r#"(function forceRoute() {{
  const route = {route};
  window.history.pushState({{}}, '', route);
  window.dispatchEvent(new PopStateEvent('popstate', {{ state: {{}} }}));
  return window.location.pathname;
}})()"#
    )
}

fn js_string_list(items: &[&str]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}
