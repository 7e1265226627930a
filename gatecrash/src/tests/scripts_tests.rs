//! Shape of the in-page routines.

use crate::scripts;

#[test]
fn enter_code_embeds_the_code_as_a_json_literal() {
    let script = scripts::enter_code("A1B2C3");
    assert!(script.contains(r#"const code = "A1B2C3""#));
    assert!(script.contains("dispatchEvent(new Event('input'"));
    assert!(script.contains("dispatchEvent(new Event('change'"));
}

#[test]
fn enter_code_escapes_hostile_payloads() {
    let script = scripts::enter_code(r#"A"; alert(1); ""#);
    // The quote must arrive escaped, never closing the literal early.
    assert!(script.contains(r#"\""#));
    assert!(!script.contains(r#"const code = "A";"#));
}

#[test]
fn click_visible_matches_case_insensitively() {
    let script = scripts::click_visible("Submit");
    assert!(script.contains(r#"const wanted = "submit""#));
}

#[test]
fn force_route_pushes_and_synthesizes_navigation() {
    let script = scripts::force_route("/finish");
    assert!(script.contains(r#""/finish""#));
    assert!(script.contains("pushState"));
    assert!(script.contains("PopStateEvent"));
}

#[test]
fn dismissal_vocabulary_is_wired_into_the_pass() {
    let script = scripts::dismiss_pass();
    assert!(script.contains("dismissPass"));
    assert!(script.contains("no thanks"));
    assert!(script.contains("getBoundingClientRect"));
}
