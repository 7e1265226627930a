//! Scripted in-memory stand-in for the browser capability.
//!
//! Behaves like the target in the ways the engine cares about: it advances
//! `step/N -> step/N+1 -> finish` when the right code is submitted, and can
//! be configured with the target's quirks (a step that never advances, a
//! router bypass that does not stick, stale location reads).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::driver::PageDriver;
use crate::engine::StepState;
use crate::errors::PageError;
use crate::scripts;
use crate::session;

pub const BASE_URL: &str = "https://target.example/flow";
pub const FINISH_MARKER: &str = "/finish";

static ENTERED_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"const code = "([^"]*)""#).expect("code pattern compiles"));

pub fn step_url(n: u32) -> String {
    format!("{BASE_URL}/step/{n}")
}

pub fn finish_url() -> String {
    format!("{BASE_URL}/finish")
}

/// Encode a code list the way the target stores it, so extraction can be
/// exercised against a known plaintext.
pub fn encode_session(codes: &[&str], key: &str) -> String {
    let document = json!({ "codes": codes }).to_string();
    BASE64.encode(session::xor_with_key(document.as_bytes(), key.as_bytes()))
}

#[derive(Default)]
struct PageState {
    location: String,
    location_feed: VecDeque<String>,
    storage: HashMap<String, String>,
    entered_code: Option<String>,
    dismiss_passes: usize,
    reveal_calls: usize,
    submit_clicks: usize,
}

pub struct MockPage {
    state: Mutex<PageState>,
    codes: Vec<String>,
    total_steps: u32,
    stuck_at: Option<u32>,
    bypass_sticks: bool,
    fail_evals: bool,
}

impl MockPage {
    pub fn new(codes: &[&str], total_steps: u32) -> Self {
        Self {
            state: Mutex::new(PageState::default()),
            codes: codes.iter().map(|c| c.to_string()).collect(),
            total_steps,
            stuck_at: None,
            bypass_sticks: true,
            fail_evals: false,
        }
    }

    /// Seed the session blob the way the target stores it.
    pub fn with_session_blob(self, storage_key: &str, blob: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .storage
            .insert(storage_key.to_string(), blob.to_string());
        self
    }

    pub fn starting_at(self, location: &str) -> Self {
        self.state.lock().unwrap().location = location.to_string();
        self
    }

    /// Serve these locations, one per read, before settling on the last.
    pub fn with_location_feed(self, feed: &[&str]) -> Self {
        self.state.lock().unwrap().location_feed = feed.iter().map(|l| l.to_string()).collect();
        self
    }

    /// This step accepts its code but the page never moves on.
    pub fn stuck_at(mut self, step: u32) -> Self {
        self.stuck_at = Some(step);
        self
    }

    /// The router ignores the forced route.
    pub fn bypass_ignored(mut self) -> Self {
        self.bypass_sticks = false;
        self
    }

    /// Every script evaluation fails, as if the page were mid-navigation.
    pub fn failing_evals(mut self) -> Self {
        self.fail_evals = true;
        self
    }

    pub fn dismiss_passes(&self) -> usize {
        self.state.lock().unwrap().dismiss_passes
    }

    pub fn reveal_calls(&self) -> usize {
        self.state.lock().unwrap().reveal_calls
    }

    pub fn submit_clicks(&self) -> usize {
        self.state.lock().unwrap().submit_clicks
    }

    pub fn storage_value(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().storage.get(key).cloned()
    }

    fn advance_from(&self, state: &mut PageState) {
        let current = StepState::from_location(&state.location, FINISH_MARKER);
        let StepState::Step(n) = current else { return };
        if self.stuck_at == Some(n) {
            return;
        }
        let expected = self.codes.get(n as usize - 1);
        if state.entered_code.as_ref() != expected {
            return;
        }
        state.entered_code = None;
        state.location = if n >= self.total_steps {
            finish_url()
        } else {
            step_url(n + 1)
        };
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn open(&self, url: &str) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        // The SPA resumes wherever it was; only a fresh page lands on `url`.
        if state.location.is_empty() {
            state.location = url.to_string();
        }
        Ok(())
    }

    async fn location(&self) -> Result<String, PageError> {
        let mut state = self.state.lock().unwrap();
        if let Some(next) = state.location_feed.pop_front() {
            state.location = next;
        }
        Ok(state.location.clone())
    }

    async fn eval(&self, script: &str) -> Result<Value, PageError> {
        if self.fail_evals {
            return Err(PageError::Eval("scripted failure".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        if script.contains("dismissPass") {
            state.dismiss_passes += 1;
            return Ok(json!(0));
        }
        if script.contains("revealSecondary") {
            state.reveal_calls += 1;
            return Ok(json!(0));
        }
        if script.contains("commitCode") {
            if let Some(captures) = ENTERED_CODE_RE.captures(script) {
                state.entered_code = Some(captures[1].to_string());
            }
            return Ok(json!(true));
        }
        if script.contains("forceRoute") {
            if self.bypass_sticks {
                state.location = finish_url();
            }
            return Ok(Value::Null);
        }
        if script.contains("location.href") {
            let location = state.location.clone();
            return Ok(json!(location));
        }
        Ok(Value::Null)
    }

    async fn click_text(&self, label: &str) -> Result<bool, PageError> {
        let mut state = self.state.lock().unwrap();
        if scripts::SUBMIT_LABELS.contains(&label) {
            state.submit_clicks += 1;
            self.advance_from(&mut state);
            return Ok(true);
        }
        if scripts::ENTRY_LABELS.contains(&label) && state.location == BASE_URL {
            state.location = step_url(1);
            return Ok(true);
        }
        Ok(false)
    }

    async fn storage_get(&self, key: &str) -> Result<Option<String>, PageError> {
        Ok(self.state.lock().unwrap().storage.get(key).cloned())
    }

    async fn storage_set(&self, key: &str, value: &str) -> Result<(), PageError> {
        self.state
            .lock()
            .unwrap()
            .storage
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, PageError> {
        // PNG signature is enough for the artifact-writing paths.
        Ok(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
    }
}
