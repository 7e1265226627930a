use async_trait::async_trait;
use serde_json::Value;

use crate::errors::PageError;

/// The browser capability the engine consumes.
///
/// The engine never talks to a browser directly; everything it needs from
/// the target page goes through this trait, so the control loop can be
/// driven against a scripted page in tests and against a live DevTools
/// endpoint in production.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate the page to `url`.
    async fn open(&self, url: &str) -> Result<(), PageError>;

    /// Current location of the page (`location.href`).
    async fn location(&self) -> Result<String, PageError>;

    /// Evaluate a script against the live document and return its value.
    async fn eval(&self, script: &str) -> Result<Value, PageError>;

    /// Click the first interactive element whose visible label matches
    /// `label`, case-insensitively. Returns whether anything was clicked.
    async fn click_text(&self, label: &str) -> Result<bool, PageError>;

    /// Read a key from the page's client-side storage.
    async fn storage_get(&self, key: &str) -> Result<Option<String>, PageError>;

    /// Write a key into the page's client-side storage.
    async fn storage_set(&self, key: &str, value: &str) -> Result<(), PageError>;

    /// Capture a full-page screenshot as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, PageError>;
}
