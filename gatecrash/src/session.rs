//! Recovery of the step-code table from the captured session blob.
//!
//! The target keeps an obfuscated snapshot of the full code list in
//! client-side storage: JSON, XORed with a fixed repeating key, base64
//! encoded. It is captured exactly once, right after entering the flow,
//! and never re-fetched.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use tracing::debug;

use crate::errors::DecodeError;

#[derive(Debug, Deserialize)]
struct SessionDocument {
    codes: Vec<String>,
}

/// Ordered list of step codes, read-only once extracted.
#[derive(Debug, Clone)]
pub struct CodeTable {
    codes: Vec<String>,
}

impl CodeTable {
    /// Decode the captured blob: base64, then the target's repeating-key
    /// XOR, then JSON. A blob that fails any stage leaves no path forward.
    pub fn extract(raw_blob: &str, key: &str) -> Result<Self, DecodeError> {
        let obfuscated = BASE64.decode(raw_blob.trim())?;
        let plain = xor_with_key(&obfuscated, key.as_bytes());
        let document: SessionDocument = serde_json::from_slice(&plain)?;
        if document.codes.is_empty() {
            return Err(DecodeError::EmptyCodeList);
        }
        debug!(codes = document.codes.len(), "session blob decoded");
        Ok(Self {
            codes: document.codes,
        })
    }

    /// Code for a 1-based step index. Indices beyond the table fall back to
    /// the last entry: the terminal step sits past the table on some
    /// captures, and absence of an exact entry is expected there.
    pub fn code_for(&self, step: u32) -> &str {
        let idx = (step.max(1) as usize - 1).min(self.codes.len() - 1);
        &self.codes[idx]
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Symmetric repeating-key XOR. Applying it twice with the same key is the
/// identity, so the one primitive both encodes and decodes.
pub fn xor_with_key(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}
