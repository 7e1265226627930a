use thiserror::Error;

/// Failures of the consumed browser capability.
#[derive(Error, Debug)]
pub enum PageError {
    #[error("DevTools endpoint unreachable: {0}")]
    Endpoint(String),

    #[error("Script evaluation failed: {0}")]
    Eval(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Screenshot capture failed: {0}")]
    Screenshot(String),
}

/// Failures while recovering the code table from the captured session blob.
///
/// Any of these is fatal to a run: without codes no step can be advanced.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("session blob missing from client storage under key '{0}'")]
    MissingBlob(String),

    #[error("session blob is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded session is not parseable JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session document contains no codes")]
    EmptyCodeList,
}

/// Fatal, run-aborting error. Everything else the target throws at the
/// engine is absorbed locally and retried on the next poll.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Page(#[from] PageError),
}
