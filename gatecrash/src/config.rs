use std::time::Duration;

/// Tuning knobs for the advancement engine.
///
/// The iteration budget and the per-step timeout were tuned against the
/// target's observed latency; treat them as configuration, not constants.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Entry URL of the challenge flow.
    pub base_url: String,
    /// Expected number of gated steps, terminal step included.
    pub total_steps: u32,
    /// Step whose built-in validation never signals success; advanced via
    /// the router bypass instead. Explicitly designated, never inferred.
    pub bypass_step: u32,
    /// Maximum number of poll iterations before the run is declared
    /// exhausted. The only termination guarantee the engine has.
    pub max_iterations: u32,
    /// How long to wait for forward progress after one submission.
    pub step_timeout: Duration,
    /// Pause between location polls.
    pub poll_interval: Duration,
    /// Pause after actions that need the UI to settle.
    pub settle_delay: Duration,
    /// Number of dismissal passes per obstacle sweep.
    pub sweep_passes: u32,
    /// Pause between dismissal passes.
    pub sweep_pause: Duration,
    /// Client-storage key the target keeps the encrypted session blob under.
    pub session_storage_key: String,
    /// Repeating XOR key the target obfuscates the session blob with.
    pub session_key: String,
    /// Location fragment identifying the terminal page.
    pub finish_marker: String,
    /// Route the terminal-step bypass pushes onto the history stack.
    pub finish_route: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            total_steps: 30,
            bypass_step: 30,
            max_iterations: 120,
            step_timeout: Duration::from_millis(3500),
            poll_interval: Duration::from_millis(250),
            settle_delay: Duration::from_millis(600),
            sweep_passes: 3,
            sweep_pause: Duration::from_millis(350),
            session_storage_key: "challenge_session".to_string(),
            session_key: "c0d3g4t3".to_string(),
            finish_marker: "/finish".to_string(),
            finish_route: "/finish".to_string(),
        }
    }
}
