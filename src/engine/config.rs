// 12.0.1: engine runtime knobs, separate from protocol parameters.

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Echo every emitted event to stdout.
    pub verbose: bool,
    /// Cap on retained audit events; older ones are dropped.
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            max_events: 10_000,
        }
    }
}
