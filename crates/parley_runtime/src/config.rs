//! Runtime configuration for parley

use std::str::FromStr;
use std::time::Duration;

/// How the assembler decides a streamed tool call is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolCallCompletion {
    /// Only a fragment with `closed = true` (or with structured arguments) completes the call.
    #[default]
    ExplicitClose,
    /// Additionally complete as soon as the concatenated payload parses as a JSON object.
    ParseAttempt,
}

impl ToolCallCompletion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCallCompletion::ExplicitClose => "explicit_close",
            ToolCallCompletion::ParseAttempt => "parse_attempt",
        }
    }
}

impl FromStr for ToolCallCompletion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "explicit_close" | "close" => Ok(ToolCallCompletion::ExplicitClose),
            "parse_attempt" | "parse" => Ok(ToolCallCompletion::ParseAttempt),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ToolCallCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Tool-call completion detection
    pub completion: ToolCallCompletion,
    /// Upper bound for one tool execution
    pub tool_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            completion: ToolCallCompletion::default(),
            tool_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_completion(mut self, completion: ToolCallCompletion) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(completion) = std::env::var("PARLEY_TOOL_CALL_COMPLETION") {
            if let Ok(val) = completion.parse::<ToolCallCompletion>() {
                config.completion = val;
            }
        }

        if let Ok(timeout) = std::env::var("PARLEY_TOOL_TIMEOUT_SECS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.tool_timeout = Duration::from_secs(val);
            }
        }

        config
    }
}
