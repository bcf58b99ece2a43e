use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("integrity error: tool call result {result_id} references unknown call id {call_id}")]
    Integrity { result_id: String, call_id: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("malformed stream event: {0}")]
    MalformedEvent(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_error() {
        let err = CoreError::InvalidState("message is finished".to_string());
        assert_eq!(err.to_string(), "invalid state: message is finished");
    }

    #[test]
    fn test_integrity_error() {
        let err = CoreError::Integrity {
            result_id: "r1".to_string(),
            call_id: "c9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "integrity error: tool call result r1 references unknown call id c9"
        );
    }

    #[test]
    fn test_config_error() {
        let err = CoreError::Config("missing build configuration".to_string());
        assert_eq!(err.to_string(), "config error: missing build configuration");
    }

    #[test]
    fn test_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json");
        let err = CoreError::from(json_err.unwrap_err());
        assert!(err.to_string().contains("expected value"));
    }
}
