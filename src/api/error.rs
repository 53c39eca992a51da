use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Connect failure, timeout or a dropped body.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx answer, or a 2xx carrying an `{"error": ...}` envelope.
    #[error("server returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// An action endpoint answered `status: "error"`.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Reads `{"error": "..."}` or `{"detail": "..."}` out of a failure body.
    pub fn from_status(code: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct Envelope {
            #[serde(alias = "detail")]
            error: serde_json::Value,
        }

        let body = match serde_json::from_str::<Envelope>(body) {
            Ok(Envelope {
                error: serde_json::Value::String(msg),
            }) => msg,
            Ok(Envelope { error }) => error.to_string(),
            Err(_) => body.trim().to_string(),
        };
        Self::Status { code, body }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                code: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_error_envelopes() {
        match ApiError::from_status(500, r#"{"error": "no such table: today_signals"}"#) {
            ApiError::Status { code, body } => {
                assert_eq!(code, 500);
                assert_eq!(body, "no such table: today_signals");
            }
            other => panic!("unexpected {other:?}"),
        }
        match ApiError::from_status(404, "Not Found\n") {
            ApiError::Status { body, .. } => assert_eq!(body, "Not Found"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
