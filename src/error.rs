use thiserror::Error;

#[derive(Error, Debug)]
pub enum CircaError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("no wallet provider available")]
    WalletUnavailable,

    #[error("wallet error: {message}")]
    Wallet { code: Option<i32>, message: String },

    #[error("signing error: {0}")]
    Signing(String),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("draft storage error: {0}")]
    Storage(String),

    #[error("cannot {action} while {stage}")]
    InvalidStage {
        action: &'static str,
        stage: &'static str,
    },
}

/// The EIP-1193 code a provider returns when the user dismisses a prompt.
pub const USER_REJECTED_REQUEST: i32 = 4001;

impl CircaError {
    /// True when a wallet prompt was dismissed by the user rather than
    /// failing. Rejections are treated as a cancel, not a failure.
    pub fn is_user_rejection(&self) -> bool {
        match self {
            CircaError::Wallet { code, message } => {
                *code == Some(USER_REJECTED_REQUEST) || message.contains("rejected")
            }
            _ => false,
        }
    }

    /// True for a 401 whose message indicates the server-side signup
    /// session is gone. The flow restarts from scratch on these.
    pub fn is_session_expired(&self) -> bool {
        match self {
            CircaError::Api { status: 401, message } => {
                message.contains("session")
                    || message.contains("expired")
                    || message.contains("nonce")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CircaError>;
