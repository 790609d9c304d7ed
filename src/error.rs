use thiserror::Error;

/// Failure of a single provider call. Absorbed by the aggregator unless it
/// leaves no metadata at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Not found")]
    NotFound,

    #[error("Rate limited")]
    RateLimited,

    #[error("Timed out")]
    Timeout,

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether retrying later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Timeout | ProviderError::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Unavailable(e.to_string())
        }
    }
}

/// How a failed analysis is presented to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidRequest,
    InvalidToken,
    UnsupportedNetwork,
    TemporarilyUnavailable,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid token address: {0}")]
    InvalidAddress(String),

    #[error("Conversation ID is required")]
    MissingConversation,

    #[error("Insufficient data: primary metadata {primary}, secondary metadata {secondary}")]
    InsufficientData {
        primary: ProviderError,
        secondary: ProviderError,
    },

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Reply generation failed: {0}")]
    ReplyUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AnalysisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalysisError::MissingConversation => FailureKind::InvalidRequest,
            AnalysisError::InvalidAddress(_) => FailureKind::InvalidToken,
            AnalysisError::InsufficientData { primary, secondary } => {
                if primary.is_transient() && secondary.is_transient() {
                    FailureKind::TemporarilyUnavailable
                } else {
                    FailureKind::InvalidToken
                }
            }
            AnalysisError::UnsupportedNetwork(_) => FailureKind::UnsupportedNetwork,
            AnalysisError::ReplyUnavailable(_) | AnalysisError::Storage(_) => {
                FailureKind::TemporarilyUnavailable
            }
        }
    }

    /// Short message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match (self.kind(), self) {
            (_, AnalysisError::UnsupportedNetwork(network)) => format!(
                "Token analysis is not supported on the {} network yet.",
                network
            ),
            (FailureKind::InvalidRequest, _) => self.to_string(),
            (FailureKind::InvalidToken, _) => {
                "This token could not be found. Please check the address and try again.".to_string()
            }
            _ => "Token data providers are temporarily unavailable. Please try again in a moment."
                .to_string(),
        }
    }
}

impl From<sled::Error> for AnalysisError {
    fn from(e: sled::Error) -> Self {
        AnalysisError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(e: serde_json::Error) -> Self {
        AnalysisError::Storage(e.to_string())
    }
}
