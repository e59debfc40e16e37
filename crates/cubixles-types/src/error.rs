/// Reason a write request failed authorization.
///
/// `reason()` strings are a compatibility surface for existing clients and
/// must stay stable; `code()` is the machine-readable twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingNonce,
    MalformedNonce,
    InvalidNonceSignature,
    Expired,
    Replayed,
    MissingCredentials,
    InvalidAddress,
    SignatureMismatch,
    BackendUnavailable,
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingNonce => "Missing nonce",
            Self::MalformedNonce => "Invalid nonce format",
            Self::InvalidNonceSignature => "Invalid nonce signature",
            Self::Expired => "Nonce expired",
            Self::Replayed => "Nonce already used",
            Self::MissingCredentials => "Missing address or signature",
            Self::InvalidAddress => "Invalid address",
            Self::SignatureMismatch => "Signature mismatch",
            Self::BackendUnavailable => "Replay tracking unavailable",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingNonce => "missing_nonce",
            Self::MalformedNonce => "malformed_nonce",
            Self::InvalidNonceSignature => "invalid_nonce_signature",
            Self::Expired => "nonce_expired",
            Self::Replayed => "nonce_replayed",
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidAddress => "invalid_address",
            Self::SignatureMismatch => "signature_mismatch",
            Self::BackendUnavailable => "backend_unavailable",
        }
    }

    /// Malformed input is rejected before any backend or RPC call is made.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MissingNonce | Self::MalformedNonce | Self::MissingCredentials | Self::InvalidAddress
        )
    }

    /// Only a replayed nonce warrants fetching a fresh nonce and retrying once.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Replayed)
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

impl std::error::Error for Rejection {}
