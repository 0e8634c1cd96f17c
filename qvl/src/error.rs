//! The flat, stable error taxonomy returned by every verify entry point.

use thiserror::Error;

/// Every way a verification call can fail.
///
/// Variants are intentionally flat (no nested error enums) so callers can
/// match on `kind` without walking a cause chain. Internal sub-steps use
/// `anyhow::Error` and get mapped to the closest variant at the public API
/// boundary; the human-readable detail (but never attacker-controlled bytes
/// verbatim) is preserved via `#[source]`/`Display`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("malformed quote: {0}")]
    MalformedQuote(String),

    #[error("unsupported version/tee_type/key_type combination: {0}")]
    UnsupportedVersion(String),

    #[error("no inline PCK certificate chain and no fallback certificates supplied")]
    MissingCertData,

    #[error("could not assemble a certificate chain from the supplied certificates: {0}")]
    BrokenChain(String),

    #[error("more than one candidate certificate matches the same issuer or no unique leaf could be identified: {0}")]
    AmbiguousChain(String),

    #[error("certificate chain violates BasicConstraints/KeyUsage/pathLen: {0}")]
    InvalidChain(String),

    #[error("ECDSA signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("a certificate is outside its validity window at the verification time")]
    Expired,

    #[error("a chain certificate's serial number appears in a supplied CRL")]
    Revoked,

    #[error("the terminal root certificate's fingerprint is not in the pinned set")]
    UnpinnedRoot,

    #[error("report_data does not equal the expected value for the configured binding mode")]
    BindingMismatch,

    #[error("QE report_data does not equal SHA-256(attestation_public_key || qe_auth_data)")]
    QeBindingMismatch,

    #[error("caller-supplied expected measurement differs from the quote")]
    MeasurementMismatch,

    #[error("no entry in the TCB Info document satisfies the platform's SVNs")]
    NoMatchingTcbLevel,

    #[error("TCB Info is past its next_update and freshness enforcement is enabled")]
    StaleTcbInfo,

    #[error("matched TCB level has status other than UpToDate and enforcement is active")]
    TcbOutOfDate,

    #[error("QE identity fields differ from the supplied QE Identity document")]
    QeIdentityMismatch,

    #[error("SEV-SNP policy violation: {0}")]
    SevSnpPolicyViolation(String),
}

/// Narrow an internal [`anyhow::Error`] to a [`VerifyError`] variant,
/// preserving the message as context but never embedding attacker-controlled
/// bytes unmodified — callers building the `anyhow::Error` are responsible
/// for only including decoded/validated values in their context strings.
pub(crate) trait MapVerifyErr<T> {
    fn malformed(self) -> Result<T, VerifyError>;
    fn unsupported(self) -> Result<T, VerifyError>;
    fn broken_chain(self) -> Result<T, VerifyError>;
    /// Like [`Self::broken_chain`], but recognizes the chain builder's
    /// [`crate::cert::AmbiguousChainError`] and
    /// [`crate::cert::MissingCertDataError`] markers and reports
    /// [`VerifyError::AmbiguousChain`] / [`VerifyError::MissingCertData`]
    /// instead of the generic [`VerifyError::BrokenChain`].
    fn chain_result(self) -> Result<T, VerifyError>;
    fn invalid_chain(self) -> Result<T, VerifyError>;
    fn invalid_signature(self) -> Result<T, VerifyError>;
}

impl<T> MapVerifyErr<T> for anyhow::Result<T> {
    fn malformed(self) -> Result<T, VerifyError> {
        self.map_err(|e| VerifyError::MalformedQuote(format!("{e:#}")))
    }

    fn unsupported(self) -> Result<T, VerifyError> {
        self.map_err(|e| VerifyError::UnsupportedVersion(format!("{e:#}")))
    }

    fn broken_chain(self) -> Result<T, VerifyError> {
        self.map_err(|e| VerifyError::BrokenChain(format!("{e:#}")))
    }

    fn chain_result(self) -> Result<T, VerifyError> {
        self.map_err(|e| {
            if e.downcast_ref::<crate::cert::AmbiguousChainError>().is_some() {
                VerifyError::AmbiguousChain(format!("{e:#}"))
            } else if e.downcast_ref::<crate::cert::MissingCertDataError>().is_some() {
                VerifyError::MissingCertData
            } else {
                VerifyError::BrokenChain(format!("{e:#}"))
            }
        })
    }

    fn invalid_chain(self) -> Result<T, VerifyError> {
        self.map_err(|e| VerifyError::InvalidChain(format!("{e:#}")))
    }

    fn invalid_signature(self) -> Result<T, VerifyError> {
        self.map_err(|e| VerifyError::InvalidSignature(format!("{e:#}")))
    }
}
