//! `VerifyConfig`: the options every public verify entry point accepts.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::pinned_roots::PinnedRoots;
use crate::qe_identity::QeIdentityDocument;
use crate::tcb::TcbInfoDocument;

/// Which measurement field an `expected_measurements` entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    MrEnclave,
    MrSigner,
    MrTd,
    SevSnpMeasurement,
}

/// AMD SEV-SNP policy enforcement knobs.
#[derive(Debug, Clone, Copy)]
pub struct SevSnpPolicy {
    pub allow_debug: bool,
    pub max_vmpl: u8,
}

impl Default for SevSnpPolicy {
    fn default() -> Self {
        Self {
            allow_debug: false,
            max_vmpl: 0,
        }
    }
}

/// Options controlling a single verify call. Every verify entry point is
/// otherwise a pure function of its quote/report bytes and this config.
#[derive(Debug, Clone, Default)]
pub struct VerifyConfig {
    /// DER-encoded CRLs; revoked-serial union is tested against every chain
    /// certificate.
    pub crls: Vec<Vec<u8>>,
    /// Overrides the embedded vendor root fingerprint set when `Some`.
    pub pinned_roots: Option<PinnedRoots>,
    /// Defaults to the caller's wall-clock time if unset.
    pub verification_time: Option<SystemTime>,
    /// Supplemental certificates, e.g. a missing intermediate, or the
    /// entire chain when `cert_data` is absent from the quote.
    pub extra_certificates: Vec<Vec<u8>>,
    pub tcb_info: Option<TcbInfoDocument>,
    pub qe_identity: Option<QeIdentityDocument>,
    pub enforce_up_to_date: bool,
    pub enforce_fresh_tcb_info: bool,
    pub expected_measurements: HashMap<MeasurementKind, Vec<u8>>,
    pub sevsnp_policy: SevSnpPolicy,
    /// Direct binding mode: when set, the orchestrator checks the
    /// quote/report's `report_data` equals this value.
    ///
    /// The Azure vTPM and SEV-SNP nonce-based bindings need inputs
    /// (`runtime_data`, `nonce`) this config doesn't model; for those,
    /// call [`crate::binding::verify_azure_vtpm_binding`] or
    /// [`crate::binding::verify_sevsnp_binding`] directly against the
    /// `report_data` on the returned verification result.
    pub expected_report_data: Option<[u8; 64]>,
}

impl VerifyConfig {
    pub fn verification_time(&self) -> SystemTime {
        self.verification_time.unwrap_or_else(SystemTime::now)
    }

    pub fn pinned_sgx_tdx_roots(&self) -> PinnedRoots {
        self.pinned_roots
            .clone()
            .unwrap_or_else(crate::pinned_roots::intel_sgx_default_roots)
    }

    pub fn pinned_sevsnp_roots(&self) -> PinnedRoots {
        self.pinned_roots
            .clone()
            .unwrap_or_else(crate::pinned_roots::amd_sev_snp_default_roots)
    }
}

/// Convenience constructor from a unix-millisecond timestamp, the wire
/// convention quote/report timestamps are typically passed in.
pub fn verification_time_from_unix_millis(ms: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_millis(ms)
}
