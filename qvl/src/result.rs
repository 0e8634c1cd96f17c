//! What a successful `verify_sgx`/`verify_tdx`/`verify_sev_snp` call returns:
//! the parsed evidence, the validated certificate chain, and the outcome of
//! every optional check the caller's [`crate::config::VerifyConfig`] asked
//! for.

use crate::amd_ext::AmdProcessor;
use crate::byte_array::ByteArray;
use crate::qe_identity::QeIdentityMatch;
use crate::quote::header::QuoteHeader;
use crate::quote::sevsnp::SevSnpReport;
use crate::quote::sgx::SgxReportBody;
use crate::quote::tdx::TdReportBody;
use crate::tcb::TcbMatch;

/// Whether, and how, the quote/report's `report_data` was checked against a
/// caller-supplied expected value.
///
/// Only the direct-binding mode is evaluated inside the orchestrator (it
/// needs no inputs beyond `VerifyConfig::expected_report_data`). The Azure
/// vTPM and SEV-SNP nonce-based bindings take additional caller-side inputs
/// and are invoked directly against `report_data` via [`crate::binding`]'s
/// exported helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOutcome {
    /// `VerifyConfig::expected_report_data` was set and matched.
    DirectMatched,
    /// No expected `report_data` was supplied; the caller is expected to
    /// check binding itself using the returned `report_data`.
    NotChecked,
}

/// The result of successfully verifying an SGX quote.
#[derive(Debug, Clone)]
pub struct VerifiedSgx {
    pub header: QuoteHeader,
    pub report_body: SgxReportBody,
    /// The validated PCK chain, leaf first, DER-encoded.
    pub chain: Vec<Vec<u8>>,
    pub tcb: Option<TcbMatch>,
    pub qe_identity: Option<QeIdentityMatch>,
    pub binding: BindingOutcome,
}

impl VerifiedSgx {
    pub fn report_data(&self) -> &[u8; 64] {
        self.report_body.report_data.as_array()
    }
}

/// The result of successfully verifying a TDX quote.
#[derive(Debug, Clone)]
pub struct VerifiedTdx {
    pub header: QuoteHeader,
    pub report_body: TdReportBody,
    pub chain: Vec<Vec<u8>>,
    pub tcb: Option<TcbMatch>,
    pub qe_identity: Option<QeIdentityMatch>,
    pub binding: BindingOutcome,
}

impl VerifiedTdx {
    pub fn report_data(&self) -> &[u8; 64] {
        self.report_body.report_data().as_array()
    }
}

/// The result of successfully verifying a SEV-SNP attestation report.
#[derive(Debug, Clone)]
pub struct VerifiedSevSnp {
    pub report: SevSnpReport,
    /// The validated VCEK/ASK/ARK chain, leaf (VCEK) first, DER-encoded.
    pub chain: Vec<Vec<u8>>,
    pub processor: AmdProcessor,
    pub binding: BindingOutcome,
}

impl VerifiedSevSnp {
    pub fn report_data(&self) -> &[u8; 64] {
        self.report.report_data.as_array()
    }
}
