//! Attestation quote verification library (QVL): a pure computation core
//! that parses binary attestation evidence produced by Intel SGX, Intel
//! TDX, and AMD SEV-SNP hardware and decides whether it establishes a
//! complete chain of trust from a pinned hardware-vendor root CA down to an
//! application-provided public key bound into the report.
//!
//! This crate performs no I/O: fetching PCS material (TCB Info, QE
//! Identity, CRLs), caching, and quote production are all external
//! collaborators' responsibility. Every entry point here is a pure function
//! of its input bytes and a [`config::VerifyConfig`].
//!
//! The three orchestrators -- [`verify_sgx`], [`verify_tdx`],
//! [`verify_sev_snp`] -- are the façade most callers want. The remaining
//! public modules expose the individual sub-steps (binary parsing,
//! certificate chain building, ECDSA verification, TCB/QE Identity
//! evaluation, binding helpers) for callers that need to invoke them
//! directly, e.g. to evaluate a binding mode this crate doesn't model in
//! [`config::VerifyConfig`].

mod amd_ext;
mod asn1;
pub mod binding;
pub mod byte_array;
pub mod cert;
pub mod config;
pub mod crl;
pub mod ecdsa;
pub mod error;
pub mod hex;
mod intel_ext;
pub mod pinned_roots;
pub mod qe_identity;
pub mod quote;
pub mod result;
mod sevsnp;
mod sgx;
pub mod tcb;
mod tdx;

pub use amd_ext::AmdProcessor;
pub use config::{MeasurementKind, SevSnpPolicy, VerifyConfig};
pub use error::VerifyError;
pub use quote::{parse_sev_snp_report, parse_sgx_quote, parse_tdx_quote, SgxQuote, TdxQuote};
pub use result::{BindingOutcome, VerifiedSevSnp, VerifiedSgx, VerifiedTdx};
pub use sevsnp::verify_sev_snp;
pub use sgx::verify_sgx;
pub use tdx::verify_tdx;

// Re-exported so callers assembling their own verification pipeline (or
// implementing one of the binding modes not covered by `VerifyConfig`) don't
// need to depend on this crate's internal module paths directly.
pub use binding::get_azure_expected_report_data;
pub use cert::{compute_cert_sha256, extract_pem_certificates, verify_pck_chain};
pub use qe_identity::verify_qe_identity;
pub use tcb::{evaluate_tcb, verify_tcb_info_signature};
