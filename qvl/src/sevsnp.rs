//! AMD SEV-SNP attestation report verification orchestrator: wires together
//! report parsing, guest policy enforcement, the VCEK/ASK/ARK chain
//! (assembled entirely from caller-supplied certificates -- unlike DCAP
//! quotes, a SEV-SNP report carries no inline certificate data), the P-384
//! signature over the report, and the optional measurement/binding checks a
//! caller's [`crate::config::VerifyConfig`] asks for.

use anyhow::Context;
use x509_parser::certificate::X509Certificate;

use crate::amd_ext;
use crate::cert;
use crate::config::{MeasurementKind, SevSnpPolicy, VerifyConfig};
use crate::ecdsa;
use crate::error::{MapVerifyErr, VerifyError};
use crate::quote::{self, sevsnp::SevSnpReport};
use crate::result::{BindingOutcome, VerifiedSevSnp};

/// Bit 19 of the SEV-SNP `GUEST_POLICY` field: debugging (and therefore
/// plaintext memory access) is permitted for the guest.
const POLICY_DEBUG_BIT: u64 = 1 << 19;

/// Verify a raw SEV-SNP `ATTESTATION_REPORT` against `config`.
///
/// The VCEK/ASK/ARK chain must be supplied entirely via
/// `config.extra_certificates`, since the report itself carries no inline
/// certificate data.
pub fn verify_sev_snp(report_bytes: &[u8], config: &VerifyConfig) -> Result<VerifiedSevSnp, VerifyError> {
    let report: SevSnpReport = quote::parse_sev_snp_report(report_bytes).malformed()?;
    tracing::debug!(version = report.version, vmpl = report.vmpl, "parsed SEV-SNP report");

    if report.version != 2 && report.version != 5 {
        return Err(VerifyError::UnsupportedVersion(format!(
            "SEV-SNP report version {}, only 2 and 5 are supported",
            report.version
        )));
    }

    check_policy(&report, &config.sevsnp_policy)?;

    let verification_time = config.verification_time();
    let chain = cert::verify_pck_chain(&[], &config.extra_certificates, verification_time).chain_result()?;

    // Always enforced, never gated on the pinned set being non-empty: an
    // empty set means "trust nothing", not "skip the check" (see
    // pinned_roots.rs -- no AMD ARK fingerprints are embedded yet, so this
    // fails closed by default until the caller supplies pinned_roots).
    let pinned = config.pinned_sevsnp_roots();
    let root_der = chain.der.last().expect("validated chain is never empty");
    if !pinned.contains_der(root_der) {
        return Err(VerifyError::UnpinnedRoot);
    }

    if !config.crls.is_empty() {
        if let Err(e) = cert::check_chain_not_revoked(&chain.der, &config.crls) {
            if e.downcast_ref::<cert::RevokedCertError>().is_some() {
                tracing::warn!(error = %e, "chain certificate is revoked");
                return Err(VerifyError::Revoked);
            }
            return Err(VerifyError::BrokenChain(format!("{e:#}")));
        }
    }

    let (_, vcek_cert) = X509Certificate::from_der(&chain.der[0])
        .context("failed to parse VCEK leaf certificate")
        .invalid_chain()?;
    let vcek_pubkey_xy = cert::extract_ec_point(&chain.der[0])
        .context("VCEK leaf public key")
        .invalid_chain()?;
    let vcek_pubkey_xy: [u8; 96] = vcek_pubkey_xy
        .try_into()
        .map_err(|_| VerifyError::InvalidChain("VCEK leaf public key is not a P-384 point".into()))?;

    ecdsa::p384_verify_le_r_s(&vcek_pubkey_xy, &report.signed_region, report.signature_r_s())
        .context("SEV-SNP report signature verification failed")
        .invalid_signature()?;
    tracing::debug!("SEV-SNP report signature verified");

    let processor = amd_ext::detect_processor(report.chip_id.as_array())
        .context("failed to detect AMD processor family")
        .invalid_chain()?;

    let vcek_tcb = amd_ext::decode_vcek_tcb(&vcek_cert)
        .context("failed to decode VCEK TCB extensions")
        .invalid_chain()?;
    amd_ext::cross_check_tcb(&vcek_tcb, &report.reported_tcb)
        .context("VCEK TCB extensions disagree with the report's reported_tcb")
        .invalid_chain()?;

    if let Some(expected) = config.expected_measurements.get(&MeasurementKind::SevSnpMeasurement) {
        if report.measurement.as_slice() != expected.as_slice() {
            return Err(VerifyError::MeasurementMismatch);
        }
    }

    let binding = match config.expected_report_data {
        Some(expected) => {
            crate::binding::verify_direct_binding(report.report_data.as_array(), &expected)?;
            BindingOutcome::DirectMatched
        }
        None => BindingOutcome::NotChecked,
    };

    Ok(VerifiedSevSnp {
        report,
        chain: chain.der,
        processor,
        binding,
    })
}

fn check_policy(report: &SevSnpReport, policy: &SevSnpPolicy) -> Result<(), VerifyError> {
    let debug_allowed = report.policy & POLICY_DEBUG_BIT != 0;
    if debug_allowed && !policy.allow_debug {
        return Err(VerifyError::SevSnpPolicyViolation(
            "guest policy permits debug mode, which the caller's policy disallows".into(),
        ));
    }
    if report.vmpl > policy.max_vmpl as u32 {
        return Err(VerifyError::SevSnpPolicyViolation(format!(
            "report vmpl {} exceeds the caller's max_vmpl {}",
            report.vmpl, policy.max_vmpl
        )));
    }
    Ok(())
}
