//! SGX quote verification orchestrator: wires together quote parsing, PCK
//! chain validation, QE report and quote signature verification, and the
//! optional TCB/QE Identity/measurement/binding checks a caller's
//! [`crate::config::VerifyConfig`] asks for.

use anyhow::Context;
use x509_parser::certificate::X509Certificate;

use crate::cert;
use crate::config::{MeasurementKind, VerifyConfig};
use crate::ecdsa::{self, SigAlgo};
use crate::error::{MapVerifyErr, VerifyError};
use crate::intel_ext;
use crate::qe_identity;
use crate::quote::{self, SgxQuote};
use crate::result::{BindingOutcome, VerifiedSgx};
use crate::tcb;

/// Verify a raw SGX DCAP v3 quote against `config`.
pub fn verify_sgx(quote_bytes: &[u8], config: &VerifyConfig) -> Result<VerifiedSgx, VerifyError> {
    let quote: SgxQuote = quote::parse_sgx_quote(quote_bytes).malformed()?;
    tracing::debug!(mr_enclave = %quote.report_body.mr_enclave, "parsed SGX quote");

    let verification_time = config.verification_time();
    let chain = cert::verify_pck_chain(
        &quote.signature.cert_data,
        &config.extra_certificates,
        verification_time,
    )
    .chain_result()?;

    // Always enforced, never gated on the pinned set being non-empty: an
    // empty set means "trust nothing", not "skip the check" (see
    // pinned_roots.rs).
    let pinned = config.pinned_sgx_tdx_roots();
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

    let (_, leaf_cert) = X509Certificate::from_der(&chain.der[0])
        .context("failed to parse PCK leaf certificate")
        .invalid_chain()?;
    let leaf_pubkey_xy = cert::extract_ec_point(&chain.der[0])
        .context("PCK leaf public key")
        .invalid_chain()?;
    let leaf_pubkey_xy: [u8; 64] = leaf_pubkey_xy
        .try_into()
        .map_err(|_| VerifyError::InvalidChain("PCK leaf public key is not a P-256 point".into()))?;

    // QE report is signed by the PCK leaf.
    let qe_algo = ecdsa::p256_verify_with_fallback(
        &leaf_pubkey_xy,
        &quote.signature.qe_report_raw,
        &quote.signature.qe_report_signature,
        &SigAlgo::QE_REPORT_FALLBACK_ORDER,
    )
    .context("QE report signature verification failed")
    .invalid_signature()?;
    tracing::debug!(?qe_algo, "QE report signature verified");

    // QE report binds the ephemeral attestation key: report_data must equal
    // SHA-256(attestation_public_key || qe_auth_data), tolerating a raw
    // 64-byte key or one with the 0x04 uncompressed-point tag prepended.
    verify_qe_binding(
        quote.signature.qe_report.report_data.as_array(),
        &quote.signature.attestation_public_key,
        &quote.signature.qe_auth_data,
    )?;

    // The quote itself is signed by the ephemeral attestation key, SHA-256/P1363 only.
    ecdsa::p256_verify(
        &quote.signature.attestation_public_key,
        &quote.signed_region,
        &quote.signature.quote_signature,
        SigAlgo::Sha256P1363,
    )
    .context("quote signature verification failed")
    .invalid_signature()?;

    let tcb_match = match &config.tcb_info {
        Some(doc) => {
            tcb::verify_tcb_info_signature(
                &doc.raw_body,
                &doc.signature,
                &doc.issuer_chain_pem,
                &pinned,
                verification_time,
            )
            .context("TCB Info signature verification failed")
            .invalid_signature()?;

            let ext_value = cert::find_extension_value(&leaf_cert, intel_ext::SGX_EXTENSION_OID)
                .context("PCK leaf is missing the Intel SGX extension")
                .invalid_chain()?;
            let platform = intel_ext::decode_platform_tcb(ext_value)
                .context("failed to decode Intel SGX extension")
                .invalid_chain()?;
            let now_unix = verification_time
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            Some(tcb::evaluate_tcb(
                &platform,
                &doc.tcb_info,
                now_unix,
                config.enforce_fresh_tcb_info,
                config.enforce_up_to_date,
            )?)
        }
        None => None,
    };

    let qe_identity_match = match &config.qe_identity {
        Some(doc) => Some(qe_identity::verify_qe_identity(
            &quote.signature.qe_report,
            &doc.enclave_identity,
        )?),
        None => None,
    };

    if let Some(expected) = config.expected_measurements.get(&MeasurementKind::MrEnclave) {
        if quote.report_body.mr_enclave.as_slice() != expected.as_slice() {
            return Err(VerifyError::MeasurementMismatch);
        }
    }
    if let Some(expected) = config.expected_measurements.get(&MeasurementKind::MrSigner) {
        if quote.report_body.mr_signer.as_slice() != expected.as_slice() {
            return Err(VerifyError::MeasurementMismatch);
        }
    }

    let binding = match config.expected_report_data {
        Some(expected) => {
            crate::binding::verify_direct_binding(quote.report_body.report_data.as_array(), &expected)?;
            BindingOutcome::DirectMatched
        }
        None => BindingOutcome::NotChecked,
    };

    Ok(VerifiedSgx {
        header: quote.header,
        report_body: quote.report_body,
        chain: chain.der,
        tcb: tcb_match,
        qe_identity: qe_identity_match,
        binding,
    })
}

fn verify_qe_binding(
    qe_report_data: &[u8; 64],
    attestation_public_key: &[u8; 64],
    qe_auth_data: &[u8],
) -> Result<(), VerifyError> {
    let mut preimage_raw = Vec::with_capacity(64 + qe_auth_data.len());
    preimage_raw.extend_from_slice(attestation_public_key);
    preimage_raw.extend_from_slice(qe_auth_data);
    let digest_raw = ring::digest::digest(&ring::digest::SHA256, &preimage_raw);

    let mut prefixed = Vec::with_capacity(65);
    prefixed.push(0x04);
    prefixed.extend_from_slice(attestation_public_key);
    let mut preimage_prefixed = Vec::with_capacity(65 + qe_auth_data.len());
    preimage_prefixed.extend_from_slice(&prefixed);
    preimage_prefixed.extend_from_slice(qe_auth_data);
    let digest_prefixed = ring::digest::digest(&ring::digest::SHA256, &preimage_prefixed);

    if qe_report_data[..32] == digest_raw.as_ref()[..]
        || qe_report_data[..32] == digest_prefixed.as_ref()[..]
    {
        Ok(())
    } else {
        Err(VerifyError::QeBindingMismatch)
    }
}
