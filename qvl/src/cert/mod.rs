//! Certificate Path Builder: PEM extraction, leaf-to-root chain assembly,
//! and path validation (signatures, BasicConstraints/KeyUsage,
//! pathLenConstraint, validity windows).

mod chain;
mod pem;
mod validate;

use std::time::SystemTime;

use anyhow::{Context, Result};
use x509_parser::certificate::X509Certificate;

pub use chain::{AmbiguousChainError, ParsedChain};
pub use pem::extract_pem_certificates;
pub(crate) use validate::validate_chain;

/// Marker error distinguishing "no inline PCK chain and no fallback
/// certificates" from a generic broken chain, so callers can report
/// [`crate::error::VerifyError::MissingCertData`] instead of the catch-all
/// [`crate::error::VerifyError::BrokenChain`].
#[derive(Debug)]
pub struct MissingCertDataError;

impl std::fmt::Display for MissingCertDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no cert_data and no extra_certificates supplied")
    }
}

impl std::error::Error for MissingCertDataError {}

/// SHA-256 fingerprint of a DER-encoded certificate, used for pinned-root
/// matching.
pub fn compute_cert_sha256(der: &[u8]) -> [u8; 32] {
    let digest = ring::digest::digest(&ring::digest::SHA256, der);
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_ref());
    out
}

/// Assemble and fully validate the PCK certificate chain carried in a
/// quote's `cert_data`, supplementing the candidate pool with
/// caller-provided `extra_certificates`.
///
/// When `cert_data_pem` is empty (the `MissingCertData` case: the quote's
/// `cert_data_type` was 5 but the field itself was empty, or a caller is
/// supplying the whole chain out of band), the chain is instead assembled
/// from `extra_certificates` alone via [`chain::build_chain_from_bag`],
/// which identifies the unique leaf by elimination.
///
/// Returns the validated chain, leaf first.
pub fn verify_pck_chain(
    cert_data_pem: &[u8],
    extra_certificates: &[Vec<u8>],
    verification_time: SystemTime,
) -> Result<ParsedChain> {
    let built = if cert_data_pem.is_empty() {
        if extra_certificates.is_empty() {
            return Err(MissingCertDataError.into());
        }
        chain::build_chain_from_bag(extra_certificates)
            .context("failed to assemble certificate chain from extra_certificates")?
    } else {
        let quote_certs = extract_pem_certificates(cert_data_pem).context("PCK cert_data")?;
        let (leaf_der, rest) = quote_certs
            .split_first()
            .context("cert_data contained no certificates")?;

        let mut pool: Vec<Vec<u8>> = rest.to_vec();
        pool.extend(extra_certificates.iter().cloned());

        chain::build_chain(leaf_der, &pool).context("failed to assemble certificate chain")?
    };

    validate::validate_chain(&built.der, verification_time).context("certificate chain validation failed")?;

    Ok(built)
}

/// Extract the raw, uncompressed EC point (`x || y`, leading `0x04` tag
/// stripped) from a DER certificate's `SubjectPublicKeyInfo`.
pub fn extract_ec_point(der: &[u8]) -> Result<Vec<u8>> {
    let (_, cert) = X509Certificate::from_der(der).context("failed to parse certificate")?;
    let raw = cert.public_key().subject_public_key.as_ref();
    anyhow::ensure!(
        raw.first() == Some(&0x04),
        "public key is not an uncompressed EC point"
    );
    Ok(raw[1..].to_vec())
}

/// Find the raw extension value for `oid_dotted` on a parsed certificate, if
/// present.
pub fn find_extension_value<'a>(cert: &'a X509Certificate<'_>, oid_dotted: &str) -> Option<&'a [u8]> {
    cert.extensions()
        .iter()
        .find(|ext| crate::asn1::decode_oid(ext.oid.as_bytes()).ok().as_deref() == Some(oid_dotted))
        .map(|ext| ext.value)
}

/// Marker error distinguishing an actual revoked-serial hit from a
/// structural failure (bad CRL encoding, unparseable certificate) while
/// checking a chain against CRLs.
#[derive(Debug)]
pub struct RevokedCertError {
    pub serial_hex: String,
}

impl std::fmt::Display for RevokedCertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "certificate serial {} is revoked", self.serial_hex)
    }
}

impl std::error::Error for RevokedCertError {}

/// Check every certificate in `chain_der` against the union of `crls`,
/// failing on the first serial number found revoked.
pub fn check_chain_not_revoked(chain_der: &[Vec<u8>], crls: &[Vec<u8>]) -> Result<()> {
    if crls.is_empty() {
        return Ok(());
    }
    let revoked = crate::crl::parse_crls(crls).context("failed to parse CRLs")?;
    for der in chain_der {
        let (_, cert) = X509Certificate::from_der(der).context("failed to parse certificate")?;
        let serial_hex = crate::hex::encode(cert.raw_serial());
        if revoked.is_revoked(&serial_hex) {
            return Err(RevokedCertError { serial_hex }.into());
        }
    }
    Ok(())
}
