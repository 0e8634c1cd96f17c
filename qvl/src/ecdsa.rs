//! ECDSA P-256/P-384 signature verification with flexible signature
//! encoding and hash-algorithm fallback.
//!
//! `ring`'s ECDSA verifiers only expose the fixed curve+hash pairs it was
//! compiled for, so the hash-fallback loop below uses the RustCrypto
//! `p256`/`p384` + `ecdsa` crates, which can verify a prehashed digest of
//! any length against either curve.

use anyhow::{bail, Context, Result};
use ecdsa::signature::hazmat::PrehashVerifier;

/// The signature-encoding + hash-algorithm combinations this crate will try,
/// in the deterministic order specified for QE report verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigAlgo {
    Sha256Der,
    Sha256P1363,
    Sha384Der,
    Sha384P1363,
    Sha512Der,
    Sha512P1363,
}

impl SigAlgo {
    /// The ordering used for QE report signature verification: try SHA-256
    /// first, then SHA-384, then SHA-512; DER before P1363 within each hash
    /// since DER is the more common encoding in practice.
    pub const QE_REPORT_FALLBACK_ORDER: [SigAlgo; 6] = [
        SigAlgo::Sha256Der,
        SigAlgo::Sha256P1363,
        SigAlgo::Sha384Der,
        SigAlgo::Sha384P1363,
        SigAlgo::Sha512Der,
        SigAlgo::Sha512P1363,
    ];

    fn hash_alg(self) -> &'static ring::digest::Algorithm {
        match self {
            SigAlgo::Sha256Der | SigAlgo::Sha256P1363 => &ring::digest::SHA256,
            SigAlgo::Sha384Der | SigAlgo::Sha384P1363 => &ring::digest::SHA384,
            SigAlgo::Sha512Der | SigAlgo::Sha512P1363 => &ring::digest::SHA512,
        }
    }

    fn is_der(self) -> bool {
        matches!(self, SigAlgo::Sha256Der | SigAlgo::Sha384Der | SigAlgo::Sha512Der)
    }
}

/// A P-256 public key given as 64 raw bytes (`x || y`, uncompressed without
/// the leading `0x04` tag).
pub fn p256_verify(
    pubkey_xy: &[u8; 64],
    message: &[u8],
    signature: &[u8],
    algo: SigAlgo,
) -> Result<()> {
    let verifying_key = p256_verifying_key(pubkey_xy)?;
    let digest = ring::digest::digest(algo.hash_alg(), message);

    let sig = if algo.is_der() {
        p256::ecdsa::Signature::from_der(signature).context("invalid DER ECDSA signature")?
    } else {
        p256::ecdsa::Signature::from_slice(signature)
            .context("invalid raw r||s ECDSA signature")?
    };

    verifying_key
        .verify_prehash(digest.as_ref(), &sig)
        .context("ECDSA P-256 signature verification failed")
}

/// Try every combination in `order`, returning the first that succeeds
/// (along with which one it was, for diagnostics), or the last error if all
/// fail.
pub fn p256_verify_with_fallback(
    pubkey_xy: &[u8; 64],
    message: &[u8],
    signature: &[u8],
    order: &[SigAlgo],
) -> Result<SigAlgo> {
    let mut last_err = None;
    for &algo in order {
        match p256_verify(pubkey_xy, message, signature, algo) {
            Ok(()) => return Ok(algo),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("empty fallback order")))
}

fn p256_verifying_key(pubkey_xy: &[u8; 64]) -> Result<p256::ecdsa::VerifyingKey> {
    let mut uncompressed = [0u8; 65];
    uncompressed[0] = 0x04;
    uncompressed[1..].copy_from_slice(pubkey_xy);
    let point = p256::EncodedPoint::from_bytes(uncompressed)
        .context("invalid P-256 point encoding")?;
    p256::ecdsa::VerifyingKey::from_encoded_point(&point)
        .context("invalid P-256 public key")
}

/// Verify a P-384 ECDSA signature given over little-endian `r || s` (each
/// coordinate padded to 72 bytes), as AMD SEV-SNP reports encode their
/// signature field (`struct signature { r[72]; s[72]; reserved[368]; }`).
/// The caller is responsible for reversing byte order before calling, since
/// the two halves must each be reversed independently.
pub fn p384_verify_le_r_s(
    pubkey_xy: &[u8; 96],
    message: &[u8],
    sig_le_r_s: &[u8; 144],
) -> Result<()> {
    let verifying_key = p384_verifying_key(pubkey_xy)?;
    let digest = ring::digest::digest(&ring::digest::SHA384, message);

    let (r_le, s_le) = sig_le_r_s.split_at(72);
    let mut r_be = r_le.to_vec();
    r_be.reverse();
    let mut s_be = s_le.to_vec();
    s_be.reverse();

    // Trim to the curve's 48-byte scalar width; AMD encodes each component
    // in a 72-byte field with trailing (i.e. leading-after-reversal) zero
    // padding.
    let r_be = trim_to(&r_be, 48)?;
    let s_be = trim_to(&s_be, 48)?;

    let mut raw = [0u8; 96];
    raw[..48].copy_from_slice(r_be);
    raw[48..].copy_from_slice(s_be);

    let sig = p384::ecdsa::Signature::from_slice(&raw).context("invalid P-384 signature")?;
    verifying_key
        .verify_prehash(digest.as_ref(), &sig)
        .context("ECDSA P-384 signature verification failed")
}

fn trim_to(be_bytes: &[u8], width: usize) -> Result<&[u8]> {
    if be_bytes.len() == width {
        return Ok(be_bytes);
    }
    if be_bytes.len() < width {
        bail!("P-384 signature component shorter than curve width");
    }
    let (zeros, rest) = be_bytes.split_at(be_bytes.len() - width);
    if zeros.iter().any(|&b| b != 0) {
        bail!("P-384 signature component wider than curve width with nonzero high bytes");
    }
    Ok(rest)
}

fn p384_verifying_key(pubkey_xy: &[u8; 96]) -> Result<p384::ecdsa::VerifyingKey> {
    let mut uncompressed = [0u8; 97];
    uncompressed[0] = 0x04;
    uncompressed[1..].copy_from_slice(pubkey_xy);
    let point = p384::EncodedPoint::from_bytes(uncompressed)
        .context("invalid P-384 point encoding")?;
    p384::ecdsa::VerifyingKey::from_encoded_point(&point)
        .context("invalid P-384 public key")
}
