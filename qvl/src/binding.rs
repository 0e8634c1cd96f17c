//! Binding Helpers: compute and check the expected `report_data` value for
//! each supported binding protocol.

use anyhow::{ensure, Context, Result};
use serde_json::Value;

use crate::error::VerifyError;

/// Direct TDX binding: `report_data == expected`, where the caller has
/// already hashed their application public key however their protocol
/// requires.
pub fn verify_direct_binding(report_data: &[u8; 64], expected: &[u8; 64]) -> Result<(), VerifyError> {
    if report_data == expected {
        Ok(())
    } else {
        Err(VerifyError::BindingMismatch)
    }
}

/// The expected `report_data` for the Azure vTPM TDX binding: the first 32
/// bytes are `SHA-256(runtime_data_json_bytes)`, the trailing 32 bytes are
/// zero.
pub fn get_azure_expected_report_data(runtime_data_json: &[u8]) -> [u8; 64] {
    let digest = ring::digest::digest(&ring::digest::SHA256, runtime_data_json);
    let mut expected = [0u8; 64];
    expected[..32].copy_from_slice(digest.as_ref());
    expected
}

/// Azure vTPM TDX binding: `report_data[0..32]` must equal
/// `SHA-256(runtime_data_json)`, `report_data[32..64]` must be zero, the
/// JSON must parse as an object, and its `user-data` field (hex) must equal
/// `SHA-512(nonce || pubkey)`.
pub fn verify_azure_vtpm_binding(
    report_data: &[u8; 64],
    runtime_data_json: &[u8],
    nonce: &[u8],
    pubkey: &[u8],
) -> Result<(), VerifyError> {
    let expected = get_azure_expected_report_data(runtime_data_json);
    if report_data != &expected {
        return Err(VerifyError::BindingMismatch);
    }

    let check = || -> Result<()> {
        let value: Value =
            serde_json::from_slice(runtime_data_json).context("runtime_data is not valid JSON")?;
        let obj = value.as_object().context("runtime_data is not a JSON object")?;
        let user_data_hex = obj
            .get("user-data")
            .and_then(Value::as_str)
            .context("runtime_data has no string `user-data` field")?;
        let user_data = crate::hex::decode(user_data_hex).context("invalid user-data hex")?;

        let mut preimage = Vec::with_capacity(nonce.len() + pubkey.len());
        preimage.extend_from_slice(nonce);
        preimage.extend_from_slice(pubkey);
        let expected_user_data = ring::digest::digest(&ring::digest::SHA512, &preimage);

        ensure!(
            user_data == expected_user_data.as_ref(),
            "runtime_data user-data doesn't match SHA-512(nonce || pubkey)"
        );
        Ok(())
    };

    check().map_err(|_| VerifyError::BindingMismatch)
}

/// SEV-SNP binding: `report_data == SHA-512(nonce || pubkey)`.
pub fn verify_sevsnp_binding(
    report_data: &[u8; 64],
    nonce: &[u8],
    pubkey: &[u8],
) -> Result<(), VerifyError> {
    let mut preimage = Vec::with_capacity(nonce.len() + pubkey.len());
    preimage.extend_from_slice(nonce);
    preimage.extend_from_slice(pubkey);
    let expected = ring::digest::digest(&ring::digest::SHA512, &preimage);

    if report_data.as_slice() == expected.as_ref() {
        Ok(())
    } else {
        Err(VerifyError::BindingMismatch)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_direct_binding_exact_match() {
        let data = [0x42u8; 64];
        assert!(verify_direct_binding(&data, &data).is_ok());
    }

    #[test]
    fn test_direct_binding_mismatch() {
        let a = [0x42u8; 64];
        let mut b = a;
        b[0] ^= 1;
        assert_eq!(verify_direct_binding(&a, &b), Err(VerifyError::BindingMismatch));
    }

    #[test]
    fn test_sevsnp_binding_roundtrip() {
        let nonce = b"my-nonce";
        let pubkey = b"my-pubkey-bytes";
        let mut preimage = Vec::new();
        preimage.extend_from_slice(nonce);
        preimage.extend_from_slice(pubkey);
        let expected = ring::digest::digest(&ring::digest::SHA512, &preimage);
        let mut report_data = [0u8; 64];
        report_data.copy_from_slice(expected.as_ref());

        assert!(verify_sevsnp_binding(&report_data, nonce, pubkey).is_ok());
    }

    #[test]
    fn test_sevsnp_binding_perturbed_nonce_fails() {
        let nonce = b"my-nonce";
        let pubkey = b"my-pubkey-bytes";
        let mut preimage = Vec::new();
        preimage.extend_from_slice(nonce);
        preimage.extend_from_slice(pubkey);
        let expected = ring::digest::digest(&ring::digest::SHA512, &preimage);
        let mut report_data = [0u8; 64];
        report_data.copy_from_slice(expected.as_ref());

        assert!(verify_sevsnp_binding(&report_data, b"other-nonce", pubkey).is_err());
    }

    #[test]
    fn test_azure_vtpm_binding_roundtrip() {
        let nonce = b"testnonce";
        let pubkey = b"sample-user-pubkey";
        let mut preimage = Vec::new();
        preimage.extend_from_slice(nonce);
        preimage.extend_from_slice(pubkey);
        let user_data = ring::digest::digest(&ring::digest::SHA512, &preimage);
        let user_data_hex = crate::hex::encode(user_data.as_ref());

        let runtime_data = format!(r#"{{"user-data":"{user_data_hex}","other":"field"}}"#);
        let expected = get_azure_expected_report_data(runtime_data.as_bytes());

        assert!(
            verify_azure_vtpm_binding(&expected, runtime_data.as_bytes(), nonce, pubkey).is_ok()
        );
    }

    #[test]
    fn test_azure_vtpm_binding_perturbed_runtime_data_fails() {
        let nonce = b"testnonce";
        let pubkey = b"sample-user-pubkey";
        let mut preimage = Vec::new();
        preimage.extend_from_slice(nonce);
        preimage.extend_from_slice(pubkey);
        let user_data = ring::digest::digest(&ring::digest::SHA512, &preimage);
        let user_data_hex = crate::hex::encode(user_data.as_ref());

        let runtime_data = format!(r#"{{"user-data":"{user_data_hex}"}}"#);
        let expected = get_azure_expected_report_data(runtime_data.as_bytes());

        let mut tampered = runtime_data.clone().into_bytes();
        *tampered.last_mut().unwrap() = b'!';

        assert!(verify_azure_vtpm_binding(&expected, &tampered, nonce, pubkey).is_err());
    }
}
