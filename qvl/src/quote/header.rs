//! The 48-byte header shared by every quote format.

use anyhow::{ensure, Context, Result};

/// ECDSA-P256, the only supported attestation key type.
pub const ATT_KEY_TYPE_ECDSA_P256: u16 = 2;

/// `tee_type` value identifying an SGX quote.
pub const TEE_TYPE_SGX: u32 = 0x0000_0000;
/// `tee_type` value identifying a TDX quote.
pub const TEE_TYPE_TDX: u32 = 0x0000_0081;

pub const HEADER_LEN: usize = 48;

#[derive(Debug, Clone, Copy)]
pub struct QuoteHeader {
    pub version: u16,
    pub att_key_type: u16,
    pub tee_type: u32,
    pub qe_svn: u16,
    pub pce_svn: u16,
    pub qe_vendor_id: [u8; 16],
    pub user_data: [u8; 20],
}

impl QuoteHeader {
    /// Parse the header from the front of `input`, returning it and the
    /// remaining bytes.
    pub fn parse(input: &[u8]) -> Result<(Self, &[u8])> {
        ensure!(
            input.len() >= HEADER_LEN,
            "quote shorter than the {HEADER_LEN}-byte common header"
        );
        let (header_bytes, rest) = input.split_at(HEADER_LEN);

        let version = read_u16(header_bytes, 0);
        let att_key_type = read_u16(header_bytes, 2);
        let tee_type = read_u32(header_bytes, 4);
        let qe_svn = read_u16(header_bytes, 8);
        let pce_svn = read_u16(header_bytes, 10);
        let mut qe_vendor_id = [0u8; 16];
        qe_vendor_id.copy_from_slice(&header_bytes[12..28]);
        let mut user_data = [0u8; 20];
        user_data.copy_from_slice(&header_bytes[28..48]);

        ensure!(
            att_key_type == ATT_KEY_TYPE_ECDSA_P256,
            "unsupported att_key_type {att_key_type}, only ECDSA-P256 (2) is supported"
        );

        Ok((
            Self {
                version,
                att_key_type,
                tee_type,
                qe_svn,
                pce_svn,
                qe_vendor_id,
                user_data,
            },
            rest,
        ))
    }
}

pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

pub(crate) fn take<'a>(input: &'a [u8], len: usize, what: &str) -> Result<(&'a [u8], &'a [u8])> {
    ensure!(input.len() >= len, "quote truncated reading {what}");
    Ok(input.split_at(len))
}

pub(crate) fn take_array<const N: usize>(input: &[u8], what: &str) -> Result<([u8; N], &[u8])> {
    let (bytes, rest) = take(input, N, what)?;
    let arr: [u8; N] = bytes.try_into().context("impossible slice-to-array failure")?;
    Ok((arr, rest))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_header_rejects_short_input() {
        assert!(QuoteHeader::parse(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_parse_header_rejects_non_ecdsa_key_type() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[2..4].copy_from_slice(&1u16.to_le_bytes()); // EPID, not ECDSA
        assert!(QuoteHeader::parse(&bytes).is_err());
    }

    #[test]
    fn test_parse_header_roundtrip() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[0..2].copy_from_slice(&3u16.to_le_bytes());
        bytes[2..4].copy_from_slice(&ATT_KEY_TYPE_ECDSA_P256.to_le_bytes());
        bytes[4..8].copy_from_slice(&TEE_TYPE_SGX.to_le_bytes());
        let (header, rest) = QuoteHeader::parse(&bytes).unwrap();
        assert_eq!(header.version, 3);
        assert_eq!(header.tee_type, TEE_TYPE_SGX);
        assert!(rest.is_empty());
    }
}
