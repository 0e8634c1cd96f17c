//! A minimal recursive-descent DER walker.
//!
//! Decodes only the tags the CRL evaluator and Intel extension reader need:
//! SEQUENCE, SET, INTEGER, OCTET STRING, OID, and (for completeness when
//! walking PKIX structures) BOOLEAN. Definite-length encoding only —
//! indefinite-length TLVs are refused. This intentionally avoids pulling in
//! a full ASN.1 library for these two call sites.

use anyhow::{bail, ensure, Context, Result};

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_OID: u8 = 0x06;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

/// A single decoded TLV (tag-length-value).
#[derive(Debug, Clone, Copy)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Read one TLV from the front of `input`, returning it and the remaining
/// bytes after it.
pub fn read_tlv(input: &[u8]) -> Result<(Tlv<'_>, &[u8])> {
    ensure!(!input.is_empty(), "DER: unexpected end of input reading tag");
    let tag = input[0];
    ensure!(
        tag & 0x1f != 0x1f,
        "DER: multi-byte tags are not supported"
    );

    let rest = &input[1..];
    ensure!(!rest.is_empty(), "DER: unexpected end of input reading length");
    let (len, rest) = read_length(rest)?;

    ensure!(rest.len() >= len, "DER: declared length exceeds remaining input");
    let (value, rest) = rest.split_at(len);
    Ok((Tlv { tag, value }, rest))
}

/// Read a DER length octet(s). Only definite-length forms are accepted.
fn read_length(input: &[u8]) -> Result<(usize, &[u8])> {
    let first = input[0];
    let rest = &input[1..];

    if first & 0x80 == 0 {
        // Short form: length is the value of the single octet.
        return Ok((first as usize, rest));
    }

    let num_len_bytes = (first & 0x7f) as usize;
    ensure!(num_len_bytes != 0, "DER: indefinite-length encoding is not supported");
    ensure!(num_len_bytes <= 4, "DER: length field too large");
    ensure!(rest.len() >= num_len_bytes, "DER: truncated length field");

    let (len_bytes, rest) = rest.split_at(num_len_bytes);
    let mut len: usize = 0;
    for &b in len_bytes {
        len = len
            .checked_shl(8)
            .context("DER: length overflow")?
            .checked_add(b as usize)
            .context("DER: length overflow")?;
    }
    Ok((len, rest))
}

/// Read a TLV and assert its tag matches `expected_tag`.
pub fn expect_tlv<'a>(input: &'a [u8], expected_tag: u8) -> Result<(Tlv<'a>, &'a [u8])> {
    let (tlv, rest) = read_tlv(input)?;
    ensure!(
        tlv.tag == expected_tag,
        "DER: expected tag {expected_tag:#04x}, found {:#04x}",
        tlv.tag
    );
    Ok((tlv, rest))
}

/// Decode a DER INTEGER's big-endian two's-complement bytes as an unsigned
/// value with any leading 0x00 padding byte stripped (common for INTEGERs
/// whose high bit would otherwise be misread as a sign bit).
pub fn integer_to_unsigned_bytes(der_integer: &[u8]) -> &[u8] {
    match der_integer {
        [0x00, rest @ ..] if !rest.is_empty() && rest[0] & 0x80 != 0 => rest,
        other => other,
    }
}

/// Decode an OID's DER-encoded bytes into dotted-decimal form.
pub fn decode_oid(bytes: &[u8]) -> Result<String> {
    ensure!(!bytes.is_empty(), "DER: empty OID");
    let mut parts = Vec::new();
    let first = bytes[0];
    parts.push((first / 40) as u64);
    parts.push((first % 40) as u64);

    let mut value: u64 = 0;
    for &b in &bytes[1..] {
        value = value
            .checked_shl(7)
            .context("DER: OID arc overflow")?
            .checked_add((b & 0x7f) as u64)
            .context("DER: OID arc overflow")?;
        if b & 0x80 == 0 {
            parts.push(value);
            value = 0;
        }
    }
    if value != 0 {
        bail!("DER: truncated OID arc");
    }

    Ok(parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join("."))
}

/// Walk a SEQUENCE's contents, yielding each top-level TLV inside it.
pub fn sequence_items(sequence_value: &[u8]) -> Result<Vec<Tlv<'_>>> {
    let mut items = Vec::new();
    let mut rest = sequence_value;
    while !rest.is_empty() {
        let (tlv, new_rest) = read_tlv(rest)?;
        items.push(tlv);
        rest = new_rest;
    }
    Ok(items)
}
