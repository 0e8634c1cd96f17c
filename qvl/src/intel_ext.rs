//! Decode the Intel SGX custom X.509 extension (OID 1.2.840.113741.1.13.1)
//! embedded in PCK leaf certificates.
//!
//! The extension is a SEQUENCE of `SEQUENCE { OID, ANY value }` pairs, keyed
//! by sub-arcs of the base OID: `.1` PPID, `.2` TCB (itself a nested
//! SEQUENCE of sub-arc-keyed SVN components), `.3` PCEID, `.4` FMSPC. TDX
//! platforms additionally carry `tdxtcbcomp01..16Svn` entries inside the TCB
//! sub-extension.

use anyhow::{ensure, Context, Result};

use crate::asn1::{self, TAG_INTEGER, TAG_OCTET_STRING, TAG_SEQUENCE};
use crate::byte_array::{ByteArray, CpuSvn, Fmspc};

/// The base OID for Intel's SGX PCK certificate extension.
pub const SGX_EXTENSION_OID: &str = "1.2.840.113741.1.13.1";

const OID_PPID_SUFFIX: &str = "1";
const OID_TCB_SUFFIX: &str = "2";
const OID_PCEID_SUFFIX: &str = "3";
const OID_FMSPC_SUFFIX: &str = "4";

/// Parsed contents of the Intel SGX extension relevant to TCB evaluation.
#[derive(Debug, Clone)]
pub struct PlatformTcb {
    pub fmspc: Fmspc,
    pub pceid: [u8; 2],
    pub cpusvn: CpuSvn,
    pub pcesvn: u16,
    /// `sgxtcbcompNNsvn` for NN in 1..=16, in ascending component order.
    pub sgx_tcb_comp_svn: [u8; 16],
    /// `tdxtcbcompNNsvn` for NN in 1..=16, present only on TDX-enabled
    /// platforms.
    pub tdx_tcb_comp_svn: Option<[u8; 16]>,
}

/// Find and decode the Intel SGX extension inside a certificate's raw
/// extension list (as returned by `x509_parser::Certificate::extensions()`,
/// or any equivalent iterator of `(oid_dotted_string, der_value)` pairs).
pub fn decode_platform_tcb(extension_der_value: &[u8]) -> Result<PlatformTcb> {
    let entries = top_level_entries(extension_der_value)
        .context("intel extension: failed to walk top-level SEQUENCE")?;

    let mut fmspc = None;
    let mut pceid = None;
    let mut cpusvn = None;
    let mut pcesvn = None;
    let mut sgx_tcb_comp_svn = [0u8; 16];
    let mut tdx_tcb_comp_svn = [0u8; 16];
    let mut has_tdx_comp = false;

    for (oid, value) in entries {
        let suffix = oid
            .strip_prefix(&format!("{SGX_EXTENSION_OID}."))
            .unwrap_or(&oid);

        match suffix {
            s if s == OID_FMSPC_SUFFIX => {
                let (tlv, _) = asn1::expect_tlv(value, TAG_OCTET_STRING)
                    .context("intel extension: fmspc is not an OCTET STRING")?;
                ensure!(tlv.value.len() == 6, "intel extension: fmspc must be 6 bytes");
                fmspc = Some(Fmspc::from_array(tlv.value.try_into().unwrap()));
            }
            s if s == OID_PCEID_SUFFIX => {
                let (tlv, _) = asn1::expect_tlv(value, TAG_OCTET_STRING)
                    .context("intel extension: pceid is not an OCTET STRING")?;
                ensure!(tlv.value.len() == 2, "intel extension: pceid must be 2 bytes");
                pceid = Some([tlv.value[0], tlv.value[1]]);
            }
            s if s == OID_PPID_SUFFIX => {
                // PPID is not needed for verification; skip.
            }
            s if s == OID_TCB_SUFFIX => {
                let (tcb_seq, _) = asn1::expect_tlv(value, TAG_SEQUENCE)
                    .context("intel extension: tcb is not a SEQUENCE")?;
                let tcb_entries = top_level_entries(tcb_seq.value)
                    .context("intel extension: failed to walk tcb SEQUENCE")?;
                for (tcb_oid, tcb_value) in tcb_entries {
                    let tcb_suffix = tcb_oid
                        .strip_prefix(&format!("{SGX_EXTENSION_OID}.{OID_TCB_SUFFIX}."))
                        .unwrap_or(&tcb_oid);
                    let arc: u32 = tcb_suffix.parse().unwrap_or(0);
                    match arc {
                        1..=16 => {
                            let (tlv, _) = asn1::expect_tlv(tcb_value, TAG_INTEGER)
                                .context("intel extension: sgxtcbcompsvn is not an INTEGER")?;
                            let bytes = asn1::integer_to_unsigned_bytes(tlv.value);
                            sgx_tcb_comp_svn[(arc - 1) as usize] =
                                *bytes.last().unwrap_or(&0);
                        }
                        17 => {
                            let (tlv, _) = asn1::expect_tlv(tcb_value, TAG_INTEGER)
                                .context("intel extension: pcesvn is not an INTEGER")?;
                            let bytes = asn1::integer_to_unsigned_bytes(tlv.value);
                            let mut v: u16 = 0;
                            for &b in bytes {
                                v = (v << 8) | b as u16;
                            }
                            pcesvn = Some(v);
                        }
                        18 => {
                            let (tlv, _) = asn1::expect_tlv(tcb_value, TAG_OCTET_STRING)
                                .context("intel extension: cpusvn is not an OCTET STRING")?;
                            ensure!(
                                tlv.value.len() == 16,
                                "intel extension: cpusvn must be 16 bytes"
                            );
                            cpusvn = Some(CpuSvn::from_array(tlv.value.try_into().unwrap()));
                        }
                        19..=34 => {
                            let (tlv, _) = asn1::expect_tlv(tcb_value, TAG_INTEGER)
                                .context("intel extension: tdxtcbcompsvn is not an INTEGER")?;
                            let bytes = asn1::integer_to_unsigned_bytes(tlv.value);
                            tdx_tcb_comp_svn[(arc - 19) as usize] =
                                *bytes.last().unwrap_or(&0);
                            has_tdx_comp = true;
                        }
                        _ => {
                            // Unknown TCB sub-component (e.g. future
                            // extension); ignore.
                        }
                    }
                }
            }
            _ => {
                // Unknown top-level sub-extension (e.g. SGX Type,
                // PlatformInstanceId, Configuration); ignore.
            }
        }
    }

    Ok(PlatformTcb {
        fmspc: fmspc.context("intel extension: missing FMSPC")?,
        pceid: pceid.context("intel extension: missing PCEID")?,
        cpusvn: cpusvn.context("intel extension: missing CPUSVN")?,
        pcesvn: pcesvn.context("intel extension: missing PCESVN")?,
        sgx_tcb_comp_svn,
        tdx_tcb_comp_svn: has_tdx_comp.then_some(tdx_tcb_comp_svn),
    })
}

/// Walk a SEQUENCE of `SEQUENCE { OID, ANY }` entries, returning each
/// entry's OID (dotted-decimal) paired with its raw value bytes (the
/// complete TLV of the `ANY` field, so callers can re-dispatch on tag).
fn top_level_entries(sequence_der_value: &[u8]) -> Result<Vec<(String, &[u8])>> {
    let items = asn1::sequence_items(sequence_der_value)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        ensure!(item.tag == TAG_SEQUENCE, "expected a SEQUENCE{{OID, value}} entry");
        let entry_items = asn1::sequence_items(item.value)?;
        let oid_tlv = entry_items.first().context("entry missing OID")?;
        ensure!(oid_tlv.tag == asn1::TAG_OID, "entry's first field is not an OID");
        let oid = asn1::decode_oid(oid_tlv.value)?;

        // Re-slice the original entry bytes to find where the value TLV
        // starts, so we can hand back its full TLV encoding.
        let oid_tlv_len = tlv_encoded_len(oid_tlv.value);
        ensure!(item.value.len() > oid_tlv_len, "entry missing value");
        let value = &item.value[oid_tlv_len..];
        out.push((oid, value));
    }
    Ok(out)
}

/// Total encoded length (tag + length octets + value) of a TLV whose value
/// is `value_len` bytes, assuming short-form length encoding for len < 128
/// and the standard long-form otherwise. Used only to locate field
/// boundaries we've already validated via `sequence_items`.
fn tlv_encoded_len(value: &[u8]) -> usize {
    let len = value.len();
    let header = if len < 128 {
        2
    } else if len < 256 {
        3
    } else if len < 65536 {
        4
    } else {
        5
    };
    header + len
}
