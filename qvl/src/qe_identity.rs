//! QE Identity Evaluator: compare the Quoting Enclave's own report against
//! a signed Intel PCS QE Identity document.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::VerifyError;
use crate::quote::sgx::SgxReportBody;

#[derive(Debug, Clone, Deserialize)]
pub struct QeIdentityDocument {
    #[serde(rename = "enclaveIdentity")]
    pub enclave_identity: EnclaveIdentity,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnclaveIdentity {
    pub id: String,
    pub version: u32,
    pub issue_date: String,
    pub next_update: String,
    /// 4-byte hex.
    pub miscselect: String,
    /// 4-byte hex.
    pub miscselect_mask: String,
    /// 16-byte hex.
    pub attributes: String,
    /// 16-byte hex.
    pub attributes_mask: String,
    /// 32-byte hex.
    pub mrsigner: String,
    pub isvprodid: u16,
    pub tcb_levels: Vec<QeTcbLevel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QeTcbLevel {
    pub tcb: QeTcb,
    pub tcb_date: String,
    pub tcb_status: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QeTcb {
    pub isvsvn: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QeIdentityMatch {
    pub status: String,
    pub tcb_date: String,
}

pub fn parse_qe_identity(json: &[u8]) -> Result<QeIdentityDocument> {
    serde_json::from_slice(json).context("failed to parse QE Identity JSON")
}

/// Verify `qe_report` against `doc`, per the masked-field + ISVSVN-level
/// algorithm in the QE Identity contract.
pub fn verify_qe_identity(
    qe_report: &SgxReportBody,
    doc: &EnclaveIdentity,
) -> Result<QeIdentityMatch, VerifyError> {
    let miscselect = parse_hex_fixed::<4>(&doc.miscselect).ok_or(VerifyError::QeIdentityMismatch)?;
    let miscselect_mask =
        parse_hex_fixed::<4>(&doc.miscselect_mask).ok_or(VerifyError::QeIdentityMismatch)?;
    let report_misc = qe_report.misc_select.to_le_bytes();
    for i in 0..4 {
        if (report_misc[i] & miscselect_mask[i]) != (miscselect[i] & miscselect_mask[i]) {
            return Err(VerifyError::QeIdentityMismatch);
        }
    }

    let attributes = parse_hex_fixed::<16>(&doc.attributes).ok_or(VerifyError::QeIdentityMismatch)?;
    let attributes_mask =
        parse_hex_fixed::<16>(&doc.attributes_mask).ok_or(VerifyError::QeIdentityMismatch)?;
    for i in 0..16 {
        if (qe_report.attributes[i] & attributes_mask[i]) != (attributes[i] & attributes_mask[i]) {
            return Err(VerifyError::QeIdentityMismatch);
        }
    }

    let mrsigner = parse_hex_fixed::<32>(&doc.mrsigner).ok_or(VerifyError::QeIdentityMismatch)?;
    if qe_report.mr_signer.0 != mrsigner {
        return Err(VerifyError::QeIdentityMismatch);
    }

    if qe_report.isv_prod_id != doc.isvprodid {
        return Err(VerifyError::QeIdentityMismatch);
    }

    // Document order is highest-to-lowest ISVSVN; the first level at or
    // below the report's ISVSVN is the tightest match.
    let level = doc
        .tcb_levels
        .iter()
        .find(|level| level.tcb.isvsvn <= qe_report.isv_svn)
        .ok_or(VerifyError::QeIdentityMismatch)?;

    if level.tcb_status == "Revoked" {
        return Err(VerifyError::QeIdentityMismatch);
    }

    Ok(QeIdentityMatch {
        status: level.tcb_status.clone(),
        tcb_date: level.tcb_date.clone(),
    })
}

fn parse_hex_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut out = [0u8; N];
    crate::hex::decode_to_slice(s, &mut out).ok()?;
    Some(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::byte_array::{ByteArray, Measurement32, ReportData64};

    fn sample_qe_report(isv_prod_id: u16, isv_svn: u16, mr_signer: [u8; 32]) -> SgxReportBody {
        SgxReportBody {
            cpu_svn: [0; 16],
            misc_select: 0,
            attributes: [0; 16],
            mr_enclave: Measurement32::new([0; 32]),
            mr_signer: Measurement32::new(mr_signer),
            isv_prod_id,
            isv_svn,
            report_data: ReportData64::new([0; 64]),
        }
    }

    fn sample_doc_json(mrsigner_hex: &str) -> String {
        format!(
            r#"{{
                "enclaveIdentity": {{
                    "id": "QE",
                    "version": 2,
                    "issueDate": "2024-01-01T00:00:00Z",
                    "nextUpdate": "2099-01-01T00:00:00Z",
                    "miscselect": "00000000",
                    "miscselectMask": "ffffffff",
                    "attributes": "11000000000000000000000000000000",
                    "attributesMask": "fbffffffffffffff0000000000000000",
                    "mrsigner": "{mrsigner_hex}",
                    "isvprodid": 1,
                    "tcbLevels": [
                        {{ "tcb": {{ "isvsvn": 6 }}, "tcbDate": "2024-01-01T00:00:00Z", "tcbStatus": "UpToDate" }},
                        {{ "tcb": {{ "isvsvn": 1 }}, "tcbDate": "2020-01-01T00:00:00Z", "tcbStatus": "OutOfDate" }}
                    ]
                }},
                "signature": "aabb"
            }}"#
        )
    }

    #[test]
    fn test_verify_qe_identity_matches() {
        let mrsigner = [0xAB; 32];
        let mrsigner_hex = "ab".repeat(32);
        let doc = parse_qe_identity(sample_doc_json(&mrsigner_hex).as_bytes()).unwrap();
        let report = sample_qe_report(1, 6, mrsigner);

        let result = verify_qe_identity(&report, &doc.enclave_identity).unwrap();
        assert_eq!(result.status, "UpToDate");
    }

    #[test]
    fn test_verify_qe_identity_rejects_wrong_mrsigner() {
        let mrsigner_hex = "ab".repeat(32);
        let doc = parse_qe_identity(sample_doc_json(&mrsigner_hex).as_bytes()).unwrap();
        let report = sample_qe_report(1, 6, [0xCD; 32]);

        assert_eq!(
            verify_qe_identity(&report, &doc.enclave_identity),
            Err(VerifyError::QeIdentityMismatch)
        );
    }

    #[test]
    fn test_verify_qe_identity_rejects_wrong_isvprodid() {
        let mrsigner = [0xAB; 32];
        let mrsigner_hex = "ab".repeat(32);
        let doc = parse_qe_identity(sample_doc_json(&mrsigner_hex).as_bytes()).unwrap();
        let report = sample_qe_report(2, 6, mrsigner);

        assert!(verify_qe_identity(&report, &doc.enclave_identity).is_err());
    }

    #[test]
    fn test_verify_qe_identity_falls_back_to_lower_isvsvn_level() {
        let mrsigner = [0xAB; 32];
        let mrsigner_hex = "ab".repeat(32);
        let doc = parse_qe_identity(sample_doc_json(&mrsigner_hex).as_bytes()).unwrap();
        let report = sample_qe_report(1, 3, mrsigner);

        let result = verify_qe_identity(&report, &doc.enclave_identity).unwrap();
        assert_eq!(result.status, "OutOfDate");
    }
}
