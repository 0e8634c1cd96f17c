//! AMD SEV-SNP processor-family detection and the VCEK certificate's
//! embedded TCB extension, used as a defense-in-depth cross-check against
//! the attestation report's own TCB fields. The authoritative comparison
//! against the TCB Info document happens elsewhere; this is additional,
//! not a replacement.
//!
//! The VCEK extension OIDs live under AMD's `1.3.6.1.4.1.3704.1.3.*` arc.
//! Processor-family detection mirrors the chip-id heuristic AMD's own
//! verifier tooling uses: a report whose `chip_id` has every byte past the
//! 8th zeroed was produced on Turin; older firmware can't distinguish Milan
//! from Genoa from the report alone and this crate resolves that ambiguity
//! in favor of Genoa, the stricter of the two.

use anyhow::{ensure, Result};
use x509_parser::certificate::X509Certificate;

use crate::asn1::{self, TAG_INTEGER};
use crate::quote::sevsnp::TcbVersion;

const OID_BOOTLOADER: &str = "1.3.6.1.4.1.3704.1.3.1";
const OID_TEE: &str = "1.3.6.1.4.1.3704.1.3.2";
const OID_SNP: &str = "1.3.6.1.4.1.3704.1.3.3";
const OID_UCODE: &str = "1.3.6.1.4.1.3704.1.3.8";

/// Which AMD EPYC processor family produced a SEV-SNP report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmdProcessor {
    Milan,
    Genoa,
    Turin,
}

/// Detect the processor family from a report's `chip_id`.
///
/// An all-zero `chip_id` carries no information and is rejected outright
/// rather than silently defaulted.
pub fn detect_processor(chip_id: &[u8; 64]) -> Result<AmdProcessor> {
    ensure!(chip_id.iter().any(|&b| b != 0), "chip_id is all-zero, cannot detect processor family");

    if chip_id[8..].iter().all(|&b| b == 0) {
        Ok(AmdProcessor::Turin)
    } else {
        // Milan and Genoa chip IDs aren't distinguishable by this heuristic
        // alone; Genoa is the newer, stricter-policy family and is the safer
        // default when ambiguous.
        Ok(AmdProcessor::Genoa)
    }
}

/// The per-component TCB SVNs a VCEK certificate carries in its own custom
/// extensions, when present. Any or all fields may be absent on older VCEK
/// issuances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VcekTcb {
    pub bootloader_svn: Option<u8>,
    pub tee_svn: Option<u8>,
    pub snp_svn: Option<u8>,
    pub ucode_svn: Option<u8>,
}

/// Read the AMD TCB extensions off a parsed VCEK certificate.
pub fn decode_vcek_tcb(cert: &X509Certificate<'_>) -> Result<VcekTcb> {
    let mut tcb = VcekTcb::default();
    for ext in cert.extensions() {
        let oid = asn1::decode_oid(ext.oid.as_bytes())?;
        let field = match oid.as_str() {
            OID_BOOTLOADER => &mut tcb.bootloader_svn,
            OID_TEE => &mut tcb.tee_svn,
            OID_SNP => &mut tcb.snp_svn,
            OID_UCODE => &mut tcb.ucode_svn,
            _ => continue,
        };
        let (tlv, _) = asn1::expect_tlv(ext.value, TAG_INTEGER)?;
        let bytes = asn1::integer_to_unsigned_bytes(tlv.value);
        *field = Some(*bytes.last().unwrap_or(&0));
    }
    Ok(tcb)
}

/// Cross-check the VCEK's own embedded TCB fields (when present) against the
/// report's `reported_tcb`. Only fields the certificate actually carries are
/// compared; a VCEK with no AMD TCB extensions at all is not an error here --
/// the TCB Info document comparison remains authoritative.
pub fn cross_check_tcb(vcek_tcb: &VcekTcb, reported: &TcbVersion) -> Result<()> {
    // struct tcb_version { boot_loader; tee; reserved[4]; snp; microcode }
    let report = reported.0;
    if let Some(expected) = vcek_tcb.bootloader_svn {
        ensure!(
            report[0] == expected,
            "VCEK bootloader_svn extension ({expected}) disagrees with reported_tcb ({})",
            report[0]
        );
    }
    if let Some(expected) = vcek_tcb.tee_svn {
        ensure!(
            report[1] == expected,
            "VCEK tee_svn extension ({expected}) disagrees with reported_tcb ({})",
            report[1]
        );
    }
    if let Some(expected) = vcek_tcb.snp_svn {
        ensure!(
            report[6] == expected,
            "VCEK snp_svn extension ({expected}) disagrees with reported_tcb ({})",
            report[6]
        );
    }
    if let Some(expected) = vcek_tcb.ucode_svn {
        ensure!(
            report[7] == expected,
            "VCEK ucode_svn extension ({expected}) disagrees with reported_tcb ({})",
            report[7]
        );
    }
    Ok(())
}
