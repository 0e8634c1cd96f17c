//! AMD SEV-SNP `ATTESTATION_REPORT` (1184 bytes), versions 2 and 5 (the
//! wire format is unchanged between the two; `version` just advertises which
//! firmware feature set produced it).
//!
//! Layout per AMD's SEV-SNP ABI specification. The report is a signed
//! region of 0x2A0 (672) bytes followed by a 0x200 (512) byte signature
//! structure, for a total of 1184 bytes.

use anyhow::Result;

use super::header::{read_u32, read_u64, take};
use crate::byte_array::{ChipId, Measurement32, Measurement48, ReportData64};

pub const REPORT_LEN: usize = 1184;
pub const SIGNED_REGION_LEN: usize = 0x2A0;
pub const SIGNATURE_LEN: usize = REPORT_LEN - SIGNED_REGION_LEN;

/// `signature_algo` value for ECDSA-P384-SHA384, the only algorithm SEV-SNP
/// reports currently use.
pub const SIG_ALGO_ECDSA_P384_SHA384: u32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct TcbVersion(pub [u8; 8]);

#[derive(Debug, Clone)]
pub struct SevSnpReport {
    pub version: u32,
    pub guest_svn: u32,
    pub policy: u64,
    pub family_id: [u8; 16],
    pub image_id: [u8; 16],
    pub vmpl: u32,
    pub signature_algo: u32,
    pub current_tcb: TcbVersion,
    pub platform_info: u64,
    pub author_key_en: u32,
    pub report_data: ReportData64,
    pub measurement: Measurement48,
    pub host_data: Measurement32,
    pub id_key_digest: [u8; 48],
    pub author_key_digest: [u8; 48],
    pub report_id: [u8; 32],
    pub report_id_ma: [u8; 32],
    pub reported_tcb: TcbVersion,
    pub chip_id: ChipId,
    pub committed_tcb: TcbVersion,
    pub launch_tcb: TcbVersion,
    /// Bytes `0..SIGNED_REGION_LEN`, exactly what the platform signs.
    pub signed_region: Vec<u8>,
    /// ECDSA-P384 signature fields, little-endian `r || s`, 72 bytes each.
    pub signature: [u8; SIGNATURE_LEN],
}

impl SevSnpReport {
    pub fn parse(input: &[u8]) -> Result<(Self, &[u8])> {
        let (report, rest) = take(input, REPORT_LEN, "SEV-SNP attestation report")?;
        let signed_region = report[..SIGNED_REGION_LEN].to_vec();
        let b = report;

        let version = read_u32(b, 0x000);
        let guest_svn = read_u32(b, 0x004);
        let policy = read_u64(b, 0x008);
        let family_id: [u8; 16] = b[0x010..0x020].try_into().unwrap();
        let image_id: [u8; 16] = b[0x020..0x030].try_into().unwrap();
        let vmpl = read_u32(b, 0x030);
        let signature_algo = read_u32(b, 0x034);
        let current_tcb = TcbVersion(b[0x038..0x040].try_into().unwrap());
        let platform_info = read_u64(b, 0x040);
        let author_key_en = read_u32(b, 0x048);
        // 0x04c: reserved
        let report_data = ReportData64::new(b[0x050..0x090].try_into().unwrap());
        let measurement = Measurement48::new(b[0x090..0x0C0].try_into().unwrap());
        let host_data = Measurement32::new(b[0x0C0..0x0E0].try_into().unwrap());
        let id_key_digest: [u8; 48] = b[0x0E0..0x110].try_into().unwrap();
        let author_key_digest: [u8; 48] = b[0x110..0x140].try_into().unwrap();
        let report_id: [u8; 32] = b[0x140..0x160].try_into().unwrap();
        let report_id_ma: [u8; 32] = b[0x160..0x180].try_into().unwrap();
        let reported_tcb = TcbVersion(b[0x180..0x188].try_into().unwrap());
        // 0x188..0x1A0: reserved
        let chip_id = ChipId::new(b[0x1A0..0x1E0].try_into().unwrap());
        let committed_tcb = TcbVersion(b[0x1E0..0x1E8].try_into().unwrap());
        // 0x1E8..0x1F8: current/committed/tcb fw build-number bytes, folded
        // into the reported/committed TCB_VERSION vectors above for callers
        // that need per-component SVNs; raw version counters aren't
        // independently needed beyond that.
        let launch_tcb = TcbVersion(b[0x290..0x298].try_into().unwrap());
        // 0x298..0x2A0: reserved, end of signed region

        let signature: [u8; SIGNATURE_LEN] = report[SIGNED_REGION_LEN..].try_into().unwrap();

        Ok((
            Self {
                version,
                guest_svn,
                policy,
                family_id,
                image_id,
                vmpl,
                signature_algo,
                current_tcb,
                platform_info,
                author_key_en,
                report_data,
                measurement,
                host_data,
                id_key_digest,
                author_key_digest,
                report_id,
                report_id_ma,
                reported_tcb,
                chip_id,
                committed_tcb,
                launch_tcb,
                signed_region,
                signature,
            },
            rest,
        ))
    }

    /// `r || s`, little-endian, 72 bytes each: the first 144 bytes of the
    /// 512-byte signature structure (the remaining 368 bytes are reserved).
    pub fn signature_r_s(&self) -> &[u8; 144] {
        self.signature[..144].try_into().unwrap()
    }
}
