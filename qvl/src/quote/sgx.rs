//! SGX v3 quote report body (384 bytes) — the `SGX_REPORT_BODY` layout used
//! by the Quoting Enclave.

use anyhow::Result;

use super::header::{read_u16, read_u32, take};
use crate::byte_array::{Measurement32, ReportData64};

pub const SGX_REPORT_BODY_LEN: usize = 384;

#[derive(Debug, Clone)]
pub struct SgxReportBody {
    pub cpu_svn: [u8; 16],
    pub misc_select: u32,
    pub attributes: [u8; 16],
    pub mr_enclave: Measurement32,
    pub mr_signer: Measurement32,
    pub isv_prod_id: u16,
    pub isv_svn: u16,
    pub report_data: ReportData64,
}

impl SgxReportBody {
    pub fn parse(input: &[u8]) -> Result<(Self, &[u8])> {
        let (body, rest) = take(input, SGX_REPORT_BODY_LEN, "SGX report body")?;

        let mut cpu_svn = [0u8; 16];
        cpu_svn.copy_from_slice(&body[0..16]);
        let misc_select = read_u32(body, 16);
        // bytes 20..48 reserved
        let mut attributes = [0u8; 16];
        attributes.copy_from_slice(&body[48..64]);
        let mr_enclave = Measurement32::new(body[64..96].try_into().unwrap());
        // bytes 96..128 reserved
        let mr_signer = Measurement32::new(body[128..160].try_into().unwrap());
        // bytes 160..256 reserved
        let isv_prod_id = read_u16(body, 256);
        let isv_svn = read_u16(body, 258);
        // bytes 260..320 reserved
        let report_data = ReportData64::new(body[320..384].try_into().unwrap());

        Ok((
            Self {
                cpu_svn,
                misc_select,
                attributes,
                mr_enclave,
                mr_signer,
                isv_prod_id,
                isv_svn,
                report_data,
            },
            rest,
        ))
    }

    /// `attributes` bit 0: debug mode enabled.
    pub fn is_debug(&self) -> bool {
        self.attributes[0] & 0x02 != 0
    }
}
