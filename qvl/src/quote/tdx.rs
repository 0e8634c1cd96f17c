//! TDX report bodies: the DCAP 1.0 layout (584 bytes) and its DCAP 1.5
//! extension (648 bytes), selected by the TDX v5 quote's `body_type` field.

use anyhow::{bail, Result};

use super::header::take;
use crate::byte_array::{Measurement32, Measurement48, ReportData64};

pub const TD10_REPORT_BODY_LEN: usize = 584;
pub const TD15_REPORT_BODY_LEN: usize = 648;

/// `body_type` values carried by a TDX v5 quote's body descriptor.
pub const BODY_TYPE_TD10: u16 = 2;
pub const BODY_TYPE_TD15: u16 = 3;

#[derive(Debug, Clone)]
pub struct Td10ReportBody {
    pub tee_tcb_svn: [u8; 16],
    pub mr_seam: Measurement48,
    pub mr_signer_seam: Measurement48,
    pub seam_attributes: [u8; 8],
    pub td_attributes: [u8; 8],
    pub xfam: [u8; 8],
    pub mr_td: Measurement48,
    pub mr_config_id: Measurement48,
    pub mr_owner: Measurement48,
    pub mr_owner_config: Measurement48,
    pub rtmr0: Measurement48,
    pub rtmr1: Measurement48,
    pub rtmr2: Measurement48,
    pub rtmr3: Measurement48,
    pub report_data: ReportData64,
}

impl Td10ReportBody {
    pub fn parse(input: &[u8]) -> Result<(Self, &[u8])> {
        let (b, rest) = take(input, TD10_REPORT_BODY_LEN, "TDX 1.0 report body")?;
        let arr48 = |off: usize| Measurement48::new(b[off..off + 48].try_into().unwrap());
        let arr16 = |off: usize| -> [u8; 16] { b[off..off + 16].try_into().unwrap() };
        let arr8 = |off: usize| -> [u8; 8] { b[off..off + 8].try_into().unwrap() };

        Ok((
            Self {
                tee_tcb_svn: arr16(0),
                mr_seam: arr48(16),
                mr_signer_seam: arr48(64),
                seam_attributes: arr8(112),
                td_attributes: arr8(120),
                xfam: arr8(128),
                mr_td: arr48(136),
                mr_config_id: arr48(184),
                mr_owner: arr48(232),
                mr_owner_config: arr48(280),
                rtmr0: arr48(328),
                rtmr1: arr48(376),
                rtmr2: arr48(424),
                rtmr3: arr48(472),
                report_data: ReportData64::new(b[520..584].try_into().unwrap()),
            },
            rest,
        ))
    }
}

/// DCAP 1.5 appends a second TEE TCB SVN vector and the service-TD measurement.
#[derive(Debug, Clone)]
pub struct Td15ReportBody {
    pub base: Td10ReportBody,
    pub tee_tcb_svn_2: [u8; 16],
    pub mr_service_td: Measurement48,
}

impl Td15ReportBody {
    pub fn parse(input: &[u8]) -> Result<(Self, &[u8])> {
        anyhow::ensure!(
            input.len() >= TD15_REPORT_BODY_LEN,
            "quote truncated reading TDX 1.5 report body"
        );
        let (base_bytes, rest) = input.split_at(TD10_REPORT_BODY_LEN);
        let (base, _) = Td10ReportBody::parse(base_bytes)?;
        let (tee_tcb_svn_2, rest) =
            crate::quote::header::take_array::<16>(rest, "tee_tcb_svn_2")?;
        let (mr_service_td_bytes, rest) = take(rest, 48, "mr_service_td")?;
        let mr_service_td = Measurement48::new(mr_service_td_bytes.try_into().unwrap());

        Ok((
            Self {
                base,
                tee_tcb_svn_2,
                mr_service_td,
            },
            rest,
        ))
    }
}

#[derive(Debug, Clone)]
pub enum TdReportBody {
    Td10(Td10ReportBody),
    Td15(Td15ReportBody),
}

impl TdReportBody {
    pub fn report_data(&self) -> &ReportData64 {
        match self {
            TdReportBody::Td10(b) => &b.report_data,
            TdReportBody::Td15(b) => &b.base.report_data,
        }
    }

    pub fn mr_td(&self) -> &Measurement48 {
        match self {
            TdReportBody::Td10(b) => &b.mr_td,
            TdReportBody::Td15(b) => &b.base.mr_td,
        }
    }
}

/// Parse a TDX v5 report body given its declared `body_type` and `body_size`.
/// `body_size` must exactly equal the fixed size of the layout it selects.
pub fn parse_dispatched(input: &[u8], body_type: u16, body_size: u32) -> Result<(TdReportBody, &[u8])> {
    match body_type {
        BODY_TYPE_TD10 => {
            anyhow::ensure!(
                body_size as usize == TD10_REPORT_BODY_LEN,
                "TDX body_size {body_size} doesn't match TD 1.0 layout ({TD10_REPORT_BODY_LEN})"
            );
            let (body, rest) = Td10ReportBody::parse(input)?;
            Ok((TdReportBody::Td10(body), rest))
        }
        BODY_TYPE_TD15 => {
            anyhow::ensure!(
                body_size as usize == TD15_REPORT_BODY_LEN,
                "TDX body_size {body_size} doesn't match TD 1.5 layout ({TD15_REPORT_BODY_LEN})"
            );
            let (body, rest) = Td15ReportBody::parse(input)?;
            Ok((TdReportBody::Td15(body), rest))
        }
        other => bail!("unsupported TDX body_type {other}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_td10_bytes() -> Vec<u8> {
        let mut b = vec![0u8; TD10_REPORT_BODY_LEN];
        b[136..184].copy_from_slice(&[0x11; 48]); // mr_td
        b[520..584].copy_from_slice(&[0x22; 64]); // report_data
        b
    }

    #[test]
    fn test_parse_td10_report_body() {
        let bytes = sample_td10_bytes();
        let (body, rest) = Td10ReportBody::parse(&bytes).unwrap();
        assert_eq!(body.mr_td.0, [0x11; 48]);
        assert_eq!(body.report_data.0, [0x22; 64]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_parse_td15_report_body() {
        let mut bytes = sample_td10_bytes();
        bytes.extend_from_slice(&[0x33; 16]);
        bytes.extend_from_slice(&[0x44; 48]);
        let (body, rest) = Td15ReportBody::parse(&bytes).unwrap();
        assert_eq!(body.tee_tcb_svn_2, [0x33; 16]);
        assert_eq!(body.mr_service_td.0, [0x44; 48]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_dispatch_rejects_mismatched_body_size() {
        let bytes = sample_td10_bytes();
        assert!(parse_dispatched(&bytes, BODY_TYPE_TD10, 999).is_err());
    }

    #[test]
    fn test_dispatch_rejects_unknown_body_type() {
        let bytes = sample_td10_bytes();
        assert!(parse_dispatched(&bytes, 0xffff, TD10_REPORT_BODY_LEN as u32).is_err());
    }

    #[test]
    fn test_truncated_td10_never_panics() {
        let bytes = sample_td10_bytes();
        for len in 0..bytes.len() {
            assert!(Td10ReportBody::parse(&bytes[..len]).is_err());
        }
    }
}
