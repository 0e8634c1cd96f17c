//! Binary decoder for DCAP quotes (SGX v3, TDX v4/v5) and SEV-SNP reports.
//!
//! Every parser here is bounds-checked against the remaining input before
//! any length-prefixed allocation and never panics on truncated input --
//! malformed or short input always comes back as an `Err`, not a panic.

pub mod header;
pub mod sevsnp;
pub mod sgx;
pub mod tdx;

use anyhow::{bail, ensure, Context, Result};

use header::{read_u16, read_u32, take, QuoteHeader, TEE_TYPE_SGX, TEE_TYPE_TDX};
use sgx::SgxReportBody;
use tdx::TdReportBody;

/// Only the PCK certificate chain (cert_data_type 5) is supported.
pub const CERT_DATA_TYPE_PCK_CHAIN: u16 = 5;

/// The ECDSA quote signature section trailing a report body: the quoting
/// enclave's signature over the signed region, its attestation key, the QE's
/// own report and the PCK's signature over it, and the PCK certificate
/// chain.
#[derive(Debug, Clone)]
pub struct SignatureSection {
    /// ECDSA-P256 signature (raw `r || s`) over the report's signed region.
    pub quote_signature: [u8; 64],
    /// The ephemeral ECDSA-P256 attestation public key (raw `x || y`) used
    /// to produce `quote_signature`; authenticated by `qe_report_signature`.
    pub attestation_public_key: [u8; 64],
    /// The Quoting Enclave's own SGX report, binding `attestation_public_key`
    /// into its `report_data`.
    pub qe_report: SgxReportBody,
    /// The exact 384 raw bytes `qe_report` was parsed from -- what
    /// `qe_report_signature` is actually computed over. `SgxReportBody`
    /// drops the layout's reserved byte ranges, so re-serializing the parsed
    /// struct would not reproduce the signed bytes.
    pub qe_report_raw: Vec<u8>,
    /// The PCK's ECDSA-P256 signature (raw `r || s`) over `qe_report_raw`.
    pub qe_report_signature: [u8; 64],
    pub qe_auth_data: Vec<u8>,
    pub cert_data_type: u16,
    pub cert_data: Vec<u8>,
}

impl SignatureSection {
    fn parse(input: &[u8]) -> Result<Self> {
        let (quote_signature, rest) = header::take_array::<64>(input, "quote ECDSA signature")?;
        let (attestation_public_key, rest) =
            header::take_array::<64>(rest, "attestation public key")?;
        ensure!(
            rest.len() >= sgx::SGX_REPORT_BODY_LEN,
            "quote truncated reading QE report"
        );
        let qe_report_raw = rest[..sgx::SGX_REPORT_BODY_LEN].to_vec();
        let (qe_report, rest) = SgxReportBody::parse(rest).context("QE report")?;
        let (qe_report_signature, rest) =
            header::take_array::<64>(rest, "QE report ECDSA signature")?;
        let (qe_auth_data_len_bytes, rest) = take(rest, 2, "qe_auth_data_len")?;
        let qe_auth_data_len = read_u16(qe_auth_data_len_bytes, 0);
        let (qe_auth_data, rest) = take(rest, qe_auth_data_len as usize, "qe_auth_data")?;
        let (cert_data_type_bytes, rest) = take(rest, 2, "cert_data_type")?;
        let cert_data_type = read_u16(cert_data_type_bytes, 0);
        let (cert_data_len_bytes, rest) = take(rest, 4, "cert_data_len")?;
        let cert_data_len = read_u32(cert_data_len_bytes, 0);
        let (cert_data, rest) = take(rest, cert_data_len as usize, "cert_data")?;

        ensure!(
            rest.is_empty(),
            "signature section has {} trailing bytes after cert_data",
            rest.len()
        );
        ensure!(
            cert_data_type == CERT_DATA_TYPE_PCK_CHAIN,
            "unsupported cert_data_type {cert_data_type}, only the PCK certificate chain (5) is supported"
        );

        Ok(Self {
            quote_signature,
            attestation_public_key,
            qe_report,
            qe_report_raw,
            qe_report_signature,
            qe_auth_data: qe_auth_data.to_vec(),
            cert_data_type,
            cert_data: cert_data.to_vec(),
        })
    }
}

/// Read the trailing `sig_data_len: u32` + signature section that follows
/// every report body, and confirm it consumes exactly the declared length.
fn parse_trailing_signature(input: &[u8]) -> Result<SignatureSection> {
    let (len_bytes, rest) = take(input, 4, "sig_data_len")?;
    let sig_data_len = read_u32(len_bytes, 0) as usize;
    let (sig_bytes, rest) = take(rest, sig_data_len, "signature_data")?;
    ensure!(
        rest.is_empty(),
        "quote has {} trailing bytes after its declared signature_data",
        rest.len()
    );
    SignatureSection::parse(sig_bytes).context("signature_data")
}

#[derive(Debug, Clone)]
pub struct SgxQuote {
    pub header: QuoteHeader,
    pub report_body: SgxReportBody,
    pub signature: SignatureSection,
    /// Bytes `0..432`: `header || report_body`, exactly what `quote_signature`
    /// is computed over.
    pub signed_region: Vec<u8>,
}

pub fn parse_sgx_quote(bytes: &[u8]) -> Result<SgxQuote> {
    ensure!(!bytes.is_empty(), "empty quote");
    let (header, rest) = QuoteHeader::parse(bytes).context("quote header")?;
    ensure!(
        header.tee_type == TEE_TYPE_SGX,
        "tee_type {} is not SGX",
        header.tee_type
    );
    ensure!(
        header.version == 3,
        "unsupported SGX quote version {}, only v3 is supported",
        header.version
    );

    let (report_body, rest) = SgxReportBody::parse(rest).context("SGX report body")?;
    let signed_len = header::HEADER_LEN + sgx::SGX_REPORT_BODY_LEN;
    let signed_region = bytes[..signed_len].to_vec();

    let signature = parse_trailing_signature(rest)?;

    Ok(SgxQuote {
        header,
        report_body,
        signature,
        signed_region,
    })
}

#[derive(Debug, Clone)]
pub enum TdxQuote {
    /// DCAP 1.0 wire format (`version == 4`), body is always the TD 1.0
    /// report layout.
    V4 {
        header: QuoteHeader,
        report_body: tdx::Td10ReportBody,
        signature: SignatureSection,
        signed_region: Vec<u8>,
    },
    /// DCAP 1.5 wire format (`version == 5`), body selected by the
    /// `body_type`/`body_size` descriptor that follows the header.
    V5 {
        header: QuoteHeader,
        body_type: u16,
        body_size: u32,
        report_body: TdReportBody,
        signature: SignatureSection,
        signed_region: Vec<u8>,
    },
}

impl TdxQuote {
    pub fn header(&self) -> &QuoteHeader {
        match self {
            TdxQuote::V4 { header, .. } => header,
            TdxQuote::V5 { header, .. } => header,
        }
    }

    pub fn signature(&self) -> &SignatureSection {
        match self {
            TdxQuote::V4 { signature, .. } => signature,
            TdxQuote::V5 { signature, .. } => signature,
        }
    }

    pub fn signed_region(&self) -> &[u8] {
        match self {
            TdxQuote::V4 { signed_region, .. } => signed_region,
            TdxQuote::V5 { signed_region, .. } => signed_region,
        }
    }

    pub fn report_data(&self) -> &crate::byte_array::ReportData64 {
        match self {
            TdxQuote::V4 { report_body, .. } => &report_body.report_data,
            TdxQuote::V5 { report_body, .. } => report_body.report_data(),
        }
    }
}

pub fn parse_tdx_quote(bytes: &[u8]) -> Result<TdxQuote> {
    ensure!(!bytes.is_empty(), "empty quote");
    let (header, rest) = QuoteHeader::parse(bytes).context("quote header")?;
    ensure!(
        header.tee_type == TEE_TYPE_TDX,
        "tee_type {} is not TDX",
        header.tee_type
    );

    match header.version {
        4 => {
            let (report_body, rest) = tdx::Td10ReportBody::parse(rest).context("TD report body")?;
            let signed_len = header::HEADER_LEN + tdx::TD10_REPORT_BODY_LEN;
            let signed_region = bytes[..signed_len].to_vec();
            let signature = parse_trailing_signature(rest)?;
            Ok(TdxQuote::V4 {
                header,
                report_body,
                signature,
                signed_region,
            })
        }
        5 => {
            let (descriptor, rest) = take(rest, 6, "body descriptor")?;
            let body_type = read_u16(descriptor, 0);
            let body_size = read_u32(descriptor, 2);
            let (report_body, rest) = tdx::parse_dispatched(rest, body_type, body_size)
                .context("TD report body")?;
            let signed_len = header::HEADER_LEN + 6 + body_size as usize;
            ensure!(
                signed_len <= bytes.len(),
                "declared body_size overruns the quote"
            );
            let signed_region = bytes[..signed_len].to_vec();
            let signature = parse_trailing_signature(rest)?;
            Ok(TdxQuote::V5 {
                header,
                body_type,
                body_size,
                report_body,
                signature,
                signed_region,
            })
        }
        other => bail!("unsupported TDX quote version {other}, only v4 and v5 are supported"),
    }
}

/// Parse a standalone SEV-SNP attestation report (no outer quote header or
/// signature section -- the report carries its own signature inline).
pub fn parse_sev_snp_report(bytes: &[u8]) -> Result<sevsnp::SevSnpReport> {
    ensure!(!bytes.is_empty(), "empty report");
    let (report, rest) = sevsnp::SevSnpReport::parse(bytes).context("SEV-SNP attestation report")?;
    ensure!(rest.is_empty(), "report has {} trailing bytes", rest.len());
    Ok(report)
}
