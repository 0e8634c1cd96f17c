//! Parse DER-encoded X.509 CRLs and expose their revoked serial numbers.
//!
//! Does not verify CRL signatures — callers are expected to have obtained
//! CRLs over a trusted channel, or to validate them separately.

use std::collections::BTreeSet;

use anyhow::{Context, Result};

use crate::asn1::{self, Tlv, TAG_INTEGER, TAG_SEQUENCE};
use crate::hex;

const TAG_UTC_TIME: u8 = 0x17;
const TAG_GENERALIZED_TIME: u8 = 0x18;
const TAG_CRL_EXTENSIONS: u8 = 0xa0;

/// The set of revoked serial numbers from one or more CRLs, normalized to
/// lowercase hex with leading zero bytes stripped.
#[derive(Debug, Default, Clone)]
pub struct RevokedSerials(BTreeSet<String>);

impl RevokedSerials {
    pub fn is_revoked(&self, serial_hex: &str) -> bool {
        match hex::normalize_serial(serial_hex) {
            Ok(normalized) => self.0.contains(&normalized),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse one DER-encoded CRL and extract its revoked serial numbers.
pub fn parse_crl(der: &[u8]) -> Result<RevokedSerials> {
    let (cert_list, _) =
        asn1::expect_tlv(der, TAG_SEQUENCE).context("CRL: CertificateList is not a SEQUENCE")?;
    let cert_list_items =
        asn1::sequence_items(cert_list.value).context("CRL: failed to walk CertificateList")?;
    let tbs = cert_list_items
        .first()
        .context("CRL: CertificateList has no TBSCertList")?;
    anyhow::ensure!(tbs.tag == TAG_SEQUENCE, "CRL: TBSCertList is not a SEQUENCE");

    let tbs_items = asn1::sequence_items(tbs.value).context("CRL: failed to walk TBSCertList")?;
    let mut idx = 0;

    // version INTEGER OPTIONAL
    if tbs_items.get(idx).is_some_and(|t| t.tag == TAG_INTEGER) {
        idx += 1;
    }
    // signature AlgorithmIdentifier (SEQUENCE)
    anyhow::ensure!(
        tbs_items.get(idx).is_some_and(|t| t.tag == TAG_SEQUENCE),
        "CRL: missing signature AlgorithmIdentifier"
    );
    idx += 1;
    // issuer Name (SEQUENCE)
    anyhow::ensure!(
        tbs_items.get(idx).is_some_and(|t| t.tag == TAG_SEQUENCE),
        "CRL: missing issuer Name"
    );
    idx += 1;
    // thisUpdate Time
    anyhow::ensure!(
        tbs_items
            .get(idx)
            .is_some_and(|t| t.tag == TAG_UTC_TIME || t.tag == TAG_GENERALIZED_TIME),
        "CRL: missing thisUpdate"
    );
    idx += 1;
    // nextUpdate Time OPTIONAL
    if tbs_items
        .get(idx)
        .is_some_and(|t| t.tag == TAG_UTC_TIME || t.tag == TAG_GENERALIZED_TIME)
    {
        idx += 1;
    }

    let mut revoked = BTreeSet::new();

    // revokedCertificates SEQUENCE OF SEQUENCE OPTIONAL
    if let Some(next) = tbs_items.get(idx) {
        if next.tag == TAG_SEQUENCE {
            let entries = asn1::sequence_items(next.value)
                .context("CRL: failed to walk revokedCertificates")?;
            for entry in entries {
                anyhow::ensure!(
                    entry.tag == TAG_SEQUENCE,
                    "CRL: revoked entry is not a SEQUENCE"
                );
                let entry_items =
                    asn1::sequence_items(entry.value).context("CRL: bad revoked entry")?;
                let serial_tlv: &Tlv = entry_items
                    .first()
                    .context("CRL: revoked entry missing serial")?;
                anyhow::ensure!(
                    serial_tlv.tag == TAG_INTEGER,
                    "CRL: revoked entry serial is not an INTEGER"
                );
                let serial_bytes = asn1::integer_to_unsigned_bytes(serial_tlv.value);
                revoked.insert(hex::encode(serial_bytes));
            }
            idx += 1;
        }
    }

    // crlExtensions [0] EXPLICIT Extensions OPTIONAL -- ignored
    let _ = tbs_items.get(idx).filter(|t| t.tag == TAG_CRL_EXTENSIONS);

    Ok(RevokedSerials(revoked))
}

/// Parse multiple CRLs and union their revoked serials.
pub fn parse_crls(ders: &[Vec<u8>]) -> Result<RevokedSerials> {
    let mut all = BTreeSet::new();
    for der in ders {
        let parsed = parse_crl(der)?;
        all.extend(parsed.0);
    }
    Ok(RevokedSerials(all))
}

#[cfg(test)]
mod test {
    use super::*;

    /// Hand-encode a minimal v2 CRL (no extensions, one revoked serial) so
    /// the walker can be exercised without a real Intel/AMD CRL fixture.
    fn build_crl_der(revoked_serial: u8) -> Vec<u8> {
        fn seq(tag: u8, contents: &[u8]) -> Vec<u8> {
            let mut out = vec![tag];
            assert!(contents.len() < 128);
            out.push(contents.len() as u8);
            out.extend_from_slice(contents);
            out
        }

        // AlgorithmIdentifier: SEQUENCE { OID ecdsa-with-SHA256 }
        let alg_id = seq(0x30, &seq(0x06, &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02]));
        // issuer Name: empty SEQUENCE (RDNSequence)
        let issuer = seq(0x30, &[]);
        // thisUpdate: UTCTime
        let this_update = seq(0x17, b"250101000000Z");
        // one revoked entry: SEQUENCE { INTEGER serial, UTCTime revocationDate }
        let entry = seq(
            0x30,
            &[seq(0x02, &[revoked_serial]), seq(0x17, b"250101000000Z")].concat(),
        );
        let revoked_certs = seq(0x30, &entry);

        let tbs = seq(
            0x30,
            &[alg_id.clone(), issuer, this_update, revoked_certs].concat(),
        );

        let sig_value = seq(0x03, &[0x00, 0xaa, 0xbb]);
        seq(0x30, &[tbs, alg_id, sig_value].concat())
    }

    #[test]
    fn test_parse_crl_finds_revoked_serial() {
        let der = build_crl_der(0x07);
        let revoked = parse_crl(&der).unwrap();
        assert!(revoked.is_revoked("07"));
        assert!(revoked.is_revoked("0007"));
        assert!(!revoked.is_revoked("08"));
    }

    #[test]
    fn test_parse_crl_empty_revoked_list() {
        // TBSCertList with no revokedCertificates field at all.
        fn seq(tag: u8, contents: &[u8]) -> Vec<u8> {
            let mut out = vec![tag];
            out.push(contents.len() as u8);
            out.extend_from_slice(contents);
            out
        }
        let alg_id = seq(0x30, &seq(0x06, &[0x2a]));
        let issuer = seq(0x30, &[]);
        let this_update = seq(0x17, b"250101000000Z");
        let tbs = seq(0x30, &[alg_id.clone(), issuer, this_update].concat());
        let sig_value = seq(0x03, &[0x00]);
        let der = seq(0x30, &[tbs, alg_id, sig_value].concat());

        let revoked = parse_crl(&der).unwrap();
        assert!(revoked.is_empty());
    }

    #[test]
    fn test_truncated_crl_never_panics() {
        let der = build_crl_der(1);
        for len in 0..der.len() {
            let _ = parse_crl(&der[..len]);
        }
    }
}
