//! TCB Evaluator: compare a platform's TCB components against a signed
//! Intel PCS TCB Info document and classify the result.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::intel_ext::PlatformTcb;

#[derive(Debug, Clone, Deserialize)]
pub struct TcbInfoDocument {
    #[serde(rename = "tcbInfo")]
    pub tcb_info: TcbInfo,
    pub signature: String,
    /// The exact bytes of the JSON document this was parsed from, retained
    /// so [`verify_tcb_info_signature`] can extract the signed `tcbInfo`
    /// substring verbatim rather than a `serde_json` reserialization of it.
    /// Not part of the document's own JSON shape, so it's skipped on
    /// deserialize and filled in by [`parse_tcb_info`].
    #[serde(skip)]
    pub raw_body: Vec<u8>,
    /// PEM-encoded TCB-Signing-CA issuer chain accompanying this document.
    /// Intel's PCS delivers this as a separate response header
    /// (`TCB-Info-Issuer-Chain`), not as part of the JSON body, so it's
    /// supplied out of band via [`parse_tcb_info`] rather than deserialized.
    #[serde(skip)]
    pub issuer_chain_pem: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcbInfo {
    pub fmspc: String,
    pub tcb_type: u32,
    pub tcb_evaluation_data_number: u32,
    pub issue_date: String,
    pub next_update: String,
    pub tcb_levels: Vec<TcbLevel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcbLevel {
    pub tcb: TcbComponents,
    pub tcb_date: String,
    pub tcb_status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TcbComponents {
    pub sgxtcbcomponents: Vec<TcbComponent>,
    pub pcesvn: u16,
    #[serde(default)]
    pub tdxtcbcomponents: Option<Vec<TcbComponent>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TcbComponent {
    pub svn: u8,
}

/// The outcome of matching a platform's TCB against a `TcbInfo` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcbMatch {
    pub status: String,
    pub tcb_date: String,
}

/// Parse the raw `tcbInfo`/`signature` JSON document, pairing it with the
/// PEM-encoded TCB-Signing-CA issuer chain that accompanies it (delivered
/// out of band by Intel's PCS, e.g. as a response header) so
/// [`verify_tcb_info_signature`] can authenticate the document later.
pub fn parse_tcb_info(json: &[u8], issuer_chain_pem: &[u8]) -> Result<TcbInfoDocument> {
    let mut doc: TcbInfoDocument =
        serde_json::from_slice(json).context("failed to parse TCB Info JSON")?;
    doc.raw_body = json.to_vec();
    doc.issuer_chain_pem = issuer_chain_pem.to_vec();
    Ok(doc)
}

/// Find the first matching TCB level for `platform` in `doc.tcb_levels`
/// (document order, which Intel publishes highest-to-lowest).
///
/// `now_unix_seconds` with `enforce_fresh` fails `StaleTcbInfo` if `doc`'s
/// `next_update` has already passed; `enforce_up_to_date` fails
/// `TcbOutOfDate` if the matched level's status isn't `UpToDate`.
pub fn evaluate_tcb(
    platform: &PlatformTcb,
    doc: &TcbInfo,
    now_unix_seconds: i64,
    enforce_fresh: bool,
    enforce_up_to_date: bool,
) -> Result<TcbMatch, crate::error::VerifyError> {
    if enforce_fresh {
        let next_update =
            parse_rfc3339(&doc.next_update).map_err(|_| crate::error::VerifyError::StaleTcbInfo)?;
        if now_unix_seconds > next_update {
            return Err(crate::error::VerifyError::StaleTcbInfo);
        }
    }

    let level = doc
        .tcb_levels
        .iter()
        .find(|level| level_matches(platform, &level.tcb))
        .ok_or(crate::error::VerifyError::NoMatchingTcbLevel)?;

    if enforce_up_to_date && level.tcb_status != "UpToDate" {
        return Err(crate::error::VerifyError::TcbOutOfDate);
    }

    Ok(TcbMatch {
        status: level.tcb_status.clone(),
        tcb_date: level.tcb_date.clone(),
    })
}

fn level_matches(platform: &PlatformTcb, level: &TcbComponents) -> bool {
    let sgx_ok = platform
        .sgx_tcb_comp_svn
        .iter()
        .zip(level.sgxtcbcomponents.iter())
        .all(|(&platform_svn, level_comp)| platform_svn >= level_comp.svn);
    if !sgx_ok {
        return false;
    }
    if platform.pcesvn < level.pcesvn {
        return false;
    }
    if let Some(level_tdx) = &level.tdxtcbcomponents {
        match &platform.tdx_tcb_comp_svn {
            Some(platform_tdx) => {
                let tdx_ok = platform_tdx
                    .iter()
                    .zip(level_tdx.iter())
                    .all(|(&platform_svn, level_comp)| platform_svn >= level_comp.svn);
                if !tdx_ok {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

/// Verify the ECDSA-P256-SHA256 signature over the raw `tcbInfo` JSON
/// substring, as Intel's PCS signs the exact bytes of that field rather
/// than a reserialization of the parsed document.
///
/// Unlike a bare signature check against a caller-supplied public key, this
/// builds and validates `issuer_chain_pem` via [`crate::cert::verify_pck_chain`]
/// and requires it terminate at a fingerprint in `pinned_roots` -- exactly
/// mirroring the PCK chain validation of the quote orchestrators -- before
/// trusting the leaf's public key to check the signature. A signature that
/// verifies under an arbitrary unchained key proves nothing; the TCB-Signing
/// CA must itself chain to the same pinned root the PCK chain does.
pub fn verify_tcb_info_signature(
    raw_body: &[u8],
    signature_hex: &str,
    issuer_chain_pem: &[u8],
    pinned_roots: &crate::pinned_roots::PinnedRoots,
    verification_time: std::time::SystemTime,
) -> Result<()> {
    let chain = crate::cert::verify_pck_chain(issuer_chain_pem, &[], verification_time)
        .context("failed to validate TCB Info issuer chain")?;
    let root_der = chain.der.last().context("issuer chain is empty")?;
    anyhow::ensure!(
        pinned_roots.contains_der(root_der),
        "TCB Info issuer chain does not terminate at a pinned root"
    );

    let issuer_pubkey_xy: [u8; 64] = crate::cert::extract_ec_point(&chain.der[0])
        .context("TCB Signing CA public key")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("TCB Signing CA public key is not a P-256 point"))?;

    let tcb_info_bytes = extract_raw_json_field(raw_body, "tcbInfo")?;
    let signature = crate::hex::decode(signature_hex).context("invalid signature hex")?;
    crate::ecdsa::p256_verify(
        &issuer_pubkey_xy,
        tcb_info_bytes,
        &signature,
        crate::ecdsa::SigAlgo::Sha256P1363,
    )
    .context("TCB Info signature verification failed")
}

/// Locate `"<field>":{...}` in a JSON document and return the exact raw
/// bytes of its object value, via brace balancing (not full re-parsing, so
/// whitespace/ordering/number-formatting in the original text is preserved
/// for signature verification).
fn extract_raw_json_field<'a>(body: &'a [u8], field: &str) -> Result<&'a [u8]> {
    let text = std::str::from_utf8(body).context("document is not valid UTF-8")?;
    let needle = format!("\"{field}\"");
    let key_pos = text.find(&needle).context("field not found")?;
    let after_key = &text[key_pos + needle.len()..];
    let colon_pos = after_key.find(':').context("malformed field: no colon")?;
    let after_colon = &after_key[colon_pos + 1..];
    let value_start_offset = after_colon
        .find('{')
        .context("field value is not a JSON object")?;
    let value_start = body.len() - after_colon.len() + value_start_offset;

    let mut depth = 0i32;
    let mut end = None;
    for (i, &b) in body[value_start..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(value_start + i + 1);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end.context("unbalanced braces in JSON document")?;
    Ok(&body[value_start..end])
}

fn parse_rfc3339(s: &str) -> Result<i64> {
    // Minimal RFC3339 UTC parser: "YYYY-MM-DDTHH:MM:SSZ". Intel's PCS
    // timestamps are always UTC with a literal `Z` suffix, never an offset.
    let bytes = s.as_bytes();
    anyhow::ensure!(bytes.len() >= 20 && bytes[bytes.len() - 1] == b'Z', "not a UTC RFC3339 timestamp");
    let year: i64 = s[0..4].parse()?;
    let month: i64 = s[5..7].parse()?;
    let day: i64 = s[8..10].parse()?;
    let hour: i64 = s[11..13].parse()?;
    let minute: i64 = s[14..16].parse()?;
    let second: i64 = s[17..19].parse()?;

    Ok(days_from_civil(year, month, day) * 86400 + hour * 3600 + minute * 60 + second)
}

/// Howard Hinnant's days-from-civil algorithm, days since the Unix epoch.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::byte_array::Fmspc;

    fn platform(sgx: [u8; 16], pcesvn: u16, tdx: Option<[u8; 16]>) -> PlatformTcb {
        PlatformTcb {
            fmspc: Fmspc::new([0; 6]),
            pceid: [0; 2],
            cpusvn: crate::byte_array::CpuSvn::new([0; 16]),
            pcesvn,
            sgx_tcb_comp_svn: sgx,
            tdx_tcb_comp_svn: tdx,
        }
    }

    fn sample_doc_json() -> String {
        r#"{
            "tcbInfo": {
                "fmspc": "00906ed50000",
                "tcbType": 0,
                "tcbEvaluationDataNumber": 14,
                "issueDate": "2024-01-01T00:00:00Z",
                "nextUpdate": "2099-01-01T00:00:00Z",
                "tcbLevels": [
                    {
                        "tcb": { "sgxtcbcomponents": [{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5},{"svn":5}], "pcesvn": 10 },
                        "tcbDate": "2024-01-01T00:00:00Z",
                        "tcbStatus": "UpToDate"
                    },
                    {
                        "tcb": { "sgxtcbcomponents": [{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1},{"svn":1}], "pcesvn": 1 },
                        "tcbDate": "2020-01-01T00:00:00Z",
                        "tcbStatus": "OutOfDate"
                    }
                ]
            },
            "signature": "aabb"
        }"#
        .to_string()
    }

    #[test]
    fn test_evaluate_tcb_matches_first_satisfying_level() {
        let doc = parse_tcb_info(sample_doc_json().as_bytes(), &[]).unwrap();
        let plat = platform([5; 16], 10, None);
        let result = evaluate_tcb(&plat, &doc.tcb_info, 0, false, false).unwrap();
        assert_eq!(result.status, "UpToDate");
    }

    #[test]
    fn test_evaluate_tcb_falls_back_to_lower_level() {
        let doc = parse_tcb_info(sample_doc_json().as_bytes(), &[]).unwrap();
        let plat = platform([2; 16], 2, None);
        let result = evaluate_tcb(&plat, &doc.tcb_info, 0, false, false).unwrap();
        assert_eq!(result.status, "OutOfDate");
    }

    #[test]
    fn test_evaluate_tcb_no_matching_level() {
        let doc = parse_tcb_info(sample_doc_json().as_bytes(), &[]).unwrap();
        let plat = platform([0; 16], 0, None);
        assert!(evaluate_tcb(&plat, &doc.tcb_info, 0, false, false).is_err());
    }

    #[test]
    fn test_enforce_up_to_date_rejects_lower_status() {
        let doc = parse_tcb_info(sample_doc_json().as_bytes(), &[]).unwrap();
        let plat = platform([2; 16], 2, None);
        assert!(evaluate_tcb(&plat, &doc.tcb_info, 0, false, true).is_err());
    }

    #[test]
    fn test_extract_raw_json_field() {
        let json = sample_doc_json();
        let extracted = extract_raw_json_field(json.as_bytes(), "tcbInfo").unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(extracted).unwrap();
        assert_eq!(parsed["fmspc"], "00906ed50000");
    }

    #[test]
    fn test_parse_rfc3339_known_date() {
        // 2024-01-01T00:00:00Z is 1704067200 unix seconds.
        assert_eq!(parse_rfc3339("2024-01-01T00:00:00Z").unwrap(), 1_704_067_200);
    }

    /// Build a root + TCB-Signing-CA leaf chain (PEM) and sign `message`
    /// (raw r||s, SHA-256) with the leaf's key, mirroring the synthetic
    /// quote fixtures in `sgx.rs`/`tdx.rs`.
    fn build_signing_chain(message: &[u8]) -> (Vec<u8>, [u8; 32], String) {
        use ecdsa::signature::hazmat::PrehashSigner;
        use p256::ecdsa::SigningKey;
        use p256::pkcs8::EncodePrivateKey;
        use rand_core::OsRng;

        let root_key = rcgen::KeyPair::generate().unwrap();
        let mut root_params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        root_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        root_params.key_usages = vec![rcgen::KeyUsagePurpose::KeyCertSign];
        let root = root_params.self_signed(&root_key).unwrap();
        let root_der = root.der().to_vec();

        let leaf_signing_key = SigningKey::random(&mut OsRng);
        let pkcs8_der = leaf_signing_key.to_pkcs8_der().unwrap();
        let leaf_rcgen_key = rcgen::KeyPair::from_der(pkcs8_der.as_bytes()).unwrap();
        let leaf_params = rcgen::CertificateParams::new(vec!["tcb-signing.test".to_string()]).unwrap();
        let leaf_der = leaf_params
            .signed_by(&leaf_rcgen_key, &root, &root_key)
            .unwrap()
            .der()
            .to_vec();

        let digest = ring::digest::digest(&ring::digest::SHA256, message);
        let signature: p256::ecdsa::Signature =
            leaf_signing_key.sign_prehash(digest.as_ref()).unwrap();
        let signature_hex = crate::hex::encode(&signature.to_bytes());

        let mut pem = String::new();
        pem.push_str(&pem_block(&leaf_der));
        pem.push_str(&pem_block(&root_der));

        let root_fp = crate::cert::compute_cert_sha256(&root_der);
        (pem.into_bytes(), root_fp, signature_hex)
    }

    fn pem_block(der: &[u8]) -> String {
        use std::fmt::Write;
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
        fn b64(data: &[u8]) -> String {
            let mut out = String::new();
            for chunk in data.chunks(3) {
                let b = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
                let n = ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32;
                out.push(ALPHABET[(n >> 18) as usize & 0x3f] as char);
                out.push(ALPHABET[(n >> 12) as usize & 0x3f] as char);
                out.push(if chunk.len() > 1 { ALPHABET[(n >> 6) as usize & 0x3f] as char } else { '=' });
                out.push(if chunk.len() > 2 { ALPHABET[n as usize & 0x3f] as char } else { '=' });
            }
            out
        }
        let mut out = String::new();
        out.push_str("-----BEGIN CERTIFICATE-----\n");
        for chunk in b64(der).as_bytes().chunks(64) {
            writeln!(out, "{}", std::str::from_utf8(chunk).unwrap()).unwrap();
        }
        out.push_str("-----END CERTIFICATE-----\n");
        out
    }

    #[test]
    fn test_verify_tcb_info_signature_end_to_end() {
        let json = sample_doc_json();
        let tcb_info_bytes = extract_raw_json_field(json.as_bytes(), "tcbInfo").unwrap().to_vec();
        let (issuer_chain_pem, root_fp, signature_hex) = build_signing_chain(&tcb_info_bytes);

        let pinned = crate::pinned_roots::PinnedRoots::new(vec![root_fp]);
        verify_tcb_info_signature(
            json.as_bytes(),
            &signature_hex,
            &issuer_chain_pem,
            &pinned,
            std::time::SystemTime::now(),
        )
        .unwrap();
    }

    #[test]
    fn test_verify_tcb_info_signature_rejects_unpinned_issuer_chain() {
        let json = sample_doc_json();
        let tcb_info_bytes = extract_raw_json_field(json.as_bytes(), "tcbInfo").unwrap().to_vec();
        let (issuer_chain_pem, _root_fp, signature_hex) = build_signing_chain(&tcb_info_bytes);

        let pinned = crate::pinned_roots::PinnedRoots::new(vec![[0u8; 32]]);
        assert!(verify_tcb_info_signature(
            json.as_bytes(),
            &signature_hex,
            &issuer_chain_pem,
            &pinned,
            std::time::SystemTime::now(),
        )
        .is_err());
    }

    #[test]
    fn test_verify_tcb_info_signature_rejects_tampered_body() {
        let json = sample_doc_json();
        let tcb_info_bytes = extract_raw_json_field(json.as_bytes(), "tcbInfo").unwrap().to_vec();
        let (issuer_chain_pem, root_fp, signature_hex) = build_signing_chain(&tcb_info_bytes);

        let mut tampered = json.clone();
        tampered = tampered.replace("\"tcbType\": 0", "\"tcbType\": 1");

        let pinned = crate::pinned_roots::PinnedRoots::new(vec![root_fp]);
        assert!(verify_tcb_info_signature(
            tampered.as_bytes(),
            &signature_hex,
            &issuer_chain_pem,
            &pinned,
            std::time::SystemTime::now(),
        )
        .is_err());
    }
}
