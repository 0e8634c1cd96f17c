//! Extract DER certificates from a concatenated PEM blob.
//!
//! A minimal marker-based splitter rather than pulling in a PEM codec: the
//! PCK certificate chain arrives as one or more
//! `-----BEGIN CERTIFICATE-----` blocks back to back, and that's the only
//! shape this crate ever needs to parse.

use anyhow::{Context, Result};

const BEGIN_MARKER: &str = "-----BEGIN CERTIFICATE-----";
const END_MARKER: &str = "-----END CERTIFICATE-----";

/// Split a PEM blob into its constituent DER certificates, in order.
pub fn extract_pem_certificates(pem: &[u8]) -> Result<Vec<Vec<u8>>> {
    let text = std::str::from_utf8(pem).context("PEM blob is not valid UTF-8")?;
    let mut certs = Vec::new();
    let mut remaining = text;

    while let Some(begin_idx) = remaining.find(BEGIN_MARKER) {
        let after_begin = &remaining[begin_idx + BEGIN_MARKER.len()..];
        let end_idx = after_begin
            .find(END_MARKER)
            .context("PEM certificate missing END marker")?;
        let body = &after_begin[..end_idx];

        let der = base64_decode(body).context("invalid base64 in PEM certificate body")?;
        certs.push(der);

        remaining = &after_begin[end_idx + END_MARKER.len()..];
    }

    anyhow::ensure!(!certs.is_empty(), "no PEM certificates found");
    Ok(certs)
}

/// Decode standard base64 (with or without line wrapping/whitespace), no
/// external crate needed for this one-shot use.
fn base64_decode(body: &str) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = body.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    anyhow::ensure!(cleaned.len() % 4 == 0, "base64 length not a multiple of 4");

    let mut out = Vec::with_capacity(cleaned.len() / 4 * 3);
    for chunk in cleaned.chunks_exact(4) {
        let vals: Vec<u32> = chunk
            .iter()
            .map(|&b| base64_value(b))
            .collect::<Result<_>>()?;
        let pad = chunk.iter().filter(|&&b| b == b'=').count();

        let combined = (vals[0] << 18) | (vals[1] << 12) | (vals[2] << 6) | vals[3];
        out.push((combined >> 16) as u8);
        if pad < 2 {
            out.push((combined >> 8) as u8);
        }
        if pad < 1 {
            out.push(combined as u8);
        }
    }
    Ok(out)
}

fn base64_value(b: u8) -> Result<u32> {
    Ok(match b {
        b'A'..=b'Z' => (b - b'A') as u32,
        b'a'..=b'z' => (b - b'a') as u32 + 26,
        b'0'..=b'9' => (b - b'0') as u32 + 52,
        b'+' => 62,
        b'/' => 63,
        b'=' => 0,
        other => anyhow::bail!("invalid base64 character {other:#x}"),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    const TWO_CERT_PEM: &str = concat!(
        "-----BEGIN CERTIFICATE-----\n",
        "aGVsbG8gd29ybGQ=\n",
        "-----END CERTIFICATE-----\n",
        "-----BEGIN CERTIFICATE-----\n",
        "Zm9vYmFy\n",
        "-----END CERTIFICATE-----\n",
    );

    #[test]
    fn test_extract_multiple_certificates() {
        let certs = extract_pem_certificates(TWO_CERT_PEM.as_bytes()).unwrap();
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0], b"hello world");
        assert_eq!(certs[1], b"foobar");
    }

    #[test]
    fn test_extract_no_markers_fails() {
        assert!(extract_pem_certificates(b"not a pem blob").is_err());
    }

    #[test]
    fn test_extract_missing_end_marker_fails() {
        assert!(extract_pem_certificates(b"-----BEGIN CERTIFICATE-----\nYQ==\n").is_err());
    }
}
