//! Validate an assembled certificate path: each certificate is signed by
//! the next, every CA link respects `BasicConstraints`/`KeyUsage`/
//! `pathLenConstraint`, and every certificate is valid at the caller's
//! verification time.

use std::time::SystemTime;

use anyhow::{ensure, Context, Result};
use x509_parser::certificate::X509Certificate;

/// Validate a leaf-to-root chain of DER certificates.
///
/// `chain` must be ordered leaf-first; the last entry is treated as the
/// trust anchor and is checked for self-signature rather than against a
/// further issuer. Pinned-root membership is the caller's responsibility
/// (see `pinned_roots`); this function only checks internal consistency.
pub fn validate_chain(chain_der: &[Vec<u8>], verification_time: SystemTime) -> Result<()> {
    ensure!(!chain_der.is_empty(), "empty certificate chain");

    let certs: Vec<X509Certificate<'_>> = chain_der
        .iter()
        .map(|der| {
            X509Certificate::from_der(der)
                .map(|(_, cert)| cert)
                .context("failed to parse certificate in chain")
        })
        .collect::<Result<_>>()?;

    for (i, cert) in certs.iter().enumerate() {
        check_validity_period(cert, verification_time)
            .with_context(|| format!("certificate at chain position {i}"))?;

        let is_last = i + 1 == certs.len();
        if !is_last {
            check_is_ca(cert, remaining_path_len(&certs, i))
                .with_context(|| format!("certificate at chain position {i}"))?;
        }
    }

    for i in 0..certs.len() {
        let child = &certs[i];
        let issuer_key = if i + 1 < certs.len() {
            Some(certs[i + 1].public_key())
        } else {
            // Last entry: must be self-signed.
            ensure!(
                child.subject() == child.issuer(),
                "root certificate at chain position {i} is not self-signed"
            );
            Some(child.public_key())
        };

        child
            .verify_signature(issuer_key)
            .with_context(|| format!("signature verification failed at chain position {i}"))?;

        if i + 1 < certs.len() {
            ensure!(
                child.issuer() == certs[i + 1].subject(),
                "certificate at position {i}'s issuer doesn't match position {}'s subject",
                i + 1
            );
        }
    }

    Ok(())
}

fn check_validity_period(cert: &X509Certificate<'_>, now: SystemTime) -> Result<()> {
    let now_unix = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("verification_time predates the Unix epoch")?
        .as_secs() as i64;

    let validity = cert.validity();
    ensure!(
        now_unix >= validity.not_before.timestamp(),
        "certificate not yet valid (not_before: {})",
        validity.not_before
    );
    ensure!(
        now_unix <= validity.not_after.timestamp(),
        "certificate expired (not_after: {})",
        validity.not_after
    );
    Ok(())
}

fn check_is_ca(cert: &X509Certificate<'_>, required_path_len: usize) -> Result<()> {
    let basic_constraints = cert
        .basic_constraints()
        .context("failed to parse BasicConstraints")?
        .context("intermediate certificate is missing the BasicConstraints extension")?
        .value;
    ensure!(
        basic_constraints.ca,
        "intermediate certificate's BasicConstraints doesn't set CA=true"
    );
    if let Some(path_len) = basic_constraints.path_len_constraint {
        ensure!(
            (required_path_len as u32) <= path_len,
            "pathLenConstraint {path_len} violated: {required_path_len} certificates remain below it"
        );
    }

    if let Some(key_usage) = cert
        .key_usage()
        .context("failed to parse KeyUsage")?
        .map(|ext| ext.value)
    {
        ensure!(
            key_usage.key_cert_sign(),
            "intermediate certificate's KeyUsage doesn't permit keyCertSign"
        );
    }

    Ok(())
}

/// Number of certificates strictly below position `i` in the chain (i.e.
/// how many more links the path still has to traverse after this CA).
fn remaining_path_len(certs: &[X509Certificate<'_>], i: usize) -> usize {
    certs.len() - i - 1
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn build_two_level_chain() -> (Vec<u8>, Vec<u8>) {
        let root_key = rcgen::KeyPair::generate().unwrap();
        let mut root_params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        root_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        root_params.key_usages = vec![rcgen::KeyUsagePurpose::KeyCertSign];
        let root = root_params.self_signed(&root_key).unwrap();
        let root_der = root.der().to_vec();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf_params = rcgen::CertificateParams::new(vec!["leaf.test".to_string()]).unwrap();
        let leaf_der = leaf_params
            .signed_by(&leaf_key, &root, &root_key)
            .unwrap()
            .der()
            .to_vec();

        (leaf_der, root_der)
    }

    #[test]
    fn test_valid_two_level_chain_passes() {
        let (leaf_der, root_der) = build_two_level_chain();
        validate_chain(&[leaf_der, root_der], SystemTime::now()).unwrap();
    }

    #[test]
    fn test_expired_certificate_rejected() {
        let (leaf_der, root_der) = build_two_level_chain();
        let far_future = SystemTime::now() + Duration::from_secs(200 * 365 * 24 * 3600);
        assert!(validate_chain(&[leaf_der, root_der], far_future).is_err());
    }

    #[test]
    fn test_not_yet_valid_certificate_rejected() {
        let (leaf_der, root_der) = build_two_level_chain();
        let far_past = SystemTime::UNIX_EPOCH;
        assert!(validate_chain(&[leaf_der, root_der], far_past).is_err());
    }

    #[test]
    fn test_non_ca_intermediate_rejected() {
        let root_key = rcgen::KeyPair::generate().unwrap();
        // No `is_ca` set: BasicConstraints CA=false (rcgen's default).
        let root_params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        let root = root_params.self_signed(&root_key).unwrap();
        let root_der = root.der().to_vec();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf_params = rcgen::CertificateParams::new(vec!["leaf.test".to_string()]).unwrap();
        let leaf_der = leaf_params
            .signed_by(&leaf_key, &root, &root_key)
            .unwrap()
            .der()
            .to_vec();

        assert!(validate_chain(&[leaf_der, root_der], SystemTime::now()).is_err());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let (leaf_der, root_der) = build_two_level_chain();
        let mut tampered_leaf = leaf_der.clone();
        let last = tampered_leaf.len() - 1;
        tampered_leaf[last] ^= 0xff;
        assert!(validate_chain(&[tampered_leaf, root_der], SystemTime::now()).is_err());
    }
}
