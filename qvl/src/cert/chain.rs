//! Assemble an ordered certificate path (leaf, intermediate(s)..., root)
//! from an unordered pool of candidate DER certificates.
//!
//! The PCK chain in a quote's cert_data is conventionally already ordered
//! leaf-first, but `extra_certificates` from the caller (e.g. a missing
//! intermediate) may need splicing in, so the builder doesn't assume order:
//! it walks from the leaf by subject/issuer matching.

use std::fmt;

use anyhow::{bail, ensure, Context, Result};
use x509_parser::certificate::X509Certificate;

pub struct ParsedChain {
    /// DER bytes, ordered leaf to root.
    pub der: Vec<Vec<u8>>,
}

/// Marker error distinguishing "more than one candidate matched" from a
/// generic broken chain, so callers can report [`crate::error::VerifyError::AmbiguousChain`]
/// instead of the catch-all [`crate::error::VerifyError::BrokenChain`].
#[derive(Debug)]
pub struct AmbiguousChainError {
    pub issuer: String,
    pub count: usize,
}

impl fmt::Display for AmbiguousChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} candidates match issuer {}", self.count, self.issuer)
    }
}

impl std::error::Error for AmbiguousChainError {}

/// Build the path starting from `leaf_der`, consulting `pool` (additional
/// candidate certificates, e.g. intermediates from the quote plus any
/// caller-supplied `extra_certificates`) for each next issuer. Stops at the
/// first self-signed certificate.
pub fn build_chain(leaf_der: &[u8], pool: &[Vec<u8>]) -> Result<ParsedChain> {
    let mut chain = vec![leaf_der.to_vec()];
    let mut current_der = leaf_der.to_vec();

    loop {
        let (_, current) =
            X509Certificate::from_der(&current_der).context("failed to parse certificate")?;

        if is_self_signed(&current) {
            break;
        }

        let issuer = current.issuer().clone();
        let mut candidates: Vec<&Vec<u8>> = Vec::new();
        for candidate_der in pool {
            if candidate_der == &current_der {
                continue;
            }
            let Ok((_, candidate)) = X509Certificate::from_der(candidate_der) else {
                continue;
            };
            if candidate.subject() == &issuer {
                candidates.push(candidate_der);
            }
        }

        match candidates.len() {
            0 => bail!("no certificate in the supplied pool matches issuer {issuer}"),
            1 => {
                current_der = candidates[0].clone();
                chain.push(current_der.clone());
            }
            n => {
                return Err(AmbiguousChainError {
                    issuer: issuer.to_string(),
                    count: n,
                }
                .into())
            }
        }

        ensure!(chain.len() <= pool.len() + 2, "certificate chain longer than the candidate pool, likely a cycle");
    }

    Ok(ParsedChain { der: chain })
}

fn is_self_signed(cert: &X509Certificate<'_>) -> bool {
    cert.subject() == cert.issuer()
}

/// Assemble a chain from an unordered bag of certificates with no declared
/// leaf (the `MissingCertData` case: the quote carried no inline PCK chain,
/// so the whole chain comes from `extra_certificates`).
///
/// The leaf is identified as the unique certificate in the bag that isn't
/// the issuer of any other certificate in it -- every CA in a chain signs
/// the next certificate down, so the one certificate nobody in the bag was
/// signed by is the end-entity.
pub fn build_chain_from_bag(certs_der: &[Vec<u8>]) -> Result<ParsedChain> {
    ensure!(!certs_der.is_empty(), "no certificates supplied to assemble a chain from");

    let parsed: Vec<X509Certificate<'_>> = certs_der
        .iter()
        .map(|der| {
            X509Certificate::from_der(der)
                .map(|(_, cert)| cert)
                .context("failed to parse a certificate in the supplied bag")
        })
        .collect::<Result<_>>()?;

    let leaf_candidates: Vec<usize> = (0..parsed.len())
        .filter(|&i| {
            !parsed
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && other.issuer() == parsed[i].subject())
        })
        .collect();

    match leaf_candidates.len() {
        0 => bail!("every certificate in the supplied bag signs another; no leaf identifiable"),
        1 => {
            let leaf_idx = leaf_candidates[0];
            let leaf_der = certs_der[leaf_idx].clone();
            let pool: Vec<Vec<u8>> = certs_der
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != leaf_idx)
                .map(|(_, der)| der.clone())
                .collect();
            build_chain(&leaf_der, &pool)
        }
        n => Err(AmbiguousChainError {
            issuer: "<bag has no inline leaf marker>".to_string(),
            count: n,
        }
        .into()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn self_signed_der(subject: &str) -> Vec<u8> {
        let params = rcgen::CertificateParams::new(vec![subject.to_string()]).unwrap();
        let key = rcgen::KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().der().to_vec()
    }

    #[test]
    fn test_single_self_signed_cert_is_its_own_chain() {
        let der = self_signed_der("root.test");
        let chain = build_chain(&der, &[]).unwrap();
        assert_eq!(chain.der.len(), 1);
    }

    #[test]
    fn test_no_matching_issuer_fails() {
        let root_key = rcgen::KeyPair::generate().unwrap();
        let root_params = rcgen::CertificateParams::new(vec!["root.test".to_string()]).unwrap();
        let root = root_params.self_signed(&root_key).unwrap();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf_params = rcgen::CertificateParams::new(vec!["leaf.test".to_string()]).unwrap();
        let leaf_der = leaf_params
            .signed_by(&leaf_key, &root, &root_key)
            .unwrap()
            .der()
            .to_vec();

        // empty pool: no issuer cert available to complete the chain
        assert!(build_chain(&leaf_der, &[]).is_err());
    }

    #[test]
    fn test_two_level_chain_resolves_via_pool() {
        let root_key = rcgen::KeyPair::generate().unwrap();
        let root_params = rcgen::CertificateParams::new(vec!["root.test".to_string()]).unwrap();
        let root = root_params.self_signed(&root_key).unwrap();
        let root_der = root.der().to_vec();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf_params = rcgen::CertificateParams::new(vec!["leaf.test".to_string()]).unwrap();
        let leaf_der = leaf_params
            .signed_by(&leaf_key, &root, &root_key)
            .unwrap()
            .der()
            .to_vec();

        let chain = build_chain(&leaf_der, &[root_der.clone()]).unwrap();
        assert_eq!(chain.der.len(), 2);
        assert_eq!(chain.der[1], root_der);
    }

    #[test]
    fn test_build_chain_from_bag_identifies_leaf() {
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

        // Unordered bag, leaf listed last.
        let bag = vec![root_der.clone(), leaf_der.clone()];
        let chain = build_chain_from_bag(&bag).unwrap();
        assert_eq!(chain.der[0], leaf_der);
        assert_eq!(chain.der[1], root_der);
    }

    #[test]
    fn test_build_chain_from_bag_all_self_signed_is_ambiguous() {
        let der_a = self_signed_der("a.test");
        let der_b = self_signed_der("b.test");
        let err = build_chain_from_bag(&[der_a, der_b]).unwrap_err();
        assert!(err.downcast_ref::<AmbiguousChainError>().is_some());
    }
}
