//! Pinned Root Validator: test a candidate root certificate's SHA-256
//! fingerprint against a fixed, vendor-specific set.
//!
//! Subject-DN matching is never authoritative: fingerprint equality over the
//! full DER encoding is the only thing that counts.

use crate::cert::compute_cert_sha256;

/// A set of pinned root fingerprints for one vendor family.
#[derive(Debug, Clone, Default)]
pub struct PinnedRoots(Vec<[u8; 32]>);

impl PinnedRoots {
    pub fn new(fingerprints: Vec<[u8; 32]>) -> Self {
        Self(fingerprints)
    }

    pub fn contains_der(&self, root_der: &[u8]) -> bool {
        let fp = compute_cert_sha256(root_der);
        self.0.contains(&fp)
    }

    pub fn contains_fingerprint(&self, fp: &[u8; 32]) -> bool {
        self.0.contains(fp)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Intel's published SGX/TDX DCAP root CA certificate: self-signed, EC
/// P-256, `CN=Intel SGX Root CA, O=Intel Corporation, L=Santa Clara,
/// ST=CA, C=US`, valid 2018-05-21 through 2033-05-21. Every PCK
/// certificate chain produced by DCAP terminates here.
const INTEL_SGX_ROOT_CA_PEM: &str = concat!(
    "-----BEGIN CERTIFICATE-----\n",
    "MIICjzCCAjSgAwIBAgIUImUM1lqdNInzg7SVUr9QGzknBqwwCgYIKoZIzj0EAwIw\n",
    "aDEaMBgGA1UEAwwRSW50ZWwgU0dYIFJvb3QgQ0ExGjAYBgNVBAoMEUludGVsIENv\n",
    "cnBvcmF0aW9uMRQwEgYDVQQHDAtTYW50YSBDbGFyYTELMAkGA1UECAwCQ0ExCzAJ\n",
    "BgNVBAYTAlVTMB4XDTE4MDUyMTEwNDExMVoXDTMzMDUyMTEwNDExMFowaDEaMBgG\n",
    "A1UEAwwRSW50ZWwgU0dYIFJvb3QgQ0ExGjAYBgNVBAoMEUludGVsIENvcnBvcmF0\n",
    "aW9uMRQwEgYDVQQHDAtTYW50YSBDbGFyYTELMAkGA1UECAwCQ0ExCzAJBgNVBAYT\n",
    "AlVTMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEC6nEwMDIYZOj/iPWsCzaEKi7\n",
    "1OiOSLRFhWGjbnBVJfVnkY4u3IjkDYYL0MxO4mqsyYjlBalTVYxFP2sJBK5zlKOB\n",
    "uzCBuDAfBgNVHSMEGDAWgBQiZQzWWp00ifODtJVSv1AbOScGrDBSBgNVHR8ESzBJ\n",
    "MEegRaBDhkFodHRwczovL2NlcnRpZmljYXRlcy50cnVzdGVkc2VydmljZXMuaW50\n",
    "ZWwuY29tL0ludGVsU0dYUm9vdENBLmNybDAdBgNVHQ4EFgQUImUM1lqdNInzg7SV\n",
    "Ur9QGzknBqwwDgYDVR0PAQH/BAQDAgEGMBIGA1UdEwEB/wQIMAYBAf8CAQEwCgYI\n",
    "KoZIzj0EAwIDSQAwRgIhAIpQ/KdMQPcbdLTq3ug17QPoGo3bILKQN8r0XiajmKOJ\n",
    "AiEA3e5tYNTqoTasDpKQJ4dWqkWVyCUsKgVLfHUELxOCLjY=\n",
    "-----END CERTIFICATE-----\n",
);

/// SHA-256 fingerprint of [`INTEL_SGX_ROOT_CA_PEM`]'s DER encoding,
/// precomputed rather than derived at runtime (spec.md §5: "no lazy
/// initialization... pinned-root fingerprints are computed once at library
/// load or precomputed as constants"). Cross-checked against the PEM above
/// by `test_intel_sgx_root_fingerprint_matches_pem`.
const INTEL_SGX_ROOT_CA_FINGERPRINT: [u8; 32] = [
    0x3c, 0x54, 0x15, 0x1d, 0x3e, 0xf9, 0x98, 0xa5, 0xce, 0xea, 0xde, 0xce, 0x94, 0x30, 0x6f, 0x15,
    0x1b, 0x40, 0xbd, 0xbe, 0x0b, 0xf2, 0xb6, 0x31, 0x59, 0x3a, 0x7f, 0x22, 0x3a, 0xd8, 0x54, 0x6c,
];

/// Intel's published SGX/TDX DCAP root CA fingerprint set, used by default
/// for both `verify_sgx` and `verify_tdx` (spec.md §6: "default: Intel SGX
/// Root CA for SGX/TDX"). Override via `VerifyConfig::pinned_roots` to pin
/// against a different or additional root (e.g. Intel's DCAP staging root).
pub fn intel_sgx_default_roots() -> PinnedRoots {
    PinnedRoots(vec![INTEL_SGX_ROOT_CA_FINGERPRINT])
}

/// AMD's published Milan/Genoa/Turin ARK (AMD Root Key) fingerprint set,
/// used by default for `verify_sev_snp`.
///
/// Unlike [`INTEL_SGX_ROOT_CA_PEM`] above, no real Milan/Genoa/Turin ARK
/// certificate is available anywhere in this crate's source material to
/// ground a fingerprint against; hand-typing one from memory risks silently
/// pinning to the wrong bytes, which is worse than leaving the gap open.
/// This returns an empty set until real ARK fingerprints can be sourced and
/// compiled in. Because the orchestrator's pinned-root check in
/// `sevsnp.rs` is unconditional (no `is_empty()` bypass), an empty default
/// does not silently skip pinning: every `verify_sev_snp` call with the
/// default config now fails closed with `UnpinnedRoot` until the caller
/// supplies `VerifyConfig::pinned_roots` explicitly.
pub fn amd_sev_snp_default_roots() -> PinnedRoots {
    PinnedRoots(Vec::new())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_intel_sgx_default_roots_pins_the_real_root() {
        let roots = intel_sgx_default_roots();
        assert!(!roots.is_empty());
        assert!(roots.contains_fingerprint(&INTEL_SGX_ROOT_CA_FINGERPRINT));
    }

    #[test]
    fn test_intel_sgx_default_roots_rejects_unrelated_der() {
        let roots = intel_sgx_default_roots();
        assert!(!roots.contains_der(b"not the intel root"));
    }

    #[test]
    fn test_intel_sgx_root_fingerprint_matches_pem() {
        let der = crate::cert::extract_pem_certificates(INTEL_SGX_ROOT_CA_PEM.as_bytes())
            .unwrap()
            .remove(0);
        assert_eq!(compute_cert_sha256(&der), INTEL_SGX_ROOT_CA_FINGERPRINT);
    }

    #[test]
    fn test_amd_sev_snp_default_roots_is_empty_pending_real_ark_fingerprints() {
        let roots = amd_sev_snp_default_roots();
        assert!(roots.is_empty());
        assert!(!roots.contains_der(b"anything"));
    }

    #[test]
    fn test_pinned_root_matches_own_fingerprint() {
        let root_key = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        let root = params.self_signed(&root_key).unwrap();
        let root_der = root.der().to_vec();

        let fp = compute_cert_sha256(&root_der);
        let roots = PinnedRoots::new(vec![fp]);
        assert!(roots.contains_der(&root_der));
    }

    #[test]
    fn test_unpinned_root_rejected() {
        let root_key = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        let root = params.self_signed(&root_key).unwrap();
        let root_der = root.der().to_vec();

        let roots = PinnedRoots::new(vec![[0u8; 32]]);
        assert!(!roots.contains_der(&root_der));
    }
}
