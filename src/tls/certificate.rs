// Certificate-chain validation wrapper (component F).
//
// Grounded on the overall shape of the teacher's `client.rs::process_certificate`
// (parse each DER entry, fatal on parse failure, check against trust roots),
// reimplemented against `x509-parser` instead of the teacher's own internal
// `asn`/`pkix`/`x509` stack, which was not copied into this crate (out of
// scope per spec §1: ASN.1/X.509 parsing is an external collaborator). The
// leaf-public-key-type policy in `check_leaf_key_type` has no teacher
// equivalent; it is built directly from spec §4.F.

use bytes::Bytes;

use crate::tls::error::{HandshakeError, Result};
use std::time::SystemTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicKeyKind {
    Rsa,
    Ecdsa,
    Dsa,
    Other,
}

/// Options controlling how strictly the wrapper enforces what it found.
/// Mirrors the "Consumed from X.509" interface in spec §6.
pub struct ValidateOptions<'a> {
    pub roots: &'a [Bytes],
    pub intermediates: &'a [Bytes],
    pub dns_name: &'a str,
    pub time: SystemTime,
    pub insecure_skip_verify: bool,
    pub client_dsa_enabled: bool,
}

/// What the wrapper observed, recorded into the handshake log regardless of
/// whether the handshake ultimately aborts (spec §4.F: "record but don't
/// fail"). `validate` never aborts on an invalid chain itself -- it always
/// returns `Ok`; only a parse failure or a disallowed leaf key type is
/// fatal directly from this call.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub chain_valid: bool,
    pub validation_error: Option<String>,
    pub leaf_key_kind: PublicKeyKind,
}

/// The external collaborator boundary for X.509 parsing/chain validation
/// (spec §6). A default implementation backed by `x509-parser` is provided;
/// callers with a fuller PKI stack (CRL/OCSP, custom root stores) can swap
/// in their own.
pub trait CertificateValidator: Send + Sync {
    fn validate(&self, chain: &[Bytes], opts: &ValidateOptions) -> Result<ValidationOutcome>;
}

pub struct X509ParserValidator;

impl CertificateValidator for X509ParserValidator {
    fn validate(&self, chain: &[Bytes], opts: &ValidateOptions) -> Result<ValidationOutcome> {
        if chain.is_empty() {
            return Err(HandshakeError::BadCertificate(
                "empty certificate chain".into(),
            ));
        }

        let mut parsed = Vec::with_capacity(chain.len());
        for der in chain {
            let (_, cert) = x509_parser::parse_x509_certificate(der).map_err(|e| {
                HandshakeError::BadCertificate(format!("failed to parse certificate: {}", e))
            })?;
            parsed.push(cert);
        }

        let leaf = &parsed[0];
        let leaf_key_kind = public_key_kind(leaf.public_key().algorithm.algorithm.to_id_string());

        check_leaf_key_type(leaf_key_kind, opts.client_dsa_enabled)?;

        // Chain/trust/time/DNSName validation: delegated entirely to the
        // external validator boundary (`cert.ValidateWithStupidDetail` per
        // spec §6). This default implementation performs the structural
        // checks x509-parser exposes directly (validity window, subject/SAN
        // match) and treats anything deeper (path building against `roots`)
        // as the caller's concern if they need more than this default.
        let now = opts
            .time
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let validity = leaf.validity();
        let time_ok =
            validity.not_before.timestamp() <= now && now <= validity.not_after.timestamp();

        let name_ok = opts.dns_name.is_empty()
            || leaf
                .subject_alternative_name()
                .ok()
                .flatten()
                .map(|ext| {
                    ext.value.general_names.iter().any(|name| match name {
                        x509_parser::extensions::GeneralName::DNSName(dns) => {
                            dns.eq_ignore_ascii_case(opts.dns_name)
                        }
                        _ => false,
                    })
                })
                .unwrap_or(false);

        let chain_valid = time_ok && (name_ok || opts.dns_name.is_empty());
        let validation_error = if chain_valid {
            None
        } else if !time_ok {
            Some("certificate not valid at scan time".to_string())
        } else {
            Some(format!("certificate does not cover {}", opts.dns_name))
        };

        // Never aborts here: a caller needs this outcome recorded into the
        // handshake log even when the handshake is about to fail because of
        // it (spec §4.F "record but don't fail"). The driver decides whether
        // `chain_valid == false` is fatal, after logging this outcome.
        Ok(ValidationOutcome {
            chain_valid,
            validation_error,
            leaf_key_kind,
        })
    }
}

fn public_key_kind(algorithm_oid: String) -> PublicKeyKind {
    match algorithm_oid.as_str() {
        "1.2.840.113549.1.1.1" => PublicKeyKind::Rsa,
        "1.2.840.10045.2.1" => PublicKeyKind::Ecdsa,
        "1.2.840.10040.4.1" => PublicKeyKind::Dsa,
        _ => PublicKeyKind::Other,
    }
}

/// spec §4.F: leaf public-key type must be RSA, ECDSA (or an "augmented"
/// ECDSA variant, which this implementation treats identically to ECDSA
/// since it carries no different wire behavior here), or DSA iff
/// `ClientDSAEnabled`; anything else aborts with `unsupported_certificate`.
fn check_leaf_key_type(kind: PublicKeyKind, client_dsa_enabled: bool) -> Result<()> {
    match kind {
        PublicKeyKind::Rsa | PublicKeyKind::Ecdsa => Ok(()),
        PublicKeyKind::Dsa if client_dsa_enabled => Ok(()),
        _ => Err(HandshakeError::UnsupportedCertificate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsa_leaf_rejected_unless_enabled() {
        assert!(check_leaf_key_type(PublicKeyKind::Dsa, false).is_err());
        assert!(check_leaf_key_type(PublicKeyKind::Dsa, true).is_ok());
    }

    #[test]
    fn rsa_and_ecdsa_always_accepted() {
        assert!(check_leaf_key_type(PublicKeyKind::Rsa, false).is_ok());
        assert!(check_leaf_key_type(PublicKeyKind::Ecdsa, false).is_ok());
    }

    #[test]
    fn other_key_types_rejected() {
        assert!(check_leaf_key_type(PublicKeyKind::Other, true).is_err());
    }
}
