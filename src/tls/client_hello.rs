// ClientHello builder (component B): two independent construction paths,
// semantic and fingerprint, exactly one of which is taken per handshake
// (spec Invariant 1).
//
// Semantic path grounded on the teacher's `handshake.rs::ClientHello::plain`.
// Fingerprint path grounded on
// `other_examples/535ee67f_vistone-fingerprint-rust/.../builder.rs`'s
// `ClientHelloSpecBuilder` (explicit, fully caller-specified extension/suite
// list re-marshaled verbatim), scoped down to this spec's simpler
// "opaque bytes, validated, re-parsed" model rather than that crate's
// browser-preset tables.

use bytes::Bytes;

use crate::tls::cipher_suite::CipherSuiteId;
use crate::tls::config::ClientConfig;
use crate::tls::error::{HandshakeError, Result};
use crate::tls::extensions::{has_extended_master_secret, validate_extensions, Extension};
use crate::tls::handshake::{frame_handshake_message, ClientHello, HandshakeMessageType};
use crate::tls::session_cache::ClientSessionState;

/// A caller-specified literal ClientHello blueprint. Unlike the semantic
/// path, this bypasses most internal sanity checks -- it is re-parsed back
/// into a semantic `ClientHello` after emission so the driver can still
/// reason about what was sent (spec §4.B).
pub struct ClientHelloFingerprint {
    pub legacy_version: u16,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

/// Result of building the first flight: the framed wire bytes, plus the
/// semantic form the driver reasons about from here on (spec Invariant 1).
pub struct BuiltClientHello {
    pub wire_bytes: Vec<u8>,
    pub semantic: ClientHello,
    /// The bytes sent in an ExtendedRandom extension, if any (spec §4.C).
    /// `None` whenever extended random wasn't offered, including whenever
    /// extended master secret was (the two are mutually exclusive).
    pub client_extended_random: Option<Bytes>,
}

/// Semantic path: allocate the ClientHello from `config`, filling random from
/// the configured RNG unless an exact 32-byte `ClientRandom` was supplied,
/// and offering resumption if `cached_session` is present and still
/// compatible with the current configuration.
pub fn build_semantic(
    config: &ClientConfig,
    cached_session: Option<&ClientSessionState>,
) -> Result<BuiltClientHello> {
    if config.server_name.is_empty() && !config.insecure_skip_verify {
        return Err(HandshakeError::Config(
            "ServerName is required unless InsecureSkipVerify is set".into(),
        ));
    }

    let mut random = [0u8; 32];
    if let Some(r) = config.client_random {
        random = r;
    } else {
        config.rand.fill(&mut random);
    }

    let mut session_id = Bytes::new();
    if let Some(session) = cached_session {
        if config.cipher_suites.contains(&session.cipher_suite_id)
            && session.protocol_version >= config.min_version
            && session.protocol_version <= config.max_version
        {
            let mut id = [0u8; 16];
            config.rand.fill(&mut id);
            session_id = Bytes::copy_from_slice(&id);
        }
    }

    let mut extensions = Vec::new();
    if !config.server_name.is_empty() {
        extensions.push(Extension::ServerName(vec![config.server_name.clone()]));
    }
    if !config.next_protos.is_empty() {
        extensions.push(Extension::Alpn(config.next_protos.clone()));
        // Requests NPN too (spec §4.H): an empty list here just signals
        // support, same as real clients do -- the server answers with its
        // own protocol list, which `mutual_protocol` intersects against this
        // same `next_protos` set.
        extensions.push(Extension::NextProtocolNegotiation(Vec::new()));
    }
    extensions.push(Extension::SecureRenegotiation);
    if config.extended_master_secret {
        extensions.push(Extension::ExtendedMasterSecret);
    }
    // Mutually exclusive with extended master secret (spec §4.C): a session
    // bound to the transcript hash gets no additional benefit from extra
    // random bytes in the plain master-secret seed, and this builder never
    // offers both at once.
    let mut client_extended_random = None;
    if config.extended_random && !config.extended_master_secret {
        let mut extra = vec![0u8; 32];
        config.rand.fill(&mut extra);
        let extra = Bytes::from(extra);
        extensions.push(Extension::ExtendedRandom(extra.clone()));
        client_extended_random = Some(extra);
    }
    if !config.curve_preferences.is_empty() {
        extensions.push(Extension::SupportedCurves(config.curve_preferences.clone()));
        extensions.push(Extension::PointFormats(vec![0]));
    }
    if !config.signature_and_hashes_for_client.is_empty() {
        extensions.push(Extension::SignatureAlgorithms(
            config.signature_and_hashes_for_client.clone(),
        ));
    }
    if config.signed_certificate_timestamp_ext {
        extensions.push(Extension::SignedCertificateTimestamp);
    }
    if config.force_session_ticket_ext || cached_session.is_some() {
        let ticket = cached_session
            .and_then(|s| s.session_ticket.clone())
            .unwrap_or_default();
        extensions.push(Extension::SessionTicket(ticket));
    }

    validate_extensions(&extensions, &config.signature_and_hashes_for_client)?;

    let cipher_suites: Vec<u16> = config.cipher_suites.iter().map(|id| id.to_u16()).collect();

    let semantic = ClientHello {
        legacy_version: config.max_version.0,
        random,
        legacy_session_id: session_id,
        cipher_suites,
        legacy_compression_methods: vec![0],
        extensions,
    };

    let body = semantic.serialize_body();
    let wire_bytes = frame_handshake_message(HandshakeMessageType::client_hello, &body);

    Ok(BuiltClientHello {
        wire_bytes,
        semantic,
        client_extended_random,
    })
}

/// Fingerprint path: the caller dictates every byte. Still validates
/// extensions and still fills random from RNG if `ClientRandom` was not
/// exactly 32 bytes; still refuses a zero-length or malformed compression
/// list. When `ForceSuites` is false every advertised suite must be in the
/// implemented table.
pub fn build_fingerprint(
    config: &ClientConfig,
    fingerprint: &ClientHelloFingerprint,
) -> Result<BuiltClientHello> {
    if fingerprint.compression_methods.is_empty() || fingerprint.compression_methods[0] != 0 {
        return Err(HandshakeError::Config(
            "compression methods must start with null compression (0)".into(),
        ));
    }

    if !config.force_suites {
        for id in &fingerprint.cipher_suites {
            let suite_id = CipherSuiteId::from_u16(*id);
            if crate::tls::cipher_suite::lookup(suite_id).is_none() {
                return Err(HandshakeError::Config(format!(
                    "cipher suite 0x{:04x} is not implemented and ForceSuites is not set",
                    id
                )));
            }
        }
    }

    validate_extensions(&fingerprint.extensions, &config.signature_and_hashes_for_client)?;

    let mut random = [0u8; 32];
    if let Some(r) = config.client_random {
        random = r;
    } else {
        config.rand.fill(&mut random);
    }

    let semantic = ClientHello {
        legacy_version: fingerprint.legacy_version,
        random,
        legacy_session_id: Bytes::new(),
        cipher_suites: fingerprint.cipher_suites.clone(),
        legacy_compression_methods: fingerprint.compression_methods.clone(),
        extensions: fingerprint.extensions.clone(),
    };

    let body = semantic.serialize_body();
    let wire_bytes = frame_handshake_message(HandshakeMessageType::client_hello, &body);

    // Re-parse the bytes we just emitted back into semantic form (spec
    // §4.B): this is what actually drives the rest of the handshake, so a
    // fingerprint the parser can't recognize its own output for is rejected
    // up front rather than silently misdriving later stages.
    let mut reparse_input = Bytes::copy_from_slice(&body);
    let reparsed = ClientHello::parse(&mut reparse_input)
        .map_err(|e| HandshakeError::IncompatibleFingerprint(e.to_string()))?;

    // Same mutual-exclusion rule as the semantic path (spec §4.C): a
    // fingerprint that specifies both extensions is honored byte-for-byte on
    // the wire (the fingerprint path doesn't reject that combination), but
    // only extended master secret drives key derivation.
    let client_extended_random = if has_extended_master_secret(&reparsed.extensions) {
        None
    } else {
        crate::tls::extensions::find_extended_random(&reparsed.extensions).cloned()
    };

    Ok(BuiltClientHello {
        wire_bytes,
        semantic: reparsed,
        client_extended_random,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_builder_requires_server_name_unless_insecure() {
        let mut config = ClientConfig::recommended("");
        config.insecure_skip_verify = false;
        assert!(build_semantic(&config, None).is_err());
    }

    #[test]
    fn semantic_builder_populates_sni() {
        let config = ClientConfig::recommended("example.test");
        let built = build_semantic(&config, None).unwrap();
        assert!(crate::tls::extensions::find_sni(&built.semantic.extensions)
            .unwrap()
            .contains(&"example.test".to_string()));
    }

    #[test]
    fn fingerprint_rejects_empty_compression_list() {
        let config = ClientConfig::recommended("example.test");
        let fp = ClientHelloFingerprint {
            legacy_version: 0x0303,
            cipher_suites: vec![0x009c],
            compression_methods: vec![],
            extensions: vec![],
        };
        assert!(build_fingerprint(&config, &fp).is_err());
    }

    #[test]
    fn fingerprint_round_trips_byte_exact() {
        let config = ClientConfig::recommended("example.test");
        let mut cfg = config;
        cfg.client_random = Some([7u8; 32]);
        let fp = ClientHelloFingerprint {
            legacy_version: 0x0303,
            cipher_suites: vec![0x009c],
            compression_methods: vec![0],
            extensions: vec![Extension::ServerName(vec!["example.test".to_string()])],
        };
        let built = build_fingerprint(&cfg, &fp).unwrap();
        assert_eq!(built.semantic.legacy_version, 0x0303);
        assert_eq!(built.semantic.cipher_suites, vec![0x009c]);
    }

    #[test]
    fn fingerprint_rejects_unimplemented_suite_unless_forced() {
        let mut config = ClientConfig::recommended("example.test");
        let fp = ClientHelloFingerprint {
            legacy_version: 0x0303,
            cipher_suites: vec![0x00ff],
            compression_methods: vec![0],
            extensions: vec![],
        };
        assert!(build_fingerprint(&config, &fp).is_err());
        config.force_suites = true;
        assert!(build_fingerprint(&config, &fp).is_ok());
    }

    #[test]
    fn extended_random_and_extended_master_secret_are_mutually_exclusive() {
        let mut config = ClientConfig::recommended("example.test");
        config.extended_master_secret = true;
        config.extended_random = true;
        let built = build_semantic(&config, None).unwrap();
        assert!(crate::tls::extensions::has_extended_master_secret(
            &built.semantic.extensions
        ));
        assert!(built.client_extended_random.is_none());
        assert!(crate::tls::extensions::find_extended_random(&built.semantic.extensions).is_none());
    }

    #[test]
    fn extended_random_sent_when_extended_master_secret_disabled() {
        let mut config = ClientConfig::recommended("example.test");
        config.extended_master_secret = false;
        config.extended_random = true;
        let built = build_semantic(&config, None).unwrap();
        assert!(built.client_extended_random.is_some());
        assert!(crate::tls::extensions::find_extended_random(&built.semantic.extensions).is_some());
    }
}
