// Full client configuration surface (spec §6), replacing the teacher's
// `tls/options.rs::ClientOptions`, which is shaped for TLS 1.3 only
// (x25519-only key share, AES-GCM/ChaCha suite list, no fingerprint/session
// cache/extended-randomness knobs at all).

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;

use crate::tls::cipher_suite::CipherSuiteId;
use crate::tls::client_hello::ClientHelloFingerprint;
use crate::tls::handshake::HandshakeVersion;
use crate::tls::rng::SecureRandom;
use crate::tls::session_cache::ClientSessionCache;

/// A local certificate chain plus associated private key material, used only
/// if the server sends a CertificateRequest during the initial handshake
/// (post-handshake client auth is out of scope per spec Non-goals).
pub struct CertificateAndKey {
    pub certificate_chain: Vec<Bytes>,
    pub private_key_der: Bytes,
}

pub struct ClientConfig {
    pub server_name: String,
    pub insecure_skip_verify: bool,
    pub client_fingerprint: Option<ClientHelloFingerprint>,
    pub client_random: Option<[u8; 32]>,
    pub extended_master_secret: bool,
    pub extended_random: bool,
    pub heartbeat_enabled: bool,
    pub force_session_ticket_ext: bool,
    pub signed_certificate_timestamp_ext: bool,
    pub force_suites: bool,
    pub session_tickets_disabled: bool,
    pub client_session_cache: Option<Arc<dyn ClientSessionCache>>,
    pub client_dsa_enabled: bool,
    pub next_protos: Vec<Bytes>,
    pub certificates: Vec<CertificateAndKey>,
    pub root_cas: Vec<Bytes>,
    pub curve_preferences: Vec<u16>,
    pub cipher_suites: Vec<CipherSuiteId>,
    pub min_version: HandshakeVersion,
    pub max_version: HandshakeVersion,
    pub signature_and_hashes_for_client: Vec<(u8, u8)>,
    pub rand: Arc<dyn SecureRandom>,
    pub time: fn() -> SystemTime,
}

fn default_time() -> SystemTime {
    SystemTime::now()
}

impl ClientConfig {
    /// A permissive default appropriate for a scanning client: broad version
    /// range, broad cipher-suite set, certificate validation errors recorded
    /// but not fatal unless the caller opts in.
    pub fn recommended(server_name: impl Into<String>) -> Self {
        use crate::tls::cipher_suite::implemented_suites;
        use crate::tls::rng::OsRandom;

        ClientConfig {
            server_name: server_name.into(),
            insecure_skip_verify: true,
            client_fingerprint: None,
            client_random: None,
            extended_master_secret: true,
            extended_random: false,
            heartbeat_enabled: false,
            force_session_ticket_ext: false,
            signed_certificate_timestamp_ext: false,
            force_suites: false,
            session_tickets_disabled: false,
            client_session_cache: None,
            client_dsa_enabled: false,
            next_protos: vec![],
            certificates: vec![],
            root_cas: vec![],
            curve_preferences: vec![0x0017, 0x0018], // secp256r1, secp384r1
            cipher_suites: implemented_suites().iter().map(|e| e.id).collect(),
            min_version: HandshakeVersion::TLS1_0,
            max_version: HandshakeVersion::TLS1_2,
            signature_and_hashes_for_client: vec![
                (4, 1), // sha256, rsa
                (5, 1), // sha384, rsa
                (4, 3), // sha256, ecdsa
                (2, 1), // sha1, rsa
                (2, 3), // sha1, ecdsa
            ],
            rand: Arc::new(OsRandom::default()),
            time: default_time,
        }
    }
}
