// Handshake log (component H).
//
// Grounded on the teacher's `tls/handshake_summary.rs`
// (`HandshakeSummary{selected_alpn_protocol, certificate}`) as a starting
// shape, expanded substantially per spec §3/§4.H into a full append-only
// per-message log -- the teacher's version is a convenience summary, not a
// log of every message.

use bytes::Bytes;

use crate::tls::certificate::ValidationOutcome;
use crate::tls::handshake::{
    Certificate, CertificateRequest, ClientHello, DigitallySigned, NewSessionTicket, ServerHello,
};

/// Append-only record of every handshake message sent or received, populated
/// strictly in wire order (spec §4.H). Observable even when the handshake
/// ultimately aborts, for whatever prefix of messages was actually seen.
#[derive(Default)]
pub struct HandshakeLog {
    pub client_hello: Option<ClientHello>,
    pub server_hello: Option<ServerHello>,
    pub server_certificates: Option<Certificate>,
    pub server_certificate_validation: Option<ValidationOutcome>,
    pub server_certificate_status: Option<Bytes>,
    pub server_key_exchange: Option<Bytes>,
    pub certificate_request: Option<CertificateRequest>,
    pub client_certificate: Option<Certificate>,
    pub client_key_exchange: Option<Bytes>,
    pub certificate_verify: Option<DigitallySigned>,
    pub session_ticket: Option<NewSessionTicket>,
    pub client_finished: Option<Bytes>,
    pub server_finished: Option<Bytes>,
    pub selected_alpn_protocol: Option<Bytes>,
    pub negotiated_next_protocol: Option<Bytes>,
    pub next_protocol_fallback: bool,
    pub did_resume: bool,
    pub cipher_suite: Option<u16>,
    pub version: Option<u16>,
}

impl HandshakeLog {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Always returned from the handshake entry point, regardless of whether the
/// handshake succeeded: a caller gets the log either way (spec §7).
pub struct HandshakeOutcome {
    pub log: HandshakeLog,
    pub result: crate::tls::error::Result<()>,
}
