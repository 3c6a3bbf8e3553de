// The record-layer boundary. Record framing, encryption, padding and
// alerts-on-the-wire are all out of scope for this crate (spec §1); the
// driver only ever talks to whatever implements this trait.
//
// The driver is strictly sequential and single-threaded per connection (spec
// §5): no suspension is observable here except a blocking read or write, so
// this boundary is synchronous rather than async.

use bytes::Bytes;

use crate::tls::alert::AlertDescription;
use crate::tls::cipher_suite::CipherSpec;

/// Content type of a TLS record, as seen by the record layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
}

/// One parsed handshake message, still in wire form (`type(1) || length(3) ||
/// body`, body returned separately already framed by the record layer).
#[derive(Debug)]
pub struct RawHandshakeMessage {
    pub message_type: u8,
    pub body: Bytes,
}

/// The external collaborator that owns the TCP connection, record framing,
/// bulk cipher and MAC. Implementations block the calling thread.
pub trait RecordTransport {
    /// Blocks until one complete handshake message has been read (any
    /// ChangeCipherSpec records and non-fatal alerts encountered while
    /// waiting are handled internally and not surfaced here).
    fn read_handshake(&mut self) -> std::io::Result<RawHandshakeMessage>;

    /// Blocks until one record of exactly `content_type` has been read and
    /// returns its payload. Used for ChangeCipherSpec, whose payload is the
    /// single byte 0x01.
    fn read_record(&mut self, content_type: ContentType) -> std::io::Result<Bytes>;

    fn write_record(&mut self, content_type: ContentType, body: &[u8]) -> std::io::Result<()>;

    fn send_alert(&mut self, level: u8, description: AlertDescription) -> std::io::Result<()>;

    /// Installs the negotiated cipher spec for records read after this call.
    fn prepare_read_cipher(&mut self, spec: CipherSpec);

    /// Installs the negotiated cipher spec for records written after this
    /// call.
    fn prepare_write_cipher(&mut self, spec: CipherSpec);
}
