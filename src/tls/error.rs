use crate::tls::alert::AlertDescription;

pub type Result<T> = std::result::Result<T, HandshakeError>;

/// Every way a handshake can fail.
///
/// Variants that abort a live connection carry the alert the driver must send
/// before tearing the connection down; config errors never reach the wire.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("no mutually supported protocol version")]
    ProtocolVersion,

    #[error("no mutually usable cipher suite")]
    NoMutualCipher,

    #[error("server selected a cipher suite this client doesn't implement")]
    UnimplementedCipher,

    #[error("certificate error: {0}")]
    BadCertificate(String),

    #[error("unsupported certificate key type")]
    UnsupportedCertificate,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("server's Finished message was incorrect")]
    FinishedMismatch,

    #[error("custom client fingerprint was not byte-compatible with a valid ClientHello: {0}")]
    IncompatibleFingerprint(String),

    #[error("record transport error: {0}")]
    Transport(String),
}

impl HandshakeError {
    /// The alert this error implies should be sent to the peer, if any.
    /// Config errors never reach the wire: the handshake never starts.
    pub fn alert(&self) -> Option<AlertDescription> {
        match self {
            HandshakeError::Config(_) => None,
            HandshakeError::UnexpectedMessage(_) => Some(AlertDescription::unexpected_message),
            HandshakeError::ProtocolVersion => Some(AlertDescription::protocol_version),
            HandshakeError::NoMutualCipher | HandshakeError::UnimplementedCipher => {
                Some(AlertDescription::handshake_failure)
            }
            HandshakeError::BadCertificate(_) => Some(AlertDescription::bad_certificate),
            HandshakeError::UnsupportedCertificate => {
                Some(AlertDescription::unsupported_certificate)
            }
            HandshakeError::Internal(_) => Some(AlertDescription::internal_error),
            HandshakeError::FinishedMismatch => Some(AlertDescription::handshake_failure),
            HandshakeError::IncompatibleFingerprint(_) => None,
            HandshakeError::Transport(_) => None,
        }
    }
}
