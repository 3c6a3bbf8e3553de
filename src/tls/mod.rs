#[macro_use]
mod macros;
pub mod alert;
pub mod certificate;
pub mod cipher_suite;
pub mod client_hello;
pub mod config;
pub mod driver;
pub mod error;
pub mod extensions;
pub mod handshake;
pub mod key_exchange;
pub mod key_schedule;
pub mod log;
mod parsing;
pub mod rng;
pub mod session_cache;
pub mod transcript;
pub mod transport;

pub use config::{CertificateAndKey, ClientConfig};
pub use driver::handshake as run_handshake;
pub use error::{HandshakeError, Result};
pub use log::{HandshakeLog, HandshakeOutcome};
pub use session_cache::{ClientSessionCache, ClientSessionState, LruSessionCache};
pub use transport::{ContentType, RawHandshakeMessage, RecordTransport};

// Big-endian network order throughout, per RFC 5246.
