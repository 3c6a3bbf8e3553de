//! Client-side TLS 1.0/1.1/1.2 handshake engine for a measurement-oriented
//! scanning client: drives one handshake to completion (or failure) over a
//! caller-supplied transport and returns a full log of what was observed,
//! independent of whether the handshake succeeded.
//!
//! See [`tls::driver::handshake`] for the entry point and [`tls::config`] for
//! the knobs that control fingerprinting, resumption, and client auth.

pub mod tls;
