// RNG source. Out of scope per the spec's external-interfaces boundary, but a
// concrete default is needed for the crate to be usable/testable end to end.

use rand::RngCore;

/// A source of cryptographically secure random bytes, shared across
/// concurrently running handshakes. Implementations must be `Send + Sync`.
pub trait SecureRandom: Send + Sync {
    fn fill(&self, buf: &mut [u8]);
}

/// Default implementation backed by the OS CSPRNG.
#[derive(Default, Clone, Copy)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, buf: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_whole_buffer() {
        let rng = OsRandom::default();
        let mut buf = [0u8; 32];
        rng.fill(&mut buf);
        assert_ne!(buf, [0u8; 32]);
    }
}
