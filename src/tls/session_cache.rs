// Session cache interface (component E).
//
// The teacher has no equivalent (dacha's TLS client never implements
// resumption); grounded instead on the shared/mutex-guarded global-cache
// pattern used for `lazy_static`-backed singletons elsewhere in the monorepo
// (`pkg/common`). Must be safe for concurrent get/put with no lock held
// across I/O (spec §5).

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;

use crate::tls::cipher_suite::CipherSuiteId;
use crate::tls::handshake::HandshakeVersion;

/// A resumable session, as cached at the end of a handshake (spec §3).
#[derive(Clone, Debug)]
pub struct ClientSessionState {
    pub session_ticket: Option<Bytes>,
    pub protocol_version: HandshakeVersion,
    pub cipher_suite_id: CipherSuiteId,
    pub master_secret: Vec<u8>,
    pub server_certificates: Vec<Bytes>,
    pub extended_master_secret: bool,
    pub lifetime_hint: u32,
}

/// Shared across connections; a single implementation is handed by reference
/// to every handshake driver instance.
pub trait ClientSessionCache: Send + Sync {
    fn get(&self, key: &str) -> Option<ClientSessionState>;
    fn put(&self, key: String, state: ClientSessionState);
}

/// Bounded, mutex-guarded, least-recently-used default implementation. The
/// only concrete cache this crate ships; callers needing persistence across
/// process restarts implement `ClientSessionCache` themselves.
pub struct LruSessionCache {
    capacity: usize,
    inner: Mutex<LruInner>,
}

struct LruInner {
    order: VecDeque<String>,
    entries: HashMap<String, ClientSessionState>,
}

impl LruSessionCache {
    pub fn new(capacity: usize) -> Self {
        LruSessionCache {
            capacity,
            inner: Mutex::new(LruInner {
                order: VecDeque::new(),
                entries: HashMap::new(),
            }),
        }
    }
}

impl ClientSessionCache for LruSessionCache {
    fn get(&self, key: &str) -> Option<ClientSessionState> {
        let mut inner = self.inner.lock().unwrap();
        let state = inner.entries.get(key).cloned();
        if state.is_some() {
            inner.order.retain(|k| k != key);
            inner.order.push_back(key.to_string());
        }
        state
    }

    fn put(&self, key: String, state: ClientSessionState) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        inner.order.retain(|k| k != &key);
        inner.order.push_back(key.clone());
        inner.entries.insert(key, state);
    }
}

/// Derives the cache key for a handshake: the configured ServerName if
/// non-empty, else the peer address (spec §4.E).
pub fn session_key(server_name: &str, peer_addr: &str) -> String {
    if !server_name.is_empty() {
        server_name.to_string()
    } else {
        peer_addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClientSessionState {
        ClientSessionState {
            session_ticket: None,
            protocol_version: HandshakeVersion::TLS1_2,
            cipher_suite_id: CipherSuiteId::TLS_RSA_WITH_AES_128_GCM_SHA256,
            master_secret: vec![1; 48],
            server_certificates: vec![],
            extended_master_secret: true,
            lifetime_hint: 0,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = LruSessionCache::new(4);
        cache.put("a.b".to_string(), sample());
        let got = cache.get("a.b").unwrap();
        assert_eq!(got.master_secret, sample().master_secret);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = LruSessionCache::new(1);
        cache.put("one".to_string(), sample());
        cache.put("two".to_string(), sample());
        assert!(cache.get("one").is_none());
        assert!(cache.get("two").is_some());
    }

    #[test]
    fn session_key_prefers_server_name() {
        assert_eq!(session_key("a.b", "1.2.3.4:443"), "a.b");
        assert_eq!(session_key("", "1.2.3.4:443"), "1.2.3.4:443");
    }
}
