// Cipher suite registry. Grounded on the teacher's `enum_def_with_unknown!`
// registry style, extended with the kex/bulk-cipher/MAC/length table the
// handshake driver needs to build the key schedule and key block (spec §3).

use crate::enum_def_with_unknown;
use crate::tls::error::{HandshakeError, Result};

enum_def_with_unknown!(
    #[allow(non_camel_case_types)]
    CipherSuiteId u16 =>
    TLS_RSA_WITH_AES_128_CBC_SHA = 0x002f,
    TLS_RSA_WITH_AES_256_CBC_SHA = 0x0035,
    TLS_RSA_WITH_AES_128_CBC_SHA256 = 0x003c,
    TLS_RSA_WITH_AES_128_GCM_SHA256 = 0x009c,
    TLS_RSA_WITH_AES_256_GCM_SHA384 = 0x009d,

    TLS_DHE_RSA_WITH_AES_128_CBC_SHA = 0x0033,
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA = 0x0039,

    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA = 0xc013,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA = 0xc014,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256 = 0xc027,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 = 0xc02f,
    TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 = 0xc030,

    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA = 0xc009,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA = 0xc00a,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256 = 0xc023,
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 = 0xc02b,
    TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 = 0xc02c,

    TLS_DH_anon_WITH_AES_128_CBC_SHA = 0x0034,
);

impl CipherSuiteId {
    pub fn parse(input: &mut bytes::Bytes) -> Result<Self> {
        use bytes::Buf;
        if input.remaining() < 2 {
            return Err(HandshakeError::UnexpectedMessage(
                "truncated cipher suite id".into(),
            ));
        }
        Ok(Self::from_u16(input.get_u16()))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_u16().to_be_bytes());
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KexKind {
    Rsa,
    DheRsa,
    EcdheRsa,
    EcdheEcdsa,
    Anonymous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkCipherKind {
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacKind {
    HmacSha1,
    HmacSha256,
    /// AEAD suites derive their integrity from the cipher itself; no
    /// separate MAC key or implicit IV beyond the cipher's own needs.
    Aead,
}

#[derive(Clone, Copy, Debug)]
pub struct CipherSuiteEntry {
    pub id: CipherSuiteId,
    pub kex: KexKind,
    pub bulk_cipher: BulkCipherKind,
    pub mac: MacKind,
    pub key_len: usize,
    pub iv_len: usize,
    pub mac_len: usize,
    /// True if this suite is only valid when version == TLS 1.2 (its PRF
    /// hash is SHA-256/SHA-384 rather than the legacy split MD5/SHA1 PRF).
    pub tls12_only: bool,
    pub anonymous: bool,
}

macro_rules! suite {
    ($id:ident, $kex:ident, $cipher:ident, $mac:ident, $key:expr, $iv:expr, $maclen:expr, $tls12_only:expr, $anon:expr) => {
        CipherSuiteEntry {
            id: CipherSuiteId::$id,
            kex: KexKind::$kex,
            bulk_cipher: BulkCipherKind::$cipher,
            mac: MacKind::$mac,
            key_len: $key,
            iv_len: $iv,
            mac_len: $maclen,
            tls12_only: $tls12_only,
            anonymous: $anon,
        }
    };
}

/// Suites this implementation can actually negotiate and derive key material
/// for. Other registry ids may still be advertised (only if `ForceSuites`)
/// but the handshake cannot complete with one; see `HandshakeError::NoMutualCipher`
/// and `UnimplementedCipher`.
pub fn implemented_suites() -> &'static [CipherSuiteEntry] {
    &[
        suite!(TLS_RSA_WITH_AES_128_CBC_SHA, Rsa, Aes128Cbc, HmacSha1, 16, 16, 20, false, false),
        suite!(TLS_RSA_WITH_AES_256_CBC_SHA, Rsa, Aes256Cbc, HmacSha1, 32, 16, 20, false, false),
        suite!(TLS_RSA_WITH_AES_128_CBC_SHA256, Rsa, Aes128Cbc, HmacSha256, 16, 16, 32, true, false),
        suite!(TLS_RSA_WITH_AES_128_GCM_SHA256, Rsa, Aes128Gcm, Aead, 16, 4, 0, true, false),
        suite!(TLS_RSA_WITH_AES_256_GCM_SHA384, Rsa, Aes256Gcm, Aead, 32, 4, 0, true, false),
        suite!(TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA, EcdheRsa, Aes128Cbc, HmacSha1, 16, 16, 20, false, false),
        suite!(TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA, EcdheRsa, Aes256Cbc, HmacSha1, 32, 16, 20, false, false),
        suite!(TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256, EcdheRsa, Aes128Cbc, HmacSha256, 16, 16, 32, true, false),
        suite!(TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256, EcdheRsa, Aes128Gcm, Aead, 16, 4, 0, true, false),
        suite!(TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384, EcdheRsa, Aes256Gcm, Aead, 32, 4, 0, true, false),
        suite!(TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA, EcdheEcdsa, Aes128Cbc, HmacSha1, 16, 16, 20, false, false),
        suite!(TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA, EcdheEcdsa, Aes256Cbc, HmacSha1, 32, 16, 20, false, false),
        suite!(TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256, EcdheEcdsa, Aes128Cbc, HmacSha256, 16, 16, 32, true, false),
        suite!(TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256, EcdheEcdsa, Aes128Gcm, Aead, 16, 4, 0, true, false),
        suite!(TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384, EcdheEcdsa, Aes256Gcm, Aead, 32, 4, 0, true, false),
    ]
}

pub fn lookup(id: CipherSuiteId) -> Option<&'static CipherSuiteEntry> {
    implemented_suites().iter().find(|e| e.id == id)
}

/// The key-exchange kind for every suite id this registry recognizes,
/// independent of whether this client actually *implements* key derivation
/// for it. The driver needs this to decide whether a ServerKeyExchange is
/// required or forbidden (spec §4.G) even for a suite it cannot complete,
/// e.g. DHE-RSA: recognized, logged, but not in `implemented_suites`.
pub fn kex_kind_of(id: CipherSuiteId) -> Option<KexKind> {
    use CipherSuiteId::*;
    match id {
        TLS_RSA_WITH_AES_128_CBC_SHA
        | TLS_RSA_WITH_AES_256_CBC_SHA
        | TLS_RSA_WITH_AES_128_CBC_SHA256
        | TLS_RSA_WITH_AES_128_GCM_SHA256
        | TLS_RSA_WITH_AES_256_GCM_SHA384 => Some(KexKind::Rsa),
        TLS_DHE_RSA_WITH_AES_128_CBC_SHA | TLS_DHE_RSA_WITH_AES_256_CBC_SHA => {
            Some(KexKind::DheRsa)
        }
        TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
        | TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
        | TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256
        | TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
        | TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => Some(KexKind::EcdheRsa),
        TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA
        | TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA
        | TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256
        | TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
        | TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => Some(KexKind::EcdheEcdsa),
        TLS_DH_anon_WITH_AES_128_CBC_SHA => Some(KexKind::Anonymous),
        Unknown(_) => None,
    }
}

/// Which hash the TLS 1.2 PRF and transcript hash use for a suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrfHash {
    Sha256,
    Sha384,
}

pub fn prf_hash_for(entry: &CipherSuiteEntry) -> PrfHash {
    match entry.bulk_cipher {
        BulkCipherKind::Aes256Gcm => PrfHash::Sha384,
        _ => PrfHash::Sha256,
    }
}

/// Negotiated key material for one direction (client-write or server-write),
/// handed to the record layer via `RecordTransport::prepare_{read,write}_cipher`.
#[derive(Clone)]
pub struct CipherSpec {
    pub suite: CipherSuiteId,
    pub mac_key: Vec<u8>,
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}
