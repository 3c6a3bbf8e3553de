// Key schedule (component C): PRF, master-secret (standard and extended
// variants), key-block expansion, Finished verify-data.
//
// Grounded on the teacher's `tls/key_schedule_tls12.rs` (`p_hash`,
// `hmac_hash`, `master_secret`, `key_block`, `verify_data_*`) for the TLS 1.2
// single-hash PRF, which is kept almost verbatim. Extended with the TLS
// 1.0/1.1 joint MD5+SHA1 PRF, the extended-master-secret variant, and
// extended-random concatenation (spec §4.C) -- none of which the teacher
// implements, since it only targets TLS 1.2/1.3.

use digest::{BlockSizeUser, Digest};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha384};

use crate::tls::cipher_suite::PrfHash;
use crate::tls::handshake::{HandshakeVersion, TLS_1_2_VERSION};

pub const VERIFY_DATA_LENGTH: usize = 12;

/// Either the plain 32-byte client/server random, or that random with an
/// ExtendedRandom extension's bytes appended (spec §4.C). Extended random and
/// extended master secret are mutually exclusive in configuration, but the
/// PRF seed construction for the *plain* master secret still needs to know
/// whether extended random was negotiated.
pub fn random_seed(random: &[u8; 32], extended_random: Option<&[u8]>) -> Vec<u8> {
    let mut v = random.to_vec();
    if let Some(extra) = extended_random {
        v.extend_from_slice(extra);
    }
    v
}

/// PRF(secret, label, seed) = P_<hash>(secret, label || seed), dispatching to
/// either the TLS 1.2 single-hash construction or the TLS 1.0/1.1 split
/// MD5/SHA1 construction depending on the negotiated version.
pub fn prf(
    version: HandshakeVersion,
    prf_hash: PrfHash,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    output_size: usize,
) -> Vec<u8> {
    let mut data = label.to_vec();
    data.extend_from_slice(seed);

    if version.0 >= TLS_1_2_VERSION {
        match prf_hash {
            PrfHash::Sha256 => p_hash::<Sha256>(secret, &data, output_size),
            PrfHash::Sha384 => p_hash::<Sha384>(secret, &data, output_size),
        }
    } else {
        prf_tls10(secret, &data, output_size)
    }
}

/// RFC 5246 §5: P_hash(secret, seed) = HMAC_hash(secret, A(1)||seed) ||
/// HMAC_hash(secret, A(2)||seed) || ..., A(0)=seed, A(i)=HMAC_hash(secret, A(i-1)).
fn p_hash<H>(secret: &[u8], seed: &[u8], output_size: usize) -> Vec<u8>
where
    H: Digest + BlockSizeUser,
    Hmac<H>: Mac,
{
    let mut a = seed.to_vec();
    let mut out = Vec::new();
    while out.len() < output_size {
        a = hmac_hash::<H>(secret, &a);
        let mut data = a.clone();
        data.extend_from_slice(seed);
        out.extend_from_slice(&hmac_hash::<H>(secret, &data));
    }
    out.truncate(output_size);
    out
}

fn hmac_hash<H>(secret: &[u8], data: &[u8]) -> Vec<u8>
where
    H: Digest + BlockSizeUser,
    Hmac<H>: Mac,
{
    let mut mac = <Hmac<H> as Mac>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// RFC 2246/4346 §5: the legacy PRF splits the secret into two halves (the
/// second one byte longer if the length is odd), runs P_MD5 over one half and
/// P_SHA-1 over the other, and XORs the two outputs together.
fn prf_tls10(secret: &[u8], data: &[u8], output_size: usize) -> Vec<u8> {
    let split = (secret.len() + 1) / 2;
    let s1 = &secret[..split];
    let s2 = &secret[secret.len() - split..];

    let md5_out = p_hash::<md5::Md5>(s1, data, output_size);
    let sha1_out = p_hash::<Sha1>(s2, data, output_size);

    md5_out
        .iter()
        .zip(sha1_out.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// master_secret = PRF(pre_master_secret, "master secret",
///     ClientRandom || ServerRandom)[0..47]
pub fn master_secret(
    version: HandshakeVersion,
    prf_hash: PrfHash,
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Vec<u8> {
    let mut seed = client_random.to_vec();
    seed.extend_from_slice(server_random);
    prf(
        version,
        prf_hash,
        pre_master_secret,
        b"master secret",
        &seed,
        48,
    )
}

/// extended master_secret = PRF(pre_master_secret, "extended master secret",
///     session_hash)[0..47], used iff both peers negotiated the extension and
/// version >= TLS 1.0 (spec §4.C / Invariant 3).
pub fn extended_master_secret(
    version: HandshakeVersion,
    prf_hash: PrfHash,
    pre_master_secret: &[u8],
    session_hash: &[u8],
) -> Vec<u8> {
    prf(
        version,
        prf_hash,
        pre_master_secret,
        b"extended master secret",
        session_hash,
        48,
    )
}

pub struct KeyBlock {
    pub client_write_mac_key: Vec<u8>,
    pub server_write_mac_key: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

/// key_block = PRF(master_secret, "key expansion", ServerRandom ||
///     ClientRandom), cut into client/server MAC, client/server key,
/// client/server IV, in that order (spec §4.C).
pub fn key_block(
    version: HandshakeVersion,
    prf_hash: PrfHash,
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    mac_key_length: usize,
    enc_key_length: usize,
    fixed_iv_length: usize,
) -> KeyBlock {
    let block_size = 2 * (mac_key_length + enc_key_length + fixed_iv_length);

    let mut seed = server_random.to_vec();
    seed.extend_from_slice(client_random);

    let block = prf(
        version,
        prf_hash,
        master_secret,
        b"key expansion",
        &seed,
        block_size,
    );
    let mut block: Vec<u8> = block;

    let client_write_mac_key = block.drain(..mac_key_length).collect();
    let server_write_mac_key = block.drain(..mac_key_length).collect();
    let client_write_key = block.drain(..enc_key_length).collect();
    let server_write_key = block.drain(..enc_key_length).collect();
    let client_write_iv = block.drain(..fixed_iv_length).collect();
    let server_write_iv = block.drain(..fixed_iv_length).collect();

    assert!(block.is_empty());

    KeyBlock {
        client_write_mac_key,
        server_write_mac_key,
        client_write_key,
        server_write_key,
        client_write_iv,
        server_write_iv,
    }
}

/// Finished verify-data = PRF(master_secret, "client finished"|"server
/// finished", transcript_hash)[0..VERIFY_DATA_LENGTH] (spec §4.C/Invariant 4).
/// `transcript_hash` must be the snapshot taken immediately before this
/// Finished message was produced/consumed.
pub fn verify_data(
    version: HandshakeVersion,
    prf_hash: PrfHash,
    master_secret: &[u8],
    label: &[u8],
    transcript_hash: &[u8],
) -> Vec<u8> {
    prf(
        version,
        prf_hash,
        master_secret,
        label,
        transcript_hash,
        VERIFY_DATA_LENGTH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_block_consumes_entire_block() {
        let kb = key_block(
            HandshakeVersion::TLS1_2,
            PrfHash::Sha256,
            &[0u8; 48],
            &[1u8; 32],
            &[2u8; 32],
            20,
            16,
            0,
        );
        assert_eq!(kb.client_write_mac_key.len(), 20);
        assert_eq!(kb.client_write_key.len(), 16);
        assert_eq!(kb.client_write_iv.len(), 0);
    }

    #[test]
    fn master_secret_is_48_bytes() {
        let m = master_secret(
            HandshakeVersion::TLS1_2,
            PrfHash::Sha256,
            &[9u8; 46],
            &[1u8; 32],
            &[2u8; 32],
        );
        assert_eq!(m.len(), 48);
    }

    #[test]
    fn extended_and_plain_master_secrets_differ() {
        let plain = master_secret(
            HandshakeVersion::TLS1_2,
            PrfHash::Sha256,
            &[9u8; 46],
            &[1u8; 32],
            &[2u8; 32],
        );
        let extended = extended_master_secret(
            HandshakeVersion::TLS1_2,
            PrfHash::Sha256,
            &[9u8; 46],
            &[3u8; 32],
        );
        assert_ne!(plain, extended);
    }

    #[test]
    fn tls10_prf_differs_from_tls12_prf() {
        let a = prf(
            HandshakeVersion::TLS1_0,
            PrfHash::Sha256,
            b"secret",
            b"label",
            b"seed",
            16,
        );
        let b = prf(
            HandshakeVersion::TLS1_2,
            PrfHash::Sha256,
            b"secret",
            b"label",
            b"seed",
            16,
        );
        assert_ne!(a, b);
    }
}
