// Key-exchange computation: ClientKeyExchange construction, pre-master-secret
// derivation, and ServerKeyExchange signature verification for the key
// exchange kinds this client actually implements (RSA key transport,
// ECDHE-RSA, ECDHE-ECDSA; see `cipher_suite::implemented_suites`).
//
// Grounded on the teacher's `client.rs::run_tls12` (the ECDHE secret
// generation / `shared_secret` / ClientKeyExchange send sequence) and
// `handshake_executor.rs::check_certificate_verify` (dispatch on signature
// algorithm, verify against the leaf's public key), reimplemented against
// `rsa`/`p256`/`p384` instead of the teacher's hand-rolled `elliptic.rs`
// and `rsa.rs` (neither of which was copied into this crate; out of scope
// per spec §1).

use bytes::Bytes;
use digest::Digest;
use md5::Md5;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384};

use crate::tls::cipher_suite::KexKind;
use crate::tls::error::{HandshakeError, Result};
use crate::tls::handshake::{DigitallySigned, HandshakeVersion, ServerEcdhParams};
use crate::tls::rng::SecureRandom;

/// The two curves this client offers/accepts for ECDHE (spec §6
/// `curvePreferences`: secp256r1 = 0x0017, secp384r1 = 0x0018).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EcdhGroup {
    Secp256r1,
    Secp384r1,
}

impl EcdhGroup {
    pub fn from_named_curve(id: u16) -> Option<Self> {
        match id {
            0x0017 => Some(EcdhGroup::Secp256r1),
            0x0018 => Some(EcdhGroup::Secp384r1),
            _ => None,
        }
    }
}

/// An ephemeral ECDHE keypair for one handshake. Holds the secret until the
/// shared secret is computed, then is dropped.
pub enum EphemeralSecret {
    Secp256r1(p256::ecdh::EphemeralSecret),
    Secp384r1(p384::ecdh::EphemeralSecret),
}

pub struct ClientEcdhKeypair {
    pub group: EcdhGroup,
    pub secret: EphemeralSecret,
    /// Uncompressed SEC1 point (`0x04 || X || Y`), what goes on the wire as
    /// the ClientKeyExchange body.
    pub public_point: Vec<u8>,
}

/// Generates a fresh ephemeral keypair on `group`, using `rand` as the
/// entropy source (spec §5: RNG must be usable behind a shared `&dyn`
/// reference).
pub fn generate_ecdhe_keypair(
    group: EcdhGroup,
    rand: &dyn SecureRandom,
) -> ClientEcdhKeypair {
    let mut seed = [0u8; 32];
    rand.fill(&mut seed);
    // Both p256/p384 EphemeralSecret::random take any RngCore; we adapt the
    // crate's own SecureRandom into one backed by a seeded stream so the
    // driver never has to depend on a specific RNG crate's traits directly.
    let mut rng = SeededRng::new(seed);

    match group {
        EcdhGroup::Secp256r1 => {
            let secret = p256::ecdh::EphemeralSecret::random(&mut rng);
            let public_point = secret.public_key().to_sec1_bytes().to_vec();
            ClientEcdhKeypair {
                group,
                secret: EphemeralSecret::Secp256r1(secret),
                public_point,
            }
        }
        EcdhGroup::Secp384r1 => {
            let secret = p384::ecdh::EphemeralSecret::random(&mut rng);
            let public_point = secret.public_key().to_sec1_bytes().to_vec();
            ClientEcdhKeypair {
                group,
                secret: EphemeralSecret::Secp384r1(secret),
                public_point,
            }
        }
    }
}

/// Completes the ECDH agreement against the server's point, returning the
/// pre-master secret: the raw x-coordinate of the shared point, per RFC 4492
/// §5.10 (no further KDF is applied -- the TLS PRF takes it from here).
pub fn ecdhe_shared_secret(keypair: &ClientEcdhKeypair, server_point: &[u8]) -> Result<Vec<u8>> {
    match (&keypair.secret, keypair.group) {
        (EphemeralSecret::Secp256r1(secret), EcdhGroup::Secp256r1) => {
            let peer = p256::PublicKey::from_sec1_bytes(server_point).map_err(|_| {
                HandshakeError::UnexpectedMessage("invalid P-256 server point".into())
            })?;
            Ok(secret.diffie_hellman(&peer).raw_secret_bytes().to_vec())
        }
        (EphemeralSecret::Secp384r1(secret), EcdhGroup::Secp384r1) => {
            let peer = p384::PublicKey::from_sec1_bytes(server_point).map_err(|_| {
                HandshakeError::UnexpectedMessage("invalid P-384 server point".into())
            })?;
            Ok(secret.diffie_hellman(&peer).raw_secret_bytes().to_vec())
        }
        _ => unreachable!("keypair group tag always matches its secret variant"),
    }
}

/// RSA key-transport pre-master secret (spec §4.C/§6): two bytes of
/// `ClientHello.legacy_version` followed by 46 random bytes, RSA-PKCS1v1.5
/// encrypted under the leaf certificate's public key.
pub fn rsa_encrypt_pre_master_secret(
    leaf_der: &[u8],
    client_version: u16,
    rand: &dyn SecureRandom,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let spki = leaf_public_key_der(leaf_der)?;
    let public_key = RsaPublicKey::from_pkcs1_der(&spki)
        .map_err(|e| HandshakeError::BadCertificate(format!("invalid RSA public key: {}", e)))?;

    let mut pre_master_secret = vec![0u8; 48];
    pre_master_secret[0..2].copy_from_slice(&client_version.to_be_bytes());
    rand.fill(&mut pre_master_secret[2..]);

    let mut seed = [0u8; 32];
    rand.fill(&mut seed);
    let mut rng = SeededRng::new(seed);

    let encrypted = public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &pre_master_secret)
        .map_err(|e| HandshakeError::Internal(format!("RSA pre-master-secret encryption failed: {}", e)))?;

    Ok((pre_master_secret, encrypted))
}

/// TLS `SignatureAndHashAlgorithm.hash` registry values this client can
/// evaluate (spec §4.A `supported-for-key-exchange` table).
fn hash_digest(hash_id: u8, message: &[u8]) -> Result<Vec<u8>> {
    match hash_id {
        2 => Ok(Sha1::digest(message).to_vec()),
        4 => Ok(Sha256::digest(message).to_vec()),
        5 => Ok(Sha384::digest(message).to_vec()),
        _ => Err(HandshakeError::UnexpectedMessage(format!(
            "unsupported signature hash algorithm {}",
            hash_id
        ))),
    }
}

/// Verifies a ServerKeyExchange's `DigitallySigned` over
/// `ClientHello.random || ServerHello.random || ServerECDHParams` (spec
/// §4.G). TLS 1.2 dispatches on `signed.signature_algorithm` (1 = rsa, 3 =
/// ecdsa); below TLS 1.2 the algorithm isn't on the wire at all (RFC 4346
/// §7.4.3 / RFC 4492 §5.4) and is implied by `kex` instead -- RSA signs an
/// MD5+SHA1 concatenated digest, ECDSA signs a plain SHA1 digest.
pub fn verify_server_key_exchange_signature(
    leaf_der: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    params: &ServerEcdhParams,
    signed: &DigitallySigned,
    version: HandshakeVersion,
    kex: KexKind,
) -> Result<()> {
    let mut message = Vec::with_capacity(64 + 4 + params.point.len());
    message.extend_from_slice(client_random);
    message.extend_from_slice(server_random);
    message.push(3); // ECCurveType::named_curve
    message.extend_from_slice(&params.named_curve.to_be_bytes());
    message.push(params.point.len() as u8);
    message.extend_from_slice(&params.point);

    let spki = leaf_public_key_der(leaf_der)?;

    if version < HandshakeVersion::TLS1_2 {
        return match kex {
            KexKind::EcdheRsa => {
                let digest = pre_tls12_rsa_digest(&message);
                verify_rsa_pkcs1v15_unprefixed(&spki, &digest, &signed.signature)
            }
            KexKind::EcdheEcdsa => {
                let digest = Sha1::digest(&message);
                verify_ecdsa(&spki, &digest, &signed.signature)
            }
            other => Err(HandshakeError::UnexpectedMessage(format!(
                "unsupported pre-TLS1.2 server key exchange kind {:?}",
                other
            ))),
        };
    }

    let digest = hash_digest(signed.hash, &message)?;
    match signed.signature_algorithm {
        1 => verify_rsa_pkcs1v15(&spki, signed.hash, &digest, &signed.signature),
        3 => verify_ecdsa(&spki, &digest, &signed.signature),
        other => Err(HandshakeError::UnexpectedMessage(format!(
            "unsupported server key exchange signature algorithm {}",
            other
        ))),
    }
}

/// TLS 1.0/1.1's RSA signature digest (RFC 4346 §4.7): MD5 digest followed
/// by SHA1 digest of the same message, signed as one PKCS#1v1.5 block with
/// no DigestInfo prefix.
fn pre_tls12_rsa_digest(message: &[u8]) -> Vec<u8> {
    let mut digest = Md5::digest(message).to_vec();
    digest.extend_from_slice(&Sha1::digest(message));
    digest
}

fn verify_rsa_pkcs1v15_unprefixed(spki: &[u8], digest: &[u8], signature: &[u8]) -> Result<()> {
    let public_key = RsaPublicKey::from_pkcs1_der(spki)
        .map_err(|e| HandshakeError::BadCertificate(format!("invalid RSA public key: {}", e)))?;
    public_key
        .verify(Pkcs1v15Sign::new_unprefixed(), digest, signature)
        .map_err(|_| HandshakeError::UnexpectedMessage("bad RSA ServerKeyExchange signature".into()))
}

fn verify_rsa_pkcs1v15(spki: &[u8], hash_id: u8, digest: &[u8], signature: &[u8]) -> Result<()> {
    let public_key = RsaPublicKey::from_pkcs1_der(spki)
        .map_err(|e| HandshakeError::BadCertificate(format!("invalid RSA public key: {}", e)))?;

    let scheme = match hash_id {
        2 => Pkcs1v15Sign::new::<Sha1>(),
        4 => Pkcs1v15Sign::new::<Sha256>(),
        5 => Pkcs1v15Sign::new::<Sha384>(),
        _ => {
            return Err(HandshakeError::UnexpectedMessage(
                "unsupported RSA signature hash".into(),
            ))
        }
    };

    public_key
        .verify(scheme, digest, signature)
        .map_err(|_| HandshakeError::UnexpectedMessage("bad RSA ServerKeyExchange signature".into()))
}

fn verify_ecdsa(spki: &[u8], digest: &[u8], signature: &[u8]) -> Result<()> {
    // The certificate's SPKI doesn't carry its curve tag this far down the
    // pipeline (that lived in the certificate's AlgorithmIdentifier
    // parameters, already consumed by the X.509 layer); try both curves this
    // client implements and accept whichever one both parses the point and
    // verifies the signature.
    if let Ok(vk) = p256::ecdsa::VerifyingKey::from_sec1_bytes(spki) {
        if let Ok(sig) = p256::ecdsa::Signature::from_der(signature) {
            if vk.verify_prehash(digest, &sig).is_ok() {
                return Ok(());
            }
        }
    }
    if let Ok(vk) = p384::ecdsa::VerifyingKey::from_sec1_bytes(spki) {
        if let Ok(sig) = p384::ecdsa::Signature::from_der(signature) {
            if vk.verify_prehash(digest, &sig).is_ok() {
                return Ok(());
            }
        }
    }
    Err(HandshakeError::UnexpectedMessage(
        "bad ECDSA ServerKeyExchange signature".into(),
    ))
}

/// Signs a client CertificateVerify over `digest` (the handshake transcript
/// hash already computed under `hash_id`'s algorithm), for the
/// client-authentication case: the server sent a CertificateRequest and the
/// caller configured a local certificate (spec §4.G). Tries the key as a
/// PKCS#1 RSA private key first, then as a SEC1 EC private key on each curve
/// this client implements.
pub fn sign_certificate_verify(
    private_key_der: &[u8],
    hash_id: u8,
    digest: &[u8],
    rand: &dyn SecureRandom,
) -> Result<DigitallySigned> {
    if let Ok(private_key) = RsaPrivateKey::from_pkcs1_der(private_key_der) {
        let mut seed = [0u8; 32];
        rand.fill(&mut seed);
        let mut rng = SeededRng::new(seed);
        let scheme = match hash_id {
            2 => Pkcs1v15Sign::new::<Sha1>(),
            4 => Pkcs1v15Sign::new::<Sha256>(),
            5 => Pkcs1v15Sign::new::<Sha384>(),
            _ => {
                return Err(HandshakeError::Internal(
                    "unsupported CertificateVerify hash algorithm".into(),
                ))
            }
        };
        let signature = private_key
            .sign_with_rng(&mut rng, scheme, digest)
            .map_err(|e| {
                HandshakeError::Internal(format!("RSA CertificateVerify signing failed: {}", e))
            })?;
        return Ok(DigitallySigned {
            hash: hash_id,
            signature_algorithm: 1,
            signature: Bytes::from(signature),
        });
    }

    if let Ok(signing_key) = p256::ecdsa::SigningKey::from_sec1_der(private_key_der) {
        let sig: p256::ecdsa::Signature = signing_key
            .sign_prehash(digest)
            .map_err(|e| HandshakeError::Internal(format!("ECDSA signing failed: {}", e)))?;
        return Ok(DigitallySigned {
            hash: hash_id,
            signature_algorithm: 3,
            signature: Bytes::from(sig.to_der().as_bytes().to_vec()),
        });
    }
    if let Ok(signing_key) = p384::ecdsa::SigningKey::from_sec1_der(private_key_der) {
        let sig: p384::ecdsa::Signature = signing_key
            .sign_prehash(digest)
            .map_err(|e| HandshakeError::Internal(format!("ECDSA signing failed: {}", e)))?;
        return Ok(DigitallySigned {
            hash: hash_id,
            signature_algorithm: 3,
            signature: Bytes::from(sig.to_der().as_bytes().to_vec()),
        });
    }

    Err(HandshakeError::Config(
        "client certificate's private key is neither a PKCS#1 RSA key nor a SEC1 EC key".into(),
    ))
}

/// Extracts the raw `subjectPublicKey` bit-string bytes from a leaf
/// certificate's DER: for RSA this is a PKCS#1 `RSAPublicKey` DER blob; for
/// EC keys it's the SEC1 point. `x509-parser` exposes both through the same
/// field.
fn leaf_public_key_der(leaf_der: &[u8]) -> Result<Vec<u8>> {
    let (_, cert) = x509_parser::parse_x509_certificate(leaf_der)
        .map_err(|e| HandshakeError::BadCertificate(format!("failed to parse certificate: {}", e)))?;
    Ok(cert.public_key().subject_public_key.data.to_vec())
}

/// Adapts this crate's `SecureRandom` boundary (spec §6 `rand()`) into the
/// `rand_core`/`rand` `RngCore` the key-exchange crates expect, without
/// leaking a second RNG trait across the module boundary. Seeded once from
/// the real entropy source and then stretched with a counter-mode stream;
/// adequate because the only consumers are one-shot ephemeral key and
/// pre-master-secret generation, never long-running key streams.
struct SeededRng {
    state: [u8; 32],
    counter: u64,
}

impl SeededRng {
    fn new(seed: [u8; 32]) -> Self {
        SeededRng {
            state: seed,
            counter: 0,
        }
    }

    fn next_block(&mut self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.state);
        hasher.update(&self.counter.to_be_bytes());
        self.counter += 1;
        hasher.finalize().into()
    }
}

impl rand_core::RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        let block = self.next_block();
        u32::from_le_bytes([block[0], block[1], block[2], block[3]])
    }

    fn next_u64(&mut self) -> u64 {
        let block = self.next_block();
        u64::from_le_bytes(block[0..8].try_into().unwrap())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut filled = 0;
        while filled < dest.len() {
            let block = self.next_block();
            let n = std::cmp::min(block.len(), dest.len() - filled);
            dest[filled..filled + n].copy_from_slice(&block[..n]);
            filled += n;
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl rand_core::CryptoRng for SeededRng {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::rng::OsRandom;

    #[test]
    fn ecdhe_round_trip_shared_secret_matches() {
        let rand = OsRandom::default();
        let client = generate_ecdhe_keypair(EcdhGroup::Secp256r1, &rand);
        let server = generate_ecdhe_keypair(EcdhGroup::Secp256r1, &rand);

        let client_secret = ecdhe_shared_secret(&client, &server.public_point).unwrap();
        let server_secret = ecdhe_shared_secret(&server, &client.public_point).unwrap();
        assert_eq!(client_secret, server_secret);
    }

    #[test]
    fn named_curve_lookup() {
        assert_eq!(EcdhGroup::from_named_curve(0x0017), Some(EcdhGroup::Secp256r1));
        assert_eq!(EcdhGroup::from_named_curve(0x0018), Some(EcdhGroup::Secp384r1));
        assert_eq!(EcdhGroup::from_named_curve(0x0019), None);
    }
}
