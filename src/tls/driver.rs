// Handshake driver (component G): the state machine that drives one TLS
// 1.0/1.1/1.2 client handshake to completion over a caller-supplied
// `RecordTransport`.
//
// Grounded on the teacher's `tls/client.rs` (`wait_server_hello`, `run_tls12`
// for the Certificate/ServerKeyExchange/ClientKeyExchange/ChangeCipherSpec/
// Finished flow) and `handshake_executor.rs` (the send/receive-handshake-
// message pattern, generalized here into `write_handshake_msg`/
// `read_handshake_msg`). Generalized from the teacher's TLS-1.2-ECDHE-only,
// fail-fast design to the full spec: TLS 1.0/1.1/1.2, sticky cipher
// selection errors that still let certificate logging complete, session
// resumption, NPN, and optional client authentication.

use bytes::Bytes;
use subtle::ConstantTimeEq;

use crate::tls::certificate::{CertificateValidator, ValidateOptions, X509ParserValidator};
use crate::tls::cipher_suite::{self, CipherSpec, CipherSuiteId, KexKind};
use crate::tls::client_hello::{build_fingerprint, build_semantic};
use crate::tls::config::ClientConfig;
use crate::tls::error::{HandshakeError, Result};
use crate::tls::extensions::{
    find_alpn, find_extended_random, find_next_protocols, has_extended_master_secret,
};
use crate::tls::handshake::{
    frame_handshake_message, Certificate, CertificateRequest, CertificateStatus, DigitallySigned,
    Finished, HandshakeMessageType, HandshakeVersion, KeyExchangeMessage, NewSessionTicket,
    NextProtocol, ServerHello,
};
use crate::tls::key_exchange::{
    ecdhe_shared_secret, generate_ecdhe_keypair, rsa_encrypt_pre_master_secret,
    sign_certificate_verify, verify_server_key_exchange_signature, EcdhGroup,
};
use crate::tls::key_schedule;
use crate::tls::log::{HandshakeLog, HandshakeOutcome};
use crate::tls::session_cache::{session_key, ClientSessionState};
use crate::tls::transcript::Transcript;
use crate::tls::transport::{ContentType, RawHandshakeMessage, RecordTransport};

fn transport_err(e: std::io::Error) -> HandshakeError {
    HandshakeError::Transport(e.to_string())
}

fn expect_type(msg: &RawHandshakeMessage, expected: HandshakeMessageType) -> Result<()> {
    if msg.message_type != expected.to_u8() {
        return Err(HandshakeError::UnexpectedMessage(format!(
            "expected {:?}, got handshake message type {}",
            expected, msg.message_type
        )));
    }
    Ok(())
}

fn read_handshake_msg<T: RecordTransport + ?Sized>(
    transport: &mut T,
    transcript: &mut Transcript,
) -> Result<RawHandshakeMessage> {
    let msg = transport.read_handshake().map_err(transport_err)?;
    let framed = frame_handshake_message(HandshakeMessageType::from_u8(msg.message_type), &msg.body);
    transcript.push(Bytes::from(framed));
    Ok(msg)
}

fn write_handshake_msg<T: RecordTransport + ?Sized>(
    transport: &mut T,
    transcript: &mut Transcript,
    msg_type: HandshakeMessageType,
    body: &[u8],
) -> Result<()> {
    let framed = frame_handshake_message(msg_type, body);
    transport
        .write_record(ContentType::Handshake, &framed)
        .map_err(transport_err)?;
    transcript.push(Bytes::from(framed));
    Ok(())
}

/// Runs one client handshake to completion (or failure) against `transport`,
/// using `config`. `peer_addr` is used only to key the session cache when
/// `config.server_name` is empty (spec §4.E). Always returns a log of
/// whatever was observed, even on failure (spec §7).
pub fn handshake<T: RecordTransport + ?Sized>(
    transport: &mut T,
    config: &ClientConfig,
    peer_addr: &str,
) -> HandshakeOutcome {
    let mut log = HandshakeLog::new();
    let result = run(transport, config, peer_addr, &mut log);
    if let Err(ref e) = result {
        if let Some(description) = e.alert() {
            use crate::tls::alert::AlertLevel;
            let _ = transport.send_alert(AlertLevel::fatal.to_u8(), description);
        }
    }
    HandshakeOutcome { log, result }
}

fn run<T: RecordTransport + ?Sized>(
    transport: &mut T,
    config: &ClientConfig,
    peer_addr: &str,
    log: &mut HandshakeLog,
) -> Result<()> {
    let mut transcript = Transcript::new();
    let cache_key = session_key(&config.server_name, peer_addr);

    let cached_session = if config.session_tickets_disabled {
        None
    } else {
        config
            .client_session_cache
            .as_ref()
            .and_then(|cache| cache.get(&cache_key))
    };

    let built = match &config.client_fingerprint {
        Some(fingerprint) => {
            log::debug!("START: building ClientHello from fingerprint blueprint");
            build_fingerprint(config, fingerprint)?
        }
        None => {
            log::debug!(
                "START: building semantic ClientHello (cached session: {})",
                cached_session.is_some()
            );
            build_semantic(config, cached_session.as_ref())?
        }
    };
    let offered_session_id = built.semantic.legacy_session_id.clone();
    let client_random = built.semantic.random;
    let client_legacy_version = built.semantic.legacy_version;
    let client_extended_random = built.client_extended_random.clone();
    log.client_hello = Some(built.semantic);
    transport
        .write_record(ContentType::Handshake, &built.wire_bytes)
        .map_err(transport_err)?;
    transcript.push(Bytes::from(built.wire_bytes));
    log::trace!("-> WAIT_SH: ClientHello sent ({} bytes)", built.wire_bytes.len());

    // ServerHello
    let msg = read_handshake_msg(transport, &mut transcript)?;
    expect_type(&msg, HandshakeMessageType::server_hello)?;
    let mut body = msg.body.clone();
    let server_hello = ServerHello::parse(&mut body)?;

    let version = HandshakeVersion(server_hello.version);
    log::debug!(
        "WAIT_SH: ServerHello version=0x{:04x} cipher_suite=0x{:04x}",
        server_hello.version, server_hello.cipher_suite
    );
    log.version = Some(server_hello.version);
    log.cipher_suite = Some(server_hello.cipher_suite);
    if version < config.min_version || version > config.max_version {
        log::warn!(
            "version 0x{:04x} outside configured range [0x{:04x}, 0x{:04x}]",
            version.0, config.min_version.0, config.max_version.0
        );
        log.server_hello = Some(server_hello);
        return Err(HandshakeError::ProtocolVersion);
    }

    let suite_id = CipherSuiteId::from_u16(server_hello.cipher_suite);
    // A suite the client never advertised is `NoMutualCipher`; one it
    // advertised but has no key-exchange code for (e.g. DHE-RSA, anonymous
    // DH) is `UnimplementedCipher`. Either is recorded as a sticky error: the
    // driver keeps reading as far as it safely can -- far enough to log the
    // certificate chain -- and only gives up just before key derivation
    // would otherwise start (spec §7 "sticky cipher error").
    let sticky_error = if !config.cipher_suites.contains(&suite_id) {
        Some(StickyCipherError::NoMutual)
    } else if cipher_suite::lookup(suite_id).is_none() {
        Some(StickyCipherError::Unimplemented)
    } else {
        None
    };
    let entry = cipher_suite::lookup(suite_id);
    let prf_hash = entry.map(cipher_suite::prf_hash_for);
    if let Some(prf_hash) = prf_hash {
        transcript.select(version, prf_hash);
    }

    let server_random = server_hello.random;
    let selected_alpn = find_alpn(&server_hello.extensions)
        .and_then(|protos| protos.first().cloned());
    let npn_server_protocols = find_next_protocols(&server_hello.extensions).map(|p| p.to_vec());
    let server_offered_ems = has_extended_master_secret(&server_hello.extensions);
    let use_extended_master_secret = config.extended_master_secret && server_offered_ems;
    // Extended random and extended master secret are mutually exclusive
    // (spec §4.C): only consulted for the plain master-secret seed, and only
    // when extended master secret didn't win negotiation.
    let server_extended_random = find_extended_random(&server_hello.extensions).cloned();
    let use_extended_random =
        !use_extended_master_secret && client_extended_random.is_some() && server_extended_random.is_some();

    let session_echoed = cached_session.is_some()
        && !offered_session_id.is_empty()
        && server_hello.session_id == offered_session_id;

    log.server_hello = Some(server_hello);
    if let Some(protocol) = selected_alpn.clone() {
        log.selected_alpn_protocol = Some(protocol);
    }

    if let Some(sticky) = sticky_error {
        log::warn!(
            "sticky cipher error on suite 0x{:04x}: {:?}",
            suite_id.to_u16(),
            sticky
        );
        if session_echoed {
            // A resumed handshake has no certificate flight to log, so there
            // is nothing left to gain by reading further (spec §7: resume
            // path fails immediately).
            return Err(sticky.into_handshake_error());
        }
        return run_full(
            transport,
            config,
            &mut transcript,
            log,
            version,
            prf_hash,
            entry,
            Some(sticky),
            suite_id,
            &client_random,
            server_random,
            client_legacy_version,
            npn_server_protocols.clone(),
            &cache_key,
            use_extended_master_secret,
            use_extended_random.then(|| client_extended_random.clone().unwrap()),
            use_extended_random.then(|| server_extended_random.clone().unwrap()),
        );
    }
    let entry = entry.ok_or_else(|| {
        HandshakeError::Internal("cipher suite entry missing with no sticky cipher error".into())
    })?;
    let prf_hash = prf_hash.ok_or_else(|| {
        HandshakeError::Internal("PRF hash missing with no sticky cipher error".into())
    })?;

    if session_echoed {
        log::debug!("-> WAIT_CCS_R: server echoed session id, resuming");
        let session = cached_session.unwrap();
        if session.cipher_suite_id != suite_id {
            return Err(HandshakeError::UnexpectedMessage(
                "server resumed a session under a different cipher suite".into(),
            ));
        }
        run_resumed(
            transport,
            config,
            &mut transcript,
            log,
            version,
            prf_hash,
            entry.mac_len,
            entry.key_len,
            entry.iv_len,
            &client_random,
            &server_random,
            &session.master_secret,
            suite_id,
        )?;
        log.did_resume = true;
        log::info!("DONE: resumed handshake completed");
        return Ok(());
    }

    log::debug!("-> WAIT_CERT: full handshake, no resumption");
    run_full(
        transport,
        config,
        &mut transcript,
        log,
        version,
        Some(prf_hash),
        Some(entry),
        None,
        suite_id,
        &client_random,
        server_random,
        client_legacy_version,
        npn_server_protocols,
        &cache_key,
        use_extended_master_secret,
        use_extended_random.then(|| client_extended_random.clone().unwrap()),
        use_extended_random.then(|| server_extended_random.clone().unwrap()),
    )
}

/// spec §4.H "mutualProtocol": the first server-listed protocol that also
/// appears in the client's list; if none match, the first client protocol is
/// returned with the fallback flag set. `client_protocols` must be non-empty.
fn mutual_protocol(server_protocols: &[Bytes], client_protocols: &[Bytes]) -> (Bytes, bool) {
    for server_proto in server_protocols {
        if client_protocols.contains(server_proto) {
            return (server_proto.clone(), false);
        }
    }
    (client_protocols[0].clone(), true)
}

/// A cipher-suite-selection failure that still lets the driver log as much of
/// the handshake as it safely can before giving up (spec §7). Kept separate
/// from `HandshakeError` (rather than cloning one) since the two cases this
/// can hold are simple unit variants.
#[derive(Clone, Copy, Debug)]
enum StickyCipherError {
    NoMutual,
    Unimplemented,
}

impl StickyCipherError {
    fn into_handshake_error(self) -> HandshakeError {
        match self {
            StickyCipherError::NoMutual => HandshakeError::NoMutualCipher,
            StickyCipherError::Unimplemented => HandshakeError::UnimplementedCipher,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_resumed<T: RecordTransport + ?Sized>(
    transport: &mut T,
    _config: &ClientConfig,
    transcript: &mut Transcript,
    log: &mut HandshakeLog,
    version: HandshakeVersion,
    prf_hash: cipher_suite::PrfHash,
    mac_key_length: usize,
    enc_key_length: usize,
    fixed_iv_length: usize,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    master_secret: &[u8],
    suite_id: CipherSuiteId,
) -> Result<()> {
    let key_block = key_schedule::key_block(
        version,
        prf_hash,
        master_secret,
        client_random,
        server_random,
        mac_key_length,
        enc_key_length,
        fixed_iv_length,
    );
    let read_spec = CipherSpec {
        suite: suite_id,
        mac_key: key_block.server_write_mac_key,
        key: key_block.server_write_key,
        iv: key_block.server_write_iv,
    };
    let write_spec = CipherSpec {
        suite: suite_id,
        mac_key: key_block.client_write_mac_key,
        key: key_block.client_write_key,
        iv: key_block.client_write_iv,
    };

    // Abbreviated handshake: server speaks first (RFC 5246 §7.3). The
    // server's ChangeCipherSpec is a distinct record type, not a handshake
    // message; `read_handshake` absorbs it transparently while waiting for
    // Finished (see `transport::RecordTransport::read_handshake`), so the
    // read cipher only needs to be armed before that read, not synchronized
    // to the exact wire position of the CCS record.
    transport.prepare_read_cipher(read_spec);

    let server_verify_data_expected =
        key_schedule::verify_data(version, prf_hash, master_secret, b"server finished", &transcript.hash());
    let msg = read_handshake_msg(transport, transcript)?;
    expect_type(&msg, HandshakeMessageType::finished)?;
    let mut body = msg.body.clone();
    let server_finished = Finished::parse(&mut body)?;
    if !bool::from(
        server_finished
            .verify_data
            .ct_eq(&server_verify_data_expected),
    ) {
        log::warn!("-> ABORTED: server's Finished message was incorrect (resumed handshake)");
        return Err(HandshakeError::FinishedMismatch);
    }
    log.server_finished = Some(server_finished.verify_data.clone());

    transport
        .write_record(ContentType::ChangeCipherSpec, &[1])
        .map_err(transport_err)?;
    transport.prepare_write_cipher(write_spec);

    let client_verify_data =
        key_schedule::verify_data(version, prf_hash, master_secret, b"client finished", &transcript.hash());
    write_handshake_msg(
        transport,
        transcript,
        HandshakeMessageType::finished,
        &Finished {
            verify_data: Bytes::from(client_verify_data.clone()),
        }
        .serialize_body(),
    )?;
    log.client_finished = Some(Bytes::from(client_verify_data));

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_full<T: RecordTransport + ?Sized>(
    transport: &mut T,
    config: &ClientConfig,
    transcript: &mut Transcript,
    log: &mut HandshakeLog,
    version: HandshakeVersion,
    prf_hash: Option<cipher_suite::PrfHash>,
    entry: Option<&cipher_suite::CipherSuiteEntry>,
    sticky_error: Option<StickyCipherError>,
    suite_id: CipherSuiteId,
    client_random: &[u8; 32],
    server_random: [u8; 32],
    client_legacy_version: u16,
    npn_server_protocols: Option<Vec<Bytes>>,
    cache_key: &str,
    use_extended_master_secret: bool,
    client_extended_random: Option<Bytes>,
    server_extended_random: Option<Bytes>,
) -> Result<()> {
    // `kex_kind_of` is the full recognized-suite registry, not just `entry`
    // (the *implemented* subset): a suite like DHE-RSA is recognized but not
    // implemented, and the protocol-level message shape can still be
    // validated and logged for it even though key derivation cannot proceed
    // (spec §7 sticky cipher error).
    let suite_kex = cipher_suite::kex_kind_of(suite_id);

    // WAIT_CERT, skipped entirely for anonymous-DH suites: a real anonymous
    // server sends ServerKeyExchange directly after ServerHello, with no
    // Certificate message at all (spec §4.G).
    let mut leaf_der = Bytes::new();
    let mut msg = read_handshake_msg(transport, transcript)?;
    if suite_kex != Some(KexKind::Anonymous) {
        expect_type(&msg, HandshakeMessageType::certificate)?;
        let mut body = msg.body.clone();
        let certificate = Certificate::parse(&mut body)?;
        if certificate.certificate_list.is_empty() {
            return Err(HandshakeError::BadCertificate(
                "server sent an empty certificate chain".into(),
            ));
        }
        leaf_der = certificate.certificate_list[0].clone();

        let validator = X509ParserValidator;
        let validate_opts = ValidateOptions {
            roots: &config.root_cas,
            intermediates: &certificate.certificate_list[1..],
            dns_name: &config.server_name,
            time: (config.time)(),
            insecure_skip_verify: config.insecure_skip_verify,
            client_dsa_enabled: config.client_dsa_enabled,
        };
        let outcome = validator.validate(&certificate.certificate_list, &validate_opts)?;
        log.server_certificates = Some(certificate);
        let chain_valid = outcome.chain_valid;
        let validation_error = outcome.validation_error.clone();
        log.server_certificate_validation = Some(outcome);

        // The chain is logged above regardless of validity (spec §4.F
        // "record but don't fail"); only now, after the log is populated, do
        // we decide whether an invalid chain actually aborts the handshake.
        if !chain_valid && !config.insecure_skip_verify {
            return Err(HandshakeError::BadCertificate(
                validation_error.unwrap_or_default(),
            ));
        }

        msg = read_handshake_msg(transport, transcript)?;

        // Optional CertificateStatus (OCSP stapling).
        if msg.message_type == HandshakeMessageType::certificate_status.to_u8() {
            let status = CertificateStatus::parse(&mut msg.body.clone())?;
            log.server_certificate_status = Some(status.ocsp_response);
            msg = read_handshake_msg(transport, transcript)?;
        }
    }

    // WAIT_SKX: required for every kex kind except plain RSA key transport,
    // forbidden for RSA. When the suite id is entirely unrecognized this
    // check is skipped, since there is no basis at all for predicting whether
    // a ServerKeyExchange should appear.
    let mut ecdh_params = None;
    if msg.message_type == HandshakeMessageType::server_key_exchange.to_u8() {
        if suite_kex == Some(KexKind::Rsa) {
            return Err(HandshakeError::UnexpectedMessage(
                "unexpected ServerKeyExchange for RSA key exchange".into(),
            ));
        }
        log.server_key_exchange = Some(msg.body.clone());
        if let Some(e) = entry {
            let kex_msg = KeyExchangeMessage {
                data: msg.body.clone(),
            };
            let (params, signature_bytes) = kex_msg.as_server_ecdh_params()?;
            let signed = DigitallySigned::parse(&mut signature_bytes.clone(), version)?;
            verify_server_key_exchange_signature(
                &leaf_der,
                client_random,
                &server_random,
                &params,
                &signed,
                version,
                e.kex,
            )?;
            ecdh_params = Some(params);
        }
        msg = read_handshake_msg(transport, transcript)?;
    } else if suite_kex.is_some_and(|k| k != KexKind::Rsa) {
        return Err(HandshakeError::UnexpectedMessage(
            "expected ServerKeyExchange for this cipher suite".into(),
        ));
    }

    // Optional CertificateRequest.
    let mut client_cert_requested = false;
    if msg.message_type == HandshakeMessageType::certificate_request.to_u8() {
        let creq = CertificateRequest::parse(&mut msg.body.clone())?;
        log.certificate_request = Some(creq);
        client_cert_requested = true;
        msg = read_handshake_msg(transport, transcript)?;
    }

    expect_type(&msg, HandshakeMessageType::server_hello_done)?;

    // The certificate chain (and, where present, ServerKeyExchange) has now
    // been logged; a sticky cipher error that survived this far aborts here,
    // just before any key-derivation-adjacent work begins (spec §7).
    if let Some(sticky) = sticky_error {
        log::warn!("-> ABORTED: {:?} before key derivation, certificate chain already logged", sticky);
        return Err(sticky.into_handshake_error());
    }
    let entry = entry.ok_or_else(|| {
        HandshakeError::Internal("cipher suite entry missing with no sticky cipher error".into())
    })?;
    let prf_hash = prf_hash.ok_or_else(|| {
        HandshakeError::Internal("PRF hash missing with no sticky cipher error".into())
    })?;

    // Client's response flight.
    if client_cert_requested {
        let chain = config
            .certificates
            .first()
            .map(|c| c.certificate_chain.clone())
            .unwrap_or_default();
        let client_cert = Certificate {
            certificate_list: chain,
        };
        write_handshake_msg(
            transport,
            transcript,
            HandshakeMessageType::certificate,
            &client_cert.serialize_body(),
        )?;
        log.client_certificate = Some(client_cert);
    }

    let pre_master_secret = match entry.kex {
        KexKind::Rsa => {
            let (pre_master_secret, encrypted) = rsa_encrypt_pre_master_secret(
                &leaf_der,
                client_legacy_version,
                &*config.rand,
            )?;
            let mut cke_body = Vec::new();
            crate::tls::parsing::serialize_varlen_vector(
                0,
                crate::tls::parsing::U16_LIMIT,
                &mut cke_body,
                |out| out.extend_from_slice(&encrypted),
            );
            write_handshake_msg(
                transport,
                transcript,
                HandshakeMessageType::client_key_exchange,
                &cke_body,
            )?;
            log.client_key_exchange = Some(Bytes::from(cke_body));
            pre_master_secret
        }
        KexKind::EcdheRsa | KexKind::EcdheEcdsa => {
            let params = ecdh_params.ok_or_else(|| {
                HandshakeError::Internal("ECDHE key exchange selected with no server params".into())
            })?;
            let group = EcdhGroup::from_named_curve(params.named_curve).ok_or_else(|| {
                HandshakeError::UnexpectedMessage(format!(
                    "unsupported named curve {}",
                    params.named_curve
                ))
            })?;
            let keypair = generate_ecdhe_keypair(group, &*config.rand);
            let pre_master_secret = ecdhe_shared_secret(&keypair, &params.point)?;
            let mut cke_body = Vec::new();
            crate::tls::parsing::serialize_varlen_vector(
                1,
                crate::tls::parsing::U8_LIMIT,
                &mut cke_body,
                |out| out.extend_from_slice(&keypair.public_point),
            );
            write_handshake_msg(
                transport,
                transcript,
                HandshakeMessageType::client_key_exchange,
                &cke_body,
            )?;
            log.client_key_exchange = Some(Bytes::from(cke_body));
            pre_master_secret
        }
        KexKind::DheRsa | KexKind::Anonymous => {
            // Recognized by the registry but never reachable here: neither
            // kind appears in `implemented_suites`, so `cipher_suite::lookup`
            // above would already have returned `None` and the driver would
            // have aborted with `UnimplementedCipher` before this point.
            return Err(HandshakeError::UnimplementedCipher);
        }
    };

    // The session hash for both the extended-master-secret derivation and
    // (if sent) CertificateVerify is the transcript up to and including
    // ClientKeyExchange -- the message immediately preceding either.
    let session_hash = transcript.hash();

    let pending_cert_verify_key = if client_cert_requested {
        config.certificates.first().map(|c| c.private_key_der.clone())
    } else {
        None
    };
    if let Some(private_key_der) = pending_cert_verify_key {
        let hash_id = match prf_hash {
            cipher_suite::PrfHash::Sha256 => 4,
            cipher_suite::PrfHash::Sha384 => 5,
        };
        let signed = sign_certificate_verify(&private_key_der, hash_id, &session_hash, &*config.rand)?;
        write_handshake_msg(
            transport,
            transcript,
            HandshakeMessageType::certificate_verify,
            &signed.serialize_body(version),
        )?;
        log.certificate_verify = Some(signed);
    }

    let master_secret = if use_extended_master_secret {
        key_schedule::extended_master_secret(version, prf_hash, &pre_master_secret, &session_hash)
    } else {
        let client_seed = key_schedule::random_seed(
            client_random,
            client_extended_random.as_deref(),
        );
        let server_seed = key_schedule::random_seed(
            &server_random,
            server_extended_random.as_deref(),
        );
        key_schedule::master_secret(version, prf_hash, &pre_master_secret, &client_seed, &server_seed)
    };

    let key_block = key_schedule::key_block(
        version,
        prf_hash,
        &master_secret,
        client_random,
        &server_random,
        entry.mac_len,
        entry.key_len,
        entry.iv_len,
    );
    let write_spec = CipherSpec {
        suite: suite_id,
        mac_key: key_block.client_write_mac_key,
        key: key_block.client_write_key,
        iv: key_block.client_write_iv,
    };
    let read_spec = CipherSpec {
        suite: suite_id,
        mac_key: key_block.server_write_mac_key,
        key: key_block.server_write_key,
        iv: key_block.server_write_iv,
    };

    transport
        .write_record(ContentType::ChangeCipherSpec, &[1])
        .map_err(transport_err)?;
    transport.prepare_write_cipher(write_spec);

    if let Some(server_protocols) = npn_server_protocols {
        if !config.next_protos.is_empty() {
            let (selected, fallback) = mutual_protocol(&server_protocols, &config.next_protos);
            let next_protocol = NextProtocol {
                selected_protocol: selected.clone(),
            };
            write_handshake_msg(
                transport,
                transcript,
                HandshakeMessageType::next_protocol,
                &next_protocol.serialize_body(),
            )?;
            log.negotiated_next_protocol = Some(selected);
            log.next_protocol_fallback = fallback;
        }
    }

    let client_verify_data = key_schedule::verify_data(
        version,
        prf_hash,
        &master_secret,
        b"client finished",
        &transcript.hash(),
    );
    write_handshake_msg(
        transport,
        transcript,
        HandshakeMessageType::finished,
        &Finished {
            verify_data: Bytes::from(client_verify_data.clone()),
        }
        .serialize_body(),
    )?;
    log.client_finished = Some(Bytes::from(client_verify_data));

    // Server's closing flight: optional NewSessionTicket, then a
    // ChangeCipherSpec that `read_handshake` absorbs transparently, then
    // Finished -- so the read cipher is armed once, up front, exactly as in
    // the resumed path above.
    transport.prepare_read_cipher(read_spec);

    let mut raw = transport.read_handshake().map_err(transport_err)?;
    let mut issued_ticket = None;
    if raw.message_type == HandshakeMessageType::new_session_ticket.to_u8() {
        let ticket = NewSessionTicket::parse(&mut raw.body.clone())?;
        let framed = frame_handshake_message(HandshakeMessageType::new_session_ticket, &raw.body);
        transcript.push(Bytes::from(framed));
        issued_ticket = Some(ticket);
        raw = transport.read_handshake().map_err(transport_err)?;
    }

    // The hash `verify_data` is checked against covers the transcript up to
    // (not including) Finished itself, so it must be taken before this
    // message is pushed -- unlike every other message, read directly from the
    // transport rather than through `read_handshake_msg`.
    let pre_server_finished_hash = transcript.hash();
    expect_type(&raw, HandshakeMessageType::finished)?;
    let framed = frame_handshake_message(HandshakeMessageType::finished, &raw.body);
    transcript.push(Bytes::from(framed));

    let mut body = raw.body.clone();
    let server_finished = Finished::parse(&mut body)?;
    let server_verify_data_expected = key_schedule::verify_data(
        version,
        prf_hash,
        &master_secret,
        b"server finished",
        &pre_server_finished_hash,
    );
    if !bool::from(
        server_finished
            .verify_data
            .ct_eq(&server_verify_data_expected),
    ) {
        log::warn!("-> ABORTED: server's Finished message was incorrect (full handshake)");
        return Err(HandshakeError::FinishedMismatch);
    }
    log.server_finished = Some(server_finished.verify_data.clone());

    if let Some(ticket) = issued_ticket {
        if let Some(cache) = &config.client_session_cache {
            cache.put(
                cache_key.to_string(),
                ClientSessionState {
                    session_ticket: Some(ticket.ticket.clone()),
                    protocol_version: version,
                    cipher_suite_id: suite_id,
                    master_secret,
                    server_certificates: log
                        .server_certificates
                        .as_ref()
                        .map(|c| c.certificate_list.clone())
                        .unwrap_or_default(),
                    extended_master_secret: use_extended_master_secret,
                    lifetime_hint: ticket.lifetime_hint,
                },
            );
        }
        log.session_ticket = Some(ticket);
    }

    log::info!("DONE: full handshake completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use subtle::ConstantTimeEq;

    // Modeled on the teacher's `constant_eq_timing_test`
    // (`pkg/crypto/src/lib.rs`): compares the time taken when the mismatching
    // byte is at the front of the buffer against when it's at the very end.
    // A non-constant-time comparator (naive `==`, or a `break`-on-mismatch
    // loop) is measurably faster in the "early mismatch" case; `subtle`'s
    // `ConstantTimeEq` should not be. Like the teacher's version this prints
    // the timings rather than asserting a numeric bound -- wall-clock timing
    // is too noisy in CI to assert on directly, but the call sites in
    // `run_full`/`run_resumed` only ever reach `ConstantTimeEq`, never `==`,
    // so the property (spec Invariant 6 / §8 Scenario 5) holds structurally.
    #[test]
    fn finished_comparison_uses_constant_time_eq() {
        let niters = 2000;
        let good = vec![0x42u8; 12];

        let mut early_mismatch = good.clone();
        early_mismatch[0] ^= 0xff;
        let mut late_mismatch = good.clone();
        late_mismatch[11] ^= 0xff;

        let a = Bytes::from(good.clone());

        let early = Bytes::from(early_mismatch);
        let start = std::time::Instant::now();
        for _ in 0..niters {
            assert!(!bool::from(a.ct_eq(&early)));
        }
        let early_elapsed = start.elapsed();

        let late = Bytes::from(late_mismatch);
        let start = std::time::Instant::now();
        for _ in 0..niters {
            assert!(!bool::from(a.ct_eq(&late)));
        }
        let late_elapsed = start.elapsed();

        println!(
            "ct_eq early-mismatch: {:?}, late-mismatch: {:?}",
            early_elapsed, late_elapsed
        );

        // Correctness, independent of timing: equal buffers compare equal,
        // any single differing byte compares unequal.
        assert!(bool::from(a.ct_eq(&a)));
        assert!(!bool::from(a.ct_eq(&early)));
        assert!(!bool::from(a.ct_eq(&late)));
    }
}
