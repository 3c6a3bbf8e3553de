// ClientHello/ServerHello extension codec (component A).
//
// Grounded on the teacher's `tls/extensions.rs` (the `Extension` tagged enum,
// `ExtensionType`, and the varlen-vector wire patterns used throughout), with
// every TLS-1.3-only variant (KeyShare*, Cookie, SupportedVersions,
// PostHandshakeAuth, SignatureAlgorithmsCert) dropped and `ExtendedRandom`
// added (spec §4.C; the teacher has no equivalent).

use bytes::{Buf, Bytes};

use crate::tls::error::{HandshakeError, Result};
use crate::tls::parsing::{serialize_varlen_vector, varlen_vector, U16_LIMIT, U8_LIMIT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    ClientHello,
    ServerHello,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    ServerName,
    SupportedGroups,
    PointFormats,
    SignatureAlgorithms,
    Alpn,
    StatusRequest,
    SignedCertificateTimestamp,
    SessionTicket,
    ExtendedMasterSecret,
    ExtendedRandom,
    SecureRenegotiation,
    NextProtocolNegotiation,
    Unknown(u16),
}

impl ExtensionType {
    pub fn to_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0,
            ExtensionType::StatusRequest => 5,
            ExtensionType::SupportedGroups => 10,
            ExtensionType::PointFormats => 11,
            ExtensionType::SignatureAlgorithms => 13,
            ExtensionType::Alpn => 16,
            ExtensionType::SignedCertificateTimestamp => 18,
            ExtensionType::SessionTicket => 35,
            ExtensionType::ExtendedMasterSecret => 23,
            ExtensionType::ExtendedRandom => 0x0028,
            ExtensionType::NextProtocolNegotiation => 13172,
            ExtensionType::SecureRenegotiation => 0xff01,
            ExtensionType::Unknown(v) => *v,
        }
    }

    pub fn from_u16(v: u16) -> Self {
        match v {
            0 => ExtensionType::ServerName,
            5 => ExtensionType::StatusRequest,
            10 => ExtensionType::SupportedGroups,
            11 => ExtensionType::PointFormats,
            13 => ExtensionType::SignatureAlgorithms,
            16 => ExtensionType::Alpn,
            18 => ExtensionType::SignedCertificateTimestamp,
            23 => ExtensionType::ExtendedMasterSecret,
            35 => ExtensionType::SessionTicket,
            0x0028 => ExtensionType::ExtendedRandom,
            13172 => ExtensionType::NextProtocolNegotiation,
            0xff01 => ExtensionType::SecureRenegotiation,
            _ => ExtensionType::Unknown(v),
        }
    }

    /// Whether this extension is allowed to appear on a message of the given
    /// type. The driver calls this while validating a fingerprint and while
    /// parsing a ServerHello.
    ///
    /// `StatusRequest` is legitimately server-sent: RFC 6066 OCSP stapling has
    /// the server echo it in ServerHello to signal a following
    /// CertificateStatus message. Only `SignatureAlgorithms` is actually
    /// ClientHello-only here.
    pub fn allowed(&self, msg_type: MessageType) -> bool {
        match msg_type {
            MessageType::ClientHello => true,
            MessageType::ServerHello => !matches!(self, ExtensionType::SignatureAlgorithms),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Extension {
    ServerName(Vec<String>),
    Alpn(Vec<Bytes>),
    SecureRenegotiation,
    ExtendedMasterSecret,
    /// Empty when the client offers NPN; the server's advertised protocol
    /// list when it answers (spec §4.A/§4.H "mutualProtocol").
    NextProtocolNegotiation(Vec<Bytes>),
    StatusRequest,
    SignedCertificateTimestamp,
    SupportedCurves(Vec<u16>),
    PointFormats(Vec<u8>),
    SessionTicket(Bytes),
    SignatureAlgorithms(Vec<(u8, u8)>),
    ExtendedRandom(Bytes),
    Unknown { typ: u16, data: Bytes },
}

impl Extension {
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            Extension::ServerName(_) => ExtensionType::ServerName,
            Extension::Alpn(_) => ExtensionType::Alpn,
            Extension::SecureRenegotiation => ExtensionType::SecureRenegotiation,
            Extension::ExtendedMasterSecret => ExtensionType::ExtendedMasterSecret,
            Extension::NextProtocolNegotiation(_) => ExtensionType::NextProtocolNegotiation,
            Extension::StatusRequest => ExtensionType::StatusRequest,
            Extension::SignedCertificateTimestamp => ExtensionType::SignedCertificateTimestamp,
            Extension::SupportedCurves(_) => ExtensionType::SupportedGroups,
            Extension::PointFormats(_) => ExtensionType::PointFormats,
            Extension::SessionTicket(_) => ExtensionType::SessionTicket,
            Extension::SignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            Extension::ExtendedRandom(_) => ExtensionType::ExtendedRandom,
            Extension::Unknown { typ, .. } => ExtensionType::Unknown(*typ),
        }
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.extension_type().to_u16().to_be_bytes());
        serialize_varlen_vector(0, U16_LIMIT, out, |out| match self {
            Extension::ServerName(names) => {
                serialize_varlen_vector(0, U16_LIMIT, out, |out| {
                    for name in names {
                        out.push(0); // name_type = host_name
                        serialize_varlen_vector(0, U16_LIMIT, out, |out| {
                            out.extend_from_slice(name.as_bytes());
                        });
                    }
                });
            }
            Extension::Alpn(names) => {
                // Intentionally 2-byte-prefixed per name (spec §4.A / §9 Open
                // Question); standard ALPN uses a 1-byte prefix. Retained for
                // fingerprint stability.
                serialize_varlen_vector(0, U16_LIMIT, out, |out| {
                    for name in names {
                        serialize_varlen_vector(0, U16_LIMIT, out, |out| {
                            out.extend_from_slice(name);
                        });
                    }
                });
            }
            Extension::SecureRenegotiation => out.push(0),
            Extension::ExtendedMasterSecret => {}
            Extension::NextProtocolNegotiation(protocols) => {
                // No outer list-length prefix: the extension's own length
                // (written by the `serialize_varlen_vector` wrapper around
                // this whole match) bounds the repeated entries.
                for name in protocols {
                    serialize_varlen_vector(0, U8_LIMIT, out, |out| {
                        out.extend_from_slice(name);
                    });
                }
            }
            Extension::StatusRequest => {
                out.push(1); // status_type = ocsp
                out.extend_from_slice(&[0, 0]); // empty responder_id_list
                out.extend_from_slice(&[0, 0]); // empty request_extensions
            }
            Extension::SignedCertificateTimestamp => {}
            Extension::SupportedCurves(ids) => {
                serialize_varlen_vector(0, U16_LIMIT, out, |out| {
                    for id in ids {
                        out.extend_from_slice(&id.to_be_bytes());
                    }
                });
            }
            Extension::PointFormats(fmts) => {
                serialize_varlen_vector(0, U8_LIMIT, out, |out| {
                    out.extend_from_slice(fmts);
                });
            }
            Extension::SessionTicket(ticket) => out.extend_from_slice(ticket),
            Extension::SignatureAlgorithms(pairs) => {
                serialize_varlen_vector(0, U16_LIMIT, out, |out| {
                    for (hash, sig) in pairs {
                        out.push(*hash);
                        out.push(*sig);
                    }
                });
            }
            Extension::ExtendedRandom(data) => {
                serialize_varlen_vector(0, U8_LIMIT, out, |out| out.extend_from_slice(data));
            }
            Extension::Unknown { data, .. } => out.extend_from_slice(data),
        });
    }

    pub fn parse(input: &mut Bytes, msg_type: MessageType) -> Result<Self> {
        if input.remaining() < 2 {
            return Err(HandshakeError::UnexpectedMessage(
                "truncated extension header".into(),
            ));
        }
        let typ = input.get_u16();
        let mut body = varlen_vector(input, 0, U16_LIMIT)?;
        let ext_type = ExtensionType::from_u16(typ);

        if !ext_type.allowed(msg_type) {
            return Err(HandshakeError::UnexpectedMessage(format!(
                "extension {:?} not allowed on this message type",
                ext_type
            )));
        }

        let ext = match ext_type {
            ExtensionType::ServerName => {
                let mut names = Vec::new();
                if !body.is_empty() {
                    let mut list = varlen_vector(&mut body, 0, U16_LIMIT)?;
                    while !list.is_empty() {
                        if list.remaining() < 1 {
                            return Err(HandshakeError::UnexpectedMessage(
                                "truncated server name entry".into(),
                            ));
                        }
                        let _name_type = list.get_u8();
                        let name = varlen_vector(&mut list, 0, U16_LIMIT)?;
                        names.push(String::from_utf8(name.to_vec()).map_err(|_| {
                            HandshakeError::UnexpectedMessage("invalid SNI utf8".into())
                        })?);
                    }
                }
                Extension::ServerName(names)
            }
            ExtensionType::Alpn => {
                let mut names = Vec::new();
                let mut list = varlen_vector(&mut body, 0, U16_LIMIT)?;
                while !list.is_empty() {
                    let name = varlen_vector(&mut list, 0, U16_LIMIT)?;
                    names.push(name);
                }
                Extension::Alpn(names)
            }
            ExtensionType::SecureRenegotiation => Extension::SecureRenegotiation,
            ExtensionType::ExtendedMasterSecret => Extension::ExtendedMasterSecret,
            ExtensionType::NextProtocolNegotiation => {
                let mut protocols = Vec::new();
                while !body.is_empty() {
                    protocols.push(varlen_vector(&mut body, 0, U8_LIMIT)?);
                }
                Extension::NextProtocolNegotiation(protocols)
            }
            ExtensionType::StatusRequest => Extension::StatusRequest,
            ExtensionType::SignedCertificateTimestamp => Extension::SignedCertificateTimestamp,
            ExtensionType::SupportedGroups => {
                let mut list = varlen_vector(&mut body, 0, U16_LIMIT)?;
                let mut ids = Vec::new();
                while list.remaining() >= 2 {
                    ids.push(list.get_u16());
                }
                Extension::SupportedCurves(ids)
            }
            ExtensionType::PointFormats => {
                let list = varlen_vector(&mut body, 0, U8_LIMIT)?;
                Extension::PointFormats(list.to_vec())
            }
            ExtensionType::SessionTicket => Extension::SessionTicket(body.clone()),
            ExtensionType::SignatureAlgorithms => {
                let mut list = varlen_vector(&mut body, 0, U16_LIMIT)?;
                let mut pairs = Vec::new();
                while list.remaining() >= 2 {
                    pairs.push((list.get_u8(), list.get_u8()));
                }
                Extension::SignatureAlgorithms(pairs)
            }
            ExtensionType::ExtendedRandom => {
                let data = varlen_vector(&mut body, 0, U8_LIMIT)?;
                Extension::ExtendedRandom(data)
            }
            ExtensionType::Unknown(v) => Extension::Unknown {
                typ: v,
                data: body.clone(),
            },
        };

        Ok(ext)
    }
}

pub fn find_sni(exts: &[Extension]) -> Option<&[String]> {
    exts.iter().find_map(|e| match e {
        Extension::ServerName(names) => Some(names.as_slice()),
        _ => None,
    })
}

pub fn find_alpn(exts: &[Extension]) -> Option<&[Bytes]> {
    exts.iter().find_map(|e| match e {
        Extension::Alpn(names) => Some(names.as_slice()),
        _ => None,
    })
}

pub fn find_point_formats(exts: &[Extension]) -> Option<&[u8]> {
    exts.iter().find_map(|e| match e {
        Extension::PointFormats(f) => Some(f.as_slice()),
        _ => None,
    })
}

pub fn find_signature_algorithms(exts: &[Extension]) -> Option<&[(u8, u8)]> {
    exts.iter().find_map(|e| match e {
        Extension::SignatureAlgorithms(p) => Some(p.as_slice()),
        _ => None,
    })
}

pub fn has_extended_master_secret(exts: &[Extension]) -> bool {
    exts.iter()
        .any(|e| matches!(e, Extension::ExtendedMasterSecret))
}

pub fn find_extended_random(exts: &[Extension]) -> Option<&Bytes> {
    exts.iter().find_map(|e| match e {
        Extension::ExtendedRandom(data) => Some(data),
        _ => None,
    })
}

pub fn find_next_protocols(exts: &[Extension]) -> Option<&[Bytes]> {
    exts.iter().find_map(|e| match e {
        Extension::NextProtocolNegotiation(protocols) => Some(protocols.as_slice()),
        _ => None,
    })
}

/// Checks the boundary cases spec §4.A/§8 call out explicitly: PointFormats
/// may not contain anything but 0 (uncompressed), and every advertised
/// SignatureAlgorithms pair must be one this implementation can evaluate.
pub fn validate_extensions(exts: &[Extension], supported_sig_algs: &[(u8, u8)]) -> Result<()> {
    if let Some(formats) = find_point_formats(exts) {
        if formats.iter().any(|f| *f != 0) {
            return Err(HandshakeError::Config(
                "PointFormats must only contain uncompressed (0)".into(),
            ));
        }
    }
    if let Some(pairs) = find_signature_algorithms(exts) {
        for pair in pairs {
            if !supported_sig_algs.contains(pair) {
                return Err(HandshakeError::Config(format!(
                    "unsupported signature algorithm pair {:?}",
                    pair
                )));
            }
        }
    }
    Ok(())
}

pub fn read_extension_list(input: &mut Bytes, msg_type: MessageType) -> Result<Vec<Extension>> {
    let mut out = Vec::new();
    if input.is_empty() {
        return Ok(out);
    }
    let mut list = varlen_vector(input, 0, U16_LIMIT)?;
    while !list.is_empty() {
        out.push(Extension::parse(&mut list, msg_type)?);
    }
    Ok(out)
}

pub fn write_extension_list(exts: &[Extension], out: &mut Vec<u8>) {
    serialize_varlen_vector(0, U16_LIMIT, out, |out| {
        for ext in exts {
            ext.serialize(out);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(ext: Extension, msg_type: MessageType) -> Extension {
        let mut out = Vec::new();
        ext.serialize(&mut out);
        let mut input = Bytes::from(out);
        Extension::parse(&mut input, msg_type).unwrap()
    }

    #[test]
    fn sni_round_trip() {
        let ext = Extension::ServerName(vec!["example.test".to_string()]);
        match roundtrip(ext, MessageType::ClientHello) {
            Extension::ServerName(names) => assert_eq!(names, vec!["example.test".to_string()]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn alpn_round_trip_uses_two_byte_prefix() {
        let ext = Extension::Alpn(vec![Bytes::from_static(b"h2")]);
        let mut out = Vec::new();
        ext.clone().serialize(&mut out);
        // type(2) len(2) list_len(2) name_len(2)=0x0002 'h','2'
        assert_eq!(&out[6..8], &[0x00, 0x02]);
        match roundtrip(ext, MessageType::ClientHello) {
            Extension::Alpn(names) => assert_eq!(names, vec![Bytes::from_static(b"h2")]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn point_formats_rejects_non_uncompressed() {
        let exts = vec![Extension::PointFormats(vec![1])];
        assert!(validate_extensions(&exts, &[]).is_err());
    }

    #[test]
    fn signature_algorithms_validated_against_supported_set() {
        let exts = vec![Extension::SignatureAlgorithms(vec![(4, 1)])];
        assert!(validate_extensions(&exts, &[]).is_err());
        assert!(validate_extensions(&exts, &[(4, 1)]).is_ok());
    }

    #[test]
    fn unknown_extension_carries_raw_bytes() {
        let ext = Extension::Unknown {
            typ: 0xabcd,
            data: Bytes::from_static(b"hi"),
        };
        match roundtrip(ext, MessageType::ClientHello) {
            Extension::Unknown { typ, data } => {
                assert_eq!(typ, 0xabcd);
                assert_eq!(&data[..], b"hi");
            }
            _ => panic!("wrong variant"),
        }
    }
}
