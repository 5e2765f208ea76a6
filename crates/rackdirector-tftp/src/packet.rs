//! TFTP wire format (RFC 1350 with RFC 2347-2349 options)

use crate::error::{Result, TftpError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const RRQ: u16 = 1;
const WRQ: u16 = 2;
const DATA: u16 = 3;
const ACK: u16 = 4;
const ERROR: u16 = 5;
const OACK: u16 = 6;

/// TFTP error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    /// Option negotiation failed (RFC 2347)
    OptionNegotiationFailed = 8,
}

impl From<u16> for ErrorCode {
    fn from(value: u16) -> Self {
        match value {
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            4 => ErrorCode::IllegalOperation,
            5 => ErrorCode::UnknownTransferId,
            8 => ErrorCode::OptionNegotiationFailed,
            _ => ErrorCode::NotDefined,
        }
    }
}

/// Negotiable transfer options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TftpOptions {
    /// Block size (RFC 2348)
    pub blksize: Option<u16>,
    /// Transfer size (RFC 2349)
    pub tsize: Option<u64>,
    /// Retransmit timeout in seconds (RFC 2349)
    pub timeout: Option<u8>,
}

impl TftpOptions {
    /// Check if any options are set
    pub fn is_empty(&self) -> bool {
        self.blksize.is_none() && self.tsize.is_none() && self.timeout.is_none()
    }

    fn parse<'a>(mut parts: impl Iterator<Item = &'a [u8]>) -> Self {
        let mut options = Self::default();
        while let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            if key.is_empty() {
                break;
            }
            let value = String::from_utf8_lossy(value);
            match String::from_utf8_lossy(key).to_ascii_lowercase().as_str() {
                "blksize" => options.blksize = value.parse().ok(),
                "tsize" => options.tsize = value.parse().ok(),
                "timeout" => options.timeout = value.parse().ok(),
                _ => {}
            }
        }
        options
    }

    fn encode(&self, buf: &mut BytesMut) {
        let pairs = [
            ("blksize", self.blksize.map(|v| v.to_string())),
            ("tsize", self.tsize.map(|v| v.to_string())),
            ("timeout", self.timeout.map(|v| v.to_string())),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                put_str(buf, key);
                put_str(buf, &value);
            }
        }
    }
}

/// TFTP packet types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TftpPacket {
    /// Read request; only octet and netascii modes are accepted
    ReadRequest {
        filename: String,
        mode: String,
        options: TftpOptions,
    },
    /// Write request
    WriteRequest { filename: String },
    Data { block: u16, data: Bytes },
    Ack { block: u16 },
    Error { code: ErrorCode, message: String },
    /// Option acknowledgment
    Oack { options: TftpOptions },
}

fn put_str(buf: &mut BytesMut, value: &str) {
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

impl TftpPacket {
    /// Parse a TFTP packet from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(TftpError::InvalidPacket("packet too short".to_string()));
        }

        let mut buf = data;
        let opcode = buf.get_u16();

        match opcode {
            RRQ | WRQ => {
                let mut parts = buf.split(|&b| b == 0);
                let filename = parts
                    .next()
                    .filter(|name| !name.is_empty())
                    .map(|name| String::from_utf8_lossy(name).into_owned())
                    .ok_or_else(|| TftpError::InvalidPacket("missing filename".to_string()))?;

                if opcode == WRQ {
                    return Ok(TftpPacket::WriteRequest { filename });
                }

                let mode = parts
                    .next()
                    .map(|mode| String::from_utf8_lossy(mode).to_ascii_lowercase())
                    .ok_or_else(|| TftpError::InvalidPacket("missing mode".to_string()))?;
                if mode != "octet" && mode != "netascii" {
                    return Err(TftpError::InvalidPacket(format!("unknown mode: {}", mode)));
                }

                Ok(TftpPacket::ReadRequest {
                    filename,
                    mode,
                    options: TftpOptions::parse(parts),
                })
            }
            DATA | ACK | ERROR if buf.len() < 2 => Err(TftpError::InvalidPacket(format!(
                "opcode {} packet too short",
                opcode
            ))),
            DATA => {
                let block = buf.get_u16();
                Ok(TftpPacket::Data {
                    block,
                    data: Bytes::copy_from_slice(buf),
                })
            }
            ACK => Ok(TftpPacket::Ack {
                block: buf.get_u16(),
            }),
            ERROR => {
                let code = ErrorCode::from(buf.get_u16());
                let message = buf
                    .split(|&b| b == 0)
                    .next()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default();
                Ok(TftpPacket::Error { code, message })
            }
            OACK => Ok(TftpPacket::Oack {
                options: TftpOptions::parse(buf.split(|&b| b == 0)),
            }),
            other => Err(TftpError::InvalidPacket(format!("unknown opcode: {}", other))),
        }
    }

    /// Encode the packet to bytes
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            TftpPacket::ReadRequest {
                filename,
                mode,
                options,
            } => {
                buf.put_u16(RRQ);
                put_str(&mut buf, filename);
                put_str(&mut buf, mode);
                options.encode(&mut buf);
            }
            TftpPacket::WriteRequest { filename } => {
                buf.put_u16(WRQ);
                put_str(&mut buf, filename);
                put_str(&mut buf, "octet");
            }
            TftpPacket::Data { block, data } => {
                buf.put_u16(DATA);
                buf.put_u16(*block);
                buf.put_slice(data);
            }
            TftpPacket::Ack { block } => {
                buf.put_u16(ACK);
                buf.put_u16(*block);
            }
            TftpPacket::Error { code, message } => {
                buf.put_u16(ERROR);
                buf.put_u16(*code as u16);
                put_str(&mut buf, message);
            }
            TftpPacket::Oack { options } => {
                buf.put_u16(OACK);
                options.encode(&mut buf);
            }
        }

        buf.freeze()
    }

    /// Create an error packet
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        TftpPacket::Error {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rrq(fields: &[&str]) -> Vec<u8> {
        let mut packet = vec![0x00, 0x01];
        for field in fields {
            packet.extend_from_slice(field.as_bytes());
            packet.push(0);
        }
        packet
    }

    #[test]
    fn test_parse_rrq() {
        let parsed = TftpPacket::parse(&rrq(&["bios/pxelinux.0", "OCTET"])).unwrap();
        assert_eq!(
            parsed,
            TftpPacket::ReadRequest {
                filename: "bios/pxelinux.0".to_string(),
                mode: "octet".to_string(),
                options: TftpOptions::default(),
            }
        );
    }

    #[test]
    fn test_parse_rrq_with_options() {
        let packet = rrq(&["ipxe.efi", "octet", "blksize", "1428", "TSIZE", "0", "windowsize", "4"]);

        match TftpPacket::parse(&packet).unwrap() {
            TftpPacket::ReadRequest { options, .. } => {
                assert_eq!(options.blksize, Some(1428));
                assert_eq!(options.tsize, Some(0));
                assert_eq!(options.timeout, None);
            }
            other => panic!("expected ReadRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_requests() {
        assert!(TftpPacket::parse(&[0x00]).is_err());
        assert!(TftpPacket::parse(&rrq(&["ipxe.efi", "mail"])).is_err());
        assert!(TftpPacket::parse(&rrq(&["", "octet"])).is_err());
        assert!(TftpPacket::parse(&[0x00, 0x04, 0x01]).is_err());
        assert!(TftpPacket::parse(&[0x00, 0x09, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_parse_wrq() {
        let mut packet = rrq(&["upload.bin", "octet"]);
        packet[1] = 0x02;
        assert_eq!(
            TftpPacket::parse(&packet).unwrap(),
            TftpPacket::WriteRequest {
                filename: "upload.bin".to_string()
            }
        );
    }

    #[test]
    fn test_parse_ack_and_error() {
        assert_eq!(
            TftpPacket::parse(&[0x00, 0x04, 0x00, 0x05]).unwrap(),
            TftpPacket::Ack { block: 5 }
        );

        let mut packet = vec![0x00, 0x05, 0x00, 0x08];
        packet.extend_from_slice(b"bad blksize\0");
        assert_eq!(
            TftpPacket::parse(&packet).unwrap(),
            TftpPacket::error(ErrorCode::OptionNegotiationFailed, "bad blksize")
        );
    }

    #[test]
    fn test_encode_data() {
        let packet = TftpPacket::Data {
            block: 1,
            data: Bytes::from_static(b"test data"),
        };
        let encoded = packet.encode();
        assert_eq!(&encoded[0..4], &[0x00, 0x03, 0x00, 0x01]);
        assert_eq!(&encoded[4..], b"test data");
    }

    #[test]
    fn test_encode_error() {
        let encoded = TftpPacket::error(ErrorCode::FileNotFound, "not found").encode();
        assert_eq!(&encoded[0..4], &[0x00, 0x05, 0x00, 0x01]);
        assert_eq!(&encoded[4..encoded.len() - 1], b"not found");
        assert_eq!(encoded[encoded.len() - 1], 0);
    }

    #[test]
    fn test_encode_oack_only_set_options() {
        let encoded = TftpPacket::Oack {
            options: TftpOptions {
                blksize: Some(1024),
                tsize: None,
                timeout: Some(3),
            },
        }
        .encode();

        assert_eq!(&encoded[..], b"\x00\x06blksize\x001024\x00timeout\x003\x00");
    }
}
