// MIT License - Copyright (c) 2026 Peter Wright

//! Outer frame codec for the Ness ASCII protocol.
//!
//! Every packet is one line of ASCII terminated by CRLF (bare LF is
//! tolerated on input):
//!
//! ```text
//! +-------+---------+--------+---------+------+-----------+----------+
//! | start | address | length | command | data | timestamp | checksum |
//! +-------+---------+--------+---------+------+-----------+----------+
//! ```
//!
//! The panel multiplexes two data dialects over this frame. User-interface
//! *requests* (start byte `0x83`) carry the keypad string as raw ASCII, use
//! a single hex nibble for the address, and checksum the ASCII character
//! values. Everything else (status-update responses and system-status
//! events) encodes each field as an uppercase hex pair and checksums the
//! pair *values*, so the decoded byte sum of a valid packet is 0 mod 256.

use chrono::{NaiveDate, NaiveDateTime};

use crate::constants::{ADDRESS_INCLUDED, ASCII_FORMAT, BASIC_HEADER, TIMESTAMP_INCLUDED};
use crate::error::PacketError;

/// The two command codes the panel speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    /// Keypad input, status requests and status-update responses.
    UserInterface = 0x60,
    /// Asynchronous system status events.
    SystemStatus = 0x61,
}

impl CommandType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x60 => Some(Self::UserInterface),
            0x61 => Some(Self::SystemStatus),
            _ => None,
        }
    }
}

/// How checksum failures are handled during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// A bad checksum fails the decode; the packet never reaches the
    /// state model.
    #[default]
    Strict,
    /// The packet is surfaced anyway and the mismatch is reported
    /// alongside it.
    Lenient,
}

/// A single framed unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Panel address 0-15. Absent when the address-included start bit is
    /// off, except for the documented 16-character `0x82` quirk.
    pub address: Option<u8>,
    /// Sequence bit (MSB of the length byte). The panel toggles it per
    /// packet; duplicates are still delivered.
    pub seq: u8,
    pub command: CommandType,
    /// Raw ASCII keystring for user-interface requests, uppercase hex
    /// pairs otherwise.
    pub data: String,
    pub timestamp: Option<NaiveDateTime>,
    /// Whether this packet is in the raw-ASCII user-interface request
    /// dialect (start byte `0x83`).
    pub is_user_interface_req: bool,
}

impl Packet {
    /// Build an outbound user-interface request (keystring or `Sxx`).
    pub fn user_interface_request(address: u8, data: impl Into<String>) -> Self {
        Self {
            address: Some(address),
            seq: 0,
            command: CommandType::UserInterface,
            data: data.into(),
            timestamp: None,
            is_user_interface_req: true,
        }
    }

    /// The start byte derived from the packet's fields.
    ///
    /// User-interface responses never set the address bit even when they
    /// carry an address; decoders recognise those by the fixed 16-character
    /// line length instead.
    pub fn start(&self) -> u8 {
        let mut start = ASCII_FORMAT | BASIC_HEADER;
        let is_response =
            self.command == CommandType::UserInterface && !self.is_user_interface_req;
        if self.address.is_some() && !is_response {
            start |= ADDRESS_INCLUDED;
        }
        if self.timestamp.is_some() {
            start |= TIMESTAMP_INCLUDED;
        }
        start
    }

    /// Number of data bytes (characters for the request dialect, hex
    /// pairs otherwise).
    pub fn data_len(&self) -> usize {
        if self.is_user_interface_req {
            self.data.len()
        } else {
            self.data.len() / 2
        }
    }

    /// The length byte: data byte count with the sequence bit in the MSB.
    pub fn length_field(&self) -> u8 {
        (self.data_len() as u8 & 0x7f) | (self.seq << 7)
    }

    /// Serialize to the wire string, checksum included, terminator not.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + 22);
        out.push_str(&format!("{:02X}", self.start()));
        if let Some(address) = self.address {
            if self.is_user_interface_req {
                out.push_str(&format!("{:X}", address & 0x0f));
            } else {
                out.push_str(&format!("{:02X}", address));
            }
        }
        out.push_str(&format!("{:02X}", self.length_field()));
        out.push_str(&format!("{:02X}", self.command as u8));
        if self.is_user_interface_req {
            out.push_str(&self.data);
        } else {
            out.push_str(&self.data.to_ascii_uppercase());
        }
        if let Some(ts) = self.timestamp {
            out.push_str(&ts.format("%y%m%d%H%M%S").to_string());
        }
        let checksum = if self.is_user_interface_req {
            ascii_checksum(&out)
        } else {
            hex_pair_checksum(&out)
        };
        out.push_str(&format!("{:02X}", checksum));
        out
    }

    /// Decode one line, failing on any checksum mismatch.
    pub fn decode(line: &str) -> Result<Packet, PacketError> {
        Self::decode_with(line, ChecksumMode::Strict).map(|(packet, _)| packet)
    }

    /// Decode one line with the given checksum policy.
    ///
    /// In lenient mode a mismatch is returned alongside the packet instead
    /// of failing the decode; all other errors still fail.
    pub fn decode_with(
        line: &str,
        mode: ChecksumMode,
    ) -> Result<(Packet, Option<PacketError>), PacketError> {
        // Terminators and inter-command delay separators are not part of
        // the frame.
        let line: String = line
            .chars()
            .filter(|c| !matches!(c, '\r' | '\n' | '?') && !c.is_ascii_whitespace())
            .collect();

        if !line.is_ascii() {
            return Err(PacketError::MalformedHeader {
                span: line.clone(),
                line,
            });
        }
        if line.len() < 7 {
            return Err(PacketError::TruncatedPacket { line });
        }

        let mut cursor = Cursor::new(&line);
        let start = cursor.take_hex_u8()?;
        if !matches!(start, 0x82 | 0x83 | 0x86 | 0x87) {
            return Err(PacketError::BadStartByte { line, start });
        }
        let is_user_interface_req = start == 0x83;

        // Some panels include the address even with the address bit clear;
        // those lines are always exactly 16 characters.
        let has_address =
            start & ADDRESS_INCLUDED != 0 || (start == 0x82 && line.len() == 16);
        let address = if has_address {
            if is_user_interface_req {
                Some(cursor.take_hex_nibble()?)
            } else {
                Some(cursor.take_hex_u8()?)
            }
        } else {
            None
        };

        let length_field = cursor.take_hex_u8()?;
        let data_len = (length_field & 0x7f) as usize;
        let seq = length_field >> 7;

        let command_byte = cursor.take_hex_u8()?;
        let command = CommandType::from_u8(command_byte).ok_or(PacketError::UnknownCommand {
            line: line.clone(),
            command: command_byte,
        })?;

        let data = if is_user_interface_req {
            cursor.take(data_len)?.to_string()
        } else {
            let span = cursor.take(data_len * 2)?;
            if !span.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(PacketError::MalformedHeader {
                    line: line.clone(),
                    span: span.to_string(),
                });
            }
            span.to_ascii_uppercase()
        };

        let timestamp = if start & TIMESTAMP_INCLUDED != 0 {
            Some(decode_timestamp(&line, cursor.take(12)?)?)
        } else {
            None
        };

        let body_end = cursor.position();
        let checksum = cursor.take_hex_u8()?;
        if !cursor.is_consumed() {
            return Err(PacketError::MalformedHeader {
                span: line[cursor.position()..].to_string(),
                line,
            });
        }

        let expected = if is_user_interface_req {
            ascii_checksum(&line[..body_end])
        } else {
            hex_pair_checksum(&line[..body_end])
        };
        let checksum_error = if expected != checksum {
            let err = PacketError::ChecksumError {
                line: line.clone(),
                expected,
                actual: checksum,
            };
            match mode {
                ChecksumMode::Strict => return Err(err),
                ChecksumMode::Lenient => Some(err),
            }
        } else {
            None
        };

        Ok((
            Packet {
                address,
                seq,
                command,
                data,
                timestamp,
                is_user_interface_req,
            },
            checksum_error,
        ))
    }
}

/// Two's complement of the sum of the ASCII character values.
fn ascii_checksum(body: &str) -> u8 {
    let total: u32 = body.bytes().map(u32::from).sum();
    (total as u8).wrapping_neg()
}

/// Two's complement of the sum of the hex-pair values, so that summing the
/// decoded bytes of a valid packet (checksum included) gives 0 mod 256.
fn hex_pair_checksum(body: &str) -> u8 {
    let total: u32 = body
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let span = std::str::from_utf8(pair).unwrap_or("");
            u32::from(u8::from_str_radix(span, 16).unwrap_or(0))
        })
        .sum();
    (total as u8).wrapping_neg()
}

/// Decode the 6-byte decimal timestamp (YY MM DD HH MM SS).
///
/// Day-of-week and DST ride in the high bits of the day and hour fields.
/// Panels emit minute 60 for events on the hour; that rolls into the next
/// hour rather than failing the decode.
fn decode_timestamp(line: &str, span: &str) -> Result<NaiveDateTime, PacketError> {
    let field = |i: usize| -> Result<u32, PacketError> {
        span[i * 2..i * 2 + 2]
            .parse::<u32>()
            .map_err(|_| PacketError::MalformedHeader {
                line: line.to_string(),
                span: span.to_string(),
            })
    };
    let year = 2000 + field(0)?;
    let month = field(1)?;
    let day = field(2)? & 0x1f;
    let mut hour = field(3)? & 0x1f;
    let mut minute = field(4)?;
    let second = field(5)?;
    if minute == 60 {
        minute = 0;
        hour = (hour + 1) % 24;
    }

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| PacketError::MalformedHeader {
            line: line.to_string(),
            span: span.to_string(),
        })
}

/// Cursor over the characters of a candidate line.
struct Cursor<'a> {
    line: &'a str,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { line, position: 0 }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn is_consumed(&self) -> bool {
        self.position >= self.line.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a str, PacketError> {
        let end = self.position + n;
        if end > self.line.len() {
            return Err(PacketError::TruncatedPacket {
                line: self.line.to_string(),
            });
        }
        let span = &self.line[self.position..end];
        self.position = end;
        Ok(span)
    }

    fn take_hex_u8(&mut self) -> Result<u8, PacketError> {
        let span = self.take(2)?;
        u8::from_str_radix(span, 16).map_err(|_| PacketError::MalformedHeader {
            line: self.line.to_string(),
            span: span.to_string(),
        })
    }

    fn take_hex_nibble(&mut self) -> Result<u8, PacketError> {
        let span = self.take(1)?;
        u8::from_str_radix(span, 16).map_err(|_| PacketError::MalformedHeader {
            line: self.line.to_string(),
            span: span.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_encode_status_request() {
        let pkt = Packet::user_interface_request(0, "S00");
        assert_eq!(pkt.encode(), "8300360S00E9");
    }

    #[test]
    fn test_encode_arm_command() {
        let pkt = Packet::user_interface_request(0, "A123E");
        assert_eq!(pkt.encode(), "8300560A123E7E");
    }

    #[test]
    fn test_encode_longer_keystring() {
        let pkt = Packet::user_interface_request(0, "A1234E");
        assert_eq!(pkt.encode(), "8300660A1234E49");
    }

    #[test]
    fn test_decode_user_interface_request() {
        let pkt = Packet::decode("8300360S00E9").unwrap();
        assert_eq!(pkt.address, Some(0));
        assert_eq!(pkt.seq, 0);
        assert_eq!(pkt.command, CommandType::UserInterface);
        assert_eq!(pkt.data, "S00");
        assert!(pkt.timestamp.is_none());
        assert!(pkt.is_user_interface_req);
    }

    #[test]
    fn test_decode_status_update_response() {
        let pkt = Packet::decode("8200036014000007").unwrap();
        assert_eq!(pkt.address, Some(0));
        assert_eq!(pkt.command, CommandType::UserInterface);
        assert_eq!(pkt.data, "140000");
        assert!(!pkt.is_user_interface_req);
    }

    #[test]
    fn test_decode_event_with_timestamp() {
        let pkt = Packet::decode("8709036101050018122709413536").unwrap();
        assert_eq!(pkt.address, Some(9));
        assert_eq!(pkt.command, CommandType::SystemStatus);
        assert_eq!(pkt.data, "010500");
        assert_eq!(pkt.timestamp, Some(date(2018, 12, 27, 9, 41, 35)));
    }

    #[test]
    fn test_decode_event_with_sequence_bit() {
        let pkt = Packet::decode("87098361000400181227094135B8").unwrap();
        assert_eq!(pkt.seq, 1);
        assert_eq!(pkt.data, "000400");
    }

    #[test]
    fn test_decode_event_without_address() {
        // Events can arrive with start 0x82 and no address at all.
        let pkt = Packet::decode("820361230001F6").unwrap();
        assert_eq!(pkt.address, None);
        assert_eq!(pkt.command, CommandType::SystemStatus);
        assert_eq!(pkt.data, "230001");
    }

    #[test]
    fn test_decode_0x82_sixteen_char_address_quirk() {
        // 16-character 0x82 lines still carry an address.
        let pkt = Packet::decode("820003600000001B").unwrap();
        assert_eq!(pkt.address, Some(0));
        assert_eq!(pkt.data, "000000");
    }

    #[test]
    fn test_decode_real_captures() {
        // Lines captured from real panels; all must decode and verify.
        for line in [
            "8709036101050018122709413536",
            "87098361000400181227094135b8",
            "8709036101040018122709413735",
            "8704036100120019012909332957",
            "820003600000001b",
            "8200036014000007",
            "820003600001001a",
            "820361230001f6",
            "8300360S00E9",
            "8704036100140019012915060699",
            "87048361001300190129231052b6",
            "8709836100050019010509174800",
            "8300c6012345678912EE7",
        ] {
            let pkt = Packet::decode(line).unwrap_or_else(|e| panic!("{line}: {e}"));
            let _ = pkt.encode();
        }
    }

    #[test]
    fn test_decode_tolerates_terminators() {
        let bare = Packet::decode("8300360S00E9").unwrap();
        assert_eq!(Packet::decode("8300360S00E9\r\n").unwrap(), bare);
        assert_eq!(Packet::decode("8300360S00E9\n").unwrap(), bare);
    }

    #[test]
    fn test_encode_decode_roundtrip_with_timestamp() {
        let pkt = Packet {
            address: Some(0),
            seq: 0,
            command: CommandType::SystemStatus,
            data: "000100".to_string(),
            timestamp: Some(date(2018, 5, 10, 15, 32, 55)),
            is_user_interface_req: false,
        };
        let encoded = pkt.encode();
        assert_eq!(encoded, "870003610001001805101532554B");
        assert_eq!(Packet::decode(&encoded).unwrap(), pkt);
    }

    #[test]
    fn test_timestamp_minute_sixty_quirk() {
        // Panels emit minute 60 on the hour; it rolls into the next hour.
        let pkt = Packet {
            address: Some(0),
            seq: 0,
            command: CommandType::SystemStatus,
            data: "000100".to_string(),
            timestamp: Some(date(2019, 1, 29, 15, 0, 0)),
            is_user_interface_req: false,
        };
        let edited = pkt.encode().replace("150000", "146000");
        // Lenient mode: the edit invalidates the checksum, but the
        // timestamp decode is what is under test here.
        let (decoded, _) = Packet::decode_with(&edited, ChecksumMode::Lenient).unwrap();
        assert_eq!(decoded.timestamp, Some(date(2019, 1, 29, 15, 0, 0)));
    }

    #[test]
    fn test_truncated_packet() {
        assert!(matches!(
            Packet::decode("8300"),
            Err(PacketError::TruncatedPacket { .. })
        ));
        // Claims 3 data bytes but carries fewer characters.
        assert!(matches!(
            Packet::decode("870003610001"),
            Err(PacketError::TruncatedPacket { .. })
        ));
    }

    #[test]
    fn test_bad_start_byte() {
        assert!(matches!(
            Packet::decode("8100036014000007"),
            Err(PacketError::BadStartByte { start: 0x81, .. })
        ));
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            Packet::decode("820363230001F4"),
            Err(PacketError::UnknownCommand { command: 0x63, .. })
        ));
    }

    #[test]
    fn test_checksum_error_strict_and_lenient() {
        let err = Packet::decode("8200036014000008");
        assert!(matches!(err, Err(PacketError::ChecksumError { .. })));

        let (pkt, mismatch) =
            Packet::decode_with("8200036014000008", ChecksumMode::Lenient).unwrap();
        assert_eq!(pkt.data, "140000");
        assert!(matches!(
            mismatch,
            Some(PacketError::ChecksumError {
                expected: 0x07,
                actual: 0x08,
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            Packet::decode("8Z00036014000007"),
            Err(PacketError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(matches!(
            Packet::decode("870003610001001805101532554BFF"),
            Err(PacketError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_checksum_sums_to_zero() {
        // The decoded byte values of a valid hex-dialect packet sum to 0.
        let line = "8200036014000007";
        let total: u32 = line
            .as_bytes()
            .chunks(2)
            .map(|p| u32::from(u8::from_str_radix(std::str::from_utf8(p).unwrap(), 16).unwrap()))
            .sum();
        assert_eq!(total % 256, 0);
    }
}
