//! RTP header parsing/encoding (RFC 3550 section 5.1), plus the optional
//! profile-specific extension header used to carry out-of-band control
//! commands (payload type 99) alongside media.

use bytes::{BufMut, BytesMut};

use crate::error::RtpError;

pub const RTP_VERSION: u8 = 2;
pub const CONTROL_PAYLOAD_TYPE: u8 = 99;

const FIXED_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
}

impl RtpHeader {
    pub fn new(payload_type: u8, ssrc: u32) -> Self {
        Self {
            padding: false,
            marker: false,
            payload_type,
            sequence_number: 0,
            timestamp: 0,
            ssrc,
            csrc: Vec::new(),
        }
    }

    /// Byte length of this header once encoded, excluding any extension
    /// header (12 bytes fixed + 4 bytes per CSRC entry).
    pub fn header_len(&self) -> usize {
        FIXED_HEADER_LEN + 4 * self.csrc.len()
    }

    pub fn encode(&self, out: &mut BytesMut) {
        let first = (RTP_VERSION << 6)
            | ((self.padding as u8) << 5)
            | (0 << 4) // extension bit set by caller via RtpPacket::encode
            | (self.csrc.len() as u8 & 0x0f);
        out.put_u8(first);
        out.put_u8(((self.marker as u8) << 7) | (self.payload_type & 0x7f));
        out.put_u16(self.sequence_number);
        out.put_u32(self.timestamp);
        out.put_u32(self.ssrc);
        for csrc in &self.csrc {
            out.put_u32(*csrc);
        }
    }

    /// Returns the parsed header, whether the extension bit was set, and
    /// the number of bytes consumed from `buf`.
    pub fn parse(buf: &[u8]) -> Result<(Self, bool, usize), RtpError> {
        if buf.len() < FIXED_HEADER_LEN {
            return Err(RtpError::TooShort(buf.len()));
        }
        let version = buf[0] >> 6;
        if version != RTP_VERSION {
            return Err(RtpError::UnsupportedVersion(version));
        }
        let padding = (buf[0] & 0x20) != 0;
        let extension = (buf[0] & 0x10) != 0;
        let csrc_count = (buf[0] & 0x0f) as usize;
        let marker = (buf[1] & 0x80) != 0;
        let payload_type = buf[1] & 0x7f;
        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let need = FIXED_HEADER_LEN + 4 * csrc_count;
        if buf.len() < need {
            return Err(RtpError::TooShort(buf.len()));
        }
        let mut csrc = Vec::with_capacity(csrc_count);
        for i in 0..csrc_count {
            let off = FIXED_HEADER_LEN + 4 * i;
            csrc.push(u32::from_be_bytes([
                buf[off],
                buf[off + 1],
                buf[off + 2],
                buf[off + 3],
            ]));
        }

        Ok((
            Self {
                padding,
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
                csrc,
            },
            extension,
            need,
        ))
    }
}

/// Profile-specific extension header (RFC 3550 section 5.3.1): a 16-bit
/// profile id followed by a length in 32-bit words and that many words
/// of data. `profile_id == CONTROL_PROFILE_ID` carries a control command
/// block, parsed separately in [`crate::control`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpExtension {
    pub profile_id: u16,
    pub data: Vec<u8>,
}

pub const CONTROL_PROFILE_ID: u16 = 0xCA11;

impl RtpExtension {
    pub fn encode(&self, out: &mut BytesMut) {
        out.put_u16(self.profile_id);
        let words = (self.data.len() + 3) / 4;
        out.put_u16(words as u16);
        out.put_slice(&self.data);
        let pad = words * 4 - self.data.len();
        for _ in 0..pad {
            out.put_u8(0);
        }
    }

    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RtpError> {
        if buf.len() < 4 {
            return Err(RtpError::TruncatedExtension);
        }
        let profile_id = u16::from_be_bytes([buf[0], buf[1]]);
        let words = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        let len = words * 4;
        if buf.len() < 4 + len {
            return Err(RtpError::TruncatedExtension);
        }
        Ok((
            Self {
                profile_id,
                data: buf[4..4 + len].to_vec(),
            },
            4 + len,
        ))
    }
}

/// A parsed RTP packet: header, optional extension, and a borrowed
/// payload slice (no copy of the payload bytes).
pub struct RtpPacket<'a> {
    pub header: RtpHeader,
    pub extension: Option<RtpExtension>,
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, RtpError> {
        let (header, has_extension, consumed) = RtpHeader::parse(buf)?;
        let mut offset = consumed;
        let extension = if has_extension {
            let (ext, ext_len) = RtpExtension::parse(&buf[offset..])?;
            offset += ext_len;
            Some(ext)
        } else {
            None
        };
        let mut payload = &buf[offset..];
        if header.padding {
            if let Some(&pad_len) = payload.last() {
                let pad_len = pad_len as usize;
                if pad_len > 0 && pad_len <= payload.len() {
                    payload = &payload[..payload.len() - pad_len];
                }
            }
        }
        Ok(Self {
            header,
            extension,
            payload,
        })
    }

    pub fn encode(header: &RtpHeader, extension: Option<&RtpExtension>, payload: &[u8]) -> BytesMut {
        let mut out = BytesMut::new();
        let first_byte_patch_needed = extension.is_some();
        header.encode(&mut out);
        if first_byte_patch_needed {
            if let Some(first) = out.first_mut() {
                *first |= 0x10;
            }
        }
        if let Some(ext) = extension {
            ext.encode(&mut out);
        }
        out.put_slice(payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_plain_header() {
        let mut h = RtpHeader::new(96, 0xdead_beef);
        h.sequence_number = 42;
        h.timestamp = 123_456;
        h.marker = true;
        let encoded = RtpPacket::encode(&h, None, b"payload");
        let pkt = RtpPacket::parse(&encoded).unwrap();
        assert_eq!(pkt.header, h);
        assert_eq!(pkt.payload, b"payload");
        assert!(pkt.extension.is_none());
    }

    #[test]
    fn round_trips_with_csrc_and_extension() {
        let mut h = RtpHeader::new(96, 1);
        h.csrc = vec![10, 20, 30];
        let ext = RtpExtension {
            profile_id: CONTROL_PROFILE_ID,
            data: vec![1, 2, 3],
        };
        let encoded = RtpPacket::encode(&h, Some(&ext), b"xy");
        let pkt = RtpPacket::parse(&encoded).unwrap();
        assert_eq!(pkt.header.csrc, vec![10, 20, 30]);
        assert_eq!(pkt.extension.unwrap().data, vec![1, 2, 3, 0]);
        assert_eq!(pkt.payload, b"xy");
    }

    #[test]
    fn rejects_truncated_packet() {
        assert!(RtpPacket::parse(&[0u8; 4]).is_err());
    }

    #[test]
    fn rejects_wrong_version() {
        let mut buf = vec![0u8; 12];
        buf[0] = 0x00; // version 0
        assert!(RtpPacket::parse(&buf).is_err());
    }
}
