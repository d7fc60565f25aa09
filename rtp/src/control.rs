//! Out-of-band control commands carried in the payload-type-99 control
//! extension, so a receiver can issue transport commands (play/pause/
//! seek/volume) in-band with the media stream instead of over a
//! separate control connection.

use bytes::{BufMut, BytesMut};

use crate::error::RtpError;

pub const CONTROL_BLOCK_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Play,
    Pause,
    Stop,
    Seek { position_ms: u64 },
    SetVolume { level: u8 },
    Custom { opcode: u8, payload: Vec<u8> },
}

impl ControlCommand {
    fn opcode(&self) -> u8 {
        match self {
            ControlCommand::Play => 1,
            ControlCommand::Pause => 2,
            ControlCommand::Stop => 3,
            ControlCommand::Seek { .. } => 4,
            ControlCommand::SetVolume { .. } => 5,
            ControlCommand::Custom { opcode, .. } => *opcode,
        }
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u8(self.opcode());
        match self {
            ControlCommand::Play | ControlCommand::Pause | ControlCommand::Stop => {
                out.put_u16(0);
            }
            ControlCommand::Seek { position_ms } => {
                out.put_u16(8);
                out.put_u64(*position_ms);
            }
            ControlCommand::SetVolume { level } => {
                out.put_u16(1);
                out.put_u8(*level);
            }
            ControlCommand::Custom { payload, .. } => {
                out.put_u16(payload.len() as u16);
                out.put_slice(payload);
            }
        }
    }
}

/// A sequence of commands stamped with a format version, matching the
/// "versioned command block" carried by the control extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBlock {
    pub version: u8,
    pub commands: Vec<ControlCommand>,
}

impl ControlBlock {
    pub fn new(commands: Vec<ControlCommand>) -> Self {
        Self {
            version: CONTROL_BLOCK_VERSION,
            commands,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        out.put_u8(self.version);
        for cmd in &self.commands {
            cmd.encode(&mut out);
        }
        out.to_vec()
    }

    pub fn parse(buf: &[u8]) -> Result<Self, RtpError> {
        if buf.is_empty() {
            return Err(RtpError::MalformedControl("empty control block".into()));
        }
        let version = buf[0];
        let mut commands = Vec::new();
        let mut off = 1;
        while off < buf.len() {
            if off + 3 > buf.len() {
                return Err(RtpError::MalformedControl("truncated command header".into()));
            }
            let opcode = buf[off];
            let len = u16::from_be_bytes([buf[off + 1], buf[off + 2]]) as usize;
            off += 3;
            if off + len > buf.len() {
                return Err(RtpError::MalformedControl("truncated command payload".into()));
            }
            let payload = &buf[off..off + len];
            off += len;
            let cmd = match opcode {
                1 => ControlCommand::Play,
                2 => ControlCommand::Pause,
                3 => ControlCommand::Stop,
                4 => {
                    if len != 8 {
                        return Err(RtpError::MalformedControl("seek payload must be 8 bytes".into()));
                    }
                    let position_ms = u64::from_be_bytes(payload.try_into().unwrap());
                    ControlCommand::Seek { position_ms }
                }
                5 => {
                    if len != 1 {
                        return Err(RtpError::MalformedControl("volume payload must be 1 byte".into()));
                    }
                    ControlCommand::SetVolume { level: payload[0] }
                }
                other => ControlCommand::Custom {
                    opcode: other,
                    payload: payload.to_vec(),
                },
            };
            commands.push(cmd);
        }
        Ok(Self { version, commands })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_commands() {
        let block = ControlBlock::new(vec![
            ControlCommand::Play,
            ControlCommand::Seek { position_ms: 90_000 },
            ControlCommand::SetVolume { level: 80 },
            ControlCommand::Custom {
                opcode: 200,
                payload: vec![9, 9],
            },
        ]);
        let encoded = block.encode();
        let parsed = ControlBlock::parse(&encoded).unwrap();
        assert_eq!(parsed, block);
    }

    #[test]
    fn rejects_truncated_block() {
        assert!(ControlBlock::parse(&[1, 4, 0]).is_err());
    }
}
