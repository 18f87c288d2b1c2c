//! Framing for the CR-terminated control protocol.
//!
//! The receiver speaks over a telnet port, so option-negotiation sequences
//! can appear between (or inside) status lines. The decoder strips them out
//! without disturbing the partial line and surfaces a refusal for every
//! option request, which the session writes straight back.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol_constants::{DO, DONT, IAC, LINE_TERMINATOR, SB, SE, WILL, WONT};

/// A unit read from the control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// One status line, terminator removed.
    Line(String),
    /// Refusal to send back for an option request (`IAC WONT x` / `IAC DONT x`).
    Refusal([u8; 3]),
}

/// A unit written to the control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A command without terminator; the encoder appends CR.
    Command(String),
    /// Raw negotiation bytes.
    Negotiation([u8; 3]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NegotiationState {
    Data,
    Iac,
    Option(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Line codec that declines all telnet options.
#[derive(Debug)]
pub struct LineCodec {
    line: Vec<u8>,
    state: NegotiationState,
    max_line_length: usize,
    discarding: bool,
}

impl LineCodec {
    #[must_use]
    pub fn new(max_line_length: usize) -> Self {
        Self {
            line: Vec::new(),
            state: NegotiationState::Data,
            max_line_length,
            discarding: false,
        }
    }

    fn push_data(&mut self, byte: u8) -> Option<InboundFrame> {
        match byte {
            LINE_TERMINATOR => {
                let discarded = std::mem::take(&mut self.discarding);
                let line = std::mem::take(&mut self.line);
                if discarded || line.is_empty() {
                    return None;
                }
                Some(InboundFrame::Line(
                    String::from_utf8_lossy(&line).into_owned(),
                ))
            }
            b'\n' | 0 => None,
            _ if self.discarding => None,
            _ => {
                if self.line.len() >= self.max_line_length {
                    log::warn!(
                        "[Codec] Discarding line longer than {} bytes",
                        self.max_line_length
                    );
                    self.line.clear();
                    self.discarding = true;
                } else {
                    self.line.push(byte);
                }
                None
            }
        }
    }

    fn step(&mut self, byte: u8) -> Option<InboundFrame> {
        match self.state {
            NegotiationState::Data => {
                if byte == IAC {
                    self.state = NegotiationState::Iac;
                    None
                } else {
                    self.push_data(byte)
                }
            }
            NegotiationState::Iac => match byte {
                IAC => {
                    self.state = NegotiationState::Data;
                    self.push_data(IAC)
                }
                DO | DONT | WILL | WONT => {
                    self.state = NegotiationState::Option(byte);
                    None
                }
                SB => {
                    self.state = NegotiationState::Subnegotiation;
                    None
                }
                _ => {
                    self.state = NegotiationState::Data;
                    None
                }
            },
            NegotiationState::Option(verb) => {
                self.state = NegotiationState::Data;
                match verb {
                    DO => Some(InboundFrame::Refusal([IAC, WONT, byte])),
                    WILL => Some(InboundFrame::Refusal([IAC, DONT, byte])),
                    _ => None,
                }
            }
            NegotiationState::Subnegotiation => {
                if byte == IAC {
                    self.state = NegotiationState::SubnegotiationIac;
                }
                None
            }
            NegotiationState::SubnegotiationIac => {
                self.state = if byte == SE {
                    NegotiationState::Data
                } else {
                    NegotiationState::Subnegotiation
                };
                None
            }
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(512)
    }
}

impl Decoder for LineCodec {
    type Item = InboundFrame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(frame) = self.step(byte) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

impl Encoder<OutboundFrame> for LineCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: OutboundFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            OutboundFrame::Command(command) => {
                dst.reserve(command.len() + 1);
                dst.put_slice(command.as_bytes());
                dst.put_u8(LINE_TERMINATOR);
            }
            OutboundFrame::Negotiation(bytes) => dst.put_slice(&bytes),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut LineCodec, input: &[u8]) -> Vec<InboundFrame> {
        let mut buf = BytesMut::from(input);
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).expect("decode") {
            frames.push(frame);
        }
        frames
    }

    fn line(s: &str) -> InboundFrame {
        InboundFrame::Line(s.to_string())
    }

    #[test]
    fn splits_on_carriage_return() {
        let mut codec = LineCodec::default();
        let frames = decode_all(&mut codec, b"PWON\rMV45\rMUOFF\r");
        assert_eq!(frames, vec![line("PWON"), line("MV45"), line("MUOFF")]);
    }

    #[test]
    fn partial_lines_wait_for_terminator() {
        let mut codec = LineCodec::default();
        assert!(decode_all(&mut codec, b"MV4").is_empty());
        assert_eq!(decode_all(&mut codec, b"5\r"), vec![line("MV45")]);
    }

    #[test]
    fn linefeeds_and_empty_lines_are_skipped() {
        let mut codec = LineCodec::default();
        let frames = decode_all(&mut codec, b"\r\n\rPWON\r\n");
        assert_eq!(frames, vec![line("PWON")]);
    }

    #[test]
    fn option_requests_are_refused() {
        let mut codec = LineCodec::default();
        let frames = decode_all(&mut codec, &[IAC, DO, 1, IAC, WILL, 3]);
        assert_eq!(
            frames,
            vec![
                InboundFrame::Refusal([IAC, WONT, 1]),
                InboundFrame::Refusal([IAC, DONT, 3]),
            ]
        );
    }

    #[test]
    fn negotiation_inside_a_line_leaves_it_intact() {
        let mut codec = LineCodec::default();
        let mut input = b"MV".to_vec();
        input.extend_from_slice(&[IAC, DO, 24]);
        input.extend_from_slice(&[IAC, SB, 24, 1, 2, IAC, SE]);
        input.extend_from_slice(&[IAC, WONT, 5]);
        input.extend_from_slice(b"45\r");
        let frames = decode_all(&mut codec, &input);
        assert_eq!(
            frames,
            vec![InboundFrame::Refusal([IAC, WONT, 24]), line("MV45")]
        );
    }

    #[test]
    fn escaped_iac_is_data() {
        let mut codec = LineCodec::default();
        let frames = decode_all(&mut codec, &[b'A', IAC, IAC, b'\r']);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn overlong_lines_are_discarded() {
        let mut codec = LineCodec::new(16);
        let mut input = vec![b'X'; 40];
        input.extend_from_slice(b"\rPWON\r");
        let frames = decode_all(&mut codec, &input);
        assert_eq!(frames, vec![line("PWON")]);
    }

    #[test]
    fn encoder_appends_terminator() {
        let mut codec = LineCodec::default();
        let mut dst = BytesMut::new();
        codec
            .encode(OutboundFrame::Command("SICD".into()), &mut dst)
            .expect("encode");
        codec
            .encode(OutboundFrame::Negotiation([IAC, WONT, 1]), &mut dst)
            .expect("encode");
        assert_eq!(&dst[..], &[b'S', b'I', b'C', b'D', b'\r', IAC, WONT, 1]);
    }
}
