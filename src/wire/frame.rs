//! Length-prefixed TCP frame codec shared by the coordinator and game wires.
//!
//! Each frame on the wire is `[u16 LE total_length][u8 type][body]`, where
//! `total_length` includes itself. Modeled on the incremental
//! accumulate-then-drain shape of a Unix-socket frame decoder in the pack,
//! generalized over the packet enum via [`FramedPacket`] since both OpenTTD
//! wire formats share this exact outer framing.

use super::WireError;

/// Outbound frames must fit within this TCP MTU cap, matching upstream's
/// `SEND_TCP_MTU`.
pub const SEND_TCP_MTU: usize = 1460;

/// A packet type that can be framed: it knows its own wire type byte and how
/// to encode/decode its body.
pub trait FramedPacket: Sized {
    /// The wire type byte for this packet instance.
    fn packet_type(&self) -> u8;

    /// Encodes the packet body (everything after the type byte) into `buf`.
    fn encode_body(&self, buf: &mut Vec<u8>);

    /// Decodes a packet body given its type byte.
    ///
    /// Implementations must leave `body` empty on success; the frame codec
    /// treats a non-empty remainder as [`WireError::PacketInvalidData`].
    fn decode_body(packet_type: u8, body: &mut &[u8]) -> Result<Self, WireError>;
}

/// Encodes `packet` into a complete wire frame.
///
/// # Errors
///
/// Returns [`WireError::FrameTooLarge`] if the encoded frame would exceed
/// [`SEND_TCP_MTU`].
pub fn encode_frame<P: FramedPacket>(packet: &P) -> Result<Vec<u8>, WireError> {
    let mut buf = vec![0u8, 0u8];
    buf.push(packet.packet_type());
    packet.encode_body(&mut buf);

    if buf.len() > SEND_TCP_MTU {
        return Err(WireError::FrameTooLarge(buf.len()));
    }

    let total_length = buf.len() as u16;
    buf[0..2].copy_from_slice(&total_length.to_le_bytes());
    Ok(buf)
}

/// Decodes exactly one frame's body (the bytes after the length+type
/// header), dispatching to `P::decode_body` and enforcing the
/// consume-exactly-the-body invariant.
fn decode_one<P: FramedPacket>(packet_type: u8, body: &[u8]) -> Result<P, WireError> {
    let mut remaining = body;
    let packet = P::decode_body(packet_type, &mut remaining)?;
    if !remaining.is_empty() {
        return Err(WireError::PacketInvalidData {
            context: "frame body",
            remaining: remaining.len(),
        });
    }
    Ok(packet)
}

/// Incremental frame decoder: accumulates bytes across arbitrary TCP-style
/// chunk boundaries and yields whole decoded packets.
#[derive(Debug)]
pub struct FrameDecoder<P> {
    buf: Vec<u8>,
    _packet: std::marker::PhantomData<P>,
}

impl<P: FramedPacket> FrameDecoder<P> {
    /// Creates a decoder with an empty accumulation buffer.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            _packet: std::marker::PhantomData,
        }
    }

    /// Feeds newly received bytes and extracts every complete frame now
    /// available. Partial frames remain buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<P>, WireError> {
        self.buf.extend_from_slice(bytes);
        let mut packets = Vec::new();

        loop {
            if self.buf.len() < 2 {
                break;
            }
            let total_length = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
            if total_length < 3 {
                return Err(WireError::PacketInvalidData {
                    context: "frame header",
                    remaining: total_length,
                });
            }
            if self.buf.len() < total_length {
                break;
            }

            let packet_type = self.buf[2];
            let body = &self.buf[3..total_length];
            let packet = decode_one::<P>(packet_type, body)?;
            packets.push(packet);

            self.buf.drain(..total_length);
        }

        Ok(packets)
    }

    /// True if bytes remain buffered that don't yet form a whole frame.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}

impl<P: FramedPacket> Default for FrameDecoder<P> {
    fn default() -> Self {
        Self::new()
    }
}
