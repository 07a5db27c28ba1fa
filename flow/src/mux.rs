//! The multiplexer codec: packs buffer packets tagged with a channel number
//! into a single byte stream, and reverses the process on the other end.
//!
//! A fixed 6-byte header (`u16` channel, big-endian, followed by a `u32`
//! size, big-endian) precedes every framed chunk.

use bytes::{BufMut, Bytes, BytesMut};
use flow_core::element::{ElementLogic, OutputSink};
use flow_core::event::{Event, MuxEvent};
use flow_core::packet::{Packet, PacketData};
use flow_core::pad::PadId;

pub const HEADER_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxHeader {
    pub channel: u16,
    pub size: u32,
}

impl MuxHeader {
    #[must_use]
    pub fn parse(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= HEADER_SIZE);
        Self {
            channel: u16::from_be_bytes([buf[0], buf[1]]),
            size: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
        }
    }

    pub fn write(&self, out: &mut BytesMut) {
        out.put_u16(self.channel);
        out.put_u32(self.size);
    }
}

/// Frames outgoing buffer packets behind a channel header. A [`MuxEvent`]
/// object packet on the input pad switches which channel subsequent buffer
/// packets are tagged with; it produces no output of its own.
#[derive(Default)]
pub struct Serializer {
    pub output: Option<PadId>,
    current_channel: u16,
}

impl ElementLogic for Serializer {
    fn process_input(&mut self, _input: PadId, packet: Packet, out: &mut OutputSink) {
        let Some(output) = self.output else { return };

        match packet.get_data() {
            PacketData::Object(obj) => {
                if let Some(Event::Mux(MuxEvent { channel })) = obj.downcast_ref::<Event>() {
                    self.current_channel = u16::try_from(*channel).unwrap_or(u16::MAX);
                }
            }
            PacketData::Buffer(data) => {
                let mut frame = BytesMut::with_capacity(HEADER_SIZE + data.len());
                MuxHeader {
                    channel: self.current_channel,
                    size: u32::try_from(data.len()).unwrap_or(u32::MAX),
                }
                .write(&mut frame);
                frame.extend_from_slice(data);
                if let Ok(framed) = Packet::from_bytes(frame.freeze()) {
                    out.push(output, framed);
                }
            }
        }
    }
}

/// Reassembles framed chunks back into (channel, payload) pairs: a
/// [`MuxEvent`] object packet announcing the channel, immediately followed
/// by a buffer packet carrying that channel's bytes. Handles headers and
/// bodies arriving split across arbitrarily many input packets.
#[derive(Default)]
pub struct Deserializer {
    pub output: Option<PadId>,
    staging: BytesMut,
}

impl ElementLogic for Deserializer {
    fn process_input(&mut self, _input: PadId, packet: Packet, out: &mut OutputSink) {
        let Some(output) = self.output else { return };
        let PacketData::Buffer(data) = packet.get_data() else {
            return; // mux stream carries raw bytes only
        };
        self.staging.extend_from_slice(data);

        loop {
            if self.staging.len() < HEADER_SIZE {
                break;
            }
            let header = MuxHeader::parse(&self.staging);
            let total = HEADER_SIZE + header.size as usize;
            if self.staging.len() < total {
                break;
            }

            let frame = self.staging.split_to(total);
            let body = Bytes::copy_from_slice(&frame[HEADER_SIZE..]);

            out.push(
                output,
                Packet::new_take_object(
                    Event::Mux(MuxEvent {
                        channel: u32::from(header.channel),
                    }),
                    0,
                ),
            );
            if let Ok(body_packet) = Packet::from_bytes(body) {
                out.push(output, body_packet);
            }
        }
    }
}
