//! Byte-precise packet queue: an ordered run of packets plus a byte-offset
//! cursor into the head packet.
//!
//! Generalized from raw `Bytes` segments to full `Packet`s, since a flow
//! queue must also carry through object packets untouched.

use std::collections::VecDeque;

use crate::packet::{Packet, PacketFormat};

/// An ordered sequence of packets with a byte cursor into the head packet.
///
/// Invariant: `length_in_bytes()` always equals the sum of remaining bytes
/// across buffer packets plus the advisory sizes of object packets.
#[derive(Default)]
pub struct PacketQueue {
    packets: VecDeque<Packet>,
    /// Byte offset already consumed from the head buffer packet. Always
    /// `0` if the head is an object packet (object packets are popped
    /// whole, never partially).
    cursor: usize,
    bytes_len: usize,
}

impl PacketQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            packets: VecDeque::new(),
            cursor: 0,
            bytes_len: 0,
        }
    }

    /// Append a packet, taking ownership of one reference.
    pub fn push(&mut self, packet: Packet) {
        self.bytes_len += packet.get_size();
        self.packets.push_back(packet);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    #[must_use]
    pub fn length_in_packets(&self) -> usize {
        self.packets.len()
    }

    #[must_use]
    pub fn length_in_bytes(&self) -> usize {
        self.bytes_len
    }

    /// Non-destructive look at the head packet and the cursor into it.
    /// Returns `None` if the queue is empty.
    #[must_use]
    pub fn peek_head(&self) -> Option<(&Packet, usize)> {
        self.packets.front().map(|p| (p, self.cursor))
    }

    /// Pop the head packet outright, resetting the cursor. Returns the
    /// dropped reference to the caller (the queue's hold on it ends here).
    pub fn pop_packet(&mut self) -> Option<Packet> {
        let packet = self.packets.pop_front()?;
        let remaining = packet.get_size().saturating_sub(self.cursor);
        self.bytes_len = self.bytes_len.saturating_sub(remaining);
        self.cursor = 0;
        Some(packet)
    }

    /// As `pop_packet`, but discards the result.
    pub fn drop_packet(&mut self) {
        self.pop_packet();
    }

    /// Copy up to `max_len` bytes starting at the cursor, advancing across
    /// buffer packet boundaries. Stops at the first object packet
    /// encountered, returning the bytes collected so far — callers that
    /// need to cross an object packet must pop it explicitly first.
    pub fn pop_bytes(&mut self, max_len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(max_len.min(self.bytes_len));
        let mut remaining = max_len;

        while remaining > 0 {
            let Some(packet) = self.packets.front() else {
                break;
            };
            if packet.get_format() != PacketFormat::Buffer {
                break;
            }
            let data = packet.as_bytes().expect("buffer format checked above");
            let available = data.len() - self.cursor;
            let take = available.min(remaining);

            out.extend_from_slice(&data[self.cursor..self.cursor + take]);
            self.cursor += take;
            remaining -= take;
            self.bytes_len -= take;

            if self.cursor >= data.len() {
                self.packets.pop_front();
                self.cursor = 0;
            }
        }

        out
    }

    /// All-or-nothing variant of `pop_bytes`: either exactly `len` bytes are
    /// returned and consumed, or nothing is consumed and `None` is returned.
    pub fn pop_bytes_exact(&mut self, len: usize) -> Option<Vec<u8>> {
        if !self.has_bytes_available(len) {
            return None;
        }
        let out = self.pop_bytes(len);
        debug_assert_eq!(out.len(), len);
        Some(out)
    }

    /// Whether at least `len` contiguous buffer bytes are available at the
    /// front of the queue without crossing an object packet.
    fn has_bytes_available(&self, len: usize) -> bool {
        let mut remaining = len;
        let mut first = true;
        for packet in &self.packets {
            if packet.get_format() != PacketFormat::Buffer {
                return false;
            }
            let avail = if first {
                packet.get_size() - self.cursor
            } else {
                packet.get_size()
            };
            first = false;
            if avail >= remaining {
                return true;
            }
            remaining -= avail;
        }
        false
    }
}
