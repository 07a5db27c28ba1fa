//! The packet: a reference-counted envelope carrying either a byte buffer
//! or an object reference.
//!
//! Format and size are immutable once set, and the refcount is atomic —
//! here that's just `Arc`, so `Clone`/`Drop` *are* `ref`/`unref`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{FlowError, Result};

/// Upper bound on a buffer packet's payload.
pub const MAX_SIZE: usize = (1 << 29) - 1;

/// Which shape of payload a packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketFormat {
    Buffer,
    Object,
}

enum Payload {
    Buffer(Bytes),
    Object {
        object: Arc<dyn Any + Send + Sync>,
        size_hint: usize,
    },
}

struct Inner {
    payload: Payload,
}

/// A reference-counted packet. Cloning a `Packet` is the `ref` operation;
/// dropping the last clone is `unref` and releases the object reference (if
/// any) exactly once.
#[derive(Clone)]
pub struct Packet {
    inner: Arc<Inner>,
}

/// Borrowed view into a packet's payload, returned by [`Packet::get_data`].
/// The caller must not attempt to free or mutate through this reference.
pub enum PacketData<'a> {
    Buffer(&'a [u8]),
    Object(&'a (dyn Any + Send + Sync)),
}

impl Packet {
    /// Build a buffer packet by copying `data`.
    ///
    /// # Errors
    /// Returns [`FlowError::PacketTooLarge`] if `data.len() > MAX_SIZE`.
    pub fn new_buffer(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_SIZE {
            return Err(FlowError::PacketTooLarge {
                size: data.len(),
                max: MAX_SIZE,
            });
        }
        Ok(Self {
            inner: Arc::new(Inner {
                payload: Payload::Buffer(Bytes::copy_from_slice(data)),
            }),
        })
    }

    /// Build a buffer packet from an already-owned [`Bytes`], avoiding a copy.
    ///
    /// # Errors
    /// Returns [`FlowError::PacketTooLarge`] if `data.len() > MAX_SIZE`.
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        if data.len() > MAX_SIZE {
            return Err(FlowError::PacketTooLarge {
                size: data.len(),
                max: MAX_SIZE,
            });
        }
        Ok(Self {
            inner: Arc::new(Inner {
                payload: Payload::Buffer(data),
            }),
        })
    }

    /// Build an object packet that shares an existing reference (the
    /// `retain` form — equivalent to handing the queue a second `ref`).
    #[must_use]
    pub fn new_object(object: Arc<dyn Any + Send + Sync>, size_hint: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                payload: Payload::Object { object, size_hint },
            }),
        }
    }

    /// Build an object packet that takes ownership of a freshly constructed
    /// value — the `new_take_object` form: no extra retain happens because
    /// the caller never held a second handle to begin with.
    #[must_use]
    pub fn new_take_object<T: Any + Send + Sync>(object: T, size_hint: usize) -> Self {
        Self::new_object(Arc::new(object), size_hint)
    }

    /// Deep-copy a buffer packet; for an object packet, returns a new
    /// reference to the same object (a shallow copy), matching
    /// `flow_packet_copy`.
    #[must_use]
    pub fn copy(&self) -> Self {
        match &self.inner.payload {
            Payload::Buffer(b) => Self {
                inner: Arc::new(Inner {
                    payload: Payload::Buffer(Bytes::copy_from_slice(b)),
                }),
            },
            Payload::Object { object, size_hint } => Self::new_object(object.clone(), *size_hint),
        }
    }

    #[must_use]
    pub fn get_format(&self) -> PacketFormat {
        match &self.inner.payload {
            Payload::Buffer(_) => PacketFormat::Buffer,
            Payload::Object { .. } => PacketFormat::Object,
        }
    }

    /// Byte length for a buffer packet, or the advisory memory-cost hint
    /// for an object packet.
    #[must_use]
    pub fn get_size(&self) -> usize {
        match &self.inner.payload {
            Payload::Buffer(b) => b.len(),
            Payload::Object { size_hint, .. } => *size_hint,
        }
    }

    #[must_use]
    pub fn get_data(&self) -> PacketData<'_> {
        match &self.inner.payload {
            Payload::Buffer(b) => PacketData::Buffer(b),
            Payload::Object { object, .. } => PacketData::Object(object.as_ref()),
        }
    }

    /// Convenience accessor: `Some(&[u8])` for buffer packets, `None` otherwise.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.inner.payload {
            Payload::Buffer(b) => Some(b),
            Payload::Object { .. } => None,
        }
    }

    /// Convenience accessor: downcast the object payload to `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match &self.inner.payload {
            Payload::Object { object, .. } => object.downcast_ref::<T>(),
            Payload::Buffer(_) => None,
        }
    }

    /// Number of live references to this packet's shared inner state.
    /// Exposed for the refcount-safety property test.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.payload {
            Payload::Buffer(b) => f
                .debug_struct("Packet")
                .field("format", &PacketFormat::Buffer)
                .field("size", &b.len())
                .finish(),
            Payload::Object { size_hint, .. } => f
                .debug_struct("Packet")
                .field("format", &PacketFormat::Object)
                .field("size_hint", size_hint)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn buffer_roundtrip() {
        let p = Packet::new_buffer(b"hello").unwrap();
        assert_eq!(p.get_format(), PacketFormat::Buffer);
        assert_eq!(p.get_size(), 5);
        match p.get_data() {
            PacketData::Buffer(b) => assert_eq!(b, b"hello"),
            PacketData::Object(_) => panic!("expected buffer"),
        }
    }

    #[test]
    fn within_limit_accepted() {
        let p = Packet::new_buffer(&vec![0u8; 1024]).unwrap();
        assert_eq!(p.get_size(), 1024);
    }

    #[test]
    fn object_copy_is_shallow() {
        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_sub(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(AtomicUsize::new(1));
        let obj = Counted(counter.clone());
        let p1 = Packet::new_take_object(obj, 64);
        let p2 = p1.copy();

        drop(p1);
        assert_eq!(counter.load(Ordering::SeqCst), 1); // p2 still holds the object
        drop(p2);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn refcount_returns_to_baseline() {
        let counter = Arc::new(AtomicUsize::new(5));
        let baseline = Arc::strong_count(&counter);

        let p = Packet::new_take_object(counter.clone(), 8);
        let p2 = p.clone();
        drop(p);
        drop(p2);

        assert_eq!(Arc::strong_count(&counter), baseline);
    }
}
