//! Element logic: the behavior a node in the graph applies to packets that
//! arrive on its input pads.

use std::collections::HashMap;

use crate::event::PropertyEvent;
use crate::packet::Packet;
use crate::pad::PadId;

/// Collects the packets an [`ElementLogic`] callback wants emitted on its
/// own output pads. The graph drains this after the callback returns and
/// routes each emission to the connected peer, rather than letting logic
/// recurse into the graph directly — this is what keeps `Graph::push`'s
/// recursion depth bounded regardless of chain length.
#[derive(Default)]
pub struct OutputSink {
    emissions: Vec<(PadId, Packet)>,
}

impl OutputSink {
    pub fn push(&mut self, output: PadId, packet: Packet) {
        self.emissions.push((output, packet));
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, (PadId, Packet)> {
        self.emissions.drain(..)
    }
}

/// The behavior attached to an element node. One instance owns all of that
/// element's input/output pad logic; the graph tells it which pad a packet
/// arrived on and lets it decide what (if anything) to emit.
pub trait ElementLogic: Send {
    fn process_input(&mut self, input: PadId, packet: Packet, out: &mut OutputSink);

    /// Called when a previously blocked output pad becomes writable again,
    /// so elements holding back data (e.g. a splitter that stalled a slow
    /// output) get a chance to flush it.
    fn output_pad_unblocked(&mut self, _output: PadId, _out: &mut OutputSink) {}

    /// Called when an output pad's peer signals backpressure.
    fn output_pad_blocked(&mut self, _output: PadId) {}

    /// Apply a property broadcast addressed to this element (or its class).
    fn handle_property_event(&mut self, _event: &PropertyEvent) {}
}

/// The simplest element shape: one input, one output, pass every packet
/// through unchanged. Used directly by connectors that don't transform
/// their payload (e.g. a raw TCP connector's graph-facing side).
#[derive(Default)]
pub struct Simplex {
    pub output: Option<PadId>,
}

impl ElementLogic for Simplex {
    fn process_input(&mut self, _input: PadId, packet: Packet, out: &mut OutputSink) {
        if let Some(output) = self.output {
            out.push(output, packet);
        }
    }
}

/// Fans one input out to every connected output, per-output, with a
/// buffer-limit drop policy: if a given output's staged backlog exceeds
/// `buffer_limit` bytes, further packets destined for *that* output alone
/// are dropped until it drains — other outputs keep receiving normally.
/// This is the open-question resolution recorded in the design notes: drop
/// at the slow output, preserve delivery order at the rest.
pub struct Splitter {
    pub outputs: Vec<PadId>,
    buffer_limit: usize,
    backlog: HashMap<PadId, usize>,
}

impl Splitter {
    #[must_use]
    pub fn new(buffer_limit: usize) -> Self {
        Self {
            outputs: Vec::new(),
            buffer_limit,
            backlog: HashMap::new(),
        }
    }

    pub fn add_output(&mut self, pad: PadId) {
        self.outputs.push(pad);
        self.backlog.insert(pad, 0);
    }

    /// Called by the graph once a packet delivered to `output` has actually
    /// been consumed downstream, to drain this element's notion of backlog.
    pub fn acknowledge_drain(&mut self, output: PadId, bytes: usize) {
        if let Some(backlog) = self.backlog.get_mut(&output) {
            *backlog = backlog.saturating_sub(bytes);
        }
    }
}

impl ElementLogic for Splitter {
    fn process_input(&mut self, _input: PadId, packet: Packet, out: &mut OutputSink) {
        let size = packet.get_size();
        for &output in &self.outputs {
            let backlog = self.backlog.entry(output).or_insert(0);
            if *backlog > self.buffer_limit {
                tracing::warn!(output = output.index(), backlog, "splitter dropping packet for stalled output");
                continue; // slow output: drop, preserve order for the rest
            }
            *backlog += size;
            out.push(output, packet.copy());
        }
    }

    fn output_pad_blocked(&mut self, output: PadId) {
        self.backlog.entry(output).or_insert(0);
    }

    /// Once a stalled output unblocks, its backlog no longer reflects
    /// anything actually queued downstream — reset it so the drop policy is
    /// recoverable rather than permanent.
    fn output_pad_unblocked(&mut self, output: PadId, _out: &mut OutputSink) {
        self.acknowledge_drain(output, usize::MAX);
    }
}

/// Merges every input pad onto a single output pad in arrival order. Since
/// the dispatch loop is single-threaded and cooperative, "arrival order" is
/// simply "the order `process_input` was invoked" — no interleaving lock is
/// needed.
#[derive(Default)]
pub struct Joiner {
    pub output: Option<PadId>,
}

impl ElementLogic for Joiner {
    fn process_input(&mut self, _input: PadId, packet: Packet, out: &mut OutputSink) {
        if let Some(output) = self.output {
            out.push(output, packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    fn fake_pad_id() -> PadId {
        let owner = Arena::<crate::graph::ElementSlot>::dangling_id();
        let mut arena: Arena<crate::pad::Pad> = Arena::new();
        arena.insert(crate::pad::Pad::new(
            owner,
            crate::pad::Direction::Output,
            "out",
        ))
    }

    #[test]
    fn simplex_forwards_untouched() {
        let out_pad = fake_pad_id();
        let mut simplex = Simplex {
            output: Some(out_pad),
        };
        let mut sink = OutputSink::default();
        let packet = Packet::new_buffer(b"hi").unwrap();
        simplex.process_input(out_pad, packet, &mut sink);

        let emitted: Vec<_> = sink.drain().collect();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, out_pad);
    }

    #[test]
    fn splitter_drops_only_on_stalled_output() {
        let fast = fake_pad_id();
        let slow = fake_pad_id();
        let mut splitter = Splitter::new(10);
        splitter.add_output(fast);
        splitter.add_output(slow);

        // Stall `slow` by pretending its backlog is already over the limit.
        splitter.backlog.insert(slow, 100);

        let mut sink = OutputSink::default();
        let packet = Packet::new_buffer(b"data").unwrap();
        splitter.process_input(fast, packet, &mut sink);

        let emitted: Vec<_> = sink.drain().map(|(p, _)| p).collect();
        assert_eq!(emitted, vec![fast]); // only the unstalled output got a copy
    }

    #[test]
    fn splitter_resumes_a_stalled_output_after_unblock() {
        let fast = fake_pad_id();
        let slow = fake_pad_id();
        let mut splitter = Splitter::new(10);
        splitter.add_output(fast);
        splitter.add_output(slow);
        splitter.backlog.insert(slow, 100);

        let mut sink = OutputSink::default();
        splitter.process_input(fast, Packet::new_buffer(b"data").unwrap(), &mut sink);
        assert_eq!(sink.drain().map(|(p, _)| p).collect::<Vec<_>>(), vec![fast]);

        // Once `slow` unblocks, its backlog must reset so it isn't
        // permanently excluded from future replication.
        let mut unblock_sink = OutputSink::default();
        splitter.output_pad_unblocked(slow, &mut unblock_sink);

        let mut sink2 = OutputSink::default();
        splitter.process_input(fast, Packet::new_buffer(b"more").unwrap(), &mut sink2);
        let emitted: std::collections::HashSet<_> = sink2.drain().map(|(p, _)| p).collect();
        assert!(emitted.contains(&fast));
        assert!(emitted.contains(&slow));
    }
}
