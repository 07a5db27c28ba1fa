//! The `Serializable`/`Deserializable` contract: any type that needs to
//! cross a mux channel as a byte stream rather than as a whole object
//! implements this incremental begin/step/end protocol instead of a
//! single blocking encode call, so encoding large payloads never stalls
//! the dispatch loop.

/// Incremental serialization: `step` is called repeatedly, each time
/// writing as much as fits into `out`, until it reports `Done`.
pub trait Serializable {
    /// Per-instance state threaded across `step` calls.
    type State: Default;

    /// Write up to `out.len()` bytes, returning how many were written and
    /// whether more remain.
    fn step(&self, state: &mut Self::State, out: &mut [u8]) -> (usize, StepOutcome);
}

/// Incremental deserialization: `step` consumes from `input`, building the
/// target value up until it reports completion.
pub trait Deserializable: Sized {
    type State: Default;

    /// Consume a prefix of `input`, returning how many bytes were consumed
    /// and the current outcome. On `Done`, the caller may call `finish`.
    fn step(state: &mut Self::State, input: &[u8]) -> (usize, StepOutcome);

    /// Extract the fully assembled value. Only meaningful after `step` has
    /// reported `StepOutcome::Done`.
    fn finish(state: Self::State) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// More data is needed (more output space for serialize, more input
    /// bytes for deserialize) before this can progress further.
    NeedMore,
    /// The value has been fully serialized/deserialized.
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    #[derive(Default)]
    struct CounterState {
        bytes_written: usize,
    }

    impl Serializable for Counter {
        type State = CounterState;

        fn step(&self, state: &mut Self::State, out: &mut [u8]) -> (usize, StepOutcome) {
            let full = self.0.to_be_bytes();
            let remaining = &full[state.bytes_written..];
            let take = remaining.len().min(out.len());
            out[..take].copy_from_slice(&remaining[..take]);
            state.bytes_written += take;
            let outcome = if state.bytes_written == full.len() {
                StepOutcome::Done
            } else {
                StepOutcome::NeedMore
            };
            (take, outcome)
        }
    }

    #[derive(Default)]
    struct CounterDeState {
        buf: Vec<u8>,
    }

    impl Deserializable for Counter {
        type State = CounterDeState;

        fn step(state: &mut Self::State, input: &[u8]) -> (usize, StepOutcome) {
            let need = 4 - state.buf.len();
            let take = need.min(input.len());
            state.buf.extend_from_slice(&input[..take]);
            let outcome = if state.buf.len() == 4 {
                StepOutcome::Done
            } else {
                StepOutcome::NeedMore
            };
            (take, outcome)
        }

        fn finish(state: Self::State) -> Self {
            Self(u32::from_be_bytes(state.buf.try_into().unwrap()))
        }
    }

    #[test]
    fn serializes_in_fragments_and_reassembles() {
        let value = Counter(0xDEAD_BEEF);
        let mut state = CounterState::default();
        let mut wire = Vec::new();
        let mut scratch = [0u8; 1]; // force fragmentation, one byte at a time

        loop {
            let (n, outcome) = value.step(&mut state, &mut scratch);
            wire.extend_from_slice(&scratch[..n]);
            if outcome == StepOutcome::Done {
                break;
            }
        }
        assert_eq!(wire, 0xDEAD_BEEFu32.to_be_bytes());

        let mut de_state = CounterDeState::default();
        let mut offset = 0;
        loop {
            let (n, outcome) = Counter::step(&mut de_state, &wire[offset..]);
            offset += n;
            if outcome == StepOutcome::Done {
                break;
            }
        }
        let rebuilt = Counter::finish(de_state);
        assert_eq!(rebuilt.0, 0xDEAD_BEEF);
    }
}
