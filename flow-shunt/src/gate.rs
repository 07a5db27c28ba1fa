//! A park/unpark gate for `block_reads`/`block_writes`: cheap to check on
//! every loop iteration, and wakes the blocked worker thread immediately
//! when lifted rather than making it poll.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct Gate {
    blocked: Mutex<bool>,
    condvar: Condvar,
}

impl Gate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self) {
        *self.blocked.lock().unwrap() = true;
    }

    pub fn unblock(&self) {
        *self.blocked.lock().unwrap() = false;
        self.condvar.notify_all();
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        *self.blocked.lock().unwrap()
    }

    /// Block the caller until the gate opens or `timeout` elapses, whichever
    /// comes first. A bounded wait (rather than an unconditional one) lets
    /// the worker loop periodically re-check its shutdown flag.
    pub fn wait_until_open(&self, timeout: Duration) {
        let guard = self.blocked.lock().unwrap();
        if !*guard {
            return;
        }
        let _ = self
            .condvar
            .wait_timeout_while(guard, timeout, |blocked| *blocked)
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn unblock_wakes_waiter_promptly() {
        let gate = Arc::new(Gate::new());
        gate.block();

        let waiter_gate = Arc::clone(&gate);
        let handle = std::thread::spawn(move || {
            waiter_gate.wait_until_open(Duration::from_secs(5));
        });

        std::thread::sleep(Duration::from_millis(20));
        gate.unblock();
        handle.join().unwrap();
    }

    #[test]
    fn open_gate_never_blocks() {
        let gate = Gate::new();
        gate.wait_until_open(Duration::from_secs(5));
    }
}
