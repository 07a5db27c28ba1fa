//! Byte-based backpressure: the limiter behind every blockable output pad.
//!
//! Backpressure scales with bytes, not message count, so one oversized
//! packet can't starve a pipeline, and it's synchronous: the dispatch loop
//! never awaits, it polls a boolean and lets the caller's propagation
//! engine react.

/// Tracks bytes outstanding against a limit and reports whether the limit is
/// currently exceeded. Pure bookkeeping; applying the resulting block/unblock
/// transition to a pad is the caller's job (see `graph::Graph::push`).
#[derive(Debug, Clone, Copy)]
pub struct ByteLimiter {
    limit: usize,
    outstanding: usize,
}

impl ByteLimiter {
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            outstanding: 0,
        }
    }

    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub const fn is_over_limit(&self) -> bool {
        self.outstanding > self.limit
    }

    /// Record `n` more outstanding bytes. Returns `true` if this push is the
    /// one that crosses the limit (the edge the caller should react to by
    /// blocking the upstream pad).
    pub fn add(&mut self, n: usize) -> bool {
        let was_over = self.is_over_limit();
        self.outstanding += n;
        !was_over && self.is_over_limit()
    }

    /// Record `n` fewer outstanding bytes (a drain). Returns `true` if this
    /// drain is the one that brings the count back under the limit.
    pub fn remove(&mut self, n: usize) -> bool {
        let was_over = self.is_over_limit();
        self.outstanding = self.outstanding.saturating_sub(n);
        was_over && !self.is_over_limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_limit_reports_edge_once() {
        let mut lim = ByteLimiter::new(100);
        assert!(!lim.add(50));
        assert!(lim.add(60)); // 110 > 100: crosses here
        assert!(!lim.add(10)); // already over, no new edge
    }

    #[test]
    fn draining_back_under_reports_edge_once() {
        let mut lim = ByteLimiter::new(100);
        lim.add(150);
        assert!(lim.is_over_limit());

        assert!(!lim.remove(10)); // 140 left, still over
        assert!(lim.remove(45)); // 95 left, crosses back under
        assert!(!lim.remove(10)); // already under, no new edge
    }

    #[test]
    fn backpressure_law_blocks_exactly_while_over_limit() {
        // Testable property #4: an input pad is blocked if and only if its
        // outstanding bytes exceed the configured limit.
        let mut lim = ByteLimiter::new(10);
        let mut blocked = false;

        for delta in [5i64, 10, -3, -20, 30, -30] {
            if delta >= 0 {
                if lim.add(delta as usize) {
                    blocked = true;
                }
            } else if lim.remove((-delta) as usize) {
                blocked = false;
            }
            assert_eq!(blocked, lim.is_over_limit());
        }
    }
}
