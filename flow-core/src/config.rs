//! Tunable sizing knobs, in the workspace's `SocketOptions`/`BufferConfig`
//! builder idiom.

/// Per-pipeline / per-shunt configuration.
///
/// # Examples
///
/// ```
/// use flow_core::config::FlowConfig;
///
/// let cfg = FlowConfig::default()
///     .with_io_buffer_size(16 * 1024)
///     .with_queue_limit(1 << 20);
/// assert_eq!(cfg.io_buffer_size, 16 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Maximum bytes moved in one blocking syscall by a shunt worker.
    pub io_buffer_size: usize,

    /// Maximum bytes a shunt queues before exerting backpressure on its peer.
    pub queue_limit: usize,

    /// Maximum bytes queued on a connector's client-facing input pad before
    /// the connector blocks that pad (see the connector backpressure rules).
    pub write_queue_limit: usize,

    /// Maximum packet count queued on a connector's input pad, independent
    /// of byte accounting.
    pub write_queue_packet_cap: usize,

    /// Initial capacity of the staging buffer used to reassemble
    /// fragmented mux headers / segments.
    pub staging_buf_initial_cap: usize,

    /// Number of OS worker threads in the shunt worker pool. `None` means
    /// "use `std::thread::available_parallelism()`".
    pub worker_count: Option<usize>,

    /// Byte limit a splitter retains for a stalled output before it starts
    /// dropping packets destined for that output (see `Splitter`).
    pub splitter_buffer_limit: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            io_buffer_size: 8 * 1024,
            queue_limit: 256 * 1024,
            write_queue_limit: 256 * 1024,
            write_queue_packet_cap: 1024,
            staging_buf_initial_cap: 256,
            worker_count: None,
            splitter_buffer_limit: 1024 * 1024,
        }
    }
}

impl FlowConfig {
    #[must_use]
    pub const fn with_io_buffer_size(mut self, n: usize) -> Self {
        self.io_buffer_size = n;
        self
    }

    #[must_use]
    pub const fn with_queue_limit(mut self, n: usize) -> Self {
        self.queue_limit = n;
        self
    }

    #[must_use]
    pub const fn with_write_queue_limit(mut self, n: usize) -> Self {
        self.write_queue_limit = n;
        self
    }

    #[must_use]
    pub const fn with_write_queue_packet_cap(mut self, n: usize) -> Self {
        self.write_queue_packet_cap = n;
        self
    }

    #[must_use]
    pub const fn with_worker_count(mut self, n: usize) -> Self {
        self.worker_count = Some(n);
        self
    }

    #[must_use]
    pub const fn with_splitter_buffer_limit(mut self, n: usize) -> Self {
        self.splitter_buffer_limit = n;
        self
    }
}
