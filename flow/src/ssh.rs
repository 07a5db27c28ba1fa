//! The SSH master registry: a process-wide table of live `ssh -M` control
//! connections keyed by (host, user), so that repeated command runners
//! against the same endpoint share one authenticated master instead of
//! re-authenticating per command.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flow_core::event::{Code, DetailedEvent, ExecCode};
use flow_shunt::flavors::SubprocessHandle;
use flow_shunt::pool::WorkerPool;
use flow_shunt::shunt::{ShuntHandle, ShuntMessage};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::connector::ConnectorError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MasterKey {
    host: String,
    user: Option<String>,
    port: u16,
}

/// One pending command handed to a master's queue worker.
struct QueuedShellOp {
    command: String,
    reply_tx: flume::Sender<ShuntMessage>,
}

/// A live control-master process plus the control-socket path subsequent
/// command runners pass to `ssh -S`, and the queue that serializes commands
/// against it.
pub struct Master {
    pub control_socket: PathBuf,
    /// Binary invoked for per-command runners against this master. Always
    /// `"ssh"` outside tests; overridable via `master_for_with_program` so
    /// a test can substitute a local stand-in that speaks the same
    /// `-S <socket> host command` shape without a real `sshd`.
    program: String,
    handle: Mutex<SubprocessHandle>,
    queue_tx: flume::Sender<QueuedShellOp>,
    /// True while the queue worker is actively running a command. Purely
    /// observational — ordering is enforced by the queue itself, not this
    /// flag.
    busy: AtomicBool,
}

impl Master {
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Wait for the master's own `ssh -M` process to exit (used by tests
    /// and graceful shutdown; does not affect queued commands).
    pub fn wait(&self) -> std::io::Result<std::process::ExitStatus> {
        self.handle.lock().wait()
    }
}

static REGISTRY: Lazy<Mutex<HashMap<MasterKey, Arc<Master>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fetch the existing master for (host, user, port), or start one.
///
/// # Errors
/// Propagates the `ssh -M` spawn failure if no master exists yet and
/// starting one fails.
pub fn master_for(
    pool: &Arc<WorkerPool>,
    host: &str,
    user: Option<&str>,
    port: u16,
) -> Result<Arc<Master>, ConnectorError> {
    master_for_with_program(pool, "ssh", host, user, port)
}

/// As [`master_for`], but invoking `program` instead of `ssh`. Exists so
/// tests can point the master at a local stand-in that accepts the same
/// `-M -N -S <socket> -p <port> [-l user] host` invocation shape, since
/// spawning a real `sshd` is out of scope for a unit test.
///
/// # Errors
/// Propagates the master's spawn failure if no master exists yet.
pub fn master_for_with_program(
    pool: &Arc<WorkerPool>,
    program: &str,
    host: &str,
    user: Option<&str>,
    port: u16,
) -> Result<Arc<Master>, ConnectorError> {
    let key = MasterKey {
        host: host.to_string(),
        user: user.map(str::to_string),
        port,
    };

    let mut registry = REGISTRY.lock();
    if let Some(master) = registry.get(&key) {
        return Ok(Arc::clone(master));
    }

    let control_socket = std::env::temp_dir().join(format!(
        "flow-ssh-{}-{}-{}.sock",
        key.host,
        key.user.as_deref().unwrap_or("default"),
        std::process::id()
    ));

    let mut args = vec![
        "-M".to_string(),
        "-N".to_string(),
        "-S".to_string(),
        control_socket.to_string_lossy().into_owned(),
        "-p".to_string(),
        port.to_string(),
    ];
    if let Some(user) = user {
        args.push("-l".to_string());
        args.push(user.to_string());
    }
    args.push(host.to_string());

    let (handle, _source, _sink) = SubprocessHandle::spawn(program, &args)?;
    tracing::debug!(host, port, program, "spawned ssh control master");

    let (queue_tx, queue_rx) = flume::unbounded::<QueuedShellOp>();
    let master = Arc::new(Master {
        control_socket,
        program: program.to_string(),
        handle: Mutex::new(handle),
        queue_tx,
        busy: AtomicBool::new(false),
    });

    let worker_master = Arc::clone(&master);
    let worker_pool = Arc::clone(pool);
    pool.spawn(format!("flow-ssh-queue-{}", worker_master.control_socket.display()), move || {
        run_queue_worker(&worker_pool, &worker_master, &queue_rx);
    })
    .map_err(ConnectorError::Flow)?;

    registry.insert(key, Arc::clone(&master));
    Ok(master)
}

/// Enqueue one command against an existing master. Commands queued against
/// the same master run strictly one at a time, in submission order; the
/// returned channel carries the command's stdout (as `ShuntMessage::Data`),
/// its stream-lifecycle events, and finally a `ProcessResult` before
/// `Closed`.
#[must_use]
pub fn submit_command(master: &Arc<Master>, command: &str) -> flume::Receiver<ShuntMessage> {
    let (reply_tx, reply_rx) = flume::unbounded();
    let _ = master.queue_tx.send(QueuedShellOp {
        command: command.to_string(),
        reply_tx,
    });
    reply_rx
}

/// Drains queued commands one at a time for as long as the master (and
/// this thread) is alive, running each as a short-lived `ssh -S <socket>`
/// subprocess bridged through a dedicated shunt so its stdout gets the same
/// segment framing and `ProcessResult` handling as every other subprocess
/// shunt.
fn run_queue_worker(pool: &Arc<WorkerPool>, master: &Arc<Master>, queue_rx: &flume::Receiver<QueuedShellOp>) {
    for queued in queue_rx.iter() {
        master.busy.store(true, Ordering::Release);

        let args = vec![
            "-S".to_string(),
            master.control_socket.to_string_lossy().into_owned(),
            "placeholder-host".to_string(), // ssh ignores the host when -S resolves an existing master
            queued.command.clone(),
        ];

        match SubprocessHandle::spawn(&master.program, &args) {
            Ok((handle, source, sink)) => {
                let on_eof = handle.into_eof_hook();
                match ShuntHandle::spawn(pool, "ssh-cmd", source, sink, 8192, 64, Some(on_eof)) {
                    Ok(shunt) => {
                        for message in shunt.inbound_rx.iter() {
                            let closed = matches!(message, ShuntMessage::Closed);
                            if queued.reply_tx.send(message).is_err() || closed {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to bridge queued ssh command");
                        let _ = queued.reply_tx.send(ShuntMessage::Event(DetailedEvent::new(Code::Exec(ExecCode::RunError))));
                        let _ = queued.reply_tx.send(ShuntMessage::Closed);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to spawn queued ssh command");
                let _ = queued.reply_tx.send(ShuntMessage::Event(DetailedEvent::new(Code::Exec(ExecCode::RunError))));
                let _ = queued.reply_tx.send(ShuntMessage::Closed);
            }
        }

        master.busy.store(false, Ordering::Release);
    }
}
