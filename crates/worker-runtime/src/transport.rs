//! # Unix Socket Transport
//!
//! Exposes [`WorkerService`] on a Unix domain socket.
//!
//! ## Framing
//!
//! Newline-delimited JSON. Clients write `Envelope<WorkerRequest>` lines;
//! the server writes `ServerFrame` lines, responses and notifications
//! interleaved on the same connection.
//!
//! A request line longer than the configured limit is answered with a
//! protocol error (correlation id 0) and the connection is closed. The
//! line is never buffered past the limit.
//!
//! ## Identity
//!
//! ```text
//! accept() ──→ SO_PEERCRED uid ──→ CallerIdentity { uid, session }
//!                                        │
//!                 every request on this connection uses it
//! ```
//!
//! The uid is read once from the kernel when the connection is accepted.
//! Each connection is one session, the routing key for per-transaction
//! notifications.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shared_bus::{EventFilter, InMemoryEventBus};
use shared_types::{
    error_codes, CallerIdentity, Envelope, IpcError, ServerFrame, SessionId, WorkerRequest,
    WorkerResponse,
};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};
use worker_telemetry::SESSIONS_CONNECTED;

use crate::config::DEFAULT_MAX_FRAME_BYTES;
use crate::service::WorkerService;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Listening socket plus what each connection needs.
pub struct SocketServer {
    listener: UnixListener,
    path: PathBuf,
    service: Arc<WorkerService>,
    bus: Arc<InMemoryEventBus>,
    next_session: Arc<AtomicU64>,
    max_frame_bytes: usize,
}

impl SocketServer {
    /// Bind `path`, replacing a stale socket file. Call only while holding
    /// the instance lock.
    pub fn bind(
        path: &Path,
        service: Arc<WorkerService>,
        bus: Arc<InMemoryEventBus>,
    ) -> Result<Self, TransportError> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let listener = UnixListener::bind(path)?;
        // Unprivileged clients connect; authorization happens per request
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o666))?;
        info!(path = %path.display(), "Listening");

        Ok(Self {
            listener,
            path: path.to_path_buf(),
            service,
            bus,
            next_session: Arc::new(AtomicU64::new(1)),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        })
    }

    /// Longest request line accepted from a client.
    #[must_use]
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `stop_accepting` fires, then remove the
    /// socket file. Open sessions stay up until `close_sessions` fires so
    /// their clients see in-flight work finish.
    pub async fn run(
        self,
        mut stop_accepting: watch::Receiver<bool>,
        close_sessions: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => self.spawn_connection(stream, close_sessions.clone()),
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                _ = stop_accepting.changed() => break,
            }
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(error = %e, "Socket file already gone");
        }
        info!("Stopped accepting connections");
    }

    fn spawn_connection(&self, stream: UnixStream, shutdown: watch::Receiver<bool>) {
        let uid = match stream.peer_cred() {
            Ok(cred) => cred.uid(),
            Err(e) => {
                warn!(error = %e, "Peer credentials unavailable, dropping connection");
                return;
            }
        };
        let n = self.next_session.fetch_add(1, Ordering::Relaxed);
        let caller = CallerIdentity::new(uid, SessionId::new(format!(":1.{n}")));
        let service = self.service.clone();
        let bus = self.bus.clone();
        let max_frame_bytes = self.max_frame_bytes;

        tokio::spawn(async move {
            info!(uid, session = %caller.session, "Client connected");
            SESSIONS_CONNECTED.inc();
            let result =
                serve_connection(stream, &caller, &service, &bus, max_frame_bytes, shutdown).await;
            SESSIONS_CONNECTED.dec();
            match result {
                Ok(()) => info!(session = %caller.session, "Client disconnected"),
                Err(e) => {
                    warn!(session = %caller.session, error = %e, "Connection closed with error")
                }
            }
        });
    }
}

async fn serve_connection(
    stream: UnixStream,
    caller: &CallerIdentity,
    service: &WorkerService,
    bus: &InMemoryEventBus,
    max_frame_bytes: usize,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError> {
    let mut events = bus.subscribe(EventFilter::for_session(caller.session.clone()));
    let (reader, mut writer) = stream.into_split();
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(max_frame_bytes));

    loop {
        // Pending notifications are written before a close is honoured
        tokio::select! {
            biased;

            Some(event) = events.next() => {
                if let Some(notification) = event.to_notification() {
                    write_frame(&mut writer, &ServerFrame::Notification(notification)).await?;
                }
            }
            line = lines.next() => {
                let line = match line {
                    None => return Ok(()),
                    Some(Ok(line)) => line,
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!(
                            session = %caller.session,
                            limit = max_frame_bytes,
                            "Request frame too large, closing connection"
                        );
                        let error = IpcError::new(
                            error_codes::PROTOCOL,
                            format!("request frame exceeds {max_frame_bytes} bytes"),
                        );
                        let frame =
                            ServerFrame::Response(Envelope::new(0, WorkerResponse::Error(error)));
                        write_frame(&mut writer, &frame).await?;
                        return Ok(());
                    }
                    Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
                };
                if line.trim().is_empty() {
                    continue;
                }
                let frame = handle_line(service, caller, &line).await;
                write_frame(&mut writer, &frame).await?;
            }
            _ = shutdown.changed() => return Ok(()),
        }
    }
}

/// Decode one request line and produce its response frame.
pub async fn handle_line(
    service: &WorkerService,
    caller: &CallerIdentity,
    line: &str,
) -> ServerFrame {
    let request: Envelope<WorkerRequest> = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            // Echo the correlation id when the frame got that far
            let correlation_id = serde_json::from_str::<serde_json::Value>(line)
                .ok()
                .and_then(|v| v.get("correlation_id").and_then(serde_json::Value::as_u64))
                .unwrap_or(0);
            debug!(session = %caller.session, error = %e, "Malformed request");
            return ServerFrame::Response(Envelope::new(
                correlation_id,
                WorkerResponse::Error(IpcError::new(error_codes::PROTOCOL, e.to_string())),
            ));
        }
    };

    if let Err(e) = request.check_version() {
        let error = IpcError::new(error_codes::PROTOCOL, e.to_string());
        return ServerFrame::Response(request.reply(WorkerResponse::Error(error)));
    }

    let correlation_id = request.correlation_id;
    let response = service.handle(caller, request.payload).await;
    ServerFrame::Response(Envelope::new(correlation_id, response))
}

async fn write_frame<W>(writer: &mut W, frame: &ServerFrame) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
