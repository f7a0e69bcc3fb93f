//! Worker socket client.

use std::collections::VecDeque;
use std::path::Path;

use shared_types::{
    Envelope, IpcError, ServerFrame, TransactionId, TransactionStatus, WorkerNotification,
    WorkerRequest, WorkerResponse,
};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

/// Errors that can occur when talking to the worker.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to {path}: {source}")]
    Connection {
        path: String,
        source: std::io::Error,
    },
    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("worker closed the connection")]
    Closed,
    #[error("worker error {0}")]
    Worker(IpcError),
    #[error("unexpected response: {0:?}")]
    Unexpected(Box<WorkerResponse>),
}

/// One connection, i.e. one session, to the worker.
///
/// Notifications that arrive while waiting for a response are kept and
/// handed out by [`WorkerClient::next_notification`] in arrival order.
pub struct WorkerClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    next_id: u64,
    backlog: VecDeque<WorkerNotification>,
}

impl WorkerClient {
    pub async fn connect(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| ClientError::Connection {
                path: path.display().to_string(),
                source,
            })?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
            next_id: 1,
            backlog: VecDeque::new(),
        })
    }

    /// Send a request and wait for its response. Protocol-level error
    /// responses are returned as `ClientError::Worker`.
    pub async fn call(&mut self, request: WorkerRequest) -> Result<WorkerResponse, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let mut line = serde_json::to_vec(&Envelope::new(id, request))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;

        loop {
            match self.read_frame().await? {
                ServerFrame::Response(reply) if reply.correlation_id == id => {
                    return match reply.payload {
                        WorkerResponse::Error(e) => Err(ClientError::Worker(e)),
                        other => Ok(other),
                    };
                }
                ServerFrame::Response(_) => continue,
                ServerFrame::Notification(n) => self.backlog.push_back(n),
            }
        }
    }

    /// Submit a transaction request.
    pub async fn submit(&mut self, request: WorkerRequest) -> Result<TransactionId, ClientError> {
        match self.call(request).await? {
            WorkerResponse::TransactionId(id) => Ok(id),
            other => Err(ClientError::Unexpected(Box::new(other))),
        }
    }

    /// Call a request answered with a boolean.
    pub async fn call_bool(&mut self, request: WorkerRequest) -> Result<bool, ClientError> {
        match self.call(request).await? {
            WorkerResponse::Bool(ok) => Ok(ok),
            other => Err(ClientError::Unexpected(Box::new(other))),
        }
    }

    /// Next notification, from the backlog first.
    pub async fn next_notification(&mut self) -> Result<WorkerNotification, ClientError> {
        if let Some(n) = self.backlog.pop_front() {
            return Ok(n);
        }
        loop {
            if let ServerFrame::Notification(n) = self.read_frame().await? {
                return Ok(n);
            }
        }
    }

    /// Follow notifications for `id` until it reaches a terminal status,
    /// passing each one to `on_event`.
    pub async fn wait_for<F>(
        &mut self,
        id: TransactionId,
        mut on_event: F,
    ) -> Result<TransactionStatus, ClientError>
    where
        F: FnMut(&WorkerNotification),
    {
        loop {
            let notification = self.next_notification().await?;
            let status = match &notification {
                WorkerNotification::TransactionStatusChanged { id: tx, status, .. } if *tx == id => {
                    Some(*status)
                }
                WorkerNotification::TransactionProgress { id: tx, .. } if *tx == id => None,
                _ => continue,
            };
            on_event(&notification);
            if let Some(status) = status.filter(TransactionStatus::is_terminal) {
                return Ok(status);
            }
        }
    }

    async fn read_frame(&mut self) -> Result<ServerFrame, ClientError> {
        loop {
            let line = self.lines.next_line().await?.ok_or(ClientError::Closed)?;
            if !line.trim().is_empty() {
                return Ok(serde_json::from_str(&line)?);
            }
        }
    }
}
