//! Command listener
//!
//! The server side of the dispatch protocol: accepts one request line per
//! connection, validates it against the server's command catalog, queues the
//! rendered command for the addressed device and answers with one reply line.

use async_std::channel::Receiver;
use async_std::io::BufReader;
use async_std::io::prelude::*;
use async_std::net::{TcpListener, TcpStream, ToSocketAddrs};
use async_std::task;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Duration;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use super::protocol::CommandRequest;
use super::result::{CommandResponse, RESPONSE_SERVER, ResultCode};
use crate::config::{DEFAULT_DISPATCH_TIMEOUT, DEFAULT_PENDING_PER_DEVICE, MAX_LINE_LENGTH};
use crate::server::ServerConfig;
use crate::utils::error::{DcsError, Result};

/// A validated command waiting for its device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub account: String,
    pub device: String,
    pub command: String,
    pub text: String,
    pub queued_at: DateTime<Utc>,
}

/// Per-device FIFO of pending commands
///
/// Each device keeps at most `capacity` commands; a push beyond that drops
/// the oldest one.
#[derive(Debug)]
pub struct PendingQueue {
    queues: Mutex<HashMap<(String, String), VecDeque<PendingCommand>>>,
    capacity: usize,
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PENDING_PER_DEVICE)
    }
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, cmd: PendingCommand) -> bool {
        match self.queues.lock() {
            Ok(mut queues) => {
                let queue = queues
                    .entry((cmd.account.clone(), cmd.device.clone()))
                    .or_default();
                while queue.len() >= self.capacity {
                    if let Some(dropped) = queue.pop_front() {
                        warn!(
                            "[{}/{}] Pending queue full, dropped '{}' queued at {}",
                            dropped.account, dropped.device, dropped.command, dropped.queued_at
                        );
                    }
                }
                queue.push_back(cmd);
                true
            }
            Err(_) => {
                error!("Pending command queue lock poisoned");
                false
            }
        }
    }

    /// Remove and return everything queued for one device, oldest first
    pub fn take(&self, account: &str, device: &str) -> Vec<PendingCommand> {
        let Ok(mut queues) = self.queues.lock() else {
            return Vec::new();
        };
        queues
            .remove(&(account.to_string(), device.to_string()))
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Total number of queued commands
    pub fn len(&self) -> usize {
        self.queues
            .lock()
            .map(|q| q.values().map(VecDeque::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Checks requests against one server's command catalog
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    dcs: ServerConfig,
}

impl CommandEvaluator {
    pub fn new(dcs: ServerConfig) -> Self {
        Self { dcs }
    }

    pub fn server(&self) -> &ServerConfig {
        &self.dcs
    }

    /// Validate a request and render its command text
    pub fn evaluate(&self, request: &CommandRequest) -> std::result::Result<PendingCommand, ResultCode> {
        let account = request.account.trim();
        let device = request.device.trim();
        let name = request.cmd_name.trim();

        if account.is_empty() && device.is_empty() && name.is_empty() {
            return Err(ResultCode::EmptyRequest);
        }
        if account.is_empty() {
            return Err(ResultCode::InvalidAccount);
        }
        if device.is_empty() {
            return Err(ResultCode::InvalidDevice);
        }
        let command = self.dcs.command(name).ok_or(ResultCode::InvalidCommand)?;
        if !command.matches_type(&request.cmd_type) {
            return Err(ResultCode::InvalidType);
        }
        if request.args.len() < command.required_arg_count() {
            return Err(ResultCode::InvalidArg);
        }

        Ok(PendingCommand {
            account: account.to_string(),
            device: device.to_string(),
            command: command.name.clone(),
            text: command.render(&request.arg_refs()),
            queued_at: Utc::now(),
        })
    }

    /// Evaluate, queue on success, and build the reply
    pub fn handle(&self, request: &CommandRequest, queue: &PendingQueue) -> CommandResponse {
        let code = match self.evaluate(request) {
            Ok(pending) => {
                info!(
                    "[{}] Queued '{}' for {}/{}",
                    self.dcs.name(),
                    pending.command,
                    pending.account,
                    pending.device
                );
                if queue.push(pending) {
                    ResultCode::Success
                } else {
                    ResultCode::InternalError
                }
            }
            Err(code) => {
                warn!("[{}] Rejected command request: {}", self.dcs.name(), code);
                code
            }
        };
        CommandResponse::with_result([(RESPONSE_SERVER, self.dcs.name())], code)
    }
}

/// TCP listener serving one server's control endpoint
pub struct CommandListener {
    listener: TcpListener,
    evaluator: Arc<CommandEvaluator>,
    queue: Arc<PendingQueue>,
    read_timeout: Duration,
}

impl CommandListener {
    /// Bind on the server's dispatch host and port
    pub async fn bind(dcs: ServerConfig, queue: Arc<PendingQueue>) -> Result<Self> {
        let port = dcs.dispatch_port().ok_or_else(|| {
            DcsError::InvalidArguments(format!("DCServer '{}' has no dispatch port", dcs.name()))
        })?;
        let host = dcs.dispatch_host();
        Self::bind_to((host.as_str(), port), dcs, queue).await
    }

    pub async fn bind_to<A: ToSocketAddrs>(addr: A, dcs: ServerConfig, queue: Arc<PendingQueue>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "[{}] Command listener on {}",
            dcs.name(),
            listener.local_addr()?
        );
        Ok(Self {
            listener,
            evaluator: Arc::new(CommandEvaluator::new(dcs)),
            queue,
            read_timeout: DEFAULT_DISPATCH_TIMEOUT,
        })
    }

    /// Time a client gets to send its request line before it is dropped
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn queue(&self) -> &Arc<PendingQueue> {
        &self.queue
    }

    /// Accept connections until a shutdown message arrives
    ///
    /// # Arguments
    /// * `shutdown_rx` - Receiver for shutdown signal
    pub async fn run(&self, shutdown_rx: Receiver<()>) -> Result<()> {
        loop {
            futures::select! {
                conn = self.listener.accept().fuse() => {
                    match conn {
                        Ok((stream, peer)) => {
                            debug!("Command connection from {}", peer);
                            let evaluator = Arc::clone(&self.evaluator);
                            let queue = Arc::clone(&self.queue);
                            let read_timeout = self.read_timeout;
                            task::spawn(async move {
                                if let Err(e) = handle_connection(stream, &evaluator, &queue, read_timeout).await {
                                    error!("Error handling command connection from {}: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Error accepting command connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv().fuse() => {
                    info!("Shutdown signal received, stopping command listener");
                    break;
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    evaluator: &CommandEvaluator,
    queue: &PendingQueue,
    read_timeout: Duration,
) -> Result<()> {
    let mut line = String::new();
    let mut reader = BufReader::new((&stream).take(MAX_LINE_LENGTH as u64));
    let read = match async_std::future::timeout(read_timeout, reader.read_line(&mut line)).await {
        Ok(read) => read?,
        Err(_) => {
            warn!("No command request within {:?}, closing connection", read_timeout);
            return Ok(());
        }
    };
    if read == 0 {
        debug!("Command connection closed without a request");
        return Ok(());
    }

    let request = CommandRequest::decode(&line);
    let reply = evaluator.handle(&request, queue);

    let mut writer = &stream;
    writer.write_all(reply.encode().as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
