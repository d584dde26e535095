//! Serial port arbitration broker
//!
//! Several pollers may share one host and one set of serial ports. The
//! broker hands out an exclusive grant, one client at a time, in the order
//! task requests arrived:
//!
//! 1. client connects and sends a task name
//! 2. broker answers `START\n` once the client is at the head of the queue
//! 3. client polls, then sends any bytes (or closes its write half)
//! 4. broker releases the grant and answers `Task '<name>' finished\n`
//!
//! Each connection reads its task name on its own task and only then joins
//! the queue, so a peer that connects and stays silent never holds up the
//! clients behind it. There is no lease timeout: a client that never signals
//! completion holds the grant until its connection drops.

use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8888";

/// Grant message
pub const START: &[u8] = b"START\n";

/// Longest task name read from a client
pub const MAX_TASK_NAME: usize = 1024;

/// Completion byte sent by [`SerialGrant::release`]
const DONE: &[u8] = b"DONE";

/// Broker errors
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Broker not reachable
    #[error("Broker unavailable at {0}")]
    Unavailable(String),

    /// Broker answered something other than `START`
    #[error("Broker refused the grant: {0:?}")]
    Refused(String),

    /// I/O error on the broker connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection early
    #[error("Connection closed")]
    Closed,
}

/// Broker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Listen address
    pub address: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
        }
    }
}

/// Grant counters
#[derive(Debug, Default)]
pub struct BrokerStats {
    grants: AtomicU64,
    completions: AtomicU64,
    holders: AtomicUsize,
    max_holders: AtomicUsize,
}

/// Point-in-time copy of [`BrokerStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Grants issued
    pub grants: u64,
    /// Grants released
    pub completions: u64,
    /// Clients holding a grant now
    pub holders: usize,
    /// Most clients ever holding a grant at once
    pub max_holders: usize,
}

impl BrokerStats {
    fn acquired(&self) {
        self.grants.fetch_add(1, Ordering::SeqCst);
        let now = self.holders.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_holders.fetch_max(now, Ordering::SeqCst);
    }

    fn released(&self) {
        self.holders.fetch_sub(1, Ordering::SeqCst);
        self.completions.fetch_add(1, Ordering::SeqCst);
    }

    /// Copy the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            grants: self.grants.load(Ordering::SeqCst),
            completions: self.completions.load(Ordering::SeqCst),
            holders: self.holders.load(Ordering::SeqCst),
            max_holders: self.max_holders.load(Ordering::SeqCst),
        }
    }
}

/// A queued connection
struct Ticket<S> {
    stream: S,
    peer: String,
    task: String,
    done: oneshot::Sender<Served<S>>,
}

/// A connection whose grant was released
struct Served<S> {
    stream: S,
    task: String,
}

/// TCP arbitration broker
pub struct ArbitrationBroker {
    listener: TcpListener,
    serial_lock: Arc<Mutex<()>>,
    stats: Arc<BrokerStats>,
}

impl ArbitrationBroker {
    /// Bind the listen socket
    pub async fn bind(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let listener = TcpListener::bind(&config.address).await?;
        Ok(Self {
            listener,
            serial_lock: Arc::new(Mutex::new(())),
            stats: Arc::new(BrokerStats::default()),
        })
    }

    /// Bound address
    pub fn local_addr(&self) -> Result<SocketAddr, BrokerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<BrokerStats> {
        self.stats.clone()
    }

    /// Process-wide serial lock held for the duration of each grant
    pub fn serial_lock(&self) -> Arc<Mutex<()>> {
        self.serial_lock.clone()
    }

    /// Run on a background task
    pub fn spawn(self) -> Result<BrokerHandle, BrokerError> {
        let local_addr = self.local_addr()?;
        let stats = self.stats();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            self.run(async move {
                let _ = shutdown_rx.await;
            })
            .await
        });
        Ok(BrokerHandle {
            local_addr,
            stats,
            shutdown: Some(shutdown_tx),
            join,
        })
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<(), BrokerError>
    where
        F: std::future::Future<Output = ()>,
    {
        let (queue, pending) = mpsc::unbounded_channel::<Ticket<TcpStream>>();
        let consumer = tokio::spawn(consume(
            pending,
            self.serial_lock.clone(),
            self.stats.clone(),
        ));
        tracing::info!("Server listening on {}", self.listener.local_addr()?);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!("Connection from {}", peer);
                        tokio::spawn(admit(stream, peer.to_string(), queue.clone()));
                    }
                    Err(e) => tracing::warn!("Accept failed: {}", e),
                },
            }
        }

        tracing::info!("Broker shutting down");
        consumer.abort();
        Ok(())
    }
}

/// Handle to a spawned broker
pub struct BrokerHandle {
    local_addr: SocketAddr,
    stats: Arc<BrokerStats>,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<(), BrokerError>>,
}

impl BrokerHandle {
    /// Bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<BrokerStats> {
        self.stats.clone()
    }

    /// Stop accepting and wait for the accept loop to exit
    pub async fn shutdown(mut self) -> Result<(), BrokerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(BrokerError::Io(std::io::Error::other(e))),
        }
    }
}

/// Per-connection handler: read the task name, queue the connection, then
/// deliver the finish notice once the grant is released
async fn admit<S>(mut stream: S, peer: String, queue: mpsc::UnboundedSender<Ticket<S>>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let task = match read_task(&mut stream).await {
        Ok(task) => task,
        Err(e) => {
            tracing::warn!("{}: {}", peer, e);
            return;
        }
    };
    let (done, finished) = oneshot::channel();
    let ticket = Ticket {
        stream,
        peer,
        task,
        done,
    };
    if queue.send(ticket).is_err() {
        tracing::error!("Grant queue closed");
        return;
    }
    notify(finished).await;
}

/// First read on a connection, trimmed
async fn read_task<S>(stream: &mut S) -> Result<String, BrokerError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; MAX_TASK_NAME];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Err(BrokerError::Closed);
    }
    let task = String::from_utf8_lossy(&buf[..n]).trim().to_string();
    tracing::info!("Received task: {}", task);
    Ok(task)
}

/// Single consumer: grant queued connections one at a time
async fn consume<S>(
    mut pending: mpsc::UnboundedReceiver<Ticket<S>>,
    serial_lock: Arc<Mutex<()>>,
    stats: Arc<BrokerStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    while let Some(Ticket {
        mut stream,
        peer,
        task,
        done,
    }) = pending.recv().await
    {
        match grant(&mut stream, &task, &serial_lock, &stats).await {
            Ok(()) => {
                let _ = done.send(Served { stream, task });
            }
            Err(e) => tracing::warn!("{}: {}", peer, e),
        }
    }
}

/// Hold the lock until the client signals completion
async fn grant<S>(
    stream: &mut S,
    task: &str,
    serial_lock: &Mutex<()>,
    stats: &BrokerStats,
) -> Result<(), BrokerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let guard = serial_lock.lock().await;
    stats.acquired();
    tracing::debug!("Grant issued for '{}'", task);

    let held = async {
        stream.write_all(START).await?;
        stream.flush().await?;
        // any bytes or EOF release the grant
        let mut ack = [0u8; 64];
        stream.read(&mut ack).await
    }
    .await;

    stats.released();
    drop(guard);
    held?;
    tracing::info!("Task '{}' released the serial port", task);
    Ok(())
}

async fn notify<S>(finished: oneshot::Receiver<Served<S>>)
where
    S: AsyncWrite + Unpin,
{
    let Ok(Served { mut stream, task }) = finished.await else {
        return;
    };
    let notice = format!("Task '{}' finished\n", task);
    if let Err(e) = stream.write_all(notice.as_bytes()).await {
        tracing::debug!("Finish notice for '{}' not delivered: {}", task, e);
    }
    let _ = stream.shutdown().await;
}

/// Client half of the broker protocol
#[derive(Debug, Clone)]
pub struct BrokerClient {
    address: String,
}

impl Default for BrokerClient {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

impl BrokerClient {
    /// Client for the broker at `address`
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Broker address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Connect and wait for the grant
    pub async fn acquire(&self, task: &str) -> Result<SerialGrant<TcpStream>, BrokerError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| BrokerError::Unavailable(format!("{} ({})", self.address, e)))?;
        tracing::info!("Connected to broker at {}, waiting for grant", self.address);
        SerialGrant::request(stream, task).await
    }
}

/// An exclusive serial grant; release it when the poll is done
#[derive(Debug)]
pub struct SerialGrant<S> {
    stream: S,
    task: String,
}

impl<S> SerialGrant<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Send `task` over `stream` and wait for `START`
    pub async fn request(mut stream: S, task: &str) -> Result<Self, BrokerError> {
        stream.write_all(task.as_bytes()).await?;
        stream.flush().await?;

        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(BrokerError::Closed);
        }
        let reply = String::from_utf8_lossy(&buf[..n]).trim().to_string();
        if reply != "START" {
            return Err(BrokerError::Refused(reply));
        }
        tracing::info!("Grant received for '{}'", task);
        Ok(Self {
            stream,
            task: task.to_string(),
        })
    }

    /// Task name the grant was requested for
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Signal completion and return the broker's finish notice
    pub async fn release(mut self) -> Result<String, BrokerError> {
        self.stream.write_all(DONE).await?;
        self.stream.flush().await?;
        let mut notice = String::new();
        self.stream.read_to_string(&mut notice).await?;
        let notice = notice.trim().to_string();
        tracing::info!("{}", notice);
        Ok(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_client_protocol() {
        let stream = Builder::new()
            .write(b"check modules")
            .read(b"START\n")
            .write(DONE)
            .read(b"Task 'check modules' finished\n")
            .build();

        let grant = SerialGrant::request(stream, "check modules").await.unwrap();
        assert_eq!(grant.task(), "check modules");
        let notice = grant.release().await.unwrap();
        assert_eq!(notice, "Task 'check modules' finished");
    }

    #[tokio::test]
    async fn test_client_refused() {
        let stream = Builder::new().write(b"dvi").read(b"BUSY\n").build();
        let err = SerialGrant::request(stream, "dvi").await.unwrap_err();
        assert!(matches!(err, BrokerError::Refused(ref r) if r == "BUSY"));
    }

    #[tokio::test]
    async fn test_client_closed_before_grant() {
        let stream = Builder::new().write(b"dvi").build();
        let err = SerialGrant::request(stream, "dvi").await.unwrap_err();
        assert!(matches!(err, BrokerError::Closed));
    }

    #[tokio::test]
    async fn test_read_task_trims() {
        let mut stream = Builder::new().read(b"  voltage\n").build();
        assert_eq!(read_task(&mut stream).await.unwrap(), "voltage");

        let mut closed = Builder::new().build();
        assert!(matches!(read_task(&mut closed).await, Err(BrokerError::Closed)));
    }

    #[tokio::test]
    async fn test_grant_releases_on_eof() {
        let mut stream = Builder::new().write(START).build();
        let lock = Mutex::new(());
        let stats = BrokerStats::default();

        grant(&mut stream, "voltage", &lock, &stats).await.unwrap();
        assert!(lock.try_lock().is_ok());
        let snap = stats.snapshot();
        assert_eq!((snap.grants, snap.completions, snap.holders), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_consumer_serves_in_queue_order() {
        let (queue, pending) = mpsc::unbounded_channel();
        let mut finished = Vec::new();
        for name in ["first", "second"] {
            let stream = Builder::new().write(START).read(DONE).build();
            let (done, rx) = oneshot::channel();
            let ticket = Ticket {
                stream,
                peer: name.to_string(),
                task: name.to_string(),
                done,
            };
            queue.send(ticket).unwrap();
            finished.push(rx);
        }
        drop(queue);

        let stats = Arc::new(BrokerStats::default());
        consume(pending, Arc::new(Mutex::new(())), stats.clone()).await;

        let mut order = Vec::new();
        for rx in finished {
            order.push(rx.await.unwrap().task);
        }
        assert_eq!(order, vec!["first", "second"]);
        assert_eq!(stats.snapshot().max_holders, 1);
    }

    #[tokio::test]
    async fn test_admit_queues_after_task_name() {
        let (queue, mut pending) = mpsc::unbounded_channel();
        let stream = Builder::new()
            .read(b"check dvi")
            .write(b"Task 'check dvi' finished\n")
            .build();
        let handler = tokio::spawn(admit(stream, "peer".to_string(), queue));

        let ticket = pending.recv().await.unwrap();
        assert_eq!(ticket.task, "check dvi");
        let _ = ticket.done.send(Served {
            stream: ticket.stream,
            task: ticket.task,
        });
        handler.await.unwrap();
    }

    #[test]
    fn test_default_address() {
        assert_eq!(BrokerConfig::default().address, "127.0.0.1:8888");
        assert_eq!(BrokerClient::default().address(), DEFAULT_ADDRESS);
    }
}
