//! Background I/O session.
//!
//! One OS thread drives a current-thread tokio runtime with three long-lived
//! tasks:
//!
//! - beacon listener: waits for `BECN` datagrams against the beacon deadline
//!   and runs the connection state machine;
//! - unicast receiver: one per discovered simulator, dispatches `RREF` and
//!   `RPOS` responses into the shared state;
//! - outbound dispatcher: drains the send queue, one short task per frame.
//!
//! State transitions are written only by the beacon listener. Closing the
//! send queue stops the loop once queued frames have been sent.

use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle as TaskHandle, JoinSet};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, trace, warn};
use xplane_udp_protocol::{
    BeaconInfo, DREF_FRAME_LEN, DatarefRequest, FrameKind, PoseRecord, RREF_FRAME_LEN,
    encode_dataref_request, encode_dataref_set, encode_pose_request, parse_beacon,
    parse_dataref_response, parse_pose_response, pose_request_len,
};

use crate::config::ClientConfig;
use crate::error::{XPlaneError, XPlaneResult};
use crate::pool::{BufferPool, PooledBuffer};
use crate::registry::SubscriptionRegistry;

const IO_THREAD_NAME: &str = "xplane-udp-io";

/// Invoked with `true` on connect and `false` on beacon loss.
pub type ConnectionCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Connectivity as seen by the beacon listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// The simulator the session is talking to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorInfo {
    pub beacon: BeaconInfo,
    /// Beacon sender IP with the announced request port.
    pub addr: SocketAddr,
}

#[derive(Debug, Default)]
struct LinkState {
    state: ConnectionState,
    simulator: Option<SimulatorInfo>,
}

#[derive(Debug, Default)]
struct PoseState {
    record: Option<PoseRecord>,
    frequency: Option<i32>,
}

/// State shared between the caller threads and the I/O thread.
pub(crate) struct Shared {
    pub(crate) registry: RwLock<SubscriptionRegistry>,
    pub(crate) pool: Arc<BufferPool>,
    link: RwLock<LinkState>,
    pose: RwLock<PoseState>,
    callback: RwLock<Option<ConnectionCallback>>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("link", &*self.link.read())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            registry: RwLock::new(SubscriptionRegistry::new()),
            pool,
            link: RwLock::new(LinkState::default()),
            pose: RwLock::new(PoseState::default()),
            callback: RwLock::new(None),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.link.read().state
    }

    /// The connected simulator; `None` while disconnected.
    pub(crate) fn simulator(&self) -> Option<SimulatorInfo> {
        let link = self.link.read();
        match link.state {
            ConnectionState::Connected => link.simulator.clone(),
            ConnectionState::Disconnected => None,
        }
    }

    pub(crate) fn pose(&self) -> Option<PoseRecord> {
        self.pose.read().record
    }

    /// Remember the pose rate for reconnects; zero forgets it.
    pub(crate) fn set_pose_frequency(&self, frequency: i32) {
        self.pose.write().frequency = (frequency > 0).then_some(frequency);
    }

    pub(crate) fn set_callback(&self, callback: ConnectionCallback) {
        *self.callback.write() = Some(callback);
    }

    fn set_connected(&self, simulator: SimulatorInfo) {
        let mut link = self.link.write();
        link.state = ConnectionState::Connected;
        link.simulator = Some(simulator);
    }

    /// Returns `true` if this call performed the transition.
    fn mark_disconnected(&self) -> bool {
        let mut link = self.link.write();
        if link.state == ConnectionState::Disconnected {
            return false;
        }
        link.state = ConnectionState::Disconnected;
        true
    }

    fn notify(&self, connected: bool) {
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback(connected);
        }
    }

    fn dispatch(&self, data: &[u8], from: SocketAddr) {
        match FrameKind::classify(data) {
            Some(FrameKind::DatarefGet) => match parse_dataref_response(data) {
                Ok(updates) => {
                    let mut registry = self.registry.write();
                    let mut discarded = 0usize;
                    for update in updates {
                        if !registry.apply_update(update.slot, update.value) {
                            discarded += 1;
                        }
                    }
                    trace!(%from, len = data.len(), discarded, "Applied RREF response");
                }
                Err(e) => debug!(%from, error = %e, "Dropping malformed RREF response"),
            },
            Some(FrameKind::Pose) => match parse_pose_response(data) {
                Ok(record) => {
                    self.pose.write().record = Some(record);
                    trace!(%from, "Applied RPOS response");
                }
                Err(e) => debug!(%from, error = %e, "Dropping malformed RPOS response"),
            },
            Some(kind) => debug!(%from, kind = kind.name(), "Ignoring unexpected frame"),
            None => debug!(%from, len = data.len(), "Dropping frame with unknown tag"),
        }
    }
}

/// Encode an `RREF` request into a pooled buffer.
pub(crate) fn request_frame(
    pool: &Arc<BufferPool>,
    request: &DatarefRequest,
) -> XPlaneResult<PooledBuffer> {
    let mut buf = pool.acquire(RREF_FRAME_LEN);
    encode_dataref_request(&mut buf, request.frequency, request.slot, &request.name)?;
    Ok(buf)
}

/// Encode a `DREF` write into a pooled buffer.
pub(crate) fn set_frame(pool: &Arc<BufferPool>, name: &str, value: f32) -> XPlaneResult<PooledBuffer> {
    let mut buf = pool.acquire(DREF_FRAME_LEN);
    encode_dataref_set(&mut buf, value, name)?;
    Ok(buf)
}

/// Encode an `RPOS` query into a pooled buffer.
pub(crate) fn pose_frame(pool: &Arc<BufferPool>, frequency: i32) -> XPlaneResult<PooledBuffer> {
    let mut buf = pool.acquire(pose_request_len(frequency));
    let len = encode_pose_request(&mut buf, frequency)?;
    buf.truncate(len);
    Ok(buf)
}

#[derive(Debug, Clone)]
struct Link {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
}

impl Link {
    async fn send(&self, frame: &[u8]) {
        if let Err(e) = self.socket.send_to(frame, self.target).await {
            debug!(target = %self.target, error = %e, "Send failed");
        }
    }
}

/// Handle to the I/O thread. Dropping it shuts the thread down.
pub(crate) struct Session {
    outbound: Option<mpsc::UnboundedSender<PooledBuffer>>,
    thread: Option<JoinHandle<()>>,
    beacon_addr: SocketAddr,
    shared: Arc<Shared>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("beacon_addr", &self.beacon_addr)
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Bind the beacon socket and start the I/O thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or the runtime or thread
    /// cannot be created.
    pub(crate) fn start(config: &ClientConfig) -> XPlaneResult<Self> {
        config.validate()?;

        let beacon_std = bind_beacon_socket(config)?;
        let beacon_addr = beacon_std.local_addr()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let beacon_socket = {
            let _guard = runtime.enter();
            UdpSocket::from_std(beacon_std)?
        };

        let shared = Arc::new(Shared::new(BufferPool::new(config.pool_buffers_per_class)));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let io = IoLoop {
            shared: Arc::clone(&shared),
            config: config.clone(),
        };
        let thread = std::thread::Builder::new()
            .name(IO_THREAD_NAME.to_string())
            .spawn(move || {
                runtime.block_on(io.run(beacon_socket, outbound_rx));
                debug!("I/O thread exiting");
            })?;

        info!(%beacon_addr, group = %config.multicast_group, "X-Plane UDP session started");

        Ok(Self {
            outbound: Some(outbound_tx),
            thread: Some(thread),
            beacon_addr,
            shared,
        })
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn beacon_addr(&self) -> SocketAddr {
        self.beacon_addr
    }

    /// Queue a frame for the current simulator.
    ///
    /// # Errors
    ///
    /// Returns [`XPlaneError::SessionClosed`] after shutdown.
    pub(crate) fn send(&self, frame: PooledBuffer) -> XPlaneResult<()> {
        let outbound = self.outbound.as_ref().ok_or(XPlaneError::SessionClosed)?;
        outbound
            .send(frame)
            .map_err(|_closed| XPlaneError::SessionClosed)
    }

    /// `false` once [`Session::shutdown`] has run.
    pub(crate) fn is_open(&self) -> bool {
        self.outbound.is_some()
    }

    /// Stop accepting sends and join the thread.
    ///
    /// Dropping the sender is the stop signal; frames already queued are
    /// still sent.
    ///
    /// Called from the I/O thread itself (a connection callback dropping the
    /// last client), the thread is detached and exits once the callback
    /// returns.
    pub(crate) fn shutdown(&mut self) {
        self.outbound = None;
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == std::thread::current().id() {
                debug!("Session dropped on the I/O thread, detaching");
                return;
            }
            if thread.join().is_err() {
                warn!("I/O thread panicked");
            }
            info!("X-Plane UDP session stopped");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn bind_beacon_socket(config: &ClientConfig) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.beacon_port));
    socket.bind(&bind_addr.into())?;
    if let Err(e) = socket.join_multicast_v4(&config.multicast_group, &config.interface) {
        warn!(
            group = %config.multicast_group,
            interface = %config.interface,
            error = %e,
            "Failed to join beacon multicast group"
        );
    }
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

struct IoLoop {
    shared: Arc<Shared>,
    config: ClientConfig,
}

impl IoLoop {
    async fn run(
        self,
        beacon_socket: UdpSocket,
        outbound_rx: mpsc::UnboundedReceiver<PooledBuffer>,
    ) {
        let (link_tx, link_rx) = watch::channel(None);
        tokio::select! {
            () = self.listen_beacons(beacon_socket, link_tx) => {}
            () = dispatch_outbound(outbound_rx, link_rx) => debug!("Outbound queue closed"),
        }
    }

    async fn listen_beacons(&self, socket: UdpSocket, links: watch::Sender<Option<Link>>) {
        let timeout = self.config.beacon_timeout();
        let mut buf = vec![0u8; self.config.recv_buffer_size];
        let mut deadline = Instant::now() + timeout;
        let mut receiver: Option<TaskHandle<()>> = None;

        loop {
            match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => {
                    let data = buf.get(..len).unwrap_or_default();
                    let beacon = match parse_beacon(data) {
                        Ok(beacon) => beacon,
                        Err(e) => {
                            debug!(%from, error = %e, "Dropping non-beacon datagram");
                            continue;
                        }
                    };
                    deadline = Instant::now() + timeout;
                    if self.shared.state() == ConnectionState::Connected {
                        trace!(%from, "Beacon");
                        continue;
                    }

                    let target = simulator_target(from, &beacon);
                    let link = match open_link(target).await {
                        Ok(link) => link,
                        Err(e) => {
                            warn!(%target, error = %e, "Failed to open simulator socket");
                            continue;
                        }
                    };
                    if let Some(previous) = receiver.take() {
                        previous.abort();
                    }
                    receiver = Some(tokio::spawn(receive_responses(
                        Arc::clone(&link.socket),
                        Arc::clone(&self.shared),
                        self.config.recv_buffer_size,
                    )));
                    links.send_modify(|current| *current = Some(link.clone()));

                    info!(
                        %target,
                        host = %beacon.host,
                        version = beacon.version,
                        role = %beacon.role,
                        computer = beacon.computer_name.as_deref().unwrap_or(""),
                        "Connected to simulator"
                    );
                    self.shared.set_connected(SimulatorInfo {
                        beacon,
                        addr: target,
                    });
                    self.shared.notify(true);

                    if self.config.auto_reconnect {
                        self.resubscribe(&link).await;
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "Beacon receive failed"),
                Err(_elapsed) => {
                    deadline = Instant::now() + timeout;
                    if self.shared.mark_disconnected() {
                        info!(timeout_ms = self.config.beacon_timeout_ms, "Simulator beacon lost");
                        self.shared.notify(false);
                    }
                }
            }
        }
    }

    /// Resend every active subscription and the pose query to a new link.
    ///
    /// Each frame goes back to the pool before the next one is encoded.
    async fn resubscribe(&self, link: &Link) {
        let requests = self.shared.registry.read().active_requests();
        let pose_frequency = self.shared.pose.read().frequency;
        debug!(
            requests = requests.len(),
            pose = pose_frequency.is_some(),
            "Resubscribing"
        );

        for request in &requests {
            match request_frame(&self.shared.pool, request) {
                Ok(frame) => link.send(&frame).await,
                Err(e) => warn!(dataref = %request.name, error = %e, "Failed to encode request"),
            }
        }
        if let Some(frequency) = pose_frequency {
            match pose_frame(&self.shared.pool, frequency) {
                Ok(frame) => link.send(&frame).await,
                Err(e) => warn!(error = %e, "Failed to encode pose query"),
            }
        }
    }
}

/// Requests go to the beacon sender's IP on the port the beacon announces.
fn simulator_target(from: SocketAddr, beacon: &BeaconInfo) -> SocketAddr {
    SocketAddr::new(from.ip(), beacon.port)
}

async fn open_link(target: SocketAddr) -> io::Result<Link> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    debug!(local = ?socket.local_addr().ok(), %target, "Opened simulator socket");
    Ok(Link {
        socket: Arc::new(socket),
        target,
    })
}

async fn receive_responses(socket: Arc<UdpSocket>, shared: Arc<Shared>, buf_size: usize) {
    let mut buf = vec![0u8; buf_size];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => shared.dispatch(buf.get(..len).unwrap_or_default(), from),
            Err(e) => debug!(error = %e, "Simulator socket receive failed"),
        }
    }
}

async fn dispatch_outbound(
    mut outbound: mpsc::UnboundedReceiver<PooledBuffer>,
    links: watch::Receiver<Option<Link>>,
) {
    let mut in_flight = JoinSet::new();
    while let Some(frame) = outbound.recv().await {
        while in_flight.try_join_next().is_some() {}
        let link = links.borrow().clone();
        match link {
            Some(link) => {
                in_flight.spawn(async move { link.send(&frame).await });
            }
            None => trace!(len = frame.len(), "No simulator yet, dropping frame"),
        }
    }
    while in_flight.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xplane_udp_protocol::{
        DatarefUpdate, HEADER_LEN, POSE_RECORD_LEN, encode_dataref_response,
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn localhost() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 49000))
    }

    #[test]
    fn test_dispatch_applies_values() -> TestResult {
        let shared = Shared::new(BufferPool::new(1));
        let handle = shared.registry.write().add_array("arr", 2, 1)?.handle;

        let updates = [
            DatarefUpdate { slot: 1, value: 7.5 },
            DatarefUpdate { slot: 9, value: 1.0 },
        ];
        let mut buf = vec![0u8; HEADER_LEN + 16];
        encode_dataref_response(&mut buf, &updates)?;
        shared.dispatch(&buf, localhost());

        let mut out = [0.0f32; 2];
        assert!(shared.registry.read().read_array(handle, &mut out, 0.0)?);
        assert_eq!(out, [0.0, 7.5]);
        Ok(())
    }

    #[test]
    fn test_dispatch_pose_and_garbage() -> TestResult {
        let shared = Shared::new(BufferPool::new(1));
        assert_eq!(shared.pose(), None);

        shared.dispatch(b"RPOS\0\x01", localhost());
        shared.dispatch(b"ZZZZ\0", localhost());
        assert_eq!(shared.pose(), None);

        let pose = PoseRecord {
            latitude: 47.5,
            ..PoseRecord::default()
        };
        let mut buf = vec![0u8; HEADER_LEN + POSE_RECORD_LEN];
        pose.encode_response(&mut buf)?;
        shared.dispatch(&buf, localhost());
        assert_eq!(shared.pose(), Some(pose));
        Ok(())
    }

    #[test]
    fn test_disconnect_transition_fires_once() {
        let shared = Shared::new(BufferPool::new(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        shared.set_callback(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!shared.mark_disconnected());
        shared.set_connected(SimulatorInfo {
            beacon: BeaconInfo::xplane(120_000, 49000),
            addr: localhost(),
        });
        assert!(shared.simulator().is_some());
        assert!(shared.mark_disconnected());
        assert!(!shared.mark_disconnected());
        assert_eq!(shared.simulator(), None);

        shared.notify(false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_target_uses_sender_ip_and_announced_port() {
        let from = SocketAddr::from(([192, 168, 1, 5], 51234));
        let beacon = BeaconInfo::xplane(120_100, 49000);
        assert_eq!(
            simulator_target(from, &beacon),
            SocketAddr::from(([192, 168, 1, 5], 49000))
        );
    }

    #[test]
    fn test_pose_frame_is_trimmed() -> TestResult {
        let pool = BufferPool::new(1);
        let frame = pose_frame(&pool, 20)?;
        assert_eq!(&*frame, b"RPOS\x0020\0");
        Ok(())
    }

    #[test]
    fn test_pose_frequency_zero_is_forgotten() {
        let shared = Shared::new(BufferPool::new(1));
        shared.set_pose_frequency(5);
        assert_eq!(shared.pose.read().frequency, Some(5));
        shared.set_pose_frequency(0);
        assert_eq!(shared.pose.read().frequency, None);
    }
}
