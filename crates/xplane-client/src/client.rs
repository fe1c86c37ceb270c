//! Thread-safe client facade.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::debug;
use xplane_udp_protocol::{DatarefRequest, PoseRecord};

use crate::config::ClientConfig;
use crate::error::{XPlaneError, XPlaneResult};
use crate::pool::PooledBuffer;
use crate::registry::{DatarefHandle, Subscription, element_name};
use crate::session::{
    ConnectionState, Session, SimulatorInfo, pose_frame, request_frame, set_frame,
};

/// X-Plane UDP client.
///
/// Creating a client binds the beacon socket and starts the background I/O
/// thread. All methods take `&self` and may be called from any thread.
/// Requests made before a simulator is discovered are dropped on the wire and
/// replayed on connect when `auto_reconnect` is enabled.
///
/// ```no_run
/// use xplane_udp_client::XPlaneClient;
///
/// let client = XPlaneClient::with_defaults()?;
/// let airspeed = client.add_dataref("sim/flightmodel/position/indicated_airspeed", 10, None)?;
/// let mut kts = 0.0;
/// if client.get_dataref(airspeed, &mut kts, f32::NAN)? {
///     println!("{kts:.1} kts");
/// }
/// # Ok::<(), xplane_udp_client::XPlaneError>(())
/// ```
#[derive(Debug)]
pub struct XPlaneClient {
    session: Session,
}

impl XPlaneClient {
    /// Start a client with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the beacon socket
    /// or I/O thread cannot be set up.
    pub fn new(config: ClientConfig) -> XPlaneResult<Self> {
        let session = Session::start(&config)?;
        Ok(Self { session })
    }

    /// Start a client on the standard beacon group and port.
    ///
    /// # Errors
    ///
    /// See [`XPlaneClient::new`].
    pub fn with_defaults() -> XPlaneResult<Self> {
        Self::new(ClientConfig::default())
    }

    /// Local address of the beacon listener.
    pub fn beacon_addr(&self) -> SocketAddr {
        self.session.beacon_addr()
    }

    pub fn is_connected(&self) -> bool {
        self.session.shared().state() == ConnectionState::Connected
    }

    /// The simulator currently connected, if any.
    pub fn simulator(&self) -> Option<SimulatorInfo> {
        self.session.shared().simulator()
    }

    /// Subscribe to a scalar dataref, or to element `index` of an array dataref.
    ///
    /// Adding a name that is already subscribed returns the existing handle
    /// and sends nothing.
    ///
    /// # Errors
    ///
    /// Returns an error for negative frequencies, names too long for an `RREF`
    /// frame, or after shutdown.
    pub fn add_dataref(
        &self,
        name: &str,
        frequency: i32,
        index: Option<usize>,
    ) -> XPlaneResult<DatarefHandle> {
        self.ensure_open()?;
        let name = indexed_name(name, index);
        let added = self
            .session
            .shared()
            .registry
            .write()
            .add_scalar(&name, frequency)?;
        self.send_requests(&added.requests)?;
        Ok(added.handle)
    }

    /// Subscribe to elements `0..len` of an array dataref.
    ///
    /// # Errors
    ///
    /// Returns an error if `len` is zero, the frequency is negative, the
    /// element names are too long, or after shutdown.
    pub fn add_dataref_array(
        &self,
        name: &str,
        len: usize,
        frequency: i32,
    ) -> XPlaneResult<DatarefHandle> {
        self.ensure_open()?;
        let added = self
            .session
            .shared()
            .registry
            .write()
            .add_array(name, len, frequency)?;
        self.send_requests(&added.requests)?;
        Ok(added.handle)
    }

    /// Read the latest value of a subscription (its first element for arrays).
    ///
    /// Returns `false` and writes `default` if the subscription is inactive.
    /// An active subscription that has not received anything yet reads `0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`XPlaneError::HandleOutOfRange`] for foreign handles.
    pub fn get_dataref(
        &self,
        handle: DatarefHandle,
        out: &mut f32,
        default: f32,
    ) -> XPlaneResult<bool> {
        self.session.shared().registry.read().read(handle, out, default)
    }

    /// Copy the latest values of an array subscription into `out`, truncated
    /// to the shorter of the two.
    ///
    /// # Errors
    ///
    /// Returns [`XPlaneError::HandleOutOfRange`] for foreign handles.
    pub fn get_dataref_array(
        &self,
        handle: DatarefHandle,
        out: &mut [f32],
        default: f32,
    ) -> XPlaneResult<bool> {
        self.session
            .shared()
            .registry
            .read()
            .read_array(handle, out, default)
    }

    /// Change the rate of a subscription. Zero stops it and frees its slots.
    ///
    /// # Errors
    ///
    /// Returns an error for foreign handles, negative frequencies, or after
    /// shutdown.
    pub fn change_frequency(&self, handle: DatarefHandle, frequency: i32) -> XPlaneResult<()> {
        self.ensure_open()?;
        let requests = self
            .session
            .shared()
            .registry
            .write()
            .change_frequency(handle, frequency)?;
        self.send_requests(&requests)
    }

    /// Snapshot of a subscription's bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`XPlaneError::HandleOutOfRange`] for foreign handles.
    pub fn subscription(&self, handle: DatarefHandle) -> XPlaneResult<Subscription> {
        self.session
            .shared()
            .registry
            .read()
            .get(handle)
            .cloned()
    }

    /// Write a value to a dataref, or to element `index` of an array dataref.
    ///
    /// No subscription is needed. The write is fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is too long for a `DREF` frame, or after
    /// shutdown.
    pub fn set_dataref(&self, name: &str, value: f32, index: Option<usize>) -> XPlaneResult<()> {
        self.ensure_open()?;
        let frame = set_frame(&self.session.shared().pool, &indexed_name(name, index), value)?;
        self.session.send(frame)
    }

    /// Write `values[i]` to `name[i]` for every element.
    ///
    /// # Errors
    ///
    /// Returns an error if an element name is too long (nothing is sent), or
    /// after shutdown.
    pub fn set_dataref_array(&self, name: &str, values: &[f32]) -> XPlaneResult<()> {
        self.ensure_open()?;
        let pool = &self.session.shared().pool;
        let frames = values
            .iter()
            .enumerate()
            .map(|(i, &value)| set_frame(pool, &element_name(name, i), value))
            .collect::<XPlaneResult<Vec<_>>>()?;
        self.send_all(frames)
    }

    /// Ask the simulator for pose updates at `frequency` Hz; zero stops them.
    ///
    /// # Errors
    ///
    /// Returns an error for negative frequencies or after shutdown.
    pub fn add_pose_subscription(&self, frequency: i32) -> XPlaneResult<()> {
        if frequency < 0 {
            return Err(XPlaneError::InvalidFrequency(frequency));
        }
        self.ensure_open()?;
        let shared = self.session.shared();
        shared.set_pose_frequency(frequency);
        let frame = pose_frame(&shared.pool, frequency)?;
        self.session.send(frame)
    }

    /// Latest pose record; `None` until the first `RPOS` response.
    pub fn pose(&self) -> Option<PoseRecord> {
        self.session.shared().pose()
    }

    /// Register the connectivity callback, replacing any previous one.
    ///
    /// It runs on the I/O thread with `true` on (re)connect and `false` on
    /// beacon loss, and must not block.
    pub fn set_connection_callback<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.session.shared().set_callback(Arc::new(callback));
    }

    /// Send-buffer acquisitions that found the pool empty.
    pub fn pool_exhausted_count(&self) -> u64 {
        self.session.shared().pool.exhausted_count()
    }

    /// Stop the I/O thread. Later calls that send return
    /// [`XPlaneError::SessionClosed`]; reads keep working.
    pub fn shutdown(&mut self) {
        self.session.shutdown();
    }

    fn ensure_open(&self) -> XPlaneResult<()> {
        if self.session.is_open() {
            Ok(())
        } else {
            Err(XPlaneError::SessionClosed)
        }
    }

    fn send_requests(&self, requests: &[DatarefRequest]) -> XPlaneResult<()> {
        debug!(frames = requests.len(), "Queueing RREF requests");
        let pool = &self.session.shared().pool;
        requests
            .iter()
            .try_for_each(|request| self.session.send(request_frame(pool, request)?))
    }

    fn send_all(&self, frames: Vec<PooledBuffer>) -> XPlaneResult<()> {
        frames
            .into_iter()
            .try_for_each(|frame| self.session.send(frame))
    }
}

fn indexed_name(name: &str, index: Option<usize>) -> String {
    match index {
        Some(index) => element_name(name, index),
        None => name.to_string(),
    }
}
