//! X-Plane UDP dataref client.
//!
//! [`XPlaneClient`] discovers a simulator through its multicast beacon,
//! subscribes to datarefs at chosen rates, keeps the latest values in a flat
//! slot table and writes values back. When the beacon goes silent the client
//! reports a disconnect; when it returns, every active subscription and the
//! pose query are sent again.
//!
//! Layers, leaf first:
//!
//! - [`slots`]: first-fit slot allocator and value table
//! - [`registry`]: dataref names to slot ranges, request generation
//! - [`pool`]: pooled send buffers
//! - `session`: I/O thread, beacon state machine, inbound dispatch
//! - [`client`]: the public facade

#![deny(static_mut_refs)]

pub mod client;
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;
mod session;
pub mod slots;

pub use client::XPlaneClient;
pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_BEACON_TIMEOUT_MS, MIN_RECV_BUFFER_SIZE,
};
pub use error::{XPlaneError, XPlaneResult};
pub use pool::{BufferPool, PooledBuffer};
pub use registry::{DatarefHandle, Subscription, SubscriptionRegistry};
pub use session::{ConnectionCallback, ConnectionState, SimulatorInfo};
pub use slots::SlotTable;

pub use xplane_udp_protocol::{BeaconInfo, BeaconRole, HostApplication, PoseRecord};
