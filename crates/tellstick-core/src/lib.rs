//! Local state cache and device views for Telldus hubs.
//!
//! This crate sits between `tellstick-api` (the transports) and
//! applications:
//!
//! - **[`Client`]**: Facade over one transport session. Constructors per
//!   validated configuration ([`Client::cloud`], [`Client::local`],
//!   [`Client::loopback`], [`Client::connect`]). [`update()`](Client::update)
//!   pulls full snapshots; [`listen()`](Client::listen) starts the device
//!   manager's asynchronous packet stream.
//!
//! - **[`StateStore`]**: The single cache every view reads, guarded by
//!   one mutex shared by refresh merges, async reconciliation and
//!   confirmed commands.
//!
//! - **[`Reconciler`]**: Matches pushed packets to cached entries by
//!   composite key, creating placeholders on first sight.
//!
//! - **[`Device`]**: View over one entry: fresh accessors on every read,
//!   commands through the [`Gateway`].
//!
//! - **[`CallbackDispatcher`]**: Where listeners run: directly on the
//!   delivering thread or on a tokio runtime.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{Client, ClientBuilder};
pub use config::{CloudConfig, Credentials, ListenConfig, LocalConfig, SessionConfig};
pub use dispatch::{CallbackDispatcher, DirectDispatcher, Listener, RuntimeDispatcher};
pub use error::CoreError;
pub use gateway::Gateway;
pub use reconcile::{Anomaly, Reconciler, Update};
pub use store::StateStore;
pub use view::Device;

pub use model::{
    DeviceKey, Entry, Field, Identifier, Method, SUPPORTED_METHODS, SensorItem, SensorKey,
    describe_methods,
};

pub use tellstick_api::{DeviceManager, PacketCallback, Params, Session, SessionKind};
