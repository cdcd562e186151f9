// ── Client facade ──
//
// Ties a transport session to the state store. `update()` pulls full
// snapshots, `listen()` hooks the device manager's packet stream up to the
// reconciler, and `device()` hands out views over the cached entries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use tracing::{Instrument, Span, debug, info, info_span, warn};
use url::Url;

use tellstick_api::{
    CloudSession, DeviceManager, LocalSession, LoopbackSession, Session, SessionKind,
    TransportConfig,
};

use crate::config::{CloudConfig, DEFAULT_APPLICATION, LocalConfig, SessionConfig};
use crate::dispatch::{CallbackDispatcher, DirectDispatcher, Listener};
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::model::{Entry, Field, Identifier};
use crate::reconcile::Reconciler;
use crate::store::{StateStore, enrich_from_cache, enrich_from_info};
use crate::view::Device;

// ── Client ───────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ClientInner>`; views hold the same `Arc`.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) gateway: Gateway,
    pub(crate) store: Arc<StateStore>,
    manager: Option<Arc<dyn DeviceManager>>,
    dispatcher: Arc<dyn CallbackDispatcher>,
    listening: AtomicBool,
    span: Span,
}

impl Client {
    /// Client over Telldus Live.
    pub fn cloud(config: CloudConfig) -> Result<Self, CoreError> {
        Ok(Self::builder(cloud_session(config)?).build())
    }

    /// Client over a hub's local HTTP API.
    pub fn local(config: LocalConfig) -> Result<Self, CoreError> {
        Ok(Self::builder(local_session(config)?).build())
    }

    /// Client answering every request from the device manager.
    pub fn loopback(manager: Arc<dyn DeviceManager>) -> Self {
        Self::builder(Session::from(LoopbackSession::new(Arc::clone(&manager))))
            .manager(manager)
            .build()
    }

    /// Build a client for a validated configuration.
    ///
    /// Listening configurations need the device manager that owns the
    /// radio; it is attached so [`listen`](Self::listen) can start it.
    pub fn connect(
        config: SessionConfig,
        manager: Option<Arc<dyn DeviceManager>>,
    ) -> Result<Self, CoreError> {
        if config.listen() && manager.is_none() {
            return Err(CoreError::Config {
                message: "listening requires a device manager".into(),
            });
        }

        let session = match config {
            SessionConfig::Cloud(c) => cloud_session(c)?,
            SessionConfig::Local(c) => local_session(c)?,
            SessionConfig::Listen(_) => manager
                .clone()
                .map(|m| Session::from(LoopbackSession::new(m)))
                .ok_or_else(|| CoreError::Config {
                    message: "listen mode requires a device manager".into(),
                })?,
        };

        let mut builder = Self::builder(session);
        if let Some(m) = manager {
            builder = builder.manager(m);
        }
        Ok(builder.build())
    }

    pub fn builder(session: Session) -> ClientBuilder {
        ClientBuilder {
            session,
            manager: None,
            dispatcher: None,
            span: None,
        }
    }

    pub fn session_kind(&self) -> SessionKind {
        self.inner.gateway.session().kind()
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.inner.store
    }

    // ── Authorization ────────────────────────────────────────────────

    pub async fn authorize_url(&self) -> Option<Url> {
        self.inner
            .gateway
            .session()
            .authorize_url()
            .instrument(self.inner.span.clone())
            .await
    }

    pub async fn authorize(&self) -> bool {
        self.inner
            .gateway
            .session()
            .authorize()
            .instrument(self.inner.span.clone())
            .await
    }

    pub fn is_authorized(&self) -> bool {
        self.inner.gateway.session().is_authorized()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.gateway.session().access_token()
    }

    pub fn access_token_secret(&self) -> Option<SecretString> {
        self.inner.gateway.session().access_token_secret()
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Pull both lists and merge them into the store.
    ///
    /// Returns `false`, with the store untouched, if either list or any
    /// enrichment fetch fails.
    pub async fn update(&self) -> bool {
        self.refresh().instrument(self.inner.span.clone()).await
    }

    async fn refresh(&self) -> bool {
        let gateway = &self.inner.gateway;
        let store = &self.inner.store;

        let Some(devices) = gateway.list_devices().await else {
            return false;
        };
        let Some(sensors) = gateway.list_sensors().await else {
            return false;
        };

        let mut enriched = Vec::with_capacity(devices.len());
        for record in devices {
            let Some(mut device) = Entry::from_value(record) else {
                debug!("skipping non-object device record");
                continue;
            };
            if device.name().is_none_or(str::is_empty) {
                debug!(id = ?device.id(), "skipping unnamed device");
                continue;
            }
            let Some(id) = device.id() else {
                debug!("skipping device record without id");
                continue;
            };

            if let Some(cached) = store.cached_device(&Identifier::device(&id)) {
                debug!(%id, "already known device");
                enrich_from_cache(&mut device, &cached);
            } else {
                debug!(%id, "getting protocol and parameters for new device");
                let Some(info) = gateway.device_info(&id).await else {
                    warn!(%id, "device info unavailable, aborting refresh");
                    return false;
                };
                enrich_from_info(&mut device, &info);
            }
            enriched.push(device);
        }

        let sensors = sensors.into_iter().filter_map(Entry::from_value).collect();
        let written = store.apply_snapshot(enriched, sensors);
        debug!(written, "refresh merged");
        true
    }

    // ── Views ────────────────────────────────────────────────────────

    /// View of the entry with this key. The entry need not exist yet.
    pub fn device(&self, id: impl Into<Identifier>) -> Device {
        Device::new(id.into(), Arc::clone(&self.inner))
    }

    pub fn device_ids(&self) -> Vec<Identifier> {
        self.inner.store.ids()
    }

    /// Views of every entry, devices and sensors alike.
    pub fn devices(&self) -> Vec<Device> {
        self.device_ids()
            .into_iter()
            .map(|id| self.device(id))
            .collect()
    }

    pub fn sensors(&self) -> Vec<Device> {
        self.devices().into_iter().filter(Device::is_sensor).collect()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.inner.store.last_update()
    }

    // ── Asynchronous packets ─────────────────────────────────────────

    /// Start consuming the device manager's packet stream.
    ///
    /// Refreshes the store, registers every known device with the
    /// manager so its packets can be decoded, then starts the manager's
    /// listener. Only the first call on a client does anything.
    pub async fn listen(&self, listener: Listener) -> Result<(), CoreError> {
        let Some(manager) = self.inner.manager.clone() else {
            return Err(CoreError::NotSupported {
                operation: "listening without a device manager".into(),
            });
        };
        if self.inner.listening.swap(true, Ordering::SeqCst) {
            return Err(CoreError::AlreadyListening);
        }

        async {
            if !self.update().await {
                warn!("initial update failed, listening with cached state");
            }

            for device in self.devices() {
                if device.is_sensor() {
                    continue;
                }
                if let Some(entry) = device.entry() {
                    manager.add_device(registration(&entry));
                }
            }

            let reconciler = Reconciler::new(Arc::clone(&self.inner.store), self.inner.span.clone());
            let intake = reconciler.into_callback(Arc::clone(&self.inner.dispatcher), listener);
            info!("starting asynchronous listener");
            manager.async_listen(intake);
        }
        .instrument(self.inner.span.clone())
        .await;

        Ok(())
    }
}

/// The record the device manager needs to decode a device's packets.
fn registration(entry: &Entry) -> Value {
    let pick = |field: Field| entry.get(field).cloned().unwrap_or(Value::Null);
    json!({
        "name": pick(Field::Name),
        "id": pick(Field::Id),
        "parameters": pick(Field::Parameters),
        "protocol": pick(Field::Protocol),
        "model": pick(Field::Model),
        "client_id": pick(Field::ClientId),
    })
}

fn cloud_session(config: CloudConfig) -> Result<Session, CoreError> {
    let transport = TransportConfig::with_application(config.application);
    let session = CloudSession::new(
        config.public_key,
        config.private_key,
        Some((config.token, config.token_secret)),
        &transport,
    )?;
    Ok(Session::from(session))
}

fn local_session(config: LocalConfig) -> Result<Session, CoreError> {
    let transport = TransportConfig::default();
    let application = config
        .application
        .unwrap_or_else(|| DEFAULT_APPLICATION.to_owned());
    let session = LocalSession::new(&config.host, application, config.token, &transport)?;
    Ok(Session::from(session))
}

// ── ClientBuilder ────────────────────────────────────────────────────

/// Assembles a [`Client`] around an already built session.
pub struct ClientBuilder {
    session: Session,
    manager: Option<Arc<dyn DeviceManager>>,
    dispatcher: Option<Arc<dyn CallbackDispatcher>>,
    span: Option<Span>,
}

impl ClientBuilder {
    /// Device manager used by [`Client::listen`].
    pub fn manager(mut self, manager: Arc<dyn DeviceManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Where listeners run. Defaults to the delivering thread.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn CallbackDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Parent span for everything the client logs. Defaults to the
    /// span current at [`build`](Self::build).
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> Client {
        let kind = self.session.kind();
        let parent = self.span.unwrap_or_else(Span::current);
        let span = info_span!(parent: &parent, "tellstick", transport = %kind);
        span.in_scope(|| info!(version = env!("CARGO_PKG_VERSION"), "client created"));

        Client {
            inner: Arc::new(ClientInner {
                gateway: Gateway::new(self.session, span.clone()),
                store: Arc::new(StateStore::new()),
                manager: self.manager,
                dispatcher: self
                    .dispatcher
                    .unwrap_or_else(|| Arc::new(DirectDispatcher) as Arc<dyn CallbackDispatcher>),
                listening: AtomicBool::new(false),
                span,
            }),
        }
    }
}
