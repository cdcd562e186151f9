// tellstick-api: Async transports for Telldus hubs (Live cloud, local HTTP, loopback)

pub mod cloud;
pub mod discovery;
pub mod error;
pub mod local;
pub mod loopback;
pub mod session;
pub mod transport;

pub use cloud::CloudSession;
pub use discovery::{DiscoveredHub, discover, supports_local_api};
pub use error::Error;
pub use local::LocalSession;
pub use loopback::{DeviceManager, LoopbackSession, PacketCallback};
pub use session::{Params, Session, SessionKind};
pub use transport::{TransportConfig, REQUEST_TIMEOUT};
