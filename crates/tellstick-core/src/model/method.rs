// ── Device commands ──
//
// The hub reports a device's state and its capabilities as bit masks over
// the same method flags. Each flag also names the `device/{method}` call
// that performs it.

use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

/// A device command / state flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum Method {
    TurnOn = 1,
    TurnOff = 2,
    Bell = 4,
    Toggle = 8,
    Dim = 16,
    Learn = 32,
    Up = 128,
    Down = 256,
    Stop = 512,
    Rgbw = 1024,
    Thermostat = 2048,
}

/// Methods this client can drive; sent as `supportedMethods` when listing.
pub const SUPPORTED_METHODS: u32 = Method::TurnOn.bits()
    | Method::TurnOff.bits()
    | Method::Dim.bits()
    | Method::Up.bits()
    | Method::Down.bits()
    | Method::Stop.bits();

impl Method {
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Name of the remote operation, e.g. `turnOn`.
    pub fn api_name(self) -> &'static str {
        self.into()
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::iter().find(|m| m.bits() == bits)
    }

    pub fn is_set(self, mask: u32) -> bool {
        mask & self.bits() != 0
    }
}

/// Render a state or capability mask as `TURNON|DIM`.
pub fn describe_methods(mask: u32) -> String {
    Method::iter()
        .filter(|m| m.is_set(mask))
        .map(|m| m.api_name().to_uppercase())
        .collect::<Vec<_>>()
        .join("|")
}
