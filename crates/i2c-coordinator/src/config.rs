use serde::{Deserialize, Serialize};

use crate::error::BusError;
use crate::transport::Transport;

/// Index of a physical bus on the host platform (`/dev/i2c-N` on Linux).
pub type BusNumber = u32;

/// Bus selection owned by whoever configures the coordinator.
///
/// An unset `bus_number` means "use the platform default", never an error.
/// The value is fixed for the lifetime of a coordinator; reconfiguring
/// means building a new one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    #[serde(default)]
    pub bus_number: Option<BusNumber>,
}

impl BusConfig {
    /// Short label for the bus number option.
    pub const LABEL: &'static str = "BusNum";
    /// Help text for the bus number option.
    pub const HELP: &'static str =
        "The I2C bus number to use. Leave unset to use the default bus";

    pub const fn new(bus_number: Option<BusNumber>) -> Self {
        Self { bus_number }
    }

    /// Configuration that defers to the platform default bus.
    pub const fn platform_default() -> Self {
        Self { bus_number: None }
    }

    /// Resolve the bus to use with this configuration.
    pub fn resolve<T: Transport>(
        &self,
        transport: &T,
    ) -> Result<BusNumber, BusError<T::Error>> {
        resolve_bus_number(self.bus_number, transport)
    }
}

/// Pick the bus number: the configured one unchanged, or the transport's
/// platform default.
///
/// A configured number is not checked against the buses that actually
/// exist; a bad one fails later when a device is opened.
pub fn resolve_bus_number<T: Transport>(
    configured: Option<BusNumber>,
    transport: &T,
) -> Result<BusNumber, BusError<T::Error>> {
    match configured {
        Some(bus) => Ok(bus),
        None => transport.default_bus().map_err(BusError::BusUnavailable),
    }
}
