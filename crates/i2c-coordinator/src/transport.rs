use crate::address::Address;
use crate::config::BusNumber;

/// Capability interface of the driver that moves bytes over the wire.
///
/// Selected once when the coordinator is built. The coordinator borrows
/// the transport and never tears it down.
pub trait Transport {
    /// Error reported by the transport and by its devices.
    type Error: core::fmt::Debug;
    /// Transport-specific flags, forwarded verbatim when opening a device.
    type Options: Default;
    /// Per-address device object. May borrow the transport.
    type Device<'a>: RawDevice<Error = Self::Error>
    where
        Self: 'a;

    /// Bus number the platform uses when none is configured.
    fn default_bus(&self) -> Result<BusNumber, Self::Error>;

    /// Build a device bound to `address` on `bus`.
    fn device(
        &self,
        address: Address,
        bus: BusNumber,
        options: &Self::Options,
    ) -> Result<Self::Device<'_>, Self::Error>;

    /// Whether combined write-then-read transactions need a repeated start
    /// on this platform.
    fn requires_repeated_start(&self) -> bool;
}

/// Byte-level operations on a single device address.
///
/// Callers must hold the coordinator lock while using a device: every
/// device shares the same wire.
pub trait RawDevice {
    type Error: core::fmt::Debug;

    /// Write `bytes` in one transaction.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buffer` in one transaction.
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `bytes` then read into `buffer`.
    fn write_read(
        &mut self,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error>;

    /// Write a single byte with no register prefix.
    fn write_raw_byte(&mut self, value: u8) -> Result<(), Self::Error> {
        self.write(&[value])
    }

    /// Write `value` into an 8-bit register.
    fn write_register(
        &mut self,
        register: u8,
        value: u8,
    ) -> Result<(), Self::Error> {
        self.write(&[register, value])
    }

    /// Read an 8-bit register.
    fn read_register(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut buf = [0u8; 1];
        self.write_read(&[register], &mut buf)?;
        Ok(buf[0])
    }
}

/// Per-call options for [`BusCoordinator::get_device`](crate::BusCoordinator::get_device).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceOptions<O> {
    /// Use this bus instead of the configured/default one.
    pub bus_number: Option<BusNumber>,
    /// Passed through to [`Transport::device`] untouched.
    pub transport: O,
}

impl<O: Default> DeviceOptions<O> {
    /// Options targeting a specific bus.
    pub fn on_bus(bus_number: BusNumber) -> Self {
        Self { bus_number: Some(bus_number), transport: O::default() }
    }
}
