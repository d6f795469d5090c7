use core::ops::{Deref, DerefMut};

use crate::address::Address;
use crate::config::BusNumber;
use crate::transport::RawDevice;

/// A device on the shared bus, bound to one address.
///
/// Handles are cheap and built per call; the coordinator does not cache
/// them. The inner device keeps the transport reference, so every handle
/// from one coordinator drives the same wire. Only use a handle while the
/// coordinator lock is held.
pub struct DeviceHandle<D> {
    address: Address,
    bus_number: BusNumber,
    device: D,
}

impl<D> DeviceHandle<D> {
    /// Create a new handle. Only called by the coordinator.
    pub(crate) fn new(address: Address, bus_number: BusNumber, device: D) -> Self {
        Self { address, bus_number, device }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn bus_number(&self) -> BusNumber {
        self.bus_number
    }

    /// Unwrap the transport's device object.
    pub fn into_inner(self) -> D {
        self.device
    }
}

impl<D> Deref for DeviceHandle<D> {
    type Target = D;

    #[inline]
    fn deref(&self) -> &D {
        &self.device
    }
}

impl<D> DerefMut for DeviceHandle<D> {
    #[inline]
    fn deref_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: RawDevice> RawDevice for DeviceHandle<D> {
    type Error = D::Error;

    fn write(&mut self, bytes: &[u8]) -> Result<(), D::Error> {
        self.device.write(bytes)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), D::Error> {
        self.device.read(buffer)
    }

    fn write_read(
        &mut self,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), D::Error> {
        self.device.write_read(bytes, buffer)
    }

    fn write_raw_byte(&mut self, value: u8) -> Result<(), D::Error> {
        self.device.write_raw_byte(value)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), D::Error> {
        self.device.write_register(register, value)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, D::Error> {
        self.device.read_register(register)
    }
}

impl<D> core::fmt::Debug for DeviceHandle<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("address", &self.address)
            .field("bus_number", &self.bus_number)
            .finish_non_exhaustive()
    }
}
