//! [`Transport`] over any blocking `embedded-hal` I2C bus.
//!
//! The bus is shared by every device through a blocking mutex, in the same
//! way `embassy-embedded-hal`'s shared-bus devices are; each transaction
//! locks it for its own duration only.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::i2c::I2c;

use crate::address::Address;
use crate::config::BusNumber;
use crate::transport::{RawDevice, Transport};

/// Errors reported by [`HalTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError<E> {
    /// The transport drives a different bus.
    NoSuchBus(BusNumber),
    /// Not a 7-bit address in `0x00..=0x7F`.
    InvalidAddress(Address),
    /// The underlying bus failed.
    Bus(E),
}

impl<E: core::fmt::Debug> core::fmt::Display for HalError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::NoSuchBus(bus) => write!(f, "no I2C bus {}", bus),
            HalError::InvalidAddress(address) => {
                write!(f, "address {} not reachable", address)
            }
            HalError::Bus(err) => write!(f, "bus error: {:?}", err),
        }
    }
}

/// A single `embedded-hal` bus exposed as bus number `bus_number`.
pub struct HalTransport<M: RawMutex, B> {
    bus: Mutex<M, RefCell<B>>,
    bus_number: BusNumber,
    repeated_start: bool,
}

impl<M: RawMutex, B> HalTransport<M, B> {
    pub const fn new(bus: B, bus_number: BusNumber) -> Self {
        Self {
            bus: Mutex::new(RefCell::new(bus)),
            bus_number,
            repeated_start: false,
        }
    }

    /// Report that combined transactions need a repeated start.
    pub fn with_repeated_start(mut self, required: bool) -> Self {
        self.repeated_start = required;
        self
    }

    pub fn bus_number(&self) -> BusNumber {
        self.bus_number
    }

    /// Give the bus back.
    pub fn into_inner(self) -> B {
        self.bus.into_inner().into_inner()
    }
}

impl<M: RawMutex, B: I2c> Transport for HalTransport<M, B> {
    type Error = HalError<B::Error>;
    type Options = ();
    type Device<'a>
        = HalDevice<'a, M, B>
    where
        Self: 'a;

    fn default_bus(&self) -> Result<BusNumber, Self::Error> {
        Ok(self.bus_number)
    }

    fn device(
        &self,
        address: Address,
        bus: BusNumber,
        _options: &(),
    ) -> Result<HalDevice<'_, M, B>, Self::Error> {
        if bus != self.bus_number {
            return Err(HalError::NoSuchBus(bus));
        }
        match address {
            Address::SevenBit(addr) if address.is_in_range() => {
                Ok(HalDevice { bus: &self.bus, address: addr })
            }
            _ => Err(HalError::InvalidAddress(address)),
        }
    }

    fn requires_repeated_start(&self) -> bool {
        self.repeated_start
    }
}

/// One 7-bit address on a [`HalTransport`] bus.
pub struct HalDevice<'a, M: RawMutex, B> {
    bus: &'a Mutex<M, RefCell<B>>,
    address: u8,
}

impl<M: RawMutex, B: I2c> RawDevice for HalDevice<'_, M, B> {
    type Error = HalError<B::Error>;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.bus
            .lock(|bus| bus.borrow_mut().write(self.address, bytes))
            .map_err(HalError::Bus)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.bus
            .lock(|bus| bus.borrow_mut().read(self.address, buffer))
            .map_err(HalError::Bus)
    }

    fn write_read(
        &mut self,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.bus
            .lock(|bus| bus.borrow_mut().write_read(self.address, bytes, buffer))
            .map_err(HalError::Bus)
    }
}
