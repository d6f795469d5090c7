#![cfg_attr(not(any(test, feature = "std")), no_std)]
//! Exclusive, serialized access to a shared I2C bus.
//!
//! A [`BusCoordinator`] owns a non-reentrant lock over one bus and a borrow
//! of the [`Transport`] that drives it. Callers take the lock, open
//! per-address [`DeviceHandle`]s on the resolved bus number, and release the
//! lock when done. A general-call software reset (SWRST) is available to
//! lock holders.
//!
//! Lock discipline is a caller contract on the raw API
//! ([`acquire`](BusCoordinator::acquire) / [`release`](BusCoordinator::release));
//! [`BusGuard`] enforces it with RAII.

mod address;
mod config;
mod coordinator;
mod error;
mod guard;
mod handle;
pub mod hal;
#[cfg(feature = "linux")]
pub mod linux;
mod transport;

pub use address::Address;
pub use config::{resolve_bus_number, BusConfig, BusNumber};
pub use coordinator::{BusCoordinator, SWRST};
pub use error::BusError;
pub use guard::BusGuard;
pub use handle::DeviceHandle;
pub use transport::{DeviceOptions, RawDevice, Transport};
