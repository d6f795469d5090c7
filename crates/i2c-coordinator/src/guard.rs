use core::mem::ManuallyDrop;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::address::Address;
use crate::config::BusNumber;
use crate::coordinator::BusCoordinator;
use crate::error::BusError;
use crate::handle::DeviceHandle;
use crate::transport::{DeviceOptions, Transport};

/// RAII proof that the bus lock is held.
///
/// Dropping the guard releases the lock it took, and only that one: if the
/// lock was released underneath the guard and taken by someone else, the
/// newer holder keeps it.
pub struct BusGuard<'c, 't, M: RawMutex, T: Transport> {
    coordinator: &'c BusCoordinator<'t, M, T>,
    generation: u32,
}

impl<'c, 't, M: RawMutex, T: Transport> BusGuard<'c, 't, M, T> {
    /// Create a new guard. Only called by `BusCoordinator` with the lock held.
    pub(crate) fn new(coordinator: &'c BusCoordinator<'t, M, T>) -> Self {
        Self {
            coordinator,
            generation: coordinator.generation(),
        }
    }

    pub fn bus_number(&self) -> Result<BusNumber, BusError<T::Error>> {
        self.coordinator.get_bus_number()
    }

    /// Open the device at `address`.
    ///
    /// The handle borrows the transport, not the guard, so the compiler does
    /// not stop it outliving the guard. Using it after the guard is gone
    /// drives the bus without the lock.
    pub fn device(
        &mut self,
        address: Address,
        options: DeviceOptions<T::Options>,
    ) -> Result<DeviceHandle<T::Device<'t>>, BusError<T::Error>> {
        self.coordinator.get_device(address, options)
    }

    /// Broadcast SWRST with the lock held.
    pub fn software_reset(&mut self) -> Result<(), BusError<T::Error>> {
        self.coordinator.software_reset()
    }

    /// Release the lock now, reporting misuse that happened underneath.
    pub fn release(self) -> Result<(), BusError<T::Error>> {
        let this = ManuallyDrop::new(self);
        this.coordinator.release_generation(this.generation)
    }
}

impl<M: RawMutex, T: Transport> Drop for BusGuard<'_, '_, M, T> {
    fn drop(&mut self) {
        if self.coordinator.release_generation(self.generation).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("i2c bus guard dropped after its lock was released");
        }
    }
}
