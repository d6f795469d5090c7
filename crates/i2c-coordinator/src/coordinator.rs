use core::cell::RefCell;
use core::future::{poll_fn, Future};
use core::task::{Context, Poll};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

use crate::address::Address;
use crate::config::{BusConfig, BusNumber};
use crate::error::BusError;
use crate::guard::BusGuard;
use crate::handle::DeviceHandle;
use crate::transport::{DeviceOptions, RawDevice, Transport};

/// Software reset opcode sent to the general call address.
pub const SWRST: u8 = 0x06;

/// Waiters parked on the lock before older ones get woken to make room.
const MAX_WAITERS: usize = 8;

/// Lock state, only touched inside the blocking mutex.
struct LockState {
    locked: bool,
    /// Bumped on every acquisition so a stale guard cannot release a
    /// later holder's lock.
    generation: u32,
    wakers: MultiWakerRegistration<MAX_WAITERS>,
}

impl LockState {
    fn take(&mut self) {
        self.locked = true;
        self.generation = self.generation.wrapping_add(1);
    }

    fn unlock(&mut self) {
        self.locked = false;
        self.wakers.wake();
    }
}

/// Drive `fut` to completion on the current thread.
///
/// With `std` the thread parks until woken; without it the future is
/// polled in a loop.
fn block_on<F: Future>(fut: F) -> F::Output {
    #[cfg(feature = "std")]
    {
        futures::executor::block_on(fut)
    }
    #[cfg(not(feature = "std"))]
    {
        embassy_futures::block_on(fut)
    }
}

/// Serializes access to one shared bus.
///
/// Holds a binary, non-reentrant lock and a borrow of the transport. Callers
/// take the lock with [`acquire`](Self::acquire) (or [`lock`](Self::lock)
/// from async code), open devices with [`get_device`](Self::get_device),
/// then [`release`](Self::release). [`access`](Self::access) does the same
/// with an RAII guard.
///
/// `M` guards the lock bookkeeping only; pick `CriticalSectionRawMutex`
/// when callers live on different threads or interrupt priorities.
pub struct BusCoordinator<'t, M: RawMutex, T: Transport> {
    config: BusConfig,
    transport: &'t T,
    state: Mutex<M, RefCell<LockState>>,
}

impl<'t, M: RawMutex, T: Transport> BusCoordinator<'t, M, T> {
    /// Create a coordinator for `transport` with a fixed configuration.
    pub const fn new(config: BusConfig, transport: &'t T) -> Self {
        Self {
            config,
            transport,
            state: Mutex::new(RefCell::new(LockState {
                locked: false,
                generation: 0,
                wakers: MultiWakerRegistration::new(),
            })),
        }
    }

    fn try_lock(&self) -> bool {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.locked {
                false
            } else {
                state.take();
                true
            }
        })
    }

    fn poll_lock(&self, cx: &mut Context<'_>) -> Poll<()> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.locked {
                state.wakers.register(cx.waker());
                Poll::Pending
            } else {
                state.take();
                Poll::Ready(())
            }
        })
    }

    /// Wait until the bus lock is taken.
    ///
    /// Dropping the future before it completes leaves the lock untouched.
    pub async fn lock(&self) {
        poll_fn(|cx| self.poll_lock(cx)).await;
        #[cfg(feature = "defmt")]
        defmt::trace!("i2c bus lock taken");
    }

    /// Take the bus lock.
    ///
    /// With `blocking` the call waits as long as it takes and always returns
    /// `true`; with the `std` feature the thread sleeps while it waits.
    /// Without `blocking`, returns `false` at once if the lock is held.
    ///
    /// The lock is not reentrant: a holder calling this again deadlocks
    /// (blocking) or gets `false`.
    pub fn acquire(&self, blocking: bool) -> bool {
        if blocking {
            block_on(self.lock());
            true
        } else {
            self.try_lock()
        }
    }

    /// Take the bus lock unless `deadline` completes first.
    ///
    /// `deadline` is any future, typically a timer. On
    /// [`BusError::Timeout`] the lock has not been taken.
    pub async fn acquire_within<D: Future>(
        &self,
        deadline: D,
    ) -> Result<(), BusError<T::Error>> {
        match select(self.lock(), deadline).await {
            Either::First(()) => Ok(()),
            Either::Second(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("timed out waiting for i2c bus lock");
                Err(BusError::Timeout)
            }
        }
    }

    /// Release the bus lock and wake the waiters.
    ///
    /// Returns [`BusError::IllegalState`] if the lock is not held. The
    /// holder is not tracked, so a release by anyone other than the holder
    /// goes unnoticed.
    pub fn release(&self) -> Result<(), BusError<T::Error>> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if !state.locked {
                #[cfg(feature = "defmt")]
                defmt::error!("i2c bus lock released while not held");
                return Err(BusError::IllegalState);
            }
            state.unlock();
            Ok(())
        })
    }

    /// Generation of the current acquisition. Only meaningful while held.
    pub(crate) fn generation(&self) -> u32 {
        self.state.lock(|state| state.borrow().generation)
    }

    /// Release on behalf of the acquisition numbered `generation`.
    ///
    /// Fails with [`BusError::IllegalState`] if that acquisition already
    /// ended, leaving any newer holder untouched.
    pub(crate) fn release_generation(
        &self,
        generation: u32,
    ) -> Result<(), BusError<T::Error>> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if !state.locked || state.generation != generation {
                #[cfg(feature = "defmt")]
                defmt::error!("stale i2c bus guard released");
                return Err(BusError::IllegalState);
            }
            state.unlock();
            Ok(())
        })
    }

    /// Returns `true` if someone holds the bus lock right now.
    pub fn is_locked(&self) -> bool {
        self.state.lock(|state| state.borrow().locked)
    }

    /// Take the bus lock and return a guard that releases it on drop.
    pub async fn access(&self) -> BusGuard<'_, 't, M, T> {
        self.lock().await;
        BusGuard::new(self)
    }

    /// Blocking form of [`access`](Self::access).
    pub fn access_blocking(&self) -> BusGuard<'_, 't, M, T> {
        block_on(self.access())
    }

    /// Take the bus lock if it is free.
    pub fn try_access(&self) -> Option<BusGuard<'_, 't, M, T>> {
        self.try_lock().then(|| BusGuard::new(self))
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// The shared transport this coordinator drives.
    pub fn transport(&self) -> &'t T {
        self.transport
    }

    /// Bus number in use: configured, or the platform default.
    ///
    /// Does not need the lock.
    pub fn get_bus_number(&self) -> Result<BusNumber, BusError<T::Error>> {
        self.config.resolve(self.transport)
    }

    /// Open the device at `address`.
    ///
    /// Does not take the lock; hold it while the handle is in use.
    /// `options.transport` reaches the transport unchanged.
    pub fn get_device(
        &self,
        address: Address,
        options: DeviceOptions<T::Options>,
    ) -> Result<DeviceHandle<T::Device<'t>>, BusError<T::Error>> {
        let bus = match options.bus_number {
            Some(bus) => bus,
            None => self.get_bus_number()?,
        };
        let transport: &'t T = self.transport;
        let device = transport
            .device(address, bus, &options.transport)
            .map_err(|source| {
                #[cfg(feature = "defmt")]
                defmt::warn!("no device {} on i2c bus {}", address, bus);
                BusError::DeviceUnavailable { address, bus, source }
            })?;
        Ok(DeviceHandle::new(address, bus, device))
    }

    /// [`get_device`](Self::get_device) with default options.
    pub fn device(
        &self,
        address: Address,
    ) -> Result<DeviceHandle<T::Device<'t>>, BusError<T::Error>> {
        self.get_device(address, DeviceOptions::default())
    }

    pub fn requires_repeated_start(&self) -> bool {
        self.transport.requires_repeated_start()
    }

    /// Broadcast SWRST to every device on the bus.
    ///
    /// The caller must hold the lock. Any failure, whether no bus can be
    /// resolved, the general call address cannot be opened or the write is
    /// not acknowledged, is reported as [`BusError::ResetFailed`] with the
    /// transport error attached. At most one write is attempted and it is
    /// not retried, since devices mid-reset may not acknowledge.
    pub fn software_reset(&self) -> Result<(), BusError<T::Error>> {
        #[cfg(feature = "defmt")]
        if !self.is_locked() {
            defmt::warn!("software reset issued without holding the i2c bus lock");
        }

        let bus = match self.config.bus_number {
            Some(bus) => bus,
            None => self.transport.default_bus().map_err(|source| {
                BusError::ResetFailed { bus: None, source }
            })?,
        };
        let failed = |source| BusError::ResetFailed { bus: Some(bus), source };

        let transport: &'t T = self.transport;
        let mut general_call = transport
            .device(Address::GENERAL_CALL, bus, &T::Options::default())
            .map_err(failed)?;
        general_call.write_raw_byte(SWRST).map_err(failed)?;

        #[cfg(feature = "defmt")]
        defmt::info!("software reset sent on i2c bus {}", bus);
        Ok(())
    }
}
