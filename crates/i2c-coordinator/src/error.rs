use crate::address::Address;
use crate::config::BusNumber;

/// Errors that can occur during bus operations.
///
/// `E` is the error type of the [`Transport`](crate::Transport) the
/// coordinator was built with. Transport failures are wrapped with the
/// operation context and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<E: core::fmt::Debug> {
    /// No bus number is configured and the platform reports no default bus.
    BusUnavailable(E),
    /// The transport could not build a handle for `address` on `bus`.
    DeviceUnavailable {
        address: Address,
        bus: BusNumber,
        source: E,
    },
    /// The general-call SWRST broadcast failed. `bus` is `None` when no bus
    /// could be resolved, otherwise the general call address could not be
    /// opened on it or the write was refused.
    ResetFailed {
        bus: Option<BusNumber>,
        source: E,
    },
    /// The bus lock was released while not held.
    IllegalState,
    /// The deadline elapsed before the bus lock could be taken.
    Timeout,
}

impl<E: core::fmt::Debug> BusError<E> {
    /// Returns the underlying transport error, if any.
    pub fn transport_error(&self) -> Option<&E> {
        match self {
            BusError::BusUnavailable(source)
            | BusError::DeviceUnavailable { source, .. }
            | BusError::ResetFailed { source, .. } => Some(source),
            BusError::IllegalState | BusError::Timeout => None,
        }
    }
}

impl<E: core::fmt::Debug + core::fmt::Display> core::fmt::Display
    for BusError<E>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BusError::BusUnavailable(err) => {
                write!(f, "no usable I2C bus: {}", err)
            }
            BusError::DeviceUnavailable { address, bus, source } => {
                write!(
                    f,
                    "cannot open device {} on bus {}: {}",
                    address, bus, source
                )
            }
            BusError::ResetFailed {
                bus: Some(bus),
                source,
            } => {
                write!(f, "software reset on bus {} failed: {}", bus, source)
            }
            BusError::ResetFailed { bus: None, source } => {
                write!(f, "software reset failed, no usable bus: {}", source)
            }
            BusError::IllegalState => {
                write!(f, "bus lock released while not held")
            }
            BusError::Timeout => {
                write!(f, "timed out waiting for the bus lock")
            }
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Debug + core::fmt::Display> std::error::Error
    for BusError<E>
{
}
