//! [`Transport`] over Linux `/dev/i2c-N` character devices.

use std::fmt;
use std::fs;

use i2cdev::core::{I2CDevice, I2CMessage, I2CTransfer};
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError, LinuxI2CMessage};
use tracing::{debug, warn};

use crate::address::Address;
use crate::config::BusNumber;
use crate::transport::{RawDevice, Transport};

const CPUINFO_PATH: &str = "/proc/cpuinfo";
const DT_MODEL_PATH: &str = "/proc/device-tree/model";

/// Board family, used to pick the default bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Raspberry Pi; `revision` is 1 for the earliest boards.
    RaspberryPi { revision: u8 },
    BeagleBone,
    Unknown,
}

impl Platform {
    /// Detect the running board.
    pub fn detect() -> Self {
        let cpuinfo = fs::read_to_string(CPUINFO_PATH).unwrap_or_default();
        let model = fs::read_to_string(DT_MODEL_PATH).ok();
        let platform = Self::from_sources(&cpuinfo, model.as_deref());
        debug!(?platform, "detected i2c platform");
        platform
    }

    /// Classify a board from `/proc/cpuinfo` and the device-tree model.
    pub fn from_sources(cpuinfo: &str, model: Option<&str>) -> Self {
        let model = model.unwrap_or("").trim_end_matches('\0');
        let hardware = cpuinfo_field(cpuinfo, "Hardware").unwrap_or("");

        let is_pi = model.contains("Raspberry Pi")
            || matches!(
                hardware,
                "BCM2708" | "BCM2709" | "BCM2711" | "BCM2835" | "BCM2836"
                    | "BCM2837"
            );
        if is_pi {
            return Platform::RaspberryPi {
                revision: pi_revision(cpuinfo),
            };
        }

        if model.contains("BeagleBone") || hardware.contains("AM33XX") {
            return Platform::BeagleBone;
        }

        Platform::Unknown
    }

    pub fn default_bus(self) -> Option<BusNumber> {
        match self {
            Platform::RaspberryPi { revision: 1 } => Some(0),
            Platform::RaspberryPi { .. } => Some(1),
            Platform::BeagleBone => Some(1),
            Platform::Unknown => None,
        }
    }
}

fn cpuinfo_field<'a>(cpuinfo: &'a str, key: &str) -> Option<&'a str> {
    cpuinfo.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name.trim() == key).then(|| value.trim())
    })
}

/// Board revision 1 has revision codes `0000`, `0002` or `0003` in the
/// last four digits; everything later is treated as revision 2.
fn pi_revision(cpuinfo: &str) -> u8 {
    let code = cpuinfo_field(cpuinfo, "Revision").unwrap_or("");
    let tail = code.get(code.len().saturating_sub(4)..).unwrap_or("");
    match tail {
        "0000" | "0002" | "0003" => 1,
        _ => 2,
    }
}

/// Errors reported by [`LinuxTransport`].
#[derive(Debug)]
pub enum LinuxError {
    /// The board is not one with a known default bus.
    NoDefaultBus,
    /// Ten-bit addressing is not supported by this transport.
    InvalidAddress(Address),
    /// The kernel driver failed.
    I2c(LinuxI2CError),
}

impl fmt::Display for LinuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinuxError::NoDefaultBus => {
                write!(f, "could not determine default I2C bus for platform")
            }
            LinuxError::InvalidAddress(address) => {
                write!(f, "address {} not supported", address)
            }
            LinuxError::I2c(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for LinuxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinuxError::I2c(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LinuxI2CError> for LinuxError {
    fn from(err: LinuxI2CError) -> Self {
        LinuxError::I2c(err)
    }
}

/// Options forwarded to the kernel device when it is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinuxOptions {
    /// Enable SMBus packet error checking.
    pub smbus_pec: bool,
}

/// Opens `/dev/i2c-{bus}` per device.
#[derive(Debug, Clone, Copy)]
pub struct LinuxTransport {
    platform: Platform,
}

impl LinuxTransport {
    /// Transport for the running board.
    pub fn new() -> Self {
        Self::for_platform(Platform::detect())
    }

    pub const fn for_platform(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

impl Default for LinuxTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LinuxTransport {
    type Error = LinuxError;
    type Options = LinuxOptions;
    type Device<'a> = LinuxDevice;

    fn default_bus(&self) -> Result<BusNumber, LinuxError> {
        self.platform.default_bus().ok_or_else(|| {
            warn!(platform = ?self.platform, "no default i2c bus");
            LinuxError::NoDefaultBus
        })
    }

    fn device(
        &self,
        address: Address,
        bus: BusNumber,
        options: &LinuxOptions,
    ) -> Result<LinuxDevice, LinuxError> {
        let addr = match address {
            Address::SevenBit(addr) if address.is_in_range() => addr,
            _ => return Err(LinuxError::InvalidAddress(address)),
        };

        let path = format!("/dev/i2c-{}", bus);
        let mut dev = LinuxI2CDevice::new(&path, u16::from(addr))?;
        if options.smbus_pec {
            dev.set_smbus_pec(true)?;
        }
        debug!(%path, %address, "opened i2c device");
        Ok(LinuxDevice { dev })
    }

    fn requires_repeated_start(&self) -> bool {
        matches!(self.platform, Platform::RaspberryPi { .. })
    }
}

/// A kernel I2C device bound to one address.
pub struct LinuxDevice {
    dev: LinuxI2CDevice,
}

impl LinuxDevice {
    /// The kernel device, for SMBus calls not covered by [`RawDevice`].
    pub fn inner_mut(&mut self) -> &mut LinuxI2CDevice {
        &mut self.dev
    }
}

impl RawDevice for LinuxDevice {
    type Error = LinuxError;

    fn write(&mut self, bytes: &[u8]) -> Result<(), LinuxError> {
        Ok(self.dev.write(bytes)?)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), LinuxError> {
        Ok(self.dev.read(buffer)?)
    }

    fn write_read(
        &mut self,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), LinuxError> {
        let mut msgs =
            [LinuxI2CMessage::write(bytes), LinuxI2CMessage::read(buffer)];
        self.dev.transfer(&mut msgs)?;
        Ok(())
    }

    fn write_raw_byte(&mut self, value: u8) -> Result<(), LinuxError> {
        Ok(self.dev.smbus_write_byte(value)?)
    }

    fn write_register(
        &mut self,
        register: u8,
        value: u8,
    ) -> Result<(), LinuxError> {
        Ok(self.dev.smbus_write_byte_data(register, value)?)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, LinuxError> {
        Ok(self.dev.smbus_read_byte_data(register)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PI3_CPUINFO: &str = "processor\t: 0\n\
        model name\t: ARMv7 Processor rev 4 (v7l)\n\
        Hardware\t: BCM2835\n\
        Revision\t: a02082\n\
        Serial\t\t: 00000000deadbeef\n";

    const PI1_CPUINFO: &str = "Hardware\t: BCM2708\nRevision\t: 0003\n";

    const BBB_CPUINFO: &str =
        "processor\t: 0\nHardware\t: Generic AM33XX (Flattened Device Tree)\n";

    #[test]
    fn later_pi_defaults_to_bus_one() {
        let platform = Platform::from_sources(PI3_CPUINFO, None);
        assert_eq!(platform, Platform::RaspberryPi { revision: 2 });
        assert_eq!(platform.default_bus(), Some(1));
    }

    #[test]
    fn first_revision_pi_defaults_to_bus_zero() {
        let platform = Platform::from_sources(PI1_CPUINFO, None);
        assert_eq!(platform, Platform::RaspberryPi { revision: 1 });
        assert_eq!(platform.default_bus(), Some(0));
    }

    #[test]
    fn pi_detected_from_device_tree_model() {
        let platform = Platform::from_sources(
            "Revision\t: c03114\n",
            Some("Raspberry Pi 4 Model B Rev 1.4\0"),
        );
        assert_eq!(platform.default_bus(), Some(1));
    }

    #[test]
    fn beaglebone_defaults_to_bus_one() {
        let platform = Platform::from_sources(BBB_CPUINFO, None);
        assert_eq!(platform, Platform::BeagleBone);
        assert_eq!(platform.default_bus(), Some(1));
    }

    #[test]
    fn unknown_board_has_no_default_bus() {
        let transport = LinuxTransport::for_platform(Platform::from_sources(
            "processor\t: 0\nvendor_id\t: GenuineIntel\n",
            None,
        ));
        assert!(matches!(
            transport.default_bus(),
            Err(LinuxError::NoDefaultBus)
        ));
        assert!(!transport.requires_repeated_start());
    }

    #[test]
    fn ten_bit_addresses_are_rejected() {
        let transport = LinuxTransport::for_platform(Platform::BeagleBone);
        let result = transport.device(
            Address::TenBit(0x150),
            1,
            &LinuxOptions::default(),
        );
        assert!(matches!(result, Err(LinuxError::InvalidAddress(_))));
    }
}
