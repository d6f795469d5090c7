/// A target address on the bus.
///
/// The coordinator never range-checks addresses; a transport that cannot
/// reach an address reports it when the device handle is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Address {
    /// 7-bit address (`0x00..=0x7F` on a conforming bus).
    SevenBit(u8),
    /// 10-bit address (`0x000..=0x3FF` on a conforming bus).
    TenBit(u16),
}

impl Address {
    /// Reserved broadcast address every listening device responds to.
    pub const GENERAL_CALL: Address = Address::SevenBit(0x00);

    /// Returns `true` if the address fits its addressing mode.
    pub const fn is_in_range(self) -> bool {
        match self {
            Address::SevenBit(addr) => addr <= 0x7F,
            Address::TenBit(addr) => addr <= 0x3FF,
        }
    }
}

impl From<u8> for Address {
    fn from(addr: u8) -> Self {
        Address::SevenBit(addr)
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Address::SevenBit(addr) => write!(f, "0x{:02X}", addr),
            Address::TenBit(addr) => write!(f, "0x{:03X} (10-bit)", addr),
        }
    }
}
