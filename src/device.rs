//! Chip registers, chain configuration and one-time bring-up.

#[cfg(feature = "esp32-log")]
use esp_println::println;

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::error::{ConfigError, Error};
use crate::transport::Transport;

/// Default 7-bit address of a chip with all address pins low
pub const BASE_ADDRESS: u8 = 0x40;

/// Highest offset selectable with the A0-A5 pins
pub const MAX_ADDRESS_OFFSET: u8 = 0x3F;

/// Sleep and auto-increment control register
pub const MODE1: u8 = 0x00;
/// Output stage control register
pub const MODE2: u8 = 0x01;
/// First channel register; a frame is written starting here
pub const LED0_ON_L: u8 = 0x06;

const MODE1_AUTO_INCREMENT: u8 = 0x20;
const MODE2_INVERT: u8 = 0x10;
const MODE2_CHANGE_ON_ACK: u8 = 0x08;
const MODE2_TOTEM_POLE: u8 = 0x04;
const MODE2_HIGH_IMPEDANCE: u8 = 0x02;

/// Oscillator start-up time after leaving sleep (datasheet: 500 us)
const WAKE_DELAY_US: u32 = 500;

/// Output stage of the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDriver {
    OpenDrain,
    TotemPole,
}

/// When new cycle values take effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOn {
    /// At the I2C STOP condition, so a whole frame changes at once
    Stop,
    /// On every byte acknowledge
    Ack,
}

/// Output configuration written to `MODE2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    /// Invert output logic (for LEDs wired to the supply)
    pub inverted: bool,
    pub driver: OutputDriver,
    pub update: UpdateOn,
    /// Put outputs in high impedance while output-enable is inactive
    pub high_impedance_when_disabled: bool,
}

impl OutputMode {
    pub const fn new() -> Self {
        Self {
            inverted: false,
            driver: OutputDriver::TotemPole,
            update: UpdateOn::Stop,
            high_impedance_when_disabled: true,
        }
    }

    /// `MODE2` register value
    pub const fn mode2(self) -> u8 {
        let mut value = 0;
        if self.inverted {
            value |= MODE2_INVERT;
        }
        if matches!(self.update, UpdateOn::Ack) {
            value |= MODE2_CHANGE_ON_ACK;
        }
        if matches!(self.driver, OutputDriver::TotemPole) {
            value |= MODE2_TOTEM_POLE;
        }
        if self.high_impedance_when_disabled {
            value |= MODE2_HIGH_IMPEDANCE;
        }
        value
    }
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of a chip chain
#[derive(Debug, Clone)]
pub struct ChainConfig<const DEVICES: usize> {
    /// Address of a chip with all address pins low
    pub base_address: u8,
    /// Address pin setting of every chip, in chain order
    pub address_offsets: [u8; DEVICES],
    /// Carry untouched channel values over to the next frame
    pub persistent: bool,
    pub output_mode: OutputMode,
}

impl<const DEVICES: usize> ChainConfig<DEVICES> {
    /// Create a persistent configuration with default output mode
    pub const fn new(address_offsets: [u8; DEVICES]) -> Self {
        Self {
            base_address: BASE_ADDRESS,
            address_offsets,
            persistent: true,
            output_mode: OutputMode::new(),
        }
    }

    #[must_use]
    pub const fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    #[must_use]
    pub const fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    #[must_use]
    pub const fn with_base_address(mut self, base_address: u8) -> Self {
        self.base_address = base_address;
        self
    }

    /// Resolve the bus address of every chip
    pub fn addresses(&self) -> Result<[u8; DEVICES], ConfigError> {
        if DEVICES == 0 {
            return Err(ConfigError::NoDevices);
        }
        let mut addresses = [0; DEVICES];
        for (device, &offset) in self.address_offsets.iter().enumerate() {
            if offset > MAX_ADDRESS_OFFSET {
                return Err(ConfigError::AddressOutOfRange { device, offset });
            }
            let address = self.base_address | offset;
            if addresses[..device].contains(&address) {
                return Err(ConfigError::DuplicateAddress { address });
            }
            addresses[device] = address;
        }
        Ok(addresses)
    }
}

/// Placeholder for chains without an output-enable line
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOutputEnable;

impl ErrorType for NoOutputEnable {
    type Error = Infallible;
}

impl OutputPin for NoOutputEnable {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Drive the active-low output-enable line
pub(crate) fn set_output_enable<O: OutputPin>(pin: &mut O, enabled: bool) -> Result<(), O::Error> {
    if enabled { pin.set_low() } else { pin.set_high() }
}

/// Wake every chip and configure auto-increment and output mode
pub(crate) fn bring_up<T: Transport, D: DelayNs>(
    transport: &mut T,
    addresses: &[u8],
    mode: OutputMode,
    delay: &mut D,
) -> Result<(), Error<T::Error>> {
    for &address in addresses {
        // Clearing SLEEP wakes the oscillator
        transport
            .write_blocking(address, &[MODE1, MODE1_AUTO_INCREMENT])
            .map_err(Error::Bus)?;
        delay.delay_us(WAKE_DELAY_US);
        transport
            .write_blocking(address, &[MODE2, mode.mode2()])
            .map_err(Error::Bus)?;
        #[cfg(feature = "esp32-log")]
        println!("[bring_up] chip at {:#04x} ready", address);
    }
    Ok(())
}
