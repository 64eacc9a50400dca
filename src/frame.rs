//! Per-device transmit frame layout.
//!
//! A frame is the exact byte sequence written to one chip in a single bus
//! transaction: the `LED0_ON_L` register pointer followed by a little-endian
//! `(on, off)` cycle pair for each of the 16 channels. The chip auto-increments
//! the register pointer, so one write updates every channel.

use crate::device::LED0_ON_L;

/// Number of PWM channels on one chip
pub const CHANNELS_PER_DEVICE: usize = 16;

/// Number of cycles in one PWM period
pub const CYCLES_PER_PERIOD: u16 = 4096;

/// Highest cycle count a channel can be set to (fully on)
pub const MAX_CYCLES: u16 = CYCLES_PER_PERIOD - 1;

/// "Full on" flag in the on-cycle field (`LEDn_ON_H` bit 4)
pub const FULL_ON: u16 = 0x1000;

/// Size of one frame in bytes: register pointer + 4 bytes per channel
pub const FRAME_LEN: usize = 1 + CHANNELS_PER_DEVICE * BYTES_PER_CHANNEL;

const BYTES_PER_CHANNEL: usize = 4;
const CYCLE_MASK: u16 = 0x0FFF;
const START_CYCLE_STEP: usize = 4;

/// Position of a flat channel index inside the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLocation {
    /// Index of the chip in the chain
    pub device: usize,
    /// Channel on that chip
    pub channel: usize,
}

impl ChannelLocation {
    /// Locate a flat channel index
    pub const fn of(index: usize) -> Self {
        Self {
            device: index / CHANNELS_PER_DEVICE,
            channel: index % CHANNELS_PER_DEVICE,
        }
    }

    /// Flat channel index of this location
    pub const fn index(self) -> usize {
        self.device * CHANNELS_PER_DEVICE + self.channel
    }
}

/// Staggered phase offset for a channel.
///
/// Spreads switching edges over the period so that channels at the same
/// duty cycle don't all turn on at once.
#[allow(clippy::cast_possible_truncation)]
pub const fn start_cycle_for(index: usize) -> u16 {
    ((index * START_CYCLE_STEP) % CYCLES_PER_PERIOD as usize) as u16
}

/// On/off cycle pair of a single channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCycles {
    /// Cycle at which the output turns on, with optional [`FULL_ON`] flag
    pub on: u16,
    /// Cycle at which the output turns off
    pub off: u16,
}

impl ChannelCycles {
    /// Build a pair starting at `start` that stays on for `cycles`.
    ///
    /// `cycles` above [`MAX_CYCLES`] saturate.
    pub const fn new(start: u16, cycles: u16) -> Self {
        let cycles = if cycles > MAX_CYCLES { MAX_CYCLES } else { cycles };
        let start = start & CYCLE_MASK;
        let off = (start + cycles) & CYCLE_MASK;
        let on = if cycles == MAX_CYCLES {
            start | FULL_ON
        } else {
            start
        };
        Self { on, off }
    }

    /// Start cycle without the full-on flag
    pub const fn start(self) -> u16 {
        self.on & CYCLE_MASK
    }

    /// Check if the full-on flag is set
    pub const fn is_full_on(self) -> bool {
        self.on & FULL_ON != 0
    }

    /// Number of cycles the output is on
    pub const fn duty(self) -> u16 {
        if self.is_full_on() {
            return MAX_CYCLES;
        }
        self.off.wrapping_sub(self.start()) & CYCLE_MASK
    }
}

/// Transmit frame of one chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    /// Create a silent frame for the chip at `device`.
    ///
    /// Every channel gets its staggered start cycle and zero duty.
    pub const fn new(device: usize) -> Self {
        let mut frame = Self {
            bytes: [0; FRAME_LEN],
        };
        frame.bytes[0] = LED0_ON_L;
        let first = device * CHANNELS_PER_DEVICE;
        let mut channel = 0;
        while channel < CHANNELS_PER_DEVICE {
            let cycles = ChannelCycles::new(start_cycle_for(first + channel), 0);
            frame.set_channel(channel, cycles);
            channel += 1;
        }
        frame
    }

    /// Raw bytes to put on the bus
    pub const fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read back a channel's cycle pair
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not below [`CHANNELS_PER_DEVICE`].
    pub const fn channel(&self, channel: usize) -> ChannelCycles {
        assert!(channel < CHANNELS_PER_DEVICE, "channel out of range");
        let offset = 1 + channel * BYTES_PER_CHANNEL;
        let b = &self.bytes;
        ChannelCycles {
            on: u16::from_le_bytes([b[offset], b[offset + 1]]),
            off: u16::from_le_bytes([b[offset + 2], b[offset + 3]]),
        }
    }

    /// Overwrite a channel's cycle pair
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not below [`CHANNELS_PER_DEVICE`].
    pub const fn set_channel(&mut self, channel: usize, cycles: ChannelCycles) {
        assert!(channel < CHANNELS_PER_DEVICE, "channel out of range");
        let offset = 1 + channel * BYTES_PER_CHANNEL;
        let [on_l, on_h] = cycles.on.to_le_bytes();
        let [off_l, off_h] = cycles.off.to_le_bytes();
        self.bytes[offset] = on_l;
        self.bytes[offset + 1] = on_h;
        self.bytes[offset + 2] = off_l;
        self.bytes[offset + 3] = off_h;
    }
}
