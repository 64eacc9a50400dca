//! Draw/transmit buffer pair.
//!
//! Two frame sets with roles instead of fixed identities. Writers only ever
//! get the draw set; the sequencer only ever reads the transmit set. Roles
//! change by flipping an index, never by copying.

use crate::frame::{CHANNELS_PER_DEVICE, ChannelCycles, ChannelLocation, Frame, start_cycle_for};

/// Frames of every chip in the chain, indexed by device
pub type FrameSet<const DEVICES: usize> = [Frame; DEVICES];

/// Double buffer of chain frames
#[derive(Debug, Clone)]
pub struct DoubleBuffer<const DEVICES: usize> {
    sets: [FrameSet<DEVICES>; 2],
    draw: usize,
}

impl<const DEVICES: usize> DoubleBuffer<DEVICES> {
    /// Total number of channels in the chain
    pub const CHANNEL_COUNT: usize = DEVICES * CHANNELS_PER_DEVICE;

    /// Create a buffer pair with both sets silent
    pub fn new() -> Self {
        let set: FrameSet<DEVICES> = core::array::from_fn(Frame::new);
        Self {
            sets: [set, set],
            draw: 0,
        }
    }

    /// Frames currently in the draw role
    pub fn draw(&self) -> &FrameSet<DEVICES> {
        &self.sets[self.draw]
    }

    /// Frames currently in the transmit role
    pub fn transmit(&self) -> &FrameSet<DEVICES> {
        &self.sets[self.draw ^ 1]
    }

    /// Set raw cycles of a channel in the draw set.
    ///
    /// Returns `false` if `index` is outside the chain.
    pub fn set_raw(&mut self, index: usize, cycles: u16) -> bool {
        if index >= Self::CHANNEL_COUNT {
            return false;
        }
        let location = ChannelLocation::of(index);
        let cycles = ChannelCycles::new(start_cycle_for(index), cycles);
        self.sets[self.draw][location.device].set_channel(location.channel, cycles);
        true
    }

    /// Set raw cycles of every channel in the draw set
    pub fn set_all_raw(&mut self, cycles: u16) {
        for index in 0..Self::CHANNEL_COUNT {
            self.set_raw(index, cycles);
        }
    }

    /// Read back a channel from the draw set
    pub fn channel(&self, index: usize) -> Option<ChannelCycles> {
        if index >= Self::CHANNEL_COUNT {
            return None;
        }
        let location = ChannelLocation::of(index);
        Some(self.draw()[location.device].channel(location.channel))
    }

    /// Exchange draw and transmit roles.
    ///
    /// With `carry_forward` the new draw set starts as a copy of the set that
    /// is about to be transmitted, so untouched channels keep their value.
    pub fn swap(&mut self, carry_forward: bool) {
        self.draw ^= 1;
        if carry_forward {
            self.sets[self.draw] = self.sets[self.draw ^ 1];
        }
    }
}

impl<const DEVICES: usize> Default for DoubleBuffer<DEVICES> {
    fn default() -> Self {
        Self::new()
    }
}
