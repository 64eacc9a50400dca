//! Double-buffered chain driver.
//!
//! Application code draws into one buffer while the transport pushes the
//! other one out to the chips. [`PwmChain::swap_and_transmit`] is the only
//! hand-over point: it waits until the previous pass is done, flips the
//! buffer roles and starts the next pass.
//!
//! All methods take `&self` so the driver can sit in a `static` shared by
//! the application loop and the transport's completion interrupt. The state
//! lives behind a `critical-section` mutex; every access is short and never
//! waits on the bus, except for transports that complete synchronously.

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_time::Duration;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs as AsyncDelayNs;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::buffer::DoubleBuffer;
use crate::device::{ChainConfig, bring_up, set_output_enable};
use crate::error::{Error, SwapError};
use crate::frame::ChannelCycles;
use crate::gamma::Brightness;
use crate::sequencer::{Cursor, Route, Sequencer, Stats};
use crate::transport::{Ticket, Transport};

/// Granularity of the swap wait
const POLL_INTERVAL: Duration = Duration::from_millis(1);

struct ChainState<T, const DEVICES: usize> {
    transport: T,
    buffers: DoubleBuffer<DEVICES>,
    sequencer: Sequencer,
}

impl<T: Transport, const DEVICES: usize> ChainState<T, DEVICES> {
    /// Swap roles and start a pass if nothing is in flight
    fn try_swap(&mut self, addresses: &[u8; DEVICES], persistent: bool) -> bool {
        if !self.sequencer.is_idle() {
            return false;
        }
        self.buffers.swap(persistent);
        let route = Route {
            addresses,
            frames: self.buffers.transmit(),
        };
        self.sequencer.begin(&mut self.transport, &route);
        true
    }

    /// Give up on the outstanding pass and reset the bus
    fn abandon_pass(&mut self) {
        #[cfg(feature = "esp32-log")]
        println!(
            "[PwmChain.swap] timed out waiting for {:?}, abandoning pass",
            self.sequencer.cursor()
        );
        self.sequencer.force_idle();
        if let Err(_err) = self.transport.reinitialize() {
            #[cfg(feature = "esp32-log")]
            println!("[PwmChain.swap] bus reinitialization failed: {:?}", _err);
        }
    }
}

/// Driver for a chain of PCA9685-style PWM chips
pub struct PwmChain<T, O, const DEVICES: usize> {
    addresses: [u8; DEVICES],
    persistent: bool,
    state: Mutex<RefCell<ChainState<T, DEVICES>>>,
    output_enable: Mutex<RefCell<Option<O>>>,
}

impl<T: Transport, O: OutputPin, const DEVICES: usize> PwmChain<T, O, DEVICES> {
    /// Total number of channels in the chain
    pub const CHANNEL_COUNT: usize = DoubleBuffer::<DEVICES>::CHANNEL_COUNT;

    /// Validate the configuration and bring every chip up.
    ///
    /// The optional active-low output-enable line is held inactive until all
    /// chips are configured, then enabled. Both buffers start silent, so a
    /// swap before any write sends zero duty to every channel.
    pub fn new<D: DelayNs>(
        mut transport: T,
        config: &ChainConfig<DEVICES>,
        mut output_enable: Option<O>,
        delay: &mut D,
    ) -> Result<Self, Error<T::Error>> {
        let addresses = config.addresses()?;

        if let Some(pin) = output_enable.as_mut() {
            if set_output_enable(pin, false).is_err() {
                return Err(Error::OutputEnable);
            }
        }
        bring_up(&mut transport, &addresses, config.output_mode, delay)?;
        if let Some(pin) = output_enable.as_mut() {
            if set_output_enable(pin, true).is_err() {
                return Err(Error::OutputEnable);
            }
        }

        Ok(Self {
            addresses,
            persistent: config.persistent,
            state: Mutex::new(RefCell::new(ChainState {
                transport,
                buffers: DoubleBuffer::new(),
                sequencer: Sequencer::new(),
            })),
            output_enable: Mutex::new(RefCell::new(output_enable)),
        })
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ChainState<T, DEVICES>) -> R) -> R {
        critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            f(&mut state)
        })
    }

    /// Total number of channels in the chain
    pub const fn channel_count(&self) -> usize {
        Self::CHANNEL_COUNT
    }

    /// Set raw PWM cycles (0-4095) of a channel in the draw buffer.
    ///
    /// Out-of-range indices are ignored.
    pub fn set_channel_raw(&self, index: usize, cycles: u16) {
        self.with_state(|state| state.buffers.set_raw(index, cycles));
    }

    /// Set gamma corrected brightness of a channel in the draw buffer
    pub fn set_channel<B: Brightness>(&self, index: usize, brightness: B) {
        self.set_channel_raw(index, brightness.cycles());
    }

    /// Set raw PWM cycles of every channel in the draw buffer
    pub fn set_all_raw(&self, cycles: u16) {
        self.with_state(|state| state.buffers.set_all_raw(cycles));
    }

    /// Set gamma corrected brightness of every channel in the draw buffer
    pub fn set_all<B: Brightness>(&self, brightness: B) {
        self.set_all_raw(brightness.cycles());
    }

    /// Read back a channel from the draw buffer
    pub fn channel(&self, index: usize) -> Option<ChannelCycles> {
        self.with_state(|state| state.buffers.channel(index))
    }

    /// Current sequencer position
    pub fn cursor(&self) -> Cursor {
        self.with_state(|state| state.sequencer.cursor())
    }

    /// Check if no pass is in flight
    pub fn is_idle(&self) -> bool {
        self.with_state(|state| state.sequencer.is_idle())
    }

    /// Pipeline counters since bring-up
    pub fn stats(&self) -> Stats {
        self.with_state(|state| state.sequencer.stats())
    }

    /// Wait for the previous pass, swap buffers and start sending.
    ///
    /// Blocks for at most `timeout`, polling once per millisecond. On timeout
    /// the outstanding pass is abandoned, the transport is reinitialized and
    /// `SwapError::Timeout` is returned; the next call starts clean.
    pub fn swap_and_transmit<D: DelayNs>(
        &self,
        timeout: Duration,
        delay: &mut D,
    ) -> Result<(), SwapError> {
        let mut waited = Duration::from_millis(0);
        while waited < timeout {
            if self.try_swap() {
                return Ok(());
            }
            delay.delay_ms(1);
            waited += POLL_INTERVAL;
        }
        self.swap_or_abandon()
    }

    /// Async version of [`swap_and_transmit`](Self::swap_and_transmit)
    pub async fn swap_and_transmit_async<D: AsyncDelayNs>(
        &self,
        timeout: Duration,
        delay: &mut D,
    ) -> Result<(), SwapError> {
        let mut waited = Duration::from_millis(0);
        while waited < timeout {
            if self.try_swap() {
                return Ok(());
            }
            delay.delay_ms(1).await;
            waited += POLL_INTERVAL;
        }
        self.swap_or_abandon()
    }

    fn try_swap(&self) -> bool {
        self.with_state(|state| state.try_swap(&self.addresses, self.persistent))
    }

    /// Last attempt once the timeout has run out
    fn swap_or_abandon(&self) -> Result<(), SwapError> {
        self.with_state(|state| {
            if state.try_swap(&self.addresses, self.persistent) {
                return Ok(());
            }
            state.abandon_pass();
            Err(SwapError::Timeout)
        })
    }

    /// Report that the transfer identified by `ticket` has finished.
    ///
    /// Call this from the transport's completion context. Submits the next
    /// chip's frame, or returns the pipeline to idle after the last chip.
    pub fn on_transfer_complete(&self, ticket: Ticket) {
        self.with_state(|state| {
            let route = Route {
                addresses: &self.addresses,
                frames: state.buffers.transmit(),
            };
            state
                .sequencer
                .complete(ticket, &mut state.transport, &route);
        });
    }

    /// Enable or disable all outputs through the output-enable line.
    ///
    /// Does nothing if the chain has no output-enable line.
    pub fn set_outputs_enabled(&self, enabled: bool) -> Result<(), Error<T::Error>> {
        critical_section::with(|cs| {
            let mut pin = self.output_enable.borrow(cs).borrow_mut();
            match pin.as_mut() {
                Some(pin) => set_output_enable(pin, enabled).map_err(|_| Error::OutputEnable),
                None => Ok(()),
            }
        })
    }

    /// Tear the driver down and return its collaborators
    pub fn release(self) -> (T, Option<O>) {
        let state = self.state.into_inner().into_inner();
        (state.transport, self.output_enable.into_inner().into_inner())
    }
}
