//! Frame pacing for the swap cadence.
//!
//! Provides portable frame pacing without platform-specific timers.
//! The caller is responsible for sleeping/waiting between frames.

use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::driver::PwmChain;
use crate::error::SwapError;
use crate::transport::Transport;

/// Default target frame rate (60 FPS).
pub const DEFAULT_FPS: u32 = 60;

/// Default frame duration based on target FPS.
pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(1000 / DEFAULT_FPS as u64);

/// Default time a swap may wait for the previous pass.
pub const DEFAULT_SWAP_TIMEOUT: Duration = Duration::from_millis(10);

/// Result of a frame tick operation.
#[derive(Debug, Clone, Copy)]
pub struct FrameResult {
    /// Outcome of this frame's swap.
    pub swap: Result<(), SwapError>,
    /// The deadline for the next frame.
    pub next_deadline: Instant,
    /// How long to wait until the next frame (may be zero if behind schedule).
    pub sleep_duration: Duration,
}

/// Scheduler that pushes the draw buffer out at a fixed rate.
///
/// This scheduler:
/// - Tracks frame timing with drift correction
/// - Swaps and transmits once per frame
/// - Counts frames dropped on swap timeout
/// - Returns timing info so the caller can sleep appropriately
///
/// # Usage
///
/// ```ignore
/// let mut scheduler = FrameScheduler::new(&CHAIN);
///
/// loop {
///     draw(&CHAIN);
///     let result = scheduler.tick(Instant::now(), &mut delay);
///     delay.delay_ms(result.sleep_duration.as_millis() as u32);
/// }
/// ```
pub struct FrameScheduler<'a, T, O, const DEVICES: usize> {
    chain: &'a PwmChain<T, O, DEVICES>,
    next_frame: Instant,
    frame_duration: Duration,
    swap_timeout: Duration,
    dropped_frames: u32,
}

impl<'a, T: Transport, O: OutputPin, const DEVICES: usize> FrameScheduler<'a, T, O, DEVICES> {
    /// Create a new frame scheduler.
    ///
    /// Uses `DEFAULT_FRAME_DURATION` (60 FPS) and `DEFAULT_SWAP_TIMEOUT`.
    pub const fn new(chain: &'a PwmChain<T, O, DEVICES>) -> Self {
        Self::with_timings(chain, DEFAULT_FRAME_DURATION, DEFAULT_SWAP_TIMEOUT)
    }

    /// Create a new frame scheduler with custom timings.
    pub const fn with_timings(
        chain: &'a PwmChain<T, O, DEVICES>,
        frame_duration: Duration,
        swap_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            next_frame: Instant::from_millis(0),
            frame_duration,
            swap_timeout,
            dropped_frames: 0,
        }
    }

    /// Push one frame and return timing information.
    ///
    /// This method:
    /// 1. Applies drift correction if we've fallen too far behind
    /// 2. Swaps buffers and starts the transfer
    /// 3. Returns the deadline for the next frame
    ///
    /// The caller is responsible for waiting until `next_deadline` before
    /// calling `tick` again.
    pub fn tick<D: DelayNs>(&mut self, now: Instant, delay: &mut D) -> FrameResult {
        // Drift correction: if we've fallen too far behind, reset to now
        // This prevents catch-up bursts after long stalls
        let max_drift = self.frame_duration * 2;
        if now > self.next_frame + max_drift {
            self.next_frame = now;
        }

        let swap = self.chain.swap_and_transmit(self.swap_timeout, delay);
        if swap.is_err() {
            self.dropped_frames = self.dropped_frames.wrapping_add(1);
        }

        self.next_frame += self.frame_duration;

        let sleep_duration = if self.next_frame > now {
            self.next_frame - now
        } else {
            Duration::from_millis(0)
        };

        FrameResult {
            swap,
            next_deadline: self.next_frame,
            sleep_duration,
        }
    }

    /// Number of frames dropped because the previous pass did not finish.
    pub const fn dropped_frames(&self) -> u32 {
        self.dropped_frames
    }

    /// Get a reference to the driven chain.
    pub const fn chain(&self) -> &'a PwmChain<T, O, DEVICES> {
        self.chain
    }
}
