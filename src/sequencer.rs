//! Transfer sequencer.
//!
//! Walks the chain device by device: submit frame `d`, wait for its
//! completion, submit frame `d + 1`, until every chip has been written. Runs
//! first from the swap call and then from the transport's completion context.

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::buffer::FrameSet;
use crate::transport::{Submission, Ticket, Transport};

/// Position of the sequencer in the current pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// No transfer in flight; the buffers may be swapped
    Idle,
    /// Transfer to this chip is outstanding
    Device(usize),
}

/// Pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Passes started by a successful swap
    pub passes_started: u32,
    /// Passes that reached the last chip
    pub passes_completed: u32,
    /// Passes abandoned because the bus refused a submission
    pub passes_abandoned: u32,
    /// Swaps that gave up waiting for the previous pass
    pub timeouts: u32,
}

/// Bus target of every chip, in chain order
pub(crate) struct Route<'a, const DEVICES: usize> {
    pub(crate) addresses: &'a [u8; DEVICES],
    pub(crate) frames: &'a FrameSet<DEVICES>,
}

#[derive(Debug)]
pub(crate) struct Sequencer {
    cursor: Cursor,
    pass: u32,
    stats: Stats,
}

impl Sequencer {
    pub(crate) const fn new() -> Self {
        Self {
            cursor: Cursor::Idle,
            pass: 0,
            stats: Stats {
                passes_started: 0,
                passes_completed: 0,
                passes_abandoned: 0,
                timeouts: 0,
            },
        }
    }

    pub(crate) const fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub(crate) const fn is_idle(&self) -> bool {
        matches!(self.cursor, Cursor::Idle)
    }

    pub(crate) const fn stats(&self) -> Stats {
        self.stats
    }

    /// Start a new pass from the first chip
    pub(crate) fn begin<T: Transport, const DEVICES: usize>(
        &mut self,
        transport: &mut T,
        route: &Route<'_, DEVICES>,
    ) {
        self.pass = self.pass.wrapping_add(1);
        self.stats.passes_started = self.stats.passes_started.wrapping_add(1);
        self.submit_from(0, transport, route);
    }

    /// Continue the pass after a transfer finished.
    ///
    /// Returns `false` if the ticket does not belong to the outstanding
    /// transfer; such completions are dropped.
    pub(crate) fn complete<T: Transport, const DEVICES: usize>(
        &mut self,
        ticket: Ticket,
        transport: &mut T,
        route: &Route<'_, DEVICES>,
    ) -> bool {
        let expected = match self.cursor {
            Cursor::Device(device) => Ticket::new(self.pass, device),
            Cursor::Idle => {
                #[cfg(feature = "esp32-log")]
                println!("[Sequencer.complete] idle, dropping {:?}", ticket);
                return false;
            }
        };
        if ticket != expected {
            #[cfg(feature = "esp32-log")]
            println!("[Sequencer.complete] expected {:?}, dropping {:?}", expected, ticket);
            return false;
        }
        self.submit_from(expected.device() + 1, transport, route);
        true
    }

    /// Drop the outstanding pass after a swap timeout
    pub(crate) fn force_idle(&mut self) {
        self.cursor = Cursor::Idle;
        self.stats.timeouts = self.stats.timeouts.wrapping_add(1);
    }

    fn submit_from<T: Transport, const DEVICES: usize>(
        &mut self,
        mut device: usize,
        transport: &mut T,
        route: &Route<'_, DEVICES>,
    ) {
        while device < DEVICES {
            self.cursor = Cursor::Device(device);
            let ticket = Ticket::new(self.pass, device);
            let address = route.addresses[device];
            match transport.transmit_async(address, route.frames[device].as_bytes(), ticket) {
                Ok(Submission::Pending) => return,
                Ok(Submission::Complete) => device += 1,
                Err(_err) => {
                    #[cfg(feature = "esp32-log")]
                    println!(
                        "[Sequencer.submit] device {} at {:#04x} failed: {:?}",
                        device, address, _err
                    );
                    if let Err(_err) = transport.reinitialize() {
                        #[cfg(feature = "esp32-log")]
                        println!("[Sequencer.submit] bus reinitialization failed: {:?}", _err);
                    }
                    self.cursor = Cursor::Idle;
                    self.stats.passes_abandoned = self.stats.passes_abandoned.wrapping_add(1);
                    return;
                }
            }
        }
        self.cursor = Cursor::Idle;
        self.stats.passes_completed = self.stats.passes_completed.wrapping_add(1);
    }
}
