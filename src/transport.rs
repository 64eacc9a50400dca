//! Bus transport seam.
//!
//! The driver never touches a peripheral directly. It submits frames through a
//! [`Transport`] and expects the transport's completion interrupt to hand the
//! submission [`Ticket`] back via
//! [`PwmChain::on_transfer_complete`](crate::PwmChain::on_transfer_complete).

use embedded_hal::i2c::I2c;

/// Identifies one outstanding frame transfer.
///
/// A ticket is only honoured while its pass and device are the ones the
/// sequencer is waiting for; tickets of abandoned passes are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pass: u32,
    device: usize,
}

impl Ticket {
    pub(crate) const fn new(pass: u32, device: usize) -> Self {
        Self { pass, device }
    }

    /// Pass number this transfer belongs to
    pub const fn pass(self) -> u32 {
        self.pass
    }

    /// Index of the chip being written
    pub const fn device(self) -> usize {
        self.device
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Transfer is running; completion will be reported with the ticket
    Pending,
    /// Transfer already finished during the call
    Complete,
}

/// Bus used to reach the chained chips
pub trait Transport {
    /// Bus error
    type Error: core::fmt::Debug;

    /// Write `bytes` to `address` and wait for it to finish.
    ///
    /// Only used during bring-up.
    fn write_blocking(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Start writing `frame` to `address` without waiting.
    ///
    /// `frame` is only borrowed for the duration of the call. When
    /// [`Submission::Pending`] is returned the transport must report
    /// completion by passing `ticket` to
    /// [`PwmChain::on_transfer_complete`](crate::PwmChain::on_transfer_complete),
    /// and must not do so from inside this call.
    fn transmit_async(
        &mut self,
        address: u8,
        frame: &[u8],
        ticket: Ticket,
    ) -> Result<Submission, Self::Error>;

    /// Bring the bus back to a usable state after an error or an abandoned
    /// transfer. Any transfer still running must be aborted.
    fn reinitialize(&mut self) -> Result<(), Self::Error>;
}

/// Transport over a blocking `embedded-hal` I2C bus.
///
/// Every frame is written synchronously, so a whole pass runs inside the
/// swap call.
#[derive(Debug)]
pub struct BlockingI2c<I> {
    i2c: I,
}

impl<I: I2c> BlockingI2c<I> {
    /// Wrap an I2C bus
    pub const fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Give the bus back
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> Transport for BlockingI2c<I> {
    type Error = I::Error;

    fn write_blocking(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(address, bytes)
    }

    fn transmit_async(
        &mut self,
        address: u8,
        frame: &[u8],
        _ticket: Ticket,
    ) -> Result<Submission, Self::Error> {
        self.i2c.write(address, frame)?;
        Ok(Submission::Complete)
    }

    fn reinitialize(&mut self) -> Result<(), Self::Error> {
        // Nothing is ever left in flight on a blocking bus
        Ok(())
    }
}
