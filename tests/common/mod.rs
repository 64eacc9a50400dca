#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal::i2c::{self, I2c, Operation};
use myrtio_pwm_chain::{
    ChainConfig, Frame, NoOutputEnable, PwmChain, Submission, Ticket, Transport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError;

/// One frame handed to the transport
#[derive(Debug, Clone)]
pub struct Submitted {
    pub address: u8,
    pub bytes: Vec<u8>,
    pub ticket: Ticket,
}

impl Submitted {
    pub fn frame(&self) -> Frame {
        let mut frame = Frame::new(0);
        for channel in 0..myrtio_pwm_chain::CHANNELS_PER_DEVICE {
            let offset = 1 + channel * 4;
            let b = &self.bytes;
            frame.set_channel(
                channel,
                myrtio_pwm_chain::ChannelCycles {
                    on: u16::from_le_bytes([b[offset], b[offset + 1]]),
                    off: u16::from_le_bytes([b[offset + 2], b[offset + 3]]),
                },
            );
        }
        frame
    }
}

/// Everything the mock bus saw
#[derive(Debug, Default)]
pub struct BusLog {
    pub blocking: Vec<(u8, Vec<u8>)>,
    pub submitted: Vec<Submitted>,
    pub reinitializations: usize,
    /// Reject the next submission to this address
    pub fail_next_submit_to: Option<u8>,
    /// Reject every blocking write
    pub fail_blocking: bool,
    pub rejected: Vec<u8>,
}

impl BusLog {
    pub fn submitted_addresses(&self) -> Vec<u8> {
        self.submitted.iter().map(|s| s.address).collect()
    }
}

pub type Bus = Arc<Mutex<BusLog>>;

/// Transport that records traffic; completion is either deferred to the test
/// or reported synchronously
pub struct MockTransport {
    bus: Bus,
    immediate: bool,
}

impl MockTransport {
    /// Completion must be reported by the test
    pub fn deferred() -> (Self, Bus) {
        let bus = Bus::default();
        (
            Self {
                bus: bus.clone(),
                immediate: false,
            },
            bus,
        )
    }

    /// Every submission completes during the call
    pub fn immediate() -> (Self, Bus) {
        let (mut transport, bus) = Self::deferred();
        transport.immediate = true;
        (transport, bus)
    }
}

impl Transport for MockTransport {
    type Error = BusError;

    fn write_blocking(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().unwrap();
        if bus.fail_blocking {
            return Err(BusError);
        }
        bus.blocking.push((address, bytes.to_vec()));
        Ok(())
    }

    fn transmit_async(
        &mut self,
        address: u8,
        frame: &[u8],
        ticket: Ticket,
    ) -> Result<Submission, Self::Error> {
        let mut bus = self.bus.lock().unwrap();
        if bus.fail_next_submit_to == Some(address) {
            bus.fail_next_submit_to = None;
            bus.rejected.push(address);
            return Err(BusError);
        }
        bus.submitted.push(Submitted {
            address,
            bytes: frame.to_vec(),
            ticket,
        });
        if self.immediate {
            Ok(Submission::Complete)
        } else {
            Ok(Submission::Pending)
        }
    }

    fn reinitialize(&mut self) -> Result<(), Self::Error> {
        self.bus.lock().unwrap().reinitializations += 1;
        Ok(())
    }
}

/// Output pin recording every level it was driven to (`true` = high)
#[derive(Clone, Default)]
pub struct MockPin {
    pub levels: Arc<Mutex<Vec<bool>>>,
    pub broken: bool,
}

impl ErrorType for MockPin {
    type Error = embedded_hal::digital::ErrorKind;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.broken {
            return Err(embedded_hal::digital::ErrorKind::Other);
        }
        self.levels.lock().unwrap().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.broken {
            return Err(embedded_hal::digital::ErrorKind::Other);
        }
        self.levels.lock().unwrap().push(true);
        Ok(())
    }
}

/// I2C bus recording plain writes
#[derive(Default)]
pub struct MockI2c {
    pub writes: Vec<(u8, Vec<u8>)>,
}

impl i2c::ErrorType for MockI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations {
            match operation {
                Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                Operation::Read(_) => return Err(i2c::ErrorKind::Other),
            }
        }
        Ok(())
    }
}

/// Delay that only counts how long it was asked to wait
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub total_ns: u64,
}

impl CountingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl embedded_hal::delay::DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

impl embedded_hal_async::delay::DelayNs for CountingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Delay backed by the OS scheduler
pub struct StdDelay;

impl embedded_hal::delay::DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

pub type MockChain<const DEVICES: usize> = PwmChain<MockTransport, NoOutputEnable, DEVICES>;

/// Chain of chips at consecutive addresses with deferred completion
pub fn deferred_chain<const DEVICES: usize>(persistent: bool) -> (MockChain<DEVICES>, Bus) {
    let (transport, bus) = MockTransport::deferred();
    build(transport, bus, persistent)
}

/// Chain of chips at consecutive addresses with synchronous completion
pub fn immediate_chain<const DEVICES: usize>(persistent: bool) -> (MockChain<DEVICES>, Bus) {
    let (transport, bus) = MockTransport::immediate();
    build(transport, bus, persistent)
}

#[allow(clippy::cast_possible_truncation)]
fn build<const DEVICES: usize>(
    transport: MockTransport,
    bus: Bus,
    persistent: bool,
) -> (MockChain<DEVICES>, Bus) {
    let offsets = core::array::from_fn(|device| device as u8);
    let config = ChainConfig::new(offsets).with_persistent(persistent);
    let chain = PwmChain::new(transport, &config, None, &mut CountingDelay::default())
        .expect("bring-up failed");
    bus.lock().unwrap().blocking.clear();
    (chain, bus)
}

/// Complete every outstanding transfer until the pass is done
pub fn finish_pass<const DEVICES: usize>(chain: &MockChain<DEVICES>, bus: &Bus) {
    while !chain.is_idle() {
        let ticket = bus.lock().unwrap().submitted.last().unwrap().ticket;
        chain.on_transfer_complete(ticket);
    }
}
