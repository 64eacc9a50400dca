#![no_std]

pub mod buffer;
pub mod device;
pub mod driver;
pub mod error;
pub mod frame;
pub mod frame_scheduler;
pub mod gamma;
pub mod sequencer;
pub mod transport;

pub use buffer::{DoubleBuffer, FrameSet};
pub use device::{
    BASE_ADDRESS, ChainConfig, NoOutputEnable, OutputDriver, OutputMode, UpdateOn,
};
pub use driver::PwmChain;
pub use error::{ConfigError, Error, SwapError};
pub use frame::{
    CHANNELS_PER_DEVICE, ChannelCycles, ChannelLocation, FULL_ON, Frame, MAX_CYCLES,
    start_cycle_for,
};
pub use frame_scheduler::{FrameResult, FrameScheduler};
pub use gamma::{Brightness, gamma_lookup};
pub use sequencer::{Cursor, Stats};
pub use transport::{BlockingI2c, Submission, Ticket, Transport};

pub use embassy_time::{Duration, Instant};
