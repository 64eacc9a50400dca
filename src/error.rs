/// Rejected chain configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The chain has no chips
    NoDevices,
    /// Address offset does not fit the chip's address pins
    AddressOutOfRange { device: usize, offset: u8 },
    /// Two chips resolve to the same bus address
    DuplicateAddress { address: u8 },
}

/// Error returned when the driver cannot be brought up or gated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Chain configuration was rejected
    Config(ConfigError),
    /// Bus write failed
    Bus(E),
    /// Output-enable line could not be driven
    OutputEnable,
}

impl<E> From<ConfigError> for Error<E> {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Error returned when a swap could not be performed.
///
/// The previous pass was abandoned; its delivery is unconfirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapError {
    /// Previous pass did not finish within the timeout
    Timeout,
}
