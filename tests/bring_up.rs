mod common;

mod tests {
    use myrtio_pwm_chain::{
        ChainConfig, ConfigError, Error, NoOutputEnable, OutputDriver, OutputMode, PwmChain,
        UpdateOn,
    };

    use crate::common::{BusError, CountingDelay, MockPin, MockTransport};

    #[test]
    fn test_bring_up_configures_every_chip() {
        let (transport, bus) = MockTransport::deferred();
        let config = ChainConfig::new([0x00, 0x01, 0x05]);
        let mut delay = CountingDelay::default();
        let chain: PwmChain<_, NoOutputEnable, 3> =
            PwmChain::new(transport, &config, None, &mut delay).unwrap();

        let bus = bus.lock().unwrap();
        let expected = [0x40u8, 0x41, 0x45]
            .iter()
            .flat_map(|&address| [(address, vec![0x00, 0x20]), (address, vec![0x01, 0x06])])
            .collect::<Vec<_>>();
        assert_eq!(bus.blocking, expected);
        // Nothing is sent until the first swap
        assert!(bus.submitted.is_empty());
        assert!(chain.is_idle());
        // Oscillator wake-up wait per chip
        assert_eq!(delay.total_ns, 3 * 500_000);
    }

    #[test]
    fn test_output_mode_register() {
        assert_eq!(OutputMode::new().mode2(), 0x06);
        let mode = OutputMode {
            inverted: true,
            driver: OutputDriver::OpenDrain,
            update: UpdateOn::Ack,
            high_impedance_when_disabled: false,
        };
        assert_eq!(mode.mode2(), 0x18);

        let (transport, bus) = MockTransport::deferred();
        let config = ChainConfig::new([0x02]).with_output_mode(mode);
        let _chain: PwmChain<_, NoOutputEnable, 1> =
            PwmChain::new(transport, &config, None, &mut CountingDelay::default()).unwrap();
        assert_eq!(bus.lock().unwrap().blocking[1], (0x42, vec![0x01, 0x18]));
    }

    #[test]
    fn test_output_enable_held_off_during_bring_up() {
        let (transport, _bus) = MockTransport::deferred();
        let pin = MockPin::default();
        let levels = pin.levels.clone();
        let chain: PwmChain<_, MockPin, 1> = PwmChain::new(
            transport,
            &ChainConfig::new([0x00]),
            Some(pin),
            &mut CountingDelay::default(),
        )
        .unwrap();
        // Active low: high while configuring, low once ready
        assert_eq!(*levels.lock().unwrap(), vec![true, false]);

        chain.set_outputs_enabled(false).unwrap();
        chain.set_outputs_enabled(true).unwrap();
        assert_eq!(*levels.lock().unwrap(), vec![true, false, true, false]);
    }

    #[test]
    fn test_broken_output_enable() {
        let (transport, _bus) = MockTransport::deferred();
        let pin = MockPin {
            broken: true,
            ..MockPin::default()
        };
        let result: Result<PwmChain<_, MockPin, 1>, _> = PwmChain::new(
            transport,
            &ChainConfig::new([0x00]),
            Some(pin),
            &mut CountingDelay::default(),
        );
        assert!(matches!(result, Err(Error::OutputEnable)));
    }

    #[test]
    fn test_bus_failure_during_bring_up() {
        let (transport, bus) = MockTransport::deferred();
        bus.lock().unwrap().fail_blocking = true;
        let pin = MockPin::default();
        let levels = pin.levels.clone();
        let result: Result<PwmChain<_, MockPin, 2>, _> = PwmChain::new(
            transport,
            &ChainConfig::new([0x00, 0x01]),
            Some(pin),
            &mut CountingDelay::default(),
        );
        assert!(matches!(result, Err(Error::Bus(BusError))));
        // Outputs never got enabled
        assert_eq!(*levels.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_config_errors() {
        assert_eq!(ChainConfig::<0>::new([]).addresses(), Err(ConfigError::NoDevices));
        assert_eq!(
            ChainConfig::new([0x00, 0x40]).addresses(),
            Err(ConfigError::AddressOutOfRange {
                device: 1,
                offset: 0x40
            })
        );
        assert_eq!(
            ChainConfig::new([0x03, 0x01, 0x03]).addresses(),
            Err(ConfigError::DuplicateAddress { address: 0x43 })
        );
        assert_eq!(ChainConfig::new([0x00, 0x3F]).addresses(), Ok([0x40, 0x7F]));
        assert_eq!(
            ChainConfig::new([0x01]).with_base_address(0x60).addresses(),
            Ok([0x61])
        );
    }

    #[test]
    fn test_config_error_rejects_construction() {
        let (transport, bus) = MockTransport::deferred();
        let result: Result<PwmChain<_, NoOutputEnable, 2>, _> = PwmChain::new(
            transport,
            &ChainConfig::new([0x01, 0x01]),
            None,
            &mut CountingDelay::default(),
        );
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::DuplicateAddress { address: 0x41 }))
        ));
        assert!(bus.lock().unwrap().blocking.is_empty());
    }

    #[test]
    fn test_release_returns_collaborators() {
        let (transport, _bus) = MockTransport::deferred();
        let chain: PwmChain<_, MockPin, 1> = PwmChain::new(
            transport,
            &ChainConfig::new([0x00]),
            Some(MockPin::default()),
            &mut CountingDelay::default(),
        )
        .unwrap();
        let (_transport, pin) = chain.release();
        assert!(pin.is_some());
    }
}
