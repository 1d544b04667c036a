use crate::client::DeviceClient;
use crate::sensors::SensorDriver;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

struct PolledSensor {
    driver: Box<dyn SensorDriver>,
    period: Duration,
    next_due: Instant,
}

/// Single polling task owning every driver
#[derive(Default)]
pub struct Poller {
    sensors: Vec<PolledSensor>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, driver: Box<dyn SensorDriver>, frequency_hz: u32, now: Instant) {
        // a zero period would never advance next_due
        let period = Duration::from_micros(1_000_000 / u64::from(frequency_hz.max(1))).max(Duration::from_micros(1));
        info!("[{}] polling {} every {:?}", driver.id(), driver.kind(), period);
        self.sensors.push(PolledSensor { driver, period, next_due: now });
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.sensors.iter().map(|s| s.next_due).min()
    }

    /// Read every sensor whose period has elapsed. Returns how many were polled.
    pub fn poll_due(&mut self, now: Instant, client: &mut DeviceClient) -> usize {
        let mut polled = 0;
        for sensor in self.sensors.iter_mut().filter(|s| s.next_due <= now) {
            let result = sensor.driver.read();
            client.record(sensor.driver.id(), result);
            // skip missed periods instead of bursting to catch up
            while sensor.next_due <= now {
                sensor.next_due += sensor.period;
            }
            polled += 1;
        }
        polled
    }

    /// Poll until `shutdown` resolves, publishing fresh values after each round.
    pub async fn run<F: Future<Output = ()>>(mut self, mut client: DeviceClient, shutdown: F) {
        tokio::pin!(shutdown);

        loop {
            let Some(deadline) = self.next_deadline() else {
                info!("[poller] no sensors to poll");
                return;
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!("[poller] shutting down");
                    return;
                }
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    let polled = self.poll_due(Instant::now(), &mut client);
                    let published = client.publish();
                    debug!("[poller] polled {} sensor(s), published {}", polled, published);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SlaveAddress;
    use crate::errors::SensorResult;
    use crate::sensors::{InitPolicy, InitReport, SensorSample};

    #[cfg(feature = "max30102")]
    #[test]
    fn test_poll_due_respects_period() {
        use crate::bus::mock::MockBus;
        use crate::bus::share;
        use crate::sensors::max30102::Max30102;
        use crate::sensors::{HeartRateSample, RegisterDriver};

        let mut mock = MockBus::new();
        mock.queue_read(&[0x40]).queue_read(&[0x00, 0x01, 0x00]);
        let mut driver = RegisterDriver::new("hrate0".to_string(), "i2c1".to_string(), Max30102::default(), share(mock));
        driver.init(SlaveAddress::new(0x57).unwrap()).unwrap();

        let start = Instant::now();
        let mut poller = Poller::new();
        poller.add(Box::new(driver), 10, start);
        let mut client = DeviceClient::new("wearable");

        assert_eq!(poller.poll_due(start, &mut client), 1);
        assert_eq!(
            client.latest("hrate0"),
            Some(SensorSample::HeartRate(HeartRateSample { red: 0x100 }))
        );

        // not due again until 100 ms later
        assert_eq!(poller.poll_due(start + Duration::from_millis(50), &mut client), 0);
        assert_eq!(poller.next_deadline(), Some(start + Duration::from_millis(100)));
        assert_eq!(poller.poll_due(start + Duration::from_millis(350), &mut client), 1);
        assert_eq!(poller.next_deadline(), Some(start + Duration::from_millis(400)));
    }

    struct Idle;

    impl SensorDriver for Idle {
        fn init(&mut self, _address: SlaveAddress) -> SensorResult<InitReport> {
            Ok(InitReport::default())
        }

        fn read(&mut self) -> SensorResult<Option<SensorSample>> {
            Ok(None)
        }

        fn set_init_policy(&mut self, _policy: InitPolicy) {}

        fn id(&self) -> &str {
            "idle0"
        }

        fn bus(&self) -> &str {
            "i2c1"
        }

        fn kind(&self) -> &'static str {
            "idle"
        }
    }

    #[test]
    fn test_period_never_drops_below_one_microsecond() {
        let start = Instant::now();
        let mut poller = Poller::new();
        poller.add(Box::new(Idle), u32::MAX, start);
        let mut client = DeviceClient::new("wearable");

        assert_eq!(poller.poll_due(start, &mut client), 1);
        assert_eq!(poller.next_deadline(), Some(start + Duration::from_micros(1)));

        assert_eq!(poller.poll_due(start + Duration::from_millis(5), &mut client), 1);
        assert_eq!(
            poller.next_deadline(),
            Some(start + Duration::from_millis(5) + Duration::from_micros(1))
        );
    }

    #[test]
    fn test_empty_poller_has_no_deadline() {
        let poller = Poller::new();
        assert!(poller.is_empty());
        assert_eq!(poller.next_deadline(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_run_without_sensors_returns() {
        let poller = Poller::new();
        poller.run(DeviceClient::new("wearable"), std::future::pending::<()>()).await;
    }
}
