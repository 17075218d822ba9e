//! Free-memory watchdog.
//!
//! Fragmented or exhausted heap makes the network stack fail in ways the
//! radio never reports. [`ResourceMonitor`] samples free memory on a fixed
//! cadence and, when two consecutive samples fall below the safety
//! threshold, asks the connection manager for a full reconnect, which
//! releases the buffers held by both radio roles.

use crate::time::{elapsed, Millis};
use crate::wifi::ConnectionFault;
use log::{debug, warn};

/// Sampling cadence.
pub const DEFAULT_SAMPLE_INTERVAL_MS: Millis = 5_000;

/// Largest payload buffer the services keep in flight.
pub const DEFAULT_PAYLOAD_BUFFER_BYTES: u32 = 20_480;

/// Payload buffer on the smaller ESP8266 heap.
pub const ESP8266_PAYLOAD_BUFFER_BYTES: u32 = 12_000;

/// Headroom kept on top of the payload buffer.
pub const DEFAULT_MARGIN_BYTES: u32 = 512;

/// Source of free-memory readings.
pub trait MemoryProbe {
    /// Free heap in bytes.
    fn free_bytes(&mut self) -> u32;
}

/// Receiver of forced-reconnect requests.
pub trait ReconnectTarget {
    /// Schedule a full reconnect. Must only mark intent.
    fn force_reconnect(&mut self, reason: ConnectionFault);
}

/// Sampling cadence and threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interval_ms: Millis,
    pub payload_buffer_bytes: u32,
    pub margin_bytes: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            payload_buffer_bytes: DEFAULT_PAYLOAD_BUFFER_BYTES,
            margin_bytes: DEFAULT_MARGIN_BYTES,
        }
    }
}

impl MonitorConfig {
    /// Preset for the ESP8266 payload buffer.
    pub fn esp8266() -> Self {
        Self {
            payload_buffer_bytes: ESP8266_PAYLOAD_BUFFER_BYTES,
            ..Self::default()
        }
    }

    /// Free memory below this counts as a low sample.
    pub fn threshold(&self) -> u32 {
        self.payload_buffer_bytes.saturating_add(self.margin_bytes)
    }
}

/// Periodic free-memory sampler.
pub struct ResourceMonitor<P: MemoryProbe> {
    probe: P,
    config: MonitorConfig,
    last_sample: Option<Millis>,
    last_free: Option<u32>,
}

impl<P: MemoryProbe> ResourceMonitor<P> {
    pub fn new(probe: P) -> Self {
        Self::with_config(probe, MonitorConfig::default())
    }

    pub fn with_config(probe: P, config: MonitorConfig) -> Self {
        Self {
            probe,
            config,
            last_sample: None,
            last_free: None,
        }
    }

    /// Take a sample if the interval has elapsed.
    ///
    /// Returns `true` when this call asked `target` for a reconnect.
    pub fn sample<T: ReconnectTarget + ?Sized>(&mut self, now: Millis, target: &mut T) -> bool {
        if let Some(last) = self.last_sample {
            if elapsed(now, last) < self.config.interval_ms {
                return false;
            }
        }
        self.last_sample = Some(now);

        let free = self.probe.free_bytes();
        let threshold = self.config.threshold();
        let previous = self.last_free.replace(free);
        debug!("Free heap: {} bytes", free);

        let low = free < threshold;
        let was_low = previous.is_some_and(|p| p < threshold);

        if low && was_low {
            warn!(
                "Free heap {} below {} for two samples, forcing reconnect",
                free, threshold
            );
            target.force_reconnect(ConnectionFault::ResourceExhaustion);
            return true;
        }
        false
    }

    /// Last reading, if any.
    pub fn last_free(&self) -> Option<u32> {
        self.last_free
    }

    /// Time of the last reading, if any.
    pub fn last_sample(&self) -> Option<Millis> {
        self.last_sample
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }
}

/// Free heap as reported by ESP-IDF.
#[cfg(feature = "esp32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct EspHeapProbe;

#[cfg(feature = "esp32")]
impl MemoryProbe for EspHeapProbe {
    fn free_bytes(&mut self) -> u32 {
        // SAFETY: reads a counter maintained by the IDF allocator.
        unsafe { esp_idf_sys::esp_get_free_heap_size() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimHeap;

    #[derive(Default)]
    struct Target {
        requests: Vec<ConnectionFault>,
    }

    impl ReconnectTarget for Target {
        fn force_reconnect(&mut self, reason: ConnectionFault) {
            self.requests.push(reason);
        }
    }

    const LOW: u32 = 10_000;
    const HIGH: u32 = 100_000;

    // ==================== Threshold Tests ====================

    #[test]
    fn test_default_threshold() {
        assert_eq!(MonitorConfig::default().threshold(), 20_992);
    }

    #[test]
    fn test_esp8266_threshold() {
        assert_eq!(MonitorConfig::esp8266().threshold(), 12_512);
        assert_eq!(MonitorConfig::esp8266().interval_ms, 5_000);
    }

    // ==================== Sampling Tests ====================

    #[test]
    fn test_first_call_samples_immediately() {
        let mut monitor = ResourceMonitor::new(SimHeap::constant(HIGH));
        let mut target = Target::default();

        assert!(!monitor.sample(0, &mut target));
        assert_eq!(monitor.last_free(), Some(HIGH));
        assert_eq!(monitor.last_sample(), Some(0));
    }

    #[test]
    fn test_samples_only_once_per_interval() {
        let mut monitor = ResourceMonitor::new(SimHeap::scripted([HIGH, LOW, LOW]));
        let mut target = Target::default();

        monitor.sample(0, &mut target);
        monitor.sample(4_999, &mut target);
        assert_eq!(monitor.last_free(), Some(HIGH));

        monitor.sample(5_000, &mut target);
        assert_eq!(monitor.last_free(), Some(LOW));
        assert_eq!(monitor.last_sample(), Some(5_000));
    }

    #[test]
    fn test_single_low_sample_never_triggers() {
        let mut monitor = ResourceMonitor::new(SimHeap::scripted([HIGH, LOW, HIGH, LOW, HIGH]));
        let mut target = Target::default();

        for i in 0..5 {
            assert!(!monitor.sample(i * 5_000, &mut target));
        }
        assert!(target.requests.is_empty());
    }

    #[test]
    fn test_two_consecutive_low_samples_trigger() {
        let mut monitor = ResourceMonitor::new(SimHeap::scripted([HIGH, LOW, LOW]));
        let mut target = Target::default();

        assert!(!monitor.sample(0, &mut target));
        assert!(!monitor.sample(5_000, &mut target));
        assert!(monitor.sample(10_000, &mut target));
        assert_eq!(target.requests, vec![ConnectionFault::ResourceExhaustion]);
    }

    #[test]
    fn test_sustained_pressure_keeps_requesting() {
        let mut monitor = ResourceMonitor::new(SimHeap::constant(LOW));
        let mut target = Target::default();

        for i in 0..4 {
            monitor.sample(i * 5_000, &mut target);
        }
        assert_eq!(target.requests.len(), 3);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let threshold = MonitorConfig::default().threshold();
        let mut monitor = ResourceMonitor::new(SimHeap::constant(threshold));
        let mut target = Target::default();

        monitor.sample(0, &mut target);
        assert!(!monitor.sample(5_000, &mut target));
    }

    #[test]
    fn test_interval_survives_clock_wrap() {
        let mut monitor = ResourceMonitor::new(SimHeap::constant(LOW));
        let mut target = Target::default();
        let start = u32::MAX - 1_000;

        monitor.sample(start, &mut target);
        assert!(!monitor.sample(start.wrapping_add(4_000), &mut target));
        assert!(monitor.sample(start.wrapping_add(5_000), &mut target));
    }

    #[test]
    fn test_drives_connection_manager() {
        use crate::config::{ConnectionMode, Credentials, NetworkConfig};
        use crate::sim::SimRadio;
        use crate::wifi::ConnectionManager;

        let station = Credentials::new("HomeNet", "password123").unwrap();
        let config = NetworkConfig::new("esp_wificonnect", station)
            .unwrap()
            .with_mode(ConnectionMode::StationOnly);
        let mac = [0x24, 0x0a, 0xc4, 0xa1, 0xb2, 0xc3];
        let mut manager = ConnectionManager::new(&config, &mac, SimRadio::new()).unwrap();
        let mut monitor = ResourceMonitor::new(SimHeap::constant(LOW));

        manager.poll(0);
        monitor.sample(0, &mut manager);
        monitor.sample(5_000, &mut manager);

        assert!(manager.pending_reconnect());
        assert_eq!(
            manager.last_fault(),
            Some(ConnectionFault::ResourceExhaustion)
        );

        manager.poll(5_100);
        assert!(!manager.pending_reconnect());
        assert!(!manager.station().active());
    }
}
