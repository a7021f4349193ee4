// SPDX-License-Identifier: GPL-3.0-only
//! OSD control channel
//!
//! Reads and writes monitor settings through a [`ControlTransport`]. Every
//! transfer is followed by a fixed pacing sleep: the monitor's controller
//! drops requests that arrive back to back.

use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::devices::{self, DeviceSpec};
use crate::error::{OsdError, Result};
use crate::property::{self, Policy, Property};
use crate::protocols::ControlTransport;
use crate::protocols::billboard::{
    self, BillboardDevice, REPLY_INDEX, REPLY_LEN, REQUEST_REPLY, REQUEST_SEND, REQUEST_TYPE_IN,
    REQUEST_TYPE_OUT,
};

/// Minimum delay after every USB transfer
pub const PACING: Duration = Duration::from_millis(50);

/// Default increment used by [`OsdChannel::transition`]
pub const DEFAULT_STEP: u8 = 3;

/// Exclusive OSD session with one monitor
///
/// All operations take `&mut self`, so requests on one device can never
/// interleave. Dropping the channel closes the session.
#[derive(Debug)]
pub struct OsdChannel<T: ControlTransport> {
    transport: T,
    pacing: Duration,
}

impl OsdChannel<BillboardDevice> {
    /// Open the monitor described by `spec`
    pub fn open(spec: &DeviceSpec, config: &Config) -> Result<Self> {
        let device = BillboardDevice::open(spec, config.transfer_timeout)?;
        Ok(Self::with_pacing(device, config.pacing))
    }

    /// Open the monitor selected by the configuration's identifiers
    pub fn open_configured(config: &Config) -> Result<Self> {
        let spec = devices::resolve(config.vendor_id, config.product_id);
        Self::open(&spec, config)
    }
}

impl<T: ControlTransport> OsdChannel<T> {
    /// Wrap a transport with the standard pacing interval
    pub fn new(transport: T) -> Self {
        Self::with_pacing(transport, PACING)
    }

    /// Wrap a transport with a longer pacing interval
    ///
    /// Intervals below [`PACING`] are raised to it.
    pub fn with_pacing(transport: T, pacing: Duration) -> Self {
        if pacing < PACING {
            tracing::warn!(
                "Pacing of {}ms is below the {}ms the monitor needs, using {}ms",
                pacing.as_millis(),
                PACING.as_millis(),
                PACING.as_millis()
            );
        }
        Self {
            transport,
            pacing: pacing.max(PACING),
        }
    }

    #[cfg(test)]
    fn unpaced(transport: T) -> Self {
        Self {
            transport,
            pacing: Duration::ZERO,
        }
    }

    /// Delay applied after every transfer
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give back the underlying transport, ending the channel
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn pause(&self) {
        if !self.pacing.is_zero() {
            thread::sleep(self.pacing);
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        tracing::debug!("OSD send: {:02x?}", frame);
        let written = self
            .transport
            .write_control(REQUEST_TYPE_OUT, REQUEST_SEND, 0, 0, frame)?;
        if written != frame.len() {
            return Err(OsdError::TransferLengthMismatch {
                expected: frame.len(),
                actual: written,
            });
        }
        self.pause();
        Ok(())
    }

    fn receive(&mut self) -> Result<u8> {
        let mut reply = [0u8; REPLY_LEN];
        let read = self
            .transport
            .read_control(REQUEST_TYPE_IN, REQUEST_REPLY, 0, REPLY_INDEX, &mut reply)?;
        self.pause();
        let reply = &reply[..read.min(REPLY_LEN)];
        tracing::debug!("OSD reply: {:02x?}", reply);
        billboard::decode_reply(reply)
    }

    /// Read the current value of a property
    pub fn get(&mut self, property: &Property) -> Result<u8> {
        self.send(&billboard::encode_read_request(&property.read_args()))?;
        let value = self.receive()?;
        tracing::debug!("{} = {}", property, value);
        Ok(value)
    }

    /// Write a property, clamping or rejecting the value per its policy
    ///
    /// Rejected values never reach the device.
    pub fn set(&mut self, property: &Property, value: i32) -> Result<()> {
        let value = property.validate(value)?;
        self.send(&billboard::encode_write_request(
            property.major,
            property.minor,
            value,
        ))?;
        tracing::debug!("Set {} to {}", property, value);
        Ok(())
    }

    /// Ramp a property toward `target` in increments of `step`
    ///
    /// The current value is read once and each intermediate value is written
    /// in turn, so the OSD shows a visible ramp. A final write of `target`
    /// follows when the last increment did not land on it. Nothing is written
    /// when the property already holds `target`.
    ///
    /// A failed write stops the ramp at the last value that was written.
    pub fn transition(&mut self, property: &Property, target: i32, step: u8) -> Result<()> {
        if step == 0 {
            return Err(OsdError::InvalidStep);
        }
        if !matches!(property.policy, Policy::Range { .. }) {
            return Err(OsdError::UnsupportedOperation {
                property: property.name,
                operation: "transition",
            });
        }
        let target = property.validate(target)? as i32;

        let mut current = self.get(property)? as i32;
        let step = if current <= target {
            step as i32
        } else {
            -(step as i32)
        };
        let mut diff = (target - current).abs();

        tracing::debug!(
            "Transition {} from {} to {} (step {})",
            property,
            current,
            target,
            step
        );

        while diff >= step.abs() {
            current += step;
            self.set(property, current)?;
            diff -= step.abs();
        }
        if current != target {
            self.set(property, target)?;
        }
        Ok(())
    }

    /// Flip a two-state property and return the value written
    pub fn toggle(&mut self, property: &Property) -> Result<u8> {
        if !property.policy.is_binary() {
            return Err(OsdError::UnsupportedOperation {
                property: property.name,
                operation: "toggle",
            });
        }
        let current = self.get(property)? as i32;
        let next = property.validate(1 - current)?;
        self.set(property, next as i32)?;
        Ok(next)
    }

    /// Read every known property in registry order
    pub fn snapshot(&mut self) -> Result<Vec<(&'static Property, u8)>> {
        property::ALL
            .iter()
            .map(|&p| self.get(p).map(|v| (p, v)))
            .collect()
    }

    pub fn brightness(&mut self) -> Result<u8> {
        self.get(&property::BRIGHTNESS)
    }

    pub fn set_brightness(&mut self, value: i32) -> Result<()> {
        self.set(&property::BRIGHTNESS, value)
    }

    pub fn transition_brightness(&mut self, target: i32, step: u8) -> Result<()> {
        self.transition(&property::BRIGHTNESS, target, step)
    }

    pub fn contrast(&mut self) -> Result<u8> {
        self.get(&property::CONTRAST)
    }

    pub fn set_contrast(&mut self, value: i32) -> Result<()> {
        self.set(&property::CONTRAST, value)
    }

    pub fn volume(&mut self) -> Result<u8> {
        self.get(&property::VOLUME)
    }

    pub fn set_volume(&mut self, value: i32) -> Result<()> {
        self.set(&property::VOLUME, value)
    }

    pub fn kvm_status(&mut self) -> Result<u8> {
        self.get(&property::KVM_STATUS)
    }

    pub fn set_kvm_status(&mut self, value: i32) -> Result<()> {
        self.set(&property::KVM_STATUS, value)
    }

    /// Switch the KVM to the other input
    pub fn toggle_kvm(&mut self) -> Result<u8> {
        self.toggle(&property::KVM_STATUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{BRIGHTNESS, KVM_STATUS, OSD_TIMEOUT, VOLUME};
    use crate::protocols::billboard::REPLY_VALUE_OFFSET;
    use std::collections::HashMap;

    /// In-memory monitor that remembers written values and echoes them back
    #[derive(Debug, Default)]
    struct MockMonitor {
        values: HashMap<(u8, u8), u8>,
        pending: Option<(u8, u8)>,
        /// Every host-to-device frame, in order
        sent: Vec<Vec<u8>>,
        reads: usize,
        /// Acknowledge one byte less starting with this write (0-based)
        short_write_at: Option<usize>,
        reply_len: Option<usize>,
    }

    impl MockMonitor {
        fn with_value(property: &Property, value: u8) -> Self {
            let mut mock = Self::default();
            mock.values.insert((property.major, property.minor), value);
            mock
        }

        /// Values of write frames, in order
        fn written_values(&self) -> Vec<u8> {
            self.sent
                .iter()
                .filter(|f| f[3] == 0x03)
                .map(|f| f[6])
                .collect()
        }
    }

    impl ControlTransport for MockMonitor {
        fn write_control(
            &mut self,
            request_type: u8,
            request: u8,
            value: u16,
            index: u16,
            data: &[u8],
        ) -> Result<usize> {
            assert_eq!((request_type, request, value, index), (0x40, 178, 0, 0));
            let n = self.sent.len();
            self.sent.push(data.to_vec());
            if self.short_write_at.is_some_and(|at| n >= at) {
                return Ok(data.len() - 1);
            }
            match data[3] {
                0x01 => self.pending = Some((data[4], data[5])),
                0x03 => {
                    self.values.insert((data[4], data[5]), data[6]);
                }
                tag => panic!("unexpected tag {tag:#04x}"),
            }
            Ok(data.len())
        }

        fn read_control(
            &mut self,
            request_type: u8,
            request: u8,
            value: u16,
            index: u16,
            buf: &mut [u8],
        ) -> Result<usize> {
            assert_eq!((request_type, request, value, index), (0xc0, 162, 0, 111));
            assert_eq!(buf.len(), 12);
            self.reads += 1;
            let key = self.pending.take().expect("reply requested without a query");
            buf[REPLY_VALUE_OFFSET] = self.values.get(&key).copied().unwrap_or(0);
            Ok(self.reply_len.unwrap_or(buf.len()))
        }
    }

    fn channel(mock: MockMonitor) -> OsdChannel<MockMonitor> {
        OsdChannel::unpaced(mock)
    }

    #[test]
    fn test_pacing_never_below_minimum() {
        let config = Config {
            pacing: Duration::ZERO,
            ..Config::default()
        };
        let osd = OsdChannel::with_pacing(MockMonitor::default(), config.pacing);
        assert_eq!(osd.pacing(), PACING);

        let osd = OsdChannel::with_pacing(MockMonitor::default(), Duration::from_millis(80));
        assert_eq!(osd.pacing(), Duration::from_millis(80));

        assert_eq!(OsdChannel::new(MockMonitor::default()).pacing(), PACING);
    }

    #[test]
    fn test_every_transfer_is_paced() {
        let config = Config {
            pacing: Duration::from_millis(1),
            ..Config::default()
        };
        let mut osd = OsdChannel::with_pacing(MockMonitor::default(), config.pacing);

        let start = std::time::Instant::now();
        osd.set_brightness(50).unwrap();
        osd.set_brightness(60).unwrap();
        assert_eq!(osd.brightness().unwrap(), 60);

        // Two writes, one query and one reply
        assert!(start.elapsed() >= PACING * 4);
    }

    #[test]
    fn test_get_sends_query_then_reads_reply() {
        let mut osd = channel(MockMonitor::with_value(&VOLUME, 20));
        assert_eq!(osd.volume().unwrap(), 20);

        let mock = osd.into_transport();
        assert_eq!(mock.sent, vec![vec![0x6e, 0x51, 0x83, 0x01, 0x62, 0x00]]);
        assert_eq!(mock.reads, 1);
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let mut osd = channel(MockMonitor::default());
        for (property, value, expected) in [
            (&BRIGHTNESS, 42, 42),
            (&BRIGHTNESS, 150, 100),
            (&VOLUME, -5, 0),
            (&KVM_STATUS, 1, 1),
            (&OSD_TIMEOUT, 25, 25),
        ] {
            osd.set(property, value).unwrap();
            assert_eq!(osd.get(property).unwrap(), expected);
        }
    }

    #[test]
    fn test_set_clamps_brightness() {
        let mut osd = channel(MockMonitor::default());
        osd.set_brightness(150).unwrap();

        let mock = osd.into_transport();
        assert_eq!(mock.sent, vec![vec![0x6e, 0x51, 0x84, 0x03, 0x10, 0x00, 100]]);
        assert_eq!(mock.reads, 0);
    }

    #[test]
    fn test_set_rejects_invalid_enumeration_value() {
        let mut osd = channel(MockMonitor::default());
        let err = osd.set(&OSD_TIMEOUT, 12).unwrap_err();
        assert!(matches!(err, OsdError::InvalidValue { value: 12, .. }));
        assert!(osd.transport().sent.is_empty());
    }

    #[test]
    fn test_short_write_is_an_error() {
        let mut mock = MockMonitor::default();
        mock.short_write_at = Some(0);
        let mut osd = channel(mock);

        let err = osd.set_volume(20).unwrap_err();
        assert!(matches!(
            err,
            OsdError::TransferLengthMismatch {
                expected: 7,
                actual: 6
            }
        ));
    }

    #[test]
    fn test_short_reply_is_an_error() {
        let mut mock = MockMonitor::with_value(&BRIGHTNESS, 30);
        mock.reply_len = Some(4);
        let mut osd = channel(mock);

        assert!(matches!(
            osd.brightness().unwrap_err(),
            OsdError::ShortReply { actual: 4, .. }
        ));
    }

    #[test]
    fn test_transition_lands_on_target_without_extra_write() {
        let mut osd = channel(MockMonitor::with_value(&BRIGHTNESS, 10));
        osd.transition_brightness(19, 3).unwrap();

        let mock = osd.into_transport();
        assert_eq!(mock.written_values(), vec![13, 16, 19]);
        assert_eq!(mock.reads, 1);
    }

    #[test]
    fn test_transition_finishes_with_target() {
        let mut osd = channel(MockMonitor::with_value(&BRIGHTNESS, 10));
        osd.transition_brightness(20, 3).unwrap();
        assert_eq!(osd.transport().written_values(), vec![13, 16, 19, 20]);
    }

    #[test]
    fn test_transition_downward_is_monotonic() {
        let mut osd = channel(MockMonitor::with_value(&VOLUME, 80));
        osd.transition(&VOLUME, 5, 10).unwrap();

        let written = osd.transport().written_values();
        assert_eq!(written, vec![70, 60, 50, 40, 30, 20, 10, 5]);
        for pair in written.windows(2) {
            assert!(pair[1] < pair[0]);
        }
        for pair in written[..written.len() - 1].windows(2) {
            assert_eq!(pair[0] - pair[1], 10);
        }
    }

    #[test]
    fn test_transition_at_target_writes_nothing() {
        let mut osd = channel(MockMonitor::with_value(&BRIGHTNESS, 40));
        osd.transition_brightness(40, 3).unwrap();

        let mock = osd.into_transport();
        assert!(mock.written_values().is_empty());
        assert_eq!(mock.reads, 1);
    }

    #[test]
    fn test_transition_clamps_target() {
        let mut osd = channel(MockMonitor::with_value(&BRIGHTNESS, 90));
        osd.transition_brightness(250, 5).unwrap();
        assert_eq!(osd.transport().written_values(), vec![95, 100]);
    }

    #[test]
    fn test_transition_stops_on_short_write() {
        let mut mock = MockMonitor::with_value(&BRIGHTNESS, 10);
        // Frame 0 is the query, frames 1 and 2 are the first two steps
        mock.short_write_at = Some(3);
        let mut osd = channel(mock);

        let err = osd.transition_brightness(40, 3).unwrap_err();
        assert!(matches!(err, OsdError::TransferLengthMismatch { .. }));

        let mock = osd.into_transport();
        assert_eq!(mock.sent.len(), 4);
        assert_eq!(mock.values[&(0x10, 0x00)], 16);
    }

    #[test]
    fn test_transition_rejects_zero_step() {
        let mut osd = channel(MockMonitor::default());
        assert!(matches!(
            osd.transition_brightness(50, 0),
            Err(OsdError::InvalidStep)
        ));
        assert!(osd.transport().sent.is_empty());
    }

    #[test]
    fn test_transition_rejects_enumeration() {
        let mut osd = channel(MockMonitor::default());
        assert!(matches!(
            osd.transition(&OSD_TIMEOUT, 30, 5),
            Err(OsdError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_toggle_kvm() {
        let mut osd = channel(MockMonitor::with_value(&KVM_STATUS, 0));
        assert_eq!(osd.toggle_kvm().unwrap(), 1);
        assert_eq!(osd.kvm_status().unwrap(), 1);
        assert_eq!(osd.toggle_kvm().unwrap(), 0);
        assert_eq!(osd.kvm_status().unwrap(), 0);
    }

    #[test]
    fn test_toggle_requires_binary_property() {
        let mut osd = channel(MockMonitor::default());
        assert!(matches!(
            osd.toggle(&BRIGHTNESS),
            Err(OsdError::UnsupportedOperation {
                operation: "toggle",
                ..
            })
        ));
    }

    #[test]
    fn test_snapshot_reads_every_property() {
        let mut osd = channel(MockMonitor::with_value(&BRIGHTNESS, 55));
        let snapshot = osd.snapshot().unwrap();

        assert_eq!(snapshot.len(), property::ALL.len());
        assert_eq!(snapshot[0], (&BRIGHTNESS, 55));
        assert_eq!(osd.transport().reads, property::ALL.len());
    }
}
