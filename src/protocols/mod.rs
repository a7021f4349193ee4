// SPDX-License-Identifier: GPL-3.0-only
//! Monitor control protocols
//!
//! The OSD logic talks to the monitor through [`ControlTransport`], so it can
//! run against real USB hardware or an in-memory transport in tests.

pub mod billboard;

use crate::error::Result;

/// A USB control-transfer endpoint
///
/// Implementations must block until the transfer completes or fails.
pub trait ControlTransport: std::fmt::Debug {
    /// Host-to-device control transfer, returns the acknowledged byte count
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize>;

    /// Device-to-host control transfer into `buf`, returns the bytes read
    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize>;
}
