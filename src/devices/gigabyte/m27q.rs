// SPDX-License-Identifier: GPL-3.0-only
//! Gigabyte M27Q (KVM) specifications

use crate::devices::DeviceSpec;

/// USB Product ID of the M27Q's Billboard Device
pub const PRODUCT_ID: u16 = 0x8883;

/// Device specification for the Gigabyte M27Q
///
/// The OSD is reached through vendor control transfers on the hub's
/// USB Billboard Device, not through DDC/CI.
pub const SPEC: DeviceSpec = DeviceSpec {
    vendor_id: super::VENDOR_ID,
    product_id: PRODUCT_ID,
    name: "Gigabyte M27Q",
    interface: 0,
    configuration: 1,
};
