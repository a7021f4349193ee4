// SPDX-License-Identifier: GPL-3.0-only
//! Gigabyte monitor specifications

pub mod m27q;

/// The KVM hub in these monitors enumerates with the VIA Labs vendor ID
pub const VENDOR_ID: u16 = 0x2109;
