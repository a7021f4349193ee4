// SPDX-License-Identifier: GPL-3.0-only
//! Device-specific configurations organized by manufacturer

pub mod gigabyte;

/// Device specification for a monitor's OSD control interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    /// USB Vendor ID
    pub vendor_id: u16,

    /// USB Product ID
    pub product_id: u16,

    /// Human-readable device name
    pub name: &'static str,

    /// Interface the kernel driver may be bound to
    pub interface: u8,

    /// Configuration selected when the session opens
    pub configuration: u8,
}

impl DeviceSpec {
    /// Spec for identifiers that are not in the table, using the
    /// Billboard interface layout
    pub fn custom(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            name: "Custom Billboard Device",
            ..gigabyte::m27q::SPEC
        }
    }
}

/// Get device specification by vendor and product ID
pub fn get_device_spec(vendor_id: u16, product_id: u16) -> Option<DeviceSpec> {
    match (vendor_id, product_id) {
        (gigabyte::VENDOR_ID, gigabyte::m27q::PRODUCT_ID) => Some(gigabyte::m27q::SPEC),
        _ => None,
    }
}

/// Resolve identifiers to a spec, falling back to a custom one
pub fn resolve(vendor_id: u16, product_id: u16) -> DeviceSpec {
    get_device_spec(vendor_id, product_id).unwrap_or_else(|| {
        tracing::warn!(
            "No device spec for {:04x}:{:04x}, assuming Billboard layout",
            vendor_id,
            product_id
        );
        DeviceSpec::custom(vendor_id, product_id)
    })
}
