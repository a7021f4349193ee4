// SPDX-License-Identifier: GPL-3.0-only
//! Error types for OSD control
//!
//! Every failure is surfaced to the immediate caller. Nothing in this crate
//! retries a transfer.

use thiserror::Error;

/// Main error type for OSD sessions and transfers
#[derive(Error, Debug)]
pub enum OsdError {
    /// No USB device with the requested identifiers is attached
    #[error("Device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// The transport acknowledged a different byte count than was sent
    #[error(
        "Transferred message length mismatch: sent {expected} bytes, device acknowledged {actual}"
    )]
    TransferLengthMismatch { expected: usize, actual: usize },

    /// The reply was too short to contain the value byte
    #[error("Reply too short: expected at least {expected} bytes, got {actual}")]
    ShortReply { expected: usize, actual: usize },

    /// An enumeration property rejected a value
    #[error("Invalid value {value} for {property}, only allowed values: {allowed:?}")]
    InvalidValue {
        property: &'static str,
        value: i32,
        allowed: &'static [u8],
    },

    /// A transition was requested with a zero step
    #[error("Transition step must be greater than zero")]
    InvalidStep,

    /// The operation does not apply to this property's value policy
    #[error("Cannot {operation} {property}")]
    UnsupportedOperation {
        property: &'static str,
        operation: &'static str,
    },

    /// USB transport error, propagated unchanged
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for OsdError
pub type Result<T> = std::result::Result<T, OsdError>;
