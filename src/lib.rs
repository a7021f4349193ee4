// SPDX-License-Identifier: GPL-3.0-only
//! OSD control for Gigabyte KVM monitors
//!
//! Settings such as brightness, volume or the KVM input are read and written
//! with vendor control transfers on the monitor's USB Billboard Device.
//!
//! ```no_run
//! use gigabyte_osd::{config::Config, osd::OsdChannel};
//!
//! # fn main() -> gigabyte_osd::error::Result<()> {
//! let config = Config::default();
//! let mut osd = OsdChannel::open_configured(&config)?;
//! osd.transition_brightness(40, config.transition_step)?;
//! println!("volume: {}", osd.volume()?);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub mod config;
pub mod devices;
pub mod error;
pub mod osd;
pub mod permissions;
pub mod property;
pub mod protocols;
