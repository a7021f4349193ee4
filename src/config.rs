// SPDX-License-Identifier: GPL-3.0-only
//! Configuration loading
//!
//! Settings live in an optional KDL file, by default
//! `$XDG_CONFIG_HOME/gigabyte-osd/config.kdl`:
//!
//! ```kdl
//! vendor-id 0x2109
//! product-id 0x8883
//! pacing-ms 50
//! transfer-timeout-ms 1000
//! transition-step 3
//! log-filter "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use kdl::{KdlDocument, KdlValue};

use crate::devices::gigabyte;
use crate::error::{OsdError, Result};
use crate::osd::{DEFAULT_STEP, PACING};

pub const CONFIG_DIR: &str = "gigabyte-osd";
pub const CONFIG_FILE: &str = "config.kdl";

const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Sleep after every transfer, never below [`PACING`]
    pub pacing: Duration,
    pub transfer_timeout: Duration,
    pub transition_step: u8,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendor_id: gigabyte::VENDOR_ID,
            product_id: gigabyte::m27q::PRODUCT_ID,
            pacing: PACING,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            transition_step: DEFAULT_STEP,
            log_filter: None,
        }
    }
}

/// Default location of the configuration file
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

fn integer<T: TryFrom<i128>>(name: &str, value: &KdlValue) -> Result<T> {
    value
        .as_integer()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| OsdError::Config(format!("{name}: invalid value {value}")))
}

impl Config {
    /// Load the configuration
    ///
    /// With an explicit `path` the file must exist. Without one the default
    /// location is tried and a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_path() {
                Some(path) => (path, false),
                None => {
                    tracing::debug!("No config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::from_kdl(&text)
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(OsdError::Config(format!("{}: {}", path.display(), e))),
        }
    }

    /// Parse a KDL document, starting from defaults
    pub fn from_kdl(text: &str) -> Result<Self> {
        let doc: KdlDocument = text
            .parse()
            .map_err(|e: kdl::KdlError| OsdError::Config(e.to_string()))?;

        let mut config = Self::default();
        for node in doc.nodes() {
            let name = node.name().value();
            let Some(value) = node
                .entries()
                .iter()
                .find(|e| e.name().is_none())
                .map(|e| e.value())
            else {
                return Err(OsdError::Config(format!("{name}: missing value")));
            };

            match name {
                "vendor-id" => config.vendor_id = integer(name, value)?,
                "product-id" => config.product_id = integer(name, value)?,
                "pacing-ms" => {
                    let pacing = Duration::from_millis(integer(name, value)?);
                    if pacing < PACING {
                        tracing::warn!(
                            "pacing-ms {} is below the {}ms the monitor needs, using {}ms",
                            pacing.as_millis(),
                            PACING.as_millis(),
                            PACING.as_millis()
                        );
                    }
                    config.pacing = pacing.max(PACING);
                }
                "transfer-timeout-ms" => {
                    config.transfer_timeout = Duration::from_millis(integer(name, value)?)
                }
                "transition-step" => {
                    let step: u8 = integer(name, value)?;
                    if step == 0 {
                        return Err(OsdError::Config(
                            "transition-step must be greater than zero".to_string(),
                        ));
                    }
                    config.transition_step = step;
                }
                "log-filter" => {
                    let filter = value.as_string().ok_or_else(|| {
                        OsdError::Config(format!("{name}: expected a string, got {value}"))
                    })?;
                    config.log_filter = Some(filter.to_string());
                }
                other => tracing::warn!("Ignoring unknown config node '{}'", other),
            }
        }

        Ok(config)
    }
}
