// SPDX-License-Identifier: GPL-3.0-only
//! USB permission diagnostics
//!
//! Explains why a session cannot be opened as a regular user: missing device,
//! unwritable device node, missing udev rule.

use std::fs;
use std::path::{Path, PathBuf};

use rusb::UsbContext;

use crate::devices::DeviceSpec;

const UDEV_RULE_DIRS: &[&str] = &[
    "/etc/udev/rules.d",
    "/usr/lib/udev/rules.d",
    "/lib/udev/rules.d",
];

#[derive(Debug, Clone)]
pub struct PermissionCheckResult {
    pub requirements: Vec<PermissionRequirement>,
}

#[derive(Debug, Clone)]
pub struct PermissionRequirement {
    pub name: String,
    pub description: String,
    pub status: RequirementStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequirementStatus {
    Met,
    NotMet,
    NotApplicable,
    Partial,
}

impl PermissionCheckResult {
    pub fn has_issues(&self) -> bool {
        self.requirements.iter().any(|r| r.status == RequirementStatus::NotMet)
    }

    pub fn summary(&self) -> String {
        let not_met = self
            .requirements
            .iter()
            .filter(|r| r.status == RequirementStatus::NotMet)
            .count();

        if not_met == 0 {
            let met_count = self
                .requirements
                .iter()
                .filter(|r| r.status == RequirementStatus::Met)
                .count();
            format!("All {} requirements met", met_count)
        } else {
            format!("{} requirement(s) not met", not_met)
        }
    }
}

/// Check whether the current user can open the OSD interface of `spec`
pub fn check_usb_permissions(spec: &DeviceSpec) -> PermissionCheckResult {
    let mut requirements = Vec::new();
    let is_root = unsafe { libc::geteuid() } == 0;

    // 1. Device present on the bus
    let location = find_device(spec);
    requirements.push(PermissionRequirement {
        name: "Billboard device".to_string(),
        description: match location {
            Some((bus, address)) => format!(
                "Found {} on bus {:03} address {:03}",
                spec.name, bus, address
            ),
            None => format!(
                "No {:04x}:{:04x} device connected",
                spec.vendor_id, spec.product_id
            ),
        },
        status: if location.is_some() {
            RequirementStatus::Met
        } else {
            RequirementStatus::NotMet
        },
    });

    // 2. Read/write access to the device node
    let node = location.map(|(bus, address)| device_node(bus, address));
    requirements.push(match node {
        Some(ref node) if node.exists() => {
            let writable = can_write(node);
            PermissionRequirement {
                name: "USB device access".to_string(),
                description: if writable {
                    format!("{} is writable", node.display())
                } else {
                    format!("Cannot write to {}", node.display())
                },
                status: if writable {
                    RequirementStatus::Met
                } else {
                    RequirementStatus::NotMet
                },
            }
        }
        // Not Linux usbfs, or device missing
        _ => PermissionRequirement {
            name: "USB device access".to_string(),
            description: "N/A".to_string(),
            status: RequirementStatus::NotApplicable,
        },
    });

    // 3. udev rule covering the device
    let rule = find_udev_rule(spec);
    requirements.push(PermissionRequirement {
        name: "udev rules".to_string(),
        description: match rule {
            Some(ref path) => format!("Rule found in {}", path.display()),
            None if is_root => "N/A - running as root".to_string(),
            None => "No udev rule mentions the device".to_string(),
        },
        status: match rule {
            Some(_) => RequirementStatus::Met,
            None if is_root => RequirementStatus::NotApplicable,
            None => RequirementStatus::NotMet,
        },
    });

    // 4. plugdev membership, which most distribution rules grant access to
    let in_plugdev = is_in_group("plugdev");
    requirements.push(PermissionRequirement {
        name: "plugdev group".to_string(),
        description: if is_root {
            "N/A - running as root".to_string()
        } else if in_plugdev {
            "User is in plugdev group".to_string()
        } else {
            "User not in plugdev group".to_string()
        },
        status: if is_root {
            RequirementStatus::NotApplicable
        } else if in_plugdev {
            RequirementStatus::Met
        } else {
            // uaccess rules work without the group
            RequirementStatus::Partial
        },
    });

    PermissionCheckResult { requirements }
}

/// Locate the device, returning (bus, address)
fn find_device(spec: &DeviceSpec) -> Option<(u8, u8)> {
    let context = match rusb::Context::new() {
        Ok(context) => context,
        Err(e) => {
            debug!("Failed to create USB context: {}", e);
            return None;
        }
    };
    let devices = match context.devices() {
        Ok(devices) => devices,
        Err(e) => {
            debug!("Failed to list USB devices: {}", e);
            return None;
        }
    };

    devices.iter().find_map(|device| {
        let desc = device.device_descriptor().ok()?;
        (desc.vendor_id() == spec.vendor_id && desc.product_id() == spec.product_id)
            .then(|| (device.bus_number(), device.address()))
    })
}

fn device_node(bus: u8, address: u8) -> PathBuf {
    PathBuf::from(format!("/dev/bus/usb/{:03}/{:03}", bus, address))
}

/// Check if we can write to a device
fn can_write(path: &Path) -> bool {
    fs::OpenOptions::new().write(true).open(path).is_ok()
}

/// Whether a udev rules file grants access to the device
///
/// Matches the ATTRS/ATTR idVendor and idProduct values, case-insensitively.
pub fn rules_mention_device(contents: &str, spec: &DeviceSpec) -> bool {
    let vendor = format!("{:04x}", spec.vendor_id);
    let product = format!("{:04x}", spec.product_id);
    contents
        .lines()
        .map(|line| line.trim().to_ascii_lowercase())
        .filter(|line| !line.starts_with('#'))
        .any(|line| {
            line.contains("idvendor")
                && line.contains(&vendor)
                && line.contains("idproduct")
                && line.contains(&product)
        })
}

fn find_udev_rule(spec: &DeviceSpec) -> Option<PathBuf> {
    UDEV_RULE_DIRS
        .iter()
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "rules"))
        .find(|path| {
            fs::read_to_string(path)
                .map(|contents| rules_mention_device(&contents, spec))
                .unwrap_or(false)
        })
}

/// Check if the current user is in `group`
fn is_in_group(group: &str) -> bool {
    #[cfg(unix)]
    {
        use std::process::Command;

        match Command::new("groups").output() {
            Ok(output) => match String::from_utf8(output.stdout) {
                Ok(groups_str) => {
                    debug!("Groups output: '{}'", groups_str.trim());
                    return groups_str.split_whitespace().any(|g| g == group);
                }
                Err(e) => {
                    debug!("Failed to parse groups output: {}", e);
                }
            },
            Err(e) => {
                debug!("Failed to run groups command: {}", e);
            }
        }
    }

    false
}
