// SPDX-License-Identifier: GPL-3.0-only
//! OSD property registry
//!
//! Each property pairs a wire opcode (major, minor) with the policy used to
//! validate values before they are written to the monitor.

use crate::error::{OsdError, Result};

/// Value validation policy for a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Values are clamped into `min..=max`
    Range { min: u8, max: u8 },
    /// Only the listed values are accepted, anything else is rejected
    Enumeration(&'static [u8]),
}

impl Policy {
    /// Clamp or check `value` against this policy
    ///
    /// Returns the byte that goes on the wire. `property` is only used to
    /// name the property in the error.
    pub fn validate(&self, property: &'static str, value: i32) -> Result<u8> {
        match *self {
            Policy::Range { min, max } => Ok(value.clamp(min as i32, max as i32) as u8),
            Policy::Enumeration(allowed) => allowed
                .iter()
                .copied()
                .find(|&v| v as i32 == value)
                .ok_or(OsdError::InvalidValue {
                    property,
                    value,
                    allowed,
                }),
        }
    }

    /// True for two-state properties such as the KVM switch
    pub fn is_binary(&self) -> bool {
        matches!(self, Policy::Range { min: 0, max: 1 })
    }
}

/// A controllable monitor setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property {
    /// Kebab-case name, used on the command line
    pub name: &'static str,
    /// First opcode byte
    pub major: u8,
    /// Second opcode byte, 0 for top-level settings
    pub minor: u8,
    pub policy: Policy,
}

impl Property {
    const fn range(name: &'static str, major: u8, minor: u8, min: u8, max: u8) -> Self {
        Self {
            name,
            major,
            minor,
            policy: Policy::Range { min, max },
        }
    }

    /// Validate `value` with this property's policy
    pub fn validate(&self, value: i32) -> Result<u8> {
        self.policy.validate(self.name, value)
    }

    /// Opcode bytes sent in a read request
    pub fn read_args(&self) -> [u8; 2] {
        [self.major, self.minor]
    }

    /// Look up a registry property by name (case-insensitive, `_` or `-`)
    pub fn by_name(name: &str) -> Option<&'static Property> {
        let wanted = name.trim().to_ascii_lowercase().replace('_', "-");
        ALL.iter().copied().find(|p| p.name == wanted)
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

pub const BRIGHTNESS: Property = Property::range("brightness", 0x10, 0x00, 0, 100);
pub const CONTRAST: Property = Property::range("contrast", 0x12, 0x00, 0, 100);
pub const SHARPNESS: Property = Property::range("sharpness", 0x87, 0x00, 0, 100);
pub const BLUE_LIGHT_REDUCTION: Property =
    Property::range("blue-light-reduction", 0xe0, 0x0b, 0, 10);
pub const KVM_STATUS: Property = Property::range("kvm-status", 0xe0, 0x69, 0, 1);
pub const BLACK_EQUALIZER: Property = Property::range("black-equalizer", 0xe0, 0x02, 0, 10);
pub const OSD_TIMEOUT: Property = Property {
    name: "osd-timeout",
    major: 0xe0,
    minor: 0x30,
    policy: Policy::Enumeration(&[5, 10, 15, 20, 25, 30]),
};
pub const VOLUME: Property = Property::range("volume", 0x62, 0x00, 0, 100);

/// Every known property, in display order
pub const ALL: &[&Property] = &[
    &BRIGHTNESS,
    &CONTRAST,
    &SHARPNESS,
    &BLUE_LIGHT_REDUCTION,
    &KVM_STATUS,
    &BLACK_EQUALIZER,
    &OSD_TIMEOUT,
    &VOLUME,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_clamps() {
        for property in ALL.iter().filter(|p| matches!(p.policy, Policy::Range { .. })) {
            let Policy::Range { min, max } = property.policy else {
                unreachable!()
            };
            for v in [-20, 0, 1, 5, 10, 11, 99, 100, 150, 300] {
                let expected = v.clamp(min as i32, max as i32) as u8;
                assert_eq!(property.validate(v).unwrap(), expected, "{} {}", property, v);
            }
        }
    }

    #[test]
    fn test_brightness_clamped_to_max() {
        assert_eq!(BRIGHTNESS.validate(150).unwrap(), 100);
        assert_eq!(BRIGHTNESS.validate(-1).unwrap(), 0);
    }

    #[test]
    fn test_enumeration_accepts_members() {
        for v in [5, 10, 15, 20, 25, 30] {
            assert_eq!(OSD_TIMEOUT.validate(v).unwrap(), v as u8);
        }
    }

    #[test]
    fn test_enumeration_rejects_non_members() {
        let err = OSD_TIMEOUT.validate(12).unwrap_err();
        match err {
            OsdError::InvalidValue {
                property,
                value,
                allowed,
            } => {
                assert_eq!(property, "osd-timeout");
                assert_eq!(value, 12);
                assert_eq!(allowed, &[5, 10, 15, 20, 25, 30]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // No clamping for enumerations
        assert!(OSD_TIMEOUT.validate(35).is_err());
        assert!(OSD_TIMEOUT.validate(0).is_err());
    }

    #[test]
    fn test_registry_opcodes() {
        assert_eq!(BRIGHTNESS.read_args(), [0x10, 0x00]);
        assert_eq!(KVM_STATUS.read_args(), [0xe0, 0x69]);
        assert_eq!(VOLUME.read_args(), [0x62, 0x00]);
        assert_eq!(ALL.len(), 8);
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(Property::by_name("brightness"), Some(&BRIGHTNESS));
        assert_eq!(Property::by_name("KVM_STATUS"), Some(&KVM_STATUS));
        assert_eq!(Property::by_name("osd-timeout"), Some(&OSD_TIMEOUT));
        assert_eq!(Property::by_name("gamma"), None);
    }

    #[test]
    fn test_only_kvm_is_binary() {
        let binary: Vec<_> = ALL.iter().filter(|p| p.policy.is_binary()).collect();
        assert_eq!(binary.len(), 1);
        assert_eq!(binary[0].name, "kvm-status");
    }
}
