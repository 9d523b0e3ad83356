//! Mount size derivation
//!
//! Converts a declared byte capacity into a tmpfs `size=` option expressed
//! in the largest whole binary unit that is non-zero. Sizes are truncated,
//! never rounded up.

use std::fmt;

use crate::error::{Error, Result};

/// One mebibyte in bytes.
pub const MIB: u64 = 1 << 20;

/// One gibibyte in bytes.
pub const GIB: u64 = 1 << 30;

/// Unit suffix understood by tmpfs' `size=` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    Mebibytes,
    Gibibytes,
}

impl SizeUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            SizeUnit::Mebibytes => "m",
            SizeUnit::Gibibytes => "g",
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            SizeUnit::Mebibytes => MIB,
            SizeUnit::Gibibytes => GIB,
        }
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Size limit for a memory-backed mount. `amount` is always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountSizeSpec {
    pub amount: u64,
    pub unit: SizeUnit,
}

impl MountSizeSpec {
    /// Derive the mount size from a byte count.
    ///
    /// Gibibytes are used whenever at least one whole GiB fits, otherwise
    /// mebibytes. Fails with [`Error::CapacityTooSmall`] below 1 MiB.
    pub fn from_bytes(bytes: u64) -> Result<Self> {
        [SizeUnit::Gibibytes, SizeUnit::Mebibytes]
            .into_iter()
            .map(|unit| MountSizeSpec {
                amount: bytes / unit.bytes(),
                unit,
            })
            .find(|spec| spec.amount > 0)
            .ok_or(Error::CapacityTooSmall { bytes })
    }

    /// The `size=<amount><unit>` mount option.
    pub fn to_option(self) -> String {
        format!("size={}", self)
    }
}

impl fmt::Display for MountSizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit)
    }
}

/// Final option list for the backing mount.
///
/// Declared options keep their order and are not deduplicated; the size
/// option goes last so it overrides any declared `size=`.
pub fn build_mount_options(declared: &[String], size: MountSizeSpec) -> Vec<String> {
    let mut options = Vec::with_capacity(declared.len() + 1);
    options.extend(declared.iter().cloned());
    options.push(size.to_option());
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn test_whole_gibibytes() {
        let spec = MountSizeSpec::from_bytes(5 * GIB).unwrap();
        assert_eq!(spec.amount, 5);
        assert_eq!(spec.unit, SizeUnit::Gibibytes);
        assert_eq!(spec.to_string(), "5g");
    }

    #[test]
    fn test_gibibytes_truncate() {
        let spec = MountSizeSpec::from_bytes(GIB + GIB / 2).unwrap();
        assert_eq!(spec.to_string(), "1g");
    }

    #[test]
    fn test_below_one_gibibyte_uses_mebibytes() {
        let spec = MountSizeSpec::from_bytes(512 * MIB + 1).unwrap();
        assert_eq!(spec.amount, 512);
        assert_eq!(spec.unit, SizeUnit::Mebibytes);
    }

    #[test]
    fn test_too_small() {
        assert_matches!(
            MountSizeSpec::from_bytes(MIB - 1),
            Err(Error::CapacityTooSmall { bytes }) if bytes == MIB - 1
        );
        assert_matches!(
            MountSizeSpec::from_bytes(0),
            Err(Error::CapacityTooSmall { bytes: 0 })
        );
    }

    #[test]
    fn test_build_appends_size_last() {
        let spec = MountSizeSpec {
            amount: 5,
            unit: SizeUnit::Gibibytes,
        };
        assert_eq!(
            build_mount_options(&["ro".to_string()], spec),
            vec!["ro".to_string(), "size=5g".to_string()]
        );
    }

    #[test]
    fn test_build_keeps_declared_size_and_duplicates() {
        let spec = MountSizeSpec {
            amount: 64,
            unit: SizeUnit::Mebibytes,
        };
        let declared = vec![
            "size=1g".to_string(),
            "mode=700".to_string(),
            "mode=700".to_string(),
        ];
        let options = build_mount_options(&declared, spec);
        assert_eq!(
            options,
            vec!["size=1g", "mode=700", "mode=700", "size=64m"]
        );
    }

    #[test]
    fn test_build_with_no_declared_options() {
        let spec = MountSizeSpec::from_bytes(3 * MIB).unwrap();
        assert_eq!(build_mount_options(&[], spec), vec!["size=3m"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_mebibyte_range(bytes in MIB..GIB) {
            let spec = MountSizeSpec::from_bytes(bytes).unwrap();
            prop_assert_eq!(spec.unit, SizeUnit::Mebibytes);
            prop_assert_eq!(spec.amount, bytes / MIB);
        }

        #[test]
        fn prop_gibibyte_range(bytes in GIB..=u64::MAX) {
            let spec = MountSizeSpec::from_bytes(bytes).unwrap();
            prop_assert_eq!(spec.unit, SizeUnit::Gibibytes);
            prop_assert!(spec.amount * GIB <= bytes);
        }

        #[test]
        fn prop_below_mebibyte_fails(bytes in 0..MIB) {
            let too_small = matches!(
                MountSizeSpec::from_bytes(bytes),
                Err(Error::CapacityTooSmall { .. })
            );
            prop_assert!(too_small);
        }
    }
}
