//! Kubernetes Capacity Lookup Adapter
//!
//! Implements the `CapacityLookup` port by reading the cluster-scoped
//! PersistentVolume named after the volume id.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolume;
use kube::api::Api;
use kube::Client;
use tracing::{debug, instrument};

use crate::domain::ports::{CapacityDeclaration, CapacityLookup, VolumeId};
use crate::error::{Error, Result};

/// Capacity key in `PersistentVolume.spec.capacity`.
const STORAGE: &str = "storage";

/// Reads capacity and mount options from PersistentVolume objects.
#[derive(Clone)]
pub struct KubeCapacityLookup {
    client: Client,
}

impl KubeCapacityLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn volumes_api(&self) -> Api<PersistentVolume> {
        Api::all(self.client.clone())
    }

    /// Convert a PersistentVolume into a capacity declaration.
    ///
    /// A missing `storage` entry yields zero bytes.
    fn declaration_from(pv: &PersistentVolume) -> Result<CapacityDeclaration> {
        let spec = pv.spec.as_ref();

        let required_bytes = match spec
            .and_then(|s| s.capacity.as_ref())
            .and_then(|c| c.get(STORAGE))
        {
            Some(quantity) => parse_quantity(&quantity.0)?,
            None => 0,
        };

        let mount_options = spec
            .and_then(|s| s.mount_options.clone())
            .unwrap_or_default();

        Ok(CapacityDeclaration {
            required_bytes,
            mount_options,
        })
    }
}

impl std::fmt::Debug for KubeCapacityLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCapacityLookup").finish()
    }
}

#[async_trait]
impl CapacityLookup for KubeCapacityLookup {
    #[instrument(skip(self))]
    async fn lookup(&self, volume_id: &VolumeId) -> Result<CapacityDeclaration> {
        let pv = self.volumes_api().get(volume_id.as_str()).await?;
        let declaration = Self::declaration_from(&pv)?;
        debug!(
            required_bytes = declaration.required_bytes,
            mount_options = ?declaration.mount_options,
            "Read PersistentVolume capacity"
        );
        Ok(declaration)
    }
}

/// Parse a Kubernetes resource quantity into whole bytes.
///
/// Supports binary (`Ki`..`Ei`) and decimal (`n`, `u`, `m`, `k`..`E`)
/// suffixes, exponent notation (`1e9`) and fractional mantissas.
/// Fractions of a byte round up.
pub fn parse_quantity(raw: &str) -> Result<u64> {
    let invalid = |why: &str| Error::InvalidArgument(format!("invalid quantity {:?}: {}", raw, why));

    let s = raw.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    if s.starts_with('-') {
        return Err(invalid("negative capacity"));
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);
    if number.is_empty() || number == "." {
        return Err(invalid("missing number"));
    }

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if frac_part.contains('.') || frac_part.len() > 18 {
        return Err(invalid("malformed fraction"));
    }

    let (numerator, denominator) = suffix_multiplier(suffix).ok_or_else(|| invalid("unknown suffix"))?;

    let scale = 10u128.pow(frac_part.len() as u32);
    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid("number out of range"))?
    };
    let frac_value: u128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().map_err(|_| invalid("malformed fraction"))?
    };

    let mantissa = int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| invalid("number out of range"))?;
    let scaled = mantissa
        .checked_mul(numerator)
        .ok_or_else(|| invalid("number out of range"))?;
    let divisor = scale
        .checked_mul(denominator)
        .ok_or_else(|| invalid("number out of range"))?;

    let bytes = scaled.div_ceil(divisor);
    u64::try_from(bytes).map_err(|_| invalid("number out of range"))
}

/// Multiplier for a quantity suffix as a `(numerator, denominator)` pair.
fn suffix_multiplier(suffix: &str) -> Option<(u128, u128)> {
    let pair = match suffix {
        "" => (1, 1),
        "n" => (1, 1_000_000_000),
        "u" => (1, 1_000_000),
        "m" => (1, 1_000),
        "k" => (1_000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        "Ki" => (1 << 10, 1),
        "Mi" => (1 << 20, 1),
        "Gi" => (1 << 30, 1),
        "Ti" => (1 << 40, 1),
        "Pi" => (1 << 50, 1),
        "Ei" => (1 << 60, 1),
        _ => return exponent_multiplier(suffix),
    };
    Some(pair)
}

/// Multiplier for exponent notation such as `e9` or `E-3`.
fn exponent_multiplier(suffix: &str) -> Option<(u128, u128)> {
    let exponent = suffix
        .strip_prefix('e')
        .or_else(|| suffix.strip_prefix('E'))?;
    let exponent: i32 = exponent.parse().ok()?;
    let power = 10u128.checked_pow(exponent.unsigned_abs())?;
    if exponent >= 0 {
        Some((power, 1))
    } else {
        Some((1, power))
    }
}
