//! System Mount Adapter
//!
//! Implements the `Mounter` port with `mount(2)`/`umount(2)` via `nix` and
//! the kernel mount table for mount-point checks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nix::mount::MsFlags;
use tracing::{debug, instrument};

use crate::domain::ports::Mounter;
use crate::error::{Error, Result};

/// Default location of the kernel mount table.
pub const PROC_MOUNTS: &str = "/proc/self/mounts";

/// Mounter backed by real syscalls.
#[derive(Debug, Clone)]
pub struct SystemMounter {
    mount_table: PathBuf,
}

impl Default for SystemMounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMounter {
    pub fn new() -> Self {
        Self {
            mount_table: PathBuf::from(PROC_MOUNTS),
        }
    }

    /// Read mount points from a different table, e.g. a host's
    /// `/proc/1/mounts` when running in a container.
    pub fn with_mount_table(mount_table: impl Into<PathBuf>) -> Self {
        Self {
            mount_table: mount_table.into(),
        }
    }
}

/// Split textual mount options into kernel flags and filesystem data.
///
/// Unknown options are passed through to the filesystem in their original
/// order, so for tmpfs a later `size=` still overrides an earlier one.
pub fn split_mount_options(options: &[String]) -> (MsFlags, String) {
    let mut flags = MsFlags::empty();
    let mut data: Vec<&str> = Vec::new();

    for option in options {
        match option.as_str() {
            "ro" => flags.insert(MsFlags::MS_RDONLY),
            "rw" => flags.remove(MsFlags::MS_RDONLY),
            "nosuid" => flags.insert(MsFlags::MS_NOSUID),
            "suid" => flags.remove(MsFlags::MS_NOSUID),
            "nodev" => flags.insert(MsFlags::MS_NODEV),
            "dev" => flags.remove(MsFlags::MS_NODEV),
            "noexec" => flags.insert(MsFlags::MS_NOEXEC),
            "exec" => flags.remove(MsFlags::MS_NOEXEC),
            "sync" => flags.insert(MsFlags::MS_SYNCHRONOUS),
            "async" => flags.remove(MsFlags::MS_SYNCHRONOUS),
            "noatime" => flags.insert(MsFlags::MS_NOATIME),
            "atime" => flags.remove(MsFlags::MS_NOATIME),
            "nodiratime" => flags.insert(MsFlags::MS_NODIRATIME),
            "diratime" => flags.remove(MsFlags::MS_NODIRATIME),
            "relatime" => flags.insert(MsFlags::MS_RELATIME),
            "strictatime" => flags.insert(MsFlags::MS_STRICTATIME),
            "dirsync" => flags.insert(MsFlags::MS_DIRSYNC),
            "remount" => flags.insert(MsFlags::MS_REMOUNT),
            "" | "defaults" => {}
            other => data.push(other),
        }
    }

    (flags, data.join(","))
}

/// Decode the octal escapes (`\040` etc.) used in mount table fields.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Mount points listed in a `/proc/*/mounts` formatted table.
pub fn parse_mount_points(table: &str) -> Vec<PathBuf> {
    // <device> <mountpoint> <fstype> <options> <dump> <pass>
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|field| PathBuf::from(unescape_mount_field(field)))
        .collect()
}

#[async_trait]
impl Mounter for SystemMounter {
    #[instrument(skip(self, options))]
    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fstype: &str,
        options: &[String],
    ) -> Result<()> {
        let mount_failed = |reason: String| Error::MountFailed {
            path: target.display().to_string(),
            reason,
        };

        tokio::fs::create_dir_all(target)
            .await
            .map_err(|e| mount_failed(format!("create target dir: {}", e)))?;

        let (flags, data) = split_mount_options(options);
        debug!(?flags, data = %data, "Issuing mount syscall");

        let source = source.to_string();
        let fstype = fstype.to_string();
        let target_buf = target.to_path_buf();
        tokio::task::spawn_blocking(move || {
            nix::mount::mount(
                Some(source.as_str()),
                target_buf.as_path(),
                Some(fstype.as_str()),
                flags,
                (!data.is_empty()).then_some(data.as_str()),
            )
        })
        .await
        .map_err(|e| mount_failed(e.to_string()))?
        .map_err(|e| mount_failed(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn unmount(&self, target: &Path) -> Result<()> {
        let unmount_failed = |reason: String| Error::UnmountFailed {
            path: target.display().to_string(),
            reason,
        };

        let target_buf = target.to_path_buf();
        tokio::task::spawn_blocking(move || nix::mount::umount(target_buf.as_path()))
            .await
            .map_err(|e| unmount_failed(e.to_string()))?
            .map_err(|e| unmount_failed(e.to_string()))
    }

    async fn is_mounted(&self, target: &Path) -> Result<bool> {
        let table = tokio::fs::read_to_string(&self.mount_table).await?;
        let canonical = tokio::fs::canonicalize(target).await.ok();

        Ok(parse_mount_points(&table)
            .iter()
            .any(|point| point == target || Some(point) == canonical.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_flags_and_data() {
        let (flags, data) = split_mount_options(&opts(&["ro", "noexec", "mode=700", "size=1g"]));
        assert!(flags.contains(MsFlags::MS_RDONLY));
        assert!(flags.contains(MsFlags::MS_NOEXEC));
        assert_eq!(data, "mode=700,size=1g");
    }

    #[test]
    fn test_split_later_option_wins() {
        let (flags, data) = split_mount_options(&opts(&["ro", "rw", "size=2g", "size=64m"]));
        assert!(!flags.contains(MsFlags::MS_RDONLY));
        assert_eq!(data, "size=2g,size=64m");
    }

    #[test]
    fn test_split_empty() {
        let (flags, data) = split_mount_options(&[]);
        assert!(flags.is_empty());
        assert!(data.is_empty());
    }

    #[test]
    fn test_parse_mount_points() {
        let table = "\
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /var/lib/kubelet/pods/u1/volumes/kubernetes.io~csi/pv-1/mount tmpfs rw,relatime,size=1048576k 0 0
tmpfs /mnt/with\\040space tmpfs rw 0 0
";
        let points = parse_mount_points(table);
        assert_eq!(points.len(), 3);
        assert_eq!(
            points[1],
            PathBuf::from("/var/lib/kubelet/pods/u1/volumes/kubernetes.io~csi/pv-1/mount")
        );
        assert_eq!(points[2], PathBuf::from("/mnt/with space"));
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape_mount_field("/a\\"), "/a\\");
        assert_eq!(unescape_mount_field("/a\\04"), "/a\\04");
    }

    #[tokio::test]
    async fn test_is_mounted_reads_table() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        tokio::fs::create_dir_all(&target).await.unwrap();
        let canonical = tokio::fs::canonicalize(&target).await.unwrap();

        let table = dir.path().join("mounts");
        tokio::fs::write(
            &table,
            format!("tmpfs {} tmpfs rw 0 0\n", canonical.display()),
        )
        .await
        .unwrap();

        let mounter = SystemMounter::with_mount_table(&table);
        assert!(mounter.is_mounted(&target).await.unwrap());
        assert!(!mounter.is_mounted(dir.path()).await.unwrap());
        assert!(mounter.path_exists(&target).await.unwrap());
        assert!(!mounter.path_exists(&dir.path().join("nope")).await.unwrap());
    }
}
