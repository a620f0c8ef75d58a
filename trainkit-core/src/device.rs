//! Accelerator enumeration.
//!
//! The batch distributor never talks to hardware directly. It asks a
//! [`DeviceProvider`] for an ordered list of device identifiers, so tests and
//! callers with explicit placement can hand it a fixed list.

use std::path::Path;
use tracing::debug;

/// Identifier used when no accelerator is requested.
pub const HOST_DEVICE: &str = "/cpu:0";

/// Directory the NVIDIA kernel driver populates with one entry per GPU.
const NVIDIA_PROC_DIR: &str = "/proc/driver/nvidia/gpus";

/// Supplies an ordered list of accelerator identifiers.
///
/// Order is whatever the underlying runtime reports and is not guaranteed to
/// be stable across processes.
pub trait DeviceProvider {
    fn devices(&self) -> Vec<String>;
}

/// A fixed device list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticDevices {
    devices: Vec<String>,
}

impl StaticDevices {
    pub fn new<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            devices: devices.into_iter().map(Into::into).collect(),
        }
    }

    /// `count` GPUs named `/device:GPU:0`, `/device:GPU:1`, ...
    pub fn gpus(count: usize) -> Self {
        Self {
            devices: (0..count).map(gpu_name).collect(),
        }
    }
}

impl DeviceProvider for StaticDevices {
    fn devices(&self) -> Vec<String> {
        self.devices.clone()
    }
}

/// Enumerates GPUs visible to this process.
///
/// `CUDA_VISIBLE_DEVICES` wins when set. Otherwise the driver's proc directory
/// is counted; on machines without it the list is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDevices;

impl SystemDevices {
    /// Parse a `CUDA_VISIBLE_DEVICES`-style string.
    ///
    /// The runtime renumbers visible devices from zero and stops at the first
    /// invalid entry, so `"3,1"` yields two GPUs and `"0,-1,2"` yields one.
    pub fn from_visible(visible: &str) -> Vec<String> {
        visible
            .split(',')
            .map(str::trim)
            .take_while(|token| !token.is_empty() && !token.starts_with('-'))
            .enumerate()
            .map(|(i, _)| gpu_name(i))
            .collect()
    }

    fn probe_driver(dir: &Path) -> Vec<String> {
        match std::fs::read_dir(dir) {
            Ok(entries) => {
                let count = entries.filter_map(|e| e.ok()).count();
                (0..count).map(gpu_name).collect()
            }
            Err(_) => Vec::new(),
        }
    }

    fn resolve(visible: Option<&str>, proc_dir: &Path) -> Vec<String> {
        match visible {
            Some(visible) => Self::from_visible(visible),
            None => Self::probe_driver(proc_dir),
        }
    }
}

impl DeviceProvider for SystemDevices {
    fn devices(&self) -> Vec<String> {
        let visible = std::env::var("CUDA_VISIBLE_DEVICES").ok();
        let devices = Self::resolve(visible.as_deref(), Path::new(NVIDIA_PROC_DIR));
        debug!(
            count = devices.len(),
            from_env = visible.is_some(),
            "Enumerated accelerators"
        );
        devices
    }
}

fn gpu_name(index: usize) -> String {
    format!("/device:GPU:{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_devices_keep_order() {
        let provider = StaticDevices::new(["/gpu:1", "/gpu:0"]);
        assert_eq!(provider.devices(), vec!["/gpu:1", "/gpu:0"]);
    }

    #[test]
    fn test_static_gpus() {
        let provider = StaticDevices::gpus(3);
        assert_eq!(
            provider.devices(),
            vec!["/device:GPU:0", "/device:GPU:1", "/device:GPU:2"]
        );
    }

    #[test]
    fn test_from_visible() {
        assert_eq!(SystemDevices::from_visible("3,1").len(), 2);
        assert_eq!(SystemDevices::from_visible("0, 2 ,5").len(), 3);
        assert_eq!(SystemDevices::from_visible("0,-1,2"), vec!["/device:GPU:0"]);
        assert!(SystemDevices::from_visible("").is_empty());
        assert!(SystemDevices::from_visible("-1").is_empty());
    }

    #[test]
    fn test_probe_driver_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("0000:01:00.0")).unwrap();
        std::fs::create_dir(dir.path().join("0000:02:00.0")).unwrap();
        assert_eq!(
            SystemDevices::probe_driver(dir.path()),
            vec!["/device:GPU:0", "/device:GPU:1"]
        );
    }

    #[test]
    fn test_probe_driver_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SystemDevices::probe_driver(&dir.path().join("nope")).is_empty());
    }

    #[test]
    fn test_visible_devices_take_precedence_over_driver() {
        let dir = tempfile::tempdir().unwrap();
        for bus in ["0000:01:00.0", "0000:02:00.0", "0000:03:00.0"] {
            std::fs::create_dir(dir.path().join(bus)).unwrap();
        }
        assert_eq!(
            SystemDevices::resolve(Some("5"), dir.path()),
            vec!["/device:GPU:0"]
        );
        // Set but empty hides every GPU.
        assert!(SystemDevices::resolve(Some(""), dir.path()).is_empty());
        assert_eq!(SystemDevices::resolve(None, dir.path()).len(), 3);
    }
}
