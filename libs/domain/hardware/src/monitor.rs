//! Owns the live device list and composes the device-selection argument
//! handed to the cracking binary.

use std::sync::RwLock;

use krakenhashes_domain_models::PhysicalDevice;

use crate::detector::DeviceDetector;
use crate::errors::HardwareError;

pub struct HardwareMonitor {
    data_dir: std::path::PathBuf,
    preferred_version: RwLock<Option<String>>,
    devices: RwLock<Vec<PhysicalDevice>>,
}

impl HardwareMonitor {
    pub fn new(data_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            preferred_version: RwLock::new(None),
            devices: RwLock::new(Vec::new()),
        }
    }

    pub fn set_preferred_version(&self, version: Option<String>) {
        *self.preferred_version.write().expect("lock poisoned") = version;
    }

    /// Re-runs device detection and replaces the current device list.
    pub async fn redetect(&self) -> Result<(), HardwareError> {
        let preferred_version = self.preferred_version.read().expect("lock poisoned").clone();
        let detector =
            DeviceDetector::new(self.data_dir.clone()).with_preferred_version(preferred_version);
        let detected = detector.detect_physical_devices().await?;
        *self.devices.write().expect("lock poisoned") = detected;
        Ok(())
    }

    /// Seeds the device list directly, bypassing real detection. Used by
    /// mock-hardware mode and by tests.
    pub fn set_devices(&self, devices: Vec<PhysicalDevice>) {
        *self.devices.write().expect("lock poisoned") = devices;
    }

    pub fn devices(&self) -> Vec<PhysicalDevice> {
        self.devices.read().expect("lock poisoned").clone()
    }

    pub fn set_enabled(&self, index: usize, enabled: bool) {
        let mut guard = self.devices.write().expect("lock poisoned");
        if let Some(device) = guard.get_mut(index) {
            device.enabled = enabled;
        }
    }

    pub fn has_enabled_devices(&self) -> bool {
        self.devices
            .read()
            .expect("lock poisoned")
            .iter()
            .any(|d| d.enabled)
    }

    /// Comma-separated hashcat device ids of the enabled devices' selected
    /// runtimes. Empty when every device is enabled ("use everything") or
    /// when none are — callers must check [`Self::has_enabled_devices`]
    /// first to distinguish the two empty cases.
    pub fn device_selection_string(&self) -> String {
        let devices = self.devices.read().expect("lock poisoned");
        let total = devices.len();
        let enabled: Vec<&PhysicalDevice> = devices.iter().filter(|d| d.enabled).collect();

        if enabled.is_empty() || enabled.len() == total {
            return String::new();
        }

        enabled
            .iter()
            .map(|d| d.selected_device_id().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krakenhashes_domain_models::{Backend, DeviceKind, RuntimeOption};

    fn physical(index: usize, device_id: u32, enabled: bool) -> PhysicalDevice {
        PhysicalDevice {
            index,
            name: format!("gpu-{index}"),
            kind: DeviceKind::Gpu,
            enabled,
            runtime_options: vec![RuntimeOption {
                backend: Backend::Cuda,
                device_id,
                name: format!("gpu-{index}"),
            }],
            selected_runtime: Backend::Cuda,
        }
    }

    #[test]
    fn selection_string_empty_when_all_enabled() {
        let monitor = HardwareMonitor::new("/tmp/kh-test");
        monitor.set_devices(vec![physical(0, 1, true), physical(1, 2, true)]);
        assert_eq!(monitor.device_selection_string(), "");
    }

    #[test]
    fn selection_string_empty_when_none_enabled() {
        let monitor = HardwareMonitor::new("/tmp/kh-test");
        monitor.set_devices(vec![physical(0, 1, false), physical(1, 2, false)]);
        assert_eq!(monitor.device_selection_string(), "");
        assert!(!monitor.has_enabled_devices());
    }

    #[test]
    fn selection_string_lists_only_enabled_device_ids() {
        let monitor = HardwareMonitor::new("/tmp/kh-test");
        monitor.set_devices(vec![physical(0, 1, true), physical(1, 2, false), physical(2, 3, true)]);
        assert_eq!(monitor.device_selection_string(), "1,3");
    }

    #[test]
    fn set_enabled_toggles_by_index() {
        let monitor = HardwareMonitor::new("/tmp/kh-test");
        monitor.set_devices(vec![physical(0, 1, true)]);
        monitor.set_enabled(0, false);
        assert!(!monitor.has_enabled_devices());
    }
}
