//! Mock hardware surface for tests: synthesises a physical device list
//! from environment variables instead of probing a real binary. Bypasses
//! [`crate::detector::DeviceDetector`] entirely; it is a test aid, not a
//! product surface.

use krakenhashes_domain_models::{Backend, DeviceKind, PhysicalDevice, RuntimeOption};

const DEFAULT_VENDOR: &str = "NVIDIA";
const DEFAULT_MODEL: &str = "Mock GPU";
const DEFAULT_MEMORY_MB: u64 = 8192;

/// Reads `MOCK_GPU_COUNT`, `MOCK_GPU_VENDOR`, `MOCK_GPU_MODEL`, and
/// `MOCK_GPU_MEMORY_MB` and builds a physical device list. Returns `None`
/// if `MOCK_GPU_COUNT` is unset or not a positive integer, signalling the
/// caller should fall back to real detection.
pub fn mock_devices_from_env() -> Option<Vec<PhysicalDevice>> {
    let count: usize = std::env::var("MOCK_GPU_COUNT").ok()?.parse().ok()?;
    if count == 0 {
        return None;
    }

    let vendor = std::env::var("MOCK_GPU_VENDOR").unwrap_or_else(|_| DEFAULT_VENDOR.to_string());
    let model = std::env::var("MOCK_GPU_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let _memory_mb: u64 = std::env::var("MOCK_GPU_MEMORY_MB")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MEMORY_MB);

    Some(
        (0..count)
            .map(|index| PhysicalDevice {
                index,
                name: format!("{vendor} {model} #{index}"),
                kind: DeviceKind::Gpu,
                enabled: true,
                runtime_options: vec![RuntimeOption {
                    backend: Backend::Cuda,
                    device_id: index as u32 + 1,
                    name: format!("{vendor} {model} #{index}"),
                }],
                selected_runtime: Backend::Cuda,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn absent_count_yields_none() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("MOCK_GPU_COUNT");
        assert!(mock_devices_from_env().is_none());
    }

    #[test]
    fn builds_requested_device_count() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("MOCK_GPU_COUNT", "3");
        std::env::set_var("MOCK_GPU_VENDOR", "AMD");
        std::env::set_var("MOCK_GPU_MODEL", "TestCard");
        let devices = mock_devices_from_env().expect("mock devices");
        assert_eq!(devices.len(), 3);
        assert!(devices[0].name.contains("AMD"));
        assert!(devices[0].name.contains("TestCard"));
        std::env::remove_var("MOCK_GPU_COUNT");
        std::env::remove_var("MOCK_GPU_VENDOR");
        std::env::remove_var("MOCK_GPU_MODEL");
    }
}
