//! Locates and probes the local cracking binary to enumerate devices.

use std::path::{Path, PathBuf};
use std::time::Duration;

use krakenhashes_domain_models::{Device, PhysicalDevice};
use tracing::{debug, warn};

use crate::errors::HardwareError;
use crate::grouping::group_physical_devices;
use crate::parser::parse_device_report;

const DEVICE_DETECTION_TIMEOUT: Duration = Duration::from_secs(30);
const DEVICE_LISTING_FLAG: &str = "-I";

pub struct DeviceDetector {
    data_dir: PathBuf,
    preferred_version: Option<String>,
}

impl DeviceDetector {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            preferred_version: None,
        }
    }

    pub fn with_preferred_version(mut self, version: Option<String>) -> Self {
        self.preferred_version = version;
        self
    }

    fn binary_file_name() -> &'static str {
        if cfg!(windows) {
            "hashcat.exe"
        } else {
            "hashcat.bin"
        }
    }

    /// Picks the preferred version directory if present, otherwise the
    /// numerically highest version directory under `binaries/`.
    pub fn locate_binary(&self) -> Result<PathBuf, HardwareError> {
        let binaries_root = self.data_dir.join("binaries");
        let version_dir = self.select_version_dir(&binaries_root)?;
        let binary_path = version_dir.join(Self::binary_file_name());
        if !binary_path.exists() {
            return Err(HardwareError::BinaryUnavailable(
                binary_path.display().to_string(),
            ));
        }
        Ok(binary_path)
    }

    fn select_version_dir(&self, binaries_root: &Path) -> Result<PathBuf, HardwareError> {
        let entries = std::fs::read_dir(binaries_root).map_err(|_| {
            HardwareError::BinaryUnavailable(binaries_root.display().to_string())
        })?;

        let mut versions: Vec<(Vec<u64>, PathBuf)> = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(preferred) = &self.preferred_version {
                if &name == preferred {
                    return Ok(entry.path());
                }
            }
            versions.push((version_sort_key(&name), entry.path()));
        }

        versions.sort_by(|a, b| a.0.cmp(&b.0));
        versions
            .pop()
            .map(|(_, path)| path)
            .ok_or_else(|| HardwareError::BinaryUnavailable(binaries_root.display().to_string()))
    }

    /// Invokes the binary's device-listing flag and parses its report.
    ///
    /// A non-zero exit is treated as a warning, not a failure, as long as
    /// at least one device was parsed from the output.
    pub async fn enumerate_devices(&self) -> Result<Vec<Device>, HardwareError> {
        let binary_path = self.locate_binary()?;
        let working_dir = binary_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.data_dir.clone());

        let mut command = tokio::process::Command::new(&binary_path);
        command
            .arg(DEVICE_LISTING_FLAG)
            .current_dir(&working_dir)
            .kill_on_drop(true);

        let output = tokio::time::timeout(DEVICE_DETECTION_TIMEOUT, command.output())
            .await
            .map_err(|_| HardwareError::DetectionTimedOut(DEVICE_DETECTION_TIMEOUT))??;

        let report = String::from_utf8_lossy(&output.stdout);
        let devices = parse_device_report(&report);

        if devices.is_empty() {
            return Err(HardwareError::NoDevicesFound);
        }

        if !output.status.success() {
            warn!(
                exit_code = output.status.code(),
                "device listing exited non-zero but {} device(s) were parsed",
                devices.len()
            );
        } else {
            debug!("parsed {} device(s) from device report", devices.len());
        }

        Ok(devices)
    }

    pub async fn detect_physical_devices(&self) -> Result<Vec<PhysicalDevice>, HardwareError> {
        let devices = self.enumerate_devices().await?;
        Ok(group_physical_devices(&devices))
    }
}

/// Sorts version directory names numerically where possible (`6.2.6` >
/// `6.2.5`), falling back to lexical ordering for non-numeric segments.
fn version_sort_key(name: &str) -> Vec<u64> {
    name.split(|c: char| !c.is_ascii_digit())
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.parse::<u64>().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_sort_key_orders_numerically_not_lexically() {
        assert!(version_sort_key("6.2.6") > version_sort_key("6.2.5"));
        assert!(version_sort_key("6.10.0") > version_sort_key("6.9.0"));
    }

    #[tokio::test]
    async fn locate_binary_fails_with_no_version_directories() {
        let temp = tempfile::tempdir().unwrap();
        let detector = DeviceDetector::new(temp.path());
        let err = detector.locate_binary().unwrap_err();
        assert!(matches!(err, HardwareError::BinaryUnavailable(_)));
    }

    #[tokio::test]
    async fn locate_binary_picks_highest_version_when_no_preference() {
        let temp = tempfile::tempdir().unwrap();
        let binaries = temp.path().join("binaries");
        for version in ["6.2.5", "6.2.6", "6.1.0"] {
            let dir = binaries.join(version);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(DeviceDetector::binary_file_name()), b"#!/bin/sh\n").unwrap();
        }

        let detector = DeviceDetector::new(temp.path());
        let located = detector.locate_binary().unwrap();
        assert!(located.starts_with(binaries.join("6.2.6")));
    }

    #[tokio::test]
    async fn locate_binary_honours_preferred_version_when_present() {
        let temp = tempfile::tempdir().unwrap();
        let binaries = temp.path().join("binaries");
        for version in ["6.2.5", "6.2.6"] {
            let dir = binaries.join(version);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(DeviceDetector::binary_file_name()), b"#!/bin/sh\n").unwrap();
        }

        let detector = DeviceDetector::new(temp.path())
            .with_preferred_version(Some("6.2.5".to_string()));
        let located = detector.locate_binary().unwrap();
        assert!(located.starts_with(binaries.join("6.2.5")));
    }
}
