//! Device inventory contracts: the flat device list the cracking binary
//! reports, and the physical-GPU grouping derived from it.

use serde::{Deserialize, Serialize};

/// Compute API through which the cracking binary can address a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    Cuda,
    Hip,
    OpenCl,
}

impl Backend {
    /// Priority used by the new grouping path's default-backend selection:
    /// `CUDA > HIP > OpenCL`.
    pub fn default_selection_priority(self) -> u8 {
        match self {
            Backend::Cuda => 0,
            Backend::Hip => 1,
            Backend::OpenCl => 2,
        }
    }

    /// Priority used by the deprecated flat-alias-filter path, which
    /// orders backends `HIP > CUDA > OpenCL`. Kept distinct from
    /// [`Backend::default_selection_priority`] because the legacy filter
    /// predates the physical-device grouping and must not be unified
    /// with it.
    pub fn legacy_filter_priority(self) -> u8 {
        match self {
            Backend::Hip => 0,
            Backend::Cuda => 1,
            Backend::OpenCl => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    Gpu,
    Cpu,
}

/// One logical device as enumerated by the cracking binary under a single
/// backend. Two devices with mutual `alias_of` ids describe the same
/// physical GPU exposed twice (e.g. once under CUDA, once under OpenCL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: u32,
    pub backend: Backend,
    pub name: String,
    pub kind: DeviceKind,
    pub processor_count: u32,
    pub clock_mhz: u32,
    pub memory_total_bytes: u64,
    pub memory_free_bytes: u64,
    pub pci_address: Option<String>,
    pub enabled: bool,
    pub alias_of: Option<u32>,
}

/// One (backend, device id) pair naming a physical device under a
/// particular backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeOption {
    pub backend: Backend,
    pub device_id: u32,
    pub name: String,
}

/// One physical GPU, possibly exposed under several backends.
///
/// Invariant: `runtime_options` is non-empty and `selected_runtime` equals
/// the backend of exactly one of its entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalDevice {
    pub index: usize,
    pub name: String,
    pub kind: DeviceKind,
    pub enabled: bool,
    pub runtime_options: Vec<RuntimeOption>,
    pub selected_runtime: Backend,
}

impl PhysicalDevice {
    /// The hashcat-side device id for the currently selected backend.
    pub fn selected_device_id(&self) -> u32 {
        self.runtime_options
            .iter()
            .find(|opt| opt.backend == self.selected_runtime)
            .map(|opt| opt.device_id)
            .unwrap_or_else(|| {
                // Invariant violation: fall back to the first option rather
                // than panicking on telemetry paths.
                self.runtime_options[0].device_id
            })
    }
}
