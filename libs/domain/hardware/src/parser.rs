//! Parses the textual device report printed by the cracking binary's
//! device-listing flag into a flat [`Device`] list.

use krakenhashes_domain_models::{Backend, Device, DeviceKind};

#[derive(Default)]
struct PendingDevice {
    id: Option<u32>,
    alias_of: Option<u32>,
    name: Option<String>,
    kind: Option<DeviceKind>,
    processor_count: u32,
    clock_mhz: u32,
    memory_total_bytes: u64,
    memory_free_bytes: u64,
    pci_address: Option<String>,
}

impl PendingDevice {
    fn finish(self, backend: Backend) -> Option<Device> {
        let id = self.id?;
        Some(Device {
            id,
            backend,
            name: self.name.unwrap_or_else(|| "unknown device".to_string()),
            kind: self.kind.unwrap_or(DeviceKind::Gpu),
            processor_count: self.processor_count,
            clock_mhz: self.clock_mhz,
            memory_total_bytes: self.memory_total_bytes,
            memory_free_bytes: self.memory_free_bytes,
            pci_address: self.pci_address,
            enabled: true,
            alias_of: self.alias_of,
        })
    }
}

/// Parses a full device-report text blob into a flat device list, spanning
/// any number of backend sections.
pub fn parse_device_report(report: &str) -> Vec<Device> {
    let mut devices = Vec::new();
    let mut current_backend: Option<Backend> = None;
    let mut pending: Option<PendingDevice> = None;
    // True while scanning the platform-header fields that precede the
    // first real device marker in an OpenCL platform block; those fields
    // describe the platform, not a device, and must be skipped.
    let mut in_platform_header = false;

    for raw_line in report.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(backend) = detect_backend_header(line) {
            flush(&mut pending, current_backend, &mut devices);
            current_backend = Some(backend);
            in_platform_header = false;
            continue;
        }

        if is_platform_header(line) {
            flush(&mut pending, current_backend, &mut devices);
            in_platform_header = true;
            continue;
        }

        if let Some((id, alias)) = parse_device_marker(line) {
            flush(&mut pending, current_backend, &mut devices);
            in_platform_header = false;
            pending = Some(PendingDevice {
                id: Some(id),
                alias_of: alias,
                ..Default::default()
            });
            continue;
        }

        if in_platform_header {
            // Platform-identity fields (Vendor, Name, Version) belong to
            // the platform header, not a device; ignored until a device
            // marker is seen.
            continue;
        }

        if let Some(dev) = pending.as_mut() {
            apply_field(dev, line);
        }
    }

    flush(&mut pending, current_backend, &mut devices);
    devices
}

fn flush(pending: &mut Option<PendingDevice>, backend: Option<Backend>, out: &mut Vec<Device>) {
    if let (Some(dev), Some(backend)) = (pending.take(), backend) {
        if let Some(device) = dev.finish(backend) {
            out.push(device);
        }
    }
}

fn detect_backend_header(line: &str) -> Option<Backend> {
    let upper = line.to_ascii_uppercase();
    if upper.starts_with("CUDA") && (upper.contains("INFO") || upper.ends_with("CUDA")) {
        return Some(Backend::Cuda);
    }
    if upper.starts_with("HIP") && upper.contains("INFO") {
        return Some(Backend::Hip);
    }
    if upper.starts_with("OPENCL") && upper.contains("INFO") {
        return Some(Backend::OpenCl);
    }
    None
}

fn is_platform_header(line: &str) -> bool {
    line.to_ascii_uppercase().contains("PLATFORM ID")
}

/// Matches `Backend Device ID #N` with an optional `(Alias: #M)` suffix.
fn parse_device_marker(line: &str) -> Option<(u32, Option<u32>)> {
    let rest = line.strip_prefix("Backend Device ID #")?;
    let (id_part, alias_part) = match rest.split_once('(') {
        Some((id, alias)) => (id.trim(), Some(alias)),
        None => (rest.trim(), None),
    };
    let id: u32 = id_part.parse().ok()?;

    let alias = alias_part.and_then(|alias_text| {
        let alias_text = alias_text.trim_end_matches(')').trim();
        let digits = alias_text.strip_prefix("Alias: #")?;
        digits.trim().parse::<u32>().ok()
    });

    Some((id, alias))
}

/// Splits a `Key...: value` or `Key: value` line and applies it to the
/// pending device, tolerating hashcat's dotted-leader field formatting.
fn apply_field(dev: &mut PendingDevice, line: &str) {
    let Some((key, value)) = line.split_once(':') else {
        return;
    };
    let key = key.trim().trim_end_matches('.').trim();
    let value = value.trim();

    match key {
        "Name" => dev.name = Some(value.to_string()),
        "Type" => {
            dev.kind = Some(if value.eq_ignore_ascii_case("CPU") {
                DeviceKind::Cpu
            } else {
                DeviceKind::Gpu
            })
        }
        "Processor(s)" => dev.processor_count = parse_leading_number(value).unwrap_or(0),
        "Clock" => dev.clock_mhz = parse_leading_number(value).unwrap_or(0),
        "Memory.Total" => dev.memory_total_bytes = parse_megabytes(value),
        "Memory.Free" => dev.memory_free_bytes = parse_megabytes(value),
        "PCI.Addr.BDF(e)" | "PCI.Addr.BDF" => dev.pci_address = Some(value.to_string()),
        _ => {}
    }
}

fn parse_leading_number(value: &str) -> Option<u32> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn parse_megabytes(value: &str) -> u64 {
    parse_leading_number(value).unwrap_or(0) as u64 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUDA_POSITIONAL: &str = "\
CUDA Info:
==========

Backend Device ID #1
  Name...........: NVIDIA GeForce RTX 3080
  Type...........: GPU
  Processor(s)...: 68
  Clock..........: 1710
  Memory.Total...: 10240 MB
  Memory.Free....: 10176 MB
  PCI.Addr.BDF...: 0000:01:00.0

Backend Device ID #2
  Name...........: NVIDIA GeForce RTX 3070
  Type...........: GPU
  Processor(s)...: 46
  Clock..........: 1725
  Memory.Total...: 8192 MB
  Memory.Free....: 8100 MB
  PCI.Addr.BDF...: 0000:02:00.0
";

    const OPENCL_WITH_ALIAS: &str = "\
OpenCL Info:
==============

OpenCL Platform ID #1
  Vendor  : NVIDIA Corporation
  Name    : NVIDIA CUDA
  Version : OpenCL 3.0 CUDA 12.2.140

  Backend Device ID #3 (Alias: #1)
    Type           : GPU
    Name           : NVIDIA GeForce RTX 3080
    Processor(s)   : 68
    Clock          : 1710
    Memory.Total   : 10240 MB
    Memory.Free    : 10176 MB
    PCI.Addr.BDF(e): 0000:01:00.0
";

    #[test]
    fn parses_two_positional_cuda_devices() {
        let devices = parse_device_report(CUDA_POSITIONAL);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, 1);
        assert_eq!(devices[0].backend, Backend::Cuda);
        assert_eq!(devices[0].processor_count, 68);
        assert_eq!(devices[0].memory_total_bytes, 10240 * 1024 * 1024);
        assert_eq!(devices[1].id, 2);
        assert_eq!(devices[1].alias_of, None);
    }

    #[test]
    fn platform_header_fields_are_not_mistaken_for_a_device() {
        let devices = parse_device_report(OPENCL_WITH_ALIAS);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "NVIDIA GeForce RTX 3080");
        assert_ne!(devices[0].name, "NVIDIA CUDA");
    }

    #[test]
    fn alias_is_parsed_from_device_marker() {
        let devices = parse_device_report(OPENCL_WITH_ALIAS);
        assert_eq!(devices[0].id, 3);
        assert_eq!(devices[0].alias_of, Some(1));
        assert_eq!(devices[0].backend, Backend::OpenCl);
    }

    #[test]
    fn empty_report_yields_no_devices() {
        assert!(parse_device_report("").is_empty());
    }
}
