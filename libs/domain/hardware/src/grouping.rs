//! Groups the flat, per-backend device list the cracking binary reports
//! into physical GPUs, and the deprecated flat-alias filter it replaces.

use std::collections::{HashMap, HashSet};

use krakenhashes_domain_models::{Backend, Device, PhysicalDevice, RuntimeOption};

/// Groups a flat device list into physical GPUs.
///
/// Uses alias-based grouping when any device carries an `alias_of`
/// (newer binaries); falls back to positional grouping otherwise.
pub fn group_physical_devices(devices: &[Device]) -> Vec<PhysicalDevice> {
    if devices.iter().any(|d| d.alias_of.is_some()) {
        group_by_alias(devices)
    } else {
        group_positionally(devices)
    }
}

fn group_by_alias(devices: &[Device]) -> Vec<PhysicalDevice> {
    let by_id: HashMap<u32, &Device> = devices.iter().map(|d| (d.id, d)).collect();
    let mut consumed: HashSet<u32> = HashSet::new();
    let mut physical = Vec::new();

    for device in devices {
        if consumed.contains(&device.id) {
            continue;
        }
        consumed.insert(device.id);

        let mut options = vec![runtime_option_of(device)];
        if let Some(alias_id) = device.alias_of {
            if let Some(alias_device) = by_id.get(&alias_id) {
                if !consumed.contains(&alias_id) {
                    consumed.insert(alias_id);
                    options.push(runtime_option_of(alias_device));
                }
            }
        }
        // A device may also be the *target* of someone else's alias
        // pointer without carrying one itself; pull those in too.
        for other in devices {
            if other.alias_of == Some(device.id) && !consumed.contains(&other.id) {
                consumed.insert(other.id);
                options.push(runtime_option_of(other));
            }
        }

        physical.push(build_physical(physical.len(), device, options));
    }

    physical
}

fn group_positionally(devices: &[Device]) -> Vec<PhysicalDevice> {
    let mut by_backend: HashMap<Backend, Vec<&Device>> = HashMap::new();
    for device in devices {
        by_backend.entry(device.backend).or_default().push(device);
    }
    for list in by_backend.values_mut() {
        list.sort_by_key(|d| d.id);
    }

    let reference_backend = match by_backend
        .iter()
        .max_by_key(|(_, list)| list.len())
        .map(|(backend, _)| *backend)
    {
        Some(backend) => backend,
        None => return Vec::new(),
    };

    let reference_count = by_backend[&reference_backend].len();
    let mut physical = Vec::with_capacity(reference_count);

    for i in 0..reference_count {
        let mut options = Vec::new();
        for list in by_backend.values() {
            if let Some(device) = list.get(i) {
                options.push((*device, runtime_option_of(device)));
            }
        }
        // Keep a stable order: reference backend's device first, then
        // others in backend priority order.
        options.sort_by_key(|(d, _)| d.backend.default_selection_priority());
        let representative = options[0].0;
        let runtime_options = options.into_iter().map(|(_, opt)| opt).collect();
        physical.push(build_physical(i, representative, runtime_options));
    }

    physical
}

fn runtime_option_of(device: &Device) -> RuntimeOption {
    RuntimeOption {
        backend: device.backend,
        device_id: device.id,
        name: device.name.clone(),
    }
}

fn build_physical(index: usize, representative: &Device, mut options: Vec<RuntimeOption>) -> PhysicalDevice {
    options.sort_by_key(|opt| opt.backend.default_selection_priority());
    let selected_runtime = options[0].backend;
    PhysicalDevice {
        index,
        name: representative.name.clone(),
        kind: representative.kind,
        enabled: representative.enabled,
        runtime_options: options,
        selected_runtime,
    }
}

/// Deprecated flat-device alias filter, preserved for backwards
/// compatibility. For each mutually-aliased pair, keeps the device whose
/// backend has the highest priority under the legacy ordering
/// `HIP > CUDA > OpenCL`, with ties broken by lower id.
///
/// New code should use [`group_physical_devices`] instead.
pub fn filter_aliases_legacy(devices: &[Device]) -> Vec<Device> {
    let by_id: HashMap<u32, &Device> = devices.iter().map(|d| (d.id, d)).collect();
    let mut dropped: HashSet<u32> = HashSet::new();

    for device in devices {
        let Some(alias_id) = device.alias_of else {
            continue;
        };
        let Some(aliased) = by_id.get(&alias_id) else {
            continue;
        };
        if aliased.alias_of != Some(device.id) {
            // Not a mutual (circular) pair; leave both as-is.
            continue;
        }
        if dropped.contains(&device.id) || dropped.contains(&alias_id) {
            continue;
        }

        let keep_this = match device
            .backend
            .legacy_filter_priority()
            .cmp(&aliased.backend.legacy_filter_priority())
        {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => device.id <= aliased.id,
        };

        if keep_this {
            dropped.insert(alias_id);
        } else {
            dropped.insert(device.id);
        }
    }

    devices
        .iter()
        .filter(|d| !dropped.contains(&d.id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use krakenhashes_domain_models::DeviceKind;

    fn device(id: u32, backend: Backend, alias_of: Option<u32>) -> Device {
        Device {
            id,
            backend,
            name: format!("device-{id}"),
            kind: DeviceKind::Gpu,
            processor_count: 10,
            clock_mhz: 1000,
            memory_total_bytes: 1_000_000,
            memory_free_bytes: 1_000_000,
            pci_address: None,
            enabled: true,
            alias_of,
        }
    }

    #[test]
    fn positional_grouping_with_two_backends_and_no_aliases() {
        // S5: CUDA (1,2), OpenCL (3,4), no aliases.
        let devices = vec![
            device(1, Backend::Cuda, None),
            device(2, Backend::Cuda, None),
            device(3, Backend::OpenCl, None),
            device(4, Backend::OpenCl, None),
        ];

        let physical = group_physical_devices(&devices);
        assert_eq!(physical.len(), 2);
        for gpu in &physical {
            assert_eq!(gpu.runtime_options.len(), 2);
            assert_eq!(gpu.selected_runtime, Backend::Cuda);
        }
    }

    #[test]
    fn alias_grouping_with_mutual_pair_across_backends() {
        // S6: device #1 (Alias: #3) in CUDA, device #3 in OpenCL.
        let devices = vec![
            device(1, Backend::Cuda, Some(3)),
            device(3, Backend::OpenCl, Some(1)),
        ];

        let physical = group_physical_devices(&devices);
        assert_eq!(physical.len(), 1);
        assert_eq!(physical[0].runtime_options.len(), 2);
        assert_eq!(physical[0].selected_runtime, Backend::Cuda);
    }

    #[test]
    fn single_backend_no_aliases_yields_one_physical_device_per_device() {
        let devices = vec![
            device(1, Backend::Cuda, None),
            device(2, Backend::Cuda, None),
            device(3, Backend::Cuda, None),
        ];
        let physical = group_physical_devices(&devices);
        assert_eq!(physical.len(), devices.len());
    }

    #[test]
    fn legacy_filter_keeps_hip_over_cuda_on_mutual_alias() {
        let devices = vec![
            device(1, Backend::Cuda, Some(2)),
            device(2, Backend::Hip, Some(1)),
        ];
        let kept = filter_aliases_legacy(&devices);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].backend, Backend::Hip);
    }

    #[test]
    fn legacy_filter_ties_broken_by_lower_id() {
        let devices = vec![
            device(5, Backend::Cuda, Some(2)),
            device(2, Backend::Cuda, Some(5)),
        ];
        let kept = filter_aliases_legacy(&devices);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
    }

    proptest::proptest! {
        // Grouping a stable device list is deterministic: running it twice
        // on the same input yields the same physical grouping.
        #[test]
        fn grouping_is_stable_across_repeated_runs(
            count in 1usize..8,
            backend_idx in proptest::collection::vec(0usize..3, 1..8),
        ) {
            let backends = [Backend::Cuda, Backend::Hip, Backend::OpenCl];
            let devices: Vec<Device> = (0..count)
                .map(|i| {
                    let backend = backends[backend_idx[i % backend_idx.len()] % backends.len()];
                    device(i as u32 + 1, backend, None)
                })
                .collect();

            let first = group_physical_devices(&devices);
            let second = group_physical_devices(&devices);

            proptest::prop_assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                proptest::prop_assert_eq!(a.selected_runtime, b.selected_runtime);
                proptest::prop_assert_eq!(a.runtime_options.len(), b.runtime_options.len());
            }
        }
    }
}
