//! Builds the cracking binary's command-line arguments from an assignment.

use krakenhashes_domain_models::TaskAssignment;

/// Composes argv for one task. `device_selection` is produced by the
/// Hardware Monitor callback; `extra_params` are agent-wide operator
/// overrides appended verbatim at the end.
pub fn build_args(
    assignment: &TaskAssignment,
    device_selection: &str,
    extra_params: &[String],
) -> Vec<String> {
    let mut args = vec![
        "-m".to_string(),
        assignment.hash_type.to_string(),
        "-a".to_string(),
        assignment.attack_mode.to_string(),
        "--status".to_string(),
        "--status-json".to_string(),
        "--status-timer=2".to_string(),
        "--skip".to_string(),
        assignment.keyspace_start.to_string(),
        "--limit".to_string(),
        assignment.keyspace_end.to_string(),
    ];

    if let Some(output_path) = &assignment.output_path {
        args.push("-o".to_string());
        args.push(output_path.clone());
        args.push("--outfile-format=1,3".to_string());
    }

    if !device_selection.is_empty() {
        args.push("-d".to_string());
        args.push(device_selection.to_string());
    }

    if assignment.increment_mode {
        args.push("-i".to_string());
        if let Some(min) = assignment.increment_min {
            args.push("--increment-min".to_string());
            args.push(min.to_string());
        }
        if let Some(max) = assignment.increment_max {
            args.push("--increment-max".to_string());
            args.push(max.to_string());
        }
    }

    args.push(assignment.hashlist_path.clone());

    for wordlist in &assignment.wordlist_paths {
        args.push(wordlist.clone());
    }

    if let Some(mask) = &assignment.mask {
        args.push(mask.clone());
    }

    for rule in &assignment.rule_paths {
        args.push("-r".to_string());
        args.push(rule.clone());
    }

    args.extend(extra_params.iter().cloned());
    args
}

/// Argv for a short benchmark run; does not touch `--skip`/`--limit` since
/// a speed test measures throughput, not keyspace coverage.
pub fn build_speed_test_args(
    assignment: &TaskAssignment,
    device_selection: &str,
    duration_seconds: u64,
) -> Vec<String> {
    let mut args = vec![
        "-m".to_string(),
        assignment.hash_type.to_string(),
        "-a".to_string(),
        assignment.attack_mode.to_string(),
        "-b".to_string(),
        "--benchmark-all".to_string(),
        "--runtime".to_string(),
        duration_seconds.to_string(),
        "--status-json".to_string(),
    ];

    if !device_selection.is_empty() {
        args.push("-d".to_string());
        args.push(device_selection.to_string());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment() -> TaskAssignment {
        TaskAssignment {
            task_id: "t1".into(),
            job_execution_id: "j1".into(),
            hashlist_id: 1,
            hashlist_path: "hashlists/1.hash".into(),
            attack_mode: 0,
            hash_type: 1000,
            wordlist_paths: vec!["wordlists/rockyou.txt".into()],
            rule_paths: vec!["rules/best64.rule".into()],
            mask: None,
            increment_mode: false,
            increment_min: None,
            increment_max: None,
            keyspace_start: 0,
            keyspace_end: 1_000_000,
            chunk_id: Some(0),
            output_path: Some("outfiles/t1.out".into()),
            preferred_binary_version: None,
        }
    }

    #[test]
    fn includes_keyspace_bounds_and_rule() {
        let args = build_args(&assignment(), "1,2", &[]);
        assert!(args.contains(&"--skip".to_string()));
        assert!(args.contains(&"0".to_string()));
        assert!(args.contains(&"1000000".to_string()));
        assert!(args.contains(&"-r".to_string()));
        assert!(args.contains(&"rules/best64.rule".to_string()));
        assert!(args.contains(&"-d".to_string()));
        assert!(args.contains(&"1,2".to_string()));
    }

    #[test]
    fn empty_device_selection_omits_dash_d() {
        let args = build_args(&assignment(), "", &[]);
        assert!(!args.contains(&"-d".to_string()));
    }
}
