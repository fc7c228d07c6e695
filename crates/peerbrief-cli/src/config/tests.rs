#[cfg(test)]
mod tests {
    use super::super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        collect: CollectArgs,
    }

    fn collect_args(args: &[&str]) -> CollectArgs {
        let mut argv = vec!["peerbrief"];
        argv.extend_from_slice(args);
        Harness::parse_from(argv).collect
    }

    #[test]
    fn test_preset_without_overrides() {
        let config = collect_args(&["--config", "quick_test"]).to_config(false).unwrap();
        assert_eq!(config.num_manuscripts, 5);
        assert_eq!(config.rate_limit_delay_secs, 1.0);
        assert!(config.sources.elife && config.sources.f1000);
        assert!(!config.verbose);
    }

    #[test]
    fn test_flags_override_preset() {
        let config = collect_args(&[
            "--config", "comprehensive",
            "--num-manuscripts", "3",
            "--sources", "f1000",
            "--output-dir", "out",
            "--rate-limit", "0.5",
        ])
        .to_config(true)
        .unwrap();
        assert_eq!(config.num_manuscripts, 3);
        assert!(!config.sources.elife);
        assert!(config.sources.f1000);
        assert_eq!(config.output.output_dir, "out");
        assert_eq!(config.rate_limit_delay_secs, 0.5);
        assert!(config.verbose);
    }

    #[test]
    fn test_config_file_wins_over_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collect.yaml");
        std::fs::write(&path, "num_manuscripts: 9\nsources:\n  elife: false\n").unwrap();

        let path_arg = path.display().to_string();
        let config = collect_args(&["--config", "quick_test", "--config-file", &path_arg])
            .to_config(false)
            .unwrap();
        assert_eq!(config.num_manuscripts, 9);
        assert!(!config.sources.elife);
        assert_eq!(config.rate_limit_delay_secs, 2.0);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        assert!(collect_args(&["--rate-limit=-1"]).to_config(false).is_err());
        assert!(collect_args(&["--config-file", "/nonexistent/collect.yaml"]).to_config(false).is_err());
    }

    #[test]
    fn test_resolve_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_run_dir(dir.path(), None).is_err());

        let older = dir.path().join("run_20240101_000000");
        let newer = dir.path().join("run_20240601_000000");
        std::fs::create_dir(&older).unwrap();
        std::fs::create_dir(&newer).unwrap();

        assert_eq!(resolve_run_dir(dir.path(), None).unwrap(), newer);
        assert_eq!(resolve_run_dir(dir.path(), Some("run_20240101_000000")).unwrap(), older);
        let by_path = older.display().to_string();
        assert_eq!(resolve_run_dir(Path::new("/nonexistent"), Some(&by_path)).unwrap(), older);
        assert!(resolve_run_dir(dir.path(), Some("run_missing")).is_err());
    }
}
