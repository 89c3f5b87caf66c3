use super::*;

#[test]
fn test_empty_file_yields_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.server.bind, "0.0.0.0:5000");
    assert_eq!(config.executor.max_concurrent_jobs, 4);
    assert_eq!(config.executor.dependency_policy, DependencyPolicy::BestEffort);
    assert_eq!(config.tools.foldseek_databases.len(), 3);
    assert_eq!(config.tools.blastp_path, PathBuf::from("blastp"));
}

#[test]
fn test_tools_default_matches_serde_defaults() {
    let tools = ToolsConfig::default();
    assert_eq!(tools.poll_interval(), Duration::from_secs(10));
    assert_eq!(tools.max_wait(), Duration::from_secs(300));
    assert!(tools.esmfold_url.starts_with("https://api.esmatlas.com"));
}

#[test]
fn test_partial_override() {
    let config = Config::from_toml(
        r#"
        [executor]
        max_concurrent_jobs = 2
        job_timeout_secs = 60
        dependency_policy = "strict"

        [tools]
        vina_path = "/opt/vina/bin/vina"
        "#,
    )
    .unwrap();
    assert_eq!(config.executor.max_concurrent_jobs, 2);
    assert_eq!(config.executor.job_timeout(), Duration::from_secs(60));
    assert_eq!(config.executor.dependency_policy, DependencyPolicy::Strict);
    assert_eq!(config.tools.vina_path, PathBuf::from("/opt/vina/bin/vina"));
    assert_eq!(config.tools.usalign_path, PathBuf::from("USalign"));
}

#[test]
fn test_unknown_policy_rejected() {
    let err = Config::from_toml("[executor]\ndependency_policy = \"eventually\"\n");
    assert!(matches!(err, Err(ConfigError::Parse(_))));
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("protflow.toml");
    assert!(matches!(Config::from_path(&missing), Err(ConfigError::NotFound(_))));
}

#[test]
fn test_from_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("protflow.toml");
    std::fs::write(&path, "[registry]\njob_ttl_secs = 10\n").unwrap();
    let config = Config::from_path(&path).unwrap();
    assert_eq!(config.registry.job_ttl(), Duration::from_secs(10));
    assert_eq!(config.registry.sweep_interval(), Duration::from_secs(300));
}
