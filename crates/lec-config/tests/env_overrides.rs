use figment::Jail;
use lec_config::{ConfigError, LecConfig};

#[test]
fn env_beats_project_toml() {
    Jail::expect_with(|jail| {
        jail.create_dir(".lectern")?;
        jail.create_file(
            ".lectern/config.toml",
            r#"
[store]
path = "from-toml.db"
"#,
        )?;
        jail.set_env("LECTERN_STORE__PATH", "from-env.db");

        let config = LecConfig::load().expect("config loads");
        assert_eq!(config.store.path, "from-env.db");
        Ok(())
    });
}

#[test]
fn nested_sync_values_map_from_env() {
    Jail::expect_with(|jail| {
        jail.set_env("LECTERN_SYNC__LOOKUP_CONCURRENCY", "3");
        jail.set_env("LECTERN_SYNC__MAX_CONFLICT_REPASSES", "2");

        let config = LecConfig::load().expect("config loads");
        assert_eq!(config.sync.lookup_concurrency, 3);
        assert_eq!(config.sync.max_conflict_repasses, 2);
        Ok(())
    });
}

#[test]
fn invalid_env_value_fails_validation() {
    Jail::expect_with(|jail| {
        jail.set_env("LECTERN_SYNC__EVENT_BUFFER", "0");

        let err = LecConfig::load().expect_err("zero buffer must be rejected");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        Ok(())
    });
}
