//! Integration tests for apkcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Command isolated from the user's config and cache
    fn apkcache(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("apkcache");
        cmd.env("APKCACHE_CONFIG", home.path().join("config.toml"))
            .env("APKCACHE_DIR", home.path().join("cache"))
            .env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("APK repository"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("apkcache"));
    }

    #[test]
    fn offline_index_miss_fails_with_hint() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .args([
                "--offline",
                "--arch",
                "x86_64",
                "index",
                "https://dl-cdn.alpinelinux.org/alpine/edge/main",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Offline mode"))
            .stderr(predicate::str::contains("--offline"));
    }

    #[test]
    fn offline_fetch_miss_fails() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .args([
                "--offline",
                "fetch",
                "-r",
                "https://packages.wolfi.dev/os",
                "busybox=1.36.1-r0",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Offline mode"));
    }

    #[test]
    fn fetch_rejects_malformed_package() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .args(["fetch", "-r", "https://packages.wolfi.dev/os", "busybox"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("NAME=VERSION"));
    }

    #[test]
    fn index_without_repository_fails() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .arg("index")
            .assert()
            .failure()
            .stderr(predicate::str::contains("[repository].urls"));
    }

    #[test]
    fn list_empty_json() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn verify_empty_cache() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .arg("verify")
            .assert()
            .success()
            .stdout(predicate::str::contains("0 ok, 0 corrupt"));
    }

    #[test]
    fn gc_empty_cache() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .args(["gc", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No temporaries"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_reflects_flags() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .args(["--offline", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("offline = true"));
    }

    #[test]
    fn config_init_then_invalid_file_reported() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(home.path().join("config.toml").exists());

        std::fs::write(home.path().join("config.toml"), "[cache\n").unwrap();
        apkcache(&home)
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("config init --force"));
    }

    #[test]
    fn config_init_force_repairs_invalid_file() {
        let home = TempDir::new().unwrap();
        let path = home.path().join("config.toml");
        std::fs::write(&path, "[cache\n").unwrap();

        apkcache(&home)
            .args(["config", "init", "--force"])
            .assert()
            .success();

        let repaired = std::fs::read_to_string(&path).unwrap();
        assert!(repaired.contains("[cache]"));
        apkcache(&home)
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn config_init_without_force_keeps_invalid_file() {
        let home = TempDir::new().unwrap();
        let path = home.path().join("config.toml");
        std::fs::write(&path, "[cache\n").unwrap();

        apkcache(&home)
            .args(["config", "init"])
            .assert()
            .success();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[cache\n");
    }

    #[test]
    fn debug_log_names_config_file() {
        let home = TempDir::new().unwrap();
        apkcache(&home)
            .args(["-vv", "list"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Using config"))
            .stderr(predicate::str::contains("not found, using defaults"));
    }
}
