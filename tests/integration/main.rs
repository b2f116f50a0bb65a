//! Integration tests for Boxer

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Runtime program that does not exist, so any runtime call fails loudly
    const MISSING_RUNTIME: &str = "/nonexistent/boxer-test-runtime";

    fn boxer() -> Command {
        let mut cmd = cargo_bin_cmd!("boxer");
        cmd.env_remove("BOXER_CONFIG").env_remove("NO_CACHE");
        cmd
    }

    /// Config file pointing at a runtime that cannot be launched
    fn isolated_config(dir: &Path) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            format!("[runtime]\nprogram = \"{}\"\n", MISSING_RUNTIME),
        )
        .unwrap();
        path
    }

    fn write_plan(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("box.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        boxer()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("cached container image builds"));
    }

    #[test]
    fn version_displays() {
        boxer()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("boxer"));
    }

    #[test]
    fn build_help_lists_flags() {
        boxer()
            .args(["build", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--no-cache"))
            .stdout(predicate::str::contains("--omit"))
            .stdout(predicate::str::contains("--tag"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("custom.toml");

        boxer()
            .args(["--config", config.to_str().unwrap(), "config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("missing.toml");

        boxer()
            .args(["--config", config.to_str().unwrap(), "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[build]"))
            .stdout(predicate::str::contains("podman"));
    }

    #[test]
    fn config_init_then_set() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("boxer").join("config.toml");
        let config_arg = config.to_str().unwrap();

        boxer()
            .args(["--config", config_arg, "config", "init"])
            .assert()
            .success();
        assert!(config.exists());

        boxer()
            .args(["--config", config_arg, "config", "set", "build.omit", "copy"])
            .assert()
            .success();

        let content = std::fs::read_to_string(&config).unwrap();
        assert!(content.contains("copy"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");

        boxer()
            .args(["--config", config.to_str().unwrap(), "config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn invalid_config_fails() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "[build]\nno_cache = \"maybe\"\n").unwrap();

        boxer()
            .args(["--config", config.to_str().unwrap(), "config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn build_missing_plan() {
        let dir = TempDir::new().unwrap();
        let config = isolated_config(dir.path());
        let plan = dir.path().join("nope.toml");

        boxer()
            .args(["--config", config.to_str().unwrap(), "build"])
            .arg(&plan)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Build plan not found"));
    }

    #[test]
    fn build_invalid_plan() {
        let dir = TempDir::new().unwrap();
        let config = isolated_config(dir.path());
        let plan = write_plan(dir.path(), "[[steps]]\nop = \"run\"\nargs = [1]\n");

        boxer()
            .args(["--config", config.to_str().unwrap(), "build"])
            .arg(&plan)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid build plan"));
    }

    #[test]
    fn run_before_from_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let config = isolated_config(dir.path());
        let plan = write_plan(dir.path(), "[[steps]]\nop = \"run\"\nargs = [\"ls\"]\n");

        // The runtime program does not exist, so reaching it would report a
        // launch failure instead
        boxer()
            .args(["--config", config.to_str().unwrap(), "build"])
            .arg(&plan)
            .assert()
            .failure()
            .stderr(predicate::str::contains("'from' must be the first step"))
            .stderr(predicate::str::contains(MISSING_RUNTIME).not());
    }

    #[test]
    fn unknown_step_fails() {
        let dir = TempDir::new().unwrap();
        let config = isolated_config(dir.path());
        let plan = write_plan(dir.path(), "[[steps]]\nop = \"volume\"\nargs = [\"/data\"]\n");

        boxer()
            .args(["--config", config.to_str().unwrap(), "build"])
            .arg(&plan)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Undefined step 'volume'"));
    }

    #[test]
    fn omitted_step_fails_as_undefined() {
        let dir = TempDir::new().unwrap();
        let config = isolated_config(dir.path());
        let plan = write_plan(dir.path(), "[[steps]]\nop = \"from\"\nargs = [\"debian\"]\n");

        boxer()
            .args(["--config", config.to_str().unwrap(), "build", "--omit", "from"])
            .arg(&plan)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Undefined step 'from'"));
    }

    #[test]
    fn empty_plan_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let config = isolated_config(dir.path());
        let plan = write_plan(dir.path(), "steps = []\n");

        boxer()
            .args(["--config", config.to_str().unwrap(), "build"])
            .arg(&plan)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Nothing to build"));
    }

    #[test]
    fn unreachable_runtime_reports_hint() {
        let dir = TempDir::new().unwrap();
        let config = isolated_config(dir.path());
        let plan = write_plan(dir.path(), "[[steps]]\nop = \"from\"\nargs = [\"debian\"]\n");

        boxer()
            .args(["--config", config.to_str().unwrap(), "build"])
            .arg(&plan)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Hint:"));
    }
}
