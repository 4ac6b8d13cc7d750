use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn store_path(&self) -> PathBuf {
        self.xdg_data.join("usagebar/preferences.db")
    }

    fn default_icon_path(&self) -> PathBuf {
        self.xdg_state.join("usagebar/icon.png")
    }

    /// Point every remote endpoint at `base`
    fn write_api_config(&self, base: &str) {
        let dir = self.xdg_config.join("usagebar");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        let toml = format!(
            "[api]\nweb_base_url = \"{base}\"\nconsole_base_url = \"{base}/console\"\nstatus_url = \"{base}/api/v2/status.json\"\n"
        );
        fs::write(dir.join("config.toml"), toml).expect("failed to write config");
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let mut command = Command::new(PathBuf::from(assert_cmd::cargo::cargo_bin!("usagebar")));

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute usagebar: {e}"))
}

fn render_args(args: &[&str]) -> String {
    args.iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "usagebar {} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        render_args(args),
        output.status,
        stdout,
        stderr
    );
}

fn run_ok(env: &CliTestEnv, args: &[&str]) -> String {
    let output = run_bin(env, args);
    assert_success(args, &output);
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn config_set_get_and_reset_round_through_the_store() {
    let env = CliTestEnv::new();

    let stdout = run_ok(&env, &["config", "get", "icon_style"]);
    assert_eq!(stdout.trim(), "battery (default)");

    let stdout = run_ok(&env, &["config", "set", "icon_style", "ring"]);
    assert_eq!(stdout.trim(), "icon_style = ring");
    assert!(
        env.store_path().exists(),
        "preference store should exist at {}",
        env.store_path().display()
    );

    // Below the floor is clamped, not rejected
    let stdout = run_ok(&env, &["config", "set", "refresh_interval", "1"]);
    assert_eq!(stdout.trim(), "refresh_interval = 5");

    let stdout = run_ok(&env, &["config", "set", "session_key", "sk-ant-secret"]);
    assert_eq!(stdout.trim(), "session_key = <set>");

    let listing = run_ok(&env, &["config", "list"]);
    assert!(listing.contains("icon_style"), "listing:\n{listing}");
    assert!(listing.contains("ring"));
    assert!(listing.contains("notifications_enabled"));
    assert!(listing.contains("true (default)"));
    assert!(
        !listing.contains("sk-ant-secret"),
        "secrets must never be printed:\n{listing}"
    );

    let refused = run_bin(&env, &["config", "reset"]);
    assert!(!refused.status.success(), "reset without --yes must fail");

    let stdout = run_ok(&env, &["config", "reset", "--yes"]);
    assert!(stdout.contains("Preferences reset."));

    let stdout = run_ok(&env, &["config", "get", "icon_style"]);
    assert_eq!(stdout.trim(), "battery (default)");
    let stdout = run_ok(&env, &["config", "get", "session_key"]);
    assert_eq!(stdout.trim(), "<unset>");
}

#[test]
fn config_list_shows_unrecognized_stored_keys() {
    use usagebar_core::{PreferenceStore, SqliteStore};

    let env = CliTestEnv::new();
    {
        let store = SqliteStore::open(&env.store_path()).expect("failed to open store");
        store
            .set("zz_future_toggle", b"1")
            .expect("failed to write raw key");
    }

    let listing = run_ok(&env, &["config", "list"]);
    let line = listing
        .lines()
        .find(|l| l.starts_with("zz_future_toggle"))
        .unwrap_or_else(|| panic!("unknown key missing from listing:\n{listing}"));
    assert!(line.ends_with("(unrecognized)"), "line: {line}");

    // Listed after every known key
    assert_eq!(listing.lines().last(), Some(line));
}

#[test]
fn config_set_rejects_bad_values() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["config", "set", "icon_style", "hexagon"]);
    assert!(!output.status.success());

    let output = run_bin(&env, &["config", "set", "monochrome_icon", "maybe"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("monochrome_icon"), "stderr:\n{stderr}");

    let output = run_bin(&env, &["config", "set", "usage_snapshot", "{}"]);
    assert!(!output.status.success());

    let output = run_bin(&env, &["config", "set", "refresh_interval", "1e30"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at most 86400"), "stderr:\n{stderr}");
}

#[test]
fn icon_writes_png_to_requested_path() {
    let env = CliTestEnv::new();
    let output_path = env.home.join("out/dot.png");
    let output_arg = output_path.to_string_lossy().into_owned();

    let args = [
        "icon",
        "--percentage",
        "92",
        "--style",
        "dot",
        "--output",
        output_arg.as_str(),
    ];
    let stdout = run_ok(&env, &args);
    assert!(
        stdout.contains("Wrote 12x18 dot icon (92%)"),
        "unexpected stdout:\n{stdout}"
    );

    let bytes = fs::read(&output_path).expect("icon file should exist");
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn icon_uses_stored_style_and_default_path() {
    let env = CliTestEnv::new();

    run_ok(&env, &["config", "set", "icon_style", "percentage_text"]);
    let stdout = run_ok(&env, &["icon", "--percentage", "40"]);
    assert!(stdout.contains("percentage_text icon (40%)"), "stdout:\n{stdout}");
    assert!(env.default_icon_path().exists());
}

#[test]
fn status_without_usage_points_at_setup() {
    let env = CliTestEnv::new();

    let stdout = run_ok(&env, &["status"]);
    assert!(stdout.contains("No usage recorded yet."));
    assert!(stdout.contains("usagebar setup"));

    let json = run_ok(&env, &["status", "--json"]);
    let value: serde_json::Value = serde_json::from_str(&json).expect("status --json output");
    assert!(value["usage"].is_null());
}

#[test]
fn setup_rejects_malformed_key_without_saving() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["setup", "--session-key", "not-a-key"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sk-ant-"), "stderr:\n{stderr}");

    let stdout = run_ok(&env, &["config", "get", "session_key"]);
    assert_eq!(stdout.trim(), "<unset>");
    let stdout = run_ok(&env, &["config", "get", "has_completed_setup"]);
    assert_eq!(stdout.trim(), "false (default)");
}

#[test]
fn legacy_credential_file_marks_setup_complete() {
    let env = CliTestEnv::new();
    fs::write(env.home.join(".claude-session-key"), "sk-ant-legacy\n")
        .expect("failed to write legacy key");

    let stdout = run_ok(&env, &["config", "get", "has_completed_setup"]);
    assert!(stdout.trim().starts_with("true"), "stdout:\n{stdout}");

    let stdout = run_ok(&env, &["config", "get", "has_completed_setup"]);
    assert_eq!(stdout.trim(), "true");
    let stdout = run_ok(&env, &["config", "get", "session_key"]);
    assert_eq!(stdout.trim(), "<set>");
}

#[test]
fn run_refuses_to_start_before_setup() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["run", "--no-notify", "--quiet"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usagebar setup"), "stderr:\n{stderr}");
}

#[tokio::test(flavor = "multi_thread")]
async fn setup_reports_api_failure_after_saving_session_key() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/organizations"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{"uuid": "org-a", "name": "Personal"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/console/api/organizations/org-console/prepaid/credits"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let env = CliTestEnv::new();
    env.write_api_config(&server.uri());

    let output = run_bin(
        &env,
        &[
            "setup",
            "--session-key",
            "sk-ant-cli",
            "--api-session-key",
            "sk-ant-console",
            "--api-organization",
            "org-console",
        ],
    );
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("Connected to Personal"), "stdout:\n{stdout}");
    assert!(stdout.contains("Setup complete."), "stdout:\n{stdout}");
    assert!(
        stderr.contains("session key saved, but API credit tracking was not enabled"),
        "stderr:\n{stderr}"
    );

    let stdout = run_ok(&env, &["config", "get", "has_completed_setup"]);
    assert_eq!(stdout.trim(), "true");
    let stdout = run_ok(&env, &["config", "get", "session_key"]);
    assert_eq!(stdout.trim(), "<set>");
    let stdout = run_ok(&env, &["config", "get", "api_session_key"]);
    assert_eq!(stdout.trim(), "<unset>");
    let stdout = run_ok(&env, &["config", "get", "api_tracking_enabled"]);
    assert_eq!(stdout.trim(), "false (default)");
}
