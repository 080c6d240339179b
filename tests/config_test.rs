//! Config and secrets loading from files.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use summarizerrrr::{
    Config, ExecutionContext, FailureClass, ProviderKind, Secrets, SummarizerError,
};

const CONFIG: &str = r#"
[orchestrator]
request_timeout_secs = 45

[fallback]
initial_delay_ms = 0
max_delay_ms = 0

[[providers]]
id = "gemini"
kind = "gemini"

[[providers.models]]
name = "gemini-2.5-pro"
max_output_tokens = 8192

[[providers.models]]
name = "gemini-2.5-flash"
temperature = 0.2

[[providers.classification]]
status = 500
class = "overload"

[[providers]]
id = "local"
kind = "ollama"
base_url = "http://127.0.0.1:11434"
supports_streaming = false

[[providers.models]]
name = "llama3.2"
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[cfg(unix)]
fn chmod(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

#[test]
fn load_explicit_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.toml", CONFIG);

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.orchestrator.request_timeout_secs, 45);
    assert_eq!(config.orchestrator.execution_context, ExecutionContext::Privileged);
    assert_eq!(config.providers.len(), 2);

    let gemini = config.provider("gemini").unwrap();
    assert_eq!(gemini.kind, ProviderKind::Gemini);
    assert_eq!(gemini.models[0].params.max_output_tokens, Some(8192));
    assert_eq!(gemini.models[1].params.temperature, Some(0.2));
    assert_eq!(gemini.classification[0].class, FailureClass::Overload);

    let local = config.provider("local").unwrap();
    assert!(!local.supports_streaming);
    assert_eq!(local.base_url.as_deref(), Some("http://127.0.0.1:11434"));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, SummarizerError::Configuration(ref m) if m.contains("not found")));
}

#[test]
fn malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.toml", "[[providers]]\nid = 3\n");
    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, SummarizerError::Configuration(ref m) if m.contains("parse")));
}

#[cfg(unix)]
#[test]
fn secrets_with_private_permissions_load() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "secrets.toml",
        "[gemini]\napi_keys = [\"first\", \"second\"]\n\n[openrouter]\napi_key = \"single\"\n",
    );
    chmod(&path, 0o600);

    let secrets = Secrets::load_from(&path).unwrap();

    assert_eq!(secrets.api_keys("gemini"), vec!["first", "second"]);
    assert_eq!(secrets.api_keys("openrouter"), vec!["single"]);
}

#[cfg(unix)]
#[test]
fn secrets_readable_by_others_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "secrets.toml", "[gemini]\napi_key = \"k\"\n");
    chmod(&path, 0o644);

    let err = Secrets::load_from(&path).unwrap_err();

    assert!(matches!(err, SummarizerError::Configuration(ref m) if m.contains("insecure permissions")));
}

#[cfg(unix)]
#[tokio::test]
async fn config_builds_an_orchestrator_with_keys_from_secrets() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(Some(&write(&dir, "config.toml", CONFIG))).unwrap();
    let secrets_path = write(&dir, "secrets.toml", "[gemini]\napi_keys = [\"a\", \"b\"]\n");
    chmod(&secrets_path, 0o400);
    let secrets = Secrets::load_from(&secrets_path).unwrap();

    let orchestrator = config.builder(&secrets).build().unwrap();

    let registry = orchestrator.registry();
    assert_eq!(registry.provider_ids(), vec!["gemini", "local"]);
    let gemini = registry.describe("gemini").unwrap();
    assert_eq!(gemini.api_keys.len(), 2);
    assert_eq!(gemini.models.len(), 2);
    let local = registry.describe("local").unwrap();
    assert!(local.api_keys.is_empty());
    assert!(!local.capabilities.supports_streaming);
}
