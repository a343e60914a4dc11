use anyhow::Result;
use std::io::Write;
use std::path::Path;
use tracing::warn;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::config::{AppConfig, CheckOverrides};
use crate::core::pipeline::{self, InvocationResult};

/// Arguments of the `check` subcommand.
#[derive(Debug, Clone, Default)]
pub struct CheckArgs {
    pub provider: Option<String>,
    pub threshold: Option<String>,
    pub dry_run: bool,
}

/// Load the config file at `path` (or the default location). An unreadable
/// or malformed file is reported and defaults are used.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    AppConfig::load_from(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Ignoring config file");
        AppConfig::default()
    })
}

/// Run one check for the selected provider.
pub async fn execute(args: CheckArgs, config_path: Option<&Path>) -> InvocationResult {
    let config = load_config(config_path);
    let overrides = CheckOverrides {
        threshold: args.threshold,
        dry_run: args.dry_run,
    };
    pipeline::check_selected(&config, args.provider.as_deref(), overrides).await
}

/// Print `result`. In JSON mode `out` receives the JSON document and nothing
/// else.
pub fn print_result(
    out: &mut impl Write,
    err: &mut impl Write,
    result: &InvocationResult,
    opts: &OutputOptions,
) -> Result<()> {
    match opts.format {
        OutputFormat::Text => {
            let text = renderer::render_result(result, opts.use_color);
            if result.success {
                writeln!(out, "{}", text)?;
            } else {
                writeln!(err, "{}", text)?;
            }
        }
        OutputFormat::Json => {
            writeln!(out, "{}", opts.to_json(result)?)?;
        }
    }
    Ok(())
}

/// Run one check and print its outcome. Returns the process exit code.
pub async fn run(args: CheckArgs, config_path: Option<&Path>, opts: &OutputOptions) -> Result<i32> {
    let result = execute(args, config_path).await;
    print_result(
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
        &result,
        opts,
    )?;
    Ok(result.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DO_VARS: &[&str] = &[
        "SLACK_WEBHOOK_URL",
        "COSTWATCH_SECRET_PROJECT",
        "COSTWATCH_PROVIDER",
        "DO_API_TOKEN",
        "DO_API_ENDPOINT",
        "DO_COST_THRESHOLD",
        "DO_ACCOUNT_NAME",
    ];

    fn json_opts() -> OutputOptions {
        OutputOptions {
            format: OutputFormat::Json,
            pretty: true,
            use_color: false,
            verbose: false,
        }
    }

    async fn mount_list(server: &MockServer, resource: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v2/{}", resource)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    #[serial]
    async fn dry_run_json_keeps_stdout_parseable() {
        let api = MockServer::start().await;
        mount_list(
            &api,
            "droplets",
            serde_json::json!({
                "droplets": [
                    { "id": 1, "name": "web-1", "size_slug": "s-1vcpu-1gb", "region": { "slug": "sgp1" } }
                ]
            }),
        )
        .await;
        mount_list(&api, "databases", serde_json::json!({ "databases": [] })).await;
        mount_list(&api, "volumes", serde_json::json!({ "volumes": [] })).await;

        for var in DO_VARS {
            std::env::remove_var(var);
        }
        std::env::set_var("DO_API_TOKEN", "dop_v1_test");
        std::env::set_var("DO_API_ENDPOINT", format!("{}/v2", api.uri()));

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "[settings]\nrate_limit_delay_ms = 0\n").unwrap();

        let args = CheckArgs {
            provider: Some("digitalocean".into()),
            threshold: None,
            dry_run: true,
        };
        let result = execute(args, Some(&config_path)).await;
        for var in DO_VARS {
            std::env::remove_var(var);
        }

        let mut out = Vec::new();
        let mut err = Vec::new();
        print_result(&mut out, &mut err, &result, &json_opts()).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["provider"], "digitalocean");
        assert!(err.is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn dry_run_failure_json_keeps_stdout_parseable() {
        for var in DO_VARS {
            std::env::remove_var(var);
        }
        let dir = tempfile::tempdir().unwrap();
        let args = CheckArgs {
            provider: Some("digitalocean".into()),
            threshold: None,
            dry_run: true,
        };
        let result = execute(args, Some(&dir.path().join("absent.toml"))).await;

        let mut out = Vec::new();
        let mut err = Vec::new();
        print_result(&mut out, &mut err, &result, &json_opts()).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["success"], false);
        assert!(parsed["error"].as_str().unwrap().contains("DO_API_TOKEN"));
    }

    #[test]
    fn text_failure_goes_to_err_stream() {
        let failure = crate::core::error::CheckError::configuration("No provider selected");
        let result = InvocationResult::failed(None, None, &failure);
        let opts = OutputOptions {
            format: OutputFormat::Text,
            ..json_opts()
        };
        let mut out = Vec::new();
        let mut err = Vec::new();
        print_result(&mut out, &mut err, &result, &opts).unwrap();
        assert!(out.is_empty());
        assert!(String::from_utf8(err).unwrap().contains("Failed"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml")));
        assert!(config.settings.provider.is_none());
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let config = load_config(Some(&path));
        assert_eq!(config.settings.request_timeout_secs, 10);
    }

    #[test]
    fn explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[settings]\nprovider = \"aws\"\n").unwrap();
        let config = load_config(Some(&path));
        assert_eq!(config.settings.provider.as_deref(), Some("aws"));
    }
}
