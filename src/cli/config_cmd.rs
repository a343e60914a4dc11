use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::core::config::AppConfig;
use crate::core::providers::Provider;

fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path)
}

/// Default config with `provider` preselected.
fn starter_config(provider: Option<Provider>) -> AppConfig {
    let mut config = AppConfig::default();
    config.settings.provider = provider.map(|p| p.id().to_string());
    config
}

pub fn init(path: Option<&Path>, provider: Option<&str>, _opts: &OutputOptions) -> Result<()> {
    let path = resolve_path(path);
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    let provider = match provider {
        Some(id) => match Provider::from_id(id) {
            Some(p) => Some(p),
            None => {
                eprintln!("Unknown provider: {}", id);
                std::process::exit(1);
            }
        },
        None => None,
    };

    match starter_config(provider).save_to(&path) {
        Ok(()) => {
            println!("Generated config at {}", path.display());
            match provider {
                Some(p) => println!("  Default provider: {}", p.id()),
                None => println!(
                    "  No default provider. Pass --provider or set settings.provider."
                ),
            }
        }
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check(path: Option<&Path>, _opts: &OutputOptions) -> Result<()> {
    let path = resolve_path(path);
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `costwatch config init` to create one.");
        return Ok(());
    }

    let config = match AppConfig::load_from(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();
    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        match &config.settings.provider {
            Some(p) => println!("  Default provider: {}", p),
            None => println!("  No default provider."),
        }
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Print the effective file configuration (defaults filled in).
pub fn show(path: Option<&Path>, opts: &OutputOptions) -> Result<()> {
    let path = resolve_path(path);
    let config = match AppConfig::load_from(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    match opts.format {
        OutputFormat::Text => {
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
        OutputFormat::Json => println!("{}", opts.to_json(&config)?),
    }
    Ok(())
}
