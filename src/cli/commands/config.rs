//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{BoxerError, BoxerResult};
use crate::ui;

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> BoxerResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> BoxerResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> BoxerResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        ui::warn_hint(
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::success(&format!("Configuration initialized at {}", path.display()));

    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> BoxerResult<()> {
    let mut config = config.clone();
    apply_value(&mut config, key, value)?;

    manager.save(&config).await?;
    ui::success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Apply a dot-separated key to the config
fn apply_value(config: &mut Config, key: &str, value: &str) -> BoxerResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(BoxerError::Usage(format!(
                    "Invalid log format: {}. Use text or json",
                    value
                )))
            }
        },
        ["runtime", "program"] => config.runtime.program = value.to_string(),
        ["build", "no_cache"] => config.build.no_cache = parse_bool(value)?,
        ["build", "omit"] => config.build.omit = parse_list(value),
        ["build", "shell"] => config.build.shell = parse_list(value),
        _ => {
            return Err(BoxerError::Usage(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

const VALID_KEYS: [&str; 5] = [
    "general.log_format",
    "runtime.program",
    "build.no_cache",
    "build.omit",
    "build.shell",
];

fn parse_bool(value: &str) -> BoxerResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(BoxerError::Usage(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

/// Comma-separated list, empty items dropped
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
