use crate::output::{Output, OutputFormat};
use cloudgrab_config::{Config, PathManager};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::PathBuf;

pub fn run_config(cmd: crate::ConfigCommands, output: &Output) -> Result<()> {
    let config_file = PathManager::default().config_file();
    match cmd {
        crate::ConfigCommands::Show => show_config(&config_file, output),
        crate::ConfigCommands::Init { force } => init_config(&config_file, force, output),
        crate::ConfigCommands::Path => {
            match output.format() {
                OutputFormat::Human => println!("{}", config_file.display()),
                _ => output.json(&json!({ "config_file": config_file.display().to_string() })),
            }
            Ok(())
        }
    }
}

fn show_config(config_file: &PathBuf, output: &Output) -> Result<()> {
    let config = Config::load_or_default(config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;

    if !output.is_human() {
        let value = serde_json::to_value(&config)?;
        output.json(&json!({ "config_file": config_file.display().to_string(), "config": value }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    if !config_file.exists() {
        output.warn(format!(
            "No configuration file at {}, showing defaults. Run 'cloudgrab config init' to create one.",
            config_file.display()
        ));
    }

    println!("\n{}", "Configuration".bright_cyan().bold());
    println!("{}", config_table(&config));
    Ok(())
}

fn config_table(config: &Config) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Setting").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Value").add_attribute(comfy_table::Attribute::Bold),
    ]);
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    let rows = [
        ("Collection URL", config.target.collection_url.clone()),
        ("Expected URL segment", config.target.expected_url_segment.clone()),
        ("Section label", config.target.section_label.clone()),
        ("Action label", config.target.action_label.clone()),
        ("Download directory", config.download.dir.display().to_string()),
        ("Candidates tried", config.download.candidate_match_limit.to_string()),
        ("Debug screenshot", yes_no(config.download.debug_screenshot)),
        ("Session file", config.browser.session_file.display().to_string()),
        ("Browser profile", config.browser.user_data_dir.display().to_string()),
        ("Headless", yes_no(config.browser.headless)),
        (
            "Chrome executable",
            config
                .browser
                .chrome_executable
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "auto-detect".to_string()),
        ),
        ("Navigation timeout", format!("{}s", config.timeouts.navigation_secs)),
        ("Download timeout", format!("{}s", config.timeouts.download_complete_secs)),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    table
}

fn yes_no(flag: bool) -> String {
    if flag {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

fn init_config(config_file: &PathBuf, force: bool, output: &Output) -> Result<()> {
    if !write_default_config(config_file, force)? {
        output.warn(format!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_file.display()
        ));
        return Ok(());
    }
    output.success(format!("Configuration written to {}", config_file.display()));
    Ok(())
}

/// Returns false when an existing file was left untouched
fn write_default_config(config_file: &PathBuf, force: bool) -> Result<bool> {
    if config_file.exists() && !force {
        return Ok(false);
    }
    Config::default()
        .save_to_file(config_file)
        .map_err(|e| eyre!("Failed to write {}: {}", config_file.display(), e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default_config(&path, false).unwrap());

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.target.collection_url, Config::default().target.collection_url);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_init_keeps_existing_file_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# hand edited\n").unwrap();

        assert!(!write_default_config(&path, false).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hand edited\n");

        assert!(write_default_config(&path, true).unwrap());
        assert!(Config::load_from_file(&path).is_ok());
    }
}
