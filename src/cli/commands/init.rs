use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Select};

use crate::config::{load_config, save_config};
use crate::warehouse::session::{connections_file_path, list_profiles};

/// Interactively pick the default connection profile
pub async fn run() -> Result<()> {
    let mut config = load_config()?;

    let path = connections_file_path(&config)?;
    let profiles = list_profiles(&config)
        .with_context(|| format!("Failed to read connection profiles from {}", path.display()))?;

    if profiles.is_empty() {
        anyhow::bail!("No connection profiles found in {}", path.display());
    }

    let current = profiles
        .iter()
        .position(|p| p == &config.connection.profile)
        .unwrap_or(0);

    let chosen = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Default connection profile")
        .items(&profiles)
        .default(current)
        .interact()?;

    config.connection.profile = profiles[chosen].clone();
    save_config(&config)?;
    println!(
        "[tokenlens] Default profile set to '{}'",
        config.connection.profile
    );

    Ok(())
}
