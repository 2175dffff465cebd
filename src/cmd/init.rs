use std::path::Path;

use anyhow::{Context, Result};

use platmark::WatermarkConfig;

pub fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let config = WatermarkConfig::default();
    config
        .save(path)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;

    eprintln!(
        "💾 Wrote defaults for {} platforms to {}",
        config.platforms.len(),
        path.display()
    );
    Ok(())
}
