//! `forager config`: print the effective merged configuration.

use anyhow::{Context, Result};

use crate::domain::models::AgentConfig;

pub fn execute(config: &AgentConfig) -> Result<()> {
    let rendered =
        serde_yaml::to_string(config).context("failed to render configuration as YAML")?;
    println!("{rendered}");
    Ok(())
}
