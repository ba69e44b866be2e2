use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, key) in &self.keys {
            if key.provider.is_none() {
                anyhow::bail!("key `{name}` does not name a provider");
            }
            if key.key.is_some() {
                anyhow::bail!("key `{name}` must not reference another key");
            }
            if key.weight == 0 {
                anyhow::bail!("key `{name}` has zero weight");
            }
        }

        if let Some(retry_attempts) = self
            .keys
            .values()
            .filter_map(|k| k.retry.as_ref())
            .map(|r| r.attempts)
            .find(|attempts| *attempts == 0)
        {
            anyhow::bail!("retry attempts must be at least 1, got {retry_attempts}");
        }

        Ok(())
    }
}
