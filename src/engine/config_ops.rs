//! User settings: proxy, spintax template and free-form keys.

use crate::error::Result;
use crate::settings::Settings;

use super::TaskEngine;

impl TaskEngine {
    /// Snapshot of the current settings
    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Replace all settings and rewrite the settings file
    ///
    /// The in-memory copy only changes once the file is written.
    pub async fn update_settings(&self, settings: Settings) -> Result<()> {
        let mut current = self.settings.write().await;
        settings.save(self.config.settings_path()).await?;
        *current = settings;
        tracing::info!("Settings updated");
        Ok(())
    }

    /// Set one key and persist the result
    ///
    /// Rejects entries that cannot be stored as one `key=value` line,
    /// leaving the current settings untouched.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut current = self.settings.write().await;
        let mut updated = current.clone();
        updated.set(key, value)?;
        updated.save(self.config.settings_path()).await?;
        *current = updated;
        tracing::debug!(key, "Setting changed");
        Ok(())
    }

    /// Read one key
    pub async fn get_setting(&self, key: &str) -> Option<String> {
        self.settings.read().await.get(key).map(str::to_string)
    }
}
