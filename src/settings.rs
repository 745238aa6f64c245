//! User settings persisted as a flat `key=value` text file.
//!
//! The file is read fully at startup and rewritten fully on save
//! (last writer wins, no merge).

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

const PROXY_KEY: &str = "proxy";
const SPINTAX_KEY: &str = "spintax";

/// Process-wide user settings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    /// Proxy endpoint used by real task policies
    pub proxy: Option<String>,
    /// Text-templating directives for message content
    pub spintax: Option<String>,
    /// Keys this crate does not interpret, preserved across save
    pub extra: BTreeMap<String, String>,
}

impl Settings {
    /// Parse settings text
    ///
    /// Each line is split on its first `=` and both sides are trimmed.
    /// Lines without `=` are ignored.
    pub fn parse(text: &str) -> Self {
        let mut settings = Settings::default();
        for line in text.lines() {
            let line = line.trim();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            settings.insert(key, value.trim());
        }
        settings
    }

    /// Render settings in file form, one `key=value` per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(proxy) = &self.proxy {
            out.push_str(&format!("{}={}\n", PROXY_KEY, proxy));
        }
        if let Some(spintax) = &self.spintax {
            out.push_str(&format!("{}={}\n", SPINTAX_KEY, spintax));
        }
        for (key, value) in &self.extra {
            out.push_str(&format!("{}={}\n", key, value));
        }
        out
    }

    /// Load settings from disk; a missing file yields defaults
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                let settings = Self::parse(&text);
                tracing::info!(path = %path.display(), "Settings loaded");
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Settings file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite the whole settings file
    ///
    /// Fails without touching the file if any entry would not read back
    /// as the same `key=value` line.
    pub async fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.render()).await?;
        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            PROXY_KEY => self.proxy.as_deref(),
            SPINTAX_KEY => self.spintax.as_deref(),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    /// Set a value by key
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the key is empty or contains `=`, or if either
    /// side contains a line break.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        check_entry(key, value)?;
        self.insert(key, value);
        Ok(())
    }

    /// Check that every entry survives a save and load unchanged
    pub fn validate(&self) -> Result<()> {
        if let Some(proxy) = &self.proxy {
            check_entry(PROXY_KEY, proxy)?;
        }
        if let Some(spintax) = &self.spintax {
            check_entry(SPINTAX_KEY, spintax)?;
        }
        for (key, value) in &self.extra {
            check_entry(key, value)?;
        }
        Ok(())
    }

    fn insert(&mut self, key: &str, value: &str) {
        match key {
            PROXY_KEY => self.proxy = Some(value.to_string()),
            SPINTAX_KEY => self.spintax = Some(value.to_string()),
            other => {
                self.extra.insert(other.to_string(), value.to_string());
            }
        }
    }
}

fn check_entry(key: &str, value: &str) -> Result<()> {
    let is_break = |c: char| c == '\n' || c == '\r';
    let reason = if key.trim().is_empty() || key.trim() != key {
        "key must be non-empty without surrounding whitespace"
    } else if key.contains('=') {
        "key must not contain '='"
    } else if key.contains(is_break) || value.contains(is_break) {
        "line breaks are not allowed"
    } else if value.trim() != value {
        "value must not have surrounding whitespace"
    } else {
        return Ok(());
    };
    Err(Error::Config {
        message: format!("setting '{}': {}", key.escape_debug(), reason),
        key: Some(key.to_string()),
    })
}
