use std::{path::Path, str::FromStr};

use anyhow::{Result, anyhow};
use common::config::Settings;
use keybinds::Keybinds;
use strum::EnumString;
use tracing::warn;

use crate::app::{AppMessage, AppTab};

#[derive(Debug, EnumString, Clone, Copy, PartialEq, Eq)]
pub enum BindableMessage {
    Refresh,
    SelectAll,
    ClearSelection,
    ScansTab,
    ScannersTab,
    Download,
    Quit,
}

impl From<BindableMessage> for AppMessage {
    fn from(value: BindableMessage) -> Self {
        match value {
            BindableMessage::Quit => AppMessage::Quit,
            BindableMessage::Refresh => AppMessage::Refresh,
            BindableMessage::SelectAll => AppMessage::SelectAll,
            BindableMessage::ClearSelection => AppMessage::ClearSelection,
            BindableMessage::ScansTab => AppMessage::Tab(AppTab::Scans),
            BindableMessage::ScannersTab => AppMessage::Tab(AppTab::Scanners),
            BindableMessage::Download => AppMessage::Batch(common::dispatch::Batch::Download),
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub keyboard: Keybinds<BindableMessage>,
    pub settings: Settings,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_settings(Settings::from_path(path)?)
    }

    fn from_settings(settings: Settings) -> Result<Self> {
        let mut keyboard = Keybinds::new(vec![]);
        for binding in &settings.bindings {
            let action = BindableMessage::from_str(&binding.action)
                .map_err(|_| anyhow!("unknown action {:?} bound to {}", binding.action, binding.keys))?;
            keyboard
                .bind(&binding.keys, action)
                .map_err(|e| anyhow!("invalid key sequence {:?}: {}", binding.keys, e))?;
        }
        Ok(Self { keyboard, settings })
    }
}

impl Default for Config {
    fn default() -> Self {
        let settings = Settings::default();
        Self::from_settings(settings.clone()).unwrap_or_else(|e| {
            warn!("Default key bindings rejected: {}", e);
            Self {
                keyboard: Keybinds::new(vec![]),
                settings,
            }
        })
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_settings(Settings::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_known_actions() {
        let config = Config::from_str("Bind Ctrl+r Refresh\nBind q Quit\n").unwrap();
        assert_eq!(config.settings.bindings.len(), 2);
    }

    #[test]
    fn rejects_unknown_actions() {
        assert!(Config::from_str("Bind x Explode\n").is_err());
    }
}
