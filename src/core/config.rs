//! `bakery.toml`: conversion defaults, run mode and journal settings.
//!
//! Every field has a default, so an absent file and an empty file are the
//! same configuration. Command-line flags override loaded values.

use super::coercion::{ConversionOptions, TextEncoding};
use super::types::RunMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "bakery.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BakeryConfig {
    pub text_encoding: TextEncoding,
    pub json_indent: usize,
    pub mode: RunMode,
    pub journal: JournalConfig,
}

impl Default for BakeryConfig {
    fn default() -> Self {
        let conversion = ConversionOptions::default();
        Self {
            text_encoding: conversion.text_encoding,
            json_indent: conversion.json_indent,
            mode: RunMode::Batch,
            journal: JournalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from(".bakery"),
        }
    }
}

impl BakeryConfig {
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("TOML parse error: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    /// Load `bakery.toml` from `dir` if present, else the defaults.
    pub fn discover(dir: &Path) -> Result<Self, String> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            log::debug!("loading config from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("TOML serialize error: {}", e))
    }

    pub fn conversion(&self) -> ConversionOptions {
        ConversionOptions {
            text_encoding: self.text_encoding,
            json_indent: self.json_indent,
        }
    }
}
