//! Grid/table layout preference

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Preference key under which the project list layout is stored
pub const VIEW_MODE_KEY: &str = "projetosViewType";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    Table,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Table => "table",
        }
    }

    /// Interpret a stored preference; anything unrecognized means grid
    pub fn from_stored(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "grid" => Some(Self::Grid),
            "table" => Some(Self::Table),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Grid => Self::Table,
            Self::Table => Self::Grid,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ViewMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            Error::InvalidInput(format!("unknown view mode '{}', expected grid or table", s))
        })
    }
}
