//! In-character / out-of-character routing tag on chat messages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatMode {
    Ic,
    Ooc,
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ic => write!(f, "IC"),
            Self::Ooc => write!(f, "OOC"),
        }
    }
}
