//! Connection role, fixed once at connect time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Player,
    StoryWeaver,
}

impl Role {
    pub fn is_sw(&self) -> bool {
        matches!(self, Self::StoryWeaver)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::StoryWeaver => "SW",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
