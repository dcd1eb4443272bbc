//! The PP/IP/SP stat triple shared by characters and NPCs.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Physical Power / Intellectual Power / Spiritual Power. Always sums to 6,
/// each component in `[1, 3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    pp: u8,
    ip: u8,
    sp: u8,
}

const STAT_SUM: u8 = 6;
const STAT_MIN: u8 = 1;
const STAT_MAX: u8 = 3;

impl StatBlock {
    pub fn new(pp: u8, ip: u8, sp: u8) -> Result<Self, DomainError> {
        for (label, value) in [("PP", pp), ("IP", ip), ("SP", sp)] {
            if !(STAT_MIN..=STAT_MAX).contains(&value) {
                return Err(DomainError::validation(format!(
                    "{label} must be between {STAT_MIN} and {STAT_MAX}, got {value}"
                )));
            }
        }
        if pp + ip + sp != STAT_SUM {
            return Err(DomainError::validation(format!(
                "PP + IP + SP must equal {STAT_SUM}, got {}",
                pp + ip + sp
            )));
        }
        Ok(Self { pp, ip, sp })
    }

    pub fn pp(&self) -> u8 {
        self.pp
    }

    pub fn ip(&self) -> u8 {
        self.ip
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    /// Value of the named stat, used by `/pp`, `/ip`, `/sp` and ability
    /// `power_source` lookups.
    pub fn value_of(&self, stat: Stat) -> u8 {
        match stat {
            Stat::Pp => self.pp,
            Stat::Ip => self.ip,
            Stat::Sp => self.sp,
        }
    }

    /// Tuple ordering used for initiative tiebreaks: PP desc, then IP desc,
    /// then SP desc.
    pub fn tiebreak_key(&self) -> (u8, u8, u8) {
        (self.pp, self.ip, self.sp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stat {
    Pp,
    Ip,
    Sp,
}

impl Stat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pp => "PP",
            Self::Ip => "IP",
            Self::Sp => "SP",
        }
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_split() {
        assert!(StatBlock::new(3, 2, 1).is_ok());
        assert!(StatBlock::new(1, 1, 4).is_err());
    }

    #[test]
    fn rejects_out_of_range_component() {
        let err = StatBlock::new(4, 1, 1).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_wrong_sum() {
        let err = StatBlock::new(2, 2, 1).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn tiebreak_key_orders_pp_first() {
        let a = StatBlock::new(3, 2, 1).unwrap();
        let b = StatBlock::new(2, 3, 1).unwrap();
        assert!(a.tiebreak_key() > b.tiebreak_key());
    }
}
