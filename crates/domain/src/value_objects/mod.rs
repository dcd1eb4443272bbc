pub mod chat_mode;
pub mod dice;
pub mod role;
pub mod stat_block;

pub use chat_mode::ChatMode;
pub use dice::{
    AttackDieResult, AttackOutcome, DiceFormula, DiceNotation, DiceParseError,
    DiceRollResult, MultiDieAttackResult,
};
pub use role::Role;
pub use stat_block::{Stat, StatBlock};
