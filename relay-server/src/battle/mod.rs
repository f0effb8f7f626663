pub mod actor;
pub mod room;

pub use actor::{spawn, BattleEvent, BattleHandle, BattleTimerKind};
