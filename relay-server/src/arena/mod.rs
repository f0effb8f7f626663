pub mod actor;
pub mod room;

pub use actor::{spawn, ArenaEvent, ArenaHandle, ArenaTimerKind};
