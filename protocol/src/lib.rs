//! Wire envelopes shared between the relay server and its peers.
//!
//! Everything here is inert serde data: no I/O, no tokio. The arena and
//! battle flavors each get their own inbound/outbound enums because their
//! envelope schemas are independent (see `relay-server`'s acceptor, which
//! demultiplexes on URL path rather than on a framed envelope).

pub mod arena;
pub mod battle;
pub mod clock;
pub mod ids;
pub mod player_state;

pub use ids::{ChallengeId, GameId, PlayerId};
pub use player_state::PlayerState;
