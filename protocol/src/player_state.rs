//! The arena per-player game state payload.
//!
//! The server is neutral on physics and rendering: it reads only `alive`
//! (for elimination/end-game detection) and forwards every other field
//! exactly as received.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default = "default_alive")]
    pub alive: bool,
    /// Every other client-defined field: position, velocity, hp/maxHp,
    /// hasShield, hasSpeed, displayName, color, radius, etc. Kept opaque.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_alive() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_round_trip_untouched() {
        let raw = r#"{"alive":false,"position":{"x":1.5,"y":2.0},"hasShield":true,"displayName":"nyx"}"#;
        let state: PlayerState = serde_json::from_str(raw).unwrap();
        assert!(!state.alive);
        assert_eq!(state.extra.get("hasShield").unwrap(), true);

        let out = serde_json::to_value(&state).unwrap();
        assert_eq!(out["position"]["x"], 1.5);
        assert_eq!(out["displayName"], "nyx");
        assert_eq!(out["alive"], false);
    }

    #[test]
    fn alive_defaults_true_when_absent() {
        let state: PlayerState = serde_json::from_str(r#"{"color":"red"}"#).unwrap();
        assert!(state.alive);
    }
}
