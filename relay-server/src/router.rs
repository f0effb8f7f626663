//! Inbound frame parsing.
//!
//! A frame that fails to parse (bad JSON, unknown `type`, missing field) is
//! logged at `warn` and dropped by the caller — never treated as a reason
//! to close the connection.

use protocol::arena::ArenaInbound;
use protocol::battle::BattleInbound;

pub fn parse_arena_inbound(raw: &str) -> Result<ArenaInbound, serde_json::Error> {
    serde_json::from_str(raw)
}

pub fn parse_battle_inbound(raw: &str) -> Result<BattleInbound, serde_json::Error> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_rejected_not_panicked() {
        assert!(parse_arena_inbound("not json").is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(parse_arena_inbound(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        assert!(parse_arena_inbound(r#"{"type":"set_deadline"}"#).is_err());
    }

    #[test]
    fn well_formed_frames_parse() {
        assert!(matches!(
            parse_arena_inbound(r#"{"type":"heartbeat"}"#).unwrap(),
            ArenaInbound::Heartbeat
        ));
        assert!(matches!(
            parse_arena_inbound(r#"{"type":"winner","winnerId":"alice"}"#).unwrap(),
            ArenaInbound::Winner { .. }
        ));
        assert!(matches!(
            parse_battle_inbound(r#"{"type":"submit_move","round":0,"move":"rock"}"#).unwrap(),
            BattleInbound::SubmitMove { .. }
        ));
    }

    #[test]
    fn arena_update_tolerates_unknown_extra_fields_in_payload() {
        let msg = parse_arena_inbound(
            r#"{"type":"update","data":{"alive":true,"x":1,"y":2,"facing":"north"}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ArenaInbound::Update { .. }));
    }
}
