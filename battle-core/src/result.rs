//! The persisted record of a finished match and the sink that consumes it.
//!
//! Mirrors the teacher's "don't couple the game loop to how results get
//! stored" stance: [`Room`](crate::room::Room) never writes anywhere itself,
//! it just hands a [`MatchResult`] to whatever [`ResultSink`] the relay
//! server wired up.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A finished match, ready to persist or forward to an external service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub player1_id: String,
    pub player2_id: String,
    pub player1_name: String,
    pub player2_name: String,
    pub player1_deck: Vec<String>,
    pub player2_deck: Vec<String>,
    /// `1` or `2`; never `0` — a draw still names the castle-HP-higher side
    /// unless both are zero, in which case the room's `win_reason` is
    /// `"draw"` and this field is a tie-break best-effort value.
    pub winner_player_num: u8,
    pub player1_castle_hp: i32,
    pub player2_castle_hp: i32,
    pub player1_kills: u32,
    pub player2_kills: u32,
    pub battle_duration: u64,
    pub win_reason: String,
}

/// Consumes finished-match results. Implementations decide where they go —
/// a log line, a database row, a webhook.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, result: MatchResult);
}

/// Default sink: logs the result at `info` and drops it. Good enough until
/// a real persistence backend is wired in; storage is explicitly out of
/// scope for this crate.
pub struct LoggingResultSink;

#[async_trait]
impl ResultSink for LoggingResultSink {
    async fn record(&self, result: MatchResult) {
        tracing::info!(
            winner = result.winner_player_num,
            reason = %result.win_reason,
            duration_s = result.battle_duration,
            p1_kills = result.player1_kills,
            p2_kills = result.player2_kills,
            "match finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MatchResult {
        MatchResult {
            player1_id: "ext-a".into(),
            player2_id: "ext-b".into(),
            player1_name: "Alice".into(),
            player2_name: "Bob".into(),
            player1_deck: vec!["footman".into()],
            player2_deck: vec!["archer".into()],
            winner_player_num: 1,
            player1_castle_hp: 1200,
            player2_castle_hp: 0,
            player1_kills: 4,
            player2_kills: 2,
            battle_duration: 87,
            win_reason: "castle_destroyed".into(),
        }
    }

    #[tokio::test]
    async fn logging_sink_accepts_a_result_without_panicking() {
        let sink = LoggingResultSink;
        sink.record(sample()).await;
    }

    #[test]
    fn match_result_round_trips_through_json() {
        let json = serde_json::to_string(&sample()).unwrap();
        let back: MatchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.player1_id, "ext-a");
        assert_eq!(back.winner_player_num, 1);
    }
}
