//! Wires [`battle_core::ResultSink`] into the room actor. A thin `Arc`
//! wrapper so every room task can hold a cheap clone of whatever sink the
//! server was started with.

use std::sync::Arc;

use battle_core::{LoggingResultSink, MatchResult, ResultSink};

#[derive(Clone)]
pub struct ResultSinkHandle(Arc<dyn ResultSink>);

impl ResultSinkHandle {
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        ResultSinkHandle(sink)
    }

    pub fn logging() -> Self {
        ResultSinkHandle(Arc::new(LoggingResultSink))
    }

    pub async fn record(&self, result: MatchResult) {
        self.0.record(result).await;
    }
}
