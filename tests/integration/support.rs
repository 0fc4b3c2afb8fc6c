//! Scripted connector for driving the engine without network I/O

use async_trait::async_trait;
use depth_ingest::ws::{ConnectionError, Connector, FeedConnection};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// One step of a scripted session
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Wait(Duration),
    Close,
}

/// Scripted connection; idles forever once its steps run out
pub struct ScriptedConnection {
    steps: VecDeque<Step>,
}

#[async_trait]
impl FeedConnection for ScriptedConnection {
    async fn next_text(&mut self) -> Option<Result<String, ConnectionError>> {
        loop {
            match self.steps.front().cloned() {
                Some(Step::Text(text)) => {
                    self.steps.pop_front();
                    return Some(Ok(text));
                }
                Some(Step::Wait(delay)) => {
                    // popped after the sleep; a read cancelled mid-wait starts the wait over
                    tokio::time::sleep(delay).await;
                    self.steps.pop_front();
                }
                Some(Step::Close) => {
                    self.steps.pop_front();
                    return None;
                }
                None => std::future::pending::<()>().await,
            }
        }
    }

    async fn ping(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn close(&mut self) {}
}

/// Hands out scripted sessions per subscription; unscripted attempts fail
#[derive(Default)]
pub struct ScriptedConnector {
    sessions: Mutex<HashMap<String, VecDeque<Vec<Step>>>>,
    connects: Mutex<HashMap<String, Vec<Instant>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a session for the subscription whose first topic is `topic`
    pub fn script(&self, topic: &str, steps: Vec<Step>) -> &Self {
        self.sessions
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push_back(steps);
        self
    }

    /// Successful connection times for the subscription led by `topic`
    pub fn connects(&self, topic: &str) -> Vec<Instant> {
        self.connects.lock().get(topic).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    async fn connect(&self, topics: &[String]) -> Result<ScriptedConnection, ConnectionError> {
        let key = topics.first().cloned().unwrap_or_default();
        let session = self
            .sessions
            .lock()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());

        match session {
            Some(steps) => {
                self.connects
                    .lock()
                    .entry(key)
                    .or_default()
                    .push(Instant::now());
                Ok(ScriptedConnection {
                    steps: steps.into(),
                })
            }
            None => Err(ConnectionError::ConnectFailed(format!("no session for {key}"))),
        }
    }
}

/// Combined-stream depth message with two bids and one ask
pub fn depth_message(symbol: &str, event_millis: i64) -> Step {
    Step::Text(format!(
        r#"{{"stream":"{}@depth20@100ms","data":{{"e":"depthUpdate","E":{},"s":"{}","b":[["100.5","1.2"],["100.4","3"]],"a":[["100.6","0.7"]]}}}}"#,
        symbol.to_lowercase(),
        event_millis,
        symbol
    ))
}

pub fn malformed() -> Step {
    Step::Text(r#"{"stream":"btcusdt@depth20@100ms","data":"#.to_string())
}
