//! Telemetry sinks
//!
//! The game publishes fire-and-forget messages (status changes, score
//! updates, bumper hits, ball position) on fixed topics. Sinks never feed
//! anything back into the simulation; a failed publish is logged by the
//! caller and otherwise ignored.

use std::io::Write;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{PinballError, Result};

pub const TOPIC_SCORE: &str = "pinball/score";
pub const TOPIC_BUMPER_HIT: &str = "pinball/bumper_hit";
pub const TOPIC_GAME_STATUS: &str = "pinball/game_status";
pub const TOPIC_BALL_POSITION: &str = "pinball/ball_position";

/// Session lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Ready,
    Started,
    BallLaunched,
    BallReset,
    NewHighscore,
    GameOver,
    Stopped,
}

/// Message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Status {
        status: GameStatus,
        value: Option<f64>,
        timestamp: f64,
    },
    Score {
        points: u32,
        total: u64,
        timestamp: f64,
    },
    BumperHit {
        id: String,
        points: u32,
        timestamp: f64,
    },
    Position {
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        timestamp: f64,
    },
    Text(String),
}

impl Payload {
    pub fn status(status: GameStatus, value: Option<f64>) -> Self {
        Payload::Status {
            status,
            value,
            timestamp: unix_timestamp(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Seconds since the Unix epoch (0 if the clock is before it)
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Destination for telemetry messages
pub trait Telemetry {
    fn publish(&mut self, topic: &str, payload: Payload) -> Result<()>;
}

/// Writes every message to the log
#[derive(Debug, Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn publish(&mut self, topic: &str, payload: Payload) -> Result<()> {
        let json = payload.to_json()?;
        if topic == TOPIC_BALL_POSITION {
            log::trace!("{topic} {json}");
        } else {
            log::info!("{topic} {json}");
        }
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn publish(&mut self, _topic: &str, _payload: Payload) -> Result<()> {
        Ok(())
    }
}

/// Keeps every message in memory; can be told to fail every publish
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    pub messages: Vec<(String, Payload)>,
    pub fail: bool,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every publish returns an error
    pub fn failing() -> Self {
        Self {
            messages: Vec::new(),
            fail: true,
        }
    }

    /// Status events in publish order
    pub fn statuses(&self) -> Vec<GameStatus> {
        self.messages
            .iter()
            .filter_map(|(_, payload)| match payload {
                Payload::Status { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    pub fn count_status(&self, wanted: GameStatus) -> usize {
        self.statuses().into_iter().filter(|s| *s == wanted).count()
    }

    pub fn count_topic(&self, topic: &str) -> usize {
        self.messages.iter().filter(|(t, _)| t == topic).count()
    }
}

impl Telemetry for RecordingTelemetry {
    fn publish(&mut self, topic: &str, payload: Payload) -> Result<()> {
        if self.fail {
            return Err(PinballError::Telemetry(format!("refused {topic}")));
        }
        self.messages.push((topic.to_string(), payload));
        Ok(())
    }
}

/// An owned message handed to the background writer
#[derive(Debug, Clone, Serialize)]
struct Envelope {
    topic: String,
    payload: Payload,
}

/// Hands messages to a background thread that writes them as JSON lines
///
/// Publishing never blocks on the writer. Dropping the sink closes the
/// channel; join the returned handle to flush.
pub struct ChannelTelemetry {
    tx: Sender<Envelope>,
}

impl ChannelTelemetry {
    pub fn spawn<W>(mut writer: W) -> (Self, JoinHandle<()>)
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Envelope>();
        let handle = std::thread::spawn(move || {
            for envelope in rx {
                let line = match serde_json::to_string(&envelope) {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("Dropping telemetry for {}: {e}", envelope.topic);
                        continue;
                    }
                };
                if let Err(e) = writeln!(writer, "{line}") {
                    log::warn!("Telemetry writer failed: {e}");
                }
            }
            let _ = writer.flush();
        });
        (Self { tx }, handle)
    }
}

impl Telemetry for ChannelTelemetry {
    fn publish(&mut self, topic: &str, payload: Payload) -> Result<()> {
        self.tx
            .send(Envelope {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| PinballError::Telemetry("writer thread has stopped".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let payload = Payload::Status {
            status: GameStatus::NewHighscore,
            value: Some(70.0),
            timestamp: 1.5,
        };
        let json = payload.to_json().unwrap();
        assert!(json.contains("\"status\":\"NEW_HIGHSCORE\""));
        assert!(json.contains("\"value\":70.0"));
    }

    #[test]
    fn test_recording_and_failing_sinks() {
        let mut sink = RecordingTelemetry::new();
        sink.publish(TOPIC_GAME_STATUS, Payload::status(GameStatus::Ready, None)).unwrap();
        sink.publish(TOPIC_SCORE, Payload::Text("hi".into())).unwrap();
        assert_eq!(sink.statuses(), vec![GameStatus::Ready]);
        assert_eq!(sink.count_topic(TOPIC_SCORE), 1);

        let mut failing = RecordingTelemetry::failing();
        assert!(failing.publish(TOPIC_SCORE, Payload::Text("x".into())).is_err());
        assert!(failing.messages.is_empty());
    }

    #[test]
    fn test_channel_sink_writes_json_lines() {
        let buffer = SharedBuffer::default();
        let (mut sink, handle) = ChannelTelemetry::spawn(buffer.clone());
        sink.publish(TOPIC_GAME_STATUS, Payload::status(GameStatus::Started, None)).unwrap();
        sink.publish(
            TOPIC_BUMPER_HIT,
            Payload::BumperHit {
                id: "top_left".into(),
                points: 10,
                timestamp: 0.0,
            },
        )
        .unwrap();
        drop(sink);
        handle.join().unwrap();

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("pinball/game_status") && lines[0].contains("STARTED"));
        assert!(lines[1].contains("top_left"));
    }
}
