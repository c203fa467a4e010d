//! # JsonLinesSink: newline-delimited JSON writer
//!
//! Writes each dispatched payload as one line to an [`AsyncWrite`].
//! Use it to ship hook output to stdout, a file or a socket.
//!
//! ## Record shape
//! ```text
//! payload {"level":"INFO","message":"up"}   extra {app: "billing"}
//!   → {"level":"INFO","message":"up","app":"billing"}
//!
//! payload `plain text`                       extra {app: "billing"}
//!   → {"message":"plain text","app":"billing"}
//! ```
//! Keys already present in the payload win over `extra`.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::dispatch::sink::Sink;
use crate::error::SinkError;

/// Line-oriented JSON sink.
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Construct a new [`JsonLinesSink`] writing to `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the writer, e.g. to inspect a buffer in tests.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl JsonLinesSink<tokio::io::Stdout> {
    /// Sink writing to the process's standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

/// Builds the stored line: the payload's object (or `{"message": text}`)
/// plus every `extra` key it does not define itself.
fn render(extra: &HashMap<String, String>, payload: &[u8]) -> Result<Vec<u8>, SinkError> {
    let trimmed = payload.trim_ascii_end();
    let mut record = match serde_json::from_slice::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert(
                "message".into(),
                Value::String(String::from_utf8_lossy(trimmed).into_owned()),
            );
            map
        }
    };
    for (k, v) in extra {
        record
            .entry(k.clone())
            .or_insert_with(|| Value::String(v.clone()));
    }

    let mut line = serde_json::to_vec(&Value::Object(record))?;
    line.push(b'\n');
    Ok(line)
}

#[async_trait]
impl<W> Sink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn exec(&self, extra: &HashMap<String, String>, payload: Bytes) -> Result<(), SinkError> {
        let line = render(extra, &payload)?;
        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut out = self.out.lock().await;
        out.flush().await?;
        out.shutdown().await?;
        Ok(())
    }
}
