//! Line input pump
//!
//! Turns newline-delimited records into [`Message`]s on the relay's input
//! queue. Blank lines are skipped.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::message::Message;

/// Read lines until EOF and queue each one for `topic`.
///
/// Returns the number of records queued. Stops early if the queue's
/// receiver is gone.
pub async fn pump_lines<R>(reader: R, topic: &str, queue: mpsc::Sender<Message>) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut queued = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if queue.send(Message::new(topic, line.into_bytes())).await.is_err() {
            warn!("Input queue closed, dropping remaining input");
            break;
        }
        queued += 1;
    }

    debug!(queued, "Input exhausted");
    Ok(queued)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pump_lines_skips_blank_lines() {
        let input: &[u8] = b"first\n\n  \nsecond\nthird";
        let (tx, mut rx) = mpsc::channel(8);

        let queued = pump_lines(input, "logs", tx).await.unwrap();
        assert_eq!(queued, 3);

        let mut payloads = Vec::new();
        while let Some(msg) = rx.recv().await {
            assert_eq!(msg.topic, "logs");
            payloads.push(String::from_utf8(msg.payload.to_vec()).unwrap());
        }
        assert_eq!(payloads, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_pump_lines_stops_when_queue_closed() {
        let input: &[u8] = b"a\nb\n";
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        assert_eq!(pump_lines(input, "logs", tx).await.unwrap(), 0);
    }
}
