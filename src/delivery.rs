//! Delivery of queued messages to the client.
//!
//! The loop wakes every flush interval, drains the session's queue and
//! writes one JSON document per line. Each message is serialized on its own
//! so a single oversize delta cannot corrupt the rest of the batch: it is
//! replaced by an exception element at the same path.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::delta::{Delta, Element, ForwardMsg, ForwardMsgQueue};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Serialize one message, enforcing `max_bytes`.
///
/// A delta whose encoding exceeds the limit is replaced by an exception
/// element at the same path describing the overflow. Lifecycle messages are
/// never replaced.
///
/// # Errors
///
/// Returns an error if the message cannot be serialized.
pub fn serialize_with_limit(msg: &ForwardMsg, max_bytes: usize) -> Result<String> {
    let encoded = serde_json::to_string(msg).context("Failed to serialize message")?;
    if encoded.len() <= max_bytes {
        return Ok(encoded);
    }

    let Some(delta) = msg.as_delta() else {
        log::warn!("Lifecycle message of {} bytes exceeds the limit; sending as-is", encoded.len());
        return Ok(encoded);
    };

    let size_mb = encoded.len() as f64 / BYTES_PER_MB;
    let limit_mb = max_bytes as f64 / BYTES_PER_MB;
    log::warn!(
        "Delta at {} is {size_mb:.1} MB, over the {limit_mb:.1} MB limit; replacing it",
        delta.path()
    );

    let message = format!(
        "Data of size {size_mb:.1} MB exceeds the message size limit of {limit_mb:.1} MB. \
         Raise max_message_size_mb in the config, or send less data."
    );
    let placeholder = ForwardMsg::Delta(Delta::NewElement {
        path: delta.path().clone(),
        element: Element::exception("MessageSizeError", &message, &[]),
    });
    serde_json::to_string(&placeholder).context("Failed to serialize size placeholder")
}

/// Encode a batch as newline-delimited JSON.
///
/// Returns the bytes and whether the batch contains `SessionShutdown`.
///
/// # Errors
///
/// Returns an error if any message cannot be serialized.
pub fn encode_batch(messages: &[ForwardMsg], max_bytes: usize) -> Result<(Vec<u8>, bool)> {
    let mut out = Vec::new();
    let mut shutdown = false;
    for msg in messages {
        out.extend_from_slice(serialize_with_limit(msg, max_bytes)?.as_bytes());
        out.push(b'\n');
        shutdown |= matches!(msg, ForwardMsg::SessionShutdown);
    }
    Ok((out, shutdown))
}

/// Flush `queue` to `out` every flush interval until the session shuts down.
///
/// Returns after writing the `SessionShutdown` message.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub async fn run<W>(queue: Arc<ForwardMsgQueue>, config: Arc<Config>, mut out: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let max_bytes = config.max_message_bytes();
    let mut ticker = tokio::time::interval(config.flush_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let messages = queue.flush();
        if messages.is_empty() {
            continue;
        }

        let (bytes, shutdown) = encode_batch(&messages, max_bytes)?;
        out.write_all(&bytes).await.context("Failed to write messages")?;
        out.flush().await.context("Failed to flush output")?;
        log::trace!("Delivered {} message(s)", messages.len());

        if shutdown {
            log::info!("Delivery loop finished");
            return Ok(());
        }
    }
}
