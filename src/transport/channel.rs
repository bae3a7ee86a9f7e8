//! Line-delimited JSON channel between the presentation tier and the host.
//!
//! Each ingress line is one call. Calls run concurrently, bounded by a
//! semaphore, and replies go through a single writer task. Replies carry the
//! caller's `id` and may be written out of order.

use std::sync::Arc;

use log::{debug, error, info};
use serde::Serialize;
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver},
        Semaphore,
    },
    task::JoinSet,
};

use super::{
    adapter::{decode_frame, ChannelCall, IpcCall, IpcRouter},
    envelope::{Envelope, RouteError},
};
use crate::{
    config::{ChannelMode, Transport},
    core::error::{BridgeError, BridgeResult, ErrorContext},
};

/// One egress line
#[derive(Debug, Serialize)]
pub struct Reply {
    pub id: Value,
    #[serde(flatten)]
    pub envelope: Envelope,
}

pub struct ChannelServer {
    router: Arc<IpcRouter>,
    mode: ChannelMode,
    max_in_flight: usize,
}

impl ChannelServer {
    pub fn new(router: Arc<IpcRouter>, mode: ChannelMode, max_in_flight: usize) -> Self {
        Self {
            router,
            mode,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn from_config(router: Arc<IpcRouter>, cfg: &Transport) -> Self {
        Self::new(router, cfg.mode, cfg.max_in_flight)
    }

    /// Serves calls from `reader` until it reaches EOF, then waits for
    /// in-flight calls and flushes their replies. A reader I/O error ends
    /// ingress the same way and is returned after the drain.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> BridgeResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_replies(writer, rx));

        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut calls = JoinSet::new();
        let mut reader = BufReader::new(reader);
        let mut received = 0usize;

        info!(
            "Serving {:?} channel with up to {} calls in flight",
            self.mode, self.max_in_flight
        );

        // Frames are raw bytes; bad encodings are answered, not fatal.
        let ingress = loop {
            let mut frame = Vec::new();
            match reader.read_until(b'\n', &mut frame).await {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(BridgeError::from(e)),
            }
            if frame.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            received += 1;

            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => break Err(BridgeError::Internal(format!("Call semaphore closed: {e}"))),
            };
            let router = self.router.clone();
            let tx = tx.clone();
            let mode = self.mode;

            calls.spawn(async move {
                let reply = handle_frame(&router, mode, &frame).await;
                drop(permit);
                match serde_json::to_string(&reply) {
                    Ok(text) => {
                        if tx.send(text).is_err() {
                            error!("Reply writer is gone, dropping reply for {}", reply.id);
                        }
                    }
                    Err(e) => error!("Failed to encode reply for {}: {}", reply.id, e),
                }
            });

            while let Some(joined) = calls.try_join_next() {
                if let Err(e) = joined {
                    error!("Call task failed: {}", e);
                }
            }
        };

        match &ingress {
            Ok(()) => debug!("Ingress closed after {} calls, draining", received),
            Err(e) => error!("Ingress failed after {} calls, draining: {}", received, e),
        }
        while let Some(joined) = calls.join_next().await {
            if let Err(e) = joined {
                error!("Call task failed: {}", e);
            }
        }

        drop(tx);
        writer_task.await.with_context("Reply writer task failed")??;
        ingress
    }
}

async fn write_replies<W>(mut writer: W, mut rx: UnboundedReceiver<String>) -> BridgeResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Decodes one ingress frame and dispatches it in the configured mode.
pub async fn handle_frame(router: &IpcRouter, mode: ChannelMode, frame: &[u8]) -> Reply {
    let value: Value = match decode_frame(frame) {
        Ok(value) => value,
        Err(err) => {
            return Reply {
                id: Value::Null,
                envelope: err.into(),
            }
        }
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);

    let envelope = match mode {
        ChannelMode::Shared => match serde_json::from_value::<IpcCall>(value) {
            Ok(call) => router.dispatch(call).await,
            Err(e) => transport_error(e),
        },
        ChannelMode::PerRoute => match serde_json::from_value::<ChannelCall>(value) {
            Ok(call) => router.dispatch_channel(call).await,
            Err(e) => transport_error(e),
        },
    };

    Reply { id, envelope }
}

fn transport_error(err: serde_json::Error) -> Envelope {
    debug!("Ingress frame is not a call: {}", err);
    RouteError::from(BridgeError::from(err)).into()
}
