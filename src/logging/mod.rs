//! Logger setup.
//!
//! Stdout carries the IPC channel, so records go to stderr by default. With
//! `log.path` set they are piped through a channel to a background task that
//! appends to the file.

use std::{
    io::{self, Write},
    path::Path,
};

use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use tokio::{
    fs::{create_dir_all, metadata, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        watch,
    },
    task::JoinHandle,
};

use crate::{
    config,
    core::error::{BridgeResult, ErrorContext},
};

pub struct AsyncWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .send(buf.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Background task appending log records to a file
pub struct LogSink {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LogSink {
    /// Opens `path` for appending and spawns the writer task.
    pub async fn spawn(path: &str) -> BridgeResult<(AsyncWriter, Self)> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && metadata(parent).await.is_err() {
                create_dir_all(parent)
                    .await
                    .with_context("Failed to create log path")?;
            }
        }

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await
            .with_context("Failed to open or create log file")?;

        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        let (shutdown, watch) = watch::channel(false);
        let task = tokio::spawn(write_log_file(BufWriter::new(file), receiver, watch));

        Ok((AsyncWriter { sender }, Self { shutdown, task }))
    }

    /// Stops the writer after draining queued records.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            eprintln!("Log writer task failed: {e}");
        }
    }
}

async fn write_log_file(
    mut file: BufWriter<tokio::fs::File>,
    mut receiver: UnboundedReceiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            },

            data = receiver.recv() => {
                match data {
                    Some(data) => {
                        if let Err(e) = file.write_all(&data).await {
                            eprintln!("Failed to write to log file: {e}");
                        }
                    }
                    None => break,
                }
            }
        }
    }

    while let Ok(data) = receiver.try_recv() {
        if let Err(e) = file.write_all(&data).await {
            eprintln!("Failed to write to log file: {e}");
        }
    }

    if let Err(e) = file.flush().await {
        eprintln!("Failed to flush log file: {e}");
    }
}

pub struct Logger {
    config: config::Log,
}

impl Logger {
    pub fn new(config: config::Log) -> Self {
        Self { config }
    }

    fn level(&self) -> LevelFilter {
        self.config.level.parse().unwrap_or(LevelFilter::Info)
    }

    /// Configured level first, `RUST_LOG` directives on top.
    fn builder(&self) -> Builder {
        let mut builder = Builder::new();
        builder
            .filter_level(self.level())
            .parse_env(Env::default());
        builder
    }

    /// Installs the global logger. Returns the file sink when `log.path` is
    /// set; keep it and call `shutdown` before exit.
    pub async fn init_env_logger(&self) -> BridgeResult<Option<LogSink>> {
        let mut builder = self.builder();

        let sink = match &self.config.path {
            Some(path) => {
                let (writer, sink) = LogSink::spawn(path).await?;
                builder.target(Target::Pipe(Box::new(writer)));
                Some(sink)
            }
            None => {
                builder.target(Target::Stderr);
                None
            }
        };

        builder
            .try_init()
            .with_context("Failed to install logger")?;
        Ok(sink)
    }
}
