//! In-memory devices for exercising connections and drivers without SSH.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use crate::channel::Connection;

/// Prompt a Procurve switch redraws after every command.
pub(crate) const PROCURVE_PROMPT: &str =
    "switch# \x1b[24;1H\x1b[24;9H\x1b[24;1H\x1b[?25h\x1b[24;9H";

/// A stopped connection plus the device end of its byte stream.
pub(crate) fn connection_pair() -> (Connection, DuplexStream) {
    let (local, device) = tokio::io::duplex(64 * 1024);
    let (source, sink) = tokio::io::split(local);
    (Connection::new(sink, source), device)
}

/// Write `chunks` from the device end, sleeping `delay` before each.
///
/// The device end stays open afterwards so the connection never sees EOF.
pub(crate) fn feed(mut device: DuplexStream, chunks: &[&str], delay: Duration) -> JoinHandle<()> {
    let chunks: Vec<String> = chunks.iter().map(|c| c.to_string()).collect();
    tokio::spawn(async move {
        for chunk in chunks {
            tokio::time::sleep(delay).await;
            if device.write_all(chunk.as_bytes()).await.is_err() {
                return;
            }
        }
        std::future::pending::<()>().await;
    })
}

/// Scripted switch: echoes each command line, answers from a reply table,
/// then redraws its prompt.
pub(crate) struct FakeSwitch {
    prompt: String,
    replies: HashMap<String, String>,
}

impl FakeSwitch {
    pub(crate) fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            replies: HashMap::new(),
        }
    }

    pub(crate) fn procurve() -> Self {
        Self::new(PROCURVE_PROMPT)
    }

    /// Answer `command` with `output`. Lines should end in `\r\n`.
    pub(crate) fn reply(mut self, command: &str, output: &str) -> Self {
        self.replies.insert(command.to_string(), output.to_string());
        self
    }

    pub(crate) fn spawn(self, mut device: DuplexStream) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut pending = Vec::new();
            let mut buf = [0u8; 1024];

            loop {
                let n = match device.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                pending.extend_from_slice(&buf[..n]);

                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    let command = String::from_utf8_lossy(&line)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();

                    let mut out = format!("{}\r\n", command);
                    if !command.is_empty() {
                        match self.replies.get(&command) {
                            Some(reply) => out.push_str(reply),
                            None => out.push_str(&format!("Invalid input: {}\r\n", command)),
                        }
                    }
                    out.push_str(&self.prompt);

                    if device.write_all(out.as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
        })
    }
}
