//! In-process RESP2 server speaking enough Redis for Pub/Sub tests
//!
//! Handles SUBSCRIBE, UNSUBSCRIBE, PUBLISH and PING, answers `+OK` to anything
//! else (connection setup), and records every command it receives.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

type Outbox = mpsc::UnboundedSender<Vec<u8>>;

#[derive(Default)]
struct State {
    commands: Mutex<Vec<Vec<String>>>,
    /// channel -> (connection id, outbox)
    channels: Mutex<HashMap<String, Vec<(u64, Outbox)>>>,
}

pub struct FakeRedis {
    addr: SocketAddr,
    state: Arc<State>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(State::default());

        let accept_state = state.clone();
        tokio::spawn(async move {
            let mut next_id = 0;
            while let Ok((socket, _)) = listener.accept().await {
                next_id += 1;
                tokio::spawn(serve(socket, next_id, accept_state.clone()));
            }
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    /// Arguments of every received command with this name, in arrival order
    pub fn commands(&self, name: &str) -> Vec<Vec<String>> {
        self.state
            .commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c[0].eq_ignore_ascii_case(name))
            .map(|c| c[1..].to_vec())
            .collect()
    }

    /// SUBSCRIBE/UNSUBSCRIBE commands naming `channel`, e.g. `"SUBSCRIBE"`
    pub fn subscription_commands(&self, channel: &str) -> Vec<String> {
        self.state
            .commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                let name = c[0].to_ascii_uppercase();
                (name == "SUBSCRIBE" || name == "UNSUBSCRIBE") && c[1..].iter().any(|a| a == channel)
            })
            .map(|c| c[0].to_ascii_uppercase())
            .collect()
    }

    /// Connections currently subscribed to `channel`
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.state
            .channels
            .lock()
            .unwrap()
            .get(channel)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

async fn serve(socket: TcpStream, id: u64, state: Arc<State>) {
    let (read, mut write) = socket.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    let mut reader = BufReader::new(read);
    let mut subscribed: BTreeSet<String> = BTreeSet::new();

    while let Ok(Some(command)) = read_command(&mut reader).await {
        if command.is_empty() {
            continue;
        }
        state.commands.lock().unwrap().push(command.clone());

        match command[0].to_ascii_uppercase().as_str() {
            "SUBSCRIBE" => {
                for channel in &command[1..] {
                    if subscribed.insert(channel.clone()) {
                        state
                            .channels
                            .lock()
                            .unwrap()
                            .entry(channel.clone())
                            .or_default()
                            .push((id, tx.clone()));
                    }
                    let _ = tx.send(confirmation("subscribe", channel, subscribed.len()));
                }
            }
            "UNSUBSCRIBE" => {
                let channels: Vec<String> = if command.len() > 1 {
                    command[1..].to_vec()
                } else {
                    subscribed.iter().cloned().collect()
                };
                for channel in channels {
                    subscribed.remove(&channel);
                    if let Some(subs) = state.channels.lock().unwrap().get_mut(&channel) {
                        subs.retain(|(conn, _)| *conn != id);
                    }
                    let _ = tx.send(confirmation("unsubscribe", &channel, subscribed.len()));
                }
            }
            "PUBLISH" if command.len() == 3 => {
                let receivers = state
                    .channels
                    .lock()
                    .unwrap()
                    .get(&command[1])
                    .cloned()
                    .unwrap_or_default();
                for (_, outbox) in &receivers {
                    let _ = outbox.send(message(&command[1], &command[2]));
                }
                let _ = tx.send(format!(":{}\r\n", receivers.len()).into_bytes());
            }
            "PING" => {
                let _ = tx.send(b"+PONG\r\n".to_vec());
            }
            _ => {
                let _ = tx.send(b"+OK\r\n".to_vec());
            }
        }
    }

    for subs in state.channels.lock().unwrap().values_mut() {
        subs.retain(|(conn, _)| *conn != id);
    }
}

async fn read_command<R>(reader: &mut R) -> std::io::Result<Option<Vec<String>>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(header) = read_line(reader).await? else {
        return Ok(None);
    };
    let count: usize = header
        .strip_prefix('*')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| invalid(&header))?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let line = read_line(reader).await?.ok_or_else(|| invalid("unexpected EOF"))?;
        let len: usize = line
            .strip_prefix('$')
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| invalid(&line))?;
        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(Some(args))
}

async fn read_line<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end().to_string()))
}

fn invalid(what: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, format!("bad RESP frame: {}", what))
}

fn bulk(s: &str) -> String {
    format!("${}\r\n{}\r\n", s.len(), s)
}

fn confirmation(kind: &str, channel: &str, count: usize) -> Vec<u8> {
    format!("*3\r\n{}{}:{}\r\n", bulk(kind), bulk(channel), count).into_bytes()
}

fn message(channel: &str, payload: &str) -> Vec<u8> {
    format!("*3\r\n{}{}{}", bulk("message"), bulk(channel), bulk(payload)).into_bytes()
}

/// Next payload, or `None` if nothing arrives within `wait`
pub async fn recv(rx: &mut mpsc::UnboundedReceiver<String>, wait: Duration) -> Option<String> {
    tokio::time::timeout(wait, rx.recv()).await.ok().flatten()
}
