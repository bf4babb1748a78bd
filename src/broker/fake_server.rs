//! A scripted RESP server for exercising [`super::RedisBroker`] without a
//! live Redis.
//!
//! It speaks just enough RESP2 for the calls the broker makes: handshake
//! commands get `+OK`, `PING` gets `+PONG`, and `BLPOP`, `PUBLISH`, `RPUSH`
//! and `SUBSCRIBE` answer from the script.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::config::{RedisSettings, Settings};

#[derive(Default)]
struct Script {
    queue: Mutex<VecDeque<Vec<u8>>>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    silent_pops: AtomicBool,
    commands: Mutex<Vec<String>>,
}

pub struct FakeRedis {
    port: u16,
    script: Arc<Script>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let script = Arc::new(Script::default());

        let shared = script.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, shared.clone()));
            }
        });

        Self { port, script }
    }

    pub fn settings(&self) -> RedisSettings {
        RedisSettings {
            host: "127.0.0.1".to_string(),
            port: self.port,
            ..Settings::default().redis
        }
    }

    /// Queues a payload for the next `BLPOP`.
    pub fn enqueue(&self, payload: &[u8]) {
        self.script.queue.lock().unwrap().push_back(payload.to_vec());
    }

    /// Sends `payload` as a channel message right after each subscribe ack.
    pub fn broadcast_on_subscribe(&self, payload: &[u8]) {
        self.script.broadcasts.lock().unwrap().push(payload.to_vec());
    }

    /// Stops answering `BLPOP` altogether, as over a half-open link.
    pub fn go_silent_on_pop(&self) {
        self.script.silent_pops.store(true, Ordering::SeqCst);
    }

    /// Upper-cased command names in arrival order, across all connections.
    pub fn commands(&self) -> Vec<String> {
        self.script.commands.lock().unwrap().clone()
    }
}

async fn serve(stream: TcpStream, script: Arc<Script>) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(args) = read_command(&mut reader).await? {
        let Some(name) = args.first() else { continue };
        let name = String::from_utf8_lossy(name).to_uppercase();
        script.commands.lock().unwrap().push(name.clone());

        let reply = match name.as_str() {
            "PING" => b"+PONG\r\n".to_vec(),
            "PUBLISH" => b":1\r\n".to_vec(),
            "RPUSH" => format!(":{}\r\n", args.len() - 2).into_bytes(),
            "BLPOP" => {
                if script.silent_pops.load(Ordering::SeqCst) {
                    std::future::pending::<()>().await;
                }
                match script.queue.lock().unwrap().pop_front() {
                    Some(payload) => {
                        let mut out = b"*2\r\n".to_vec();
                        out.extend(bulk(&args[1]));
                        out.extend(bulk(&payload));
                        out
                    }
                    None => b"*-1\r\n".to_vec(),
                }
            }
            "SUBSCRIBE" => {
                let channel = &args[1];
                let mut out = b"*3\r\n".to_vec();
                out.extend(bulk(b"subscribe"));
                out.extend(bulk(channel));
                out.extend(b":1\r\n");
                for payload in script.broadcasts.lock().unwrap().iter() {
                    out.extend(b"*3\r\n");
                    out.extend(bulk(b"message"));
                    out.extend(bulk(channel));
                    out.extend(bulk(payload));
                }
                out
            }
            _ => b"+OK\r\n".to_vec(),
        };

        writer.write_all(&reply).await?;
    }

    Ok(())
}

/// Reads one RESP array of bulk strings; `None` once the client hangs up.
async fn read_command<R>(reader: &mut R) -> io::Result<Option<Vec<Vec<u8>>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let count = header(&line, '*')?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await?;
        let len = header(&line, '$')?;

        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(buf);
    }

    Ok(Some(args))
}

fn header(line: &str, prefix: char) -> io::Result<usize> {
    line.trim_end()
        .strip_prefix(prefix)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, line.to_string()))
}

fn bulk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}
