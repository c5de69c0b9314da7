// ABOUTME: MM4 listener and outbound peer client: SMTP-derived MMS transfer
// ABOUTME: Inbound submissions become MsgQueueItems; outbound replays envelopes to peer MMSCs

use crate::message::{MmsEnvelope, MsgQueueItem};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outbound forwarding has to finish inside one broker redelivery cycle.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum Mm4Error {
    #[error("no MM4 peer configured for client {0}")]
    NoPeer(String),

    #[error("MM4 peer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MM4 peer answered {0}")]
    Peer(String),

    #[error("MM4 forward timed out")]
    Timeout,
}

/// Accepts inbound MM4 submissions (spec Section 4.4).
///
/// The dialogue is the SMTP subset MMSCs actually speak: HELO/EHLO, MAIL
/// FROM, RCPT TO, DATA terminated by a lone dot, RSET, NOOP, QUIT.
/// Addresses arrive as `+number/TYPE=PLMN@host`; only the number part is
/// routed on. The DATA section is captured as an opaque envelope.
pub struct Mm4Listener {
    listener: TcpListener,
    local_host: String,
    ingress: mpsc::Sender<MsgQueueItem>,
}

impl Mm4Listener {
    pub async fn bind(
        addr: &str,
        local_host: impl Into<String>,
        ingress: mpsc::Sender<MsgQueueItem>,
    ) -> crate::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Mm4Listener {
            listener,
            local_host: local_host.into(),
            ingress,
        })
    }

    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> crate::Result<()> {
        info!(addr = %self.listener.local_addr()?, "MM4 listener started");
        let local_host = Arc::new(self.local_host);
        loop {
            let (socket, peer) = self.listener.accept().await?;
            let ingress = self.ingress.clone();
            let local_host = local_host.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(socket, &local_host, ingress).await {
                    debug!(%peer, %err, "MM4 connection ended with error");
                }
            });
        }
    }
}

async fn handle_connection(
    socket: TcpStream,
    local_host: &str,
    ingress: mpsc::Sender<MsgQueueItem>,
) -> std::io::Result<()> {
    let (read_half, write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);

    reply(&mut writer, &format!("220 {local_host} MM4 relay ready")).await?;

    let mut mail_from: Option<String> = None;
    let mut rcpt_to: Vec<String> = Vec::new();

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let verb = trimmed
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();

        match verb.as_str() {
            "HELO" | "EHLO" => reply(&mut writer, &format!("250 {local_host}")).await?,
            "MAIL" => {
                mail_from = Some(extract_number(trimmed));
                reply(&mut writer, "250 2.1.0 sender ok").await?;
            }
            "RCPT" => {
                rcpt_to.push(extract_number(trimmed));
                reply(&mut writer, "250 2.1.5 recipient ok").await?;
            }
            "DATA" => {
                let Some(from) = mail_from.clone() else {
                    reply(&mut writer, "503 5.5.1 need MAIL before DATA").await?;
                    continue;
                };
                if rcpt_to.is_empty() {
                    reply(&mut writer, "503 5.5.1 need RCPT before DATA").await?;
                    continue;
                }
                reply(&mut writer, "354 end data with <CRLF>.<CRLF>").await?;

                let envelope = read_data_section(&mut reader).await?;
                for to in rcpt_to.drain(..) {
                    let msg = MsgQueueItem::mms(from.clone(), to, envelope.clone());
                    debug!(log_id = %msg.log_id, from = %msg.from, to = %msg.to, "MM4 submission accepted");
                    if ingress.send(msg).await.is_err() {
                        warn!("ingress channel closed, dropping MM4 connection");
                        reply(&mut writer, "421 4.3.0 shutting down").await?;
                        return Ok(());
                    }
                }
                mail_from = None;
                reply(&mut writer, "250 2.0.0 message accepted").await?;
            }
            "RSET" => {
                mail_from = None;
                rcpt_to.clear();
                reply(&mut writer, "250 2.0.0 reset").await?;
            }
            "NOOP" => reply(&mut writer, "250 2.0.0 ok").await?,
            "QUIT" => {
                reply(&mut writer, &format!("221 2.0.0 {local_host} closing")).await?;
                return Ok(());
            }
            _ => reply(&mut writer, "502 5.5.2 command not recognized").await?,
        }
    }
}

/// Read the DATA section up to the terminating lone dot, splitting transfer
/// headers from the (dot-unstuffed) body. Both halves travel opaquely.
async fn read_data_section(
    reader: &mut BufReader<OwnedReadHalf>,
) -> std::io::Result<MmsEnvelope> {
    let mut headers = Vec::new();
    let mut body: Vec<u8> = Vec::new();
    let mut in_headers = true;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "." {
            break;
        }
        let unstuffed = if trimmed.starts_with("..") {
            &trimmed[1..]
        } else {
            trimmed
        };

        if in_headers {
            if unstuffed.is_empty() {
                in_headers = false;
                continue;
            }
            match unstuffed.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
                None => {
                    // Not a header after all; treat the rest as body.
                    in_headers = false;
                    body.extend_from_slice(unstuffed.as_bytes());
                    body.extend_from_slice(b"\r\n");
                }
            }
        } else {
            body.extend_from_slice(unstuffed.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
    }

    Ok(MmsEnvelope::new(headers, body))
}

/// Pull the bare number out of `MAIL FROM:<+15550001/TYPE=PLMN@mmsc.example>`.
fn extract_number(line: &str) -> String {
    let inner = match (line.find('<'), line.rfind('>')) {
        (Some(open), Some(close)) if close > open => &line[open + 1..close],
        _ => line.split_once(':').map(|(_, rest)| rest.trim()).unwrap_or(""),
    };
    let inner = inner.split('@').next().unwrap_or(inner);
    inner.split('/').next().unwrap_or(inner).trim().to_string()
}

async fn reply(writer: &mut BufWriter<OwnedWriteHalf>, text: &str) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

/// Outbound MM4 delivery toward the per-client MMSC peers (spec Section
/// 4.4): replays a stored envelope as an MM4_forward.REQ submission.
pub struct Mm4Outbound {
    local_host: String,
    peers: HashMap<String, String>,
}

impl Mm4Outbound {
    pub fn new(local_host: impl Into<String>, peers: HashMap<String, String>) -> Arc<Self> {
        Arc::new(Mm4Outbound {
            local_host: local_host.into(),
            peers,
        })
    }

    /// Forward an MMS to the destination client's MMSC. Missing peer
    /// configuration is a routing failure the caller turns into a requeue.
    pub async fn forward(&self, username: &str, msg: &MsgQueueItem) -> Result<(), Mm4Error> {
        let peer = self
            .peers
            .get(username)
            .ok_or_else(|| Mm4Error::NoPeer(username.to_string()))?;

        tokio::time::timeout(FORWARD_TIMEOUT, self.dialogue(peer, msg))
            .await
            .map_err(|_| Mm4Error::Timeout)?
    }

    async fn dialogue(&self, peer: &str, msg: &MsgQueueItem) -> Result<(), Mm4Error> {
        let socket = TcpStream::connect(peer).await?;
        let (read_half, write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(write_half);

        expect_reply(&mut reader, '2').await?;
        command(&mut writer, &format!("HELO {}", self.local_host)).await?;
        expect_reply(&mut reader, '2').await?;
        command(&mut writer, &format!("MAIL FROM:<{}/TYPE=PLMN>", msg.from)).await?;
        expect_reply(&mut reader, '2').await?;
        command(&mut writer, &format!("RCPT TO:<{}/TYPE=PLMN>", msg.to)).await?;
        expect_reply(&mut reader, '2').await?;
        command(&mut writer, "DATA").await?;
        expect_reply(&mut reader, '3').await?;

        if let Some(envelope) = msg.content.envelope() {
            for (name, value) in &envelope.headers {
                command(&mut writer, &format!("{name}: {value}")).await?;
            }
            command(&mut writer, "").await?;
            for line in envelope.body.split(|b| *b == b'\n') {
                let line = String::from_utf8_lossy(line);
                let line = line.trim_end_matches('\r');
                // Dot-stuff body lines so a payload dot cannot end DATA.
                if line.starts_with('.') {
                    command(&mut writer, &format!(".{line}")).await?;
                } else {
                    command(&mut writer, line).await?;
                }
            }
        }
        command(&mut writer, ".").await?;
        expect_reply(&mut reader, '2').await?;
        command(&mut writer, "QUIT").await?;

        debug!(log_id = %msg.log_id, %peer, "MM4 forward accepted");
        Ok(())
    }
}

async fn command(writer: &mut BufWriter<OwnedWriteHalf>, text: &str) -> Result<(), Mm4Error> {
    writer.write_all(text.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Read one (possibly multiline) SMTP reply and require its class digit.
async fn expect_reply(
    reader: &mut BufReader<OwnedReadHalf>,
    class: char,
) -> Result<(), Mm4Error> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(Mm4Error::Peer("connection closed mid-reply".to_string()));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        // Continuation lines carry a dash after the code ("250-...").
        if trimmed.len() >= 4 && trimmed.as_bytes()[3] == b'-' {
            continue;
        }
        if trimmed.starts_with(class) {
            return Ok(());
        }
        return Err(Mm4Error::Peer(trimmed.to_string()));
    }
}
