//! Syslog sender over UDP or TCP
//!
//! UDP sends one datagram per event. TCP uses newline framing (RFC 6587
//! non-transparent framing) on a single connection opened at connect time.

use async_trait::async_trait;
use chrono::SecondsFormat;
use noise_core::{Event, EventFormat, SendError, Sender, SyslogFormat, SyslogProtocol};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Facility codes (RFC 5424 table 1)
const FACILITY_AUTHPRIV: u8 = 10;
const FACILITY_LOCAL0: u8 = 16;

/// RFC 5424 APP-NAME limit
const MAX_APP_NAME: usize = 48;

enum Transport {
    Udp(UdpSocket),
    Tcp(Mutex<Option<TcpStream>>),
}

pub struct SyslogSender {
    transport: Transport,
    format: SyslogFormat,
    closed: AtomicBool,
}

impl SyslogSender {
    pub async fn connect(
        host: &str,
        port: u16,
        protocol: SyslogProtocol,
        format: SyslogFormat,
    ) -> Result<Self, SendError> {
        if host.is_empty() || port == 0 {
            return Err(SendError::InvalidConfig(
                "syslog destination needs a host and a non-zero port".to_string(),
            ));
        }

        let target = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| SendError::InvalidConfig(format!("cannot resolve {}", host)))?;

        let transport = match protocol {
            SyslogProtocol::Udp => {
                let bind: SocketAddr = if target.is_ipv4() {
                    ([0, 0, 0, 0], 0).into()
                } else {
                    ([0u16; 8], 0).into()
                };
                let socket = UdpSocket::bind(bind).await?;
                socket.connect(target).await?;
                Transport::Udp(socket)
            }
            SyslogProtocol::Tcp => {
                let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(target))
                    .await
                    .map_err(|_| {
                        SendError::Io(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            format!("connect to {} timed out", target),
                        ))
                    })??;
                stream.set_nodelay(true)?;
                Transport::Tcp(Mutex::new(Some(stream)))
            }
        };

        debug!(target = %target, protocol = ?protocol, format = ?format, "Syslog sender connected");
        Ok(Self {
            transport,
            format,
            closed: AtomicBool::new(false),
        })
    }

    async fn write(&self, message: String) -> Result<(), SendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SendError::Closed);
        }
        match &self.transport {
            Transport::Udp(socket) => {
                socket.send(message.as_bytes()).await?;
            }
            Transport::Tcp(stream) => {
                let mut guard = stream.lock().await;
                let stream = guard.as_mut().ok_or(SendError::Closed)?;
                let mut line = message.into_bytes();
                line.push(b'\n');
                stream.write_all(&line).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Sender for SyslogSender {
    async fn send(&self, event: &Event) -> Result<(), SendError> {
        self.write(format_message(event, self.format)).await
    }

    async fn test(&self) -> Result<(), SendError> {
        let mut check = Event::new(
            "noisegen",
            "connection_test",
            EventFormat::Text,
            "noisegen connection test",
        );
        check.host = local_hostname();
        self.write(format_message(&check, self.format)).await
    }

    async fn close(&self) -> Result<(), SendError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Transport::Tcp(stream) = &self.transport {
            if let Some(mut stream) = stream.lock().await.take() {
                stream.shutdown().await?;
            }
        }
        Ok(())
    }
}

fn facility(event: &Event) -> u8 {
    if event.event_type_id == "linux_auth" {
        FACILITY_AUTHPRIV
    } else {
        FACILITY_LOCAL0
    }
}

fn app_name(event: &Event) -> String {
    let app: String = event
        .source
        .chars()
        .filter(|c| c.is_ascii_graphic())
        .take(MAX_APP_NAME)
        .collect();
    if app.is_empty() { "-".to_string() } else { app }
}

fn hostname(event: &Event) -> &str {
    if event.host.is_empty() { "-" } else { &event.host }
}

/// Frame an event as a syslog message, without transport framing.
pub fn format_message(event: &Event, format: SyslogFormat) -> String {
    let pri = u16::from(facility(event)) * 8 + u16::from(event.severity.syslog_code());
    match format {
        SyslogFormat::Rfc5424 => format!(
            "<{}>1 {} {} {} - - - {}",
            pri,
            event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            hostname(event),
            app_name(event),
            event.raw
        ),
        SyslogFormat::Rfc3164 => format!(
            "<{}>{} {} {}: {}",
            pri,
            event.timestamp.format("%b %e %H:%M:%S"),
            hostname(event),
            app_name(event),
            event.raw
        ),
    }
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "noisegen".to_string())
}
