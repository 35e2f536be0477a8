//! Identity rotation through the Tor control port.
//!
//! Rotation is two steps: `SIGNAL NEWNYM` on the control channel, then a
//! brand new HTTP client routed through the SOCKS proxy so no pooled
//! connection survives from the previous circuit.

use std::io;
use std::time::Duration;

use citecrawl_core::{HttpError, HttpSettings, SHARED_RUNTIME, build_client};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::client::{MetadataClient, S2Client};

/// Rotation failed; the run cannot continue
#[derive(Debug)]
pub enum RotationError {
    /// Control port unreachable or connection dropped
    Io(io::Error),
    /// Controller answered a command with a non-250 reply
    Rejected { command: &'static str, reply: String },
    /// Control exchange exceeded its timeout
    Timeout,
    /// Could not build the replacement client
    Client(HttpError),
}

impl std::fmt::Display for RotationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "control port I/O: {e}"),
            Self::Rejected { command, reply } => write!(f, "{command} rejected: {reply}"),
            Self::Timeout => f.write_str("control port timed out"),
            Self::Client(e) => write!(f, "cannot build client: {e}"),
        }
    }
}

impl std::error::Error for RotationError {}

impl From<io::Error> for RotationError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Source of lookup clients, able to change the egress identity.
pub trait IdentityRotator {
    type Client: MetadataClient;

    /// Client bound to the current identity
    fn connect(&self) -> Result<Self::Client, RotationError>;

    /// Discard the current identity and establish a new one
    fn renew(&mut self) -> Result<(), RotationError>;

    /// Renew, then hand out a client for the new identity
    fn rotate(&mut self) -> Result<Self::Client, RotationError> {
        self.renew()?;
        self.connect()
    }
}

/// Tor control channel settings
#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub host: String,
    pub port: u16,
    /// `None` uses null authentication
    pub password: Option<String>,
    pub timeout: Duration,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9051,
            password: None,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Rotator for a local Tor daemon, producing [`S2Client`]s.
pub struct TorRotator {
    control: ControlSettings,
    http: HttpSettings,
    base_url: String,
    api_key: Option<String>,
    ip_check_url: Option<String>,
}

impl TorRotator {
    /// `http.proxy` should point at Tor's SOCKS port
    pub fn new(control: ControlSettings, http: HttpSettings, base_url: impl Into<String>) -> Self {
        Self {
            control,
            http,
            base_url: base_url.into(),
            api_key: None,
            ip_check_url: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Log the egress IP reported by `url` after every connect
    pub fn with_ip_check(mut self, url: Option<String>) -> Self {
        self.ip_check_url = url;
        self
    }
}

impl IdentityRotator for TorRotator {
    type Client = S2Client;

    fn connect(&self) -> Result<S2Client, RotationError> {
        let http = build_client(&self.http).map_err(RotationError::Client)?;
        let client = S2Client::new(http, self.base_url.clone()).with_api_key(self.api_key.clone());
        if let Some(url) = &self.ip_check_url {
            match client.egress_ip(url) {
                Ok(ip) => log::info!("Session IP: {ip}"),
                Err(e) => log::warn!("Egress IP check failed: {e}"),
            }
        }
        Ok(client)
    }

    fn renew(&mut self) -> Result<(), RotationError> {
        let addr = format!("{}:{}", self.control.host, self.control.port);
        log::info!("Requesting new Tor identity via {addr}");
        let password = self.control.password.as_deref();
        SHARED_RUNTIME.handle().block_on(async {
            tokio::time::timeout(self.control.timeout, signal_newnym(&addr, password))
                .await
                .map_err(|_| RotationError::Timeout)?
        })?;
        log::debug!("Tor identity renewed");
        Ok(())
    }
}

/// Authenticate, send NEWNYM, say goodbye.
async fn signal_newnym(addr: &str, password: Option<&str>) -> Result<(), RotationError> {
    let stream = TcpStream::connect(addr).await?;
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    let auth = match password {
        Some(pw) => format!("AUTHENTICATE {}\r\n", quote(pw)),
        None => "AUTHENTICATE\r\n".to_string(),
    };
    command(&mut write, &mut lines, "AUTHENTICATE", &auth).await?;
    command(&mut write, &mut lines, "SIGNAL NEWNYM", "SIGNAL NEWNYM\r\n").await?;

    // controller closes on QUIT; a failure here changes nothing
    let _ = write.write_all(b"QUIT\r\n").await;
    Ok(())
}

async fn command(
    write: &mut OwnedWriteHalf,
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    name: &'static str,
    line: &str,
) -> Result<(), RotationError> {
    write.write_all(line.as_bytes()).await?;
    let reply = read_reply(lines).await?;
    if reply.starts_with("250") {
        Ok(())
    } else {
        Err(RotationError::Rejected {
            command: name,
            reply,
        })
    }
}

/// Read up to the final line of a reply (`NNN ` rather than `NNN-`/`NNN+`).
async fn read_reply(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Result<String, RotationError> {
    loop {
        let Some(line) = lines.next_line().await? else {
            return Err(RotationError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "control connection closed",
            )));
        };
        if line.as_bytes().get(3).is_none_or(|&b| b == b' ') {
            return Ok(line);
        }
    }
}

/// Control-protocol quoted string
fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Minimal Tor controller: one connection, records the commands it saw.
    fn fake_controller(password: &'static str) -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let reader = std::io::BufReader::new(stream);
            let mut seen = Vec::new();
            for line in reader.lines() {
                let Ok(line) = line else { break };
                seen.push(line.clone());
                let reply = if line.starts_with("AUTHENTICATE") {
                    if line == format!("AUTHENTICATE {}", quote(password)) {
                        "250 OK"
                    } else {
                        "515 Authentication failed: Password did not match"
                    }
                } else if line == "SIGNAL NEWNYM" {
                    "250 OK"
                } else if line == "QUIT" {
                    let _ = writer.write_all(b"250 closing connection\r\n");
                    break;
                } else {
                    "510 Unrecognized command"
                };
                let _ = writer.write_all(format!("{reply}\r\n").as_bytes());
                if reply.starts_with("515") {
                    break;
                }
            }
            seen
        });
        (port, handle)
    }

    fn rotator(port: u16, password: &str) -> TorRotator {
        TorRotator::new(
            ControlSettings {
                port,
                password: Some(password.to_string()),
                timeout: Duration::from_secs(5),
                ..Default::default()
            },
            HttpSettings {
                proxy: Some("socks5h://127.0.0.1:9050".to_string()),
                ..Default::default()
            },
            "https://api.semanticscholar.org/v1/paper/",
        )
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn rotate_sends_newnym_after_auth() {
        let (port, controller) = fake_controller("hunter2");
        let mut rotator = rotator(port, "hunter2");

        let client = rotator.rotate();
        assert!(client.is_ok(), "rotation failed: {:?}", client.err());

        let seen = controller.join().unwrap();
        assert_eq!(
            seen,
            vec!["AUTHENTICATE \"hunter2\"", "SIGNAL NEWNYM", "QUIT"]
        );
    }

    #[test]
    fn wrong_password_is_rejected() {
        let (port, controller) = fake_controller("hunter2");
        let mut rotator = rotator(port, "wrong");

        match rotator.rotate() {
            Err(RotationError::Rejected { command, reply }) => {
                assert_eq!(command, "AUTHENTICATE");
                assert!(reply.starts_with("515"));
            }
            other => panic!("expected rejection, got {:?}", other.err()),
        }
        let seen = controller.join().unwrap();
        assert!(!seen.iter().any(|l| l == "SIGNAL NEWNYM"));
    }

    #[test]
    fn unreachable_controller_is_io_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut rotator = rotator(port, "hunter2");
        assert!(matches!(rotator.renew(), Err(RotationError::Io(_))));
    }

    #[test]
    fn connect_does_not_touch_controller() {
        // port 1 is never a Tor controller; connect must not dial it
        let rotator = rotator(1, "hunter2");
        assert!(rotator.connect().is_ok());
    }
}
