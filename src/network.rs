//! `BrokerIo` (C6): one length-prefixed, framed TCP connection to one broker, plus the
//! injectable `Transport` abstraction used to swap in an in-memory double for tests (§4.12,
//! REDESIGN FLAGS — "injectable transport interface abstraction").

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};

use errors::{ErrorKind, Result};

/// The routing key for a single request: one topic, one partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new<S: Into<String>>(topic: S, partition: i32) -> TopicPartition {
        TopicPartition {
            topic: topic.into(),
            partition: partition,
        }
    }
}

/// Which IP family a `BrokerIo` is constrained to dial.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpVersion {
    Auto,
    V4,
    V6,
}

impl IpVersion {
    fn matches(&self, addr: &SocketAddr) -> bool {
        match *self {
            IpVersion::Auto => true,
            IpVersion::V4 => addr.is_ipv4(),
            IpVersion::V6 => addr.is_ipv6(),
        }
    }
}

/// A swappable transport capability: production code dials `TcpTransport`; tests inject
/// `MockTransport` to replay fixture byte sequences without a live broker.
pub trait Transport: Send {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
    fn receive(&mut self) -> Result<Vec<u8>>;
    fn close(&mut self);
    fn is_alive(&self) -> bool;
}

/// One TCP connection to one broker, framed with a 4-byte big-endian size prefix (§4.6, §6.1).
///
/// Not `Sync`/shareable: a `BrokerIo` is single-owner, pooled by `client::Cluster` and used by
/// at most one in-flight request at a time, matching the strictly synchronous request/response
/// model (§5).
pub struct BrokerIo {
    transport: Box<Transport>,
    max_request_size: usize,
}

/// Default per-IO-call deadline (§4.6, §6.8).
pub const DEFAULT_TIMEOUT_MILLIS: u64 = 1500;
/// Default outbound frame size cap (§6.8).
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 100 * 1024 * 1024;

impl BrokerIo {
    /// Dial `host:port` with the given per-call timeout and IP family constraint.
    pub fn connect(
        host: &str,
        port: u16,
        timeout: Duration,
        ip_version: IpVersion,
    ) -> Result<BrokerIo> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|err| ErrorKind::CannotBind(format!("{}:{} unresolvable: {}", host, port, err)))?;

        let mut last_err = None;
        for addr in addrs {
            if !ip_version.matches(&addr) {
                continue;
            }
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(timeout))
                        .map_err(|err| ErrorKind::CannotBind(format!("{}", err)))?;
                    stream
                        .set_write_timeout(Some(timeout))
                        .map_err(|err| ErrorKind::CannotBind(format!("{}", err)))?;
                    stream
                        .set_nodelay(true)
                        .map_err(|err| ErrorKind::CannotBind(format!("{}", err)))?;
                    return Ok(BrokerIo {
                        transport: Box::new(TcpTransport { stream: Some(stream) }),
                        max_request_size: DEFAULT_MAX_REQUEST_SIZE,
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }

        if last_err.is_none() {
            bail!(ErrorKind::IncompatibleHostIpVersion);
        }
        bail!(ErrorKind::CannotBind(format!(
            "{}:{}: {}",
            host,
            port,
            last_err.unwrap()
        )))
    }

    /// Wrap an already-connected transport (used by tests to inject `MockTransport`).
    pub fn from_transport(transport: Box<Transport>) -> BrokerIo {
        BrokerIo {
            transport: transport,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }

    pub fn set_max_request_size(&mut self, max: usize) {
        self.max_request_size = max;
    }

    /// Write the 4-byte size prefix followed by `body`.
    pub fn send(&mut self, body: &[u8]) -> Result<()> {
        if body.len() > self.max_request_size {
            bail!(ErrorKind::MismatchArgument(format!(
                "request of {} bytes exceeds max_request_size of {}",
                body.len(),
                self.max_request_size
            )));
        }

        let mut framed = Vec::with_capacity(4 + body.len());
        let mut len_buf = [0u8; 4];
        BigEndian::write_i32(&mut len_buf, body.len() as i32);
        framed.extend_from_slice(&len_buf);
        framed.extend_from_slice(body);

        self.transport
            .send(&framed)
            .map_err(|err| ErrorKind::CannotSend(format!("{}", err)).into())
    }

    /// Read exactly one size-prefixed frame and return the body (size prefix stripped).
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        self.transport
            .receive()
            .map_err(|err| ErrorKind::CannotRecv(format!("{}", err)).into())
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }
}

/// Production `Transport`: a plain blocking `TcpStream` with OS-level read/write timeouts
/// already configured by `BrokerIo::connect`.
struct TcpTransport {
    stream: Option<TcpStream>,
}

impl Transport for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(ErrorKind::NoConnection)?;

        // Loop until every byte is written or the socket's write timeout fires.
        let mut written = 0;
        while written < bytes.len() {
            match stream.write(&bytes[written..]) {
                Ok(0) => bail!(ErrorKind::CannotSend("connection closed mid-write".into())),
                Ok(n) => written += n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => bail!(ErrorKind::CannotSend(format!("{}", err))),
            }
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let stream = self.stream.as_mut().ok_or(ErrorKind::NoConnection)?;

        let mut len_buf = [0u8; 4];
        read_exact_classified(stream, &mut len_buf)?;
        let size = BigEndian::read_i32(&len_buf);
        if size < 0 {
            bail!(ErrorKind::CannotRecv(format!("negative frame size {}", size)));
        }

        let mut body = vec![0u8; size as usize];
        read_exact_classified(stream, &mut body)?;
        Ok(body)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn is_alive(&self) -> bool {
        match self.stream {
            Some(ref stream) => {
                // Best-effort, non-blocking liveness probe: peek without consuming.
                let mut buf = [0u8; 1];
                match stream.peek(&mut buf) {
                    Ok(_) => true,
                    Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => true,
                    Err(_) => false,
                }
            }
            None => false,
        }
    }
}

fn read_exact_classified(stream: &mut TcpStream, buf: &mut [u8]) -> Result<()> {
    match stream.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) => bail!(ErrorKind::CannotRecv(format!("{}", err))),
    }
}

/// An in-memory `Transport` double used by `client::Cluster` unit tests to replay fixed byte
/// sequences (the hex fixtures in §8) without a socket.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;

    pub struct MockTransport {
        pub sent: Vec<Vec<u8>>,
        pub responses: VecDeque<Vec<u8>>,
        pub alive: bool,
    }

    impl MockTransport {
        pub fn new(responses: Vec<Vec<u8>>) -> MockTransport {
            MockTransport {
                sent: Vec::new(),
                responses: responses.into_iter().collect(),
                alive: true,
            }
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, bytes: &[u8]) -> Result<()> {
            self.sent.push(bytes.to_vec());
            Ok(())
        }

        fn receive(&mut self) -> Result<Vec<u8>> {
            self.responses
                .pop_front()
                .ok_or_else(|| ErrorKind::ResponseMessageNotReceived.into())
        }

        fn close(&mut self) {
            self.alive = false;
        }

        fn is_alive(&self) -> bool {
            self.alive
        }
    }
}
