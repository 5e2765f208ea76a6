//! TFTP server implementation
//!
//! Read-only. Each read request gets its own task and an ephemeral socket,
//! and is sent in RFC 1350 lockstep after optional RFC 2347 negotiation.

use crate::error::{Result, TftpError};
use crate::files::FileProvider;
use crate::packet::{ErrorCode, TftpOptions, TftpPacket};
use bytes::Bytes;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Default block size (RFC 1350)
pub const DEFAULT_BLOCK_SIZE: u16 = 512;

/// Block size bounds (RFC 2348)
pub const MIN_BLOCK_SIZE: u16 = 8;
pub const MAX_BLOCK_SIZE: u16 = 65464;

/// Default retransmit timeout in seconds
pub const DEFAULT_TIMEOUT: u8 = 5;

/// Retransmissions before a transfer is abandoned
pub const MAX_RETRIES: u32 = 5;

/// TFTP server
pub struct TftpServer {
    bind_ip: Ipv4Addr,
    port: u16,
    file_provider: Arc<dyn FileProvider>,
}

impl TftpServer {
    /// Create a new TFTP server on the standard port
    pub fn new(bind_ip: Ipv4Addr, file_provider: Arc<dyn FileProvider>) -> Self {
        Self {
            bind_ip,
            port: 69,
            file_provider,
        }
    }

    /// Listen on a different port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> Result<UdpSocket> {
        let bind_addr = SocketAddrV4::new(self.bind_ip, self.port);
        UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| TftpError::BindFailed {
                addr: bind_addr.into(),
                source: e,
            })
    }

    /// Run the TFTP server
    pub async fn run(&self, shutdown: tokio::sync::watch::Receiver<bool>) -> Result<()> {
        let socket = self.bind().await?;
        self.serve(socket, shutdown).await
    }

    /// Serve requests arriving on an already bound socket
    pub async fn serve(
        &self,
        socket: UdpSocket,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Result<()> {
        info!(addr = ?socket.local_addr().ok(), "TFTP server started");

        let mut buf = [0u8; 65535];
        let mut shutdown = shutdown;

        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, src)) => {
                            let data = buf[..len].to_vec();
                            let file_provider = Arc::clone(&self.file_provider);

                            tokio::spawn(async move {
                                if let Err(e) = handle_request(data, src, file_provider).await {
                                    error!(error = %e, client = %src, "Error handling TFTP request");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error receiving packet");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("TFTP server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for TftpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TftpServer")
            .field("bind_ip", &self.bind_ip)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

async fn handle_request(
    data: Vec<u8>,
    client: SocketAddr,
    file_provider: Arc<dyn FileProvider>,
) -> Result<()> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;

    match TftpPacket::parse(&data) {
        Ok(TftpPacket::ReadRequest {
            filename, options, ..
        }) => {
            let Some(file) = file_provider.get_file(&filename).await else {
                warn!(client = %client, filename = %filename, "File not found");
                return send_error(&socket, client, ErrorCode::FileNotFound, "File not found").await;
            };
            send_file(&socket, client, &filename, file, options).await
        }
        Ok(TftpPacket::WriteRequest { filename }) => {
            debug!(client = %client, filename = %filename, "Rejecting write request");
            send_error(&socket, client, ErrorCode::AccessViolation, "Write not supported").await
        }
        Ok(_) => send_error(&socket, client, ErrorCode::IllegalOperation, "Unexpected packet").await,
        Err(e) => {
            debug!(client = %client, error = %e, "Malformed TFTP request");
            send_error(&socket, client, ErrorCode::IllegalOperation, "Malformed request").await
        }
    }
}

/// Options the server will use, and the OACK answering them
fn negotiate(requested: &TftpOptions, file_size: u64) -> (u16, u8, Option<TftpOptions>) {
    let block_size = requested
        .blksize
        .map(|b| b.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE))
        .unwrap_or(DEFAULT_BLOCK_SIZE);
    let timeout_secs = requested
        .timeout
        .filter(|t| *t > 0)
        .unwrap_or(DEFAULT_TIMEOUT);

    if requested.is_empty() {
        return (block_size, timeout_secs, None);
    }

    let oack = TftpOptions {
        blksize: requested.blksize.map(|_| block_size),
        tsize: requested.tsize.map(|_| file_size),
        timeout: requested.timeout.map(|_| timeout_secs),
    };
    (block_size, timeout_secs, Some(oack))
}

/// Send `packet` and wait for the acknowledgement of `block`, retransmitting on timeout
///
/// Returns `false` if the client aborted with an error packet.
async fn send_and_await_ack(
    socket: &UdpSocket,
    client: SocketAddr,
    packet: &Bytes,
    block: u16,
    wait: Duration,
) -> Result<bool> {
    let mut buf = [0u8; 516];
    for _ in 0..MAX_RETRIES {
        socket.send_to(packet, client).await?;

        loop {
            match timeout(wait, socket.recv_from(&mut buf)).await {
                Err(_) => break,
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok((_, from))) if from != client => {
                    let error = TftpPacket::error(ErrorCode::UnknownTransferId, "Unknown transfer ID");
                    socket.send_to(&error.encode(), from).await?;
                }
                Ok(Ok((len, _))) => match TftpPacket::parse(&buf[..len]) {
                    Ok(TftpPacket::Ack { block: acked }) if acked == block => return Ok(true),
                    Ok(TftpPacket::Error { code, message }) => {
                        warn!(client = %client, code = ?code, message = %message, "Client aborted transfer");
                        return Ok(false);
                    }
                    // Duplicate or stale ACK
                    _ => continue,
                },
            }
        }
    }
    Err(TftpError::Timeout { block })
}

async fn send_file(
    socket: &UdpSocket,
    client: SocketAddr,
    filename: &str,
    file: Bytes,
    options: TftpOptions,
) -> Result<()> {
    let file_size = file.len() as u64;
    let (block_size, timeout_secs, oack) = negotiate(&options, file_size);
    let wait = Duration::from_secs(timeout_secs as u64);

    debug!(client = %client, filename = %filename, size = file_size, block_size, "Read request");

    if let Some(oack) = oack {
        let packet = TftpPacket::Oack { options: oack }.encode();
        if !send_and_await_ack(socket, client, &packet, 0, wait).await? {
            // RFC 2347: an ERROR in place of the OACK ACK terminates the transfer
            debug!(client = %client, filename = %filename, "Options refused");
            return Ok(());
        }
    }

    let block_len = block_size as usize;
    let mut block: u16 = 1;
    let mut offset = 0usize;

    loop {
        let end = (offset + block_len).min(file.len());
        let data = file.slice(offset..end);
        let is_last = data.len() < block_len;

        let packet = TftpPacket::Data { block, data }.encode();
        if !send_and_await_ack(socket, client, &packet, block, wait).await? {
            return Ok(());
        }

        if is_last {
            break;
        }
        offset = end;
        block = block.wrapping_add(1);
    }

    info!(client = %client, filename = %filename, bytes = file_size, "Transfer completed");
    Ok(())
}

async fn send_error(
    socket: &UdpSocket,
    client: SocketAddr,
    code: ErrorCode,
    message: &str,
) -> Result<()> {
    socket
        .send_to(&TftpPacket::error(code, message).encode(), client)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticFiles(HashMap<String, Bytes>);

    #[async_trait]
    impl FileProvider for StaticFiles {
        async fn get_file(&self, path: &str) -> Option<Bytes> {
            self.0.get(path).cloned()
        }
    }

    async fn start(files: &[(&str, Vec<u8>)]) -> (SocketAddr, tokio::sync::watch::Sender<bool>) {
        let provider = StaticFiles(
            files
                .iter()
                .map(|(name, data)| (name.to_string(), Bytes::from(data.clone())))
                .collect(),
        );
        let server = TftpServer::new(Ipv4Addr::LOCALHOST, Arc::new(provider)).with_port(0);
        let socket = server.bind().await.unwrap();
        let addr = socket.local_addr().unwrap();
        let (tx, rx) = tokio::sync::watch::channel(false);
        tokio::spawn(async move { server.serve(socket, rx).await });
        (addr, tx)
    }

    async fn recv(socket: &UdpSocket) -> (TftpPacket, SocketAddr) {
        let mut buf = [0u8; 2048];
        let (len, from) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        (TftpPacket::parse(&buf[..len]).unwrap(), from)
    }

    fn read_request(filename: &str, options: TftpOptions) -> Bytes {
        TftpPacket::ReadRequest {
            filename: filename.to_string(),
            mode: "octet".to_string(),
            options,
        }
        .encode()
    }

    #[test]
    fn test_negotiate() {
        let (block_size, timeout_secs, oack) = negotiate(&TftpOptions::default(), 100);
        assert_eq!(block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(timeout_secs, DEFAULT_TIMEOUT);
        assert!(oack.is_none());

        let requested = TftpOptions {
            blksize: Some(1428),
            tsize: Some(0),
            timeout: None,
        };
        let (block_size, _, oack) = negotiate(&requested, 4096);
        assert_eq!(block_size, 1428);
        assert_eq!(
            oack,
            Some(TftpOptions {
                blksize: Some(1428),
                tsize: Some(4096),
                timeout: None,
            })
        );

        let requested = TftpOptions {
            blksize: Some(1),
            ..Default::default()
        };
        assert_eq!(negotiate(&requested, 0).0, MIN_BLOCK_SIZE);
    }

    #[tokio::test]
    async fn test_lockstep_transfer() {
        let payload: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let (addr, _shutdown) = start(&[("undionly.kpxe", payload.clone())]).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(&read_request("undionly.kpxe", TftpOptions::default()), addr)
            .await
            .unwrap();

        let mut received = Vec::new();
        loop {
            let (packet, from) = recv(&client).await;
            // Transfers run on their own port
            assert_ne!(from, addr);
            match packet {
                TftpPacket::Data { block, data } => {
                    received.extend_from_slice(&data);
                    client
                        .send_to(&TftpPacket::Ack { block }.encode(), from)
                        .await
                        .unwrap();
                    if data.len() < DEFAULT_BLOCK_SIZE as usize {
                        break;
                    }
                }
                other => panic!("unexpected packet {:?}", other),
            }
        }
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_option_negotiation() {
        let (addr, _shutdown) = start(&[("ipxe.efi", vec![7u8; 100])]).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let options = TftpOptions {
            blksize: Some(64),
            tsize: Some(0),
            timeout: None,
        };
        client
            .send_to(&read_request("ipxe.efi", options), addr)
            .await
            .unwrap();

        let (packet, from) = recv(&client).await;
        assert_eq!(
            packet,
            TftpPacket::Oack {
                options: TftpOptions {
                    blksize: Some(64),
                    tsize: Some(100),
                    timeout: None,
                }
            }
        );
        client
            .send_to(&TftpPacket::Ack { block: 0 }.encode(), from)
            .await
            .unwrap();

        let (packet, _) = recv(&client).await;
        match packet {
            TftpPacket::Data { block, data } => {
                assert_eq!(block, 1);
                assert_eq!(data.len(), 64);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_file_and_write_rejected() {
        let (addr, _shutdown) = start(&[]).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client
            .send_to(&read_request("missing.bin", TftpOptions::default()), addr)
            .await
            .unwrap();
        let (packet, _) = recv(&client).await;
        assert!(matches!(
            packet,
            TftpPacket::Error {
                code: ErrorCode::FileNotFound,
                ..
            }
        ));

        client
            .send_to(
                &TftpPacket::WriteRequest {
                    filename: "upload.bin".to_string(),
                }
                .encode(),
                addr,
            )
            .await
            .unwrap();
        let (packet, _) = recv(&client).await;
        assert!(matches!(
            packet,
            TftpPacket::Error {
                code: ErrorCode::AccessViolation,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_refused_options_end_transfer() {
        let (addr, _shutdown) = start(&[("grubx64.efi", vec![3u8; 4000])]).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let options = TftpOptions {
            blksize: Some(1024),
            ..Default::default()
        };
        client
            .send_to(&read_request("grubx64.efi", options), addr)
            .await
            .unwrap();

        let (packet, from) = recv(&client).await;
        assert!(matches!(packet, TftpPacket::Oack { .. }));
        client
            .send_to(
                &TftpPacket::error(ErrorCode::OptionNegotiationFailed, "blksize refused").encode(),
                from,
            )
            .await
            .unwrap();

        let mut buf = [0u8; 2048];
        let nothing = timeout(Duration::from_millis(1500), client.recv_from(&mut buf)).await;
        assert!(nothing.is_err(), "server kept sending after ERROR");
    }
}
