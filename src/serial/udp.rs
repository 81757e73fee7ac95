//! Link bytes carried in UDP datagrams
//!
//! Lets the streamer and monitor run on different hosts without a serial
//! cable. Writes are split into datagrams of at most [`MAX_DATAGRAM`] bytes;
//! the decoder resynchronizes on frame boundaries, so datagram boundaries
//! carry no meaning.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::port_trait::SerialPortIO;
use crate::error::{DaqError, Result};

/// Largest datagram written, below a typical Ethernet MTU
pub const MAX_DATAGRAM: usize = 1024;

/// UDP endpoint speaking [`SerialPortIO`]
#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}

impl UdpLink {
    /// Receive datagrams from any sender on `addr`
    pub async fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| DaqError::Serial(format!("Failed to bind UDP socket {}: {}", addr, e)))?;
        info!("Listening for frames on udp://{}", socket.local_addr()?);

        Ok(Self { socket, peer: None })
    }

    /// Send datagrams to `target` from an ephemeral local port
    pub async fn connect(target: &str) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| DaqError::Serial(format!("Failed to bind UDP socket: {}", e)))?;
        socket
            .connect(target)
            .await
            .map_err(|e| DaqError::Serial(format!("Failed to connect UDP socket to {}: {}", target, e)))?;

        let peer = socket.peer_addr()?;
        info!("Sending frames to udp://{}", peer);
        Ok(Self { socket, peer: Some(peer) })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

#[async_trait]
impl SerialPortIO for UdpLink {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if self.peer.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "UDP link has no peer"));
        }

        for chunk in data.chunks(MAX_DATAGRAM) {
            let sent = self.socket.send(chunk).await?;
            if sent != chunk.len() {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("sent {} of {} bytes", sent, chunk.len()),
                ));
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Next non-empty datagram; bytes beyond `buf.len()` are dropped
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let (n, from) = self.socket.recv_from(buf).await?;
            if n > 0 {
                return Ok(n);
            }
            debug!("Ignoring empty datagram from {}", from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encoder::encode_frame;
    use crate::frame::layout::FrameLayout;
    use crate::runtime::Monitor;
    use tokio::time::{timeout, Duration};

    async fn pair() -> (UdpLink, UdpLink) {
        let receiver = UdpLink::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap().to_string();
        let sender = UdpLink::connect(&target).await.unwrap();
        (sender, receiver)
    }

    #[tokio::test]
    async fn test_large_write_is_split_into_datagrams() {
        let (mut sender, mut receiver) = pair().await;
        let data: Vec<u8> = (0..2500u32).map(|i| i as u8).collect();

        sender.write_all(&data).await.unwrap();
        sender.flush().await.unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 2048];
        let mut sizes = Vec::new();
        while received.len() < data.len() {
            let n = timeout(Duration::from_secs(2), receiver.read(&mut buf))
                .await
                .unwrap()
                .unwrap();
            sizes.push(n);
            received.extend_from_slice(&buf[..n]);
        }

        assert_eq!(sizes, vec![1024, 1024, 452]);
        assert_eq!(received, data);
    }

    #[tokio::test]
    async fn test_bound_link_cannot_write() {
        let mut receiver = UdpLink::bind("127.0.0.1:0").await.unwrap();
        assert!(receiver.peer().is_none());

        let err = receiver.write_all(&[1, 2, 3]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_bind_error() {
        let result = UdpLink::bind("not-an-address").await;
        assert!(matches!(result, Err(DaqError::Serial(_))));
    }

    #[tokio::test]
    async fn test_monitor_decodes_frames_over_udp() {
        let (mut sender, mut receiver) = pair().await;
        let layout = FrameLayout::new(2, 4);

        let mut stream = Vec::new();
        for seq in [0u8, 1, 3] {
            let samples: Vec<i16> = (0..8).map(|i| i * 10 + seq as i16).collect();
            stream.extend(encode_frame(&layout, seq, &samples).unwrap());
        }
        sender.write_all(&stream).await.unwrap();

        let mut monitor = Monitor::new(layout, None, 2048);
        let stats = monitor
            .run(&mut receiver, tokio::time::sleep(Duration::from_millis(300)))
            .await
            .unwrap();

        assert_eq!(stats.frames, 3);
        assert_eq!(stats.lost_frames, 1);
        assert_eq!(stats.skipped_bytes, 0);
    }
}
