//! UDP transport adapter.
//!
//! Implements [`Transport`] over a non-blocking `std::net::UdpSocket`
//! bound to `0.0.0.0:<udp_port>` or, with [`IpFamily::V6`](crate::config::IpFamily),
//! `[::]:<udp_port>`.  ESP-IDF provides `std::net` on top of lwIP, so the
//! same code runs on the device and on the host.
//!
//! A receive error other than "would block" closes the socket and rebinds
//! it on the spot; the error is still reported so the server loop can log
//! and count it.  If the rebind fails too, the next poll tries again.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use log::{info, warn};

use crate::error::{Error, Result, TransportOp};
use crate::rpc::codec::FRAME_LEN;
use crate::rpc::transport::Transport;

pub struct UdpTransport {
    ip: IpAddr,
    port: u16,
    socket: Option<UdpSocket>,
    rebinds: u32,
}

impl UdpTransport {
    /// Bind the server socket on all IPv4 interfaces.  Port `0` picks an
    /// ephemeral port.
    pub fn bind(port: u16) -> Result<Self> {
        Self::bind_on(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
    }

    pub fn bind_on(ip: IpAddr, port: u16) -> Result<Self> {
        let socket = open(ip, port).map_err(|e| Error::transport(TransportOp::Bind, &e))?;
        let mut transport = Self {
            ip,
            port,
            socket: Some(socket),
            rebinds: 0,
        };
        if let Some(addr) = transport.local_addr() {
            info!("UDP: listening on {}", addr);
            transport.port = addr.port();
        }
        Ok(transport)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Times the socket was recreated after a failure.
    pub fn rebinds(&self) -> u32 {
        self.rebinds
    }

    /// Drop the socket after a receive failure and bind a fresh one.  The
    /// receive error is returned whether or not the rebind worked.
    fn recover(&mut self, e: &io::Error) -> Error {
        warn!("UDP: recv failed ({}), rebinding", e);
        if let Err(bind_err) = self.rebind() {
            warn!("UDP: {}", bind_err);
        }
        Error::transport(TransportOp::Receive, e)
    }

    fn rebind(&mut self) -> Result<()> {
        self.socket = None;
        let socket = open(self.ip, self.port).map_err(|e| Error::transport(TransportOp::Bind, &e))?;
        self.rebinds = self.rebinds.wrapping_add(1);
        info!("UDP: socket rebound on port {}", self.port);
        self.socket = Some(socket);
        Ok(())
    }
}

fn open(ip: IpAddr, port: u16) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind((ip, port))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

impl Transport for UdpTransport {
    type Peer = SocketAddr;

    fn receive_if_available(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        if self.socket.is_none() {
            self.rebind()?;
        }
        let Some(socket) = self.socket.as_ref() else {
            return Ok(None);
        };
        match socket.recv_from(buf) {
            Ok((len, peer)) => Ok(Some((len, peer))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(self.recover(&e)),
        }
    }

    fn reply(&mut self, frame: &[u8; FRAME_LEN], peer: SocketAddr) -> Result<()> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(Error::transport(
                TransportOp::Send,
                &io::Error::from(io::ErrorKind::NotConnected),
            ));
        };
        match socket.send_to(frame, peer) {
            Ok(_) => Ok(()),
            Err(e) => Err(Error::transport(TransportOp::Send, &e)),
        }
    }
}
