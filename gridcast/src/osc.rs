//! Open Sound Control output.
//!
//! Each `CellData` record becomes four OSC 1.0 messages addressed by grid
//! coordinates, e.g. `/grid/1/3/color ,fff`. Every message travels in its own
//! UDP datagram; delivery is fire-and-forget.

use crate::config::OscConfig;
use crate::core_modules::cell::CellData;
use crate::error::{GridcastError, GridcastResult};
use crate::pipeline::StatsSink;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

/// A single OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
}

impl OscArg {
    fn tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
        }
    }
}

/// An OSC message: an address pattern plus typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

/// Appends `s` as an OSC-string: NUL-terminated, zero-padded to 4 bytes.
fn push_osc_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    let pad = 4 - s.len() % 4;
    buf.extend(std::iter::repeat_n(0u8, pad));
}

/// Reads an OSC-string at `*pos`, advancing past its padding.
fn read_osc_string(buf: &[u8], pos: &mut usize) -> GridcastResult<String> {
    let rest = buf
        .get(*pos..)
        .ok_or_else(|| GridcastError::forwarding("OSC packet truncated"))?;
    let len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| GridcastError::forwarding("OSC string is not terminated"))?;
    let s = std::str::from_utf8(&rest[..len])
        .map_err(|e| GridcastError::forwarding(format!("OSC string is not UTF-8: {e}")))?
        .to_string();
    *pos += len + (4 - len % 4);
    Ok(s)
}

fn read_word(buf: &[u8], pos: &mut usize) -> GridcastResult<[u8; 4]> {
    let word = buf
        .get(*pos..*pos + 4)
        .ok_or_else(|| GridcastError::forwarding("OSC argument truncated"))?;
    *pos += 4;
    Ok([word[0], word[1], word[2], word[3]])
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.address.len() + 8 + self.args.len() * 4);
        push_osc_string(&mut buf, &self.address);
        let tags: String = std::iter::once(',')
            .chain(self.args.iter().map(OscArg::tag))
            .collect();
        push_osc_string(&mut buf, &tags);
        for arg in &self.args {
            match arg {
                OscArg::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
                OscArg::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
                OscArg::Str(s) => push_osc_string(&mut buf, s),
            }
        }
        buf
    }

    pub fn decode(packet: &[u8]) -> GridcastResult<Self> {
        let mut pos = 0;
        let address = read_osc_string(packet, &mut pos)?;
        if !address.starts_with('/') {
            return Err(GridcastError::forwarding(format!(
                "OSC address must start with '/': {address:?}"
            )));
        }
        let tags = read_osc_string(packet, &mut pos)?;
        let tags = tags
            .strip_prefix(',')
            .ok_or_else(|| GridcastError::forwarding("OSC type tags must start with ','"))?;

        let mut args = Vec::with_capacity(tags.len());
        for tag in tags.chars() {
            let arg = match tag {
                'i' => OscArg::Int(i32::from_be_bytes(read_word(packet, &mut pos)?)),
                'f' => OscArg::Float(f32::from_be_bytes(read_word(packet, &mut pos)?)),
                's' => OscArg::Str(read_osc_string(packet, &mut pos)?),
                other => {
                    return Err(GridcastError::forwarding(format!(
                        "unsupported OSC type tag '{other}'"
                    )));
                }
            };
            args.push(arg);
        }
        Ok(Self { address, args })
    }
}

/// The four messages describing one cell, under `/{root}/{row}/{col}`.
pub fn cell_messages(root: &str, cell: &CellData) -> [OscMessage; 4] {
    let prefix = format!("/{root}/{}/{}", cell.row, cell.col);
    let (dr, dg, db) = cell.dominant_color;
    [
        OscMessage::new(
            format!("{prefix}/color"),
            vec![
                OscArg::Float(cell.avg_red),
                OscArg::Float(cell.avg_green),
                OscArg::Float(cell.avg_blue),
            ],
        ),
        OscMessage::new(
            format!("{prefix}/brightness"),
            vec![OscArg::Float(cell.brightness)],
        ),
        OscMessage::new(
            format!("{prefix}/contrast"),
            vec![OscArg::Float(cell.contrast)],
        ),
        OscMessage::new(
            format!("{prefix}/dominant"),
            vec![OscArg::Float(dr), OscArg::Float(dg), OscArg::Float(db)],
        ),
    ]
}

/// UDP statistics sink speaking OSC.
pub struct OscSender {
    socket: UdpSocket,
    destination: SocketAddr,
    address_root: String,
}

impl OscSender {
    /// Resolves the destination and binds an ephemeral local socket.
    pub async fn connect(config: &OscConfig) -> GridcastResult<Self> {
        let destination = tokio::net::lookup_host(config.destination())
            .await?
            .next()
            .ok_or_else(|| {
                GridcastError::config(format!("could not resolve {}", config.destination()))
            })?;
        let unspecified: IpAddr = if destination.is_ipv4() {
            Ipv4Addr::UNSPECIFIED.into()
        } else {
            Ipv6Addr::UNSPECIFIED.into()
        };
        let bind = SocketAddr::new(unspecified, 0);
        let socket = UdpSocket::bind(bind).await?;
        debug!("OSC sender bound to {:?}, sending to {destination}", socket.local_addr());
        Ok(Self {
            socket,
            destination,
            address_root: config.address_root.clone(),
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub async fn send_message(&self, message: &OscMessage) -> GridcastResult<()> {
        self.socket
            .send_to(&message.encode(), self.destination)
            .await
            .map_err(|e| GridcastError::forwarding(format!("{}: {e}", message.address)))?;
        Ok(())
    }

    /// Sends every record of one frame. Stops at the first failed datagram.
    pub async fn send_grid_data(&self, cells: &[CellData]) -> GridcastResult<()> {
        for cell in cells {
            for message in cell_messages(&self.address_root, cell) {
                self.send_message(&message).await?;
            }
        }
        Ok(())
    }
}

impl StatsSink for OscSender {
    async fn send(&mut self, cells: &[CellData]) -> GridcastResult<()> {
        self.send_grid_data(cells).await
    }
}
