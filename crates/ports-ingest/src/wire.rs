//! Network wire contract
//!
//! A call is a stream of newline-delimited JSON frames. The client sends one
//! [`PortEnvelope`] per record and half-closes when done; the server answers
//! with a single [`StreamReply`].

use ports_common::types::Port;
use ports_common::{PortsError, Result};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{LinesCodec, LinesCodecError};

/// Upper bound for a single frame, in bytes.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// The line codec both ends of a call frame with.
pub fn frame_codec() -> LinesCodec {
    LinesCodec::new_with_max_length(MAX_FRAME_LENGTH)
}

pub(crate) fn transport_error(e: LinesCodecError) -> PortsError {
    PortsError::Transport(e.to_string())
}

/// A record as carried on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WirePort {
    pub key: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub alias: Vec<String>,
    pub regions: Vec<String>,
    pub coordinates: Vec<f64>,
    pub province: String,
    pub timezone: String,
    pub unlocs: Vec<String>,
    pub code: String,
}

/// One inbound frame: a caller-generated correlation id plus a record.
///
/// The correlation id is only used for logging and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortEnvelope {
    pub uuid: String,
    pub port: Option<WirePort>,
}

impl PortEnvelope {
    pub fn new(uuid: impl Into<String>, port: WirePort) -> Self {
        Self {
            uuid: uuid.into(),
            port: Some(port),
        }
    }

    /// Translate into the internal record shape.
    pub fn into_port(self) -> Result<Port> {
        let wire = self.port.ok_or_else(|| {
            PortsError::InvalidEnvelope(format!("envelope {} carries no port", self.uuid))
        })?;

        if wire.key.is_empty() {
            return Err(PortsError::InvalidRecord(format!(
                "envelope {} carries a port without a key",
                self.uuid
            )));
        }

        Ok(wire.into())
    }
}

/// The server's final frame for a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamReply {
    Received { count: u64 },
    Failed { error: String },
}

impl From<WirePort> for Port {
    fn from(wire: WirePort) -> Self {
        Port {
            key: wire.key,
            name: wire.name,
            city: wire.city,
            country: wire.country,
            alias: wire.alias,
            regions: wire.regions,
            coordinates: wire.coordinates,
            province: wire.province,
            timezone: wire.timezone,
            unlocs: wire.unlocs,
            code: wire.code,
        }
    }
}

impl From<Port> for WirePort {
    fn from(port: Port) -> Self {
        WirePort {
            key: port.key,
            name: port.name,
            city: port.city,
            country: port.country,
            alias: port.alias,
            regions: port.regions,
            coordinates: port.coordinates,
            province: port.province,
            timezone: port.timezone,
            unlocs: port.unlocs,
            code: port.code,
        }
    }
}
