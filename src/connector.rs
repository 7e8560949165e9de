// src/connector.rs

//! Connector Prober: per-connector state, modes and encoders.

use crate::drm::{
    connector_type_name, ConnectorBuffers, ConnectorCounts, ConnectorReply, Connection,
    DrmDevice, DrmError, ModeInfo,
};
use crate::resources::{query_then_fetch, TwoPhaseQuery};
use log::debug;
use nix::errno::Errno;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Connector {
    pub id: u32,
    pub connection: Connection,
    /// In the order the device reported them.
    pub modes: Vec<ModeInfo>,
    pub encoder_ids: Vec<u32>,
    /// Encoder currently attached to the connector, 0 if none.
    pub encoder_id: u32,
    pub prop_ids: Vec<u32>,
    pub prop_values: Vec<u64>,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub mm_width: u32,
    pub mm_height: u32,
}

impl Connector {
    /// Kernel-style name such as `HDMI-A-1`.
    pub fn name(&self) -> String {
        format!(
            "{}-{}",
            connector_type_name(self.connector_type),
            self.connector_type_id
        )
    }

    /// The mode a surface gets sized to: the first one reported, not the
    /// preferred one.
    pub fn selected_mode(&self) -> Option<&ModeInfo> {
        self.modes.first()
    }
}

/// Why a connector gets no surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unusable {
    NoEncoders,
    NoModes,
    NoCurrentEncoder,
    NotConnected(Connection),
}

impl fmt::Display for Unusable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unusable::NoEncoders => write!(f, "no encoders"),
            Unusable::NoModes => write!(f, "no modes"),
            Unusable::NoCurrentEncoder => write!(f, "no encoder attached"),
            Unusable::NotConnected(state) => write!(f, "connection state {:?}", state),
        }
    }
}

pub fn check_usable(connector: &Connector) -> Result<(), Unusable> {
    if connector.encoder_ids.is_empty() {
        Err(Unusable::NoEncoders)
    } else if connector.modes.is_empty() {
        Err(Unusable::NoModes)
    } else if connector.encoder_id == 0 {
        Err(Unusable::NoCurrentEncoder)
    } else if connector.connection != Connection::Connected {
        Err(Unusable::NotConnected(connector.connection))
    } else {
        Ok(())
    }
}

pub fn is_usable(connector: &Connector) -> bool {
    check_usable(connector).is_ok()
}

struct ConnectorQuery {
    connector_id: u32,
}

impl TwoPhaseQuery for ConnectorQuery {
    type Counts = ConnectorCounts;
    type Buffers = ConnectorBuffers;
    type Reply = ConnectorReply;
    type Output = Connector;

    const REQUEST: &'static str = "DRM_IOCTL_MODE_GETCONNECTOR";

    fn issue<D: DrmDevice>(
        &self,
        device: &D,
        buffers: &mut ConnectorBuffers,
    ) -> Result<(ConnectorCounts, ConnectorReply), Errno> {
        device
            .get_connector(self.connector_id, buffers)
            .map(|reply| (reply.counts, reply))
    }

    fn lists(counts: &ConnectorCounts) -> Vec<(&'static str, usize)> {
        vec![
            ("modes", counts.modes),
            ("properties", counts.props),
            ("encoders", counts.encoders),
        ]
    }

    fn allocate(counts: &ConnectorCounts) -> ConnectorBuffers {
        ConnectorBuffers {
            modes: vec![ModeInfo::default(); counts.modes],
            props: vec![0; counts.props],
            prop_values: vec![0; counts.props],
            encoders: vec![0; counts.encoders],
        }
    }

    fn finish(
        &self,
        mut buffers: ConnectorBuffers,
        counts: &ConnectorCounts,
        reply: ConnectorReply,
    ) -> Connector {
        buffers.modes.truncate(counts.modes);
        buffers.props.truncate(counts.props);
        buffers.prop_values.truncate(counts.props);
        buffers.encoders.truncate(counts.encoders);
        Connector {
            id: self.connector_id,
            connection: reply.connection,
            modes: buffers.modes,
            encoder_ids: buffers.encoders,
            encoder_id: reply.encoder_id,
            prop_ids: buffers.props,
            prop_values: buffers.prop_values,
            connector_type: reply.connector_type,
            connector_type_id: reply.connector_type_id,
            mm_width: reply.mm_width,
            mm_height: reply.mm_height,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectorProber {
    capacity: usize,
}

impl ConnectorProber {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn probe<D: DrmDevice>(&self, device: &D, connector_id: u32) -> Result<Connector, DrmError> {
        let connector =
            query_then_fetch(device, &ConnectorQuery { connector_id }, self.capacity)?;
        debug!(
            "connector {} ({}): {:?}, modes: {}, props: {}, enc: {}",
            connector.id,
            connector.name(),
            connector.connection,
            connector.modes.len(),
            connector.prop_ids.len(),
            connector.encoder_ids.len()
        );
        Ok(connector)
    }
}
