// src/drm/mod.rs

//! The display device boundary.
//!
//! `DrmDevice` is a minimal, ioctl-shaped interface: one method per device
//! request, with typed request/reply structs instead of pointer fields. All
//! protocol logic (two-phase queries, surface setup, mode setting) lives in
//! the modules above this one and only talks to the trait, so a recording
//! mock can stand in for a real card in tests.

pub mod card;
pub mod error;
#[cfg(test)]
pub mod mock;
pub mod sys;

pub use card::Card;
pub use error::DrmError;

use bitflags::bitflags;
use nix::errno::Errno;
use std::fmt;

bitflags! {
    /// `DRM_MODE_TYPE_*` bits as reported in `drm_mode_modeinfo::type`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModeTypeFlags: u32 {
        const BUILTIN = 1 << 0;
        const PREFERRED = 1 << 3;
        const DEFAULT = 1 << 4;
        const USERDEF = 1 << 5;
        const DRIVER = 1 << 6;
    }
}

/// A display timing mode. Only the visible size is interpreted; everything
/// else travels back to the device untouched.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct ModeInfo {
    raw: sys::drm_mode_modeinfo,
}

impl ModeInfo {
    pub fn from_raw(raw: sys::drm_mode_modeinfo) -> Self {
        Self { raw }
    }

    /// Builds a mode with only the visible size and refresh filled in.
    pub fn with_size(width: u16, height: u16, vrefresh: u32) -> Self {
        let mut raw = sys::drm_mode_modeinfo {
            hdisplay: width,
            vdisplay: height,
            vrefresh,
            ..Default::default()
        };
        let name = format!("{}x{}", width, height);
        for (dst, src) in raw.name.iter_mut().zip(name.bytes()) {
            *dst = src as libc::c_char;
        }
        Self { raw }
    }

    pub fn raw(&self) -> &sys::drm_mode_modeinfo {
        &self.raw
    }

    pub fn width(&self) -> u32 {
        self.raw.hdisplay as u32
    }

    pub fn height(&self) -> u32 {
        self.raw.vdisplay as u32
    }

    pub fn vrefresh(&self) -> u32 {
        self.raw.vrefresh
    }

    pub fn mode_type(&self) -> ModeTypeFlags {
        ModeTypeFlags::from_bits_truncate(self.raw.type_)
    }

    pub fn name(&self) -> String {
        let bytes: Vec<u8> = self
            .raw
            .name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Default for ModeInfo {
    fn default() -> Self {
        Self {
            raw: sys::drm_mode_modeinfo::default(),
        }
    }
}

impl fmt::Debug for ModeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeInfo")
            .field("name", &self.name())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("vrefresh", &self.vrefresh())
            .field("type", &self.mode_type())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Connected,
    Disconnected,
    Unknown,
}

impl Connection {
    pub fn from_raw(value: u32) -> Self {
        match value {
            sys::DRM_MODE_CONNECTED => Connection::Connected,
            sys::DRM_MODE_DISCONNECTED => Connection::Disconnected,
            _ => Connection::Unknown,
        }
    }
}

/// Kernel name for a `DRM_MODE_CONNECTOR_*` type, used in log lines.
pub fn connector_type_name(connector_type: u32) -> &'static str {
    match connector_type {
        1 => "VGA",
        2 => "DVI-I",
        3 => "DVI-D",
        4 => "DVI-A",
        5 => "Composite",
        6 => "SVIDEO",
        7 => "LVDS",
        8 => "Component",
        9 => "DIN",
        10 => "DP",
        11 => "HDMI-A",
        12 => "HDMI-B",
        13 => "TV",
        14 => "eDP",
        15 => "Virtual",
        16 => "DSI",
        17 => "DPI",
        18 => "Writeback",
        19 => "SPI",
        20 => "USB",
        _ => "Unknown",
    }
}

/// Element counts of the card-wide resource lists.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResourceCounts {
    pub fbs: usize,
    pub crtcs: usize,
    pub connectors: usize,
    pub encoders: usize,
}

/// Destination buffers for `get_resources`. A buffer's length is the
/// capacity offered to the device; empty buffers make it a count-only query.
#[derive(Debug, Default, Clone)]
pub struct ResourceBuffers {
    pub fbs: Vec<u32>,
    pub crtcs: Vec<u32>,
    pub connectors: Vec<u32>,
    pub encoders: Vec<u32>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorCounts {
    pub modes: usize,
    pub props: usize,
    pub encoders: usize,
}

/// Destination buffers for `get_connector`, same convention as
/// `ResourceBuffers`. `props` and `prop_values` are filled pairwise.
#[derive(Debug, Default, Clone)]
pub struct ConnectorBuffers {
    pub modes: Vec<ModeInfo>,
    pub props: Vec<u32>,
    pub prop_values: Vec<u64>,
    pub encoders: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectorReply {
    pub counts: ConnectorCounts,
    pub encoder_id: u32,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub connection: Connection,
    pub mm_width: u32,
    pub mm_height: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EncoderInfo {
    pub encoder_id: u32,
    pub encoder_type: u32,
    pub crtc_id: u32,
    pub possible_crtcs: u32,
    pub possible_clones: u32,
}

/// Current configuration of a CRTC as returned by `get_crtc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrtcState {
    pub crtc_id: u32,
    pub fb_id: u32,
    pub x: u32,
    pub y: u32,
    pub gamma_size: u32,
    pub mode: Option<ModeInfo>,
}

/// Request for `set_crtc`. `mode: None` disables the CRTC.
#[derive(Debug, Clone)]
pub struct CrtcConfig {
    pub crtc_id: u32,
    pub fb_id: u32,
    pub x: u32,
    pub y: u32,
    pub connectors: Vec<u32>,
    pub mode: Option<ModeInfo>,
}

/// Reply to `create_dumb`: the device picks pitch and size.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DumbBuffer {
    pub handle: u32,
    pub pitch: u32,
    pub size: u64,
}

/// Request for `add_fb`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FbCmd {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub bpp: u32,
    pub depth: u32,
    pub handle: u32,
}

/// Device memory mapped into the process, viewed as 32-bit words.
pub trait PixelMemory {
    fn words(&self) -> &[u32];
    fn words_mut(&mut self) -> &mut [u32];
}

/// One method per device request. Every call blocks until the device
/// answers; failures carry the errno the device returned.
pub trait DrmDevice {
    type Mapping: PixelMemory;

    fn set_master(&self) -> Result<(), Errno>;
    fn drop_master(&self) -> Result<(), Errno>;
    fn is_master(&self) -> bool;

    /// Fills as many entries of each buffer as fit and returns the counts
    /// the device currently has, which may exceed the buffer lengths.
    fn get_resources(&self, buffers: &mut ResourceBuffers) -> Result<ResourceCounts, Errno>;

    /// Same contract as `get_resources`, scoped to one connector.
    fn get_connector(
        &self,
        connector_id: u32,
        buffers: &mut ConnectorBuffers,
    ) -> Result<ConnectorReply, Errno>;

    fn get_encoder(&self, encoder_id: u32) -> Result<EncoderInfo, Errno>;
    fn get_crtc(&self, crtc_id: u32) -> Result<CrtcState, Errno>;
    fn set_crtc(&self, config: &CrtcConfig) -> Result<(), Errno>;

    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> Result<DumbBuffer, Errno>;
    /// Returns the new framebuffer id.
    fn add_fb(&self, cmd: &FbCmd) -> Result<u32, Errno>;
    /// Returns the fake offset to pass to `mmap`.
    fn map_dumb(&self, handle: u32) -> Result<u64, Errno>;
    fn mmap(&self, offset: u64, size: usize) -> Result<Self::Mapping, Errno>;
}
