// src/surface.rs

//! Surface Allocator: dumb buffer creation, framebuffer registration and
//! mapping.

use crate::drm::{DrmDevice, DrmError, FbCmd, ModeInfo};
use log::{debug, info};
use nix::errno::Errno;

/// Storage size of one pixel.
pub const BITS_PER_PIXEL: u32 = 32;
/// Visible color depth; the remaining 8 bits of each pixel are padding.
pub const COLOR_DEPTH: u32 = 24;

/// A linear pixel buffer allocated by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumbSurface {
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    /// Row stride in bytes, chosen by the device.
    pub pitch: u32,
    /// Total byte size, chosen by the device.
    pub size: u64,
    pub handle: u32,
    /// Framebuffer id once registered for scanout.
    pub fb_id: Option<u32>,
}

/// A connector that owns a mapped surface scanned out by a CRTC.
///
/// Dropping it unmaps the memory. The dumb buffer and framebuffer objects
/// stay alive until the device handle is closed.
#[derive(Debug)]
pub struct Output<M> {
    pub connector_id: u32,
    pub crtc_id: u32,
    pub mode: ModeInfo,
    pub surface: DumbSurface,
    pub memory: M,
}

pub fn create_surface<D: DrmDevice>(device: &D, mode: &ModeInfo) -> Result<DumbSurface, DrmError> {
    let (width, height) = (mode.width(), mode.height());
    let dumb = device
        .create_dumb(width, height, BITS_PER_PIXEL)
        .map_err(DrmError::Allocation)?;
    debug!(
        "Created dumb buffer {}x{} handle={} pitch={} size={}",
        width, height, dumb.handle, dumb.pitch, dumb.size
    );
    Ok(DumbSurface {
        width,
        height,
        bpp: BITS_PER_PIXEL,
        pitch: dumb.pitch,
        size: dumb.size,
        handle: dumb.handle,
        fb_id: None,
    })
}

/// Wraps the buffer in a framebuffer object and records its id.
pub fn register_display_surface<D: DrmDevice>(
    device: &D,
    surface: &mut DumbSurface,
) -> Result<u32, DrmError> {
    let cmd = FbCmd {
        width: surface.width,
        height: surface.height,
        pitch: surface.pitch,
        bpp: surface.bpp,
        depth: COLOR_DEPTH,
        handle: surface.handle,
    };
    let fb_id = device.add_fb(&cmd).map_err(DrmError::Registration)?;
    surface.fb_id = Some(fb_id);
    debug!("Registered handle {} as framebuffer {}", surface.handle, fb_id);
    Ok(fb_id)
}

pub fn map_surface<D: DrmDevice>(device: &D, surface: &DumbSurface) -> Result<D::Mapping, DrmError> {
    let offset = device
        .map_dumb(surface.handle)
        .map_err(DrmError::map("DRM_IOCTL_MODE_MAP_DUMB"))?;
    let size = usize::try_from(surface.size).map_err(|_| DrmError::Map {
        request: "mmap",
        errno: Errno::EOVERFLOW,
    })?;
    device
        .mmap(offset, size)
        .map_err(DrmError::map("mmap"))
}

/// Create, register and map in one go. A surface is only handed out once
/// its memory is mapped.
pub fn allocate<D: DrmDevice>(
    device: &D,
    mode: &ModeInfo,
) -> Result<(DumbSurface, D::Mapping), DrmError> {
    let mut surface = create_surface(device, mode)?;
    register_display_surface(device, &mut surface)?;
    let memory = map_surface(device, &surface)?;
    info!(
        "Surface {}x{} ready: fb {:?}, {} bytes mapped",
        surface.width, surface.height, surface.fb_id, surface.size
    );
    Ok((surface, memory))
}
