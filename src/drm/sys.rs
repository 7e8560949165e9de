// src/drm/sys.rs

//! Raw DRM uAPI: `#[repr(C)]` mirrors of the kernel's `drm_mode.h` request
//! structs and the `nix`-generated ioctl wrappers that operate on them.
//!
//! Nothing here is safe to call directly; `drm::card` owns the only callers.

#![allow(non_camel_case_types)]

use libc::c_char;

pub const DRM_IOCTL_BASE: u8 = b'd';
pub const DRM_DISPLAY_MODE_LEN: usize = 32;

pub const DRM_MODE_CONNECTED: u32 = 1;
pub const DRM_MODE_DISCONNECTED: u32 = 2;
pub const DRM_MODE_UNKNOWNCONNECTION: u32 = 3;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct drm_auth {
    pub magic: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct drm_mode_modeinfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub type_: u32,
    pub name: [c_char; DRM_DISPLAY_MODE_LEN],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_card_res {
    pub fb_id_ptr: u64,
    pub crtc_id_ptr: u64,
    pub connector_id_ptr: u64,
    pub encoder_id_ptr: u64,
    pub count_fbs: u32,
    pub count_crtcs: u32,
    pub count_connectors: u32,
    pub count_encoders: u32,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct drm_mode_crtc {
    pub set_connectors_ptr: u64,
    pub count_connectors: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub x: u32,
    pub y: u32,
    pub gamma_size: u32,
    pub mode_valid: u32,
    pub mode: drm_mode_modeinfo,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_get_encoder {
    pub encoder_id: u32,
    pub encoder_type: u32,
    pub crtc_id: u32,
    pub possible_crtcs: u32,
    pub possible_clones: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_get_connector {
    pub encoders_ptr: u64,
    pub modes_ptr: u64,
    pub props_ptr: u64,
    pub prop_values_ptr: u64,
    pub count_modes: u32,
    pub count_props: u32,
    pub count_encoders: u32,
    pub encoder_id: u32,
    pub connector_id: u32,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub connection: u32,
    pub mm_width: u32,
    pub mm_height: u32,
    pub subpixel: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_fb_cmd {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub bpp: u32,
    pub depth: u32,
    pub handle: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_create_dumb {
    pub height: u32,
    pub width: u32,
    pub bpp: u32,
    pub flags: u32,
    pub handle: u32,
    pub pitch: u32,
    pub size: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_map_dumb {
    pub handle: u32,
    pub pad: u32,
    pub offset: u64,
}

impl Default for drm_mode_modeinfo {
    fn default() -> Self {
        // SAFETY: plain-old-data, all-zero is the kernel's "no mode".
        unsafe { std::mem::zeroed() }
    }
}

impl Default for drm_mode_crtc {
    fn default() -> Self {
        Self {
            set_connectors_ptr: 0,
            count_connectors: 0,
            crtc_id: 0,
            fb_id: 0,
            x: 0,
            y: 0,
            gamma_size: 0,
            mode_valid: 0,
            mode: drm_mode_modeinfo::default(),
        }
    }
}

nix::ioctl_none!(set_master, DRM_IOCTL_BASE, 0x1e);
nix::ioctl_none!(drop_master, DRM_IOCTL_BASE, 0x1f);
nix::ioctl_write_ptr!(auth_magic, DRM_IOCTL_BASE, 0x11, drm_auth);
nix::ioctl_readwrite!(mode_get_resources, DRM_IOCTL_BASE, 0xa0, drm_mode_card_res);
nix::ioctl_readwrite!(mode_get_crtc, DRM_IOCTL_BASE, 0xa1, drm_mode_crtc);
nix::ioctl_readwrite!(mode_set_crtc, DRM_IOCTL_BASE, 0xa2, drm_mode_crtc);
nix::ioctl_readwrite!(mode_get_encoder, DRM_IOCTL_BASE, 0xa6, drm_mode_get_encoder);
nix::ioctl_readwrite!(mode_get_connector, DRM_IOCTL_BASE, 0xa7, drm_mode_get_connector);
nix::ioctl_readwrite!(mode_add_fb, DRM_IOCTL_BASE, 0xae, drm_mode_fb_cmd);
nix::ioctl_readwrite!(mode_create_dumb, DRM_IOCTL_BASE, 0xb2, drm_mode_create_dumb);
nix::ioctl_readwrite!(mode_map_dumb, DRM_IOCTL_BASE, 0xb3, drm_mode_map_dumb);
