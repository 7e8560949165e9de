// src/drm/card.rs

//! `DrmDevice` over a real `/dev/dri/cardN` node, using the raw ioctls in
//! `drm::sys` and `nix::sys::mman` for the dumb-buffer mapping.

use crate::drm::{
    sys, ConnectorBuffers, ConnectorCounts, ConnectorReply, Connection, CrtcConfig, CrtcState,
    DrmDevice, DumbBuffer, EncoderInfo, FbCmd, ModeInfo, PixelMemory, ResourceBuffers,
    ResourceCounts,
};
use log::{debug, trace, warn};
use nix::errno::Errno;
use nix::sys::mman::{self, MapFlags, ProtFlags};
use std::ffi::c_void;
use std::fs::{File, OpenOptions};
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Kernel address of a destination buffer, or 0 for a count-only query.
fn user_ptr<T>(buf: &mut [T]) -> u64 {
    if buf.is_empty() {
        0
    } else {
        buf.as_mut_ptr() as u64
    }
}

#[derive(Debug)]
pub struct Card {
    file: File,
    path: PathBuf,
}

impl Card {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)?;
        debug!("Opened DRM device {} (fd {})", path.display(), file.as_raw_fd());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl Drop for Card {
    fn drop(&mut self) {
        trace!("Closing DRM device {} (fd {})", self.path.display(), self.fd());
    }
}

impl DrmDevice for Card {
    type Mapping = MappedRegion;

    fn set_master(&self) -> Result<(), Errno> {
        unsafe { sys::set_master(self.fd()) }?;
        Ok(())
    }

    fn drop_master(&self) -> Result<(), Errno> {
        unsafe { sys::drop_master(self.fd()) }?;
        Ok(())
    }

    // Authenticating magic 0 needs master and is never valid, so only a
    // non-master caller gets EACCES back.
    fn is_master(&self) -> bool {
        let auth = sys::drm_auth { magic: 0 };
        !matches!(unsafe { sys::auth_magic(self.fd(), &auth) }, Err(Errno::EACCES))
    }

    fn get_resources(&self, buffers: &mut ResourceBuffers) -> Result<ResourceCounts, Errno> {
        let mut res = sys::drm_mode_card_res {
            fb_id_ptr: user_ptr(&mut buffers.fbs),
            crtc_id_ptr: user_ptr(&mut buffers.crtcs),
            connector_id_ptr: user_ptr(&mut buffers.connectors),
            encoder_id_ptr: user_ptr(&mut buffers.encoders),
            count_fbs: buffers.fbs.len() as u32,
            count_crtcs: buffers.crtcs.len() as u32,
            count_connectors: buffers.connectors.len() as u32,
            count_encoders: buffers.encoders.len() as u32,
            ..Default::default()
        };
        unsafe { sys::mode_get_resources(self.fd(), &mut res) }?;
        trace!(
            "GETRESOURCES: fbs={} crtcs={} connectors={} encoders={} ({}x{}..{}x{})",
            res.count_fbs,
            res.count_crtcs,
            res.count_connectors,
            res.count_encoders,
            res.min_width,
            res.min_height,
            res.max_width,
            res.max_height
        );
        Ok(ResourceCounts {
            fbs: res.count_fbs as usize,
            crtcs: res.count_crtcs as usize,
            connectors: res.count_connectors as usize,
            encoders: res.count_encoders as usize,
        })
    }

    fn get_connector(
        &self,
        connector_id: u32,
        buffers: &mut ConnectorBuffers,
    ) -> Result<ConnectorReply, Errno> {
        // The kernel fills props and prop_values pairwise from one count.
        let props = buffers.props.len().min(buffers.prop_values.len());
        let mut conn = sys::drm_mode_get_connector {
            encoders_ptr: user_ptr(&mut buffers.encoders),
            modes_ptr: user_ptr(&mut buffers.modes),
            props_ptr: user_ptr(&mut buffers.props),
            prop_values_ptr: user_ptr(&mut buffers.prop_values),
            count_modes: buffers.modes.len() as u32,
            count_props: props as u32,
            count_encoders: buffers.encoders.len() as u32,
            connector_id,
            ..Default::default()
        };
        unsafe { sys::mode_get_connector(self.fd(), &mut conn) }?;
        trace!(
            "GETCONNECTOR {}: connection={} modes={} props={} encoders={} encoder_id={}",
            connector_id,
            conn.connection,
            conn.count_modes,
            conn.count_props,
            conn.count_encoders,
            conn.encoder_id
        );
        Ok(ConnectorReply {
            counts: ConnectorCounts {
                modes: conn.count_modes as usize,
                props: conn.count_props as usize,
                encoders: conn.count_encoders as usize,
            },
            encoder_id: conn.encoder_id,
            connector_type: conn.connector_type,
            connector_type_id: conn.connector_type_id,
            connection: Connection::from_raw(conn.connection),
            mm_width: conn.mm_width,
            mm_height: conn.mm_height,
        })
    }

    fn get_encoder(&self, encoder_id: u32) -> Result<EncoderInfo, Errno> {
        let mut enc = sys::drm_mode_get_encoder {
            encoder_id,
            ..Default::default()
        };
        unsafe { sys::mode_get_encoder(self.fd(), &mut enc) }?;
        Ok(EncoderInfo {
            encoder_id: enc.encoder_id,
            encoder_type: enc.encoder_type,
            crtc_id: enc.crtc_id,
            possible_crtcs: enc.possible_crtcs,
            possible_clones: enc.possible_clones,
        })
    }

    fn get_crtc(&self, crtc_id: u32) -> Result<CrtcState, Errno> {
        let mut crtc = sys::drm_mode_crtc {
            crtc_id,
            ..Default::default()
        };
        unsafe { sys::mode_get_crtc(self.fd(), &mut crtc) }?;
        Ok(CrtcState {
            crtc_id: crtc.crtc_id,
            fb_id: crtc.fb_id,
            x: crtc.x,
            y: crtc.y,
            gamma_size: crtc.gamma_size,
            mode: (crtc.mode_valid != 0).then(|| ModeInfo::from_raw(crtc.mode)),
        })
    }

    fn set_crtc(&self, config: &CrtcConfig) -> Result<(), Errno> {
        let mut crtc = sys::drm_mode_crtc {
            set_connectors_ptr: if config.connectors.is_empty() {
                0
            } else {
                config.connectors.as_ptr() as u64
            },
            count_connectors: config.connectors.len() as u32,
            crtc_id: config.crtc_id,
            fb_id: config.fb_id,
            x: config.x,
            y: config.y,
            mode_valid: config.mode.is_some() as u32,
            mode: config.mode.map(|m| *m.raw()).unwrap_or_default(),
            ..Default::default()
        };
        unsafe { sys::mode_set_crtc(self.fd(), &mut crtc) }?;
        Ok(())
    }

    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> Result<DumbBuffer, Errno> {
        let mut create = sys::drm_mode_create_dumb {
            width,
            height,
            bpp,
            ..Default::default()
        };
        unsafe { sys::mode_create_dumb(self.fd(), &mut create) }?;
        Ok(DumbBuffer {
            handle: create.handle,
            pitch: create.pitch,
            size: create.size,
        })
    }

    fn add_fb(&self, cmd: &FbCmd) -> Result<u32, Errno> {
        let mut fb = sys::drm_mode_fb_cmd {
            fb_id: 0,
            width: cmd.width,
            height: cmd.height,
            pitch: cmd.pitch,
            bpp: cmd.bpp,
            depth: cmd.depth,
            handle: cmd.handle,
        };
        unsafe { sys::mode_add_fb(self.fd(), &mut fb) }?;
        Ok(fb.fb_id)
    }

    fn map_dumb(&self, handle: u32) -> Result<u64, Errno> {
        let mut map = sys::drm_mode_map_dumb {
            handle,
            ..Default::default()
        };
        unsafe { sys::mode_map_dumb(self.fd(), &mut map) }?;
        Ok(map.offset)
    }

    fn mmap(&self, offset: u64, size: usize) -> Result<MappedRegion, Errno> {
        let len = NonZeroUsize::new(size).ok_or(Errno::EINVAL)?;
        let offset = libc::off_t::try_from(offset).map_err(|_| Errno::EOVERFLOW)?;
        let ptr = unsafe {
            mman::mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &self.file,
                offset,
            )
        }?;
        trace!("Mapped {} bytes at {:p} (offset {:#x})", size, ptr, offset);
        Ok(MappedRegion { ptr, len: size })
    }
}

/// A shared read/write mapping of a dumb buffer. Unmapped on drop.
#[derive(Debug)]
pub struct MappedRegion {
    ptr: NonNull<c_void>,
    len: usize,
}

impl PixelMemory for MappedRegion {
    fn words(&self) -> &[u32] {
        // SAFETY: the mapping is page aligned and lives as long as self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr() as *const u32, self.len / 4) }
    }

    fn words_mut(&mut self) -> &mut [u32] {
        // SAFETY: as above; &mut self makes this the only view.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut u32, self.len / 4) }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if let Err(e) = unsafe { mman::munmap(self.ptr, self.len) } {
            warn!("munmap of {} bytes at {:p} failed: {}", self.len, self.ptr, e);
        }
    }
}
