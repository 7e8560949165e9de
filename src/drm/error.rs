// src/drm/error.rs

use nix::errno::Errno;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a display session can fail. Each variant names the device
/// request that failed; the errno is included in the message.
#[derive(Debug, Error)]
pub enum DrmError {
    #[error("unable to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("DRM_IOCTL_SET_MASTER failed: {0}")]
    Privilege(Errno),
    #[error("master permission check failed after DRM_IOCTL_SET_MASTER")]
    NotMaster,
    #[error("{request} failed: {errno}")]
    ResourceQuery {
        request: &'static str,
        errno: Errno,
    },
    #[error("device reported {count} {kind}, capacity is {capacity}")]
    CapacityExceeded {
        kind: &'static str,
        count: usize,
        capacity: usize,
    },
    #[error("{kind} grew from {expected} to {reported} between count and fetch")]
    ResourcesChanged {
        kind: &'static str,
        expected: usize,
        reported: usize,
    },
    #[error("DRM_IOCTL_MODE_CREATE_DUMB failed: {0}")]
    Allocation(Errno),
    #[error("DRM_IOCTL_MODE_ADDFB failed: {0}")]
    Registration(Errno),
    #[error("{request} failed: {errno}")]
    Map {
        request: &'static str,
        errno: Errno,
    },
    #[error("{request} failed: {errno}")]
    Modeset {
        request: &'static str,
        errno: Errno,
    },
    #[error("encoder {encoder_id} has no usable CRTC")]
    NoCrtc { encoder_id: u32 },
    #[error("device session already released")]
    SessionClosed,
}

impl DrmError {
    pub(crate) fn resource_query(request: &'static str) -> impl FnOnce(Errno) -> Self {
        move |errno| DrmError::ResourceQuery { request, errno }
    }

    pub(crate) fn map(request: &'static str) -> impl FnOnce(Errno) -> Self {
        move |errno| DrmError::Map { request, errno }
    }

    pub(crate) fn modeset(request: &'static str) -> impl FnOnce(Errno) -> Self {
        move |errno| DrmError::Modeset { request, errno }
    }
}
