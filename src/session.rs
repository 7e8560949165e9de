// src/session.rs

//! Device Session: the open device handle and the master privilege held on
//! it.
//!
//! `release` is the single teardown routine. It is idempotent, never fails,
//! and also runs from `Drop`, so a session that unwinds still gives master
//! back and closes the handle.

use crate::drm::{Card, DrmDevice, DrmError};
use log::{error, info, trace, warn};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    None,
    Exclusive,
}

pub struct Session<D: DrmDevice> {
    device: Option<D>,
    privilege: Privilege,
}

impl Session<Card> {
    /// Opens the device node. Nothing is acquired yet, so a failure here
    /// needs no teardown.
    pub fn open(path: &Path) -> Result<Self, DrmError> {
        let card = Card::open(path).map_err(|source| DrmError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Opened DRM device {}", card.path().display());
        Ok(Self::with_device(card))
    }
}

impl<D: DrmDevice> Session<D> {
    pub fn with_device(device: D) -> Self {
        Self {
            device: Some(device),
            privilege: Privilege::None,
        }
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub fn device(&self) -> Result<&D, DrmError> {
        self.device.as_ref().ok_or(DrmError::SessionClosed)
    }

    /// Becomes DRM master and verifies it took. Tears the session down
    /// before returning any error.
    pub fn acquire_master(&mut self) -> Result<(), DrmError> {
        let set = self.device()?.set_master();
        if let Err(errno) = set {
            error!("DRM_IOCTL_SET_MASTER failed: {}", errno);
            self.release();
            return Err(DrmError::Privilege(errno));
        }
        self.privilege = Privilege::Exclusive;

        if !self.device()?.is_master() {
            error!("Master permission not granted after DRM_IOCTL_SET_MASTER");
            self.release();
            return Err(DrmError::NotMaster);
        }
        info!("Acquired DRM master");
        Ok(())
    }

    /// Drops master if held, then closes the device. Safe to call again.
    pub fn release(&mut self) {
        let Some(device) = self.device.take() else {
            trace!("Session already released");
            return;
        };
        if self.privilege == Privilege::Exclusive {
            match device.drop_master() {
                Ok(()) => trace!("Dropped DRM master"),
                Err(errno) => warn!("DRM_IOCTL_DROP_MASTER failed: {}", errno),
            }
            self.privilege = Privilege::None;
        }
        drop(device);
        info!("Device session released");
    }
}

impl<D: DrmDevice> Drop for Session<D> {
    fn drop(&mut self) {
        self.release();
    }
}
