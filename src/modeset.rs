// src/modeset.rs

//! Mode Setter: routes a connector's encoder to a CRTC and points that CRTC
//! at a new framebuffer.
//!
//! SETCRTC replaces whatever configuration the CRTC had. Any other client
//! driving it loses its output; nothing is saved or restored.

use crate::connector::Connector;
use crate::drm::{CrtcConfig, DrmDevice, DrmError, ModeInfo};
use crate::surface::DumbSurface;
use log::{debug, info};
use nix::errno::Errno;

/// Resolves the CRTC behind the connector's current encoder.
///
/// An encoder that is not driving anything reports CRTC 0; in that case the
/// first CRTC in its `possible_crtcs` mask that is not in `taken` is used.
pub fn bind_encoder<D: DrmDevice>(
    device: &D,
    connector: &Connector,
    crtc_ids: &[u32],
    taken: &[u32],
) -> Result<u32, DrmError> {
    let encoder = device
        .get_encoder(connector.encoder_id)
        .map_err(DrmError::modeset("DRM_IOCTL_MODE_GETENCODER"))?;
    if encoder.crtc_id != 0 {
        debug!(
            "encoder {} drives crtc {}",
            encoder.encoder_id, encoder.crtc_id
        );
        return Ok(encoder.crtc_id);
    }

    crtc_ids
        .iter()
        .take(32)
        .enumerate()
        .filter(|(index, _)| encoder.possible_crtcs & (1 << index) != 0)
        .map(|(_, &crtc_id)| crtc_id)
        .find(|crtc_id| !taken.contains(crtc_id))
        .inspect(|crtc_id| {
            debug!(
                "encoder {} idle, picked crtc {} from mask {:#b}",
                encoder.encoder_id, crtc_id, encoder.possible_crtcs
            )
        })
        .ok_or(DrmError::NoCrtc {
            encoder_id: encoder.encoder_id,
        })
}

/// Scans `surface` out on `crtc_id` with `mode`, attached to exactly one
/// connector.
pub fn activate<D: DrmDevice>(
    device: &D,
    crtc_id: u32,
    surface: &DumbSurface,
    mode: &ModeInfo,
    connector_id: u32,
) -> Result<(), DrmError> {
    let fb_id = surface.fb_id.ok_or(DrmError::Modeset {
        request: "DRM_IOCTL_MODE_SETCRTC",
        errno: Errno::EINVAL,
    })?;
    let current = device
        .get_crtc(crtc_id)
        .map_err(DrmError::modeset("DRM_IOCTL_MODE_GETCRTC"))?;
    debug!(
        "crtc {} was fb {} mode {:?}",
        crtc_id, current.fb_id, current.mode
    );

    let config = CrtcConfig {
        crtc_id,
        fb_id,
        x: current.x,
        y: current.y,
        connectors: vec![connector_id],
        mode: Some(*mode),
    };
    device
        .set_crtc(&config)
        .map_err(DrmError::modeset("DRM_IOCTL_MODE_SETCRTC"))?;
    info!(
        "crtc {}: connector {} now showing fb {} at {} ({}Hz)",
        crtc_id,
        connector_id,
        fb_id,
        mode.name(),
        mode.vrefresh()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ConnectorProber;
    use crate::drm::mock::{Call, MockConnector, MockDevice, MockEncoder, Request};
    use crate::surface;
    use test_log::test;

    #[test]
    fn bind_uses_the_encoders_current_crtc() {
        let (device, _state) =
            MockDevice::with_connectors(vec![MockConnector::connected(41, 51, 800, 600)]);
        let conn = ConnectorProber::new(20).probe(&device, 41).unwrap();
        assert_eq!(bind_encoder(&device, &conn, &[31, 32], &[]).unwrap(), 31);
    }

    #[test]
    fn idle_encoder_gets_first_free_possible_crtc() {
        let (device, state) =
            MockDevice::with_connectors(vec![MockConnector::connected(41, 51, 800, 600)]);
        state.borrow_mut().encoders[0] = MockEncoder {
            id: 51,
            crtc_id: 0,
            possible_crtcs: 0b110,
        };
        let conn = ConnectorProber::new(20).probe(&device, 41).unwrap();

        assert_eq!(bind_encoder(&device, &conn, &[30, 31, 32], &[]).unwrap(), 31);
        assert_eq!(bind_encoder(&device, &conn, &[30, 31, 32], &[31]).unwrap(), 32);
        assert!(matches!(
            bind_encoder(&device, &conn, &[30, 31, 32], &[31, 32]),
            Err(DrmError::NoCrtc { encoder_id: 51 })
        ));
    }

    #[test]
    fn activate_sets_one_connector_with_the_new_framebuffer() {
        let (device, state) =
            MockDevice::with_connectors(vec![MockConnector::connected(41, 51, 1920, 1080)]);
        let mode = ModeInfo::with_size(1920, 1080, 60);
        let (surface, _memory) = surface::allocate(&device, &mode).unwrap();

        activate(&device, 31, &surface, &mode, 41).unwrap();

        let s = state.borrow();
        let tail = &s.calls[s.calls.len() - 2..];
        assert_eq!(
            tail,
            &[
                Call::GetCrtc(31),
                Call::SetCrtc {
                    crtc_id: 31,
                    fb_id: surface.fb_id.unwrap(),
                    connectors: vec![41],
                    size: Some((1920, 1080)),
                },
            ]
        );
    }

    #[test]
    fn modeset_failures_name_the_request() {
        for (request, name) in [
            (Request::GetCrtc, "DRM_IOCTL_MODE_GETCRTC"),
            (Request::SetCrtc, "DRM_IOCTL_MODE_SETCRTC"),
        ] {
            let (device, state) =
                MockDevice::with_connectors(vec![MockConnector::connected(41, 51, 800, 600)]);
            let mode = ModeInfo::with_size(800, 600, 60);
            let (surface, _memory) = surface::allocate(&device, &mode).unwrap();
            state
                .borrow_mut()
                .failures
                .insert(request, (0, Errno::EPERM));

            match activate(&device, 31, &surface, &mode, 41) {
                Err(DrmError::Modeset {
                    request: got,
                    errno: Errno::EPERM,
                }) => assert_eq!(got, name),
                other => panic!("{:?}: {:?}", request, other),
            }
        }
    }

    #[test]
    fn unregistered_surface_is_rejected_before_touching_the_crtc() {
        let (device, state) =
            MockDevice::with_connectors(vec![MockConnector::connected(41, 51, 800, 600)]);
        let mode = ModeInfo::with_size(800, 600, 60);
        let surface = surface::create_surface(&device, &mode).unwrap();

        assert!(activate(&device, 31, &surface, &mode, 41).is_err());
        assert_eq!(state.borrow().count(|c| matches!(c, Call::GetCrtc(_))), 0);
    }
}
