// src/display_session.rs

//! Runs one complete display session: take the device, light up every
//! connected output with its own surface, animate, give everything back.

use crate::animator::{AnimationReport, Animator};
use crate::config::{Config, ConnectorErrorPolicy};
use crate::connector::{check_usable, ConnectorProber};
use crate::drm::{DrmDevice, DrmError};
use crate::modeset;
use crate::resources::ResourceDirectory;
use crate::session::Session;
use crate::surface::{self, Output};
use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSummary {
    pub connector_id: u32,
    pub crtc_id: u32,
    pub fb_id: Option<u32>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub outputs: Vec<OutputSummary>,
    /// Connectors that were not usable (disconnected, no modes, ...).
    pub skipped_connectors: Vec<u32>,
    /// Connectors whose setup failed under `ConnectorErrorPolicy::Skip`.
    pub failed_connectors: Vec<u32>,
    pub animation: AnimationReport,
}

/// Opens the configured device and runs the session on it.
pub fn run_display_session(config: &Config) -> Result<SessionReport, DrmError> {
    let session = Session::open(&config.device.path)?;
    run_with_session(session, config)
}

/// Runs the session on an already open device. The session is released
/// before this returns, whatever the outcome.
pub fn run_with_session<D: DrmDevice>(
    mut session: Session<D>,
    config: &Config,
) -> Result<SessionReport, DrmError> {
    let result = drive(&mut session, config);
    if let Err(e) = &result {
        error!("Display session failed: {}", e);
    }
    session.release();
    result
}

fn drive<D: DrmDevice>(
    session: &mut Session<D>,
    config: &Config,
) -> Result<SessionReport, DrmError> {
    session.acquire_master()?;
    let device = session.device()?;

    let resources = ResourceDirectory::new(config.limits.max_resource_ids).discover(device)?;
    let prober = ConnectorProber::new(config.limits.max_connector_entries);

    let mut report = SessionReport::default();
    let mut outputs: Vec<Output<D::Mapping>> = Vec::new();

    for &connector_id in &resources.connector_ids {
        let taken: Vec<u32> = outputs.iter().map(|o| o.crtc_id).collect();
        match setup_connector(device, &prober, connector_id, &resources.crtc_ids, &taken) {
            Ok(Some(output)) => outputs.push(output),
            Ok(None) => report.skipped_connectors.push(connector_id),
            Err(e) => match config.on_connector_error {
                ConnectorErrorPolicy::Abort => {
                    error!(
                        "Connector {}: {}; aborting with {} output(s) already set up",
                        connector_id,
                        e,
                        outputs.len()
                    );
                    return Err(e);
                }
                ConnectorErrorPolicy::Skip => {
                    warn!("Connector {}: {}; skipping it", connector_id, e);
                    report.failed_connectors.push(connector_id);
                }
            },
        }
    }

    info!(
        "{} of {} connector(s) active",
        outputs.len(),
        resources.connector_ids.len()
    );
    report.animation = Animator::new(&config.animation).run(&mut outputs);
    report.outputs = outputs
        .iter()
        .map(|o| OutputSummary {
            connector_id: o.connector_id,
            crtc_id: o.crtc_id,
            fb_id: o.surface.fb_id,
            width: o.surface.width,
            height: o.surface.height,
        })
        .collect();
    Ok(report)
}

/// Probes one connector and, if it is usable, gives it a mapped surface
/// and a CRTC. `Ok(None)` means the connector was skipped.
fn setup_connector<D: DrmDevice>(
    device: &D,
    prober: &ConnectorProber,
    connector_id: u32,
    crtc_ids: &[u32],
    taken: &[u32],
) -> Result<Option<Output<D::Mapping>>, DrmError> {
    let connector = prober.probe(device, connector_id)?;
    if let Err(reason) = check_usable(&connector) {
        info!(
            "Connector {} ({}) not connected: {}",
            connector.id,
            connector.name(),
            reason
        );
        return Ok(None);
    }
    let Some(&mode) = connector.selected_mode() else {
        return Ok(None);
    };

    let (surface, memory) = surface::allocate(device, &mode)?;
    info!(
        "Connector {} ({}): {} mode(s), {} prop(s), {} encoder(s), using {}x{}",
        connector.id,
        connector.name(),
        connector.modes.len(),
        connector.prop_ids.len(),
        connector.encoder_ids.len(),
        mode.width(),
        mode.height()
    );

    let crtc_id = modeset::bind_encoder(device, &connector, crtc_ids, taken)?;
    modeset::activate(device, crtc_id, &surface, &mode, connector.id)?;

    Ok(Some(Output {
        connector_id: connector.id,
        crtc_id,
        mode,
        surface,
        memory,
    }))
}
