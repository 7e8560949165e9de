//! drm-scribble library crate.
//!
//! Takes over a DRM card, gives every connected output a mapped dumb
//! buffer, sets the mode and scribbles a random walk into video memory.

/// Random-walk pixel animation over mapped surfaces.
pub mod animator;
/// Configuration management.
pub mod config;
/// Connector probing and usability checks.
pub mod connector;
/// The end-to-end session sequence.
pub mod display_session;
/// Device boundary: trait, ioctl bindings and error types.
pub mod drm;
/// CRTC binding and mode setting.
pub mod modeset;
/// Two-phase resource discovery.
pub mod resources;
/// Device handle and master privilege.
pub mod session;
/// Dumb buffer allocation, registration and mapping.
pub mod surface;

pub use display_session::{run_display_session, SessionReport};
pub use drm::DrmError;
