// src/resources.rs

//! Resource Directory: discovers the card's framebuffer, CRTC, connector and
//! encoder ids.
//!
//! DRM list queries are answered in two round trips. The first carries empty
//! buffers and only learns how many entries each list has; the second carries
//! buffers of those sizes and gets them filled. The device reports its
//! current counts again on the second trip, and they can have grown in
//! between (hotplug). `query_then_fetch` implements that sequence once for
//! every `TwoPhaseQuery`, so the connector prober reuses it.

use crate::drm::{DrmDevice, DrmError, ResourceBuffers, ResourceCounts};
use log::{debug, trace};
use nix::errno::Errno;
use std::fmt;

/// A device request that follows the count-then-fill protocol.
pub trait TwoPhaseQuery {
    type Counts: Copy + fmt::Debug;
    type Buffers: Default;
    type Reply;
    type Output;

    /// Request name used in diagnostics.
    const REQUEST: &'static str;

    fn issue<D: DrmDevice>(
        &self,
        device: &D,
        buffers: &mut Self::Buffers,
    ) -> Result<(Self::Counts, Self::Reply), Errno>;

    /// `(list name, length)` for every list the request fills.
    fn lists(counts: &Self::Counts) -> Vec<(&'static str, usize)>;

    /// Buffers with exactly `counts` entries per list.
    fn allocate(counts: &Self::Counts) -> Self::Buffers;

    /// Builds the result from the filled buffers, trimmed to `counts`.
    fn finish(
        &self,
        buffers: Self::Buffers,
        counts: &Self::Counts,
        reply: Self::Reply,
    ) -> Self::Output;
}

/// Phase one: count-only query.
pub fn query_counts<Q: TwoPhaseQuery, D: DrmDevice>(
    device: &D,
    query: &Q,
) -> Result<Q::Counts, DrmError> {
    let mut empty = Q::Buffers::default();
    let (counts, _) = query
        .issue(device, &mut empty)
        .map_err(DrmError::resource_query(Q::REQUEST))?;
    trace!("{} counts: {:?}", Q::REQUEST, counts);
    Ok(counts)
}

/// Phase two: fill buffers sized to `counts`. No list may exceed `capacity`,
/// and no list may have grown since `counts` was taken.
pub fn fetch<Q: TwoPhaseQuery, D: DrmDevice>(
    device: &D,
    query: &Q,
    counts: &Q::Counts,
    capacity: usize,
) -> Result<Q::Output, DrmError> {
    for (kind, count) in Q::lists(counts) {
        if count > capacity {
            return Err(DrmError::CapacityExceeded {
                kind,
                count,
                capacity,
            });
        }
    }

    let mut buffers = Q::allocate(counts);
    let (reported, reply) = query
        .issue(device, &mut buffers)
        .map_err(DrmError::resource_query(Q::REQUEST))?;

    for ((kind, expected), (_, now)) in Q::lists(counts).into_iter().zip(Q::lists(&reported)) {
        if now > expected {
            return Err(DrmError::ResourcesChanged {
                kind,
                expected,
                reported: now,
            });
        }
    }
    Ok(query.finish(buffers, &reported, reply))
}

pub fn query_then_fetch<Q: TwoPhaseQuery, D: DrmDevice>(
    device: &D,
    query: &Q,
    capacity: usize,
) -> Result<Q::Output, DrmError> {
    let counts = query_counts(device, query)?;
    fetch(device, query, &counts, capacity)
}

/// Identifier lists of every mode-setting object on the card.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResourceSet {
    pub fb_ids: Vec<u32>,
    pub crtc_ids: Vec<u32>,
    pub connector_ids: Vec<u32>,
    pub encoder_ids: Vec<u32>,
}

struct CardResources;

impl TwoPhaseQuery for CardResources {
    type Counts = ResourceCounts;
    type Buffers = ResourceBuffers;
    type Reply = ();
    type Output = ResourceSet;

    const REQUEST: &'static str = "DRM_IOCTL_MODE_GETRESOURCES";

    fn issue<D: DrmDevice>(
        &self,
        device: &D,
        buffers: &mut ResourceBuffers,
    ) -> Result<(ResourceCounts, ()), Errno> {
        device.get_resources(buffers).map(|counts| (counts, ()))
    }

    fn lists(counts: &ResourceCounts) -> Vec<(&'static str, usize)> {
        vec![
            ("framebuffers", counts.fbs),
            ("crtcs", counts.crtcs),
            ("connectors", counts.connectors),
            ("encoders", counts.encoders),
        ]
    }

    fn allocate(counts: &ResourceCounts) -> ResourceBuffers {
        ResourceBuffers {
            fbs: vec![0; counts.fbs],
            crtcs: vec![0; counts.crtcs],
            connectors: vec![0; counts.connectors],
            encoders: vec![0; counts.encoders],
        }
    }

    fn finish(&self, mut buffers: ResourceBuffers, counts: &ResourceCounts, _: ()) -> ResourceSet {
        buffers.fbs.truncate(counts.fbs);
        buffers.crtcs.truncate(counts.crtcs);
        buffers.connectors.truncate(counts.connectors);
        buffers.encoders.truncate(counts.encoders);
        ResourceSet {
            fb_ids: buffers.fbs,
            crtc_ids: buffers.crtcs,
            connector_ids: buffers.connectors,
            encoder_ids: buffers.encoders,
        }
    }
}

/// Card-wide resource discovery with a per-list capacity limit.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDirectory {
    capacity: usize,
}

impl ResourceDirectory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn query_counts<D: DrmDevice>(&self, device: &D) -> Result<ResourceCounts, DrmError> {
        query_counts(device, &CardResources)
    }

    pub fn fetch_identifiers<D: DrmDevice>(
        &self,
        device: &D,
        counts: &ResourceCounts,
    ) -> Result<ResourceSet, DrmError> {
        fetch(device, &CardResources, counts, self.capacity)
    }

    pub fn discover<D: DrmDevice>(&self, device: &D) -> Result<ResourceSet, DrmError> {
        let counts = self.query_counts(device)?;
        let set = self.fetch_identifiers(device, &counts)?;
        debug!(
            "fb: {}, crtc: {}, conn: {}, enc: {}",
            set.fb_ids.len(),
            set.crtc_ids.len(),
            set.connector_ids.len(),
            set.encoder_ids.len()
        );
        Ok(set)
    }
}
