// src/drm/mock.rs

//! In-memory `DrmDevice` that records every request it receives.
//!
//! State lives behind an `Rc<RefCell<..>>` so a test can keep a handle to it
//! after the device itself has been moved into (and dropped by) a session.

use crate::drm::{
    ConnectorBuffers, ConnectorCounts, ConnectorReply, Connection, CrtcConfig, CrtcState,
    DrmDevice, DumbBuffer, EncoderInfo, FbCmd, ModeInfo, PixelMemory, ResourceBuffers,
    ResourceCounts,
};
use nix::errno::Errno;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    SetMaster,
    DropMaster,
    AuthMagic,
    GetResources,
    GetConnector,
    GetEncoder,
    GetCrtc,
    SetCrtc,
    CreateDumb,
    AddFb,
    MapDumb,
    Mmap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetMaster,
    DropMaster,
    AuthMagic,
    GetResources { capacity: ResourceCounts },
    GetConnector { connector_id: u32, capacity: ConnectorCounts },
    GetEncoder(u32),
    GetCrtc(u32),
    SetCrtc {
        crtc_id: u32,
        fb_id: u32,
        connectors: Vec<u32>,
        size: Option<(u32, u32)>,
    },
    CreateDumb { width: u32, height: u32, bpp: u32 },
    AddFb(FbCmd),
    MapDumb(u32),
    Mmap { offset: u64, size: usize },
    Close,
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    pub id: u32,
    pub connection: Connection,
    pub modes: Vec<ModeInfo>,
    pub encoders: Vec<u32>,
    pub encoder_id: u32,
    pub props: Vec<(u32, u64)>,
}

impl MockConnector {
    /// A connected connector with a single mode driven by `encoder_id`.
    pub fn connected(id: u32, encoder_id: u32, width: u16, height: u16) -> Self {
        Self {
            id,
            connection: Connection::Connected,
            modes: vec![ModeInfo::with_size(width, height, 60)],
            encoders: vec![encoder_id],
            encoder_id,
            props: vec![(1, 0), (2, 3)],
        }
    }

    pub fn disconnected(id: u32) -> Self {
        Self {
            id,
            connection: Connection::Disconnected,
            modes: Vec::new(),
            encoders: Vec::new(),
            encoder_id: 0,
            props: vec![(1, 0)],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MockEncoder {
    pub id: u32,
    pub crtc_id: u32,
    pub possible_crtcs: u32,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub fbs: Vec<u32>,
    pub crtcs: Vec<u32>,
    pub connectors: Vec<MockConnector>,
    pub encoders: Vec<MockEncoder>,
    /// Connectors that appear after the first `get_resources` call.
    pub late_connectors: Vec<MockConnector>,
    /// Requests that should fail: request -> (zero-based call index, errno).
    pub failures: HashMap<Request, (usize, Errno)>,
    /// Makes `is_master` report false even after `set_master` succeeded.
    pub deny_master: bool,
    /// Final contents of every mapping, keyed by mmap offset, recorded on unmap.
    pub unmapped: HashMap<u64, Vec<u32>>,
    counters: HashMap<Request, usize>,
    next_handle: u32,
    next_fb: u32,
}

impl MockState {
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn enter(&mut self, request: Request, call: Call) -> Result<(), Errno> {
        self.calls.push(call);
        let n = self.counters.entry(request).or_insert(0);
        let index = *n;
        *n += 1;
        match self.failures.get(&request) {
            Some(&(at, errno)) if at == index => Err(errno),
            _ => Ok(()),
        }
    }
}

pub struct MockDevice {
    state: Rc<RefCell<MockState>>,
}

impl MockDevice {
    pub fn new() -> (Self, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(MockState {
            next_handle: 1,
            next_fb: 100,
            ..Default::default()
        }));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    /// A card with two CRTCs and one encoder per connector, encoder `i`
    /// currently driving CRTC `i % 2`.
    pub fn with_connectors(connectors: Vec<MockConnector>) -> (Self, Rc<RefCell<MockState>>) {
        let (device, state) = Self::new();
        {
            let mut s = state.borrow_mut();
            s.crtcs = vec![31, 32];
            for c in &connectors {
                if c.encoder_id != 0 {
                    let crtc_id = s.crtcs[s.encoders.len() % 2];
                    s.encoders.push(MockEncoder {
                        id: c.encoder_id,
                        crtc_id,
                        possible_crtcs: 0b11,
                    });
                }
            }
            s.connectors = connectors;
        }
        (device, state)
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push(Call::Close);
    }
}

fn fill<T: Copy>(dst: &mut [T], src: &[T]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = *s;
    }
}

impl DrmDevice for MockDevice {
    type Mapping = MockMapping;

    fn set_master(&self) -> Result<(), Errno> {
        self.state
            .borrow_mut()
            .enter(Request::SetMaster, Call::SetMaster)
    }

    fn drop_master(&self) -> Result<(), Errno> {
        self.state
            .borrow_mut()
            .enter(Request::DropMaster, Call::DropMaster)
    }

    fn is_master(&self) -> bool {
        let mut s = self.state.borrow_mut();
        s.enter(Request::AuthMagic, Call::AuthMagic).is_ok() && !s.deny_master
    }

    fn get_resources(&self, buffers: &mut ResourceBuffers) -> Result<ResourceCounts, Errno> {
        let mut s = self.state.borrow_mut();
        let capacity = ResourceCounts {
            fbs: buffers.fbs.len(),
            crtcs: buffers.crtcs.len(),
            connectors: buffers.connectors.len(),
            encoders: buffers.encoders.len(),
        };
        s.enter(Request::GetResources, Call::GetResources { capacity })?;
        let connector_ids: Vec<u32> = s.connectors.iter().map(|c| c.id).collect();
        let encoder_ids: Vec<u32> = s.encoders.iter().map(|e| e.id).collect();
        fill(&mut buffers.fbs, &s.fbs);
        fill(&mut buffers.crtcs, &s.crtcs);
        fill(&mut buffers.connectors, &connector_ids);
        fill(&mut buffers.encoders, &encoder_ids);
        let counts = ResourceCounts {
            fbs: s.fbs.len(),
            crtcs: s.crtcs.len(),
            connectors: connector_ids.len(),
            encoders: encoder_ids.len(),
        };
        let late = std::mem::take(&mut s.late_connectors);
        s.connectors.extend(late);
        Ok(counts)
    }

    fn get_connector(
        &self,
        connector_id: u32,
        buffers: &mut ConnectorBuffers,
    ) -> Result<ConnectorReply, Errno> {
        let mut s = self.state.borrow_mut();
        let capacity = ConnectorCounts {
            modes: buffers.modes.len(),
            props: buffers.props.len(),
            encoders: buffers.encoders.len(),
        };
        s.enter(
            Request::GetConnector,
            Call::GetConnector {
                connector_id,
                capacity,
            },
        )?;
        let conn = s
            .connectors
            .iter()
            .find(|c| c.id == connector_id)
            .ok_or(Errno::ENOENT)?;
        let prop_ids: Vec<u32> = conn.props.iter().map(|p| p.0).collect();
        let prop_values: Vec<u64> = conn.props.iter().map(|p| p.1).collect();
        fill(&mut buffers.modes, &conn.modes);
        fill(&mut buffers.props, &prop_ids);
        fill(&mut buffers.prop_values, &prop_values);
        fill(&mut buffers.encoders, &conn.encoders);
        Ok(ConnectorReply {
            counts: ConnectorCounts {
                modes: conn.modes.len(),
                props: conn.props.len(),
                encoders: conn.encoders.len(),
            },
            encoder_id: conn.encoder_id,
            connector_type: 11,
            connector_type_id: conn.id,
            connection: conn.connection,
            mm_width: 520,
            mm_height: 290,
        })
    }

    fn get_encoder(&self, encoder_id: u32) -> Result<EncoderInfo, Errno> {
        let mut s = self.state.borrow_mut();
        s.enter(Request::GetEncoder, Call::GetEncoder(encoder_id))?;
        let enc = s
            .encoders
            .iter()
            .find(|e| e.id == encoder_id)
            .ok_or(Errno::ENOENT)?;
        Ok(EncoderInfo {
            encoder_id: enc.id,
            encoder_type: 2,
            crtc_id: enc.crtc_id,
            possible_crtcs: enc.possible_crtcs,
            possible_clones: 0,
        })
    }

    fn get_crtc(&self, crtc_id: u32) -> Result<CrtcState, Errno> {
        let mut s = self.state.borrow_mut();
        s.enter(Request::GetCrtc, Call::GetCrtc(crtc_id))?;
        if !s.crtcs.contains(&crtc_id) {
            return Err(Errno::ENOENT);
        }
        Ok(CrtcState {
            crtc_id,
            gamma_size: 256,
            ..Default::default()
        })
    }

    fn set_crtc(&self, config: &CrtcConfig) -> Result<(), Errno> {
        self.state.borrow_mut().enter(
            Request::SetCrtc,
            Call::SetCrtc {
                crtc_id: config.crtc_id,
                fb_id: config.fb_id,
                connectors: config.connectors.clone(),
                size: config.mode.map(|m| (m.width(), m.height())),
            },
        )
    }

    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> Result<DumbBuffer, Errno> {
        let mut s = self.state.borrow_mut();
        s.enter(Request::CreateDumb, Call::CreateDumb { width, height, bpp })?;
        let handle = s.next_handle;
        s.next_handle += 1;
        let pitch = width * bpp.div_ceil(8);
        Ok(DumbBuffer {
            handle,
            pitch,
            size: pitch as u64 * height as u64,
        })
    }

    fn add_fb(&self, cmd: &FbCmd) -> Result<u32, Errno> {
        let mut s = self.state.borrow_mut();
        s.enter(Request::AddFb, Call::AddFb(*cmd))?;
        let fb = s.next_fb;
        s.next_fb += 1;
        s.fbs.push(fb);
        Ok(fb)
    }

    fn map_dumb(&self, handle: u32) -> Result<u64, Errno> {
        self.state
            .borrow_mut()
            .enter(Request::MapDumb, Call::MapDumb(handle))?;
        Ok(handle as u64 * 0x1000_0000)
    }

    fn mmap(&self, offset: u64, size: usize) -> Result<MockMapping, Errno> {
        self.state
            .borrow_mut()
            .enter(Request::Mmap, Call::Mmap { offset, size })?;
        Ok(MockMapping {
            words: vec![0; size / 4],
            offset,
            sink: Some(self.state.clone()),
        })
    }
}

/// Heap-backed stand-in for a device mapping.
#[derive(Debug)]
pub struct MockMapping {
    words: Vec<u32>,
    offset: u64,
    sink: Option<Rc<RefCell<MockState>>>,
}

impl MockMapping {
    /// A detached mapping of `len` words, for tests that never touch a device.
    pub fn detached(len: usize) -> Self {
        Self {
            words: vec![0; len],
            offset: 0,
            sink: None,
        }
    }
}

impl PixelMemory for MockMapping {
    fn words(&self) -> &[u32] {
        &self.words
    }

    fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }
}

impl Drop for MockMapping {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.borrow_mut()
                .unmapped
                .insert(self.offset, std::mem::take(&mut self.words));
        }
    }
}
