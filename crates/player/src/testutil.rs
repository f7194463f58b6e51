//! Test doubles for the backend seam.
//!
//! `MockBackend` records every lifecycle operation into a shared log so tests
//! can assert on wiring order and teardown discipline; `ScriptedBus` replays
//! a fixed message sequence to the monitoring loop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};

use crate::bus::{BusMessage, PlaybackBus};
use crate::graph::{Backend, ElementId};
use crate::recipe::ElementKind;

/// One recorded backend operation. Link endpoints are raw element indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Create(ElementKind),
    Link(usize, usize),
    DeferLink(usize, usize),
    PadLinkCompleted(usize, usize),
    Start,
    BusTaken,
    Stop,
    BusReleased,
    BackendReleased,
}

pub type OpLog = Arc<Mutex<Vec<Op>>>;

pub struct MockBackend {
    log: OpLog,
    created: usize,
    deferred: Vec<(usize, usize)>,
    messages: VecDeque<BusMessage>,
    bus_taken: bool,
    /// When set, `create` of this kind fails.
    pub fail_create: Option<ElementKind>,
    /// When set, an immediate link between these indices fails.
    pub fail_link: Option<(usize, usize)>,
}

impl MockBackend {
    pub fn new() -> (Self, OpLog) {
        Self::with_messages(vec![])
    }

    /// A mock whose bus will deliver `messages` in order, then close.
    pub fn with_messages(messages: Vec<BusMessage>) -> (Self, OpLog) {
        let log: OpLog = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: log.clone(),
                created: 0,
                deferred: Vec::new(),
                messages: messages.into(),
                bus_taken: false,
                fail_create: None,
                fail_link: None,
            },
            log,
        )
    }

    fn record(&self, op: Op) {
        self.log.lock().unwrap().push(op);
    }
}

impl Backend for MockBackend {
    type Bus = ScriptedBus;

    fn create(&mut self, kind: ElementKind) -> Result<ElementId> {
        if self.fail_create == Some(kind) {
            bail!("mock refused to create {kind:?}");
        }
        self.record(Op::Create(kind));
        let id = ElementId(self.created);
        self.created += 1;
        Ok(id)
    }

    fn link(&mut self, upstream: ElementId, downstream: ElementId) -> Result<()> {
        if self.fail_link == Some((upstream.0, downstream.0)) {
            bail!("mock refused link {} -> {}", upstream.0, downstream.0);
        }
        self.record(Op::Link(upstream.0, downstream.0));
        Ok(())
    }

    fn link_when_pad_added(&mut self, upstream: ElementId, downstream: ElementId) {
        self.record(Op::DeferLink(upstream.0, downstream.0));
        self.deferred.push((upstream.0, downstream.0));
    }

    fn start(&mut self, _timeout: Duration) -> Result<()> {
        // Simulate the pad-available notification firing while the pipeline
        // comes up: pending one-shot links complete before running state.
        for (up, down) in std::mem::take(&mut self.deferred) {
            self.record(Op::PadLinkCompleted(up, down));
        }
        self.record(Op::Start);
        Ok(())
    }

    fn take_bus(&mut self) -> Result<Self::Bus> {
        if self.bus_taken {
            bail!("bus already taken");
        }
        self.bus_taken = true;
        self.record(Op::BusTaken);
        Ok(ScriptedBus {
            messages: Mutex::new(std::mem::take(&mut self.messages)),
            log: Some(self.log.clone()),
        })
    }

    fn stop(&mut self) {
        self.record(Op::Stop);
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.record(Op::BackendReleased);
    }
}

/// Bus replaying a fixed script; `wait` returns `None` once it runs dry.
pub struct ScriptedBus {
    messages: Mutex<VecDeque<BusMessage>>,
    log: Option<OpLog>,
}

impl ScriptedBus {
    pub fn new(messages: Vec<BusMessage>) -> Self {
        Self {
            messages: Mutex::new(messages.into()),
            log: None,
        }
    }
}

impl PlaybackBus for ScriptedBus {
    fn wait(&self) -> Option<BusMessage> {
        self.messages.lock().unwrap().pop_front()
    }
}

impl Drop for ScriptedBus {
    fn drop(&mut self) {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(Op::BusReleased);
        }
    }
}
