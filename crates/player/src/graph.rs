//! Element graph construction and lifecycle over a pluggable backend.
//!
//! [`Graph::build`] executes a recipe's link plan mechanically; everything
//! that touches real decoders or devices lives behind the [`Backend`] trait
//! so the wiring and teardown discipline can be tested with a mock.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::bus::PlaybackBus;
use crate::monitor::{self, PlayOutcome};
use crate::recipe::{ElementKind, LinkMode, Recipe};

/// Opaque handle to a backend-owned element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementId(pub(crate) usize);

/// The seam between the wiring logic and the multimedia framework.
///
/// The backend owns every element handle; dropping it releases them all.
pub trait Backend {
    type Bus: PlaybackBus;

    /// Instantiate an element. Failure is a fatal setup error.
    fn create(&mut self, kind: ElementKind) -> Result<ElementId>;

    /// Link two elements now. Failure is a fatal setup error.
    fn link(&mut self, upstream: ElementId, downstream: ElementId) -> Result<()>;

    /// Register a one-shot link to be completed when `upstream` announces a
    /// newly available output pad. Registration itself cannot fail.
    fn link_when_pad_added(&mut self, upstream: ElementId, downstream: ElementId);

    /// Complete any pending deferred link, move to the running state, and
    /// wait until the pipeline is actually producing output. Every wait is
    /// bounded by `timeout`.
    fn start(&mut self, timeout: Duration) -> Result<()>;

    /// Hand out the bus. Called once, after a successful start.
    fn take_bus(&mut self) -> Result<Self::Bus>;

    /// Force the idle state. Harmless if the pipeline never started.
    fn stop(&mut self);
}

/// A wired pipeline plus, once started, its message bus.
pub struct Graph<B: Backend> {
    backend: Option<B>,
    bus: Option<B::Bus>,
}

impl<B: Backend> Graph<B> {
    /// Instantiate and wire every element of `recipe`.
    ///
    /// Elements are created in recipe order, then immediate links are applied
    /// eagerly (any failure aborts setup) and deferred links are registered
    /// as one-shot pad subscriptions.
    pub fn build(recipe: Recipe, mut backend: B) -> Result<Graph<B>> {
        let elements = recipe.elements();
        let mut ids = Vec::with_capacity(elements.len());
        for &kind in elements {
            let id = backend
                .create(kind)
                .with_context(|| format!("create {kind:?} element"))?;
            ids.push(id);
        }

        for link in recipe.links() {
            let up = ids[link.upstream];
            let down = ids[link.downstream];
            match link.mode {
                LinkMode::Immediate => backend.link(up, down).with_context(|| {
                    format!(
                        "link {:?} -> {:?}",
                        elements[link.upstream], elements[link.downstream]
                    )
                })?,
                LinkMode::OnPadAdded => backend.link_when_pad_added(up, down),
            }
        }

        Ok(Graph {
            backend: Some(backend),
            bus: None,
        })
    }

    /// Start playback and acquire the bus.
    pub fn start(&mut self, timeout: Duration) -> Result<()> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| anyhow!("graph already torn down"))?;
        backend.start(timeout)?;
        self.bus = Some(backend.take_bus()?);
        Ok(())
    }

    /// Block on the bus until playback finishes or fails.
    pub fn wait_until_done(&self) -> PlayOutcome {
        match &self.bus {
            Some(bus) => monitor::wait_for_completion(bus),
            None => PlayOutcome::Failed {
                message: "bus was never acquired".to_string(),
                debug: None,
            },
        }
    }

    /// Tear down in fixed order: idle the pipeline, release the bus if it was
    /// acquired, release the element graph.
    ///
    /// Safe after partial setup and idempotent; later calls are no-ops.
    pub fn shutdown(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.stop();
        }
        drop(self.bus.take());
        drop(self.backend.take());
    }
}

impl<B: Backend> Drop for Graph<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
