//! Seams to the world outside the simulation core. Both collaborators are
//! injected into [`Simulation`](super::Simulation) at construction.

use anyhow::Result;
use shared::SimEvent;
use std::sync::{Arc, Mutex};

/// Fire-and-forget sink for discrete simulation events.
pub trait EventSink: Send {
    fn emit(&mut self, event: SimEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: SimEvent) {}
}

/// Keeps every event in memory. Clones share the same buffer, so a test can
/// hand one clone to the simulation and inspect the other.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SimEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SimEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: SimEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Progression and analytics hooks, called synchronously on milestones.
/// Errors are logged and otherwise ignored by the simulation.
pub trait Progression: Send {
    fn food_collected(&mut self, _colony_id: u8, _amount: u32) -> Result<()> {
        Ok(())
    }

    fn day_advanced(&mut self, _day: u32) -> Result<()> {
        Ok(())
    }

    fn combat_resolved(&mut self, _exchanges: u32, _casualties: u32) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgression;

impl Progression for NoProgression {}
