//! The contract every refinement step satisfies.

use std::collections::BTreeMap;

use trackrec_core::{Region, TrackEvent};

use crate::error::Result;
use crate::options::ActionOptions;
use crate::pipeline::ActionConfig;

/// One configurable refinement step.
///
/// Lifecycle: constructed by name through the registry, configured once,
/// run once per event, described on request. `run` receives exclusive
/// access to the event; every cluster whose hits it changes must be refit
/// before it returns.
pub trait Action: Send {
    /// Registry name.
    fn name(&self) -> &str;

    /// Reads options. Called once, before any event.
    fn configure(&mut self, options: &ActionOptions, ctx: &ActionContext<'_>) -> Result<()>;

    /// Mutates the event's cluster collection.
    fn run(&mut self, event: &mut TrackEvent) -> Result<()>;

    /// Human-readable summary of the configured behaviour.
    fn describe(&self) -> String;
}

/// Read-only view of the pipeline an action is being configured into.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    regions: &'a BTreeMap<String, Region>,
    actions: &'a [ActionConfig],
}

impl<'a> ActionContext<'a> {
    /// Builds a context over the pipeline's regions and action blocks.
    #[must_use]
    pub fn new(regions: &'a BTreeMap<String, Region>, actions: &'a [ActionConfig]) -> Self {
        Self { regions, actions }
    }

    /// Looks up a named region.
    #[must_use]
    pub fn region(&self, name: &str) -> Option<&'a Region> {
        self.regions.get(name)
    }

    /// True if an enabled action with this name is part of the pipeline.
    #[must_use]
    pub fn has_action(&self, name: &str) -> bool {
        self.get_action(name).is_some()
    }

    /// Configuration block of the first enabled action with this name.
    #[must_use]
    pub fn get_action(&self, name: &str) -> Option<&'a ActionConfig> {
        self.actions.iter().find(|a| a.enabled && a.name == name)
    }
}
