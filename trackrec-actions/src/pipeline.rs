//! Ordered chain of actions run over each event.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use trackrec_core::{Region, TrackEvent};

use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::options::ActionOptions;
use crate::registry::ActionRegistry;

fn enabled_by_default() -> bool {
    true
}

/// Configuration block of one pipeline step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Registry name.
    pub name: String,
    /// Disabled steps are validated but not built.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Step options.
    #[serde(default)]
    pub options: ActionOptions,
}

impl ActionConfig {
    /// Enabled step with no options.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            options: ActionOptions::new(),
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: ActionOptions) -> Self {
        self.options = options;
        self
    }

    /// Enables or disables the step.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Full pipeline description: named regions plus ordered steps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Regions that actions refer to by name.
    #[serde(default)]
    pub regions: BTreeMap<String, Region>,
    /// Steps in execution order.
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

impl PipelineConfig {
    /// Adds a named region.
    #[must_use]
    pub fn with_region(mut self, name: &str, region: Region) -> Self {
        self.regions.insert(name.to_string(), region);
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn with_action(mut self, action: ActionConfig) -> Self {
        self.actions.push(action);
        self
    }
}

/// Configured action chain.
pub struct Pipeline {
    actions: Vec<Box<dyn Action>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("actions", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl Pipeline {
    /// Builds and configures every enabled step.
    ///
    /// Every name, enabled or not, must be known to `registry`.
    ///
    /// # Errors
    /// Unknown action names, bad options and unknown regions.
    pub fn from_config(config: &PipelineConfig, registry: &ActionRegistry) -> Result<Self> {
        for step in &config.actions {
            if !registry.contains(&step.name) {
                return Err(crate::error::PipelineError::UnknownAction(step.name.clone()));
            }
        }

        let ctx = ActionContext::new(&config.regions, &config.actions);
        let mut actions = Vec::with_capacity(config.actions.len());
        for step in &config.actions {
            if !step.enabled {
                info!("pipeline: skipping disabled action '{}'", step.name);
                continue;
            }
            let mut action = registry.create(&step.name)?;
            action.configure(&step.options, &ctx)?;
            debug!("pipeline: {}", action.describe());
            actions.push(action);
        }
        Ok(Self { actions })
    }

    /// Pipeline from already-configured actions.
    #[must_use]
    pub fn from_actions(actions: Vec<Box<dyn Action>>) -> Self {
        Self { actions }
    }

    /// Runs every step in order, re-densifying cluster ids after each.
    ///
    /// # Errors
    /// The first error an action reports; later steps are not run.
    pub fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        event.reset_ids();
        for action in &mut self.actions {
            let before = event.len();
            action.run(event)?;
            event.reset_ids();
            debug!(
                "pipeline: {} left {} clusters (was {})",
                action.name(),
                event.len(),
                before
            );
        }
        Ok(())
    }

    /// Number of configured steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if no step is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Step names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|a| a.name())
    }

    /// One numbered line per step.
    #[must_use]
    pub fn describe(&self) -> String {
        self.actions
            .iter()
            .enumerate()
            .map(|(idx, action)| format!("{idx}: {}", action.describe()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
