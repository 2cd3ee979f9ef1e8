//! Name-to-factory registry for actions.

use std::collections::BTreeMap;
use std::fmt;

use crate::action::Action;
use crate::actions::{
    BreakChi2, Clean, CleanBadFits, CleanDeltas, CleanPileup, DeleteRegion, FindRp, MergeFix,
    MergeSimilar, SplitRegion,
};
use crate::error::{PipelineError, Result};

/// Builds a fresh, unconfigured action.
pub type ActionFactory = Box<dyn Fn() -> Box<dyn Action> + Send + Sync>;

/// Maps action names to factories.
///
/// Actions supplied from outside this crate are added with
/// [`ActionRegistry::register`]; how their code gets loaded is up to the
/// caller.
#[derive(Default)]
pub struct ActionRegistry {
    factories: BTreeMap<String, ActionFactory>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in action.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Clean::NAME, || Box::new(Clean::default()));
        registry.register(CleanBadFits::NAME, || Box::new(CleanBadFits::default()));
        registry.register(CleanPileup::NAME, || Box::new(CleanPileup::default()));
        registry.register(CleanDeltas::NAME, || Box::new(CleanDeltas::default()));
        registry.register(BreakChi2::NAME, || Box::new(BreakChi2::default()));
        registry.register(MergeSimilar::NAME, || Box::new(MergeSimilar::default()));
        registry.register(SplitRegion::NAME, || Box::new(SplitRegion::default()));
        registry.register(MergeFix::NAME, || Box::new(MergeFix::default()));
        registry.register(DeleteRegion::NAME, || Box::new(DeleteRegion::default()));
        registry.register(FindRp::NAME, || Box::new(FindRp::default()));
        registry
    }

    /// Adds or replaces a factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Action> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// True if `name` can be built.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Builds an unconfigured action.
    ///
    /// # Errors
    /// [`PipelineError::UnknownAction`] if nothing is registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Action>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| PipelineError::UnknownAction(name.to_string()))
    }
}
