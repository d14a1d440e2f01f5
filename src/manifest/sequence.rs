//! Turns a seed membership delta into single-change manifest steps.
//!
//! The consensus layer tolerates one seed change in flight, so each emitted
//! manifest differs from its predecessor by exactly one seed. Additions run
//! before removals so the seed count never dips below its starting size while
//! replacements are still pending.

use super::settings::SettingsGenerator;
use super::types::{Manifest, ManifestError};
use crate::cluster_config::{AdminConfig, UserConfig};
use crate::selection::{SeedDelta, SelectionError};
use crate::topology::{Node, Topology};
use log::info;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("seed selection failed: {0}")]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("seed {0} is scheduled for removal but is not in the node list")]
    UnknownSeed(String),
}

impl SequenceError {
    pub fn code(&self) -> &'static str {
        match self {
            SequenceError::Selection(err) => err.code(),
            SequenceError::Manifest(err) => err.code(),
            SequenceError::UnknownSeed(_) => "unknown-seed",
        }
    }
}

/// Node changes that ride along with the seed steps instead of getting their
/// own manifest.
#[derive(Debug, Clone, Default)]
pub struct NonSeedChanges {
    /// Folded into the first step.
    pub added: Vec<Node>,
    /// Folded into the last step.
    pub removed: Vec<Node>,
}

impl NonSeedChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedChange<'a> {
    Add(&'a Node),
    Remove(&'a Node),
}

pub struct ManifestSequenceBuilder<'a> {
    generator: &'a SettingsGenerator,
    user: &'a UserConfig,
    admin: &'a AdminConfig,
}

impl<'a> ManifestSequenceBuilder<'a> {
    pub fn new(generator: &'a SettingsGenerator, user: &'a UserConfig, admin: &'a AdminConfig) -> Self {
        Self {
            generator,
            user,
            admin,
        }
    }

    /// Builds one manifest per seed change, starting from the enabled nodes
    /// of `current`. Nodes carry their `target` attributes from the first step
    /// on, while seed flags change one step at a time. `target` also decides
    /// whether a removed seed stays on as a plain node or leaves the list.
    /// Each step takes its version from `next_version`. An empty delta yields
    /// no manifests and allocates nothing.
    pub fn build<F>(
        &self,
        current: &Topology,
        target: &Topology,
        selection: Result<SeedDelta, SelectionError>,
        non_seed: &NonSeedChanges,
        mut next_version: F,
    ) -> Result<Vec<Manifest>, SequenceError>
    where
        F: FnMut() -> Result<u64, ManifestError>,
    {
        let delta = selection?;
        if delta.is_empty() {
            return Ok(Vec::new());
        }

        let changes: Vec<SeedChange<'_>> = delta
            .added
            .iter()
            .map(SeedChange::Add)
            .chain(delta.removed.iter().map(SeedChange::Remove))
            .collect();
        let total = changes.len();

        let mut working: BTreeMap<String, Node> = current
            .enabled_nodes()
            .map(|node| {
                let mut serving = match target.node(&node.name) {
                    Some(updated) if updated.enabled => updated.clone(),
                    _ => node.clone(),
                };
                serving.is_seed = node.is_seed;
                (serving.name.clone(), serving)
            })
            .collect();
        let mut manifests = Vec::with_capacity(total);

        for (index, change) in changes.into_iter().enumerate() {
            if index == 0 {
                for node in &non_seed.added {
                    let mut node = node.clone();
                    node.is_seed = false;
                    working.insert(node.name.clone(), node);
                }
            }

            let (action, name) = match change {
                SeedChange::Add(node) => {
                    let mut seed = target.node(&node.name).unwrap_or(node).clone();
                    seed.is_seed = true;
                    working.insert(seed.name.clone(), seed);
                    ("add", node.name.as_str())
                }
                SeedChange::Remove(node) => {
                    if !working.contains_key(&node.name) {
                        return Err(SequenceError::UnknownSeed(node.name.clone()));
                    }
                    match target.node(&node.name).filter(|kept| kept.enabled) {
                        Some(kept) => {
                            let mut demoted = kept.clone();
                            demoted.is_seed = false;
                            working.insert(demoted.name.clone(), demoted);
                        }
                        None => {
                            working.remove(&node.name);
                        }
                    }
                    ("remove", node.name.as_str())
                }
            };

            if index + 1 == total {
                for node in &non_seed.removed {
                    working.remove(&node.name);
                }
            }

            let version = next_version()?;
            let manifest =
                self.generator
                    .render(self.user, self.admin, version, working.values())?;
            info!(
                "event=manifest_step_sealed version={} step={}/{} change={} node={} seeds={} nodes={}",
                version,
                index + 1,
                total,
                action,
                name,
                manifest.seed_count(),
                manifest.nodes.len()
            );
            manifests.push(manifest);
        }

        Ok(manifests)
    }
}
