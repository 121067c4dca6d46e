//! Random dated trees that honour a set of calibrations.
//!
//! Each attempt draws one age per primary calibration, builds the
//! calibrated clades youngest first, joins what is left under a root and
//! keeps the tree only if every check in [`crate::validate`] passes.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use tempora_core::{Result, TemporaError};
use tracing::debug;

use crate::calibration::{apply_calibrations, Calibration};
use crate::config::DatingConfig;
use crate::state::DatingState;
use crate::tree::{Node, NodeId, TimeTree};
use crate::validate::{check_node_height_ordering, find_bound_violation, find_calibration_violation};

/// A named tip and its sampling age.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TipSample {
    pub name: String,
    pub age: f64,
}

impl TipSample {
    pub fn new(name: impl Into<String>, age: f64) -> Self {
        Self {
            name: name.into(),
            age,
        }
    }

    /// A tip sampled at the present.
    pub fn contemporary(name: impl Into<String>) -> Self {
        Self::new(name, 0.0)
    }
}

/// Output of [`generate_constrained_random_tree`].
#[derive(Debug, Clone)]
pub struct RandomTree {
    pub tree: TimeTree,
    /// Ages set and calibrations propagated.
    pub state: DatingState,
    /// Attempts used, including the successful one.
    pub attempts: usize,
}

/// Draw a random rooted binary tree over `tips` whose node ages satisfy
/// every calibration, retrying up to `config.max_tree_attempts` times.
///
/// # Errors
///
/// - [`TemporaError::InvalidInput`] for fewer than two tips, duplicate or
///   non-finite tips, a primary calibration without a finite lower bound, or
///   no primary calibration at all.
/// - [`TemporaError::UnknownTaxon`] for a calibration naming a missing tip.
/// - [`TemporaError::InvalidCalibration`] for a calibration on fewer than two
///   distinct taxa.
/// - [`TemporaError::NoFeasibleRandomTree`] when every attempt fails.
pub fn generate_constrained_random_tree<R: Rng + ?Sized>(
    tips: &[TipSample],
    calibrations: &[Calibration],
    config: &DatingConfig,
    rng: &mut R,
) -> Result<RandomTree> {
    config.validate()?;
    let tip_index = index_tips(tips)?;
    check_calibrations(calibrations, &tip_index)?;

    for attempt in 1..=config.max_tree_attempts {
        match try_build(tips, &tip_index, calibrations, config, rng) {
            Ok((tree, state)) => {
                debug!(attempt, "constrained random tree accepted");
                return Ok(RandomTree {
                    tree,
                    state,
                    attempts: attempt,
                });
            }
            Err(reason) => debug!(attempt, %reason, "random tree attempt rejected"),
        }
    }
    Err(TemporaError::NoFeasibleRandomTree {
        attempts: config.max_tree_attempts,
    })
}

fn index_tips(tips: &[TipSample]) -> Result<HashMap<&str, NodeId>> {
    if tips.len() < 2 {
        return Err(TemporaError::InvalidInput(format!(
            "need at least two tips, got {}",
            tips.len()
        )));
    }
    let mut index = HashMap::with_capacity(tips.len());
    for (id, tip) in tips.iter().enumerate() {
        if !tip.age.is_finite() || tip.age > 0.0 {
            return Err(TemporaError::InvalidInput(format!(
                "tip {} has age {}, expected a finite value <= 0",
                tip.name, tip.age
            )));
        }
        if index.insert(tip.name.as_str(), id).is_some() {
            return Err(TemporaError::InvalidInput(format!(
                "duplicate tip name {}",
                tip.name
            )));
        }
    }
    Ok(index)
}

fn check_calibrations(calibrations: &[Calibration], tip_index: &HashMap<&str, NodeId>) -> Result<()> {
    if !calibrations.iter().any(|c| c.is_primary) {
        return Err(TemporaError::InvalidInput(
            "random tree generation needs at least one primary calibration".into(),
        ));
    }
    for cal in calibrations {
        let mut distinct = HashSet::new();
        for name in &cal.target_taxa {
            let id = tip_index
                .get(name.as_str())
                .ok_or_else(|| TemporaError::UnknownTaxon(name.clone()))?;
            distinct.insert(*id);
        }
        if distinct.len() < 2 {
            return Err(TemporaError::InvalidCalibration(format!(
                "calibration on {:?} needs at least two distinct taxa",
                cal.target_taxa
            )));
        }
        if cal.is_primary && !cal.lower.is_finite() {
            return Err(TemporaError::InvalidInput(format!(
                "primary calibration on {:?} needs a finite lower bound",
                cal.target_taxa
            )));
        }
    }
    Ok(())
}

/// Nodes under construction. Ids are arena positions; tips come first.
struct Builder {
    parent: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
    ages: Vec<f64>,
}

impl Builder {
    fn with_tips(tips: &[TipSample]) -> Self {
        let n = tips.len();
        Self {
            parent: vec![None; n],
            children: vec![Vec::new(); n],
            ages: tips.iter().map(|t| t.age).collect(),
        }
    }

    fn top(&self, mut id: NodeId) -> NodeId {
        while let Some(p) = self.parent[id] {
            id = p;
        }
        id
    }

    /// Distinct top-most ancestors of `ids`, in first-seen order.
    fn tops(&self, ids: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        ids.into_iter()
            .map(|id| self.top(id))
            .filter(|&t| seen.insert(t))
            .collect()
    }

    fn join(&mut self, a: NodeId, b: NodeId, age: f64) -> NodeId {
        let id = self.ages.len();
        self.parent.push(None);
        self.children.push(vec![a, b]);
        self.ages.push(age);
        self.parent[a] = Some(id);
        self.parent[b] = Some(id);
        id
    }

    /// Join `tops` (shuffled) into a ladder whose last node sits at
    /// `final_age`; intermediate joins fall between `final_age` and their
    /// younger child. `final_age` must be no younger than every top.
    fn ladder<R: Rng + ?Sized>(&mut self, mut tops: Vec<NodeId>, final_age: f64, rng: &mut R) -> NodeId {
        tops.shuffle(rng);
        let mut acc = tops[0];
        let last = tops.len() - 1;
        for (i, &next) in tops.iter().enumerate().skip(1) {
            let age = if i == last {
                final_age
            } else {
                let limit = self.ages[acc].min(self.ages[next]);
                rng.gen_range(final_age..=limit)
            };
            acc = self.join(acc, next, age);
        }
        acc
    }

    fn into_tree(self, tips: &[TipSample], root: NodeId) -> Result<(TimeTree, Vec<f64>)> {
        let nodes = (0..self.ages.len())
            .map(|id| Node {
                id,
                parent: self.parent[id],
                children: self.children[id].clone(),
                branch_length: self.parent[id].map(|p| self.ages[id] - self.ages[p]),
                name: tips.get(id).map(|t| t.name.clone()),
            })
            .collect();
        let tree = TimeTree::from_nodes(nodes, root)?;
        Ok((tree, self.ages))
    }
}

/// One construction attempt. Consumes randomness only from `rng`; the
/// error string says why the attempt was rejected.
fn try_build<R: Rng + ?Sized>(
    tips: &[TipSample],
    tip_index: &HashMap<&str, NodeId>,
    calibrations: &[Calibration],
    config: &DatingConfig,
    rng: &mut R,
) -> std::result::Result<(TimeTree, DatingState), String> {
    let mut drawn: Vec<(&Calibration, f64)> = calibrations
        .iter()
        .filter(|c| c.is_primary)
        .map(|c| (c, rng.gen_range(c.lower..=c.upper)))
        .collect();
    // Youngest first, so nested clades exist before the clades holding them.
    drawn.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut builder = Builder::with_tips(tips);
    for &(cal, age) in &drawn {
        let tops = builder.tops(cal.target_taxa.iter().filter_map(|n| tip_index.get(n.as_str()).copied()));
        if tops.len() < 2 {
            continue;
        }
        let youngest_allowed = tops
            .iter()
            .map(|&t| builder.ages[t])
            .fold(f64::INFINITY, f64::min);
        if !(age < youngest_allowed) {
            return Err(format!(
                "drawn age {age} for {:?} is not older than its subclades ({youngest_allowed})",
                cal.target_taxa
            ));
        }
        builder.ladder(tops, age, rng);
    }

    let tops = builder.tops(0..tips.len());
    let root = if tops.len() > 1 {
        let oldest_drawn = drawn.iter().map(|&(_, a)| a).fold(f64::INFINITY, f64::min);
        let oldest_top = tops
            .iter()
            .map(|&t| builder.ages[t])
            .fold(f64::INFINITY, f64::min);
        let upper = oldest_drawn.min(oldest_top);
        let root_age = rng.gen_range(config.root_bound_multiplier * upper..=upper);
        builder.ladder(tops, root_age, rng)
    } else {
        tops[0]
    };

    let (tree, ages) = builder.into_tree(tips, root).map_err(|e| e.to_string())?;
    let mut state = DatingState::new(&tree).map_err(|e| e.to_string())?;
    state.set_ages(&ages).map_err(|e| e.to_string())?;
    apply_calibrations(&tree, &mut state, calibrations, config).map_err(|e| e.to_string())?;

    if !check_node_height_ordering(&tree, &ages) {
        return Err("node heights out of order".into());
    }
    if let Some(v) = find_calibration_violation(&tree, &ages, calibrations).map_err(|e| e.to_string())? {
        return Err(format!(
            "node {} at {} misses calibration [{}, {}]",
            v.node, v.age, v.calibration.lower, v.calibration.upper
        ));
    }
    if let Some(v) = find_bound_violation(&tree, &state) {
        return Err(format!(
            "node {} at {} outside [{}, {}]",
            v.node, v.age, v.prior_min, v.prior_max
        ));
    }
    Ok((tree, state))
}
