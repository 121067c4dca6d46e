//! Prior densities of node ages.
//!
//! Every evaluator reads a refreshed [`DatingState`] and returns a
//! [`LogDensity`]. Ages outside the propagated bounds and non-finite
//! intermediate values yield [`LogDensity::unlikely`]; nothing here fails.

use tempora_core::numeric::{approx_eq, ln_factorial, ln_gamma};
use tempora_core::LogDensity;
use tracing::trace;

use crate::config::DatingConfig;
use crate::state::DatingState;
use crate::tree::TimeTree;
use crate::validate::find_bound_violation;

/// Node-age prior model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AgePrior {
    /// Uniform over ranked labelled histories within each time slice.
    Uniform,
    /// Each internal node as an order statistic of uniforms below the root.
    ConditionalUniform,
    /// Yule process, order-statistics form, truncated to the bounds.
    YuleOrder,
    /// [`AgePrior::YuleOrder`] conditioned on the current root age.
    YuleOrderRootConditioned,
    /// Yule process, joint density of all branching times.
    YuleJoint,
    /// Yule process, marginal density of the root age.
    YuleRootMarginal,
    /// Birth-death process conditioned on the root age.
    BirthDeath,
}

/// Refresh derived arrays in `state` and evaluate `prior`.
pub fn log_prior_density(
    tree: &TimeTree,
    state: &mut DatingState,
    prior: AgePrior,
    config: &DatingConfig,
) -> LogDensity {
    state.refresh(tree, config);
    let density = match prior {
        AgePrior::Uniform => log_density_uniform(tree, state),
        AgePrior::ConditionalUniform => log_density_conditional_uniform(tree, state),
        AgePrior::YuleOrder => log_density_yule_order(tree, state),
        AgePrior::YuleOrderRootConditioned => log_density_yule_order_root_conditioned(tree, state),
        AgePrior::YuleJoint => log_density_yule_joint(tree, state, config),
        AgePrior::YuleRootMarginal => log_density_yule_root_marginal(tree, state, config),
        AgePrior::BirthDeath => log_density_birth_death(tree, state, config),
    };
    trace!(?prior, value = density.value(), "prior density");
    density
}

/// Log number of ranked labelled histories, with per-node tip counts.
///
/// With `per_slice`, a child sitting in a different time slice than its
/// parent counts as a single lineage.
pub fn log_ranked_labelled_histories(
    tree: &TimeTree,
    state: &DatingState,
    per_slice: bool,
) -> (f64, Vec<usize>) {
    let mut counts = vec![1usize; tree.node_count()];
    let mut logn = 0.0;
    for id in tree.iter_postorder() {
        let Some((v1, v2)) = tree.children(id) else {
            continue;
        };
        let lineages = |v: usize| {
            if !per_slice || state.time_slice[v] == state.time_slice[id] {
                counts[v]
            } else {
                1
            }
        };
        let (n1, n2) = (lineages(v1) as i64, lineages(v2) as i64);
        counts[id] = (n1 + n2) as usize;
        logn += ln_factorial(n1 + n2 - 2) - ln_factorial(n1 - 1) - ln_factorial(n2 - 1);
    }
    (logn, counts)
}

/// Uniform density on node ages within time slices, divided by the number of
/// ranked labelled histories.
pub fn log_density_uniform(tree: &TimeTree, state: &DatingState) -> LogDensity {
    let (logn, k) = log_ranked_labelled_histories(tree, state, true);
    let lims = &state.time_slice_lims;
    let slice_term = |id: usize, shift: i64| {
        let kd = k[id] as i64 - shift;
        ln_factorial(kd) - kd as f64 * (lims[state.time_slice[id]] - state.ages[id]).ln()
    };

    let mut ll = LogDensity::zero();
    for id in 0..tree.node_count() {
        let Some(parent) = tree.parent(id) else {
            continue;
        };
        if !tree.is_leaf(id) && state.time_slice[parent] != state.time_slice[id] {
            ll = ll.ln_mul(slice_term(id, 1));
        }
    }
    ll.ln_mul(slice_term(tree.root(), 2)).ln_mul(-logn)
}

/// Log density of the `r`-th order statistic of `m` uniforms on `[lo, hi]`.
fn ln_order_stat_uniform(x: f64, r: usize, m: usize, lo: f64, hi: f64) -> f64 {
    if r < 1 || r > m || !(hi > lo) || x < lo || x > hi {
        return f64::NEG_INFINITY;
    }
    let f = (x - lo) / (hi - lo);
    let (r, m) = (r as i64, m as i64);
    let mut ll = ln_factorial(m) - ln_factorial(r - 1) - ln_factorial(m - r) - (hi - lo).ln();
    if r > 1 {
        ll += (r - 1) as f64 * f.ln();
    }
    if m > r {
        ll += (m - r) as f64 * (1.0 - f).ln();
    }
    ll
}

/// Each non-root internal node is the `r`-th of `m` uniform order statistics
/// on `[age(root), floor]`, where `m` counts the non-root internal nodes
/// older than the node's floor tip and `r` its position among them.
pub fn log_density_conditional_uniform(tree: &TimeTree, state: &DatingState) -> LogDensity {
    let root = tree.root();
    let n = tree.node_count();
    // internal_before[p]: non-root internal nodes among order[..p].
    let mut internal_before = vec![0usize; n + 1];
    for (pos, &id) in state.order.iter().enumerate() {
        let counts = usize::from(id != root && !tree.is_leaf(id));
        internal_before[pos + 1] = internal_before[pos] + counts;
    }

    let lo = state.ages[root];
    let mut ll = LogDensity::zero();
    for id in 0..n {
        if id == root || tree.is_leaf(id) {
            continue;
        }
        let r = internal_before[state.rank[id] + 1];
        let m = internal_before[state.rank_max[id]];
        ll = ll.ln_mul(ln_order_stat_uniform(
            state.ages[id],
            r,
            m,
            lo,
            state.floor[id],
        ));
        if ll.is_unlikely() {
            break;
        }
    }
    ll
}

fn yule_order(tree: &TimeTree, state: &DatingState, root_conditioned: bool) -> LogDensity {
    if find_bound_violation(tree, state).is_some() {
        return LogDensity::unlikely();
    }
    let lambda = state.birth_rate;
    let ln_lambda = lambda.ln();
    let root = tree.root();
    let root_height = state.ages[root].abs();
    let truncation = |id: usize| {
        let lo = state.floor[id].abs().max(state.prior_max[id].abs());
        let hi = state.prior_min[id].abs();
        (lo, hi)
    };

    let mut ll = LogDensity::zero();
    for id in 0..tree.node_count() {
        if id == root || tree.is_leaf(id) {
            continue;
        }
        let (lo, mut hi) = truncation(id);
        if root_conditioned {
            hi = hi.min(root_height);
        }
        let t = state.ages[id].abs();
        ll = ll.ln_mul(ln_lambda - lambda * t - ((-lambda * lo).exp() - (-lambda * hi).exp()).ln());
        if ll.is_unlikely() {
            return ll;
        }
    }

    if !root_conditioned {
        let (lo, hi) = truncation(root);
        let two_lambda = 2.0 * lambda;
        ll = ll.ln_mul(
            std::f64::consts::LN_2 + ln_lambda - two_lambda * root_height
                - ((-two_lambda * lo).exp() - (-two_lambda * hi).exp()).ln(),
        );
    }
    ll
}

/// Yule order-statistics density, each node truncated to
/// `[prior_min, min(prior_max, floor)]`, with a density on the root age.
pub fn log_density_yule_order(tree: &TimeTree, state: &DatingState) -> LogDensity {
    yule_order(tree, state, false)
}

/// As [`log_density_yule_order`], but node ages are truncated at the root
/// age and the root itself contributes nothing.
pub fn log_density_yule_order_root_conditioned(tree: &TimeTree, state: &DatingState) -> LogDensity {
    yule_order(tree, state, true)
}

/// Joint density of branching times under a pure-birth process.
///
/// Walks the ages oldest first starting from one lineage. Every event adds a
/// lineage and a tip older than the current event leaves the process. Each
/// positive interval with `n` lineages contributes `ln((n+1)λ) - (n+1)λΔt`.
/// Every slice boundary then adds the waiting term for the lineages crossing
/// it, up to the first event below the boundary.
pub fn log_density_yule_joint(
    tree: &TimeTree,
    state: &DatingState,
    config: &DatingConfig,
) -> LogDensity {
    let lambda = state.birth_rate;
    let t = &state.ages;
    let leaves = tree.leaves();
    let mut interrupted = vec![false; leaves.len()];
    let mut lineages: i64 = 1;
    let mut ll = LogDensity::zero();

    for pair in state.order.windows(2) {
        let (id, next) = (pair[0], pair[1]);
        for (j, &leaf) in leaves.iter().enumerate() {
            if !interrupted[j] && t[leaf] < t[id] {
                interrupted[j] = true;
                lineages -= 1;
            }
        }
        if lineages < 1 {
            return LogDensity::unlikely();
        }
        let dt = t[next] - t[id];
        if dt > config.min_interval {
            let rate = (lineages + 1) as f64 * lambda;
            ll = ll.ln_mul(rate.ln() - rate * dt);
        }
        lineages += 1;
    }

    let lims = &state.time_slice_lims;
    let boundaries = lims.len().saturating_sub(1);
    for &ts in &lims[..boundaries] {
        let mut crossing = 0usize;
        let mut first_event = 0.0f64;
        for id in 0..tree.node_count() {
            let Some(parent) = tree.parent(id) else {
                continue;
            };
            if t[id] > ts && t[parent] < ts {
                crossing += 1;
                first_event = first_event.min(t[id]);
            }
        }
        let rate = crossing as f64 * lambda;
        ll = ll.ln_mul(rate.ln() - rate * (first_event - ts));
    }
    ll
}

/// Marginal density of the root age under a pure-birth process, from the
/// oldest sampling time upward.
pub fn log_density_yule_root_marginal(
    tree: &TimeTree,
    state: &DatingState,
    config: &DatingConfig,
) -> LogDensity {
    let Some(&oldest_sample) = state.time_slice_lims.first() else {
        return LogDensity::unlikely();
    };
    let lambda = state.birth_rate;
    let t = &state.ages;
    let span = oldest_sample - t[tree.root()];

    let crossing = (0..tree.node_count())
        .filter(|&id| match tree.parent(id) {
            None => false,
            Some(parent) => {
                (t[id] > oldest_sample && t[parent] < oldest_sample)
                    || (tree.is_leaf(id)
                        && approx_eq(t[id], oldest_sample, config.slice_tolerance))
            }
        })
        .count() as f64;

    LogDensity::new(
        ln_gamma(crossing + 1.0) + lambda.ln() - 2.0 * lambda * span
            + (crossing - 2.0) * (1.0 - (-lambda * span).exp()).ln(),
    )
}

/// Birth-death density of internal node ages conditioned on the root age.
pub fn log_density_birth_death(
    tree: &TimeTree,
    state: &DatingState,
    config: &DatingConfig,
) -> LogDensity {
    if find_bound_violation(tree, state).is_some() {
        return LogDensity::unlikely();
    }
    let (b, d) = (state.birth_rate, state.death_rate);
    let root = tree.root();
    let t1 = state.ages[root].abs();
    let near_critical = (b - d).abs() < config.rate_tolerance;

    let p0 = |t: f64| (b - d) / (b - d * ((d - b) * t).exp());
    let vt1 = 1.0 - p0(t1) * ((d - b) * t1).exp();

    let mut ll = LogDensity::zero();
    for id in 0..tree.node_count() {
        if id == root || tree.is_leaf(id) {
            continue;
        }
        let t = state.ages[id].abs();
        let g = if near_critical {
            (1.0 + b * t1) / (t1 * (1.0 + b * t).powi(2))
        } else {
            let p1t = p0(t).powi(2) * ((d - b) * t).exp();
            b * p1t / vt1
        };
        ll = ll.ln_mul(g.ln());
        if ll.is_unlikely() {
            return ll;
        }
    }
    ll
}
