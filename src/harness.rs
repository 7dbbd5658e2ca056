//! Measurement rounds comparing a routing scheme against the baseline.
//!
//! Every function works on models implementing [`RoutingModel`]. Rounds that
//! can run independently (`measure_stretch`) are spawned as rayon tasks, each
//! on its own clone of both models, and hand their result back over a
//! crossbeam channel. Sequential measurements (deletion sequences) run on the
//! caller's thread.
//!
//! When a [`Recorder`] is supplied, every sample is also appended to its CSV
//! log, one row per sample.

use crate::audit::AuditLogger;
use crate::bgp::{respects_no_valley, ValleyCheck};
use crate::error::{OracleError, Result};
use crate::model::RoutingModel;
use crate::oracle::TZOracle;
use crate::persist::write_topology;
use crate::recorder::Recorder;
use crate::repair::RepairStatus;
use crate::topology::{Asn, Relationship, Route, Topology};
use crossbeam::channel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Endpoint draws attempted per requested sample before giving up.
const DRAWS_PER_SAMPLE: usize = 64;

/// Snapshot restores tolerated within one deletion round.
const MAX_ROUND_RETRIES: usize = 16;

/// Route samples taken between two deletion rounds.
pub const SAMPLES_PER_ROUND: usize = 1200;

/// Minimum degree of both endpoints for a link to be deleted in a round.
pub const ROUND_DELETION_MIN_DEGREE: usize = 8;

/// Minimum degree of both endpoints when tracking landmark levels.
pub const LEVEL_TRACKING_MIN_DEGREE: usize = 4;

/// Aggregate of a stretch measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StretchReport {
    pub average: f64,
    pub max: f64,
    pub samples: usize,
    /// Audited routes failing the no-valley check
    pub valley_violations: usize,
}

impl StretchReport {
    pub fn valley_ratio(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.valley_violations as f64 / self.samples as f64
        }
    }
}

/// Partial sums produced by one stretch round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundStretch {
    pub accumulated: f64,
    pub max: f64,
    pub samples: usize,
    pub valley_violations: usize,
}

impl RoundStretch {
    pub fn average(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.accumulated / self.samples as f64
        }
    }

    fn absorb(&mut self, other: &RoundStretch) {
        self.accumulated += other.accumulated;
        self.max = self.max.max(other.max);
        self.samples += other.samples;
        self.valley_violations += other.valley_violations;
    }
}

/// Number of nodes touched by successful deletions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub average: f64,
    pub max: usize,
    pub samples: usize,
    /// Deletions that left part of the graph without a top-level landmark
    pub disconnections: usize,
}

impl ImpactReport {
    fn add(&mut self, impacted: usize) {
        self.samples += 1;
        self.average += impacted as f64;
        self.max = self.max.max(impacted);
    }

    fn finish(mut self) -> Self {
        if self.samples > 0 {
            self.average /= self.samples as f64;
        }
        self
    }
}

/// Change of stretch caused by link deletions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StretchIncreaseReport {
    pub average_increase: f64,
    pub max_increase: f64,
    pub samples: usize,
    /// Times the models were reset to a snapshot after a disconnection
    pub restarts: usize,
}

/// Landmark level used for a pair of neighbors before and after their link
/// is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSample {
    pub origin: Asn,
    pub destination: Asn,
    pub level_before: usize,
    pub level_after: usize,
    pub hops_before: usize,
    pub hops_after: usize,
}

fn format_path(path: &[Asn]) -> String {
    path.iter().map(|asn| format!("{}>", asn)).collect()
}

fn format_types(links: &[Relationship]) -> String {
    links.iter().map(|link| format!("{}>", link.code())).collect()
}

fn record(recorder: Option<&Recorder>, fields: &[String]) -> Result<()> {
    match recorder {
        Some(recorder) => recorder.record(fields),
        None => Ok(()),
    }
}

fn finish(recorder: Option<&Recorder>) -> Result<()> {
    match recorder {
        Some(recorder) => recorder.finish(),
        None => Ok(()),
    }
}

/// A directed link `(endpoint, other)` whose endpoints both have at least
/// `min_degree` links, drawn uniformly among such links.
pub fn pick_link<R: Rng + ?Sized>(
    topology: &Topology,
    min_degree: usize,
    rng: &mut R,
) -> Option<(Asn, Asn)> {
    let eligible: Vec<(Asn, Asn)> = topology
        .nodes()
        .filter(|node| node.degree() >= min_degree)
        .flat_map(|node| node.links().iter().map(move |&other| (node.asn, other)))
        .filter(|&(_, other)| topology.degree(other) >= min_degree)
        .collect();
    if eligible.is_empty() {
        return None;
    }
    Some(eligible[rng.gen_range(0..eligible.len())])
}

fn pick_endpoints<R: Rng + ?Sized>(
    topology: &Topology,
    excluded: &BTreeSet<Asn>,
    rng: &mut R,
) -> Option<(Asn, Asn)> {
    for _ in 0..DRAWS_PER_SAMPLE {
        let origin = topology.random_node(rng)?;
        let destination = topology.random_node(rng)?;
        if !excluded.contains(&origin) && !excluded.contains(&destination) {
            return Some((origin, destination));
        }
    }
    None
}

fn stretch_of(base: &Route, audit: &Route) -> f64 {
    if base.hops() == 0 {
        audit.hops() as f64
    } else {
        audit.hops() as f64 / base.hops() as f64
    }
}

/// One batch of random route comparisons. Endpoints in `excluded` are never
/// drawn. Pairs for which either model has no route are skipped.
pub fn stretch_round<B, A, R>(
    baseline: &mut B,
    audited: &mut A,
    batches: usize,
    excluded: &BTreeSet<Asn>,
    valley: ValleyCheck,
    rng: &mut R,
    recorder: Option<&Recorder>,
) -> Result<RoundStretch>
where
    B: RoutingModel,
    A: RoutingModel,
    R: Rng + ?Sized,
{
    let mut pairs = Vec::with_capacity(batches);
    for _ in 0..batches {
        let (origin, destination) = pick_endpoints(baseline.topology(), excluded, rng)
            .ok_or_else(|| {
                OracleError::InvalidState("no reachable endpoints left to sample".into())
            })?;
        // only destinations are announced
        baseline.set_destinations(&[destination]);
        audited.set_destinations(&[destination]);
        pairs.push((origin, destination));
    }

    baseline.evolve();
    audited.evolve();

    let mut round = RoundStretch::default();
    for &(origin, destination) in &pairs {
        let (Some(base), Some(audit)) = (
            baseline.get_route(origin, destination)?,
            audited.get_route(origin, destination)?,
        ) else {
            tracing::trace!(origin, destination, "No route to compare");
            continue;
        };

        let valley_free = respects_no_valley(&audit.links, valley);
        if !valley_free {
            round.valley_violations += 1;
        }

        record(
            recorder,
            &[
                base.hops().to_string(),
                audit.hops().to_string(),
                u8::from(!valley_free).to_string(),
                format_path(&base.nodes),
                format_types(&base.links),
                format_path(&audit.nodes),
                format_types(&audit.links),
            ],
        )?;

        let sample = stretch_of(&base, &audit);
        round.max = round.max.max(sample);
        round.accumulated += sample;
        round.samples += 1;
    }

    for &(_, destination) in &pairs {
        baseline.delete_destination(destination);
        audited.delete_destination(destination);
    }

    Ok(round)
}

/// Average and maximum stretch over `rounds` independent rounds of
/// `batches` random pairs. Round `r` draws from a generator seeded with
/// `seed + r`.
pub fn measure_stretch<B, A>(
    baseline: &B,
    audited: &A,
    rounds: usize,
    batches: usize,
    seed: u64,
    valley: ValleyCheck,
    recorder: Option<&Recorder>,
) -> Result<StretchReport>
where
    B: RoutingModel,
    A: RoutingModel,
{
    let excluded = BTreeSet::new();
    let (sender, receiver) = channel::bounded(rounds.max(1));

    rayon::scope(|scope| {
        for round in 0..rounds {
            let sender = sender.clone();
            let mut baseline = baseline.clone();
            let mut audited = audited.clone();
            let excluded = &excluded;
            scope.spawn(move |_| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(round as u64));
                let result = stretch_round(
                    &mut baseline,
                    &mut audited,
                    batches,
                    excluded,
                    valley,
                    &mut rng,
                    recorder,
                );
                // the receiver outlives the scope
                let _ = sender.send(result);
            });
        }
    });
    drop(sender);

    let mut total = RoundStretch::default();
    for result in receiver.iter() {
        total.absorb(&result?);
    }
    finish(recorder)?;

    let report = StretchReport {
        average: total.average(),
        max: total.max,
        samples: total.samples,
        valley_violations: total.valley_violations,
    };
    tracing::info!(
        model = audited.name(),
        rounds,
        samples = report.samples,
        average = report.average,
        max = report.max,
        valley_ratio = report.valley_ratio(),
        "Stretch measured"
    );
    Ok(report)
}

fn record_deletion<A: RoutingModel>(
    audited: &A,
    a: Asn,
    b: Asn,
    outcome: &crate::repair::RepairOutcome,
    recorder: Option<&Recorder>,
) -> Result<()> {
    let topology = audited.topology();
    record(
        recorder,
        &[
            a.to_string(),
            b.to_string(),
            (topology.degree(a) + 1).to_string(),
            (topology.degree(b) + 1).to_string(),
            outcome.impacted_nodes.len().to_string(),
            outcome
                .distance_profile
                .as_ref()
                .map(|profile| profile.to_string())
                .unwrap_or_default(),
        ],
    )
}

/// Deletes `batches` random links (both endpoints of degree at least 2) from
/// `audited` and reports how many nodes each successful repair touched.
pub fn measure_edge_deletion_impact<A, R>(
    audited: &mut A,
    batches: usize,
    rng: &mut R,
    recorder: Option<&Recorder>,
) -> Result<ImpactReport>
where
    A: RoutingModel,
    R: Rng + ?Sized,
{
    let mut report = ImpactReport::default();
    let mut attempts = 0;

    while report.samples < batches {
        attempts += 1;
        if attempts > batches * DRAWS_PER_SAMPLE {
            tracing::warn!(samples = report.samples, batches, "Giving up on deletion sampling");
            break;
        }
        let Some((a, b)) = pick_link(audited.topology(), 2, rng) else {
            tracing::warn!(samples = report.samples, "No deletable link left");
            break;
        };

        let outcome = audited.remove_edge(a, b)?;
        match outcome.status {
            RepairStatus::Repaired => {
                report.add(outcome.impacted_nodes.len());
                record_deletion(audited, a, b, &outcome, recorder)?;
            }
            RepairStatus::Disconnected => {
                // later samples would measure a split graph
                report.disconnections += 1;
                tracing::warn!(a, b, samples = report.samples, "Deletion split the graph");
                break;
            }
            RepairStatus::NotPerformed => {}
        }
    }

    finish(recorder)?;
    Ok(report.finish())
}

/// Applies a fixed sequence of deletions, in order, and reports the impact
/// of the successful ones.
pub fn measure_chosen_edge_deletion_impact<A: RoutingModel>(
    audited: &mut A,
    deletions: &[(Asn, Asn)],
    recorder: Option<&Recorder>,
) -> Result<ImpactReport> {
    let mut report = ImpactReport::default();

    for &(a, b) in deletions {
        let outcome = audited.remove_edge(a, b)?;
        match outcome.status {
            RepairStatus::Repaired => {
                report.add(outcome.impacted_nodes.len());
                record_deletion(audited, a, b, &outcome, recorder)?;
            }
            RepairStatus::Disconnected => report.disconnections += 1,
            RepairStatus::NotPerformed => {
                tracing::debug!(a, b, "Listed deletion not performed");
            }
        }
    }

    finish(recorder)?;
    Ok(report.finish())
}

fn route_between<M: RoutingModel>(model: &mut M, origin: Asn, destination: Asn) -> Result<Option<Route>> {
    model.set_destinations(&[destination]);
    model.evolve();
    model.get_route(origin, destination)
}

fn withdraw<M: RoutingModel>(model: &mut M, destination: Asn) {
    model.delete_destination(destination);
    model.evolve();
}

fn out_of_sync(a: Asn, b: Asn) -> OracleError {
    OracleError::invariant(format!(
        "baseline refused deletion of {}-{} accepted by the audited model",
        a, b
    ))
}

/// Ratio of stretch between two neighbors after and before the link joining
/// them is deleted, over `batches` successful deletions. Works on clones;
/// a disconnection resets both clones to the originals.
pub fn measure_deletion_stretch<B, A, R>(
    baseline_original: &B,
    audited_original: &A,
    batches: usize,
    rng: &mut R,
    recorder: Option<&Recorder>,
) -> Result<StretchIncreaseReport>
where
    B: RoutingModel,
    A: RoutingModel,
    R: Rng + ?Sized,
{
    let mut baseline = baseline_original.clone();
    let mut audited = audited_original.clone();
    let mut report = StretchIncreaseReport::default();
    let mut attempts = 0;

    while report.samples < batches {
        attempts += 1;
        if attempts > batches * DRAWS_PER_SAMPLE {
            tracing::warn!(samples = report.samples, batches, "Giving up on deletion stretch");
            break;
        }
        let Some((a, b)) = pick_link(audited.topology(), 2, rng) else {
            break;
        };

        let baseline_before = route_between(&mut baseline, a, b)?;
        let audited_before = route_between(&mut audited, a, b)?;
        withdraw(&mut baseline, b);
        withdraw(&mut audited, b);

        let baseline_outcome = baseline.remove_edge(a, b)?;
        let outcome = audited.remove_edge(a, b)?;

        match outcome.status {
            RepairStatus::Repaired => {
                if !baseline_outcome.performed() {
                    return Err(out_of_sync(a, b));
                }
                let baseline_after = route_between(&mut baseline, a, b)?;
                let audited_after = audited.get_route(a, b)?;
                withdraw(&mut baseline, b);

                let (Some(bb), Some(ab), Some(ba), Some(aa)) =
                    (baseline_before, audited_before, baseline_after, audited_after)
                else {
                    // no valley-free path survives in the baseline
                    continue;
                };

                let before = ab.nodes.len() as f64 / bb.nodes.len() as f64;
                let after = aa.nodes.len() as f64 / ba.nodes.len() as f64;
                let sample = after / before;
                report.samples += 1;
                report.average_increase += sample;
                report.max_increase = report.max_increase.max(sample);

                record(
                    recorder,
                    &[
                        bb.nodes.len().to_string(),
                        format_path(&bb.nodes),
                        format_types(&bb.links),
                        ab.nodes.len().to_string(),
                        format_path(&ab.nodes),
                        format_types(&ab.links),
                        ba.nodes.len().to_string(),
                        format_path(&ba.nodes),
                        format_types(&ba.links),
                        aa.nodes.len().to_string(),
                        format_path(&aa.nodes),
                        format_types(&aa.links),
                    ],
                )?;
            }
            RepairStatus::Disconnected => {
                report.restarts += 1;
                AuditLogger::log_snapshot_restore(report.samples, report.restarts);
                baseline = baseline_original.clone();
                audited = audited_original.clone();
            }
            RepairStatus::NotPerformed => {}
        }
    }

    if report.samples > 0 {
        report.average_increase /= report.samples as f64;
    }
    finish(recorder)?;
    Ok(report)
}

/// Deletes `proportion` of the current links, all between nodes of degree at
/// least `min_degree`. Returns `false` if a deletion disconnected the graph;
/// the models are then in an unusable state.
pub fn deletions_round<B, A, R>(
    baseline: &mut B,
    audited: &mut A,
    proportion: f64,
    min_degree: usize,
    rng: &mut R,
) -> Result<bool>
where
    B: RoutingModel,
    A: RoutingModel,
    R: Rng + ?Sized,
{
    let mut to_delete = (audited.count_links() as f64 * proportion) as usize;
    tracing::info!(links = to_delete, "Starting deletion round");

    while to_delete > 0 {
        let (a, b) = pick_link(audited.topology(), min_degree, rng).ok_or_else(|| {
            OracleError::InvalidState(format!("no link left between nodes of degree >= {}", min_degree))
        })?;

        let baseline_outcome = baseline.remove_edge(a, b)?;
        let outcome = audited.remove_edge(a, b)?;
        match outcome.status {
            RepairStatus::Repaired => {
                if !baseline_outcome.performed() {
                    return Err(out_of_sync(a, b));
                }
                to_delete -= 1;
            }
            RepairStatus::Disconnected => return Ok(false),
            RepairStatus::NotPerformed => {
                return Err(OracleError::invariant(format!(
                    "legitimate deletion of {}-{} was refused",
                    a, b
                )));
            }
        }
    }

    Ok(true)
}

fn round_marker(recorder: Option<&Recorder>, round: usize) -> Result<()> {
    let marker = format!("-{}", round);
    record(recorder, &[marker.clone(), marker.clone(), marker])
}

fn accumulate_increase(report: &mut StretchIncreaseReport, previous: &mut f64, round: &RoundStretch) {
    let stretch = round.average();
    let increase = stretch - *previous;
    *previous = stretch;
    report.average_increase += increase;
    report.max_increase = report.max_increase.max(increase);
    report.samples += 1;
    tracing::info!(stretch, increase, "Round stretch measured");
}

/// Alternates stretch rounds with random deletion rounds. Each deletion
/// round removes `proportion` of the links; a round that disconnects the
/// graph is retried from a snapshot taken before it. On return `baseline`
/// and `audited` hold the final, damaged models.
pub fn measure_random_deletions_stretch<B, A, R>(
    baseline: &mut B,
    audited: &mut A,
    rounds: usize,
    proportion: f64,
    valley: ValleyCheck,
    rng: &mut R,
    recorder: Option<&Recorder>,
) -> Result<StretchIncreaseReport>
where
    B: RoutingModel,
    A: RoutingModel,
    R: Rng + ?Sized,
{
    let mut report = StretchIncreaseReport::default();
    let mut previous = 0.0;
    let excluded = BTreeSet::new();

    for round in 0..rounds {
        round_marker(recorder, round)?;
        let stretch = stretch_round(
            baseline,
            audited,
            SAMPLES_PER_ROUND,
            &excluded,
            valley,
            rng,
            recorder,
        )?;
        accumulate_increase(&mut report, &mut previous, &stretch);

        if round + 1 == rounds {
            break;
        }

        let safe_baseline = baseline.clone();
        let safe_audited = audited.clone();
        let mut retries = 0;
        while !deletions_round(baseline, audited, proportion, ROUND_DELETION_MIN_DEGREE, rng)? {
            retries += 1;
            report.restarts += 1;
            AuditLogger::log_snapshot_restore(round, retries);
            if retries > MAX_ROUND_RETRIES {
                return Err(OracleError::InvalidState(format!(
                    "round {} disconnected the graph {} times",
                    round, retries
                )));
            }
            *baseline = safe_baseline.clone();
            *audited = safe_audited.clone();
        }
    }

    if let Some(recorder) = recorder {
        let path = recorder
            .output_dir()
            .join(format!("missing-edges-{}x{:.3}.csv", rounds, proportion));
        write_topology(path, audited.topology())?;
    }

    if report.samples > 0 {
        report.average_increase /= report.samples as f64;
    }
    finish(recorder)?;
    Ok(report)
}

/// Like [`measure_random_deletions_stretch`], but the deletions come from a
/// fixed list split evenly over `rounds` rounds. Round 0 measures the
/// undamaged models. Nodes cut off by a deletion are no longer sampled.
pub fn measure_chosen_deletions_stretch<B, A, R>(
    baseline: &mut B,
    audited: &mut A,
    rounds: usize,
    deletions: &[(Asn, Asn)],
    valley: ValleyCheck,
    rng: &mut R,
    recorder: Option<&Recorder>,
) -> Result<StretchIncreaseReport>
where
    B: RoutingModel,
    A: RoutingModel,
    R: Rng + ?Sized,
{
    let mut report = StretchIncreaseReport::default();
    let mut previous = 0.0;
    let mut disconnected: BTreeSet<Asn> = BTreeSet::new();

    for round in 0..=rounds {
        round_marker(recorder, round)?;
        let stretch = stretch_round(
            baseline,
            audited,
            SAMPLES_PER_ROUND,
            &disconnected,
            valley,
            rng,
            recorder,
        )?;
        accumulate_increase(&mut report, &mut previous, &stretch);

        if round == rounds {
            break;
        }

        let start = round * deletions.len() / rounds;
        let end = if round + 1 == rounds {
            deletions.len()
        } else {
            (round + 1) * deletions.len() / rounds
        };
        tracing::info!(round, links = end - start, "Starting deletion round");

        for &(a, b) in &deletions[start..end] {
            let outcome = audited.remove_edge(a, b)?;
            match outcome.status {
                RepairStatus::Repaired => {
                    if !baseline.remove_edge(a, b)?.performed() {
                        return Err(out_of_sync(a, b));
                    }
                }
                RepairStatus::Disconnected => disconnected.extend(outcome.disconnected_nodes),
                RepairStatus::NotPerformed => {
                    tracing::warn!(
                        a,
                        b,
                        degree_a = audited.topology().degree(a),
                        degree_b = audited.topology().degree(b),
                        "Could not perform listed deletion"
                    );
                }
            }
        }
    }

    if rounds > 0 {
        // round 0 has no deletion behind it
        report.average_increase /= rounds as f64;
    }
    finish(recorder)?;
    Ok(report)
}

/// Landmark level used between two neighbors (both of degree at least
/// [`LEVEL_TRACKING_MIN_DEGREE`]) before and after their link is removed.
pub fn measure_landmark_level_after_deletion<B, R>(
    baseline_original: &B,
    audited_original: &TZOracle,
    samples: usize,
    rng: &mut R,
    recorder: Option<&Recorder>,
) -> Result<Vec<LevelSample>>
where
    B: RoutingModel,
    R: Rng + ?Sized,
{
    let mut baseline = baseline_original.clone();
    let mut audited = audited_original.clone();
    let mut collected = Vec::with_capacity(samples);
    let mut attempts = 0;

    while collected.len() < samples {
        attempts += 1;
        if attempts > samples * DRAWS_PER_SAMPLE {
            tracing::warn!(samples = collected.len(), "Giving up on level tracking");
            break;
        }
        let Some((a, b)) = pick_link(audited.topology(), LEVEL_TRACKING_MIN_DEGREE, rng) else {
            break;
        };

        let baseline_before = route_between(&mut baseline, a, b)?;
        let (level_before, path_before) = audited.approximate_path(a, b)?;
        withdraw(&mut baseline, b);

        let baseline_outcome = baseline.remove_edge(a, b)?;
        let outcome = audited.remove_edge(a, b)?;

        match outcome.status {
            RepairStatus::Repaired => {
                if !baseline_outcome.performed() {
                    return Err(out_of_sync(a, b));
                }
                let baseline_after = route_between(&mut baseline, a, b)?;
                withdraw(&mut baseline, b);
                let (level_after, path_after) = audited.approximate_path(a, b)?;

                let (Some(before), Some(after)) = (baseline_before, baseline_after) else {
                    continue;
                };

                record(
                    recorder,
                    &[
                        before.nodes.len().to_string(),
                        format_types(&before.links),
                        level_before.to_string(),
                        format_path(&path_before),
                        after.nodes.len().to_string(),
                        format_types(&after.links),
                        level_after.to_string(),
                        format_path(&path_after),
                    ],
                )?;

                collected.push(LevelSample {
                    origin: a,
                    destination: b,
                    level_before,
                    level_after,
                    hops_before: path_before.len().saturating_sub(1),
                    hops_after: path_after.len().saturating_sub(1),
                });
            }
            RepairStatus::Disconnected => {
                AuditLogger::log_snapshot_restore(collected.len(), attempts);
                baseline = baseline_original.clone();
                audited = audited_original.clone();
            }
            RepairStatus::NotPerformed => {}
        }
    }

    finish(recorder)?;
    Ok(collected)
}

/// Degrees of the two endpoints of every directed link.
pub fn measure_endpoint_degrees<M: RoutingModel>(
    model: &M,
    recorder: Option<&Recorder>,
) -> Result<Vec<(usize, usize)>> {
    let topology = model.topology();
    let mut degrees = Vec::with_capacity(topology.count_links() * 2);
    for node in topology.nodes() {
        for &other in node.links() {
            let pair = (node.degree(), topology.degree(other));
            record(recorder, &[pair.0.to_string(), pair.1.to_string()])?;
            degrees.push(pair);
        }
    }
    finish(recorder)?;
    Ok(degrees)
}
