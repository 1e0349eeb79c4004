//! Comparison of discovered events against the reference dataset.
//!
//! The [`ConformanceVerifier`] joins the two sets on event identifier and
//! evaluates them in a fixed sequence of stages:
//!
//! ```text
//! cardinality   |reference| == |discovered|          hard failure
//! identity      every reference id was discovered    hard failure per entry
//! parameters    discrete fields equal exactly        hard failure per entry
//! spatial       firingLocation within worldLocation  hard failure per entry
//!               initialVelocityVector within velocity  warning (advisory policy)
//! ```
//!
//! Parameter and spatial stages only look at entries whose identifier was
//! found.  Tolerances are absolute, per axis, and inclusive.  Every check
//! requires a non-empty discovered set; otherwise the report is
//! inconclusive and no comparison is attempted.

use crate::collector::DiscoveredSet;
use crate::config::{AggregationMode, CheckConfig, ThresholdConfig, VelocityPolicy};
use crate::oracle::{
    ConformanceReport, Diagnostic, DiagnosticKind, FieldMismatch, VerdictBuilder,
};
use crate::reference::ReferenceSet;
use firecheck_protocol::WeaponFireEvent;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name used for reports covering every stage.
pub const FULL_CHECK: &str = "weapon-fire";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Cardinality,
    Identity,
    Parameters,
    Spatial,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cardinality => write!(f, "cardinality"),
            Self::Identity => write!(f, "identity"),
            Self::Parameters => write!(f, "parameters"),
            Self::Spatial => write!(f, "spatial"),
        }
    }
}

/// A reference entry together with the discovered event sharing its
/// identifier.
type Matched<'a> = (&'a WeaponFireEvent, &'a WeaponFireEvent);

/// Compares a discovered set against a reference set.
///
/// # Example
///
/// ```
/// use firecheck_core::config::{AggregationMode, ThresholdConfig, VelocityPolicy};
/// use firecheck_core::{ConformanceVerifier, DiscoveredSet, ReferenceSet};
///
/// # fn demo(reference: &ReferenceSet, discovered: &DiscoveredSet) {
/// let verifier = ConformanceVerifier::new(ThresholdConfig::uniform(0.1), VelocityPolicy::Advisory);
/// let report = verifier.verify(reference, discovered, AggregationMode::AggregateAll);
/// println!("{}", report.verdict);
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ConformanceVerifier {
    thresholds: ThresholdConfig,
    velocity_policy: VelocityPolicy,
}

impl ConformanceVerifier {
    pub fn new(thresholds: ThresholdConfig, velocity_policy: VelocityPolicy) -> Self {
        Self {
            thresholds,
            velocity_policy,
        }
    }

    pub fn from_config(config: &CheckConfig) -> Self {
        Self::new(config.thresholds, config.velocity_policy)
    }

    // ───────────────────────────────────────────────────────────────────
    //  Standalone checks
    // ───────────────────────────────────────────────────────────────────

    /// Size comparison only.
    pub fn check_cardinality(
        &self,
        reference: &ReferenceSet,
        discovered: &DiscoveredSet,
    ) -> ConformanceReport {
        let mut builder = begin("cardinality", reference, discovered);
        if builder.is_inconclusive() {
            return builder.build();
        }
        builder.begin_stage(Stage::Cardinality);
        cardinality_pass(reference, discovered, &mut builder);
        builder.build()
    }

    /// Every reference identifier must have been discovered.
    pub fn check_identity(
        &self,
        reference: &ReferenceSet,
        discovered: &DiscoveredSet,
    ) -> ConformanceReport {
        let mut builder = begin("identity", reference, discovered);
        if builder.is_inconclusive() {
            return builder.build();
        }
        builder.begin_stage(Stage::Identity);
        for (expected, _) in identity_pass(reference, discovered, &mut builder) {
            builder.confirm(expected.identifier.clone());
        }
        builder.build()
    }

    /// Exact equality of the discrete fields of identity-matched entries.
    /// A reference entry that was never discovered fails the check.
    pub fn check_parameters(
        &self,
        reference: &ReferenceSet,
        discovered: &DiscoveredSet,
    ) -> ConformanceReport {
        let mut builder = begin("parameters", reference, discovered);
        if builder.is_inconclusive() {
            return builder.build();
        }
        builder.begin_stage(Stage::Parameters);
        let matched = identity_pass(reference, discovered, &mut builder);
        let ok = parameter_pass(&matched, &mut builder);
        confirm_where(&matched, &ok, &mut builder);
        builder.build()
    }

    /// Tolerance checks of identity-matched entries.  A reference entry
    /// that was never discovered fails the check.
    pub fn check_spatial(
        &self,
        reference: &ReferenceSet,
        discovered: &DiscoveredSet,
    ) -> ConformanceReport {
        let mut builder = begin("spatial", reference, discovered);
        if builder.is_inconclusive() {
            return builder.build();
        }
        builder.begin_stage(Stage::Spatial);
        let matched = identity_pass(reference, discovered, &mut builder);
        let ok = self.spatial_pass(&matched, &mut builder);
        confirm_where(&matched, &ok, &mut builder);
        builder.build()
    }

    // ───────────────────────────────────────────────────────────────────
    //  Full sequence
    // ───────────────────────────────────────────────────────────────────

    /// Run every stage in order, sequenced according to `mode`.
    pub fn verify(
        &self,
        reference: &ReferenceSet,
        discovered: &DiscoveredSet,
        mode: AggregationMode,
    ) -> ConformanceReport {
        let mut builder = begin(FULL_CHECK, reference, discovered);
        if builder.is_inconclusive() {
            return builder.build();
        }
        let fail_fast = mode == AggregationMode::FailFast;

        builder.begin_stage(Stage::Cardinality);
        cardinality_pass(reference, discovered, &mut builder);
        builder.begin_stage(Stage::Identity);
        let matched = identity_pass(reference, discovered, &mut builder);
        if fail_fast && builder.has_failures() {
            return halt(builder, Stage::Identity);
        }

        builder.begin_stage(Stage::Parameters);
        let parameters_ok = parameter_pass(&matched, &mut builder);
        if fail_fast && builder.has_failures() {
            return halt(builder, Stage::Parameters);
        }

        builder.begin_stage(Stage::Spatial);
        let spatial_ok = self.spatial_pass(&matched, &mut builder);

        for (i, (expected, _)) in matched.iter().enumerate() {
            if parameters_ok[i] && spatial_ok[i] {
                info!("OKAY: WeaponFire {} conforms", expected.identifier);
                builder.confirm(expected.identifier.clone());
            }
        }
        builder.build()
    }

    /// Per-axis tolerance checks.  Returns, per pair, whether no hard
    /// failure was recorded.
    fn spatial_pass(&self, matched: &[Matched<'_>], builder: &mut VerdictBuilder) -> Vec<bool> {
        matched
            .iter()
            .map(|(expected, observed)| {
                let id = &expected.identifier;
                let mut ok = true;

                // `|a - b| <= t` is false for NaN, so NaN never passes.
                let tolerance = self.thresholds.world_location;
                let location = axis_violations(
                    "firingLocation",
                    expected.firing_location.axes(),
                    observed.firing_location.axes(),
                    |e: f64, o: f64| (e - o).abs() <= tolerance,
                );
                if !location.is_empty() {
                    ok = false;
                    info!("FAIL: WeaponFire {} firing location out of tolerance", id);
                    builder.record(
                        Diagnostic::failure(
                            DiagnosticKind::LocationOutOfTolerance,
                            Some(id.clone()),
                            format!(
                                "firingLocation outside tolerance {}",
                                self.thresholds.world_location
                            ),
                        )
                        .with_fields(location),
                    );
                }

                // Velocity travels as f32; compare at that precision.
                let tolerance = self.thresholds.velocity as f32;
                let velocity = axis_violations(
                    "initialVelocityVector",
                    expected.initial_velocity_vector.components(),
                    observed.initial_velocity_vector.components(),
                    |e: f32, o: f32| (e - o).abs() <= tolerance,
                );
                if !velocity.is_empty() {
                    let message = format!(
                        "initialVelocityVector outside tolerance {}",
                        self.thresholds.velocity
                    );
                    match self.velocity_policy {
                        VelocityPolicy::Advisory => {
                            warn!(
                                "WeaponFire {} initial velocity out of tolerance (advisory)",
                                id
                            );
                            builder.record(
                                Diagnostic::warning(
                                    DiagnosticKind::VelocityOutOfTolerance,
                                    Some(id.clone()),
                                    message,
                                )
                                .with_fields(velocity),
                            );
                        }
                        VelocityPolicy::Enforced => {
                            ok = false;
                            info!("FAIL: WeaponFire {} initial velocity out of tolerance", id);
                            builder.record(
                                Diagnostic::failure(
                                    DiagnosticKind::VelocityOutOfTolerance,
                                    Some(id.clone()),
                                    message,
                                )
                                .with_fields(velocity),
                            );
                        }
                    }
                }
                ok
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Passes
// ═══════════════════════════════════════════════════════════════════════

fn begin(check: &str, reference: &ReferenceSet, discovered: &DiscoveredSet) -> VerdictBuilder {
    let mut builder = VerdictBuilder::new(check, reference.len(), discovered.len());
    if discovered.is_empty() {
        warn!("No WeaponFire interactions were discovered; {} check is inconclusive", check);
        builder.inconclusive("no WeaponFire interactions were discovered");
    }
    builder
}

fn halt(mut builder: VerdictBuilder, stage: Stage) -> ConformanceReport {
    info!("Stopping after failed {} stage", stage);
    builder.halt_after(stage);
    builder.build()
}

fn cardinality_pass(
    reference: &ReferenceSet,
    discovered: &DiscoveredSet,
    builder: &mut VerdictBuilder,
) -> bool {
    if reference.len() == discovered.len() {
        return true;
    }
    info!(
        "FAIL: {} reference events but {} discovered",
        reference.len(),
        discovered.len()
    );
    builder.record(Diagnostic::failure(
        DiagnosticKind::Cardinality,
        None,
        format!(
            "expected {} WeaponFire events, discovered {}",
            reference.len(),
            discovered.len()
        ),
    ));
    false
}

fn identity_pass<'a>(
    reference: &'a ReferenceSet,
    discovered: &'a DiscoveredSet,
    builder: &mut VerdictBuilder,
) -> Vec<Matched<'a>> {
    let mut matched = Vec::with_capacity(reference.len());
    for expected in reference {
        match discovered.get(&expected.identifier) {
            Some(observed) => matched.push((expected, observed)),
            None => {
                info!("FAIL: WeaponFire {} was not discovered", expected.identifier);
                builder.record(Diagnostic::failure(
                    DiagnosticKind::MissingIdentity,
                    Some(expected.identifier.clone()),
                    "no discovered WeaponFire with this identifier",
                ));
            }
        }
    }
    matched
}

fn parameter_pass(matched: &[Matched<'_>], builder: &mut VerdictBuilder) -> Vec<bool> {
    matched
        .iter()
        .map(|(expected, observed)| {
            let fields = parameter_mismatches(expected, observed);
            if fields.is_empty() {
                return true;
            }
            info!(
                "FAIL: WeaponFire {} differs in {} parameter(s)",
                expected.identifier,
                fields.len()
            );
            builder.record(
                Diagnostic::failure(
                    DiagnosticKind::ParameterMismatch,
                    Some(expected.identifier.clone()),
                    "parameters differ from the reference",
                )
                .with_fields(fields),
            );
            false
        })
        .collect()
}

fn confirm_where(matched: &[Matched<'_>], ok: &[bool], builder: &mut VerdictBuilder) {
    for ((expected, _), ok) in matched.iter().zip(ok) {
        if *ok {
            builder.confirm(expected.identifier.clone());
        }
    }
}

/// Every discrete field that differs, in a fixed order.
pub fn parameter_mismatches(
    expected: &WeaponFireEvent,
    observed: &WeaponFireEvent,
) -> Vec<FieldMismatch> {
    let mut out = Vec::new();
    compare(&mut out, "firingObjectId", &expected.firing_object_id, &observed.firing_object_id);
    compare(&mut out, "targetObjectId", &expected.target_object_id, &observed.target_object_id);
    compare(
        &mut out,
        "munitionObjectId",
        &expected.munition_object_id,
        &observed.munition_object_id,
    );
    compare(&mut out, "munitionType", &expected.munition_type, &observed.munition_type);
    compare(&mut out, "warheadType", &expected.warhead_type, &observed.warhead_type);
    compare(&mut out, "fuseType", &expected.fuse_type, &observed.fuse_type);
    compare(&mut out, "quantityFired", &expected.quantity_fired, &observed.quantity_fired);
    compare(&mut out, "rateOfFire", &expected.rate_of_fire, &observed.rate_of_fire);
    compare(
        &mut out,
        "fireMissionIndex",
        &expected.fire_mission_index,
        &observed.fire_mission_index,
    );
    compare(
        &mut out,
        "fireControlSolutionRange",
        &expected.fire_control_solution_range,
        &observed.fire_control_solution_range,
    );
    out
}

fn compare<T: PartialEq + fmt::Display>(
    out: &mut Vec<FieldMismatch>,
    field: &str,
    expected: &T,
    observed: &T,
) {
    if expected != observed {
        out.push(FieldMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            observed: observed.to_string(),
        });
    }
}

/// Axes where `within(expected, observed)` does not hold.
fn axis_violations<T: Copy + fmt::Display>(
    field: &str,
    expected: [T; 3],
    observed: [T; 3],
    within: impl Fn(T, T) -> bool,
) -> Vec<FieldMismatch> {
    ["x", "y", "z"]
        .into_iter()
        .zip(expected.into_iter().zip(observed))
        .filter(|&(_, (e, o))| !within(e, o))
        .map(|(axis, (e, o))| FieldMismatch {
            field: format!("{}.{}", field, axis),
            expected: e.to_string(),
            observed: o.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{event, sut};
    use crate::oracle::Verdict;
    use firecheck_protocol::{EntityType, VelocityVector, WorldLocation};

    fn verifier(tolerance: f64) -> ConformanceVerifier {
        ConformanceVerifier::new(ThresholdConfig::uniform(tolerance), VelocityPolicy::Advisory)
    }

    fn reference(events: Vec<WeaponFireEvent>) -> ReferenceSet {
        ReferenceSet::new(events).unwrap()
    }

    fn verify_all(
        v: &ConformanceVerifier,
        reference: &ReferenceSet,
        discovered: &DiscoveredSet,
    ) -> ConformanceReport {
        v.verify(reference, discovered, AggregationMode::AggregateAll)
    }

    #[test]
    fn empty_discovery_is_inconclusive_for_every_check() {
        let reference = reference(vec![sut(1)]);
        let discovered = DiscoveredSet::new();
        let v = verifier(0.1);

        for report in [
            v.check_cardinality(&reference, &discovered),
            v.check_identity(&reference, &discovered),
            v.check_parameters(&reference, &discovered),
            v.check_spatial(&reference, &discovered),
            verify_all(&v, &reference, &discovered),
            v.verify(&reference, &discovered, AggregationMode::FailFast),
        ] {
            assert_eq!(report.verdict, Verdict::Inconclusive, "{}", report.check);
            assert!(report.failures.is_empty());
            assert!(report.stages.is_empty());
        }
    }

    #[test]
    fn identical_sets_pass() {
        let reference = reference(vec![sut(1), sut(2)]);
        let discovered = DiscoveredSet::from_events([sut(2), sut(1)]);
        let report = verify_all(&verifier(0.1), &reference, &discovered);

        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.confirmed.len(), 2);
        assert_eq!(
            report.stages,
            vec![Stage::Cardinality, Stage::Identity, Stage::Parameters, Stage::Spatial]
        );
    }

    #[test]
    fn extra_discovered_event_fails_on_cardinality() {
        let reference = reference(vec![sut(1), sut(2)]);
        let discovered = DiscoveredSet::from_events([sut(1), sut(2), sut(3)]);
        let report = verify_all(&verifier(0.1), &reference, &discovered);

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, DiagnosticKind::Cardinality);
        assert_eq!(report.failures[0].identifier, None);
        // Both entries still individually conform.
        assert_eq!(report.confirmed.len(), 2);
    }

    #[test]
    fn missing_identity_names_the_entry() {
        let reference = reference(vec![sut(1), sut(2)]);
        let discovered = DiscoveredSet::from_events([sut(1), event("OTHER", 2)]);
        let report = verifier(0.1).check_identity(&reference, &discovered);

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, DiagnosticKind::MissingIdentity);
        assert_eq!(report.failures[0].identifier, Some(sut(2).identifier));
        assert_eq!(report.confirmed, vec![sut(1).identifier]);
    }

    #[test]
    fn standalone_checks_fail_on_undiscovered_entries() {
        let reference = reference(vec![sut(1), sut(2)]);
        let discovered = DiscoveredSet::from_events([sut(1)]);
        let v = verifier(0.1);

        for report in [
            v.check_parameters(&reference, &discovered),
            v.check_spatial(&reference, &discovered),
        ] {
            assert_eq!(report.verdict, Verdict::Fail, "{} check", report.check);
            assert_eq!(report.failures.len(), 1);
            assert_eq!(report.failures[0].kind, DiagnosticKind::MissingIdentity);
            assert_eq!(report.failures[0].identifier, Some(sut(2).identifier));
            assert_eq!(report.confirmed, vec![sut(1).identifier]);
        }
    }

    #[test]
    fn location_tolerance_is_inclusive() {
        let reference = reference(vec![sut(1)]);
        let mut on_boundary = sut(1);
        on_boundary.firing_location = WorldLocation::new(0.1, 0.0, 0.0);
        let mut beyond = sut(1);
        beyond.firing_location = WorldLocation::new(0.1000001, 0.0, 0.0);
        let v = verifier(0.1);

        let report = v.check_spatial(&reference, &DiscoveredSet::from_events([on_boundary]));
        assert_eq!(report.verdict, Verdict::Pass);

        let report = v.check_spatial(&reference, &DiscoveredSet::from_events([beyond]));
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.failures[0].kind, DiagnosticKind::LocationOutOfTolerance);
        assert_eq!(report.failures[0].fields.len(), 1);
        assert_eq!(report.failures[0].fields[0].field, "firingLocation.x");
    }

    #[test]
    fn nan_location_never_passes() {
        let reference = reference(vec![sut(1)]);
        let mut observed = sut(1);
        observed.firing_location = WorldLocation::new(f64::NAN, 0.0, 0.0);
        let report = verifier(1e9).check_spatial(&reference, &DiscoveredSet::from_events([observed]));
        assert_eq!(report.verdict, Verdict::Fail);
    }

    #[test]
    fn velocity_is_advisory_by_default() {
        let mut expected = sut(1);
        expected.initial_velocity_vector = VelocityVector::new(10.0, 0.0, 0.0);
        let mut observed = sut(1);
        observed.initial_velocity_vector = VelocityVector::new(500.0, 0.0, 0.0);
        let reference = reference(vec![expected]);
        let discovered = DiscoveredSet::from_events([observed]);

        let report = verify_all(&verifier(1.0), &reference, &discovered);
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, DiagnosticKind::VelocityOutOfTolerance);
        assert_eq!(report.confirmed.len(), 1);
    }

    #[test]
    fn enforced_velocity_fails() {
        let mut observed = sut(1);
        observed.initial_velocity_vector = VelocityVector::new(500.0, 0.0, 0.0);
        let reference = reference(vec![sut(1)]);
        let discovered = DiscoveredSet::from_events([observed]);
        let v = ConformanceVerifier::new(ThresholdConfig::uniform(1.0), VelocityPolicy::Enforced);

        let report = verify_all(&v, &reference, &discovered);
        assert_eq!(report.verdict, Verdict::Fail);
        assert!(report.warnings.is_empty());
        assert!(report.confirmed.is_empty());
    }

    #[test]
    fn velocity_tolerance_is_inclusive_at_wire_precision() {
        let mut expected = sut(1);
        expected.initial_velocity_vector = VelocityVector::new(0.0, 0.0, 0.0);
        let mut on_boundary = sut(1);
        on_boundary.initial_velocity_vector = VelocityVector::new(0.1, 0.0, 0.0);
        let mut beyond = sut(1);
        beyond.initial_velocity_vector = VelocityVector::new(0.11, 0.0, 0.0);
        let reference = reference(vec![expected]);
        let v = ConformanceVerifier::new(ThresholdConfig::uniform(0.1), VelocityPolicy::Enforced);

        let report = v.check_spatial(&reference, &DiscoveredSet::from_events([on_boundary]));
        assert_eq!(report.verdict, Verdict::Pass, "{:?}", report.failures);

        let report = v.check_spatial(&reference, &DiscoveredSet::from_events([beyond]));
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.failures[0].kind, DiagnosticKind::VelocityOutOfTolerance);
        assert_eq!(report.failures[0].fields[0].field, "initialVelocityVector.x");
        assert_eq!(report.failures[0].fields[0].observed, "0.11");
    }

    #[test]
    fn small_location_delta_passes_but_munition_change_fails() {
        let mut observed = sut(1);
        observed.firing_location = WorldLocation::new(0.05, 0.0, 0.0);
        let reference = reference(vec![sut(1)]);
        let v = verifier(0.1);

        let report = verify_all(&v, &reference, &DiscoveredSet::from_events([observed.clone()]));
        assert_eq!(report.verdict, Verdict::Pass);

        observed.munition_type = EntityType::new(2, 9, 225, 2, 14, 2, 0);
        let report = verify_all(&v, &reference, &DiscoveredSet::from_events([observed]));
        assert_eq!(report.verdict, Verdict::Fail);
        let failures = report.failures_for(&sut(1).identifier);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, DiagnosticKind::ParameterMismatch);
        assert_eq!(failures[0].fields[0].field, "munitionType");
        assert_eq!(failures[0].fields[0].expected, "2.9.225.2.14.1.0");
        assert_eq!(failures[0].fields[0].observed, "2.9.225.2.14.2.0");
    }

    #[test]
    fn parameter_diagnostic_lists_every_mismatch() {
        let mut observed = sut(1);
        observed.fuse_type = 0;
        observed.quantity_fired = 4;
        observed.target_object_id = "bmp-9".into();
        let fields = parameter_mismatches(&sut(1), &observed);
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["targetObjectId", "fuseType", "quantityFired"]);
    }

    #[test]
    fn spatial_fields_are_not_parameters() {
        let mut observed = sut(1);
        observed.firing_location = WorldLocation::new(100.0, 0.0, 0.0);
        let report = verifier(0.1)
            .check_parameters(&reference(vec![sut(1)]), &DiscoveredSet::from_events([observed]));
        assert_eq!(report.verdict, Verdict::Pass);
    }

    #[test]
    fn aggregate_all_reports_every_stage() {
        let mut bad_params = sut(2);
        bad_params.warhead_type = 0;
        let mut bad_location = sut(3);
        bad_location.firing_location = WorldLocation::new(0.0, 5.0, 0.0);
        let reference = reference(vec![sut(1), sut(2), sut(3), sut(4)]);
        let discovered = DiscoveredSet::from_events([sut(1), bad_params, bad_location]);

        let report = verify_all(&verifier(0.1), &reference, &discovered);
        let kinds: Vec<DiagnosticKind> = report.failures.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::Cardinality,
                DiagnosticKind::MissingIdentity,
                DiagnosticKind::ParameterMismatch,
                DiagnosticKind::LocationOutOfTolerance,
            ]
        );
        assert_eq!(report.confirmed, vec![sut(1).identifier]);
        assert_eq!(report.halted_after, None);
    }

    #[test]
    fn fail_fast_stops_after_identity_stage() {
        let mut bad_params = sut(2);
        bad_params.warhead_type = 0;
        let reference = reference(vec![sut(1), sut(2), sut(3)]);
        let discovered = DiscoveredSet::from_events([sut(1), bad_params]);

        let report = verifier(0.1).verify(&reference, &discovered, AggregationMode::FailFast);
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.halted_after, Some(Stage::Identity));
        assert_eq!(report.stages, vec![Stage::Cardinality, Stage::Identity]);
        assert!(report
            .failures
            .iter()
            .all(|d| d.kind != DiagnosticKind::ParameterMismatch));
        assert!(report.confirmed.is_empty());
    }

    #[test]
    fn fail_fast_evaluates_every_entry_within_a_stage() {
        let mut a = sut(1);
        a.fuse_type = 0;
        let mut b = sut(2);
        b.fuse_type = 0;
        let mut c = sut(3);
        c.firing_location = WorldLocation::new(9.0, 9.0, 9.0);
        let reference = reference(vec![sut(1), sut(2), sut(3)]);
        let discovered = DiscoveredSet::from_events([a, b, c]);

        let report = verifier(0.1).verify(&reference, &discovered, AggregationMode::FailFast);
        assert_eq!(report.halted_after, Some(Stage::Parameters));
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .all(|d| d.kind == DiagnosticKind::ParameterMismatch));
    }
}
