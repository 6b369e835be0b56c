//! Component to feeder assignment.
//!
//! A component goes to the first feeder (in reference file order) whose note
//! names the component's footprint, whose primary value equals the
//! component's primary value, and which satisfies every further parameter of
//! the component: ratings must be at least, tolerances at most, the
//! component's figure. Parameters without a comparison rule must appear
//! verbatim in the feeder note.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::MachineConfig;
use crate::parser::board_schema::{Board, Footprint, Side};
use crate::reference::Feeder;
use crate::value::{Unit, ValueToken};

/// Where a component ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Bucket {
    Fiducial,
    /// Index into the feeder list.
    Feeder(usize),
    Unassigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Feeder value must be at least the component value (ratings).
    AtLeast,
    /// Feeder value must be at most the component value (tolerances).
    AtMost,
}

impl CompareOp {
    fn holds(self, feeder: &ValueToken, component: &ValueToken) -> bool {
        match (feeder.magnitude(), component.magnitude()) {
            (Some(f), Some(c)) => match self {
                CompareOp::AtLeast => f >= c,
                CompareOp::AtMost => f <= c,
            },
            _ => false,
        }
    }
}

/// Comparison rule for a parameter unit of a designator group.
pub fn compare_op(designator: &str, unit: Unit) -> Option<CompareOp> {
    use CompareOp::*;
    match (designator, unit) {
        ("R", Unit::Volt | Unit::Ampere | Unit::Watt) => Some(AtLeast),
        ("R", Unit::Percent | Unit::Ppm) => Some(AtMost),
        ("C", Unit::Volt) => Some(AtLeast),
        ("C", Unit::Percent) => Some(AtMost),
        ("L", Unit::Ampere) => Some(AtLeast),
        ("L", Unit::Percent) => Some(AtMost),
        _ => None,
    }
}

/// Primary values: equal magnitude, units equal or at least one absent.
fn primary_matches(feeder: &ValueToken, component: &ValueToken) -> bool {
    let units_ok = match (feeder.unit, component.unit) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    };
    if !units_ok {
        return false;
    }
    match (feeder.magnitude(), component.magnitude()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Does some feeder token satisfy the component parameter `param`?
pub fn match_param(param: &ValueToken, feeder_params: &[ValueToken], designator: &str) -> bool {
    let op = param.unit.and_then(|unit| compare_op(designator, unit));
    match op {
        None => feeder_params.iter().any(|fp| fp.raw == param.raw),
        Some(op) => feeder_params
            .iter()
            .any(|fp| fp.same_unit(param) && op.holds(fp, param)),
    }
}

fn feeder_accepts(feeder: &Feeder, component: &Footprint) -> bool {
    if !feeder.note().contains(component.footprint.as_str()) {
        return false;
    }
    let (Some(primary), Some(feeder_primary)) = (component.params.first(), feeder.params.first())
    else {
        return false;
    };
    if !primary_matches(feeder_primary, primary) {
        return false;
    }
    component.params[1..]
        .iter()
        .all(|param| match_param(param, &feeder.params, &component.designator))
}

/// Index of the first feeder that can supply `component`.
pub fn assign_component(feeders: &[Feeder], component: &Footprint) -> Option<usize> {
    feeders.iter().position(|feeder| feeder_accepts(feeder, component))
}

/// Components of one board side distributed over buckets.
#[derive(Debug, Clone, Default)]
pub struct Assignments<'a> {
    buckets: BTreeMap<Bucket, Vec<&'a Footprint>>,
}

impl<'a> Assignments<'a> {
    pub fn get(&self, bucket: Bucket) -> &[&'a Footprint] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fiducials(&self) -> &[&'a Footprint] {
        self.get(Bucket::Fiducial)
    }

    pub fn unassigned(&self) -> &[&'a Footprint] {
        self.get(Bucket::Unassigned)
    }

    /// Feeder buckets with at least one component, ascending feeder index.
    pub fn by_feeder(&self) -> impl Iterator<Item = (usize, &[&'a Footprint])> + '_ {
        self.buckets.iter().filter_map(|(bucket, parts)| match bucket {
            Bucket::Feeder(idx) => Some((*idx, parts.as_slice())),
            _ => None,
        })
    }

    /// True if at least one component has a feeder.
    pub fn has_feeder_assignments(&self) -> bool {
        self.by_feeder().next().is_some()
    }

    pub fn assigned_count(&self) -> usize {
        self.by_feeder().map(|(_, parts)| parts.len()).sum()
    }

    /// Bucket holding the component with reference `reference`.
    pub fn bucket_of(&self, reference: &str) -> Option<Bucket> {
        self.buckets
            .iter()
            .find(|(_, parts)| parts.iter().any(|fp| fp.reference == reference))
            .map(|(bucket, _)| *bucket)
    }

    fn push(&mut self, bucket: Bucket, footprint: &'a Footprint) {
        self.buckets.entry(bucket).or_default().push(footprint);
    }
}

/// Distribute every component of `side` over fiducial, feeder and
/// unassigned buckets.
pub fn assign_components<'a>(
    board: &'a Board,
    feeders: &[Feeder],
    side: Side,
    config: &MachineConfig,
) -> Assignments<'a> {
    let mut assignments = Assignments::default();
    for component in board.footprints.on_side(side) {
        let bucket = if component.value == config.fiducial_value {
            Bucket::Fiducial
        } else if feeders.is_empty() {
            Bucket::Unassigned
        } else {
            assign_component(feeders, component)
                .map(Bucket::Feeder)
                .unwrap_or(Bucket::Unassigned)
        };
        assignments.push(bucket, component);
    }

    tracing::debug!(
        "Assigned {} of {} {} components, {} fiducials, {} unassigned",
        assignments.assigned_count(),
        board.footprints.on_side(side).count(),
        side,
        assignments.fiducials().len(),
        assignments.unassigned().len()
    );
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::board_schema::BoardPosition;
    use crate::reference::Record;
    use crate::value::tokenize;

    fn feeder(id: &str, note: &str) -> Feeder {
        let mut record = Record::new();
        record.insert("ID".to_string(), id.to_string());
        record.insert("Note".to_string(), note.to_string());
        Feeder::from_record(record, &MachineConfig::default())
    }

    fn component(reference: &str, value: &str, footprint: &str) -> Footprint {
        let split = reference.find(|c: char| c.is_ascii_digit()).unwrap();
        Footprint {
            reference: reference.to_string(),
            designator: reference[..split].to_string(),
            index: reference[split..].parse().unwrap(),
            value: value.to_string(),
            params: tokenize(value),
            footprint: footprint.to_string(),
            side: Side::Top,
            position: BoardPosition::default(),
        }
    }

    #[test]
    fn test_primary_multiplier_equivalence() {
        let feeders = vec![feeder("1", "10000 fp:R_0402")];
        assert_eq!(assign_component(&feeders, &component("R1", "10k", "R_0402")), Some(0));
    }

    #[test]
    fn test_primary_unit_mismatch() {
        let feeders = vec![feeder("1", "10uF fp:C_0402")];
        assert_eq!(assign_component(&feeders, &component("C1", "10uH", "C_0402")), None);
        // one side without unit is fine
        assert_eq!(assign_component(&feeders, &component("C1", "10u", "C_0402")), Some(0));
    }

    #[test]
    fn test_ohm_symbols_are_equivalent() {
        let feeders = vec![feeder("1", "4.7kΩ fp:R_0402")];
        assert_eq!(assign_component(&feeders, &component("R1", "4.7kR", "R_0402")), Some(0));
    }

    #[test]
    fn test_footprint_must_be_in_note() {
        let feeders = vec![feeder("1", "10k fp:R_0603")];
        assert_eq!(assign_component(&feeders, &component("R1", "10k", "R_0402")), None);
    }

    #[test]
    fn test_ratings_and_tolerances() {
        let feeders = vec![feeder("1", "0.1uF 50V X7R 5% fp:C_0402")];
        assert_eq!(assign_component(&feeders, &component("C1", "100nF 25V 10%", "C_0402")), Some(0));
        assert_eq!(assign_component(&feeders, &component("C1", "100nF 63V", "C_0402")), None);
        assert_eq!(assign_component(&feeders, &component("C1", "100nF 1%", "C_0402")), None);
    }

    #[test]
    fn test_unruled_params_need_raw_match() {
        let feeders = vec![feeder("1", "0.1uF 50V X7R fp:C_0402")];
        assert_eq!(assign_component(&feeders, &component("C1", "0.1uF X7R", "C_0402")), Some(0));
        assert_eq!(assign_component(&feeders, &component("C1", "0.1uF X5R", "C_0402")), None);
        // no W rule for capacitors: "50V" matches raw, "1W" does not
        assert_eq!(assign_component(&feeders, &component("C1", "0.1uF 1W", "C_0402")), None);
    }

    #[test]
    fn test_first_fit_wins() {
        let feeders = vec![
            feeder("1", "10uF fp:C_0805"),
            feeder("2", "10k 1% fp:R_0402"),
            feeder("3", "10k 1% fp:R_0402"),
        ];
        assert_eq!(assign_component(&feeders, &component("R5", "10k 5%", "R_0402")), Some(1));
    }

    #[test]
    fn test_raw_only_primary_never_matches() {
        let feeders = vec![feeder("80", "STM32F103 fp:LQFP-48")];
        assert_eq!(assign_component(&feeders, &component("U1", "STM32F103", "LQFP-48")), None);
        assert_eq!(assign_component(&feeders, &component("U1", "", "LQFP-48")), None);
    }

    #[test]
    fn test_compare_op_table() {
        assert_eq!(compare_op("R", Unit::Watt), Some(CompareOp::AtLeast));
        assert_eq!(compare_op("R", Unit::Ppm), Some(CompareOp::AtMost));
        assert_eq!(compare_op("C", Unit::Ampere), None);
        assert_eq!(compare_op("L", Unit::Ampere), Some(CompareOp::AtLeast));
        assert_eq!(compare_op("U", Unit::Volt), None);
    }

    #[test]
    fn test_buckets() {
        let mut board = Board::default();
        board.footprints.insert(component("FID1", "Fiducial", "Fiducial_1mm"));
        board.footprints.insert(component("R1", "10k", "R_0402"));
        board.footprints.insert(component("R2", "22k", "R_0402"));
        let mut bottom = component("R3", "10k", "R_0402");
        bottom.side = Side::Bottom;
        board.footprints.insert(bottom);

        let feeders = vec![feeder("1", "10k fp:R_0402")];
        let config = MachineConfig::default();
        let a = assign_components(&board, &feeders, Side::Top, &config);
        assert_eq!(a.bucket_of("FID1"), Some(Bucket::Fiducial));
        assert_eq!(a.bucket_of("R1"), Some(Bucket::Feeder(0)));
        assert_eq!(a.bucket_of("R2"), Some(Bucket::Unassigned));
        assert_eq!(a.bucket_of("R3"), None);
        assert!(a.has_feeder_assignments());

        let none = assign_components(&board, &[], Side::Top, &config);
        assert_eq!(none.fiducials().len(), 1);
        assert_eq!(none.unassigned().len(), 2);
        assert!(!none.has_feeder_assignments());
    }
}
