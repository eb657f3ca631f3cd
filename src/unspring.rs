//! UNSPRING monitor (SE, spec.md §4.11): periodically aggregates an entity
//! over a set of test springs and, on sustained threshold exceedance,
//! deactivates a modified-spring set (and reactivates an activation set).

use crate::callback::ScalarFn;
use crate::spring::{LinearSpring, SpringStatus};

/// Aggregate entity read from a test spring (spec.md glossary: STROKE is
/// signed elongation; SF is the spring-law force alone; STF is the total
/// applied force including dashpot and friction).
#[derive(Clone, Copy, Debug, Default)]
pub enum Entity {
    Stroke,
    #[default]
    SpringForce,
    TotalForce,
}

fn entity_value(spring: &LinearSpring, entity: Entity) -> f64 {
    match entity {
        Entity::Stroke => spring.stroke_record[0],
        Entity::SpringForce => spring.force_record[1],
        Entity::TotalForce => spring.force_record[0],
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub enum Operator {
    #[default]
    Sum,
    Min,
    Max,
}

fn aggregate(values: &[f64], operator: Operator) -> f64 {
    match operator {
        Operator::Sum => values.iter().sum(),
        Operator::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Operator::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// What happens to a modified spring once the rule triggers: instant
/// silence, or a fade-out multiplier (spec.md §4.4/§4.11: `unaction < 0`
/// means instant, otherwise a load-curve index).
#[derive(Clone)]
pub enum UnloadAction {
    Instant,
    Fade(ScalarFn),
}

pub struct UnspringRule {
    pub test_springs: Vec<usize>,
    pub modified_springs: Vec<usize>,
    pub activate: Vec<usize>,
    pub entity: Entity,
    pub operator: Operator,
    pub abs: bool,
    pub lo: Option<f64>,
    pub hi: Option<f64>,
    pub nsteps: u64,
    pub nfreq: u32,
    pub unload_action: UnloadAction,

    consecutive_exceedances: u32,
}

impl UnspringRule {
    pub fn new(
        test_springs: Vec<usize>,
        modified_springs: Vec<usize>,
        activate: Vec<usize>,
        entity: Entity,
        operator: Operator,
        abs: bool,
        lo: Option<f64>,
        hi: Option<f64>,
        nsteps: u64,
        nfreq: u32,
        unload_action: UnloadAction,
    ) -> Self {
        Self {
            test_springs,
            modified_springs,
            activate,
            entity,
            operator,
            abs,
            lo,
            hi,
            nsteps,
            nfreq,
            unload_action,
            consecutive_exceedances: 0,
        }
    }
}

fn out_of_range(value: f64, lo: Option<f64>, hi: Option<f64>) -> bool {
    lo.is_some_and(|lo| value < lo) || hi.is_some_and(|hi| value > hi)
}

/// Runs every rule's periodic check (a no-op on steps not divisible by its
/// `nsteps`) and applies deactivation/reactivation on sustained exceedance.
pub fn check_unspring_rules(step: u64, springs: &mut [LinearSpring], rules: &mut [UnspringRule]) {
    for rule in rules.iter_mut() {
        if rule.nsteps == 0 || step % rule.nsteps != 0 {
            continue;
        }

        let values: Vec<f64> = rule
            .test_springs
            .iter()
            .map(|&s| {
                let v = entity_value(&springs[s], rule.entity);
                if rule.abs {
                    v.abs()
                } else {
                    v
                }
            })
            .collect();
        if values.is_empty() {
            continue;
        }
        let aggregate_value = aggregate(&values, rule.operator);

        if out_of_range(aggregate_value, rule.lo, rule.hi) {
            rule.consecutive_exceedances += 1;
        } else {
            rule.consecutive_exceedances = 0;
        }

        if rule.consecutive_exceedances >= rule.nfreq {
            rule.consecutive_exceedances = 0;

            for &s in &rule.modified_springs {
                springs[s].status = match &rule.unload_action {
                    UnloadAction::Instant => SpringStatus::Inactive,
                    UnloadAction::Fade(curve) => SpringStatus::Active(curve.clone()),
                };
            }
            for &s in &rule.activate {
                if matches!(springs[s].status, SpringStatus::Inactive) {
                    springs[s].status = SpringStatus::Unused;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spring::{SpringAttachment, SpringDirection, SpringLaw};
    use crate::timeseries::LoadCurve;
    use glam::DVec3;

    fn spring_with_force(force: f64) -> LinearSpring {
        let mut s = LinearSpring::new(
            SpringAttachment::on(0, DVec3::ZERO),
            SpringAttachment::fixed(DVec3::ZERO),
            SpringDirection::Follower,
            SpringLaw::Linear(LoadCurve::new(&[-1.0, 1.0], &[-1.0, 1.0]).unwrap()),
        );
        s.force_record = [force, force, 0.0];
        s
    }

    #[test]
    fn triggers_after_nfreq_consecutive_exceedances() {
        let mut springs = vec![spring_with_force(0.0)];
        let mut rules = vec![UnspringRule::new(
            vec![0],
            vec![0],
            vec![],
            Entity::SpringForce,
            Operator::Max,
            true,
            None,
            Some(100.0),
            10,
            2,
            UnloadAction::Instant,
        )];

        springs[0].force_record = [150.0, 150.0, 0.0];
        check_unspring_rules(10, &mut springs, &mut rules);
        assert!(matches!(springs[0].status, SpringStatus::Unused));

        check_unspring_rules(20, &mut springs, &mut rules);
        assert!(matches!(springs[0].status, SpringStatus::Inactive));
    }
}
