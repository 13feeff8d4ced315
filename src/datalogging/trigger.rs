//! Trigger condition evaluation and hold-time debounce.
//!
//! The monitor owns everything that must survive between ticks: the
//! ChangeMoreThan baseline and the rising-edge timestamp used by the
//! hold-time filter. Both are reset whenever the trigger is (re)armed, so no
//! state ever leaks from one acquisition into the next.

use super::config::{Operand, TriggerCondition, TriggerConfig};
use super::operand::{fetch_operand, promote, PromotedPair};
use crate::memory::MemoryReader;
use crate::rpv::RpvRegistry;
use crate::timebase::{Timebase, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq)]
enum ConditionState {
    Stateless,
    ChangeMoreThan { initialized: bool, baseline: f32 },
}

/// Per-acquisition trigger state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerMonitor {
    condition_state: ConditionState,
    rising_edge_at: Option<Timestamp>,
}

impl TriggerMonitor {
    pub const fn new() -> Self {
        Self {
            condition_state: ConditionState::Stateless,
            rising_edge_at: None,
        }
    }

    /// Re-initializes the monitor for `condition`. Called on configure and on
    /// every arm.
    pub fn reset(&mut self, condition: TriggerCondition) {
        self.condition_state = match condition {
            TriggerCondition::ChangeMoreThan => {
                ConditionState::ChangeMoreThan { initialized: false, baseline: 0.0 }
            }
            _ => ConditionState::Stateless,
        };
        self.rising_edge_at = None;
    }

    /// Evaluates the raw condition and applies the hold-time filter. Returns
    /// true when the debounced trigger fires.
    pub fn check<M: MemoryReader>(
        &mut self,
        config: &TriggerConfig,
        memory: &M,
        rpvs: &RpvRegistry,
        timebase: &Timebase,
    ) -> bool {
        let raw = self.evaluate_raw(config, memory, rpvs);
        self.debounce(raw, config.hold_time_us, timebase)
    }

    fn evaluate_raw<M: MemoryReader>(
        &mut self,
        config: &TriggerConfig,
        memory: &M,
        rpvs: &RpvRegistry,
    ) -> bool {
        match config.condition {
            TriggerCondition::ChangeMoreThan => {
                self.evaluate_change_more_than(&config.operands, memory, rpvs)
            }
            condition => {
                let lhs = match fetch_operand(&config.operands[0], memory, rpvs) {
                    Some(value) => value,
                    None => return false,
                };
                let rhs = match fetch_operand(&config.operands[1], memory, rpvs) {
                    Some(value) => value,
                    None => return false,
                };
                match promote(lhs, rhs) {
                    PromotedPair::Float(a, b) => relational(condition, a, b),
                    PromotedPair::Sint(a, b) => relational(condition, a, b),
                    PromotedPair::Uint(a, b) => relational(condition, a, b),
                }
            }
        }
    }

    /// Operand 0 is the observed signal, operand 1 the delta threshold. The
    /// first post-arm evaluation only captures the baseline; afterwards the
    /// signal is compared against that fixed baseline, not the previous
    /// sample.
    fn evaluate_change_more_than<M: MemoryReader>(
        &mut self,
        operands: &[Operand],
        memory: &M,
        rpvs: &RpvRegistry,
    ) -> bool {
        let signal = match fetch_operand(&operands[0], memory, rpvs) {
            Some(value) => value.as_f32(),
            None => return false,
        };

        match self.condition_state {
            ConditionState::ChangeMoreThan { initialized: false, .. } => {
                self.condition_state =
                    ConditionState::ChangeMoreThan { initialized: true, baseline: signal };
                false
            }
            ConditionState::ChangeMoreThan { initialized: true, baseline } => {
                let delta = match fetch_operand(&operands[1], memory, rpvs) {
                    Some(value) => value.as_f32(),
                    None => return false,
                };
                if delta >= 0.0 {
                    signal > baseline + delta
                } else {
                    signal < baseline + delta
                }
            }
            ConditionState::Stateless => false,
        }
    }

    fn debounce(&mut self, raw: bool, hold_time_us: u32, timebase: &Timebase) -> bool {
        if !raw {
            self.rising_edge_at = None;
            return false;
        }
        let edge = *self.rising_edge_at.get_or_insert(timebase.get_timestamp());
        timebase.has_expired(edge, hold_time_us)
    }
}

fn relational<T: PartialOrd>(condition: TriggerCondition, lhs: T, rhs: T) -> bool {
    match condition {
        TriggerCondition::Equal => lhs == rhs,
        TriggerCondition::NotEqual => lhs != rhs,
        TriggerCondition::LessThan => lhs < rhs,
        TriggerCondition::LessOrEqualThan => lhs <= rhs,
        TriggerCondition::GreaterThan => lhs > rhs,
        TriggerCondition::GreaterOrEqualThan => lhs >= rhs,
        TriggerCondition::ChangeMoreThan => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::GuardedMemoryReader;
    use crate::types::VariableType;

    fn var_operand(value: &f32) -> Operand {
        Operand::Var {
            addr: value as *const f32 as usize,
            datatype: VariableType::Float32,
        }
    }

    fn config_with(condition: TriggerCondition, operands: [Operand; 2], hold_time_us: u32) -> TriggerConfig {
        TriggerConfig { condition, operand_count: 2, hold_time_us, operands }
    }

    #[test]
    fn test_relational_conditions() {
        let memory = GuardedMemoryReader::new(&[]);
        let registry = RpvRegistry::empty();
        let tb = Timebase::new();
        let signal: f32 = 10.0;

        let cases = [
            (TriggerCondition::Equal, 10.0, true),
            (TriggerCondition::Equal, 9.0, false),
            (TriggerCondition::NotEqual, 9.0, true),
            (TriggerCondition::LessThan, 11.0, true),
            (TriggerCondition::LessThan, 10.0, false),
            (TriggerCondition::LessOrEqualThan, 10.0, true),
            (TriggerCondition::GreaterThan, 9.0, true),
            (TriggerCondition::GreaterThan, 10.0, false),
            (TriggerCondition::GreaterOrEqualThan, 10.0, true),
        ];
        for (condition, literal, expected) in cases {
            let mut monitor = TriggerMonitor::new();
            monitor.reset(condition);
            let config = config_with(
                condition,
                [var_operand(&signal), Operand::Literal { val: literal }],
                0,
            );
            assert_eq!(
                monitor.check(&config, &memory, &registry, &tb),
                expected,
                "{condition:?} vs {literal}"
            );
        }
    }

    #[test]
    fn test_mixed_sign_comparison_goes_signed() {
        let memory = GuardedMemoryReader::new(&[]);
        let registry = RpvRegistry::empty();
        let tb = Timebase::new();

        let signed: i32 = -1;
        let unsigned: u32 = 1;
        let config = config_with(
            TriggerCondition::LessThan,
            [
                Operand::Var { addr: &signed as *const i32 as usize, datatype: VariableType::Sint32 },
                Operand::Var { addr: &unsigned as *const u32 as usize, datatype: VariableType::Uint32 },
            ],
            0,
        );
        let mut monitor = TriggerMonitor::new();
        monitor.reset(TriggerCondition::LessThan);
        assert!(monitor.check(&config, &memory, &registry, &tb));
    }

    #[test]
    fn test_unfetchable_operand_never_fires() {
        let registry = RpvRegistry::empty();
        let tb = Timebase::new();
        let signal: f32 = 1.0;
        let forbidden = [crate::memory::AddressRange::of(&signal)];
        let memory = GuardedMemoryReader::new(&forbidden);

        let config = config_with(
            TriggerCondition::Equal,
            [var_operand(&signal), Operand::Literal { val: 1.0 }],
            0,
        );
        let mut monitor = TriggerMonitor::new();
        monitor.reset(TriggerCondition::Equal);
        assert!(!monitor.check(&config, &memory, &registry, &tb));
    }

    #[test]
    fn test_hold_time_debounce() {
        let memory = GuardedMemoryReader::new(&[]);
        let registry = RpvRegistry::empty();
        let mut tb = Timebase::new();
        let mut signal: f32 = 0.0;

        let config = config_with(
            TriggerCondition::Equal,
            [var_operand(&signal), Operand::Literal { val: 5.0 }],
            100,
        );
        let mut monitor = TriggerMonitor::new();
        monitor.reset(TriggerCondition::Equal);

        signal = 5.0;
        assert!(!monitor.check(&config, &memory, &registry, &tb));
        tb.step(99);
        assert!(!monitor.check(&config, &memory, &registry, &tb));
        tb.step(1);
        assert!(monitor.check(&config, &memory, &registry, &tb));
    }

    #[test]
    fn test_hold_time_restarts_on_dropout() {
        let memory = GuardedMemoryReader::new(&[]);
        let registry = RpvRegistry::empty();
        let mut tb = Timebase::new();
        let mut signal: f32 = 5.0;

        let config = config_with(
            TriggerCondition::Equal,
            [var_operand(&signal), Operand::Literal { val: 5.0 }],
            100,
        );
        let mut monitor = TriggerMonitor::new();
        monitor.reset(TriggerCondition::Equal);

        assert!(!monitor.check(&config, &memory, &registry, &tb));
        tb.step(60);
        signal = 0.0;
        assert!(!monitor.check(&config, &memory, &registry, &tb));
        signal = 5.0;
        tb.step(60);
        // 120 us since the first edge, but the dropout restarted the clock.
        assert!(!monitor.check(&config, &memory, &registry, &tb));
        tb.step(100);
        assert!(monitor.check(&config, &memory, &registry, &tb));
    }

    #[test]
    fn test_change_more_than_positive_delta() {
        let memory = GuardedMemoryReader::new(&[]);
        let registry = RpvRegistry::empty();
        let tb = Timebase::new();
        let mut signal: f32 = 10.0;

        let config = config_with(
            TriggerCondition::ChangeMoreThan,
            [var_operand(&signal), Operand::Literal { val: 5.0 }],
            0,
        );
        let mut monitor = TriggerMonitor::new();
        monitor.reset(TriggerCondition::ChangeMoreThan);

        // First evaluation captures the baseline.
        assert!(!monitor.check(&config, &memory, &registry, &tb));
        signal = 12.0;
        assert!(!monitor.check(&config, &memory, &registry, &tb));
        signal = 16.0;
        assert!(monitor.check(&config, &memory, &registry, &tb));
    }

    #[test]
    fn test_change_more_than_negative_delta() {
        let memory = GuardedMemoryReader::new(&[]);
        let registry = RpvRegistry::empty();
        let tb = Timebase::new();
        let mut signal: f32 = 10.0;

        let config = config_with(
            TriggerCondition::ChangeMoreThan,
            [var_operand(&signal), Operand::Literal { val: -3.0 }],
            0,
        );
        let mut monitor = TriggerMonitor::new();
        monitor.reset(TriggerCondition::ChangeMoreThan);

        assert!(!monitor.check(&config, &memory, &registry, &tb));
        signal = 8.0;
        assert!(!monitor.check(&config, &memory, &registry, &tb));
        signal = 6.0;
        assert!(monitor.check(&config, &memory, &registry, &tb));
    }

    #[test]
    fn test_change_more_than_baseline_resets_on_arm() {
        let memory = GuardedMemoryReader::new(&[]);
        let registry = RpvRegistry::empty();
        let tb = Timebase::new();
        let mut signal: f32 = 10.0;

        let config = config_with(
            TriggerCondition::ChangeMoreThan,
            [var_operand(&signal), Operand::Literal { val: 5.0 }],
            0,
        );
        let mut monitor = TriggerMonitor::new();
        monitor.reset(TriggerCondition::ChangeMoreThan);

        assert!(!monitor.check(&config, &memory, &registry, &tb));
        signal = 16.0;
        assert!(monitor.check(&config, &memory, &registry, &tb));

        // Re-arm: the old baseline must not survive.
        monitor.reset(TriggerCondition::ChangeMoreThan);
        assert!(!monitor.check(&config, &memory, &registry, &tb));
        signal = 20.0;
        assert!(!monitor.check(&config, &memory, &registry, &tb));
        signal = 22.0;
        assert!(monitor.check(&config, &memory, &registry, &tb));
    }
}
