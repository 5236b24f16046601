// [libs/domain/btfi-anomaly/src/pressure.rs]
/*!
 * APARATO: BALANCE DE PRESIÓN (V1.0) — **[NEW]**
 * RESPONSABILIDAD: DETECCIÓN DE DESBALANCE DE VENTILACIÓN POR TRANSICIÓN
 *
 * Compara la presión barométrica antes/después de cada transición
 * ventilador-on/off. Un desplazamiento inmediato en la transición es obra
 * del ventilador, no del clima (el clima cambia en horas, el ventilador en
 * segundos). No requiere dato externo: el sensor se compara contra sí
 * mismo a través de sus propios ciclos naturales de encendido/apagado.
 */

use std::collections::VecDeque;

const MIN_WINDOW_SAMPLES: usize = 30;
const WINDOW_SIZE: usize = 150;
const MIN_TRANSITIONS: usize = 3;
const MAX_TRANSITIONS: usize = 50;
const DEFAULT_IMBALANCE_THRESHOLD_PA: f64 = -2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionKind {
    OffToOn,
    OnToOff,
}

#[derive(Debug, Clone)]
struct PendingTransition {
    kind: TransitionKind,
    avg_before_pa: f64,
    delta_pa: Option<f64>,
}

/// Rolling pressure-vs-fan-state tracker, one per device.
pub struct PressureBalanceTracker {
    fan_on_pressures: VecDeque<f64>,
    fan_off_pressures: VecDeque<f64>,
    current_fan_on: Option<bool>,
    transitions: VecDeque<PendingTransition>,
    total_fan_on_readings: u64,
    total_fan_off_readings: u64,
    imbalance_threshold_pa: f64,
}

impl Default for PressureBalanceTracker {
    fn default() -> Self {
        Self {
            fan_on_pressures: VecDeque::with_capacity(WINDOW_SIZE),
            fan_off_pressures: VecDeque::with_capacity(WINDOW_SIZE),
            current_fan_on: None,
            transitions: VecDeque::with_capacity(MAX_TRANSITIONS),
            total_fan_on_readings: 0,
            total_fan_off_readings: 0,
            imbalance_threshold_pa: DEFAULT_IMBALANCE_THRESHOLD_PA,
        }
    }
}

impl PressureBalanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the default threshold with the value accepted from
    /// `pressure_imbalance_threshold_pa` (spec.md §4.12 extension).
    pub fn with_threshold_pa(threshold_pa: f64) -> Self {
        Self {
            imbalance_threshold_pa: threshold_pa,
            ..Self::default()
        }
    }

    pub fn set_threshold_pa(&mut self, threshold_pa: f64) {
        self.imbalance_threshold_pa = threshold_pa;
    }

    /// Feeds one reading. Returns `true` if this reading just completed a
    /// pending transition whose averaged delta over the last
    /// `MIN_TRANSITIONS` crosses `IMBALANCE_THRESHOLD_PA`.
    pub fn record(&mut self, pressure_hpa: f64, fan_is_on: bool) -> bool {
        if !(800.0..=1100.0).contains(&pressure_hpa) {
            return false;
        }
        let pressure_pa = pressure_hpa * 100.0;

        if let Some(previous) = self.current_fan_on {
            if previous != fan_is_on {
                self.handle_transition(fan_is_on);
            }
        }
        self.current_fan_on = Some(fan_is_on);

        if fan_is_on {
            push_bounded(&mut self.fan_on_pressures, pressure_pa, WINDOW_SIZE);
            self.total_fan_on_readings += 1;
        } else {
            push_bounded(&mut self.fan_off_pressures, pressure_pa, WINDOW_SIZE);
            self.total_fan_off_readings += 1;
        }

        self.complete_pending_transitions()
    }

    fn handle_transition(&mut self, new_fan_on: bool) {
        let (before_window, kind) = if new_fan_on {
            (&self.fan_off_pressures, TransitionKind::OffToOn)
        } else {
            (&self.fan_on_pressures, TransitionKind::OnToOff)
        };

        if before_window.len() < MIN_WINDOW_SAMPLES {
            return;
        }
        let avg_before_pa = average(before_window);

        push_bounded(
            &mut self.transitions,
            PendingTransition {
                kind,
                avg_before_pa,
                delta_pa: None,
            },
            MAX_TRANSITIONS,
        );
    }

    /// Fills in `delta_pa` for any transition whose "after" window has
    /// reached `MIN_WINDOW_SAMPLES`. Returns whether a transition was
    /// completed just now and the resulting rolling verdict is imbalanced.
    fn complete_pending_transitions(&mut self) -> bool {
        let mut completed_this_call = false;

        for pending in self.transitions.iter_mut() {
            if pending.delta_pa.is_some() {
                continue;
            }
            let after_window = match pending.kind {
                TransitionKind::OffToOn => &self.fan_on_pressures,
                TransitionKind::OnToOff => &self.fan_off_pressures,
            };
            if after_window.len() >= MIN_WINDOW_SAMPLES {
                let avg_after_pa = average(after_window);
                pending.delta_pa = Some(avg_after_pa - pending.avg_before_pa);
                completed_this_call = true;
            }
        }

        if !completed_this_call {
            return false;
        }
        self.current_verdict_is_imbalanced()
    }

    fn current_verdict_is_imbalanced(&self) -> bool {
        let deltas: Vec<f64> = self
            .transitions
            .iter()
            .filter_map(|t| t.delta_pa.map(|d| match t.kind {
                TransitionKind::OffToOn => d,
                // Pressure recovering when the fan stops means it was
                // negative while running, so flip the sign for comparison.
                TransitionKind::OnToOff => -d,
            }))
            .collect();

        if deltas.len() < MIN_TRANSITIONS {
            return false;
        }
        let avg_delta = deltas.iter().sum::<f64>() / deltas.len() as f64;
        avg_delta < self.imbalance_threshold_pa
    }

    pub fn total_fan_on_readings(&self) -> u64 {
        self.total_fan_on_readings
    }

    pub fn total_fan_off_readings(&self) -> u64 {
        self.total_fan_off_readings
    }
}

fn average(window: &VecDeque<f64>) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}

fn push_bounded<T>(deque: &mut VecDeque<T>, value: T, cap: usize) {
    if deque.len() == cap {
        deque.pop_front();
    }
    deque.push_back(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_building_never_flags() {
        let mut tracker = PressureBalanceTracker::new();
        for _ in 0..60 {
            tracker.record(1006.0, false);
        }
        let mut flagged = false;
        for _ in 0..60 {
            if tracker.record(1006.0, true) {
                flagged = true;
            }
        }
        assert!(!flagged);
    }

    #[test]
    fn sustained_negative_shift_on_fan_on_flags_imbalance() {
        let mut tracker = PressureBalanceTracker::new();
        // Three off->on transitions each with a sustained −3 Pa (0.03 hPa) drop.
        let mut flagged = false;
        for _cycle in 0..3 {
            for _ in 0..40 {
                tracker.record(1006.0, false);
            }
            for _ in 0..40 {
                if tracker.record(1005.97, true) {
                    flagged = true;
                }
            }
        }
        assert!(flagged);
    }

    #[test]
    fn out_of_bounds_pressure_is_ignored() {
        let mut tracker = PressureBalanceTracker::new();
        assert!(!tracker.record(50.0, true));
        assert_eq!(tracker.total_fan_on_readings(), 0);
    }
}
