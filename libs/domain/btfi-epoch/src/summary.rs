// [libs/domain/btfi-epoch/src/summary.rs]
/*!
 * =================================================================
 * APARATO: AGREGADOR DE RESUMEN DE EPOCH (V1.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L3)
 * RESPONSABILIDAD: PROMEDIOS Y TOTALES SOBRE LAS MUESTRAS DE UN EPOCH
 *
 * Produce la forma v1 anidada (`fan_performance`/`air_quality`/
 * `mitigation`) exclusivamente — spec.md §9 descarta el fallback plano
 * legacy para esta implementación.
 * =================================================================
 */

use btfi_models::epoch::{AirQualitySummary, EpochSummary, FanPerformanceSummary, MitigationSummary};
use btfi_models::sample::Sample;

pub fn summarize(samples: &[Sample]) -> EpochSummary {
    if samples.is_empty() {
        return EpochSummary::default();
    }

    let n = samples.len() as f64;
    let sum_cfm: f64 = samples.iter().map(|s| s.fan.cfm).sum();
    let sum_power: f64 = samples.iter().map(|s| s.fan.power_w).sum();
    let sum_rpm: f64 = samples.iter().map(|s| s.fan.rpm).sum();
    let sum_efficiency: f64 = samples.iter().map(|s| s.fan.efficiency_cfm_w).sum();

    let sum_tvoc: f64 = samples.iter().map(|s| s.environment.tvoc_ppb).sum();
    let sum_eco2: f64 = samples.iter().map(|s| s.environment.eco2_ppm).sum();
    let sum_pm25: f64 = samples.iter().map(|s| s.environment.pm25_ugm3).sum();
    let sum_temp: f64 = samples.iter().map(|s| s.environment.temp_c).sum();
    let sum_humidity: f64 = samples.iter().map(|s| s.environment.humidity_pct).sum();
    let min_tvoc = samples
        .iter()
        .map(|s| s.environment.tvoc_ppb)
        .fold(f64::INFINITY, f64::min);
    let max_tvoc = samples
        .iter()
        .map(|s| s.environment.tvoc_ppb)
        .fold(f64::NEG_INFINITY, f64::max);

    let total_tar: f64 = samples.iter().map(|s| s.derived.tar_cfm_min).sum();
    let total_energy: f64 = samples.iter().map(|s| s.derived.energy_wh).sum();
    let sum_voc_reduction: f64 = samples.iter().map(|s| s.derived.voc_reduction_pct).sum();

    EpochSummary {
        fan_performance: FanPerformanceSummary {
            avg_cfm: sum_cfm / n,
            avg_power_w: sum_power / n,
            avg_rpm: sum_rpm / n,
            avg_efficiency_cfm_w: sum_efficiency / n,
        },
        air_quality: AirQualitySummary {
            avg_tvoc_ppb: sum_tvoc / n,
            avg_eco2_ppm: sum_eco2 / n,
            avg_pm25_ugm3: sum_pm25 / n,
            avg_temp_c: sum_temp / n,
            avg_humidity_pct: sum_humidity / n,
            min_tvoc_ppb: min_tvoc,
            max_tvoc_ppb: max_tvoc,
        },
        mitigation: MitigationSummary {
            total_tar_cfm_min: total_tar,
            total_energy_wh: total_energy,
            avg_voc_reduction_pct: sum_voc_reduction / n,
        },
    }
}
