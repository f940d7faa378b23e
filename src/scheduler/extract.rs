use log::info;
use std::collections::HashMap;

use crate::models::{ScheduleStatistics, ShiftAssignment};
use crate::scheduler::model::{PenaltyBreakdown, ScheduleModel};
use crate::solver::{SolveOutcome, SolverStatus};

/// Turns the winning solution into assignment records plus run statistics.
/// Records are sorted by (date, employee name).
pub fn extract(model: &ScheduleModel, outcome: &SolveOutcome) -> (Vec<ShiftAssignment>, ScheduleStatistics) {
    let data = model.data;
    let mut shifts = Vec::new();
    let mut hours_by_employee: HashMap<String, f64> = HashMap::new();

    for (e, employee) in data.employees.iter().enumerate() {
        for day in 1..=data.month.days_in_month {
            let Some(t) = outcome.solution[model.cell(e, day)] else {
                continue;
            };
            let template = &data.templates[t as usize];
            shifts.push(ShiftAssignment {
                employee_id: employee.id.clone(),
                employee_name: employee.display_name.clone(),
                date: data.month.date_string(day),
                template_id: template.id.clone(),
                template_name: template.name.clone(),
                start_time: template.start_label.clone(),
                end_time: template.end_label.clone(),
                duration_minutes: template.duration,
                color: template.color.clone().or_else(|| employee.color.clone()),
            });
            *hours_by_employee.entry(employee.id.clone()).or_insert(0.0) +=
                template.duration as f64 / 60.0;
        }
    }
    shifts.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.employee_name.cmp(&b.employee_name))
    });

    let statistics = statistics(model, outcome, shifts.len(), hours_by_employee);
    info!(
        "extracted {} shifts, quality {:.1}%",
        shifts.len(),
        statistics.quality_percent
    );
    (shifts, statistics)
}

/// Statistics for a run that produced no usable assignment (UNKNOWN).
pub fn empty_statistics(model: &ScheduleModel, outcome: &SolveOutcome) -> ScheduleStatistics {
    statistics(model, outcome, 0, HashMap::new())
}

fn statistics(
    model: &ScheduleModel,
    outcome: &SolveOutcome,
    total_shifts: usize,
    hours_by_employee: HashMap<String, f64>,
) -> ScheduleStatistics {
    let counters = outcome.evaluation.counters;
    ScheduleStatistics {
        status: outcome.status.name().to_string(),
        solve_time_seconds: outcome.wall_time.as_secs_f64(),
        objective_value: outcome.evaluation.breakdown.total(),
        quality_percent: quality_percent(outcome.status, &outcome.evaluation.breakdown),
        total_shifts_assigned: total_shifts,
        total_variables: model.total_variables,
        hard_constraints: model.hard_constraints,
        soft_constraints: model.soft_constraints,
        hours_by_employee,
        coverage_slack_total: counters.coverage_slack,
        supervisor_days_missing: counters.supervisor_days_missing,
        supervisor_shifts_missing: counters.supervisor_shifts_missing,
        rest_violations: counters.rest_violations,
    }
}

/// Normalizes the objective into a 0-100 quality figure. A proven optimum or
/// a schedule with clean hour targets and coverage reads as 100; otherwise
/// the dominant unmet tier drags the figure down.
fn quality_percent(status: SolverStatus, breakdown: &PenaltyBreakdown) -> f64 {
    if status == SolverStatus::Optimal {
        return 100.0;
    }
    let level1 = breakdown.level1();
    let level2 = breakdown.level2();
    if level1 == 0 && level2 == 0 {
        100.0
    } else if level1 == 0 {
        (90.0 - level2 as f64 / 1e6).clamp(0.0, 100.0)
    } else {
        (80.0 - level1 as f64 / 1e8).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::model::{
        W_COVERAGE_SLACK, W_HOURS_UNDER,
    };

    #[test]
    fn test_quality_optimal_is_full() {
        let mut breakdown = PenaltyBreakdown::default();
        breakdown.coverage = 3 * W_COVERAGE_SLACK;
        assert_eq!(quality_percent(SolverStatus::Optimal, &breakdown), 100.0);
    }

    #[test]
    fn test_quality_clean_feasible_is_full() {
        let mut breakdown = PenaltyBreakdown::default();
        breakdown.labor_rules = 40_000;
        assert_eq!(quality_percent(SolverStatus::Feasible, &breakdown), 100.0);
    }

    #[test]
    fn test_quality_with_coverage_slack() {
        let mut breakdown = PenaltyBreakdown::default();
        breakdown.coverage = 2 * W_COVERAGE_SLACK;
        let q = quality_percent(SolverStatus::Feasible, &breakdown);
        assert!((q - 89.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_with_hour_underrun() {
        let mut breakdown = PenaltyBreakdown::default();
        breakdown.hours_under = 240 * W_HOURS_UNDER; // four hours short
        let q = quality_percent(SolverStatus::Feasible, &breakdown);
        assert!((q - 32.0).abs() < 1e-9);
        breakdown.hours_under = 10_000 * W_HOURS_UNDER;
        assert_eq!(quality_percent(SolverStatus::Feasible, &breakdown), 0.0);
    }
}
