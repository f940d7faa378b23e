mod search;

use log::{info, warn};
use rayon::prelude::*;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::scheduler::model::{Evaluation, ScheduleModel, Solution};

pub const DEFAULT_TIME_LIMIT_SECS: u64 = 300;
const MAX_WORKERS: usize = 8;

/// Terminal solver statuses, in the vocabulary callers map onto the
/// response surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
    ModelInvalid,
}

impl SolverStatus {
    pub fn name(self) -> &'static str {
        match self {
            SolverStatus::Optimal => "OPTIMAL",
            SolverStatus::Feasible => "FEASIBLE",
            SolverStatus::Infeasible => "INFEASIBLE",
            SolverStatus::Unknown => "UNKNOWN",
            SolverStatus::ModelInvalid => "MODEL_INVALID",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub time_limit: Duration,
    pub workers: usize,
    /// Fixed seed for reproducible runs; `None` seeds from the wall clock so
    /// repeated solves explore differently.
    pub seed: Option<u64>,
}

impl SolverConfig {
    pub fn new(time_limit_secs: u64) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, MAX_WORKERS);
        SolverConfig {
            time_limit: Duration::from_secs(time_limit_secs.max(1)),
            workers,
            seed: None,
        }
    }
}

pub struct SolveOutcome {
    pub status: SolverStatus,
    pub solution: Solution,
    pub evaluation: Evaluation,
    pub wall_time: Duration,
}

/// Runs the parallel search over the model within the configured time limit
/// and maps the result onto a terminal status.
pub fn solve(model: &ScheduleModel, config: &SolverConfig) -> SolveOutcome {
    let started = Instant::now();
    let empty = model.empty_solution();

    if model.total_variables == 0 {
        warn!("model has no decision variables");
        return SolveOutcome {
            status: SolverStatus::ModelInvalid,
            evaluation: model.evaluate(&empty),
            solution: empty,
            wall_time: started.elapsed(),
        };
    }
    if model.is_structurally_infeasible() {
        warn!(
            "model is structurally infeasible: {} opening slots without support",
            model.unsupported_slots.len()
        );
        return SolveOutcome {
            status: SolverStatus::Infeasible,
            evaluation: model.evaluate(&empty),
            solution: empty,
            wall_time: started.elapsed(),
        };
    }

    let deadline = started + config.time_limit;
    let seed = config.seed.unwrap_or_else(time_seed);
    info!(
        "solver starting: {} workers, {}s limit",
        config.workers,
        config.time_limit.as_secs()
    );

    let results: Vec<(Solution, Evaluation)> = (0..config.workers)
        .into_par_iter()
        .map(|worker| {
            let worker_seed = seed.wrapping_add(0x9E37_79B9_7F4A_7C15u64.wrapping_mul(worker as u64 + 1));
            search::run_worker(model, deadline, worker_seed)
        })
        .collect();

    let (solution, evaluation) = results
        .into_iter()
        .min_by_key(|(_, eval)| eval.score)
        .expect("at least one search worker");

    let status = if evaluation.score.hard > 0 {
        SolverStatus::Unknown
    } else if evaluation.score.penalty == 0 {
        SolverStatus::Optimal
    } else {
        SolverStatus::Feasible
    };
    let wall_time = started.elapsed();
    info!(
        "solver finished: {} (objective {}, {:.2}s)",
        status.name(),
        evaluation.breakdown.total(),
        wall_time.as_secs_f64()
    );

    SolveOutcome {
        status,
        solution,
        evaluation,
        wall_time,
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5DEE_CE66)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Employee, EmploymentType, ScheduleRequest, ShiftTemplate};
    use crate::scheduler::data::DataModel;
    use crate::scheduler::model::ScheduleModel;

    fn request() -> ScheduleRequest {
        ScheduleRequest {
            year: 2026,
            month: 2,
            monthly_hours_norm: None,
            organization_settings: Default::default(),
            shift_templates: vec![ShiftTemplate {
                id: "day".to_string(),
                name: "Day".to_string(),
                start_time: "08:00".to_string(),
                end_time: "16:00".to_string(),
                min_employees: Some(1),
                max_employees: Some(2),
                applicable_days: vec![
                    "monday".to_string(),
                    "tuesday".to_string(),
                    "wednesday".to_string(),
                    "thursday".to_string(),
                    "friday".to_string(),
                ],
                color: None,
            }],
            employees: vec![
                Employee {
                    id: "e1".to_string(),
                    first_name: "Anna".to_string(),
                    last_name: "Nowak".to_string(),
                    employment_type: EmploymentType::Full,
                    custom_weekly_hours: None,
                    max_hours: None,
                    is_supervisor: false,
                    is_active: true,
                    permitted_templates: vec![],
                    color: None,
                },
                Employee {
                    id: "e2".to_string(),
                    first_name: "Jan".to_string(),
                    last_name: "Kowalski".to_string(),
                    employment_type: EmploymentType::Full,
                    custom_weekly_hours: None,
                    max_hours: None,
                    is_supervisor: false,
                    is_active: true,
                    permitted_templates: vec![],
                    color: None,
                },
            ],
            employee_preferences: vec![],
            employee_absences: vec![],
            scheduling_rules: Default::default(),
            trading_sundays: vec![],
            solver_time_limit: None,
        }
    }

    #[test]
    fn test_solve_finds_feasible_schedule() {
        let data = DataModel::build(&request()).unwrap();
        let model = ScheduleModel::build(&data);
        let mut config = SolverConfig::new(2);
        config.seed = Some(42);
        let outcome = solve(&model, &config);
        assert!(matches!(
            outcome.status,
            SolverStatus::Optimal | SolverStatus::Feasible
        ));
        assert_eq!(outcome.evaluation.score.hard, 0);
        assert!(outcome.wall_time.as_secs() <= 3);
    }

    #[test]
    fn test_solve_without_variables_is_model_invalid() {
        let mut req = request();
        // template applies on no known weekday, so no variables exist
        req.shift_templates[0].applicable_days = vec!["holiday".to_string()];
        let data = DataModel::build(&req).unwrap();
        let model = ScheduleModel::build(&data);
        let outcome = solve(&model, &SolverConfig::new(1));
        assert_eq!(outcome.status, SolverStatus::ModelInvalid);
    }
}
