pub mod data;
pub mod diagnostics;
pub mod extract;
pub mod model;
pub mod preflight;

use log::{error, info};

use crate::error::ScheduleError;
use crate::models::{ScheduleRequest, ScheduleResponse};
use crate::solver::{self, SolverConfig, SolverStatus};

/// Produces a full-month schedule for the request, or a structured failure.
///
/// Control flow is strictly linear: normalize the data, gate on the capacity
/// envelope, build the decision model, solve, then extract or diagnose. All
/// error kinds surface here as response values; nothing is recovered locally.
pub fn generate_schedule(request: &ScheduleRequest) -> ScheduleResponse {
    match run(request) {
        Ok(response) => response,
        Err(err) => {
            error!("schedule generation failed: {}", err);
            ScheduleResponse::Error {
                error: err.to_string(),
            }
        }
    }
}

fn run(request: &ScheduleRequest) -> Result<ScheduleResponse, ScheduleError> {
    info!(
        "generating schedule for {}-{:02}: {} employees, {} templates",
        request.year,
        request.month,
        request.employees.len(),
        request.shift_templates.len()
    );

    let data = data::DataModel::build(request)?;

    let envelope = match preflight::run(&data)? {
        preflight::PreflightOutcome::InsufficientCapacity(envelope) => {
            return Ok(ScheduleResponse::InsufficientCapacity {
                error: "employees cannot supply the required coverage hours".to_string(),
                reasons: diagnostics::diagnose(&data, None, &envelope),
                suggestions: diagnostics::suggestions(),
                details: envelope.details(),
            });
        }
        preflight::PreflightOutcome::Pass(envelope) => envelope,
    };

    let schedule_model = model::ScheduleModel::build(&data);
    let limit = request
        .solver_time_limit
        .unwrap_or(solver::DEFAULT_TIME_LIMIT_SECS);
    let outcome = solver::solve(&schedule_model, &SolverConfig::new(limit));

    match outcome.status {
        SolverStatus::Infeasible => Ok(ScheduleResponse::Infeasible {
            error: "no schedule satisfies the hard constraints".to_string(),
            reasons: diagnostics::diagnose(&data, Some(&schedule_model), &envelope),
            suggestions: diagnostics::suggestions(),
            details: Some(envelope.details()),
        }),
        SolverStatus::ModelInvalid => Ok(ScheduleResponse::Error {
            error: "no decision variables could be created - check template applicability, \
                    absences and permitted templates"
                .to_string(),
        }),
        SolverStatus::Unknown => Ok(ScheduleResponse::Success {
            shifts: vec![],
            statistics: extract::empty_statistics(&schedule_model, &outcome),
            note: Some(
                "the solver could not settle on a conflict-free schedule within the time limit"
                    .to_string(),
            ),
        }),
        SolverStatus::Optimal | SolverStatus::Feasible => {
            let (shifts, statistics) = extract::extract(&schedule_model, &outcome);
            Ok(ScheduleResponse::Success {
                shifts,
                statistics,
                note: None,
            })
        }
    }
}
