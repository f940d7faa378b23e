use log::{info, warn};

use crate::error::ScheduleError;
use crate::models::CapacityDetails;
use crate::scheduler::data::DataModel;

/// Demand must not exceed supply by more than this factor before the model
/// is even built; below the gate the coverage slack terms absorb marginal
/// shortage during the solve.
const CAPACITY_TOLERANCE: f64 = 1.1;

const ABSENCE_DAY_MINUTES: u64 = 8 * 60;

#[derive(Debug, Clone, Copy)]
pub struct CapacityEnvelope {
    pub required_minutes: u64,
    pub available_minutes: u64,
}

impl CapacityEnvelope {
    pub fn shortage_minutes(&self) -> u64 {
        self.required_minutes.saturating_sub(self.available_minutes)
    }

    pub fn details(&self) -> CapacityDetails {
        CapacityDetails {
            required_hours: self.required_minutes as f64 / 60.0,
            available_hours: self.available_minutes as f64 / 60.0,
            shortage_hours: self.shortage_minutes() as f64 / 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PreflightOutcome {
    Pass(CapacityEnvelope),
    InsufficientCapacity(CapacityEnvelope),
}

/// Structural feasibility gate, run before any model is built.
pub fn run(data: &DataModel) -> Result<PreflightOutcome, ScheduleError> {
    if data.employees.is_empty() {
        return Err(ScheduleError::InvalidInput(
            "no active employees provided".to_string(),
        ));
    }
    if data.templates.is_empty() {
        return Err(ScheduleError::InvalidInput(
            "no shift templates provided".to_string(),
        ));
    }

    let envelope = capacity_envelope(data);
    info!(
        "capacity preflight: required {:.0}h, available {:.0}h",
        envelope.required_minutes as f64 / 60.0,
        envelope.available_minutes as f64 / 60.0
    );

    if envelope.required_minutes as f64 > CAPACITY_TOLERANCE * envelope.available_minutes as f64 {
        warn!(
            "demand exceeds supply beyond tolerance: short by {:.0}h",
            envelope.shortage_minutes() as f64 / 60.0
        );
        return Ok(PreflightOutcome::InsufficientCapacity(envelope));
    }
    Ok(PreflightOutcome::Pass(envelope))
}

/// Demand: minimum staffing x duration over every (workable day, applicable
/// template). Supply: each employee's contract minutes less 8h per weekday
/// absence, floored at zero.
pub fn capacity_envelope(data: &DataModel) -> CapacityEnvelope {
    let mut required_minutes = 0u64;
    for day in data.month.workable_days() {
        for (t, template) in data.templates.iter().enumerate() {
            if data.template_applicable_on(t, day) {
                required_minutes += template.min_staff as u64 * template.duration as u64;
            }
        }
    }

    let mut available_minutes = 0u64;
    for employee in &data.employees {
        let lost = employee.weekday_absences as u64 * ABSENCE_DAY_MINUTES;
        available_minutes += (employee.contract_minutes as u64).saturating_sub(lost);
    }

    CapacityEnvelope {
        required_minutes,
        available_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Employee, EmploymentType, ScheduleRequest, ShiftTemplate};

    fn employee(id: &str) -> Employee {
        Employee {
            id: id.to_string(),
            first_name: "Jan".to_string(),
            last_name: "Kowalski".to_string(),
            employment_type: EmploymentType::Full,
            custom_weekly_hours: None,
            max_hours: None,
            is_supervisor: false,
            is_active: true,
            permitted_templates: vec![],
            color: None,
        }
    }

    fn template(id: &str, min: u32) -> ShiftTemplate {
        ShiftTemplate {
            id: id.to_string(),
            name: id.to_uppercase(),
            start_time: "08:00".to_string(),
            end_time: "16:00".to_string(),
            min_employees: Some(min),
            max_employees: None,
            applicable_days: vec![],
            color: None,
        }
    }

    fn request(employees: usize, templates: usize, min: u32) -> ScheduleRequest {
        ScheduleRequest {
            year: 2026,
            month: 6,
            monthly_hours_norm: None,
            organization_settings: Default::default(),
            shift_templates: (0..templates).map(|i| template(&format!("t{}", i), min)).collect(),
            employees: (0..employees).map(|i| employee(&format!("e{}", i))).collect(),
            employee_preferences: vec![],
            employee_absences: vec![],
            scheduling_rules: Default::default(),
            trading_sundays: vec![],
            solver_time_limit: None,
        }
    }

    #[test]
    fn test_balanced_input_passes() {
        let data = DataModel::build(&request(3, 1, 1)).unwrap();
        match run(&data).unwrap() {
            PreflightOutcome::Pass(_) => {}
            other => panic!("expected pass, got {:?}", other),
        }
    }

    #[test]
    fn test_overloaded_input_is_gated() {
        // ten templates each demanding three people, five employees
        let data = DataModel::build(&request(5, 10, 3)).unwrap();
        match run(&data).unwrap() {
            PreflightOutcome::InsufficientCapacity(envelope) => {
                assert!(envelope.required_minutes > envelope.available_minutes);
                assert!(envelope.shortage_minutes() > 0);
            }
            other => panic!("expected capacity gate, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_lists_are_invalid() {
        let data = DataModel::build(&request(0, 1, 1)).unwrap();
        assert!(run(&data).is_err());
        let data = DataModel::build(&request(1, 0, 1)).unwrap();
        assert!(run(&data).is_err());
    }

    #[test]
    fn test_absences_shrink_supply() {
        let mut req = request(1, 1, 1);
        req.employee_absences = vec![crate::models::Absence {
            employee_id: "e0".to_string(),
            start_date: "2026-06-01".to_string(),
            end_date: "2026-06-05".to_string(),
            reason: None,
        }];
        let with_absence = DataModel::build(&req).unwrap();
        let without = DataModel::build(&request(1, 1, 1)).unwrap();
        let supply_with = capacity_envelope(&with_absence).available_minutes;
        let supply_without = capacity_envelope(&without).available_minutes;
        assert_eq!(supply_without - supply_with, 5 * 8 * 60);
    }
}
