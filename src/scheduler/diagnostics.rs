use log::info;

use crate::scheduler::data::DataModel;
use crate::scheduler::model::ScheduleModel;
use crate::scheduler::preflight::CapacityEnvelope;

const MAX_LISTED_TEMPLATES: usize = 5;
const MAX_LISTED_DAYS: usize = 3;
const MAX_LISTED_SLOTS: usize = 5;

/// The fixed remediation list attached to every infeasibility response.
pub fn suggestions() -> Vec<String> {
    [
        "Add more employees or increase contract hours",
        "Reduce min_employees on shift templates",
        "Widen template applicability or shorten opening hours",
        "Increase the solver time limit",
        "Check for overlapping absences in the same period",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Explains why no schedule could be produced: restates the capacity
/// envelope, lists short-staffed templates, compares weekly demand with
/// contract hours and surfaces opening-hour configuration gaps.
pub fn diagnose(
    data: &DataModel,
    model: Option<&ScheduleModel>,
    envelope: &CapacityEnvelope,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if envelope.required_minutes > envelope.available_minutes {
        reasons.push(format!(
            "Coverage requires {:.0}h of work but employees can supply at most {:.0}h",
            envelope.required_minutes as f64 / 60.0,
            envelope.available_minutes as f64 / 60.0
        ));
    }

    let mut listed = 0;
    for (t, template) in data.templates.iter().enumerate() {
        if template.min_staff == 0 {
            continue;
        }
        let mut short_days = Vec::new();
        for day in data.month.workable_days() {
            if !data.template_applicable_on(t, day) {
                continue;
            }
            let available = data
                .employees
                .iter()
                .filter(|employee| {
                    !employee.absent_days.contains(&day)
                        && employee.permitted.as_ref().map_or(true, |p| p.contains(&t))
                })
                .count();
            if (available as u32) < template.min_staff {
                short_days.push(day);
            }
        }
        if !short_days.is_empty() && listed < MAX_LISTED_TEMPLATES {
            let examples = short_days
                .iter()
                .take(MAX_LISTED_DAYS)
                .map(|&day| data.month.date_string(day))
                .collect::<Vec<_>>()
                .join(", ");
            reasons.push(format!(
                "Template '{}' needs {} employees but has fewer available on {} day(s) (e.g. {})",
                template.name,
                template.min_staff,
                short_days.len(),
                examples
            ));
            listed += 1;
        }
    }

    let weeks = data.month.iso_weeks().len().max(1) as u64;
    let weekly_demand = envelope.required_minutes / weeks;
    let weekly_supply: u64 = data
        .employees
        .iter()
        .map(|employee| employee.weekly_minutes as u64)
        .sum();
    if weekly_demand > weekly_supply {
        reasons.push(format!(
            "Average weekly demand ({:.0}h) exceeds the combined weekly contract hours ({:.0}h)",
            weekly_demand as f64 / 60.0,
            weekly_supply as f64 / 60.0
        ));
    }

    if let Some(model) = model {
        for gap in model.coverage_gaps.iter().take(MAX_LISTED_SLOTS) {
            reasons.push(gap.clone());
        }
        for slot in model.unsupported_slots.iter().take(MAX_LISTED_SLOTS) {
            reasons.push(slot.clone());
        }
    }

    if reasons.is_empty() {
        reasons.push(
            "The combination of staffing minima, rest rules and absences is too restrictive"
                .to_string(),
        );
    }
    info!("diagnosis produced {} reason(s)", reasons.len());
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Absence, Employee, EmploymentType, ScheduleRequest, ShiftTemplate};
    use crate::scheduler::preflight;

    fn request() -> ScheduleRequest {
        ScheduleRequest {
            year: 2026,
            month: 2,
            monthly_hours_norm: None,
            organization_settings: Default::default(),
            shift_templates: vec![ShiftTemplate {
                id: "day".to_string(),
                name: "Morning".to_string(),
                start_time: "08:00".to_string(),
                end_time: "16:00".to_string(),
                min_employees: Some(2),
                max_employees: None,
                applicable_days: vec![],
                color: None,
            }],
            employees: vec![Employee {
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
            }],
            employee_preferences: vec![],
            employee_absences: vec![],
            scheduling_rules: Default::default(),
            trading_sundays: vec![],
            solver_time_limit: None,
        }
    }

    #[test]
    fn test_short_staffed_template_is_named() {
        let data = DataModel::build(&request()).unwrap();
        let envelope = preflight::capacity_envelope(&data);
        let reasons = diagnose(&data, None, &envelope);
        assert!(reasons.iter().any(|r| r.contains("Morning")));
        assert!(reasons.iter().any(|r| r.contains("Coverage requires")));
    }

    #[test]
    fn test_absences_count_against_availability() {
        let mut req = request();
        req.shift_templates[0].min_employees = Some(1);
        req.employee_absences = vec![Absence {
            employee_id: "e1".to_string(),
            start_date: "2026-02-02".to_string(),
            end_date: "2026-02-02".to_string(),
            reason: None,
        }];
        let data = DataModel::build(&req).unwrap();
        let envelope = preflight::capacity_envelope(&data);
        let reasons = diagnose(&data, None, &envelope);
        assert!(reasons
            .iter()
            .any(|r| r.contains("1 day(s)") && r.contains("2026-02-02")));
    }

    #[test]
    fn test_suggestions_are_fixed() {
        let list = suggestions();
        assert_eq!(list.len(), 5);
        assert!(list[0].contains("Add more employees"));
    }
}
