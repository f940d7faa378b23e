use chrono::Datelike;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

use crate::calendar::{parse_date, MonthContext};
use crate::clock::{self, MINUTES_PER_DAY};
use crate::error::ScheduleError;
use crate::models::{EmploymentType, ScheduleRequest};

/// A shift template with clock values parsed to minutes.
#[derive(Debug, Clone)]
pub struct TemplateCtx {
    pub id: String,
    pub name: String,
    /// Clock strings exactly as supplied, echoed back on assignments.
    pub start_label: String,
    pub end_label: String,
    pub start: u32,
    /// End minutes after the 00:00-as-end promotion.
    pub end: u32,
    pub duration: u32,
    pub is_night: bool,
    pub min_staff: u32,
    pub max_staff: Option<u32>,
    /// Applicability by weekday (Mon=0 .. Sun=6).
    pub applicable: [bool; 7],
    pub color: Option<String>,
}

/// An active employee with absences expanded, the permitted-template set
/// resolved to template indices and the monthly hour target in minutes.
#[derive(Debug, Clone)]
pub struct EmployeeCtx {
    pub id: String,
    pub display_name: String,
    pub employment_type: EmploymentType,
    /// Contract minutes for the month before absence scaling.
    pub contract_minutes: u32,
    /// Weekly contract minutes, used by the capacity diagnostics.
    pub weekly_minutes: u32,
    /// Hour target in minutes after absence scaling; the objective steers
    /// each employee's assigned minutes toward this value.
    pub target_minutes: i64,
    /// Weekly cap in minutes for the over-48h rule, tightened by the
    /// employee's own max-hours-per-week preference when present.
    pub week_cap_minutes: u32,
    pub is_supervisor: bool,
    /// Template indices this employee may take; `None` = all templates.
    pub permitted: Option<HashSet<usize>>,
    pub color: Option<String>,
    pub absent_days: HashSet<u32>,
    pub weekday_absences: u32,
    pub unavailable_weekdays: [bool; 7],
    pub can_work_weekends: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RulesCtx {
    pub min_rest_minutes: u32,
    pub max_consecutive_days: u32,
    pub max_weekly_minutes: u32,
}

/// Normalized, indexed input for one scheduling run. Owns every collection
/// the variable builder and the constraint families read from.
#[derive(Debug)]
pub struct DataModel {
    pub month: MonthContext,
    pub employees: Vec<EmployeeCtx>,
    pub templates: Vec<TemplateCtx>,
    pub employee_index: HashMap<String, usize>,
    pub template_index: HashMap<String, usize>,
    pub rules: RulesCtx,
}

impl DataModel {
    pub fn build(request: &ScheduleRequest) -> Result<Self, ScheduleError> {
        let month = MonthContext::new(
            request.year,
            request.month,
            request.monthly_hours_norm,
            &request.organization_settings,
            &request.trading_sundays,
        )?;

        let templates = build_templates(request)?;
        let template_index: HashMap<String, usize> = templates
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();

        let rules = RulesCtx {
            min_rest_minutes: request.scheduling_rules.min_daily_rest_hours * 60,
            max_consecutive_days: request.scheduling_rules.max_consecutive_days,
            max_weekly_minutes: request.scheduling_rules.max_weekly_work_hours * 60,
        };

        let mut employees = build_employees(request, &month, &template_index, rules)?;
        let employee_index: HashMap<String, usize> = employees
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();

        attach_absences(request, &month, &employee_index, &mut employees)?;
        attach_preferences(request, &employee_index, &mut employees, rules)?;
        finalize_targets(&month, &mut employees);

        debug!(
            "data model ready: {} employees, {} templates, {} workable days",
            employees.len(),
            templates.len(),
            month.workable_days().len()
        );

        Ok(DataModel {
            month,
            employees,
            templates,
            employee_index,
            template_index,
            rules,
        })
    }

    pub fn workable_day(&self, day: u32) -> bool {
        self.month.workable_day(day)
    }

    pub fn employee_absent_on(&self, employee: usize, day: u32) -> bool {
        self.employees[employee].absent_days.contains(&day)
    }

    pub fn template_applicable_on(&self, template: usize, day: u32) -> bool {
        self.templates[template].applicable[self.month.weekday(day)]
    }
}

fn build_templates(request: &ScheduleRequest) -> Result<Vec<TemplateCtx>, ScheduleError> {
    let org_min = request.organization_settings.min_employees_per_shift;
    let mut templates = Vec::with_capacity(request.shift_templates.len());

    for tpl in &request.shift_templates {
        let start = clock::parse_clock(&tpl.start_time)?;
        if start >= MINUTES_PER_DAY {
            return Err(ScheduleError::InvalidInput(format!(
                "template '{}' cannot start at 24:00",
                tpl.id
            )));
        }
        let end = clock::promote_end(clock::parse_clock(&tpl.end_time)?);
        let duration = clock::shift_duration(start, end);
        let is_night = clock::is_night_shift(start, end);

        let mut applicable = [tpl.applicable_days.is_empty(); 7];
        for name in &tpl.applicable_days {
            match clock::weekday_index(name) {
                Some(weekday) => applicable[weekday] = true,
                None => warn!(
                    "template '{}': unknown weekday '{}', ignoring",
                    tpl.id, name
                ),
            }
        }

        templates.push(TemplateCtx {
            id: tpl.id.clone(),
            name: tpl.name.clone(),
            start_label: tpl.start_time.clone(),
            end_label: tpl.end_time.clone(),
            start,
            end,
            duration,
            is_night,
            min_staff: tpl.min_employees.unwrap_or(org_min),
            max_staff: tpl.max_employees,
            applicable,
            color: tpl.color.clone(),
        });
    }
    Ok(templates)
}

fn build_employees(
    request: &ScheduleRequest,
    month: &MonthContext,
    template_index: &HashMap<String, usize>,
    rules: RulesCtx,
) -> Result<Vec<EmployeeCtx>, ScheduleError> {
    let norm = month.monthly_norm_minutes as f64;
    let mut employees = Vec::new();

    for emp in &request.employees {
        if !emp.is_active {
            debug!("skipping inactive employee {}", emp.id);
            continue;
        }
        if let Some(hours) = emp.custom_weekly_hours {
            if hours < 0.0 {
                return Err(ScheduleError::InvalidInput(format!(
                    "employee '{}': negative custom_weekly_hours",
                    emp.id
                )));
            }
        }
        if let Some(hours) = emp.max_hours {
            if hours < 0.0 {
                return Err(ScheduleError::InvalidInput(format!(
                    "employee '{}': negative max_hours",
                    emp.id
                )));
            }
        }

        let weekly_hours = match emp.employment_type {
            EmploymentType::Custom => emp.custom_weekly_hours.unwrap_or_else(|| {
                warn!(
                    "employee '{}' is custom without custom_weekly_hours, assuming 40h",
                    emp.id
                );
                40.0
            }),
            other => other.multiplier() * 40.0,
        };

        let base_minutes = match emp.employment_type {
            EmploymentType::Custom => (weekly_hours / 40.0 * norm).floor(),
            other => match emp.max_hours {
                Some(cap) => (cap * 60.0).floor(),
                None => (other.multiplier() * norm).floor(),
            },
        };

        let permitted = if emp.permitted_templates.is_empty() {
            None
        } else {
            let mut set = HashSet::new();
            for id in &emp.permitted_templates {
                match template_index.get(id) {
                    Some(&idx) => {
                        set.insert(idx);
                    }
                    None => warn!(
                        "employee '{}': unknown permitted template '{}', ignoring",
                        emp.id, id
                    ),
                }
            }
            Some(set)
        };

        employees.push(EmployeeCtx {
            id: emp.id.clone(),
            display_name: format!("{} {}", emp.first_name, emp.last_name)
                .trim()
                .to_string(),
            employment_type: emp.employment_type,
            contract_minutes: base_minutes.max(0.0) as u32,
            weekly_minutes: (weekly_hours * 60.0).max(0.0) as u32,
            target_minutes: base_minutes as i64,
            week_cap_minutes: rules.max_weekly_minutes,
            is_supervisor: emp.is_supervisor,
            permitted,
            color: emp.color.clone(),
            absent_days: HashSet::new(),
            weekday_absences: 0,
            unavailable_weekdays: [false; 7],
            can_work_weekends: true,
        });
    }
    Ok(employees)
}

fn attach_absences(
    request: &ScheduleRequest,
    month: &MonthContext,
    employee_index: &HashMap<String, usize>,
    employees: &mut [EmployeeCtx],
) -> Result<(), ScheduleError> {
    let first = month.date(1);
    let last = month.date(month.days_in_month);

    for absence in &request.employee_absences {
        let start = parse_date(&absence.start_date)?;
        let end = parse_date(&absence.end_date)?;
        if start > end {
            return Err(ScheduleError::InvalidInput(format!(
                "absence for '{}' starts after it ends ({} > {})",
                absence.employee_id, absence.start_date, absence.end_date
            )));
        }
        let Some(&employee) = employee_index.get(&absence.employee_id) else {
            warn!(
                "absence references unknown employee '{}', ignoring",
                absence.employee_id
            );
            continue;
        };

        let mut current = start.max(first);
        let stop = end.min(last);
        while current <= stop {
            employees[employee].absent_days.insert(current.day());
            current = current.succ_opt().unwrap();
        }
    }

    for employee in employees.iter_mut() {
        employee.weekday_absences = employee
            .absent_days
            .iter()
            .filter(|&&day| month.weekday(day) < 5)
            .count() as u32;
    }
    Ok(())
}

fn attach_preferences(
    request: &ScheduleRequest,
    employee_index: &HashMap<String, usize>,
    employees: &mut [EmployeeCtx],
    rules: RulesCtx,
) -> Result<(), ScheduleError> {
    for pref in &request.employee_preferences {
        let Some(&employee) = employee_index.get(&pref.employee_id) else {
            warn!(
                "preference references unknown employee '{}', ignoring",
                pref.employee_id
            );
            continue;
        };
        if let Some(hours) = pref.max_hours_per_week {
            if hours < 0.0 {
                return Err(ScheduleError::InvalidInput(format!(
                    "preference for '{}': negative max_hours_per_week",
                    pref.employee_id
                )));
            }
            let cap = (hours * 60.0) as u32;
            employees[employee].week_cap_minutes = rules.max_weekly_minutes.min(cap);
        }
        for &weekday in &pref.unavailable_days {
            if weekday < 7 {
                employees[employee].unavailable_weekdays[weekday as usize] = true;
            } else {
                warn!(
                    "preference for '{}': weekday index {} out of range, ignoring",
                    pref.employee_id, weekday
                );
            }
        }
        employees[employee].can_work_weekends = pref.can_work_weekends;
    }
    Ok(())
}

/// Scales each employee's target by the share of weekdays not lost to
/// absence: 5 absent weekdays out of 20 shrink the target to 15/20.
fn finalize_targets(month: &MonthContext, employees: &mut [EmployeeCtx]) {
    let weekdays = month.weekdays.len() as f64;
    for employee in employees.iter_mut() {
        if employee.weekday_absences == 0 || weekdays == 0.0 {
            continue;
        }
        let remaining = (weekdays - employee.weekday_absences as f64).max(0.0);
        employee.target_minutes =
            ((employee.target_minutes as f64) * remaining / weekdays).floor() as i64;
        debug!(
            "employee {}: target scaled to {}min after {} weekday absences",
            employee.id, employee.target_minutes, employee.weekday_absences
        );
    }
}
