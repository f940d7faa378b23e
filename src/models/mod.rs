use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

fn default_open_time() -> String {
    "08:00".to_string()
}

fn default_close_time() -> String {
    "20:00".to_string()
}

fn default_min_per_shift() -> u32 {
    1
}

// ============================================================================
// Request Models
// ============================================================================

/// Contract size of an employee. Multipliers against the monthly hour norm
/// are fixed; `Custom` derives its target from the employee's weekly hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    #[default]
    Full,
    ThreeQuarter,
    Half,
    OneThird,
    Custom,
}

impl EmploymentType {
    pub fn multiplier(self) -> f64 {
        match self {
            EmploymentType::Full => 1.0,
            EmploymentType::ThreeQuarter => 0.75,
            EmploymentType::Half => 0.5,
            EmploymentType::OneThird => 1.0 / 3.0,
            EmploymentType::Custom => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub employment_type: EmploymentType,
    /// Weekly hours, only meaningful for `EmploymentType::Custom`.
    pub custom_weekly_hours: Option<f64>,
    /// Monthly hour cap; defaults to monthly norm x type multiplier.
    pub max_hours: Option<f64>,
    #[serde(default)]
    pub is_supervisor: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Template ids this employee may be assigned to. Empty = all templates.
    #[serde(default)]
    pub permitted_templates: Vec<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftTemplate {
    pub id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    /// Minimum staffing. Absent = the organization default; 0 = optional.
    pub min_employees: Option<u32>,
    pub max_employees: Option<u32>,
    /// Lowercase weekday names on which the template applies. Empty = all.
    #[serde(default)]
    pub applicable_days: Vec<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Absence {
    pub employee_id: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeePreference {
    pub employee_id: String,
    /// Weekday indices (Mon=0 .. Sun=6) the employee likes to work.
    #[serde(default)]
    pub preferred_days: Vec<u32>,
    /// Weekday indices the employee wants to avoid.
    #[serde(default)]
    pub unavailable_days: Vec<u32>,
    pub max_hours_per_week: Option<f64>,
    #[serde(default = "default_true")]
    pub can_work_weekends: bool,
    #[serde(default = "default_true")]
    pub can_work_holidays: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSunday {
    pub date: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Opening interval for a single weekday; both `None` means closed that day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayHours {
    pub open: Option<String>,
    pub close: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationSettings {
    #[serde(default = "default_open_time")]
    pub store_open_time: String,
    #[serde(default = "default_close_time")]
    pub store_close_time: String,
    #[serde(default = "default_min_per_shift")]
    pub min_employees_per_shift: u32,
    #[serde(default)]
    pub enable_trading_sundays: bool,
    /// Per-weekday overrides of the default opening hours.
    #[serde(default)]
    pub opening_hours: Option<HashMap<String, DayHours>>,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        OrganizationSettings {
            store_open_time: default_open_time(),
            store_close_time: default_close_time(),
            min_employees_per_shift: default_min_per_shift(),
            enable_trading_sundays: false,
            opening_hours: None,
        }
    }
}

fn default_max_consecutive() -> u32 {
    6
}

fn default_min_rest() -> u32 {
    11
}

fn default_max_weekly() -> u32 {
    48
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingRules {
    #[serde(default = "default_max_consecutive")]
    pub max_consecutive_days: u32,
    #[serde(default = "default_min_rest")]
    pub min_daily_rest_hours: u32,
    #[serde(default = "default_max_weekly")]
    pub max_weekly_work_hours: u32,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        SchedulingRules {
            max_consecutive_days: default_max_consecutive(),
            min_daily_rest_hours: default_min_rest(),
            max_weekly_work_hours: default_max_weekly(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub year: i32,
    pub month: u32,
    /// Monthly hour norm; derived as 8h x weekdays in month when absent.
    pub monthly_hours_norm: Option<u32>,
    #[serde(default)]
    pub organization_settings: OrganizationSettings,
    #[serde(default)]
    pub shift_templates: Vec<ShiftTemplate>,
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub employee_preferences: Vec<EmployeePreference>,
    #[serde(default)]
    pub employee_absences: Vec<Absence>,
    #[serde(default)]
    pub scheduling_rules: SchedulingRules,
    #[serde(default)]
    pub trading_sundays: Vec<TradingSunday>,
    /// Solver wall-time limit in seconds, default 300.
    pub solver_time_limit: Option<u64>,
}

// ============================================================================
// Response Models
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftAssignment {
    pub employee_id: String,
    pub employee_name: String,
    pub date: String,
    pub template_id: String,
    pub template_name: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleStatistics {
    pub status: String,
    pub solve_time_seconds: f64,
    pub objective_value: i64,
    pub quality_percent: f64,
    pub total_shifts_assigned: usize,
    pub total_variables: usize,
    pub hard_constraints: usize,
    pub soft_constraints: usize,
    pub hours_by_employee: HashMap<String, f64>,
    pub coverage_slack_total: u32,
    pub supervisor_days_missing: u32,
    pub supervisor_shifts_missing: u32,
    pub rest_violations: u32,
}

/// Structural capacity numbers attached to infeasibility responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityDetails {
    pub required_hours: f64,
    pub available_hours: f64,
    pub shortage_hours: f64,
}

/// The result of one scheduling run, discriminated by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ScheduleResponse {
    #[serde(rename = "SUCCESS")]
    Success {
        shifts: Vec<ShiftAssignment>,
        statistics: ScheduleStatistics,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    #[serde(rename = "INFEASIBLE")]
    Infeasible {
        error: String,
        reasons: Vec<String>,
        suggestions: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<CapacityDetails>,
    },
    #[serde(rename = "INSUFFICIENT_CAPACITY")]
    InsufficientCapacity {
        error: String,
        reasons: Vec<String>,
        suggestions: Vec<String>,
        details: CapacityDetails,
    },
    #[serde(rename = "ERROR")]
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employment_type_multipliers() {
        assert!((EmploymentType::Full.multiplier() - 1.0).abs() < 1e-9);
        assert!((EmploymentType::ThreeQuarter.multiplier() - 0.75).abs() < 1e-9);
        assert!((EmploymentType::Half.multiplier() - 0.5).abs() < 1e-9);
        assert!((EmploymentType::OneThird.multiplier() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_employment_type_serde_names() {
        let t: EmploymentType = serde_json::from_str("\"three_quarter\"").unwrap();
        assert_eq!(t, EmploymentType::ThreeQuarter);
        assert_eq!(
            serde_json::to_string(&EmploymentType::OneThird).unwrap(),
            "\"one_third\""
        );
    }

    #[test]
    fn test_request_defaults() {
        let request: ScheduleRequest =
            serde_json::from_str(r#"{"year": 2026, "month": 2}"#).unwrap();
        assert_eq!(request.scheduling_rules.max_consecutive_days, 6);
        assert_eq!(request.scheduling_rules.min_daily_rest_hours, 11);
        assert_eq!(request.scheduling_rules.max_weekly_work_hours, 48);
        assert_eq!(request.organization_settings.min_employees_per_shift, 1);
        assert!(!request.organization_settings.enable_trading_sundays);
        assert!(request.employees.is_empty());
    }

    #[test]
    fn test_response_status_tag() {
        let response = ScheduleResponse::Error {
            error: "boom".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ERROR\""));
    }
}
