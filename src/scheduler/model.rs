use itertools::Itertools;
use log::{debug, info};

use crate::calendar::{coverage_slots, DayOpening};
use crate::clock;
use crate::scheduler::data::DataModel;

// Objective weights. Each tier strictly dominates the combined mass of every
// tier below it, so no optimum trades a higher-tier unit for any number of
// lower-tier units.
pub const W_HOURS_UNDER: i64 = 20_000_000; // per minute below target
pub const W_HOURS_OVER: i64 = 10_000_000; // per minute above target
pub const W_SUPERVISOR_DAY: i64 = 1_000_000; // workable day without a supervisor
pub const W_COVERAGE_SLACK: i64 = 500_000; // per missing person on a template-day
pub const W_SUPERVISOR_SHIFT: i64 = 500_000; // staffed template-day without a supervisor
pub const W_REST11: i64 = 10_000; // daily-rest violation
pub const W_DAILY_BALANCE: i64 = 100; // per person of inter-template imbalance
pub const W_WEEKLY_REST: i64 = 100; // 7-day block fully worked
pub const W_CONSECUTIVE: i64 = 100; // per day above the consecutive limit
pub const W_WEEKLY_OVERTIME: i64 = 100; // per minute above the weekly cap
pub const W_AVOIDED_DAY: i64 = 100; // work on an avoided weekday
pub const W_SUNDAY_WORK: i64 = 100; // work on a trading Sunday
pub const W_WEEKEND_FAIRNESS: i64 = 200; // weekend-count spread, all employees
pub const W_WEEKEND_FAIRNESS_SUPERVISORS: i64 = 2_000; // same, supervisors only
pub const W_SHIFT_BALANCE: i64 = 150; // per-template shift-count spread beyond 1

/// One cell per (employee, day); the value is an index into the cell's
/// candidate template list domain, or `None` for a day off.
pub type Solution = Vec<Option<u16>>;

/// Lexicographic solution score: hard violations always dominate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score {
    pub hard: u64,
    pub penalty: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PenaltyBreakdown {
    pub hours_under: i64,
    pub hours_over: i64,
    pub coverage: i64,
    pub supervisor_days: i64,
    pub supervisor_shifts: i64,
    pub daily_balance: i64,
    pub labor_rules: i64,
    pub preferences: i64,
}

impl PenaltyBreakdown {
    pub fn level1(&self) -> i64 {
        self.hours_under + self.hours_over
    }

    pub fn level2(&self) -> i64 {
        self.coverage + self.supervisor_days + self.supervisor_shifts
    }

    pub fn total(&self) -> i64 {
        self.level1() + self.level2() + self.daily_balance + self.labor_rules + self.preferences
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ViolationCounters {
    pub coverage_slack: u32,
    pub supervisor_days_missing: u32,
    pub supervisor_shifts_missing: u32,
    pub rest_violations: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    pub score: Score,
    pub breakdown: PenaltyBreakdown,
    pub counters: ViolationCounters,
}

/// Staffing bounds for one (workable day, applicable template) pair.
#[derive(Debug, Clone)]
pub struct StaffingRule {
    pub day: u32,
    pub template: usize,
    pub min: u32,
    pub max: Option<u32>,
    pub candidate_count: u32,
    pub supervisor_candidates: u32,
}

/// Minimum-coverage requirement for one 30-minute opening slot.
#[derive(Debug, Clone)]
pub struct SlotRule {
    pub day: u32,
    pub start: u32,
    pub end: u32,
    pub templates: Vec<usize>,
}

/// The assembled decision model: pruned assignment domains, the hard
/// constraint families and everything the soft objective needs to score a
/// candidate solution in one pass.
pub struct ScheduleModel<'a> {
    pub data: &'a DataModel,
    pub n_days: usize,
    pub n_templates: usize,
    /// Admissible template indices per (employee, day) cell, ascending.
    pub candidates: Vec<Vec<u16>>,
    /// Cells with at least one admissible template.
    pub active_cells: Vec<usize>,
    pub total_variables: usize,
    pub hard_constraints: usize,
    pub soft_constraints: usize,
    pub staffing: Vec<StaffingRule>,
    pub staffing_by_day: Vec<Vec<usize>>,
    pub slot_rules: Vec<SlotRule>,
    /// Opening slots no template covers at all: a configuration defect, the
    /// constraint is omitted and diagnostics surface it.
    pub coverage_gaps: Vec<String>,
    /// Opening slots with covering templates but zero admissible variables;
    /// the model cannot be satisfied when any exist.
    pub unsupported_slots: Vec<String>,
    pub supervisors: Vec<usize>,
    pub eligible_by_template: Vec<Vec<usize>>,
    night_conflict: Vec<bool>,
    rest_conflict: Vec<bool>,
    workable: Vec<bool>,
    day_active: Vec<bool>,
    weekend_day: Vec<bool>,
    week_of_day: Vec<usize>,
    n_weeks: usize,
    blocks: Vec<Vec<u32>>,
}

fn fmt_clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

impl<'a> ScheduleModel<'a> {
    pub fn build(data: &'a DataModel) -> Self {
        let e_n = data.employees.len();
        let d_n = data.month.days_in_month as usize;
        let t_n = data.templates.len();

        // Assignment domains, pruned by workability, absence, applicability
        // and the permitted-template set.
        let mut candidates = vec![Vec::new(); e_n * d_n];
        let mut eligible = vec![false; e_n * t_n];
        let mut total_variables = 0usize;
        for (e, employee) in data.employees.iter().enumerate() {
            for day in 1..=data.month.days_in_month {
                if !data.workable_day(day) || employee.absent_days.contains(&day) {
                    continue;
                }
                let weekday = data.month.weekday(day);
                let cell = e * d_n + day as usize - 1;
                for (t, template) in data.templates.iter().enumerate() {
                    if !template.applicable[weekday] {
                        continue;
                    }
                    if let Some(permitted) = &employee.permitted {
                        if !permitted.contains(&t) {
                            continue;
                        }
                    }
                    candidates[cell].push(t as u16);
                    eligible[e * t_n + t] = true;
                }
                total_variables += candidates[cell].len();
            }
        }
        let active_cells: Vec<usize> = (0..e_n * d_n)
            .filter(|&cell| !candidates[cell].is_empty())
            .collect();
        // Days on which at least one employee could be assigned at all.
        let mut day_active = vec![false; d_n];
        for &cell in &active_cells {
            day_active[cell % d_n] = true;
        }

        let eligible_by_template: Vec<Vec<usize>> = (0..t_n)
            .map(|t| (0..e_n).filter(|&e| eligible[e * t_n + t]).collect())
            .collect();

        let supervisors: Vec<usize> = data
            .employees
            .iter()
            .enumerate()
            .filter(|(_, emp)| emp.is_supervisor)
            .map(|(e, _)| e)
            .collect();

        // Night-overlap and short-rest tables over template pairs (first on
        // day d, second on day d+1).
        let mut night_conflict = vec![false; t_n * t_n];
        let mut rest_conflict = vec![false; t_n * t_n];
        for (t1, tpl1) in data.templates.iter().enumerate() {
            for (t2, tpl2) in data.templates.iter().enumerate() {
                let rest = clock::rest_between(tpl1.start, tpl1.end, tpl2.start);
                if rest < 0 {
                    night_conflict[t1 * t_n + t2] = true;
                } else if (rest as u32) < data.rules.min_rest_minutes {
                    rest_conflict[t1 * t_n + t2] = true;
                }
            }
        }

        // Staffing rules per (workable day, applicable template).
        let mut staffing = Vec::new();
        let mut staffing_by_day = vec![Vec::new(); d_n];
        let mut support = vec![0u32; d_n * t_n];
        for day in data.month.workable_days() {
            let di = day as usize - 1;
            for (t, template) in data.templates.iter().enumerate() {
                if !data.template_applicable_on(t, day) {
                    continue;
                }
                let mut candidate_count = 0u32;
                let mut supervisor_candidates = 0u32;
                for (e, employee) in data.employees.iter().enumerate() {
                    if candidates[e * d_n + di].binary_search(&(t as u16)).is_ok() {
                        candidate_count += 1;
                        if employee.is_supervisor {
                            supervisor_candidates += 1;
                        }
                    }
                }
                support[di * t_n + t] = candidate_count;
                staffing_by_day[di].push(staffing.len());
                staffing.push(StaffingRule {
                    day,
                    template: t,
                    min: template.min_staff,
                    max: template.max_staff,
                    candidate_count,
                    supervisor_candidates,
                });
            }
        }

        // Minimum-coverage slots over each workable day's opening interval.
        let mut slot_rules = Vec::new();
        let mut coverage_gaps = Vec::new();
        let mut unsupported_slots = Vec::new();
        for day in data.month.workable_days() {
            let DayOpening::Open { open, close } = data.month.opening_for(day) else {
                continue;
            };
            let weekday = data.month.weekday(day);
            let di = day as usize - 1;
            let mut gaps: Vec<(u32, u32)> = Vec::new();
            for (start, end) in coverage_slots(open, close) {
                let covering: Vec<usize> = data
                    .templates
                    .iter()
                    .enumerate()
                    .filter(|(_, tpl)| {
                        let cover_end = if tpl.is_night {
                            clock::MINUTES_PER_DAY
                        } else {
                            tpl.end
                        };
                        tpl.applicable[weekday] && tpl.start <= start && cover_end >= end
                    })
                    .map(|(t, _)| t)
                    .collect();
                if covering.is_empty() {
                    match gaps.last_mut() {
                        Some(last) if last.1 == start => last.1 = end,
                        _ => gaps.push((start, end)),
                    }
                    continue;
                }
                if !covering.iter().any(|&t| support[di * t_n + t] > 0) {
                    unsupported_slots.push(format!(
                        "{}: no employee is available for the {}-{} opening slot",
                        data.month.date_string(day),
                        fmt_clock(start),
                        fmt_clock(end)
                    ));
                    continue;
                }
                slot_rules.push(SlotRule {
                    day,
                    start,
                    end,
                    templates: covering,
                });
            }
            for (start, end) in gaps {
                coverage_gaps.push(format!(
                    "{}: no template covers the {}-{} opening window",
                    data.month.date_string(day),
                    fmt_clock(start),
                    fmt_clock(end)
                ));
            }
        }

        let workable: Vec<bool> = (1..=data.month.days_in_month)
            .map(|day| data.workable_day(day))
            .collect();
        let weekend_day: Vec<bool> = (1..=data.month.days_in_month)
            .map(|day| data.month.weekday(day) == 5 || data.month.trading_sundays.contains(&day))
            .collect();

        let weeks = data.month.iso_weeks();
        let n_weeks = weeks.len();
        let mut week_of_day = vec![0usize; d_n];
        for (w, week) in weeks.iter().enumerate() {
            for &day in week {
                week_of_day[day as usize - 1] = w;
            }
        }
        let blocks = data.month.calendar_blocks();

        let mut model = ScheduleModel {
            data,
            n_days: d_n,
            n_templates: t_n,
            candidates,
            active_cells,
            total_variables,
            hard_constraints: 0,
            soft_constraints: 0,
            staffing,
            staffing_by_day,
            slot_rules,
            coverage_gaps,
            unsupported_slots,
            supervisors,
            eligible_by_template,
            night_conflict,
            rest_conflict,
            workable,
            day_active,
            weekend_day,
            week_of_day,
            n_weeks,
            blocks,
        };
        model.hard_constraints = model.count_hard_constraints();
        model.soft_constraints = model.count_soft_constraints();
        info!(
            "model built: {} variables, {} hard constraints, {} soft constraints",
            model.total_variables, model.hard_constraints, model.soft_constraints
        );
        if !model.coverage_gaps.is_empty() {
            debug!(
                "{} opening slots have no covering template",
                model.coverage_gaps.len()
            );
        }
        model
    }

    pub fn cell(&self, employee: usize, day: u32) -> usize {
        employee * self.n_days + day as usize - 1
    }

    pub fn empty_solution(&self) -> Solution {
        vec![None; self.data.employees.len() * self.n_days]
    }

    pub fn is_structurally_infeasible(&self) -> bool {
        !self.unsupported_slots.is_empty()
    }

    pub fn night_conflicts(&self, t1: usize, t2: usize) -> bool {
        self.night_conflict[t1 * self.n_templates + t2]
    }

    pub fn short_rest(&self, t1: usize, t2: usize) -> bool {
        self.rest_conflict[t1 * self.n_templates + t2]
    }

    fn count_hard_constraints(&self) -> usize {
        let mut count = self.active_cells.len(); // at most one shift per day
        count += self
            .staffing
            .iter()
            .filter(|rule| rule.max.is_some())
            .count();
        count += self
            .staffing
            .iter()
            .filter(|rule| rule.supervisor_candidates >= 2)
            .count();
        count += self.conflicting_pairs(&self.night_conflict);
        count += self.slot_rules.len();
        count
    }

    fn count_soft_constraints(&self) -> usize {
        let e_n = self.data.employees.len();
        let d_n = self.n_days;
        let active_employees = (0..e_n)
            .filter(|&e| (0..d_n).any(|di| !self.candidates[e * d_n + di].is_empty()))
            .count();

        let mut count = active_employees; // hour targets
        count += self.staffing.iter().filter(|rule| rule.min > 0).count();
        count += (0..d_n)
            .filter(|&di| {
                self.workable[di]
                    && self.staffing_by_day[di]
                        .iter()
                        .filter(|&&r| self.staffing[r].candidate_count > 0)
                        .count()
                        >= 2
            })
            .count();
        if !self.supervisors.is_empty() {
            count += (0..d_n)
                .filter(|&di| self.workable[di] && self.day_active[di])
                .count();
            count += self.staffing.len();
        }
        count += self.conflicting_pairs(&self.rest_conflict);
        let window = self.data.rules.max_consecutive_days as usize + 1;
        if d_n >= window {
            count += active_employees * (d_n - window + 1); // sliding windows
        }
        count += active_employees * self.blocks.len();
        count += active_employees * self.n_weeks;
        for &cell in &self.active_cells {
            let e = cell / d_n;
            let weekday = self.data.month.weekday((cell % d_n) as u32 + 1);
            let employee = &self.data.employees[e];
            if employee.unavailable_weekdays[weekday] {
                count += 1;
            }
            if weekday == 6 {
                count += 1;
            }
            if !employee.can_work_weekends && weekday >= 5 {
                count += 1;
            }
        }
        count += 1; // weekend fairness
        if self.supervisors.len() >= 2 {
            count += 1;
        }
        count += self
            .eligible_by_template
            .iter()
            .filter(|eligible| eligible.len() >= 2)
            .count();
        count
    }

    fn conflicting_pairs(&self, table: &[bool]) -> usize {
        let d_n = self.n_days;
        let t_n = self.n_templates;
        let mut count = 0;
        for e in 0..self.data.employees.len() {
            for di in 0..d_n.saturating_sub(1) {
                for &t1 in &self.candidates[e * d_n + di] {
                    for &t2 in &self.candidates[e * d_n + di + 1] {
                        if table[t1 as usize * t_n + t2 as usize] {
                            count += 1;
                        }
                    }
                }
            }
        }
        count
    }

    /// Scores a candidate solution: hard violations first, then the weighted
    /// penalty sum, with the per-level breakdown and violation counters.
    pub fn evaluate(&self, sol: &Solution) -> Evaluation {
        let data = self.data;
        let e_n = data.employees.len();
        let d_n = self.n_days;
        let t_n = self.n_templates;

        let mut count = vec![0u32; d_n * t_n];
        let mut sup_count = vec![0u32; d_n * t_n];
        let mut minutes = vec![0i64; e_n];
        let mut works = vec![false; e_n * d_n];
        let mut tpl_count = vec![0u32; e_n * t_n];
        let mut weekend_count = vec![0u32; e_n];
        let mut week_minutes = vec![0i64; e_n * self.n_weeks];

        let mut breakdown = PenaltyBreakdown::default();
        let mut counters = ViolationCounters::default();

        for (e, employee) in data.employees.iter().enumerate() {
            for di in 0..d_n {
                let cell = e * d_n + di;
                let Some(t) = sol[cell] else { continue };
                let t = t as usize;
                let template = &data.templates[t];
                count[di * t_n + t] += 1;
                if employee.is_supervisor {
                    sup_count[di * t_n + t] += 1;
                }
                minutes[e] += template.duration as i64;
                works[cell] = true;
                tpl_count[e * t_n + t] += 1;
                if self.weekend_day[di] {
                    weekend_count[e] += 1;
                }
                week_minutes[e * self.n_weeks + self.week_of_day[di]] += template.duration as i64;

                let weekday = data.month.weekday(di as u32 + 1);
                if employee.unavailable_weekdays[weekday] {
                    breakdown.preferences += W_AVOIDED_DAY;
                }
                if weekday == 6 {
                    breakdown.preferences += W_SUNDAY_WORK;
                }
                if !employee.can_work_weekends && weekday >= 5 {
                    breakdown.preferences += W_AVOIDED_DAY;
                }
            }
        }

        // Hard families: staffing maxima, one supervisor per template-day,
        // night overlap, minimum slot coverage.
        let mut hard = 0u64;
        for rule in &self.staffing {
            let di = rule.day as usize - 1;
            let c = count[di * t_n + rule.template];
            if let Some(max) = rule.max {
                if c > max {
                    hard += (c - max) as u64;
                }
            }
            let s = sup_count[di * t_n + rule.template];
            if s > 1 {
                hard += (s - 1) as u64;
            }
        }
        for e in 0..e_n {
            for di in 0..d_n.saturating_sub(1) {
                if let (Some(t1), Some(t2)) = (sol[e * d_n + di], sol[e * d_n + di + 1]) {
                    if self.night_conflict[t1 as usize * t_n + t2 as usize] {
                        hard += 1;
                    }
                }
            }
        }
        for rule in &self.slot_rules {
            let di = rule.day as usize - 1;
            if !rule.templates.iter().any(|&t| count[di * t_n + t] > 0) {
                hard += 1;
            }
        }

        // Hour targets.
        for (e, employee) in data.employees.iter().enumerate() {
            let under = (employee.target_minutes - minutes[e]).max(0);
            let over = (minutes[e] - employee.target_minutes).max(0);
            breakdown.hours_under += under * W_HOURS_UNDER;
            breakdown.hours_over += over * W_HOURS_OVER;
        }

        // Coverage slack and supervisor presence on staffed shifts.
        for rule in &self.staffing {
            let di = rule.day as usize - 1;
            let c = count[di * t_n + rule.template];
            if rule.min > 0 {
                let slack = rule.min.saturating_sub(c);
                if slack > 0 {
                    breakdown.coverage += slack as i64 * W_COVERAGE_SLACK;
                    counters.coverage_slack += slack;
                }
            }
            if !self.supervisors.is_empty() && c > 0 && sup_count[di * t_n + rule.template] == 0 {
                breakdown.supervisor_shifts += W_SUPERVISOR_SHIFT;
                counters.supervisor_shifts_missing += 1;
            }
        }

        // Supervisor presence per workable day with any assignable staff.
        if !self.supervisors.is_empty() {
            for di in 0..d_n {
                if !self.workable[di] || !self.day_active[di] {
                    continue;
                }
                if !self.supervisors.iter().any(|&s| works[s * d_n + di]) {
                    breakdown.supervisor_days += W_SUPERVISOR_DAY;
                    counters.supervisor_days_missing += 1;
                }
            }
        }

        // Daily inter-template coverage balance.
        for di in 0..d_n {
            if !self.workable[di] {
                continue;
            }
            let mut lo = u32::MAX;
            let mut hi = 0u32;
            let mut active = 0;
            for &r in &self.staffing_by_day[di] {
                let rule = &self.staffing[r];
                if rule.candidate_count == 0 {
                    continue;
                }
                active += 1;
                let c = count[di * t_n + rule.template];
                lo = lo.min(c);
                hi = hi.max(c);
            }
            if active >= 2 {
                breakdown.daily_balance += (hi - lo) as i64 * W_DAILY_BALANCE;
            }
        }

        // Labor-code soft rules: short daily rest, consecutive days, weekly
        // rest blocks, weekly hour cap.
        for e in 0..e_n {
            let base = e * d_n;
            for di in 0..d_n.saturating_sub(1) {
                if let (Some(t1), Some(t2)) = (sol[base + di], sol[base + di + 1]) {
                    if self.rest_conflict[t1 as usize * t_n + t2 as usize] {
                        breakdown.labor_rules += W_REST11;
                        counters.rest_violations += 1;
                    }
                }
            }
            let limit = data.rules.max_consecutive_days as i64;
            let window = data.rules.max_consecutive_days as usize + 1;
            if d_n >= window {
                for start in 0..=d_n - window {
                    let worked =
                        (start..start + window).filter(|&i| works[base + i]).count() as i64;
                    if worked > limit {
                        breakdown.labor_rules += (worked - limit) * W_CONSECUTIVE;
                    }
                }
            }
            for block in &self.blocks {
                let worked = block
                    .iter()
                    .filter(|&&day| works[base + day as usize - 1])
                    .count() as i64;
                if worked > 6 {
                    breakdown.labor_rules += (worked - 6) * W_WEEKLY_REST;
                }
            }
            let cap = data.employees[e].week_cap_minutes as i64;
            for w in 0..self.n_weeks {
                let worked = week_minutes[e * self.n_weeks + w];
                if worked > cap {
                    breakdown.labor_rules += (worked - cap) * W_WEEKLY_OVERTIME;
                }
            }
        }

        // Weekend fairness, overall and among supervisors.
        if let Some((lo, hi)) = weekend_count.iter().minmax().into_option() {
            breakdown.preferences += (hi - lo) as i64 * W_WEEKEND_FAIRNESS;
        }
        if self.supervisors.len() >= 2 {
            if let Some((lo, hi)) = self
                .supervisors
                .iter()
                .map(|&s| weekend_count[s])
                .minmax()
                .into_option()
            {
                breakdown.preferences += (hi - lo) as i64 * W_WEEKEND_FAIRNESS_SUPERVISORS;
            }
        }

        // Per-template shift-count spread beyond one.
        for (t, eligible) in self.eligible_by_template.iter().enumerate() {
            if eligible.len() < 2 {
                continue;
            }
            if let Some((lo, hi)) = eligible
                .iter()
                .map(|&e| tpl_count[e * t_n + t])
                .minmax()
                .into_option()
            {
                let spread = (hi - lo) as i64;
                if spread > 1 {
                    breakdown.preferences += (spread - 1) * W_SHIFT_BALANCE;
                }
            }
        }

        Evaluation {
            score: Score {
                hard,
                penalty: breakdown.total(),
            },
            breakdown,
            counters,
        }
    }
}
