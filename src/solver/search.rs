use rand::rngs::SmallRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use std::time::Instant;

use crate::scheduler::model::{Evaluation, ScheduleModel, Solution};

const MOVES_PER_DEADLINE_CHECK: usize = 64;
const STAGNATION_LIMIT: usize = 40;

enum AppliedMove {
    One {
        cell: usize,
        prev: Option<u16>,
    },
    Two {
        a: usize,
        prev_a: Option<u16>,
        b: usize,
        prev_b: Option<u16>,
    },
}

fn undo(sol: &mut Solution, applied: AppliedMove) {
    match applied {
        AppliedMove::One { cell, prev } => sol[cell] = prev,
        AppliedMove::Two {
            a,
            prev_a,
            b,
            prev_b,
        } => {
            sol[a] = prev_a;
            sol[b] = prev_b;
        }
    }
}

fn admissible(model: &ScheduleModel, cell: usize, value: Option<u16>) -> bool {
    match value {
        None => true,
        Some(t) => model.candidates[cell].binary_search(&t).is_ok(),
    }
}

/// Mutates the solution by one local move and returns the undo record, or
/// `None` when the drawn move is a no-op.
fn propose_move(
    model: &ScheduleModel,
    sol: &mut Solution,
    rng: &mut SmallRng,
) -> Option<AppliedMove> {
    match rng.random_range(0u32..7) {
        // reassign a cell to a random admissible template
        0..=3 => {
            let &cell = model.active_cells.choose(rng)?;
            let &t = model.candidates[cell].choose(rng)?;
            if sol[cell] == Some(t) {
                return None;
            }
            let prev = sol[cell];
            sol[cell] = Some(t);
            Some(AppliedMove::One { cell, prev })
        }
        // give a cell the day off
        4 => {
            let &cell = model.active_cells.choose(rng)?;
            let prev = sol[cell].take()?;
            Some(AppliedMove::One {
                cell,
                prev: Some(prev),
            })
        }
        // swap two employees on the same day
        _ => {
            let employees = model.data.employees.len();
            if employees < 2 {
                return None;
            }
            let &a = model.active_cells.choose(rng)?;
            let day = (a % model.n_days) as u32 + 1;
            let e1 = a / model.n_days;
            let e2 = rng.random_range(0..employees);
            if e1 == e2 {
                return None;
            }
            let b = model.cell(e2, day);
            if sol[a] == sol[b] {
                return None;
            }
            if !admissible(model, a, sol[b]) || !admissible(model, b, sol[a]) {
                return None;
            }
            let prev_a = sol[a];
            let prev_b = sol[b];
            sol[a] = prev_b;
            sol[b] = prev_a;
            Some(AppliedMove::Two {
                a,
                prev_a,
                b,
                prev_b,
            })
        }
    }
}

/// True when assigning template `t` to (employee, day) would overlap a night
/// shift on either neighboring day.
fn conflicts_with_neighbors(
    model: &ScheduleModel,
    sol: &Solution,
    employee: usize,
    day: u32,
    t: usize,
) -> bool {
    if day > 1 {
        if let Some(prev) = sol[model.cell(employee, day - 1)] {
            if model.night_conflicts(prev as usize, t) {
                return true;
            }
        }
    }
    if (day as usize) < model.n_days {
        if let Some(next) = sol[model.cell(employee, day + 1)] {
            if model.night_conflicts(t, next as usize) {
                return true;
            }
        }
    }
    false
}

struct GreedyState {
    minutes: Vec<i64>,
    count: Vec<u32>,
    sup_on: Vec<bool>,
}

fn place(
    model: &ScheduleModel,
    sol: &mut Solution,
    state: &mut GreedyState,
    employee: usize,
    day: u32,
    t: usize,
) {
    let slot = (day as usize - 1) * model.n_templates + t;
    sol[model.cell(employee, day)] = Some(t as u16);
    state.minutes[employee] += model.data.templates[t].duration as i64;
    state.count[slot] += 1;
    if model.data.employees[employee].is_supervisor {
        state.sup_on[slot] = true;
    }
}

/// Coverage-first greedy start: satisfy staffing minima, then plug uncovered
/// opening slots, then top employees up toward their hour targets.
fn initial_solution(model: &ScheduleModel, rng: &mut SmallRng) -> Solution {
    let data = model.data;
    let e_n = data.employees.len();
    let t_n = model.n_templates;
    let mut sol = model.empty_solution();
    let mut state = GreedyState {
        minutes: vec![0i64; e_n],
        count: vec![0u32; model.n_days * t_n],
        sup_on: vec![false; model.n_days * t_n],
    };

    let mut order: Vec<usize> = (0..e_n).collect();
    for rule in &model.staffing {
        if rule.min == 0 {
            continue;
        }
        let slot = (rule.day as usize - 1) * t_n + rule.template;
        order.shuffle(rng);
        let mut pool: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&e| {
                let cell = model.cell(e, rule.day);
                sol[cell].is_none()
                    && model.candidates[cell]
                        .binary_search(&(rule.template as u16))
                        .is_ok()
            })
            .collect();
        pool.sort_by_key(|&e| state.minutes[e] - data.employees[e].target_minutes);
        for e in pool {
            if state.count[slot] >= rule.min {
                break;
            }
            if rule.max.is_some_and(|max| state.count[slot] >= max) {
                break;
            }
            if data.employees[e].is_supervisor && state.sup_on[slot] {
                continue;
            }
            if conflicts_with_neighbors(model, &sol, e, rule.day, rule.template) {
                continue;
            }
            place(model, &mut sol, &mut state, e, rule.day, rule.template);
        }
    }

    for rule in &model.slot_rules {
        let di = rule.day as usize - 1;
        if rule.templates.iter().any(|&t| state.count[di * t_n + t] > 0) {
            continue;
        }
        let mut best: Option<(i64, usize, usize)> = None;
        for &t in &rule.templates {
            if data.templates[t]
                .max_staff
                .is_some_and(|max| state.count[di * t_n + t] >= max)
            {
                continue;
            }
            for e in 0..e_n {
                let cell = model.cell(e, rule.day);
                if sol[cell].is_some() {
                    continue;
                }
                if model.candidates[cell].binary_search(&(t as u16)).is_err() {
                    continue;
                }
                if data.employees[e].is_supervisor && state.sup_on[di * t_n + t] {
                    continue;
                }
                if conflicts_with_neighbors(model, &sol, e, rule.day, t) {
                    continue;
                }
                let deficit = data.employees[e].target_minutes - state.minutes[e];
                if best.map_or(true, |(d, _, _)| deficit > d) {
                    best = Some((deficit, e, t));
                }
            }
        }
        if let Some((_, e, t)) = best {
            place(model, &mut sol, &mut state, e, rule.day, t);
        }
    }

    let mut days = data.month.workable_days();
    for e in 0..e_n {
        days.shuffle(rng);
        for &day in days.iter() {
            let deficit = data.employees[e].target_minutes - state.minutes[e];
            if deficit <= 0 {
                break;
            }
            let cell = model.cell(e, day);
            if sol[cell].is_some() {
                continue;
            }
            let di = day as usize - 1;
            let mut best: Option<(i64, usize)> = None;
            for &t in &model.candidates[cell] {
                let t = t as usize;
                if data.templates[t]
                    .max_staff
                    .is_some_and(|max| state.count[di * t_n + t] >= max)
                {
                    continue;
                }
                if data.employees[e].is_supervisor && state.sup_on[di * t_n + t] {
                    continue;
                }
                if conflicts_with_neighbors(model, &sol, e, day, t) {
                    continue;
                }
                let overshoot = (data.templates[t].duration as i64 - deficit).abs();
                if best.map_or(true, |(o, _)| overshoot < o) {
                    best = Some((overshoot, t));
                }
            }
            if let Some((_, t)) = best {
                place(model, &mut sol, &mut state, e, day, t);
            }
        }
    }
    sol
}

fn perturb(model: &ScheduleModel, sol: &mut Solution, rng: &mut SmallRng) {
    let kicks = (model.active_cells.len() / 10).max(1);
    for _ in 0..kicks {
        if let Some(&cell) = model.active_cells.choose(rng) {
            if rng.random_bool(0.3) {
                sol[cell] = None;
            } else if let Some(&t) = model.candidates[cell].choose(rng) {
                sol[cell] = Some(t);
            }
        }
    }
}

/// One search worker: hill-climb with random restarts from the incumbent
/// until the deadline, returning the best solution seen.
pub fn run_worker(model: &ScheduleModel, deadline: Instant, seed: u64) -> (Solution, Evaluation) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut current = initial_solution(model, &mut rng);
    let mut current_eval = model.evaluate(&current);
    let mut best = current.clone();
    let mut best_eval = current_eval;
    let mut stagnant = 0usize;

    while Instant::now() < deadline {
        for _ in 0..MOVES_PER_DEADLINE_CHECK {
            let Some(applied) = propose_move(model, &mut current, &mut rng) else {
                continue;
            };
            let eval = model.evaluate(&current);
            if eval.score <= current_eval.score {
                current_eval = eval;
            } else {
                undo(&mut current, applied);
            }
        }
        if current_eval.score < best_eval.score {
            best.clone_from(&current);
            best_eval = current_eval;
            stagnant = 0;
        } else {
            stagnant += 1;
        }
        if best_eval.score.hard == 0 && best_eval.score.penalty == 0 {
            break;
        }
        if stagnant >= STAGNATION_LIMIT {
            current.clone_from(&best);
            perturb(model, &mut current, &mut rng);
            current_eval = model.evaluate(&current);
            stagnant = 0;
        }
    }
    (best, best_eval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Employee, EmploymentType, ScheduleRequest, ShiftTemplate};
    use crate::scheduler::data::DataModel;
    use std::time::Duration;

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
            employees: (0..2)
                .map(|i| Employee {
                    id: format!("e{}", i),
                    first_name: format!("E{}", i),
                    last_name: "Test".to_string(),
                    employment_type: EmploymentType::Full,
                    custom_weekly_hours: None,
                    max_hours: None,
                    is_supervisor: false,
                    is_active: true,
                    permitted_templates: vec![],
                    color: None,
                })
                .collect(),
            employee_preferences: vec![],
            employee_absences: vec![],
            scheduling_rules: Default::default(),
            trading_sundays: vec![],
            solver_time_limit: None,
        }
    }

    #[test]
    fn test_greedy_start_covers_minimum_staffing() {
        let data = DataModel::build(&request()).unwrap();
        let model = crate::scheduler::model::ScheduleModel::build(&data);
        let mut rng = SmallRng::seed_from_u64(7);
        let sol = initial_solution(&model, &mut rng);
        let eval = model.evaluate(&sol);
        assert_eq!(eval.counters.coverage_slack, 0);
        assert_eq!(eval.score.hard, 0);
    }

    #[test]
    fn test_worker_reaches_clean_schedule() {
        let data = DataModel::build(&request()).unwrap();
        let model = crate::scheduler::model::ScheduleModel::build(&data);
        let deadline = Instant::now() + Duration::from_secs(2);
        let (_, eval) = run_worker(&model, deadline, 42);
        assert_eq!(eval.score.hard, 0);
        // both employees can reach their full target, so the optimum is clean
        assert_eq!(eval.score.penalty, 0);
    }

    #[test]
    fn test_moves_are_reversible() {
        let data = DataModel::build(&request()).unwrap();
        let model = crate::scheduler::model::ScheduleModel::build(&data);
        let mut rng = SmallRng::seed_from_u64(3);
        let mut sol = initial_solution(&model, &mut rng);
        let snapshot = sol.clone();
        for _ in 0..200 {
            if let Some(applied) = propose_move(&model, &mut sol, &mut rng) {
                undo(&mut sol, applied);
                assert_eq!(sol, snapshot);
            }
        }
    }
}
