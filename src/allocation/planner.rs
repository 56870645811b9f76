use crate::allocation::{
    Booking, GuardCandidate, OpenShift, Roster,
    scoring::{ScoreBreakdown, ScoringPolicy, score_guard},
    skills::SkillMatch,
};
use std::cmp::Ordering;
use std::collections::HashSet;

/// A guard judged eligible for a shift, with its score.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub guard_id: u64,
    pub username: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub skills: SkillMatch,
}

#[derive(Debug, Clone)]
pub enum ShiftOutcome {
    Assigned(RankedCandidate),
    NoCandidates,
}

#[derive(Debug, Clone)]
pub struct ShiftPlan {
    pub shift: OpenShift,
    pub outcome: ShiftOutcome,
}

/// Why a single guard could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRejection {
    NoOpenShift,
    NoSuitableShift,
}

impl ScanRejection {
    pub fn reason(self) -> &'static str {
        match self {
            ScanRejection::NoOpenShift => "no open shift",
            ScanRejection::NoSuitableShift => "no suitable shift",
        }
    }
}

/// Greedy allocator: shifts are filled in the order given, each taking the
/// best-scoring eligible guard. Every assignment is booked into the roster so
/// later shifts see it for conflicts, consecutive days and fairness.
pub struct Planner<'a> {
    policy: &'a ScoringPolicy,
    guards: &'a [GuardCandidate],
    roster: Roster,
}

impl<'a> Planner<'a> {
    pub fn new(policy: &'a ScoringPolicy, guards: &'a [GuardCandidate], roster: Roster) -> Self {
        Planner {
            policy,
            guards,
            roster,
        }
    }

    pub fn into_roster(self) -> Roster {
        self.roster
    }

    fn eligible(&self, guard: &GuardCandidate, shift: &OpenShift) -> bool {
        if self.roster.has_conflict(guard.user_id, shift.id, &shift.span()) {
            return false;
        }
        let limit = self.policy.consecutive_limit(guard);
        self.roster
            .consecutive_days_before(guard.user_id, shift.date, limit)
            < limit
    }

    fn score(&self, guard: &GuardCandidate, shift: &OpenShift) -> RankedCandidate {
        let (breakdown, skills) = score_guard(self.policy, &self.roster, guard, shift);
        RankedCandidate {
            guard_id: guard.user_id,
            username: guard.username.clone(),
            score: breakdown.total,
            breakdown,
            skills,
        }
    }

    /// Eligible guards for `shift`, best first, skipping `exclude`.
    pub fn rank(&self, shift: &OpenShift, exclude: &HashSet<u64>) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = self
            .guards
            .iter()
            .filter(|g| !exclude.contains(&g.user_id))
            .filter(|g| self.eligible(g, shift))
            .map(|g| self.score(g, shift))
            .collect();
        ranked.sort_by(compare_candidates);
        ranked
    }

    fn book(&mut self, guard_id: u64, shift: &OpenShift) {
        self.roster.book(Booking {
            guard_id,
            shift_id: shift.id,
            date: shift.date,
            span: shift.span(),
        });
    }

    /// Plans one allocation run. A guard receives at most one shift per run
    /// and a shift holds a single guard.
    pub fn plan(&mut self, shifts: &[OpenShift]) -> Vec<ShiftPlan> {
        let mut assigned_in_run: HashSet<u64> = HashSet::new();
        let mut plans = Vec::with_capacity(shifts.len());

        for shift in shifts {
            let outcome = match self.rank(shift, &assigned_in_run).into_iter().next() {
                Some(best) => {
                    assigned_in_run.insert(best.guard_id);
                    self.book(best.guard_id, shift);
                    ShiftOutcome::Assigned(best)
                }
                None => ShiftOutcome::NoCandidates,
            };
            plans.push(ShiftPlan {
                shift: shift.clone(),
                outcome,
            });
        }
        plans
    }

    /// Best open shift for a single guard. A shift is suitable when it has
    /// no skill requirements or shares at least one skill with the guard.
    pub fn best_shift_for(
        &self,
        guard: &GuardCandidate,
        shifts: &[OpenShift],
    ) -> Result<(OpenShift, RankedCandidate), ScanRejection> {
        if shifts.is_empty() {
            return Err(ScanRejection::NoOpenShift);
        }

        let mut best: Option<(OpenShift, RankedCandidate)> = None;
        for shift in shifts {
            if !self.eligible(guard, shift) {
                continue;
            }
            let candidate = self.score(guard, shift);
            if !shift.required_skills.is_empty() && !candidate.skills.has_overlap() {
                continue;
            }
            let better = match &best {
                None => true,
                Some((best_shift, best_candidate)) => {
                    match compare_candidates(&candidate, best_candidate) {
                        Ordering::Less => true,
                        Ordering::Equal => shift.span().start < best_shift.span().start,
                        Ordering::Greater => false,
                    }
                }
            };
            if better {
                best = Some((shift.clone(), candidate));
            }
        }
        best.ok_or(ScanRejection::NoSuitableShift)
    }
}

/// Higher score first, then more exact skill matches, then lower guard id.
fn compare_candidates(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.skills.exact.len().cmp(&a.skills.exact.len()))
        .then_with(|| a.guard_id.cmp(&b.guard_id))
}
