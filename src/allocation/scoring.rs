use crate::allocation::{
    GuardCandidate, OpenShift, Roster,
    skills::{SkillMatch, match_skills},
};
use crate::config::Config;
use serde::Serialize;
use utoipa::ToSchema;

/// Weights and limits used to rank guards for a shift.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    pub skill_exact_weight: f64,
    pub skill_partial_weight: f64,
    pub experience_weight: f64,
    pub experience_cap_years: i32,
    pub consecutive_penalty: f64,
    pub fairness_penalty: f64,
    pub fairness_window_days: u32,
    pub max_consecutive_days: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        ScoringPolicy {
            skill_exact_weight: 10.0,
            skill_partial_weight: 5.0,
            experience_weight: 1.0,
            experience_cap_years: 20,
            consecutive_penalty: 1.0,
            fairness_penalty: 0.8,
            fairness_window_days: 7,
            max_consecutive_days: 6,
        }
    }
}

impl ScoringPolicy {
    pub fn from_config(config: &Config) -> Self {
        ScoringPolicy {
            fairness_window_days: config.fairness_window_days,
            max_consecutive_days: config.max_consecutive_days,
            ..ScoringPolicy::default()
        }
    }

    pub fn consecutive_limit(&self, guard: &GuardCandidate) -> u32 {
        guard.max_consecutive_days.unwrap_or(self.max_consecutive_days)
    }

    /// Days of history a run needs to evaluate consecutive-day caps and the
    /// fairness window for `guards`.
    pub fn lookback_days(&self, guards: &[GuardCandidate]) -> u32 {
        guards
            .iter()
            .map(|g| self.consecutive_limit(g))
            .chain([self.max_consecutive_days, self.fairness_window_days])
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ScoreBreakdown {
    pub skill_frac: f64,
    pub exact_matches: usize,
    pub partial_matches: usize,
    pub skill_score: f64,
    pub experience_years: i32,
    pub experience_score: f64,
    pub consecutive_before: u32,
    pub consecutive_penalty: f64,
    pub fairness_recent: u32,
    pub fairness_penalty: f64,
    pub total: f64,
}

/// Scores `guard` for `shift` given the existing roster.
pub fn score_guard(
    policy: &ScoringPolicy,
    roster: &Roster,
    guard: &GuardCandidate,
    shift: &OpenShift,
) -> (ScoreBreakdown, SkillMatch) {
    let skills = match_skills(&guard.skills, &shift.required_skills);

    let skill_score = skills.exact.len() as f64 * policy.skill_exact_weight
        + skills.partial.len() as f64 * policy.skill_partial_weight;

    let experience_years = guard.experience_years.max(0);
    let experience_score =
        experience_years.min(policy.experience_cap_years) as f64 * policy.experience_weight;

    let consecutive_before =
        roster.consecutive_days_before(guard.user_id, shift.date, policy.consecutive_limit(guard));
    let consecutive_penalty = consecutive_before as f64 * policy.consecutive_penalty;

    let fairness_recent =
        roster.recent_count(guard.user_id, shift.date, policy.fairness_window_days);
    let fairness_penalty = fairness_recent as f64 * policy.fairness_penalty;

    let total = skill_score + experience_score - consecutive_penalty - fairness_penalty;

    let breakdown = ScoreBreakdown {
        skill_frac: skills.fraction(),
        exact_matches: skills.exact.len(),
        partial_matches: skills.partial.len(),
        skill_score,
        experience_years,
        experience_score,
        consecutive_before,
        consecutive_penalty,
        fairness_recent,
        fairness_penalty,
        total,
    };
    (breakdown, skills)
}
