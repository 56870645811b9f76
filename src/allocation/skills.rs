use serde::Serialize;
use utoipa::ToSchema;

/// Splits a comma-separated tag list into trimmed, lowercased, unique tags.
pub fn parse_tags(s: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in s.split(',').map(|t| t.trim().to_lowercase()) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// How a guard's skills line up with a shift's required tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SkillMatch {
    /// Required tags the guard holds verbatim (case-insensitive).
    pub exact: Vec<String>,
    /// Required tags only loosely covered by a guard tag.
    pub partial: Vec<String>,
    pub missing: Vec<String>,
    pub required: usize,
}

impl SkillMatch {
    /// Share of required tags covered; partial hits count half. A shift with
    /// no requirements is fully covered.
    pub fn fraction(&self) -> f64 {
        if self.required == 0 {
            return 1.0;
        }
        (self.exact.len() as f64 + 0.5 * self.partial.len() as f64) / self.required as f64
    }

    pub fn has_overlap(&self) -> bool {
        !self.exact.is_empty() || !self.partial.is_empty()
    }

    /// Every required tag held exactly.
    pub fn covers_all(&self) -> bool {
        self.exact.len() == self.required
    }
}

/// Classifies each required tag as exact, partial or missing against the
/// guard's tags. Both inputs are expected to be normalised by `parse_tags`.
pub fn match_skills(guard: &[String], required: &[String]) -> SkillMatch {
    let mut out = SkillMatch {
        required: required.len(),
        ..SkillMatch::default()
    };

    for req in required {
        if guard.iter().any(|g| g == req) {
            out.exact.push(req.clone());
        } else if guard.iter().any(|g| is_partial(g, req)) {
            out.partial.push(req.clone());
        } else {
            out.missing.push(req.clone());
        }
    }
    out
}

fn is_partial(guard_tag: &str, required: &str) -> bool {
    if guard_tag.contains(required) || required.contains(guard_tag) {
        return true;
    }
    let required_tokens: Vec<&str> = tokens(required).collect();
    tokens(guard_tag).any(|t| required_tokens.contains(&t))
}

fn tokens(tag: &str) -> impl Iterator<Item = &str> {
    tag.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(s: &str) -> Vec<String> {
        parse_tags(s)
    }

    #[test]
    fn parse_tags_normalises_and_dedupes() {
        assert_eq!(
            parse_tags(" CCTV, first aid ,,cctv, Dog Handling "),
            vec!["cctv", "first aid", "dog handling"]
        );
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ,").is_empty());
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let m = match_skills(&tags("CCTV"), &tags("cctv"));
        assert_eq!(m.exact, vec!["cctv"]);
        assert!(m.partial.is_empty());
        assert!(m.covers_all());
    }

    #[test]
    fn substring_and_token_overlaps_are_partial() {
        let m = match_skills(
            &tags("advanced first aid, access-control"),
            &tags("first aid, access control, k9"),
        );
        assert!(m.exact.is_empty());
        assert_eq!(m.partial, vec!["first aid", "access control"]);
        assert_eq!(m.missing, vec!["k9"]);
        assert!(m.has_overlap());
        assert!((m.fraction() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn exact_wins_over_partial_for_same_tag() {
        let m = match_skills(&tags("first aid, first aid instructor"), &tags("first aid"));
        assert_eq!(m.exact, vec!["first aid"]);
        assert!(m.partial.is_empty());
    }

    #[test]
    fn no_requirements_is_full_coverage() {
        let m = match_skills(&tags("cctv"), &[]);
        assert_eq!(m.fraction(), 1.0);
        assert!(m.covers_all());
        assert!(!m.has_overlap());
    }

    #[test]
    fn disjoint_skills_have_no_overlap() {
        let m = match_skills(&tags("driving"), &tags("cctv"));
        assert!(!m.has_overlap());
        assert_eq!(m.fraction(), 0.0);
    }
}
