use regex::Regex;
use std::sync::OnceLock;

pub const PR_URL_PATTERN: &str = r"https://github\.com/[^/]+/[^/]+/pull/\d+";

/// Regex categories that indicate the agent got stuck without asking.
/// Each category contributes at most one synthetic question.
pub struct StuckCategory {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
}

pub const STUCK_PATTERNS: &[StuckCategory] = &[
    StuckCategory {
        name: "repo_ambiguity",
        patterns: &[
            r"which (repo|repository|branch|file)",
            r"unclear (which|what) (to modify|to change)",
            r"multiple (repos|repositories|options)",
        ],
    },
    StuckCategory {
        name: "semantic_ambiguity",
        patterns: &[
            r"could (mean|interpret)",
            r"multiple (interpretations|meanings)",
            r"need clarification",
            r"not sure (if|whether|what)",
            r"unclear (what you mean|intent|requirement)",
        ],
    },
    StuckCategory {
        name: "missing_decision",
        patterns: &[
            r"product decision",
            r"design decision",
            r"(should|would) (I|we|it) (use|choose|prefer)",
            r"which (approach|method|pattern)",
        ],
    },
    StuckCategory {
        name: "env_blocker",
        patterns: &[
            r"(missing|not found|cannot find) (dependency|package|module)",
            r"permission denied",
            r"access denied",
            r"(cannot|couldn't) (connect|access|reach)",
        ],
    },
];

const ASSUMPTION_PATTERNS: &[&str] = &[
    r"(?i)(?:I(?:'m| am) assuming|Assumption:|Assumed:)\s*(.+)",
    r"(?i)(?:I(?:'ll| will) assume)\s*(.+)",
];

const MAX_ASSUMPTIONS: usize = 10;

fn compiled(pattern: &str) -> Regex {
    #[allow(clippy::expect_used)]
    Regex::new(pattern).expect("classifier pattern is a valid static regex")
}

pub fn extract_pr_url(text: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| compiled(PR_URL_PATTERN));
    re.find(text).map(|m| m.as_str().to_string())
}

/// Detect which stuck categories match, in declaration order, one hit each.
pub fn detect_stuck_categories(text: &str) -> Vec<&'static str> {
    STUCK_PATTERNS
        .iter()
        .filter(|category| {
            category
                .patterns
                .iter()
                .any(|p| compiled(&format!("(?i){p}")).is_match(text))
        })
        .map(|category| category.name)
        .collect()
}

/// Extract up to 10 self-reported assumptions from the agent's final text.
pub fn extract_assumptions(text: &str) -> Vec<String> {
    let mut assumptions = Vec::new();
    for pattern in ASSUMPTION_PATTERNS {
        let re = compiled(pattern);
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                assumptions.push(m.as_str().trim().to_string());
            }
        }
    }
    assumptions.truncate(MAX_ASSUMPTIONS);
    assumptions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_pr_url() {
        let text = "Done! Opened https://github.com/acme/widgets/pull/42 for review.";
        assert_eq!(
            extract_pr_url(text),
            Some("https://github.com/acme/widgets/pull/42".to_string())
        );
    }

    #[test]
    fn no_pr_url_returns_none() {
        assert_eq!(extract_pr_url("no links here"), None);
    }

    #[test]
    fn detects_repo_ambiguity_category() {
        let categories = detect_stuck_categories("I'm not sure which repository to modify.");
        assert!(categories.contains(&"repo_ambiguity"));
    }

    #[test]
    fn extracts_assumptions_capped_at_ten() {
        let text = (0..15)
            .map(|i| format!("I'm assuming thing {i} is fine."))
            .collect::<Vec<_>>()
            .join("\n");
        let assumptions = extract_assumptions(&text);
        assert_eq!(assumptions.len(), 10);
        assert_eq!(assumptions[0], "thing 0 is fine.");
    }
}
