use crate::context::SignalContext;

const MISSION_BLOCK: &str = r#"
# Your Mission

You are creating a **comprehensive implementation spec** for this task. Your goal is NOT to fully implement the solution, but to:

1. **Understand the codebase** - Explore the repository structure, find relevant files, understand patterns
2. **Analyze the task** - Break down what needs to be done, identify affected areas
3. **Identify unknowns** - What information is missing? What decisions need human input?
4. **Generate a spec** - Document exactly what changes need to be made and how

## Process

1. First, explore the codebase to understand the relevant parts
2. Read key files that relate to this task
3. Identify any ambiguities, missing information, or decisions that require human input
4. If you have questions, use `AskUserQuestion` to gather ALL your questions at once
   - **IMPORTANT**: Aggregate all your questions into a SINGLE AskUserQuestion call
   - Do not ask questions one at a time - batch them together
   - Include context for why each question matters

## Output

At the end, provide a structured spec that includes:
- **Summary**: One paragraph overview of what needs to be done
- **Files to Modify**: List of files that need changes
- **Implementation Steps**: Detailed steps to implement the solution
- **Risks/Considerations**: Any potential issues or edge cases
- **Open Questions**: Any remaining uncertainties (if you couldn't get answers)

## Guidelines

- You MAY make exploratory changes to understand the codebase better
- You MAY run tests or builds to verify your understanding
- Keep your exploration focused and efficient
- If the task is ambiguous, ASK rather than assume
"#;

/// Deterministically assemble the prompt sent to the agent.
///
/// Section order: header, optional GitHub enrichment, project fields, the
/// task itself, prior clarifications (if retrying), then a fixed
/// instruction block. The result is captured as the first log artifact.
pub fn build_prompt(signal: &SignalContext) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push("# Signal Context\n".to_string());
    parts.push(format!("**Source**: {}", signal.source));
    parts.push(format!("**Repository**: {}", signal.repo));
    if let Some(issue_number) = signal.issue_number {
        parts.push(format!("**Issue Number**: #{issue_number}"));
    }

    if signal.source == "github" {
        if let Some(metadata) = &signal.metadata {
            if let Some(url) = metadata.get("url").and_then(|v| v.as_str()) {
                parts.push(format!("**URL**: {url}"));
            }
            if let Some(labels) = metadata.get("labels").and_then(|v| v.as_array()) {
                let joined = labels
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                if !joined.is_empty() {
                    parts.push(format!("**Labels**: {joined}"));
                }
            }
            if let Some(assignees) = metadata.get("assignees").and_then(|v| v.as_array()) {
                let joined = assignees
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                if !joined.is_empty() {
                    parts.push(format!("**Assignees**: {joined}"));
                }
            }

            let comments = metadata
                .get("context")
                .and_then(|c| c.get("comments"))
                .and_then(|c| c.as_array());
            if let Some(comments) = comments {
                if !comments.is_empty() {
                    parts.push("\n## Discussion Comments".to_string());
                    for comment in comments.iter().take(5) {
                        let author = comment
                            .get("author")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown");
                        let body = comment.get("body").and_then(|v| v.as_str()).unwrap_or("");
                        parts.push(format!("\n**@{author}**:\n{body}"));
                    }
                }
            }
        }
    }

    if let Some(project_fields) = &signal.project_fields {
        if let Some(obj) = project_fields.as_object() {
            if !obj.is_empty() {
                parts.push("\n## Project Fields".to_string());
                for (key, value) in obj {
                    if !value.is_null() {
                        parts.push(format!("**{key}**: {}", display_value(value)));
                    }
                }
            }
        }
    }

    parts.push(format!("\n# Task\n**Title**: {}\n", signal.title));
    if let Some(body) = &signal.body {
        parts.push(format!("**Description**:\n{body}\n"));
    }

    if !signal.clarifications.is_empty() {
        parts.push("\n# Previous Clarifications".to_string());
        parts.push("These questions were asked in a previous attempt and answered:\n".to_string());
        for c in &signal.clarifications {
            parts.push(format!("**Q**: {}", c.question));
            parts.push(format!("**A**: {}\n", c.answer));
        }
    }

    parts.push(MISSION_BLOCK.to_string());

    parts.join("\n")
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_signal() -> SignalContext {
        SignalContext {
            source: "github".to_string(),
            repo: "acme/widgets".to_string(),
            issue_number: Some(42),
            title: "Add dark mode".to_string(),
            body: Some("Users want a dark theme.".to_string()),
            metadata: None,
            project_fields: None,
            clarifications: Vec::new(),
        }
    }

    #[test]
    fn prompt_includes_header_and_task() {
        let prompt = build_prompt(&base_signal());
        assert!(prompt.contains("**Source**: github"));
        assert!(prompt.contains("**Repository**: acme/widgets"));
        assert!(prompt.contains("**Issue Number**: #42"));
        assert!(prompt.contains("**Title**: Add dark mode"));
        assert!(prompt.contains("Users want a dark theme."));
        assert!(prompt.contains("AskUserQuestion"));
    }

    #[test]
    fn prompt_includes_enrichment_and_clarifications() {
        let mut signal = base_signal();
        signal.metadata = Some(serde_json::json!({
            "url": "https://github.com/acme/widgets/issues/42",
            "labels": ["bug", "ui"],
            "assignees": ["ada"],
            "context": {"comments": [{"author": "grace", "body": "+1"}]},
        }));
        signal.clarifications.push(crate::context::PriorClarification {
            question: "Which theme library?".to_string(),
            answer: "styled-components".to_string(),
        });

        let prompt = build_prompt(&signal);
        assert!(prompt.contains("**Labels**: bug, ui"));
        assert!(prompt.contains("**Assignees**: ada"));
        assert!(prompt.contains("@grace"));
        assert!(prompt.contains("# Previous Clarifications"));
        assert!(prompt.contains("**Q**: Which theme library?"));
        assert!(prompt.contains("**A**: styled-components"));
    }

    #[test]
    fn prompt_caps_discussion_comments_at_five() {
        let mut signal = base_signal();
        let comments: Vec<_> = (0..8)
            .map(|i| serde_json::json!({"author": format!("user{i}"), "body": format!("comment {i}")}))
            .collect();
        signal.metadata = Some(serde_json::json!({"context": {"comments": comments}}));

        let prompt = build_prompt(&signal);
        assert!(prompt.contains("user0"));
        assert!(prompt.contains("user4"));
        assert!(!prompt.contains("user5"));
    }
}
