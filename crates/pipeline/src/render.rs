//! Markdown rendering of a solved problem.
//!
//! Pure and total: every combination of present and absent fields yields a
//! well-formed document, and identical inputs yield identical output.

use crate::types::{ProblemInfo, SolutionData};

/// Fence tag used when the classifier did not report a language.
pub const DEFAULT_CODE_LANGUAGE: &str = "python";

const FENCE: &str = "```";

/// Render `solution` for the problem described by `info`.
pub fn render(solution: &SolutionData, info: &ProblemInfo) -> String {
    let mut out = format!(
        "**Type:** `{}`\n\n",
        info.problem_type.as_str().to_uppercase()
    );

    if info.problem_type.is_coding() {
        render_coding(&mut out, solution, info);
    } else {
        render_answer(&mut out, solution);
    }

    out
}

fn render_coding(out: &mut String, solution: &SolutionData, info: &ProblemInfo) {
    if let Some(steps) = solution
        .text("algorithm_steps")
        .or_else(|| solution.text("reasoning"))
    {
        out.push_str(&format!("### Algorithm Steps\n{steps}\n\n"));
    }

    let edge_cases = solution.list("edge_cases");
    if !edge_cases.is_empty() {
        out.push_str("### Edge Cases\n");
        for case in &edge_cases {
            out.push_str(&format!("- {case}\n"));
        }
        out.push('\n');
    }

    if let Some(code) = solution.text("code").or_else(|| solution.text("answer")) {
        let code = if code.trim_start().starts_with(FENCE) {
            code
        } else {
            let lang = info.detail("language").unwrap_or(DEFAULT_CODE_LANGUAGE);
            format!("{FENCE}{lang}\n{code}\n{FENCE}")
        };
        out.push_str(&format!("### Code Section\n{code}\n\n"));
    }

    let time = solution.text("time_complexity");
    let space = solution.text("space_complexity");
    if time.is_some() || space.is_some() {
        out.push_str("### Complexity\n");
        if let Some(time) = time {
            out.push_str(&format!("- **Time**: {time}\n"));
        }
        if let Some(space) = space {
            out.push_str(&format!("- **Space**: {space}\n"));
        }
        out.push('\n');
    }
}

fn render_answer(out: &mut String, solution: &SolutionData) {
    if let Some(reasoning) = solution.text("reasoning") {
        out.push_str(&format!("### Analysis\n{reasoning}\n\n"));
    }
    if let Some(answer) = solution.text("answer") {
        out.push_str(&format!("### Solution\n{answer}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn info(value: Value) -> ProblemInfo {
        ProblemInfo::from_value(value).unwrap()
    }

    fn solution(value: Value) -> SolutionData {
        SolutionData::from_value(value).unwrap()
    }

    fn full_coding() -> (SolutionData, ProblemInfo) {
        (
            solution(json!({"solution": {
                "algorithm_steps": "1. Walk the list\n2. Flip pointers",
                "code": "def reverse(head):\n    ...",
                "time_complexity": "O(n)",
                "space_complexity": "O(1)",
                "edge_cases": ["Empty list", "Single node"]
            }})),
            info(json!({"problem_type": "coding", "details": {"language": "python"}})),
        )
    }

    #[test]
    fn coding_sections_in_fixed_order() {
        let (sol, inf) = full_coding();
        let out = render(&sol, &inf);
        assert_eq!(
            out,
            "**Type:** `CODING`\n\n\
             ### Algorithm Steps\n1. Walk the list\n2. Flip pointers\n\n\
             ### Edge Cases\n- Empty list\n- Single node\n\n\
             ### Code Section\n```python\ndef reverse(head):\n    ...\n```\n\n\
             ### Complexity\n- **Time**: O(n)\n- **Space**: O(1)\n\n"
        );
    }

    #[test]
    fn already_fenced_code_is_left_alone() {
        let sol = solution(json!({"solution": {"code": "```rust\nfn main() {}\n```"}}));
        let out = render(&sol, &info(json!({"problem_type": "coding"})));
        assert!(out.contains("### Code Section\n```rust\nfn main() {}\n```\n\n"));
        assert_eq!(out.matches(FENCE).count(), 2);
    }

    #[test]
    fn coding_falls_back_to_answer_and_reasoning() {
        let sol = solution(json!({"solution": {"answer": "print(1)", "reasoning": "Just print."}}));
        let out = render(&sol, &info(json!({"problem_type": "coding", "details": {"language": "js"}})));
        assert_eq!(
            out,
            "**Type:** `CODING`\n\n### Algorithm Steps\nJust print.\n\n### Code Section\n```js\nprint(1)\n```\n\n"
        );
    }

    #[test]
    fn empty_edge_cases_and_partial_complexity() {
        let sol = solution(json!({"solution": {"edge_cases": [], "space_complexity": "O(n)"}}));
        let out = render(&sol, &info(json!({"problem_type": "coding"})));
        assert!(!out.contains("Edge Cases"));
        assert!(out.contains("### Complexity\n- **Space**: O(n)\n\n"));
        assert!(!out.contains("**Time**"));
    }

    #[test]
    fn math_renders_analysis_then_solution() {
        let sol = solution(json!({"solution": {"answer": "4", "reasoning": "2+2"}}));
        let out = render(&sol, &info(json!({"problem_type": "math"})));
        assert_eq!(out, "**Type:** `MATH`\n\n### Analysis\n2+2\n\n### Solution\n4");
        assert!(!out.contains("Code Section"));
        assert!(!out.contains("Complexity"));
    }

    #[test]
    fn non_coding_types_ignore_coding_fields() {
        let sol = solution(json!({"solution": {"code": "x = 1", "answer": "B"}}));
        let out = render(&sol, &info(json!({"problem_type": "multiple_choice"})));
        assert_eq!(out, "**Type:** `MULTIPLE_CHOICE`\n\n### Solution\nB");
    }

    #[test]
    fn empty_solution_renders_badge_only() {
        let empty = SolutionData::default();
        assert_eq!(
            render(&empty, &info(json!({"problem_type": "coding"}))),
            "**Type:** `CODING`\n\n"
        );
        assert_eq!(
            render(&empty, &info(json!({"problem_type": "general"}))),
            "**Type:** `GENERAL`\n\n"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let (sol, inf) = full_coding();
        assert_eq!(render(&sol, &inf), render(&sol, &inf));
    }
}
