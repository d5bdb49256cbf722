//! Stage instructions and the schemas that go with them.

use glimpse_core::Schema;

use crate::encoder::ContextFormat;
use crate::types::ProblemType;

const CLASSIFY_INSTRUCTION: &str = r#"You are an expert analyst. Analyze the provided image(s).

STEP 1: CLASSIFY THE PROBLEM TYPE
- 'coding': Code snippets, IDEs, programming errors.
- 'multiple_choice': Quizzes with options.
- 'math': Equations, calculus, geometry.
- 'general': Text questions, logic, etc.

STEP 2: EXTRACT DATA
Return a valid JSON object with:
{
  "problem_type": "...",
  "problem_statement": "Full extracted text of the problem",
  "details": {
     "language": "python/js/etc (if coding)",
     "code_snippet": "extracted code (if coding)",
     "options": [] (if multiple choice),
     "context": "..."
  }
}"#;

const CODING_ROLE: &str = "You are a Senior Software Engineer. Provide an optimal code solution.";

const CODING_OUTPUT: &str = "Return JSON with these exact keys:
- 'algorithm_steps': Clear, numbered steps of the algorithm.
- 'code': The full solution code (no markdown fences in JSON).
- 'time_complexity': Big O notation with brief explanation.
- 'space_complexity': Big O notation with brief explanation.
- 'edge_cases': A list of edge cases considered.";

const ANSWER_ROLE: &str = "You are a helpful expert assistant.";

const ANSWER_OUTPUT: &str = "Return JSON: { 'solution': { 'answer': '...', 'reasoning': '...' } }";

pub const CODING_FIELDS: [&str; 5] = [
    "algorithm_steps",
    "code",
    "time_complexity",
    "space_complexity",
    "edge_cases",
];

pub const ANSWER_FIELDS: [&str; 2] = ["answer", "reasoning"];

/// Stage 1 prompt: the fixed instruction plus the user's note.
pub fn classify_prompt(user_note: &str) -> String {
    format!("{CLASSIFY_INSTRUCTION}\n\nUser Note: {user_note}")
}

/// Four-way type enum, statement, and open details; all required.
pub fn extraction_schema() -> Schema {
    let labels: Vec<&str> = ProblemType::ALL.iter().map(|t| t.as_str()).collect();
    Schema::object(
        [
            ("problem_type", Schema::string_enum(&labels)),
            ("problem_statement", Schema::string()),
            ("details", Schema::open_object()),
        ],
        &["problem_type", "problem_statement", "details"],
    )
}

/// Stage 2 schema: a `solution` wrapper whose required fields depend on
/// the problem type.
pub fn solution_schema(problem_type: ProblemType) -> Schema {
    let inner = if problem_type.is_coding() {
        Schema::object(
            [
                ("algorithm_steps", Schema::string()),
                ("code", Schema::string()),
                ("time_complexity", Schema::string()),
                ("space_complexity", Schema::string()),
                ("edge_cases", Schema::array(Schema::string())),
            ],
            &CODING_FIELDS,
        )
    } else {
        Schema::object(
            [("answer", Schema::string()), ("reasoning", Schema::string())],
            &ANSWER_FIELDS,
        )
    };
    Schema::object([("solution", inner)], &[])
}

/// Stage 2 prompt: role, encoded problem context, task, and output contract.
pub fn solution_prompt(problem_type: ProblemType, context: &str, format: ContextFormat) -> String {
    let (role, output) = if problem_type.is_coding() {
        (CODING_ROLE, CODING_OUTPUT)
    } else {
        (ANSWER_ROLE, ANSWER_OUTPUT)
    };
    format!(
        "{role}\n\nPROBLEM CONTEXT ({} Format):\n{context}\n\nTASK:\nSolve the problem above.\n{output}",
        format.label()
    )
}
