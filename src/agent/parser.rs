//! Model output parsing
//!
//! Turns raw backend text into an `Action`. Parsing never fails outright:
//! anything unrecognizable becomes `Action::Malformed` with a reason the
//! model can act on.
//!
//! Accepted shapes, in priority order:
//! 1. `FINAL ANSWER: <text>` at the start of a line (last one wins,
//!    case-insensitive)
//! 2. `Action: <tool>` with an optional `Action Input: {json object}`
//! 3. a JSON object `{"answer": ...}` or `{"action": ..., "action_input": {...}}`

use serde_json::{Map, Value};

use crate::domain::Action;

const FINAL_ANSWER_MARKER: &str = "final answer:";
const ACTION_PREFIX: &str = "action:";
const ACTION_INPUT_PREFIX: &str = "action input:";
const OBSERVATION_PREFIX: &str = "observation:";

/// Parse one backend response
pub fn parse_decision(text: &str) -> Action {
    let text = text.trim();
    if text.is_empty() {
        return malformed("empty response");
    }

    if let Some(answer) = final_answer(text) {
        return Action::FinalAnswer {
            text: answer.to_string(),
        };
    }

    if let Some(action) = react_action(text) {
        return action;
    }

    if let Some(action) = json_action(text) {
        return action;
    }

    malformed("expected 'Action:' with 'Action Input:', or 'FINAL ANSWER:'")
}

fn malformed(reason: impl Into<String>) -> Action {
    Action::Malformed { reason: reason.into() }
}

/// Text after the last final-answer marker that opens a line. A marker
/// in the middle of a Thought is prose, not a commitment.
fn final_answer(text: &str) -> Option<&str> {
    let mut found = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let body = line.trim_start();
        if strip_prefix_ci(body, FINAL_ANSWER_MARKER).is_some() {
            found = Some(offset + (line.len() - body.len()) + FINAL_ANSWER_MARKER.len());
        }
        offset += line.len();
    }
    found.map(|idx| text[idx..].trim())
}

/// Strip `prefix` from the start of a line, case-insensitively
fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &line[prefix.len()..])
}

fn react_action(text: &str) -> Option<Action> {
    let lines: Vec<&str> = text.lines().collect();

    let (action_line, name) = lines.iter().enumerate().find_map(|(i, line)| {
        let line = line.trim_start();
        if strip_prefix_ci(line, ACTION_INPUT_PREFIX).is_some() {
            return None;
        }
        strip_prefix_ci(line, ACTION_PREFIX).map(|rest| (i, clean_tool_name(rest)))
    })?;

    if name.is_empty() {
        return Some(malformed("'Action:' line names no tool"));
    }

    let input = lines[action_line + 1..]
        .iter()
        .enumerate()
        .find_map(|(offset, line)| {
            strip_prefix_ci(line.trim_start(), ACTION_INPUT_PREFIX).map(|rest| (action_line + 1 + offset, rest))
        });

    let arguments = match input {
        None => Value::Object(Map::new()),
        Some((input_line, first)) => {
            let mut block = String::from(first);
            for line in &lines[input_line + 1..] {
                if strip_prefix_ci(line.trim_start(), OBSERVATION_PREFIX).is_some() {
                    break;
                }
                block.push('\n');
                block.push_str(line);
            }
            match parse_arguments(&block) {
                Ok(arguments) => arguments,
                Err(reason) => return Some(malformed(reason)),
            }
        }
    };

    Some(Action::ToolCall {
        name: name.to_string(),
        arguments,
    })
}

fn clean_tool_name(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'').trim()
}

/// Parse an `Action Input:` block into a JSON object
fn parse_arguments(block: &str) -> Result<Value, String> {
    let source = strip_code_fence(block.trim());
    if source.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value = first_json_value(source).map_err(|e| format!("'Action Input:' is not valid JSON: {}", e))?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(format!("'Action Input:' must be a JSON object, got: {}", value))
    }
}

/// Parse the first JSON value in `source`, ignoring anything after it
fn first_json_value(source: &str) -> Result<Value, serde_json::Error> {
    let mut values = serde_json::Deserializer::from_str(source).into_iter::<Value>();
    match values.next() {
        Some(result) => result,
        None => serde_json::from_str(source),
    }
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Structured-output shapes
fn json_action(text: &str) -> Option<Action> {
    let source = strip_code_fence(text);
    if !source.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(source).ok()?;
    let object = value.as_object()?;

    if let Some(answer) = object.get("answer") {
        let text = match answer {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        return Some(Action::FinalAnswer { text });
    }

    let name = object.get("action")?.as_str()?;
    let arguments = match object.get("action_input") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(input) if input.is_object() => input.clone(),
        Some(other) => {
            return Some(malformed(format!("'action_input' must be a JSON object, got: {}", other)));
        }
    };

    Some(Action::ToolCall {
        name: clean_tool_name(name).to_string(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_call(name: &str, arguments: Value) -> Action {
        Action::ToolCall {
            name: name.to_string(),
            arguments,
        }
    }

    fn final_text(text: &str) -> Action {
        Action::FinalAnswer { text: text.to_string() }
    }

    #[test]
    fn test_final_answer() {
        assert_eq!(parse_decision("FINAL ANSWER: 4"), final_text("4"));
        assert_eq!(parse_decision("final answer:   Paris  "), final_text("Paris"));
    }

    #[test]
    fn test_last_final_answer_marker_wins() {
        let text = "Thought: I know it.\nFinal Answer: The capital is Paris.\nFINAL ANSWER: Paris";
        assert_eq!(parse_decision(text), final_text("Paris"));
    }

    #[test]
    fn test_marker_inside_thought_is_not_an_answer() {
        let text = "Thought: I need to compute this before I give the final answer: let me search.\n\
                    Action: calculate\nAction Input: {\"expression\": \"2+2\"}";
        assert_eq!(parse_decision(text), tool_call("calculate", json!({"expression": "2+2"})));

        let text = "I could write final answer: 4 but I am unsure.";
        assert!(matches!(parse_decision(text), Action::Malformed { .. }));
    }

    #[test]
    fn test_indented_final_answer_marker() {
        assert_eq!(parse_decision("Thought: done\n   Final Answer: 9"), final_text("9"));
    }

    #[test]
    fn test_final_answer_beats_action() {
        let text = "Action: web_search\nAction Input: {\"query\": \"x\"}\nFINAL ANSWER: 12";
        assert_eq!(parse_decision(text), final_text("12"));
    }

    #[test]
    fn test_final_answer_with_unicode_before_marker() {
        let text = "Thought: Zürich → München\nFINAL ANSWER: 304 km";
        assert_eq!(parse_decision(text), final_text("304 km"));
    }

    #[test]
    fn test_react_action() {
        let text = "Thought: I should look this up.\nAction: wikipedia_search\nAction Input: {\"query\": \"Eiffel Tower\"}";
        assert_eq!(
            parse_decision(text),
            tool_call("wikipedia_search", json!({"query": "Eiffel Tower"}))
        );
    }

    #[test]
    fn test_react_action_multiline_input_and_fence() {
        let text = "Action: `execute_python`\nAction Input: ```json\n{\n  \"code\": \"print(1)\"\n}\n```";
        assert_eq!(parse_decision(text), tool_call("execute_python", json!({"code": "print(1)"})));
    }

    #[test]
    fn test_react_action_ignores_trailing_observation() {
        let text = "Action: calculate\nAction Input: {\"expression\": \"2+2\"}\nObservation: 4";
        assert_eq!(parse_decision(text), tool_call("calculate", json!({"expression": "2+2"})));
    }

    #[test]
    fn test_react_action_without_input() {
        assert_eq!(parse_decision("Action: list_things"), tool_call("list_things", json!({})));
    }

    #[test]
    fn test_react_action_bad_input_is_malformed() {
        let text = "Action: calculate\nAction Input: {expression: 2+2}";
        assert!(matches!(parse_decision(text), Action::Malformed { reason } if reason.contains("not valid JSON")));

        let text = "Action: calculate\nAction Input: [\"2+2\"]";
        assert!(matches!(parse_decision(text), Action::Malformed { reason } if reason.contains("JSON object")));
    }

    #[test]
    fn test_react_action_without_name_is_malformed() {
        assert!(matches!(parse_decision("Action:   \nAction Input: {}"), Action::Malformed { .. }));
    }

    #[test]
    fn test_json_answer_shape() {
        assert_eq!(parse_decision("{\"answer\": \"Paris\"}"), final_text("Paris"));
        assert_eq!(parse_decision("```json\n{\"answer\": 42}\n```"), final_text("42"));
    }

    #[test]
    fn test_json_action_shape() {
        let text = "{\"action\": \"web_search\", \"action_input\": {\"query\": \"rust\"}}";
        assert_eq!(parse_decision(text), tool_call("web_search", json!({"query": "rust"})));
        assert!(matches!(
            parse_decision("{\"action\": \"web_search\", \"action_input\": \"rust\"}"),
            Action::Malformed { .. }
        ));
    }

    #[test]
    fn test_unrecognized_is_malformed() {
        assert!(matches!(parse_decision("I think the answer might be 4."), Action::Malformed { .. }));
        assert!(matches!(parse_decision("{\"foo\": 1}"), Action::Malformed { .. }));
        assert!(matches!(parse_decision("   "), Action::Malformed { reason } if reason == "empty response"));
    }
}
