//! General-purpose functions over step inputs.
//!
//! `func` selects the function, `input` is its argument:
//!
//! | func        | result                                                   |
//! |-------------|----------------------------------------------------------|
//! | `upper`     | the string, or each string in a list, uppercased (a list) |
//! | `num_words` | whitespace-separated words across the string(s)          |
//! | `format`    | `template` with `{name}` placeholders filled from inputs |
//! | `sum_rows`  | total length of the rows in a list                       |

use serde_json::Value;
use wflow_core::action::{Action, ActionError, ActionOutcome, InputSpec, require_str};
use wflow_core::workflow::condition::Condition;
use wflow_types::workflow::Variables;

pub const NAME: &str = "function";

pub const FUNC: &str = "func";
pub const INPUT: &str = "input";
pub const TEMPLATE: &str = "template";
pub const FUNC_RESULT: &str = "func_result";

pub struct FunctionAction;

/// A string or a list of strings. Null means no strings.
fn strings(value: Option<&Value>) -> Result<Vec<&str>, ActionError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.as_str()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| {
                    ActionError::invalid_input(INPUT, format!("expected strings, got {item}"))
                })
            })
            .collect(),
        Some(other) => Err(ActionError::invalid_input(
            INPUT,
            format!("expected a string or a list of strings, got {other}"),
        )),
    }
}

fn row_len(row: &Value) -> Result<usize, ActionError> {
    match row {
        Value::Array(items) => Ok(items.len()),
        Value::Object(fields) => Ok(fields.len()),
        Value::String(s) => Ok(s.chars().count()),
        other => Err(ActionError::invalid_input(
            INPUT,
            format!("row has no length: {other}"),
        )),
    }
}

fn apply(func: &str, inputs: &Variables) -> Result<Value, ActionError> {
    let input = inputs.get(INPUT);
    match func {
        "upper" => Ok(Value::from(
            strings(input)?
                .into_iter()
                .map(str::to_uppercase)
                .collect::<Vec<_>>(),
        )),
        "num_words" => Ok(Value::from(
            strings(input)?
                .into_iter()
                .map(|s| s.split_whitespace().count())
                .sum::<usize>(),
        )),
        "format" => {
            let template = require_str(inputs, TEMPLATE)?;
            let rendered = Condition::parse(template)
                .and_then(|t| t.render(inputs))
                .map_err(|e| ActionError::invalid_input(TEMPLATE, e.to_string()))?;
            Ok(Value::String(rendered))
        }
        "sum_rows" => match input {
            None | Some(Value::Null) => Ok(Value::from(0)),
            Some(Value::Array(rows)) => {
                let total = rows.iter().map(row_len).sum::<Result<usize, _>>()?;
                Ok(Value::from(total))
            }
            Some(other) => Err(ActionError::invalid_input(
                INPUT,
                format!("expected a list of rows, got {other}"),
            )),
        },
        other => Err(ActionError::invalid_input(
            FUNC,
            format!("unsupported function '{other}'"),
        )),
    }
}

impl Action for FunctionAction {
    fn name(&self) -> &str {
        NAME
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::new(FUNC, "Function to execute"),
            InputSpec::new(INPUT, "Input to operate on"),
        ]
    }

    fn produced_outputs(&self) -> Vec<String> {
        vec![FUNC_RESULT.to_string()]
    }

    async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let func = require_str(inputs, FUNC)?;
        let value = apply(func, inputs)?;
        tracing::debug!(func, result = %value, "function evaluated");
        Ok(ActionOutcome::completed().with_output(FUNC_RESULT, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Variables {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn call(inputs: Value) -> Result<Value, ActionError> {
        let outcome = FunctionAction.run(&vars(inputs)).await?;
        Ok(outcome.outputs[FUNC_RESULT].clone())
    }

    #[tokio::test]
    async fn test_upper() {
        assert_eq!(
            call(json!({"func": "upper", "input": "hello"})).await.unwrap(),
            json!(["HELLO"])
        );
        assert_eq!(
            call(json!({"func": "upper", "input": ["a", "b c"]})).await.unwrap(),
            json!(["A", "B C"])
        );
        assert_eq!(
            call(json!({"func": "upper", "input": null})).await.unwrap(),
            json!([])
        );
    }

    #[tokio::test]
    async fn test_num_words() {
        assert_eq!(
            call(json!({"func": "num_words", "input": "one two  three"})).await.unwrap(),
            json!(3)
        );
        assert_eq!(
            call(json!({"func": "num_words", "input": ["a b", "c"]})).await.unwrap(),
            json!(3)
        );
    }

    #[tokio::test]
    async fn test_format_fills_placeholders_from_inputs() {
        let result = call(json!({
            "func": "format",
            "input": null,
            "template": "Invoice {invoice.number} for {amount} by {owner}",
            "invoice": {"number": "INV-7"},
            "amount": 12.5,
            "owner": "abc@example.com"
        }))
        .await
        .unwrap();
        assert_eq!(result, json!("Invoice INV-7 for 12.5 by abc@example.com"));
    }

    #[tokio::test]
    async fn test_format_with_unknown_placeholder_is_invalid() {
        let err = call(json!({"func": "format", "input": null, "template": "{nope}"}))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("template"), "got: {msg}");
    }

    #[tokio::test]
    async fn test_sum_rows() {
        assert_eq!(
            call(json!({"func": "sum_rows", "input": [[1, 2], [3], {"a": 1, "b": 2}]}))
                .await
                .unwrap(),
            json!(5)
        );
        assert!(call(json!({"func": "sum_rows", "input": [1]})).await.is_err());
    }

    #[tokio::test]
    async fn test_unsupported_function() {
        let err = call(json!({"func": "teleport", "input": 1})).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("teleport"), "got: {msg}");
    }
}
