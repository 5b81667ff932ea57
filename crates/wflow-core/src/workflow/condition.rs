//! Condition templates for `exec_if` gates and transitions.
//!
//! A condition is a template such as `{amount} > 1000 && '{kind}' == 'INVOICE'`.
//! Placeholders are substituted from a flattened variable scope, then the
//! resulting text is evaluated by a plain `jexl_eval::Evaluator` with no
//! transforms registered: literals, comparisons, boolean connectives and
//! arithmetic only.
//!
//! Substitution rules:
//! - `{name}` or `{name.path.0}` looks up a scope value (dotted segments walk
//!   objects by key and arrays by index)
//! - strings are inserted raw, everything else as JSON text
//! - `{{` and `}}` produce literal braces

use serde_json::{Value, json};
use wflow_types::workflow::Variables;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluationError {
    #[error("malformed condition template '{template}': {message}")]
    Malformed { template: String, message: String },

    #[error("undefined variable '{name}' in condition '{template}'")]
    UndefinedVariable { name: String, template: String },

    #[error("failed to evaluate '{expression}': {message}")]
    EvalFailed { expression: String, message: String },

    #[error("condition '{expression}' did not evaluate to a boolean: got {result}")]
    NotBoolean { expression: String, result: Value },
}

// ---------------------------------------------------------------------------
// Template parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(String),
}

fn parse_segments(template: &str) -> Result<Vec<Segment>, EvaluationError> {
    let malformed = |message: String| EvaluationError::Malformed {
        template: template.to_string(),
        message,
    };

    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    text.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(malformed(format!("unclosed '{{' at offset {pos}")));
                }
                if !is_valid_name(&name) {
                    return Err(malformed(format!("invalid placeholder '{{{name}}}'")));
                }
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Var(name));
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    text.push('}');
                } else {
                    return Err(malformed(format!("unmatched '}}' at offset {pos}")));
                }
            }
            other => text.push(other),
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn lookup<'a>(scope: &'a Variables, name: &str) -> Option<&'a Value> {
    let mut parts = name.split('.');
    let mut current = scope.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A parsed condition template. Parsing happens once at definition load;
/// evaluation is pure and may be repeated any number of times.
#[derive(Debug, Clone)]
pub struct Condition {
    template: String,
    segments: Vec<Segment>,
}

impl Condition {
    pub fn parse(template: impl Into<String>) -> Result<Self, EvaluationError> {
        let template = template.into();
        let segments = parse_segments(&template)?;
        Ok(Self { template, segments })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names referenced by the template, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Substitute every placeholder from `scope`.
    pub fn render(&self, scope: &Variables) -> Result<String, EvaluationError> {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Var(name) => {
                    let value =
                        lookup(scope, name).ok_or_else(|| EvaluationError::UndefinedVariable {
                            name: name.clone(),
                            template: self.template.clone(),
                        })?;
                    out.push_str(&render_value(value));
                }
            }
        }
        Ok(out)
    }

    /// Render and evaluate to a boolean. Non-boolean results are errors.
    pub fn evaluate(&self, scope: &Variables) -> Result<bool, EvaluationError> {
        let expression = self.render(scope)?;

        // Capitalised literal spellings resolve through the context.
        let literals = json!({
            "True": true,
            "False": false,
            "None": null,
            "null": null,
        });

        let evaluator = jexl_eval::Evaluator::new();
        let result = evaluator
            .eval_in_context(&expression, &literals)
            .map_err(|e| EvaluationError::EvalFailed {
                expression: expression.clone(),
                message: e.to_string(),
            })?;

        let outcome = match result {
            Value::Bool(b) => b,
            other => {
                return Err(EvaluationError::NotBoolean {
                    expression,
                    result: other,
                });
            }
        };

        tracing::debug!(
            template = %self.template,
            expression = %expression,
            result = outcome,
            "evaluated condition"
        );
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(value: Value) -> Variables {
        match value {
            Value::Object(map) => map,
            _ => panic!("scope must be an object"),
        }
    }

    #[test]
    fn test_render_substitutes_strings_raw_and_numbers_as_json() {
        let cond = Condition::parse("{amount} > 1000 && '{document_type}' == 'INVOICE'").unwrap();
        let rendered = cond
            .render(&scope(json!({"amount": 1235.5, "document_type": "INVOICE"})))
            .unwrap();
        assert_eq!(rendered, "1235.5 > 1000 && 'INVOICE' == 'INVOICE'");
    }

    #[test]
    fn test_evaluate_comparison_and_connectives() {
        let cond = Condition::parse("{amount} > 1000 && '{document_type}' == 'INVOICE'").unwrap();
        let vars = scope(json!({"amount": 1235.5, "document_type": "INVOICE"}));
        assert!(cond.evaluate(&vars).unwrap());

        let vars = scope(json!({"amount": 10, "document_type": "INVOICE"}));
        assert!(!cond.evaluate(&vars).unwrap());
    }

    #[test]
    fn test_evaluate_boolean_values() {
        let cond = Condition::parse("{approved} == true").unwrap();
        assert!(cond.evaluate(&scope(json!({"approved": true}))).unwrap());
        assert!(!cond.evaluate(&scope(json!({"approved": false}))).unwrap());

        let cond = Condition::parse("{verified}").unwrap();
        assert!(cond.evaluate(&scope(json!({"verified": true}))).unwrap());
    }

    #[test]
    fn test_python_style_literals() {
        let cond = Condition::parse("{approved} == True").unwrap();
        assert!(cond.evaluate(&scope(json!({"approved": true}))).unwrap());
    }

    #[test]
    fn test_dotted_path_lookup() {
        let cond = Condition::parse("{data.po_number} == 123 && {data.grn.1} == 2").unwrap();
        let vars = scope(json!({"data": {"po_number": 123, "grn": [1, 2, 3]}}));
        assert!(cond.evaluate(&vars).unwrap());
    }

    #[test]
    fn test_escaped_braces() {
        let cond = Condition::parse("{{literal}} {x}").unwrap();
        assert_eq!(cond.render(&scope(json!({"x": 1}))).unwrap(), "{literal} 1");
        assert_eq!(cond.variables().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let cond = Condition::parse("{missing} > 1").unwrap();
        let err = cond.evaluate(&Variables::new()).unwrap_err();
        assert!(matches!(err, EvaluationError::UndefinedVariable { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_malformed_templates_rejected_at_parse() {
        for bad in ["{x", "x}", "{}", "{a b}", "{a..b}"] {
            let err = Condition::parse(bad).unwrap_err();
            assert!(matches!(err, EvaluationError::Malformed { .. }), "accepted: {bad}");
        }
    }

    #[test]
    fn test_non_boolean_result_is_error() {
        let cond = Condition::parse("{x} + 1").unwrap();
        let err = cond.evaluate(&scope(json!({"x": 1}))).unwrap_err();
        assert!(matches!(err, EvaluationError::NotBoolean { .. }), "got: {err}");
    }

    #[test]
    fn test_ill_formed_expression_is_error() {
        let cond = Condition::parse("{x} >").unwrap();
        let err = cond.evaluate(&scope(json!({"x": 1}))).unwrap_err();
        assert!(matches!(err, EvaluationError::EvalFailed { .. }), "got: {err}");
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let cond = Condition::parse("{n} * 2 == 8").unwrap();
        let vars = scope(json!({"n": 4}));
        let first = cond.evaluate(&vars).unwrap();
        for _ in 0..5 {
            assert_eq!(cond.evaluate(&vars).unwrap(), first);
        }
    }
}
