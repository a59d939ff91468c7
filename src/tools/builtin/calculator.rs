//! calculate tool - arithmetic expression evaluation

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};

use crate::domain::ToolFailure;
use crate::tools::definition::{ParamKind, ParamSpec, ToolCategory, ToolSpec};
use crate::tools::registry::ToolHandler;

use super::str_arg;

/// Values this close to an integer are printed as one
const INTEGER_EPSILON: f64 = 1e-10;

/// Evaluate arithmetic expressions
pub struct CalculateTool;

impl CalculateTool {
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "calculate",
            ToolCategory::Calculator,
            "Evaluate mathematical expressions. Supports + - * / % and ** (or ^), \
             sin, cos, tan, sqrt, abs, exp, ln, log(x) / log(x, base), floor, ceil, round, \
             min, max and the constants pi and e. Examples: '2 + 2', 'sin(pi/2)', \
             'log(100, 10)', 'sqrt(16)', '2**10'.",
        )
        .with_param(ParamSpec::required(
            "expression",
            ParamKind::String,
            "Mathematical expression to evaluate",
        ))
    }
}

#[async_trait]
impl ToolHandler for CalculateTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<String, ToolFailure> {
        let expression = str_arg(&arguments, "expression")?;
        debug!("Calculating: {}", expression);
        evaluate(expression)
    }
}

/// Evaluate an expression and format the result, snapping near-integers
pub fn evaluate(expression: &str) -> Result<String, ToolFailure> {
    let source = expression.trim().replace("**", "^");
    if source.is_empty() {
        return Err(ToolFailure::invalid_arguments("expression is empty"));
    }

    let expr: meval::Expr = source
        .parse()
        .map_err(|e| ToolFailure::invalid_arguments(format!("cannot parse '{}': {}", expression, e)))?;

    let value = expr
        .eval_with_context(context())
        .map_err(|e| ToolFailure::invalid_arguments(format!("cannot evaluate '{}': {}", expression, e)))?;

    format_number(value)
        .ok_or_else(|| ToolFailure::invalid_arguments(format!("'{}' has no finite real value", expression)))
}

fn context() -> meval::Context<'static> {
    let mut ctx = meval::Context::new();
    ctx.funcn(
        "log",
        |args: &[f64]| match args {
            [x] => x.ln(),
            [x, base] => x.ln() / base.ln(),
            _ => f64::NAN,
        },
        1..,
    );
    ctx.func("log10", f64::log10);
    ctx.func("log2", f64::log2);
    ctx
}

fn format_number(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if (value - rounded).abs() < INTEGER_EPSILON && rounded.abs() < i64::MAX as f64 {
        Some(format!("{}", rounded as i64))
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolFailureKind;

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(evaluate("2+2").unwrap(), "4");
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), "14");
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), "20");
        assert_eq!(evaluate("7 / 2").unwrap(), "3.5");
        assert_eq!(evaluate("-5 + 2").unwrap(), "-3");
    }

    #[test]
    fn test_power_syntaxes() {
        assert_eq!(evaluate("2**10").unwrap(), "1024");
        assert_eq!(evaluate("2^10").unwrap(), "1024");
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(evaluate("sqrt(16)").unwrap(), "4");
        assert_eq!(evaluate("sin(pi/2)").unwrap(), "1");
        assert_eq!(evaluate("log(100, 10)").unwrap(), "2");
        assert_eq!(evaluate("log(e)").unwrap(), "1");
        assert_eq!(evaluate("abs(-3)").unwrap(), "3");
    }

    #[test]
    fn test_integer_snapping() {
        assert_eq!(evaluate("0.1 + 0.2").unwrap(), "0.30000000000000004");
        assert_eq!(evaluate("3 * (1/3)").unwrap(), "1");
    }

    #[test]
    fn test_errors_are_invalid_arguments() {
        for expr in ["", "2 +", "foo(3)", "1/0", "sqrt(-1)"] {
            let err = evaluate(expr).unwrap_err();
            assert_eq!(err.kind, ToolFailureKind::InvalidArguments, "expr: {}", expr);
        }
    }

    #[tokio::test]
    async fn test_handler() {
        let args = serde_json::json!({"expression": "6*7"});
        let out = CalculateTool.call(args.as_object().unwrap().clone()).await.unwrap();
        assert_eq!(out, "42");
    }
}
