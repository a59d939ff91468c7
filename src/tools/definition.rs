//! Tool specifications and argument validation
//!
//! A `ToolSpec` describes a tool to the model (name, category, parameters)
//! and is also the schema the invoker validates arguments against.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::domain::ToolFailure;

/// Capability group a tool belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    /// Encyclopedia-style lookups
    Knowledge,
    /// General web search
    WebSearch,
    /// Downloading and reading task files
    Files,
    /// Arithmetic
    Calculator,
    /// Running code in an isolated process
    CodeExecution,
}

impl ToolCategory {
    /// All categories, in prompt order
    pub const ALL: [ToolCategory; 5] = [
        Self::Knowledge,
        Self::WebSearch,
        Self::Files,
        Self::Calculator,
        Self::CodeExecution,
    ];

    /// Parse from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "knowledge" => Some(Self::Knowledge),
            "web-search" | "websearch" | "web" => Some(Self::WebSearch),
            "files" | "file" => Some(Self::Files),
            "calculator" | "math" => Some(Self::Calculator),
            "code-execution" | "code" => Some(Self::CodeExecution),
            _ => None,
        }
    }

    /// Canonical name accepted by `from_str`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::WebSearch => "web-search",
            Self::Files => "files",
            Self::Calculator => "calculator",
            Self::CodeExecution => "code-execution",
        }
    }

    /// Human-readable label used in prompts and listings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Knowledge => "Knowledge",
            Self::WebSearch => "Web search",
            Self::Files => "Files",
            Self::Calculator => "Calculator",
            Self::CodeExecution => "Code execution",
        }
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// JSON type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    /// JSON Schema type name
    pub fn schema_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether a JSON value has this type. Integers are accepted as numbers.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// One declared parameter of a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    /// A required parameter
    pub fn required(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    /// An optional parameter
    pub fn optional(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Description of a registered tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name (e.g., "wikipedia_search", "calculate")
    pub name: String,
    pub category: ToolCategory,
    /// Human-readable description for the model
    pub description: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Create a new tool spec with no parameters
    pub fn new(name: impl Into<String>, category: ToolCategory, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category,
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Render the input schema as JSON Schema
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.schema_type(),
                    "description": param.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    /// Check arguments against the declared parameters.
    ///
    /// Arguments must be a JSON object; required parameters must be present
    /// and non-null; declared types must match; undeclared keys are rejected.
    /// A null optional parameter is treated as absent.
    pub fn validate_arguments(&self, arguments: &Value) -> Result<Map<String, Value>, ToolFailure> {
        let Some(object) = arguments.as_object() else {
            return Err(ToolFailure::invalid_arguments(format!(
                "arguments for '{}' must be a JSON object",
                self.name
            )));
        };

        if let Some(unknown) = object.keys().find(|key| self.param(key).is_none()) {
            let known: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
            return Err(ToolFailure::invalid_arguments(format!(
                "unexpected parameter '{}' for '{}' (expected: {})",
                unknown,
                self.name,
                known.join(", ")
            )));
        }

        let mut validated = Map::new();
        for param in &self.params {
            match object.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolFailure::invalid_arguments(format!(
                        "missing required parameter '{}' for '{}'",
                        param.name, self.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.kind.accepts(value) => {
                    return Err(ToolFailure::invalid_arguments(format!(
                        "parameter '{}' must be of type {}",
                        param.name,
                        param.kind.schema_type()
                    )));
                }
                Some(value) => {
                    validated.insert(param.name.clone(), value.clone());
                }
            }
        }

        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolFailureKind;

    fn search_spec() -> ToolSpec {
        ToolSpec::new("web_search", ToolCategory::WebSearch, "Search the web")
            .with_param(ParamSpec::required("query", ParamKind::String, "Search query"))
            .with_param(ParamSpec::optional("max_results", ParamKind::Integer, "Result limit"))
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(ToolCategory::from_str("knowledge"), Some(ToolCategory::Knowledge));
        assert_eq!(ToolCategory::from_str("web_search"), Some(ToolCategory::WebSearch));
        assert_eq!(ToolCategory::from_str("Web-Search"), Some(ToolCategory::WebSearch));
        assert_eq!(ToolCategory::from_str("code"), Some(ToolCategory::CodeExecution));
        assert_eq!(ToolCategory::from_str("nope"), None);
        for category in ToolCategory::ALL {
            assert_eq!(ToolCategory::from_str(category.name()), Some(category));
        }
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ToolCategory::CodeExecution).unwrap();
        assert_eq!(json, "\"code-execution\"");
        let cat: ToolCategory = serde_json::from_str("\"web-search\"").unwrap();
        assert_eq!(cat, ToolCategory::WebSearch);
    }

    #[test]
    fn test_to_json_schema() {
        let schema = search_spec().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["query"]["type"], "string");
        assert_eq!(schema["properties"]["max_results"]["type"], "integer");
        assert_eq!(schema["required"], json!(["query"]));
    }

    #[test]
    fn test_validate_accepts_good_arguments() {
        let args = search_spec()
            .validate_arguments(&json!({"query": "rust", "max_results": 3}))
            .unwrap();
        assert_eq!(args["query"], "rust");
        assert_eq!(args["max_results"], 3);
    }

    #[test]
    fn test_validate_drops_null_optional() {
        let args = search_spec()
            .validate_arguments(&json!({"query": "rust", "max_results": null}))
            .unwrap();
        assert!(!args.contains_key("max_results"));
    }

    #[test]
    fn test_validate_rejects_non_object() {
        let err = search_spec().validate_arguments(&json!("rust")).unwrap_err();
        assert_eq!(err.kind, ToolFailureKind::InvalidArguments);
    }

    #[test]
    fn test_validate_rejects_missing_required() {
        let err = search_spec().validate_arguments(&json!({})).unwrap_err();
        assert!(err.message.contains("missing required parameter 'query'"));

        let err = search_spec().validate_arguments(&json!({"query": null})).unwrap_err();
        assert_eq!(err.kind, ToolFailureKind::InvalidArguments);
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let err = search_spec()
            .validate_arguments(&json!({"query": 42}))
            .unwrap_err();
        assert!(err.message.contains("must be of type string"));

        let err = search_spec()
            .validate_arguments(&json!({"query": "x", "max_results": 2.5}))
            .unwrap_err();
        assert!(err.message.contains("integer"));
    }

    #[test]
    fn test_validate_rejects_unknown_parameter() {
        let err = search_spec()
            .validate_arguments(&json!({"query": "x", "lang": "en"}))
            .unwrap_err();
        assert!(err.message.contains("unexpected parameter 'lang'"));
    }

    #[test]
    fn test_number_accepts_integer() {
        assert!(ParamKind::Number.accepts(&json!(3)));
        assert!(ParamKind::Number.accepts(&json!(3.5)));
        assert!(!ParamKind::Integer.accepts(&json!(3.5)));
    }
}
