//! Tool specifications, toolkits, and the toolkit registry.
//!
//! A [`ToolSpec`] wraps a [`Callable`] with metadata that is either inferred
//! from the callable's declared name, doc, and parameters, or supplied
//! verbatim and validated. Tools are grouped into [`Toolkit`]s, and toolkits
//! are collected in a [`ToolkitRegistry`] that answers permission-filtered
//! lookups.
//!
//! The [`tool`] attribute generates the declaration for a plain Rust
//! function at compile time:
//!
//! ```rust,ignore
//! use aitools_registry::{tool, ToolSpec};
//!
//! /// Say hello
//! #[tool]
//! fn say_hello(user: String) -> String {
//!     format!("Hello {user}")
//! }
//!
//! let spec = ToolSpec::new(say_hello_tool())?;
//! assert_eq!(spec.name(), "say_hello");
//! ```

#![warn(missing_docs, clippy::pedantic)]

extern crate self as aitools_registry;

pub mod callable;
mod error;
pub mod metadata;
pub mod registry;
pub mod spec;
pub mod toolkit;

pub use aitools_macros::tool;
pub use aitools_primitives::{ParamDescriptor, ParamType, Permissions, ToolName};
pub use callable::{Arguments, Callable, Invocation, Tool, ToolFuture};
pub use error::{ToolError, ToolResult};
pub use metadata::{InputSchema, ToolMetadata};
pub use registry::ToolkitRegistry;
pub use spec::ToolSpec;
pub use toolkit::{ToolSet, Toolkit};

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Say hello
    #[tool]
    fn say_hello(user: String) -> String {
        format!("Hello {user}")
    }

    /// Shout a message.
    ///
    /// Upper-cases the input.
    #[tool]
    async fn shout(message: String) -> String {
        message.to_uppercase()
    }

    #[tool(name = "safe_divide")]
    fn divide(numerator: f64, denominator: f64) -> Result<f64, String> {
        if denominator == 0.0 {
            Err("division by zero".into())
        } else {
            Ok(numerator / denominator)
        }
    }

    #[tool]
    fn tally(values: Vec<i64>, label: Option<String>, strict: bool) -> usize {
        let _ = (label, strict);
        values.len()
    }

    fn arguments(value: serde_json::Value) -> Arguments {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Arguments::new(),
        }
    }

    #[tokio::test]
    async fn generated_immediate_tool() {
        let spec = ToolSpec::new(say_hello_tool()).expect("spec");
        assert_eq!(spec.name(), "say_hello");
        assert_eq!(spec.description(), "Say hello");
        assert_eq!(spec.input_schema().required(), ["user"]);
        assert!(!spec.invocation().is_deferred());

        let out = spec
            .invoke(arguments(json!({"user": "Abigayle"})))
            .await
            .unwrap();
        assert_eq!(out, json!("Hello Abigayle"));
    }

    #[tokio::test]
    async fn generated_deferred_tool() {
        let spec = ToolSpec::new(shout_tool()).expect("spec");
        assert!(spec.invocation().is_deferred());
        assert_eq!(spec.description(), "Shout a message.\n\nUpper-cases the input.");

        let out = spec.invoke(arguments(json!({"message": "hi"}))).await.unwrap();
        assert_eq!(out, json!("HI"));
    }

    #[tokio::test]
    async fn generated_fallible_tool() {
        let spec = ToolSpec::new(divide_tool()).expect("spec");
        assert_eq!(spec.name(), "safe_divide");
        assert_eq!(spec.description(), "");
        assert_eq!(
            spec.input_schema().property_type("numerator"),
            Some(ParamType::Number)
        );

        let ok = spec
            .invoke(arguments(json!({"numerator": 9.0, "denominator": 3.0})))
            .await
            .unwrap();
        assert_eq!(ok, json!(3.0));

        let err = spec
            .invoke(arguments(json!({"numerator": 1.0, "denominator": 0.0})))
            .await
            .expect_err("zero");
        assert!(matches!(err, ToolError::Execution { ref reason } if reason == "division by zero"));
    }

    #[tokio::test]
    async fn generated_schema_and_binding_errors() {
        let spec = ToolSpec::new(tally_tool()).expect("spec");
        let schema = spec.input_schema();
        assert_eq!(schema.required(), ["values", "label", "strict"]);
        assert_eq!(schema.property_type("values"), Some(ParamType::Array));
        assert_eq!(schema.property_type("label"), Some(ParamType::String));
        assert_eq!(schema.property_type("strict"), Some(ParamType::Boolean));

        let out = spec
            .invoke(arguments(json!({"values": [1, 2, 3], "strict": true})))
            .await
            .unwrap();
        assert_eq!(out, json!(3));

        let err = spec
            .invoke(arguments(json!({"values": [], "strict": true, "extra": 1})))
            .await
            .expect_err("unexpected");
        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == "tally"));
    }
}
