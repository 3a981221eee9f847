//! Call request parsing and tool invocation.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use aitools_registry::{Arguments, ToolSpec};
use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::discovery::DiscoveredTool;
use crate::error::ConfigResult;

/// Result alias for call parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Why a call request could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The request did not have the expected shape.
    #[error("{reason}")]
    Invalid {
        /// Parser-provided reason.
        reason: String,
    },

    /// A pair was expected but the value is not a sequence.
    #[error("cannot unpack non-iterable {kind} object")]
    NotIterable {
        /// JSON kind of the value.
        kind: &'static str,
    },

    /// A pair was expected but the sequence has another length.
    #[error("expected a (name, arguments) pair, got {len} values")]
    WrongArity {
        /// Number of values found.
        len: usize,
    },

    /// The tool name is not a string.
    #[error("tool name must be a string")]
    NameNotString,

    /// The arguments are not a mapping.
    #[error("arguments must be a mapping")]
    ArgumentsNotMapping,

    /// The parser panicked.
    #[error("parser panicked: {reason}")]
    Panicked {
        /// Panic payload, when it is a string.
        reason: String,
    },

    /// No parser is registered under the tag.
    #[error("unknown call parser '{tag}'")]
    UnknownParser {
        /// Requested tag.
        tag: String,
    },
}

impl ParseError {
    /// Creates a shape error.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// A parsed request: tool name plus argument mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    name: String,
    arguments: Arguments,
}

impl ParsedCall {
    /// Creates a parsed call.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the arguments.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Splits the call into name and arguments.
    #[must_use]
    pub fn into_parts(self) -> (String, Arguments) {
        (self.name, self.arguments)
    }
}

/// Reads a `[name, arguments]` pair. `null` arguments are read as empty.
impl TryFrom<Value> for ParsedCall {
    type Error = ParseError;

    fn try_from(value: Value) -> ParseResult<Self> {
        let Value::Array(mut pair) = value else {
            return Err(ParseError::NotIterable {
                kind: json_kind(&value),
            });
        };
        if pair.len() != 2 {
            return Err(ParseError::WrongArity { len: pair.len() });
        }

        let arguments = pair.pop().unwrap_or(Value::Null);
        let Some(Value::String(name)) = pair.pop() else {
            return Err(ParseError::NameNotString);
        };
        Ok(Self::new(name, arguments_from(arguments)?))
    }
}

fn arguments_from(value: Value) -> ParseResult<Arguments> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Arguments::new()),
        _ => Err(ParseError::ArgumentsNotMapping),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Turns an opaque request into a [`ParsedCall`].
pub trait ParseCall: Send + Sync {
    /// Parses one request.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the request cannot be understood.
    fn parse(&self, request: &Value) -> ParseResult<ParsedCall>;
}

impl<F> ParseCall for F
where
    F: Fn(&Value) -> ParseResult<ParsedCall> + Send + Sync,
{
    fn parse(&self, request: &Value) -> ParseResult<ParsedCall> {
        (self)(request)
    }
}

#[derive(Deserialize)]
struct DefaultRequest {
    name: String,
    #[serde(default)]
    input: Value,
}

/// Parser selection.
#[derive(Clone, Default)]
pub enum CallParser {
    /// Understands `{"name": string, "input": {...}}`.
    #[default]
    Default,
    /// Caller-supplied parser.
    Custom(Arc<dyn ParseCall>),
}

impl CallParser {
    /// Wraps a custom parser.
    #[must_use]
    pub fn custom<P>(parser: P) -> Self
    where
        P: ParseCall + 'static,
    {
        Self::Custom(Arc::new(parser))
    }

    /// Parses one request. A panicking custom parser is reported as
    /// [`ParseError::Panicked`].
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the request cannot be understood.
    pub fn parse(&self, request: &Value) -> ParseResult<ParsedCall> {
        match self {
            Self::Default => parse_default(request),
            Self::Custom(parser) => panic::catch_unwind(AssertUnwindSafe(|| parser.parse(request)))
                .unwrap_or_else(|payload| {
                    Err(ParseError::Panicked {
                        reason: panic_message(payload.as_ref()),
                    })
                }),
        }
    }
}

fn parse_default(request: &Value) -> ParseResult<ParsedCall> {
    let DefaultRequest { name, input } = DefaultRequest::deserialize(request)
        .map_err(|err| ParseError::invalid(err.to_string()))?;
    Ok(ParsedCall::new(name, arguments_from(input)?))
}

impl fmt::Debug for CallParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("CallParser::Default"),
            Self::Custom(_) => f.write_str("CallParser::Custom"),
        }
    }
}

impl FromStr for CallParser {
    type Err = ParseError;

    fn from_str(tag: &str) -> ParseResult<Self> {
        match tag {
            "default" => Ok(Self::Default),
            other => Err(ParseError::UnknownParser { tag: other.into() }),
        }
    }
}

/// Category of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallErrorKind {
    /// The request could not be parsed.
    ParseFailure,
    /// No tool has the requested name.
    ToolNotFound,
    /// The tool returned an error or did not complete.
    InvocationFailure,
}

/// Inline error for one request, serialized as
/// `{"error": ..., "tool"?: ..., "arguments"?: ...}`.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct CallError {
    #[serde(skip)]
    kind: CallErrorKind,
    #[serde(rename = "error")]
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Arguments>,
}

impl CallError {
    fn parse_failure(request: &Value, err: &ParseError) -> Self {
        Self {
            kind: CallErrorKind::ParseFailure,
            message: format!("{request} failed to parse: {err}"),
            tool: None,
            arguments: None,
        }
    }

    fn not_found(name: &str) -> Self {
        Self {
            kind: CallErrorKind::ToolNotFound,
            message: format!("tool '{name}' not found"),
            tool: None,
            arguments: None,
        }
    }

    fn invocation(name: String, arguments: Arguments, reason: &str) -> Self {
        Self {
            kind: CallErrorKind::InvocationFailure,
            message: format!("tool '{name}' failed: {reason}"),
            tool: Some(name),
            arguments: Some(arguments),
        }
    }

    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> CallErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the tool name for invocation failures.
    #[must_use]
    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref()
    }

    /// Returns the arguments for invocation failures.
    #[must_use]
    pub fn arguments(&self) -> Option<&Arguments> {
        self.arguments.as_ref()
    }
}

/// Outcome of one request: the tool's JSON return value, or an inline error.
pub type CallOutcome = Result<Value, CallError>;

/// Routes parsed calls to tools by name.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    tools: HashMap<String, ToolSpec>,
    parser: CallParser,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Creates a dispatcher over `tools`. When two tools share a name the
    /// first one is kept.
    #[must_use]
    pub fn new<I>(tools: I) -> Self
    where
        I: IntoIterator<Item = ToolSpec>,
    {
        let mut by_name = HashMap::new();
        for tool in tools {
            match by_name.entry(tool.name().to_owned()) {
                Entry::Vacant(slot) => {
                    slot.insert(tool);
                }
                Entry::Occupied(slot) => {
                    warn!(tool = %slot.key(), "ignoring duplicate tool name");
                }
            }
        }
        Self {
            tools: by_name,
            parser: CallParser::Default,
            config: DispatchConfig::default(),
        }
    }

    /// Creates a dispatcher from discovery results. Metadata-only entries
    /// carry no callable and are ignored.
    #[must_use]
    pub fn from_discovered<I>(discovered: I) -> Self
    where
        I: IntoIterator<Item = DiscoveredTool>,
    {
        Self::new(discovered.into_iter().filter_map(DiscoveredTool::into_spec))
    }

    /// Selects the request parser.
    #[must_use]
    pub fn with_parser(mut self, parser: CallParser) -> Self {
        self.parser = parser;
        self
    }

    /// Applies a validated dispatch configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::ConfigError) when the configuration is
    /// invalid.
    pub fn with_config(mut self, config: DispatchConfig) -> ConfigResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Returns the parser.
    #[must_use]
    pub fn parser(&self) -> &CallParser {
        &self.parser
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> DispatchConfig {
        self.config
    }

    /// Returns the tool with the given name.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Returns the number of routable tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` when no tool is routable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs every request concurrently on the current task. The output has
    /// one entry per request, in request order.
    ///
    /// Without an invocation timeout any executor can drive the returned
    /// future.
    ///
    /// # Panics
    ///
    /// Panics when an invocation timeout is configured and the future is
    /// polled outside a Tokio runtime with the time driver enabled.
    pub async fn run(&self, requests: &[Value]) -> Vec<CallOutcome> {
        join_all(requests.iter().map(|request| self.call(request))).await
    }

    /// Parses and runs one request.
    ///
    /// # Panics
    ///
    /// Panics under the same runtime condition as [`Dispatcher::run`].
    pub async fn call(&self, request: &Value) -> CallOutcome {
        let parsed = self.parser.parse(request).map_err(|err| {
            warn!(error = %err, "failed to parse tool call");
            CallError::parse_failure(request, &err)
        })?;

        let Some(tool) = self.tools.get(parsed.name()) else {
            warn!(tool = parsed.name(), "tool not found");
            return Err(CallError::not_found(parsed.name()));
        };

        let (name, arguments) = parsed.into_parts();
        let invocation = AssertUnwindSafe(tool.invoke(arguments.clone())).catch_unwind();
        let outcome = match self.config.invocation_timeout() {
            Some(limit) => {
                if let Ok(outcome) = tokio::time::timeout(limit, invocation).await {
                    outcome
                } else {
                    warn!(tool = %name, ?limit, "tool call timed out");
                    let reason = format!("timed out after {limit:?}");
                    return Err(CallError::invocation(name, arguments, &reason));
                }
            }
            None => invocation.await,
        };

        match outcome {
            Ok(Ok(value)) => {
                debug!(tool = %name, "tool call succeeded");
                Ok(value)
            }
            Ok(Err(err)) => {
                warn!(tool = %name, error = %err, "tool call failed");
                Err(CallError::invocation(name, arguments, &err.to_string()))
            }
            Err(payload) => {
                let reason = format!("panicked: {}", panic_message(payload.as_ref()));
                warn!(tool = %name, %reason, "tool call panicked");
                Err(CallError::invocation(name, arguments, &reason))
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use aitools_registry::{Callable, ParamType, ToolError};
    use serde_json::json;

    fn say_hello() -> ToolSpec {
        ToolSpec::new(
            Callable::immediate(|arguments: Arguments| {
                let user = arguments
                    .get("user")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::invalid_arguments("say_hello", "missing `user`"))?;
                Ok(Value::from(format!("Hello {user}")))
            })
            .named("say_hello")
            .with_param("user", ParamType::String),
        )
        .expect("spec")
    }

    fn shout() -> ToolSpec {
        ToolSpec::new(
            Callable::deferred(|arguments: Arguments| async move {
                tokio::task::yield_now().await;
                let message = arguments
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok::<_, ToolError>(Value::from(message.to_uppercase()))
            })
            .named("shout")
            .with_param("message", ParamType::String),
        )
        .expect("spec")
    }

    fn explode() -> ToolSpec {
        ToolSpec::new(
            Callable::immediate(|_| -> aitools_registry::ToolResult<Value> {
                panic!("kaboom")
            })
            .named("explode"),
        )
        .expect("spec")
    }

    fn slow() -> ToolSpec {
        ToolSpec::new(
            Callable::deferred(|_: Arguments| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ToolError>(Value::Null)
            })
            .named("slow"),
        )
        .expect("spec")
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new([say_hello(), shout(), explode(), slow()])
    }

    #[tokio::test]
    async fn runs_immediate_tool() {
        let results = dispatcher()
            .run(&[json!({"name": "say_hello", "input": {"user": "Abigayle"}})])
            .await;
        assert_eq!(results, vec![Ok(json!("Hello Abigayle"))]);
    }

    #[test]
    fn runs_without_tokio_when_no_timeout_is_set() {
        let results = futures::executor::block_on(
            dispatcher().run(&[json!({"name": "say_hello", "input": {"user": "Abigayle"}})]),
        );
        assert_eq!(results, vec![Ok(json!("Hello Abigayle"))]);
    }

    #[tokio::test]
    async fn awaits_deferred_tool() {
        let results = dispatcher()
            .run(&[json!({"name": "shout", "input": {"message": "hi"}})])
            .await;
        assert_eq!(results, vec![Ok(json!("HI"))]);
    }

    #[tokio::test]
    async fn results_follow_request_order() {
        let results = dispatcher()
            .run(&[
                json!({"name": "shout", "input": {"message": "first"}}),
                json!({"name": "missing"}),
                json!({"name": "say_hello", "input": {"user": "Ada"}}),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok(json!("FIRST")));
        let err = results[1].as_ref().expect_err("not found");
        assert_eq!(err.kind(), CallErrorKind::ToolNotFound);
        assert_eq!(err.message(), "tool 'missing' not found");
        assert_eq!(results[2], Ok(json!("Hello Ada")));
    }

    #[tokio::test]
    async fn raising_parser_reports_parse_failure() {
        let parser = CallParser::custom(|_: &Value| -> ParseResult<ParsedCall> {
            Err(ParseError::invalid("bad format"))
        });
        let results = dispatcher()
            .with_parser(parser)
            .run(&[json!({"bad": "input"})])
            .await;

        let err = results[0].as_ref().expect_err("parse failure");
        assert_eq!(err.kind(), CallErrorKind::ParseFailure);
        assert!(err.message().contains("failed to parse"));
        assert!(err.message().contains("bad format"));
    }

    #[tokio::test]
    async fn non_destructurable_parser_return_reports_parse_failure() {
        let parser = CallParser::custom(|_: &Value| ParsedCall::try_from(json!(42)));
        let results = dispatcher()
            .with_parser(parser)
            .run(&[json!({"name": "say_hello"})])
            .await;

        let err = results[0].as_ref().expect_err("parse failure");
        assert!(err.message().contains("failed to parse"));
        assert!(err.message().contains("non-iterable"));
    }

    #[tokio::test]
    async fn panicking_parser_reports_parse_failure() {
        let parser = CallParser::custom(|_: &Value| -> ParseResult<ParsedCall> {
            panic!("parser bug")
        });
        let results = dispatcher().with_parser(parser).run(&[json!({})]).await;
        let err = results[0].as_ref().expect_err("parse failure");
        assert!(err.message().contains("parser bug"));
    }

    #[tokio::test]
    async fn pair_parser_routes_calls() {
        let parser = CallParser::custom(|request: &Value| ParsedCall::try_from(request.clone()));
        let results = dispatcher()
            .with_parser(parser)
            .run(&[json!(["say_hello", {"user": "Grace"}])])
            .await;
        assert_eq!(results, vec![Ok(json!("Hello Grace"))]);
    }

    #[tokio::test]
    async fn tool_errors_carry_name_and_arguments() {
        let results = dispatcher()
            .run(&[json!({"name": "say_hello", "input": {"who": "nobody"}})])
            .await;
        let err = results[0].as_ref().expect_err("tool error");
        assert_eq!(err.kind(), CallErrorKind::InvocationFailure);
        assert_eq!(err.tool(), Some("say_hello"));
        assert_eq!(err.arguments().unwrap()["who"], "nobody");

        let value = serde_json::to_value(err).unwrap();
        assert!(value["error"].as_str().unwrap().contains("missing `user`"));
        assert_eq!(value["tool"], "say_hello");
        assert_eq!(value["arguments"], json!({"who": "nobody"}));
    }

    #[tokio::test]
    async fn tool_panics_become_invocation_failures() {
        let results = dispatcher().run(&[json!({"name": "explode"})]).await;
        let err = results[0].as_ref().expect_err("panic");
        assert_eq!(err.kind(), CallErrorKind::InvocationFailure);
        assert!(err.message().contains("kaboom"));
    }

    #[tokio::test]
    async fn invocation_timeout_is_enforced() {
        let config = DispatchConfig::new().with_invocation_timeout(Duration::from_millis(10));
        let dispatcher = dispatcher().with_config(config).expect("valid config");
        let results = dispatcher.run(&[json!({"name": "slow"})]).await;

        let err = results[0].as_ref().expect_err("timeout");
        assert!(err.message().contains("timed out"));
    }

    #[test]
    fn default_request_shapes() {
        let parsed = CallParser::Default
            .parse(&json!({"name": "say_hello"}))
            .expect("missing input is empty");
        assert!(parsed.arguments().is_empty());

        let err = CallParser::Default
            .parse(&json!({"name": "say_hello", "input": [1]}))
            .expect_err("list input");
        assert_eq!(err, ParseError::ArgumentsNotMapping);

        assert!(CallParser::Default.parse(&json!({"input": {}})).is_err());
    }

    #[test]
    fn pair_shapes() {
        assert_eq!(
            ParsedCall::try_from(json!(["a", {}, 3])),
            Err(ParseError::WrongArity { len: 3 })
        );
        assert_eq!(
            ParsedCall::try_from(json!([1, {}])),
            Err(ParseError::NameNotString)
        );
        assert_eq!(
            ParsedCall::try_from(json!(["a", "b"])),
            Err(ParseError::ArgumentsNotMapping)
        );
    }

    #[test]
    fn parser_tags() {
        assert!(matches!("default".parse::<CallParser>(), Ok(CallParser::Default)));
        assert!(matches!(
            "xml".parse::<CallParser>(),
            Err(ParseError::UnknownParser { .. })
        ));
    }

    #[test]
    fn first_tool_with_a_name_wins() {
        let shadow = ToolSpec::new(
            Callable::immediate(|_| Ok(Value::from("shadow"))).named("say_hello"),
        )
        .unwrap();
        let dispatcher = Dispatcher::new([say_hello(), shadow]);
        assert_eq!(dispatcher.len(), 1);
        assert_eq!(dispatcher.tool("say_hello").unwrap().input_schema().required(), ["user"]);
    }
}
