//! Invocable units and their static declarations.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use aitools_primitives::{ParamDescriptor, ParamType};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ToolError, ToolResult};

/// Keyword-style arguments passed to a tool.
pub type Arguments = Map<String, Value>;

/// Future alias produced by deferred tool bindings.
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult<Value>> + Send>>;

/// Trait implemented by deferred (asynchronous) tool executors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with the given arguments, returning JSON output.
    async fn invoke(&self, arguments: Arguments) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(Arguments) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, arguments: Arguments) -> ToolResult<Value> {
        (self)(arguments).await
    }
}

type ImmediateFn = dyn Fn(Arguments) -> ToolResult<Value> + Send + Sync;

/// How a tool runs once its arguments are bound.
///
/// Both variants are driven through [`Invocation::invoke`]; only `Deferred`
/// ever suspends.
#[derive(Clone)]
pub enum Invocation {
    /// Runs to completion on the calling task.
    Immediate(Arc<ImmediateFn>),
    /// Returns a future that is awaited.
    Deferred(Arc<dyn Tool>),
}

impl Invocation {
    /// Wraps a synchronous function.
    #[must_use]
    pub fn immediate<F>(f: F) -> Self
    where
        F: Fn(Arguments) -> ToolResult<Value> + Send + Sync + 'static,
    {
        Self::Immediate(Arc::new(f))
    }

    /// Wraps an asynchronous tool executor.
    #[must_use]
    pub fn deferred<T>(tool: T) -> Self
    where
        T: Tool + 'static,
    {
        Self::Deferred(Arc::new(tool))
    }

    /// Returns `true` for the asynchronous variant.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Runs the tool and waits for its result.
    ///
    /// # Errors
    ///
    /// Propagates whatever error the underlying implementation returns.
    pub async fn invoke(&self, arguments: Arguments) -> ToolResult<Value> {
        match self {
            Self::Immediate(f) => (f.as_ref())(arguments),
            Self::Deferred(tool) => tool.invoke(arguments).await,
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(_) => f.write_str("Invocation::Immediate"),
            Self::Deferred(_) => f.write_str("Invocation::Deferred"),
        }
    }
}

/// An invocation together with the declarations metadata is inferred from.
///
/// A callable without a name is legal to build but cannot become a
/// [`ToolSpec`](crate::ToolSpec) through inference.
#[derive(Clone, Debug)]
pub struct Callable {
    name: Option<String>,
    doc: Option<String>,
    params: Vec<ParamDescriptor>,
    invocation: Invocation,
}

impl Callable {
    /// Creates an anonymous callable with no declared parameters.
    #[must_use]
    pub fn new(invocation: Invocation) -> Self {
        Self {
            name: None,
            doc: None,
            params: Vec::new(),
            invocation,
        }
    }

    /// Shorthand for an anonymous synchronous callable.
    #[must_use]
    pub fn immediate<F>(f: F) -> Self
    where
        F: Fn(Arguments) -> ToolResult<Value> + Send + Sync + 'static,
    {
        Self::new(Invocation::immediate(f))
    }

    /// Shorthand for an anonymous asynchronous callable.
    #[must_use]
    pub fn deferred<T>(tool: T) -> Self
    where
        T: Tool + 'static,
    {
        Self::new(Invocation::deferred(tool))
    }

    /// Sets the intrinsic name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the documentation string used as the inferred description.
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Declares a required parameter.
    #[must_use]
    pub fn with_param(self, name: impl Into<String>, ty: ParamType) -> Self {
        self.with_descriptor(ParamDescriptor::new(name, ty))
    }

    /// Declares a parameter from a full descriptor.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: ParamDescriptor) -> Self {
        self.params.push(descriptor);
        self
    }

    /// Returns the intrinsic name, if one was declared.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the documentation string, if any.
    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Returns the declared parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    /// Returns the invocation.
    #[must_use]
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub(crate) fn into_invocation(self) -> Invocation {
        self.invocation
    }
}

/// Rejects arguments that do not name a declared parameter.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] naming the first unexpected key.
pub fn check_arguments(arguments: &Arguments, tool: &str, known: &[&str]) -> ToolResult<()> {
    match arguments.keys().find(|key| !known.contains(&key.as_str())) {
        Some(key) => Err(ToolError::invalid_arguments(
            tool,
            format!("unexpected argument `{key}`"),
        )),
        None => Ok(()),
    }
}

/// Binds one named argument. A missing argument is read as JSON `null`, so
/// `Option` parameters may be omitted.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when the value does not
/// deserialize into `T`.
pub fn argument<T>(arguments: &Arguments, tool: &str, name: &str) -> ToolResult<T>
where
    T: DeserializeOwned,
{
    let value = arguments.get(name).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|err| ToolError::invalid_arguments(tool, format!("parameter `{name}`: {err}")))
}

/// Converts a tool's return value into JSON.
///
/// # Errors
///
/// Returns [`ToolError::Execution`] if the value cannot be serialized.
pub fn output<T>(value: T) -> ToolResult<Value>
where
    T: Serialize,
{
    serde_json::to_value(value)
        .map_err(|err| ToolError::execution(format!("failed to encode tool output: {err}")))
}

/// Converts a fallible tool's return value into JSON.
///
/// # Errors
///
/// Returns [`ToolError::Execution`] carrying the tool's own error message, or
/// the encoding failure.
pub fn output_result<T, E>(result: Result<T, E>) -> ToolResult<Value>
where
    T: Serialize,
    E: fmt::Display,
{
    match result {
        Ok(value) => output(value),
        Err(err) => Err(ToolError::execution(err.to_string())),
    }
}
