//! # Tool Calling Framework
//!
//! Type-safe tool definitions that a remote caller can discover and invoke by name.
//!
//! ## Core Components
//!
//! - [`Tool`] - Trait for defining executable tools
//! - [`Tools`] - Registry for managing multiple tools
//! - [`ToolDefinition`] - Metadata and schema advertised to callers
//!
//! ## Quick Start
//!
//! ```rust
//! use std::borrow::Cow;
//!
//! use confine_core::Tool;
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(JsonSchema, Deserialize)]
//! struct EchoArgs {
//!     /// Text to send back unchanged
//!     text: String,
//! }
//!
//! struct Echo;
//!
//! impl Tool for Echo {
//!     fn name(&self) -> Cow<'static, str> {
//!         "echo".into()
//!     }
//!
//!     fn description(&self) -> Cow<'static, str> {
//!         "Returns its input".into()
//!     }
//!
//!     type Arguments = EchoArgs;
//!
//!     async fn call(&self, args: Self::Arguments) -> confine_core::Result {
//!         Ok(args.text)
//!     }
//! }
//! ```
//!
//! Doc comments on argument fields become schema descriptions, so they are what the
//! remote caller reads when deciding how to fill each argument.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::{future::Future, pin::Pin};

use schemars::{JsonSchema, Schema, schema_for};
use serde::{Serialize, de::DeserializeOwned};

use crate::Result;

/// Operations that can be invoked by a remote caller.
///
/// Tools take `&self`: any state they hold is fixed at construction, so the same tool
/// can serve several calls at once.
pub trait Tool: Send + Sync {
    /// Tool name. Must be unique.
    fn name(&self) -> Cow<'static, str>;
    /// Tool description for the caller.
    fn description(&self) -> Cow<'static, str>;

    /// Tool arguments type. Must implement [`schemars::JsonSchema`] and [`serde::de::DeserializeOwned`].
    type Arguments: JsonSchema + DeserializeOwned;

    /// Executes the tool with the provided arguments.
    ///
    /// Returns a [`crate::Result`] containing the tool's output.
    fn call(&self, arguments: Self::Arguments) -> impl Future<Output = Result> + Send;
}

/// Serializes a value to a pretty-printed JSON string.
///
/// String values are returned as-is rather than quoted.
///
/// # Panics
///
/// Panics if the value cannot be serialized to JSON.
pub fn json<T: Serialize>(value: &T) -> String {
    let value = serde_json::to_value(value).expect("Failed to convert value to JSON");

    value
        .as_str()
        .map_or_else(|| format!("{value:#}"), ToString::to_string)
}

trait ToolImpl: Send + Sync {
    fn call(&self, args: String) -> Pin<Box<dyn Future<Output = Result> + Send + '_>>;
    fn definition(&self) -> ToolDefinition;
}

impl<T: Tool> ToolImpl for T {
    fn call(&self, args: String) -> Pin<Box<dyn Future<Output = Result> + Send + '_>> {
        Box::pin(async move {
            let arguments: T::Arguments = serde_json::from_str(&args)?;
            Tool::call(self, arguments).await
        })
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self)
    }
}

/// Tool registry for managing and calling tools by name.
///
/// # Example
///
/// ```rust
/// use confine_core::Tools;
///
/// let tools = Tools::new();
/// // tools.register(ListFiles::new(confiner));
/// assert!(tools.definitions().is_empty());
/// ```
pub struct Tools {
    tools: BTreeMap<String, Box<dyn ToolImpl>>,
}

impl Debug for Tools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tools")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Tool definition including the argument schema.
///
/// Used to advertise the available [`Tool`]s to a caller.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    name: Cow<'static, str>,
    /// Tool description.
    description: Cow<'static, str>,
    /// JSON schema for tool arguments.
    arguments: Schema,
}

impl ToolDefinition {
    /// Creates a tool definition for a given tool type.
    #[must_use]
    pub fn new<T: Tool>(tool: &T) -> Self {
        Self {
            name: tool.name(),
            description: tool.description(),
            arguments: schema_for!(T::Arguments),
        }
    }

    /// Returns the tool's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool's description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the JSON schema for the tool's arguments.
    #[must_use]
    pub const fn arguments_schema(&self) -> &Schema {
        &self.arguments
    }

    /// Returns the argument schema as a plain JSON value.
    #[must_use]
    pub fn input_schema(&self) -> serde_json::Value {
        serde_json::to_value(&self.arguments).unwrap_or_default()
    }
}

impl Default for Tools {
    fn default() -> Self {
        Self::new()
    }
}

impl Tools {
    /// Creates a new empty tools registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Returns definitions of all registered tools, ordered by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Registers a new tool. Replaces existing tool with same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools
            .insert(tool.name().to_string(), Box::new(tool) as Box<dyn ToolImpl>);
    }

    /// Removes a tool from the registry.
    pub fn unregister(&mut self, name: &str) {
        self.tools.remove(name);
    }

    /// Returns `true` if a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Calls a tool by name with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool is not found, arguments cannot be parsed,
    /// or tool execution fails.
    pub async fn call(&self, name: &str, args: String) -> Result {
        if let Some(tool) = self.tools.get(name) {
            tool.call(args).await
        } else {
            Err(anyhow::Error::msg(format!("Tool '{name}' not found")))
        }
    }
}
