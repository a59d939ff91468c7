//! Tool System - specs, registry, invocation and the built-in tools

pub mod builtin;
mod definition;
mod invoker;
mod registry;

pub use builtin::{ApiKeys, build_registry, standard_registry};
pub use definition::{ParamKind, ParamSpec, ToolCategory, ToolSpec};
pub use invoker::invoke;
pub use registry::{RegisteredTool, ToolHandler, ToolRegistry};
