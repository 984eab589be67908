//! Object-safe tool contract and the canonical tool set (spec §4.3,
//! component C6): a name-keyed registry validating arguments against a
//! declared schema before dispatching to a concrete implementation.

pub mod builtin;
pub mod registry;
pub mod result;
pub mod schema;

pub use builtin::{
    canonical_registry, BashTool, EditTool, GitTool, GrepTool, LsTool, MemoryTool, ReadFileTool,
    WebTool, WriteFileTool,
};
pub use registry::{ToolDyn, ToolRegistry};
pub use result::ToolResult;
pub use schema::{ParamType, ParameterSchema, Sensitivity, ToolSchema};
