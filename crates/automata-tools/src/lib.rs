mod registry;
mod tool;
mod toolkit;
pub mod builtin;

pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{Tool, ToolCall, ToolOutput};
pub use toolkit::{Toolkit, ToolkitError, ToolkitType, Toolkits};
