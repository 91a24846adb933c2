//! Builtin tools and the toolkits assembled from them.
mod list_dir;
mod read_file;
mod write_file;

pub use list_dir::ListDirTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;

use crate::{Toolkit, ToolkitType};

/// The builtin toolkit for `kind`, if this crate ships one.
///
/// Oracle kinds depend on an external index and have no builtin
/// implementation; hosts construct those toolkits themselves.
pub fn toolkit(kind: ToolkitType) -> Option<Toolkit> {
    match kind {
        ToolkitType::PyRetriever => Some(
            Toolkit::new(kind)
                .with_tool(ReadFileTool)
                .with_tool(ListDirTool),
        ),
        ToolkitType::PyWriter => Some(Toolkit::new(kind).with_tool(WriteFileTool)),
        ToolkitType::CodebaseOracle | ToolkitType::ContextOracle => None,
    }
}
