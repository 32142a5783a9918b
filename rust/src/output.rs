use std::io::Write;

use crate::tool_api::ToolDescriptor;

pub fn format_tool_line(tool: &ToolDescriptor) -> String {
    format!("Name: {} Description: {}", tool.name, tool.description)
}

/// Writes one line per tool, in order, then flushes.
pub fn write_tools<W: Write>(writer: &mut W, tools: &[ToolDescriptor]) -> std::io::Result<()> {
    for tool in tools {
        writeln!(writer, "{}", format_tool_line(tool))?;
    }
    writer.flush()
}
