//! Chunk-to-markdown rendering for the extraction prompts.

use crate::chunk::{Chunk, ChunkCategory};

/// Render an ordered chunk sequence into a single markdown document.
///
/// Each category maps to a fixed formatting rule; footers and page numbers are
/// dropped. Surviving chunks keep their input order and are joined with a
/// blank line. Pure function: identical input always yields identical output.
pub fn combine_chunks(chunks: &[Chunk]) -> String {
    let formatted: Vec<String> = chunks.iter().filter_map(render_chunk).collect();
    formatted.join("\n\n")
}

/// Formatting rule for a single chunk; `None` means the chunk is dropped.
fn render_chunk(chunk: &Chunk) -> Option<String> {
    let content = &chunk.text;
    match chunk.category {
        ChunkCategory::Title => Some(format!("## {content}")),
        ChunkCategory::Header => Some(format!("# {content}")),
        ChunkCategory::ListItem => Some(format!("* {content}")),
        ChunkCategory::FigureCaption => Some(format!("*Figure: {content}*")),
        ChunkCategory::Formula => Some(format!("```math\n{content}\n```")),
        ChunkCategory::CodeSnippet => Some(format!("```\n{content}\n```")),
        ChunkCategory::Table => Some(format!("| {content} |")),
        ChunkCategory::Footer | ChunkCategory::PageNumber => None,
        ChunkCategory::NarrativeText | ChunkCategory::Uncategorized => Some(content.clone()),
    }
}
