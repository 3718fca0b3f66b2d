//! Render pipeline
//!
//! Re-renders an assistant message's accumulated markdown after every delta,
//! and once the stream ends runs the finalize pass that turns the message's
//! code nodes into indexed [`CodeBlock`]s with copy/execute affordances.

mod highlight;
mod markdown;
mod palette;

pub use highlight::Highlighter;
pub use markdown::render_markdown;
pub use palette::{Palette, ThemeKind};

use std::collections::HashMap;

use ratatui::style::Style;
use ratatui::text::{Line, Span};

use crate::core::errors::ControllerError;
use crate::core::types::{BlockRef, CodeBlock, CodeBlockState, MessageId};

/// Copy/execute affordances attached to a code node at finalize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordance {
    pub block: BlockRef,
}

/// A code fragment in the render tree
#[derive(Debug, Clone, PartialEq)]
pub struct CodeNode {
    pub lang: Option<String>,
    pub source: String,
    /// Highlighted source, one line per source line
    pub lines: Vec<Line<'static>>,
    pub affordance: Option<Affordance>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    Prose(Vec<Line<'static>>),
    Code(CodeNode),
}

/// Structured, highlighted rendering of one message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderTree {
    pub nodes: Vec<RenderNode>,
}

impl RenderTree {
    /// Code nodes in document order
    pub fn code_nodes(&self) -> impl Iterator<Item = &CodeNode> {
        self.nodes.iter().filter_map(|node| match node {
            RenderNode::Code(code) => Some(code),
            RenderNode::Prose(_) => None,
        })
    }

    pub fn code_nodes_mut(&mut self) -> impl Iterator<Item = &mut CodeNode> {
        self.nodes.iter_mut().filter_map(|node| match node {
            RenderNode::Code(code) => Some(code),
            RenderNode::Prose(_) => None,
        })
    }

    /// Plain text of the tree, for logs and tests
    pub fn plain_text(&self) -> String {
        let mut out = Vec::new();
        for node in &self.nodes {
            match node {
                RenderNode::Prose(lines) => out.extend(lines.iter().map(line_text)),
                RenderNode::Code(code) => out.push(code.source.trim_end().to_string()),
            }
        }
        out.join("\n")
    }

    /// Flatten into display lines, with a footer under every code node that
    /// carries affordances
    pub fn display_lines(
        &self,
        palette: &Palette,
        state_of: impl Fn(BlockRef) -> Option<CodeBlockState>,
    ) -> Vec<Line<'static>> {
        let muted = Style::default().fg(palette.muted);
        let mut lines = Vec::new();

        for node in &self.nodes {
            match node {
                RenderNode::Prose(prose) => lines.extend(prose.iter().cloned()),
                RenderNode::Code(code) => {
                    lines.push(Line::from(Span::styled(
                        format!("```{}", code.lang.as_deref().unwrap_or_default()),
                        muted,
                    )));
                    for line in &code.lines {
                        let mut spans = vec![Span::raw("  ")];
                        spans.extend(line.spans.iter().cloned());
                        lines.push(Line::from(spans));
                    }
                    lines.push(Line::from(Span::styled("```", muted)));

                    if let Some(affordance) = code.affordance {
                        let state = state_of(affordance.block).unwrap_or_default();
                        let color = match state {
                            CodeBlockState::Copied | CodeBlockState::Succeeded => palette.success,
                            CodeBlockState::CopyFailed | CodeBlockState::Failed => palette.error,
                            _ => palette.accent,
                        };
                        lines.push(Line::from(vec![
                            Span::styled(format!("[{}] ", affordance.block.index), muted),
                            Span::styled(state.label().to_string(), Style::default().fg(color)),
                        ]));
                    }
                }
            }
            lines.push(Line::from(""));
        }

        lines.pop();
        lines
    }
}

fn line_text(line: &Line<'static>) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}

/// Rendering state of one assistant message
#[derive(Debug, Default)]
struct Entry {
    tree: RenderTree,
    /// Set once by the finalize pass
    blocks: Option<Vec<CodeBlock>>,
}

/// Renders assistant messages and owns their code blocks
#[derive(Debug)]
pub struct RenderPipeline {
    palette: Palette,
    highlighter: Highlighter,
    entries: HashMap<MessageId, Entry>,
}

impl RenderPipeline {
    pub fn new(theme: ThemeKind) -> Self {
        let palette = Palette::for_theme(theme);
        let highlighter = Highlighter::new(palette.syntax_theme, palette.bg_code);
        Self {
            palette,
            highlighter,
            entries: HashMap::new(),
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Re-render the whole accumulated content of a message
    ///
    /// A message that was already finalized keeps its block indices: the
    /// affordances are re-attached to the new tree in document order.
    pub fn update(&mut self, id: MessageId, accumulator: &str) -> &RenderTree {
        let mut tree = render_markdown(accumulator, &self.palette, &self.highlighter);
        let entry = self.entries.entry(id).or_default();

        if let Some(blocks) = &entry.blocks {
            let nodes = tree.code_nodes().count();
            if nodes != blocks.len() {
                tracing::warn!(
                    "Re-render of {} has {} code nodes, {} blocks were finalized",
                    id,
                    nodes,
                    blocks.len()
                );
            }
            attach_affordances(id, &mut tree, blocks.len());
        }

        entry.tree = tree;
        &entry.tree
    }

    /// Assign indices to the message's code nodes, in document order from 0
    ///
    /// Idempotent: a second call returns the blocks created by the first one.
    pub fn finalize(&mut self, id: MessageId) -> Result<&[CodeBlock], ControllerError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(ControllerError::UnknownMessage(id))?;

        if entry.blocks.is_some() {
            tracing::debug!("{} already finalized", id);
        } else {
            let blocks: Vec<CodeBlock> = entry
                .tree
                .code_nodes()
                .enumerate()
                .map(|(index, node)| CodeBlock::new(index, node.lang.clone(), node.source.clone()))
                .collect();
            attach_affordances(id, &mut entry.tree, blocks.len());
            tracing::debug!("Finalized {} with {} code blocks", id, blocks.len());
            entry.blocks = Some(blocks);
        }

        Ok(entry.blocks.as_deref().unwrap_or_default())
    }

    pub fn is_finalized(&self, id: MessageId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.blocks.is_some())
    }

    /// Drop a message and its code blocks
    pub fn remove(&mut self, id: MessageId) {
        self.entries.remove(&id);
    }

    pub fn tree(&self, id: MessageId) -> Option<&RenderTree> {
        self.entries.get(&id).map(|e| &e.tree)
    }

    /// Finalized code blocks of a message
    pub fn blocks(&self, id: MessageId) -> Option<&[CodeBlock]> {
        self.entries.get(&id).and_then(|e| e.blocks.as_deref())
    }

    pub fn block(&self, block: BlockRef) -> Result<&CodeBlock, ControllerError> {
        let entry = self
            .entries
            .get(&block.message)
            .ok_or(ControllerError::UnknownMessage(block.message))?;
        let blocks = entry
            .blocks
            .as_ref()
            .ok_or(ControllerError::NotFinalized(block.message))?;
        blocks.get(block.index).ok_or(ControllerError::UnknownBlock {
            message: block.message,
            index: block.index,
        })
    }

    pub fn block_mut(&mut self, block: BlockRef) -> Result<&mut CodeBlock, ControllerError> {
        let entry = self
            .entries
            .get_mut(&block.message)
            .ok_or(ControllerError::UnknownMessage(block.message))?;
        let blocks = entry
            .blocks
            .as_mut()
            .ok_or(ControllerError::NotFinalized(block.message))?;
        blocks.get_mut(block.index).ok_or(ControllerError::UnknownBlock {
            message: block.message,
            index: block.index,
        })
    }

    /// Most recently finalized message, by id
    pub fn latest_finalized(&self) -> Option<MessageId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.blocks.is_some())
            .map(|(id, _)| *id)
            .max()
    }

    /// Render text that is not part of the history (execution results, notices)
    pub fn render_detached(&self, text: &str) -> RenderTree {
        render_markdown(text, &self.palette, &self.highlighter)
    }

    /// Display lines of a message with its current block states
    pub fn display_lines(&self, id: MessageId) -> Vec<Line<'static>> {
        let Some(entry) = self.entries.get(&id) else {
            return Vec::new();
        };
        entry.tree.display_lines(&self.palette, |block| {
            entry
                .blocks
                .as_ref()
                .and_then(|blocks| blocks.get(block.index))
                .map(|b| b.state)
        })
    }
}

fn attach_affordances(id: MessageId, tree: &mut RenderTree, limit: usize) {
    for (index, node) in tree.code_nodes_mut().enumerate() {
        node.affordance = (index < limit).then(|| Affordance {
            block: BlockRef::new(id, index),
        });
    }
}
