//! Packing scored sources into a token budget.

use crate::source::ContextSource;

pub const TRUNCATION_MARKER: &str = " [...]";
/// Below this many free tokens a source that does not fit is dropped rather than cut.
pub const MIN_PARTIAL_TOKENS: usize = 64;
pub const CHARS_PER_TOKEN: usize = 4;
const LABEL_SEPARATOR: &str = ": ";
const BLOCK_SEPARATOR: &str = "\n\n";

/// Rough token count used for prompt budgeting: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Cut `text` to at most `max_chars` characters, preferring a word boundary and
/// ending with a `[...]` marker. Returns the text and whether it was cut.
pub fn truncate_on_word_boundary(text: &str, max_chars: usize) -> (String, bool) {
    let total = text.chars().count();
    if total <= max_chars {
        return (text.to_string(), false);
    }

    let marker_chars = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_chars {
        return (text.chars().take(max_chars).collect(), true);
    }

    let keep = max_chars - marker_chars;
    let cut = text
        .char_indices()
        .nth(keep)
        .map(|(index, _)| index)
        .unwrap_or(text.len());
    let head = &text[..cut];

    let next_is_space = text[cut..].starts_with(char::is_whitespace);
    let head = if next_is_space {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(boundary) if boundary >= keep / 2 => &head[..boundary],
            _ => head,
        }
    };

    let mut truncated = head.trim_end().to_string();
    truncated.push_str(TRUNCATION_MARKER);
    (truncated, true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextBlock {
    pub label: String,
    pub text: String,
    /// False when the text was shortened to fit.
    pub complete: bool,
}

impl ContextBlock {
    fn rendered_chars(&self) -> usize {
        self.label.chars().count() + LABEL_SEPARATOR.len() + self.text.chars().count()
    }
}

/// Outcome of packing: the blocks that made it in and the sources that were cut or left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub blocks: Vec<ContextBlock>,
    pub overflow: Vec<ContextSource>,
}

impl Assembly {
    pub fn overflowed(&self) -> bool {
        !self.overflow.is_empty()
    }

    pub fn render(&self) -> String {
        render_blocks(&self.blocks)
    }
}

pub fn render_blocks(blocks: &[ContextBlock]) -> String {
    blocks
        .iter()
        .map(|block| format!("{}{}{}", block.label, LABEL_SEPARATOR, block.text))
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Characters still available after `blocks` when the budget is `max_tokens`.
pub fn remaining_chars(blocks: &[ContextBlock], max_tokens: usize) -> usize {
    let used: usize = blocks.iter().map(ContextBlock::rendered_chars).sum::<usize>()
        + blocks.len().saturating_sub(1) * BLOCK_SEPARATOR.len();
    (max_tokens * CHARS_PER_TOKEN).saturating_sub(used)
}

/// Build a block for `label`/`text` that fits into `room` characters, including
/// the separator needed when `preceded` is true. `None` when even the label does not fit.
pub fn fit_block(label: &str, text: &str, room: usize, preceded: bool) -> Option<ContextBlock> {
    let overhead = label.chars().count()
        + LABEL_SEPARATOR.len()
        + if preceded { BLOCK_SEPARATOR.len() } else { 0 };
    let text_room = room.checked_sub(overhead)?;
    if text_room == 0 {
        return None;
    }
    let (text, cut) = truncate_on_word_boundary(text, text_room);
    Some(ContextBlock {
        label: label.to_string(),
        text,
        complete: !cut,
    })
}

/// Greedy packing of pre-sorted sources.
///
/// Each source is first capped at `max_source_chars`. Sources are added whole
/// while they fit; the first one that does not fit is cut into the remaining
/// space when at least [`MIN_PARTIAL_TOKENS`] remain, and everything after that
/// point which does not fit is dropped.
pub fn assemble(
    sources: Vec<ContextSource>,
    max_tokens: usize,
    max_source_chars: usize,
) -> Assembly {
    let mut assembly = Assembly::default();

    for source in sources {
        if source.is_empty() {
            continue;
        }

        let (capped, was_capped) = truncate_on_word_boundary(&source.text, max_source_chars);
        let room = remaining_chars(&assembly.blocks, max_tokens);
        let preceded = !assembly.blocks.is_empty();
        let whole = ContextBlock {
            label: source.label.clone(),
            text: capped,
            complete: !was_capped,
        };
        let needed = whole.rendered_chars() + if preceded { BLOCK_SEPARATOR.len() } else { 0 };

        if needed <= room {
            if was_capped {
                assembly.overflow.push(source);
            }
            assembly.blocks.push(whole);
            continue;
        }

        if room >= MIN_PARTIAL_TOKENS * CHARS_PER_TOKEN {
            if let Some(partial) = fit_block(&source.label, &whole.text, room, preceded) {
                assembly.blocks.push(ContextBlock {
                    complete: false,
                    ..partial
                });
            }
        }
        assembly.overflow.push(source);
    }

    assembly
}
