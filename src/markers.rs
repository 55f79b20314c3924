//! Memory marker protocol.
//!
//! Injected context is bounded by two literal delimiters so it can be found
//! and removed again later:
//!
//! ```text
//! === RELEVANT MEMORIES FROM LETTA ===
//!
//! [human]
//! Uses a laptop
//!
//! === END MEMORIES ===
//!
//! <user text>
//! ```
//!
//! New context always goes ahead of whatever the user already typed.

use crate::types::MemoryBlock;
use thiserror::Error;

pub const MEMORY_HEADER: &str = "=== RELEVANT MEMORIES FROM LETTA ===";
pub const MEMORY_FOOTER: &str = "=== END MEMORIES ===";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    /// A header without a matching footer after it
    #[error("Memory header present without a matching footer")]
    Malformed,

    #[error("No non-empty memory blocks to inject")]
    NothingToInject,
}

/// Format one block as a labelled section, `None` when it has no text
pub fn format_section(block: &MemoryBlock) -> Option<String> {
    let text = block.text.trim();
    if text.is_empty() {
        return None;
    }
    let text = match block.size_limit {
        Some(limit) if text.chars().count() > limit => {
            text.chars().take(limit).collect::<String>()
        }
        _ => text.to_string(),
    };
    Some(format!("[{}]\n{}", block.label, text))
}

/// Format all non-empty blocks between header and footer
pub fn format_blocks(blocks: &[MemoryBlock]) -> Option<String> {
    let sections: Vec<String> = blocks.iter().filter_map(format_section).collect();
    if sections.is_empty() {
        return None;
    }
    Some(format!(
        "{}\n\n{}\n\n{}\n\n",
        MEMORY_HEADER,
        sections.join("\n\n"),
        MEMORY_FOOTER
    ))
}

/// Replace any prior memory block in `existing` with `blocks`, placed first
pub fn splice_in(existing: &str, blocks: &[MemoryBlock]) -> Result<String, MarkerError> {
    let formatted = format_blocks(blocks).ok_or(MarkerError::NothingToInject)?;
    Ok(format!("{}{}", formatted, strip_out(existing)))
}

/// Remove the memory block from `content`, returning the trimmed remainder.
///
/// A header with no footer after it is treated as malformed and everything
/// from the header on is dropped.
pub fn strip_out(content: &str) -> String {
    let Some(start) = content.find(MEMORY_HEADER) else {
        return content.trim().to_string();
    };
    let after_header = start + MEMORY_HEADER.len();
    match content[after_header..].find(MEMORY_FOOTER) {
        Some(offset) => {
            let end = after_header + offset + MEMORY_FOOTER.len();
            format!("{}{}", &content[..start], &content[end..])
                .trim()
                .to_string()
        }
        None => content[..start].trim().to_string(),
    }
}

/// Add a single block to `content`.
///
/// Without a header this is [`splice_in`] with one block. With a complete
/// header/footer pair the section goes right before the footer. A header
/// without its footer is an inconsistent state and is left untouched.
pub fn add_one(content: &str, block: &MemoryBlock) -> Result<String, MarkerError> {
    let Some(start) = content.find(MEMORY_HEADER) else {
        return splice_in(content, std::slice::from_ref(block));
    };
    let after_header = start + MEMORY_HEADER.len();
    let footer = content[after_header..]
        .find(MEMORY_FOOTER)
        .map(|offset| after_header + offset)
        .ok_or(MarkerError::Malformed)?;
    let section = format_section(block).ok_or(MarkerError::NothingToInject)?;

    Ok(format!(
        "{}{}\n\n{}",
        &content[..footer],
        section,
        &content[footer..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn block(label: &str, text: &str) -> MemoryBlock {
        MemoryBlock::new(format!("block-{}", label), label, text)
    }

    #[test]
    fn test_splice_into_empty_editor() {
        let result = splice_in("", &[block("facts", "Uses a laptop")]).unwrap();
        assert_eq!(
            result,
            "=== RELEVANT MEMORIES FROM LETTA ===\n\n[facts]\nUses a laptop\n\n=== END MEMORIES ===\n\n"
        );

        let typed = format!("{}hello", result);
        assert_eq!(strip_out(&typed), "hello");
    }

    #[test]
    fn test_splice_skips_empty_blocks() {
        let result = splice_in(
            "",
            &[block("persona", "  "), block("human", "Name: Sam"), block("notes", "")],
        )
        .unwrap();
        assert_eq!(
            result,
            format!("{}\n\n[human]\nName: Sam\n\n{}\n\n", MEMORY_HEADER, MEMORY_FOOTER)
        );
    }

    #[test]
    fn test_splice_with_nothing_to_inject() {
        assert_eq!(
            splice_in("draft", &[block("persona", "")]),
            Err(MarkerError::NothingToInject)
        );
        assert_eq!(splice_in("draft", &[]), Err(MarkerError::NothingToInject));
    }

    #[test]
    fn test_splice_replaces_prior_block_and_keeps_user_text_last() {
        let first = splice_in("my question", &[block("human", "old")]).unwrap();
        let second = splice_in(&first, &[block("human", "new")]).unwrap();
        assert_eq!(second.matches(MEMORY_HEADER).count(), 1);
        assert!(second.contains("[human]\nnew"));
        assert!(!second.contains("old"));
        assert!(second.ends_with("my question"));
    }

    #[test]
    fn test_size_limit_truncates_block_text() {
        let mut limited = block("human", "abcdefgh");
        limited.size_limit = Some(3);
        assert_eq!(format_section(&limited).unwrap(), "[human]\nabc");
    }

    #[test]
    fn test_strip_without_markers_trims() {
        assert_eq!(strip_out("  just text \n"), "just text");
    }

    #[test]
    fn test_strip_malformed_truncates_from_header() {
        let content = format!("before\n{}\n\n[human]\nleaked", MEMORY_HEADER);
        assert_eq!(strip_out(&content), "before");
    }

    #[test]
    fn test_strip_footer_before_header_is_malformed() {
        let content = format!("{} text {} tail", MEMORY_FOOTER, MEMORY_HEADER);
        assert_eq!(strip_out(&content), MEMORY_FOOTER.to_string() + " text");
    }

    #[test]
    fn test_add_one_without_header_matches_splice_in() {
        let b = block("facts", "Uses a laptop");
        assert_eq!(add_one("", &b), splice_in("", &[b.clone()]));
        assert_eq!(add_one("hi", &b), splice_in("hi", &[b]));
    }

    #[test]
    fn test_add_one_inserts_before_footer() {
        let content = format!("{}hello", splice_in("", &[block("human", "Sam")]).unwrap());
        let result = add_one(&content, &block("persona", "Helpful")).unwrap();
        assert_eq!(
            result,
            format!(
                "{}\n\n[human]\nSam\n\n[persona]\nHelpful\n\n{}\n\nhello",
                MEMORY_HEADER, MEMORY_FOOTER
            )
        );
        assert_eq!(strip_out(&result), "hello");
    }

    #[test]
    fn test_add_one_with_missing_footer_is_rejected() {
        let content = format!("{}\n\n[human]\nSam", MEMORY_HEADER);
        assert_eq!(
            add_one(&content, &block("persona", "Helpful")),
            Err(MarkerError::Malformed)
        );
    }

    #[test]
    fn test_add_one_empty_block_into_existing() {
        let content = splice_in("", &[block("human", "Sam")]).unwrap();
        assert_eq!(
            add_one(&content, &block("persona", " ")),
            Err(MarkerError::NothingToInject)
        );
    }

    fn arb_block() -> impl Strategy<Value = MemoryBlock> {
        ("[a-z]{1,12}", "[a-zA-Z0-9 .,\n]{0,80}", proptest::option::of(1usize..40)).prop_map(
            |(label, text, size_limit)| MemoryBlock {
                id: format!("id-{}", label),
                label,
                text,
                size_limit,
            },
        )
    }

    proptest! {
        // Stripping a freshly spliced block gives back the trimmed user text.
        #[test]
        fn prop_strip_inverts_splice(
            blocks in prop::collection::vec(arb_block(), 1..5),
            user_text in "[a-zA-Z0-9 .,!?\n]{0,120}",
        ) {
            prop_assume!(blocks.iter().any(|b| !b.is_empty()));
            let spliced = splice_in("", &blocks).unwrap();
            let combined = format!("{}{}", spliced, user_text);
            prop_assert_eq!(strip_out(&combined), user_text.trim());
        }

        // Splicing into existing text keeps that text, trimmed, after the block.
        #[test]
        fn prop_splice_preserves_existing_text(
            blocks in prop::collection::vec(arb_block(), 1..5),
            existing in "[a-zA-Z0-9 .,!?\n]{0,120}",
        ) {
            prop_assume!(blocks.iter().any(|b| !b.is_empty()));
            let spliced = splice_in(&existing, &blocks).unwrap();
            prop_assert!(spliced.starts_with(MEMORY_HEADER));
            prop_assert_eq!(strip_out(&spliced), existing.trim());
        }
    }
}
