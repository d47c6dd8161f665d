use std::collections::HashSet;

use ammonia::Builder;

/// Strip every tag from user supplied text and trim it. Returns `None` when
/// nothing is left.
pub fn clean_user_text(input: &str) -> Option<String> {
    let cleaned = Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(input)
        .to_string();
    let trimmed = cleaned.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_removed() {
        assert_eq!(
            clean_user_text("  <b>Great</b> job<script>x()</script> ").as_deref(),
            Some("Great job")
        );
    }

    #[test]
    fn test_blank_becomes_none() {
        assert_eq!(clean_user_text("   "), None);
        assert_eq!(clean_user_text("<img src=x>"), None);
    }
}
