//! Property-based tests for URL helpers.
//!
//! Ancestor checks decide where content folders may live, so they must hold
//! for arbitrary path shapes, not just the hand-picked ones in `urls`.

#[cfg(test)]
mod proptest_tests {
    use crate::urls::{file_name, is_equal_or_ancestor, is_strict_ancestor, trim_trailing_slash};
    use proptest::prelude::*;

    fn segments() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-zA-Z0-9_.-]{1,8}", 1..6)
    }

    fn file_url(segments: &[String]) -> String {
        format!("file:///{}", segments.join("/"))
    }

    // ============================================================================
    // ancestor checks
    // ============================================================================

    proptest! {
        /// Property: every URL is its own ancestor, but never its own strict ancestor
        #[test]
        fn ancestor_is_reflexive(segs in segments()) {
            let url = file_url(&segs);
            prop_assert!(is_equal_or_ancestor(&url, &url));
            prop_assert!(!is_strict_ancestor(&url, &url));
        }

        /// Property: every prefix of the segment list is an ancestor
        #[test]
        fn prefixes_are_ancestors(segs in segments(), cut in 0usize..6) {
            let cut = cut.min(segs.len());
            let ancestor = file_url(&segs[..cut]);
            let url = file_url(&segs);
            prop_assert!(
                is_equal_or_ancestor(&ancestor, &url),
                "{} should contain {}",
                ancestor,
                url
            );
            prop_assert_eq!(is_strict_ancestor(&ancestor, &url), cut < segs.len());
        }

        /// Property: a descendant is never an ancestor of a strict ancestor
        #[test]
        fn ancestry_is_antisymmetric(segs in segments(), extra in "[a-z]{1,8}") {
            let parent = file_url(&segs);
            let child = format!("{}/{}", parent, extra);
            prop_assert!(!is_equal_or_ancestor(&child, &parent));
        }

        /// Property: extending the last segment does not create a descendant
        #[test]
        fn sibling_with_common_prefix_is_not_nested(segs in segments(), suffix in "[a-z]{1,4}") {
            let url = file_url(&segs);
            let sibling = format!("{}{}", url, suffix);
            prop_assert!(!is_equal_or_ancestor(&url, &sibling));
        }

        /// Property: trailing slashes never change the answer
        #[test]
        fn trailing_slashes_are_ignored(segs in segments(), slashes in 1usize..4) {
            let url = file_url(&segs);
            let slashed = format!("{}{}", url, "/".repeat(slashes));
            prop_assert_eq!(trim_trailing_slash(&slashed), url.as_str());
            prop_assert!(is_equal_or_ancestor(&slashed, &url));
            prop_assert!(!is_strict_ancestor(&slashed, &url));
        }
    }

    // ============================================================================
    // trim_trailing_slash / file_name
    // ============================================================================

    proptest! {
        /// Property: trimming is idempotent
        #[test]
        fn trim_is_idempotent(input in "[a-z:/!.]{0,20}") {
            let once = trim_trailing_slash(&input);
            prop_assert_eq!(trim_trailing_slash(once), once);
        }

        /// Property: file_name is the last path segment
        #[test]
        fn file_name_is_last_segment(segs in segments()) {
            let url = file_url(&segs);
            prop_assert_eq!(file_name(&url), segs[segs.len() - 1].as_str());
        }
    }
}
