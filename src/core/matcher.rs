//! Literal substring matching for the edit engine.
//!
//! Byte-exact by default, optionally case-insensitive. No normalization,
//! no trimming: whitespace differences are genuine mismatches. All offsets
//! are byte offsets into the original content.

use memchr::memmem;

/// Byte range of one match in the original content (start inclusive,
/// end exclusive). Always lies on char boundaries.
pub type MatchRange = (usize, usize);

/// Find all non-overlapping occurrences of `needle` in `content`,
/// scanning left to right. The next search resumes after the end of the
/// previous match. An empty needle yields no matches.
pub fn find_ranges(content: &str, needle: &str, case_insensitive: bool) -> Vec<MatchRange> {
    if needle.is_empty() {
        return Vec::new();
    }

    if !case_insensitive {
        return memmem::find_iter(content.as_bytes(), needle.as_bytes())
            .map(|start| (start, start + needle.len()))
            .collect();
    }

    find_ranges_case_folded(content, needle)
}

/// Start offsets of all non-overlapping matches.
pub fn find_positions(content: &str, needle: &str, case_insensitive: bool) -> Vec<usize> {
    find_ranges(content, needle, case_insensitive)
        .into_iter()
        .map(|(start, _)| start)
        .collect()
}

/// Case-insensitive scan. Only the comparison is lowercased; the ranges
/// returned always delimit the original-case substring. Folding is done
/// per char pair so multi-byte case mappings cannot shift offsets.
fn find_ranges_case_folded(content: &str, needle: &str) -> Vec<MatchRange> {
    let mut ranges = Vec::new();
    let mut start = 0;

    while start < content.len() {
        match prefix_match_len(&content[start..], needle) {
            Some(len) => {
                ranges.push((start, start + len));
                start += len;
            }
            None => {
                start += content[start..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    ranges
}

/// If `haystack` begins with a case-insensitive match of `needle`, return
/// the byte length of the matched (original-case) prefix. A haystack char
/// whose lowercase expansion is only partially covered by the needle does
/// not count as a match.
fn prefix_match_len(haystack: &str, needle: &str) -> Option<usize> {
    let mut hay = haystack.chars();
    let mut consumed = 0;
    // Lowercase units of the current haystack char not yet compared.
    let mut pending = String::new();
    let mut needle_lower = needle.chars().flat_map(char::to_lowercase);

    loop {
        let Some(want) = needle_lower.next() else {
            return pending.is_empty().then_some(consumed);
        };
        let got = match pending.chars().next() {
            Some(c) => {
                pending.drain(..c.len_utf8());
                c
            }
            None => {
                let c = hay.next()?;
                consumed += c.len_utf8();
                let mut fold = c.to_lowercase();
                let first = fold.next().unwrap_or(c);
                pending.extend(fold);
                first
            }
        };
        if got != want {
            return None;
        }
    }
}

/// 1-based line number of the given byte offset, computed as one plus
/// the number of newlines before it.
pub fn line_number_at(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    1 + bytecount::count(&content.as_bytes()[..end], b'\n')
}

/// Replace occurrences of `needle` with `replacement`. When `replace_all`
/// is false only the first (lowest-offset) match is replaced. Returns the
/// new content and how many replacements were made.
pub fn replace(
    content: &str,
    needle: &str,
    replacement: &str,
    replace_all: bool,
    case_insensitive: bool,
) -> (String, usize) {
    let ranges = find_ranges(content, needle, case_insensitive);
    if ranges.is_empty() {
        return (content.to_string(), 0);
    }

    let take = if replace_all { ranges.len() } else { 1 };
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for &(start, end) in ranges.iter().take(take) {
        out.push_str(&content[cursor..start]);
        out.push_str(replacement);
        cursor = end;
    }
    out.push_str(&content[cursor..]);
    (out, take)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_positions_left_to_right() {
        assert_eq!(find_positions("foo bar foo", "foo", false), vec![0, 8]);
        assert_eq!(find_positions("aaa", "a", false), vec![0, 1, 2]);
    }

    #[test]
    fn matches_do_not_overlap() {
        // After matching "aa" at 0, the scan resumes at 2.
        assert_eq!(find_positions("aaa", "aa", false), vec![0]);
        assert_eq!(find_positions("aaaa", "aa", false), vec![0, 2]);
    }

    #[test]
    fn empty_needle_yields_nothing() {
        assert_eq!(find_positions("abc", "", false), Vec::<usize>::new());
        assert_eq!(find_positions("", "", true), Vec::<usize>::new());
    }

    #[test]
    fn case_insensitive_finds_mixed_case() {
        assert_eq!(find_positions("Foo fOO foo", "foo", true), vec![0, 4, 8]);
        assert_eq!(find_positions("Foo", "foo", false), Vec::<usize>::new());
    }

    #[test]
    fn case_insensitive_ranges_cover_original_case() {
        let ranges = find_ranges("HeLLo world", "hello", true);
        assert_eq!(ranges, vec![(0, 5)]);
    }

    #[test]
    fn line_numbers_are_one_based() {
        let content = "a\nb\nc";
        assert_eq!(line_number_at(content, 0), 1);
        assert_eq!(line_number_at(content, 2), 2);
        assert_eq!(line_number_at(content, 4), 3);
    }

    #[test]
    fn replace_first_only() {
        let (out, n) = replace("foo foo foo", "foo", "bar", false, false);
        assert_eq!(out, "bar foo foo");
        assert_eq!(n, 1);
    }

    #[test]
    fn replace_all_occurrences() {
        let (out, n) = replace("foo foo foo", "foo", "bar", true, false);
        assert_eq!(out, "bar bar bar");
        assert_eq!(n, 3);
    }

    #[test]
    fn case_insensitive_replace_removes_original_case() {
        // The original-case substring "HELLO" is what gets removed.
        let (out, n) = replace("say HELLO twice", "hello", "goodbye", false, true);
        assert_eq!(out, "say goodbye twice");
        assert_eq!(n, 1);
    }

    #[test]
    fn replace_with_empty_string_deletes() {
        let (out, n) = replace("a-b-c", "-", "", true, false);
        assert_eq!(out, "abc");
        assert_eq!(n, 2);
    }

    #[test]
    fn multibyte_content_keeps_offsets_exact() {
        let content = "héllo Héllo";
        let ranges = find_ranges(content, "héllo", true);
        assert_eq!(ranges.len(), 2);
        let (s, e) = ranges[1];
        assert_eq!(&content[s..e], "Héllo");
    }
}
