//! Small string helpers shared by logging call sites.

/// Truncate `s` to at most `max_chars` characters, appending `...` when cut.
///
/// Counts characters, not bytes, so multi-byte input never splits a code point.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Round to two decimal places, the precision used by every money and rate
/// figure in the reports.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_untouched() {
        assert_eq!(truncate_with_ellipsis("hello", 50), "hello");
    }

    #[test]
    fn long_input_is_cut_on_char_boundary() {
        let input = "é".repeat(60);
        let out = truncate_with_ellipsis(&input, 50);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 53);
    }

    #[test]
    fn exact_length_is_not_marked() {
        let input = "a".repeat(50);
        assert_eq!(truncate_with_ellipsis(&input, 50), input);
    }

    #[test]
    fn round2_rounds_half_up() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(12.344), 12.34);
    }
}
