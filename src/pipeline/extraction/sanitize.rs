/// Sanitize extracted text before passing downstream.
/// Strips control characters, normalizes whitespace, preserves the
/// punctuation transcript rows rely on (pipes, dashes, parens, hashes).
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            c.is_alphanumeric()
                || c.is_whitespace()
                || matches!(
                    c,
                    '.' | ','
                        | ';'
                        | ':'
                        | '-'
                        | '/'
                        | '('
                        | ')'
                        | '['
                        | ']'
                        | '+'
                        | '='
                        | '%'
                        | '#'
                        | '&'
                        | '\''
                        | '"'
                        | '*'
                        | '|'
                        | '\u{2013}' // En-dash, common in "CODE – Title – Grade" rows
                        | '\u{2014}'
                )
        })
        .collect::<String>()
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_null_bytes() {
        let raw = "Name: EASTON\x00MICHURA";
        let clean = sanitize_extracted_text(raw);
        assert!(!clean.contains('\x00'));
        assert!(clean.contains("EASTON"));
    }

    #[test]
    fn strips_control_characters() {
        let raw = "CMT 108\x01\x02\x03\nStudent No: 1046098";
        let clean = sanitize_extracted_text(raw);
        assert!(!clean.contains('\x01'));
        assert!(clean.contains("CMT 108"));
        assert!(clean.contains("1046098"));
    }

    #[test]
    fn preserves_transcript_punctuation() {
        let raw = "CMT 108 INTRO. TO WEB DEVELOPMENT 24 50 74 A 3";
        assert_eq!(sanitize_extracted_text(raw), raw);
    }

    #[test]
    fn preserves_tabular_delimiters() {
        let raw = "CIT3105 | Machine Learning | 3 | A\n#1046098 Page 1 of 3";
        let clean = sanitize_extracted_text(raw);
        assert!(clean.contains('|'));
        assert!(clean.contains("#1046098"));
    }

    #[test]
    fn preserves_dash_rows() {
        let raw = "CIT 3105 \u{2013} Machine Learning \u{2013} A";
        let clean = sanitize_extracted_text(raw);
        assert!(clean.contains('\u{2013}'));
    }

    #[test]
    fn collapses_blank_lines() {
        let raw = "Line one\n\n\n\nLine two\n\n\nLine three";
        let clean = sanitize_extracted_text(raw);
        assert_eq!(clean, "Line one\nLine two\nLine three");
    }

    #[test]
    fn trims_whitespace_per_line() {
        let raw = "  leading spaces  \n  trailing too  ";
        let clean = sanitize_extracted_text(raw);
        assert_eq!(clean, "leading spaces\ntrailing too");
    }

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(sanitize_extracted_text(""), "");
    }

    #[test]
    fn only_control_chars_returns_empty() {
        assert_eq!(sanitize_extracted_text("\x00\x01\x02"), "");
    }

    #[test]
    fn preserves_accented_names() {
        let raw = "Name: JOSÉ NDERITU";
        let clean = sanitize_extracted_text(raw);
        assert!(clean.contains("JOSÉ"));
    }
}
