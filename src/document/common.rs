//! Helpers shared by the Typst backend.

/// Escape special characters for Typst strings.
pub fn escape_typst_string(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', r#"\""#)
        .replace('\n', r"\n")
}

/// Typst string literal.
pub fn typst_str(value: &str) -> String {
    format!("\"{}\"", escape_typst_string(value))
}

/// Typst length in millimetres.
pub fn mm(value: f64) -> String {
    format!("{:.2}mm", value)
}

/// Sanitize a string for use as a file name inside the render directory.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let sanitized = sanitize_filename::sanitize(name.trim());
    if sanitized.is_empty() || sanitized.starts_with('.') {
        return fallback.to_string();
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_typst_string() {
        assert_eq!(escape_typst_string(r#"Hello "World""#), r#"Hello \"World\""#);
        assert_eq!(escape_typst_string("Line1\nLine2"), r"Line1\nLine2");
        assert_eq!(typst_str(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn test_mm() {
        assert_eq!(mm(192.0), "192.00mm");
        assert_eq!(mm(19.5), "19.50mm");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("factur-x.xml", "file"), "factur-x.xml");
        assert_eq!(sanitize_filename("../../etc/passwd", "file"), "file");
        assert_eq!(sanitize_filename("a/b.xml", "file"), "ab.xml");
        assert_eq!(sanitize_filename("  ", "file"), "file");
    }
}
