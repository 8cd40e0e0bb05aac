//! Input cleaning: HTML escaping, tag stripping and identifier filtering.

use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static tag pattern"))
}

/// Remove characters outside `[A-Za-z0-9_]`. Field names from clients pass
/// through here before they get anywhere near a statement.
pub fn field_name(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect()
}

/// Escape `& < > " '` as HTML entities.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn strip_tags(s: &str) -> String {
    tag_pattern().replace_all(s, "").into_owned()
}

/// Trim, strip tags, escape. Applied to stored strings and query values.
pub fn clean_text(s: &str) -> String {
    escape_html(&strip_tags(s.trim()))
}

/// Query values that look numeric are left untouched.
pub fn clean_query_value(s: &str) -> String {
    let t = s.trim();
    if !t.is_empty() && t.parse::<f64>().is_ok() {
        t.to_string()
    } else {
        clean_text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_lose_everything_but_identifier_chars() {
        assert_eq!(field_name("name; DROP TABLE x"), "nameDROPTABLEx");
        assert_eq!(field_name("price\" OR 1=1 --"), "priceOR11");
        assert_eq!(field_name("created_at"), "created_at");
        assert_eq!(field_name("';--"), "");
    }

    #[test]
    fn clean_text_trims_strips_and_escapes() {
        assert_eq!(clean_text("  Widget  "), "Widget");
        assert_eq!(clean_text("<b>bold</b> & co"), "bold &amp; co");
        assert_eq!(clean_text("O'Reilly \"books\""), "O&#039;Reilly &quot;books&quot;");
        assert_eq!(clean_text("<script>alert(1)</script>"), "alert(1)");
        assert_eq!(clean_text("1 < 2"), "1 &lt; 2");
    }

    #[test]
    fn numeric_query_values_untouched() {
        assert_eq!(clean_query_value(" 42 "), "42");
        assert_eq!(clean_query_value("9.99"), "9.99");
        assert_eq!(clean_query_value("<i>x</i>"), "x");
    }
}
