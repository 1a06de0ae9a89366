use ammonia::Builder;

/// Entities the serializer emits for text nodes. `&` is always escaped, so
/// every `&` in cleaned output starts one of these.
const TEXT_ENTITIES: [(&str, &str); 5] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&nbsp;", "\u{a0}"),
];

fn unescape_text(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        match TEXT_ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, plain)) => {
                out.push_str(plain);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Strips every HTML tag from user-supplied text and trims it.
///
/// The result is plain text, not HTML: `&` and a `<` that opens no tag are
/// kept as typed. Clients escape on render.
pub fn sanitize_text(input: &str) -> String {
    let cleaned = Builder::empty().clean(input).to_string();
    unescape_text(&cleaned).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_is_stripped_text_is_kept() {
        assert_eq!(sanitize_text("<b>Great</b> job <i>today</i>"), "Great job today");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(sanitize_text("  thanks for helping  "), "thanks for helping");
    }

    #[test]
    fn markup_only_input_becomes_empty() {
        assert!(sanitize_text("<img src=x onerror=alert(1)>").is_empty());
    }

    #[test]
    fn ampersands_and_brackets_are_stored_verbatim() {
        assert_eq!(sanitize_text("Tom & Jerry <3"), "Tom & Jerry <3");
        assert_eq!(sanitize_text("1 < 2 && 3 > 2"), "1 < 2 && 3 > 2");
        assert_eq!(sanitize_text("say \"hi\""), "say \"hi\"");
    }

    #[test]
    fn cleaning_never_lengthens_text() {
        let amps = "&".repeat(500);
        assert_eq!(sanitize_text(&amps), amps);
    }

    #[test]
    fn unknown_ampersand_sequences_pass_through() {
        assert_eq!(unescape_text("fish &chips &amp;lt;"), "fish &chips &lt;");
    }
}
