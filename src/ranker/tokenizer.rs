use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"http[s]?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\(\), ]|(?:%[0-9a-fA-F][0-9a-fA-F]))+",
    )
    .expect("valid url regex")
});
static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s:=(),.'?]+").expect("valid separator regex"));

/// Splits free text into search tokens.
///
/// Whitespace-separated chunks that contain an `http(s)://` URL anywhere are
/// kept verbatim, including any wrapping punctuation. Every other chunk is lower-cased and split further on
/// `: = ( ) , . ' ?`. Empty tokens are dropped.
///
/// # Examples
///
/// ```
/// use tagmap::ranker::tokenize;
///
/// assert_eq!(
///     tokenize("Check http://x.com/a?b=1 now"),
///     vec!["check", "http://x.com/a?b=1", "now"]
/// );
/// assert_eq!(tokenize("f(x)=y, Done."), vec!["f", "x", "y", "done"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for chunk in text.split_whitespace() {
        if URL_RE.is_match(chunk) {
            tokens.push(chunk.to_string());
            continue;
        }
        let lower = chunk.to_lowercase();
        tokens.extend(
            SEPARATOR_RE
                .split(&lower)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
        );
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_kept_verbatim() {
        assert_eq!(
            tokenize("See HTTPS://nope.com and https://Example.com/Path?q=1"),
            vec!["see", "https", "//nope", "com", "and", "https://Example.com/Path?q=1"]
        );
    }

    #[test]
    fn url_chunk_is_kept_whole_with_its_surroundings() {
        assert_eq!(tokenize("(http://a.io)"), vec!["(http://a.io)"]);
        assert_eq!(tokenize("<http://x.com>"), vec!["<http://x.com>"]);
    }

    #[test]
    fn prefixed_url_is_not_split() {
        assert_eq!(
            tokenize("see:http://x.com/a Later"),
            vec!["see:http://x.com/a", "later"]
        );
    }

    #[test]
    fn separators_and_case() {
        assert_eq!(tokenize("Key: Value"), vec!["key", "value"]);
        assert_eq!(tokenize("it's a=b?"), vec!["it", "s", "a", "b"]);
    }

    #[test]
    fn blank_text_has_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \n\t ").is_empty());
        assert!(tokenize("... ,,, ??").is_empty());
    }
}
