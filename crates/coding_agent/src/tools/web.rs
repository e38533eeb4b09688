//! Page fetching for `web_fetch`.
//!
//! Only http and https are fetched. HTML bodies are reduced to readable
//! text: script, style and page-chrome elements are dropped, remaining tags
//! become line breaks and entities are decoded.

use std::sync::OnceLock;
use std::time::Duration;

use regex::{Captures, Regex};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

use super::registry::WebFetchArgs;

const USER_AGENT: &str = "coding-agent/0.1 (educational coding agent)";
const TRUNCATION_MARKER: &str = "\n...[truncated]...";
const JUNK_ELEMENTS: [&str; 7] = ["script", "style", "noscript", "nav", "footer", "header", "aside"];

/// Readable text of one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchedPage {
    pub url: String,
    pub content_type: String,
    pub text: String,
}

pub(crate) fn fetch_page(args: &WebFetchArgs) -> Result<FetchedPage, String> {
    let url = args.url.trim();
    let parsed = Url::parse(url).map_err(|error| format!("Invalid URL {url}: {error}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err("Only http/https URLs are allowed.".to_string());
    }

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(args.timeout_seconds))
        .build()
        .map_err(|error| format!("Failed to build HTTP client: {error}"))?;
    let response = client
        .get(parsed)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|error| format!("Fetch failed for {url}: {error}"))?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let raw = response
        .text()
        .map_err(|error| format!("Failed to read body of {url}: {error}"))?;

    let text = if content_type.to_ascii_lowercase().contains("text/html") {
        html_to_text(&raw)
    } else {
        clean_text(&raw)
    };

    Ok(FetchedPage {
        url: url.to_string(),
        content_type,
        text: truncate_chars(text, args.max_chars),
    })
}

fn junk_element_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        let elements: Vec<String> = JUNK_ELEMENTS
            .iter()
            .map(|name| format!(r"<{name}\b[^>]*>.*?</{name}\s*>"))
            .collect();
        Regex::new(&format!(r"(?is)<!--.*?-->|{}", elements.join("|")))
            .expect("junk element regex must compile")
    })
}

fn tag_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag regex must compile"))
}

fn entity_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("entity regex must compile")
    })
}

pub(crate) fn html_to_text(html: &str) -> String {
    let without_junk = junk_element_regex().replace_all(html, "");
    let text = tag_regex().replace_all(&without_junk, "\n");
    let decoded = entity_regex().replace_all(&text, |captures: &Captures<'_>| {
        decode_entity(&captures[1]).unwrap_or_else(|| captures[0].to_string())
    });
    clean_text(&decoded)
}

fn decode_entity(entity: &str) -> Option<String> {
    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(decimal) = entity.strip_prefix('#') {
        decimal.parse().ok()?
    } else {
        let named = match entity {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "apos" => "'",
            "nbsp" => " ",
            _ => return None,
        };
        return Some(named.to_string());
    };
    char::from_u32(code).map(String::from)
}

/// Strips trailing whitespace before line breaks and collapses space runs.
pub(crate) fn clean_text(text: &str) -> String {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    static SPACE_RUNS: OnceLock<Regex> = OnceLock::new();

    let trailing = TRAILING.get_or_init(|| Regex::new(r"\s+\n").expect("whitespace regex must compile"));
    let blank_runs = BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("newline regex must compile"));
    let space_runs = SPACE_RUNS.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("space regex must compile"));

    let text = trailing.replace_all(text, "\n");
    let text = blank_runs.replace_all(&text, "\n\n");
    let text = space_runs.replace_all(&text, " ");
    text.trim().to_string()
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_is_reduced_to_readable_lines() {
        let html = "<html><head><title>Docs</title><style>p { color: red }</style></head>\
                    <body><nav>Menu</nav><!-- hidden --><h1>Hello</h1>\
                    <p>Fish &amp; chips&#33; &#x263A;</p><script>alert(1)</script>\
                    <footer>foot</footer></body></html>";
        assert_eq!(html_to_text(html), "Docs\nHello\nFish & chips! \u{263A}");
    }

    #[test]
    fn unknown_entities_are_kept_verbatim() {
        assert_eq!(html_to_text("<p>a &bogus; b</p>"), "a &bogus; b");
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  alpha   beta \t\n\n\n\ngamma  \n"), "alpha beta\ngamma");
        assert_eq!(clean_text("one\ttwo"), "one\ttwo");
    }

    #[test]
    fn long_text_is_cut_on_a_char_boundary() {
        let text = "é".repeat(300);
        let cut = truncate_chars(text, 200);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(cut.trim_end_matches(TRUNCATION_MARKER).chars().count(), 200);
        assert_eq!(truncate_chars("short".to_string(), 200), "short");
    }

    #[test]
    fn non_http_schemes_are_refused() {
        let args = WebFetchArgs {
            url: "file:///etc/passwd".to_string(),
            max_chars: 8000,
            timeout_seconds: 5,
        };
        assert_eq!(
            fetch_page(&args).expect_err("file scheme"),
            "Only http/https URLs are allowed."
        );

        let args = WebFetchArgs {
            url: "not a url".to_string(),
            ..args
        };
        assert!(fetch_page(&args).expect_err("malformed").starts_with("Invalid URL not a url"));
    }
}
