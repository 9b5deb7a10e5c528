//! DuckDuckGo instant-answer search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::{debug, warn};

use folio_core::{FolioError, Result, WebSearch, WebSearchConfig};

/// Web search over the DuckDuckGo instant-answer JSON API.
///
/// The abstract, the direct answer and related topics are flattened into
/// one plain-text block, one result per line.
pub struct DuckDuckGo {
    http: HttpClient,
    endpoint: String,
    max_results: usize,
}

impl DuckDuckGo {
    /// Create a client from configuration.
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FolioError::search(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            max_results: config.max_results.max(1),
        })
    }
}

#[async_trait]
impl WebSearch for DuckDuckGo {
    async fn search_web(&self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(FolioError::invalid_argument("query must not be empty"));
        }

        debug!("Web search: {:?}", query);

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| FolioError::search(format!("Web search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Web search returned {}", status);
            return Err(FolioError::search(format!("Web search returned HTTP {}", status)));
        }

        // The API serves JSON as application/x-javascript, so decode the bytes.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FolioError::search(format!("Failed to read web search response: {}", e)))?;
        let answer: InstantAnswer = serde_json::from_slice(&bytes)
            .map_err(|e| FolioError::search(format!("Malformed web search response: {}", e)))?;

        Ok(render(query, &answer, self.max_results))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    /// Usually a string; some answer types carry an object instead.
    #[serde(default)]
    answer: serde_json::Value,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

/// A related topic, or a named group of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Topic {
    Entry {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<Topic>,
    },
}

fn collect_topics<'a>(topics: &'a [Topic], out: &mut Vec<(&'a str, &'a str)>) {
    for topic in topics {
        match topic {
            Topic::Entry { text, first_url } => {
                if !text.trim().is_empty() {
                    out.push((text.as_str(), first_url.as_str()));
                }
            }
            Topic::Group { topics } => collect_topics(topics, out),
        }
    }
}

fn render(query: &str, answer: &InstantAnswer, max_results: usize) -> String {
    let mut lines = Vec::new();

    if let Some(direct) = answer.answer.as_str().map(str::trim).filter(|a| !a.is_empty()) {
        lines.push(direct.to_string());
    }
    if !answer.abstract_text.trim().is_empty() {
        let mut line = answer.abstract_text.trim().to_string();
        if !answer.heading.is_empty() {
            line = format!("{}: {}", answer.heading, line);
        }
        if !answer.abstract_url.is_empty() {
            line.push_str(&format!(" ({})", answer.abstract_url));
        }
        lines.push(line);
    }

    let mut topics = Vec::new();
    collect_topics(&answer.related_topics, &mut topics);
    for (text, url) in topics {
        if url.is_empty() {
            lines.push(text.trim().to_string());
        } else {
            lines.push(format!("{} ({})", text.trim(), url));
        }
    }

    lines.truncate(max_results);
    if lines.is_empty() {
        format!("No results found for '{}'.", query)
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> InstantAnswer {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_render_abstract_and_topics() {
        let answer = parse(
            r#"{
                "Heading": "Herman Melville",
                "AbstractText": "American novelist.",
                "AbstractURL": "https://en.wikipedia.org/wiki/Herman_Melville",
                "Answer": "",
                "RelatedTopics": [
                    {"Text": "Moby-Dick - 1851 novel", "FirstURL": "https://duckduckgo.com/Moby-Dick"},
                    {"Name": "Works", "Topics": [
                        {"Text": "Bartleby, the Scrivener", "FirstURL": "https://duckduckgo.com/Bartleby"}
                    ]}
                ]
            }"#,
        );

        let text = render("melville", &answer, 5);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Herman Melville: American novelist. (https://en.wikipedia.org/wiki/Herman_Melville)"
        );
        assert_eq!(lines[1], "Moby-Dick - 1851 novel (https://duckduckgo.com/Moby-Dick)");
        assert_eq!(lines[2], "Bartleby, the Scrivener (https://duckduckgo.com/Bartleby)");
    }

    #[test]
    fn test_render_answer_first_and_truncated() {
        let answer = parse(
            r#"{
                "Answer": "42",
                "AbstractText": "An abstract.",
                "RelatedTopics": [{"Text": "one", "FirstURL": ""}, {"Text": "two", "FirstURL": ""}]
            }"#,
        );

        let text = render("q", &answer, 2);
        assert_eq!(text, "42\nAn abstract.");
    }

    #[test]
    fn test_render_empty() {
        let answer = parse(r#"{"AbstractText": "", "RelatedTopics": []}"#);
        assert_eq!(render("zzzz", &answer, 5), "No results found for 'zzzz'.");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let search = DuckDuckGo::new(&WebSearchConfig::default()).unwrap();
        let err = search.search_web("   ").await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }
}
