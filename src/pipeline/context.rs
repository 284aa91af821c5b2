use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::search::SearchResult;

pub const NO_INFORMATION: &str = "No information found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextItem {
    pub title: String,
    pub text: String,
    /// True when the text is the raw search snippet rather than page content.
    pub is_snippet: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    pub nodes: Vec<String>,
    /// False when the nodes did not come from the page itself.
    pub extracted: bool,
}

/// Turns the document window into page content.
///
/// Returned pages pair with the documents positionally; documents past the
/// end of the returned list are treated as unusable.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_pages(&self, urls: &[String], snippets: &[String]) -> Vec<FetchedPage>;
}

/// Stands in for a page fetch by echoing each snippet back as its only node.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnippetEcho;

#[async_trait]
impl PageFetcher for SnippetEcho {
    async fn fetch_pages(&self, _urls: &[String], snippets: &[String]) -> Vec<FetchedPage> {
        snippets
            .iter()
            .map(|snippet| FetchedPage {
                nodes: vec![snippet.clone()],
                extracted: false,
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct ContextAssembler {
    fetcher: Arc<dyn PageFetcher>,
    top_k_documents: usize,
    top_k_snippets: Option<usize>,
    num_nodes_rerank: usize,
}

impl ContextAssembler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        top_k_documents: usize,
        top_k_snippets: Option<usize>,
        num_nodes_rerank: usize,
    ) -> Self {
        Self {
            fetcher,
            top_k_documents,
            top_k_snippets,
            num_nodes_rerank,
        }
    }

    pub async fn from_results(&self, query: &str, results: &[SearchResult]) -> Vec<ContextItem> {
        let urls: Vec<String> = results.iter().map(|r| r.url.clone()).collect();
        let titles: Vec<String> = results.iter().map(|r| r.title.clone()).collect();
        let snippets: Vec<String> = results.iter().map(|r| normalize_snippet(&r.content)).collect();

        self.assemble(query, &urls, &titles, &snippets).await
    }

    pub async fn assemble(
        &self,
        query: &str,
        urls: &[String],
        titles: &[String],
        snippets: &[String],
    ) -> Vec<ContextItem> {
        let window = self
            .top_k_documents
            .min(urls.len())
            .min(titles.len())
            .min(snippets.len());
        tracing::info!("Requesting top {} web pages", window);

        let fetch_start = Instant::now();
        let pages = self
            .fetcher
            .fetch_pages(&urls[..window], &snippets[..window])
            .await;
        tracing::info!(
            "Fetched {} web pages in {} ms",
            pages.len(),
            fetch_start.elapsed().as_millis()
        );

        let mut items = Vec::new();
        let mut successful_pages = 0;

        let documents = urls[..window]
            .iter()
            .zip(&titles[..window])
            .zip(&snippets[..window])
            .zip(pages);

        for (((url, title), snippet), page) in documents {
            if successful_pages >= self.top_k_documents {
                break;
            }
            tracing::debug!(url_id = %url_id(url), url = %url, nodes = page.nodes.len(), "context document");

            if page.nodes.is_empty() {
                items.push(ContextItem {
                    title: title.clone(),
                    text: snippet.clone(),
                    is_snippet: true,
                });
                continue;
            }

            successful_pages += 1;
            let nodes = self.rerank(query, page.nodes);
            let text = std::iter::once(snippet.as_str())
                .chain(nodes.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            items.push(ContextItem {
                title: title.clone(),
                text,
                is_snippet: !page.extracted,
            });
        }

        if let Some(quota) = self.top_k_snippets {
            let assembled = items.len();
            let end = quota.min(titles.len()).min(snippets.len());
            if assembled < end {
                items.extend(
                    titles[assembled..end]
                        .iter()
                        .zip(&snippets[assembled..end])
                        .map(|(title, snippet)| ContextItem {
                            title: title.clone(),
                            text: snippet.clone(),
                            is_snippet: true,
                        }),
                );
            }
        }

        items
    }

    // No scoring model is wired in; nodes keep page order.
    fn rerank(&self, _query: &str, mut nodes: Vec<String>) -> Vec<String> {
        nodes.truncate(self.num_nodes_rerank);
        nodes
    }
}

pub fn render(items: &[ContextItem]) -> String {
    if items.is_empty() {
        return NO_INFORMATION.to_string();
    }
    items
        .iter()
        .map(|item| format!("{} - {}", item.title, item.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `"Fresh chips ..."` becomes `"Fresh chips."`.
pub fn normalize_snippet(content: &str) -> String {
    format!("{}.", content.trim_matches(|c| c == ' ' || c == '.'))
}

fn url_id(url: &str) -> String {
    let id = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, url.as_bytes())
        .simple()
        .to_string();
    id[..8].to_string()
}
