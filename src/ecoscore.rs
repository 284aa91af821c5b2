use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

pub const ECO_SCORE_NOT_FOUND: &str = "Eco-Score not found";

static PRODUCT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""url":"https://world\.openfoodfacts\.org/product/[^\s">]+""#).expect("valid regex")
});

static GREEN_SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bGreen-Score\b(?:\s+[A-F][+-]?)").expect("valid regex"));

const OPEN_FOOD_FACTS: &str = "https://world.openfoodfacts.org";

/// Search results come back ranked by scans; this picks the fifth one.
const PRODUCT_RANK: usize = 5;

#[derive(Debug, Clone)]
pub struct EcoScoreClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl EcoScoreClient {
    pub fn new(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Returns a label such as `"Green-Score B"`, or [`ECO_SCORE_NOT_FOUND`].
    pub async fn lookup(&self, product_name: &str) -> String {
        match self.try_lookup(product_name).await {
            Ok(Some(score)) => score,
            Ok(None) => ECO_SCORE_NOT_FOUND.to_string(),
            Err(e) => {
                tracing::error!(product_name, "Eco-score lookup failed: {:#}", e);
                ECO_SCORE_NOT_FOUND.to_string()
            }
        }
    }

    async fn try_lookup(&self, product_name: &str) -> Result<Option<String>> {
        // The second '?' is how the deployed search URL has always been sent.
        let search_url = format!(
            "{}/cgi/search.pl?action=process&search_terms={}&sort_by=unique_scans_n&page_size=50?sort_by=environmental_score_score",
            self.base_url, product_name
        );
        let listing = self.get_text(&search_url).await?;

        let Some(product_url) = pick_product_url(&listing) else {
            tracing::info!(product_name, "No Open Food Facts products matched");
            return Ok(None);
        };
        tracing::info!(product_name, %product_url, "Fetching product page");

        let page = self.get_text(&self.on_configured_host(&product_url)).await?;
        Ok(extract_green_score(&page))
    }

    fn on_configured_host(&self, product_url: &str) -> String {
        match product_url.strip_prefix(OPEN_FOOD_FACTS) {
            Some(path) => format!("{}{}", self.base_url, path),
            None => product_url.to_string(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context(format!("Failed to request {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Open Food Facts error ({}) for {}", status, url);
        }

        response
            .text()
            .await
            .context("Failed to read Open Food Facts response")
    }
}

/// The fifth product URL in the listing, or the last one when fewer match.
pub fn pick_product_url(listing: &str) -> Option<String> {
    let matched = PRODUCT_URL
        .find_iter(listing)
        .take(PRODUCT_RANK)
        .last()?
        .as_str();
    // Strip the leading `"url":"` and the closing quote.
    Some(matched[7..matched.len() - 1].to_string())
}

pub fn extract_green_score(page: &str) -> Option<String> {
    GREEN_SCORE.find(page).map(|m| m.as_str().to_string())
}

pub fn recommendations(eco_score: &str) -> &'static str {
    let grade = if eco_score == ECO_SCORE_NOT_FOUND {
        None
    } else {
        eco_score.split_whitespace().last()
    };

    match grade {
        Some("A") => "Great choice! This product has a top Eco-Score. Consider recommending it to others!",
        Some("B") => "Good choice! To improve sustainability, look for alternatives with an 'A' Eco-Score.",
        Some("C") => "This product is average in sustainability. Explore options with a higher Eco-Score.",
        Some("D") => "Below average Eco-Score. Consider switching to more eco-friendly alternatives.",
        Some("E") => "Poor Eco-Score. It's highly recommended to find a more sustainable product.",
        _ => "Eco-Score not found. Unable to provide recommendations.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::get, Router};
    use std::collections::HashMap;
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn listing(n: usize) -> String {
        (1..=n)
            .map(|i| format!(r#"{{"url":"https://world.openfoodfacts.org/product/{i}/item-{i}"}}"#))
            .collect::<Vec<_>>()
            .join(",")
    }

    #[test]
    fn picks_fifth_product() {
        assert_eq!(
            pick_product_url(&listing(8)).as_deref(),
            Some("https://world.openfoodfacts.org/product/5/item-5")
        );
    }

    #[test]
    fn picks_last_product_when_fewer_than_five() {
        assert_eq!(
            pick_product_url(&listing(2)).as_deref(),
            Some("https://world.openfoodfacts.org/product/2/item-2")
        );
        assert_eq!(pick_product_url("no products"), None);
    }

    #[test]
    fn extracts_first_green_score() {
        let page = "<span>Green-Score C</span> ... Green-Score A+";
        assert_eq!(extract_green_score(page).as_deref(), Some("Green-Score C"));
        assert_eq!(extract_green_score("Green-Scoreless"), None);
    }

    #[test]
    fn maps_grades_to_recommendations() {
        assert!(recommendations("Green-Score A").starts_with("Great choice!"));
        assert!(recommendations("Green-Score E").starts_with("Poor Eco-Score."));
        assert_eq!(
            recommendations("Green-Score A+"),
            "Eco-Score not found. Unable to provide recommendations."
        );
        assert_eq!(
            recommendations(ECO_SCORE_NOT_FOUND),
            "Eco-Score not found. Unable to provide recommendations."
        );
    }

    #[tokio::test]
    async fn looks_up_score_through_product_page() {
        let app = Router::new()
            .route(
                "/cgi/search.pl",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert_eq!(q.get("search_terms").map(String::as_str), Some("oats"));
                    listing(6)
                }),
            )
            .route("/product/5/item-5", get(|| async { "<div>Green-Score B</div>" }));
        let addr = serve(app).await;

        let client = EcoScoreClient::new(
            reqwest::Client::new(),
            &format!("http://{addr}/"),
            Duration::from_secs(5),
        );
        let score = client.lookup("oats").await;
        assert_eq!(score, "Green-Score B");
        assert!(recommendations(&score).starts_with("Good choice!"));
    }

    #[tokio::test]
    async fn product_page_without_score_reports_not_found() {
        let app = Router::new()
            .route("/cgi/search.pl", get(|| async { listing(1) }))
            .route("/product/1/item-1", get(|| async { "<div>no grade yet</div>" }));
        let addr = serve(app).await;

        let client = EcoScoreClient::new(
            reqwest::Client::new(),
            &format!("http://{addr}"),
            Duration::from_secs(5),
        );
        assert_eq!(client.lookup("oats").await, ECO_SCORE_NOT_FOUND);
    }

    #[tokio::test]
    async fn unreachable_backend_reports_not_found() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = EcoScoreClient::new(
            reqwest::Client::new(),
            &format!("http://{addr}"),
            Duration::from_secs(1),
        );
        assert_eq!(client.lookup("oats").await, "Eco-Score not found");
    }

    #[tokio::test]
    async fn listing_without_products_reports_not_found() {
        let app = Router::new().route("/cgi/search.pl", get(|| async { "[]" }));
        let addr = serve(app).await;

        let client = EcoScoreClient::new(
            reqwest::Client::new(),
            &format!("http://{addr}"),
            Duration::from_secs(5),
        );
        assert_eq!(client.lookup("oats").await, ECO_SCORE_NOT_FOUND);
    }
}
