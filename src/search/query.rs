use regex::Regex;
use std::sync::LazyLock;

static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((.*?)\)").expect("valid regex"));

/// How a user's item text is turned into a search query.
///
/// Each rule reproduces one deployed query shape exactly, including the
/// places where words are glued together without a space. SearXNG results
/// (and therefore model output) depend on the literal query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum QueryRule {
    /// `"Chips (Lays)"` searches for `"Healthy Lays brands in India"`.
    ParenthesizedItem,
    /// Asks how to recycle the item, routed through Google, DuckDuckGo and Qwant.
    RecyclePrefix,
    /// `"Snacks - Chips"` searches for `"HealthyChipsbrands in India"`.
    HyphenSuffix,
}

impl QueryRule {
    pub fn apply(self, query: &str) -> String {
        match self {
            QueryRule::ParenthesizedItem => match PARENTHESIZED.captures(query) {
                Some(caps) => format!("Healthy {} brands in India", &caps[1]),
                None => query.to_string(),
            },
            QueryRule::RecyclePrefix => {
                let question = format!("How to recycle{}?", query);
                format!("!go !ddg !qw {}", question)
            }
            QueryRule::HyphenSuffix => {
                let suffix = query.rsplit('-').next().unwrap_or(query).trim();
                format!("Healthy{}brands in India", suffix)
            }
        }
    }
}
