pub mod query;
pub mod searxng;

pub use query::QueryRule;
pub use searxng::{SearchClient, SearchResult};
