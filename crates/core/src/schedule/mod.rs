//! Daily guest world rotation scraped from a public calendar page.

/// Page retrieval.
pub mod fetch;
/// Page flattening into text lines.
pub mod lines;
/// Day lookup and world extraction.
pub mod resolver;

pub use fetch::{Fetcher, HttpFetcher};
pub use lines::{HtmlLines, LineExtractor};
pub use resolver::{current_day_token, day_token, Rotation, ScheduleResolver, ROTATION_WINDOW};
