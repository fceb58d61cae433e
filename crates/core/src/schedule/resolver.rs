use chrono::{Datelike, Local};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{error::ScheduleError, models::WorldVocabulary};

use super::{fetch::Fetcher, lines::LineExtractor};

/// Lines inspected from the day cell onwards: the day number followed by the
/// guest world labels rendered directly after it.
///
/// This is tied to the current page layout; a window near the end of a
/// calendar row can reach into the next day's cell.
pub const ROTATION_WINDOW: usize = 4;

/// Guest worlds found for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rotation {
    /// Day-of-month token that was searched for.
    pub day: String,
    /// Canonical world names in order of first appearance.
    pub worlds: Vec<String>,
}

/// Day-of-month without leading zeros, as printed in the calendar grid.
pub fn day_token(date: impl Datelike) -> String {
    date.day().to_string()
}

/// Day token for the local current date.
pub fn current_day_token() -> String {
    day_token(Local::now())
}

/// Resolves today's guest worlds from the schedule page.
pub struct ScheduleResolver {
    url: String,
    fetcher: Box<dyn Fetcher>,
    extractor: Box<dyn LineExtractor>,
    matcher: WorldMatcher,
}

impl ScheduleResolver {
    /// Build a resolver for `url` recognising the worlds in `vocabulary`.
    pub fn new(
        url: impl Into<String>,
        fetcher: Box<dyn Fetcher>,
        extractor: Box<dyn LineExtractor>,
        vocabulary: &WorldVocabulary,
    ) -> Self {
        Self {
            url: url.into(),
            fetcher,
            extractor,
            matcher: WorldMatcher::new(vocabulary),
        }
    }

    /// Schedule page URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download the raw schedule page.
    pub fn fetch(&self) -> Result<String, ScheduleError> {
        self.fetcher.fetch(&self.url).map_err(|err| {
            warn!(url = %self.url, %err, "Schedule fetch failed");
            err
        })
    }

    /// Flatten a raw page into reading-order lines.
    pub fn normalize(&self, raw: &str) -> Vec<String> {
        self.extractor.lines(raw)
    }

    /// Worlds listed for today within `lines`; empty when today is not found.
    pub fn resolve_rotation(&self, lines: &[String]) -> Vec<String> {
        self.resolve_rotation_for(lines, &current_day_token())
    }

    /// Worlds listed for the day `token` within `lines`; empty when the day is not found.
    pub fn resolve_rotation_for(&self, lines: &[String], token: &str) -> Vec<String> {
        self.try_resolve(lines, token).unwrap_or_default()
    }

    /// Like [`resolve_rotation_for`](Self::resolve_rotation_for), but reports a missing day.
    pub fn try_resolve(&self, lines: &[String], token: &str) -> Result<Vec<String>, ScheduleError> {
        let Some(start) = find_day(lines, token) else {
            warn!(token, lines = lines.len(), "Day not found in schedule text");
            return Err(ScheduleError::PatternMiss {
                token: token.to_string(),
            });
        };

        let end = (start + ROTATION_WINDOW).min(lines.len());
        let window = &lines[start..end];
        let mut worlds: Vec<String> = Vec::new();
        for line in window {
            for name in self.matcher.names_in(line) {
                if !worlds.iter().any(|seen| seen == name) {
                    worlds.push(name.to_string());
                }
            }
        }
        debug!(token, line = start, ?worlds, "Resolved rotation");
        Ok(worlds)
    }

    /// Fetch, normalise and resolve the rotation for `token`.
    pub fn resolve_for_day(&self, token: &str) -> Result<Rotation, ScheduleError> {
        let raw = self.fetch()?;
        let lines = self.normalize(&raw);
        let worlds = self.try_resolve(&lines, token)?;
        Ok(Rotation {
            day: token.to_string(),
            worlds,
        })
    }

    /// Fetch, normalise and resolve the rotation for the local current date.
    pub fn resolve_today(&self) -> Result<Rotation, ScheduleError> {
        self.resolve_for_day(&current_day_token())
    }
}

/// Index of the first line that is exactly `token`, ignoring surrounding
/// whitespace and leading zeros.
pub fn find_day(lines: &[String], token: &str) -> Option<usize> {
    let token = token.trim().trim_start_matches('0');
    if token.is_empty() {
        return None;
    }
    lines
        .iter()
        .position(|line| line.trim().trim_start_matches('0') == token)
}

/// Whole-word, case-insensitive matcher for vocabulary names.
struct WorldMatcher {
    patterns: Vec<(String, Regex)>,
}

impl WorldMatcher {
    fn new(vocabulary: &WorldVocabulary) -> Self {
        let patterns = vocabulary
            .iter()
            .filter_map(|world| {
                let words: Vec<String> = world
                    .name
                    .split_whitespace()
                    .map(regex::escape)
                    .collect();
                let pattern = format!(r"(?i)\b{}\b", words.join(r"\s+"));
                match Regex::new(&pattern) {
                    Ok(regex) => Some((world.name.clone(), regex)),
                    Err(err) => {
                        warn!(world = %world.name, %err, "Skipping world with unusable name");
                        None
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    /// Names found in `line`, ordered by where they occur.
    fn names_in<'a>(&'a self, line: &str) -> Vec<&'a str> {
        let mut hits: Vec<(usize, &str)> = self
            .patterns
            .iter()
            .filter_map(|(name, regex)| regex.find(line).map(|m| (m.start(), name.as_str())))
            .collect();
        hits.sort_by_key(|(position, _)| *position);
        hits.into_iter().map(|(_, name)| name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::HtmlLines;
    use chrono::NaiveDate;

    struct StaticPage(Option<&'static str>);

    impl Fetcher for StaticPage {
        fn fetch(&self, url: &str) -> Result<String, ScheduleError> {
            self.0.map(str::to_string).ok_or_else(|| ScheduleError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    fn resolver(page: Option<&'static str>) -> ScheduleResolver {
        ScheduleResolver::new(
            "https://schedule.test/",
            Box::new(StaticPage(page)),
            Box::new(HtmlLines),
            &WorldVocabulary::default(),
        )
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn collects_distinct_worlds_in_window() {
        let lines = lines(&[
            "October",
            "7",
            "Watopia",
            "8",
            "Innsbruck",
            "Innsbruck",
            "New York",
            "New York",
            "9",
            "London",
        ]);
        assert_eq!(
            resolver(None).resolve_rotation_for(&lines, "8"),
            vec!["Innsbruck", "New York"]
        );
    }

    #[test]
    fn window_is_limited_to_four_lines() {
        let lines = lines(&["8", "Paris", "France", "Paris", "London"]);
        assert_eq!(
            resolver(None).resolve_rotation_for(&lines, "8"),
            vec!["Paris", "France"]
        );
    }

    #[test]
    fn missing_day_yields_empty_rotation() {
        let lines = lines(&["18", "Innsbruck", "28", "London"]);
        let resolver = resolver(None);
        assert!(resolver.resolve_rotation_for(&lines, "8").is_empty());
        assert!(matches!(
            resolver.try_resolve(&lines, "8"),
            Err(ScheduleError::PatternMiss { .. })
        ));
        assert!(resolver.resolve_rotation_for(&[], "8").is_empty());
    }

    #[test]
    fn day_match_ignores_padding_and_leading_zeros() {
        let lines = lines(&[" 08 ", "Makuri Islands"]);
        assert_eq!(find_day(&lines, "8"), Some(0));
        assert_eq!(find_day(&lines, "08"), Some(0));
        assert_eq!(find_day(&lines, "0"), None);
    }

    #[test]
    fn names_match_whole_words_only() {
        let lines = lines(&[
            "3",
            "Parisian cafe in londonderry",
            "new   york and richmond",
            "Scotland",
        ]);
        assert_eq!(
            resolver(None).resolve_rotation_for(&lines, "3"),
            vec!["New York", "Richmond", "Scotland"]
        );
    }

    #[test]
    fn day_token_has_no_leading_zero() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 8).expect("valid date");
        assert_eq!(day_token(date), "8");
        let date = NaiveDate::from_ymd_opt(2024, 3, 28).expect("valid date");
        assert_eq!(day_token(date), "28");
    }

    #[test]
    fn resolves_from_fetched_page() -> Result<(), ScheduleError> {
        let page = r#"<table><tr>
<td><span class="day">7</span><a>Watopia</a><a>London</a></td>
<td><span class="day">8</span><a>Innsbruck</a><a>New&nbsp;York</a></td>
</tr></table>"#;
        let rotation = resolver(Some(page)).resolve_for_day("8")?;
        assert_eq!(
            rotation,
            Rotation {
                day: "8".to_string(),
                worlds: vec!["Innsbruck".to_string(), "New York".to_string()],
            }
        );
        Ok(())
    }

    #[test]
    fn fetch_failure_is_reported() {
        let err = resolver(None).resolve_for_day("8").unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::FetchFailure);
    }
}
