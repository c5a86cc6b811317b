//! Episode selection expressions.
//!
//! A selection is a comma-separated list of terms evaluated against the
//! number of episodes an anime currently has:
//!
//! | Term        | Meaning                                   |
//! |-------------|-------------------------------------------|
//! | `7`         | episode 7                                 |
//! | `7-9`       | episodes 7, 8 and 9                       |
//! | `latest`    | the last episode                          |
//! | `55-latest` | episode 55 up to the last one             |
//! | `latest-5`  | the last 5 episodes                       |
//!
//! The result of [`Selection::select`] is always ascending, free of
//! duplicates and clipped to `1..=episode_count`.
//!
//! # Example
//!
//! ```
//! use anime_downloader_core::selection::Selection;
//!
//! let selection: Selection = "1,2,7-9".parse().unwrap();
//! assert_eq!(selection.select(20), vec![1, 2, 7, 8, 9]);
//! ```

mod error;

pub use error::SelectionError;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

const LATEST_TOKEN: &str = "latest";

/// A single term of a selection expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeTerm {
    /// Exactly one episode.
    Single(u32),
    /// Episodes `lo..=hi`.
    Bounded(u32, u32),
    /// Relative to the last episode.
    ///
    /// Negative values select the last `|k|` episodes, positive values select
    /// everything from episode `k` to the end, and zero selects only the last
    /// episode.
    Latest(i64),
    /// Every episode.
    All,
}

impl RangeTerm {
    /// Returns the inclusive `(first, last)` bounds this term covers for the
    /// given episode count, already clipped to `1..=episode_count`.
    ///
    /// `None` means the term selects nothing.
    fn bounds(self, episode_count: u32) -> Option<(u32, u32)> {
        let count = i64::from(episode_count);
        let (first, last) = match self {
            Self::Single(n) => (i64::from(n), i64::from(n)),
            Self::Bounded(lo, hi) => (i64::from(lo), i64::from(hi)),
            Self::Latest(k) if k < 0 => (count.saturating_add(k).saturating_add(1), count),
            Self::Latest(0) => (count, count),
            Self::Latest(k) => (k, count),
            Self::All => (1, count),
        };

        let first = first.max(1);
        let last = last.min(count);
        if first > last {
            return None;
        }

        // Both values are within 1..=episode_count here.
        Some((
            u32::try_from(first).ok()?,
            u32::try_from(last).ok()?,
        ))
    }

    fn parse(token: &str) -> Result<Self, SelectionError> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(SelectionError::invalid_term(token, "empty term"));
        }

        let Some((low, high)) = trimmed.split_once('-') else {
            if trimmed.eq_ignore_ascii_case(LATEST_TOKEN) {
                return Ok(Self::Latest(0));
            }
            return parse_episode(token, trimmed).map(Self::Single);
        };

        let (low, high) = (low.trim(), high.trim());
        if high.contains('-') {
            return Err(SelectionError::invalid_term(
                token,
                "a range has exactly one '-'",
            ));
        }

        if low.eq_ignore_ascii_case(LATEST_TOKEN) {
            if high.eq_ignore_ascii_case(LATEST_TOKEN) {
                return Err(SelectionError::invalid_term(
                    token,
                    "'latest' may appear on only one side of a range",
                ));
            }
            let count = parse_count(token, high)?;
            return Ok(Self::Latest(-i64::from(count)));
        }

        if high.eq_ignore_ascii_case(LATEST_TOKEN) {
            let first = parse_episode(token, low)?;
            return Ok(Self::Latest(i64::from(first)));
        }

        let lo = parse_episode(token, low)?;
        let hi = parse_episode(token, high)?;
        if lo > hi {
            return Err(SelectionError::invalid_term(
                token,
                &format!("range start {lo} is after range end {hi}"),
            ));
        }
        Ok(Self::Bounded(lo, hi))
    }
}

impl fmt::Display for RangeTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Bounded(lo, hi) => write!(f, "{lo}-{hi}"),
            Self::Latest(0) => f.write_str(LATEST_TOKEN),
            Self::Latest(k) if k < 0 => write!(f, "{LATEST_TOKEN}-{}", k.unsigned_abs()),
            Self::Latest(k) => write!(f, "{k}-{LATEST_TOKEN}"),
            Self::All => write!(f, "1-{LATEST_TOKEN}"),
        }
    }
}

/// Episode numbers are 1-based.
fn parse_episode(token: &str, value: &str) -> Result<u32, SelectionError> {
    let number = parse_count(token, value)?;
    if number == 0 {
        return Err(SelectionError::invalid_term(
            token,
            "episode numbers start at 1",
        ));
    }
    Ok(number)
}

fn parse_count(token: &str, value: &str) -> Result<u32, SelectionError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SelectionError::invalid_term(
            token,
            &format!("'{value}' is not an episode number"),
        ));
    }
    value.parse::<u32>().map_err(|_| {
        SelectionError::invalid_term(token, &format!("'{value}' is out of range"))
    })
}

/// A parsed selection expression: the union of its terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    terms: Vec<RangeTerm>,
}

impl Selection {
    /// Selection of every episode, used when none was given.
    #[must_use]
    pub fn all() -> Self {
        Self {
            terms: vec![RangeTerm::All],
        }
    }

    /// Builds a selection directly from terms.
    #[must_use]
    pub fn from_terms(terms: Vec<RangeTerm>) -> Self {
        Self { terms }
    }

    /// Parses the textual selection syntax (`"1,2,7-9,11-22"`, `"latest"`,
    /// `"55-latest"`, `"latest-5"`).
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError`] naming the first malformed term.
    pub fn parse(expression: &str) -> Result<Self, SelectionError> {
        if expression.trim().is_empty() {
            return Err(SelectionError::Empty);
        }
        let terms = expression
            .split(',')
            .map(RangeTerm::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }

    /// Returns the terms in the order they were written.
    #[must_use]
    pub fn terms(&self) -> &[RangeTerm] {
        &self.terms
    }

    /// Expands the selection into concrete episode numbers.
    ///
    /// The result is strictly ascending and every value lies within
    /// `1..=episode_count`; an episode count of zero always yields an empty
    /// list.
    #[must_use]
    pub fn select(&self, episode_count: u32) -> Vec<u32> {
        let mut episodes = BTreeSet::new();
        for term in &self.terms {
            if let Some((first, last)) = term.bounds(episode_count) {
                episodes.extend(first..=last);
            }
        }
        episodes.into_iter().collect()
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for Selection {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, term) in self.terms.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn select(expression: &str, count: u32) -> Vec<u32> {
        Selection::parse(expression).unwrap().select(count)
    }

    #[test]
    fn test_select_latest_is_last_episode() {
        assert_eq!(select("latest", 10), vec![10]);
    }

    #[test]
    fn test_select_latest_minus_k_is_last_k_episodes() {
        assert_eq!(select("latest-3", 10), vec![8, 9, 10]);
    }

    #[test]
    fn test_select_k_to_latest() {
        assert_eq!(select("5-latest", 10), vec![5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_select_mixed_terms() {
        assert_eq!(select("1,2,7-9", 20), vec![1, 2, 7, 8, 9]);
    }

    #[test]
    fn test_select_merges_overlapping_terms_sorted() {
        assert_eq!(select("9,3-5,4,latest-2,1", 10), vec![1, 3, 4, 5, 9, 10]);
    }

    #[test]
    fn test_select_bounded_is_inclusive() {
        assert_eq!(select("11-13", 20), vec![11, 12, 13]);
        assert_eq!(select("4-4", 20), vec![4]);
    }

    #[test]
    fn test_select_latest_minus_k_never_below_one() {
        assert_eq!(select("latest-50", 3), vec![1, 2, 3]);
    }

    #[test]
    fn test_select_clips_to_episode_count() {
        assert_eq!(select("8-15", 10), vec![8, 9, 10]);
        assert_eq!(select("12", 10), Vec::<u32>::new());
        assert_eq!(select("12-latest", 10), Vec::<u32>::new());
    }

    #[test]
    fn test_select_zero_episodes_is_empty() {
        assert!(select("latest", 0).is_empty());
        assert!(select("latest-5", 0).is_empty());
        assert!(Selection::all().select(0).is_empty());
    }

    #[test]
    fn test_select_all() {
        assert_eq!(Selection::all().select(4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_select_is_deterministic() {
        let selection = Selection::parse("latest-4,2").unwrap();
        assert_eq!(selection.select(12), selection.select(12));
    }

    #[test]
    fn test_select_invariants_hold_for_many_counts() {
        let expressions = ["1,2,7-9,11-22", "latest", "55-latest", "latest-5", "3,3,3", "1-100"];
        for expression in expressions {
            let selection = Selection::parse(expression).unwrap();
            for count in 0..60 {
                let episodes = selection.select(count);
                assert!(episodes.windows(2).all(|w| w[0] < w[1]), "{expression} @ {count}");
                assert!(episodes.iter().all(|e| (1..=count).contains(e)), "{expression} @ {count}");
            }
        }
    }

    #[test]
    fn test_parse_terms() {
        let selection = Selection::parse("1, 7-9,latest,55-latest,latest-5").unwrap();
        assert_eq!(
            selection.terms(),
            &[
                RangeTerm::Single(1),
                RangeTerm::Bounded(7, 9),
                RangeTerm::Latest(0),
                RangeTerm::Latest(55),
                RangeTerm::Latest(-5),
            ]
        );
    }

    #[test]
    fn test_parse_error_names_offending_token() {
        let err = Selection::parse("1,abc,3").unwrap_err();
        assert!(matches!(err, SelectionError::InvalidTerm { ref token, .. } if token == "abc"));
    }

    #[test]
    fn test_parse_rejects_malformed_ranges() {
        for bad in ["1-2-3", "-5", "5-", "latest-latest", "9-3", "0", "1,,2", "x-latest"] {
            assert!(Selection::parse(bad).is_err(), "expected '{bad}' to be rejected");
        }
    }

    #[test]
    fn test_parse_rejects_empty_expression() {
        assert_eq!(Selection::parse("  "), Err(SelectionError::Empty));
    }

    #[test]
    fn test_display_round_trips() {
        let text = "1,7-9,latest,55-latest,latest-5";
        let selection = Selection::parse(text).unwrap();
        assert_eq!(selection.to_string(), text);
        assert_eq!(Selection::parse(&selection.to_string()).unwrap(), selection);
    }
}
