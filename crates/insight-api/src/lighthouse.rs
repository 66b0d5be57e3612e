//! Lighthouse result model returned by a successful analysis.

use crate::error::RunWarning;
use crate::request::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Result of a single audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Audit {
    /// Audit id, e.g. `first-contentful-paint`
    pub id: String,
    /// Short title
    pub title: String,
    /// Longer description
    pub description: String,
    /// Score between 0 and 1; absent for informative audits
    pub score: Option<f32>,
    /// How the score should be displayed, e.g. `numeric`, `binary`
    pub score_display_mode: Option<String>,
    /// Formatted value, e.g. `1.2 s`
    pub display_value: Option<String>,
}

/// Reference from a category to one of its audits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditRef {
    /// Audit id
    pub id: String,
    /// Weight of the audit in the category score
    pub weight: f32,
    /// Group the audit belongs to
    pub group: Option<String>,
}

/// Result of a Lighthouse category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryResult {
    /// Category id, e.g. `performance`
    pub id: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Score between 0 and 1
    pub score: Option<f32>,
    /// Description of the manual checks
    pub manual_description: Option<String>,
    /// Audits making up the category
    pub audit_refs: Vec<AuditRef>,
}

/// Display group of audits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryGroup {
    /// Title
    pub title: String,
    /// Description
    pub description: String,
}

/// Which score [`LighthouseResult::score`] computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSelector {
    /// The score of one category
    Category(Category),
    /// Mean of the available category scores
    Average,
    /// Sum of the available category scores
    Total,
}

/// A successful Lighthouse run.
#[derive(Debug, Clone, PartialEq)]
pub struct LighthouseResult {
    pub(crate) requested_url: Url,
    pub(crate) final_url: Url,
    pub(crate) fetch_time: DateTime<Utc>,
    pub(crate) run_warnings: Vec<RunWarning>,
    pub(crate) audits: HashMap<String, Audit>,
    pub(crate) categories: HashMap<String, CategoryResult>,
    pub(crate) category_groups: HashMap<String, CategoryGroup>,
    pub(crate) timing: Duration,
}

impl LighthouseResult {
    /// The URL that was requested.
    #[must_use]
    pub fn requested_url(&self) -> &Url {
        &self.requested_url
    }

    /// The URL that was audited after redirects.
    #[must_use]
    pub fn final_url(&self) -> &Url {
        &self.final_url
    }

    /// When the page was fetched.
    #[must_use]
    pub fn fetch_time(&self) -> DateTime<Utc> {
        self.fetch_time
    }

    /// Non-fatal warnings reported by Lighthouse.
    #[must_use]
    pub fn run_warnings(&self) -> &[RunWarning] {
        &self.run_warnings
    }

    /// Audit by id.
    #[must_use]
    pub fn audit(&self, id: &str) -> Option<&Audit> {
        self.audits.get(id)
    }

    /// Ids of the available audits, sorted.
    #[must_use]
    pub fn audits(&self) -> Vec<&str> {
        sorted_keys(&self.audits)
    }

    /// Category by id, e.g. `performance` or `best-practices`.
    #[must_use]
    pub fn category(&self, id: &str) -> Option<&CategoryResult> {
        self.categories.get(id)
    }

    /// Ids of the available categories, sorted.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        sorted_keys(&self.categories)
    }

    /// Category group by id.
    #[must_use]
    pub fn category_group(&self, id: &str) -> Option<&CategoryGroup> {
        self.category_groups.get(id)
    }

    /// Ids of the available category groups, sorted.
    #[must_use]
    pub fn category_groups(&self) -> Vec<&str> {
        sorted_keys(&self.category_groups)
    }

    /// Total duration of the Lighthouse run.
    #[must_use]
    pub fn timing(&self) -> Duration {
        self.timing
    }

    /// Score as a truncated percentage.
    ///
    /// Returns `None` when the requested category was not part of the run.
    /// Categories without a score count as 0 in `Average` and `Total`; both
    /// are 0 when no category ran.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn score(&self, selector: ScoreSelector) -> Option<u32> {
        let percent = |score: f32| (score * 100.0) as u32;

        match selector {
            ScoreSelector::Category(category) => self
                .categories
                .get(category.id())
                .map(|c| percent(c.score.unwrap_or_default())),
            ScoreSelector::Average => {
                if self.categories.is_empty() {
                    return Some(0);
                }
                let count = u32::try_from(self.categories.len()).unwrap_or(u32::MAX);
                Some(percent(self.score_sum()) / count)
            }
            ScoreSelector::Total => Some(percent(self.score_sum())),
        }
    }

    fn score_sum(&self) -> f32 {
        self.categories
            .values()
            .map(|c| c.score.unwrap_or_default())
            .sum()
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}
