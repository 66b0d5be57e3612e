//! Request parameters, job descriptors and the request URL builder.

use crate::credential::Credential;
use crate::error::JobError;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Lighthouse category to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Accessibility audits
    Accessibility,
    /// Best-practices audits
    BestPractices,
    /// Performance audits
    Performance,
    /// Search engine optimization audits
    Seo,
}

impl Category {
    /// All categories the API accepts.
    pub const ALL: [Category; 4] = [
        Self::Accessibility,
        Self::BestPractices,
        Self::Performance,
        Self::Seo,
    ];

    /// Value sent in the `category` query parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accessibility => "ACCESSIBILITY",
            Self::BestPractices => "BEST_PRACTICES",
            Self::Performance => "PERFORMANCE",
            Self::Seo => "SEO",
        }
    }

    /// Key of the category in a Lighthouse result.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Accessibility => "accessibility",
            Self::BestPractices => "best-practices",
            Self::Performance => "performance",
            Self::Seo => "seo",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s) || c.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Device the analysis emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Desktop browser
    Desktop,
    /// Mobile device
    Mobile,
}

impl Strategy {
    /// Value sent in the `strategy` query parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            _ => Err(format!("unknown strategy '{s}'")),
        }
    }
}

/// A single query parameter of a `runPagespeed` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// `category`
    Category(Category),
    /// `strategy`
    Strategy(Strategy),
    /// `locale`
    Locale(String),
    /// `utm_campaign`
    UtmCampaign(String),
    /// `utm_source`
    UtmSource(String),
    /// `captchaToken`
    CaptchaToken(String),
    /// Any other key/value pair, sent verbatim
    Custom {
        /// Query key
        key: String,
        /// Query value
        value: String,
    },
}

impl Param {
    /// One `category` parameter per Lighthouse category.
    #[must_use]
    pub fn all_categories() -> Vec<Param> {
        Category::ALL.into_iter().map(Param::Category).collect()
    }

    /// Build a custom parameter.
    #[must_use]
    pub fn custom(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Custom {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Query key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Category(_) => "category",
            Self::Strategy(_) => "strategy",
            Self::Locale(_) => "locale",
            Self::UtmCampaign(_) => "utm_campaign",
            Self::UtmSource(_) => "utm_source",
            Self::CaptchaToken(_) => "captchaToken",
            Self::Custom { key, .. } => key,
        }
    }

    /// Query value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Category(category) => category.as_str(),
            Self::Strategy(strategy) => strategy.as_str(),
            Self::Locale(v)
            | Self::UtmCampaign(v)
            | Self::UtmSource(v)
            | Self::CaptchaToken(v)
            | Self::Custom { value: v, .. } => v,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key(), self.value())
    }
}

/// One page to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// The page URL; also identifies the job's result
    pub url: String,
    /// Parameters sent after the runner's defaults
    pub params: Vec<Param>,
}

impl Job {
    /// Job for `url` with no extra parameters.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Add several parameters.
    #[must_use]
    pub fn with_params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }
}

impl From<&str> for Job {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Job {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// Build the complete request URL for analyzing `page_url`.
///
/// The query carries `url`, then `key` when the credential issues a
/// non-empty token, then `params` in order.
///
/// # Errors
/// Returns [`JobError::RequestUrl`] for an invalid endpoint and
/// [`JobError::Credential`] if the credential fails.
pub fn build_request_url(
    endpoint: &str,
    page_url: &str,
    credential: Option<&dyn Credential>,
    params: &[Param],
) -> Result<Url, JobError> {
    let mut url = Url::parse(endpoint)?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("url", page_url);

        if let Some(credential) = credential {
            let key = credential.token()?;
            if !key.is_empty() {
                query.append_pair("key", &key);
            }
        }

        for param in params {
            query.append_pair(param.key(), param.value());
        }
    }

    Ok(url)
}
