//! Spot submission validation.
//!
//! Runs before anything is persisted. Errors carry user-facing messages and
//! are surfaced to the submitter unchanged.

use crate::protocol::models::SpotSubmission;
use thiserror::Error;
use url::Url;

/// Why a submission was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    /// Title is blank.
    #[error("Spot title cannot be empty")]
    EmptyTitle,

    /// Title exceeds the configured limit.
    #[error("Spot title must be at most {max} characters")]
    TitleTooLong {
        /// Limit in characters.
        max: usize,
    },

    /// Unlock target is not an https URL on an accepted host.
    #[error("Tutorial link must be an https URL on {expected}")]
    InvalidUnlockTarget {
        /// Human-readable list of accepted hosts.
        expected: String,
    },

    /// Coordinates are not finite or out of range.
    #[error("Coordinates out of range: lat {lat}, lon {lon}")]
    CoordinatesOutOfRange {
        /// Submitted latitude.
        lat: f64,
        /// Submitted longitude.
        lon: f64,
    },
}

/// Hazard tags the Mini App offers.
pub const DEFAULT_DANGER_CHOICES: [&str; 6] = [
    "камеры",
    "охрана",
    "бабки",
    "замок на клетке",
    "собаки",
    "другое",
];

/// Tag recorded for a hazard outside the known list.
pub const DEFAULT_DANGER_FALLBACK: &str = "другое";

/// Known hazard tags and the catch-all for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DangerChoices {
    /// Accepted tags, compared after trimming.
    pub choices: Vec<String>,
    /// Stored in place of an unknown tag.
    pub fallback: String,
}

impl Default for DangerChoices {
    fn default() -> Self {
        Self {
            choices: DEFAULT_DANGER_CHOICES.iter().map(|c| c.to_string()).collect(),
            fallback: DEFAULT_DANGER_FALLBACK.to_string(),
        }
    }
}

impl DangerChoices {
    /// Blank means no hazard; a known tag is kept; anything else becomes
    /// the fallback.
    pub fn classify(&self, raw: Option<&str>) -> Option<String> {
        let tag = raw.map(str::trim).filter(|t| !t.is_empty())?;
        if self.choices.iter().any(|c| c == tag) {
            Some(tag.to_string())
        } else {
            Some(self.fallback.clone())
        }
    }
}

/// Limits applied to submissions.
#[derive(Debug, Clone)]
pub struct SubmissionRules {
    /// Maximum title length in characters.
    pub max_title_len: usize,
    /// Accepted unlock hosts; empty accepts any https host.
    pub unlock_hosts: Vec<String>,
    /// Hazard tag mapping.
    pub danger: DangerChoices,
}

/// A submission that passed validation, normalized for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    /// Trimmed title.
    pub title: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Normalized https URL.
    pub unlock_target: String,
    /// Hazard tag, mapped onto the known list.
    pub danger: Option<String>,
}

impl SubmissionRules {
    /// Validate and normalize a submission.
    pub fn validate(&self, submission: &SpotSubmission) -> Result<ValidSubmission, SubmissionError> {
        let title = submission.title.trim();
        if title.is_empty() {
            return Err(SubmissionError::EmptyTitle);
        }
        if title.chars().count() > self.max_title_len {
            return Err(SubmissionError::TitleTooLong {
                max: self.max_title_len,
            });
        }

        check_coordinates(submission.lat, submission.lon)?;
        let unlock_target = self.normalize_unlock_target(&submission.unlock_target)?;

        Ok(ValidSubmission {
            title: title.to_string(),
            lat: submission.lat,
            lon: submission.lon,
            unlock_target,
            danger: self.danger.classify(submission.danger.as_deref()),
        })
    }

    fn invalid_target(&self) -> SubmissionError {
        let expected = if self.unlock_hosts.is_empty() {
            "any host".to_string()
        } else {
            self.unlock_hosts.join(", ")
        };
        SubmissionError::InvalidUnlockTarget { expected }
    }

    /// Trim, default the scheme to https, and check the host.
    pub fn normalize_unlock_target(&self, raw: &str) -> Result<String, SubmissionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(self.invalid_target());
        }
        let lower = raw.to_ascii_lowercase();
        let candidate = if lower.starts_with("https://") || lower.starts_with("http://") {
            raw.to_string()
        } else if has_foreign_scheme(raw) {
            return Err(self.invalid_target());
        } else {
            format!("https://{}", raw)
        };

        let url = Url::parse(&candidate).map_err(|_| self.invalid_target())?;
        if url.scheme() != "https" {
            return Err(self.invalid_target());
        }
        let host = url
            .host_str()
            .map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
            .ok_or_else(|| self.invalid_target())?;

        if !self.unlock_hosts.is_empty()
            && !self
                .unlock_hosts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&host))
        {
            return Err(self.invalid_target());
        }

        Ok(url.to_string())
    }
}

/// `ftp://...` and the like. A `://` later in the path or query does not count.
fn has_foreign_scheme(raw: &str) -> bool {
    raw.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Latitude in -90..=90, longitude in -180..=180, both finite.
pub fn check_coordinates(lat: f64, lon: f64) -> Result<(), SubmissionError> {
    let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
    let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(SubmissionError::CoordinatesOutOfRange { lat, lon })
    }
}
