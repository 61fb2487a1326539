//! Query parameter parsing for pagination.
//!
//! Parameters arrive as raw strings so that a non-numeric value produces the
//! same validation error body as an out-of-range one, instead of the
//! framework's plain-text query rejection.

use serde::{Deserialize, Serialize};

use super::offset::PageRequest;
use crate::config::PaginationSettings;
use crate::error::{Result, TrackError};

/// `?page=&limit=` as sent by the client.
///
/// - `page`: page number (1-indexed, default 1)
/// - `limit`: items per page (default and maximum come from configuration)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.map(|p| p.to_string()),
            limit: limit.map(|l| l.to_string()),
        }
    }

    /// Apply defaults and reject anything that is not a positive integer.
    pub fn into_request(&self, settings: &PaginationSettings) -> Result<PageRequest> {
        let page = parse_positive("page", self.page.as_deref())?.unwrap_or(1);
        let limit = parse_positive("limit", self.limit.as_deref())?
            .unwrap_or(settings.default_limit);

        if limit > settings.max_limit {
            return Err(TrackError::validation(format!(
                "limit must not exceed {}",
                settings.max_limit
            ))
            .with_context("limit", limit));
        }

        PageRequest::new(page, limit)
    }

    /// Whether the client asked for anything but the defaults.
    pub fn is_default(&self, settings: &PaginationSettings) -> bool {
        matches!(
            self.into_request(settings),
            Ok(req) if req.is_first() && req.limit() == settings.default_limit
        )
    }
}

fn parse_positive(field: &'static str, raw: Option<&str>) -> Result<Option<u32>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(value) if value >= 1 => Ok(Some(value)),
        _ => Err(TrackError::validation(format!("{} must be a positive integer", field))
            .with_context(field, raw)),
    }
}
