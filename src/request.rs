//! Request parameters and their validation.
//!
//! Raw parameter sets (`*Params`) deserialize from the transport with every
//! field optional. `validate` turns them into typed queries; anything it
//! rejects is an [`ParamError`] and never reaches the planner.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::ExportFormat;
use crate::geo::{GeoLevel, GeometryMode};
use crate::planner::GroupExpansion;

/// Earliest snapshot year of the historized geo dimensions.
pub const MIN_SNAPSHOT_YEAR: i32 = 1850;

/// A rejected request parameter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing required parameter `{0}`")]
    Missing(&'static str),

    #[error("invalid parameter `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ParamError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ParamError::Invalid {
            name,
            reason: reason.into(),
        }
    }

    /// Name of the offending parameter.
    pub fn parameter(&self) -> &'static str {
        match self {
            ParamError::Missing(name) | ParamError::Invalid { name, .. } => name,
        }
    }
}

pub type ParamResult<T> = Result<T, ParamError>;

// =============================================================================
// Validated queries
// =============================================================================

/// `OFFSET` / `LIMIT`; zero counts as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl Page {
    pub fn new(offset: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            offset: offset.filter(|&n| n > 0),
            limit: limit.filter(|&n| n > 0),
        }
    }
}

/// Indicator export; a portrait when `indicator_id` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorQuery {
    pub indicator_id: Option<i64>,
    pub geo_level: GeoLevel,
    pub geo_value: Option<i64>,
    pub as_of: Option<NaiveDate>,
    pub period_ref: Option<NaiveDate>,
    pub join_indicator_meta: bool,
    pub join_geo_meta: bool,
    pub geometry_mode: GeometryMode,
    pub groups: GroupExpansion,
    pub page: Page,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatestValuesQuery {
    pub geo_level: GeoLevel,
    pub as_of: Option<NaiveDate>,
    pub page: Page,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotQuery {
    pub geo_level: GeoLevel,
    pub year: i32,
    pub geometry_mode: GeometryMode,
    pub page: Page,
}

/// Any exportable query.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportQuery {
    Indicator(IndicatorQuery),
    LatestValues(LatestValuesQuery),
    Snapshot(SnapshotQuery),
}

impl ExportQuery {
    pub fn geo_level(&self) -> GeoLevel {
        match self {
            ExportQuery::Indicator(q) => q.geo_level,
            ExportQuery::LatestValues(q) => q.geo_level,
            ExportQuery::Snapshot(q) => q.geo_level,
        }
    }

    pub fn page(&self) -> Page {
        match self {
            ExportQuery::Indicator(q) => q.page,
            ExportQuery::LatestValues(q) => q.page,
            ExportQuery::Snapshot(q) => q.page,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ExportQuery::Indicator(q) if q.indicator_id.is_none() => "portrait",
            ExportQuery::Indicator(_) => "indicator",
            ExportQuery::LatestValues(_) => "values",
            ExportQuery::Snapshot(_) => "snapshot",
        }
    }
}

/// A validated export: what to query and how to encode it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub query: ExportQuery,
    pub format: ExportFormat,
}

// =============================================================================
// Raw parameter sets
// =============================================================================

/// Indicator / portrait parameters as received from the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportParams {
    pub indicator_id: Option<String>,
    pub geo_code: Option<String>,
    pub geo_value: Option<String>,
    #[serde(alias = "knowledgeDate")]
    pub as_of_date: Option<String>,
    pub period_ref: Option<String>,
    #[serde(alias = "joinIndicator")]
    pub join_indicator_meta: bool,
    #[serde(alias = "joinGeo")]
    pub join_geo_meta: bool,
    pub geometry_mode: Option<String>,
    pub expand_all: bool,
    pub expand_group_1: bool,
    pub expand_group_2: bool,
    pub expand_group_3: bool,
    pub expand_group_4: bool,
    #[serde(alias = "skip")]
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub format: Option<String>,
}

impl ExportParams {
    pub fn validate(&self) -> ParamResult<ExportRequest> {
        let geo_level = parse_geo_level(self.geo_code.as_deref())?;
        let indicator_id = parse_positive("indicatorId", self.indicator_id.as_deref())?;
        let geo_value = parse_positive("geoValue", self.geo_value.as_deref())?;
        if indicator_id.is_none() && geo_value.is_none() {
            return Err(ParamError::invalid(
                "geoValue",
                "required when no indicatorId is given",
            ));
        }

        let groups = GroupExpansion {
            expand_all: self.expand_all,
            expand_group: [
                self.expand_group_1,
                self.expand_group_2,
                self.expand_group_3,
                self.expand_group_4,
            ],
        };

        let query = IndicatorQuery {
            indicator_id,
            geo_level,
            geo_value,
            as_of: parse_date("asOfDate", self.as_of_date.as_deref())?,
            period_ref: parse_date("periodRef", self.period_ref.as_deref())?,
            join_indicator_meta: self.join_indicator_meta,
            join_geo_meta: self.join_geo_meta,
            geometry_mode: parse_geometry_mode(self.geometry_mode.as_deref())?,
            groups,
            page: parse_page(self.offset.as_deref(), self.limit.as_deref())?,
        };

        Ok(ExportRequest {
            query: ExportQuery::Indicator(query),
            format: parse_format(self.format.as_deref())?,
        })
    }
}

/// Latest-value parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValuesParams {
    pub geo_code: Option<String>,
    #[serde(alias = "knowledgeDate")]
    pub as_of_date: Option<String>,
    #[serde(alias = "skip")]
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub format: Option<String>,
}

impl ValuesParams {
    pub fn validate(&self) -> ParamResult<ExportRequest> {
        let query = LatestValuesQuery {
            geo_level: parse_geo_level(self.geo_code.as_deref())?,
            as_of: parse_date("asOfDate", self.as_of_date.as_deref())?,
            page: parse_page(self.offset.as_deref(), self.limit.as_deref())?,
        };
        Ok(ExportRequest {
            query: ExportQuery::LatestValues(query),
            format: parse_format(self.format.as_deref())?,
        })
    }
}

/// Historized geo dimension parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotParams {
    pub geo_code: Option<String>,
    pub year: Option<String>,
    pub geometry_mode: Option<String>,
    #[serde(alias = "skip")]
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub format: Option<String>,
}

impl SnapshotParams {
    pub fn validate(&self) -> ParamResult<ExportRequest> {
        let query = SnapshotQuery {
            geo_level: parse_geo_level(self.geo_code.as_deref())?,
            year: parse_year(self.year.as_deref())?,
            geometry_mode: parse_geometry_mode(self.geometry_mode.as_deref())?,
            page: parse_page(self.offset.as_deref(), self.limit.as_deref())?,
        };
        Ok(ExportRequest {
            query: ExportQuery::Snapshot(query),
            format: parse_format(self.format.as_deref())?,
        })
    }
}

// =============================================================================
// Field parsers
// =============================================================================

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_geo_level(value: Option<&str>) -> ParamResult<GeoLevel> {
    present(value).ok_or(ParamError::Missing("geoCode"))?.parse()
}

fn parse_geometry_mode(value: Option<&str>) -> ParamResult<GeometryMode> {
    present(value).map_or(Ok(GeometryMode::default()), str::parse)
}

fn parse_format(value: Option<&str>) -> ParamResult<ExportFormat> {
    present(value).map_or(Ok(ExportFormat::default()), str::parse)
}

/// ISO `YYYY-MM-DD`.
pub fn parse_date(name: &'static str, value: Option<&str>) -> ParamResult<Option<NaiveDate>> {
    present(value)
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| ParamError::invalid(name, format!("`{v}` is not an ISO date (YYYY-MM-DD)")))
        })
        .transpose()
}

fn parse_positive(name: &'static str, value: Option<&str>) -> ParamResult<Option<i64>> {
    present(value)
        .map(|v| match v.parse::<i64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ParamError::invalid(name, format!("`{v}` is not a positive integer"))),
        })
        .transpose()
}

/// Offsets and limits end up as SQL integer literals, so they must fit an `i64`.
fn parse_count(name: &'static str, value: Option<&str>) -> ParamResult<Option<u64>> {
    present(value)
        .map(|v| match v.parse::<u64>() {
            Ok(n) if i64::try_from(n).is_ok() => Ok(n),
            Ok(_) => Err(ParamError::invalid(name, format!("`{v}` is larger than {}", i64::MAX))),
            Err(_) => Err(ParamError::invalid(name, format!("`{v}` is not a non-negative integer"))),
        })
        .transpose()
}

pub fn parse_page(offset: Option<&str>, limit: Option<&str>) -> ParamResult<Page> {
    Ok(Page::new(
        parse_count("offset", offset)?,
        parse_count("limit", limit)?,
    ))
}

fn parse_year(value: Option<&str>) -> ParamResult<i32> {
    let raw = present(value).ok_or(ParamError::Missing("year"))?;
    let current = Utc::now().year();
    match raw.parse::<i32>() {
        Ok(year) if (MIN_SNAPSHOT_YEAR..=current).contains(&year) => Ok(year),
        _ => Err(ParamError::invalid(
            "year",
            format!("`{raw}` is not a year between {MIN_SNAPSHOT_YEAR} and {current}"),
        )),
    }
}
