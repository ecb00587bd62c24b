use crate::series::LocationId;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ArtifactsUnavailable,
    InvalidRequest,
    TimestampNotFound,
    UnknownLocation,
    NoData,
    InternalError,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Ko,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub locations: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_locations: Vec<LocationId>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HorizonSuccessResponse {
    pub start: String,
    pub end: String,
    pub steps: usize,
    pub cadence_minutes: i64,
    pub dates: Vec<String>,
    pub times: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SeriesPoint {
    pub timestamp: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LotForecast {
    pub location_id: LocationId,
    pub availability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    pub forecast: Vec<SeriesPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LotFailure {
    pub location_id: LocationId,
    pub error_message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ForecastSuccessResponse {
    pub target: String,
    pub steps: usize,
    pub lots: Vec<LotForecast>,
    pub failures: Vec<LotFailure>,
    pub timestamp: String,
}

/// What the values of a trend series measure.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum TrendUnit {
    OccupancyPercent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TrendSuccessResponse {
    pub location_id: LocationId,
    pub target: String,
    pub unit: TrendUnit,
    pub historical: Vec<SeriesPoint>,
    pub forecast: Vec<SeriesPoint>,
    pub timestamp: String,
}
