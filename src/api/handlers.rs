use crate::api::responses::{
    ErrorCode, ErrorResponse, ForecastSuccessResponse, HealthStatus, HealthSuccessResponse,
    HorizonSuccessResponse, LotFailure, LotForecast, SeriesPoint, TrendSuccessResponse, TrendUnit,
};
use crate::artifacts::ArtifactStore;
use crate::error::{AppError, ForecastError};
use crate::forecast::{ForecastRun, run_forecast};
use crate::series::{LocationId, Observation, format_timestamp as format_naive};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tokio::task::JoinError;
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const ARTIFACTS_UNAVAILABLE_MESSAGE: &str = "Forecast artifacts are not loaded";
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_OF_DAY_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum ApiResponse<T> {
    Success {
        status: StatusCode,
        body: T,
    },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub date: Option<String>,
    pub time: Option<String>,
}

pub async fn get_health(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_health_response(state, SystemTime::now())
}

pub async fn get_horizon(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_horizon_response(state, SystemTime::now())
}

pub async fn get_forecast(
    State(state): State<Arc<RwLock<AppState>>>,
    Query(query): Query<ForecastQuery>,
) -> impl IntoResponse {
    let now = SystemTime::now();
    let joined =
        tokio::task::spawn_blocking(move || build_forecast_response(state, query, now)).await;
    finish_forecast(joined)
}

fn finish_forecast(
    joined: Result<ApiResponse<ForecastSuccessResponse>, JoinError>,
) -> ApiResponse<ForecastSuccessResponse> {
    match joined {
        Ok(response) => response,
        Err(err) => internal_error("/api/forecast", &format!("forecast task failed: {err}")),
    }
}

pub async fn get_lot_trend(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(location_id): Path<String>,
) -> impl IntoResponse {
    build_trend_response(state, &location_id, SystemTime::now())
}

fn build_health_response(
    state: Arc<RwLock<AppState>>,
    now: SystemTime,
) -> ApiResponse<HealthSuccessResponse> {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return internal_error("/api/health", "state lock poisoned while reading artifacts");
        }
    };
    let locations = guard.store().map(|store| store.locations().len());
    let failed_locations: Vec<LocationId> = guard
        .latest()
        .map(|run| run.availability.failures.keys().copied().collect())
        .unwrap_or_default();
    drop(guard);

    let status = match locations {
        None => HealthStatus::Ko,
        Some(_) if !failed_locations.is_empty() => HealthStatus::Degraded,
        Some(_) => HealthStatus::Ok,
    };
    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    match format_wall_clock(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: status_code,
            body: HealthSuccessResponse {
                status,
                locations: locations.unwrap_or(0),
                failed_locations,
                timestamp,
            },
        },
        Err(_) => internal_error("/api/health", "timestamp formatting failure"),
    }
}

fn build_horizon_response(
    state: Arc<RwLock<AppState>>,
    now: SystemTime,
) -> ApiResponse<HorizonSuccessResponse> {
    let store = match read_store(&state) {
        Ok(store) => store,
        Err(err) => return internal_error("/api/horizon", &err.to_string()),
    };
    let Some(store) = store else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ArtifactsUnavailable,
            ARTIFACTS_UNAVAILABLE_MESSAGE,
            now,
        );
    };

    let index = store.index();
    let (Some(start), Some(end)) = (index.start(), index.end()) else {
        return internal_error("/api/horizon", "forecast index is empty");
    };
    let dates = index
        .dates()
        .into_iter()
        .map(|date| date.format(DATE_FORMAT))
        .collect::<Result<Vec<_>, _>>();
    let times = index
        .times_of_day()
        .into_iter()
        .map(|time| time.format(TIME_OF_DAY_FORMAT))
        .collect::<Result<Vec<_>, _>>();
    let (Ok(dates), Ok(times), Ok(timestamp)) = (dates, times, format_wall_clock(now)) else {
        return internal_error("/api/horizon", "timestamp formatting failure");
    };

    ApiResponse::Success {
        status: StatusCode::OK,
        body: HorizonSuccessResponse {
            start: format_naive(start),
            end: format_naive(end),
            steps: index.len(),
            cadence_minutes: index.cadence().whole_minutes(),
            dates,
            times,
            timestamp,
        },
    }
}

fn build_forecast_response(
    state: Arc<RwLock<AppState>>,
    query: ForecastQuery,
    now: SystemTime,
) -> ApiResponse<ForecastSuccessResponse> {
    let (store, workers) = match state.read() {
        Ok(guard) => (guard.store().cloned(), guard.workers()),
        Err(_) => {
            return internal_error("/api/forecast", "state lock poisoned while reading artifacts");
        }
    };
    let Some(store) = store else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ArtifactsUnavailable,
            ARTIFACTS_UNAVAILABLE_MESSAGE,
            now,
        );
    };
    let (Some(date), Some(time)) = (query.date.as_deref(), query.time.as_deref()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "Both date and time query parameters are required",
            now,
        );
    };

    let run = match run_forecast(&store, date, time, workers) {
        Ok(run) => Arc::new(run),
        Err(err @ ForecastError::TimestampNotFound { .. }) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorCode::TimestampNotFound,
                &err.to_string(),
                now,
            );
        }
        Err(err) => return internal_error("/api/forecast", &err.to_string()),
    };

    match state.write() {
        Ok(mut guard) => {
            if let Err(err) = guard.set_latest(Arc::clone(&run)) {
                warn!(error = %err, "Latest forecast stored without subscribers");
            }
        }
        Err(_) => {
            return internal_error("/api/forecast", "state lock poisoned while storing forecast");
        }
    }

    match format_wall_clock(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: forecast_body(&store, &run, timestamp),
        },
        Err(_) => internal_error("/api/forecast", "timestamp formatting failure"),
    }
}

fn forecast_body(store: &ArtifactStore, run: &ForecastRun, timestamp: String) -> ForecastSuccessResponse {
    let lots = run
        .availability
        .bundles
        .iter()
        .filter_map(|(location_id, bundle)| {
            let availability = bundle.at_target()?;
            let lot = store.lot(*location_id);
            Some(LotForecast {
                location_id: *location_id,
                availability,
                latitude: lot.map(|l| l.latitude),
                longitude: lot.map(|l| l.longitude),
                capacity: lot.map(|l| l.capacity),
                forecast: series_points(bundle.forecast.points()),
            })
        })
        .collect();
    let failures = run
        .availability
        .failures
        .iter()
        .map(|(location_id, err)| LotFailure {
            location_id: *location_id,
            error_message: err.to_string(),
        })
        .collect();

    ForecastSuccessResponse {
        target: format_naive(run.target),
        steps: run.steps,
        lots,
        failures,
        timestamp,
    }
}

fn build_trend_response(
    state: Arc<RwLock<AppState>>,
    raw_location_id: &str,
    now: SystemTime,
) -> ApiResponse<TrendSuccessResponse> {
    let (store, latest, trend_points) = match state.read() {
        Ok(guard) => (
            guard.store().cloned(),
            guard.latest().cloned(),
            guard.trend_points(),
        ),
        Err(_) => {
            return internal_error("/api/lots/trend", "state lock poisoned while reading forecast");
        }
    };
    let Some(store) = store else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ArtifactsUnavailable,
            ARTIFACTS_UNAVAILABLE_MESSAGE,
            now,
        );
    };
    let location_id = match raw_location_id.parse::<LocationId>() {
        Ok(id) if store.location(id).is_some() => id,
        _ => {
            return error_response(
                StatusCode::NOT_FOUND,
                ErrorCode::UnknownLocation,
                &format!("Unknown location {raw_location_id}"),
                now,
            );
        }
    };
    let Some(run) = latest else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::NoData,
            "No forecast has been run yet",
            now,
        );
    };
    let Some(bundle) = run.availability.bundles.get(&location_id) else {
        let message = match run.availability.failures.get(&location_id) {
            Some(err) => format!("Latest forecast failed: {err}"),
            None => format!("Latest forecast has no data for location {location_id}"),
        };
        return error_response(StatusCode::SERVICE_UNAVAILABLE, ErrorCode::NoData, &message, now);
    };

    let trend = bundle.trend(trend_points).to_occupancy();
    match format_wall_clock(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: TrendSuccessResponse {
                location_id,
                target: format_naive(run.target),
                unit: TrendUnit::OccupancyPercent,
                historical: series_points(&trend.historical),
                forecast: series_points(&trend.forecast),
                timestamp,
            },
        },
        Err(_) => internal_error("/api/lots/trend", "timestamp formatting failure"),
    }
}

fn read_store(state: &RwLock<AppState>) -> Result<Option<Arc<ArtifactStore>>, AppError> {
    state
        .read()
        .map(|guard| guard.store().cloned())
        .map_err(|_| AppError::StateLock)
}

fn series_points(points: &[Observation]) -> Vec<SeriesPoint> {
    points
        .iter()
        .map(|point| SeriesPoint {
            timestamp: format_naive(point.timestamp),
            value: point.occupancy_rate,
        })
        .collect()
}

fn error_response<T>(
    status: StatusCode,
    error_code: ErrorCode,
    message: &str,
    now: SystemTime,
) -> ApiResponse<T> {
    match format_wall_clock(now) {
        Ok(timestamp) => ApiResponse::Error {
            status,
            body: ErrorResponse {
                error_code,
                error_message: message.to_string(),
                timestamp,
            },
        },
        Err(_) => internal_error("api", "timestamp formatting failure"),
    }
}

fn internal_error<T>(endpoint: &str, message: &str) -> ApiResponse<T> {
    error!(endpoint, message, "Internal error while handling request");
    let formatted = format_wall_clock(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    });
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: formatted,
        },
    }
}

fn format_wall_clock(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::LotInfo;
    use crate::forecast::aggregate::LocationArtifacts;
    use crate::forecast::resolver::ForecastIndex;
    use crate::models::mock::{IdentityScaler, MockModel};
    use crate::series::TimeSeries;
    use std::collections::BTreeMap;
    use std::time::{Duration, UNIX_EPOCH};
    use time::PrimitiveDateTime;
    use time::macros::datetime;

    fn series(start: PrimitiveDateTime, len: i32, value: f64) -> TimeSeries {
        let cadence = time::Duration::minutes(30);
        let points = (0..len)
            .map(|i| Observation {
                timestamp: start + cadence * i,
                occupancy_rate: value,
            })
            .collect();
        TimeSeries::new(points, cadence).expect("valid series")
    }

    fn store(models: Vec<MockModel>) -> Arc<ArtifactStore> {
        let cadence = time::Duration::minutes(30);
        let test_start = datetime!(2016-12-19 08:00);
        let locations: Vec<LocationArtifacts> = models
            .into_iter()
            .enumerate()
            .map(|(i, model)| LocationArtifacts {
                location_id: i as u32 + 1,
                train: series(test_start - cadence * 20, 20, 40.0),
                test: series(test_start, 4, 45.0),
                scaler: Arc::new(IdentityScaler),
                model: Arc::new(model),
            })
            .collect();
        let index =
            ForecastIndex::new(locations[0].test.timestamps().collect(), cadence).expect("index");
        let lots = BTreeMap::from([(
            1,
            LotInfo {
                location_id: 1,
                latitude: 52.4862,
                longitude: -1.8904,
                capacity: 577,
            },
        )]);
        Arc::new(ArtifactStore::new(index, locations, lots).expect("consistent store"))
    }

    fn state_with(models: Vec<MockModel>) -> Arc<RwLock<AppState>> {
        let mut app_state = AppState::new();
        app_state.set_store(store(models));
        app_state.set_trend_points(5);
        Arc::new(RwLock::new(app_state))
    }

    fn query(date: &str, time: &str) -> ForecastQuery {
        ForecastQuery {
            date: Some(date.to_string()),
            time: Some(time.to_string()),
        }
    }

    fn poisoned() -> Arc<RwLock<AppState>> {
        let state = Arc::new(RwLock::new(AppState::new()));
        let state_for_thread = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = state_for_thread.write().expect("lock for poison");
            panic!("poison lock");
        })
        .join();
        state
    }

    fn expect_error<T>(response: ApiResponse<T>) -> (StatusCode, ErrorResponse) {
        match response {
            ApiResponse::Error { status, body } => (status, body),
            ApiResponse::Success { status, .. } => {
                panic!("expected error response, got success: {status}");
            }
        }
    }

    fn expect_success<T>(response: ApiResponse<T>) -> (StatusCode, T) {
        match response {
            ApiResponse::Success { status, body } => (status, body),
            ApiResponse::Error { status, body } => {
                panic!("expected success response, got {status}: {}", body.error_message);
            }
        }
    }

    #[test]
    fn health_handler_returns_ko_without_artifacts() {
        let state = Arc::new(RwLock::new(AppState::new()));

        let response = build_health_response(state, UNIX_EPOCH + Duration::from_secs(6));

        let (status, body) = expect_success(response);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, HealthStatus::Ko);
        assert_eq!(body.timestamp, "1970-01-01T00:00:06Z");
    }

    #[test]
    fn health_handler_returns_ok_then_degraded_after_partial_failure() {
        let state = state_with(vec![
            MockModel::constant(30.0),
            MockModel::failing(),
        ]);

        let (_, before) = expect_success(build_health_response(Arc::clone(&state), UNIX_EPOCH));
        let _ = expect_success(build_forecast_response(
            Arc::clone(&state),
            query("2016-12-19", "08:30"),
            UNIX_EPOCH,
        ));
        let (status, after) = expect_success(build_health_response(state, UNIX_EPOCH));

        assert_eq!(before.status, HealthStatus::Ok);
        assert_eq!(before.locations, 2);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after.status, HealthStatus::Degraded);
        assert_eq!(after.failed_locations, vec![2]);
    }

    #[test]
    fn health_handler_returns_internal_error_when_lock_poisoned() {
        let response = build_health_response(poisoned(), UNIX_EPOCH);

        let (status, body) = expect_error(response);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error_code, ErrorCode::InternalError);
        assert_eq!(body.error_message, "Internal server error");
    }

    #[test]
    fn horizon_handler_lists_dates_and_times() {
        let state = state_with(vec![MockModel::constant(30.0)]);

        let (_, body) = expect_success(build_horizon_response(state, UNIX_EPOCH));

        assert_eq!(body.start, "2016-12-19T08:00:00");
        assert_eq!(body.end, "2016-12-19T09:30:00");
        assert_eq!(body.steps, 4);
        assert_eq!(body.cadence_minutes, 30);
        assert_eq!(body.dates, vec!["2016-12-19"]);
        assert_eq!(body.times, vec!["08:00", "08:30", "09:00", "09:30"]);
    }

    #[test]
    fn forecast_handler_returns_availability_with_lot_metadata() {
        let state = state_with(vec![
            MockModel::constant(150.0),
            MockModel::constant(20.0),
        ]);

        let response = build_forecast_response(
            Arc::clone(&state),
            query("2016-12-19", "09:00"),
            UNIX_EPOCH + Duration::from_secs(1),
        );

        let (status, body) = expect_success(response);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.target, "2016-12-19T09:00:00");
        assert_eq!(body.steps, 3);
        assert!(body.failures.is_empty());
        assert_eq!(body.lots[0].availability, 0.0);
        assert_eq!(body.lots[0].capacity, Some(577));
        assert_eq!(body.lots[1].availability, 80.0);
        assert_eq!(body.lots[1].latitude, None);
        assert_eq!(body.lots[1].forecast.len(), 3);
        assert_eq!(body.timestamp, "1970-01-01T00:00:01Z");
        let guard = state.read().expect("state lock");
        assert_eq!(guard.latest().map(|run| run.steps), Some(3));
    }

    #[tokio::test]
    async fn forecast_handler_runs_off_the_async_runtime() {
        let state = state_with(vec![MockModel::constant(40.0)]);

        let response = get_forecast(
            State(Arc::clone(&state)),
            Query(query("2016-12-19", "08:30")),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let guard = state.read().expect("state lock");
        assert_eq!(guard.latest().map(|run| run.steps), Some(2));
    }

    #[tokio::test]
    async fn forecast_task_failure_becomes_internal_error() {
        let joined = tokio::task::spawn_blocking(|| -> ApiResponse<ForecastSuccessResponse> {
            panic!("forecast task aborted")
        })
        .await;

        let (status, body) = expect_error(finish_forecast(joined));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error_code, ErrorCode::InternalError);
    }

    #[test]
    fn forecast_handler_rejects_timestamp_outside_horizon() {
        let state = state_with(vec![MockModel::constant(30.0)]);

        let response =
            build_forecast_response(Arc::clone(&state), query("2016-12-19", "16:00"), UNIX_EPOCH);

        let (status, body) = expect_error(response);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error_code, ErrorCode::TimestampNotFound);
        assert!(state.read().expect("state lock").latest().is_none());
    }

    #[test]
    fn forecast_handler_requires_date_and_time() {
        let state = state_with(vec![MockModel::constant(30.0)]);

        let response = build_forecast_response(state, ForecastQuery::default(), UNIX_EPOCH);

        let (status, body) = expect_error(response);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error_code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn forecast_handler_returns_unavailable_without_artifacts() {
        let state = Arc::new(RwLock::new(AppState::new()));

        let response = build_forecast_response(state, query("2016-12-19", "08:00"), UNIX_EPOCH);

        let (status, body) = expect_error(response);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error_code, ErrorCode::ArtifactsUnavailable);
    }

    #[test]
    fn trend_handler_returns_no_data_before_any_run() {
        let state = state_with(vec![MockModel::constant(30.0)]);

        let (status, body) = expect_error(build_trend_response(state, "1", UNIX_EPOCH));

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error_code, ErrorCode::NoData);
    }

    #[test]
    fn trend_handler_rejects_unknown_location() {
        let state = state_with(vec![MockModel::constant(30.0)]);

        let (unknown_status, unknown) =
            expect_error(build_trend_response(Arc::clone(&state), "42", UNIX_EPOCH));
        let (_, malformed) = expect_error(build_trend_response(state, "lot-a", UNIX_EPOCH));

        assert_eq!(unknown_status, StatusCode::NOT_FOUND);
        assert_eq!(unknown.error_code, ErrorCode::UnknownLocation);
        assert_eq!(malformed.error_code, ErrorCode::UnknownLocation);
    }

    #[test]
    fn trend_handler_returns_occupancy_history_tail_and_forecast() {
        let state = state_with(vec![MockModel::constant(25.0)]);
        let _ = expect_success(build_forecast_response(
            Arc::clone(&state),
            query("2016-12-19", "09:30"),
            UNIX_EPOCH,
        ));

        let (_, body) = expect_success(build_trend_response(state, "1", UNIX_EPOCH));

        assert_eq!(body.location_id, 1);
        assert_eq!(body.unit, TrendUnit::OccupancyPercent);
        assert_eq!(body.historical.len(), 5);
        assert!(body.historical.iter().all(|p| p.value == 40.0));
        assert_eq!(body.historical[4].timestamp, "2016-12-19T07:30:00");
        assert_eq!(body.forecast.len(), 4);
        assert!(body.forecast.iter().all(|p| p.value == 25.0));
    }

    #[test]
    fn trend_handler_reports_failed_location() {
        let state = state_with(vec![
            MockModel::constant(25.0),
            MockModel::failing(),
        ]);
        let _ = expect_success(build_forecast_response(
            Arc::clone(&state),
            query("2016-12-19", "08:00"),
            UNIX_EPOCH,
        ));

        let (status, body) = expect_error(build_trend_response(state, "2", UNIX_EPOCH));

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error_code, ErrorCode::NoData);
        assert!(body.error_message.starts_with("Latest forecast failed"));
    }
}
