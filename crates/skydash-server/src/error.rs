//! Rejection plumbing: every failure leaves the API as `{"message": ...}`.

use std::convert::Infallible;

use serde::Serialize;
use skydash_core::AppError;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Application failure carried through warp's rejection system.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl warp::reject::Reject for ApiError {}

pub fn reject(e: impl Into<AppError>) -> Rejection {
    warp::reject::custom(ApiError(e.into()))
}

pub fn bad_request(message: impl Into<String>) -> Rejection {
    reject(AppError::InvalidRequest(message.into()))
}

/// Map a lookup failure onto the central error type.
pub fn weather_error(e: skydash_weather::WeatherError) -> AppError {
    use skydash_core::WeatherError as EdgeError;
    use skydash_weather::WeatherError;

    match e {
        WeatherError::InvalidRange(msg) => AppError::InvalidRequest(msg),
        WeatherError::Cache(msg) => AppError::Weather(EdgeError::CacheError(msg)),
        upstream @ (WeatherError::UpstreamUnavailable(_) | WeatherError::UpstreamMalformed(_)) => {
            AppError::Weather(EdgeError::UpstreamUnavailable(upstream.to_string()))
        }
    }
}

pub fn status_of(e: &AppError) -> StatusCode {
    match e {
        AppError::Auth(_) => StatusCode::UNAUTHORIZED,
        AppError::UserNotFound(_) => StatusCode::NOT_FOUND,
        AppError::DuplicateLocation(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

fn error_reply(status: StatusCode, message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ErrorBody { message }), status)
}

/// Turn any rejection into a JSON error response.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(ApiError(app)) = err.find::<ApiError>() {
        let status = status_of(app);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", app);
        } else {
            tracing::debug!("Request rejected: {}", app);
        }
        return Ok(error_reply(status, app.user_message()));
    }

    if err.is_not_found() {
        return Ok(error_reply(StatusCode::NOT_FOUND, "Not found"));
    }
    if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        tracing::debug!("Bad request body: {}", e);
        return Ok(error_reply(StatusCode::BAD_REQUEST, "Invalid request body"));
    }
    if err.find::<warp::reject::InvalidQuery>().is_some() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "Invalid query string"));
    }
    if err.find::<warp::reject::LengthRequired>().is_some() {
        return Ok(error_reply(StatusCode::LENGTH_REQUIRED, "Content-Length required"));
    }
    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large"));
    }
    if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return Ok(error_reply(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected a JSON body",
        ));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }

    tracing::error!("Unhandled rejection: {:?}", err);
    Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Server error"))
}
