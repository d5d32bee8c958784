//! Open-Meteo client tests against a local mock server.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aqi_forecaster::config::LocationConfig;
use aqi_forecaster::error::PipelineError;
use aqi_forecaster::http::retrying_client;
use aqi_forecaster::ingest::OpenMeteoClient;

fn karachi() -> LocationConfig {
    LocationConfig {
        city: "Karachi".to_string(),
        latitude: 24.8607,
        longitude: 67.0011,
    }
}

fn client_for(server: &MockServer) -> OpenMeteoClient {
    let client = retrying_client(std::time::Duration::from_secs(5), 2).unwrap();
    OpenMeteoClient::with_base_urls(client, server.uri(), server.uri())
}

fn aq_body() -> serde_json::Value {
    json!({
        "hourly": {
            "time": ["2025-06-01T00:00", "2025-06-01T01:00", "2025-06-01T02:00"],
            "pm2_5": [55.0, 60.5, null],
            "pm10": [110.0, 120.0, 130.0]
        }
    })
}

fn weather_body() -> serde_json::Value {
    json!({
        "hourly": {
            "time": ["2025-06-01T00:00", "2025-06-01T01:00", "2025-06-01T02:00"],
            "temperature_2m": [31.0, 32.5, 33.0],
            "relative_humidity_2m": [70.0, 65.0, 60.0],
            "wind_speed_10m": [12.0, 14.0, 16.0]
        }
    })
}

#[tokio::test]
async fn fetches_and_merges_recent_observations() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .and(query_param("past_days", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(aq_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body()))
        .mount(&server)
        .await;

    let rows = client_for(&server)
        .fetch_recent_observations(&karachi(), 2)
        .await
        .unwrap();

    // The null-PM hour is skipped.
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].pm2_5, 55.0);
    assert_eq!(rows[0].temperature_2m, 31.0);
    assert_eq!(rows[1].pm2_5, 60.5);
    assert_eq!(rows[1].pm10, Some(120.0));
}

#[tokio::test]
async fn fetches_weather_forecast_points() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("forecast_days", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body()))
        .mount(&server)
        .await;

    let points = client_for(&server)
        .fetch_weather_forecast(&karachi(), 3)
        .await
        .unwrap();

    assert_eq!(points.len(), 3);
    assert_eq!(points[2].wind_speed_10m, 16.0);
    assert!(points.windows(2).all(|p| p[0].time < p[1].time));
}

#[tokio::test]
async fn ragged_hourly_arrays_are_a_data_error() {
    let server = MockServer::start().await;

    let body = json!({
        "hourly": {
            "time": ["2025-06-01T00:00", "2025-06-01T01:00"],
            "temperature_2m": [31.0],
            "relative_humidity_2m": [70.0, 65.0],
            "wind_speed_10m": [12.0, 14.0]
        }
    });
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let result = client_for(&server).fetch_weather_forecast(&karachi(), 3).await;
    assert!(matches!(result, Err(PipelineError::Data(_))));
}

#[tokio::test]
async fn transient_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body()))
        .mount(&server)
        .await;

    let points = client_for(&server)
        .fetch_weather_forecast(&karachi(), 3)
        .await
        .unwrap();
    assert_eq!(points.len(), 3);
}

#[tokio::test]
async fn missing_hourly_field_is_a_data_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let result = client_for(&server).fetch_weather_forecast(&karachi(), 3).await;
    assert!(matches!(result, Err(PipelineError::Data(_))));
}
