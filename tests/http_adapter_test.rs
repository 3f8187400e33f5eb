use std::time::Duration;

use daily_reminder_bot::completion::CompletionClient;
use daily_reminder_bot::completion::CompletionError;
use daily_reminder_bot::completion::openai_client::OpenAiClient;
use daily_reminder_bot::config::OpenAiConfig;
use daily_reminder_bot::config::QWeatherConfig;
use daily_reminder_bot::config::TelegramConfig;
use daily_reminder_bot::delivery::DeliveryError;
use daily_reminder_bot::delivery::DeliverySink;
use daily_reminder_bot::delivery::telegram_sink::TelegramSink;
use daily_reminder_bot::weather::WeatherProvider;
use daily_reminder_bot::weather::error::WeatherError;
use daily_reminder_bot::weather::model::LifeIndexKind;
use daily_reminder_bot::weather::model::Location;
use httpmock::prelude::*;
use serde_json::json;
use tokio::time::Instant;

fn qweather(server: &MockServer) -> daily_reminder_bot::weather::qweather_client::QWeatherClient {
    daily_reminder_bot::weather::qweather_client::QWeatherClient::new(QWeatherConfig {
        api_key: "test-key".to_string(),
        api_host: server.url(""),
        geo_host: server.url(""),
    })
    .unwrap()
}

fn location() -> Location {
    Location {
        id: "101010100".to_string(),
        name: "北京".to_string(),
        lat: "39.90".to_string(),
        lon: "116.41".to_string(),
    }
}

#[tokio::test]
async fn test_qweather_resolve_location() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/geo/v2/city/lookup")
            .query_param("location", "beijing")
            .header("x-qw-api-key", "test-key");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "code": "200",
                "location": [
                    { "name": "北京", "id": "101010100", "lat": "39.90", "lon": "116.41", "adm1": "北京市" },
                    { "name": "北京南", "id": "101010200", "lat": "39.80", "lon": "116.30" }
                ]
            }));
    });

    let client = qweather(&server);
    let found = client.resolve_location("beijing").await.unwrap();
    assert_eq!(found, location());
    mock.assert();
}

#[tokio::test]
async fn test_qweather_unknown_city() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/geo/v2/city/lookup");
        then.status(200).json_body(json!({ "code": "404" }));
    });

    let err = qweather(&server).resolve_location("atlantis").await.unwrap_err();
    assert!(matches!(err, WeatherError::LocationNotFound { city } if city == "atlantis"));
}

#[tokio::test]
async fn test_qweather_failure_hides_api_key() {
    let client = daily_reminder_bot::weather::qweather_client::QWeatherClient::new(QWeatherConfig {
        api_key: "qw-secret-key".to_string(),
        api_host: "http://127.0.0.1:1".to_string(),
        geo_host: "http://127.0.0.1:1".to_string(),
    })
    .unwrap();

    let err = client.resolve_location("beijing").await.unwrap_err();
    assert!(matches!(err, WeatherError::RequestFailed(_)));
    assert!(!format!("{err}").contains("qw-secret-key"));
    assert!(!format!("{err:?}").contains("qw-secret-key"));
}

#[tokio::test]
async fn test_qweather_current_weather() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/v7/weather/now")
            .query_param("location", "101010100");
        then.status(200).json_body(json!({
            "code": "200",
            "now": {
                "obsTime": "2026-03-02T08:00+08:00",
                "temp": "5",
                "feelsLike": "1",
                "text": "晴",
                "windDir": "北风",
                "windScale": "3",
                "windSpeed": "15",
                "humidity": "30"
            }
        }));
    });

    let weather = qweather(&server).current_weather(&location()).await.unwrap();
    assert_eq!(weather.temp, "5");
    assert_eq!(weather.feels_like, "1");
    assert_eq!(weather.wind_dir, "北风");
    assert_eq!(weather.feels_like_delta(), Some(-4.0));
}

#[tokio::test]
async fn test_qweather_error_code() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v7/weather/now");
        then.status(200).json_body(json!({ "code": "401" }));
    });

    let err = qweather(&server).current_weather(&location()).await.unwrap_err();
    assert!(matches!(err, WeatherError::ApiError { code, .. } if code == "401"));
}

#[tokio::test]
async fn test_qweather_life_indices() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/v7/indices/1d")
            .query_param("type", "1,3,5");
        then.status(200).json_body(json!({
            "code": "200",
            "daily": [
                { "date": "2026-03-02", "type": "1", "name": "运动指数", "level": "2", "category": "较适宜", "text": "注意保暖" },
                { "date": "2026-03-02", "type": "3", "name": "穿衣指数", "level": "6", "category": "寒冷", "text": "建议着羽绒服" },
                { "date": "2026-03-02", "type": "5", "name": "紫外线指数", "level": "1", "category": "最弱", "text": "无需防护" }
            ]
        }));
    });

    let indices = qweather(&server).life_indices(&location()).await.unwrap();
    let kinds: Vec<LifeIndexKind> = indices.into_iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LifeIndexKind::Sports,
            LifeIndexKind::Dressing,
            LifeIndexKind::UltravioletIndex
        ]
    );
}

#[tokio::test]
async fn test_qweather_air_quality_prefers_local_index() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/airquality/v1/current/39.90/116.41");
        then.status(200).json_body(json!({
            "indexes": [
                { "code": "us-epa", "aqi": 80, "level": "2", "category": "Moderate" },
                {
                    "code": "qaqi",
                    "aqi": 55,
                    "level": "2",
                    "category": "良",
                    "primaryPollutant": { "code": "pm2p5", "name": "PM 2.5" }
                }
            ]
        }));
    });

    let air = qweather(&server)
        .air_quality(&location())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(air.aqi, 55.0);
    assert_eq!(air.category, "良");
    assert_eq!(air.primary_pollutant.as_deref(), Some("PM 2.5"));
}

#[tokio::test]
async fn test_qweather_air_quality_empty() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/airquality/v1/current/39.90/116.41");
        then.status(200).json_body(json!({ "indexes": [] }));
    });

    assert_eq!(
        qweather(&server).air_quality(&location()).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_qweather_warnings() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/v7/warning/now")
            .query_param("location", "101010100");
        then.status(200).json_body(json!({
            "code": "200",
            "warning": [{
                "id": "10101010020260301110000000000",
                "sender": "北京市气象台",
                "pubTime": "2026-03-01T11:00+08:00",
                "title": "北京市气象台发布大风蓝色预警",
                "startTime": "2026-03-01T11:00+08:00",
                "endTime": "2026-03-02T11:00+08:00",
                "status": "active",
                "level": "",
                "severity": "Minor",
                "severityColor": "Blue",
                "type": "1006",
                "typeName": "大风",
                "text": "预计今天下午有5级以上大风。"
            }]
        }));
    });

    let alerts = qweather(&server).active_alerts(&location()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].type_code, "1006");
    assert_eq!(alerts[0].severity_emoji(), "🔵");
    assert_eq!(alerts[0].status, "active");
}

#[tokio::test]
async fn test_qweather_no_warnings() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v7/warning/now");
        then.status(200).json_body(json!({ "code": "204" }));
    });

    assert!(
        qweather(&server)
            .active_alerts(&location())
            .await
            .unwrap()
            .is_empty()
    );
}

fn openai(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(&OpenAiConfig {
        enabled: true,
        api_key: "sk-test".to_string(),
        base_url: server.url("/v1"),
        model: "test-model".to_string(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_openai_completion() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .body_contains("\"model\":\"test-model\"")
            .body_contains("\"role\":\"system\"");
        then.status(200).json_body(json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "早上好！" } }]
        }));
    });

    let content = openai(&server)
        .complete("system", "user", Instant::now() + Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(content, "早上好！");
    mock.assert();
}

#[tokio::test]
async fn test_openai_error_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(429).json_body(json!({
            "error": { "message": "Rate limit reached", "type": "requests" }
        }));
    });

    let err = openai(&server)
        .complete("system", "user", Instant::now() + Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(err, CompletionError::ApiError { message } if message.contains("Rate limit")));
}

#[tokio::test]
async fn test_openai_bad_status_and_empty_choices() {
    let server = MockServer::start();
    let mut failing = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(502).body("Bad Gateway");
    });

    let client = openai(&server);
    let deadline = Instant::now() + Duration::from_secs(10);
    let err = client.complete("s", "u", deadline).await.unwrap_err();
    assert!(matches!(err, CompletionError::BadStatus { status: 502 }));

    failing.delete();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(json!({ "choices": [] }));
    });
    let err = client.complete("s", "u", deadline).await.unwrap_err();
    assert!(matches!(err, CompletionError::EmptyResponse));
}

fn telegram(server: &MockServer) -> TelegramSink {
    TelegramSink::new(&TelegramConfig {
        token: "123:abc".to_string(),
        api_url: server.url(""),
    })
    .unwrap()
}

#[tokio::test]
async fn test_telegram_send_message() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/bot123:abc/sendMessage")
            .body_contains("\"chat_id\":42");
        then.status(200)
            .json_body(json!({ "ok": true, "result": { "message_id": 1 } }));
    });

    telegram(&server).send(42, "hello").await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_telegram_rejection() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/bot123:abc/sendMessage");
        then.status(403).json_body(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        }));
    });

    let err = telegram(&server).send(42, "hello").await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::Rejected { chat_id: 42, description } if description.starts_with("Forbidden")
    ));
}

#[tokio::test]
async fn test_telegram_failure_hides_token() {
    let sink = TelegramSink::new(&TelegramConfig {
        token: "123:tg-secret".to_string(),
        api_url: "http://127.0.0.1:1".to_string(),
    })
    .unwrap();

    let err = sink.send(42, "hello").await.unwrap_err();
    assert!(matches!(err, DeliveryError::RequestFailed(_)));
    assert!(!format!("{err}").contains("tg-secret"));
    assert!(!format!("{err:?}").contains("tg-secret"));
}
