//! QWeather HTTP adapter.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use log::debug;
use log::info;
use serde::Deserialize;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::config::QWeatherConfig;
use crate::weather::WeatherProvider;
use crate::weather::error::WeatherError;
use crate::weather::model::AirQuality;
use crate::weather::model::Alert;
use crate::weather::model::CurrentWeather;
use crate::weather::model::LifeIndex;
use crate::weather::model::Location;

const REQUESTS_PER_SECOND: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// Bound on a single QWeather round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const API_KEY_HEADER: &str = "X-QW-Api-Key";

/// Life index types requested from `/v7/indices/1d`: sports, dressing, UV.
const LIFE_INDEX_TYPES: &str = "1,3,5";

/// Status code QWeather returns when a location has no active warnings.
const NO_CONTENT: &str = "204";

#[derive(Deserialize)]
struct GeoResponse {
    code: String,
    #[serde(default)]
    location: Vec<Location>,
}

#[derive(Deserialize)]
struct WeatherNowResponse {
    code: String,
    now: Option<CurrentWeather>,
}

#[derive(Deserialize)]
struct IndicesResponse {
    code: String,
    #[serde(default)]
    daily: Vec<LifeIndex>,
}

#[derive(Deserialize)]
struct WarningResponse {
    code: String,
    #[serde(default)]
    warning: Vec<Alert>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AirQualityIndex {
    #[serde(default)]
    code: String,
    #[serde(default)]
    aqi: f64,
    #[serde(default)]
    level: String,
    #[serde(default)]
    category: String,
    primary_pollutant: Option<PrimaryPollutant>,
}

#[derive(Deserialize)]
struct PrimaryPollutant {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct AirQualityResponse {
    #[serde(default)]
    indexes: Vec<AirQualityIndex>,
}

/// Client for the QWeather GeoAPI, weather, indices, air quality and warning endpoints.
pub struct QWeatherClient {
    pub config: QWeatherConfig,
    client: reqwest::Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
}

impl QWeatherClient {
    pub fn new(config: QWeatherConfig) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let limiter = RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND));

        Ok(Self {
            config,
            client,
            limiter,
        })
    }

    fn url(&self, host: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, WeatherError> {
        let raw = format!("{}{}", host.trim_end_matches('/'), path);
        let parsed = if params.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, params)
        };
        parsed.map_err(|_| WeatherError::InvalidUrl { url: raw })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, WeatherError> {
        if self.limiter.check().is_err() {
            info!("QWeather is ratelimited. Waiting...");
        }
        self.limiter.until_ready().await;

        let request = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .build()?;
        debug!("Making request to: {}", request.url().path());
        let response = self.client.execute(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn check_code(endpoint: &str, code: &str) -> Result<(), WeatherError> {
        if code != "200" {
            return Err(WeatherError::ApiError {
                endpoint: endpoint.to_string(),
                code: code.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WeatherProvider for QWeatherClient {
    async fn resolve_location(&self, city: &str) -> Result<Location, WeatherError> {
        let url = self.url(
            &self.config.geo_host,
            "/geo/v2/city/lookup",
            &[("location", city)],
        )?;
        let resp: GeoResponse = self.get_json(url).await?;
        Self::check_code("geo/v2/city/lookup", &resp.code).map_err(|_| {
            WeatherError::LocationNotFound {
                city: city.to_string(),
            }
        })?;
        resp.location
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::LocationNotFound {
                city: city.to_string(),
            })
    }

    async fn current_weather(&self, location: &Location) -> Result<CurrentWeather, WeatherError> {
        let url = self.url(
            &self.config.api_host,
            "/v7/weather/now",
            &[("location", location.id.as_str())],
        )?;
        let resp: WeatherNowResponse = self.get_json(url).await?;
        Self::check_code("v7/weather/now", &resp.code)?;
        resp.now.ok_or_else(|| WeatherError::MissingField {
            field: "now".to_string(),
        })
    }

    async fn life_indices(&self, location: &Location) -> Result<Vec<LifeIndex>, WeatherError> {
        let url = self.url(
            &self.config.api_host,
            "/v7/indices/1d",
            &[("location", location.id.as_str()), ("type", LIFE_INDEX_TYPES)],
        )?;
        let resp: IndicesResponse = self.get_json(url).await?;
        Self::check_code("v7/indices/1d", &resp.code)?;
        Ok(resp.daily)
    }

    async fn air_quality(&self, location: &Location) -> Result<Option<AirQuality>, WeatherError> {
        let path = format!("/airquality/v1/current/{}/{}", location.lat, location.lon);
        let url = self.url(&self.config.api_host, &path, &[])?;
        let resp: AirQualityResponse = self.get_json(url).await?;

        let mut indexes = resp.indexes;
        let main = match indexes.iter().position(|idx| idx.code == "qaqi") {
            Some(pos) => Some(indexes.swap_remove(pos)),
            None => indexes.into_iter().next(),
        };

        Ok(main.map(|idx| AirQuality {
            aqi: idx.aqi,
            level: idx.level,
            category: idx.category,
            primary_pollutant: idx
                .primary_pollutant
                .map(|p| p.name)
                .filter(|name| !name.is_empty()),
        }))
    }

    async fn active_alerts(&self, location: &Location) -> Result<Vec<Alert>, WeatherError> {
        let url = self.url(
            &self.config.api_host,
            "/v7/warning/now",
            &[("location", location.id.as_str())],
        )?;
        let resp: WarningResponse = self.get_json(url).await?;
        if resp.code == NO_CONTENT {
            return Ok(Vec::new());
        }
        Self::check_code("v7/warning/now", &resp.code)?;
        Ok(resp.warning)
    }
}
