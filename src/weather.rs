//! Weather collaborator: location lookup, observations, indices and hazard alerts.

use async_trait::async_trait;

use crate::weather::error::WeatherError;
use crate::weather::model::Alert;
use crate::weather::model::AirQuality;
use crate::weather::model::CurrentWeather;
use crate::weather::model::LifeIndex;
use crate::weather::model::Location;

pub mod error;
pub mod model;
pub mod qweather_client;

/// Read-only weather data source used by the reminder and warning pipelines.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Resolves a city name to a provider location handle.
    async fn resolve_location(&self, city: &str) -> Result<Location, WeatherError>;

    async fn current_weather(&self, location: &Location) -> Result<CurrentWeather, WeatherError>;

    async fn life_indices(&self, location: &Location) -> Result<Vec<LifeIndex>, WeatherError>;

    /// Current air quality. `None` when the provider has no reading.
    async fn air_quality(&self, location: &Location) -> Result<Option<AirQuality>, WeatherError>;

    /// Hazard alerts currently published for the location. Empty when none.
    async fn active_alerts(&self, location: &Location) -> Result<Vec<Alert>, WeatherError>;
}
