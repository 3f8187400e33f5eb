//! Errors raised by weather providers.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WeatherError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to parse API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Location not found for city \"{city}\"")]
    LocationNotFound { city: String },

    #[error("Weather API returned code {code} for {endpoint}")]
    ApiError { endpoint: String, code: String },

    #[error("Invalid data from API: missing field `{field}`.")]
    MissingField { field: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// The request URL is dropped: it can carry credentials.
impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        WeatherError::RequestFailed(Box::new(e.without_url()))
    }
}
