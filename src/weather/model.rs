//! Weather data shapes shared by providers and the content pipeline.

use serde::Deserialize;
use serde::Serialize;

/// A resolved provider location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub lat: String,
    pub lon: String,
}

/// Current observation. Values are kept as the provider's decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    #[serde(default)]
    pub temp: String,
    #[serde(default)]
    pub feels_like: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub humidity: String,
    #[serde(default)]
    pub wind_dir: String,
    #[serde(default)]
    pub wind_scale: String,
    #[serde(default)]
    pub wind_speed: String,
}

impl CurrentWeather {
    /// `feels_like - temp` when both values parse.
    pub fn feels_like_delta(&self) -> Option<f64> {
        let temp = self.temp.trim().parse::<f64>().ok()?;
        let feels = self.feels_like.trim().parse::<f64>().ok()?;
        Some(feels - temp)
    }
}

/// Kind of a life index, keyed by the provider's numeric type code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifeIndexKind {
    Sports,
    Dressing,
    UltravioletIndex,
    Other(String),
}

impl LifeIndexKind {
    pub fn code(&self) -> &str {
        match self {
            Self::Sports => "1",
            Self::Dressing => "3",
            Self::UltravioletIndex => "5",
            Self::Other(code) => code,
        }
    }

    /// Whether the index is shown in the template's highlight section.
    pub fn is_highlighted(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Sports => "🏃",
            Self::Dressing => "👔",
            Self::UltravioletIndex => "☀️",
            Self::Other(_) => "📌",
        }
    }

    /// Ordering used when presenting indices to the completion model.
    pub fn prompt_priority(&self) -> u8 {
        match self {
            Self::Dressing => 0,
            Self::UltravioletIndex => 1,
            Self::Sports => 2,
            Self::Other(_) => 3,
        }
    }
}

impl From<String> for LifeIndexKind {
    fn from(code: String) -> Self {
        match code.as_str() {
            "1" => Self::Sports,
            "3" => Self::Dressing,
            "5" => Self::UltravioletIndex,
            _ => Self::Other(code),
        }
    }
}

impl From<LifeIndexKind> for String {
    fn from(kind: LifeIndexKind) -> Self {
        kind.code().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeIndex {
    #[serde(rename = "type")]
    pub kind: LifeIndexKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub category: String,
    /// Advice text.
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub aqi: f64,
    pub level: String,
    pub category: String,
    pub primary_pollutant: Option<String>,
}

/// A hazard alert as published by the provider.
///
/// `status` is the raw provider literal; see
/// [`WarningStatus::from_provider`](crate::entity::WarningStatus::from_provider).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub pub_time: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub severity_color: String,
    #[serde(default, rename = "type")]
    pub type_code: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub text: String,
}

impl Alert {
    /// Marker for the alert's severity colour.
    pub fn severity_emoji(&self) -> &'static str {
        match self.severity_color.as_str() {
            "Red" => "🔴",
            "Orange" => "🟠",
            "Yellow" => "🟡",
            "Blue" => "🔵",
            _ => "⚠️",
        }
    }
}
