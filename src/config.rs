use std::{collections::HashMap, fmt, time::Duration};

use reqwest::Url;

use crate::{model::StopIdentity, schedule};

pub const DEFAULT_CITY: &str = "Нальчик";
pub const DEFAULT_STOP_ID: &str = "18859506377921266";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

impl Theme {
    /// Unknown values fall back to `auto`.
    pub fn parse(value: &str) -> Theme {
        match value.trim().to_lowercase().as_str() {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            _ => Theme::Auto,
        }
    }

    /// light → dark → auto → light
    pub fn next(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Auto,
            Theme::Auto => Theme::Light,
        }
    }

    /// `auto` follows the system preference; the others are fixed.
    pub fn is_dark(self, system_dark: bool) -> bool {
        match self {
            Theme::Light => false,
            Theme::Dark => true,
            Theme::Auto => system_dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Auto => "auto",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Board,
    Ticker,
}

impl ViewMode {
    pub fn parse(value: &str) -> ViewMode {
        if value.trim().eq_ignore_ascii_case("ticker") {
            ViewMode::Ticker
        } else {
            ViewMode::Board
        }
    }
}

/// Everything a board is configured with. Built leniently: every value has a
/// default and nothing is rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
    pub identity: StopIdentity,
    pub refresh: Duration,
    pub theme: Theme,
    pub view: ViewMode,
    pub api_base: String,
    pub clock_visible: bool,
    pub qr_visible: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig::from_params(&HashMap::new())
    }
}

impl BoardConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let get = |name: &str| params.get(name).map(String::as_str);
        BoardConfig {
            identity: StopIdentity::new(
                get("city").unwrap_or(DEFAULT_CITY),
                get("stopId").unwrap_or(DEFAULT_STOP_ID),
            ),
            refresh: schedule::parse_refresh(get("refresh")),
            theme: get("theme").map(Theme::parse).unwrap_or_default(),
            view: get("view").map(ViewMode::parse).unwrap_or_default(),
            api_base: get("api").unwrap_or_default().to_string(),
            clock_visible: get("clock") != Some("off"),
            qr_visible: get("qr") != Some("off"),
        }
    }

    pub fn from_query(query: &str) -> Self {
        BoardConfig::from_params(&parse_query(query))
    }

    /// Whether moving from `self` to `other` needs a fresh session: identity,
    /// refresh period and API base drive timers and the cache.
    pub fn needs_restart(&self, other: &BoardConfig) -> bool {
        self.identity != other.identity
            || self.refresh != other.refresh
            || self.api_base.trim() != other.api_base.trim()
    }
}

/// Decodes a `?a=1&b=2` query string. The first occurrence of a name wins.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let query = query.trim().trim_start_matches('?');
    let mut params = HashMap::new();
    let Ok(url) = Url::parse(&format!("tablo:?{}", query)) else {
        return params;
    };
    for (name, value) in url.query_pairs() {
        params
            .entry(name.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}
