use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;

use crate::{
    clock::Clock,
    error::FetchError,
    http::HttpClient,
    model::{ArrivalItem, ArrivalSnapshot, RouteType, StopIdentity, StopInfo},
};

pub const ARRIVALS_LIMIT: u32 = 20;

const DEMO_STOP_NAME: &str = "Ж/д вокзал";

/// A freshly fetched snapshot and the time reference it came with.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub snapshot: ArrivalSnapshot,
    pub server_now: DateTime<Utc>,
}

pub struct SnapshotFetcher {
    identity: StopIdentity,
    api_base: Option<String>,
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl SnapshotFetcher {
    /// An empty `api_base` puts the fetcher in demo mode.
    pub fn new(
        identity: StopIdentity,
        api_base: &str,
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let api_base = api_base.trim();
        SnapshotFetcher {
            identity,
            api_base: (!api_base.is_empty()).then(|| api_base.to_string()),
            http,
            clock,
        }
    }

    pub fn identity(&self) -> &StopIdentity {
        &self.identity
    }

    pub fn is_demo(&self) -> bool {
        self.api_base.is_none()
    }

    pub fn request_url(&self) -> Result<Option<Url>, FetchError> {
        let Some(base) = &self.api_base else {
            return Ok(None);
        };
        let endpoint = format!("{}/api/arrivals", base.trim_end_matches('/'));
        let limit = ARRIVALS_LIMIT.to_string();
        let url = Url::parse_with_params(
            &endpoint,
            [
                ("city", self.identity.city.as_str()),
                ("stopId", self.identity.stop_id.as_str()),
                ("limit", limit.as_str()),
            ],
        )
        .map_err(|err| FetchError::InvalidUrl {
            base: base.clone(),
            reason: err.to_string(),
        })?;
        Ok(Some(url))
    }

    pub async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        let Some(url) = self.request_url()? else {
            let now = self.clock.now();
            return Ok(FetchOutcome {
                snapshot: demo_snapshot(&self.identity, now),
                server_now: now,
            });
        };

        let response = self.http.get(url).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
            });
        }
        let server_now = response
            .date
            .as_deref()
            .and_then(parse_date_header)
            .unwrap_or_else(|| self.clock.now());
        let snapshot: ArrivalSnapshot = serde_json::from_slice(&response.body)?;
        log::debug!(
            "Fetched {} arrivals for {}:{}",
            snapshot.items.len(),
            self.identity.city,
            self.identity.stop_id
        );
        Ok(FetchOutcome {
            snapshot,
            server_now,
        })
    }
}

/// Parses an HTTP `Date` header (`Sun, 12 Jan 2025 14:00:00 GMT`).
pub fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// The fixed snapshot served when no API base is configured.
pub fn demo_snapshot(identity: &StopIdentity, generated_at: DateTime<Utc>) -> ArrivalSnapshot {
    let demo_item = |route_id: &str, route_type: RouteType, route_name: &str, minutes: i64| {
        ArrivalItem {
            route_id: route_id.to_string(),
            route_type,
            route_name: Some(route_name.to_string()),
            scheduled_time: None,
            arrival_in_minutes: Some(minutes),
            is_realtime: Some(true),
        }
    };
    ArrivalSnapshot {
        stop: StopInfo {
            id: identity.stop_id.clone(),
            name: Some(DEMO_STOP_NAME.to_string()),
            city: Some(identity.city.clone()),
        },
        generated_at: Some(generated_at),
        items: vec![
            demo_item("130", RouteType::Minibus, "Маршрутка 130", 4),
            demo_item("33Ш", RouteType::Bus, "Автобус 33Ш", 8),
            demo_item("19", RouteType::Minibus, "Маршрутка 19", 11),
            demo_item("3", RouteType::Minibus, "Маршрутка 3", 14),
            demo_item("128", RouteType::Minibus, "Маршрутка 128", 20),
            demo_item("131", RouteType::Minibus, "Маршрутка 131", 20),
        ],
    }
}
