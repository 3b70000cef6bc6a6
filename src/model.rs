use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The stop a board session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StopIdentity {
    pub city: String,
    pub stop_id: String,
}

impl StopIdentity {
    pub fn new(city: impl Into<String>, stop_id: impl Into<String>) -> Self {
        StopIdentity {
            city: city.into(),
            stop_id: stop_id.into(),
        }
    }

    pub fn cache_key(&self) -> String {
        format!("tablo:{}:{}", self.city, self.stop_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalSnapshot {
    pub stop: StopInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<ArrivalItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Bus,
    Tram,
    Trolley,
    Minibus,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RouteType {
    pub fn label(self) -> &'static str {
        match self {
            RouteType::Bus => "Автобус",
            RouteType::Tram => "Трамвай",
            RouteType::Trolley => "Троллейбус",
            RouteType::Minibus => "Маршрутка",
            RouteType::Unknown => "Маршрут",
        }
    }

    pub fn color(self) -> (u8, u8, u8) {
        match self {
            RouteType::Bus => (0x3B, 0x82, 0xF6),
            RouteType::Tram => (0xEF, 0x44, 0x44),
            RouteType::Trolley => (0x10, 0xB9, 0x81),
            RouteType::Minibus => (0xA8, 0x55, 0xF7),
            RouteType::Unknown => (0x6B, 0x72, 0x80),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalItem {
    pub route_id: String,
    #[serde(default)]
    pub route_type: RouteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_name: Option<String>,
    /// Wall-clock time of day on the current local date, `HH:MM[:SS]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<String>,
    /// Minutes from snapshot generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_in_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_realtime: Option<bool>,
}

/// Where an item's arrival time comes from. A scheduled time takes precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource<'a> {
    Scheduled(&'a str),
    InMinutes(i64),
}

impl ArrivalItem {
    pub fn time_source(&self) -> Option<TimeSource<'_>> {
        match (&self.scheduled_time, self.arrival_in_minutes) {
            (Some(time), _) if !time.is_empty() => Some(TimeSource::Scheduled(time)),
            (_, Some(minutes)) => Some(TimeSource::InMinutes(minutes)),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self.route_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.route_type.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_includes_city_and_stop() {
        let identity = StopIdentity::new("Нальчик", "42");
        assert_eq!(identity.cache_key(), "tablo:Нальчик:42");
    }

    #[test]
    fn decodes_wire_snapshot() {
        let json = r#"{
            "stop": {"id": "7", "name": "Центр", "city": "Нальчик"},
            "generatedAt": "2025-01-12T14:00:00Z",
            "items": [
                {"routeId": "5", "routeType": "tram", "scheduledTime": "14:30"},
                {"routeId": "5", "routeType": "hovercraft", "arrivalInMinutes": 3, "isRealtime": true},
                {"routeId": "9"}
            ]
        }"#;
        let snapshot: ArrivalSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.stop.name.as_deref(), Some("Центр"));
        assert_eq!(snapshot.items.len(), 3);
        assert_eq!(snapshot.items[0].route_type, RouteType::Tram);
        assert_eq!(
            snapshot.items[0].time_source(),
            Some(TimeSource::Scheduled("14:30"))
        );
        assert_eq!(snapshot.items[1].route_type, RouteType::Unknown);
        assert_eq!(snapshot.items[1].time_source(), Some(TimeSource::InMinutes(3)));
        assert_eq!(snapshot.items[2].route_type, RouteType::Unknown);
        assert_eq!(snapshot.items[2].time_source(), None);
    }

    #[test]
    fn scheduled_time_wins_over_minutes() {
        let item = ArrivalItem {
            route_id: "1".into(),
            route_type: RouteType::Bus,
            route_name: None,
            scheduled_time: Some("08:15".into()),
            arrival_in_minutes: Some(12),
            is_realtime: None,
        };
        assert_eq!(item.time_source(), Some(TimeSource::Scheduled("08:15")));
        assert_eq!(item.display_name(), "Автобус");
    }

    #[test]
    fn tolerates_missing_stop_fields() {
        let snapshot: ArrivalSnapshot = serde_json::from_str(r#"{"stop": {}}"#).unwrap();
        assert_eq!(snapshot.stop.name, None);
        assert!(snapshot.items.is_empty());
        assert!(snapshot.generated_at.is_none());
    }
}
