use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(EventId);
id_newtype!(MarkerId);

/// Backend identity of the author of an event (`created_by` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

/// The authenticated user's identity record.
///
/// Serialized as `{ "email": ..., "name": ... }`; `name` is omitted when the
/// session was created by a plain login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Session {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Single uppercase letter shown in the profile avatar.
    pub fn avatar_initial(&self) -> char {
        self.email
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('U')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Geographic box currently visible on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl ViewportRegion {
    pub fn centered_on(center: Coordinates, latitude_delta: f64, longitude_delta: f64) -> Self {
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            latitude_delta,
            longitude_delta,
        }
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Rendering scale applied uniformly to every marker on the map.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64")]
pub struct ZoomScale(f64);

impl ZoomScale {
    pub const MIN: f64 = 0.5;
    pub const MAX: f64 = 1.0;

    /// Clamps `value` into `[MIN, MAX]`. NaN maps to `MIN`.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for ZoomScale {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl Default for ZoomScale {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

/// Point-of-interest pin with display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMarker {
    pub id: MarkerId,
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub description: String,
    pub theme_color: String,
    pub icon: String,
}

impl EventMarker {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Input of the event-creation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub timing: String,
    pub end_time: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: Option<UserId>,
}

/// An event as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub created_by: Option<UserId>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
