use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::Coordinates;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::lifetime::ScreenLifetime;

pub const PERMISSION_DENIED_MESSAGE: &str = "Permission to access location was denied";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Device geolocation boundary.
#[async_trait]
pub trait LocationBackend: Send + Sync {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus>;
    async fn current_position(&self) -> Result<Coordinates>;
}

/// Backend answering with a configured permission and position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationBackend {
    pub permission: PermissionStatus,
    pub position: Coordinates,
}

impl FixedLocationBackend {
    pub fn granted(position: Coordinates) -> Self {
        Self {
            permission: PermissionStatus::Granted,
            position,
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: PermissionStatus::Denied,
            position: Coordinates::new(0.0, 0.0),
        }
    }
}

#[async_trait]
impl LocationBackend for FixedLocationBackend {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus> {
        Ok(self.permission)
    }

    async fn current_position(&self) -> Result<Coordinates> {
        Ok(self.position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationState {
    Unrequested,
    Requesting,
    Granted,
    Located(Coordinates),
    Denied { message: String },
    Unavailable { message: String },
}

impl LocationState {
    /// Denied and unavailable are final for the screen that owns the provider.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Denied { .. } | Self::Unavailable { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Denied { message } | Self::Unavailable { message } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location permission was already requested for this screen")]
    AlreadyRequested,
    #[error("{0}")]
    Denied(String),
    #[error("location permission has not been granted")]
    NotGranted,
    #[error("location unavailable: {0}")]
    Unavailable(String),
    #[error("screen closed before the location request finished")]
    Detached,
}

/// Permission lifecycle and one-shot fix for a single screen mount.
///
/// `Unrequested -> Requesting -> Granted -> Located`, or `Denied` after the
/// prompt. There is no re-prompt: a second request on the same provider is
/// refused.
pub struct LocationProvider {
    backend: Arc<dyn LocationBackend>,
    lifetime: ScreenLifetime,
    state: watch::Sender<LocationState>,
}

impl LocationProvider {
    pub fn new(backend: Arc<dyn LocationBackend>, lifetime: ScreenLifetime) -> Self {
        let (state, _) = watch::channel(LocationState::Unrequested);
        Self {
            backend,
            lifetime,
            state,
        }
    }

    pub fn state(&self) -> LocationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationState> {
        self.state.subscribe()
    }

    pub async fn request_permission(&self) -> Result<bool, LocationError> {
        let started = self.state.send_if_modified(|state| {
            if *state != LocationState::Unrequested {
                return false;
            }
            *state = LocationState::Requesting;
            true
        });
        if !started {
            return Err(LocationError::AlreadyRequested);
        }

        let outcome = self
            .lifetime
            .run(self.backend.request_foreground_permission())
            .await
            .ok_or(LocationError::Detached)?;

        match outcome {
            Ok(PermissionStatus::Granted) => {
                self.state.send_replace(LocationState::Granted);
                Ok(true)
            }
            Ok(PermissionStatus::Denied) => {
                warn!("location permission denied");
                self.state.send_replace(LocationState::Denied {
                    message: PERMISSION_DENIED_MESSAGE.to_string(),
                });
                Ok(false)
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "location permission request failed");
                self.state.send_replace(LocationState::Unavailable {
                    message: message.clone(),
                });
                Err(LocationError::Unavailable(message))
            }
        }
    }

    /// One-shot fix. Only valid once permission is granted; a second call
    /// returns the fix already taken.
    pub async fn current_position(&self) -> Result<Coordinates, LocationError> {
        match self.state() {
            LocationState::Granted => {}
            LocationState::Located(coordinates) => return Ok(coordinates),
            LocationState::Denied { message } => return Err(LocationError::Denied(message)),
            LocationState::Unavailable { message } => {
                return Err(LocationError::Unavailable(message))
            }
            LocationState::Unrequested | LocationState::Requesting => {
                return Err(LocationError::NotGranted)
            }
        }

        let outcome = self
            .lifetime
            .run(self.backend.current_position())
            .await
            .ok_or(LocationError::Detached)?;

        match outcome {
            Ok(coordinates) => {
                info!(
                    latitude = coordinates.latitude,
                    longitude = coordinates.longitude,
                    "location fix acquired"
                );
                self.state.send_replace(LocationState::Located(coordinates));
                Ok(coordinates)
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "failed to read current position");
                self.state.send_replace(LocationState::Unavailable {
                    message: message.clone(),
                });
                Err(LocationError::Unavailable(message))
            }
        }
    }

    /// Requests permission, then takes the fix.
    pub async fn locate(&self) -> Result<Coordinates, LocationError> {
        if !self.request_permission().await? {
            return Err(LocationError::Denied(PERMISSION_DENIED_MESSAGE.to_string()));
        }
        self.current_position().await
    }
}

#[cfg(test)]
#[path = "tests/location_tests.rs"]
mod tests;
