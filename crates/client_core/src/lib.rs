use std::sync::Arc;

use shared::domain::UserId;
use storage::KeyValueStore;

pub mod auth_form;
pub mod event_form;
pub mod event_service;
pub mod lifetime;
pub mod location;
pub mod map_controller;
pub mod screens;
pub mod session_store;

pub use auth_form::{SignupForm, SignupFormError};
pub use event_form::{EventDraft, EventForm, SubmissionContext, SubmitOutcome};
pub use event_service::{EventService, EventServiceError, MissingEventService, SupabaseEventService};
pub use lifetime::ScreenLifetime;
pub use location::{
    FixedLocationBackend, LocationBackend, LocationError, LocationProvider, LocationState,
    PermissionStatus,
};
pub use map_controller::{MapController, MapView, PlacedMarker};
pub use screens::MapScreen;
pub use session_store::{AuthError, SessionEvent, SessionStore};

/// Which navigation stack the shell shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Auth,
    Tabs,
}

/// Root composition: owns the process-wide session and the boundaries the
/// screens talk to.
pub struct EventMapApp {
    session: Arc<SessionStore>,
    events: Arc<dyn EventService>,
    location: Arc<dyn LocationBackend>,
    user_id: Option<UserId>,
}

impl EventMapApp {
    /// Wires the app and restores any persisted session.
    pub async fn start(
        store: Arc<dyn KeyValueStore>,
        events: Arc<dyn EventService>,
        location: Arc<dyn LocationBackend>,
    ) -> Self {
        Self {
            session: Arc::new(SessionStore::open(store).await),
            events,
            location,
            user_id: None,
        }
    }

    /// Backend user id of the account, stamped on events created while a
    /// session is signed in.
    pub fn with_user_id(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn session(&self) -> Arc<SessionStore> {
        self.session.clone()
    }

    pub fn events(&self) -> Arc<dyn EventService> {
        self.events.clone()
    }

    pub fn location_backend(&self) -> Arc<dyn LocationBackend> {
        self.location.clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub async fn route(&self) -> Route {
        if self.session.is_authenticated().await {
            Route::Tabs
        } else {
            Route::Auth
        }
    }

    pub fn mount_map_screen(&self) -> MapScreen {
        MapScreen::mount(self)
    }
}
