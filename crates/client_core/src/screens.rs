use std::sync::Arc;

use shared::domain::{Coordinates, EventMarker, ViewportRegion, ZoomScale};
use tracing::warn;

use crate::{
    event_form::{EventForm, SubmissionContext, SubmitOutcome},
    event_service::EventService,
    lifetime::ScreenLifetime,
    location::{LocationBackend, LocationError, LocationProvider, LocationState},
    map_controller::{marker_from_record, sample_markers, MapController, PlacedMarker, RegionError},
    session_store::SessionStore,
    EventMapApp,
};

/// The map tab: location lifecycle, viewport scale, markers and the
/// create-event sheet, all bound to one mount.
pub struct MapScreen {
    lifetime: ScreenLifetime,
    location: LocationProvider,
    map: Option<MapController>,
    markers: Vec<EventMarker>,
    form: EventForm,
    events: Arc<dyn EventService>,
    session: Arc<SessionStore>,
    submission: SubmissionTemplate,
}

#[derive(Debug, Clone, Default)]
struct SubmissionTemplate {
    user_id: Option<shared::domain::UserId>,
    end_time: Option<String>,
}

impl MapScreen {
    pub(crate) fn mount(app: &EventMapApp) -> Self {
        Self::with_backend(
            app.location_backend(),
            app.events(),
            app.session(),
            app.user_id(),
        )
    }

    fn with_backend(
        backend: Arc<dyn LocationBackend>,
        events: Arc<dyn EventService>,
        session: Arc<SessionStore>,
        user_id: Option<shared::domain::UserId>,
    ) -> Self {
        let lifetime = ScreenLifetime::new();
        Self {
            location: LocationProvider::new(backend, lifetime.clone()),
            lifetime,
            map: None,
            markers: sample_markers(),
            form: EventForm::new(),
            events,
            session,
            submission: SubmissionTemplate {
                user_id,
                end_time: None,
            },
        }
    }

    pub fn lifetime(&self) -> &ScreenLifetime {
        &self.lifetime
    }

    /// Asks for location, opens the map around the fix and loads remote
    /// events next to the built-in markers. A failed event fetch only logs.
    pub async fn load(&mut self) -> Result<Coordinates, LocationError> {
        let fix = self.location.locate().await?;
        self.map = Some(MapController::centered_on(fix));

        match self.lifetime.run(self.events.list_events()).await {
            Some(Ok(records)) => {
                self.markers = sample_markers();
                self.markers.extend(records.iter().map(marker_from_record));
            }
            Some(Err(err)) => warn!(%err, "failed to load events, showing sample markers"),
            None => return Err(LocationError::Detached),
        }
        Ok(fix)
    }

    pub fn location_state(&self) -> LocationState {
        self.location.state()
    }

    /// `None` until the map has a location fix to open on.
    pub fn map(&self) -> Option<&MapController> {
        self.map.as_ref()
    }

    pub fn on_region_change(&self, region: ViewportRegion) -> Option<Result<ZoomScale, RegionError>> {
        self.map.as_ref().map(|map| map.on_region_change(region))
    }

    pub fn markers(&self) -> &[EventMarker] {
        &self.markers
    }

    pub fn placed_markers(&self) -> Vec<PlacedMarker<'_>> {
        match &self.map {
            Some(map) => map.placed_markers(&self.markers),
            None => Vec::new(),
        }
    }

    pub fn form(&self) -> &EventForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut EventForm {
        &mut self.form
    }

    pub fn set_end_time(&mut self, end_time: Option<String>) {
        self.submission.end_time = end_time;
    }

    /// Submits the sheet at the current fix. Requires a loaded map. The
    /// account's user id is stamped only while a session is signed in.
    pub async fn submit_event(&mut self) -> Result<SubmitOutcome, LocationError> {
        let location = self.location.current_position().await?;
        let user_id = if self.session.is_authenticated().await {
            self.submission.user_id
        } else {
            None
        };
        let context = SubmissionContext {
            location,
            user_id,
            end_time: self.submission.end_time.clone(),
        };

        let outcome = self
            .form
            .submit(self.events.as_ref(), &context, &self.lifetime)
            .await;
        if let SubmitOutcome::Created(record) = &outcome {
            self.markers.push(marker_from_record(record));
        }
        Ok(outcome)
    }

    pub fn unmount(&self) {
        self.lifetime.unmount();
    }
}

impl Drop for MapScreen {
    fn drop(&mut self) {
        self.lifetime.unmount();
    }
}

#[cfg(test)]
#[path = "tests/screens_tests.rs"]
mod tests;
