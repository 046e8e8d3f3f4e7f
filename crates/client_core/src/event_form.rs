use shared::domain::{Coordinates, EventRecord, NewEvent, UserId};
use tracing::{debug, info, warn};

use crate::{
    event_service::{EventService, EventServiceError},
    lifetime::ScreenLifetime,
};

/// Text typed into the create-event sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    pub timing: String,
}

impl EventDraft {
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.description, &self.timing]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// Where and by whom a submitted event is created.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionContext {
    pub location: Coordinates,
    pub user_id: Option<UserId>,
    pub end_time: Option<String>,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// A field was blank; nothing was sent and the draft is unchanged.
    Incomplete,
    Created(EventRecord),
    /// The collaborator was called and failed. The sheet is still cleared.
    Failed(EventServiceError),
    /// The screen unmounted while the call was in flight.
    Detached,
}

impl SubmitOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Create-event sheet state: the draft plus whether the sheet is shown.
#[derive(Debug, Default)]
pub struct EventForm {
    draft: EventDraft,
    visible: bool,
}

impl EventForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) {
        self.visible = true;
    }

    pub fn close(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn draft(&self) -> &EventDraft {
        &self.draft
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    pub fn set_timing(&mut self, timing: impl Into<String>) {
        self.draft.timing = timing.into();
    }

    /// Sends the draft to `service` once. Whatever the service answers, the
    /// draft is cleared and the sheet dismissed afterwards.
    pub async fn submit(
        &mut self,
        service: &dyn EventService,
        context: &SubmissionContext,
        lifetime: &ScreenLifetime,
    ) -> SubmitOutcome {
        if !self.draft.is_complete() {
            debug!("event draft incomplete, not submitting");
            return SubmitOutcome::Incomplete;
        }

        let event = NewEvent {
            title: self.draft.name.clone(),
            description: self.draft.description.clone(),
            timing: self.draft.timing.clone(),
            end_time: context.end_time.clone(),
            latitude: context.location.latitude,
            longitude: context.location.longitude,
            user_id: context.user_id,
        };

        let Some(result) = lifetime.run(service.create_event(&event)).await else {
            return SubmitOutcome::Detached;
        };

        self.draft = EventDraft::default();
        self.visible = false;

        match result {
            Ok(record) => {
                info!(event_id = record.id.0, "event submitted");
                SubmitOutcome::Created(record)
            }
            Err(err) => {
                warn!(%err, title = %event.title, "event submission failed");
                SubmitOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/event_form_tests.rs"]
mod tests;
