//! Viewport-driven marker scaling.
//!
//! Every settled pan or zoom produces a [`ViewportRegion`]. Its latitude span
//! is turned into a slippy-map zoom level (`log2(360 / latitudeDelta)`, zoom 0
//! spans the whole globe), divided by [`ZOOM_NORMALIZER`] and clamped into
//! the [`ZoomScale`] range. The latest region always wins and the resulting
//! scale applies to every marker at once.

use futures::{Stream, StreamExt};
use shared::domain::{
    Coordinates, EventMarker, EventRecord, MarkerId, ViewportRegion, ZoomScale,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::lifetime::ScreenLifetime;

pub const WORLD_LATITUDE_SPAN: f64 = 360.0;
pub const ZOOM_NORMALIZER: f64 = 15.0;
pub const DEFAULT_LATITUDE_DELTA: f64 = 0.02;
pub const DEFAULT_LONGITUDE_DELTA: f64 = 0.02;
pub const DEFAULT_THEME_COLOR: &str = "#6366F1";
pub const DEFAULT_MARKER_ICON: &str = "calendar-outline";

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RegionError {
    #[error("latitude delta must be a positive finite number, got {0}")]
    InvalidLatitudeDelta(f64),
}

/// Raw zoom level for a latitude span. Callers validate the span.
pub fn raw_zoom(latitude_delta: f64) -> f64 {
    (WORLD_LATITUDE_SPAN / latitude_delta).log2()
}

pub fn zoom_scale(region: &ViewportRegion) -> Result<ZoomScale, RegionError> {
    let delta = region.latitude_delta;
    if !delta.is_finite() || delta <= 0.0 {
        return Err(RegionError::InvalidLatitudeDelta(delta));
    }
    Ok(ZoomScale::new(raw_zoom(delta) / ZOOM_NORMALIZER))
}

/// Region the map opens with around a location fix.
pub fn initial_region(center: Coordinates) -> ViewportRegion {
    ViewportRegion::centered_on(center, DEFAULT_LATITUDE_DELTA, DEFAULT_LONGITUDE_DELTA)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub region: ViewportRegion,
    pub scale: ZoomScale,
}

/// A marker paired with the scale it is drawn at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedMarker<'a> {
    pub marker: &'a EventMarker,
    pub scale: ZoomScale,
}

pub struct MapController {
    view: watch::Sender<MapView>,
}

impl MapController {
    pub fn new(initial: ViewportRegion) -> Self {
        let scale = zoom_scale(&initial).unwrap_or_else(|err| {
            warn!(%err, "initial region rejected, using default scale");
            ZoomScale::default()
        });
        let (view, _) = watch::channel(MapView {
            region: initial,
            scale,
        });
        Self { view }
    }

    pub fn centered_on(center: Coordinates) -> Self {
        Self::new(initial_region(center))
    }

    pub fn view(&self) -> MapView {
        *self.view.borrow()
    }

    pub fn scale(&self) -> ZoomScale {
        self.view.borrow().scale
    }

    /// Applies a settled region. Invalid regions leave the current view
    /// untouched.
    pub fn on_region_change(&self, region: ViewportRegion) -> Result<ZoomScale, RegionError> {
        let scale = zoom_scale(&region)?;
        self.view.send_replace(MapView { region, scale });
        debug!(
            latitude_delta = region.latitude_delta,
            scale = scale.value(),
            "map region changed"
        );
        Ok(scale)
    }

    pub fn subscribe(&self) -> watch::Receiver<MapView> {
        self.view.subscribe()
    }

    /// Current scale followed by every later change.
    pub fn scale_stream(&self) -> impl Stream<Item = ZoomScale> {
        WatchStream::new(self.view.subscribe()).map(|view| view.scale)
    }

    /// Feeds regions into the controller until the stream ends or the screen
    /// unmounts. Returns how many regions were applied.
    pub async fn drive<S>(&self, regions: S, lifetime: &ScreenLifetime) -> usize
    where
        S: Stream<Item = ViewportRegion>,
    {
        let mut regions = std::pin::pin!(regions);
        let mut applied = 0;
        while let Some(Some(region)) = lifetime.run(regions.next()).await {
            match self.on_region_change(region) {
                Ok(_) => applied += 1,
                Err(err) => warn!(%err, "ignoring map region"),
            }
        }
        applied
    }

    pub fn placed_markers<'a>(&self, markers: &'a [EventMarker]) -> Vec<PlacedMarker<'a>> {
        let scale = self.scale();
        markers
            .iter()
            .map(|marker| PlacedMarker { marker, scale })
            .collect()
    }
}

pub fn marker_from_record(record: &EventRecord) -> EventMarker {
    EventMarker {
        id: MarkerId(record.id.0),
        latitude: record.latitude,
        longitude: record.longitude,
        title: record.title.clone(),
        description: record.description.clone(),
        theme_color: DEFAULT_THEME_COLOR.to_string(),
        icon: DEFAULT_MARKER_ICON.to_string(),
    }
}

/// Built-in pins shown before any events are loaded.
pub fn sample_markers() -> Vec<EventMarker> {
    let sample = |id, latitude, longitude, title: &str, description: &str, color: &str, icon: &str| {
        EventMarker {
            id: MarkerId(id),
            latitude,
            longitude,
            title: title.to_string(),
            description: description.to_string(),
            theme_color: color.to_string(),
            icon: icon.to_string(),
        }
    };

    vec![
        sample(
            1,
            37.78825,
            -122.4324,
            "Rooftop Party",
            "Live DJ and sunset views",
            "#8B5CF6",
            "musical-notes",
        ),
        sample(
            2,
            37.78425,
            -122.4284,
            "Pickup Basketball",
            "5v5, all levels welcome",
            "#f5576c",
            "basketball",
        ),
        sample(
            3,
            37.79125,
            -122.4364,
            "Street Food Night",
            "Twenty vendors, one block",
            "#fda085",
            "restaurant",
        ),
    ]
}

#[cfg(test)]
#[path = "tests/map_controller_tests.rs"]
mod tests;
