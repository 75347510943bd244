//! Map view controller.
//!
//! A [`ViewController`] owns one map view: its configuration, the host
//! viewport, the drawing surface and the marker batch. It can be driven
//! directly (`refresh().await`) or moved into a task with
//! [`ViewController::spawn`], after which it is steered through a
//! [`ViewHandle`]. The task debounces every trigger, fetches in the
//! background and reports each cycle as a [`RefreshEvent`].
//!
//! Refresh cycle: Idle → Debouncing → Fetching → (Rendering | Failed) → Idle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::client::EventFeed;
use crate::debounce::Debounce;
use crate::errors::QuakeMapError;
use crate::geo::{LatLng, Point};
use crate::legend::LegendRenderer;
use crate::models::FeatureCollection;
use crate::projection::Viewport;
use crate::query::{FDSN_QUERY_URL, FeedQuery};
use crate::render::{EventRenderer, RenderBatch, RenderOutcome};
use crate::scale::MagnitudeScale;
use crate::surface::DrawingSurface;

/// Quiet period before a burst of triggers turns into one refresh.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Capacity of the refresh event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What to show.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub center: LatLng,
    pub zoom: u8,
    /// Last instant of the window; `None` means now
    pub end_date: Option<DateTime<Utc>>,
    pub window_days: i64,
    /// FDSN event type
    pub event_type: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            center: LatLng::new(47.598_877, -122.330_916),
            zoom: 5,
            end_date: None,
            window_days: 1,
            event_type: "earthquake".to_string(),
        }
    }
}

/// Everything needed to build a controller.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub view: ViewConfig,
    /// Host map size in pixels
    pub size: Point,
    /// Feed query endpoint
    pub feed_url: String,
    pub debounce: Duration,
    /// Drop completions of refreshes that were superseded before they landed
    pub discard_stale: bool,
    pub scale: MagnitudeScale,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            view: ViewConfig::default(),
            size: Point::new(960.0, 600.0),
            feed_url: FDSN_QUERY_URL.to_string(),
            debounce: DEFAULT_DEBOUNCE,
            discard_stale: true,
            scale: MagnitudeScale::usgs(),
        }
    }
}

/// A change requested of a running controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetCenter(LatLng),
    SetZoom(u8),
    SetWindow {
        end: Option<DateTime<Utc>>,
        days: i64,
    },
    SetEventType(String),
    /// The host map finished a move or zoom
    Settle(Viewport),
    PanBy(Point),
    /// Refresh without changing anything
    Refresh,
}

/// Progress report from a running controller.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// A fetch was issued
    Requested { token: u64, url: String },
    /// A new batch is on screen
    Rendered { token: u64, markers: usize },
    /// The response had nothing drawable; the previous batch stays
    Unchanged { token: u64 },
    /// The response arrived after a newer request was issued
    Discarded { token: u64 },
    Failed {
        token: u64,
        error: Arc<QuakeMapError>,
    },
}

impl RefreshEvent {
    #[must_use]
    pub fn token(&self) -> u64 {
        match self {
            Self::Requested { token, .. }
            | Self::Rendered { token, .. }
            | Self::Unchanged { token }
            | Self::Discarded { token }
            | Self::Failed { token, .. } => *token,
        }
    }
}

/// Where the controller is in its refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Debouncing,
    Fetching,
    Rendering,
    Failed,
}

/// Owns one map view.
pub struct ViewController<F, S> {
    config: ViewConfig,
    viewport: Viewport,
    feed: Arc<F>,
    surface: S,
    renderer: EventRenderer,
    scale: MagnitudeScale,
    feed_url: String,
    debounce: Duration,
    discard_stale: bool,
    phase: RefreshPhase,
}

impl<F: EventFeed, S: DrawingSurface> ViewController<F, S> {
    /// Create a controller. Nothing is drawn or fetched yet.
    ///
    /// A window shorter than one day is raised to one day.
    pub fn new(options: ViewOptions, feed: F, surface: S) -> Self {
        let mut config = options.view;
        config.window_days = config.window_days.max(1);

        let viewport = Viewport::new(config.center, config.zoom, options.size);
        config.zoom = viewport.zoom();

        Self {
            config,
            viewport,
            feed: Arc::new(feed),
            surface,
            renderer: EventRenderer::new(),
            scale: options.scale,
            feed_url: options.feed_url,
            debounce: options.debounce,
            discard_stale: options.discard_stale,
            phase: RefreshPhase::Idle,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[must_use]
    pub fn batch(&self) -> &RenderBatch {
        self.renderer.batch()
    }

    #[must_use]
    pub fn phase(&self) -> RefreshPhase {
        self.phase
    }

    /// Size the surface to the viewport and draw the legend.
    pub fn initialize(&mut self) {
        self.surface.resize(self.viewport.size());
        let anchor = self.legend_anchor();
        LegendRenderer.render(&mut self.surface, &self.scale, anchor);
    }

    pub fn set_center(&mut self, center: LatLng) {
        self.viewport.set_center(center);
        self.config.center = center;
    }

    /// Zoom is clamped to the host map's limits.
    pub fn set_zoom(&mut self, zoom: u8) {
        self.viewport.set_zoom(zoom);
        self.config.zoom = self.viewport.zoom();
    }

    /// Set the time window. A non-positive `days` is kept and rejected by
    /// the next refresh.
    pub fn set_window(&mut self, end: Option<DateTime<Utc>>, days: i64) {
        self.config.end_date = end;
        self.config.window_days = days;
    }

    pub fn set_event_type(&mut self, event_type: impl Into<String>) {
        self.config.event_type = event_type.into();
    }

    /// Adopt the viewport the host map settled on.
    pub fn settle(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.config.center = viewport.center();
        self.config.zoom = viewport.zoom();
        self.surface.resize(viewport.size());
    }

    pub fn pan_by(&mut self, offset: Point) {
        self.viewport.pan_by(offset);
        self.config.center = self.viewport.center();
    }

    /// Apply a command to the configuration or viewport.
    pub fn apply(&mut self, command: Command) {
        debug!("applying {:?}", command);
        match command {
            Command::SetCenter(center) => self.set_center(center),
            Command::SetZoom(zoom) => self.set_zoom(zoom),
            Command::SetWindow { end, days } => self.set_window(end, days),
            Command::SetEventType(event_type) => self.set_event_type(event_type),
            Command::Settle(viewport) => self.settle(viewport),
            Command::PanBy(offset) => self.pan_by(offset),
            Command::Refresh => {}
        }
    }

    /// Feed query for the current configuration and viewport.
    #[must_use]
    pub fn feed_query(&self) -> FeedQuery {
        FeedQuery {
            end: self.config.end_date,
            window_days: self.config.window_days,
            bounds: Some(self.viewport.bounds()),
            event_type: self.config.event_type.clone(),
        }
    }

    /// Request URL for the current view, resolving an open end date to `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a non-positive window.
    pub fn request_url(&self, now: DateTime<Utc>) -> Result<String, QuakeMapError> {
        self.feed_query().build_at(&self.feed_url, now)
    }

    /// Draw a feed response: legend first, then the events.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface fails to present a new batch.
    pub fn show(&mut self, collection: &FeatureCollection) -> Result<RenderOutcome, QuakeMapError> {
        self.phase = RefreshPhase::Rendering;
        let events = collection.events();

        let anchor = self.legend_anchor();
        LegendRenderer.render(&mut self.surface, &self.scale, anchor);

        let projection = self.viewport.projection();
        let outcome =
            self.renderer
                .render_events(&events, &self.scale, &projection, &mut self.surface);

        if matches!(outcome, RenderOutcome::Rendered { .. }) {
            self.surface
                .present()
                .inspect_err(|_| self.phase = RefreshPhase::Failed)?;
        }
        self.phase = RefreshPhase::Idle;
        Ok(outcome)
    }

    /// Run one refresh cycle now, without debouncing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` before any request for a bad window, or
    /// the fetch error. Nothing is retried.
    pub async fn refresh(&mut self) -> Result<RenderOutcome, QuakeMapError> {
        let url = match self.request_url(Utc::now()) {
            Ok(url) => url,
            Err(e) => {
                self.phase = RefreshPhase::Failed;
                return Err(e);
            }
        };

        self.phase = RefreshPhase::Fetching;
        debug!("requesting {}", url);
        match self.feed.fetch(&url).await {
            Ok(collection) => self.show(&collection),
            Err(e) => {
                self.phase = RefreshPhase::Failed;
                Err(e)
            }
        }
    }

    fn legend_anchor(&self) -> Point {
        let height = self.viewport.size().y;
        Point::new(0.0, (height - LegendRenderer::layer_height()).max(0.0))
    }

    fn set_phase(&mut self, phase: RefreshPhase) {
        if self.phase != phase {
            debug!("refresh phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

impl<F: EventFeed, S: DrawingSurface + Send + 'static> ViewController<F, S> {
    /// Move the controller into a task.
    ///
    /// The task initializes the view, schedules the first refresh and then
    /// serves commands until every [`ViewHandle`] is dropped, at which point
    /// it hands the controller back through the join handle. Fetches still
    /// in flight at that moment are abandoned.
    pub fn spawn(self) -> (ViewHandle, JoinHandle<Self>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let driver = Driver {
            debounce: Debounce::new(self.debounce),
            controller: self,
            in_flight: JoinSet::new(),
            issued: 0,
            events: events_tx.clone(),
        };
        let task = tokio::spawn(driver.run(commands_rx));

        (
            ViewHandle {
                commands: commands_tx,
                events: events_tx,
            },
            task,
        )
    }
}

type FetchResult = (u64, Result<FeatureCollection, QuakeMapError>);

/// Task-side state of a spawned controller.
struct Driver<F, S> {
    controller: ViewController<F, S>,
    debounce: Debounce,
    in_flight: JoinSet<FetchResult>,
    /// Token of the most recently issued request
    issued: u64,
    events: broadcast::Sender<RefreshEvent>,
}

impl<F: EventFeed, S: DrawingSurface + Send + 'static> Driver<F, S> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> ViewController<F, S> {
        self.controller.initialize();
        self.schedule();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.controller.apply(command);
                    self.schedule();
                }
                () = self.debounce.expired(), if self.debounce.is_pending() => {
                    self.issue();
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    match joined {
                        Ok((token, result)) => self.complete(token, result),
                        Err(e) => error!("fetch task failed: {e}"),
                    }
                    self.settle_phase();
                }
            }
        }

        debug!("view handles dropped, stopping controller");
        self.controller
    }

    fn schedule(&mut self) {
        self.debounce.trigger();
        self.controller.set_phase(RefreshPhase::Debouncing);
    }

    fn issue(&mut self) {
        self.issued += 1;
        let token = self.issued;

        let url = match self.controller.request_url(Utc::now()) {
            Ok(url) => url,
            Err(e) => {
                warn!("refresh {token} rejected: {e}");
                self.controller.set_phase(RefreshPhase::Failed);
                self.emit(RefreshEvent::Failed {
                    token,
                    error: Arc::new(e),
                });
                self.settle_phase();
                return;
            }
        };

        debug!("refresh {token}: requesting {url}");
        self.controller.set_phase(RefreshPhase::Fetching);
        self.emit(RefreshEvent::Requested {
            token,
            url: url.clone(),
        });

        let feed = Arc::clone(&self.controller.feed);
        self.in_flight.spawn(async move {
            let result = feed.fetch(&url).await;
            (token, result)
        });
    }

    fn complete(&mut self, token: u64, result: Result<FeatureCollection, QuakeMapError>) {
        if self.controller.discard_stale && token != self.issued {
            debug!("refresh {token} superseded by {}, discarding", self.issued);
            self.emit(RefreshEvent::Discarded { token });
            return;
        }

        let event = match result.and_then(|collection| self.controller.show(&collection)) {
            Ok(RenderOutcome::Rendered { markers }) => {
                info!("refresh {token}: {markers} events on map");
                RefreshEvent::Rendered { token, markers }
            }
            Ok(RenderOutcome::Unchanged) => {
                info!("refresh {token}: no events in view");
                RefreshEvent::Unchanged { token }
            }
            Err(e) => {
                error!("refresh {token} failed: {e}");
                self.controller.set_phase(RefreshPhase::Failed);
                RefreshEvent::Failed {
                    token,
                    error: Arc::new(e),
                }
            }
        };
        self.emit(event);
    }

    /// Pick the resting phase after a cycle step.
    fn settle_phase(&mut self) {
        let phase = if self.debounce.is_pending() {
            RefreshPhase::Debouncing
        } else if !self.in_flight.is_empty() {
            RefreshPhase::Fetching
        } else {
            RefreshPhase::Idle
        };
        self.controller.set_phase(phase);
    }

    fn emit(&self, event: RefreshEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Steers a spawned controller. Cheap to clone; the controller stops when
/// the last handle is dropped.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<RefreshEvent>,
}

impl ViewHandle {
    /// Queue a command; the controller refreshes after the debounce period.
    ///
    /// # Errors
    ///
    /// Returns `Stopped` if the controller task has ended.
    pub fn send(&self, command: Command) -> Result<(), QuakeMapError> {
        self.commands.send(command).map_err(|_| QuakeMapError::Stopped)
    }

    /// # Errors
    ///
    /// Returns `Stopped` if the controller task has ended.
    pub fn set_center(&self, center: LatLng) -> Result<(), QuakeMapError> {
        self.send(Command::SetCenter(center))
    }

    /// # Errors
    ///
    /// Returns `Stopped` if the controller task has ended.
    pub fn set_zoom(&self, zoom: u8) -> Result<(), QuakeMapError> {
        self.send(Command::SetZoom(zoom))
    }

    /// # Errors
    ///
    /// Returns `Stopped` if the controller task has ended.
    pub fn set_window(&self, end: Option<DateTime<Utc>>, days: i64) -> Result<(), QuakeMapError> {
        self.send(Command::SetWindow { end, days })
    }

    /// # Errors
    ///
    /// Returns `Stopped` if the controller task has ended.
    pub fn set_event_type(&self, event_type: impl Into<String>) -> Result<(), QuakeMapError> {
        self.send(Command::SetEventType(event_type.into()))
    }

    /// Report that the host map settled on `viewport`.
    ///
    /// # Errors
    ///
    /// Returns `Stopped` if the controller task has ended.
    pub fn settle(&self, viewport: Viewport) -> Result<(), QuakeMapError> {
        self.send(Command::Settle(viewport))
    }

    /// Receive refresh events from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::query::parse_timestamp;
    use crate::surface::SvgSurface;

    type Script = VecDeque<(Duration, Result<FeatureCollection, QuakeMapError>)>;

    /// Answers requests from a script, recording every URL.
    #[derive(Default)]
    struct ScriptedFeed {
        script: Mutex<Script>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedFeed {
        fn new(responses: impl IntoIterator<Item = (Duration, Result<FeatureCollection, QuakeMapError>)>) -> Self {
            Self {
                script: Mutex::new(responses.into_iter().collect()),
                requests: Arc::default(),
            }
        }

        fn always(collection: &FeatureCollection) -> Self {
            Self::new((0..16).map(|_| (Duration::ZERO, Ok(collection.clone()))))
        }

        fn requests(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.requests)
        }
    }

    impl EventFeed for ScriptedFeed {
        async fn fetch(&self, url: &str) -> Result<FeatureCollection, QuakeMapError> {
            self.requests.lock().unwrap().push(url.to_string());
            let next = self.script.lock().unwrap().pop_front();
            let (delay, result) = next.unwrap_or((Duration::ZERO, Ok(FeatureCollection::empty())));
            tokio::time::sleep(delay).await;
            result
        }
    }

    fn denali() -> FeatureCollection {
        serde_json::from_str(include_str!("../tests/fixtures/denali_2002.json")).unwrap()
    }

    fn collection(json: &str) -> FeatureCollection {
        serde_json::from_str(json).unwrap()
    }

    fn options() -> ViewOptions {
        ViewOptions {
            view: ViewConfig {
                center: LatLng::new(47.5989, -122.3309),
                zoom: 5,
                end_date: Some(parse_timestamp("2002-11-06T23:59:59Z").unwrap()),
                window_days: 1,
                event_type: "earthquake".into(),
            },
            ..ViewOptions::default()
        }
    }

    fn controller(feed: ScriptedFeed) -> ViewController<ScriptedFeed, SvgSurface> {
        ViewController::new(options(), feed, SvgSurface::default())
    }

    #[tokio::test]
    async fn test_refresh_builds_viewport_query() {
        let feed = ScriptedFeed::always(&denali());
        let requests = feed.requests();
        let mut view = controller(feed);
        view.initialize();

        view.refresh().await.unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let url = &requests[0];
        assert!(url.contains("starttime=2002-11-05T23:59:59Z&endtime=2002-11-06T23:59:59Z"));

        let b = view.viewport().bounds();
        assert!(url.contains(&format!("minlatitude={}&maxlatitude={}", b.min_lat, b.max_lat)));
        assert!(url.contains(&format!("minlongitude={}&maxlongitude={}", b.min_lon, b.max_lon)));
        assert!(b.min_lat < 47.5989 && 47.5989 < b.max_lat);
        assert!(url.ends_with("&eventtype=earthquake&orderby=time-asc"));
    }

    #[tokio::test]
    async fn test_null_geometry_feature_dropped() {
        let body = collection(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","id":"us1","geometry":{"type":"Point","coordinates":[-122.0,47.0,12.0]},"properties":{"mag":3.1,"url":"https://earthquake.usgs.gov/earthquakes/eventpage/us1"}},
                {"type":"Feature","id":"us2","geometry":null,"properties":{"mag":2.0,"url":"https://earthquake.usgs.gov/earthquakes/eventpage/us2"}}
            ]}"#,
        );
        let mut view = controller(ScriptedFeed::always(&body));
        view.initialize();

        let outcome = view.refresh().await.unwrap();

        assert_eq!(outcome, RenderOutcome::Rendered { markers: 1 });
        assert_eq!(view.surface().markers().len(), 1);
        assert_eq!(view.batch().ids(), ["us1"]);
        assert_eq!(view.phase(), RefreshPhase::Idle);
    }

    #[tokio::test]
    async fn test_non_positive_window_issues_no_request() {
        let feed = ScriptedFeed::always(&denali());
        let requests = feed.requests();
        let mut view = controller(feed);

        view.set_window(None, 0);
        let err = view.refresh().await.unwrap_err();

        assert!(matches!(err, QuakeMapError::InvalidParameter(_)));
        assert!(requests.lock().unwrap().is_empty());
        assert_eq!(view.phase(), RefreshPhase::Failed);
    }

    #[tokio::test]
    async fn test_unusable_viewport_issues_no_request() {
        let feed = ScriptedFeed::always(&denali());
        let requests = feed.requests();
        let mut view = controller(feed);

        view.set_center(LatLng::new(f64::NAN, -122.3));
        let err = view.refresh().await.unwrap_err();

        assert!(matches!(err, QuakeMapError::InvalidParameter(_)));
        assert!(requests.lock().unwrap().is_empty());

        // a view wider than the globe is capped, not rejected
        view.set_center(LatLng::new(0.0, 0.0));
        view.set_zoom(3);
        view.settle(Viewport::new(LatLng::new(0.0, 0.0), 3, Point::new(3000.0, 600.0)));
        view.refresh().await.unwrap();
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("minlongitude=-180&maxlongitude=180&"));
    }

    #[tokio::test]
    async fn test_construction_raises_short_window() {
        let mut opts = options();
        opts.view.window_days = -3;
        let view = ViewController::new(opts, ScriptedFeed::default(), SvgSurface::default());
        assert_eq!(view.config().window_days, 1);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let feed = ScriptedFeed::new([(
            Duration::ZERO,
            Err(QuakeMapError::Api {
                status: 503,
                message: "Service Unavailable".into(),
            }),
        )]);
        let mut view = controller(feed);

        let err = view.refresh().await.unwrap_err();
        assert!(err.is_fetch_error());
    }

    #[tokio::test]
    async fn test_empty_response_keeps_previous_markers() {
        let feed = ScriptedFeed::new([
            (Duration::ZERO, Ok(denali())),
            (Duration::ZERO, Ok(FeatureCollection::empty())),
        ]);
        let mut view = controller(feed);
        view.initialize();
        view.set_center(LatLng::new(62.0, -146.8));

        view.refresh().await.unwrap();
        let geometry = view.surface().geometry();
        assert_eq!(view.surface().markers().len(), 3);

        let outcome = view.refresh().await.unwrap();
        assert_eq!(outcome, RenderOutcome::Unchanged);
        assert_eq!(view.surface().markers().len(), 3);
        assert_eq!(view.surface().geometry(), geometry);
        assert_eq!(view.surface().legends().len(), 1);
    }

    #[tokio::test]
    async fn test_setters_update_config() {
        let mut view = controller(ScriptedFeed::default());
        let end = parse_timestamp("1964-03-28T23:59:59Z").unwrap();

        view.set_center(LatLng::new(59.385_651, -147.024_957));
        view.set_zoom(20);
        view.set_window(Some(end), 4);
        view.set_event_type("explosion");

        let config = view.config();
        assert_eq!(config.center, LatLng::new(59.385_651, -147.024_957));
        assert_eq!(config.zoom, crate::projection::MAX_ZOOM);
        assert_eq!(config.end_date, Some(end));
        assert_eq!(config.window_days, 4);
        assert_eq!(config.event_type, "explosion");
        assert_eq!(view.viewport().center(), config.center);
    }

    #[tokio::test]
    async fn test_settle_adopts_host_viewport() {
        let mut view = controller(ScriptedFeed::default());
        let vp = Viewport::new(LatLng::new(7.655_104, 94.012_632), 6, Point::new(800.0, 500.0));

        view.apply(Command::Settle(vp));

        assert_eq!(view.viewport(), &vp);
        assert_eq!(view.config().zoom, 6);
        assert_eq!(view.config().center, vp.center());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_changes_refreshes_once() {
        let feed = ScriptedFeed::always(&denali());
        let requests = feed.requests();
        let (handle, task) = controller(feed).spawn();
        let mut events = handle.subscribe();

        handle.set_zoom(6).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.set_zoom(7).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.set_event_type("explosion").unwrap();

        let first = events.recv().await.unwrap();
        let RefreshEvent::Requested { token, url } = first else {
            panic!("expected a request, got {first:?}");
        };
        assert_eq!(token, 1);
        assert!(url.contains("eventtype=explosion"));

        let second = events.recv().await.unwrap();
        assert!(matches!(second, RefreshEvent::Rendered { token: 1, .. }));

        let quiet = tokio::time::timeout(Duration::from_secs(5), events.recv()).await;
        assert!(quiet.is_err(), "unexpected extra refresh");
        assert_eq!(requests.lock().unwrap().len(), 1);

        drop(handle);
        let view = task.await.unwrap();
        assert_eq!(view.config().zoom, 7);
        assert_eq!(view.config().event_type, "explosion");
        assert_eq!(view.phase(), RefreshPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_discarded() {
        let feed = ScriptedFeed::new([
            (Duration::from_secs(2), Ok(denali())),
            (Duration::from_millis(100), Ok(FeatureCollection::empty())),
        ]);
        let (handle, task) = controller(feed).spawn();
        let mut events = handle.subscribe();

        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Requested { token: 1, .. }));
        handle.set_zoom(6).unwrap();
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Requested { token: 2, .. }));
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Unchanged { token: 2 }));
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Discarded { token: 1 }));

        drop(handle);
        let view = task.await.unwrap();
        assert!(view.batch().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_completion_wins_without_sequencing() {
        let single = collection(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","id":"late","geometry":{"type":"Point","coordinates":[-122.0,47.0,3.0]},"properties":{"mag":1.5}}
            ]}"#,
        );
        let feed = ScriptedFeed::new([
            (Duration::from_secs(2), Ok(single)),
            (Duration::from_millis(100), Ok(denali())),
        ]);
        let mut opts = options();
        opts.discard_stale = false;
        let (handle, task) = ViewController::new(opts, feed, SvgSurface::default()).spawn();
        let mut events = handle.subscribe();

        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Requested { token: 1, .. }));
        handle.set_event_type("earthquake").unwrap();
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Requested { token: 2, .. }));
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Rendered { token: 2, markers: 3 }));
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Rendered { token: 1, markers: 1 }));

        drop(handle);
        let view = task.await.unwrap();
        assert_eq!(view.batch().ids(), ["late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reported_and_controller_keeps_running() {
        let feed = ScriptedFeed::new([
            (
                Duration::ZERO,
                Err(QuakeMapError::Api {
                    status: 400,
                    message: "Bad Request".into(),
                }),
            ),
            (Duration::ZERO, Ok(denali())),
        ]);
        let (handle, task) = controller(feed).spawn();
        let mut events = handle.subscribe();

        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Requested { token: 1, .. }));
        match events.recv().await.unwrap() {
            RefreshEvent::Failed { token, error } => {
                assert_eq!(token, 1);
                assert!(error.is_fetch_error());
            }
            other => panic!("expected failure, got {other:?}"),
        }

        handle.send(Command::Refresh).unwrap();
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Requested { token: 2, .. }));
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Rendered { token: 2, .. }));

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_window_reported_without_request() {
        let feed = ScriptedFeed::always(&denali());
        let requests = feed.requests();
        let (handle, task) = controller(feed).spawn();
        let mut events = handle.subscribe();

        handle.set_window(None, 0).unwrap();
        match events.recv().await.unwrap() {
            RefreshEvent::Failed { error, .. } => {
                assert!(matches!(*error, QuakeMapError::InvalidParameter(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(requests.lock().unwrap().is_empty());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_are_independent() {
        let (seattle, seattle_task) = controller(ScriptedFeed::always(&denali())).spawn();

        let mut opts = options();
        opts.view.center = LatLng::new(62.0, -146.8);
        opts.view.zoom = 6;
        let (alaska, alaska_task) =
            ViewController::new(opts, ScriptedFeed::always(&denali()), SvgSurface::default()).spawn();

        let mut seattle_events = seattle.subscribe();
        let mut alaska_events = alaska.subscribe();
        alaska.set_event_type("explosion").unwrap();

        let RefreshEvent::Requested { url: seattle_url, .. } = seattle_events.recv().await.unwrap() else {
            panic!("expected a request");
        };
        let RefreshEvent::Requested { url: alaska_url, .. } = alaska_events.recv().await.unwrap() else {
            panic!("expected a request");
        };
        assert!(seattle_url.contains("eventtype=earthquake"));
        assert!(alaska_url.contains("eventtype=explosion"));

        drop(seattle);
        drop(alaska);
        let seattle_view = seattle_task.await.unwrap();
        let alaska_view = alaska_task.await.unwrap();
        assert_eq!(seattle_view.config().event_type, "earthquake");
        assert_eq!(alaska_view.config().zoom, 6);
    }
}
