//! View adapters and the rendering surfaces they drive.
//!
//! An adapter turns the current [`Selection`] plus the derived statistics into
//! draw calls on its surface, and turns user gestures coming back from that
//! surface into selection requests. Adapters never talk to each other.

pub mod layout;
pub mod map;
pub mod primary;
pub mod ranked;
pub mod transition;

use crate::error::{DashboardError, Result};
use crate::ranking::DerivedStats;
use crate::selection::SelectRequest;
use crate::types::{CityId, GeoPoint, IndicatorTable, Selection};
use layout::{Layout, Rect};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use transition::Transition;

pub use map::MapAdapter;
pub use primary::PrimaryChartAdapter;
pub use ranked::RankedChartAdapter;

/// The table and everything derived from it. Replaced as a whole.
#[derive(Debug)]
pub struct Snapshot {
    pub table: Arc<IndicatorTable>,
    pub stats: Arc<DerivedStats>,
}

impl Snapshot {
    pub fn new(table: Arc<IndicatorTable>) -> Self {
        let stats = Arc::new(DerivedStats::compute(&table));
        Self { table, stats }
    }

    /// Fails with `EmptyInput` when there is nothing a view could draw.
    pub fn ensure_populated(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(DashboardError::EmptyInput("no cities in the table"));
        }
        if self.table.codes().is_empty() {
            return Err(DashboardError::EmptyInput("no indicator columns"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Map,
    Primary,
    Ranked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// Nothing rendered yet.
    Blank,
    Ready,
    /// No cities or no indicators to show.
    Empty,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarKey {
    City(CityId),
    Indicator(String),
}

impl fmt::Display for BarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarKey::City(id) => write!(f, "city#{id}"),
            BarKey::Indicator(code) => f.write_str(code),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    MarkerClick(CityId),
    /// Click on the map background.
    MapClick,
    ZoomEnd,
    BarClick(BarKey),
    BarHover(Option<BarKey>),
    /// Score family control; carries the control's value as text.
    FamilyPicked(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiEvent {
    pub view: ViewKind,
    pub interaction: Interaction,
}

/// Gestures waiting for the event loop. Surface handlers push, the
/// dashboard drains.
#[derive(Clone, Default)]
pub struct EventQueue(Rc<RefCell<VecDeque<UiEvent>>>);

impl EventQueue {
    pub fn push(&self, view: ViewKind, interaction: Interaction) {
        self.0.borrow_mut().push_back(UiEvent { view, interaction });
    }

    pub fn pop(&self) -> Option<UiEvent> {
        self.0.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

pub type Handler<T> = Box<dyn Fn(T)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn lerp(self, to: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, to.r), mix(self.g, to.g), mix(self.b, to.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

pub const COLOUR_BOTTOM: Rgb = Rgb::new(56, 94, 231);
pub const COLOUR_TOP: Rgb = Rgb::new(34, 236, 87);
pub const COLOUR_UNAVAILABLE: Rgb = Rgb::new(208, 207, 212);
pub const STROKE_NEUTRAL: Rgb = Rgb::new(255, 255, 255);
pub const STROKE_HIGHLIGHT: Rgb = Rgb::new(0, 0, 0);

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub key: BarKey,
    pub label: String,
    pub value: f64,
    pub display: String,
    pub fill: Rgb,
    pub emphasized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleDomain {
    pub min: f64,
    pub max: f64,
}

/// A target state plus the transition that carries the element there.
#[derive(Debug, Clone, PartialEq)]
pub struct Animated<T> {
    pub target: T,
    pub transition: Transition,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPlacement {
    pub city: CityId,
    pub at: ScreenPoint,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub fill: Rgb,
    pub stroke: Rgb,
    pub highlighted: bool,
}

/// Tooltip table shown for a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSummary {
    pub name: String,
    pub score: Option<f64>,
    pub rank: String,
    pub standing: String,
}

/// What the adapters need from the map widget.
pub trait MapSurface {
    fn project_to_screen(&self, at: GeoPoint) -> ScreenPoint;
    fn invalidate_size(&mut self, area: Rect);
    fn place_markers(&mut self, markers: &[MarkerPlacement]);
    fn style_marker(&mut self, city: CityId, style: Animated<MarkerStyle>);
    fn show_summary(&mut self, city: CityId, summary: &MarkerSummary);
    fn show_unavailable(&mut self, reason: &str);
    fn on_marker_click(&mut self, handler: Handler<CityId>);
    fn on_zoom_end(&mut self, handler: Handler<()>);
    fn on_map_click(&mut self, handler: Handler<()>);
}

/// What the adapters need from the chart library.
pub trait ChartSurface {
    fn set_title(&mut self, title: &str);
    fn draw_bars(&mut self, bars: &[Bar], domain: ScaleDomain);
    fn update_bars(&mut self, bars: &[Animated<Bar>]);
    fn resize(&mut self, area: Rect);
    fn show_unavailable(&mut self, reason: &str);
    fn on_bar_click(&mut self, handler: Handler<BarKey>);
    fn on_bar_hover(&mut self, handler: Handler<Option<BarKey>>);
}

pub trait ViewAdapter {
    fn kind(&self) -> ViewKind;

    /// Hook the surface's gesture callbacks up to `events`.
    fn attach(&mut self, events: &EventQueue);

    fn render(&mut self, selection: &Selection, snapshot: &Snapshot) -> ViewState;

    /// Map a gesture to the selection change it asks for, if any. The caller
    /// applies the request once the adapter is no longer borrowed.
    fn on_user_interaction(
        &mut self,
        event: &Interaction,
        snapshot: &Snapshot,
    ) -> Option<SelectRequest>;

    /// Re-apply geometry. Must depend only on `layout`, `selection` and
    /// `snapshot`.
    fn resize(&mut self, layout: &Layout, selection: &Selection, snapshot: &Snapshot);

    /// Forget everything drawn from the previous snapshot so the next render
    /// starts from scratch.
    fn reset(&mut self);

    /// Put the view into the unavailable state, e.g. after a failed load.
    fn fail(&mut self, reason: &str);

    fn state(&self) -> &ViewState;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_interpolation_clamps() {
        assert_eq!(COLOUR_BOTTOM.lerp(COLOUR_TOP, 0.0), COLOUR_BOTTOM);
        assert_eq!(COLOUR_BOTTOM.lerp(COLOUR_TOP, 1.5), COLOUR_TOP);
        assert_eq!(
            Rgb::new(0, 0, 0).lerp(Rgb::new(200, 100, 50), 0.5),
            Rgb::new(100, 50, 25)
        );
        assert_eq!(COLOUR_TOP.to_string(), "rgb(34, 236, 87)");
    }

    #[test]
    fn empty_snapshot_is_reported_as_empty_input() {
        let snap = Snapshot::new(Arc::new(IndicatorTable::default()));
        assert!(matches!(
            snap.ensure_populated(),
            Err(DashboardError::EmptyInput(_))
        ));
    }

    #[test]
    fn event_queue_is_fifo() {
        let q = EventQueue::default();
        q.push(ViewKind::Map, Interaction::ZoomEnd);
        q.push(ViewKind::Ranked, Interaction::BarHover(None));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().map(|e| e.view), Some(ViewKind::Map));
        assert_eq!(q.pop().map(|e| e.view), Some(ViewKind::Ranked));
        assert!(q.is_empty());
    }
}
