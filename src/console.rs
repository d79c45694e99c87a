//! Text-mode surfaces. Every call is recorded; with `echo` on, the
//! interesting ones are also printed. The paired remote plays the part of
//! the user: it fires the callbacks the adapters registered.

use crate::types::{CityId, GeoPoint};
use crate::views::layout::Rect;
use crate::views::transition::Ticket;
use crate::views::{
    Animated, Bar, BarKey, ChartSurface, Handler, MapSurface, MarkerPlacement, MarkerStyle,
    MarkerSummary, ScaleDomain, ScreenPoint,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

const BAR_WIDTH: f64 = 30.0;
const LABEL_WIDTH: usize = 36;

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Invalidate(Rect),
    PlaceMarkers(Vec<MarkerPlacement>),
    StyleMarker {
        city: CityId,
        style: MarkerStyle,
        duration: Duration,
    },
    Summary {
        city: CityId,
        summary: MarkerSummary,
    },
    Title(String),
    DrawBars {
        bars: Vec<Bar>,
        domain: ScaleDomain,
    },
    UpdateBars(Vec<Animated<Bar>>),
    Resize(Rect),
    Unavailable(String),
}

pub type CallLog = Rc<RefCell<Vec<SurfaceCall>>>;

#[derive(Default)]
struct MapHandlers {
    marker: Option<Handler<CityId>>,
    zoom: Option<Handler<()>>,
    background: Option<Handler<()>>,
}

#[derive(Default)]
struct ChartHandlers {
    click: Option<Handler<BarKey>>,
    hover: Option<Handler<Option<BarKey>>>,
}

pub struct ConsoleMap {
    area: Rect,
    echo: bool,
    log: CallLog,
    tickets: Rc<RefCell<Vec<Ticket>>>,
    handlers: Rc<RefCell<MapHandlers>>,
}

#[derive(Clone)]
pub struct MapRemote {
    log: CallLog,
    tickets: Rc<RefCell<Vec<Ticket>>>,
    handlers: Rc<RefCell<MapHandlers>>,
}

impl ConsoleMap {
    pub fn new(echo: bool) -> (Self, MapRemote) {
        let log = CallLog::default();
        let tickets = Rc::new(RefCell::new(Vec::new()));
        let handlers = Rc::new(RefCell::new(MapHandlers::default()));
        let map = Self {
            area: Rect {
                x: 0.0,
                y: 0.0,
                width: 360.0,
                height: 180.0,
            },
            echo,
            log: log.clone(),
            tickets: tickets.clone(),
            handlers: handlers.clone(),
        };
        (
            map,
            MapRemote {
                log,
                tickets,
                handlers,
            },
        )
    }

    fn record(&self, call: SurfaceCall) {
        self.log.borrow_mut().push(call);
    }
}

impl MapSurface for ConsoleMap {
    /// Plate carrée over the current area.
    fn project_to_screen(&self, at: GeoPoint) -> ScreenPoint {
        ScreenPoint {
            x: self.area.x + (at.lng + 180.0) / 360.0 * self.area.width,
            y: self.area.y + (90.0 - at.lat) / 180.0 * self.area.height,
        }
    }

    fn invalidate_size(&mut self, area: Rect) {
        self.area = area;
        self.record(SurfaceCall::Invalidate(area));
    }

    fn place_markers(&mut self, markers: &[MarkerPlacement]) {
        self.record(SurfaceCall::PlaceMarkers(markers.to_vec()));
    }

    fn style_marker(&mut self, city: CityId, style: Animated<MarkerStyle>) {
        if self.echo && style.target.highlighted {
            println!("[map] marker {} highlighted ({})", city, style.target.fill);
        }
        self.tickets.borrow_mut().push(style.transition.ticket.clone());
        self.record(SurfaceCall::StyleMarker {
            city,
            style: style.target,
            duration: style.transition.tween.duration,
        });
    }

    fn show_summary(&mut self, city: CityId, summary: &MarkerSummary) {
        self.record(SurfaceCall::Summary {
            city,
            summary: summary.clone(),
        });
    }

    fn show_unavailable(&mut self, reason: &str) {
        if self.echo {
            println!("[map] unavailable: {}", reason);
        }
        self.record(SurfaceCall::Unavailable(reason.to_string()));
    }

    fn on_marker_click(&mut self, handler: Handler<CityId>) {
        self.handlers.borrow_mut().marker = Some(handler);
    }

    fn on_zoom_end(&mut self, handler: Handler<()>) {
        self.handlers.borrow_mut().zoom = Some(handler);
    }

    fn on_map_click(&mut self, handler: Handler<()>) {
        self.handlers.borrow_mut().background = Some(handler);
    }
}

impl MapRemote {
    pub fn click_marker(&self, city: CityId) {
        if let Some(h) = &self.handlers.borrow().marker {
            h(city);
        }
    }

    pub fn zoom_end(&self) {
        if let Some(h) = &self.handlers.borrow().zoom {
            h(());
        }
    }

    pub fn click_background(&self) {
        if let Some(h) = &self.handlers.borrow().background {
            h(());
        }
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.log.borrow().clone()
    }

    /// Transition tickets of every marker restyle, oldest first.
    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
        self.tickets.borrow_mut().clear();
    }
}

pub struct ConsoleChart {
    name: &'static str,
    echo: bool,
    title: String,
    domain: ScaleDomain,
    log: CallLog,
    handlers: Rc<RefCell<ChartHandlers>>,
}

#[derive(Clone)]
pub struct ChartRemote {
    log: CallLog,
    handlers: Rc<RefCell<ChartHandlers>>,
}

impl ConsoleChart {
    pub fn new(name: &'static str, echo: bool) -> (Self, ChartRemote) {
        let log = CallLog::default();
        let handlers = Rc::new(RefCell::new(ChartHandlers::default()));
        let chart = Self {
            name,
            echo,
            title: String::new(),
            domain: ScaleDomain { min: 0.0, max: 1.0 },
            log: log.clone(),
            handlers: handlers.clone(),
        };
        (chart, ChartRemote { log, handlers })
    }

    fn record(&self, call: SurfaceCall) {
        self.log.borrow_mut().push(call);
    }

    fn print<'a>(&self, bars: impl Iterator<Item = &'a Bar>) {
        println!("[{}] {}", self.name, self.title);
        let span = (self.domain.max - self.domain.min).max(f64::EPSILON);
        for bar in bars {
            let len = (((bar.value - self.domain.min) / span) * BAR_WIDTH).clamp(0.0, BAR_WIDTH);
            let mut label: String = bar.label.chars().take(LABEL_WIDTH).collect();
            if bar.emphasized {
                label.insert(0, '*');
            }
            println!(
                "  {:<label_w$} {:<bar_w$} {}",
                label,
                "█".repeat(len.round() as usize),
                bar.display,
                label_w = LABEL_WIDTH + 1,
                bar_w = BAR_WIDTH as usize
            );
        }
        println!();
    }
}

impl ChartSurface for ConsoleChart {
    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.record(SurfaceCall::Title(self.title.clone()));
    }

    fn draw_bars(&mut self, bars: &[Bar], domain: ScaleDomain) {
        self.domain = domain;
        if self.echo {
            self.print(bars.iter());
        }
        self.record(SurfaceCall::DrawBars {
            bars: bars.to_vec(),
            domain,
        });
    }

    fn update_bars(&mut self, bars: &[Animated<Bar>]) {
        if self.echo {
            self.print(bars.iter().map(|b| &b.target));
        }
        self.record(SurfaceCall::UpdateBars(bars.to_vec()));
    }

    fn resize(&mut self, area: Rect) {
        self.record(SurfaceCall::Resize(area));
    }

    fn show_unavailable(&mut self, reason: &str) {
        if self.echo {
            println!("[{}] unavailable: {}", self.name, reason);
        }
        self.record(SurfaceCall::Unavailable(reason.to_string()));
    }

    fn on_bar_click(&mut self, handler: Handler<BarKey>) {
        self.handlers.borrow_mut().click = Some(handler);
    }

    fn on_bar_hover(&mut self, handler: Handler<Option<BarKey>>) {
        self.handlers.borrow_mut().hover = Some(handler);
    }
}

impl ChartRemote {
    pub fn click_bar(&self, key: BarKey) {
        if let Some(h) = &self.handlers.borrow().click {
            h(key);
        }
    }

    pub fn hover_bar(&self, key: Option<BarKey>) {
        if let Some(h) = &self.handlers.borrow().hover {
            h(key);
        }
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_follows_invalidated_area() {
        let (mut map, remote) = ConsoleMap::new(false);
        let p = map.project_to_screen(GeoPoint { lat: 0.0, lng: 0.0 });
        assert_eq!(p, ScreenPoint { x: 180.0, y: 90.0 });
        let area = Rect {
            x: 10.0,
            y: 0.0,
            width: 720.0,
            height: 360.0,
        };
        map.invalidate_size(area);
        let p = map.project_to_screen(GeoPoint { lat: 90.0, lng: -180.0 });
        assert_eq!(p, ScreenPoint { x: 10.0, y: 0.0 });
        assert_eq!(remote.calls(), vec![SurfaceCall::Invalidate(area)]);
    }

    #[test]
    fn remote_without_handlers_is_a_no_op() {
        let (_chart, remote) = ConsoleChart::new("ranked", false);
        remote.click_bar(BarKey::City(CityId(0)));
        assert!(remote.calls().is_empty());
    }
}
