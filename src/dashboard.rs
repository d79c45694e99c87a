//! Wires the selection store, the current snapshot and the three views
//! together, and runs the single-threaded event loop between them.

use crate::config::DashboardConfig;
use crate::error::DataLoadError;
use crate::selection::{SelectRequest, SelectionStore, Subscription};
use crate::types::{IndicatorTable, Selection};
use crate::views::layout::{compute_layout, Layout, WindowSize};
use crate::views::transition::TransitionScheduler;
use crate::views::{
    ChartSurface, EventQueue, MapAdapter, MapSurface, PrimaryChartAdapter, RankedChartAdapter,
    Snapshot, ViewAdapter, ViewKind, ViewState,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, info};

pub type SharedView = Rc<RefCell<dyn ViewAdapter>>;
type SharedSnapshot = Rc<RefCell<Option<Rc<Snapshot>>>>;

pub struct Dashboard {
    config: DashboardConfig,
    store: SelectionStore,
    snapshot: SharedSnapshot,
    views: Vec<SharedView>,
    subscriptions: Vec<Subscription>,
    events: EventQueue,
    transitions: TransitionScheduler,
}

impl Dashboard {
    pub fn new(
        config: DashboardConfig,
        store: SelectionStore,
        transitions: TransitionScheduler,
        views: Vec<SharedView>,
    ) -> Self {
        let events = EventQueue::default();
        let snapshot: SharedSnapshot = Rc::new(RefCell::new(None));
        let mut subscriptions = Vec::with_capacity(views.len());
        for view in &views {
            view.borrow_mut().attach(&events);
            let (view, snapshot) = (Rc::clone(view), Rc::clone(&snapshot));
            subscriptions.push(store.subscribe(move |selection| {
                let Some(snap) = snapshot.borrow().clone() else {
                    return;
                };
                match view.try_borrow_mut() {
                    Ok(mut v) => {
                        v.render(selection, &snap);
                    }
                    Err(_) => error!("view is busy, render skipped"),
                }
            }));
        }
        Self {
            config,
            store,
            snapshot,
            views,
            subscriptions,
            events,
            transitions,
        }
    }

    /// Standard three-view dashboard over the given surfaces.
    pub fn with_surfaces(
        config: DashboardConfig,
        map: Box<dyn MapSurface>,
        primary: Box<dyn ChartSurface>,
        ranked: Box<dyn ChartSurface>,
    ) -> Self {
        let transitions = TransitionScheduler::new();
        let map: SharedView = Rc::new(RefCell::new(MapAdapter::new(
            map,
            transitions.clone(),
            config.transition,
            config.marker_radius,
        )));
        let primary: SharedView = Rc::new(RefCell::new(PrimaryChartAdapter::new(
            primary,
            transitions.clone(),
            config.transition,
        )));
        let ranked: SharedView = Rc::new(RefCell::new(RankedChartAdapter::new(
            ranked,
            transitions.clone(),
            config.transition,
        )));
        let views = vec![map, primary, ranked];
        Self::new(config, SelectionStore::new(), transitions, views)
    }

    /// Install a freshly loaded table and redraw every view from scratch for
    /// the current selection. A selected city the new table lacks is cleared.
    pub fn load(&mut self, table: Arc<IndicatorTable>) {
        let snap = Rc::new(Snapshot::new(table));
        info!(cities = snap.table.len(), "dashboard snapshot replaced");
        *self.snapshot.borrow_mut() = Some(Rc::clone(&snap));
        for view in &self.views {
            view.borrow_mut().reset();
        }
        if let Some(city) = self.store.current().city {
            if snap.table.city(city).is_none() {
                debug!(%city, "selected city not in new table, clearing");
                self.store.select(SelectRequest::clear_city());
            }
        }
        let selection = self.store.current();
        for view in &self.views {
            view.borrow_mut().render(&selection, &snap);
        }
    }

    /// Show the load failure on every view instead of a blank screen.
    pub fn fail_load(&mut self, err: &DataLoadError) {
        error!(error = %err, "initial load failed");
        let reason = format!("could not load data: {err}");
        for view in &self.views {
            view.borrow_mut().fail(&reason);
        }
    }

    /// Drain pending gestures, routing each to its view and applying the
    /// selection change it yields. Returns how many events were handled.
    pub fn pump(&mut self) -> usize {
        let retired = self.transitions.retire_finished();
        if retired > 0 {
            debug!(retired, "finished transitions retired");
        }
        let mut handled = 0;
        while let Some(event) = self.events.pop() {
            handled += 1;
            let Some(snap) = self.snapshot() else {
                debug!(?event, "no data yet, event dropped");
                continue;
            };
            let Some(view) = self.view(event.view) else {
                continue;
            };
            let request = view
                .borrow_mut()
                .on_user_interaction(&event.interaction, &snap);
            // the view borrow is released before listeners run
            if let Some(req) = request {
                self.store.select(req);
            }
        }
        handled
    }

    pub fn resize(&mut self, window: WindowSize) -> Layout {
        let layout = compute_layout(window, self.config.panel_width, self.config.panel_height);
        if let Some(snap) = self.snapshot() {
            let selection = self.store.current();
            for view in &self.views {
                view.borrow_mut().resize(&layout, &selection, &snap);
            }
        }
        layout
    }

    pub fn selection(&self) -> Selection {
        self.store.current()
    }

    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn transitions(&self) -> &TransitionScheduler {
        &self.transitions
    }

    pub fn snapshot(&self) -> Option<Rc<Snapshot>> {
        self.snapshot.borrow().clone()
    }

    fn view(&self, kind: ViewKind) -> Option<SharedView> {
        self.views
            .iter()
            .find(|v| v.borrow().kind() == kind)
            .cloned()
    }

    pub fn view_state(&self, kind: ViewKind) -> Option<ViewState> {
        self.view(kind).map(|v| v.borrow().state().clone())
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        // listeners hold the views; release them with the dashboard
        for sub in self.subscriptions.drain(..) {
            sub.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{ConsoleChart, ConsoleMap};

    fn views(transitions: &TransitionScheduler) -> Vec<SharedView> {
        let (map, _) = ConsoleMap::new(false);
        let (chart, _) = ConsoleChart::new("primary", false);
        let duration = std::time::Duration::ZERO;
        let map = MapAdapter::new(Box::new(map), transitions.clone(), duration, 10.0);
        let chart = PrimaryChartAdapter::new(Box::new(chart), transitions.clone(), duration);
        let map: SharedView = Rc::new(RefCell::new(map));
        let chart: SharedView = Rc::new(RefCell::new(chart));
        vec![map, chart]
    }

    #[test]
    fn dropping_dashboard_releases_listeners() {
        let store = SelectionStore::new();
        let transitions = TransitionScheduler::new();
        let dashboard = Dashboard::new(
            DashboardConfig::default(),
            store.clone(),
            transitions.clone(),
            views(&transitions),
        );
        assert_eq!(store.listener_count(), 2);
        drop(dashboard);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn missing_view_kind_is_skipped() {
        let transitions = TransitionScheduler::new();
        let mut dashboard = Dashboard::new(
            DashboardConfig::default(),
            SelectionStore::new(),
            transitions.clone(),
            views(&transitions),
        );
        assert_eq!(dashboard.view_state(ViewKind::Ranked), None);
        dashboard
            .events()
            .push(ViewKind::Ranked, crate::views::Interaction::ZoomEnd);
        assert_eq!(dashboard.pump(), 1);
    }
}
