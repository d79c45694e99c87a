use super::layout::Layout;
use super::transition::{ElementKey, TransitionScheduler, Tween};
use super::{
    Animated, Bar, BarKey, ChartSurface, EventQueue, Interaction, ScaleDomain, Snapshot,
    ViewAdapter, ViewKind, ViewState, COLOUR_BOTTOM, COLOUR_TOP, COLOUR_UNAVAILABLE,
};
use crate::ranking::Ranking;
use crate::selection::SelectRequest;
use crate::types::{CityId, ScoreFamily, Selection};
use crate::util::format_number;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// One bar per city, best score first. Unranked cities trail the ranked
/// ones, greyed out at zero height.
pub fn ranked_bars(ranking: &Ranking) -> Vec<Bar> {
    let ext = ranking.extrema();
    let ranked = ranking.entries.iter().map(|e| Bar {
        key: BarKey::City(e.city),
        label: e.name.clone(),
        value: e.score,
        display: format!("#{} {}", e.rank, format_number(e.score, 2)),
        fill: ext
            .map(|x| COLOUR_BOTTOM.lerp(COLOUR_TOP, x.fraction(e.score)))
            .unwrap_or(COLOUR_BOTTOM),
        emphasized: false,
    });
    let unranked = ranking.unavailable.iter().map(|u| Bar {
        key: BarKey::City(u.city),
        label: u.name.clone(),
        value: 0.0,
        display: "unranked".to_string(),
        fill: COLOUR_UNAVAILABLE,
        emphasized: false,
    });
    ranked.chain(unranked).collect()
}

/// Axis shared by every family, so switching families never pushes a bar
/// past the top of the chart.
pub fn ranked_domain(snapshot: &Snapshot) -> ScaleDomain {
    let max = ScoreFamily::ALL
        .iter()
        .filter_map(|f| snapshot.stats.family(*f))
        .map(|s| s.max)
        .fold(0.0, f64::max);
    ScaleDomain { min: 0.0, max }
}

pub struct RankedChartAdapter {
    surface: Box<dyn ChartSurface>,
    transitions: TransitionScheduler,
    duration: Duration,
    family: Option<ScoreFamily>,
    values: HashMap<CityId, f64>,
    state: ViewState,
}

impl RankedChartAdapter {
    pub fn new(
        surface: Box<dyn ChartSurface>,
        transitions: TransitionScheduler,
        duration: Duration,
    ) -> Self {
        Self {
            surface,
            transitions,
            duration,
            family: None,
            values: HashMap::new(),
            state: ViewState::Blank,
        }
    }

    /// Family of the bars currently on screen.
    pub fn rendered_family(&self) -> Option<ScoreFamily> {
        self.family
    }

    fn title(family: ScoreFamily) -> String {
        format!("Cities ranked by {family} score")
    }

    fn remember(&mut self, bars: &[Bar]) {
        self.values = bars
            .iter()
            .filter_map(|b| match b.key {
                BarKey::City(id) => Some((id, b.value)),
                BarKey::Indicator(_) => None,
            })
            .collect();
    }

    fn animate(&mut self, bars: &[Bar]) {
        let updates: Vec<Animated<Bar>> = bars
            .iter()
            .filter_map(|bar| {
                let BarKey::City(id) = bar.key else {
                    return None;
                };
                let from = self.values.get(&id).copied().unwrap_or(0.0);
                let tween = Tween::new(from, bar.value, self.duration);
                Some(Animated {
                    transition: self.transitions.begin(ElementKey::RankedBar(id), tween),
                    target: bar.clone(),
                })
            })
            .collect();
        self.surface.update_bars(&updates);
    }
}

impl ViewAdapter for RankedChartAdapter {
    fn kind(&self) -> ViewKind {
        ViewKind::Ranked
    }

    fn attach(&mut self, events: &EventQueue) {
        let q = events.clone();
        self.surface.on_bar_click(Box::new(move |key| {
            q.push(ViewKind::Ranked, Interaction::BarClick(key))
        }));
        let q = events.clone();
        self.surface.on_bar_hover(Box::new(move |key| {
            q.push(ViewKind::Ranked, Interaction::BarHover(key))
        }));
    }

    fn render(&mut self, selection: &Selection, snapshot: &Snapshot) -> ViewState {
        if let Err(err) = snapshot.ensure_populated() {
            self.surface.show_unavailable(&err.to_string());
            self.state = ViewState::Empty;
            return self.state.clone();
        }
        // only the family changes what this chart shows
        if self.state == ViewState::Ready && self.family == Some(selection.family) {
            return self.state.clone();
        }
        let Some(ranking) = snapshot.stats.ranking(selection.family) else {
            let reason = format!("no ranking for {} scores", selection.family);
            warn!(view = "ranked", %reason, "view unavailable");
            self.surface.show_unavailable(&reason);
            self.state = ViewState::Unavailable(reason);
            return self.state.clone();
        };
        let bars = ranked_bars(ranking);
        self.surface.set_title(&Self::title(selection.family));
        if self.values.is_empty() {
            self.surface.draw_bars(&bars, ranked_domain(snapshot));
        } else {
            self.animate(&bars);
        }
        self.remember(&bars);
        debug!(
            family = %selection.family,
            ranked = ranking.entries.len(),
            "ranked chart rendered"
        );
        self.family = Some(selection.family);
        self.state = ViewState::Ready;
        self.state.clone()
    }

    fn on_user_interaction(
        &mut self,
        event: &Interaction,
        snapshot: &Snapshot,
    ) -> Option<SelectRequest> {
        match event {
            Interaction::BarClick(BarKey::City(id)) if snapshot.table.city(*id).is_some() => {
                Some(SelectRequest::city(*id))
            }
            _ => None,
        }
    }

    fn resize(&mut self, layout: &Layout, selection: &Selection, snapshot: &Snapshot) {
        self.surface.resize(layout.ranked);
        if snapshot.ensure_populated().is_err() {
            return;
        }
        if let Some(ranking) = snapshot.stats.ranking(selection.family) {
            let bars = ranked_bars(ranking);
            self.surface.set_title(&Self::title(selection.family));
            self.surface.draw_bars(&bars, ranked_domain(snapshot));
            self.remember(&bars);
            self.family = Some(selection.family);
        }
    }

    fn reset(&mut self) {
        self.family = None;
        self.values.clear();
        self.state = ViewState::Blank;
    }

    fn fail(&mut self, reason: &str) {
        self.surface.show_unavailable(reason);
        self.state = ViewState::Unavailable(reason.to_string());
    }

    fn state(&self) -> &ViewState {
        &self.state
    }
}
