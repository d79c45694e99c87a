use super::layout::Layout;
use super::transition::{ElementKey, TransitionScheduler, Tween};
use super::{
    Animated, Bar, BarKey, ChartSurface, EventQueue, Interaction, ScaleDomain, Snapshot,
    ViewAdapter, ViewKind, ViewState, COLOUR_BOTTOM, COLOUR_TOP,
};
use crate::selection::SelectRequest;
use crate::types::{CityId, ScoreFamily, Selection};
use crate::util::format_number;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const HOVER: Duration = Duration::from_millis(100);

/// Indicator bars for the selected city, or the cross-city average per
/// indicator when no city is selected.
///
/// Bars are coloured against each indicator's global min/max and share one
/// axis running to the largest value in the table, so heights stay
/// comparable when the selection moves between cities.
pub struct PrimaryChartAdapter {
    surface: Box<dyn ChartSurface>,
    transitions: TransitionScheduler,
    duration: Duration,
    bars: Vec<Bar>,
    shown: Option<Option<CityId>>,
    hovered: Option<BarKey>,
    state: ViewState,
}

impl PrimaryChartAdapter {
    pub fn new(
        surface: Box<dyn ChartSurface>,
        transitions: TransitionScheduler,
        duration: Duration,
    ) -> Self {
        Self {
            surface,
            transitions,
            duration,
            bars: Vec::new(),
            shown: None,
            hovered: None,
            state: ViewState::Blank,
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    fn build_bars(
        &self,
        city: Option<CityId>,
        snapshot: &Snapshot,
    ) -> Result<(String, Vec<Bar>), String> {
        let table = &snapshot.table;
        let stats = &snapshot.stats;
        let city = match city {
            Some(id) => {
                let c = table
                    .city(id)
                    .ok_or_else(|| format!("city {id} is not in the table"))?;
                Some(c)
            }
            None => None,
        };
        let title = match city {
            Some(c) => c.name.clone(),
            None => "Average of all cities".to_string(),
        };
        let mut bars = Vec::with_capacity(table.codes().len());
        for (col, code) in table.codes().iter().enumerate() {
            let series = stats
                .indicator(code)
                .ok_or_else(|| format!("no statistics for indicator {code}"))?;
            let (value, display, label) = match city {
                Some(c) => {
                    let ind = &c.indicators[col];
                    (ind.value, ind.raw_display_value.clone(), ind.description.clone())
                }
                None => {
                    let desc = table.cities()[0].indicators[col].description.clone();
                    (series.average, format_number(series.average, 2), desc)
                }
            };
            let key = BarKey::Indicator(code.clone());
            bars.push(Bar {
                emphasized: self.hovered.as_ref() == Some(&key),
                key,
                label,
                value,
                display,
                fill: COLOUR_BOTTOM.lerp(COLOUR_TOP, series.extrema().fraction(value)),
            });
        }
        Ok((title, bars))
    }

    fn domain(snapshot: &Snapshot) -> ScaleDomain {
        ScaleDomain {
            min: 0.0,
            max: snapshot.stats.absolute_max(),
        }
    }

    fn animate(&mut self, next: Vec<Bar>, duration: Duration) {
        let previous: BTreeMap<&BarKey, f64> =
            self.bars.iter().map(|b| (&b.key, b.value)).collect();
        let updates: Vec<Animated<Bar>> = next
            .iter()
            .map(|bar| {
                let from = previous.get(&bar.key).copied().unwrap_or(0.0);
                let key = match &bar.key {
                    BarKey::Indicator(code) => ElementKey::PrimaryBar(code.clone()),
                    BarKey::City(id) => ElementKey::RankedBar(*id),
                };
                Animated {
                    transition: self.transitions.begin(key, Tween::new(from, bar.value, duration)),
                    target: bar.clone(),
                }
            })
            .collect();
        self.surface.update_bars(&updates);
        self.bars = next;
    }

    fn unavailable(&mut self, reason: String) {
        warn!(view = "primary", %reason, "view unavailable");
        self.surface.show_unavailable(&reason);
        self.state = ViewState::Unavailable(reason);
    }
}

impl ViewAdapter for PrimaryChartAdapter {
    fn kind(&self) -> ViewKind {
        ViewKind::Primary
    }

    fn attach(&mut self, events: &EventQueue) {
        let q = events.clone();
        self.surface.on_bar_click(Box::new(move |key| {
            q.push(ViewKind::Primary, Interaction::BarClick(key))
        }));
        let q = events.clone();
        self.surface.on_bar_hover(Box::new(move |key| {
            q.push(ViewKind::Primary, Interaction::BarHover(key))
        }));
    }

    fn render(&mut self, selection: &Selection, snapshot: &Snapshot) -> ViewState {
        if let Err(err) = snapshot.ensure_populated() {
            self.surface.show_unavailable(&err.to_string());
            self.state = ViewState::Empty;
            return self.state.clone();
        }
        // the bars do not depend on the family
        if self.state == ViewState::Ready && self.shown == Some(selection.city) {
            return self.state.clone();
        }
        let (title, bars) = match self.build_bars(selection.city, snapshot) {
            Ok(built) => built,
            Err(reason) => {
                self.unavailable(reason);
                return self.state.clone();
            }
        };
        self.surface.set_title(&title);
        if self.bars.is_empty() {
            self.surface.draw_bars(&bars, Self::domain(snapshot));
            self.bars = bars;
        } else {
            self.animate(bars, self.duration);
        }
        debug!(city = ?selection.city, "primary chart rendered");
        self.shown = Some(selection.city);
        self.state = ViewState::Ready;
        self.state.clone()
    }

    fn on_user_interaction(
        &mut self,
        event: &Interaction,
        _snapshot: &Snapshot,
    ) -> Option<SelectRequest> {
        match event {
            Interaction::FamilyPicked(name) => match name.parse::<ScoreFamily>() {
                Ok(family) => Some(SelectRequest::family(family)),
                Err(err) => {
                    // fatal to this view only; the selection is left alone
                    self.unavailable(err.to_string());
                    None
                }
            },
            Interaction::BarHover(key) => {
                if self.hovered == *key || self.bars.is_empty() {
                    return None;
                }
                self.hovered = key.clone();
                let next: Vec<Bar> = self
                    .bars
                    .iter()
                    .map(|b| Bar {
                        emphasized: self.hovered.as_ref() == Some(&b.key),
                        ..b.clone()
                    })
                    .collect();
                self.animate(next, HOVER);
                None
            }
            _ => None,
        }
    }

    fn resize(&mut self, layout: &Layout, selection: &Selection, snapshot: &Snapshot) {
        self.surface.resize(layout.primary_plot);
        if snapshot.ensure_populated().is_err() {
            return;
        }
        // redraw in place, no transition
        if let Ok((title, bars)) = self.build_bars(selection.city, snapshot) {
            self.surface.set_title(&title);
            self.surface.draw_bars(&bars, Self::domain(snapshot));
            self.bars = bars;
        }
    }

    fn reset(&mut self) {
        self.bars.clear();
        self.shown = None;
        self.hovered = None;
        self.state = ViewState::Blank;
    }

    fn fail(&mut self, reason: &str) {
        self.unavailable(reason.to_string());
    }

    fn state(&self) -> &ViewState {
        &self.state
    }
}
