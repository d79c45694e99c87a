use super::layout::Layout;
use super::transition::{ElementKey, TransitionScheduler, Tween};
use super::{
    Animated, EventQueue, Interaction, MapSurface, MarkerPlacement, MarkerStyle, MarkerSummary,
    Snapshot, ViewAdapter, ViewKind, ViewState, COLOUR_BOTTOM, COLOUR_TOP, COLOUR_UNAVAILABLE,
    STROKE_HIGHLIGHT, STROKE_NEUTRAL,
};
use crate::selection::SelectRequest;
use crate::types::{CityId, ScoreFamily, Selection};
use crate::util::round_to;
use std::time::Duration;
use tracing::{debug, warn};

/// Score, rank and standing of one city for the marker tooltip.
pub fn marker_summary(
    snapshot: &Snapshot,
    city: CityId,
    family: ScoreFamily,
) -> Option<MarkerSummary> {
    let name = snapshot.table.city(city)?.name.clone();
    let ranking = snapshot.stats.ranking(family)?;
    let standing = ranking.relative_standing(city).label().to_string();
    let summary = match ranking.entry(city) {
        Some(entry) => MarkerSummary {
            name,
            score: Some(round_to(entry.score, 2)),
            rank: format!("{} (of {})", entry.rank, ranking.entries.len()),
            standing,
        },
        None => MarkerSummary {
            name,
            score: None,
            rank: "unranked".to_string(),
            standing,
        },
    };
    Some(summary)
}

pub struct MapAdapter {
    surface: Box<dyn MapSurface>,
    transitions: TransitionScheduler,
    duration: Duration,
    radius: f64,
    highlighted: Option<CityId>,
    styled_family: Option<ScoreFamily>,
    placed: bool,
    state: ViewState,
}

impl MapAdapter {
    pub fn new(
        surface: Box<dyn MapSurface>,
        transitions: TransitionScheduler,
        duration: Duration,
        radius: f64,
    ) -> Self {
        Self {
            surface,
            transitions,
            duration,
            radius,
            highlighted: None,
            styled_family: None,
            placed: false,
            state: ViewState::Blank,
        }
    }

    pub fn highlighted(&self) -> Option<CityId> {
        self.highlighted
    }

    fn place_markers(&mut self, snapshot: &Snapshot) {
        let markers: Vec<MarkerPlacement> = snapshot
            .table
            .cities()
            .iter()
            .map(|c| MarkerPlacement {
                city: c.id,
                at: self.surface.project_to_screen(c.location),
                radius: self.radius,
            })
            .collect();
        self.surface.place_markers(&markers);
        self.placed = true;
    }

    fn style_for(
        &self,
        snapshot: &Snapshot,
        city: CityId,
        family: ScoreFamily,
        highlighted: bool,
    ) -> MarkerStyle {
        let fill = snapshot
            .stats
            .ranking(family)
            .and_then(|r| Some((r.entry(city)?.score, r.extrema()?)))
            .map(|(score, ext)| COLOUR_BOTTOM.lerp(COLOUR_TOP, ext.fraction(score)))
            .unwrap_or(COLOUR_UNAVAILABLE);
        MarkerStyle {
            fill,
            stroke: if highlighted { STROKE_HIGHLIGHT } else { STROKE_NEUTRAL },
            highlighted,
        }
    }

    fn restyle(&mut self, snapshot: &Snapshot, city: CityId, family: ScoreFamily, lit: bool) {
        let style = self.style_for(snapshot, city, family, lit);
        let transition = self
            .transitions
            .begin(ElementKey::Marker(city), Tween::new(0.0, 1.0, self.duration));
        self.surface.style_marker(
            city,
            Animated {
                target: style,
                transition,
            },
        );
    }
}

impl ViewAdapter for MapAdapter {
    fn kind(&self) -> ViewKind {
        ViewKind::Map
    }

    fn attach(&mut self, events: &EventQueue) {
        let q = events.clone();
        self.surface.on_marker_click(Box::new(move |id| {
            q.push(ViewKind::Map, Interaction::MarkerClick(id))
        }));
        let q = events.clone();
        self.surface
            .on_zoom_end(Box::new(move |()| q.push(ViewKind::Map, Interaction::ZoomEnd)));
        let q = events.clone();
        self.surface
            .on_map_click(Box::new(move |()| q.push(ViewKind::Map, Interaction::MapClick)));
    }

    fn render(&mut self, selection: &Selection, snapshot: &Snapshot) -> ViewState {
        if let Err(err) = snapshot.ensure_populated() {
            self.surface.show_unavailable(&err.to_string());
            self.state = ViewState::Empty;
            return self.state.clone();
        }
        if !self.placed {
            self.place_markers(snapshot);
        }
        let selected = selection.city.filter(|id| snapshot.table.city(*id).is_some());
        if selection.city.is_some() && selected.is_none() {
            warn!(city = ?selection.city, "selected city is not in the table");
        }

        if self.styled_family != Some(selection.family) {
            // every fill depends on the family
            for city in snapshot.table.cities() {
                let lit = selected == Some(city.id);
                self.restyle(snapshot, city.id, selection.family, lit);
                if let Some(summary) = marker_summary(snapshot, city.id, selection.family) {
                    self.surface.show_summary(city.id, &summary);
                }
            }
            self.styled_family = Some(selection.family);
        } else if self.highlighted != selected {
            if let Some(prev) = self.highlighted {
                self.restyle(snapshot, prev, selection.family, false);
            }
            if let Some(next) = selected {
                self.restyle(snapshot, next, selection.family, true);
            }
        }
        debug!(
            from = ?self.highlighted,
            to = ?selected,
            family = %selection.family,
            "map rendered"
        );
        self.highlighted = selected;
        self.state = ViewState::Ready;
        self.state.clone()
    }

    fn on_user_interaction(
        &mut self,
        event: &Interaction,
        snapshot: &Snapshot,
    ) -> Option<SelectRequest> {
        match event {
            Interaction::MarkerClick(id) if snapshot.table.city(*id).is_some() => {
                Some(SelectRequest::city(*id))
            }
            Interaction::MarkerClick(id) => {
                warn!(city = %id, "click on unknown marker ignored");
                None
            }
            Interaction::ZoomEnd => {
                if !snapshot.table.is_empty() {
                    self.place_markers(snapshot);
                }
                None
            }
            _ => None,
        }
    }

    fn resize(&mut self, layout: &Layout, selection: &Selection, snapshot: &Snapshot) {
        self.surface.invalidate_size(layout.map);
        if snapshot.ensure_populated().is_err() {
            return;
        }
        self.place_markers(snapshot);
        // projection may have moved; restate the current selection without animating
        let selected = selection.city.filter(|id| snapshot.table.city(*id).is_some());
        for city in snapshot.table.cities() {
            let lit = selected == Some(city.id);
            let style = self.style_for(snapshot, city.id, selection.family, lit);
            let transition = self
                .transitions
                .begin(ElementKey::Marker(city.id), Tween::new(1.0, 1.0, Duration::ZERO));
            self.surface.style_marker(
                city.id,
                Animated {
                    target: style,
                    transition,
                },
            );
        }
        self.highlighted = selected;
        self.styled_family = Some(selection.family);
    }

    fn reset(&mut self) {
        self.highlighted = None;
        self.styled_family = None;
        self.placed = false;
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
