//! Screen geometry. A pure function of the window and the panel fractions,
//! so resize can fire as often as the host likes.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSize {
    pub width: f64,
    pub height: f64,
    /// Height taken by a page header above the dashboard, if any.
    pub header_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

pub const CHART_MARGIN: Margin = Margin {
    top: 10.0,
    right: 20.0,
    bottom: 30.0,
    left: 60.0,
};

const MAP_GAP: f64 = 10.0;
const PANEL_CHROME: f64 = 27.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub map: Rect,
    /// Outer box of the primary chart.
    pub primary: Rect,
    /// Plot area inside the primary chart's margins.
    pub primary_plot: Rect,
    pub ranked: Rect,
}

impl Rect {
    pub fn inset(self, m: Margin) -> Rect {
        Rect {
            x: self.x + m.left,
            y: self.y + m.top,
            width: (self.width - m.left - m.right).max(0.0),
            height: (self.height - m.top - m.bottom).max(0.0),
        }
    }
}

/// Map top-left, ranked panel underneath it, primary chart down the right
/// hand side at `panel_width` of the window.
pub fn compute_layout(window: WindowSize, panel_width: f64, panel_height: f64) -> Layout {
    let panel_width = panel_width.clamp(0.0, 1.0);
    let panel_height = panel_height.clamp(0.0, 1.0);
    let header = window.header_height.max(0.0);
    let left_width = (window.width * (1.0 - panel_width)).max(0.0);

    let map = Rect {
        x: 0.0,
        y: header,
        width: left_width,
        height: (window.height * (1.0 - panel_height) - MAP_GAP - header).max(0.0),
    };
    let ranked = Rect {
        x: 0.0,
        y: map.y + map.height + MAP_GAP,
        width: left_width,
        height: (window.height * panel_height - PANEL_CHROME).max(0.0),
    };
    let primary = Rect {
        x: left_width,
        y: header,
        width: (window.width * panel_width).max(0.0),
        height: (window.height - header).max(0.0),
    };
    Layout {
        map,
        primary,
        primary_plot: primary.inset(CHART_MARGIN),
        ranked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_window_by_panel_fractions() {
        let l = compute_layout(
            WindowSize {
                width: 1000.0,
                height: 800.0,
                header_height: 50.0,
            },
            0.4,
            0.4,
        );
        assert_eq!(l.map, Rect { x: 0.0, y: 50.0, width: 600.0, height: 420.0 });
        assert_eq!(l.ranked.y, 480.0);
        assert!((l.ranked.height - 293.0).abs() < 1e-9);
        assert_eq!(l.primary.x, 600.0);
        assert_eq!(l.primary.width, 400.0);
        assert_eq!(l.primary_plot.width, 320.0);
    }

    #[test]
    fn tiny_window_never_goes_negative() {
        let l = compute_layout(
            WindowSize {
                width: 10.0,
                height: 10.0,
                header_height: 40.0,
            },
            0.4,
            0.4,
        );
        for r in [l.map, l.primary, l.primary_plot, l.ranked] {
            assert!(r.width >= 0.0 && r.height >= 0.0);
        }
    }

    #[test]
    fn same_window_same_layout() {
        let w = WindowSize {
            width: 1280.0,
            height: 720.0,
            header_height: 0.0,
        };
        assert_eq!(compute_layout(w, 0.4, 0.4), compute_layout(w, 0.4, 0.4));
    }
}
