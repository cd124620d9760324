// Viewport-aware overlay placement.
//
// Anchor rects are in viewport coordinates; results are in page coordinates
// (scroll offsets added).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// A collapsed box with no extent in either direction.
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, scroll_x: 0.0, scroll_y: 0.0 }
    }

    pub fn scrolled(mut self, scroll_x: f64, scroll_y: f64) -> Self {
        self.scroll_x = scroll_x;
        self.scroll_y = scroll_y;
        self
    }

    fn right(&self) -> f64 {
        self.scroll_x + self.width
    }

    fn bottom(&self) -> f64 {
        self.scroll_y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementStyle {
    /// Below the anchor, left-aligned; flips above near the bottom edge.
    EntryPopup,
    /// Above the anchor, centered; flips below near the top edge.
    LookupTooltip,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementMetrics {
    pub margin: f64,
    pub popup_gap: f64,
    pub tooltip_gap: f64,
    pub top_margin: f64,
}

impl Default for PlacementMetrics {
    fn default() -> Self {
        Self { margin: 8.0, popup_gap: 6.0, tooltip_gap: 8.0, top_margin: 4.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayGeometry {
    pub top: f64,
    pub left: f64,
    pub placed_below: bool,
}

/// Prefer `rect`; a collapsed rect falls back to `fallback`.
pub fn resolve_anchor(rect: Rect, fallback: Option<Rect>) -> Option<Rect> {
    if !rect.is_empty() {
        return Some(rect);
    }
    fallback.filter(|r| !r.is_empty())
}

pub fn place(
    anchor: Rect,
    size: Size,
    viewport: &Viewport,
    style: PlacementStyle,
    metrics: &PlacementMetrics,
) -> OverlayGeometry {
    let (mut top, left, placed_below) = match style {
        PlacementStyle::EntryPopup => {
            let below = viewport.scroll_y + anchor.bottom() + metrics.popup_gap;
            let left = viewport.scroll_x + anchor.left;
            if below + size.height > viewport.bottom() - metrics.margin {
                (viewport.scroll_y + anchor.top - size.height - metrics.popup_gap, left, false)
            } else {
                (below, left, true)
            }
        }
        PlacementStyle::LookupTooltip => {
            let left = viewport.scroll_x + anchor.left + anchor.width / 2.0 - size.width / 2.0;
            let above = viewport.scroll_y + anchor.top - size.height - metrics.tooltip_gap;
            if above < viewport.scroll_y + metrics.top_margin {
                (viewport.scroll_y + anchor.bottom() + metrics.tooltip_gap, left, true)
            } else {
                (above, left, false)
            }
        }
    };

    let left = clamp_horizontal(left, size.width, viewport, metrics.margin);

    let fully_outside = top + size.height <= viewport.scroll_y || top >= viewport.bottom();
    if fully_outside && size.height <= viewport.height {
        top = top.clamp(viewport.scroll_y, viewport.bottom() - size.height);
    }

    OverlayGeometry { top, left, placed_below }
}

fn clamp_horizontal(left: f64, width: f64, viewport: &Viewport, margin: f64) -> f64 {
    let min_left = viewport.scroll_x + margin;
    let mut left = left;
    if left + width > viewport.right() - margin {
        left = (viewport.right() - width - margin).max(min_left);
    }
    if left < min_left {
        left = min_left;
    }
    left
}
