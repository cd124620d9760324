// Transient overlays: placement geometry and the single open-overlay slot.

pub mod placement;
pub mod session;

pub use placement::{
    place, resolve_anchor, OverlayGeometry, PlacementMetrics, PlacementStyle, Rect, Size, Viewport,
};
pub use session::{ActionControl, OverlayAction, OverlayContent, OverlaySlot};
