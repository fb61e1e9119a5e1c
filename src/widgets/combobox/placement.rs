//! Popup placement: which side of the control, and how tall

use crate::dom::Rect;

/// Value of the `placement` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementMode {
    #[default]
    Auto,
    Up,
    Down,
}

impl PlacementMode {
    /// Unknown values behave like `auto`
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("up") => Self::Up,
            Some(v) if v.eq_ignore_ascii_case("down") => Self::Down,
            _ => Self::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Below,
    Above,
}

impl Side {
    pub fn class(self) -> &'static str {
        match self {
            Self::Below => "rs--down",
            Self::Above => "rs--up",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub side: Side,
    pub max_height: f64,
}

/// Place a popup of `natural` height next to `control`
///
/// `auto` opens upwards only when the list does not fit below and there is
/// more room above. The height is capped by the room on the chosen side but
/// never goes under `floor`.
pub fn compute(
    mode: PlacementMode,
    control: Rect,
    viewport: Rect,
    natural: f64,
    margin: f64,
    floor: f64,
) -> Placement {
    let below = viewport.bottom() - control.bottom() - margin;
    let above = control.top() - viewport.top() - margin;

    let side = match mode {
        PlacementMode::Up => Side::Above,
        PlacementMode::Down => Side::Below,
        PlacementMode::Auto if below < natural && above > below => Side::Above,
        PlacementMode::Auto => Side::Below,
    };
    let available = match side {
        Side::Below => below,
        Side::Above => above,
    }
    .max(0.0);

    Placement {
        side,
        max_height: natural.min(available).max(floor),
    }
}
