use plotters::style::RGBColor;

pub const PALETTE: [RGBColor; 6] = [
    RGBColor(0x41, 0x82, 0x59),
    RGBColor(0xbd, 0x56, 0x32),
    RGBColor(0xe1, 0xa9, 0x4c),
    RGBColor(0x7d, 0x6c, 0x5b),
    RGBColor(0x36, 0x4d, 0x38),
    RGBColor(0xc4, 0xe1, 0xc6),
];
pub const GRID_COLOR: RGBColor = RGBColor(0xee, 0xee, 0xee);

pub const LINE_WIDTH: u32 = 4;
pub const MARKER_SIZE: i32 = 5;
pub const BAR_LINE_WIDTH: u32 = 1;
pub const LABEL_FONT_SIZE: f64 = 16.0;
pub const TICK_FONT_SIZE: f64 = 14.0;
pub const LEGEND_FONT_SIZE: f64 = 18.0;
pub const Y_TICKS: usize = 5;

pub fn color(idx: usize) -> RGBColor {
    PALETTE[idx % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Square,
    TriangleDown,
    TriangleUp,
    Hexagon,
}

pub const MARKERS: [Marker; 6] = [
    Marker::Circle,
    Marker::Square,
    Marker::TriangleDown,
    Marker::TriangleUp,
    Marker::Hexagon,
    Marker::TriangleDown,
];

pub fn marker(idx: usize) -> Marker {
    MARKERS[idx % MARKERS.len()]
}

impl Marker {
    /// Outline of the marker around `center` in pixel space, `None` for circles
    pub fn vertices(self, (x, y): (i32, i32), r: i32) -> Option<Vec<(i32, i32)>> {
        match self {
            Marker::Circle => None,
            Marker::Square => Some(vec![
                (x - r, y - r),
                (x + r, y - r),
                (x + r, y + r),
                (x - r, y + r),
            ]),
            Marker::TriangleDown => Some(vec![(x - r, y - r), (x + r, y - r), (x, y + r)]),
            Marker::TriangleUp => Some(vec![(x, y - r), (x + r, y + r), (x - r, y + r)]),
            Marker::Hexagon => Some(
                (0..6)
                    .map(|i| {
                        let angle =
                            std::f64::consts::FRAC_PI_3 * i as f64 + std::f64::consts::FRAC_PI_6;
                        (
                            x + (r as f64 * angle.cos()).round() as i32,
                            y + (r as f64 * angle.sin()).round() as i32,
                        )
                    })
                    .collect(),
            ),
        }
    }
}

/// Bar fill patterns, in group order: `////`, `o`, `\\`, `.`, `\\\`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hatch {
    /// Lines rising to the right, spacing in pixels
    Forward(i32),
    /// Lines falling to the right, spacing in pixels
    Backward(i32),
    Circles(i32),
    Dots(i32),
}

pub const HATCHES: [Hatch; 5] = [
    Hatch::Forward(4),
    Hatch::Circles(8),
    Hatch::Backward(8),
    Hatch::Dots(5),
    Hatch::Backward(6),
];

pub fn hatch(idx: usize) -> Hatch {
    HATCHES[idx % HATCHES.len()]
}

/// Pixel rectangle, `top < bottom`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Normalizes two opposite corners
    pub fn new((x0, y0): (i32, i32), (x1, y1): (i32, i32)) -> Self {
        Self {
            left: x0.min(x1),
            top: y0.min(y1),
            right: x0.max(x1),
            bottom: y0.max(y1),
        }
    }

    pub fn contains(&self, (x, y): (i32, i32)) -> bool {
        (self.left..=self.right).contains(&x) && (self.top..=self.bottom).contains(&y)
    }
}

type Segment = ((i32, i32), (i32, i32));

fn first_multiple(from: i32, step: i32) -> i32 {
    from.div_euclid(step) * step + if from.rem_euclid(step) == 0 { 0 } else { step }
}

/// Diagonal hatch lines clipped to `rect`.
///
/// Forward lines satisfy `x + y = c`, backward lines `y = x + c`; `c` runs over
/// multiples of `spacing` so neighbouring bars share the same pattern phase.
pub fn hatch_lines(rect: Rect, spacing: i32, forward: bool) -> Vec<Segment> {
    let spacing = spacing.max(1);
    let mut segments = Vec::new();
    if forward {
        let mut c = first_multiple(rect.left + rect.top, spacing);
        while c <= rect.right + rect.bottom {
            let lo = rect.left.max(c - rect.bottom);
            let hi = rect.right.min(c - rect.top);
            if lo < hi {
                segments.push(((lo, c - lo), (hi, c - hi)));
            }
            c += spacing;
        }
    } else {
        let mut c = first_multiple(rect.top - rect.right, spacing);
        while c <= rect.bottom - rect.left {
            let lo = rect.left.max(rect.top - c);
            let hi = rect.right.min(rect.bottom - c);
            if lo < hi {
                segments.push(((lo, lo + c), (hi, hi + c)));
            }
            c += spacing;
        }
    }
    segments
}

/// Centers of a staggered grid of points inside `rect`, kept `margin` away from the edges
pub fn hatch_points(rect: Rect, spacing: i32, margin: i32) -> Vec<(i32, i32)> {
    let spacing = spacing.max(1);
    let mut points = Vec::new();
    let mut row = 0;
    let mut y = rect.top + margin;
    while y <= rect.bottom - margin {
        let offset = if row % 2 == 0 { 0 } else { spacing / 2 };
        let mut x = rect.left + margin + offset;
        while x <= rect.right - margin {
            points.push((x, y));
            x += spacing;
        }
        y += spacing;
        row += 1;
    }
    points
}
