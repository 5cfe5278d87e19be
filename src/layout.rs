// License: MIT

//! Pure panel geometry. No Wayland types in here so the whole module can be
//! exercised without a compositor.
//!
//! The gameplay panel is always a square with side `min(width, height)`,
//! centred on the long axis. The leftover strip on each side of it is the
//! "gap"; the bust panel floats centred inside one gap at 4/5 scale and the
//! stat panel fills the opposite gap flush to the edge.

use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Which side of the monitor is the shortest. Square monitors get their own
/// identity; the layout collapses the gaps entirely for them instead of
/// producing zero-width side panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortestSide {
    Width,
    Height,
    Square,
}

/// Finalised record of the primary output. Populated once from the first
/// advertised output and immutable for the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor {
    pub width: i32,
    pub height: i32,
    pub physical_width: i32,
    pub physical_height: i32,
    pub refresh_hz: i32,
    pub scale: i32,
    pub shortest: i32,
    pub side: ShortestSide,
}

/// Accumulator for the wl_output event stream, finalised on Done.
#[derive(Debug, Default, Clone, Copy)]
pub struct PendingMonitor {
    pub width: i32,
    pub height: i32,
    pub physical_width: i32,
    pub physical_height: i32,
    pub refresh_mhz: i32,
    pub scale: i32,
}

impl PendingMonitor {
    pub fn finalise(self) -> Monitor {
        let shortest = self.width.min(self.height);
        let side = if self.width == self.height {
            ShortestSide::Square
        } else if shortest == self.height {
            ShortestSide::Height
        } else {
            ShortestSide::Width
        };

        Monitor {
            width: self.width,
            height: self.height,
            physical_width: self.physical_width,
            physical_height: self.physical_height,
            refresh_hz: (self.refresh_mhz + 500) / 1000,
            // Compositors may never send a scale event; the protocol default is 1.
            scale: if self.scale == 0 { 1 } else { self.scale },
            shortest,
            side,
        }
    }
}

/// Computed rectangles for one set of bounds. `bust` and `stat` are absent on
/// square monitors, where the gameplay panel fills everything and there is no
/// gap left to place them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub backdrop: Rect,
    pub gameplay: Rect,
    pub bust: Option<Rect>,
    pub stat: Option<Rect>,
}

/// Scale `v` by 1/1.25 in integer arithmetic.
fn shrink(v: i32) -> i32 {
    v * 4 / 5
}

/// Compute the panel arrangement for the given bounds.
///
/// Fails on non-positive bounds: a degenerate monitor report must never reach
/// native surface creation, where zero sizes are undefined behaviour.
pub fn compute(width: i32, height: i32) -> Result<Layout> {
    if width <= 0 || height <= 0 {
        bail!("degenerate bounds {width}x{height}");
    }

    let side = width.min(height);
    let backdrop = Rect { x: 0, y: 0, width, height };

    if width == height {
        // No gap. The side panels are dropped rather than realized at zero
        // width, which native surfaces cannot represent.
        return Ok(Layout {
            backdrop,
            gameplay: Rect { x: 0, y: 0, width: side, height: side },
            bust: None,
            stat: None,
        });
    }

    let layout = if width > height {
        let gap = (width - side) / 2;
        let bust_w = shrink(gap);
        let bust_h = shrink(height);
        Layout {
            backdrop,
            gameplay: Rect { x: gap, y: 0, width: side, height: side },
            bust: Some(Rect {
                x: (gap - bust_w) / 2,
                y: (height - bust_h) / 2,
                width: bust_w,
                height: bust_h,
            }),
            stat: Some(Rect { x: width - gap, y: 0, width: gap, height }),
        }
    } else {
        // Portrait: the gaps sit above and below the gameplay square, so the
        // side panels relocate to top (bust) and bottom (stat).
        let gap = (height - side) / 2;
        let bust_w = shrink(width);
        let bust_h = shrink(gap);
        Layout {
            backdrop,
            gameplay: Rect { x: 0, y: gap, width: side, height: side },
            bust: Some(Rect {
                x: (width - bust_w) / 2,
                y: (gap - bust_h) / 2,
                width: bust_w,
                height: bust_h,
            }),
            stat: Some(Rect { x: 0, y: height - gap, width, height: gap }),
        }
    };

    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_16_9() {
        let l = compute(1920, 1080).unwrap();
        assert_eq!(l.gameplay, Rect { x: 420, y: 0, width: 1080, height: 1080 });
        assert_eq!(l.stat, Some(Rect { x: 1500, y: 0, width: 420, height: 1080 }));

        let bust = l.bust.unwrap();
        assert_eq!((bust.width, bust.height), (336, 864));
        // Centred within the left gap on both axes.
        assert_eq!(bust.x, (420 - 336) / 2);
        assert_eq!(bust.y, (1080 - 864) / 2);
    }

    #[test]
    fn deterministic() {
        let a = compute(2560, 1440).unwrap();
        let b = compute(2560, 1440).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn square_monitor_drops_side_panels() {
        let l = compute(1000, 1000).unwrap();
        assert_eq!(l.gameplay, Rect { x: 0, y: 0, width: 1000, height: 1000 });
        assert!(l.bust.is_none());
        assert!(l.stat.is_none());
    }

    #[test]
    fn portrait_relocates_gaps_to_top_and_bottom() {
        let l = compute(1080, 1920).unwrap();
        assert_eq!(l.gameplay, Rect { x: 0, y: 420, width: 1080, height: 1080 });
        assert_eq!(l.stat, Some(Rect { x: 0, y: 1500, width: 1080, height: 420 }));

        let bust = l.bust.unwrap();
        assert_eq!((bust.width, bust.height), (864, 336));
        assert_eq!(bust.y, (420 - 336) / 2);
    }

    #[test]
    fn containment() {
        for (w, h) in [(1920, 1080), (1280, 1024), (1080, 1920), (3440, 1440), (1921, 1080)] {
            let l = compute(w, h).unwrap();
            assert_eq!(l.gameplay.width, w.min(h));
            assert_eq!(l.gameplay.height, w.min(h));
            for side in [l.bust, l.stat].into_iter().flatten() {
                assert!(!side.overlaps(&l.gameplay), "{w}x{h}: {side:?} overlaps gameplay");
                assert!(side.width >= 0 && side.height >= 0);
                assert!(side.x >= 0 && side.y >= 0);
            }
        }
    }

    #[test]
    fn degenerate_bounds_rejected() {
        assert!(compute(0, 1080).is_err());
        assert!(compute(1920, 0).is_err());
        assert!(compute(-1, -1).is_err());
    }

    #[test]
    fn monitor_finalise() {
        let m = PendingMonitor {
            width: 1920,
            height: 1080,
            physical_width: 600,
            physical_height: 340,
            refresh_mhz: 59_997,
            scale: 0,
        }
        .finalise();

        assert_eq!(m.shortest, 1080);
        assert_eq!(m.side, ShortestSide::Height);
        assert_eq!(m.refresh_hz, 60);
        assert_eq!(m.scale, 1);

        let sq = PendingMonitor { width: 800, height: 800, ..Default::default() }.finalise();
        assert_eq!(sq.side, ShortestSide::Square);
    }
}
