/// Cover-fit placement of a source rectangle on a target rectangle.
///
/// `scale` is the larger of the two axis ratios, so the scaled source covers the
/// target on both axes and overflows on one of them. Offsets are the top-left of
/// the scaled source in target space and are zero or negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub scaled_width: f64,
    pub scaled_height: f64,
    source: (u32, u32),
    target: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Fit {

    /// `None` when any side is zero; there is no finite scale to draw with.
    pub fn cover(source_width: u32, source_height: u32, target_width: u32, target_height: u32) -> Option<Self> {
        if source_width == 0 || source_height == 0 || target_width == 0 || target_height == 0 {
            return None;
        }
        let (sw, sh) = (source_width as f64, source_height as f64);
        let (tw, th) = (target_width as f64, target_height as f64);
        let scale = f64::max(tw / sw, th / sh);
        let scaled_width = sw * scale;
        let scaled_height = sh * scale;
        Some(Fit {
            scale,
            offset_x: (tw - scaled_width) / 2.0,
            offset_y: (th - scaled_height) / 2.0,
            scaled_width,
            scaled_height,
            source: (source_width, source_height),
            target: (target_width, target_height),
        })
    }

    /// The source pixels that are at least partly visible on the target.
    ///
    /// The window is widened to whole pixels, so once scaled it may hang a
    /// fraction of a pixel over the target edges; see [`Fit::project`].
    pub fn source_rect(&self) -> Rect {
        let (sw, sh) = self.source;
        let (tw, th) = self.target;
        let (x, width) = visible_span(self.offset_x, self.scale, tw, sw);
        let (y, height) = visible_span(self.offset_y, self.scale, th, sh);
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// Where `rect` (in source pixels) lands on the target, as a top-left
    /// position and a size in target pixels. The position may be negative.
    pub fn project(&self, rect: &Rect) -> Placement {
        let (x, width) = project_span(self.offset_x, self.scale, rect.x, rect.width);
        let (y, height) = project_span(self.offset_y, self.scale, rect.y, rect.height);
        Placement {
            x,
            y,
            width,
            height,
        }
    }
}

/// Scaled source window in target space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

// float noise must not pull in a source pixel that only touches the edge
const EDGE_EPS: f64 = 1e-9;

fn visible_span(offset: f64, scale: f64, target: u32, source: u32) -> (u32, u32) {
    let start = ((-offset / scale) + EDGE_EPS).floor().max(0.0);
    let end = (((target as f64 - offset) / scale) - EDGE_EPS).ceil().min(source as f64);
    let start = std::cmp::min(start as u32, source - 1);
    let end = std::cmp::max(end as u32, start + 1);
    (start, end - start)
}

fn project_span(offset: f64, scale: f64, start: u32, len: u32) -> (i64, u32) {
    let from = (offset + start as f64 * scale).round() as i64;
    let to = (offset + (start + len) as f64 * scale).round() as i64;
    (from, std::cmp::max(to - from, 1) as u32)
}


#[cfg(test)]
mod test {

    use super::*;

    const EPS: f64 = 1e-9;

    fn check_cover(w: u32, h: u32, tw: u32, th: u32) {
        let fit = Fit::cover(w, h, tw, th).unwrap();
        let expect = f64::max(tw as f64 / w as f64, th as f64 / h as f64);
        assert!((fit.scale - expect).abs() < EPS, "scale for {}x{}", w, h);
        assert!(fit.scaled_width + EPS >= tw as f64);
        assert!(fit.scaled_height + EPS >= th as f64);
        assert!((fit.offset_x + fit.scaled_width / 2.0 - tw as f64 / 2.0).abs() < 1e-6);
        assert!((fit.offset_y + fit.scaled_height / 2.0 - th as f64 / 2.0).abs() < 1e-6);
        assert!(fit.offset_x <= EPS && fit.offset_y <= EPS);
    }

    #[test]
    fn test_cover_and_center() {
        for (w, h) in &[
            (500, 500),
            (1080, 1920),
            (4000, 3000),
            (3000, 4000),
            (1, 1),
            (1, 5000),
            (7000, 3),
            (1079, 1921),
        ] {
            check_cover(*w, *h, 1080, 1920);
        }
        check_cover(640, 480, 300, 300);
    }

    #[test]
    fn test_square_on_story() {
        let fit = Fit::cover(500, 500, 1080, 1920).unwrap();
        assert!((fit.scale - 3.84).abs() < EPS);
        assert!((fit.scaled_width - 1920.0).abs() < 1e-6);
        assert!((fit.offset_x - (-420.0)).abs() < 1e-6);
        assert!(fit.offset_y.abs() < 1e-6);
        let rect = fit.source_rect();
        assert_eq!(rect, Rect { x: 109, y: 0, width: 282, height: 500 });
        // 109 * 3.84 - 420 = -1.44, 391 * 3.84 - 420 = 1081.44
        assert_eq!(fit.project(&rect), Placement { x: -1, y: 0, width: 1082, height: 1920 });
    }

    #[test]
    fn test_exact_size_is_identity() {
        let fit = Fit::cover(1080, 1920, 1080, 1920).unwrap();
        assert!((fit.scale - 1.0).abs() < EPS);
        let rect = fit.source_rect();
        assert_eq!(rect, Rect { x: 0, y: 0, width: 1080, height: 1920 });
        assert_eq!(fit.project(&rect), Placement { x: 0, y: 0, width: 1080, height: 1920 });
    }

    #[test]
    fn test_odd_width_window() {
        // 11x3 on story: scale 640, offset_x -2980, columns 4..7 visible
        let fit = Fit::cover(11, 3, 1080, 1920).unwrap();
        assert!((fit.scale - 640.0).abs() < EPS);
        assert!((fit.offset_x - (-2980.0)).abs() < 1e-6);
        let rect = fit.source_rect();
        assert_eq!(rect, Rect { x: 4, y: 0, width: 3, height: 3 });
        assert_eq!(fit.project(&rect), Placement { x: -420, y: 0, width: 1920, height: 1920 });
    }

    #[test]
    fn test_degenerate() {
        assert!(Fit::cover(0, 100, 1080, 1920).is_none());
        assert!(Fit::cover(100, 0, 1080, 1920).is_none());
        assert!(Fit::cover(100, 100, 0, 1920).is_none());
    }
}
