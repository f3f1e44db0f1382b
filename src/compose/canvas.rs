use std::io::Cursor;

use image::DynamicImage;
use image::ImageFormat;
use image::Rgba;
use image::RgbaImage;
use image::imageops;
use image::imageops::FilterType;

use crate::error::ComposeError;
use crate::error::Result;
use super::fit::Fit;
use super::output::EncodedImage;
use super::output::OutputMode;


pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Fresh RGBA drawing surface for one compose call.
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {

    /// The one capability check: a surface of this size must be allocatable.
    pub fn new(width: u32, height: u32, max_pixels: u64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ComposeError::CanvasUnavailable(format!("empty surface {}x{}", width, height)));
        }
        let pixels = width as u64 * height as u64;
        if pixels > max_pixels {
            return Err(ComposeError::CanvasUnavailable(format!("{}x{} exceeds {} pixels", width, height, max_pixels)));
        }
        Ok(Canvas {
            image: RgbaImage::from_pixel(width, height, BACKGROUND),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Scales `img` to cover the whole canvas, centred, and blends it over the
    /// background. Returns `false` and leaves the canvas untouched when `img`
    /// has no area.
    pub fn draw_cover(&mut self, img: &RgbaImage, filter: FilterType) -> bool {
        let fit = match Fit::cover(img.width(), img.height(), self.width(), self.height()) {
            Some(fit) => fit,
            None => {
                log::warn!("skip drawing degenerate image {}x{}", img.width(), img.height());
                return false;
            }
        };
        let rect = fit.source_rect();
        let place = fit.project(&rect);
        log::debug!("cover fit scale={:.4} offset=({:.1},{:.1}) crop={:?} at {:?}", fit.scale, fit.offset_x, fit.offset_y, rect, place);
        let visible = imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image();
        let layer = if visible.dimensions() == (place.width, place.height) {
            visible
        } else {
            imageops::resize(&visible, place.width, place.height, filter)
        };
        imageops::overlay(&mut self.image, &layer, place.x, place.y);
        true
    }

    /// Draws `overlay` stretched to exactly the canvas size, source-over.
    pub fn draw_stretched(&mut self, overlay: &RgbaImage, filter: FilterType) {
        if overlay.width() == 0 || overlay.height() == 0 {
            log::warn!("skip drawing empty overlay");
            return;
        }
        if overlay.dimensions() == self.image.dimensions() {
            imageops::overlay(&mut self.image, overlay, 0, 0);
        } else {
            let stretched = imageops::resize(overlay, self.width(), self.height(), filter);
            imageops::overlay(&mut self.image, &stretched, 0, 0);
        }
    }

    pub fn encode(self, mode: OutputMode) -> Result<EncodedImage> {
        let mut ofile = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(self.image)
            .write_to(&mut ofile, ImageFormat::Png)
            .map_err(|e| ComposeError::Encode(e.to_string()))?;
        Ok(EncodedImage::from_png(ofile.into_inner(), mode))
    }
}


#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_new_is_black() {
        let canvas = Canvas::new(4, 8, 1_000).unwrap();
        assert_eq!(canvas.as_image().dimensions(), (4, 8));
        assert!(canvas.as_image().pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn test_unavailable() {
        assert!(matches!(Canvas::new(0, 8, 1_000), Err(ComposeError::CanvasUnavailable(_))));
        assert!(matches!(Canvas::new(100, 100, 9_999), Err(ComposeError::CanvasUnavailable(_))));
        assert!(Canvas::new(100, 100, 10_000).is_ok());
    }

    #[test]
    fn test_cover_keeps_centre_column() {
        // left third red, middle third green, right third blue
        let mut img = RgbaImage::new(30, 10);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = match x / 10 {
                0 => Rgba([255, 0, 0, 255]),
                1 => Rgba([0, 255, 0, 255]),
                _ => Rgba([0, 0, 255, 255]),
            };
        }
        let mut canvas = Canvas::new(10, 10, 1_000).unwrap();
        assert!(canvas.draw_cover(&img, FilterType::Nearest));
        assert!(canvas.as_image().pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn test_cover_odd_width_lands_on_fit_offset() {
        // 11 distinct columns; scale 640 puts column c at x = 640 * c - 2980
        let mut img = RgbaImage::new(11, 3);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = Rgba([x as u8 * 20, 0, 0, 255]);
        }
        let mut canvas = Canvas::new(1080, 1920, 4_000_000).unwrap();
        assert!(canvas.draw_cover(&img, FilterType::Nearest));
        let column = |x: u32| canvas.as_image().get_pixel(x, 960)[0] / 20;
        assert_eq!(column(0), 4);
        assert_eq!(column(219), 4);
        assert_eq!(column(220), 5);
        assert_eq!(column(300), 5);
        assert_eq!(column(859), 5);
        assert_eq!(column(860), 6);
        assert_eq!(column(900), 6);
        assert_eq!(column(1079), 6);
    }

    #[test]
    fn test_cover_skips_degenerate() {
        let mut canvas = Canvas::new(10, 10, 1_000).unwrap();
        assert!(!canvas.draw_cover(&RgbaImage::new(0, 5), FilterType::Triangle));
        assert!(canvas.as_image().pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn test_transparent_user_image_shows_background() {
        let img = RgbaImage::from_pixel(5, 5, Rgba([255, 255, 255, 0]));
        let mut canvas = Canvas::new(10, 20, 1_000).unwrap();
        canvas.draw_cover(&img, FilterType::Nearest);
        assert!(canvas.as_image().pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn test_stretched_overlay_fills_canvas() {
        let overlay = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        let mut canvas = Canvas::new(6, 12, 1_000).unwrap();
        canvas.draw_stretched(&overlay, FilterType::Nearest);
        assert!(canvas.as_image().pixels().all(|p| *p == Rgba([10, 20, 30, 255])));
    }

    #[test]
    fn test_encode_png() {
        let canvas = Canvas::new(3, 7, 1_000).unwrap();
        let data = canvas.encode(OutputMode::Png).unwrap().into_bytes();
        let back = image::load_from_memory(&data).unwrap();
        assert_eq!((back.width(), back.height()), (3, 7));
    }
}
