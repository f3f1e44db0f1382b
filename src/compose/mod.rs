pub mod canvas;
pub mod fit;
pub mod output;
pub mod overlay;
pub mod source;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use image::RgbaImage;
use image::imageops::FilterType;

use crate::error::ComposeError;
use crate::error::Result;
use canvas::Canvas;
use output::EncodedImage;
use output::OutputMode;
use overlay::OverlayStyle;
use source::AssetLoader;
use source::ImageLoader;
use source::ImageSource;


pub const STORY_WIDTH: u32 = 1080;
pub const STORY_HEIGHT: u32 = 1920;

/// How big the output is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingPolicy {
    /// Fixed target size; the photo is cover-fit and centred on black.
    Story,
    /// The photo's own size; the overlay is stretched over it.
    Native,
}

impl FromStr for SizingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "story" => Ok(Self::Story),
            "native" => Ok(Self::Native),
            _ => Err(format!("unknown sizing policy `{}`", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComposeOptions {
    width: u32,
    height: u32,
    sizing: SizingPolicy,
    filter: FilterType,
    max_canvas_pixels: u64,
}

impl Default for ComposeOptions {

    fn default() -> Self {
        ComposeOptions {
            width: STORY_WIDTH,
            height: STORY_HEIGHT,
            sizing: SizingPolicy::Story,
            filter: FilterType::Triangle,
            max_canvas_pixels: 64 * 1024 * 1024,
        }
    }
}

impl ComposeOptions {

    pub fn set_size(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    pub fn set_sizing(&mut self, sizing: SizingPolicy) {
        self.sizing = sizing;
    }

    /// Unknown names leave the filter unchanged and return `false`.
    pub fn set_filter(&mut self, filter: &str) -> bool {
        match filter {
            "nearest" => self.filter = FilterType::Nearest,
            "triangle" => self.filter = FilterType::Triangle,
            "gaussian" => self.filter = FilterType::Gaussian,
            "catmullrom" => self.filter = FilterType::CatmullRom,
            "lanczos3" => self.filter = FilterType::Lanczos3,
            _ => return false,
        }
        true
    }

    pub fn set_max_canvas_pixels(&mut self, max: u64) {
        self.max_canvas_pixels = max;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn sizing(&self) -> SizingPolicy {
        self.sizing
    }
}


pub struct Compositor {
    options: ComposeOptions,
    loader: Box<dyn ImageLoader>,
}

impl Compositor {

    pub fn new(options: ComposeOptions, loader: Box<dyn ImageLoader>) -> Self {
        Compositor {
            options,
            loader,
        }
    }

    pub fn with_assets(options: ComposeOptions, asset_folder: PathBuf) -> Self {
        Self::new(options, Box::new(AssetLoader::new(asset_folder)))
    }

    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    /// Decode the photo, cover it onto a fresh canvas, put the HUD on top and
    /// encode. Nothing is kept between calls.
    pub fn compose(&self, source: ImageSource, style: Option<OverlayStyle>, mode: OutputMode) -> Result<EncodedImage> {
        let time = Instant::now();
        let style = style.unwrap_or_default();

        let photo = self.loader.load(&source)?;
        log::debug!("decoded {} as {}x{}", source, photo.width(), photo.height());
        drop(source);

        let (width, height) = match self.options.sizing {
            SizingPolicy::Story => (self.options.width, self.options.height),
            SizingPolicy::Native => photo.dimensions(),
        };
        let mut canvas = Canvas::new(width, height, self.options.max_canvas_pixels)?;
        canvas.draw_cover(&photo, self.options.filter);
        drop(photo);

        let hud = self.load_overlay(style)?;
        canvas.draw_stretched(&hud, self.options.filter);
        drop(hud);

        let encoded = canvas.encode(mode)?;
        log::info!("composed {}x{} with `{}` hud, {} bytes, used {}ms", width, height, style, encoded.len(), time.elapsed().as_millis());
        Ok(encoded)
    }

    fn load_overlay(&self, style: OverlayStyle) -> Result<RgbaImage> {
        let mut last = None;
        for name in style.candidates() {
            match self.loader.load(&ImageSource::Asset(name)) {
                Ok(img) => {
                    log::debug!("hud `{}` from {}", style, name);
                    return Ok(img);
                },
                Err(e) => {
                    log::warn!("hud candidate {} failed: {}", name, e);
                    last = Some(e);
                }
            }
        }
        let source = last.unwrap_or_else(|| ComposeError::Decode(String::from("no candidates")));
        Err(ComposeError::OverlayUnavailable {
            style: style.to_string(),
            source: Box::new(source),
        })
    }
}
