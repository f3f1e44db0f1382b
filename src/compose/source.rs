use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::path::PathBuf;

use image::ImageError;
use image::ImageReader;
use image::Limits;
use image::RgbaImage;

use crate::error::ComposeError;
use crate::error::Result;


/// Largest width or height accepted from any decoded image.
pub const MAX_DECODE_DIMENSION: u32 = 16384;

#[derive(Debug, Clone)]
pub enum ImageSource {
    Payload(Vec<u8>),
    Path(PathBuf),
    Asset(&'static str),
}

impl std::fmt::Display for ImageSource {

    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payload(data) => f.write_fmt(format_args!("<payload {} bytes>", data.len())),
            Self::Path(path) => f.write_fmt(format_args!("{}", path.display())),
            Self::Asset(name) => f.write_fmt(format_args!("asset:{}", name)),
        }
    }
}

pub trait ImageLoader: Send + Sync {

    fn load(&self, source: &ImageSource) -> Result<RgbaImage>;

}


pub struct AssetLoader {
    root: PathBuf,
}

impl AssetLoader {

    pub fn new(root: PathBuf) -> Self {
        AssetLoader {
            root
        }
    }

    fn read(&self, path: &Path) -> Result<RgbaImage> {
        let data = fs::read(path).map_err(|source| ComposeError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        decode(&data)
    }
}

impl ImageLoader for AssetLoader {

    fn load(&self, source: &ImageSource) -> Result<RgbaImage> {
        match source {
            ImageSource::Payload(data) => decode(data),
            ImageSource::Path(path) => self.read(path),
            ImageSource::Asset(name) => self.read(&self.root.join(name)),
        }
    }
}


/// Decodes PNG/JPEG (or any format `image` recognises by magic bytes) into RGBA.
pub fn decode(data: &[u8]) -> Result<RgbaImage> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_DIMENSION);
    limits.max_image_height = Some(MAX_DECODE_DIMENSION);

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ComposeError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(ComposeError::Decode(String::from("unrecognized image format")));
    }
    reader.limits(limits);
    let image = reader.decode().map_err(decode_error)?;
    Ok(image.into_rgba8())
}

fn decode_error(e: ImageError) -> ComposeError {
    match e {
        ImageError::Unsupported(err) => ComposeError::Decode(format!("unsupported: {}", err)),
        ImageError::Limits(err) => ComposeError::Decode(format!("too large: {}", err)),
        e => ComposeError::Decode(e.to_string()),
    }
}


#[cfg(test)]
mod test {

    use super::*;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_png_payload() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let loader = AssetLoader::new(PathBuf::new());
        let decoded = loader.load(&ImageSource::Payload(png_bytes(&img))).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1), &image::Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn test_text_payload_is_decode_error() {
        let loader = AssetLoader::new(PathBuf::new());
        let text = b"this is not an image, just a renamed text file\n".to_vec();
        match loader.load(&ImageSource::Payload(text)) {
            Err(ComposeError::Decode(_)) => {},
            other => panic!("unexpected: {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let img = RgbaImage::from_pixel(16, 16, image::Rgba([9, 9, 9, 255]));
        let mut data = png_bytes(&img);
        data.truncate(data.len() / 2);
        assert!(matches!(decode(&data), Err(ComposeError::Decode(_))));
    }

    #[test]
    fn test_missing_asset_is_file_read_error() {
        let loader = AssetLoader::new(std::env::temp_dir().join("story_hud_no_such_dir"));
        match loader.load(&ImageSource::Asset("hud-classic.png")) {
            Err(ComposeError::FileRead { path, .. }) => {
                assert!(path.ends_with("hud-classic.png"));
            },
            other => panic!("unexpected: {:?}", other.map(|i| i.dimensions())),
        }
    }
}
