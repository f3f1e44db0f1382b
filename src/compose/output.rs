use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;


pub const PNG_MIME: &'static str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Png,
    Base64,
}

impl Default for OutputMode {

    fn default() -> Self {
        Self::Png
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" | "blob" => Ok(Self::Png),
            "base64" | "dataurl" => Ok(Self::Base64),
            _ => Err(format!("unknown output mode `{}`", s)),
        }
    }
}


/// Encoded composite. Both forms carry the same PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedImage {
    Png(Vec<u8>),
    DataUrl(String),
}

impl EncodedImage {

    pub fn from_png(data: Vec<u8>, mode: OutputMode) -> Self {
        match mode {
            OutputMode::Png => Self::Png(data),
            OutputMode::Base64 => Self::DataUrl(format!("data:{};base64,{}", PNG_MIME, STANDARD.encode(&data))),
        }
    }

    /// Raw PNG bytes, decoding the data URL form if needed.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Png(data) => data,
            Self::DataUrl(url) => {
                let payload = url.splitn(2, ',').nth(1).unwrap_or_default();
                STANDARD.decode(payload).unwrap_or_default()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Png(data) => data.len(),
            Self::DataUrl(url) => url.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_modes_carry_same_png() {
        let png = vec![0x89, b'P', b'N', b'G', 1, 2, 3];
        let bin = EncodedImage::from_png(png.clone(), OutputMode::Png);
        let url = EncodedImage::from_png(png.clone(), OutputMode::Base64);
        match &url {
            EncodedImage::DataUrl(s) => assert!(s.starts_with("data:image/png;base64,")),
            _ => panic!("expected data url"),
        }
        assert_eq!(bin.len(), png.len());
        assert!(!bin.is_empty());
        assert_eq!(bin.into_bytes(), png);
        assert_eq!(url.into_bytes(), png);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("png".parse::<OutputMode>(), Ok(OutputMode::Png));
        assert_eq!("base64".parse::<OutputMode>(), Ok(OutputMode::Base64));
        assert!("gif".parse::<OutputMode>().is_err());
    }
}
