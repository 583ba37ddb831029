//! Decoration images: read and decoded once, before anything is drawn.

use std::io::Cursor;
use std::path::Path;

use image::ImageDecoder;
use pdf_writer::{Filter, Pdf, Ref};

use crate::config::AssetConfig;
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetSlot {
    Logo,
    Band,
    Title,
    Footer,
}

impl AssetSlot {
    pub const ALL: [AssetSlot; 4] = [
        AssetSlot::Logo,
        AssetSlot::Band,
        AssetSlot::Title,
        AssetSlot::Footer,
    ];

    pub(crate) fn pdf_name(self) -> &'static str {
        match self {
            AssetSlot::Logo => "Im1",
            AssetSlot::Band => "Im2",
            AssetSlot::Title => "Im3",
            AssetSlot::Footer => "Im4",
        }
    }
}

#[derive(Clone, Debug)]
enum PixelData {
    /// JPEG bytes, written as-is with DCTDecode.
    Jpeg { data: Vec<u8>, color: JpegColor },
    /// zlib-compressed RGB samples plus an optional compressed alpha plane.
    Flate { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

/// Colour space of a passed-through JPEG.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JpegColor {
    Gray,
    Rgb,
    /// Adobe writers store CMYK samples inverted.
    Cmyk { inverted: bool },
}

impl JpegColor {
    fn detect(original: image::ExtendedColorType, data: &[u8]) -> Result<Self, String> {
        match original {
            image::ExtendedColorType::L8 => Ok(JpegColor::Gray),
            image::ExtendedColorType::Rgb8 => Ok(JpegColor::Rgb),
            image::ExtendedColorType::Cmyk8 => Ok(JpegColor::Cmyk {
                inverted: has_adobe_marker(data),
            }),
            other => Err(format!("unsupported JPEG colour type {other:?}")),
        }
    }
}

/// APP14 "Adobe" segment.
fn has_adobe_marker(data: &[u8]) -> bool {
    data.windows(9)
        .any(|w| w[0] == 0xFF && w[1] == 0xEE && &w[4..9] == b"Adobe")
}

#[derive(Clone, Debug)]
pub struct DecorImage {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pixels: PixelData,
}

impl DecorImage {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, String> {
        match image::guess_format(&data).map_err(|e| e.to_string())? {
            image::ImageFormat::Jpeg => {
                let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(&data))
                    .map_err(|e| e.to_string())?;
                let (w, h) = decoder.dimensions();
                let color = JpegColor::detect(decoder.original_color_type(), &data)?;
                Ok(DecorImage {
                    pixel_width: w,
                    pixel_height: h,
                    pixels: PixelData::Jpeg { data, color },
                })
            }
            image::ImageFormat::Png => {
                let reader = image::ImageReader::with_format(
                    std::io::BufReader::new(Cursor::new(&data)),
                    image::ImageFormat::Png,
                );
                let rgba = reader.decode().map_err(|e| e.to_string())?.to_rgba8();
                let (w, h) = (rgba.width(), rgba.height());
                let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

                let rgb_data: Vec<u8> = rgba
                    .pixels()
                    .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
                    .collect();
                let alpha = has_alpha.then(|| {
                    let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
                    miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6)
                });
                Ok(DecorImage {
                    pixel_width: w,
                    pixel_height: h,
                    pixels: PixelData::Flate {
                        rgb: miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6),
                        alpha,
                    },
                })
            }
            other => Err(format!("unsupported image format {other:?}")),
        }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read(path).map_err(|e| Error::asset(path, e))?;
        Self::from_bytes(data).map_err(|reason| Error::asset(path, reason))
    }

    /// Write the image as an XObject at `xobj_ref`.
    pub(crate) fn write(&self, pdf: &mut Pdf, xobj_ref: Ref, alloc: &mut impl FnMut() -> Ref) {
        let (w, h) = (self.pixel_width as i32, self.pixel_height as i32);
        match &self.pixels {
            PixelData::Jpeg { data, color } => {
                let mut xobj = pdf.image_xobject(xobj_ref, data);
                xobj.filter(Filter::DctDecode);
                xobj.width(w);
                xobj.height(h);
                match color {
                    JpegColor::Gray => xobj.color_space().device_gray(),
                    JpegColor::Rgb => xobj.color_space().device_rgb(),
                    JpegColor::Cmyk { inverted } => {
                        xobj.color_space().device_cmyk();
                        if *inverted {
                            xobj.decode([1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
                        }
                    }
                }
                xobj.bits_per_component(8);
            }
            PixelData::Flate { rgb, alpha } => {
                let smask_ref = alpha.as_ref().map(|alpha| {
                    let mask_ref = alloc();
                    let mut mask = pdf.image_xobject(mask_ref, alpha);
                    mask.filter(Filter::FlateDecode);
                    mask.width(w);
                    mask.height(h);
                    mask.color_space().device_gray();
                    mask.bits_per_component(8);
                    mask_ref
                });
                let mut xobj = pdf.image_xobject(xobj_ref, rgb);
                xobj.filter(Filter::FlateDecode);
                xobj.width(w);
                xobj.height(h);
                xobj.color_space().device_rgb();
                xobj.bits_per_component(8);
                if let Some(mask_ref) = smask_ref {
                    xobj.s_mask(mask_ref);
                }
            }
        }
    }
}

/// The statement's decoration images. Unset slots stay empty and their
/// regions are left blank.
#[derive(Clone, Debug, Default)]
pub struct DecorAssets {
    images: [Option<DecorImage>; 4],
}

impl DecorAssets {
    pub fn none() -> Self {
        Self::default()
    }

    /// Load every configured image. A configured image that cannot be read
    /// or decoded fails the whole load.
    pub fn load(config: &AssetConfig) -> Result<Self, Error> {
        let mut assets = DecorAssets::none();
        for slot in AssetSlot::ALL {
            let path = match slot {
                AssetSlot::Logo => &config.logo,
                AssetSlot::Band => &config.band,
                AssetSlot::Title => &config.title,
                AssetSlot::Footer => &config.footer,
            };
            if let Some(path) = path {
                let img = DecorImage::load(path)?;
                log::debug!(
                    "Asset {slot:?}: {} ({}x{})",
                    path.display(),
                    img.pixel_width,
                    img.pixel_height
                );
                assets.images[slot as usize] = Some(img);
            }
        }
        Ok(assets)
    }

    pub fn get(&self, slot: AssetSlot) -> Option<&DecorImage> {
        self.images[slot as usize].as_ref()
    }

    pub fn loaded(&self) -> impl Iterator<Item = (AssetSlot, &DecorImage)> {
        AssetSlot::ALL
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|img| (slot, img)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(alpha: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, alpha]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn png_is_decoded_with_optional_soft_mask() {
        let opaque = DecorImage::from_bytes(png_bytes(255)).unwrap();
        assert_eq!((opaque.pixel_width, opaque.pixel_height), (4, 2));
        assert!(matches!(opaque.pixels, PixelData::Flate { alpha: None, .. }));

        let translucent = DecorImage::from_bytes(png_bytes(128)).unwrap();
        assert!(matches!(
            translucent.pixels,
            PixelData::Flate { alpha: Some(_), .. }
        ));
    }

    #[test]
    fn jpeg_keeps_its_colour_space() {
        let img = image::RgbImage::from_pixel(3, 3, image::Rgb([200, 100, 50]));
        let mut rgb = Vec::new();
        img.write_to(&mut Cursor::new(&mut rgb), image::ImageFormat::Jpeg)
            .unwrap();
        let decoded = DecorImage::from_bytes(rgb).unwrap();
        assert!(matches!(
            decoded.pixels,
            PixelData::Jpeg { color: JpegColor::Rgb, .. }
        ));

        let adobe = [0xFF, 0xD8, 0xFF, 0xEE, 0x00, 0x0E, b'A', b'd', b'o', b'b', b'e', 0x00];
        assert_eq!(
            JpegColor::detect(image::ExtendedColorType::Cmyk8, &adobe),
            Ok(JpegColor::Cmyk { inverted: true })
        );
        assert_eq!(
            JpegColor::detect(image::ExtendedColorType::Cmyk8, &[0xFF, 0xD8]),
            Ok(JpegColor::Cmyk { inverted: false })
        );
        assert_eq!(
            JpegColor::detect(image::ExtendedColorType::L8, &[]),
            Ok(JpegColor::Gray)
        );
        assert!(JpegColor::detect(image::ExtendedColorType::Rgb16, &[]).is_err());
    }

    #[test]
    fn cmyk_jpeg_is_written_as_device_cmyk() {
        let image = DecorImage {
            pixel_width: 2,
            pixel_height: 2,
            pixels: PixelData::Jpeg {
                data: vec![0xFF, 0xD8, 0xFF, 0xD9],
                color: JpegColor::Cmyk { inverted: true },
            },
        };
        let mut pdf = Pdf::new();
        let mut next = 2;
        let mut alloc = || {
            next += 1;
            Ref::new(next)
        };
        image.write(&mut pdf, Ref::new(1), &mut alloc);
        let text = String::from_utf8_lossy(&pdf.finish()).into_owned();
        assert!(text.contains("/DeviceCMYK"));
        assert!(text.contains("/Decode [1 0 1 0 1 0 1 0]"));
        assert!(!text.contains("/DeviceRGB"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(DecorImage::from_bytes(b"not an image".to_vec()).is_err());
    }

    #[test]
    fn missing_configured_asset_is_fatal() {
        let config = AssetConfig {
            logo: Some("/nonexistent/logo.png".into()),
            ..AssetConfig::default()
        };
        match DecorAssets::load(&config) {
            Err(Error::Asset { path, .. }) => assert!(path.ends_with("logo.png")),
            other => panic!("expected asset error, got {other:?}"),
        }
    }

    #[test]
    fn unset_assets_are_skipped() {
        let assets = DecorAssets::load(&AssetConfig::default()).unwrap();
        assert_eq!(assets.loaded().count(), 0);
    }
}
