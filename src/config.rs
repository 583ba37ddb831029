//! Layout configuration: page size, table geometry, type sizes and the
//! declarative decoration regions drawn around the ledger table.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::geometry::Rect;

/// RGB colour, 0–255 per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Parse `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(val: &str) -> Option<Rgb> {
        let val = val.strip_prefix('#').unwrap_or(val);
        if val.len() != 6 || !val.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&val[0..2], 16).ok()?;
        let g = u8::from_str_radix(&val[2..4], 16).ok()?;
        let b = u8::from_str_radix(&val[4..6], 16).ok()?;
        Some(Rgb(r, g, b))
    }

    pub(crate) fn to_unit(self) -> (f32, f32, f32) {
        (
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        )
    }
}

/// A named rectangle on the page. `x` is measured from the left edge, or
/// from the right edge to the region's right side when `from_right` is set;
/// `y` likewise from the top, or from the bottom edge up to the region's top.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub from_right: bool,
    #[serde(default)]
    pub from_bottom: bool,
}

impl Region {
    pub const fn top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Region {
            x,
            y,
            width,
            height,
            from_right: false,
            from_bottom: false,
        }
    }

    pub const fn top_right(x: f32, y: f32, width: f32, height: f32) -> Self {
        Region {
            x,
            y,
            width,
            height,
            from_right: true,
            from_bottom: false,
        }
    }

    pub const fn bottom_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Region {
            x,
            y,
            width,
            height,
            from_right: false,
            from_bottom: true,
        }
    }

    pub const fn bottom_right(x: f32, y: f32, width: f32, height: f32) -> Self {
        Region {
            x,
            y,
            width,
            height,
            from_right: true,
            from_bottom: true,
        }
    }

    /// Place the region on a page of the given size.
    pub fn rect(&self, page_width: f32, page_height: f32) -> Rect {
        let x = if self.from_right {
            page_width - self.x - self.width
        } else {
            self.x
        };
        let y = if self.from_bottom {
            page_height - self.y
        } else {
            self.y
        };
        Rect::new(x, y, self.width, self.height)
    }
}

/// Decoration regions. Top regions must end above the table top of the
/// page kind they appear on; bottom regions define the space reserved
/// below the table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Regions {
    pub logo: Region,
    pub top_band: Region,
    pub title_image: Region,
    pub metadata_box: Region,
    pub account_fields: Region,
    pub continuation_fields: Region,
    pub disclaimer: Region,
    pub bottom_artwork: Region,
    pub bottom_band: Region,
    pub page_number: Region,
}

impl Default for Regions {
    fn default() -> Self {
        Regions {
            logo: Region::top_left(1.0, 0.0, 300.0, 70.0),
            top_band: Region::top_left(301.0, 0.0, 1000.0, 13.0),
            title_image: Region::top_right(105.0, 30.0, 250.0, 40.0),
            metadata_box: Region::top_right(50.0, 90.0, 360.0, 130.0),
            account_fields: Region::top_left(5.0, 100.0, 420.0, 110.0),
            continuation_fields: Region::top_left(50.0, 100.0, 420.0, 32.0),
            disclaimer: Region::bottom_left(5.0, 90.0, 949.76, 24.0),
            bottom_artwork: Region::bottom_right(2.0, 90.0, 300.0, 70.0),
            bottom_band: Region::bottom_left(0.0, 31.0, 1000.0, 11.0),
            page_number: Region::bottom_right(10.0, 15.0, 200.0, 14.0),
        }
    }
}

impl Regions {
    /// Top-anchored regions drawn on the first page.
    pub fn first_page_top(&self) -> [Region; 5] {
        [
            self.logo,
            self.top_band,
            self.title_image,
            self.metadata_box,
            self.account_fields,
        ]
    }

    /// Top-anchored regions drawn on continuation pages.
    pub fn continuation_top(&self) -> [Region; 4] {
        [
            self.logo,
            self.top_band,
            self.title_image,
            self.continuation_fields,
        ]
    }

    /// Bottom-anchored regions drawn on every page.
    pub fn page_bottom(&self) -> [Region; 4] {
        [
            self.disclaimer,
            self.bottom_artwork,
            self.bottom_band,
            self.page_number,
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontFace {
    /// Family name used for system font lookup.
    pub family: String,
    /// Explicit font file; takes precedence over the family lookup.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub regular: FontFace,
    pub bold: FontFace,
    /// Search system and configured directories for the families.
    pub system_lookup: bool,
    /// Extra directories searched before the platform font directories.
    pub directories: Vec<PathBuf>,
}

impl Default for FontFace {
    fn default() -> Self {
        FontFace {
            family: "Calibri".to_string(),
            path: None,
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        FontConfig {
            regular: FontFace::default(),
            bold: FontFace::default(),
            system_lookup: true,
            directories: Vec::new(),
        }
    }
}

/// Decoration images. Unset entries are skipped when drawing; their
/// regions still reserve space.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub logo: Option<PathBuf>,
    pub band: Option<PathBuf>,
    pub title: Option<PathBuf>,
    pub footer: Option<PathBuf>,
}

impl AssetConfig {
    /// Pick up `logo.*`, `band.*`, `title.*` and `footer.*` images from a
    /// directory.
    pub fn from_dir(dir: &Path) -> AssetConfig {
        let find = |stem: &str| {
            ["png", "jpg", "jpeg"]
                .iter()
                .map(|ext| dir.join(format!("{stem}.{ext}")))
                .find(|p| p.is_file())
        };
        AssetConfig {
            logo: find("logo"),
            band: find("band"),
            title: find("title"),
            footer: find("footer"),
        }
    }
}

pub const DEFAULT_DISCLAIMER: &str = "Note: The items and balance shown on this statement should be verified and the branch manager notified within 2 weeks of any discrepancies, otherwise it will be assumed as correct.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_width: f32,
    pub page_height: f32,
    /// Outer margin; the table spans `page_width - 2 * margin`.
    pub margin: f32,
    /// X of the table's left edge.
    pub table_left: f32,
    pub first_page_top: f32,
    pub continuation_top: f32,

    pub max_rows_per_page: usize,
    pub default_row_height: f32,
    /// Added to the minimum row height on continuation pages.
    pub continuation_row_extra: f32,
    pub header_row_height: f32,
    /// Minimum space kept free below the last row.
    pub footer_reserve: f32,
    pub cell_padding: f32,
    pub column_ratios: Vec<f32>,

    pub body_font_size: f32,
    pub header_font_size: f32,
    pub page_number_font_size: f32,
    pub field_font_size: f32,
    pub metadata_font_size: f32,
    pub disclaimer_font_size: f32,
    pub header_fill: String,

    pub regions: Regions,
    pub disclaimer: String,
    pub fonts: FontConfig,
    pub assets: AssetConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            page_width: 959.76,
            page_height: 1344.24,
            margin: 50.0,
            table_left: 48.0,
            first_page_top: 250.0,
            continuation_top: 135.0,
            max_rows_per_page: 18,
            default_row_height: 48.0,
            continuation_row_extra: 10.0,
            header_row_height: 30.0,
            footer_reserve: 20.0,
            cell_padding: 5.0,
            column_ratios: vec![1.0, 3.0, 1.0, 1.0, 1.0, 1.0],
            body_font_size: 15.0,
            header_font_size: 18.0,
            page_number_font_size: 12.0,
            field_font_size: 13.0,
            metadata_font_size: 11.0,
            disclaimer_font_size: 8.0,
            header_fill: "#2245E8".to_string(),
            regions: Regions::default(),
            disclaimer: DEFAULT_DISCLAIMER.to_string(),
            fonts: FontConfig::default(),
            assets: AssetConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let config: LayoutConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", e, path.display()),
            ))
        })?;
        Self::from_json_str(&json)
    }

    pub fn header_fill_rgb(&self) -> Result<Rgb, Error> {
        Rgb::from_hex(&self.header_fill).ok_or_else(|| {
            Error::InvalidLayout(format!("header_fill is not a colour: {:?}", self.header_fill))
        })
    }

    /// Reject configurations that cannot produce a page.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: String| Err(Error::InvalidLayout(msg));

        if !(self.page_width > 0.0 && self.page_height > 0.0) {
            return invalid(format!(
                "page size must be positive, got {}x{}",
                self.page_width, self.page_height
            ));
        }
        if self.margin < 0.0 || self.margin * 2.0 >= self.page_width {
            return invalid(format!("margin {} leaves no usable width", self.margin));
        }
        if self.column_ratios.len() != 6 {
            return invalid(format!(
                "expected 6 column ratios, got {}",
                self.column_ratios.len()
            ));
        }
        if self.column_ratios.iter().any(|r| !(*r > 0.0)) {
            return invalid("column ratios must be positive".to_string());
        }
        if self.max_rows_per_page == 0 {
            return invalid("max_rows_per_page must be at least 1".to_string());
        }
        let sizes = [
            ("default_row_height", self.default_row_height),
            ("header_row_height", self.header_row_height),
            ("body_font_size", self.body_font_size),
            ("header_font_size", self.header_font_size),
            ("page_number_font_size", self.page_number_font_size),
        ];
        for (name, value) in sizes {
            if !(value > 0.0) {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }
        for (name, value) in [
            ("first_page_top", self.first_page_top),
            ("continuation_top", self.continuation_top),
        ] {
            if value < 0.0 || value + self.header_row_height >= self.page_height {
                return invalid(format!("{name} {value} is outside the page"));
            }
        }
        self.header_fill_rgb()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        LayoutConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = LayoutConfig::from_json_str(
            r#"{"max_rows_per_page": 10, "regions": {"logo": {"x": 0, "y": 0, "width": 10, "height": 10}}}"#,
        )
        .unwrap();
        assert_eq!(config.max_rows_per_page, 10);
        assert_eq!(config.page_width, 959.76);
        assert_eq!(config.regions.logo.width, 10.0);
        assert_eq!(config.regions.disclaimer, Regions::default().disclaimer);
    }

    #[test]
    fn invalid_layouts_are_rejected() {
        let mut config = LayoutConfig::default();
        config.column_ratios = vec![1.0, 2.0];
        assert!(matches!(config.validate(), Err(Error::InvalidLayout(_))));

        let mut config = LayoutConfig::default();
        config.max_rows_per_page = 0;
        assert!(config.validate().is_err());

        let mut config = LayoutConfig::default();
        config.header_fill = "blue".into();
        assert!(config.validate().is_err());

        let mut config = LayoutConfig::default();
        config.first_page_top = 2000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn hex_colours() {
        assert_eq!(Rgb::from_hex("#2245E8"), Some(Rgb(0x22, 0x45, 0xE8)));
        assert_eq!(Rgb::from_hex("000000"), Some(Rgb::BLACK));
        assert_eq!(Rgb::from_hex("#12345"), None);
    }
}
