use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

use crate::config::{FontConfig, FontFace};
use crate::error::Error;

/// The four faces a statement is set in. Table and header fields use the
/// configured body faces; the metadata box and disclaimer use the base-14
/// sans faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FontRole {
    Regular,
    Bold,
    Sans,
    SansBold,
}

impl FontRole {
    /// Resource name inside page dictionaries.
    pub(crate) fn pdf_name(self) -> &'static str {
        match self {
            FontRole::Regular => "F1",
            FontRole::Bold => "F2",
            FontRole::Sans => "F3",
            FontRole::SansBold => "F4",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Horizontal and vertical metrics used for layout.
#[derive(Clone, Debug, PartialEq)]
pub struct FontMetrics {
    /// Advance widths at 1000 units/em for WinAnsi chars 32..=255.
    widths_1000: Vec<f32>,
    /// Width used for characters outside WinAnsi.
    fallback_1000: f32,
    pub line_h_ratio: f32,
    pub ascender_ratio: f32,
}

impl FontMetrics {
    pub fn helvetica() -> Self {
        FontMetrics {
            widths_1000: helvetica_widths(),
            fallback_1000: 556.0,
            line_h_ratio: 1.2,
            ascender_ratio: 0.75,
        }
    }

    fn from_face(face: &Face) -> Self {
        let units = face.units_per_em() as f32;
        let widths_1000: Vec<f32> = (32u8..=255u8)
            .map(|byte| {
                face.glyph_index(winansi_to_char(byte))
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|adv| adv as f32 / units * 1000.0)
                    .unwrap_or(0.0)
            })
            .collect();
        let digits = &widths_1000[(b'0' - 32) as usize..=(b'9' - 32) as usize];
        let fallback_1000 = digits.iter().sum::<f32>() / digits.len() as f32;
        let line_gap = face.line_gap() as f32;
        FontMetrics {
            widths_1000,
            fallback_1000,
            line_h_ratio: (face.ascender() as f32 - face.descender() as f32 + line_gap) / units,
            ascender_ratio: face.ascender() as f32 / units,
        }
    }

    pub fn char_width_1000(&self, ch: char) -> f32 {
        let byte = char_to_winansi(ch);
        if byte >= 32 {
            self.widths_1000[(byte - 32) as usize]
        } else if ch.is_control() {
            0.0
        } else {
            self.fallback_1000
        }
    }

    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    pub fn line_height(&self, font_size: f32) -> f32 {
        font_size * self.line_h_ratio
    }

    pub fn ascent(&self, font_size: f32) -> f32 {
        font_size * self.ascender_ratio
    }
}

#[derive(Clone, Debug)]
enum FontSource {
    /// TrueType/OpenType data, embedded as a subset at write time.
    Embedded {
        family: String,
        data: Vec<u8>,
        face_index: u32,
    },
    /// A PDF base-14 face, referenced by name.
    Builtin(&'static str),
}

#[derive(Clone, Debug)]
pub struct LoadedFont {
    source: FontSource,
    pub metrics: FontMetrics,
}

impl LoadedFont {
    fn builtin(name: &'static str) -> Self {
        LoadedFont {
            source: FontSource::Builtin(name),
            metrics: FontMetrics::helvetica(),
        }
    }

    fn embedded(family: &str, data: Vec<u8>, face_index: u32) -> Option<Self> {
        let metrics = FontMetrics::from_face(&Face::parse(&data, face_index).ok()?);
        Some(LoadedFont {
            source: FontSource::Embedded {
                family: family.to_string(),
                data,
                face_index,
            },
            metrics,
        })
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.source, FontSource::Embedded { .. })
    }

    /// Family name of an embedded face, or the base-14 name.
    pub fn name(&self) -> &str {
        match &self.source {
            FontSource::Embedded { family, .. } => family,
            FontSource::Builtin(name) => name,
        }
    }
}

/// Resolved faces for one render. Font data is read once and is read-only
/// afterwards, so a set can be shared between concurrent renders.
#[derive(Clone, Debug)]
pub struct FontSet {
    fonts: [LoadedFont; 4],
}

impl FontSet {
    /// Base-14 faces only; no file system access.
    pub fn builtin() -> Self {
        FontSet {
            fonts: [
                LoadedFont::builtin("Helvetica"),
                LoadedFont::builtin("Helvetica-Bold"),
                LoadedFont::builtin("Helvetica"),
                LoadedFont::builtin("Helvetica-Bold"),
            ],
        }
    }

    pub fn load(config: &FontConfig) -> Result<Self, Error> {
        let t0 = std::time::Instant::now();
        let regular = resolve_face(&config.regular, false, config)?
            .unwrap_or_else(|| fallback(&config.regular, "Helvetica"));
        let bold = resolve_face(&config.bold, true, config)?
            .unwrap_or_else(|| fallback(&config.bold, "Helvetica-Bold"));
        log::debug!(
            "Fonts resolved in {:.1}ms: regular={} bold={}",
            t0.elapsed().as_secs_f64() * 1000.0,
            regular.name(),
            bold.name(),
        );
        Ok(FontSet {
            fonts: [
                regular,
                bold,
                LoadedFont::builtin("Helvetica"),
                LoadedFont::builtin("Helvetica-Bold"),
            ],
        })
    }

    pub fn get(&self, role: FontRole) -> &LoadedFont {
        &self.fonts[role.index()]
    }

    pub fn metrics(&self, role: FontRole) -> &FontMetrics {
        &self.get(role).metrics
    }
}

fn fallback(face: &FontFace, name: &'static str) -> LoadedFont {
    log::warn!("Font not found: {}, using {name}", face.family);
    LoadedFont::builtin(name)
}

fn resolve_face(
    face: &FontFace,
    bold: bool,
    config: &FontConfig,
) -> Result<Option<LoadedFont>, Error> {
    if let Some(path) = &face.path {
        let data = std::fs::read(path).map_err(|e| Error::asset(path, e))?;
        return LoadedFont::embedded(&face.family, data, 0)
            .map(Some)
            .ok_or_else(|| Error::asset(path, "not a TrueType/OpenType font"));
    }
    if !config.system_lookup {
        return Ok(None);
    }
    let found = find_font_file(&face.family, bold, &config.directories).and_then(
        |(path, face_index)| {
            log::debug!(
                "Font {} bold={bold} → {} #{face_index}",
                face.family,
                path.display()
            );
            let data = std::fs::read(&path).ok()?;
            LoadedFont::embedded(&face.family, data, face_index)
        },
    );
    Ok(found)
}

/// (lowercase family name, bold) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool), (PathBuf, u32)>;

static SYSTEM_INDEX: OnceLock<FontLookup> = OnceLock::new();

fn font_family_name(face: &Face) -> Option<String> {
    // Name ID 1 keeps "Calibri Light" apart from "Calibri".
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

fn system_font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var("STATEMENT_PDF_FONTS") {
        dirs.extend(std::env::split_paths(&val).filter(|p| !p.as_os_str().is_empty()));
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Applications/Microsoft Word.app/Contents/Resources/DFonts".into(),
            "/Library/Fonts".into(),
            "/Library/Fonts/Microsoft".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    dirs
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

fn is_font_collection(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttc"))
}

/// Index every font file below `dirs` by family and weight. The first file
/// found for a key wins.
fn scan_font_dirs(dirs: Vec<PathBuf>) -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut files_scanned = 0u32;
    let mut visited: HashSet<PathBuf> = HashSet::new();

    // Reverse so the first configured directory is popped first.
    let mut stack: Vec<PathBuf> = dirs.into_iter().rev().collect();
    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();

        for path in paths {
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_font_file(&path) {
                continue;
            }
            files_scanned += 1;
            let Ok(file) = std::fs::File::open(&path) else {
                continue;
            };
            // SAFETY: the mapping is read-only and dropped before returning.
            let Ok(data) = (unsafe { Mmap::map(&file) }) else {
                continue;
            };
            let face_count = if is_font_collection(&path) {
                ttf_parser::fonts_in_collection(&data).unwrap_or(1)
            } else {
                1
            };
            for face_idx in 0..face_count {
                let Ok(face) = Face::parse(&data, face_idx) else {
                    continue;
                };
                if face.is_italic() {
                    continue;
                }
                if let Some(family) = font_family_name(&face) {
                    index
                        .entry((family.to_lowercase(), face.is_bold()))
                        .or_insert((path.clone(), face_idx));
                }
            }
        }
    }

    log::info!(
        "Font scan: {:.1}ms, {} files parsed → {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        files_scanned,
        index.len(),
    );
    index
}

/// Look up a font file by family name and weight. Configured directories
/// are searched before the system ones; a missing bold variant falls back
/// to the regular face of the same family.
fn find_font_file(family: &str, bold: bool, extra_dirs: &[PathBuf]) -> Option<(PathBuf, u32)> {
    let key = family.to_lowercase();
    let lookup = |index: &FontLookup| {
        index
            .get(&(key.clone(), bold))
            .or_else(|| if bold { index.get(&(key.clone(), false)) } else { None })
            .cloned()
    };
    if !extra_dirs.is_empty()
        && let Some(found) = lookup(&scan_font_dirs(extra_dirs.to_vec()))
    {
        return Some(found);
    }
    lookup(SYSTEM_INDEX.get_or_init(|| scan_font_dirs(system_font_directories())))
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007E => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// Convert text to WinAnsi bytes for base-14 fonts. Unmappable chars
/// become '?'.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .filter(|c| !c.is_control())
        .map(|c| match char_to_winansi(c) {
            0 => b'?',
            b => b,
        })
        .collect()
}

/// Encode text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &BTreeMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.extend_from_slice(&gid.to_be_bytes());
    }
    out
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,                          // space
            33..=47 => 333.0,                     // punctuation
            48..=57 => 556.0,                     // digits
            58..=64 => 333.0,                     // more punctuation
            73 | 74 => 278.0,                     // I J
            77 => 833.0,                          // M
            65..=90 => 667.0,                     // uppercase A-Z (average)
            91..=96 => 333.0,                     // brackets etc.
            102 | 105 | 106 | 108 | 116 => 278.0, // f i j l t
            109 | 119 => 833.0,                   // m w
            97..=122 => 556.0,                    // lowercase a-z (average)
            _ => 556.0,
        })
        .collect()
}

/// A font object written into the output document.
pub(crate) struct FontEntry {
    pub(crate) pdf_name: &'static str,
    pub(crate) font_ref: Ref,
    /// Present for embedded faces: text is written as glyph IDs.
    pub(crate) char_to_gid: Option<BTreeMap<char, u16>>,
}

impl FontEntry {
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

/// Write `font` into `pdf`. Embedded faces become a Type0/CIDFont subset to
/// `used_chars` with a ToUnicode map; base-14 faces become a Type1 reference.
pub(crate) fn register_font(
    pdf: &mut Pdf,
    role: FontRole,
    font: &LoadedFont,
    used_chars: &BTreeSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Result<FontEntry, Error> {
    let t0 = std::time::Instant::now();
    let font_ref = alloc();
    let char_to_gid = match &font.source {
        FontSource::Builtin(name) => {
            pdf.type1_font(font_ref)
                .base_font(Name(name.as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            None
        }
        FontSource::Embedded {
            family,
            data,
            face_index,
        } => Some(embed_truetype(
            pdf,
            font_ref,
            family,
            data,
            *face_index,
            used_chars,
            alloc,
        )?),
    };
    log::debug!(
        "register_font: {:?} {} → {:.1}ms",
        role,
        font.name(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(FontEntry {
        pdf_name: role.pdf_name(),
        font_ref,
        char_to_gid,
    })
}

fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    font_name: &str,
    font_data: &[u8],
    face_index: u32,
    used_chars: &BTreeSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Result<BTreeMap<char, u16>, Error> {
    let face = Face::parse(font_data, face_index)
        .map_err(|e| Error::Pdf(format!("cannot parse font {font_name}: {e}")))?;
    let descriptor_ref = alloc();
    let data_ref = alloc();

    let units = face.units_per_em() as f32;
    let scale = |v: f32| v / units * 1000.0;
    let cap_height = face
        .capital_height()
        .map(|h| scale(h as f32))
        .unwrap_or(700.0);
    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        scale(bb.x_min as f32),
        scale(bb.y_min as f32),
        scale(bb.x_max as f32),
        scale(bb.y_max as f32),
    );

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = BTreeMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    for &ch in used_chars {
        if let Some(gid) = face.glyph_index(ch) {
            let new_gid = remapper.remap(gid.0);
            char_to_gid.insert(ch, new_gid);
            let width = face
                .glyph_hor_advance(gid)
                .map(|adv| scale(adv as f32))
                .unwrap_or(0.0);
            gid_widths.push((new_gid, width));
        }
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset_data = subsetter::subset(font_data, face_index, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {font_name}: {e}; embedding full font");
        font_data.to_vec()
    });
    let data_len = i32::try_from(subset_data.len())
        .map_err(|_| Error::Pdf(format!("font {font_name} is too large to embed")))?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    let ps_name = font_name.replace(' ', "");

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(scale(face.ascender() as f32))
        .descent(scale(face.descender() as f32))
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(data_ref);

    let system_info = pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };

    let cid_font_ref = alloc();
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info);
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let tounicode_ref = alloc();
    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(
        Name(cmap_name.as_bytes()),
        pdf_writer::types::SystemInfo {
            registry: pdf_writer::Str(b"Adobe"),
            ordering: pdf_writer::Str(b"Identity"),
            supplement: 0,
        },
    );
    for (&ch, &new_gid) in &char_to_gid {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Ok(char_to_gid)
}
