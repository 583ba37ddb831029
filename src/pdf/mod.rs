mod canvas;
mod decor;
mod layout;
mod table;

use std::collections::{BTreeMap, BTreeSet};

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str, TextStr};

use crate::assets::{AssetSlot, DecorAssets};
use crate::config::{LayoutConfig, Rgb};
use crate::error::Error;
use crate::fonts::{FontEntry, FontRole, FontSet, register_font};
use crate::geometry::PageGeometry;
use crate::model::{Statement, Transaction};

pub use canvas::{DisplayList, DrawOp};
pub use decor::PageDecorator;
pub use table::{Pagination, PlacedRow};

use decor::StatementDecor;
use table::TableRenderer;

/// Renders statements with one configuration. Fonts and images are loaded
/// once in [`StatementRenderer::new`] and only read afterwards, so one
/// renderer can serve concurrent renders; each render keeps its own page
/// state.
#[derive(Clone, Debug)]
pub struct StatementRenderer {
    config: LayoutConfig,
    fonts: FontSet,
    assets: DecorAssets,
}

impl StatementRenderer {
    pub fn new(config: LayoutConfig) -> Result<Self, Error> {
        config.validate()?;
        let fonts = FontSet::load(&config.fonts)?;
        let assets = DecorAssets::load(&config.assets)?;
        Ok(StatementRenderer {
            config,
            fonts,
            assets,
        })
    }

    /// Use already loaded fonts and images instead of the ones named in
    /// `config`.
    pub fn with_resources(
        config: LayoutConfig,
        fonts: FontSet,
        assets: DecorAssets,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(StatementRenderer {
            config,
            fonts,
            assets,
        })
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    fn decor<'a>(&'a self, statement: &'a Statement) -> StatementDecor<'a> {
        StatementDecor::new(&self.config, &statement.account, &self.assets, &self.fonts)
    }

    fn geometry(&self, decor: &dyn PageDecorator) -> Result<PageGeometry, Error> {
        let geometry = PageGeometry::new(&self.config, decor.reservation());
        geometry.check()?;
        Ok(geometry)
    }

    /// Page plan without drawing anything.
    pub fn paginate(&self, statement: &Statement) -> Result<Pagination, Error> {
        let rows = checked_rows(statement)?;
        let decor = self.decor(statement);
        let geometry = self.geometry(&decor)?;
        Ok(TableRenderer::new(&geometry, &self.fonts, &self.config)?.paginate(&rows))
    }

    /// Lay the statement out into drawing operations.
    pub fn layout(&self, statement: &Statement) -> Result<(DisplayList, Pagination), Error> {
        let rows = checked_rows(statement)?;
        let decor = self.decor(statement);
        let geometry = self.geometry(&decor)?;
        let table = TableRenderer::new(&geometry, &self.fonts, &self.config)?;
        let plan = table.paginate(&rows);

        let mut list = DisplayList::new();
        list.begin_page();
        decor.first_page_header(&mut list);
        table.render(&plan, &decor, &mut list);

        if list.page_count() != plan.total_pages {
            return Err(Error::Pdf(format!(
                "drew {} pages for a plan of {}",
                list.page_count(),
                plan.total_pages
            )));
        }
        Ok((list, plan))
    }

    /// Render the statement to PDF bytes. Nothing is returned unless the
    /// whole document was produced.
    pub fn render(&self, statement: &Statement) -> Result<Vec<u8>, Error> {
        let t0 = std::time::Instant::now();
        let (list, plan) = self.layout(statement)?;
        let t_layout = t0.elapsed();

        let bytes = write_pdf(&list, &self.fonts, &self.assets, &self.config)?;
        let t_write = t0.elapsed();

        log::info!(
            "Render phases: layout={:.1}ms, serialize={:.1}ms ({} rows, {} pages)",
            t_layout.as_secs_f64() * 1000.0,
            (t_write - t_layout).as_secs_f64() * 1000.0,
            plan.rows.len(),
            plan.total_pages,
        );
        Ok(bytes)
    }
}

/// Input-shape checks, done before any drawing.
fn checked_rows(statement: &Statement) -> Result<Vec<&Transaction>, Error> {
    if statement.account.is_empty() {
        return Err(Error::MissingAccountInfo);
    }
    let rows = statement.sanitized_transactions();
    if rows.is_empty() {
        return Err(Error::EmptyLedger);
    }
    let dropped = statement.transactions.len() - rows.len();
    if dropped > 0 {
        log::debug!("Dropped {dropped} empty or header rows from the ledger");
    }
    Ok(rows)
}

fn set_fill(content: &mut Content, color: Rgb) {
    let (r, g, b) = color.to_unit();
    content.set_fill_rgb(r, g, b);
}

fn set_stroke(content: &mut Content, color: Rgb) {
    let (r, g, b) = color.to_unit();
    content.set_stroke_rgb(r, g, b);
}

/// Serialize a display list. Top-left page coordinates are flipped into
/// PDF user space here.
pub(crate) fn write_pdf(
    list: &DisplayList,
    fonts: &FontSet,
    assets: &DecorAssets,
    config: &LayoutConfig,
) -> Result<Vec<u8>, Error> {
    let t0 = std::time::Instant::now();
    let page_h = config.page_height;
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();

    // Phase 1: fonts, subset to the characters each role draws
    let mut used_chars: BTreeMap<FontRole, BTreeSet<char>> = BTreeMap::new();
    let mut used_images: BTreeSet<AssetSlot> = BTreeSet::new();
    for op in list.pages().iter().flatten() {
        match op {
            DrawOp::Text { text, font, .. } => {
                used_chars.entry(*font).or_default().extend(text.chars());
            }
            DrawOp::Image { slot, .. } => {
                used_images.insert(*slot);
            }
            _ => {}
        }
    }

    let mut font_entries: BTreeMap<FontRole, FontEntry> = BTreeMap::new();
    for (role, chars) in &used_chars {
        let entry = register_font(&mut pdf, *role, fonts.get(*role), chars, &mut alloc)?;
        font_entries.insert(*role, entry);
    }
    let t_fonts = t0.elapsed();

    // Phase 2: images
    let mut image_xobjects: Vec<(&'static str, Ref)> = Vec::new();
    for slot in &used_images {
        let Some(image) = assets.get(*slot) else {
            return Err(Error::Pdf(format!("image {slot:?} drawn but not loaded")));
        };
        let xobj_ref = alloc();
        image.write(&mut pdf, xobj_ref, &mut alloc);
        image_xobjects.push((slot.pdf_name(), xobj_ref));
    }
    let t_images = t0.elapsed();

    // Phase 3: content streams
    let n = list.page_count();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    for (ops, content_id) in list.pages().iter().zip(&content_ids) {
        let mut content = Content::new();
        for op in ops {
            match op {
                DrawOp::FillRect { rect, color } => {
                    content.save_state();
                    set_fill(&mut content, *color);
                    content
                        .rect(rect.x, page_h - rect.bottom(), rect.width, rect.height)
                        .fill_nonzero();
                    content.restore_state();
                }
                DrawOp::StrokeRect { rect, color, width } => {
                    content.save_state();
                    set_stroke(&mut content, *color);
                    content.set_line_width(*width);
                    content
                        .rect(rect.x, page_h - rect.bottom(), rect.width, rect.height)
                        .stroke();
                    content.restore_state();
                }
                DrawOp::Line {
                    from,
                    to,
                    color,
                    width,
                } => {
                    content.save_state();
                    set_stroke(&mut content, *color);
                    content.set_line_width(*width);
                    content.move_to(from.0, page_h - from.1);
                    content.line_to(to.0, page_h - to.1);
                    content.stroke();
                    content.restore_state();
                }
                DrawOp::Text {
                    text,
                    x,
                    top,
                    font,
                    size,
                    color,
                } => {
                    let Some(entry) = font_entries.get(font) else {
                        continue;
                    };
                    let baseline = page_h - top - fonts.metrics(*font).ascent(*size);
                    let encoded = entry.encode(text);
                    content.save_state();
                    set_fill(&mut content, *color);
                    content
                        .begin_text()
                        .set_font(Name(entry.pdf_name.as_bytes()), *size)
                        .next_line(*x, baseline)
                        .show(Str(&encoded))
                        .end_text();
                    content.restore_state();
                }
                DrawOp::Image { slot, rect } => {
                    content.save_state();
                    content.transform([
                        rect.width,
                        0.0,
                        0.0,
                        rect.height,
                        rect.x,
                        page_h - rect.bottom(),
                    ]);
                    content.x_object(Name(slot.pdf_name().as_bytes()));
                    content.restore_state();
                }
            }
        }
        let raw = content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(*content_id, &compressed)
            .filter(Filter::FlateDecode);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(n as i32);
    pdf.document_info(info_id)
        .title(TextStr("Account Statement"))
        .producer(TextStr(concat!("statement-pdf ", env!("CARGO_PKG_VERSION"))));

    for (page_id, content_id) in page_ids.iter().zip(&content_ids) {
        let mut page = pdf.page(*page_id);
        page.media_box(Rect::new(0.0, 0.0, config.page_width, page_h))
            .parent(pages_id)
            .contents(*content_id);
        let mut resources = page.resources();
        {
            let mut fonts = resources.fonts();
            for entry in font_entries.values() {
                fonts.pair(Name(entry.pdf_name.as_bytes()), entry.font_ref);
            }
        }
        if !image_xobjects.is_empty() {
            let mut xobjects = resources.x_objects();
            for (name, xobj_ref) in &image_xobjects {
                xobjects.pair(Name(name.as_bytes()), *xobj_ref);
            }
        }
    }
    let t_assembly = t0.elapsed();

    log::info!(
        "Write phases: font_embed={:.1}ms, images={:.1}ms, content={:.1}ms",
        t_fonts.as_secs_f64() * 1000.0,
        (t_images - t_fonts).as_secs_f64() * 1000.0,
        (t_assembly - t_images).as_secs_f64() * 1000.0,
    );

    Ok(pdf.finish())
}
