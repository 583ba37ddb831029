use crate::config::{LayoutConfig, Rgb};
use crate::error::Error;
use crate::fonts::{FontRole, FontSet};
use crate::format::format_currency;
use crate::geometry::{PageGeometry, PageKind, PageLayoutState, Rect, nominal_page_count};
use crate::model::{Alignment, Column, Transaction};

use super::canvas::{DisplayList, DrawOp};
use super::decor::PageDecorator;
use super::layout::{TextBlock, aligned_x};

/// One ledger row with its final position.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedRow {
    /// Position in the sanitized ledger.
    pub index: usize,
    /// 1-based page number.
    pub page: usize,
    pub top: f32,
    pub height: f32,
    /// Some wrapped lines did not fit on an empty page and were dropped.
    pub clipped: bool,
    cells: [TextBlock; 6],
}

impl PlacedRow {
    /// Wrapped display lines of one cell.
    pub fn cell_lines(&self, column: Column) -> Vec<&str> {
        self.cells[column as usize]
            .lines
            .iter()
            .map(|l| l.text.as_str())
            .collect()
    }
}

/// The page plan for a ledger: where every row goes and how many pages
/// the document has. Computed before anything is drawn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pagination {
    pub rows: Vec<PlacedRow>,
    pub total_pages: usize,
}

impl Pagination {
    pub fn rows_on_page(&self, page: usize) -> usize {
        self.rows.iter().filter(|r| r.page == page).count()
    }
}

/// Text shown in a ledger cell. Amounts are formatted here; dates arrive
/// formatted from ingestion.
pub fn cell_text(tx: &Transaction, column: Column) -> String {
    let raw = tx.value(column);
    if column.is_amount() {
        format_currency(raw)
    } else {
        raw.to_string()
    }
}

/// Drawing states of one table render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TableState {
    HeaderRow { next: usize },
    DataRow(usize),
    PageBreak { next: usize },
    ContinuationHeader { next: usize },
    Footer,
    Done,
}

pub struct TableRenderer<'a> {
    geometry: &'a PageGeometry,
    fonts: &'a FontSet,
    config: &'a LayoutConfig,
    header_fill: Rgb,
}

impl<'a> TableRenderer<'a> {
    pub fn new(
        geometry: &'a PageGeometry,
        fonts: &'a FontSet,
        config: &'a LayoutConfig,
    ) -> Result<Self, Error> {
        Ok(TableRenderer {
            geometry,
            fonts,
            config,
            header_fill: config.header_fill_rgb()?,
        })
    }

    fn pad(&self) -> f32 {
        self.geometry.cell_padding
    }

    /// Wrap every cell and return the row height on a page of `kind`.
    fn measure(&self, tx: &Transaction, kind: PageKind) -> ([TextBlock; 6], f32) {
        let metrics = self.fonts.metrics(FontRole::Regular);
        let size = self.config.body_font_size;
        let pad = self.pad();
        let cells = Column::ALL.map(|col| {
            let width = self.geometry.column_widths[col as usize] - 2.0 * pad;
            TextBlock::layout(&cell_text(tx, col), metrics, size, width)
        });
        let content = cells
            .iter()
            .map(|b| b.height() + 2.0 * pad)
            .fold(0.0f32, f32::max);
        (cells, content.max(self.geometry.min_row_height(kind)))
    }

    /// Whether the row fits an empty continuation page, which has more room
    /// than the first page.
    fn fits_continuation_page(&self, tx: &Transaction) -> bool {
        let (_, height) = self.measure(tx, PageKind::Continuation);
        height <= self.geometry.empty_page_capacity(PageKind::Continuation)
    }

    /// Assign every row to a page. A row moves to the next page when the
    /// current page already holds the maximum row count or when the row's
    /// full height would enter the bottom reservation. A first row too tall
    /// for page 1 moves on when a continuation page can hold it. A row that
    /// does not fit even on an empty page is clipped there instead of
    /// breaking again.
    pub fn paginate(&self, rows: &[&Transaction]) -> Pagination {
        let g = self.geometry;
        let mut rows_out = Vec::with_capacity(rows.len());
        let mut page = 1;
        let mut cursor = g.first_row_top(PageKind::First);
        let mut rows_on_page = 0;

        for (index, tx) in rows.iter().enumerate() {
            let (mut cells, mut height) = self.measure(tx, PageKind::of(page));

            let row_cap = rows_on_page >= g.max_rows_per_page;
            let overflow = !g.fits(cursor, height)
                && (rows_on_page > 0 || (page == 1 && self.fits_continuation_page(tx)));
            if row_cap || overflow {
                log::debug!(
                    "Page break before row {index}: {}",
                    if row_cap { "row limit" } else { "overflow" }
                );
                page += 1;
                cursor = g.first_row_top(PageKind::Continuation);
                rows_on_page = 0;
                (cells, height) = self.measure(tx, PageKind::Continuation);
            }

            let mut clipped = false;
            if !g.fits(cursor, height) {
                let available = (g.content_bottom() - cursor).max(0.0);
                for cell in &mut cells {
                    clipped |= cell.clip_to(available - 2.0 * self.pad());
                }
                log::warn!(
                    "Row {index} needs {height:.1}pt but page {page} has {available:.1}pt; clipping"
                );
                height = available;
            }

            log::debug!("Row {index}: page {page}, top {cursor:.1}, height {height:.1}");
            rows_out.push(PlacedRow {
                index,
                page,
                top: cursor,
                height,
                clipped,
                cells,
            });
            cursor += height;
            rows_on_page += 1;
        }

        let total_pages = if rows_out.is_empty() { 0 } else { page };
        let nominal = nominal_page_count(rows.len(), g.max_rows_per_page);
        if total_pages > nominal {
            log::info!("Tall rows need {total_pages} pages instead of {nominal}");
        }
        Pagination {
            rows: rows_out,
            total_pages,
        }
    }

    /// Draw the table for `plan` starting on the current page of `list`,
    /// which must already carry the first-page header.
    pub fn render(&self, plan: &Pagination, decor: &dyn PageDecorator, list: &mut DisplayList) {
        let g = self.geometry;
        let mut layout = PageLayoutState::new(g, plan.total_pages);
        let mut state = TableState::HeaderRow { next: 0 };

        loop {
            state = match state {
                TableState::HeaderRow { next } => {
                    self.draw_header_row(list, layout.cursor);
                    layout.advance(g.header_row_height);
                    TableState::DataRow(next)
                }
                TableState::DataRow(i) => match plan.rows.get(i) {
                    None => TableState::Footer,
                    Some(row) if row.page != layout.page => TableState::PageBreak { next: i },
                    Some(row) => {
                        debug_assert!((row.top - layout.cursor).abs() < 0.01);
                        debug_assert!(row.clipped || row.height >= g.min_row_height(layout.kind()));
                        self.draw_row(list, row, layout.cursor);
                        layout.count_row(row.height);
                        TableState::DataRow(i + 1)
                    }
                },
                TableState::PageBreak { next } => {
                    log::debug!("Page {} holds {} rows", layout.page, layout.rows_on_page);
                    decor.page_footer(list, layout.page, layout.total_pages);
                    self.bottom_border(list, layout.cursor);
                    list.begin_page();
                    layout.next_page(g);
                    TableState::ContinuationHeader { next }
                }
                TableState::ContinuationHeader { next } => {
                    decor.continuation_header(list);
                    TableState::HeaderRow { next }
                }
                TableState::Footer => {
                    self.bottom_border(list, layout.cursor);
                    decor.page_footer(list, layout.page, layout.total_pages);
                    TableState::Done
                }
                TableState::Done => break,
            };
        }
    }

    fn bottom_border(&self, list: &mut DisplayList, y: f32) {
        let g = self.geometry;
        list.line((g.table_left, y), (g.table_right(), y));
    }

    fn draw_header_row(&self, list: &mut DisplayList, top: f32) {
        let g = self.geometry;
        let height = g.header_row_height;
        let pad = self.pad();
        let size = self.config.header_font_size;
        let metrics = self.fonts.metrics(FontRole::Bold);

        list.push(DrawOp::FillRect {
            rect: Rect::new(g.table_left, top, g.table_width(), height),
            color: self.header_fill,
        });
        for ((col, left), width) in Column::ALL
            .into_iter()
            .zip(g.column_lefts())
            .zip(g.column_widths)
        {
            let label = col.label();
            let x = aligned_x(Alignment::Center, left, width, metrics.text_width(label, size), pad);
            list.text(label, x, top + pad, FontRole::Bold, size);
            list.line((left, top), (left, top + height));
        }
        list.line((g.table_right(), top), (g.table_right(), top + height));
        list.line((g.table_left, top + height), (g.table_right(), top + height));
    }

    fn draw_row(&self, list: &mut DisplayList, row: &PlacedRow, top: f32) {
        let g = self.geometry;
        let pad = self.pad();
        let size = self.config.body_font_size;
        for ((col, left), width) in Column::ALL
            .into_iter()
            .zip(g.column_lefts())
            .zip(g.column_widths)
        {
            let block = &row.cells[col as usize];
            for (k, line) in block.lines.iter().enumerate() {
                let x = aligned_x(col.alignment(), left, width, line.width, pad);
                let line_top = top + pad + k as f32 * block.line_height;
                list.text(line.text.as_str(), x, line_top, FontRole::Regular, size);
            }
            list.line((left, top), (left, top + row.height));
        }
        list.line((g.table_right(), top), (g.table_right(), top + row.height));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::geometry::SpaceReservation;
    use crate::pdf::decor::page_label;

    /// Records decoration calls instead of drawing them.
    #[derive(Default)]
    struct RecordingDecor {
        continuation_headers: RefCell<usize>,
        footers: RefCell<Vec<(usize, usize)>>,
    }

    impl PageDecorator for RecordingDecor {
        fn reservation(&self) -> SpaceReservation {
            SpaceReservation {
                first_page_header: 220.0,
                continuation_header: 132.0,
                page_bottom: 90.0,
            }
        }
        fn first_page_header(&self, _list: &mut DisplayList) {}
        fn continuation_header(&self, _list: &mut DisplayList) {
            *self.continuation_headers.borrow_mut() += 1;
        }
        fn page_footer(&self, list: &mut DisplayList, page: usize, total_pages: usize) {
            self.footers.borrow_mut().push((page, total_pages));
            list.text(page_label(page, total_pages), 0.0, 0.0, FontRole::Bold, 12.0);
        }
    }

    fn tx(i: usize) -> Transaction {
        Transaction {
            date: "05 Mar 2024".into(),
            particulars: format!("Deposit {i}"),
            credit: "1000".into(),
            balance: "1000".into(),
            ..Default::default()
        }
    }

    fn long_tx(words: usize) -> Transaction {
        Transaction {
            particulars: vec!["lorem"; words].join(" "),
            ..tx(0)
        }
    }

    struct Fixture {
        config: LayoutConfig,
        fonts: FontSet,
        geometry: PageGeometry,
        decor: RecordingDecor,
    }

    impl Fixture {
        fn new() -> Self {
            let config = LayoutConfig::default();
            let decor = RecordingDecor::default();
            let geometry = PageGeometry::new(&config, decor.reservation());
            Fixture {
                config,
                fonts: FontSet::builtin(),
                geometry,
                decor,
            }
        }

        fn run(&self, ledger: &[Transaction]) -> (Pagination, DisplayList) {
            let rows: Vec<&Transaction> = ledger.iter().collect();
            let table = TableRenderer::new(&self.geometry, &self.fonts, &self.config).unwrap();
            let plan = table.paginate(&rows);
            let mut list = DisplayList::new();
            list.begin_page();
            table.render(&plan, &self.decor, &mut list);
            (plan, list)
        }
    }

    #[test]
    fn single_row_fits_one_page() {
        let f = Fixture::new();
        let (plan, list) = f.run(&[tx(0)]);
        assert_eq!(plan.total_pages, 1);
        assert_eq!(list.page_count(), 1);
        assert_eq!(*f.decor.footers.borrow(), vec![(1, 1)]);
        let texts: Vec<&str> = list.texts(0).collect();
        assert!(texts.contains(&"1,000.00"));
        assert!(texts.contains(&"Page 1 of 1"));
        assert_eq!(plan.rows[0].cell_lines(Column::Credit), ["1,000.00"]);
        assert_eq!(plan.rows[0].cell_lines(Column::Debit), Vec::<&str>::new());
    }

    #[test]
    fn forty_default_rows_split_eighteen_eighteen_four() {
        let f = Fixture::new();
        let ledger: Vec<Transaction> = (0..40).map(tx).collect();
        let (plan, list) = f.run(&ledger);
        assert_eq!(plan.total_pages, 3);
        assert_eq!(
            (1..=3).map(|p| plan.rows_on_page(p)).collect::<Vec<_>>(),
            [18, 18, 4]
        );
        assert_eq!(list.page_count(), 3);
        assert_eq!(*f.decor.footers.borrow(), vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(*f.decor.continuation_headers.borrow(), 2);
        for page in 0..3 {
            let label = format!("Page {} of 3", page + 1);
            assert_eq!(list.texts(page).filter(|t| *t == label).count(), 1);
        }
    }

    #[test]
    fn continuation_rows_are_taller() {
        let f = Fixture::new();
        let ledger: Vec<Transaction> = (0..20).map(tx).collect();
        let (plan, _) = f.run(&ledger);
        assert_eq!(plan.rows[0].height, 48.0);
        assert_eq!(plan.rows[18].height, 58.0);
        assert_eq!(plan.rows[18].top, 135.0 + 30.0);
    }

    #[test]
    fn tall_rows_add_pages_without_splitting() {
        let f = Fixture::new();
        let ledger: Vec<Transaction> = (0..40).map(|_| long_tx(60)).collect();
        let (plan, list) = f.run(&ledger);
        assert!(plan.total_pages > nominal_page_count(40, 18));
        assert_eq!(list.page_count(), plan.total_pages);

        let bottom = f.geometry.content_bottom();
        for row in &plan.rows {
            assert!(row.height > 48.0);
            assert!(row.top + row.height <= bottom + 1e-3, "row {} overflows", row.index);
            assert!(!row.clipped);
        }
        let footers = f.decor.footers.borrow();
        assert_eq!(footers.len(), plan.total_pages);
        assert!(footers.iter().all(|&(_, total)| total == plan.total_pages));
    }

    #[test]
    fn each_row_is_drawn_on_exactly_one_page() {
        let f = Fixture::new();
        let mut ledger: Vec<Transaction> = (0..30).map(tx).collect();
        ledger[17] = Transaction {
            particulars: format!("Deposit 17 {}", vec!["lorem"; 40].join(" ")),
            ..tx(17)
        };
        let (plan, list) = f.run(&ledger);
        for i in 0..30 {
            let marker = format!("Deposit {i}");
            let pages: Vec<usize> = (0..list.page_count())
                .filter(|&p| list.texts(p).any(|t| t == marker || t.starts_with(&format!("{marker} "))))
                .collect();
            assert_eq!(pages, vec![plan.rows[i].page - 1], "row {i}");
        }
    }

    #[test]
    fn pathological_row_is_clipped_not_looped() {
        let f = Fixture::new();
        let ledger = vec![tx(0), long_tx(3000), tx(2)];
        let (plan, list) = f.run(&ledger);
        let giant = &plan.rows[1];
        assert!(giant.clipped);
        assert_eq!(giant.page, 2);
        assert!(giant.top + giant.height <= f.geometry.content_bottom() + 1e-3);
        assert_eq!(plan.rows[2].page, 3);
        assert_eq!(plan.total_pages, 3);
        assert_eq!(list.page_count(), 3);
    }

    #[test]
    fn first_row_too_tall_for_page_one_moves_to_page_two() {
        let f = Fixture::new();
        let ledger = vec![long_tx(330), tx(1)];
        let (plan, list) = f.run(&ledger);
        let first = &plan.rows[0];
        assert!(first.height > f.geometry.empty_page_capacity(PageKind::First));
        assert!(!first.clipped);
        assert_eq!(first.page, 2);
        assert_eq!(first.top, 135.0 + 30.0);
        assert_eq!(plan.rows[1].page, 2);
        assert_eq!(plan.rows_on_page(1), 0);
        assert_eq!(plan.total_pages, 2);
        assert_eq!(list.page_count(), 2);
        assert_eq!(*f.decor.footers.borrow(), vec![(1, 2), (2, 2)]);
        assert_eq!(list.texts(0).filter(|t| *t == "Particulars").count(), 1);
    }

    #[test]
    fn header_row_repeats_on_every_page() {
        let f = Fixture::new();
        let ledger: Vec<Transaction> = (0..19).map(tx).collect();
        let (_, list) = f.run(&ledger);
        for page in 0..2 {
            assert_eq!(list.texts(page).filter(|t| *t == "Particulars").count(), 1);
            let fills = list
                .page(page)
                .iter()
                .filter(|op| matches!(op, DrawOp::FillRect { .. }))
                .count();
            assert_eq!(fills, 1);
        }
    }
}
