//! Page geometry: usable area, column partition and the vertical cursor
//! the table renderer advances. Nothing here draws.

use crate::config::LayoutConfig;
use crate::error::Error;

/// Axis-aligned rectangle in page space, origin at the top-left corner,
/// y growing downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Vertical space claimed by decorations around the table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpaceReservation {
    /// Lowest edge of the header decorations on the first page.
    pub first_page_header: f32,
    /// Lowest edge of the condensed banner on continuation pages.
    pub continuation_header: f32,
    /// Height kept free at the bottom of every page.
    pub page_bottom: f32,
}

impl SpaceReservation {
    pub const NONE: SpaceReservation = SpaceReservation {
        first_page_header: 0.0,
        continuation_header: 0.0,
        page_bottom: 0.0,
    };
}

/// Which kind of page a row lands on. Continuation pages use the condensed
/// banner and taller minimum rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageKind {
    First,
    Continuation,
}

impl PageKind {
    pub fn of(page: usize) -> PageKind {
        if page <= 1 {
            PageKind::First
        } else {
            PageKind::Continuation
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub table_left: f32,
    pub column_widths: [f32; 6],
    pub first_page_top: f32,
    pub continuation_top: f32,
    pub max_rows_per_page: usize,
    pub default_row_height: f32,
    pub continuation_row_extra: f32,
    pub header_row_height: f32,
    /// Space below the table that rows may not enter.
    pub bottom_reserve: f32,
    pub cell_padding: f32,
}

/// Split `usable_width` proportionally to `ratios`.
pub fn column_widths(usable_width: f32, ratios: &[f32; 6]) -> [f32; 6] {
    let total: f32 = ratios.iter().sum();
    ratios.map(|r| r / total * usable_width)
}

impl PageGeometry {
    /// Build the geometry from a validated configuration and the space the
    /// decorations declare. Table tops move down when a header region would
    /// otherwise overlap the table.
    pub fn new(config: &LayoutConfig, reservation: SpaceReservation) -> PageGeometry {
        let usable_width = config.page_width - 2.0 * config.margin;
        let mut ratios = [1.0f32; 6];
        for (slot, ratio) in ratios.iter_mut().zip(&config.column_ratios) {
            *slot = *ratio;
        }

        let first_page_top = config.first_page_top.max(reservation.first_page_header);
        if first_page_top > config.first_page_top {
            log::warn!(
                "First-page table top raised from {:.1} to {:.1} to clear the header",
                config.first_page_top,
                first_page_top
            );
        }
        let continuation_top = config
            .continuation_top
            .max(reservation.continuation_header);
        if continuation_top > config.continuation_top {
            log::warn!(
                "Continuation table top raised from {:.1} to {:.1} to clear the banner",
                config.continuation_top,
                continuation_top
            );
        }

        PageGeometry {
            page_width: config.page_width,
            page_height: config.page_height,
            table_left: config.table_left,
            column_widths: column_widths(usable_width, &ratios),
            first_page_top,
            continuation_top,
            max_rows_per_page: config.max_rows_per_page,
            default_row_height: config.default_row_height,
            continuation_row_extra: config.continuation_row_extra,
            header_row_height: config.header_row_height,
            bottom_reserve: config.footer_reserve.max(reservation.page_bottom),
            cell_padding: config.cell_padding,
        }
    }

    pub fn table_width(&self) -> f32 {
        self.column_widths.iter().sum()
    }

    pub fn table_right(&self) -> f32 {
        self.table_left + self.table_width()
    }

    /// Left edge of each column.
    pub fn column_lefts(&self) -> [f32; 6] {
        let mut x = self.table_left;
        self.column_widths.map(|w| {
            let left = x;
            x += w;
            left
        })
    }

    pub fn table_top(&self, kind: PageKind) -> f32 {
        match kind {
            PageKind::First => self.first_page_top,
            PageKind::Continuation => self.continuation_top,
        }
    }

    /// Cursor position of the first data row on a page.
    pub fn first_row_top(&self, kind: PageKind) -> f32 {
        self.table_top(kind) + self.header_row_height
    }

    /// Lowest y a row may reach.
    pub fn content_bottom(&self) -> f32 {
        self.page_height - self.bottom_reserve
    }

    pub fn min_row_height(&self, kind: PageKind) -> f32 {
        match kind {
            PageKind::First => self.default_row_height,
            PageKind::Continuation => self.default_row_height + self.continuation_row_extra,
        }
    }

    /// Whether a row of `height` starting at `cursor` stays clear of the
    /// bottom reservation.
    pub fn fits(&self, cursor: f32, height: f32) -> bool {
        cursor + height <= self.content_bottom()
    }

    /// Row space available on an empty page of `kind`.
    pub fn empty_page_capacity(&self, kind: PageKind) -> f32 {
        (self.content_bottom() - self.first_row_top(kind)).max(0.0)
    }

    /// Every page kind must hold at least one minimum-height row below its
    /// header row.
    pub fn check(&self) -> Result<(), Error> {
        for kind in [PageKind::First, PageKind::Continuation] {
            let capacity = self.empty_page_capacity(kind);
            let needed = self.min_row_height(kind);
            if capacity < needed {
                return Err(Error::InvalidLayout(format!(
                    "{kind:?} pages leave {capacity:.1}pt for rows, need at least {needed:.1}pt"
                )));
            }
        }
        Ok(())
    }
}

/// Page count when every row has the default height.
pub fn nominal_page_count(rows: usize, max_rows_per_page: usize) -> usize {
    rows.div_ceil(max_rows_per_page.max(1))
}

/// Mutable per-render cursor state. One instance per document; never shared.
#[derive(Clone, Debug, PartialEq)]
pub struct PageLayoutState {
    /// Current page, 1-based.
    pub page: usize,
    /// Vertical cursor from the page top.
    pub cursor: f32,
    pub rows_on_page: usize,
    pub total_pages: usize,
}

impl PageLayoutState {
    pub fn new(geometry: &PageGeometry, total_pages: usize) -> Self {
        PageLayoutState {
            page: 1,
            cursor: geometry.table_top(PageKind::First),
            rows_on_page: 0,
            total_pages,
        }
    }

    pub fn kind(&self) -> PageKind {
        PageKind::of(self.page)
    }

    pub fn advance(&mut self, height: f32) {
        self.cursor += height;
    }

    pub fn count_row(&mut self, height: f32) {
        self.advance(height);
        self.rows_on_page += 1;
    }

    /// Move to the next page; the cursor lands on the continuation table top.
    pub fn next_page(&mut self, geometry: &PageGeometry) {
        self.page += 1;
        self.rows_on_page = 0;
        self.cursor = geometry.table_top(PageKind::Continuation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> PageGeometry {
        PageGeometry::new(&LayoutConfig::default(), SpaceReservation::NONE)
    }

    #[test]
    fn columns_partition_usable_width() {
        let g = geometry();
        let usable = 959.76 - 100.0;
        assert!((g.table_width() - usable).abs() < 1e-3);
        assert!((g.column_widths[1] - usable * 3.0 / 8.0).abs() < 1e-3);
        assert!((g.column_widths[0] - usable / 8.0).abs() < 1e-3);
        let lefts = g.column_lefts();
        assert_eq!(lefts[0], 48.0);
        assert!((lefts[2] - (48.0 + usable / 2.0)).abs() < 1e-3);
    }

    #[test]
    fn reservation_raises_tops_and_bottom() {
        let reservation = SpaceReservation {
            first_page_header: 300.0,
            continuation_header: 100.0,
            page_bottom: 90.0,
        };
        let g = PageGeometry::new(&LayoutConfig::default(), reservation);
        assert_eq!(g.first_page_top, 300.0);
        assert_eq!(g.continuation_top, 135.0);
        assert_eq!(g.bottom_reserve, 90.0);
        assert!(g.fits(1344.24 - 90.0 - 48.0, 48.0));
        assert!(!g.fits(1344.24 - 90.0 - 47.0, 48.0));
        g.check().unwrap();
    }

    #[test]
    fn crowded_pages_are_rejected() {
        let reservation = SpaceReservation {
            first_page_header: 0.0,
            continuation_header: 0.0,
            page_bottom: 1100.0,
        };
        let g = PageGeometry::new(&LayoutConfig::default(), reservation);
        assert!(matches!(g.check(), Err(Error::InvalidLayout(_))));
    }

    #[test]
    fn regions_resolve_against_page_edges() {
        let g = geometry();
        let config = LayoutConfig::default();
        let title = config.regions.title_image.rect(g.page_width, g.page_height);
        assert!((title.x - (959.76 - 105.0 - 250.0)).abs() < 1e-3);
        assert_eq!(title.y, 30.0);
        let disclaimer = config.regions.disclaimer.rect(g.page_width, g.page_height);
        assert!((disclaimer.y - (1344.24 - 90.0)).abs() < 1e-3);
    }

    #[test]
    fn nominal_pages_use_ceiling_division() {
        assert_eq!(nominal_page_count(1, 18), 1);
        assert_eq!(nominal_page_count(18, 18), 1);
        assert_eq!(nominal_page_count(19, 18), 2);
        assert_eq!(nominal_page_count(40, 18), 3);
        assert_eq!(nominal_page_count(0, 18), 0);
    }

    #[test]
    fn state_moves_between_pages() {
        let g = geometry();
        let mut state = PageLayoutState::new(&g, 2);
        assert_eq!(state.kind(), PageKind::First);
        state.advance(g.header_row_height);
        state.count_row(48.0);
        assert_eq!(state.rows_on_page, 1);
        assert_eq!(state.cursor, 250.0 + 30.0 + 48.0);
        state.next_page(&g);
        assert_eq!(state.page, 2);
        assert_eq!(state.kind(), PageKind::Continuation);
        assert_eq!(state.rows_on_page, 0);
        assert_eq!(state.cursor, 135.0);
        assert_eq!(g.min_row_height(PageKind::Continuation), 58.0);
    }
}
