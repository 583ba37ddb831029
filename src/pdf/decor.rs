//! Per-page decorations: the first-page header with the metadata box, the
//! condensed continuation banner and the bottom strip with the page number.

use crate::assets::{AssetSlot, DecorAssets};
use crate::config::{LayoutConfig, Region};
use crate::fonts::{FontRole, FontSet};
use crate::format::format_date_text;
use crate::geometry::{Rect, SpaceReservation};
use crate::model::{AccountField, AccountInfo, NOT_AVAILABLE};

use super::canvas::{DisplayList, DrawOp};
use super::layout::wrap_text;

/// Hooks the table renderer calls around the ledger. Implementations
/// declare up front how much space they take so pagination can keep rows
/// clear of them.
pub trait PageDecorator {
    fn reservation(&self) -> SpaceReservation;
    fn first_page_header(&self, list: &mut DisplayList);
    fn continuation_header(&self, list: &mut DisplayList);
    /// Bottom strip of a page, including "Page X of N".
    fn page_footer(&self, list: &mut DisplayList, page: usize, total_pages: usize);
}

pub fn page_label(page: usize, total_pages: usize) -> String {
    format!("Page {page} of {total_pages}")
}

/// Metadata box rows: label and field, printed top to bottom.
const BOX_FIELDS: [(&str, AccountField); 7] = [
    ("Statement Period", AccountField::StatementPeriod),
    ("Account No:", AccountField::AccountNo),
    ("Account Title:", AccountField::AccountTitle),
    ("Product Type:", AccountField::ProductType),
    ("Currency:", AccountField::Currency),
    ("Balance:", AccountField::Balance),
    ("As of:", AccountField::AsOf),
];

const BOX_INSET: f32 = 10.0;
const BOX_VALUE_OFFSET: f32 = 118.0;
/// Extra gap before the labeled fields in the left column.
const LABELED_FIELDS_GAP: f32 = 15.0;
const DISCLAIMER_LINE_GAP: f32 = 4.0;

pub struct StatementDecor<'a> {
    config: &'a LayoutConfig,
    account: &'a AccountInfo,
    assets: &'a DecorAssets,
    fonts: &'a FontSet,
}

impl<'a> StatementDecor<'a> {
    pub fn new(
        config: &'a LayoutConfig,
        account: &'a AccountInfo,
        assets: &'a DecorAssets,
        fonts: &'a FontSet,
    ) -> Self {
        StatementDecor {
            config,
            account,
            assets,
            fonts,
        }
    }

    fn rect(&self, region: &Region) -> Rect {
        region.rect(self.config.page_width, self.config.page_height)
    }

    fn image(&self, list: &mut DisplayList, slot: AssetSlot, region: &Region) {
        if self.assets.get(slot).is_some() {
            list.push(DrawOp::Image {
                slot,
                rect: self.rect(region),
            });
        }
    }

    fn field_pitch(&self) -> f32 {
        self.config.field_font_size + 3.0
    }

    fn top_artwork(&self, list: &mut DisplayList) {
        let regions = &self.config.regions;
        self.image(list, AssetSlot::Logo, &regions.logo);
        self.image(list, AssetSlot::Band, &regions.top_band);
        self.image(list, AssetSlot::Title, &regions.title_image);
    }

    fn metadata_box(&self, list: &mut DisplayList) {
        let area = self.rect(&self.config.regions.metadata_box);
        list.push(DrawOp::StrokeRect {
            rect: area,
            color: crate::config::Rgb::BLACK,
            width: 1.0,
        });
        let size = self.config.metadata_font_size;
        for (i, (label, field)) in BOX_FIELDS.iter().enumerate() {
            let top = area.y + BOX_INSET + i as f32 * self.field_pitch();
            let value = match field {
                AccountField::AsOf => self
                    .account
                    .get(*field)
                    .map(format_date_text)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                _ => self.account.display(*field).to_string(),
            };
            list.text(*label, area.x + BOX_INSET, top, FontRole::SansBold, size);
            list.text(value, area.x + BOX_VALUE_OFFSET, top, FontRole::SansBold, size);
        }
    }

    fn account_fields(&self, list: &mut DisplayList) {
        let origin = self.rect(&self.config.regions.account_fields);
        let size = self.config.field_font_size;
        let pitch = self.field_pitch();
        let account = self.account;
        let row_top = |i: usize| {
            let gap = if i >= 3 { LABELED_FIELDS_GAP } else { 0.0 };
            origin.y + i as f32 * pitch + gap
        };

        list.text(
            account.display(AccountField::Branch),
            origin.x + 25.0,
            row_top(0),
            FontRole::Bold,
            size,
        );
        list.text(
            account.display(AccountField::AccountTitle),
            origin.x,
            row_top(1),
            FontRole::Bold,
            size,
        );
        list.text(
            account.display(AccountField::Address),
            origin.x,
            row_top(2),
            FontRole::Regular,
            size,
        );
        let labeled = [
            ("Reg Cell No:", AccountField::RegCellNo, 70.0),
            ("IBAN:", AccountField::Iban, 50.0),
        ];
        for (i, (label, field, value_x)) in labeled.into_iter().enumerate() {
            let top = row_top(3 + i);
            list.text(label, origin.x, top, FontRole::Bold, size);
            list.text(account.display(field), origin.x + value_x, top, FontRole::Bold, size);
        }
    }

    fn disclaimer(&self, list: &mut DisplayList) {
        let area = self.rect(&self.config.regions.disclaimer);
        let size = self.config.disclaimer_font_size;
        let metrics = self.fonts.metrics(FontRole::Sans);
        let pitch = metrics.line_height(size) + DISCLAIMER_LINE_GAP;
        for (i, line) in wrap_text(&self.config.disclaimer, metrics, size, area.width)
            .into_iter()
            .enumerate()
        {
            list.text(line.text, area.x, area.y + i as f32 * pitch, FontRole::Sans, size);
        }
    }
}

impl PageDecorator for StatementDecor<'_> {
    fn reservation(&self) -> SpaceReservation {
        let regions = &self.config.regions;
        let deepest = |regions: &[Region]| {
            regions
                .iter()
                .map(|r| self.rect(r).bottom())
                .fold(0.0f32, f32::max)
        };
        let page_bottom = regions
            .page_bottom()
            .iter()
            .map(|r| self.config.page_height - self.rect(r).y)
            .fold(0.0f32, f32::max);
        SpaceReservation {
            first_page_header: deepest(&regions.first_page_top()),
            continuation_header: deepest(&regions.continuation_top()),
            page_bottom,
        }
    }

    fn first_page_header(&self, list: &mut DisplayList) {
        self.top_artwork(list);
        self.metadata_box(list);
        self.account_fields(list);
    }

    fn continuation_header(&self, list: &mut DisplayList) {
        self.top_artwork(list);
        let origin = self.rect(&self.config.regions.continuation_fields);
        let size = self.config.field_font_size;
        list.text(
            self.account.display(AccountField::Address),
            origin.x + 20.0,
            origin.y,
            FontRole::Bold,
            size,
        );
        list.text(
            self.account.display(AccountField::AccountTitle),
            origin.x,
            origin.y + self.field_pitch(),
            FontRole::Bold,
            size,
        );
    }

    fn page_footer(&self, list: &mut DisplayList, page: usize, total_pages: usize) {
        let regions = &self.config.regions;
        self.disclaimer(list);
        self.image(list, AssetSlot::Footer, &regions.bottom_artwork);
        self.image(list, AssetSlot::Band, &regions.bottom_band);

        let area = self.rect(&regions.page_number);
        let size = self.config.page_number_font_size;
        let label = page_label(page, total_pages);
        let width = self.fonts.metrics(FontRole::Bold).text_width(&label, size);
        list.text(label, area.right() - width, area.y, FontRole::Bold, size);
    }
}
