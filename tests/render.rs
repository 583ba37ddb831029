mod common;

use rayon::prelude::*;
use statement_pdf::{Error, Statement, StatementRenderer, render_statement};

#[test]
fn renders_a_single_page_statement() {
    let _ = env_logger::try_init();
    let bytes = render_statement(&common::statement(5), &common::config()).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert!(common::contains(&bytes, "/Count 1"));
    assert!(common::contains(&bytes, "Account Statement"));
}

#[test]
fn page_count_follows_the_row_cap() {
    let config = common::config();
    for (rows, pages) in [(18, 1), (19, 2), (36, 2), (37, 3), (100, 6)] {
        let plan = statement_pdf::paginate_statement(&common::statement(rows), &config).unwrap();
        assert_eq!(plan.total_pages, pages, "{rows} rows");
        let bytes = render_statement(&common::statement(rows), &config).unwrap();
        assert!(common::contains(&bytes, &format!("/Count {pages}")), "{rows} rows");
    }
}

#[test]
fn smaller_row_cap_gives_more_pages() {
    let mut config = common::config();
    config.max_rows_per_page = 5;
    let plan = statement_pdf::paginate_statement(&common::statement(12), &config).unwrap();
    assert_eq!(plan.total_pages, 3);
    assert_eq!(
        (1..=3).map(|p| plan.rows_on_page(p)).collect::<Vec<_>>(),
        [5, 5, 2]
    );
}

#[test]
fn every_footer_shows_the_final_page_count() {
    let renderer = StatementRenderer::new(common::config()).unwrap();
    let (list, plan) = renderer.layout(&common::statement(40)).unwrap();
    assert_eq!(plan.total_pages, 3);
    assert_eq!(list.page_count(), 3);
    for page in 0..3 {
        let label = format!("Page {} of 3", page + 1);
        assert!(list.texts(page).any(|t| t == label), "missing {label}");
    }
}

#[test]
fn long_particulars_force_extra_pages() {
    let mut statement = common::statement(18);
    for tx in &mut statement.transactions {
        tx.particulars = "Standing order to a long named beneficiary account ".repeat(4);
    }
    let plan = statement_pdf::paginate_statement(&statement, &common::config()).unwrap();
    assert!(plan.total_pages > 1);
    for row in &plan.rows {
        assert!(!row.clipped);
        assert!(row.height >= 48.0);
    }
}

#[test]
fn blank_and_header_rows_are_not_rendered() {
    let mut statement = common::statement(3);
    statement.transactions.push(Default::default());
    statement.transactions.push(statement_pdf::Transaction {
        date: "Date".into(),
        particulars: "Particulars".into(),
        ..Default::default()
    });
    let plan = statement_pdf::paginate_statement(&statement, &common::config()).unwrap();
    assert_eq!(plan.rows.len(), 3);
}

#[test]
fn input_shape_errors_are_reported_before_rendering() {
    let config = common::config();
    let empty = Statement {
        account: common::account(),
        transactions: Vec::new(),
    };
    assert!(matches!(render_statement(&empty, &config), Err(Error::EmptyLedger)));

    let anonymous = Statement {
        account: Default::default(),
        transactions: common::statement(2).transactions,
    };
    assert!(matches!(
        render_statement(&anonymous, &config),
        Err(Error::MissingAccountInfo)
    ));
}

#[test]
fn invalid_layouts_are_rejected() {
    let mut config = common::config();
    config.max_rows_per_page = 0;
    assert!(matches!(
        render_statement(&common::statement(1), &config),
        Err(Error::InvalidLayout(_))
    ));
}

#[test]
fn decoration_images_are_embedded() {
    let dir = common::output_dir("decoration_images");
    let logo = dir.join("logo.png");
    image::RgbaImage::from_pixel(8, 4, image::Rgba([200, 30, 30, 128]))
        .save(&logo)
        .unwrap();
    let band = dir.join("band.png");
    image::RgbImage::from_pixel(16, 2, image::Rgb([20, 60, 200]))
        .save(&band)
        .unwrap();

    let mut config = common::config();
    config.assets = statement_pdf::config::AssetConfig::from_dir(&dir);
    assert_eq!(config.assets.logo.as_deref(), Some(logo.as_path()));

    let bytes = render_statement(&common::statement(20), &config).unwrap();
    assert!(common::contains(&bytes, "/Im1"));
    assert!(common::contains(&bytes, "/Im2"));
    assert!(!common::contains(&bytes, "/Im3"));
    assert!(common::contains(&bytes, "/SMask"));
}

#[test]
fn unreadable_assets_are_fatal() {
    let dir = common::output_dir("unreadable_assets");
    let mut config = common::config();
    config.assets.logo = Some(dir.join("missing.png"));
    assert!(matches!(
        render_statement(&common::statement(1), &config),
        Err(Error::Asset { .. })
    ));

    let broken = dir.join("broken.png");
    std::fs::write(&broken, b"not an image").unwrap();
    config.assets.logo = Some(broken);
    assert!(matches!(StatementRenderer::new(config), Err(Error::Asset { .. })));
}

#[test]
fn concurrent_renders_are_identical() {
    let renderer = StatementRenderer::new(common::config()).unwrap();
    let statement = common::statement(45);
    let reference = renderer.render(&statement).unwrap();

    let outputs: Vec<Vec<u8>> = (0..8)
        .into_par_iter()
        .map(|_| renderer.render(&statement).unwrap())
        .collect();
    assert!(outputs.iter().all(|bytes| *bytes == reference));
}
