//! PDF document builder for rendered reports
//!
//! Lays out report pages on A4 with built-in Helvetica fonts. The builder
//! tracks a vertical cursor and starts a new page when a block would not
//! fit, so callers just append headings, tables and charts in order. Every
//! page carries the report title in the header and a page number in the
//! footer.

use anyhow::{Context, Result};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::*;
use std::io::BufWriter;

use crate::services::chart::ChartPoint;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const HEADER_Y: f32 = PAGE_HEIGHT - 12.0;
const CONTENT_TOP: f32 = PAGE_HEIGHT - 25.0;
const CONTENT_BOTTOM: f32 = 25.0;
const FOOTER_Y: f32 = 12.0;
const LINE_HEIGHT: f32 = 5.0;
const CHART_HEIGHT: f32 = 60.0;

/// Accent color used for chart bars and lines
const ACCENT: (f32, f32, f32) = (0.16, 0.35, 0.61);
const AXIS_GRAY: (f32, f32, f32) = (0.55, 0.55, 0.55);

pub struct ReportPdf {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    title: String,
    page_number: u32,
    y: f32,
}

impl ReportPdf {
    pub fn new(title: &str) -> Result<Self> {
        let (doc, page1, layer1) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page1).get_layer(layer1);

        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .context("Failed to add builtin font")?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .context("Failed to add bold font")?;

        let mut pdf = Self {
            doc,
            layer,
            font,
            font_bold,
            title: title.to_string(),
            page_number: 1,
            y: CONTENT_TOP,
        };
        pdf.page_chrome();
        pdf.layer
            .use_text(title, 18.0, Mm(MARGIN), Mm(pdf.y), &pdf.font_bold);
        pdf.y -= 12.0;
        Ok(pdf)
    }

    /// Header and footer drawn on every page
    fn page_chrome(&mut self) {
        self.layer
            .use_text(self.title.as_str(), 8.0, Mm(MARGIN), Mm(HEADER_Y), &self.font);
        self.layer.set_outline_color(Color::Rgb(Rgb::new(
            AXIS_GRAY.0, AXIS_GRAY.1, AXIS_GRAY.2, None,
        )));
        self.layer.set_outline_thickness(0.3);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(HEADER_Y - 2.0)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(HEADER_Y - 2.0)), false),
            ],
            is_closed: false,
        });
        self.layer.use_text(
            format!("Page {}", self.page_number),
            8.0,
            Mm(PAGE_WIDTH - MARGIN - 15.0),
            Mm(FOOTER_Y),
            &self.font,
        );
    }

    /// Start a new page if fewer than `needed` millimeters remain
    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < CONTENT_BOTTOM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.page_number += 1;
            self.y = CONTENT_TOP;
            self.page_chrome();
        }
    }

    pub fn heading(&mut self, text: &str) {
        self.ensure_space(12.0);
        self.y -= 4.0;
        self.layer
            .use_text(text, 13.0, Mm(MARGIN), Mm(self.y), &self.font_bold);
        self.y -= 8.0;
    }

    pub fn text_line(&mut self, text: &str) {
        self.ensure_space(LINE_HEIGHT);
        self.layer
            .use_text(text, 10.0, Mm(MARGIN), Mm(self.y), &self.font);
        self.y -= LINE_HEIGHT;
    }

    pub fn spacer(&mut self, height: f32) {
        self.y -= height;
    }

    /// Render a simple column-aligned table. Column widths are distributed
    /// evenly across the content width.
    pub fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        let content_width = PAGE_WIDTH - 2.0 * MARGIN;
        let col_width = content_width / headers.len().max(1) as f32;

        self.ensure_space(LINE_HEIGHT * 2.0);
        for (i, header) in headers.iter().enumerate() {
            let x = MARGIN + i as f32 * col_width;
            self.layer
                .use_text(*header, 9.0, Mm(x), Mm(self.y), &self.font_bold);
        }
        self.y -= LINE_HEIGHT;

        for row in rows {
            self.ensure_space(LINE_HEIGHT);
            for (i, cell) in row.iter().enumerate() {
                let x = MARGIN + i as f32 * col_width;
                // Roughly 2mm per character at 9pt Helvetica
                let max_chars = (col_width / 2.0) as usize;
                let text: String = cell.chars().take(max_chars).collect();
                self.layer.use_text(text, 9.0, Mm(x), Mm(self.y), &self.font);
            }
            self.y -= LINE_HEIGHT;
        }
        self.y -= 3.0;
    }

    /// Vertical bar chart over the full content width
    pub fn bar_chart(&mut self, title: &str, points: &[ChartPoint]) {
        if points.is_empty() {
            self.text_line("No data for the selected period");
            return;
        }

        self.ensure_space(CHART_HEIGHT + 20.0);
        self.layer
            .use_text(title, 11.0, Mm(MARGIN), Mm(self.y), &self.font_bold);
        self.y -= 6.0;

        let base_y = self.y - CHART_HEIGHT;
        let content_width = PAGE_WIDTH - 2.0 * MARGIN;
        let slot = content_width / points.len() as f32;
        let bar_width = (slot * 0.7).min(12.0);
        let max = points.iter().map(|p| p.value).fold(f64::MIN, f64::max);
        let max = if max <= 0.0 { 1.0 } else { max };

        self.draw_axes(base_y, max);

        self.layer.set_fill_color(Color::Rgb(Rgb::new(
            ACCENT.0, ACCENT.1, ACCENT.2, None,
        )));
        for (i, point) in points.iter().enumerate() {
            let height = (point.value / max) as f32 * CHART_HEIGHT;
            if height > 0.0 {
                let x = MARGIN + i as f32 * slot + (slot - bar_width) / 2.0;
                self.rect(x, base_y, bar_width, height);
            }
        }

        self.chart_labels(points, base_y, slot);
        self.y = base_y - 10.0;
    }

    /// Line chart of a time series over the full content width
    pub fn line_chart(&mut self, title: &str, points: &[ChartPoint]) {
        if points.is_empty() {
            self.text_line("No data for the selected period");
            return;
        }

        self.ensure_space(CHART_HEIGHT + 20.0);
        self.layer
            .use_text(title, 11.0, Mm(MARGIN), Mm(self.y), &self.font_bold);
        self.y -= 6.0;

        let base_y = self.y - CHART_HEIGHT;
        let content_width = PAGE_WIDTH - 2.0 * MARGIN;
        let slot = content_width / points.len() as f32;
        let max = points.iter().map(|p| p.value).fold(f64::MIN, f64::max);
        let max = if max <= 0.0 { 1.0 } else { max };

        self.draw_axes(base_y, max);

        let series: Vec<(Point, bool)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let x = MARGIN + i as f32 * slot + slot / 2.0;
                let y = base_y + (p.value / max) as f32 * CHART_HEIGHT;
                (Point::new(Mm(x), Mm(y)), false)
            })
            .collect();

        self.layer.set_outline_color(Color::Rgb(Rgb::new(
            ACCENT.0, ACCENT.1, ACCENT.2, None,
        )));
        self.layer.set_outline_thickness(1.2);
        self.layer.add_line(Line {
            points: series,
            is_closed: false,
        });

        self.chart_labels(points, base_y, slot);
        self.y = base_y - 10.0;
    }

    fn draw_axes(&mut self, base_y: f32, max: f64) {
        self.layer.set_outline_color(Color::Rgb(Rgb::new(
            AXIS_GRAY.0, AXIS_GRAY.1, AXIS_GRAY.2, None,
        )));
        self.layer.set_outline_thickness(0.4);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(base_y + CHART_HEIGHT)), false),
                (Point::new(Mm(MARGIN), Mm(base_y)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(base_y)), false),
            ],
            is_closed: false,
        });
        self.layer.use_text(
            format!("{:.0}", max),
            7.0,
            Mm(MARGIN - 12.0),
            Mm(base_y + CHART_HEIGHT - 2.0),
            &self.font,
        );
        self.layer
            .use_text("0", 7.0, Mm(MARGIN - 5.0), Mm(base_y), &self.font);
    }

    /// X-axis labels, thinned out when there are too many buckets to fit
    fn chart_labels(&mut self, points: &[ChartPoint], base_y: f32, slot: f32) {
        let step = (points.len() / 12).max(1);
        for (i, point) in points.iter().enumerate().step_by(step) {
            let x = MARGIN + i as f32 * slot;
            self.layer
                .use_text(&point.label, 6.5, Mm(x), Mm(base_y - 4.0), &self.font);
        }
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.layer.add_polygon(Polygon {
            rings: vec![vec![
                (Point::new(Mm(x), Mm(y)), false),
                (Point::new(Mm(x + width), Mm(y)), false),
                (Point::new(Mm(x + width), Mm(y + height)), false),
                (Point::new(Mm(x), Mm(y + height)), false),
            ]],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }

    /// Serialize the document to bytes
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        {
            let mut writer = BufWriter::new(&mut buffer);
            self.doc.save(&mut writer).context("Failed to save PDF")?;
        }
        Ok(buffer)
    }
}
