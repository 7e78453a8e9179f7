//! `lopdf` backed certificate renderer.
//!
//! Produces A4 pages in Helvetica. The output contains no timestamps or
//! random identifiers, so identical markup always yields identical bytes.

mod markup;

use image::GrayImage;
use lopdf::{
    Dictionary, Document, Object, ObjectId, Stream,
    content::{Content, Operation},
    dictionary,
};

use crate::application::rendering::{ContentRenderer, RenderError};

use markup::{Block, TextStyle, parse_blocks};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const FONT_NAME: &str = "F1";

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfRenderer;

impl LopdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ContentRenderer for LopdfRenderer {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let blocks = parse_blocks(html)?;

        let mut layout = Layout::default();
        for block in blocks {
            match block {
                Block::Text { style, text } => layout.paragraph(style, &text),
                Block::Image(image) => layout.image(image),
            }
        }

        write_document(layout.finish())
    }
}

struct PlacedImage {
    name: String,
    image: GrayImage,
}

#[derive(Default)]
struct PageContent {
    operations: Vec<Operation>,
    images: Vec<PlacedImage>,
}

struct Layout {
    pages: Vec<PageContent>,
    current: PageContent,
    cursor_y: i64,
    image_count: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            current: PageContent::default(),
            cursor_y: PAGE_HEIGHT - MARGIN,
            image_count: 0,
        }
    }
}

impl Layout {
    fn usable_width() -> i64 {
        PAGE_WIDTH - 2 * MARGIN
    }

    fn ensure_room(&mut self, height: i64) {
        if self.cursor_y - height < MARGIN && !self.current.operations.is_empty() {
            let full = std::mem::take(&mut self.current);
            self.pages.push(full);
            self.cursor_y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn paragraph(&mut self, style: TextStyle, text: &str) {
        let size = style.font_size();
        let line_height = size * 7 / 5;
        // Helvetica averages roughly half an em per glyph.
        let max_chars = usize::try_from(Self::usable_width() * 2 / size).unwrap_or(1).max(1);

        for line in wrap_words(text, max_chars) {
            self.ensure_room(line_height);
            self.cursor_y -= line_height;
            self.current.operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![FONT_NAME.into(), Object::Integer(size)]),
                Operation::new(
                    "Td",
                    vec![Object::Integer(MARGIN), Object::Integer(self.cursor_y)],
                ),
                Operation::new("Tj", vec![Object::string_literal(win_ansi(&line))]),
                Operation::new("ET", vec![]),
            ]);
        }
        self.cursor_y -= size / 2;
    }

    fn image(&mut self, image: GrayImage) {
        let max_width = Self::usable_width();
        let max_height = PAGE_HEIGHT - 2 * MARGIN;
        let (mut width, mut height) = (i64::from(image.width()), i64::from(image.height()));
        if width == 0 || height == 0 {
            return;
        }
        if width > max_width {
            height = (height * max_width / width).max(1);
            width = max_width;
        }
        if height > max_height {
            width = (width * max_height / height).max(1);
            height = max_height;
        }

        self.ensure_room(height);
        self.cursor_y -= height;
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);

        self.current.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(MARGIN),
                    Object::Integer(self.cursor_y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        self.current.images.push(PlacedImage { name, image });
        self.cursor_y -= 6;
    }

    fn finish(mut self) -> Vec<PageContent> {
        if !self.current.operations.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_chars = 0;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        if line_chars > 0 && line_chars + 1 + word_chars > max_chars {
            lines.push(std::mem::take(&mut line));
            line_chars = 0;
        }
        if line_chars > 0 {
            line.push(' ');
            line_chars += 1;
        }
        line.push_str(word);
        line_chars += word_chars;
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Map text to the single-byte encoding the standard Helvetica font uses.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            c if (c as u32) < 0x100 => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn write_document(pages: Vec<PageContent>) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let page_id = add_page(&mut doc, pages_id, font_id, page)?;
        kids.push(page_id.into());
    }

    let page_count = i64::try_from(kids.len())
        .map_err(|_| RenderError::document("page count exceeds supported range"))?;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| RenderError::document(err.to_string()))?;
    Ok(output)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    page: PageContent,
) -> Result<ObjectId, RenderError> {
    let mut xobjects = Dictionary::new();
    for placed in page.images {
        let (width, height) = (placed.image.width(), placed.image.height());
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(i64::from(width)),
                "Height" => Object::Integer(i64::from(height)),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => Object::Integer(8),
            },
            placed.image.into_raw(),
        );
        let image_id = doc.add_object(stream);
        xobjects.set(placed.name.into_bytes(), image_id);
    }

    let content = Content {
        operations: page.operations,
    };
    let encoded = content
        .encode()
        .map_err(|err| RenderError::document(err.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let resources = dictionary! {
        "Font" => dictionary! { FONT_NAME => font_id },
        "XObject" => xobjects,
    };

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources,
    }))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use base64::{Engine, engine::general_purpose::STANDARD};
    use image::{DynamicImage, ImageFormat, Luma};

    use super::*;

    fn png_data_uri(side: u32) -> String {
        let image = GrayImage::from_fn(side, side, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 255 }]));
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(image)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .expect("png");
        format!("data:image/png;base64,{}", STANDARD.encode(png))
    }

    #[test]
    fn renders_fragment_as_pdf() {
        let bytes = LopdfRenderer::new()
            .render("<p>Hello Ada</p>")
            .expect("render");
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).expect("parse rendered pdf");
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn rendering_is_deterministic() {
        let html = format!(
            "<h1>Certificate</h1><p>Awarded to Ada</p><img src=\"{}\" />",
            png_data_uri(16)
        );
        let renderer = LopdfRenderer::new();
        assert_eq!(
            renderer.render(&html).expect("first"),
            renderer.render(&html).expect("second")
        );
    }

    #[test]
    fn different_content_produces_different_bytes() {
        let renderer = LopdfRenderer::new();
        assert_ne!(
            renderer.render("<p>Ada</p>").expect("ada"),
            renderer.render("<p>Grace</p>").expect("grace")
        );
    }

    #[test]
    fn long_documents_flow_onto_more_pages() {
        let paragraph = "<p>lorem ipsum dolor sit amet</p>".repeat(120);
        let bytes = LopdfRenderer::new().render(&paragraph).expect("render");
        let doc = Document::load_mem(&bytes).expect("parse");
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn embeds_inline_png_as_image_xobject() {
        let html = format!("<p>scan me</p><img src=\"{}\">", png_data_uri(8));
        let bytes = LopdfRenderer::new().render(&html).expect("render");
        let doc = Document::load_mem(&bytes).expect("parse");

        let has_image = doc.objects.values().any(|object| match object {
            Object::Stream(stream) => stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|name| name == b"Image")
                .unwrap_or(false),
            _ => false,
        });
        assert!(has_image);
    }

    #[test]
    fn malformed_markup_fails_without_output() {
        let err = LopdfRenderer::new()
            .render("<p>unfinished <span")
            .expect_err("malformed");
        assert!(matches!(err, RenderError::Markup { .. }));
    }

    #[test]
    fn comparison_signs_reach_the_page() {
        let bytes = LopdfRenderer::new()
            .render("<p>Score 1 < 2 and 3 > 2 points</p>")
            .expect("render");
        let doc = Document::load_mem(&bytes).expect("parse");
        let text = doc.extract_text(&[1]).expect("extract text");
        assert!(text.contains("Score 1 < 2 and 3 > 2 points"), "page text: {text:?}");
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(
            wrap_words("one two three four", 9),
            vec!["one two", "three", "four"]
        );
        assert_eq!(wrap_words("  ", 9), Vec::<String>::new());
    }

    #[test]
    fn maps_text_to_win_ansi() {
        assert_eq!(win_ansi("Zoë •"), vec![b'Z', b'o', 0xEB, b' ', 0x95]);
        assert_eq!(win_ansi("漢"), vec![b'?']);
    }
}
