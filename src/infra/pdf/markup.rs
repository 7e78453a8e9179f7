//! Markup reader feeding the PDF layout.
//!
//! Only the structure a certificate needs is kept: headings, paragraphs,
//! line breaks, list items and embedded PNG images. Everything inside
//! `head`, `style`, `script` and `title` is dropped.

use std::{cell::RefCell, error::Error, rc::Rc};

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{GrayImage, ImageFormat};
use lol_html::{
    RewriteStrSettings, element,
    html_content::{Element, EndTag},
    rewrite_str, text,
};

use crate::application::rendering::RenderError;

const PNG_DATA_URI: &str = "data:image/png;base64,";
const SKIPPED_ELEMENTS: &str = "head, style, script, title";
const HEADING_ELEMENTS: &str = "h1, h2, h3";
const BLOCK_ELEMENTS: &str = "p, div, section, article, header, footer, main, table, tr, \
                              ul, ol, blockquote, h4, h5, h6, center, hr";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Subheading,
    Body,
}

impl TextStyle {
    pub fn font_size(self) -> i64 {
        match self {
            TextStyle::Title => 24,
            TextStyle::Heading => 18,
            TextStyle::Subheading => 14,
            TextStyle::Body => 12,
        }
    }

    fn for_heading(name: &str) -> Option<Self> {
        match name {
            "h1" => Some(TextStyle::Title),
            "h2" => Some(TextStyle::Heading),
            "h3" => Some(TextStyle::Subheading),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Block {
    Text { style: TextStyle, text: String },
    Image(GrayImage),
}

/// Ensure the markup has a root document element.
fn ensure_document_shell(html: &str) -> String {
    if html.to_ascii_lowercase().contains("<html") {
        html.to_string()
    } else {
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"UTF-8\" /></head><body>{html}</body></html>"
        )
    }
}

#[derive(Default)]
struct BlockReader {
    blocks: Vec<Block>,
    pending: String,
    heading: Option<TextStyle>,
    skip_depth: usize,
}

impl BlockReader {
    fn flush(&mut self) {
        let text = collapse_whitespace(&decode_entities(&self.pending));
        self.pending.clear();
        if !text.is_empty() {
            self.blocks.push(Block::Text {
                style: self.heading.unwrap_or(TextStyle::Body),
                text,
            });
        }
    }
}

type Shared<T> = Rc<RefCell<T>>;

/// Run `action` when the element's end tag is reached. Void elements have none.
fn on_close(el: &mut Element<'_, '_>, action: impl FnOnce() + 'static) -> bool {
    match el.end_tag_handlers() {
        Some(handlers) => {
            handlers.push(Box::new(
                move |_end: &mut EndTag<'_>| -> Result<(), Box<dyn Error + Send + Sync>> {
                    action();
                    Ok(())
                },
            ));
            true
        }
        None => false,
    }
}

/// Read the layout blocks of `html`, wrapping bare fragments in a document shell first.
pub fn parse_blocks(html: &str) -> Result<Vec<Block>, RenderError> {
    if let Some(reason) = unterminated_markup(html) {
        return Err(RenderError::markup(reason));
    }
    let document = ensure_document_shell(html);

    let reader: Shared<BlockReader> = Rc::new(RefCell::new(BlockReader::default()));
    let error_slot: Shared<Option<RenderError>> = Rc::new(RefCell::new(None));

    let rewritten = rewrite_str(
        &document,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(SKIPPED_ELEMENTS, {
                    let reader = Rc::clone(&reader);
                    move |el| {
                        let closing = Rc::clone(&reader);
                        if on_close(el, move || {
                            let mut reader = closing.borrow_mut();
                            reader.skip_depth = reader.skip_depth.saturating_sub(1);
                        }) {
                            reader.borrow_mut().skip_depth += 1;
                        }
                        Ok(())
                    }
                }),
                element!("body", {
                    let reader = Rc::clone(&reader);
                    move |_el| {
                        let mut reader = reader.borrow_mut();
                        reader.skip_depth = 0;
                        reader.flush();
                        Ok(())
                    }
                }),
                element!(HEADING_ELEMENTS, {
                    let reader = Rc::clone(&reader);
                    move |el| {
                        let style = TextStyle::for_heading(&el.tag_name());
                        {
                            let mut reader = reader.borrow_mut();
                            reader.flush();
                            reader.heading = style;
                        }
                        let closing = Rc::clone(&reader);
                        on_close(el, move || {
                            let mut reader = closing.borrow_mut();
                            reader.flush();
                            reader.heading = None;
                        });
                        Ok(())
                    }
                }),
                element!(BLOCK_ELEMENTS, {
                    let reader = Rc::clone(&reader);
                    move |el| {
                        reader.borrow_mut().flush();
                        let closing = Rc::clone(&reader);
                        on_close(el, move || closing.borrow_mut().flush());
                        Ok(())
                    }
                }),
                element!("li", {
                    let reader = Rc::clone(&reader);
                    move |el| {
                        {
                            let mut reader = reader.borrow_mut();
                            reader.flush();
                            reader.pending.push_str("- ");
                        }
                        let closing = Rc::clone(&reader);
                        on_close(el, move || closing.borrow_mut().flush());
                        Ok(())
                    }
                }),
                element!("br", {
                    let reader = Rc::clone(&reader);
                    move |_el| {
                        reader.borrow_mut().flush();
                        Ok(())
                    }
                }),
                element!("img", {
                    let reader = Rc::clone(&reader);
                    let error_slot = Rc::clone(&error_slot);
                    move |el| {
                        let mut reader = reader.borrow_mut();
                        if reader.skip_depth > 0 {
                            return Ok(());
                        }
                        reader.flush();
                        let Some(src) = el.get_attribute("src") else {
                            return Ok(());
                        };
                        match decode_image(&src) {
                            Ok(Some(image)) => reader.blocks.push(Block::Image(image)),
                            Ok(None) => {}
                            Err(err) => {
                                *error_slot.borrow_mut() = Some(err.clone());
                                return Err(err.into());
                            }
                        }
                        Ok(())
                    }
                }),
                text!("*", {
                    let reader = Rc::clone(&reader);
                    move |chunk| {
                        let mut reader = reader.borrow_mut();
                        if reader.skip_depth == 0 {
                            reader.pending.push_str(chunk.as_str());
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    );

    if let Some(err) = error_slot.borrow_mut().take() {
        return Err(err);
    }
    rewritten.map_err(|err| RenderError::markup(err.to_string()))?;

    let mut reader = reader.borrow_mut();
    reader.flush();
    Ok(std::mem::take(&mut reader.blocks))
}

/// Markup that ends inside a tag or comment loses content silently, so it is rejected.
fn unterminated_markup(html: &str) -> Option<&'static str> {
    if let Some(open) = html.rfind("<!--")
        && !html[open + 4..].contains("-->")
    {
        return Some("unterminated comment");
    }

    let open = html.rfind('<')?;
    let starts_tag = html[open + 1..]
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '/' || ch == '!');
    if starts_tag && !html[open..].contains('>') {
        return Some("unterminated tag");
    }
    None
}

/// Only inline PNG data is embedded; other sources are left out of the document.
fn decode_image(src: &str) -> Result<Option<GrayImage>, RenderError> {
    let src = src.trim();

    if let Some(payload) = src.strip_prefix(PNG_DATA_URI) {
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|err| RenderError::image(format!("invalid base64 payload: {err}")))?;
        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .map_err(|err| RenderError::image(err.to_string()))?;
        return Ok(Some(image.to_luma8()));
    }

    if src.starts_with("data:") {
        return Err(RenderError::image("only PNG data URIs can be embedded"));
    }

    Ok(None)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Text chunks arrive exactly as written, references included.
fn decode_entities(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('&') {
        output.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let decoded = candidate
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| Some((decode_entity(&candidate[1..end])?, end)));
        match decoded {
            Some((ch, end)) => {
                output.push(ch);
                rest = &candidate[end + 1..];
            }
            None => {
                output.push('&');
                rest = &candidate[1..];
            }
        }
    }

    output.push_str(rest);
    output
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "copy" => Some('©'),
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
