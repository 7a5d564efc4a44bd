/// Print a note to PDF
///
/// A minimal PDF 1.4 writer: A4 pages, text in the standard Helvetica
/// fonts (WinAnsi encoding, so no font embedding), images embedded as
/// baseline JPEG XObjects with the DCTDecode filter. Streams are left
/// uncompressed.
use std::io::Write as _;
use std::path::Path;

use crate::error::{NoteVaultError, Result};
use crate::media::codec::{decode_data_url_image, encode_jpeg};
use crate::state::Note;

// ========== Page geometry (points) ==========

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const TITLE_SIZE: f32 = 18.0;
const META_SIZE: f32 = 9.0;
const BODY_SIZE: f32 = 11.0;
const CAPTION_SIZE: f32 = 9.0;
const LINE_SPACING: f32 = 1.3;

const IMAGE_GAP: f32 = 16.0;
const IMAGE_MAX_HEIGHT: f32 = 240.0;
const IMAGES_PER_ROW: usize = 2;

/// JPEG quality used when an image has to be re-encoded for the PDF
const EMBED_QUALITY: u8 = 90;

/// Render `note` and write it to `path`
pub fn write_note_pdf(note: &Note, path: &Path) -> Result<()> {
    let bytes = render_note_pdf(note)?;
    let mut file = std::fs::File::create(path).map_err(|e| NoteVaultError::io(path, e))?;
    file.write_all(&bytes).map_err(|e| NoteVaultError::io(path, e))?;
    log::info!("Wrote PDF for '{}' to {}", note.display_title(), path.display());
    Ok(())
}

/// Default PDF file name for a note
pub fn pdf_file_name(note: &Note) -> String {
    format!("{}.pdf", crate::transfer::sanitize_file_stem(&note.part_id, "Untitled"))
}

/// Lay out `note` and serialize the document
pub fn render_note_pdf(note: &Note) -> Result<Vec<u8>> {
    let mut doc = PdfDocument::new();
    let catalog_id = doc.reserve();
    let pages_id = doc.reserve();
    let font_id = doc.add(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec());
    let bold_id = doc.add(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>".to_vec(),
    );

    let mut layout = Layout::new();

    // Heading
    layout.text_block(note.display_title(), Font::Bold, TITLE_SIZE, MARGIN, CONTENT_WIDTH);
    if let Some(updated) = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(note.updated_at) {
        let meta = format!("Last updated {}", updated.format("%Y-%m-%d %H:%M UTC"));
        layout.text_block(&meta, Font::Regular, META_SIZE, MARGIN, CONTENT_WIDTH);
    }
    layout.space(BODY_SIZE);

    // Body
    if !note.body.trim().is_empty() {
        layout.text_block(&note.body, Font::Regular, BODY_SIZE, MARGIN, CONTENT_WIDTH);
        layout.space(BODY_SIZE);
    }

    // Images, two per row with captions
    let column_width = (CONTENT_WIDTH - IMAGE_GAP * (IMAGES_PER_ROW as f32 - 1.0)) / IMAGES_PER_ROW as f32;
    for row in note.images.chunks(IMAGES_PER_ROW) {
        let mut cells = Vec::with_capacity(row.len());
        for image in row {
            let embedded = match embed_image(&mut doc, &image.data_url) {
                Ok(embedded) => Some(embedded),
                Err(e) => {
                    log::warn!("Leaving image {} out of the PDF: {}", image.id, e);
                    None
                }
            };
            cells.push((embedded, image.caption.as_str()));
        }
        layout.image_row(&cells, column_width);
    }

    // Pages
    let mut kids = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let content_id = doc.add_stream("", &page.content);
        let mut xobjects = String::new();
        for (name, id) in &page.images {
            xobjects.push_str(&format!("/{} {} 0 R ", name, id));
        }
        let page_id = doc.add(
            format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Contents {} 0 R \
                 /Resources << /Font << /F1 {} 0 R /F2 {} 0 R >> /XObject << {}>> >> >>",
                pages_id, PAGE_WIDTH, PAGE_HEIGHT, content_id, font_id, bold_id, xobjects
            )
            .into_bytes(),
        );
        kids.push(page_id);
    }

    let kids_refs: Vec<String> = kids.iter().map(|id| format!("{} 0 R", id)).collect();
    doc.set(
        pages_id,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids_refs.join(" "),
            kids.len()
        )
        .into_bytes(),
    );
    doc.set(catalog_id, format!("<< /Type /Catalog /Pages {} 0 R >>", pages_id).into_bytes());

    doc.finish(catalog_id)
}

// ========== Images ==========

/// An image XObject already written to the document
#[derive(Debug, Clone, Copy)]
struct EmbeddedImage {
    object_id: usize,
    width: u32,
    height: u32,
}

/// Decode a stored image and write it as an RGB JPEG XObject.
///
/// Always re-encoded so the color space is known to be DeviceRGB.
fn embed_image(doc: &mut PdfDocument, data_url: &str) -> Result<EmbeddedImage> {
    let img = decode_data_url_image(data_url)?;
    let jpeg = encode_jpeg(&img, EMBED_QUALITY)?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(NoteVaultError::Pdf("image has no pixels".to_string()));
    }
    let dict = format!(
        "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB \
         /BitsPerComponent 8 /Filter /DCTDecode",
        width, height
    );
    let object_id = doc.add_stream(&dict, &jpeg);
    Ok(EmbeddedImage {
        object_id,
        width,
        height,
    })
}

// ========== Layout ==========

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Default)]
struct Page {
    content: Vec<u8>,
    /// (resource name, object id)
    images: Vec<(String, usize)>,
}

/// Top-down flow layout; `cursor` is the baseline budget from the top
struct Layout {
    pages: Vec<Page>,
    cursor: f32,
    image_count: usize,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Page::default()],
            cursor: PAGE_HEIGHT - MARGIN,
            image_count: 0,
        }
    }

    fn page(&mut self) -> &mut Page {
        // `pages` always holds at least one page
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    /// Start a new page unless `height` still fits on this one
    fn ensure_space(&mut self, height: f32) {
        let page_is_empty = self.page().content.is_empty();
        if self.cursor - height < MARGIN && !page_is_empty {
            self.new_page();
        }
    }

    fn space(&mut self, height: f32) {
        self.cursor -= height;
    }

    fn line(&mut self, text: &str, font: Font, size: f32, x: f32) {
        let line_height = size * LINE_SPACING;
        self.ensure_space(line_height);
        self.cursor -= size;
        let y = self.cursor;
        let page = self.page();
        let _ = write!(page.content, "BT /{} {} Tf {:.2} {:.2} Td (", font.resource(), size, x, y);
        page.content.extend(encode_text(text));
        page.content.extend_from_slice(b") Tj ET\n");
        self.cursor -= line_height - size;
    }

    fn text_block(&mut self, text: &str, font: Font, size: f32, x: f32, width: f32) {
        for line in wrap_text(text, max_chars(width, size)) {
            self.line(&line, font, size, x);
        }
    }

    fn image_row(&mut self, cells: &[(Option<EmbeddedImage>, &str)], column_width: f32) {
        let caption_chars = max_chars(column_width, CAPTION_SIZE);
        let caption_line = CAPTION_SIZE * LINE_SPACING;

        let scaled: Vec<(f32, f32)> = cells
            .iter()
            .map(|(image, _)| match image {
                Some(img) => fit_box(img.width as f32, img.height as f32, column_width, IMAGE_MAX_HEIGHT),
                None => (column_width, caption_line),
            })
            .collect();
        let captions: Vec<Vec<String>> = cells
            .iter()
            .map(|(image, caption)| {
                let mut lines = if caption.trim().is_empty() {
                    Vec::new()
                } else {
                    wrap_text(caption, caption_chars)
                };
                if image.is_none() {
                    lines.insert(0, "[image unavailable]".to_string());
                }
                lines
            })
            .collect();

        let image_height = scaled
            .iter()
            .zip(cells)
            .filter(|(_, (image, _))| image.is_some())
            .map(|((_, h), _)| *h)
            .fold(0.0, f32::max);
        let caption_height = captions.iter().map(Vec::len).max().unwrap_or(0) as f32 * caption_line;
        self.ensure_space(image_height + caption_height + IMAGE_GAP);

        let top = self.cursor;
        for (column, ((image, _), (width, height))) in cells.iter().zip(&scaled).enumerate() {
            let x = MARGIN + column as f32 * (column_width + IMAGE_GAP);
            if let Some(img) = image {
                self.image_count += 1;
                let name = format!("Im{}", self.image_count);
                let page = self.page();
                let _ = writeln!(
                    page.content,
                    "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /{} Do Q",
                    width,
                    height,
                    x,
                    top - height,
                    name
                );
                page.images.push((name, img.object_id));
            }

            let mut baseline = top - image_height - CAPTION_SIZE - 2.0;
            for line in &captions[column] {
                let page = self.page();
                let _ = write!(page.content, "BT /F1 {} Tf {:.2} {:.2} Td (", CAPTION_SIZE, x, baseline);
                page.content.extend(encode_text(line));
                page.content.extend_from_slice(b") Tj ET\n");
                baseline -= caption_line;
            }
        }

        self.cursor = top - image_height - caption_height - IMAGE_GAP;
    }
}

/// Scale `(width, height)` to fit the box, keeping aspect ratio
fn fit_box(width: f32, height: f32, max_width: f32, max_height: f32) -> (f32, f32) {
    let scale = (max_width / width).min(max_height / height);
    (width * scale, height * scale)
}

/// Characters per line for Helvetica at `size`, using an average glyph width
fn max_chars(width: f32, size: f32) -> usize {
    ((width / (size * 0.5)).floor() as usize).max(1)
}

/// Greedy word wrap; blank lines are kept and overlong words are split
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }
    lines
}

/// Encode for a literal string in a WinAnsi font.
///
/// Latin-1 characters map directly; anything else becomes `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            '\t' => out.push(b' '),
            ' '..='~' => out.push(c as u8),
            '\u{a0}'..='\u{ff}' => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

// ========== Serialization ==========

/// Object table of a PDF being written; ids start at 1
struct PdfDocument {
    objects: Vec<Option<Vec<u8>>>,
}

impl PdfDocument {
    fn new() -> Self {
        Self { objects: Vec::new() }
    }

    /// Claim an id whose body is filled in later with `set`
    fn reserve(&mut self) -> usize {
        self.objects.push(None);
        self.objects.len()
    }

    fn set(&mut self, id: usize, body: Vec<u8>) {
        self.objects[id - 1] = Some(body);
    }

    fn add(&mut self, body: Vec<u8>) -> usize {
        self.objects.push(Some(body));
        self.objects.len()
    }

    fn add_stream(&mut self, dict: &str, data: &[u8]) -> usize {
        let mut body = Vec::with_capacity(data.len() + dict.len() + 64);
        let _ = write!(body, "<< {} /Length {} >>\nstream\n", dict, data.len());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.add(body)
    }

    fn finish(self, root: usize) -> Result<Vec<u8>> {
        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        let mut offsets = Vec::with_capacity(self.objects.len());
        for (index, body) in self.objects.into_iter().enumerate() {
            let body = body.ok_or_else(|| NoteVaultError::Pdf(format!("object {} was never written", index + 1)))?;
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n", index + 1);
            out.extend_from_slice(&body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len();
        let _ = write!(out, "xref\n0 {}\n", offsets.len() + 1);
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            let _ = write!(out, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            root,
            xref_offset
        );
        Ok(out)
    }
}
