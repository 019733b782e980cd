use std::path::Path;

use tokio::fs;
use tracing::debug;

/// Text of a single PDF page. `number` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub text: String,
}

/// Extracts the text of every page that has any.
pub fn extract_pages(bytes: &[u8]) -> anyhow::Result<Vec<Page>> {
    let texts = pdf_extract::extract_text_from_mem_by_pages(bytes)?;
    let pages: Vec<Page> = texts
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(number, text)| Page { number, text })
        .collect();
    Ok(pages)
}

/// Reads a PDF from disk and extracts its pages on the blocking pool.
pub async fn parse_pdf(file_path: &Path) -> anyhow::Result<Vec<Page>> {
    let bytes = fs::read(file_path).await?;
    debug!(path = %file_path.display(), size = bytes.len(), "Extracting text from PDF");
    let pages = tokio::task::spawn_blocking(move || extract_pages(&bytes)).await??;
    debug!(path = %file_path.display(), pages = pages.len(), "Extracted text from PDF");
    Ok(pages)
}

/// Builds a small PDF with one line of Helvetica text per page.
#[cfg(test)]
pub(crate) fn test_pdf(pages: &[&str]) -> Vec<u8> {
    let font_id = 3 + 2 * pages.len();
    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages.len())
                .map(|i| format!("{} 0 R", 3 + 2 * i))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
    ];
    for (i, text) in pages.iter().enumerate() {
        let content = format!("BT /F1 18 Tf 72 720 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R \
             /Resources << /Font << /F1 {} 0 R >> >> >>",
            4 + 2 * i,
            font_id
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = vec![];
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, object));
    }
    let xref_offset = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    out.into_bytes()
}
