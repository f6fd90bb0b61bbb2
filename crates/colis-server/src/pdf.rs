//! Minimal built-in PDF renderer for shipment notes.
//!
//! Produces a single A4 page of Helvetica text: parcel details, destination
//! address and signature lines.  The writer emits plain PDF 1.4 objects by
//! hand; the document is text-only, so no external PDF library is needed.

use chrono::{DateTime, Utc};

use colis_core::bordereau::{BordereauData, DocumentRenderer, RenderError};

pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn render(&self, data: &BordereauData) -> Result<Vec<u8>, RenderError> {
        Ok(build_pdf(
            "BORDEREAU D'EXPEDITION",
            &note_lines(data),
        ))
    }
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(d) => d.format("%d/%m/%Y %H:%M").to_string(),
        None => "Non disponible".to_string(),
    }
}

/// Body lines of the note, top to bottom.  Empty strings render as blank
/// lines.
fn note_lines(data: &BordereauData) -> Vec<String> {
    let parcel = &data.parcel;

    let mut lines = vec![
        "Details du colis".to_string(),
        String::new(),
        format!("N de suivi : {}", parcel.tracking_number),
        format!("Description : {}", parcel.description),
        format!("Poids : {} kg", parcel.weight),
        format!("Date d'envoi : {}", format_date(Some(parcel.sent_at))),
        format!("Date de livraison : {}", format_date(parcel.delivered_at)),
        format!("Statut : {}", parcel.status.as_str()),
        format!(
            "Date de generation : {}",
            format_date(Some(data.note.generated_at))
        ),
        String::new(),
        "Adresse de livraison".to_string(),
        String::new(),
    ];

    match &data.address {
        Some(address) => {
            lines.push(format!("Rue : {}", address.rue));
            lines.push(format!("Ville / Pays : {} / {}", address.ville, address.pays));
            lines.push(format!("Code postal : {}", address.code_postal));
        }
        None => lines.push("Adresse non disponible".to_string()),
    }

    lines.extend([
        String::new(),
        "Commentaires : ............................................................".to_string(),
        "Dispositions a prendre : ...................................................".to_string(),
        String::new(),
        "Commande complete : ______   Recue par : ____________   Date : ____________".to_string(),
        String::new(),
        "Merci d'avoir utilise notre service de livraison !".to_string(),
    ]);

    lines
}

/// Escape a string for inclusion in a PDF literal string.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            _ => out.push(c),
        }
    }
    out
}

/// Assemble a one-page PDF: title at 16pt, body lines at 11pt with 16pt
/// leading, A4 media box.
fn build_pdf(title: &str, lines: &[String]) -> Vec<u8> {
    let mut content = String::new();
    content.push_str("BT\n/F1 16 Tf\n50 780 Td\n");
    content.push_str(&format!("({}) Tj\n", escape(title)));
    content.push_str("ET\n");

    content.push_str("BT\n/F1 11 Tf\n16 TL\n50 744 Td\n");
    for line in lines {
        content.push_str(&format!("({}) Tj\nT*\n", escape(line)));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );

    pdf
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use colis_store::{Parcel, ParcelStatus, ShipmentNote};

    fn sample_data() -> BordereauData {
        BordereauData {
            parcel: Parcel {
                id: 1,
                tracking_number: "tn-pdf-1".to_string(),
                description: "Laptop (2 parts)".to_string(),
                weight: 2.5,
                status: ParcelStatus::Pending,
                sent_at: Utc::now(),
                delivered_at: None,
                deleted: false,
                address_id: None,
                agent_id: None,
                owner_id: None,
            },
            address: None,
            note: ShipmentNote {
                id: 1,
                parcel_id: 1,
                generated_at: Utc::now(),
            },
        }
    }

    #[test]
    fn renders_well_formed_pdf() {
        let bytes = PdfRenderer.render(&sample_data()).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("tn-pdf-1"));
        // Parentheses in the description are escaped inside literal strings.
        assert!(text.contains("Laptop \\(2 parts\\)"));
        assert!(text.contains("startxref"));
    }

    #[test]
    fn escape_handles_specials() {
        assert_eq!(escape(r"a\b(c)"), r"a\\b\(c\)");
    }
}
