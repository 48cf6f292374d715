//! Hand-assembled documents for unit tests.

use super::filters::deflate;

fn push_obj(out: &mut Vec<u8>, offsets: &mut Vec<usize>, body: &str) {
    offsets.push(out.len());
    out.extend_from_slice(body.as_bytes());
}

/// One page, classic cross-reference table.
pub fn minimal_pdf() -> Vec<u8> {
    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    push_obj(&mut out, &mut offsets, "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    push_obj(&mut out, &mut offsets, "2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");
    push_obj(
        &mut out,
        &mut offsets,
        "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n",
    );
    let xref = out.len();
    out.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
    for off in &offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n").as_bytes(),
    );
    out
}

/// Same page tree with the Pages node inside an object stream and a
/// compressed cross-reference stream.
pub fn xref_stream_pdf() -> Vec<u8> {
    let mut out = b"%PDF-1.5\n".to_vec();
    let mut offsets = Vec::new();
    push_obj(&mut out, &mut offsets, "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    push_obj(
        &mut out,
        &mut offsets,
        "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n",
    );
    let header = "2 0 ";
    let body = "<< /Type /Pages /Kids [3 0 R] /Count 1 >>";
    let objstm = format!(
        "4 0 obj\n<< /Type /ObjStm /N 1 /First {} /Length {} >>\nstream\n{header}{body}\nendstream\nendobj\n",
        header.len(),
        header.len() + body.len()
    );
    push_obj(&mut out, &mut offsets, &objstm);

    let xref_offset = out.len();
    let (off1, off3, off4) = (offsets[0], offsets[1], offsets[2]);
    let mut rows = Vec::new();
    let mut row = |kind: u8, f2: u32, f3: u16| {
        rows.push(kind);
        rows.extend_from_slice(&f2.to_be_bytes());
        rows.extend_from_slice(&f3.to_be_bytes());
    };
    row(0, 0, 65535);
    row(1, off1 as u32, 0);
    row(2, 4, 0);
    row(1, off3 as u32, 0);
    row(1, off4 as u32, 0);
    row(1, xref_offset as u32, 0);
    let compressed = deflate(&rows);

    out.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 4 2] /Root 1 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
            compressed.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&compressed);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
    out
}
