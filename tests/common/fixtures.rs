//! Documents and configuration files for integration tests.

use remote_pdf_signer::SigningConfiguration;
use std::fs;
use std::path::{Path, PathBuf};

/// Single-revision document with `pages` empty pages and an info dictionary.
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    let mut object = |out: &mut Vec<u8>, body: String| {
        offsets.push(out.len());
        out.extend_from_slice(body.as_bytes());
    };

    let first_page = 4;
    let kids: Vec<String> = (0..pages)
        .map(|i| format!("{} 0 R", first_page + i))
        .collect();
    object(&mut out, "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".into());
    object(
        &mut out,
        format!(
            "2 0 obj\n<< /Type /Pages /Kids [{}] /Count {pages} >>\nendobj\n",
            kids.join(" ")
        ),
    );
    object(
        &mut out,
        "3 0 obj\n<< /Producer (fixture) /Title (Contract \\(draft\\)) >>\nendobj\n".into(),
    );
    for i in 0..pages {
        object(
            &mut out,
            format!(
                "{} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] >>\nendobj\n",
                first_page + i
            ),
        );
    }

    let size = offsets.len() + 1;
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {size} /Root 1 0 R /Info 3 0 R >>\nstartxref\n{xref}\n%%EOF\n"
        )
        .as_bytes(),
    );
    out
}

/// Write `data` to `dir/name`.
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).expect("write fixture");
    path
}

/// Configuration pointing at files that do not need to exist for
/// transport-free tests.
pub fn offline_config() -> SigningConfiguration {
    let mut config = SigningConfiguration::template();
    config.customer = "ACME".to_string();
    config.key_static = "static-key".to_string();
    config.key_on_demand = "ondemand-key".to_string();
    config
}

/// Byte ranges outside the `/Contents` gap of a signed file.
pub fn outside_gap(data: &[u8], range: [usize; 4]) -> Vec<u8> {
    let mut out = data[range[0]..range[0] + range[1]].to_vec();
    out.extend_from_slice(&data[range[2]..range[2] + range[3]]);
    out
}
