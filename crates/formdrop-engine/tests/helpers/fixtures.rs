//! Test fixtures: small PNG/SVG/PDF blobs.

/// A 68-byte 1x1 PNG (signature, IHDR, an 11-byte IDAT, IEND).
pub fn create_png_68() -> Vec<u8> {
    let mut png = Vec::with_capacity(68);
    png.extend_from_slice(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);

    png.extend_from_slice(&13u32.to_be_bytes());
    png.extend_from_slice(b"IHDR");
    png.extend_from_slice(&1u32.to_be_bytes());
    png.extend_from_slice(&1u32.to_be_bytes());
    png.extend_from_slice(&[8, 2, 0, 0, 0]);
    png.extend_from_slice(&[0x90, 0x77, 0x53, 0xDE]);

    let idat = [0x08, 0xD7, 0x63, 0xF8, 0xFF, 0xFF, 0x3F, 0x00, 0x05, 0xFE, 0x02];
    png.extend_from_slice(&(idat.len() as u32).to_be_bytes());
    png.extend_from_slice(b"IDAT");
    png.extend_from_slice(&idat);
    png.extend_from_slice(&[0x0D, 0xEF, 0x46, 0xB8]);

    png.extend_from_slice(&0u32.to_be_bytes());
    png.extend_from_slice(b"IEND");
    png.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
    png
}

/// A 100-byte SVG document.
pub fn create_svg_100() -> Vec<u8> {
    b"<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"16\" height=\"16\"><rect width=\"16\" height=\"16\"/></svg>\n"
        .to_vec()
}

/// Minimal PDF header followed by filler.
pub fn create_test_pdf() -> Vec<u8> {
    let mut pdf = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n");
    pdf
}

/// `len` bytes of deterministic, non-signature data.
pub fn create_filler(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'a' + (i % 26) as u8).collect()
}

#[test]
fn fixtures_have_expected_sizes() {
    assert_eq!(create_png_68().len(), 68);
    assert_eq!(create_svg_100().len(), 100);
}
