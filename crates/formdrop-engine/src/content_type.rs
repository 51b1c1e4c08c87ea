//! Content-type sniffing
//!
//! Detection runs an ordered table of signature predicates over the leading bytes of
//! the stream. The first matching rule wins; nothing matching yields
//! `application/octet-stream`. Filenames and client-declared types are never consulted.

use formdrop_core::constants::{DEFAULT_CONTENT_TYPE, SNIFF_WINDOW};

struct SniffRule {
    mime: &'static str,
    matches: fn(&[u8]) -> bool,
}

const RULES: &[SniffRule] = &[
    SniffRule { mime: "image/png", matches: is_png },
    SniffRule { mime: "image/jpeg", matches: is_jpeg },
    SniffRule { mime: "image/gif", matches: is_gif },
    SniffRule { mime: "image/webp", matches: is_webp },
    SniffRule { mime: "image/avif", matches: is_avif },
    SniffRule { mime: "image/heic", matches: is_heic },
    SniffRule { mime: "video/quicktime", matches: is_quicktime },
    SniffRule { mime: "audio/mp4", matches: is_m4a },
    SniffRule { mime: "video/mp4", matches: is_mp4 },
    SniffRule { mime: "image/tiff", matches: is_tiff },
    SniffRule { mime: "image/x-icon", matches: is_ico },
    SniffRule { mime: "image/bmp", matches: is_bmp },
    SniffRule { mime: "application/pdf", matches: is_pdf },
    SniffRule { mime: "application/zip", matches: is_zip },
    SniffRule { mime: "application/gzip", matches: is_gzip },
    SniffRule { mime: "application/x-7z-compressed", matches: is_7z },
    SniffRule { mime: "video/webm", matches: is_webm },
    SniffRule { mime: "video/x-matroska", matches: is_ebml },
    SniffRule { mime: "audio/wav", matches: is_wav },
    SniffRule { mime: "audio/ogg", matches: is_ogg },
    SniffRule { mime: "audio/x-flac", matches: is_flac },
    SniffRule { mime: "audio/mpeg", matches: is_mp3 },
    SniffRule { mime: "image/svg+xml", matches: is_svg },
    SniffRule { mime: "application/xml", matches: is_xml },
];

/// Detect a MIME type from the leading bytes of a file.
pub fn sniff(data: &[u8]) -> &'static str {
    let window = &data[..data.len().min(SNIFF_WINDOW)];
    RULES
        .iter()
        .find(|rule| (rule.matches)(window))
        .map(|rule| rule.mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

fn is_png(d: &[u8]) -> bool {
    d.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
}

fn is_jpeg(d: &[u8]) -> bool {
    d.starts_with(&[0xFF, 0xD8, 0xFF])
}

fn is_gif(d: &[u8]) -> bool {
    d.starts_with(b"GIF87a") || d.starts_with(b"GIF89a")
}

fn riff_form(d: &[u8]) -> Option<&[u8]> {
    if d.len() >= 12 && d.starts_with(b"RIFF") {
        Some(&d[8..12])
    } else {
        None
    }
}

fn is_webp(d: &[u8]) -> bool {
    riff_form(d) == Some(b"WEBP")
}

fn is_wav(d: &[u8]) -> bool {
    riff_form(d) == Some(b"WAVE")
}

// ISO base media: `ftyp` box at offset 4, major brand at 8..12
fn ftyp_brand(d: &[u8]) -> Option<&[u8]> {
    if d.len() >= 12 && &d[4..8] == b"ftyp" {
        Some(&d[8..12])
    } else {
        None
    }
}

fn is_avif(d: &[u8]) -> bool {
    matches!(ftyp_brand(d), Some(b"avif") | Some(b"avis"))
}

fn is_heic(d: &[u8]) -> bool {
    matches!(
        ftyp_brand(d),
        Some(b"heic") | Some(b"heix") | Some(b"hevc") | Some(b"hevx") | Some(b"mif1")
    )
}

fn is_quicktime(d: &[u8]) -> bool {
    ftyp_brand(d) == Some(b"qt  ")
}

fn is_m4a(d: &[u8]) -> bool {
    matches!(ftyp_brand(d), Some(b"M4A ") | Some(b"M4B "))
}

fn is_mp4(d: &[u8]) -> bool {
    ftyp_brand(d).is_some()
}

fn is_tiff(d: &[u8]) -> bool {
    d.starts_with(&[b'I', b'I', 0x2A, 0x00]) || d.starts_with(&[b'M', b'M', 0x00, 0x2A])
}

fn is_ico(d: &[u8]) -> bool {
    d.len() >= 6 && d.starts_with(&[0x00, 0x00, 0x01, 0x00]) && d[4] != 0
}

fn is_bmp(d: &[u8]) -> bool {
    // "BM" plus the reserved header words, which are zero in practice
    d.len() >= 14 && d.starts_with(b"BM") && d[6..10] == [0, 0, 0, 0]
}

fn is_pdf(d: &[u8]) -> bool {
    d.starts_with(b"%PDF-")
}

fn is_zip(d: &[u8]) -> bool {
    d.starts_with(&[b'P', b'K', 0x03, 0x04])
}

fn is_gzip(d: &[u8]) -> bool {
    d.starts_with(&[0x1F, 0x8B, 0x08])
}

fn is_7z(d: &[u8]) -> bool {
    d.starts_with(&[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C])
}

fn is_ebml(d: &[u8]) -> bool {
    d.starts_with(&[0x1A, 0x45, 0xDF, 0xA3])
}

fn is_webm(d: &[u8]) -> bool {
    is_ebml(d) && contains(&d[..d.len().min(64)], b"webm")
}

fn is_ogg(d: &[u8]) -> bool {
    d.starts_with(b"OggS")
}

fn is_flac(d: &[u8]) -> bool {
    d.starts_with(b"fLaC")
}

fn is_mp3(d: &[u8]) -> bool {
    d.starts_with(b"ID3")
        || (d.len() >= 2 && d[0] == 0xFF && matches!(d[1], 0xFB | 0xF3 | 0xF2))
}

fn is_svg(d: &[u8]) -> bool {
    matches!(markup_root(d), Some(root) if root_is(root, b"svg"))
}

/// XML that is not SVG: a declaration followed by any root element.
fn is_xml(d: &[u8]) -> bool {
    let text = skip_prefix_noise(d);
    text.starts_with(b"<?xml") && markup_root(d).is_some()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn skip_prefix_noise(d: &[u8]) -> &[u8] {
    let d = d.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(d);
    trim_start(d)
}

fn trim_start(d: &[u8]) -> &[u8] {
    let start = d
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(d.len());
    &d[start..]
}

/// Skip the prolog (declaration, processing instructions, comments, doctype) and
/// return the text starting at the root element's `<`.
fn markup_root(d: &[u8]) -> Option<&[u8]> {
    let mut rest = skip_prefix_noise(d);
    loop {
        if rest.starts_with(b"<?") {
            rest = after(rest, b"?>")?;
        } else if rest.starts_with(b"<!--") {
            rest = after(rest, b"-->")?;
        } else if starts_with_ignore_case(rest, b"<!doctype") {
            rest = after_doctype(rest)?;
        } else if rest.starts_with(b"<") && rest.get(1).is_some_and(|b| b.is_ascii_alphabetic()) {
            return Some(rest);
        } else {
            return None;
        }
        rest = trim_start(rest);
    }
}

fn after<'a>(d: &'a [u8], terminator: &[u8]) -> Option<&'a [u8]> {
    let pos = d.windows(terminator.len()).position(|w| w == terminator)?;
    Some(&d[pos + terminator.len()..])
}

// A doctype may carry an internal subset in brackets containing '>'
fn after_doctype(d: &[u8]) -> Option<&[u8]> {
    let mut depth = 0usize;
    for (i, b) in d.iter().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b'>' if depth == 0 => return Some(&d[i + 1..]),
            _ => {}
        }
    }
    None
}

fn starts_with_ignore_case(d: &[u8], prefix: &[u8]) -> bool {
    d.len() >= prefix.len() && d[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn root_is(root: &[u8], name: &[u8]) -> bool {
    let tag = &root[1..];
    tag.starts_with(name)
        && tag
            .get(name.len())
            .is_some_and(|b| b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
}
