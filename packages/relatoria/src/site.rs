//! Target-site constants and URL rules for the Constitutional Court archive.

/// Public site root.
pub const BASE_URL: &str = "https://www.corteconstitucional.gov.co";

/// Path of the client-rendered search application.
pub const SEARCH_PATH: &str = "/relatoria/buscador-jurisprudencia/texto";

/// Path of the JSON search endpoint used by the search application.
pub const JSON_SEARCH_PATH: &str = "/relatoria/buscador_new/";

/// Referer sent with XHR-style probes.
pub const SEARCH_REFERER_PATH: &str = "/relatoria/buscador-jurisprudencia";

/// Path segment every archived ruling lives under.
pub const ARCHIVE_MARKER: &str = "relatoria";

/// Guessed structured-data endpoints, probed after the known JSON search.
pub const API_PATHS: &[&str] = &[
    "/api/relatoria/buscar",
    "/relatoria/api/buscar",
    "/services/buscar",
    "/api/jurisprudencia",
    "/relatoria/api/jurisprudencia",
];

/// Resolve an href found in page content against the site root.
///
/// Absolute URLs pass through, protocol-relative URLs get `https:`,
/// everything else is joined onto `base`.
pub fn normalize_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }

    let base = base.trim_end_matches('/');
    match url::Url::parse(&format!("{base}/")).and_then(|b| b.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) if href.starts_with('/') => format!("{base}{href}"),
        Err(_) => format!("{base}/{href}"),
    }
}

/// Apply the archive's suffix-substitution rule: same path, `.pdf` extension.
///
/// `.htm` and `.html` are replaced; a URL without either gets `.pdf` appended
/// to its path.
pub fn pdf_from_html(html_url: &str) -> String {
    let (path, tail) = match html_url.find(['?', '#']) {
        Some(idx) => html_url.split_at(idx),
        None => (html_url, ""),
    };

    let lower = path.to_ascii_lowercase();
    let stem = if lower.ends_with(".html") {
        &path[..path.len() - 5]
    } else if lower.ends_with(".htm") {
        &path[..path.len() - 4]
    } else {
        path
    };
    format!("{stem}.pdf{tail}")
}

/// Whether an href points at a PDF rendition.
pub fn is_pdf_link(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.to_ascii_lowercase().ends_with(".pdf")
}

/// Expand a two-digit ruling year. The court started publishing in 1992.
pub fn full_year(two_digit: u32) -> u32 {
    if two_digit >= 92 {
        1900 + two_digit
    } else {
        2000 + two_digit
    }
}
