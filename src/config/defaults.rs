//! Default values for configuration

use super::FetchStrategy;

/// Skip this many characters when no reasoning header is found.
///
/// Decisions usually open with the report and the proven facts, so the legal
/// reasoning tends to start after the first few thousand characters. This is an
/// approximation of typical layout, not a boundary guarantee.
pub fn default_reasoning_fallback_offset() -> usize {
    3000
}

/// Minimum distance between the reasoning start and a decision header
pub fn default_decision_min_offset() -> usize {
    500
}

/// Isolate the reasoning excerpt by default
pub fn default_isolate_reasoning() -> bool {
    true
}

/// Lines inspected after the reporting judge's signature
pub fn default_cosigner_window() -> usize {
    8
}

pub fn default_cosigner_min_len() -> usize {
    4
}

pub fn default_cosigner_max_len() -> usize {
    80
}

/// Markers of lines that follow a signature but are not judge names
pub fn default_noise_markers() -> Vec<String> {
    [
        "nota",
        "voto",
        "página",
        "pagina",
        "assinad",
        "processado",
        "http",
        "www.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Section headers opening the legal reasoning, in priority order
pub fn default_reasoning_headers() -> Vec<String> {
    [
        r"(?im)^[ \t]*(?:[IVX]+[ \t]*[-–.)][ \t]*)?Fundamenta[çc][ãa]o[ \t]+de[ \t]+Direito",
        r"(?im)^[ \t]*(?:[IVX]+[ \t]*[-–.)][ \t]*)?Aprecia[çc][ãa]o",
        r"(?im)^[ \t]*(?:[IVX]+[ \t]*[-–.)][ \t]*)?O[ \t]+Direito",
        r"(?im)^[ \t]*Cumpre[ \t]+apreciar",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Section headers opening the dispositive part of a decision
pub fn default_decision_headers() -> Vec<String> {
    [r"(?im)^[ \t]*(?:[IVX]+[ \t]*[-–.)][ \t]*)?(?:Decis[ãa]o|Dispositivo|Pelo[ \t]+exposto)\b"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Prefer the directory backend when one is configured
pub fn default_prefer_virtual() -> bool {
    false
}

/// URL prefixes of the jurisprudence portal
pub fn default_portal_prefixes() -> Vec<String> {
    [
        "http://www.dgsi.pt/",
        "https://www.dgsi.pt/",
        "http://dgsi.pt/",
        "https://dgsi.pt/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Keywords that mark pasted text as a court decision
pub fn default_marker_keywords() -> Vec<String> {
    [
        "Acórdão",
        "Acordão",
        "Relator",
        "Processo",
        "Descritores",
        "Sumário",
        "ECLI",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Minimum pasted length considered a document
pub fn default_min_content_chars() -> usize {
    200
}

/// Minimum fetched length considered a real page
pub fn default_min_fetch_chars() -> usize {
    500
}

/// Per-attempt fetch timeout
pub fn default_fetch_timeout() -> u64 {
    15
}

/// Delay between items in batch mode
pub fn default_batch_delay_ms() -> u64 {
    2000
}

/// User agent string
pub fn default_user_agent() -> String {
    format!(
        "jurisprudencia/{} (+https://github.com/sealad886/jurisprudencia)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Direct fetch first, then public intermediaries
pub fn default_fetch_strategies() -> Vec<FetchStrategy> {
    vec![
        FetchStrategy {
            name: "direct".to_string(),
            template: "{url}".to_string(),
        },
        FetchStrategy {
            name: "allorigins".to_string(),
            template: "https://api.allorigins.win/raw?url={url_encoded}".to_string(),
        },
        FetchStrategy {
            name: "corsproxy".to_string(),
            template: "https://corsproxy.io/?{url_encoded}".to_string(),
        },
    ]
}
