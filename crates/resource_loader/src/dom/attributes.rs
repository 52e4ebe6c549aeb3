//! Attribute names understood by the elements the loader injects.

/// Attributes every HTML element accepts.
const GLOBAL: &[&str] = &[
    "accesskey",
    "autofocus",
    "class",
    "dir",
    "draggable",
    "hidden",
    "id",
    "lang",
    "nonce",
    "part",
    "slot",
    "style",
    "tabindex",
    "title",
    "translate",
];

const SCRIPT: &[&str] = &[
    "async",
    "blocking",
    "charset",
    "crossorigin",
    "defer",
    "fetchpriority",
    "integrity",
    "nomodule",
    "referrerpolicy",
    "src",
    "type",
];

const LINK: &[&str] = &[
    "as",
    "blocking",
    "crossorigin",
    "disabled",
    "fetchpriority",
    "href",
    "hreflang",
    "integrity",
    "media",
    "referrerpolicy",
    "rel",
    "sizes",
    "type",
];

const IMG: &[&str] = &[
    "alt",
    "crossorigin",
    "decoding",
    "fetchpriority",
    "height",
    "ismap",
    "loading",
    "referrerpolicy",
    "sizes",
    "src",
    "srcset",
    "usemap",
    "width",
];

/// Whether an element with `tag` recognizes the attribute `name`.
///
/// Matching is case-insensitive. `data-*` and `aria-*` attributes are accepted
/// everywhere; unknown tags only accept global attributes.
pub fn recognizes_attribute(tag: &str, name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if name.starts_with("data-") || name.starts_with("aria-") {
        return true;
    }
    let specific: &[&str] = match tag.to_ascii_lowercase().as_str() {
        "script" => SCRIPT,
        "link" => LINK,
        "img" => IMG,
        _ => &[],
    };
    GLOBAL.contains(&name.as_str()) || specific.contains(&name.as_str())
}
