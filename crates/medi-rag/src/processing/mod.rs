pub mod cleaner;

pub use cleaner::{
    clean_text, extract_summary, normalize_whitespace, remove_citations, strip_html,
    truncate_chars,
};
