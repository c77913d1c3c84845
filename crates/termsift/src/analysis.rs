//! Text analysis shared by the query parser and the in-memory index.
//!
//! Analysis folds text to ASCII, lowercases it and splits on anything that
//! is not alphanumeric. Query terms and indexed text go through the same
//! function, so `"Paracétamol"` in a query matches `"PARACETAMOL"` in a
//! document.

use deunicode::deunicode;

/// Splits text into normalized tokens.
///
/// ```
/// use termsift::analysis::analyze;
///
/// assert_eq!(analyze("Acetylsalicylic-Acid 500mg"), vec!["acetylsalicylic", "acid", "500mg"]);
/// assert!(analyze(" -- ").is_empty());
/// ```
pub fn analyze(text: &str) -> Vec<String> {
    let folded = deunicode(text);
    folded
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
        .collect()
}

/// Normalizes a single token without splitting it.
///
/// Used for wildcard prefixes and regular expressions, which are matched
/// against already-analyzed tokens and must not be broken apart.
pub fn normalize(token: &str) -> String {
    deunicode(token).to_ascii_lowercase()
}
