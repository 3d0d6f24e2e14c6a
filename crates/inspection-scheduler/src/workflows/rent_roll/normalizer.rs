/// Canonical form of a column header: byte-order marks and zero-width spaces removed,
/// whitespace collapsed, ASCII lowercased.
pub(crate) fn normalize_header(value: &str) -> String {
    display_header(value).to_ascii_lowercase()
}

/// Header text kept for passthrough columns: cleaned but with its original casing.
pub(crate) fn display_header(value: &str) -> String {
    value
        .replace(['\u{feff}', '\u{200b}'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_invisible_characters_and_case() {
        assert_eq!(normalize_header("\u{feff}Lease  From "), "lease from");
        assert_eq!(display_header(" Owner\u{200b} Name"), "Owner Name");
    }
}
