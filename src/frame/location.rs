/// Label returned for any location code missing from [`LOCATION_TABLE`].
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Closed mapping of single-byte location codes to human labels.
///
/// Devices report the code; everything downstream of the decoder only ever
/// sees the label. Adding a site means adding a row here.
pub const LOCATION_TABLE: [(u8, &str); 4] = [
    (b'A', "Qwave"),
    (b'B', "Greenhouse"),
    (b'C', "Warehouse"),
    (b'D', "Office"),
];

/// Resolve a location code to its label. Total: unknown codes map to
/// [`UNKNOWN_LOCATION`].
pub fn resolve_location(code: u8) -> &'static str {
    LOCATION_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN_LOCATION)
}

/// Reverse lookup, used by simulators and tests that start from a label.
pub fn location_code(label: &str) -> Option<u8> {
    LOCATION_TABLE
        .iter()
        .find(|(_, l)| *l == label)
        .map(|(c, _)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve_to_labels() {
        assert_eq!(resolve_location(b'A'), "Qwave");
        assert_eq!(resolve_location(b'B'), "Greenhouse");
        assert_eq!(resolve_location(b'C'), "Warehouse");
        assert_eq!(resolve_location(b'D'), "Office");
    }

    #[test]
    fn unknown_codes_resolve_to_sentinel() {
        assert_eq!(resolve_location(b'Z'), UNKNOWN_LOCATION);
        assert_eq!(resolve_location(b'a'), UNKNOWN_LOCATION);
        assert_eq!(resolve_location(0x00), UNKNOWN_LOCATION);
    }

    #[test]
    fn table_codes_are_unique() {
        for (i, (code, _)) in LOCATION_TABLE.iter().enumerate() {
            assert!(
                LOCATION_TABLE[i + 1..].iter().all(|(c, _)| c != code),
                "duplicate location code {:?}",
                *code as char
            );
        }
    }

    #[test]
    fn reverse_lookup() {
        assert_eq!(location_code("Qwave"), Some(b'A'));
        assert_eq!(location_code(UNKNOWN_LOCATION), None);
    }
}
