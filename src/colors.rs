//! Provider color names to the service's 6-digit hex representation.
//!
//! Unknown names never fail a run; they map to `""` (no color).

/// Todoist palette, indexed by the legacy numeric color id minus 30.
const TODOIST_COLORS: &[(&str, &str)] = &[
    ("berry_red", "b8256f"),
    ("red", "db4035"),
    ("orange", "ff9933"),
    ("yellow", "fad000"),
    ("olive_green", "afb83b"),
    ("lime_green", "7ecc49"),
    ("green", "299438"),
    ("mint_green", "6accbc"),
    ("teal", "158fad"),
    ("sky_blue", "14aaf5"),
    ("light_blue", "96c3eb"),
    ("blue", "4073ff"),
    ("grape", "884dff"),
    ("violet", "af38eb"),
    ("lavender", "eb96eb"),
    ("magenta", "e05194"),
    ("salmon", "ff8d85"),
    ("charcoal", "808080"),
    ("grey", "b8b8b8"),
    ("taupe", "ccac93"),
];

const TODOIST_LEGACY_BASE: usize = 30;

const TRELLO_COLORS: &[(&str, &str)] = &[
    ("green", "61bd4f"),
    ("yellow", "f2d600"),
    ("orange", "ff9f1a"),
    ("red", "eb5a46"),
    ("purple", "c377e0"),
    ("blue", "0079bf"),
    ("sky", "00c2e0"),
    ("lime", "51e898"),
    ("pink", "ff78cb"),
    ("black", "344563"),
    ("green_dark", "216e4e"),
    ("yellow_dark", "7f5f01"),
    ("orange_dark", "a54800"),
    ("red_dark", "ae2e24"),
    ("purple_dark", "5e4db2"),
    ("blue_dark", "0055cc"),
    ("sky_dark", "206a83"),
    ("lime_dark", "4c6b1f"),
    ("pink_dark", "943d73"),
    ("black_dark", "626f86"),
    ("green_light", "baf3db"),
    ("yellow_light", "f8e6a0"),
    ("orange_light", "fedec8"),
    ("red_light", "ffd5d2"),
    ("purple_light", "dfd8fd"),
    ("blue_light", "cce0ff"),
    ("sky_light", "c6edfb"),
    ("lime_light", "d3f1a7"),
    ("pink_light", "fdd0ec"),
    ("black_light", "dcdfe4"),
];

fn lookup(table: &[(&str, &'static str)], name: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, hex)| *hex)
}

/// Map a Todoist color (name like `"berry_red"` or legacy id like `"30"`).
pub fn todoist_color(name: &str) -> &'static str {
    let name = name.trim();
    if let Ok(legacy) = name.parse::<usize>() {
        return legacy
            .checked_sub(TODOIST_LEGACY_BASE)
            .and_then(|idx| TODOIST_COLORS.get(idx))
            .map(|(_, hex)| *hex)
            .unwrap_or("");
    }
    lookup(TODOIST_COLORS, name).unwrap_or("")
}

/// Map a Trello label color name, including the `_dark`/`_light` variants.
pub fn trello_color(name: &str) -> &'static str {
    lookup(TRELLO_COLORS, name.trim()).unwrap_or("")
}

/// Normalize a provider hex string (`"#0079BF"`) to 6 lowercase digits, or `""`.
pub fn normalize_hex(value: &str) -> String {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        hex.to_ascii_lowercase()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn todoist_names_and_legacy_ids() {
        assert_eq!(todoist_color("berry_red"), "b8256f");
        assert_eq!(todoist_color("30"), "b8256f");
        assert_eq!(todoist_color("49"), "ccac93");
        assert_eq!(todoist_color("Charcoal"), "808080");
    }

    #[test]
    fn unknown_colors_fall_back_to_empty() {
        assert_eq!(todoist_color("chartreuse"), "");
        assert_eq!(todoist_color("12"), "");
        assert_eq!(todoist_color("50"), "");
        assert_eq!(trello_color(""), "");
        assert_eq!(trello_color("mauve"), "");
    }

    #[test]
    fn trello_variants() {
        assert_eq!(trello_color("green"), "61bd4f");
        assert_eq!(trello_color("green_dark"), "216e4e");
        assert_eq!(trello_color("sky_light"), "c6edfb");
    }

    #[test]
    fn normalize_hex_strips_hash_and_validates() {
        assert_eq!(normalize_hex("#0079BF"), "0079bf");
        assert_eq!(normalize_hex("abcdef"), "abcdef");
        assert_eq!(normalize_hex("#fff"), "");
        assert_eq!(normalize_hex("zzzzzz"), "");
    }
}
