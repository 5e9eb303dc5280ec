//! `hyprland-share-picker` wire contract: the `XDPH_WINDOW_SHARING_LIST`
//! environment variable format and the three reply-line shapes it prints
//! to stdout. Ported from `examples/original_source/hyprland-share-picker/main.cpp`.
//!
//! This daemon never spawns a GUI itself (out of scope); what's kept here
//! is the parsing contract so a configured `chooser_cmd` that happens to be
//! `hyprland-share-picker` is handled like any other external chooser.

/// One entry a compositor can offer the picker through `XDPH_WINDOW_SHARING_LIST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEntry {
    pub id: u64,
    pub class: String,
    pub title: String,
}

/// Encode the env var's `id[HC>]class[HT>]title[HE>]` repeating record format.
pub fn encode_window_list(entries: &[WindowEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.id.to_string());
        out.push_str("[HC>]");
        out.push_str(&entry.class);
        out.push_str("[HT>]");
        out.push_str(&entry.title);
        out.push_str("[HE>]");
    }
    out
}

/// Parse `XDPH_WINDOW_SHARING_LIST`. Malformed records (missing a
/// separator, or an `id` that doesn't parse as `u64`) are skipped rather
/// than aborting the whole list, matching the original's `try`/silent-`catch`.
pub fn parse_window_list(value: &str) -> Vec<WindowEntry> {
    let mut entries = Vec::new();
    let mut rest = value;
    while !rest.is_empty() {
        let Some(id_sep) = rest.find("[HC>]") else { break };
        let id_str = &rest[..id_sep];
        let after_id = &rest[id_sep + 5..];

        let Some(class_sep) = after_id.find("[HT>]") else { break };
        let class = &after_id[..class_sep];
        let after_class = &after_id[class_sep + 5..];

        let Some(title_sep) = after_class.find("[HE>]") else { break };
        let title = &after_class[..title_sep];

        if let Ok(id) = id_str.parse::<u64>() {
            entries.push(WindowEntry {
                id,
                class: class.to_string(),
                title: title.to_string(),
            });
        }

        rest = &after_class[title_sep + 5..];
    }
    entries
}

/// What the picker chose, decoded from the line it printed on stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerReply {
    Screen(String),
    Window(u64),
    Region { output: String, x: i32, y: i32, width: i32, height: i32 },
    Cancelled,
}

pub fn parse_reply(line: &str) -> Option<PickerReply> {
    let line = line.trim();
    if let Some(name) = line.strip_prefix("screen:") {
        return Some(PickerReply::Screen(name.to_string()));
    }
    if let Some(id) = line.strip_prefix("window:") {
        return id.parse().ok().map(PickerReply::Window);
    }
    if let Some(rest) = line.strip_prefix("region:") {
        let (output, coords) = rest.split_once('@')?;
        let mut parts = coords.split(',');
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let width = parts.next()?.parse().ok()?;
        let height = parts.next()?.parse().ok()?;
        return Some(PickerReply::Region { output: output.to_string(), x, y, width, height });
    }
    if line.starts_with("error") {
        return Some(PickerReply::Cancelled);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_window_list() {
        let entries = vec![
            WindowEntry { id: 1, class: "firefox".into(), title: "Example".into() },
            WindowEntry { id: 2, class: "kitty".into(), title: "shell".into() },
        ];
        let encoded = encode_window_list(&entries);
        assert_eq!(parse_window_list(&encoded), entries);
    }

    #[test]
    fn skips_entries_with_unparsable_id() {
        let raw = "not-a-number[HC>]firefox[HT>]Example[HE>]2[HC>]kitty[HT>]shell[HE>]";
        let parsed = parse_window_list(raw);
        assert_eq!(parsed, vec![WindowEntry { id: 2, class: "kitty".into(), title: "shell".into() }]);
    }

    #[test]
    fn parses_screen_reply() {
        assert_eq!(parse_reply("screen:DP-1\n"), Some(PickerReply::Screen("DP-1".into())));
    }

    #[test]
    fn parses_window_reply() {
        assert_eq!(parse_reply("window:42"), Some(PickerReply::Window(42)));
    }

    #[test]
    fn parses_region_reply() {
        assert_eq!(
            parse_reply("region:DP-1@10,20,640,480"),
            Some(PickerReply::Region { output: "DP-1".into(), x: 10, y: 20, width: 640, height: 480 })
        );
    }

    #[test]
    fn error_lines_mean_cancelled() {
        assert_eq!(parse_reply("error1"), Some(PickerReply::Cancelled));
        assert_eq!(parse_reply("error4"), Some(PickerReply::Cancelled));
    }
}
