// Progress line parser for yt-dlp output
//
// yt-dlp prints lines such as:
//   [download]  42.5% of   10.00MiB at  1.20MiB/s ETA 00:07
//   [download] Downloading item 3 of 12
// Percent lines become `Percent`, playlist position lines become
// `PlaylistIndex`, everything else stays a `RawLine`.

use regex::Regex;

use super::models::ProgressEvent;

lazy_static::lazy_static! {
    static ref PERCENT_RE: Regex = Regex::new(r"(\d{1,3}\.\d)%").unwrap();
    static ref ITEM_RE: Regex =
        Regex::new(r"(?i)downloading\s+(?:item|video)\s+(\d+)\s+of\s+(\d+)").unwrap();
}

/// Parse one output line. Never fails; no match is simply a `RawLine`.
pub fn parse_line(line: &str) -> ProgressEvent {
    if let Some(caps) = PERCENT_RE.captures(line) {
        if let Ok(value) = caps[1].parse::<f32>() {
            return ProgressEvent::Percent {
                value: value.clamp(0.0, 100.0),
            };
        }
    }

    if let Some(caps) = ITEM_RE.captures(line) {
        if let (Ok(current), Ok(total)) = (caps[1].parse::<usize>(), caps[2].parse::<usize>()) {
            if current >= 1 {
                return ProgressEvent::PlaylistIndex { current, total };
            }
        }
    }

    ProgressEvent::RawLine {
        text: line.to_string(),
    }
}

/// Events to push for one output line: the structured event when there is
/// one, always followed by the raw line for display.
pub fn events_for_line(line: &str) -> Vec<ProgressEvent> {
    let raw = ProgressEvent::RawLine {
        text: line.to_string(),
    };
    match parse_line(line) {
        ProgressEvent::RawLine { .. } => vec![raw],
        parsed => vec![parsed, raw],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_download_percent() {
        assert_eq!(
            parse_line("[download]  42.5% of 10.00MiB"),
            ProgressEvent::Percent { value: 42.5 }
        );
    }

    #[test]
    fn parses_full_percent_line() {
        assert_eq!(
            parse_line("[download] 100.0% of ~ 343.72MiB at 420.30KiB/s ETA 00:00 (frag 454/454)"),
            ProgressEvent::Percent { value: 100.0 }
        );
    }

    #[test]
    fn parses_playlist_position() {
        assert_eq!(
            parse_line("Downloading video 3 of 12"),
            ProgressEvent::PlaylistIndex { current: 3, total: 12 }
        );
        assert_eq!(
            parse_line("[download] Downloading item 7 of 9"),
            ProgressEvent::PlaylistIndex { current: 7, total: 9 }
        );
    }

    #[test]
    fn integer_percent_is_not_a_match() {
        assert!(matches!(parse_line("Got 42% done"), ProgressEvent::RawLine { .. }));
    }

    #[test]
    fn unrelated_text_is_raw() {
        let line = "[youtube] dQw4w9WgXcQ: Downloading webpage";
        assert_eq!(
            parse_line(line),
            ProgressEvent::RawLine {
                text: line.to_string()
            }
        );
        assert!(matches!(parse_line(""), ProgressEvent::RawLine { .. }));
    }

    #[test]
    fn item_zero_is_not_an_index() {
        assert!(matches!(
            parse_line("Downloading item 0 of 3"),
            ProgressEvent::RawLine { .. }
        ));
    }

    #[test]
    fn structured_event_comes_before_raw_line() {
        let events = events_for_line("[download]   6.2% of ~ 343.72MiB");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ProgressEvent::Percent { value: 6.2 });
        assert!(matches!(events[1], ProgressEvent::RawLine { .. }));

        assert_eq!(events_for_line("[Merger] Merging formats").len(), 1);
    }
}
