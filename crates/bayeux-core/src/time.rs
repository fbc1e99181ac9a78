//! Timestamp formatting for response messages

use chrono::Utc;

/// Current time as `yyyy-MM-ddTHH:mm:ss` in GMT, the format stamped
/// onto every generated response.
pub fn current_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_shape() {
        let ts = current_timestamp();
        // e.g. 2026-08-30T12:34:56
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[13..14], ":");
    }
}
