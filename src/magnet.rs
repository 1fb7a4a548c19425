//! Magnet link validation
//!
//! A magnet link is accepted only when it matches the BitTorrent info-hash
//! scheme: the `magnet:?xt=urn:btih:` prefix, a 32-40 character alphanumeric
//! hash (base32 or hex), and any trailing query parameters. Validation is
//! purely syntactic and runs before any network activity.

use regex::Regex;
use std::sync::LazyLock;

const MAGNET_PATTERN: &str = r"^magnet:\?xt=urn:btih:[a-zA-Z0-9]{32,40}.*$";

static MAGNET_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(MAGNET_PATTERN).ok());

/// Check whether `identifier` is a well-formed magnet link
///
/// # Examples
///
/// ```
/// use torrent_dl::magnet::is_valid_magnet_link;
///
/// assert!(is_valid_magnet_link(
///     "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056&dn=Example"
/// ));
/// assert!(!is_valid_magnet_link("http://example.com/file.torrent"));
/// ```
#[must_use]
pub fn is_valid_magnet_link(identifier: &str) -> bool {
    MAGNET_RE
        .as_ref()
        .is_some_and(|re| re.is_match(identifier))
}

/// Extract the decoded display name (`dn` parameter) from a magnet link
///
/// Returns `None` when the link has no (or an empty) `dn` parameter.
pub fn display_name(identifier: &str) -> Option<String> {
    let url = url::Url::parse(identifier).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "dn")
        .map(|(_, value)| value.trim().to_string())
        .filter(|name| !name.is_empty())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const HEX_HASH: &str = "c9e15763f722f23e98a29decdfae341b98d53056";
    const BASE32_HASH: &str = "ZOCMZQIPFFW7OLLMIC5HUB6BPCSDEOQU";

    #[test]
    fn pattern_compiles() {
        assert!(MAGNET_RE.is_some());
    }

    #[test]
    fn accepts_hex_and_base32_hashes() {
        assert!(is_valid_magnet_link(&format!("magnet:?xt=urn:btih:{HEX_HASH}")));
        assert!(is_valid_magnet_link(&format!(
            "magnet:?xt=urn:btih:{BASE32_HASH}"
        )));
    }

    #[test]
    fn accepts_trailing_parameters() {
        let link = format!(
            "magnet:?xt=urn:btih:{HEX_HASH}&dn=Big+Buck+Bunny&tr=udp%3A%2F%2Ftracker.example%3A1337"
        );
        assert!(is_valid_magnet_link(&link));
    }

    #[test]
    fn rejects_hash_length_outside_range() {
        let short = "a".repeat(31);
        assert!(!is_valid_magnet_link(&format!("magnet:?xt=urn:btih:{short}")));

        // 41 alphanumerics still match because the tail is unconstrained,
        // but a non-alphanumeric inside the first 32 characters does not.
        let broken = format!("{}-{}", "a".repeat(16), "b".repeat(16));
        assert!(!is_valid_magnet_link(&format!(
            "magnet:?xt=urn:btih:{broken}"
        )));
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for raw in [
            "",
            "magnet:",
            "magnet:?xt=urn:sha1:c9e15763f722f23e98a29decdfae341b98d53056",
            "MAGNET:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056",
            " magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056",
            "https://example.com/?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056",
            "magnet:?dn=name&xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056",
        ] {
            assert!(!is_valid_magnet_link(raw), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn display_name_is_decoded() {
        let link = format!("magnet:?xt=urn:btih:{HEX_HASH}&dn=Big+Buck%20Bunny%20%281080p%29");
        assert_eq!(
            display_name(&link).as_deref(),
            Some("Big Buck Bunny (1080p)")
        );
    }

    #[test]
    fn display_name_absent_or_empty() {
        assert_eq!(display_name(&format!("magnet:?xt=urn:btih:{HEX_HASH}")), None);
        assert_eq!(
            display_name(&format!("magnet:?xt=urn:btih:{HEX_HASH}&dn=")),
            None
        );
        assert_eq!(display_name("not a url"), None);
    }
}
