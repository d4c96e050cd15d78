use std::fmt;

use serde::Serialize;

const YOUTUBE_MARKERS: [&str; 2] = ["youtube.com", "youtu.be"];
const FACEBOOK_MARKERS: [&str; 2] = ["facebook.com", "fb.watch"];
const INSTAGRAM_MARKERS: [&str; 1] = ["instagram.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Facebook,
    Instagram,
    Unsupported,
}

impl Platform {
    /// Classifies a URL by plain, case-sensitive substring matching.
    ///
    /// The URL is not parsed: `https://example.com/?next=youtube.com` counts as
    /// YouTube. Matching order is YouTube, Facebook, Instagram.
    pub fn classify(url: &str) -> Self {
        let contains_any = |markers: &[&str]| markers.iter().any(|marker| url.contains(marker));

        if contains_any(&YOUTUBE_MARKERS) {
            Platform::Youtube
        } else if contains_any(&FACEBOOK_MARKERS) {
            Platform::Facebook
        } else if contains_any(&INSTAGRAM_MARKERS) {
            Platform::Instagram
        } else {
            Platform::Unsupported
        }
    }

    pub fn is_supported(self) -> bool {
        self != Platform::Unsupported
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_platforms() {
        assert_eq!(Platform::classify("https://youtu.be/xyz"), Platform::Youtube);
        assert_eq!(
            Platform::classify("https://www.youtube.com/watch?v=abc"),
            Platform::Youtube
        );
        assert_eq!(
            Platform::classify("https://www.facebook.com/watch/?v=1"),
            Platform::Facebook
        );
        assert_eq!(Platform::classify("https://fb.watch/abc/"), Platform::Facebook);
        assert_eq!(
            Platform::classify("https://instagram.com/reel/abc"),
            Platform::Instagram
        );
        assert_eq!(
            Platform::classify("https://example.com/video"),
            Platform::Unsupported
        );
    }

    #[test]
    fn matching_is_case_sensitive_substring() {
        assert_eq!(
            Platform::classify("https://YOUTUBE.COM/watch?v=abc"),
            Platform::Unsupported
        );
        assert_eq!(
            Platform::classify("https://example.com/?next=youtube.com"),
            Platform::Youtube
        );
        assert_eq!(Platform::classify(""), Platform::Unsupported);
    }

    #[test]
    fn earlier_platform_wins_when_several_match() {
        assert_eq!(
            Platform::classify("https://www.facebook.com/share?u=https://youtu.be/x"),
            Platform::Youtube
        );
        assert_eq!(
            Platform::classify("https://instagram.com/p/1?ref=facebook.com"),
            Platform::Facebook
        );
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Platform::Instagram).ok().as_deref(),
            Some("\"instagram\"")
        );
        assert!(!Platform::Unsupported.is_supported());
        assert_eq!(Platform::Facebook.to_string(), "facebook");
    }
}
