use url::Url;

use crate::errors::ShellError;

/// Initial state requested for a local device via `mic=` / `cam=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceToggle {
    On,
    Off,
}

impl DeviceToggle {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// The query parameters the entry flow reads from the page URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams {
    /// Room identity handed to the room directory.
    pub token: Option<String>,
    /// Participant display name; its presence requests auto-join.
    pub name: Option<String>,
    pub mic: Option<DeviceToggle>,
    pub cam: Option<DeviceToggle>,
}

impl PageParams {
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        // Later duplicates win.
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "token" => params.token = Some(value.into_owned()),
                "name" => params.name = Some(value.into_owned()),
                "mic" => params.mic = DeviceToggle::parse(&value),
                "cam" => params.cam = DeviceToggle::parse(&value),
                _ => {}
            }
        }
        params
    }

    pub fn parse(page_url: &str) -> Result<Self, ShellError> {
        let url = Url::parse(page_url).map_err(|e| ShellError::InvalidUrl(e.to_string()))?;
        Ok(Self::from_url(&url))
    }

    /// Device toggles are applied only when both were supplied.
    pub fn device_toggles(&self) -> Option<(DeviceToggle, DeviceToggle)> {
        Some((self.mic?, self.cam?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_all_known_params() {
        let p = PageParams::parse(
            "https://conf.example.com/?token=abc&name=Alice%20B&mic=on&cam=off&x=1",
        )
        .unwrap();
        assert_eq!(p.token.as_deref(), Some("abc"));
        assert_eq!(p.name.as_deref(), Some("Alice B"));
        assert_eq!(p.device_toggles(), Some((DeviceToggle::On, DeviceToggle::Off)));
    }

    #[test]
    fn missing_name_means_manual_entry() {
        let p = PageParams::parse("https://conf.example.com/?token=abc").unwrap();
        assert_eq!(p.name, None);
        assert_eq!(p.device_toggles(), None);
    }

    #[test]
    fn empty_name_is_still_present() {
        let p = PageParams::parse("https://conf.example.com/?token=abc&name=").unwrap();
        assert_eq!(p.name.as_deref(), Some(""));
    }

    #[test]
    fn toggles_need_both_values() {
        let p = PageParams::parse("https://conf.example.com/?mic=on").unwrap();
        assert_eq!(p.mic, Some(DeviceToggle::On));
        assert_eq!(p.device_toggles(), None);

        let p = PageParams::parse("https://conf.example.com/?mic=yes&cam=on").unwrap();
        assert_eq!(p.mic, None);
        assert_eq!(p.device_toggles(), None);
    }

    #[test]
    fn rejects_non_url() {
        assert!(PageParams::parse("not a url").is_err());
    }
}
