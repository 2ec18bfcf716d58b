//! Size catalog: symbolic resolution presets and their bounding boxes
//!
//! Every lookup goes through [`CATALOG`], so labels, keyboards and help text
//! all pick up a new preset from a single table entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel dimensions of an image or a bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions value
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Target resolution selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeOption {
    /// Keep the source resolution
    Original,
    /// Fit within 1280x720
    Small,
    /// Fit within 1920x1080
    Medium,
    /// Fit within 2560x1440
    Large,
}

/// One row of the size catalog
#[derive(Debug, Clone, Copy)]
pub struct SizePreset {
    pub option: SizeOption,
    /// Token shown on the keyboard and accepted from the user
    pub label: &'static str,
    /// Bounding box, `None` meaning "no resize"
    pub bounds: Option<Dimensions>,
}

/// All presets in menu order
pub const CATALOG: &[SizePreset] = &[
    SizePreset {
        option: SizeOption::Original,
        label: "original",
        bounds: None,
    },
    SizePreset {
        option: SizeOption::Small,
        label: "720p",
        bounds: Some(Dimensions::new(1280, 720)),
    },
    SizePreset {
        option: SizeOption::Medium,
        label: "1080p",
        bounds: Some(Dimensions::new(1920, 1080)),
    },
    SizePreset {
        option: SizeOption::Large,
        label: "1440p",
        bounds: Some(Dimensions::new(2560, 1440)),
    },
];

impl SizeOption {
    /// Iterate all options in menu order
    pub fn all() -> impl Iterator<Item = SizeOption> {
        CATALOG.iter().map(|preset| preset.option)
    }

    fn preset(self) -> &'static SizePreset {
        // Every variant has exactly one catalog row; see test_catalog_covers_every_variant.
        CATALOG
            .iter()
            .find(|preset| preset.option == self)
            .unwrap_or(&CATALOG[0])
    }

    /// Symbolic label used on keyboards (e.g. "1080p")
    pub fn label(self) -> &'static str {
        self.preset().label
    }

    /// Bounding box for this option, `None` for [`SizeOption::Original`]
    ///
    /// # Examples
    ///
    /// ```
    /// use image_utility_bot::imaging::{Dimensions, SizeOption};
    ///
    /// assert_eq!(SizeOption::Medium.dimensions(), Some(Dimensions::new(1920, 1080)));
    /// assert_eq!(SizeOption::Original.dimensions(), None);
    /// ```
    pub fn dimensions(self) -> Option<Dimensions> {
        self.preset().bounds
    }

    /// Parse a user token against the catalog labels
    ///
    /// Surrounding whitespace and letter case are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use image_utility_bot::imaging::SizeOption;
    ///
    /// assert_eq!(SizeOption::from_label(" 720P "), Some(SizeOption::Small));
    /// assert_eq!(SizeOption::from_label("4k"), None);
    /// ```
    pub fn from_label(token: &str) -> Option<Self> {
        let token = token.trim();
        CATALOG
            .iter()
            .find(|preset| preset.label.eq_ignore_ascii_case(token))
            .map(|preset| preset.option)
    }

    /// Human-readable description for help text (e.g. "1080p (1920x1080)")
    pub fn description(self) -> String {
        match self.dimensions() {
            Some(bounds) => format!("{} ({})", self.label(), bounds),
            None => "Original size".to_string(),
        }
    }
}

impl fmt::Display for SizeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_variant() {
        for option in [
            SizeOption::Original,
            SizeOption::Small,
            SizeOption::Medium,
            SizeOption::Large,
        ] {
            let rows = CATALOG.iter().filter(|p| p.option == option).count();
            assert_eq!(rows, 1, "{:?} must appear exactly once", option);
        }
    }

    #[test]
    fn test_dimensions_absent_only_for_original() {
        for option in SizeOption::all() {
            assert_eq!(
                option.dimensions().is_none(),
                option == SizeOption::Original
            );
        }
    }

    #[test]
    fn test_known_dimensions() {
        assert_eq!(
            SizeOption::Small.dimensions(),
            Some(Dimensions::new(1280, 720))
        );
        assert_eq!(
            SizeOption::Large.dimensions(),
            Some(Dimensions::new(2560, 1440))
        );
    }

    #[test]
    fn test_from_label_round_trips_every_label() {
        for option in SizeOption::all() {
            assert_eq!(SizeOption::from_label(option.label()), Some(option));
        }
    }

    #[test]
    fn test_from_label_rejects_unknown() {
        assert_eq!(SizeOption::from_label(""), None);
        assert_eq!(SizeOption::from_label("2160p"), None);
        assert_eq!(SizeOption::from_label("1920x1080"), None);
    }

    #[test]
    fn test_description() {
        assert_eq!(SizeOption::Original.description(), "Original size");
        assert_eq!(SizeOption::Medium.description(), "1080p (1920x1080)");
    }

    #[test]
    fn test_size_option_serialization() {
        let yaml = serde_yaml::to_string(&SizeOption::Medium).unwrap();
        assert!(yaml.contains("medium"));
    }
}
