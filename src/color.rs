use crate::model::ScheduleError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An opaque display colour, normalized to lowercase `#rrggbb`.
///
/// Anything `csscolorparser` understands is accepted on input (`#64B5F6`,
/// `steelblue`, `rgb(10, 20, 30)`); the alpha channel is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskColor {
    r: u8,
    g: u8,
    b: u8,
}

impl TaskColor {
    pub const DEFAULT: TaskColor = TaskColor {
        r: 0x64,
        g: 0xb5,
        b: 0xf6,
    };

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        TaskColor { r, g, b }
    }

    pub fn parse(input: &str) -> Result<Self, ScheduleError> {
        let trimmed = input.trim();
        let parsed = csscolorparser::parse(trimmed)
            .map_err(|_| ScheduleError::InvalidColor(trimmed.to_string()))?;
        let [r, g, b, _] = parsed.to_rgba8();
        Ok(TaskColor { r, g, b })
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    /// Perceived brightness in `0..=255` (ITU-R BT.601 weights).
    pub fn brightness(&self) -> f32 {
        (self.r as f32 * 299.0 + self.g as f32 * 587.0 + self.b as f32 * 114.0) / 1000.0
    }

    /// Whether text drawn over this colour should be dark to stay readable.
    pub fn wants_dark_text(&self) -> bool {
        self.brightness() > 128.0
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for TaskColor {
    fn default() -> Self {
        TaskColor::DEFAULT
    }
}

impl fmt::Display for TaskColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for TaskColor {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskColor::parse(s)
    }
}

impl Serialize for TaskColor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TaskColor {
    fn deserialize<D>(deserializer: D) -> Result<TaskColor, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TaskColor::parse(&raw).unwrap_or_else(|_| {
            log::warn!("unreadable colour {:?} in stored data, using default", raw);
            TaskColor::DEFAULT
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_hex_and_names() {
        assert_eq!(TaskColor::parse("#64B5F6").unwrap().to_hex(), "#64b5f6");
        assert_eq!(TaskColor::parse("white").unwrap().rgb(), (255, 255, 255));
        assert_eq!(TaskColor::parse(" #000000 ").unwrap().rgb(), (0, 0, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            TaskColor::parse("not-a-colour"),
            Err(ScheduleError::InvalidColor(_))
        ));
    }

    #[test]
    fn text_contrast_follows_brightness() {
        assert!(TaskColor::from_rgb(255, 235, 59).wants_dark_text());
        assert!(!TaskColor::from_rgb(20, 20, 80).wants_dark_text());
    }
}
