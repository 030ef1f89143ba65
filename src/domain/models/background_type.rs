use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::repositories::background_remote_repository::WallpaperSettings;

pub const DEFAULT_PATTERN_INTENSITY: i32 = 50;

const INVALID_FILL_ERROR: &str = "WALLPAPER_INVALID";

/// Solid or gradient color fill of a background, colors are 24-bit RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundFill {
    Solid {
        color: u32,
    },
    Gradient {
        top_color: u32,
        bottom_color: u32,
        #[serde(default)]
        rotation_angle: i32,
    },
}

impl BackgroundFill {
    pub fn solid(color: u32) -> Self {
        Self::Solid {
            color: color & 0xFF_FFFF,
        }
    }

    /// Two equal colors collapse into a solid fill, invalid angles become 0.
    pub fn gradient(top_color: u32, bottom_color: u32, rotation_angle: i32) -> Self {
        let top_color = top_color & 0xFF_FFFF;
        let bottom_color = bottom_color & 0xFF_FFFF;
        if top_color == bottom_color {
            return Self::solid(top_color);
        }

        Self::Gradient {
            top_color,
            bottom_color,
            rotation_angle: if Self::is_valid_rotation_angle(rotation_angle) {
                rotation_angle
            } else {
                0
            },
        }
    }

    pub fn is_valid_rotation_angle(rotation_angle: i32) -> bool {
        (0..360).contains(&rotation_angle) && rotation_angle % 45 == 0
    }

    /// Parse a fill from its link form, e.g. `ffffff` or `aa0000-0000aa?rotation=45`.
    pub fn from_link(link: &str) -> Result<Self, DomainError> {
        let link = link.find('#').map_or(link, |position| &link[..position]);
        let (colors, parameters) = link.split_once('?').unwrap_or((link, ""));

        match colors.split_once('-') {
            Some((top, bottom)) => {
                let top_color = parse_color(top)?;
                let bottom_color = parse_color(bottom)?;
                let rotation_angle = parameters
                    .strip_prefix("rotation=")
                    .and_then(|value| value.parse::<i32>().ok())
                    .unwrap_or(0);
                Ok(Self::gradient(top_color, bottom_color, rotation_angle))
            }
            None => Ok(Self::solid(parse_color(colors)?)),
        }
    }

    pub fn link(&self) -> String {
        match self {
            Self::Solid { .. } => self.colors_link(),
            Self::Gradient { rotation_angle, .. } if *rotation_angle != 0 => {
                format!("{}?rotation={}", self.colors_link(), rotation_angle)
            }
            Self::Gradient { .. } => self.colors_link(),
        }
    }

    fn colors_link(&self) -> String {
        match self {
            Self::Solid { color } => format!("{:06x}", color),
            Self::Gradient {
                top_color,
                bottom_color,
                ..
            } => format!("{:06x}-{:06x}", top_color, bottom_color),
        }
    }

    pub fn rotation_angle(&self) -> i32 {
        match self {
            Self::Solid { .. } => 0,
            Self::Gradient { rotation_angle, .. } => *rotation_angle,
        }
    }

    pub fn is_dark(&self) -> bool {
        let is_dark_color = |color: u32| color & 0x80_8080 == 0;
        match self {
            Self::Solid { color } => is_dark_color(*color),
            Self::Gradient {
                top_color,
                bottom_color,
                ..
            } => is_dark_color(*top_color) && is_dark_color(*bottom_color),
        }
    }

    fn from_settings(settings: &WallpaperSettings) -> Self {
        let color = settings.background_color.unwrap_or(0);
        match settings.second_background_color {
            Some(second_color) => {
                Self::gradient(color, second_color, settings.rotation.unwrap_or(0))
            }
            None => Self::solid(color),
        }
    }

    fn write_settings(&self, settings: &mut WallpaperSettings) {
        match self {
            Self::Solid { color } => {
                settings.background_color = Some(*color);
            }
            Self::Gradient {
                top_color,
                bottom_color,
                rotation_angle,
            } => {
                settings.background_color = Some(*top_color);
                settings.second_background_color = Some(*bottom_color);
                settings.rotation = Some(*rotation_angle);
            }
        }
    }
}

fn parse_color(value: &str) -> Result<u32, DomainError> {
    if value.is_empty() || value.len() > 6 || !value.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(DomainError::InvalidData(INVALID_FILL_ERROR.to_string()));
    }

    u32::from_str_radix(value, 16)
        .map_err(|_| DomainError::InvalidData(INVALID_FILL_ERROR.to_string()))
}

/// Visual kind of a background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackgroundType {
    /// Document-backed image.
    Wallpaper {
        #[serde(default)]
        is_blurred: bool,
        #[serde(default)]
        is_moving: bool,
    },
    /// Document-backed pattern drawn over a fill.
    Pattern {
        fill: BackgroundFill,
        #[serde(default = "default_intensity")]
        intensity: i32,
        #[serde(default)]
        is_moving: bool,
    },
    /// Plain fill without a file.
    Fill { fill: BackgroundFill },
}

fn default_intensity() -> i32 {
    DEFAULT_PATTERN_INTENSITY
}

impl BackgroundType {
    pub fn wallpaper(is_blurred: bool, is_moving: bool) -> Self {
        Self::Wallpaper {
            is_blurred,
            is_moving,
        }
    }

    pub fn pattern(fill: BackgroundFill, intensity: i32, is_moving: bool) -> Result<Self, DomainError> {
        if !Self::is_valid_intensity(intensity) {
            return Err(DomainError::InvalidData(
                "Wrong intensity value".to_string(),
            ));
        }

        Ok(Self::Pattern {
            fill,
            intensity,
            is_moving,
        })
    }

    pub fn fill(fill: BackgroundFill) -> Self {
        Self::Fill { fill }
    }

    pub fn is_valid_intensity(intensity: i32) -> bool {
        (0..=100).contains(&intensity)
    }

    /// Build the type of a server record.
    pub fn from_remote(has_no_file: bool, is_pattern: bool, settings: Option<&WallpaperSettings>) -> Self {
        if has_no_file {
            let fill = settings
                .map(BackgroundFill::from_settings)
                .unwrap_or_else(|| BackgroundFill::solid(0));
            return Self::Fill { fill };
        }

        if is_pattern {
            return match settings {
                Some(settings) => Self::Pattern {
                    fill: BackgroundFill::from_settings(settings),
                    intensity: settings
                        .intensity
                        .filter(|intensity| Self::is_valid_intensity(*intensity))
                        .unwrap_or(DEFAULT_PATTERN_INTENSITY),
                    is_moving: settings.is_motion,
                },
                None => Self::Pattern {
                    fill: BackgroundFill::solid(0),
                    intensity: DEFAULT_PATTERN_INTENSITY,
                    is_moving: false,
                },
            };
        }

        match settings {
            Some(settings) => Self::wallpaper(settings.is_blurred, settings.is_motion),
            None => Self::wallpaper(false, false),
        }
    }

    pub fn to_remote_settings(&self) -> WallpaperSettings {
        let mut settings = WallpaperSettings::default();
        match self {
            Self::Wallpaper {
                is_blurred,
                is_moving,
            } => {
                settings.is_blurred = *is_blurred;
                settings.is_motion = *is_moving;
            }
            Self::Pattern {
                fill,
                intensity,
                is_moving,
            } => {
                fill.write_settings(&mut settings);
                settings.intensity = Some(*intensity);
                settings.is_motion = *is_moving;
            }
            Self::Fill { fill } => fill.write_settings(&mut settings),
        }
        settings
    }

    pub fn has_file(&self) -> bool {
        !matches!(self, Self::Fill { .. })
    }

    /// Same file and pattern combination, settings are ignored.
    pub fn has_equal_type(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn background_fill(&self) -> Option<BackgroundFill> {
        match self {
            Self::Wallpaper { .. } => None,
            Self::Pattern { fill, .. } | Self::Fill { fill } => Some(*fill),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pattern { .. } => "image/png",
            _ => "image/jpeg",
        }
    }

    /// Canonical link of the type; for fills it is also the registry name.
    pub fn link(&self) -> String {
        match self {
            Self::Wallpaper {
                is_blurred,
                is_moving,
            } => {
                let mut modes = Vec::new();
                if *is_blurred {
                    modes.push("blur");
                }
                if *is_moving {
                    modes.push("motion");
                }
                if modes.is_empty() {
                    String::new()
                } else {
                    format!("mode={}", modes.join("+"))
                }
            }
            Self::Pattern {
                fill,
                intensity,
                is_moving,
            } => {
                let mut link = format!("intensity={}&bg_color={}", intensity, fill.colors_link());
                if fill.rotation_angle() != 0 {
                    link.push_str(&format!("&rotation={}", fill.rotation_angle()));
                }
                if *is_moving {
                    link.push_str("&mode=motion");
                }
                link
            }
            Self::Fill { fill } => fill.link(),
        }
    }

    /// Re-read the settings carried in the query string of a background link.
    pub fn apply_parameters_from_link(&mut self, name: &str) {
        let arguments = parse_link_query(name);
        let modes = query_argument(&arguments, "mode")
            .split([' ', '+'])
            .map(|mode| mode.to_ascii_lowercase())
            .collect::<Vec<_>>();
        let has_mode = |expected: &str| modes.iter().any(|mode| mode == expected);

        match self {
            Self::Wallpaper {
                is_blurred,
                is_moving,
            } => {
                *is_blurred = has_mode("blur");
                *is_moving = has_mode("motion");
            }
            Self::Pattern {
                fill,
                intensity,
                is_moving,
            } => {
                *is_moving = has_mode("motion");
                *intensity = query_argument(&arguments, "intensity")
                    .parse::<i32>()
                    .ok()
                    .filter(|value| Self::is_valid_intensity(*value))
                    .unwrap_or(DEFAULT_PATTERN_INTENSITY);

                let bg_color = query_argument(&arguments, "bg_color");
                if !bg_color.is_empty() {
                    let fill_link = format!(
                        "{}?rotation={}",
                        bg_color,
                        query_argument(&arguments, "rotation")
                    );
                    if let Ok(parsed) = BackgroundFill::from_link(&fill_link) {
                        *fill = parsed;
                    }
                }
            }
            Self::Fill { .. } => {}
        }
    }
}

fn parse_link_query(name: &str) -> Vec<(String, String)> {
    let Some((_, query)) = name.split_once('?') else {
        return Vec::new();
    };

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_query_component(key), decode_query_component(value))
        })
        .collect()
}

fn decode_query_component(component: &str) -> String {
    percent_decode_str(&component.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn query_argument<'a>(arguments: &'a [(String, String)], key: &str) -> &'a str {
    arguments
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_link_parses_solid_and_gradient() {
        assert_eq!(
            BackgroundFill::from_link("ffaa00").unwrap(),
            BackgroundFill::solid(0xFFAA00)
        );

        let gradient = BackgroundFill::from_link("aa0000-0000aa?rotation=45").unwrap();
        assert_eq!(gradient, BackgroundFill::gradient(0xAA0000, 0x0000AA, 45));
        assert_eq!(gradient.link(), "aa0000-0000aa?rotation=45");
    }

    #[test]
    fn fill_link_rejects_malformed_colors() {
        assert!(BackgroundFill::from_link("").is_err());
        assert!(BackgroundFill::from_link("1234567").is_err());
        assert!(BackgroundFill::from_link("zzzzzz").is_err());
        assert!(BackgroundFill::from_link("ffffff-").is_err());
    }

    #[test]
    fn gradient_drops_invalid_rotation_and_collapses_equal_colors() {
        assert_eq!(
            BackgroundFill::from_link("000000-ffffff?rotation=50").unwrap(),
            BackgroundFill::gradient(0, 0xFFFFFF, 0)
        );
        assert_eq!(
            BackgroundFill::gradient(0x123456, 0x123456, 90),
            BackgroundFill::solid(0x123456)
        );
    }

    #[test]
    fn fill_darkness_requires_every_color_dark() {
        assert!(BackgroundFill::solid(0x101010).is_dark());
        assert!(!BackgroundFill::solid(0xFFFFFF).is_dark());
        assert!(!BackgroundFill::gradient(0x101010, 0xF0F0F0, 0).is_dark());
    }

    #[test]
    fn wallpaper_link_lists_modes() {
        assert_eq!(BackgroundType::wallpaper(false, false).link(), "");
        assert_eq!(BackgroundType::wallpaper(true, true).link(), "mode=blur+motion");
    }

    #[test]
    fn pattern_link_includes_fill_and_motion() {
        let pattern = BackgroundType::pattern(BackgroundFill::gradient(0xFF0000, 0x00FF00, 90), 60, true)
            .unwrap();
        assert_eq!(
            pattern.link(),
            "intensity=60&bg_color=ff0000-00ff00&rotation=90&mode=motion"
        );
    }

    #[test]
    fn apply_parameters_reads_modes_and_pattern_settings() {
        let mut wallpaper = BackgroundType::wallpaper(false, false);
        wallpaper.apply_parameters_from_link("slug?mode=Blur+motion");
        assert_eq!(wallpaper, BackgroundType::wallpaper(true, true));

        let mut pattern = BackgroundType::pattern(BackgroundFill::solid(0), 10, false).unwrap();
        pattern.apply_parameters_from_link("slug?intensity=70&bg_color=ff0000-0000ff&rotation=180&mode=blur");
        assert_eq!(
            pattern,
            BackgroundType::Pattern {
                fill: BackgroundFill::gradient(0xFF0000, 0x0000FF, 180),
                intensity: 70,
                is_moving: false,
            }
        );

        pattern.apply_parameters_from_link("slug?intensity=300");
        assert!(matches!(
            pattern,
            BackgroundType::Pattern {
                intensity: DEFAULT_PATTERN_INTENSITY,
                ..
            }
        ));
    }

    #[test]
    fn equal_type_ignores_settings() {
        let blurred = BackgroundType::wallpaper(true, false);
        let plain = BackgroundType::wallpaper(false, false);
        let fill = BackgroundType::fill(BackgroundFill::solid(0));

        assert!(blurred.has_equal_type(&plain));
        assert_ne!(blurred, plain);
        assert!(!blurred.has_equal_type(&fill));
        assert!(!fill.has_file());
    }

    #[test]
    fn remote_settings_survive_conversion() {
        let pattern = BackgroundType::pattern(BackgroundFill::gradient(0x111111, 0x222222, 45), 35, true)
            .unwrap();
        let settings = pattern.to_remote_settings();
        assert_eq!(BackgroundType::from_remote(false, true, Some(&settings)), pattern);

        let fill = BackgroundType::fill(BackgroundFill::solid(0xABCDEF));
        assert_eq!(
            BackgroundType::from_remote(true, false, Some(&fill.to_remote_settings())),
            fill
        );
    }
}
