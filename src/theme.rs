//! The light/dark theme preference, and the colors that go with it

use csscolorparser::Color;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::AgendaResult;
use crate::store::{keys, KeyValueStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Light
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThemeColors {
    pub background: Color,
    pub text: Color,
    /// Also used as the accent color of the calendar
    pub primary: Color,
    pub secondary: Color,
    pub card: Color,
    pub border: Color,
}

static LIGHT: Lazy<ThemeColors> = Lazy::new(|| ThemeColors {
    background: rgb(0xff, 0xff, 0xff),
    text: rgb(0x21, 0x25, 0x29),
    primary: rgb(0x6c, 0x75, 0x7d),
    secondary: rgb(0xad, 0xb5, 0xbd),
    card: rgb(0xf8, 0xf9, 0xfa),
    border: rgb(0xde, 0xe2, 0xe6),
});

static DARK: Lazy<ThemeColors> = Lazy::new(|| ThemeColors {
    background: rgb(0x21, 0x25, 0x29),
    text: rgb(0xf8, 0xf9, 0xfa),
    primary: rgb(0xad, 0xb5, 0xbd),
    secondary: rgb(0x6c, 0x75, 0x7d),
    card: rgb(0x34, 0x3a, 0x40),
    border: rgb(0x49, 0x50, 0x57),
});

/// An opaque color from its 8-bit channels
pub(crate) fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::from_rgb_u8(r, g, b)
}

impl Theme {
    pub fn colors(&self) -> &'static ThemeColors {
        match self {
            Theme::Light => &LIGHT,
            Theme::Dark => &DARK,
        }
    }

    pub fn accent(&self) -> Color {
        self.colors().primary.clone()
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Read the saved preference. Unknown or missing values fall back to the light theme
    pub async fn load<S: KeyValueStore + ?Sized>(store: &S) -> AgendaResult<Self> {
        match store.get(keys::THEME).await?.as_deref() {
            None => Ok(Theme::default()),
            Some("light") => Ok(Theme::Light),
            Some("dark") => Ok(Theme::Dark),
            Some(other) => {
                log::warn!("Unknown theme {:?} in the store. Using the default theme", other);
                Ok(Theme::default())
            },
        }
    }

    pub async fn save<S: KeyValueStore + ?Sized>(&self, store: &S) -> AgendaResult<()> {
        store.set(keys::THEME, self.as_str()).await
    }

    /// Switch to the other theme and remember the choice
    pub async fn toggle<S: KeyValueStore + ?Sized>(store: &S) -> AgendaResult<Self> {
        let new_theme = Self::load(store).await?.toggled();
        new_theme.save(store).await?;
        Ok(new_theme)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn toggling_is_persisted() {
        let store = MemoryStore::new();
        assert_eq!(Theme::load(&store).await.unwrap(), Theme::Light);

        assert_eq!(Theme::toggle(&store).await.unwrap(), Theme::Dark);
        assert_eq!(store.get(keys::THEME).await.unwrap().as_deref(), Some("dark"));
        assert_eq!(Theme::load(&store).await.unwrap(), Theme::Dark);

        store.set(keys::THEME, "sepia").await.unwrap();
        assert_eq!(Theme::load(&store).await.unwrap(), Theme::Light);
    }

    #[test]
    fn palettes() {
        assert_eq!(Theme::Light.accent().to_hex_string(), "#6c757d");
        assert_eq!(Theme::Dark.accent().to_hex_string(), "#adb5bd");
        assert_eq!(Theme::Dark.colors().card.to_hex_string(), "#343a40");
    }
}
