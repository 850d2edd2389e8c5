//! # Texture Module
//!
//! Texture identifiers and the default palettes the generator draws from.
//!
//! A texture id is a short ASCII name of at most five bytes ("stone", "water", ...).
//! It is stored inline so block records and tuple keys stay `Copy`.

use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};

use super::Rgba;

/// Maximum length of a texture identifier in bytes.
pub const MAX_TEXTURE_LEN: usize = 5;

/// Textures used for solid blocks by the generator, with their base colors.
pub static SOLID_TEXTURES: [(&str, Rgba); 5] = [
    ("stone", [0.50, 0.50, 0.52, 1.0]),
    ("dirt", [0.45, 0.30, 0.16, 1.0]),
    ("grass", [0.30, 0.60, 0.22, 1.0]),
    ("sand", [0.86, 0.80, 0.56, 1.0]),
    ("brick", [0.62, 0.26, 0.20, 1.0]),
];

/// Texture used for fluid blocks by the generator.
pub static FLUID_TEXTURE: (&str, Rgba) = ("water", [0.20, 0.40, 0.85, 0.6]);

/// Color used for textures that are not part of the palettes.
pub const FALLBACK_COLOR: Rgba = [1.0, 1.0, 1.0, 1.0];

/// A short, inline texture identifier.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TextureId {
    bytes: [u8; MAX_TEXTURE_LEN],
    len: u8,
}

impl TextureId {
    /// Creates a texture id from its name.
    ///
    /// # Returns
    /// An error if the name is empty, longer than `MAX_TEXTURE_LEN` bytes or not ASCII
    pub fn new(name: &str) -> Result<Self, InvalidTextureId> {
        if name.is_empty() || name.len() > MAX_TEXTURE_LEN || !name.is_ascii() {
            return Err(InvalidTextureId(name.to_string()));
        }
        let mut bytes = [0u8; MAX_TEXTURE_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(TextureId {
            bytes,
            len: name.len() as u8,
        })
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII is ever stored.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }

    /// The id of the generator's fluid texture.
    pub fn fluid() -> Self {
        palette_id(FLUID_TEXTURE.0)
    }

    /// Picks a random solid texture from the palette.
    pub fn random_solid(rng: &mut fastrand::Rng) -> Self {
        palette_id(SOLID_TEXTURES[rng.usize(..SOLID_TEXTURES.len())].0)
    }

    /// The palette color for this texture.
    pub fn base_color(&self) -> Rgba {
        SOLID_TEXTURES
            .iter()
            .chain(std::iter::once(&FLUID_TEXTURE))
            .find(|(name, _)| *name == self.as_str())
            .map(|(_, color)| *color)
            .unwrap_or(FALLBACK_COLOR)
    }
}

fn palette_id(name: &str) -> TextureId {
    TextureId::new(name).unwrap_or_else(|_| unreachable!("palette names are valid ids"))
}

impl fmt::Debug for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureId({:?})", self.as_str())
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TextureId {
    type Error = InvalidTextureId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TextureId::new(&value)
    }
}

impl From<TextureId> for String {
    fn from(value: TextureId) -> Self {
        value.as_str().to_string()
    }
}

/// A texture name that cannot be used as a `TextureId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTextureId(pub String);

impl fmt::Display for InvalidTextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid texture id {:?}: expected 1 to {} ASCII bytes",
            self.0, MAX_TEXTURE_LEN
        )
    }
}

impl Error for InvalidTextureId {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_short_ascii_names() {
        let id = TextureId::new("stone").unwrap();
        assert_eq!(id.as_str(), "stone");
        assert_eq!(id.to_string(), "stone");
    }

    #[test]
    fn rejects_long_or_empty_names() {
        assert!(TextureId::new("").is_err());
        assert!(TextureId::new("marble").is_err());
        assert!(TextureId::new("é").is_err());
    }

    #[test]
    fn ordering_matches_string_ordering() {
        let mut ids: Vec<TextureId> = ["stone", "dirt", "st", "brick"]
            .iter()
            .map(|name| TextureId::new(name).unwrap())
            .collect();
        ids.sort();
        let names: Vec<&str> = ids.iter().map(TextureId::as_str).collect();
        assert_eq!(names, vec!["brick", "dirt", "st", "stone"]);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = TextureId::new("water").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"water\"");
        let back: TextureId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<TextureId>("\"toolong\"").is_err());
    }

    #[test]
    fn palette_colors_resolve() {
        assert_eq!(TextureId::fluid().base_color(), FLUID_TEXTURE.1);
        assert_eq!(TextureId::new("zzz").unwrap().base_color(), FALLBACK_COLOR);
    }
}
