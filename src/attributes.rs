//! The structured "tell us about yourself" form and its serialization into a
//! query string.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AttributeOption {
    pub value: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

const fn opt(value: &'static str) -> AttributeOption {
    AttributeOption {
        value,
        description: None,
    }
}

const fn described(value: &'static str, description: &'static str) -> AttributeOption {
    AttributeOption {
        value,
        description: Some(description),
    }
}

pub const GENDERS: &[AttributeOption] = &[
    described("Male (above 25 years)", "Select this if you're a man aged 25 and above."),
    described("Female (above 25 years)", "Select this if you're a woman aged 25 and above."),
    described("Boy (10 - 25 years)", "Select this if you're a boy between the ages of 10 and 25."),
    described("Girl (10 - 25 years)", "Select this if you're a girl between the ages of 10 and 25."),
    described("Baby Boy (1 - 10 years)", "Select this for boys aged between 1 and 10."),
    described("Baby Girl (1 - 10 years)", "Select this for girls aged between 1 and 10."),
];

pub const BODY_SHAPES: &[AttributeOption] = &[
    described("Hourglass", "Well-defined waist with similar bust and hip measurements."),
    described("Pear", "Hips are wider than shoulders; narrow upper body with fuller hips and thighs."),
    described("Apple", "Weight is carried around the midsection, with a wider torso, broad shoulders, and thinner legs."),
    described("Rectangle", "Straight body shape with little difference between bust, waist, and hip measurements."),
    described("Inverted Triangle", "Broad shoulders, narrow hips, and a more athletic build."),
    described("Athletic", "Muscular build with toned limbs, often broad shoulders and narrower hips."),
    described("Round", "Fuller figure with weight evenly distributed, rounder waist and hips."),
];

pub const HEIGHTS: &[AttributeOption] = &[
    described("Short", "Less than 5'4\" (162 cm) for women, less than 5'8\" (173 cm) for men."),
    described("Medium", "Between 5'4\" and 5'7\" for women, 5'8\" and 6'0\" for men."),
    described("Tall", "Taller than 5'7\" for women, taller than 6'0\" for men."),
];

pub const OCCASIONS: &[AttributeOption] = &[
    opt("Casual"),
    opt("Business"),
    opt("Party"),
    opt("Formal"),
    opt("Office"),
    opt("Wedding"),
    opt("Travel"),
    opt("Sports"),
    opt("Vacation"),
    opt("Festive"),
];

pub const FASHION_STYLES: &[AttributeOption] = &[
    opt("Western"),
    opt("Indian"),
    opt("Traditional"),
    opt("Bohemian"),
    opt("Streetwear"),
    opt("Vintage"),
    opt("Minimalist"),
    opt("Athleisure"),
    opt("Sporty"),
    opt("Chic"),
    opt("Ethnic"),
    opt("Fusion"),
];

pub const SKIN_TONES: &[AttributeOption] = &[
    opt("Fair"),
    opt("Light"),
    opt("Medium"),
    opt("Olive"),
    opt("Tan"),
    opt("Brown"),
    opt("Dark"),
];

pub const AGE_RANGE: (u32, u32) = (0, 100);
pub const WEIGHT_RANGE: (u32, u32) = (0, 200);

/// Option lists for rendering the form, served by `GET /api/options`.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub genders: &'static [AttributeOption],
    pub body_shapes: &'static [AttributeOption],
    pub heights: &'static [AttributeOption],
    pub occasions: &'static [AttributeOption],
    pub fashion_styles: &'static [AttributeOption],
    pub skin_tones: &'static [AttributeOption],
    pub age_range: (u32, u32),
    pub weight_range: (u32, u32),
    pub max_styles: usize,
}

impl Catalog {
    pub fn new(max_styles: usize) -> Self {
        Self {
            genders: GENDERS,
            body_shapes: BODY_SHAPES,
            heights: HEIGHTS,
            occasions: OCCASIONS,
            fashion_styles: FASHION_STYLES,
            skin_tones: SKIN_TONES,
            age_range: AGE_RANGE,
            weight_range: WEIGHT_RANGE,
            max_styles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSelection {
    pub gender: String,
    #[serde(default)]
    pub age: Option<u32>,
    pub body_shape: String,
    pub height: String,
    pub weight: u32,
    pub occasion: String,
    #[serde(alias = "fashion_style")]
    pub fashion_styles: Vec<String>,
    pub skin_tone: String,
}

fn canonical(
    field: &'static str,
    options: &[AttributeOption],
    value: &str,
) -> Result<String, ValidationError> {
    let wanted = value.trim();
    options
        .iter()
        .find(|o| o.value.eq_ignore_ascii_case(wanted))
        .map(|o| o.value.to_string())
        .ok_or_else(|| ValidationError::UnknownOption {
            field,
            value: value.to_string(),
        })
}

fn in_range(field: &'static str, value: u32, (min, max): (u32, u32)) -> Result<u32, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl AttributeSelection {
    /// Checks every field and returns a copy with option values in their
    /// canonical spelling and duplicate styles removed. The style limit counts
    /// selections as submitted, duplicates included.
    pub fn normalize(&self, max_styles: usize) -> Result<Self, ValidationError> {
        if self.fashion_styles.len() > max_styles {
            return Err(ValidationError::TooManyStyles {
                selected: self.fashion_styles.len(),
                max: max_styles,
            });
        }

        let mut styles: Vec<String> = Vec::new();
        for style in &self.fashion_styles {
            let style = canonical("fashion style", FASHION_STYLES, style)?;
            if !styles.contains(&style) {
                styles.push(style);
            }
        }
        if styles.is_empty() {
            return Err(ValidationError::NoStyle);
        }

        Ok(Self {
            gender: canonical("gender", GENDERS, &self.gender)?,
            age: self.age.map(|a| in_range("Age", a, AGE_RANGE)).transpose()?,
            body_shape: canonical("body shape", BODY_SHAPES, &self.body_shape)?,
            height: canonical("height", HEIGHTS, &self.height)?,
            weight: in_range("Weight", self.weight, WEIGHT_RANGE)?,
            occasion: canonical("occasion", OCCASIONS, &self.occasion)?,
            fashion_styles: styles,
            skin_tone: canonical("skin tone", SKIN_TONES, &self.skin_tone)?,
        })
    }

    /// One `Key: Value` line per attribute, in form order.
    pub fn to_query(&self) -> String {
        let mut lines = vec![format!("Gender: {}", self.gender)];
        if let Some(age) = self.age {
            lines.push(format!("Age: {}", age));
        }
        lines.push(format!("Body Shape: {}", self.body_shape));
        lines.push(format!("Height: {}", self.height));
        lines.push(format!("Weight: {} kg", self.weight));
        lines.push(format!("Occasion: {}", self.occasion));
        lines.push(format!("Fashion Style: {}", self.fashion_styles.join(", ")));
        lines.push(format!("Skin Tone: {}", self.skin_tone));
        lines.join("\n")
    }
}
