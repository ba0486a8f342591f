/// One-click transforms that keep the source art style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickTransform {
    Male,
    Female,
}

const MALE_PROMPT: &str = "Perform a gender-swap transformation on the character(s) in the image, changing them to male. This is a complete re-rendering task, not a simple filter. It is CRITICAL to perfectly preserve the original art style, including line work, coloring, shading, and overall aesthetic. The character's pose, clothing (adapted for the new gender), and key thematic elements must also be retained. The final image should look like it was drawn by the original artist, but depicting a male version of the character.";

const FEMALE_PROMPT: &str = "Perform a gender-swap transformation on the character(s) in the image, changing them to female. This is a complete re-rendering task, not a simple filter. It is CRITICAL to perfectly preserve the original art style, including line work, coloring, shading, and overall aesthetic. The character's pose, clothing (adapted for the new gender), and key thematic elements must also be retained. The final image should look like it was drawn by the original artist, but depicting a female version of the character.";

impl QuickTransform {
    pub const ALL: [QuickTransform; 2] = [QuickTransform::Male, QuickTransform::Female];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Male => MALE_PROMPT,
            Self::Female => FEMALE_PROMPT,
        }
    }
}
