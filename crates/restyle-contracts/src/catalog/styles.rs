use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtStyle {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub image_url: String,
    pub description: String,
}

/// Immutable, ordered table of art styles keyed by lowercase id.
#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: IndexMap<String, ArtStyle>,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StyleCatalog {
    pub fn new(styles: Option<Vec<ArtStyle>>) -> Self {
        let styles = styles
            .map(|rows| {
                rows.into_iter()
                    .map(|style| (style.id.to_ascii_lowercase(), style))
                    .collect()
            })
            .unwrap_or_else(default_styles);
        Self { styles }
    }

    pub fn get(&self, id: &str) -> Option<&ArtStyle> {
        self.styles.get(&id.trim().to_ascii_lowercase())
    }

    pub fn list(&self) -> impl Iterator<Item = &ArtStyle> {
        self.styles.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

fn default_styles() -> IndexMap<String, ArtStyle> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str, name: &str, prompt: &str, description: &str| {
        map.insert(
            id.to_string(),
            ArtStyle {
                id: id.to_string(),
                name: name.to_string(),
                prompt: prompt.to_string(),
                image_url: placeholder_url(name),
                description: description.to_string(),
            },
        );
    };

    insert(
        "rezero",
        "Re:Zero",
        "Completely redraw and recreate the character(s) from the provided image in the art style of the anime 'Re:Zero − Starting Life in Another World'. Do not simply edit or apply a filter. This is a full re-rendering task. Faithfully replicate the style's distinct eye design with detailed irises, the soft and slightly desaturated color palette, and the expressive, emotional faces. The original character's pose, clothing, and key features must be preserved, but rendered entirely from scratch in the Re:Zero art style to ensure consistency.",
        "Re:Zero − Starting Life in Another World is a Japanese light novel series written by Tappei Nagatsuki. Its art style is known for detailed character designs, expressive eyes and a vibrant yet sometimes dark fantasy aesthetic.",
    );
    insert(
        "naruto",
        "Naruto",
        "Recreate the character(s) from scratch in the iconic art style of the 'Naruto' anime and manga. Avoid filters or simple edits to the original. The goal is a complete artistic transformation. Apply bold, dynamic line work, characteristic facial structures, and energetic expressions. The original pose, clothing, and composition must be maintained, but completely re-rendered in the distinct Naruto style.",
        "Naruto, created by Masashi Kishimoto, follows an adolescent ninja who dreams of leading his village. The art style is iconic for dynamic action, distinct character designs and a blend of traditional Japanese aesthetics with modern energy.",
    );
    insert(
        "dragonball",
        "Dragon Ball",
        "Completely re-imagine and redraw the character(s) in the art style of 'Dragon Ball Z'. This is not an editing task; it is a full recreation. Focus on the sharp, angular character designs, defined musculature, and a sense of explosive energy. Preserve the original character's core design and pose, but render them entirely from the ground up with the high-octane, vibrant aesthetic of Dragon Ball Z.",
        "Dragon Ball is a Japanese media franchise created by Akira Toriyama. Dragon Ball Z in particular is famous for angular, muscular character designs, spiky hair and intense high-energy action.",
    );
    insert(
        "uma-musume",
        "Uma Musume",
        "Fully adapt and redraw the image in the art style of 'Uma Musume Pretty Derby'. Do not apply a simple filter; this requires a complete re-rendering. The style is defined by bright, cheerful aesthetics, incredibly detailed and colorful outfits, and large, expressive, shimmering eyes. Maintain the character's original identity and pose, but translate their appearance entirely into the high-detail, vibrant, and polished world of Uma Musume.",
        "Uma Musume Pretty Derby is a multimedia franchise about famous racehorses reborn as girls. Its bright, idol-like style features detailed outfits and large eyes with intricate highlights.",
    );
    insert(
        "project-sekai",
        "Project Sekai!",
        "Completely transform and redraw this image into the art style of 'Project Sekai! Colorful Stage'. This is a re-creation, not a filter. The style features modern, stylish designs with a vibrant, digital 'virtual singer' aesthetic. Pay close attention to intricate hair and clothing details, clean cel-shading, and a colorful, pop-art inspired flair. The original character and pose must be recognizable but fully and consistently integrated into this new style from scratch.",
        "Project Sekai! Colorful Stage is a Japanese mobile rhythm game featuring virtual singers. Its modern, pop-art inspired look is known for trendy character designs and intricate hair and clothing.",
    );
    insert(
        "persona",
        "Persona",
        "Completely redesign and redraw the character(s) in the slick, high-contrast art style of the 'Persona' series (specifically Persona 5). Do not simply edit the original; create a new image from scratch. Use a sharp, cel-shaded look with heavy, stylized shadows and bold outlines. Incorporate the iconic motifs of red, black, and white to give the final image a stylish, edgy, and graphic feel, while retaining the original subject's core characteristics and pose.",
        "Persona is a role-playing game series by Atlus. Persona 5 is renowned for slick, high-contrast cel-shaded visuals in red, black and white with bold graphic interfaces.",
    );

    map
}

fn placeholder_url(name: &str) -> String {
    format!(
        "https://placehold.co/200x200/1F2937/FFFFFF?text={}",
        name.replace(' ', "+")
    )
}
