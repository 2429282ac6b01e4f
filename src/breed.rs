const CAT_INDICATORS: [&str; 12] = [
    "persian",
    "siamese",
    "maine",
    "bengal",
    "ragdoll",
    "birman",
    "abyssinian",
    "sphynx",
    "manx",
    "russian",
    "bombay",
    "himalayan",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimalType {
    Cat,
    Dog,
}

impl AnimalType {
    /// Any breed without a cat indicator counts as a dog.
    pub fn from_breed(breed_name: &str) -> Self {
        let breed_name = breed_name.to_lowercase();
        if CAT_INDICATORS
            .iter()
            .any(|indicator| breed_name.contains(indicator))
        {
            AnimalType::Cat
        } else {
            AnimalType::Dog
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimalType::Cat => "I am a Cat",
            AnimalType::Dog => "I am a Dog",
        }
    }
}

/// `"german_shorthaired"` becomes `"German Shorthaired"`.
pub fn display_name(breed_name: &str) -> String {
    title_case(&breed_name.replace('_', " "))
}

/// Upper-cases a letter that follows a non-letter and lower-cases the rest.
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if previous_is_letter {
            result.extend(c.to_lowercase());
        } else {
            result.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }
    result
}
