#[derive(Debug, Clone, PartialEq)]
pub enum OpenAIModel {
    Gpt4o,
    Gpt4oMini,
    Gpt41,
    Gpt41Mini,
    Gpt35Turbo1106,
    Override(String),
}

impl Default for OpenAIModel {
    fn default() -> Self { Self::Gpt4oMini }
}

impl OpenAIModel {
    pub fn id(&self) -> &str {
        match self {
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
            Self::Gpt41 => "gpt-4.1",
            Self::Gpt41Mini => "gpt-4.1-mini",
            Self::Gpt35Turbo1106 => "gpt-3.5-turbo-1106",
            Self::Override(s) => s.as_str(),
        }
    }

    /// Known ids map to their variant; anything else is passed through.
    pub fn from_id(id: &str) -> Self {
        match id {
            "gpt-4o" => Self::Gpt4o,
            "gpt-4o-mini" => Self::Gpt4oMini,
            "gpt-4.1" => Self::Gpt41,
            "gpt-4.1-mini" => Self::Gpt41Mini,
            "gpt-3.5-turbo-1106" => Self::Gpt35Turbo1106,
            other => Self::Override(other.to_string()),
        }
    }
}
