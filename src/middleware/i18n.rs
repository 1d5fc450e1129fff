// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

const DEFAULT_LANG: &str = "en";

// Nosso extrator de idioma
#[derive(Debug, Clone)]
pub struct Locale(pub String);

impl Locale {
    /// "az-Latn-AZ,az;q=0.9" -> "az"
    pub fn from_header(value: Option<&str>) -> Self {
        let lang = value
            .and_then(|header_str| {
                accept_language::parse(header_str)
                    .first() // Pega o primeiro idioma (ex: "pt-BR")
                    .map(|tag| tag.split('-').next().unwrap_or(tag.as_str()).to_lowercase())
            })
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| DEFAULT_LANG.to_string());

        Locale(lang)
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());

        Ok(Locale::from_header(header_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_primary_subtag_of_preferred_language() {
        assert_eq!(Locale::from_header(Some("az-AZ,en;q=0.8")).0, "az");
        assert_eq!(Locale::from_header(Some("en;q=0.5, pt-BR")).0, "pt");
        assert_eq!(Locale::from_header(None).0, "en");
        assert_eq!(Locale::from_header(Some("")).0, "en");
    }
}
