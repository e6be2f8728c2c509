use crate::database_ops::tmdb::models::MovieDetail;

/// Domain-membership predicate over a fetched detail record.
///
/// A movie is a member when its production countries include `country` OR its
/// original language equals `language`. Either signal is sufficient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipFilter {
    country: String,
    language: String,
}

impl MembershipFilter {
    pub fn new(country: &str, language: &str) -> Self {
        Self {
            country: country.to_string(),
            language: language.to_string(),
        }
    }

    /// Brazilian origin: produced in BR or originally in Portuguese.
    pub fn brazilian() -> Self {
        Self::new("BR", "pt")
    }

    /// `None` (detail missing or its fetch failed) is never a member.
    pub fn is_member(&self, detail: Option<&MovieDetail>) -> bool {
        let Some(detail) = detail else {
            return false;
        };
        detail
            .production_countries
            .iter()
            .any(|c| c.iso_3166_1 == self.country)
            || detail.original_language == self.language
    }
}
