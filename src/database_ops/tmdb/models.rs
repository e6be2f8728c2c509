// ---------- TMDB API Shapes (minimal) ----------
// Only the fields the collector and normalizer read are modeled; everything else is ignored.
// TMDB sends `null` for many optional strings and arrays, so those decode to empty values.

use serde::{Deserialize, Deserializer, Serialize};

/// Catalog identifier; also the primary key of every relational row we write.
pub type MovieId = i64;

fn null_to_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// One page of a paged listing (`/discover/movie`, `/search/movie`, `/movie/popular`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoviePage {
    #[serde(default)]
    pub page: u32,
    #[serde(default, deserialize_with = "null_to_default")]
    pub results: Vec<MovieListItem>,
}

impl MoviePage {
    pub fn of(page: u32, results: Vec<MovieListItem>) -> Self {
        Self { page, results }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieListItem {
    pub id: MovieId,
    #[serde(default, deserialize_with = "null_to_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub original_title: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub release_date: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub vote_average: f64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub popularity: f64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub overview: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub original_language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionCompany {
    pub id: i64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub origin_country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionCountry {
    #[serde(default, deserialize_with = "null_to_default")]
    pub iso_3166_1: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub name: String,
}

/// `/movie/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
    pub id: MovieId,
    #[serde(default, deserialize_with = "null_to_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub original_title: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub release_date: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub runtime: i32,
    #[serde(default, deserialize_with = "null_to_default")]
    pub vote_average: f64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub popularity: f64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub overview: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub adult: bool,
    #[serde(default, deserialize_with = "null_to_default")]
    pub budget: i64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub revenue: i64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub tagline: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub genres: Vec<Genre>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub production_companies: Vec<ProductionCompany>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub original_language: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub production_countries: Vec<ProductionCountry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: i64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub character: String,
    #[serde(default)]
    pub order: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    pub id: i64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub job: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub department: String,
}

/// `/movie/{id}/credits`. Cast arrives in billing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieCredits {
    #[serde(default)]
    pub id: MovieId,
    #[serde(default, deserialize_with = "null_to_default")]
    pub cast: Vec<CastMember>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub crew: Vec<CrewMember>,
}
