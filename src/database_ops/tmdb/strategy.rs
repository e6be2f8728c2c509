//! Discovery strategies: named paging sources with a per-strategy page cap, and the
//! two built-in profiles the collector runs.

/// Criteria for `/discover/movie`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverCriteria {
    pub sort_by: String,
    pub min_vote_count: u32,
    pub origin_country: Option<String>,
    pub language: Option<String>,
}

impl DiscoverCriteria {
    pub fn sorted_by(sort_by: &str, min_vote_count: u32) -> Self {
        Self {
            sort_by: sort_by.to_string(),
            min_vote_count,
            origin_country: None,
            language: None,
        }
    }

    pub fn from_country(mut self, country: &str) -> Self {
        self.origin_country = Some(country.to_string());
        self
    }

    pub fn in_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }
}

/// Term for `/search/movie`, optionally localized.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub term: String,
    pub language: Option<String>,
    pub region: Option<String>,
}

impl SearchQuery {
    pub fn new(term: &str) -> Self {
        Self {
            term: term.to_string(),
            language: None,
            region: None,
        }
    }

    pub fn localized(mut self, language: &str, region: &str) -> Self {
        self.language = Some(language.to_string());
        self.region = Some(region.to_string());
        self
    }
}

/// Curated `/movie/{list}` listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieList {
    Popular,
    TopRated,
    NowPlaying,
    Upcoming,
}

impl MovieList {
    pub fn path(self) -> &'static str {
        match self {
            MovieList::Popular => "popular",
            MovieList::TopRated => "top_rated",
            MovieList::NowPlaying => "now_playing",
            MovieList::Upcoming => "upcoming",
        }
    }
}

/// Which catalog endpoint a strategy pages through.
#[derive(Debug, Clone, PartialEq)]
pub enum PageSource {
    Discover(DiscoverCriteria),
    Search(SearchQuery),
    List(MovieList),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub label: String,
    pub source: PageSource,
    /// Highest page number requested; pages run 1..=page_cap.
    pub page_cap: u32,
}

impl Strategy {
    pub fn new(label: impl Into<String>, source: PageSource, page_cap: u32) -> Self {
        Self {
            label: label.into(),
            source,
            page_cap,
        }
    }

    pub fn discover(label: impl Into<String>, criteria: DiscoverCriteria, page_cap: u32) -> Self {
        Self::new(label, PageSource::Discover(criteria), page_cap)
    }

    pub fn search(query: SearchQuery, page_cap: u32) -> Self {
        Self::new(format!("search_{}", query.term), PageSource::Search(query), page_cap)
    }

    pub fn list(list: MovieList, page_cap: u32) -> Self {
        Self::new(list.path(), PageSource::List(list), page_cap)
    }
}

const BRAZILIAN_DISCOVER_SORTS: [&str; 4] = [
    "popularity.desc",
    "vote_average.desc",
    "release_date.desc",
    "revenue.desc",
];

const BRAZILIAN_SEARCH_TERMS: [&str; 8] = [
    "brazil",
    "brasil",
    "cinema brasileiro",
    "filme brasileiro",
    "rio de janeiro",
    "são paulo",
    "favela",
    "ditadura",
];

const POPULAR_DISCOVER_SORTS: [(&str, &str); 4] = [
    ("discover_popularity", "popularity.desc"),
    ("discover_rating", "vote_average.desc"),
    ("discover_revenue", "revenue.desc"),
    ("discover_release", "release_date.desc"),
];

/// Built-in collection profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CollectionProfile {
    /// Brazilian-origin movies, verified against each movie's detail.
    Brazilian,
    /// Broad popular catalogue, accepted without verification.
    Popular,
}

impl CollectionProfile {
    pub fn name(self) -> &'static str {
        match self {
            CollectionProfile::Brazilian => "brazilian",
            CollectionProfile::Popular => "popular",
        }
    }

    pub fn strategies(self) -> Vec<Strategy> {
        match self {
            CollectionProfile::Brazilian => {
                let discover = BRAZILIAN_DISCOVER_SORTS.iter().map(|sort| {
                    let criteria = DiscoverCriteria::sorted_by(sort, 5)
                        .from_country("BR")
                        .in_language("pt-BR");
                    Strategy::discover(format!("discover_{sort}"), criteria, 50)
                });
                let search = BRAZILIAN_SEARCH_TERMS
                    .iter()
                    .map(|term| Strategy::search(SearchQuery::new(term).localized("pt-BR", "BR"), 10));
                discover.chain(search).collect()
            }
            CollectionProfile::Popular => {
                let lists = [
                    MovieList::Popular,
                    MovieList::TopRated,
                    MovieList::NowPlaying,
                    MovieList::Upcoming,
                ]
                .into_iter()
                .map(|list| Strategy::list(list, 25));
                let discover = POPULAR_DISCOVER_SORTS.iter().map(|(label, sort)| {
                    Strategy::discover(*label, DiscoverCriteria::sorted_by(sort, 100), 25)
                });
                lists.chain(discover).collect()
            }
        }
    }

    /// Whether each candidate must pass the membership filter before it is accepted.
    pub fn requires_membership(self) -> bool {
        matches!(self, CollectionProfile::Brazilian)
    }

    pub fn default_target(self) -> usize {
        match self {
            CollectionProfile::Brazilian => 100,
            CollectionProfile::Popular => 500,
        }
    }

    pub fn default_batch_size(self) -> usize {
        match self {
            CollectionProfile::Brazilian => 25,
            CollectionProfile::Popular => 50,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CollectionProfile::Brazilian => "Collection of Brazilian movies from TMDB",
            CollectionProfile::Popular => "Collection of popular movies from TMDB",
        }
    }
}
