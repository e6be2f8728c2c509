use chrono::NaiveDate;

use crate::database_ops::tmdb::models::{MovieCredits, MovieDetail};
use crate::database_ops::write_ops::{MovieRow, WriteOp};

/// Top-billed cast members kept per movie.
pub const CAST_LIMIT: usize = 10;

const DIRECTOR_JOB: &str = "Director";
const WRITER_JOBS: [&str; 3] = ["Writer", "Screenplay", "Story"];

fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn movie_row(detail: &MovieDetail) -> MovieRow {
    MovieRow {
        movie_id: detail.id,
        title: detail.title.clone(),
        release_date: parse_release_date(&detail.release_date),
        duration_minutes: detail.runtime,
        rating: detail.vote_average,
        synopsis: detail.overview.clone(),
        overview: detail.overview.clone(),
        adult: detail.adult,
        budget: detail.budget,
        revenue: detail.revenue,
        tagline: detail.tagline.clone(),
    }
}

/// Turn one detail record (plus credits, when fetched) into the movie's write batch.
///
/// Emission order: movie upsert; genre + link per genre; producer per company with
/// the primary-producer update right after the first one; top `CAST_LIMIT` actors
/// + links; then per crew entry a director pair and/or a writer pair. A crew member
/// listed under several writing jobs yields one writer pair per listing.
pub fn normalize(detail: &MovieDetail, credits: Option<&MovieCredits>) -> Vec<WriteOp> {
    let movie_id = detail.id;
    let mut ops = vec![WriteOp::UpsertMovie(movie_row(detail))];

    for genre in &detail.genres {
        ops.push(WriteOp::InsertGenre {
            genre_id: genre.id,
            genre_name: genre.name.clone(),
        });
        ops.push(WriteOp::LinkMovieGenre {
            movie_id,
            genre_id: genre.id,
        });
    }

    for (idx, company) in detail.production_companies.iter().enumerate() {
        ops.push(WriteOp::InsertProducer {
            producer_id: company.id,
            company_name: company.name.clone(),
            origin_country: company.origin_country.clone(),
        });
        if idx == 0 {
            ops.push(WriteOp::SetPrimaryProducer {
                movie_id,
                producer_id: company.id,
            });
        }
    }

    let Some(credits) = credits else {
        return ops;
    };

    for actor in credits.cast.iter().take(CAST_LIMIT) {
        ops.push(WriteOp::InsertActor {
            actor_id: actor.id,
            name: actor.name.clone(),
        });
        ops.push(WriteOp::LinkActedIn {
            movie_id,
            actor_id: actor.id,
        });
    }

    for member in &credits.crew {
        if member.job == DIRECTOR_JOB {
            ops.push(WriteOp::InsertDirector {
                director_id: member.id,
                full_name: member.name.clone(),
            });
            ops.push(WriteOp::LinkMovieDirector {
                movie_id,
                director_id: member.id,
            });
        } else if WRITER_JOBS.contains(&member.job.as_str()) {
            ops.push(WriteOp::InsertWriter {
                writer_id: member.id,
                full_name: member.name.clone(),
            });
            ops.push(WriteOp::LinkMovieWriter {
                movie_id,
                writer_id: member.id,
            });
        }
    }

    ops
}
