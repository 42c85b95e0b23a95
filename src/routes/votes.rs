use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::{headers::Cookie, typed_header::TypedHeader};
use chrono::Utc;
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::{NewAnonymousVote, NewUserVote, Photo, PhotoState, UserVote, STATE_ACCEPTED},
    rally::find_active_rally,
    schema::{anonymous_votes_control, photography, user_votes_control, users},
    state::AppState,
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

use super::photos::find_photo;

const VOTER_COOKIE_NAME: &str = "voter_id";
const MAX_COOKIE_ID_LEN: usize = 64;

pub const DEFAULT_RANKING_LIMIT: i64 = 10;
pub const MAX_RANKING_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct UserVoteRequest {
    pub id_user: i32,
    pub id_photo: i32,
}

#[derive(Deserialize)]
pub struct AnonymousVoteRequest {
    pub id_photo: i32,
    pub cookie_id: Option<String>,
}

/// Identities used to detect repeat anonymous votes. A vote is refused when
/// either the cookie or the address has already voted for the photo.
struct AnonymousVoter {
    cookie_id: Option<String>,
    ip_address: Option<String>,
}

impl AnonymousVoter {
    fn new(cookie_id: Option<String>, ip_address: Option<String>) -> Option<Self> {
        if cookie_id.is_none() && ip_address.is_none() {
            return None;
        }
        Some(Self {
            cookie_id,
            ip_address,
        })
    }
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub id_vote: i32,
    pub id_photo: i32,
    pub total_votes: i32,
}

#[derive(Serialize)]
pub struct PhotoVotesResponse {
    pub id_photo: i32,
    pub total_votes: i32,
}

#[derive(Deserialize)]
pub struct UserVotesQuery {
    pub id_user: i32,
}

#[derive(Deserialize)]
pub struct RankingQuery {
    pub rally_id: Option<i32>,
    pub limit: Option<i64>,
}

#[derive(Serialize, Queryable)]
pub struct RankingEntry {
    pub id_photo: i32,
    pub id_user: Option<i32>,
    pub title: String,
    pub total_votes: i32,
    pub id_rally: i32,
}

pub async fn record_user_vote(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UserVoteRequest>,
) -> AppResult<(StatusCode, Json<VoteResponse>)> {
    let mut conn = state.db()?;

    let response = conn.transaction::<VoteResponse, AppError, _>(|conn| {
        let photo = find_photo(conn, payload.id_photo)?;
        ensure_votable(&photo)?;

        users::table
            .find(payload.id_user)
            .select(users::id_user)
            .first::<i32>(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("user not found"))?;

        let already: i64 = user_votes_control::table
            .filter(user_votes_control::id_user.eq(payload.id_user))
            .filter(user_votes_control::id_photo.eq(payload.id_photo))
            .count()
            .get_result(conn)?;
        if already > 0 {
            return Err(already_voted());
        }

        let id_vote = diesel::insert_into(user_votes_control::table)
            .values(&NewUserVote {
                id_user: payload.id_user,
                id_photo: photo.id_photo,
                id_rally: photo.id_rally,
            })
            .returning(user_votes_control::id_vote)
            .get_result::<i32>(conn)
            .map_err(map_vote_conflict)?;

        let total_votes = increment_votes(conn, photo.id_photo)?;
        Ok(VoteResponse {
            id_vote,
            id_photo: photo.id_photo,
            total_votes,
        })
    })?;

    info!(
        id_user = payload.id_user,
        id_photo = response.id_photo,
        total_votes = response.total_votes,
        "recorded user vote"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn record_anonymous_vote(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    cookies: Option<TypedHeader<Cookie>>,
    ApiJson(payload): ApiJson<AnonymousVoteRequest>,
) -> AppResult<(StatusCode, Json<VoteResponse>)> {
    let cookie_id = payload
        .cookie_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            cookies
                .as_ref()
                .and_then(|TypedHeader(jar)| jar.get(VOTER_COOKIE_NAME))
                .map(str::to_string)
        });
    if cookie_id
        .as_ref()
        .is_some_and(|value| value.len() > MAX_COOKIE_ID_LEN)
    {
        return Err(AppError::bad_request("cookie_id is too long"));
    }

    let ip_address =
        client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)).map(|ip| ip.to_string());
    let voter = AnonymousVoter::new(cookie_id, ip_address).ok_or_else(|| {
        AppError::bad_request("anonymous votes need a voter cookie or a client address")
    })?;

    let mut conn = state.db()?;
    let response = conn.transaction::<VoteResponse, AppError, _>(|conn| {
        let photo = find_photo(conn, payload.id_photo)?;
        ensure_votable(&photo)?;

        let previous = anonymous_votes_control::table
            .filter(anonymous_votes_control::id_photo.eq(photo.id_photo))
            .into_boxed();
        let previous = match (&voter.cookie_id, &voter.ip_address) {
            (Some(cookie), Some(ip)) => previous.filter(
                anonymous_votes_control::cookie_id
                    .eq(cookie)
                    .or(anonymous_votes_control::ip_address.eq(ip)),
            ),
            (Some(cookie), None) => previous.filter(anonymous_votes_control::cookie_id.eq(cookie)),
            (None, Some(ip)) => previous.filter(anonymous_votes_control::ip_address.eq(ip)),
            (None, None) => previous,
        };
        let already: i64 = previous.count().get_result(conn)?;
        if already > 0 {
            return Err(already_voted());
        }

        let id_vote = diesel::insert_into(anonymous_votes_control::table)
            .values(&NewAnonymousVote {
                id_photo: photo.id_photo,
                id_rally: photo.id_rally,
                cookie_id: voter.cookie_id.clone(),
                ip_address: voter.ip_address.clone(),
            })
            .returning(anonymous_votes_control::id_vote)
            .get_result::<i32>(conn)
            .map_err(map_vote_conflict)?;

        let total_votes = increment_votes(conn, photo.id_photo)?;
        Ok(VoteResponse {
            id_vote,
            id_photo: photo.id_photo,
            total_votes,
        })
    })?;

    info!(
        id_photo = response.id_photo,
        total_votes = response.total_votes,
        has_cookie = voter.cookie_id.is_some(),
        "recorded anonymous vote"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_user_votes(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserVotesQuery>,
) -> AppResult<Json<Vec<UserVote>>> {
    let mut conn = state.db()?;
    let votes: Vec<UserVote> = user_votes_control::table
        .filter(user_votes_control::id_user.eq(query.id_user))
        .order(user_votes_control::id_vote.asc())
        .load(&mut conn)?;
    Ok(Json(votes))
}

pub async fn photo_votes(
    State(state): State<AppState>,
    ApiPath(id_photo): ApiPath<i32>,
) -> AppResult<Json<PhotoVotesResponse>> {
    let mut conn = state.db()?;
    let photo = find_photo(&mut conn, id_photo)?;
    Ok(Json(PhotoVotesResponse {
        id_photo: photo.id_photo,
        total_votes: photo.total_votes,
    }))
}

pub async fn rankings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RankingQuery>,
) -> AppResult<Json<Vec<RankingEntry>>> {
    let limit = clamp_limit(query.limit);
    let mut conn = state.db()?;

    let id_rally = match query.rally_id {
        Some(id_rally) => id_rally,
        None => {
            find_active_rally(&mut conn, Utc::now().date_naive())?
                .ok_or_else(|| AppError::not_found_with("no active rally"))?
                .id_rally
        }
    };

    let entries: Vec<RankingEntry> = photography::table
        .filter(photography::id_rally.eq(id_rally))
        .filter(photography::state.eq(STATE_ACCEPTED))
        .order((photography::total_votes.desc(), photography::id_photo.asc()))
        .limit(limit)
        .select((
            photography::id_photo,
            photography::id_user,
            photography::title,
            photography::total_votes,
            photography::id_rally,
        ))
        .load(&mut conn)?;

    Ok(Json(entries))
}

fn ensure_votable(photo: &Photo) -> AppResult<()> {
    if photo.state != PhotoState::Accepted.as_str() {
        return Err(AppError::bad_request("only accepted photos can receive votes"));
    }
    Ok(())
}

fn increment_votes(conn: &mut PgConnection, id_photo: i32) -> AppResult<i32> {
    Ok(diesel::update(photography::table.find(id_photo))
        .set(photography::total_votes.eq(photography::total_votes + 1))
        .returning(photography::total_votes)
        .get_result::<i32>(conn)?)
}

fn already_voted() -> AppError {
    AppError::bad_request("already voted for this photo")
}

fn map_vote_conflict(err: diesel::result::Error) -> AppError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => already_voted(),
        other => AppError::from(other),
    }
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_RANKING_LIMIT)
        .clamp(1, MAX_RANKING_LIMIT)
}

/// First `X-Forwarded-For` hop, falling back to the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
}
