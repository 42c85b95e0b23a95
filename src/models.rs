use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::*;

pub const ROLE_PARTICIPANT: &str = "participante";
pub const ROLE_ADMIN: &str = "administrador";

pub const STATE_PENDING: &str = "pendiente";
pub const STATE_ACCEPTED: &str = "aceptada";
pub const STATE_REJECTED: &str = "rechazada";

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 255;
pub const MAX_TITLE_LEN: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "participante")]
    Participant,
    #[serde(rename = "administrador")]
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Participant => ROLE_PARTICIPANT,
            Role::Admin => ROLE_ADMIN,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            ROLE_PARTICIPANT => Ok(Role::Participant),
            ROLE_ADMIN => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation state of an uploaded photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoState {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "aceptada")]
    Accepted,
    #[serde(rename = "rechazada")]
    Rejected,
}

impl PhotoState {
    pub fn as_str(self) -> &'static str {
        match self {
            PhotoState::Pending => STATE_PENDING,
            PhotoState::Accepted => STATE_ACCEPTED,
            PhotoState::Rejected => STATE_REJECTED,
        }
    }
}

impl FromStr for PhotoState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            STATE_PENDING => Ok(PhotoState::Pending),
            STATE_ACCEPTED => Ok(PhotoState::Accepted),
            STATE_REJECTED => Ok(PhotoState::Rejected),
            other => Err(format!("unknown photo state: {other}")),
        }
    }
}

impl fmt::Display for PhotoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(primary_key(id_user))]
pub struct User {
    pub id_user: i32,
    pub name: String,
    pub email: String,
    pub password: String,
    pub rol: String,
    pub creation_date: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub rol: String,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable)]
#[diesel(table_name = rallies)]
#[diesel(primary_key(id_rally))]
pub struct Rally {
    pub id_rally: i32,
    pub name: String,
    pub theme: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rallies)]
pub struct NewRally {
    pub name: String,
    pub theme: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Associations)]
#[diesel(table_name = configuration)]
#[diesel(primary_key(id_config))]
#[diesel(belongs_to(Rally, foreign_key = id_rally))]
pub struct RallyConfig {
    pub id_config: i32,
    pub id_rally: i32,
    pub max_photos_user: i32,
    pub upload_deadline: i32,
    pub voting_deadline: i32,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = configuration)]
pub struct NewRallyConfig {
    pub id_rally: i32,
    pub max_photos_user: i32,
    pub upload_deadline: i32,
    pub voting_deadline: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = photography)]
#[diesel(primary_key(id_photo))]
#[diesel(belongs_to(Rally, foreign_key = id_rally))]
pub struct Photo {
    pub id_photo: i32,
    pub id_user: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub file: String,
    pub file_checksum: String,
    pub state: String,
    pub upload_date: DateTime<Utc>,
    pub total_votes: i32,
    pub id_rally: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = photography)]
pub struct NewPhoto {
    pub id_user: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub file: String,
    pub file_checksum: String,
    pub state: String,
    pub id_rally: i32,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable)]
#[diesel(table_name = user_votes_control)]
#[diesel(primary_key(id_vote))]
pub struct UserVote {
    pub id_vote: i32,
    pub id_user: i32,
    pub id_photo: i32,
    pub id_rally: i32,
    pub vote_date: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_votes_control)]
pub struct NewUserVote {
    pub id_user: i32,
    pub id_photo: i32,
    pub id_rally: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = anonymous_votes_control)]
#[diesel(primary_key(id_vote))]
pub struct AnonymousVote {
    pub id_vote: i32,
    pub id_photo: i32,
    pub id_rally: i32,
    pub cookie_id: Option<String>,
    pub ip_address: Option<String>,
    pub vote_date: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = anonymous_votes_control)]
pub struct NewAnonymousVote {
    pub id_photo: i32,
    pub id_rally: i32,
    pub cookie_id: Option<String>,
    pub ip_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        assert_eq!("participante".parse::<Role>(), Ok(Role::Participant));
        assert_eq!("administrador".parse::<Role>(), Ok(Role::Admin));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn photo_state_string_matches_serde_name() {
        for state in [PhotoState::Pending, PhotoState::Accepted, PhotoState::Rejected] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, serde_json::Value::String(state.as_str().to_string()));
            assert_eq!(state.as_str().parse::<PhotoState>(), Ok(state));
        }
    }

    #[test]
    fn rejects_unknown_photo_state() {
        let err = "aprobada".parse::<PhotoState>().unwrap_err();
        assert!(err.contains("aprobada"));
    }
}
