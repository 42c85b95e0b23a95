//! Admission control for photo uploads.
//!
//! A photo is accepted only when a rally is active and configured, the
//! uploader is under that rally's per-user cap, and the uploader has not
//! already submitted byte-identical content. The checks and the insert share
//! one transaction that holds a row lock on the uploader, so concurrent
//! uploads from the same account are serialised.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::AppError;
use crate::models::{NewPhoto, Photo, STATE_PENDING};
use crate::rally::find_active_config;
use crate::schema::{photography, users};

const DATA_URL_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("file must be a data:image/<type>;base64 URL")]
    NotImageDataUrl,
    #[error("file has an empty image payload")]
    EmptyPayload,
    #[error("file payload is not valid base64")]
    InvalidBase64,
}

/// A validated `data:image/<subtype>;base64,<payload>` string.
#[derive(Debug)]
pub struct ImageDataUrl<'a> {
    pub subtype: &'a str,
    pub payload: &'a str,
}

impl<'a> ImageDataUrl<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, DataUrlError> {
        let rest = raw
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or(DataUrlError::NotImageDataUrl)?;
        let (subtype, payload) = rest
            .split_once(BASE64_MARKER)
            .ok_or(DataUrlError::NotImageDataUrl)?;
        if subtype.is_empty() || subtype.contains(';') {
            return Err(DataUrlError::NotImageDataUrl);
        }
        if payload.is_empty() {
            return Err(DataUrlError::EmptyPayload);
        }
        STANDARD
            .decode(payload)
            .map_err(|_| DataUrlError::InvalidBase64)?;
        Ok(Self { subtype, payload })
    }
}

pub fn file_checksum(file: &str) -> String {
    hex::encode(Sha256::digest(file.as_bytes()))
}

pub fn within_cap(existing: i64, max_photos_user: i32) -> bool {
    existing < i64::from(max_photos_user)
}

#[derive(Debug)]
pub struct UploadRequest {
    pub id_user: i32,
    pub title: String,
    pub description: Option<String>,
    pub file: String,
    pub id_rally: Option<i32>,
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("no active rally or the rally has no configuration")]
    NoActiveRally,
    #[error("photos can only be submitted to the active rally ({0})")]
    WrongRally(i32),
    #[error("user not found")]
    UnknownUser,
    #[error("photo limit reached for this rally")]
    LimitReached,
    #[error("photo already uploaded")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl From<AdmissionError> for AppError {
    fn from(value: AdmissionError) -> Self {
        match value {
            AdmissionError::UnknownUser => AppError::not_found_with(value.to_string()),
            AdmissionError::Database(err) => AppError::from(err),
            other => AppError::bad_request(other.to_string()),
        }
    }
}

/// Runs every admission check and inserts the photo as pending.
pub fn admit_photo(
    conn: &mut PgConnection,
    request: UploadRequest,
    today: NaiveDate,
) -> Result<Photo, AdmissionError> {
    let checksum = file_checksum(&request.file);

    conn.transaction::<Photo, AdmissionError, _>(|conn| {
        let (rally, config) =
            find_active_config(conn, today)?.ok_or(AdmissionError::NoActiveRally)?;

        if let Some(requested) = request.id_rally {
            if requested != rally.id_rally {
                return Err(AdmissionError::WrongRally(rally.id_rally));
            }
        }

        users::table
            .find(request.id_user)
            .select(users::id_user)
            .for_update()
            .get_result::<i32>(conn)
            .optional()?
            .ok_or(AdmissionError::UnknownUser)?;

        let existing: i64 = photography::table
            .filter(photography::id_user.eq(Some(request.id_user)))
            .filter(photography::id_rally.eq(rally.id_rally))
            .count()
            .get_result(conn)?;
        if !within_cap(existing, config.max_photos_user) {
            return Err(AdmissionError::LimitReached);
        }

        let duplicates: i64 = photography::table
            .filter(photography::id_user.eq(Some(request.id_user)))
            .filter(photography::file_checksum.eq(&checksum))
            .filter(photography::file.eq(&request.file))
            .count()
            .get_result(conn)?;
        if duplicates > 0 {
            return Err(AdmissionError::Duplicate);
        }

        let new_photo = NewPhoto {
            id_user: Some(request.id_user),
            title: request.title.trim().to_string(),
            description: request.description.clone(),
            file: request.file.clone(),
            file_checksum: checksum.clone(),
            state: STATE_PENDING.to_string(),
            id_rally: rally.id_rally,
        };

        let photo = diesel::insert_into(photography::table)
            .values(&new_photo)
            .get_result::<Photo>(conn)?;
        Ok(photo)
    })
}
