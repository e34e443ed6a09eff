//! A bounded, persisted feed of activity records.
//!
//! The feed is refreshed from a JSON endpoint that returns an array of
//! records, newest first. New records are prepended to the stored ones, and the
//! list is truncated to a fixed size. The `Last-Modified` header of the latest
//! response is stored alongside and sent back as `If-Modified-Since`.
use super::{BehaviorRelay, DisposeBag, Observable, ReplaySubject, Request, Response, Session};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::StatusCode;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_LIMIT: usize = 50;

const RECORDS_FILE_NAME: &str = "events.json";
const MODIFIED_FILE_NAME: &str = "modified.txt";

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("JSON error")]
    Json(#[from] serde_json::Error),
    #[error("Request error")]
    Request(#[from] super::Error),
    #[error("Invalid header value")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Actor {
    #[serde(rename = "login")]
    pub name: String,
    #[serde(rename = "avatar_url", default)]
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Repo {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Record {
    pub id: String,
    #[serde(rename = "type")]
    pub action: String,
    pub actor: Actor,
    pub repo: Repo,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record {
    /// A one-line description, e.g. `octocat: rust-lang/rust, push`.
    pub fn summary(&self) -> String {
        format!(
            "{}: {}, {}",
            self.actor.name,
            self.repo.name,
            self.action.replace("Event", "").to_lowercase()
        )
    }
}

/// Prepend `fresh` records to `existing` ones, skipping duplicate IDs and
/// keeping at most `limit` records.
pub fn merge_records(fresh: Vec<Record>, existing: Vec<Record>, limit: usize) -> Vec<Record> {
    let mut seen = HashSet::new();

    fresh
        .into_iter()
        .chain(existing)
        .filter(|record| seen.insert(record.id.clone()))
        .take(limit)
        .collect()
}

/// File storage for the records and the last modification marker.
#[derive(Clone, Debug)]
pub struct FeedStore {
    base: PathBuf,
}

impl FeedStore {
    pub fn new<P: AsRef<Path>>(base: P) -> Result<Self, Error> {
        std::fs::create_dir_all(&base)?;

        Ok(Self {
            base: base.as_ref().to_path_buf(),
        })
    }

    pub fn records_path(&self) -> PathBuf {
        self.base.join(RECORDS_FILE_NAME)
    }

    pub fn modified_path(&self) -> PathBuf {
        self.base.join(MODIFIED_FILE_NAME)
    }

    /// Load the persisted records, or an empty list if there are none yet.
    pub fn load_records(&self) -> Result<Vec<Record>, Error> {
        let path = self.records_path();

        if path.is_file() {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        } else {
            Ok(vec![])
        }
    }

    pub fn save_records(&self, records: &[Record]) -> Result<(), Error> {
        let path = self.records_path();
        let tmp_path = path.with_extension("json.tmp");

        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer(&mut writer, records)?;
        writer.flush()?;
        drop(writer);

        Ok(std::fs::rename(tmp_path, path)?)
    }

    pub fn load_last_modified(&self) -> Result<Option<String>, Error> {
        let path = self.modified_path();

        if path.is_file() {
            let value = std::fs::read_to_string(path)?;
            let trimmed = value.trim();

            Ok(if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            })
        } else {
            Ok(None)
        }
    }

    pub fn save_last_modified(&self, value: &str) -> Result<(), Error> {
        Ok(std::fs::write(self.modified_path(), value)?)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Refresh {
    pub status: StatusCode,
    pub added: usize,
    pub last_modified: Option<String>,
    /// A successful response whose body was not a list of records.
    pub undecodable: bool,
}

pub struct Feed {
    session: Session,
    store: FeedStore,
    limit: usize,
    records: Arc<BehaviorRelay<Vec<Record>>>,
    last_modified: Arc<BehaviorRelay<Option<String>>>,
}

impl Feed {
    /// Open a feed, starting from whatever the store already holds.
    pub fn open(session: Session, store: FeedStore, limit: usize) -> Result<Self, Error> {
        let records = store.load_records()?;
        let last_modified = store.load_last_modified()?;

        log::info!("Loaded {} stored records", records.len());

        Ok(Self {
            session,
            store,
            limit,
            records: Arc::new(BehaviorRelay::new(records)),
            last_modified: Arc::new(BehaviorRelay::new(last_modified)),
        })
    }

    /// The current records, followed by every update.
    pub fn records(&self) -> Observable<Vec<Record>> {
        self.records.as_observable()
    }

    pub fn current(&self) -> Vec<Record> {
        self.records.value()
    }

    pub fn last_modified(&self) -> Option<String> {
        self.last_modified.value()
    }

    /// Fetch the endpoint once and merge and persist anything new.
    ///
    /// A `304 Not Modified` (or any other non-2xx) response leaves the records
    /// untouched. A transport failure is returned as an error.
    pub async fn refresh(&self, url: &str) -> Result<Refresh, Error> {
        let mut request = Request::parse(url)?;
        if let Some(value) = self.last_modified.value() {
            request = request.with_header(IF_MODIFIED_SINCE, HeaderValue::from_str(&value)?);
        }

        let response = ReplaySubject::new(1);
        let responses = response
            .as_observable()
            .filter_map(|result: Result<Response, super::Error>| result.ok());
        let bag = DisposeBag::new();

        let before = self.records.value();
        let records = self.records.clone();
        let limit = self.limit;
        let undecodable = Arc::new(AtomicBool::new(false));
        let flag = undecodable.clone();
        responses
            .filter(|response| response.is_success())
            .map(move |response| {
                serde_json::from_slice::<Vec<Record>>(&response.body).unwrap_or_else(|error| {
                    log::warn!("Ignoring undecodable records: {}", error);
                    flag.store(true, Ordering::SeqCst);
                    vec![]
                })
            })
            .filter(|fresh| !fresh.is_empty())
            .subscribe_next(move |fresh| {
                records.accept(merge_records(fresh, records.value(), limit));
            })
            .disposed_by(&bag);

        let last_modified = self.last_modified.clone();
        responses
            .filter(|response| response.status.is_success() || response.status.is_redirection())
            .filter_map(|response| response.header(&LAST_MODIFIED).map(str::to_string))
            .subscribe_next(move |value| last_modified.accept(Some(value)))
            .disposed_by(&bag);

        self.session.response(request).subscribe(response.clone()).disposed_by(&bag);

        let result = match response.as_observable().last().await? {
            Some(result) => result?,
            None => return Err(super::Error::InvalidResponse("no response".to_string()).into()),
        };

        let after = self.records.value();
        let known = before
            .iter()
            .map(|record| record.id.as_str())
            .collect::<HashSet<_>>();
        let added = after
            .iter()
            .filter(|record| !known.contains(record.id.as_str()))
            .count();

        if after != before {
            self.store.save_records(&after)?;
        }

        let last_modified = self.last_modified.value();
        if let Some(value) = &last_modified {
            self.store.save_last_modified(value)?;
        }

        log::info!("{} {}: {} new records", result.status, url, added);

        Ok(Refresh {
            status: result.status,
            added,
            last_modified,
            undecodable: undecodable.load(Ordering::SeqCst),
        })
    }
}
