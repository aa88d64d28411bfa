// 🏷️ Listing Store - Published listings + audit trail (SQLite)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a published listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    Published,
    UnderOffer,
    Sold,
    Withdrawn,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Published => "published",
            ListingStatus::UnderOffer => "under_offer",
            ListingStatus::Sold => "sold",
            ListingStatus::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for ListingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(ListingStatus::Draft),
            "published" => Ok(ListingStatus::Published),
            "under_offer" => Ok(ListingStatus::UnderOffer),
            "sold" => Ok(ListingStatus::Sold),
            "withdrawn" => Ok(ListingStatus::Withdrawn),
            other => anyhow::bail!("Unknown listing status: {}", other),
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_handover() -> String {
    "Immediate".to_string()
}

/// Seller-supplied listing fields, as sent from the final wizard step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDraft {
    #[serde(default)]
    pub asking_price: Option<f64>,

    #[serde(default)]
    pub assets_included: Vec<String>,

    #[serde(default)]
    pub transfer_timeline: Option<String>,

    #[serde(default = "default_handover")]
    pub handover_type: String,
}

/// Persisted listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Stable identity (UUID)
    pub id: String,
    pub business_id: String,
    pub asking_price: Option<f64>,
    pub assets_included: Vec<String>,
    pub transfer_timeline: Option<String>,
    pub handover_type: String,
    pub status: ListingStatus,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" instead
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS listings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            listing_uuid TEXT UNIQUE NOT NULL,
            business_id TEXT NOT NULL,
            asking_price REAL,
            assets_included TEXT NOT NULL,
            transfer_timeline TEXT,
            handover_type TEXT NOT NULL,
            status TEXT NOT NULL,
            views_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_listings_business ON listings(business_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

const LISTING_COLUMNS: &str = "listing_uuid, business_id, asking_price, assets_included,
    transfer_timeline, handover_type, status, views_count, created_at";

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let assets_json: String = row.get(3)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(8)?;

    let status = status_str
        .parse::<ListingStatus>()
        .map_err(|e| conversion_error(6, std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))?;

    Ok(Listing {
        id: row.get(0)?,
        business_id: row.get(1)?,
        asking_price: row.get(2)?,
        assets_included: serde_json::from_str(&assets_json).map_err(|e| conversion_error(3, e))?,
        transfer_timeline: row.get(4)?,
        handover_type: row.get(5)?,
        status,
        views_count: row.get(7)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| conversion_error(8, e))?
            .with_timezone(&Utc),
    })
}

/// Publish a listing for a business
pub fn create_listing(conn: &Connection, business_id: &str, draft: &ListingDraft) -> Result<Listing> {
    let listing = Listing {
        id: uuid::Uuid::new_v4().to_string(),
        business_id: business_id.to_string(),
        asking_price: draft.asking_price,
        assets_included: draft.assets_included.clone(),
        transfer_timeline: draft.transfer_timeline.clone(),
        handover_type: draft.handover_type.clone(),
        status: ListingStatus::Published,
        views_count: 0,
        created_at: Utc::now(),
    };

    let assets_json = serde_json::to_string(&listing.assets_included)?;

    conn.execute(
        &format!("INSERT INTO listings ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)", LISTING_COLUMNS),
        params![
            listing.id,
            listing.business_id,
            listing.asking_price,
            assets_json,
            listing.transfer_timeline,
            listing.handover_type,
            listing.status.as_str(),
            listing.views_count,
            listing.created_at.to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to insert listing for business {}", business_id))?;

    let event = Event::new(
        "listing_published",
        "listing",
        &listing.id,
        serde_json::json!({
            "business_id": listing.business_id,
            "asking_price": listing.asking_price,
        }),
        "listing_service",
    );
    insert_event(conn, &event)?;

    tracing::info!(listing_id = %listing.id, business_id, "listing published");

    Ok(listing)
}

pub fn get_listing(conn: &Connection, listing_id: &str) -> Result<Option<Listing>> {
    let listing = conn
        .query_row(
            &format!("SELECT {} FROM listings WHERE listing_uuid = ?1", LISTING_COLUMNS),
            params![listing_id],
            listing_from_row,
        )
        .optional()?;

    Ok(listing)
}

/// All listings for a business, oldest first
pub fn get_business_listings(conn: &Connection, business_id: &str) -> Result<Vec<Listing>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM listings WHERE business_id = ?1 ORDER BY id ASC",
        LISTING_COLUMNS
    ))?;

    let listings = stmt
        .query_map(params![business_id], listing_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(listings)
}

/// Change status; returns the updated listing, or None if it does not exist
pub fn update_listing_status(
    conn: &Connection,
    listing_id: &str,
    status: ListingStatus,
) -> Result<Option<Listing>> {
    let changed = conn.execute(
        "UPDATE listings SET status = ?1 WHERE listing_uuid = ?2",
        params![status.as_str(), listing_id],
    )?;

    if changed == 0 {
        return Ok(None);
    }

    let event = Event::new(
        "listing_status_changed",
        "listing",
        listing_id,
        serde_json::json!({ "status": status.as_str() }),
        "listing_service",
    );
    insert_event(conn, &event)?;

    get_listing(conn, listing_id)
}

/// Returns false when the listing does not exist
pub fn increment_views(conn: &Connection, listing_id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE listings SET views_count = views_count + 1 WHERE listing_uuid = ?1",
        params![listing_id],
    )?;

    Ok(changed > 0)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| conversion_error(1, e))?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| conversion_error(5, e))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn count_listings(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;

    Ok(count)
}
