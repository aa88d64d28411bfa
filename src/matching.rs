// 🤝 Match Engine - Rank buyers from a static catalog against a business profile
// Three signals: sector fit, investment range, preferred location

use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

// Scores are accumulated in tenths so threshold comparisons are exact.
const SECTOR_POINTS: u8 = 4;
const VALUATION_POINTS: u8 = 4;
const LOCATION_POINTS: u8 = 2;
const MAX_POINTS: u8 = 10;

/// Only scores strictly above 0.6 are reported
const THRESHOLD_POINTS: u8 = 6;

pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Length of the id prefix kept in the anonymized label
const ANONYMIZED_PREFIX_LEN: usize = 8;

// ============================================================================
// BUYER TYPE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuyerType {
    #[serde(rename = "VC Fund")]
    VcFund,

    #[serde(rename = "Entrepreneur")]
    Entrepreneur,

    #[serde(rename = "Corporate Investor")]
    CorporateInvestor,

    #[serde(other)]
    Other,
}

impl BuyerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuyerType::VcFund => "VC Fund",
            BuyerType::Entrepreneur => "Entrepreneur",
            BuyerType::CorporateInvestor => "Corporate Investor",
            BuyerType::Other => "Other",
        }
    }

    fn parse(s: &str) -> Self {
        match s.trim() {
            "VC Fund" => BuyerType::VcFund,
            "Entrepreneur" => BuyerType::Entrepreneur,
            "Corporate Investor" => BuyerType::CorporateInvestor,
            _ => BuyerType::Other,
        }
    }
}

// ============================================================================
// BUYER PROFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerProfile {
    pub id: String,

    #[serde(rename = "type")]
    pub buyer_type: BuyerType,

    pub display_name: String,

    pub preferred_sectors: BTreeSet<String>,

    pub min_investment: f64,

    pub max_investment: f64,

    pub preferred_locations: BTreeSet<String>,

    pub description: String,
}

impl BuyerProfile {
    /// Label exposed to sellers in place of the buyer id
    pub fn anonymized_id(&self) -> String {
        let prefix: String = self.id.chars().take(ANONYMIZED_PREFIX_LEN).collect();
        format!("BUYER_{}", prefix)
    }

    pub fn anonymize(&self) -> AnonymizedBuyer {
        AnonymizedBuyer {
            buyer_type: self.buyer_type.clone(),
            preferred_sectors: self.preferred_sectors.clone(),
            min_investment: self.min_investment,
            max_investment: self.max_investment,
            preferred_locations: self.preferred_locations.clone(),
            description: self.description.clone(),
        }
    }

    fn points_for(&self, business: &BusinessProfile) -> u8 {
        let mut points = 0;

        if self.preferred_sectors.contains(&business.sector) {
            points += SECTOR_POINTS;
        }

        if self.min_investment <= business.valuation && business.valuation <= self.max_investment {
            points += VALUATION_POINTS;
        }

        if self.preferred_locations.contains(&business.location) {
            points += LOCATION_POINTS;
        }

        points.min(MAX_POINTS)
    }

    /// Match score in [0, 1]
    pub fn match_score(&self, business: &BusinessProfile) -> f64 {
        f64::from(self.points_for(business)) / f64::from(MAX_POINTS)
    }
}

/// Buyer as shown to a seller: no id, no name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedBuyer {
    #[serde(rename = "type")]
    pub buyer_type: BuyerType,
    pub preferred_sectors: BTreeSet<String>,
    pub min_investment: f64,
    pub max_investment: f64,
    pub preferred_locations: BTreeSet<String>,
    pub description: String,
}

// ============================================================================
// BUSINESS PROFILE / MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessProfile {
    #[serde(default)]
    pub sector: String,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub valuation: f64,
}

impl BusinessProfile {
    pub fn new(sector: &str, location: &str, valuation: f64) -> Self {
        BusinessProfile {
            sector: sector.to_string(),
            location: location.to_string(),
            valuation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub buyer: AnonymizedBuyer,
    pub match_score: f64,
    pub anonymized_id: String,
}

// ============================================================================
// BUYER CATALOG
// ============================================================================

/// CSV row shape; list columns are `;`-separated
#[derive(Debug, Deserialize)]
struct BuyerRow {
    id: String,
    #[serde(rename = "type")]
    buyer_type: String,
    display_name: String,
    preferred_sectors: String,
    min_investment: f64,
    max_investment: f64,
    preferred_locations: String,
    description: String,
}

fn split_list(raw: &str) -> BTreeSet<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl From<BuyerRow> for BuyerProfile {
    fn from(row: BuyerRow) -> Self {
        BuyerProfile {
            id: row.id,
            buyer_type: BuyerType::parse(&row.buyer_type),
            display_name: row.display_name,
            preferred_sectors: split_list(&row.preferred_sectors),
            min_investment: row.min_investment,
            max_investment: row.max_investment,
            preferred_locations: split_list(&row.preferred_locations),
            description: row.description,
        }
    }
}

/// Read-only buyer reference data, loaded once and shared between engines
#[derive(Debug, Clone, PartialEq)]
pub struct BuyerCatalog {
    buyers: Vec<BuyerProfile>,
}

impl BuyerCatalog {
    /// Catalog order is preserved; it is the tie-break order for equal scores
    pub fn from_buyers(buyers: Vec<BuyerProfile>) -> Result<Self> {
        for buyer in &buyers {
            if buyer.min_investment > buyer.max_investment {
                bail!(
                    "Buyer {} has min_investment {} above max_investment {}",
                    buyer.id,
                    buyer.min_investment,
                    buyer.max_investment
                );
            }
        }
        Ok(BuyerCatalog { buyers })
    }

    /// Load catalog from JSON file (array of buyer profiles)
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read buyer catalog: {:?}", path.as_ref()))?;

        let buyers: Vec<BuyerProfile> =
            serde_json::from_str(&content).context("Failed to parse buyer catalog JSON")?;

        Self::from_buyers(buyers)
    }

    /// Load catalog from CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path.as_ref())
            .with_context(|| format!("Failed to open buyer CSV: {:?}", path.as_ref()))?;

        let mut buyers = Vec::new();
        for row in rdr.deserialize() {
            let row: BuyerRow = row.context("Failed to deserialize buyer row")?;
            buyers.push(row.into());
        }

        Self::from_buyers(buyers)
    }

    /// Pick the loader from the file extension (`.csv`, anything else is JSON)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let is_csv = path
            .as_ref()
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        if is_csv {
            Self::from_csv(path)
        } else {
            Self::from_json_file(path)
        }
    }

    /// The demo catalog shipped with the platform
    pub fn builtin() -> Self {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();

        BuyerCatalog {
            buyers: vec![
                BuyerProfile {
                    id: "fund_001".to_string(),
                    buyer_type: BuyerType::VcFund,
                    display_name: "Alpha Ventures".to_string(),
                    preferred_sectors: set(&["Technology", "Manufacturing", "Services"]),
                    min_investment: 5_000_000.0,
                    max_investment: 50_000_000.0,
                    preferred_locations: set(&["Bangalore", "Mumbai", "Delhi"]),
                    description: "Early-stage technology focused fund".to_string(),
                },
                BuyerProfile {
                    id: "individual_001".to_string(),
                    buyer_type: BuyerType::Entrepreneur,
                    display_name: "Raj Sharma".to_string(),
                    preferred_sectors: set(&["Retail", "Services"]),
                    min_investment: 1_000_000.0,
                    max_investment: 15_000_000.0,
                    preferred_locations: set(&["Delhi", "Chennai"]),
                    description: "Experienced business owner looking to expand".to_string(),
                },
                BuyerProfile {
                    id: "corporate_001".to_string(),
                    buyer_type: BuyerType::CorporateInvestor,
                    display_name: "Growth Corp".to_string(),
                    preferred_sectors: set(&["Manufacturing", "Technology"]),
                    min_investment: 10_000_000.0,
                    max_investment: 100_000_000.0,
                    preferred_locations: set(&["All India"]),
                    description: "Strategic acquisitions for portfolio expansion".to_string(),
                },
            ],
        }
    }

    pub fn buyers(&self) -> &[BuyerProfile] {
        &self.buyers
    }

    pub fn len(&self) -> usize {
        self.buyers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buyers.is_empty()
    }
}

impl Default for BuyerCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// MATCH ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct MatchEngine {
    catalog: Arc<BuyerCatalog>,

    /// Maximum number of matches returned (default: 3)
    pub max_results: usize,
}

impl MatchEngine {
    pub fn new(catalog: Arc<BuyerCatalog>) -> Self {
        MatchEngine {
            catalog,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn catalog(&self) -> &BuyerCatalog {
        &self.catalog
    }

    /// Score every buyer, keep those above 0.6, best first, at most `max_results`
    pub fn find_matches(&self, business: &BusinessProfile) -> Vec<MatchResult> {
        let mut scored: Vec<(u8, &BuyerProfile)> = self
            .catalog
            .buyers
            .iter()
            .map(|buyer| (buyer.points_for(business), buyer))
            .filter(|(points, _)| *points > THRESHOLD_POINTS)
            .collect();

        // sort_by is stable: equal scores keep catalog order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(self.max_results);

        tracing::debug!(
            sector = %business.sector,
            location = %business.location,
            matches = scored.len(),
            "buyer matching complete"
        );

        scored
            .into_iter()
            .map(|(points, buyer)| MatchResult {
                buyer: buyer.anonymize(),
                match_score: f64::from(points) / f64::from(MAX_POINTS),
                anonymized_id: buyer.anonymized_id(),
            })
            .collect()
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(Arc::new(BuyerCatalog::builtin()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
