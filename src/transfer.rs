// 📋 Transfer Checklist - Legal transfer steps per business type
// Static tables; unknown types get a generic document list instead of an error

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ESTIMATED_TIMELINE: &str = "4-6 weeks";

const DEFAULT_DOCUMENTS: [&str; 2] = ["Sale agreement", "Identity proof"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    PrivateLimited,
    Partnership,
    Proprietorship,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessType::PrivateLimited => "private_limited",
            BusinessType::Partnership => "partnership",
            BusinessType::Proprietorship => "proprietorship",
        }
    }

    /// Unknown names are not an error at this layer
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private_limited" => Some(BusinessType::PrivateLimited),
            "partnership" => Some(BusinessType::Partnership),
            "proprietorship" => Some(BusinessType::Proprietorship),
            _ => None,
        }
    }

    pub fn all() -> [BusinessType; 3] {
        [
            BusinessType::PrivateLimited,
            BusinessType::Partnership,
            BusinessType::Proprietorship,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPlan {
    pub checklist: Vec<String>,
    pub documents_required: Vec<String>,
    pub estimated_timeline: String,
    /// `None` when the requested type is not one of the known three
    pub business_type: Option<BusinessType>,
}

#[derive(Debug, Clone)]
struct TransferEntry {
    checklist: Vec<String>,
    documents: Vec<String>,
}

/// Reference tables for transfer planning, built once and shared
#[derive(Debug, Clone)]
pub struct TransferCatalog {
    entries: HashMap<BusinessType, TransferEntry>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl TransferCatalog {
    pub fn new() -> Self {
        let mut entries = HashMap::new();

        entries.insert(
            BusinessType::PrivateLimited,
            TransferEntry {
                checklist: owned(&[
                    "PAN transfer application",
                    "GST registration transfer",
                    "Udyam registration update",
                    "Bank account transfer",
                    "License transfers",
                    "Employee PF/ESI transfer",
                    "Property lease transfer",
                    "Vendor contract updates",
                ]),
                documents: owned(&[
                    "Sale agreement",
                    "Board resolution",
                    "PAN card copies",
                    "GST registration certificate",
                    "Udyam certificate",
                    "Company incorporation documents",
                    "Latest financial statements",
                ]),
            },
        );

        entries.insert(
            BusinessType::Partnership,
            TransferEntry {
                checklist: owned(&[
                    "Partnership deed amendment",
                    "PAN update",
                    "GST registration transfer",
                    "Bank account updates",
                    "License transfers",
                ]),
                documents: owned(&[
                    "Partnership deed",
                    "Sale agreement",
                    "PAN card",
                    "GST certificate",
                    "Partners identity proof",
                ]),
            },
        );

        entries.insert(
            BusinessType::Proprietorship,
            TransferEntry {
                checklist: owned(&[
                    "Business name transfer",
                    "GST registration",
                    "Shop establishment license",
                    "Bank account changes",
                    "Tax clearance certificate",
                ]),
                documents: owned(&[
                    "Sale agreement",
                    "PAN card",
                    "GST certificate",
                    "Identity proof",
                    "Address proof",
                    "Business licenses",
                ]),
            },
        );

        TransferCatalog { entries }
    }

    pub fn get_transfer_plan(&self, business_type: &str) -> TransferPlan {
        let kind = BusinessType::parse(business_type);

        match kind.and_then(|k| self.entries.get(&k)) {
            Some(entry) => TransferPlan {
                checklist: entry.checklist.clone(),
                documents_required: entry.documents.clone(),
                estimated_timeline: ESTIMATED_TIMELINE.to_string(),
                business_type: kind,
            },
            None => {
                tracing::debug!(business_type, "unknown business type, using default documents");
                TransferPlan {
                    checklist: Vec::new(),
                    documents_required: owned(&DEFAULT_DOCUMENTS),
                    estimated_timeline: ESTIMATED_TIMELINE.to_string(),
                    business_type: None,
                }
            }
        }
    }
}

impl Default for TransferCatalog {
    fn default() -> Self {
        Self::new()
    }
}
