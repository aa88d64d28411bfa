// Business Exit Platform - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod valuation;  // Valuation Engine - multiples, DCF, asset-based
pub mod matching;   // Match Engine - anonymized buyer scoring
pub mod transfer;   // Transfer Checklist - per legal structure
pub mod workflow;   // Workflow Dispatcher - wizard steps + agent routing
pub mod db;         // Listings + audit events (SQLite)
pub mod data_room;  // Document storage per business
pub mod config;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use error::{CoreError, CoreResult};
pub use valuation::{
    FinancialRecord, ValuationMethod, ValuationResult, ValuationEngine, DcfAssumptions,
    quick_estimate, format_currency,
};
pub use matching::{
    BuyerType, BuyerProfile, AnonymizedBuyer, BusinessProfile, MatchResult,
    BuyerCatalog, MatchEngine,
};
pub use transfer::{BusinessType, TransferPlan, TransferCatalog};
pub use workflow::{
    WizardStep, StepGuidance, StepCatalog, SessionContext, SessionStore,
    Action, AgentKind, AgentReply, WorkflowDispatcher,
};
pub use db::{
    Listing, ListingDraft, ListingStatus, Event,
    setup_database, create_listing, get_listing, get_business_listings,
    update_listing_status, increment_views, insert_event, get_events_for_entity,
};
pub use data_room::{DataRoom, StoredDocument, ShareableLink};
pub use crate::config::PlatformConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
