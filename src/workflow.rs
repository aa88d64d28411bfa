// 🧭 Workflow Dispatcher - Listing wizard steps + action routing
// Routes an action to the right engine and threads the valuation between steps
// through an explicit per-session context.

use crate::error::{CoreError, CoreResult};
use crate::matching::{BusinessProfile, MatchEngine};
use crate::transfer::TransferCatalog;
use crate::valuation::{FinancialRecord, ValuationEngine, ValuationResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// WIZARD STEPS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardStep {
    pub name: String,
    pub guidance: String,
    pub requirements: Vec<String>,
}

impl WizardStep {
    fn new(name: &str, guidance: &str, requirements: &[&str]) -> Self {
        WizardStep {
            name: name.to_string(),
            guidance: guidance.to_string(),
            requirements: requirements.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepGuidance {
    InProgress {
        current_step: usize,
        total_steps: usize,
        step_name: String,
        guidance: String,
        requirements: Vec<String>,
        message: String,
        next_actions: Vec<String>,
    },
    Completed {
        total_steps: usize,
        message: String,
        next_actions: Vec<String>,
    },
}

impl StepGuidance {
    pub fn message(&self) -> &str {
        match self {
            StepGuidance::InProgress { message, .. } | StepGuidance::Completed { message, .. } => {
                message
            }
        }
    }

    pub fn next_actions(&self) -> &[String] {
        match self {
            StepGuidance::InProgress { next_actions, .. }
            | StepGuidance::Completed { next_actions, .. } => next_actions,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepGuidance::Completed { .. })
    }
}

/// The five listing steps, indexed 0-4
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<WizardStep>,
}

impl StepCatalog {
    pub fn new() -> Self {
        StepCatalog {
            steps: vec![
                WizardStep::new(
                    "Business Basic Info",
                    "Enter business sector, location, and basic details",
                    &["Business name", "Sector", "Location", "Years in operation"],
                ),
                WizardStep::new(
                    "Financial Documentation",
                    "Upload GST returns to unlock full listing potential",
                    &["2 years P&L statements", "GST returns", "Tax filings"],
                ),
                WizardStep::new(
                    "Asset Inventory",
                    "List all physical and intellectual property assets",
                    &["Equipment list", "Property details", "IP assets"],
                ),
                WizardStep::new(
                    "Transfer Preferences",
                    "Specify preferred transfer timeline and handover type",
                    &["Transfer timeline", "Handover preferences", "Training requirements"],
                ),
                WizardStep::new(
                    "Final Review",
                    "Review all information before publishing",
                    &["Final verification", "Terms acceptance"],
                ),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&WizardStep> {
        self.steps.get(index)
    }

    /// Guidance for `current_step`. Steps are not validated for order; the caller
    /// decides where it is. Past the last step the wizard reports completion.
    pub fn advance(&self, current_step: usize, _user_data: &Value) -> StepGuidance {
        match self.steps.get(current_step) {
            Some(step) => StepGuidance::InProgress {
                current_step,
                total_steps: self.steps.len(),
                step_name: step.name.clone(),
                guidance: step.guidance.clone(),
                requirements: step.requirements.clone(),
                message: format!("Step {}: {}", current_step + 1, step.guidance),
                next_actions: vec![format!("Complete {}", step.name)],
            },
            None => StepGuidance::Completed {
                total_steps: self.steps.len(),
                message: "Listing process completed!".to_string(),
                next_actions: vec!["Review matches".to_string(), "Publish listing".to_string()],
            },
        }
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SESSION CONTEXT
// ============================================================================

/// Per-user results carried between wizard calls. Transient; lost on restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub valuation: Option<ValuationResult>,
    pub last_step: Option<usize>,
}

/// In-memory map of sessions keyed by user id. Last write wins.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionContext>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a user's session (empty if none yet)
    pub fn get(&self, user_id: &str) -> SessionContext {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(user_id).cloned().unwrap_or_default()
    }

    pub fn put(&self, user_id: &str, session: SessionContext) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(user_id.to_string(), session);
    }

    /// Run `f` against the user's session and store the result in place
    pub fn with_session<F, R>(&self, user_id: &str, f: F) -> R
    where
        F: FnOnce(&mut SessionContext) -> R,
    {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let session = sessions.entry(user_id.to_string()).or_default();
        f(session)
    }

    pub fn clear(&self, user_id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// ACTIONS
// ============================================================================

pub const ACTION_NAMES: [&str; 4] = [
    "start_valuation",
    "create_listing",
    "find_buyers",
    "start_transfer",
];

fn default_method() -> String {
    "auto".to_string()
}

fn default_business_type() -> String {
    "private_limited".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    StartValuation {
        #[serde(default)]
        financial_data: Value,
        #[serde(default = "default_method")]
        method: String,
    },
    CreateListing {
        #[serde(default)]
        current_step: usize,
        #[serde(default)]
        user_data: Value,
    },
    FindBuyers {
        #[serde(default)]
        business_profile: BusinessProfile,
    },
    StartTransfer {
        #[serde(default = "default_business_type")]
        business_type: String,
    },
}

impl Action {
    /// Build an action from its name and a JSON payload object
    pub fn from_request(name: &str, payload: Value) -> CoreResult<Self> {
        if !ACTION_NAMES.contains(&name) {
            return Err(CoreError::UnknownAction(name.to_string()));
        }

        let mut fields = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(CoreError::invalid_input("payload", "expected an object")),
        };
        fields.insert("action".to_string(), Value::String(name.to_string()));

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| CoreError::invalid_input("payload", e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::StartValuation { .. } => "start_valuation",
            Action::CreateListing { .. } => "create_listing",
            Action::FindBuyers { .. } => "find_buyers",
            Action::StartTransfer { .. } => "start_transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Valuation,
    ExitCoach,
    Match,
    Transfer,
}

/// Envelope returned for every dispatched action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub agent: AgentKind,
    pub success: bool,
    pub message: String,
    pub data: Value,
    pub next_actions: Vec<String>,
}

impl AgentReply {
    fn ok(agent: AgentKind, message: String, data: Value, next_actions: &[&str]) -> Self {
        AgentReply {
            agent,
            success: true,
            message,
            data,
            next_actions: next_actions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Holds the engines and reference tables; all session state is passed in
#[derive(Debug, Clone)]
pub struct WorkflowDispatcher {
    valuation: ValuationEngine,
    matcher: MatchEngine,
    transfer: Arc<TransferCatalog>,
    steps: Arc<StepCatalog>,
}

impl WorkflowDispatcher {
    pub fn new(
        valuation: ValuationEngine,
        matcher: MatchEngine,
        transfer: Arc<TransferCatalog>,
        steps: Arc<StepCatalog>,
    ) -> Self {
        WorkflowDispatcher {
            valuation,
            matcher,
            transfer,
            steps,
        }
    }

    pub fn valuation_engine(&self) -> &ValuationEngine {
        &self.valuation
    }

    pub fn match_engine(&self) -> &MatchEngine {
        &self.matcher
    }

    pub fn transfer_catalog(&self) -> &TransferCatalog {
        &self.transfer
    }

    pub fn steps(&self) -> &StepCatalog {
        &self.steps
    }

    /// Route by action name; unknown names fail with `UnknownAction`
    pub fn dispatch_named(
        &self,
        session: &mut SessionContext,
        name: &str,
        payload: Value,
    ) -> CoreResult<AgentReply> {
        let action = Action::from_request(name, payload)?;
        self.dispatch(session, action)
    }

    pub fn dispatch(&self, session: &mut SessionContext, action: Action) -> CoreResult<AgentReply> {
        tracing::debug!(action = action.name(), "dispatching workflow action");

        match action {
            Action::StartValuation {
                financial_data,
                method,
            } => self.handle_valuation(session, &financial_data, &method),
            Action::CreateListing {
                current_step,
                user_data,
            } => Ok(self.handle_listing(session, current_step, user_data)),
            Action::FindBuyers { business_profile } => {
                Ok(self.handle_matching(session, business_profile))
            }
            Action::StartTransfer { business_type } => Ok(self.handle_transfer(&business_type)),
        }
    }

    fn handle_valuation(
        &self,
        session: &mut SessionContext,
        financial_data: &Value,
        method: &str,
    ) -> CoreResult<AgentReply> {
        let record = FinancialRecord::from_json(financial_data)?;
        let result = self.valuation.calculate_valuation(&record, method)?;

        let reply = AgentReply::ok(
            AgentKind::Valuation,
            result.summary(),
            json!(result),
            &["Proceed to listing", "Adjust financial inputs"],
        );

        session.valuation = Some(result);
        Ok(reply)
    }

    fn handle_listing(
        &self,
        session: &mut SessionContext,
        current_step: usize,
        user_data: Value,
    ) -> AgentReply {
        let mut user_data = match user_data {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        // Best-effort: carry the session's valuation into the listing payload
        if let Some(valuation) = &session.valuation {
            user_data.insert("valuation_data".to_string(), json!(valuation));
        }
        let user_data = Value::Object(user_data);

        let guidance = self.steps.advance(current_step, &user_data);
        session.last_step = Some(current_step);

        AgentReply {
            agent: AgentKind::ExitCoach,
            success: true,
            message: guidance.message().to_string(),
            next_actions: guidance.next_actions().to_vec(),
            data: json!({
                "step": guidance,
                "user_data": user_data,
            }),
        }
    }

    fn handle_matching(&self, session: &SessionContext, mut profile: BusinessProfile) -> AgentReply {
        if let Some(valuation) = &session.valuation {
            profile.valuation = valuation.estimated_value;
        }

        let matches = self.matcher.find_matches(&profile);

        AgentReply::ok(
            AgentKind::Match,
            format!("{} investors matched this week", matches.len()),
            json!({
                "matches": matches,
                "match_count": matches.len(),
                "business_profile": profile,
                "listing_step": session.last_step,
                "recommendation_reason": "Based on sector fit and investment capacity",
            }),
            &["View match details", "Initiate contact"],
        )
    }

    fn handle_transfer(&self, business_type: &str) -> AgentReply {
        let plan = self.transfer.get_transfer_plan(business_type);

        AgentReply::ok(
            AgentKind::Transfer,
            "PAN, Udyam, GST transfer steps ready".to_string(),
            json!(plan),
            &["Start document collection", "Schedule advisor call"],
        )
    }
}

impl Default for WorkflowDispatcher {
    fn default() -> Self {
        Self::new(
            ValuationEngine::new(),
            MatchEngine::default(),
            Arc::new(TransferCatalog::new()),
            Arc::new(StepCatalog::new()),
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
