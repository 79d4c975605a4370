//! In-memory lead tracking with a fixed sales funnel.
//!
//! Deliberately memory-resident: the list lives and dies with the process.
//! Every mutation leaves a timestamped history entry on the lead.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered funnel stages a lead moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FunnelStage {
    New,
    Contacted,
    Proposal,
    Closing,
    Lost,
}

impl FunnelStage {
    pub const ALL: [FunnelStage; 5] = [
        FunnelStage::New,
        FunnelStage::Contacted,
        FunnelStage::Proposal,
        FunnelStage::Closing,
        FunnelStage::Lost,
    ];
}

impl std::fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FunnelStage::New => "new",
            FunnelStage::Contacted => "contacted",
            FunnelStage::Proposal => "proposal",
            FunnelStage::Closing => "closing",
            FunnelStage::Lost => "lost",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: u64,
    pub name: String,
    pub phone: String,
    pub notes: String,
    pub stage: FunnelStage,
    pub history: Vec<HistoryEntry>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Error, Debug)]
pub enum LeadError {
    #[error("lead not found: {0}")]
    NotFound(u64),

    #[error("lead name and phone are required")]
    MissingFields,
}

struct Inner {
    next_id: u64,
    leads: Vec<Lead>,
}

/// Mutex-guarded store of every lead.
pub struct LeadStore {
    inner: Mutex<Inner>,
}

impl LeadStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                leads: Vec::new(),
            }),
        }
    }

    /// Register a lead at the top of the funnel.
    pub fn create(&self, name: &str, phone: &str, notes: &str) -> Result<Lead, LeadError> {
        if name.trim().is_empty() || phone.trim().is_empty() {
            return Err(LeadError::MissingFields);
        }

        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;

        let lead = Lead {
            id,
            name: name.to_string(),
            phone: phone.to_string(),
            notes: notes.to_string(),
            stage: FunnelStage::New,
            history: vec![entry("lead created")],
        };
        inner.leads.push(lead.clone());
        Ok(lead)
    }

    pub fn list(&self) -> Vec<Lead> {
        self.inner.lock().unwrap().leads.clone()
    }

    pub fn get(&self, id: u64) -> Result<Lead, LeadError> {
        let inner = self.inner.lock().unwrap();
        inner
            .leads
            .iter()
            .find(|lead| lead.id == id)
            .cloned()
            .ok_or(LeadError::NotFound(id))
    }

    pub fn update(&self, id: u64, update: LeadUpdate) -> Result<Lead, LeadError> {
        let mut inner = self.inner.lock().unwrap();
        let lead = find_mut(&mut inner, id)?;

        if let Some(name) = update.name {
            lead.name = name;
        }
        if let Some(phone) = update.phone {
            lead.phone = phone;
        }
        if let Some(notes) = update.notes {
            lead.notes = notes;
        }
        lead.history.push(entry("lead updated"));
        Ok(lead.clone())
    }

    pub fn remove(&self, id: u64) -> Result<(), LeadError> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner
            .leads
            .iter()
            .position(|lead| lead.id == id)
            .ok_or(LeadError::NotFound(id))?;
        inner.leads.remove(index);
        Ok(())
    }

    pub fn move_stage(&self, id: u64, stage: FunnelStage) -> Result<Lead, LeadError> {
        let mut inner = self.inner.lock().unwrap();
        let lead = find_mut(&mut inner, id)?;
        lead.stage = stage;
        lead.history.push(entry(&format!("moved to stage: {stage}")));
        Ok(lead.clone())
    }

    pub fn history(&self, id: u64) -> Result<Vec<HistoryEntry>, LeadError> {
        self.get(id).map(|lead| lead.history)
    }

    /// Note a message delivered to this lead.
    pub fn record_dispatch(&self, id: u64, message: &str) -> Result<(), LeadError> {
        let mut inner = self.inner.lock().unwrap();
        let lead = find_mut(&mut inner, id)?;
        lead.history
            .push(entry(&format!("message dispatched: {message}")));
        Ok(())
    }
}

impl Default for LeadStore {
    fn default() -> Self {
        Self::new()
    }
}

fn find_mut(inner: &mut Inner, id: u64) -> Result<&mut Lead, LeadError> {
    inner
        .leads
        .iter_mut()
        .find(|lead| lead.id == id)
        .ok_or(LeadError::NotFound(id))
}

fn entry(action: &str) -> HistoryEntry {
    HistoryEntry {
        at: Utc::now(),
        action: action.to_string(),
    }
}
