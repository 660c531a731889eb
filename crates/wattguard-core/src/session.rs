//! Interactive split session
//!
//! Owns the roster, the session's weight table and the latest split result.
//! Every mutating call ends with [`SplitSession::recompute`], so `result`
//! always reflects the current state.

use tracing::debug;

use crate::config::{SplitConfig, SplitParams};
use crate::error::{Error, Result};
use crate::roster::{Participant, Roster};
use crate::share::share_text;
use crate::split::{compute_split, SplitResult};
use crate::weights::WeightTable;

#[derive(Debug, Clone)]
pub struct SplitSession {
    total: f64,
    roster: Roster,
    weights: WeightTable,
    params: SplitParams,
    result: Option<SplitResult>,
}

impl SplitSession {
    /// Start a session with the default two-person roster
    pub fn new(total: f64, owner_email: Option<&str>, config: &SplitConfig) -> Result<Self> {
        Self::with_roster(total, Roster::seeded(owner_email), config)
    }

    pub fn with_roster(total: f64, roster: Roster, config: &SplitConfig) -> Result<Self> {
        validate_total(total)?;
        config.params.validate()?;
        let mut session = Self {
            total,
            roster,
            weights: WeightTable::from_config(config),
            params: config.params,
            result: None,
        };
        session.recompute();
        Ok(session)
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Latest split, None while the roster is empty
    pub fn result(&self) -> Option<&SplitResult> {
        self.result.as_ref()
    }

    pub fn share_text(&self) -> Option<String> {
        self.result.as_ref().map(share_text)
    }

    /// Recompute the split from the current roster and total
    pub fn recompute(&mut self) {
        match compute_split(
            self.total,
            self.roster.participants(),
            &self.weights,
            &self.params,
        ) {
            Ok(result) => {
                self.roster.apply_split(&result);
                self.result = Some(result);
            }
            Err(e) => {
                debug!("Split not computed: {}", e);
                self.result = None;
            }
        }
    }

    pub fn set_total(&mut self, total: f64) -> Result<()> {
        validate_total(total)?;
        self.total = total;
        self.recompute();
        Ok(())
    }

    pub fn add_participant(&mut self, name: &str) -> Option<Participant> {
        let added = self.roster.add_participant(name).cloned();
        if added.is_some() {
            self.recompute();
        }
        added
    }

    /// Remove a participant. Refused when only one would remain.
    pub fn remove_participant(&mut self, id: &str) -> bool {
        if !self.roster.can_remove() {
            return false;
        }
        let removed = self.roster.remove_participant(id);
        if removed {
            self.recompute();
        }
        removed
    }

    pub fn select(&mut self, id: &str) -> bool {
        self.roster.select(id)
    }

    /// Toggle a tag on the given participant, or the selected one.
    ///
    /// A tag outside the catalog joins it as a custom tag on first use.
    pub fn toggle_tag(&mut self, participant_id: Option<&str>, tag: &str) -> Option<bool> {
        let tag = tag.trim();
        if tag.is_empty() {
            return None;
        }
        let id = self.target(participant_id)?;
        self.roster.get(&id)?;
        if !self.weights.is_predefined(tag) {
            self.weights.register_custom_tag(tag);
        }
        let state = self.roster.toggle_tag(&id, tag)?;
        self.recompute();
        Some(state)
    }

    /// Register a custom tag (if new) and add it to the given or selected participant.
    ///
    /// Returns whether the tag was newly registered, or None when the tag is
    /// blank or there is no participant to receive it.
    pub fn add_custom_tag(&mut self, participant_id: Option<&str>, tag: &str) -> Option<bool> {
        let tag = tag.trim();
        if tag.is_empty() {
            return None;
        }
        let id = self.target(participant_id)?;
        self.roster.get(&id)?;

        let registered = self.weights.register_custom_tag(tag);
        self.roster.add_tag(&id, tag);
        self.recompute();
        Some(registered)
    }

    /// Re-derive participant 1's name from a new owner identity. Hook for
    /// callers whose signed-in identity changes mid-session.
    pub fn rename_owner(&mut self, email: &str) -> bool {
        let renamed = self.roster.rename_owner(email);
        if renamed {
            self.recompute();
        }
        renamed
    }

    fn target(&self, participant_id: Option<&str>) -> Option<String> {
        participant_id
            .or_else(|| self.roster.selected_id())
            .map(str::to_string)
    }
}

fn validate_total(total: f64) -> Result<()> {
    if !total.is_finite() || total < 0.0 {
        return Err(Error::InvalidData(format!(
            "Bill total must be a non-negative amount, got {}",
            total
        )));
    }
    Ok(())
}
