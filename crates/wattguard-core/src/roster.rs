//! Participant roster for a shared bill

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::split::SplitResult;

/// Display colors assigned round-robin as participants join
pub const PALETTE: [&str; 5] = ["#1565C0", "#7B1FA2", "#2E7D32", "#E65100", "#C62828"];

/// Id of the participant representing the signed-in user
pub const OWNER_ID: &str = "1";

/// One occupant sharing the bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub color: String,
    pub tags: BTreeSet<String>,
    /// Last computed share (0 until a split has been applied)
    pub share: f64,
    pub adjustment: f64,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
            tags: BTreeSet::new(),
            share: 0.0,
            adjustment: 0.0,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Name shown for the signed-in user: the part of the email before `@`,
/// or "Me" when there is no usable email.
pub fn owner_display_name(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .map(str::trim)
        .filter(|local| !local.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "Me".to_string())
}

/// Ordered participants plus the current selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    participants: Vec<Participant>,
    selected: Option<String>,
    next_id: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
            selected: None,
            next_id: 1,
        }
    }

    /// The default two-person roster: the owner and "Roommate 1"
    pub fn seeded(owner_email: Option<&str>) -> Self {
        let owner = Participant::new(OWNER_ID, owner_display_name(owner_email), PALETTE[0]);
        let roommate = Participant::new("2", "Roommate 1", PALETTE[1]);
        Self {
            participants: vec![owner, roommate],
            selected: Some(OWNER_ID.to_string()),
            next_id: 3,
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    fn allocate_id(&mut self) -> String {
        loop {
            let id = self.next_id.to_string();
            self.next_id += 1;
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    /// Append a participant and select it. Blank names are refused.
    pub fn add_participant(&mut self, name: &str) -> Option<&Participant> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let id = self.allocate_id();
        let color = PALETTE[self.participants.len() % PALETTE.len()];
        self.participants.push(Participant::new(id.clone(), name, color));
        self.selected = Some(id);
        self.participants.last()
    }

    /// Whether removing a participant would still leave at least one
    pub fn can_remove(&self) -> bool {
        self.participants.len() > 1
    }

    /// Remove by id. A removed selection moves to the first remaining participant.
    pub fn remove_participant(&mut self, id: &str) -> bool {
        let Some(pos) = self.participants.iter().position(|p| p.id == id) else {
            return false;
        };
        self.participants.remove(pos);

        if self.selected.as_deref() == Some(id) {
            self.selected = self.participants.first().map(|p| p.id.clone());
        }
        true
    }

    pub fn select(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.selected = Some(id.to_string());
        true
    }

    pub fn selected(&self) -> Option<&Participant> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Flip membership of a tag. Returns the new state, or None for an unknown participant.
    pub fn toggle_tag(&mut self, participant_id: &str, tag: &str) -> Option<bool> {
        let participant = self.get_mut(participant_id)?;
        if participant.tags.remove(tag) {
            Some(false)
        } else {
            participant.tags.insert(tag.to_string());
            Some(true)
        }
    }

    /// Insert a tag without toggling. Returns false for an unknown participant.
    pub fn add_tag(&mut self, participant_id: &str, tag: &str) -> bool {
        match self.get_mut(participant_id) {
            Some(participant) => {
                participant.tags.insert(tag.to_string());
                true
            }
            None => false,
        }
    }

    /// Rename the owner participant after the identity changed
    pub fn rename_owner(&mut self, email: &str) -> bool {
        let name = owner_display_name(Some(email));
        match self.get_mut(OWNER_ID) {
            Some(owner) => {
                owner.name = name;
                true
            }
            None => false,
        }
    }

    /// Copy computed shares back onto the participants
    pub fn apply_split(&mut self, result: &SplitResult) {
        for allocation in &result.participants {
            if let Some(p) = self.get_mut(&allocation.id) {
                p.share = allocation.share;
                p.adjustment = allocation.adjustment;
            }
        }
    }
}
