use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

pub type MemberId = String;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub id: MemberId,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

impl Member {
    /// The name shown to other members, falling back to the email address.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    pub member_id: MemberId,
    pub amount: Money,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: Money,
    pub payer: MemberId,
    pub splits: Vec<Split>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

/// A group document: its members in membership order plus its whole ledger.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
}

impl Group {
    pub fn new(id: String, name: String, description: Option<String>) -> Self {
        Group {
            id,
            name,
            description,
            members: vec![],
            expenses: vec![],
        }
    }

    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }
}
