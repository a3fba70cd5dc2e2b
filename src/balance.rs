use std::collections::HashMap;

use serde::Serialize;

use crate::money::Money;
use crate::schemas::{Expense, Member, MemberId};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberBalance {
    pub member_id: MemberId,
    pub name: String,
    pub email: String,
    pub paid: Money,
    pub owed: Money,
    pub net: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalSummary {
    pub total_paid: Money,
    pub total_owed: Money,
    pub balance: Money,
}

/// Computes what every member paid, owes and nets over the whole ledger.
///
/// The result has one entry per member, in the order the members are given.
/// Payers and splits that reference someone outside `members` are skipped.
pub fn compute_balances(members: &[Member], expenses: &[Expense]) -> Vec<MemberBalance> {
    let mut balances: Vec<MemberBalance> = members
        .iter()
        .map(|member| MemberBalance {
            member_id: member.id.clone(),
            name: member.display_name().to_string(),
            email: member.email.clone(),
            paid: Money::ZERO,
            owed: Money::ZERO,
            net: Money::ZERO,
        })
        .collect();
    let index: HashMap<&str, usize> = members
        .iter()
        .enumerate()
        .map(|(position, member)| (member.id.as_str(), position))
        .collect();

    for expense in expenses {
        match index.get(expense.payer.as_str()) {
            Some(&position) => balances[position].paid += expense.amount,
            None => tracing::warn!(
                "Dropping payment of {} on expense {} by unknown member {}",
                expense.amount,
                expense.id,
                expense.payer
            ),
        }
        for split in &expense.splits {
            match index.get(split.member_id.as_str()) {
                Some(&position) => balances[position].owed += split.amount,
                None => tracing::warn!(
                    "Dropping split of {} on expense {} for unknown member {}",
                    split.amount,
                    expense.id,
                    split.member_id
                ),
            }
        }
    }

    for balance in &mut balances {
        balance.net = balance.paid - balance.owed;
    }
    balances
}

/// Totals for a single member over any set of expenses, e.g. across groups.
pub fn personal_summary<'a>(
    member_id: &str,
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> PersonalSummary {
    let mut summary = PersonalSummary::default();
    for expense in expenses {
        if expense.payer == member_id {
            summary.total_paid += expense.amount;
        }
        if let Some(split) = expense
            .splits
            .iter()
            .find(|split| split.member_id == member_id)
        {
            summary.total_owed += split.amount;
        }
    }
    summary.balance = summary.total_paid - summary.total_owed;
    summary
}
