use serde::Serialize;

use crate::balance::{compute_balances, MemberBalance};
use crate::money::Money;
use crate::schemas::{Group, MemberId};

#[derive(Clone, Debug, PartialEq)]
pub struct NetPosition {
    pub member_id: MemberId,
    pub name: String,
    pub net: Money,
}

impl From<&MemberBalance> for NetPosition {
    fn from(balance: &MemberBalance) -> Self {
        NetPosition {
            member_id: balance.member_id.clone(),
            name: balance.name.clone(),
            net: balance.net,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub from_member_id: MemberId,
    pub to_member_id: MemberId,
    pub amount: Money,
    pub from_name: String,
    pub to_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSettlement {
    pub balances: Vec<MemberBalance>,
    pub transfers: Vec<Transfer>,
}

/// Matches debtors against creditors, largest first, until one side runs out.
///
/// Each step moves as much as both the current debtor and the current
/// creditor allow, so at least one of them is settled per transfer. Members
/// already at zero are left out. If the positions do not add up to zero
/// the leftover stays unmatched; see [`settlement_residual`].
pub fn minimal_transfers(positions: &[NetPosition]) -> Vec<Transfer> {
    let mut debtors: Vec<NetPosition> = positions
        .iter()
        .filter(|position| position.net.is_negative())
        .cloned()
        .collect();
    let mut creditors: Vec<NetPosition> = positions
        .iter()
        .filter(|position| position.net.is_positive())
        .cloned()
        .collect();
    // Stable sorts, so ties keep the input order.
    debtors.sort_by_key(|debtor| debtor.net);
    creditors.sort_by_key(|creditor| -creditor.net);

    let mut transfers = Vec::new();
    let (mut d, mut c) = (0, 0);
    while d < debtors.len() && c < creditors.len() {
        let debtor = &mut debtors[d];
        let creditor = &mut creditors[c];
        let amount = debtor.net.abs().min(creditor.net);

        transfers.push(Transfer {
            from_member_id: debtor.member_id.clone(),
            to_member_id: creditor.member_id.clone(),
            amount,
            from_name: debtor.name.clone(),
            to_name: creditor.name.clone(),
        });

        debtor.net += amount;
        creditor.net -= amount;
        if debtor.net.is_zero() {
            d += 1;
        }
        if creditor.net.is_zero() {
            c += 1;
        }
    }
    transfers
}

/// The amount by which the positions fail to cancel out.
///
/// Zero for any ledger produced by [`compute_balances`]; anything else is
/// left over after [`minimal_transfers`] runs.
pub fn settlement_residual(positions: &[NetPosition]) -> Money {
    positions.iter().map(|position| position.net).sum()
}

pub fn settle_group(group: &Group) -> GroupSettlement {
    let balances = compute_balances(&group.members, &group.expenses);
    let positions: Vec<NetPosition> = balances.iter().map(NetPosition::from).collect();

    let residual = settlement_residual(&positions);
    if !residual.is_zero() {
        tracing::warn!(
            "Balances of group {} are off by {residual}, some debts will stay unmatched",
            group.id
        );
    }

    let transfers = minimal_transfers(&positions);
    tracing::debug!(
        "Group {} settles with {} transfers between {} members",
        group.id,
        transfers.len(),
        balances.len()
    );
    GroupSettlement {
        balances,
        transfers,
    }
}
