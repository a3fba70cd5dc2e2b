use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::money::Money;
use crate::schemas::{Member, Split};

/// How an expense total is shared between the members of a group.
#[derive(Clone, Debug, PartialEq)]
pub enum SplitMethod {
    Equal,
    Custom(Vec<Split>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMethodKind {
    Equal,
    Custom,
}

pub const SPLIT_TOLERANCE: Money = Money::from_cents(1);

/// Splits `total` into `member_count` whole-cent shares.
///
/// Every share is rounded down to the cent and the leftover cents all go to
/// the first share, so callers must pass members in a stable order for the
/// result to be reproducible.
pub fn equal_split(total: Money, member_count: usize) -> Result<Vec<Money>, Error> {
    if total.is_negative() || total > Money::MAX_AMOUNT {
        return Err(Error::InvalidAmount(total.to_string()));
    }
    if member_count == 0 {
        return Err(Error::InvalidMemberCount(member_count));
    }

    let count = member_count as i64;
    let share = Money::from_cents(total.cents() / count);
    let remainder = Money::from_cents(total.cents() % count);

    let mut shares = vec![share; member_count];
    shares[0] += remainder;
    Ok(shares)
}

/// Checks caller supplied split amounts against the expense total.
///
/// Amounts may be zero but not negative, and they have to add up to the
/// total within one cent.
pub fn custom_split(total: Money, splits: Vec<Split>) -> Result<Vec<Split>, Error> {
    if total.is_negative() || total > Money::MAX_AMOUNT {
        return Err(Error::InvalidAmount(total.to_string()));
    }
    if let Some(split) = splits
        .iter()
        .find(|split| split.amount.is_negative() || split.amount > Money::MAX_AMOUNT)
    {
        return Err(Error::InvalidAmount(split.amount.to_string()));
    }

    let actual = splits
        .iter()
        .try_fold(Money::ZERO, |sum, split| sum.checked_add(split.amount))
        .ok_or_else(|| Error::InvalidAmount("split total is out of range".to_string()))?;
    if (actual - total).abs() > SPLIT_TOLERANCE {
        return Err(Error::SplitMismatch {
            expected: total,
            actual,
        });
    }
    Ok(splits)
}

/// Turns a split method into the split records stored with an expense.
///
/// `members` is the group in membership order.
pub fn build_splits(
    total: Money,
    members: &[Member],
    method: SplitMethod,
) -> Result<Vec<Split>, Error> {
    match method {
        SplitMethod::Equal => {
            let shares = equal_split(total, members.len())?;
            Ok(members
                .iter()
                .zip(shares)
                .map(|(member, amount)| Split {
                    member_id: member.id.clone(),
                    amount,
                })
                .collect())
        }
        SplitMethod::Custom(splits) => {
            if splits.is_empty() {
                return Err(Error::NoSplits);
            }
            let mut seen = HashSet::new();
            for split in &splits {
                if !members.iter().any(|member| member.id == split.member_id) {
                    return Err(Error::UnknownMember(split.member_id.clone()));
                }
                if !seen.insert(split.member_id.as_str()) {
                    return Err(Error::DuplicateSplit(split.member_id.clone()));
                }
            }
            custom_split(total, splits)
        }
    }
}
