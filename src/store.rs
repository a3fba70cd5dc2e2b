use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{bson::doc, Client, Collection, IndexModel};

use crate::error::Error;
use crate::schemas::{Expense, Group, Member};

/// Reads and writes group documents.
///
/// Every call works on a whole group snapshot: balances are always derived
/// from a freshly loaded group, never cached.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Fails with [`Error::GroupExists`] if the id is taken.
    async fn create_group(&self, group: Group) -> Result<(), Error>;

    async fn find_group(&self, id: &str) -> Result<Option<Group>, Error>;

    /// Appends a member, keeping membership order.
    async fn add_member(&self, group_id: &str, member: Member) -> Result<Group, Error>;

    async fn add_expense(&self, group_id: &str, expense: Expense) -> Result<(), Error>;

    async fn groups_for_member(&self, member_id: &str) -> Result<Vec<Group>, Error>;
}

pub struct MongoGroupStore {
    groups: Collection<Group>,
}

impl MongoGroupStore {
    pub fn new(client: &Client, database_name: &str) -> Self {
        MongoGroupStore {
            groups: client.database(database_name).collection("Groups"),
        }
    }

    /// Makes group ids unique, so concurrent creates cannot both succeed.
    pub async fn ensure_indexes(&self) -> Result<(), Error> {
        let index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.groups.create_index(index, None).await?;
        Ok(())
    }
}

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl GroupStore for MongoGroupStore {
    async fn create_group(&self, group: Group) -> Result<(), Error> {
        match self.groups.insert_one(&group, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(Error::GroupExists(group.id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_group(&self, id: &str) -> Result<Option<Group>, Error> {
        Ok(self.groups.find_one(doc! { "id": id }, None).await?)
    }

    async fn add_member(&self, group_id: &str, member: Member) -> Result<Group, Error> {
        let member_id = member.id.clone();
        let result = self
            .groups
            .update_one(
                doc! { "id": group_id, "members.id": { "$ne": member_id.as_str() } },
                doc! { "$push": { "members": bson::to_bson(&member)? } },
                None,
            )
            .await?;

        let group = self.find_group(group_id).await?.ok_or(Error::NotFound)?;
        if result.modified_count == 0 {
            return Err(Error::DuplicateMember(member_id));
        }
        Ok(group)
    }

    async fn add_expense(&self, group_id: &str, expense: Expense) -> Result<(), Error> {
        let result = self
            .groups
            .update_one(
                doc! { "id": group_id },
                doc! { "$push": { "expenses": bson::to_bson(&expense)? } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn groups_for_member(&self, member_id: &str) -> Result<Vec<Group>, Error> {
        let cursor = self
            .groups
            .find(doc! { "members.id": member_id }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
