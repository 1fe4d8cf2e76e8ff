use sea_orm::{ActiveModelTrait, DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{AuditEntry, Client, ClientKind, InlineClient, ResultEngine, clients};

use super::{Engine, access};

impl Engine {
    /// Registers a client.
    pub async fn new_client(
        &self,
        kind: ClientKind,
        first_name: Option<&str>,
        last_name: &str,
        phone: &str,
        actor: &str,
    ) -> ResultEngine<Client> {
        let client = Client::new(kind, first_name, last_name, phone)?;
        clients::ActiveModel::from(&client)
            .insert(&self.database)
            .await?;
        self.record_audit(vec![AuditEntry::new(
            actor,
            "client:create",
            "client",
            client.id,
            None,
            Some(&client),
        )])
        .await;
        Ok(client)
    }

    pub async fn client(&self, client_id: Uuid) -> ResultEngine<Client> {
        access::load_client(&self.database, client_id).await
    }

    /// Returns the client matching the inline identity exactly (after
    /// normalization), creating it when there is none. The boolean is `true`
    /// when the client was created.
    pub(super) async fn find_or_create_client(
        &self,
        db_tx: &DatabaseTransaction,
        inline: &InlineClient,
    ) -> ResultEngine<(Client, bool)> {
        let inline = inline.normalized()?;
        let existing = clients::Entity::find()
            .filter(clients::Column::LastName.eq(inline.last_name.clone()))
            .filter(clients::Column::FirstName.eq(inline.first_name.clone()))
            .filter(clients::Column::Phone.eq(inline.phone.clone()))
            .one(db_tx)
            .await?;
        if let Some(model) = existing {
            return Ok((Client::try_from(model)?, false));
        }

        let client = Client::from_inline(&inline);
        clients::ActiveModel::from(&client).insert(db_tx).await?;
        tracing::info!(client_id = %client.id, "client created from booking request");
        Ok((client, true))
    }
}
