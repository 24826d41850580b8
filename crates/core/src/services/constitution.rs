//! Constitution generation.

use std::sync::Arc;

use chrono::Utc;
use osccai_common::{AppError, AppResult, IdGenerator};
use osccai_db::{
    entities::{
        CommunityModel, Constitution, community_model,
        constitution::{self, ConstitutionStatus},
        statement::{self, StatementStatus},
        system_event::EventType,
    },
    map_db_err,
    repositories::{ConstitutionRepository, PollRepository, StatementRepository},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use tracing::{info, warn};

use super::{
    access::Manager,
    eligibility,
    event::{Actor, EventService},
};

/// Render the constitution text for a community model.
#[must_use]
pub fn render_constitution(
    model: &community_model::Model,
    principles: &[statement::Model],
) -> String {
    let mut content = format!(
        "Community Name: {}\n\nGoal: {}\n\nBio: {}\n\n",
        model.name,
        model.goal,
        model.bio.as_deref().unwrap_or_default()
    );

    if principles.is_empty() {
        content.push_str("[No specific principles]\n");
    } else {
        content.push_str("Principles:\n");
        for (index, statement) in principles.iter().enumerate() {
            content.push_str(&format!("{}. {}\n", index + 1, statement.text));
        }
    }

    content
}

#[derive(Clone)]
pub struct ConstitutionService {
    db: Arc<DatabaseConnection>,
    constitution_repo: ConstitutionRepository,
    poll_repo: PollRepository,
    statement_repo: StatementRepository,
    events: EventService,
    id_gen: IdGenerator,
}

impl ConstitutionService {
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        constitution_repo: ConstitutionRepository,
        poll_repo: PollRepository,
        statement_repo: StatementRepository,
        events: EventService,
    ) -> Self {
        Self {
            db,
            constitution_repo,
            poll_repo,
            statement_repo,
            events,
            id_gen: IdGenerator::new(),
        }
    }

    /// All versions for a model, newest first.
    pub async fn list(
        &self,
        manager: &Manager,
        community_model_id: &str,
    ) -> AppResult<Vec<constitution::Model>> {
        let model = self.get_model(community_model_id).await?;
        manager.authorize(&model)?;
        self.constitution_repo.find_by_model(community_model_id).await
    }

    /// Eligible statements across the model's live polls.
    pub async fn principles(&self, community_model_id: &str) -> AppResult<Vec<statement::Model>> {
        let poll_ids: Vec<String> = self
            .poll_repo
            .find_by_model(community_model_id)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        Ok(self
            .statement_repo
            .find_by_polls(&poll_ids)
            .await?
            .into_iter()
            .filter(|s| s.status != StatementStatus::Rejected)
            .filter(eligibility::is_constitutionable)
            .collect())
    }

    /// Generate a new draft version without activating it.
    pub async fn generate_draft(
        &self,
        manager: &Manager,
        community_model_id: &str,
    ) -> AppResult<constitution::Model> {
        let model = self.get_model(community_model_id).await?;
        manager.authorize(&model)?;
        let draft = self
            .write_version(community_model_id, ConstitutionStatus::Draft)
            .await?;

        self.events
            .constitution_changed(
                EventType::ConstitutionGenerated,
                &draft,
                Actor::manager(manager),
            )
            .await;
        Ok(draft)
    }

    /// Generate a new version and make it the active one.
    ///
    /// Runs on every "statements changed" notification, so callers do not
    /// need to be managers.
    pub async fn create_and_activate(
        &self,
        community_model_id: &str,
    ) -> AppResult<constitution::Model> {
        let created = self
            .write_version(community_model_id, ConstitutionStatus::Active)
            .await?;

        for event_type in [
            EventType::ConstitutionGenerated,
            EventType::ConstitutionActivated,
        ] {
            self.events
                .constitution_changed(event_type, &created, Actor::system())
                .await;
        }
        Ok(created)
    }

    /// Activate an existing version, archiving the previous active one.
    pub async fn activate(
        &self,
        manager: &Manager,
        community_model_id: &str,
        constitution_id: &str,
    ) -> AppResult<constitution::Model> {
        let model = self.get_model(community_model_id).await?;
        manager.authorize(&model)?;

        let target = self
            .constitution_repo
            .find_by_id(constitution_id)
            .await?
            .filter(|c| c.community_model_id == community_model_id)
            .ok_or_else(|| AppError::NotFound("Constitution not found".to_string()))?;

        let txn = self.db.begin().await.map_err(map_db_err)?;
        lock_model(&txn, community_model_id).await?;
        archive_active(&txn, community_model_id).await?;

        let mut active: constitution::ActiveModel = target.into();
        active.status = Set(ConstitutionStatus::Active);
        let activated = active.update(&txn).await.map_err(map_db_err)?;

        point_model_at(&txn, community_model_id, &activated.id).await?;
        txn.commit().await.map_err(map_db_err)?;

        info!(community_model_id, constitution_id, "Constitution activated");
        self.events
            .constitution_changed(
                EventType::ConstitutionActivated,
                &activated,
                Actor::manager(manager),
            )
            .await;
        Ok(activated)
    }

    /// Community model by id.
    pub async fn get_model(&self, community_model_id: &str) -> AppResult<community_model::Model> {
        CommunityModel::find_by_id(community_model_id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| AppError::NotFound("Community model not found".to_string()))
    }

    async fn write_version(
        &self,
        community_model_id: &str,
        status: ConstitutionStatus,
    ) -> AppResult<constitution::Model> {
        match self.try_write_version(community_model_id, status).await {
            Err(e) if e.is_retryable() => {
                warn!(community_model_id, error = %e, "Constitution version conflicted, retrying");
                self.try_write_version(community_model_id, status).await
            }
            other => other,
        }
    }

    async fn try_write_version(
        &self,
        community_model_id: &str,
        status: ConstitutionStatus,
    ) -> AppResult<constitution::Model> {
        let principles = self.principles(community_model_id).await?;

        let txn = self.db.begin().await.map_err(map_db_err)?;
        let model = lock_model(&txn, community_model_id).await?;

        let latest = Constitution::find()
            .filter(constitution::Column::CommunityModelId.eq(community_model_id))
            .order_by_desc(constitution::Column::Version)
            .one(&txn)
            .await
            .map_err(map_db_err)?;
        let version = latest.map_or(1, |c| c.version + 1);

        if status == ConstitutionStatus::Active {
            archive_active(&txn, community_model_id).await?;
        }

        let created = constitution::ActiveModel {
            id: Set(self.id_gen.generate()),
            community_model_id: Set(community_model_id.to_string()),
            version: Set(version),
            content: Set(render_constitution(&model, &principles)),
            status: Set(status),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await
        .map_err(map_db_err)?;

        if status == ConstitutionStatus::Active {
            point_model_at(&txn, community_model_id, &created.id).await?;
        }
        txn.commit().await.map_err(map_db_err)?;

        info!(
            community_model_id,
            version,
            principles = principles.len(),
            status = ?status,
            "Constitution generated"
        );
        Ok(created)
    }
}

async fn lock_model(
    txn: &DatabaseTransaction,
    community_model_id: &str,
) -> AppResult<community_model::Model> {
    CommunityModel::find_by_id(community_model_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| AppError::NotFound("Community model not found".to_string()))
}

async fn archive_active(txn: &DatabaseTransaction, community_model_id: &str) -> AppResult<()> {
    Constitution::update_many()
        .col_expr(
            constitution::Column::Status,
            Expr::value(ConstitutionStatus::Archived),
        )
        .filter(constitution::Column::CommunityModelId.eq(community_model_id))
        .filter(constitution::Column::Status.eq(ConstitutionStatus::Active))
        .exec(txn)
        .await
        .map_err(map_db_err)?;
    Ok(())
}

async fn point_model_at(
    txn: &DatabaseTransaction,
    community_model_id: &str,
    constitution_id: &str,
) -> AppResult<()> {
    CommunityModel::update_many()
        .col_expr(
            community_model::Column::ActiveConstitutionId,
            Expr::value(constitution_id),
        )
        .col_expr(community_model::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(community_model::Column::Id.eq(community_model_id))
        .exec(txn)
        .await
        .map_err(map_db_err)?;
    Ok(())
}
