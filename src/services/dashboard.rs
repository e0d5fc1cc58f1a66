//! Admin dashboard counters

use std::sync::Arc;

use crate::db::repositories::{
    ArticleRepository, CommunityRepository, HubRepository, ProductRepository, TalentRepository, UserRepository,
};
use crate::models::{DashboardStats, HubStatus, ModerationStatus};
use crate::services::error::ServiceResult;

pub struct DashboardService {
    user_repo: Arc<dyn UserRepository>,
    talent_repo: Arc<dyn TalentRepository>,
    community_repo: Arc<dyn CommunityRepository>,
    product_repo: Arc<dyn ProductRepository>,
    article_repo: Arc<dyn ArticleRepository>,
    hub_repo: Arc<dyn HubRepository>,
}

impl DashboardService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        talent_repo: Arc<dyn TalentRepository>,
        community_repo: Arc<dyn CommunityRepository>,
        product_repo: Arc<dyn ProductRepository>,
        article_repo: Arc<dyn ArticleRepository>,
        hub_repo: Arc<dyn HubRepository>,
    ) -> Self {
        Self {
            user_repo,
            talent_repo,
            community_repo,
            product_repo,
            article_repo,
            hub_repo,
        }
    }

    /// Not cached
    pub async fn stats(&self) -> ServiceResult<DashboardStats> {
        let (users, pending_talents, pending_communities, pending_products, published_articles, active_hubs) = tokio::try_join!(
            self.user_repo.count(),
            self.talent_repo.count_by_status(ModerationStatus::Pending),
            self.community_repo.count_by_status(ModerationStatus::Pending),
            self.product_repo.count_by_status(ModerationStatus::Pending),
            self.article_repo.count_published_by_channel(),
            self.hub_repo.count_by_status(HubStatus::Active),
        )?;

        Ok(DashboardStats {
            users,
            pending_talents,
            pending_communities,
            pending_products,
            published_articles,
            active_hubs,
        })
    }
}
