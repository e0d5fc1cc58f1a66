//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod app_data;
pub mod article;
pub mod comment;
pub mod community;
pub mod hub;
pub mod legal_page;
pub mod partner;
pub mod product;
pub mod session;
pub mod social_media;
pub mod talent;
pub mod user;

pub use app_data::{AppDataRepository, SqlxAppDataRepository};
pub use article::{ArticleRepository, SqlxArticleRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use community::{CommunityRepository, SqlxCommunityRepository};
pub use hub::{HubCategoryRepository, HubRepository, SqlxHubCategoryRepository, SqlxHubRepository};
pub use legal_page::{LegalPageRepository, SqlxLegalPageRepository};
pub use partner::{PartnerRepository, SqlxPartnerRepository};
pub use product::{ProductRepository, SqlxProductRepository};
pub use session::{
    PasswordResetRepository, SessionRepository, SqlxPasswordResetRepository, SqlxSessionRepository,
};
pub use social_media::{SocialMediaRepository, SqlxSocialMediaRepository};
pub use talent::{SqlxTalentRepository, TalentRepository};
pub use user::{SqlxUserRepository, UserRepository};
