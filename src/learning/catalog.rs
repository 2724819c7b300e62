use serde::Serialize;
use sqlx::SqlitePool;

use super::STATUS_NOT_STARTED;
use crate::db::models::learning::{
    LearningModule, LearningPath, ModuleProgress, ModuleRepository, PathRepository, ProgressRepository,
};

pub const DEFAULT_PATH_SLUG: &str = "general-programming";

/// Keyword -> path slug, checked in order against the lower-cased name.
const NAME_KEYWORDS: &[(&str, &str)] = &[
    ("game", "game-development"),
    ("gaming", "game-development"),
    ("games", "game-development"),
    ("ai", "ai-machine-learning"),
    ("artificial intelligence", "ai-machine-learning"),
    ("machine learning", "ai-machine-learning"),
    ("web", "web-development"),
    ("website", "web-development"),
    ("websites", "web-development"),
    ("robot", "robotics"),
    ("robots", "robotics"),
    ("data", "data-science"),
    ("analytics", "data-science"),
    ("mobile", "mobile-app-development"),
    ("app", "mobile-app-development"),
    ("apps", "mobile-app-development"),
    ("programming", "general-programming"),
    ("coding", "general-programming"),
];

/// "AI & Machine Learning" -> "ai-machine-learning"
pub fn slugify(name: &str) -> String {
    let mut slug = name.to_lowercase().replace(' ', "-").replace('&', "");
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug
}

/// First keyword contained in `name`, mapped to its path slug.
pub fn keyword_slug(name: &str) -> Option<&'static str> {
    let key = name.to_lowercase();
    NAME_KEYWORDS
        .iter()
        .find(|(keyword, _)| key.contains(keyword))
        .map(|(_, slug)| *slug)
}

/// Resolves a free-form path name: exact name, then slug, then keyword table.
pub async fn find_path_by_name(pool: &SqlitePool, name: &str) -> sqlx::Result<Option<LearningPath>> {
    if let Some(path) = PathRepository::find_active_by_name(pool, name).await? {
        return Ok(Some(path));
    }
    if let Some(path) = PathRepository::find_active_by_slug(pool, &slugify(name)).await? {
        return Ok(Some(path));
    }
    match keyword_slug(name) {
        Some(slug) => PathRepository::find_active_by_slug(pool, slug).await,
        None => Ok(None),
    }
}

/// Like [`find_path_by_name`] but falls back to General Programming.
pub async fn resolve_path(pool: &SqlitePool, name: &str) -> sqlx::Result<Option<LearningPath>> {
    match find_path_by_name(pool, name).await? {
        Some(path) => Ok(Some(path)),
        None => {
            tracing::debug!("No path matches '{}', using {}", name, DEFAULT_PATH_SLUG);
            PathRepository::find_active_by_slug(pool, DEFAULT_PATH_SLUG).await
        }
    }
}

/// A module is locked until the active module right before it is completed.
pub async fn is_module_locked(
    pool: &SqlitePool,
    student_id: &str,
    module: &LearningModule,
) -> sqlx::Result<bool> {
    if module.sort_order <= 1 {
        return Ok(false);
    }
    let Some(previous) = ModuleRepository::predecessor(pool, module).await? else {
        return Ok(false);
    };
    Ok(!ProgressRepository::is_completed(pool, student_id, &previous.id).await?)
}

/// A module as one student sees it.
#[derive(Debug, Serialize)]
pub struct ModuleView {
    pub id: Option<String>,
    pub module_id: String,
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    pub difficulty_level: String,
    pub estimated_hours: i64,
    pub sort_order: i64,
    pub status: String,
    pub progress_percentage: i64,
    pub time_spent_minutes: i64,
    pub is_locked: bool,
    pub learning_objectives: Vec<String>,
    pub topics: Vec<String>,
}

/// Lock state for listings: any recorded progress unlocks the module.
pub async fn listing_lock(
    pool: &SqlitePool,
    student_id: &str,
    module: &LearningModule,
    progress: Option<&ModuleProgress>,
) -> sqlx::Result<bool> {
    if progress.is_some() {
        return Ok(false);
    }
    is_module_locked(pool, student_id, module).await
}

pub async fn module_view(
    pool: &SqlitePool,
    student_id: &str,
    module: &LearningModule,
) -> sqlx::Result<ModuleView> {
    let progress = ProgressRepository::find(pool, student_id, &module.id).await?;
    let is_locked = listing_lock(pool, student_id, module, progress.as_ref()).await?;
    Ok(ModuleView {
        id: progress.as_ref().map(|p| p.id.clone()),
        module_id: module.id.clone(),
        title: module.title.clone(),
        description: module.description.clone(),
        icon: module.icon.clone(),
        difficulty_level: module.difficulty_level.clone(),
        estimated_hours: module.estimated_hours,
        sort_order: module.sort_order,
        status: progress
            .as_ref()
            .map(|p| p.status.clone())
            .unwrap_or_else(|| STATUS_NOT_STARTED.to_string()),
        progress_percentage: progress.as_ref().map_or(0, |p| p.progress_percentage),
        time_spent_minutes: progress.as_ref().map_or(0, |p| p.time_spent_minutes),
        is_locked,
        learning_objectives: module.objectives_vec(),
        topics: module.topics_vec(),
    })
}

/// Every active module of a path, in order, with the student's state.
pub async fn path_module_views(
    pool: &SqlitePool,
    student_id: &str,
    path_id: &str,
) -> sqlx::Result<Vec<ModuleView>> {
    let modules = ModuleRepository::list_active_for_path(pool, path_id).await?;
    let mut views = Vec::with_capacity(modules.len());
    for module in &modules {
        views.push(module_view(pool, student_id, module).await?);
    }
    Ok(views)
}
