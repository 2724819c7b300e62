use serde::Serialize;
use serde_json::Value;

use crate::db::{models::analytics::ActivityRepository, models::analytics::ErrorLogRepository};
use crate::db::{new_id, now, timestamp, DbPool};

const MAX_ERROR_MESSAGE_CHARS: usize = 1000;

/// Activity types that open or extend a learning session.
const SESSION_ACTIVITIES: &[&str] = &["module_start", "module_progress", "module_complete"];

#[derive(Debug, Clone)]
pub struct UserAction {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub action_type: String,
    pub category: String,
    pub name: String,
    pub metadata: Option<Value>,
}

impl UserAction {
    pub fn new(user_id: impl Into<String>, action_type: &str, category: &str, name: &str) -> Self {
        Self {
            user_id: Some(user_id.into()),
            session_id: None,
            action_type: action_type.to_string(),
            category: category.to_string(),
            name: name.to_string(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub error_type: String,
    pub category: String,
    pub severity: &'static str,
    pub message: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub endpoint: Option<String>,
    pub method: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Engagement {
    pub content_type: String,
    pub content_id: String,
    pub content_title: Option<String>,
    pub student_id: String,
    pub session_id: Option<String>,
    pub time_spent_minutes: i64,
    pub completion_percentage: f64,
    pub rating: Option<i64>,
    pub feedback: Option<String>,
}

/// Fire-and-forget: record a user action.
pub fn track_user_action(db: DbPool, action: UserAction) {
    tokio::spawn(async move {
        if let Err(e) = insert_user_action(&db, &action).await {
            tracing::warn!("Failed to record user action {}: {}", action.action_type, e);
        }
    });
}

async fn insert_user_action(db: &DbPool, action: &UserAction) -> sqlx::Result<()> {
    let metadata = action.metadata.as_ref().map(Value::to_string);
    sqlx::query(
        "INSERT INTO user_actions
            (id, user_id, session_id, action_type, action_category, action_name, metadata, performed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(new_id())
    .bind(action.user_id.as_deref())
    .bind(action.session_id.as_deref())
    .bind(&action.action_type)
    .bind(&action.category)
    .bind(&action.name)
    .bind(metadata)
    .bind(now())
    .execute(db)
    .await?;
    Ok(())
}

/// "module_complete" -> "Student Module Complete"
pub fn activity_display_name(activity_type: &str) -> String {
    let words: Vec<String> = activity_type
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    format!("Student {}", words.join(" "))
}

/// Fire-and-forget wrapper around [`record_student_activity`].
pub fn track_student_activity(
    db: DbPool,
    user_id: String,
    student_id: String,
    activity_type: String,
    data: Value,
    session_id: Option<String>,
) {
    tokio::spawn(async move {
        record_student_activity(&db, &user_id, &student_id, &activity_type, &data, session_id.as_deref())
            .await;
    });
}

/// Records a student activity as a `student_<type>` user action.
/// Module activities also keep an open learning session up to date.
/// Failures are logged, never returned. Writes for one session must be
/// awaited in order, or two of them can each open a session row.
pub async fn record_student_activity(
    db: &DbPool,
    user_id: &str,
    student_id: &str,
    activity_type: &str,
    data: &Value,
    session_id: Option<&str>,
) {
    let action = UserAction {
        user_id: Some(user_id.to_string()),
        session_id: session_id.map(str::to_string),
        action_type: format!("student_{}", activity_type),
        category: "learning".to_string(),
        name: activity_display_name(activity_type),
        metadata: Some(serde_json::json!({
            "student_id": student_id,
            "activity_data": data,
        })),
    };
    if let Err(e) = insert_user_action(db, &action).await {
        tracing::warn!("Failed to record student activity {}: {}", activity_type, e);
        return;
    }

    if !SESSION_ACTIVITIES.contains(&activity_type) {
        return;
    }
    let Some(module_id) = data.get("module_id").and_then(Value::as_str) else {
        return;
    };
    let progress = data
        .get("progress_percentage")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let minutes = data
        .get("time_spent_minutes")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if let Err(e) = upsert_learning_session(
        db,
        student_id,
        module_id,
        session_id,
        progress,
        minutes,
        activity_type == "module_complete",
    )
    .await
    {
        tracing::warn!("Failed to update learning session: {}", e);
    }
}

async fn upsert_learning_session(
    db: &DbPool,
    student_id: &str,
    module_id: &str,
    session_id: Option<&str>,
    progress: f64,
    minutes: i64,
    close: bool,
) -> sqlx::Result<()> {
    let ts = now();
    let open: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM learning_sessions
         WHERE student_id = ? AND module_id = ? AND session_id IS ? AND session_end IS NULL
         ORDER BY session_start DESC
         LIMIT 1"
    )
    .bind(student_id)
    .bind(module_id)
    .bind(session_id)
    .fetch_optional(db)
    .await?;

    let end = close.then(|| ts.clone());
    match open {
        Some((id,)) => {
            sqlx::query(
                "UPDATE learning_sessions
                 SET content_interactions = content_interactions + 1,
                     progress_percentage = MAX(progress_percentage, ?),
                     session_duration = COALESCE(session_duration, 0) + ?,
                     session_end = ?
                 WHERE id = ?"
            )
            .bind(progress)
            .bind(minutes)
            .bind(end)
            .bind(&id)
            .execute(db)
            .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO learning_sessions
                    (id, student_id, module_id, session_id, session_start, session_end,
                     session_duration, content_interactions, progress_percentage)
                 VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)"
            )
            .bind(new_id())
            .bind(student_id)
            .bind(module_id)
            .bind(session_id)
            .bind(&ts)
            .bind(end)
            .bind(minutes)
            .bind(progress)
            .execute(db)
            .await?;
        }
    }
    Ok(())
}

/// Fire-and-forget: upsert engagement for one piece of content and student.
pub fn track_content_engagement(db: DbPool, engagement: Engagement) {
    tokio::spawn(async move {
        let ts = now();
        let result = sqlx::query(
            "INSERT INTO content_engagement
                (id, content_type, content_id, content_title, student_id, session_id, view_count,
                 total_time_spent, completion_percentage, interactions, rating, feedback,
                 first_accessed, last_accessed)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, 1, ?, ?, ?, ?)
             ON CONFLICT (content_type, content_id, student_id) DO UPDATE SET
                view_count = view_count + 1,
                interactions = interactions + 1,
                total_time_spent = total_time_spent + excluded.total_time_spent,
                completion_percentage = MAX(completion_percentage, excluded.completion_percentage),
                rating = COALESCE(excluded.rating, rating),
                feedback = COALESCE(excluded.feedback, feedback),
                last_accessed = excluded.last_accessed"
        )
        .bind(new_id())
        .bind(&engagement.content_type)
        .bind(&engagement.content_id)
        .bind(engagement.content_title.as_deref())
        .bind(&engagement.student_id)
        .bind(engagement.session_id.as_deref())
        .bind(engagement.time_spent_minutes)
        .bind(engagement.completion_percentage)
        .bind(engagement.rating)
        .bind(engagement.feedback.as_deref())
        .bind(&ts)
        .bind(&ts)
        .execute(&db)
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to record content engagement: {}", e);
        }
    });
}

/// Fire-and-forget: write an error-log row. Messages are truncated to 1000 chars.
pub fn log_error(db: DbPool, entry: ErrorEntry) {
    tokio::spawn(async move {
        let message: String = entry.message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        let result = sqlx::query(
            "INSERT INTO error_logs
                (id, error_type, error_category, severity, error_message, user_id, session_id,
                 endpoint, request_method, user_agent, ip_address, resolved, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)"
        )
        .bind(new_id())
        .bind(&entry.error_type)
        .bind(&entry.category)
        .bind(entry.severity)
        .bind(&message)
        .bind(entry.user_id.as_deref())
        .bind(entry.session_id.as_deref())
        .bind(entry.endpoint.as_deref())
        .bind(entry.method.as_deref())
        .bind(entry.user_agent.as_deref())
        .bind(entry.ip_address.as_deref())
        .bind(now())
        .execute(&db)
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to write error log: {}", e);
        }
    });
}

/// Fire-and-forget: record a system metric sample.
pub fn record_system_metric(
    db: DbPool,
    name: &'static str,
    category: &'static str,
    value: f64,
    unit: Option<&'static str>,
    endpoint: Option<String>,
    method: Option<String>,
    status_code: Option<u16>,
) {
    tokio::spawn(async move {
        let result = sqlx::query(
            "INSERT INTO system_metrics
                (id, metric_name, metric_category, metric_value, metric_unit, endpoint, method,
                 status_code, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(new_id())
        .bind(name)
        .bind(category)
        .bind(value)
        .bind(unit)
        .bind(endpoint.as_deref())
        .bind(method.as_deref())
        .bind(status_code.map(i64::from))
        .bind(now())
        .execute(&db)
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to record metric {}: {}", name, e);
        }
    });
}

#[derive(Debug, Serialize)]
pub struct SystemHealth {
    pub errors_last_24h: i64,
    pub critical_errors_unresolved: i64,
    pub average_response_time_ms: f64,
    pub active_users_last_hour: i64,
    pub system_status: &'static str,
    pub generated_at: String,
}

pub async fn system_health(db: &DbPool) -> sqlx::Result<SystemHealth> {
    let now_utc = chrono::Utc::now();
    let day_ago = timestamp(now_utc - chrono::Duration::hours(24));
    let hour_ago = timestamp(now_utc - chrono::Duration::hours(1));

    let errors_last_24h = ErrorLogRepository::count_since(db, &day_ago).await?;
    let critical_errors_unresolved = ErrorLogRepository::count_unresolved_critical(db).await?;
    let average_response_time_ms = ActivityRepository::average_response_ms_since(db, &hour_ago).await?;
    let active_users_last_hour = ActivityRepository::active_users_since(db, &hour_ago).await?;

    Ok(SystemHealth {
        errors_last_24h,
        critical_errors_unresolved,
        average_response_time_ms: (average_response_time_ms * 100.0).round() / 100.0,
        active_users_last_hour,
        system_status: if critical_errors_unresolved == 0 { "healthy" } else { "degraded" },
        generated_at: timestamp(now_utc),
    })
}
