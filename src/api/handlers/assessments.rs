use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{owned_student, round2};
use crate::api::middleware::auth::AuthUser;
use crate::api::validators::sanitize_opt;
use crate::api::AppState;
use crate::db::analytics::{track_user_action, UserAction};
use crate::db::models::assessment::{
    Assessment, AssessmentRepository, CompletedAssessment, PATHWAY_FINDER,
};
use crate::db::models::learning::{EnrollmentRepository, PathRepository};
use crate::email::templates;
use crate::error::{AppError, AppResult};
use crate::learning::{achievements, catalog, check_minutes, recommend};

fn default_assessment_type() -> String {
    PATHWAY_FINDER.to_string()
}

#[derive(Deserialize)]
pub struct StartAssessment {
    pub student_id: String,
    #[serde(default = "default_assessment_type")]
    pub assessment_type: String,
}

#[derive(Deserialize)]
pub struct CompleteAssessment {
    pub student_id: String,
    pub assessment_id: String,
    #[serde(default)]
    pub responses: Vec<Value>,
    pub total_time_minutes: i64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub recommended_path: String,
    pub assessment_score: i64,
    pub confidence_level: Option<i64>,
    pub feedback: Option<String>,
}

fn progress_json(assessment: &Assessment) -> Value {
    json!({
        "id": assessment.id,
        "student_id": assessment.student_id,
        "started_at": assessment.started_at,
        "questions_answered": assessment.questions_answered,
        "total_questions": assessment.total_questions,
        "progress_percentage": assessment.progress_percentage(),
        "is_completed": assessment.is_completed,
    })
}

fn result_json(assessment: &Assessment, path_name: &str) -> Value {
    json!({
        "id": assessment.id,
        "student_id": assessment.student_id,
        "assessment_type": assessment.assessment_type,
        "completed_at": assessment.completed_at,
        "assessment_score": assessment.assessment_score,
        "recommended_path_id": assessment.recommended_path_id.clone().unwrap_or_default(),
        "recommended_path_name": path_name,
        "strengths": assessment.strengths_vec(),
        "interests": assessment.interests_vec(),
        "total_time_minutes": assessment.time_spent_minutes,
    })
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<StartAssessment>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &req.student_id, &user).await?;

    let kind = req.assessment_type.as_str();
    if let Some(done) = AssessmentRepository::latest_completed(&state.db, &student.id, kind).await? {
        return Ok(Json(progress_json(&done)));
    }
    if let Some(open) = AssessmentRepository::latest_open(&state.db, &student.id, kind).await? {
        return Ok(Json(progress_json(&open)));
    }

    let assessment = AssessmentRepository::create(&state.db, &student.id, &req.assessment_type).await?;
    tracing::info!("Assessment {} started for student {}", assessment.id, student.id);

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "assessment_start", "assessment", "Assessment Started").with_metadata(
            json!({
                "student_id": student.id,
                "assessment_type": req.assessment_type,
                "assessment_id": assessment.id,
            }),
        ),
    );

    Ok(Json(progress_json(&assessment)))
}

pub async fn complete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CompleteAssessment>,
) -> AppResult<Json<Value>> {
    if !(0..=100).contains(&req.assessment_score) {
        return Err(AppError::Validation("Assessment score must be between 0 and 100".to_string()));
    }
    check_minutes("total_time_minutes", req.total_time_minutes)?;

    let student = owned_student(&state.db, &req.student_id, &user).await?;
    let assessment = AssessmentRepository::find_for_student(&state.db, &req.assessment_id, &student.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment not found".to_string()))?;

    if assessment.is_completed {
        let path_name = match &assessment.recommended_path_id {
            Some(id) => PathRepository::get(&state.db, id).await?.map(|p| p.name),
            None => None,
        };
        return Ok(Json(result_json(&assessment, path_name.as_deref().unwrap_or("Unknown"))));
    }

    let path = catalog::resolve_path(&state.db, &req.recommended_path)
        .await?
        .ok_or_else(|| AppError::Internal("No learning path available for recommendation".to_string()))?;

    let feedback = sanitize_opt(req.feedback.clone());
    let completed = AssessmentRepository::complete(
        &state.db,
        &assessment.id,
        &CompletedAssessment {
            questions_answered: req.responses.len() as i64,
            time_spent_minutes: req.total_time_minutes,
            score: req.assessment_score,
            recommended_path_id: &path.id,
            strengths: &req.strengths,
            interests: &req.interests,
            confidence_level: req.confidence_level,
            feedback: feedback.as_deref(),
        },
    )
    .await?;

    EnrollmentRepository::assign(&state.db, &student.id, &path.id).await?;

    if req.assessment_score == 100 {
        achievements::award(&state.db, &user.id, &student.id, achievements::PERFECT_SCORE).await?;
    }

    state.email.send_in_background(
        user.email.clone(),
        templates::assessment_complete(
            &state.config.api.public_url,
            &user.first_name,
            &student.student_name,
            &path.name,
        ),
    );

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "assessment_complete", "assessment", "Assessment Completed").with_metadata(
            json!({
                "student_id": student.id,
                "assessment_id": completed.id,
                "score": req.assessment_score,
                "recommended_path": req.recommended_path,
                "time_spent": req.total_time_minutes,
            }),
        ),
    );

    tracing::info!(
        "Assessment {} completed for student {} -> {}",
        completed.id,
        student.id,
        path.slug
    );

    Ok(Json(result_json(&completed, &path.name)))
}

pub async fn results(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(student_id): Path<String>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;
    let rows = AssessmentRepository::list_completed(&state.db, &student.id).await?;

    let results: Vec<Value> = rows
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "student_id": student.id,
                "assessment_type": r.assessment_type,
                "completed_at": r.completed_at,
                "assessment_score": r.assessment_score,
                "recommended_path_id": r.recommended_path_id.clone().unwrap_or_default(),
                "recommended_path_name": r.recommended_path.as_deref().unwrap_or("Unknown"),
                "strengths": serde_json::from_str::<Vec<String>>(&r.strengths).unwrap_or_default(),
                "interests": serde_json::from_str::<Vec<String>>(&r.interests).unwrap_or_default(),
                "total_time_minutes": r.time_spent_minutes,
            })
        })
        .collect();

    Ok(Json(Value::Array(results)))
}

pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(student_id): Path<String>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;
    let latest = AssessmentRepository::latest_completed(&state.db, &student.id, PATHWAY_FINDER).await?;
    let paths = PathRepository::list_active(&state.db).await?;
    Ok(Json(json!(recommend::recommend(&paths, latest.as_ref()))))
}

pub async fn retake(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(student_id): Path<String>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;
    let reset = AssessmentRepository::reset_completed(&state.db, &student.id).await?;

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "assessment_retake", "assessment", "Assessment Retake Requested")
            .with_metadata(json!({ "student_id": student.id, "assessments_reset": reset })),
    );

    Ok(Json(json!({
        "message": "Assessment reset successfully. Student can now retake the assessment."
    })))
}

pub async fn analytics(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(student_id): Path<String>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;
    let history = AssessmentRepository::analytics_history(&state.db, &student.id).await?;

    let total = history.len() as i64;
    let (avg_minutes, avg_score) = if total > 0 {
        let seconds: i64 = history.iter().filter_map(|h| h.total_time_seconds).sum();
        let scores: i64 = history.iter().filter_map(|h| h.score).sum();
        (
            round2(seconds as f64 / total as f64 / 60.0),
            round2(scores as f64 / total as f64),
        )
    } else {
        (0.0, 0.0)
    };

    let entries: Vec<Value> = history
        .iter()
        .map(|h| {
            json!({
                "assessment_id": h.assessment_id,
                "completed_at": h.completed_at,
                "time_seconds": h.total_time_seconds,
                "questions_answered": h.questions_answered,
                "pause_count": h.pause_count,
                "focus_lost_count": h.window_focus_lost,
                "score": h.score,
            })
        })
        .collect();

    Ok(Json(json!({
        "student_id": student.id,
        "total_assessments": total,
        "average_completion_time_minutes": avg_minutes,
        "average_score": avg_score,
        "assessment_history": entries,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_request_defaults_to_pathway_finder() {
        let req: StartAssessment = serde_json::from_str(r#"{"student_id":"s1"}"#).unwrap();
        assert_eq!(req.assessment_type, PATHWAY_FINDER);
    }

    #[test]
    fn test_complete_request_counts_any_response_shape() {
        let req: CompleteAssessment = serde_json::from_str(
            r#"{"student_id":"s1","assessment_id":"a1","total_time_minutes":4,
                "recommended_path":"Robotics","assessment_score":80,
                "responses":[{"question_id":"q1","selected_option":"b"},{"question_id":"q2"},"skipped"]}"#,
        )
        .unwrap();
        assert_eq!(req.responses.len(), 3);
        assert!(req.strengths.is_empty());
    }
}
