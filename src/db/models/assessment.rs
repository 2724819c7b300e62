use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{new_id, now};

pub const PATHWAY_FINDER: &str = "pathway_finder";
pub const TOTAL_QUESTIONS: i64 = 10;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Assessment {
    pub id: String,
    pub student_id: String,
    pub assessment_type: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub total_questions: i64,
    pub questions_answered: i64,
    pub time_spent_minutes: i64,
    pub assessment_score: Option<i64>,
    pub recommended_path_id: Option<String>,
    pub strengths: String,  // JSON array as string
    pub interests: String,  // JSON array as string
    pub confidence_level: Option<i64>,
    pub feedback: Option<String>,
    pub is_completed: bool,
    pub created_at: String,
}

impl Assessment {
    pub fn strengths_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.strengths).unwrap_or_default()
    }

    pub fn interests_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.interests).unwrap_or_default()
    }

    /// Answered share of the questionnaire; a completed assessment is always 100.
    pub fn progress_percentage(&self) -> i64 {
        if self.is_completed {
            return 100;
        }
        if self.total_questions <= 0 {
            return 0;
        }
        (self.questions_answered * 100 / self.total_questions).min(100)
    }
}

/// Completed assessment joined with the recommended path's name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssessmentResult {
    pub id: String,
    pub assessment_type: String,
    pub completed_at: Option<String>,
    pub assessment_score: Option<i64>,
    pub time_spent_minutes: i64,
    pub recommended_path_id: Option<String>,
    pub recommended_path: Option<String>,
    pub strengths: String,
    pub interests: String,
    pub confidence_level: Option<i64>,
}

/// One completed attempt with its timing analytics.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssessmentHistoryRow {
    pub assessment_id: String,
    pub completed_at: Option<String>,
    pub total_time_seconds: Option<i64>,
    pub questions_answered: i64,
    pub pause_count: i64,
    pub window_focus_lost: i64,
    pub score: Option<i64>,
}

pub struct CompletedAssessment<'a> {
    pub questions_answered: i64,
    pub time_spent_minutes: i64,
    pub score: i64,
    pub recommended_path_id: &'a str,
    pub strengths: &'a [String],
    pub interests: &'a [String],
    pub confidence_level: Option<i64>,
    pub feedback: Option<&'a str>,
}

pub struct AssessmentRepository;

impl AssessmentRepository {
    pub async fn latest_completed(
        pool: &SqlitePool,
        student_id: &str,
        assessment_type: &str,
    ) -> sqlx::Result<Option<Assessment>> {
        sqlx::query_as::<_, Assessment>(
            "SELECT * FROM student_assessments
             WHERE student_id = ? AND assessment_type = ? AND is_completed = 1
             ORDER BY completed_at DESC
             LIMIT 1"
        )
        .bind(student_id)
        .bind(assessment_type)
        .fetch_optional(pool)
        .await
    }

    pub async fn latest_open(
        pool: &SqlitePool,
        student_id: &str,
        assessment_type: &str,
    ) -> sqlx::Result<Option<Assessment>> {
        sqlx::query_as::<_, Assessment>(
            "SELECT * FROM student_assessments
             WHERE student_id = ? AND assessment_type = ? AND is_completed = 0
             ORDER BY started_at DESC
             LIMIT 1"
        )
        .bind(student_id)
        .bind(assessment_type)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_for_student(
        pool: &SqlitePool,
        id: &str,
        student_id: &str,
    ) -> sqlx::Result<Option<Assessment>> {
        sqlx::query_as::<_, Assessment>(
            "SELECT * FROM student_assessments WHERE id = ? AND student_id = ?"
        )
        .bind(id)
        .bind(student_id)
        .fetch_optional(pool)
        .await
    }

    /// Opens a new assessment and its analytics row.
    pub async fn create(pool: &SqlitePool, student_id: &str, assessment_type: &str) -> sqlx::Result<Assessment> {
        let ts = now();
        let mut tx = pool.begin().await?;

        let assessment = sqlx::query_as::<_, Assessment>(
            "INSERT INTO student_assessments
                (id, student_id, assessment_type, started_at, total_questions,
                 questions_answered, time_spent_minutes, is_completed, created_at)
             VALUES (?, ?, ?, ?, ?, 0, 0, 0, ?)
             RETURNING *"
        )
        .bind(new_id())
        .bind(student_id)
        .bind(assessment_type)
        .bind(&ts)
        .bind(TOTAL_QUESTIONS)
        .bind(&ts)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO assessment_analytics (id, assessment_id, student_id, started_at, created_at)
             VALUES (?, ?, ?, ?, ?)"
        )
        .bind(new_id())
        .bind(&assessment.id)
        .bind(student_id)
        .bind(&ts)
        .bind(&ts)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(assessment)
    }

    /// Stores the results and the timing on the analytics row.
    pub async fn complete(
        pool: &SqlitePool,
        id: &str,
        result: &CompletedAssessment<'_>,
    ) -> sqlx::Result<Assessment> {
        let ts = now();
        let strengths = serde_json::to_string(result.strengths).unwrap_or_else(|_| "[]".to_string());
        let interests = serde_json::to_string(result.interests).unwrap_or_else(|_| "[]".to_string());
        let total_seconds = result.time_spent_minutes.checked_mul(60).unwrap_or(i64::MAX);
        let per_question = if result.questions_answered > 0 {
            total_seconds as f64 / result.questions_answered as f64
        } else {
            0.0
        };

        let mut tx = pool.begin().await?;

        let assessment = sqlx::query_as::<_, Assessment>(
            "UPDATE student_assessments
             SET completed_at = ?, questions_answered = ?, time_spent_minutes = ?,
                 assessment_score = ?, recommended_path_id = ?, strengths = ?, interests = ?,
                 confidence_level = ?, feedback = ?, is_completed = 1
             WHERE id = ?
             RETURNING *"
        )
        .bind(&ts)
        .bind(result.questions_answered)
        .bind(result.time_spent_minutes)
        .bind(result.score)
        .bind(result.recommended_path_id)
        .bind(&strengths)
        .bind(&interests)
        .bind(result.confidence_level)
        .bind(result.feedback)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE assessment_analytics
             SET completed_at = ?, total_time_seconds = ?, average_time_per_question = ?,
                 questions_answered = ?
             WHERE assessment_id = ?"
        )
        .bind(&ts)
        .bind(total_seconds)
        .bind(per_question)
        .bind(result.questions_answered)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(assessment)
    }

    pub async fn list_completed(pool: &SqlitePool, student_id: &str) -> sqlx::Result<Vec<AssessmentResult>> {
        sqlx::query_as::<_, AssessmentResult>(
            "SELECT a.id, a.assessment_type, a.completed_at, a.assessment_score,
                    a.time_spent_minutes, a.recommended_path_id, p.name AS recommended_path,
                    a.strengths, a.interests, a.confidence_level
             FROM student_assessments a
             LEFT JOIN learning_paths p ON p.id = a.recommended_path_id
             WHERE a.student_id = ? AND a.is_completed = 1
             ORDER BY a.completed_at DESC"
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    /// Reopens every completed assessment. Returns the number of rows reset.
    pub async fn reset_completed(pool: &SqlitePool, student_id: &str) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE student_assessments SET is_completed = 0 WHERE student_id = ? AND is_completed = 1"
        )
        .bind(student_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn analytics_history(
        pool: &SqlitePool,
        student_id: &str,
    ) -> sqlx::Result<Vec<AssessmentHistoryRow>> {
        sqlx::query_as::<_, AssessmentHistoryRow>(
            "SELECT aa.assessment_id, aa.completed_at, aa.total_time_seconds,
                    aa.questions_answered, aa.pause_count, aa.window_focus_lost,
                    a.assessment_score AS score
             FROM assessment_analytics aa
             JOIN student_assessments a ON a.id = aa.assessment_id
             WHERE aa.student_id = ? AND a.is_completed = 1
             ORDER BY aa.completed_at DESC"
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_completed(pool: &SqlitePool) -> sqlx::Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM student_assessments WHERE is_completed = 1")
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(answered: i64, completed: bool) -> Assessment {
        Assessment {
            id: "a1".to_string(),
            student_id: "s1".to_string(),
            assessment_type: PATHWAY_FINDER.to_string(),
            started_at: "2024-01-01T00:00:00.000Z".to_string(),
            completed_at: None,
            total_questions: TOTAL_QUESTIONS,
            questions_answered: answered,
            time_spent_minutes: 0,
            assessment_score: None,
            recommended_path_id: None,
            strengths: r#"["logic","creativity"]"#.to_string(),
            interests: "not json".to_string(),
            confidence_level: None,
            feedback: None,
            is_completed: completed,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_progress_percentage() {
        assert_eq!(assessment(0, false).progress_percentage(), 0);
        assert_eq!(assessment(4, false).progress_percentage(), 40);
        assert_eq!(assessment(3, true).progress_percentage(), 100);
    }

    #[test]
    fn test_json_columns_tolerate_bad_data() {
        let a = assessment(0, false);
        assert_eq!(a.strengths_vec(), vec!["logic", "creativity"]);
        assert!(a.interests_vec().is_empty());
    }
}
