use serde::Serialize;

use crate::db::models::assessment::Assessment;
use crate::db::models::learning::LearningPath;

const BASE_SCORE: i64 = 70;
const INTEREST_BONUS: i64 = 10;
const MAX_SCORE: i64 = 100;

/// Interest keywords per path slug.
const PATH_KEYWORDS: &[(&str, &[&str])] = &[
    ("game-development", &["games", "interactive", "storytelling"]),
    ("ai-machine-learning", &["ai", "data", "patterns", "decisions"]),
    ("web-development", &["websites", "web", "online"]),
    ("robotics", &["robots", "physical", "automation"]),
    ("data-science", &["data", "statistics", "analysis"]),
    ("mobile-app-development", &["mobile", "apps", "phones"]),
];

#[derive(Debug, Clone, Serialize)]
pub struct PathRecommendation {
    pub path_id: String,
    pub path_name: String,
    pub match_score: i64,
    pub reasons: Vec<String>,
    pub description: String,
    pub estimated_hours: i64,
}

fn keywords_for(slug: &str) -> &'static [&'static str] {
    PATH_KEYWORDS
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, k)| *k)
        .unwrap_or(&[])
}

/// Interests containing at least one of the path's keywords.
fn interest_matches(interests: &[String], slug: &str) -> i64 {
    let keywords = keywords_for(slug);
    interests
        .iter()
        .filter(|interest| {
            let interest = interest.to_lowercase();
            keywords.iter().any(|k| interest.contains(k))
        })
        .count() as i64
}

/// Scores every path against the latest completed assessment, best first.
pub fn recommend(paths: &[LearningPath], latest: Option<&Assessment>) -> Vec<PathRecommendation> {
    let mut recommendations: Vec<PathRecommendation> = paths
        .iter()
        .map(|path| {
            let mut score = BASE_SCORE;
            let mut reasons = vec!["Great introduction to programming concepts".to_string()];

            if let Some(assessment) = latest {
                if assessment.recommended_path_id.as_deref() == Some(path.id.as_str()) {
                    score = assessment.assessment_score.unwrap_or(BASE_SCORE);
                    let mut strengths = assessment.strengths_vec();
                    if strengths.is_empty() {
                        strengths.push("problem solving".to_string());
                    }
                    reasons = vec![format!(
                        "Based on your assessment results showing strengths in {}",
                        strengths.join(", ")
                    )];
                }

                let interests = assessment.interests_vec();
                let matches = interest_matches(&interests, &path.slug);
                if matches > 0 {
                    score += matches * INTEREST_BONUS;
                    reasons.push(format!("Matches your interest in {}", interests.join(", ")));
                }
            }

            PathRecommendation {
                path_id: path.id.clone(),
                path_name: path.name.clone(),
                match_score: score.min(MAX_SCORE),
                reasons,
                description: path.description.clone(),
                estimated_hours: path.estimated_hours,
            }
        })
        .collect();

    // Stable sort keeps catalog order among equal scores.
    recommendations.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(id: &str, slug: &str, order: i64) -> LearningPath {
        LearningPath {
            id: id.to_string(),
            name: slug.replace('-', " "),
            slug: slug.to_string(),
            description: String::new(),
            icon: None,
            difficulty_level: "beginner".to_string(),
            estimated_hours: 40,
            sort_order: order,
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn assessment(path_id: &str, score: i64, interests: &str) -> Assessment {
        Assessment {
            id: "a1".to_string(),
            student_id: "s1".to_string(),
            assessment_type: "pathway_finder".to_string(),
            started_at: String::new(),
            completed_at: Some("2024-01-01T00:00:00.000Z".to_string()),
            total_questions: 10,
            questions_answered: 10,
            time_spent_minutes: 12,
            assessment_score: Some(score),
            recommended_path_id: Some(path_id.to_string()),
            strengths: r#"["logic"]"#.to_string(),
            interests: interests.to_string(),
            confidence_level: None,
            feedback: None,
            is_completed: true,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_without_assessment_every_path_scores_base() {
        let paths = [path("p1", "game-development", 1), path("p2", "robotics", 2)];
        let recs = recommend(&paths, None);
        assert!(recs.iter().all(|r| r.match_score == BASE_SCORE));
        assert_eq!(recs[0].path_id, "p1");
    }

    #[test]
    fn test_recommended_path_uses_assessment_score() {
        let paths = [path("p1", "game-development", 1), path("p2", "robotics", 2)];
        let latest = assessment("p2", 88, "[]");
        let recs = recommend(&paths, Some(&latest));
        assert_eq!(recs[0].path_id, "p2");
        assert_eq!(recs[0].match_score, 88);
        assert!(recs[0].reasons[0].contains("logic"));
    }

    #[test]
    fn test_interest_bonus_is_capped() {
        let paths = [path("p1", "ai-machine-learning", 1), path("p2", "web-development", 2)];
        let latest = assessment("p1", 95, r#"["AI robots", "Big Data", "online games"]"#);
        let recs = recommend(&paths, Some(&latest));
        let ai = recs.iter().find(|r| r.path_id == "p1").unwrap();
        assert_eq!(ai.match_score, 100);
        let web = recs.iter().find(|r| r.path_id == "p2").unwrap();
        assert_eq!(web.match_score, 80);
        assert_eq!(web.reasons.len(), 2);
    }
}
