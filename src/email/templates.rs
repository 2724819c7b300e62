//! Subjects and bodies for the parent notifications.

#[derive(Debug, Clone)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

fn html_page(title: &str, heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{title}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
<div style="background: #5B47B0; color: white; padding: 24px; text-align: center; border-radius: 10px 10px 0 0;">
<h1 style="margin: 0;">{heading}</h1>
</div>
<div style="padding: 24px; border: 1px solid #ddd; border-radius: 0 0 10px 10px;">
{body}
<p style="color: #5B47B0; font-weight: bold;">The CIFIX LEARN Team</p>
</div>
</body>
</html>"#
    )
}

/// Escapes text interpolated into HTML bodies.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn button(url: &str, label: &str) -> String {
    format!(
        r#"<p style="text-align: center; margin: 28px 0;"><a href="{url}" style="background: #00D9C0; color: white; padding: 12px 28px; text-decoration: none; border-radius: 24px; font-weight: bold;">{label}</a></p>"#
    )
}

fn path_icon(path_name: &str) -> &'static str {
    match path_name {
        "Game Development" => "🎮",
        "AI & Machine Learning" | "Robotics" => "🤖",
        "Web Development" => "🌐",
        "Data Science" => "📊",
        "Mobile App Development" => "📱",
        _ => "💻",
    }
}

pub fn verification(app_url: &str, user_name: &str, token: &str, expiry_hours: i64) -> EmailContent {
    let url = format!("{}/verify-email/{}", app_url, token);
    let body = format!(
        "<p>Hi {user_name},</p>\
         <p>Thanks for creating a CIFIX LEARN account. Please confirm your email address.</p>\
         {}\
         <p>This link expires in {expiry_hours} hours. If you did not sign up, ignore this email.</p>",
        button(&url, "Verify Email"),
        user_name = escape(user_name),
    );
    EmailContent {
        subject: "Welcome to CIFIX LEARN - Please verify your email".to_string(),
        html: html_page("Verify your email", "Welcome to CIFIX LEARN!", &body),
        text: format!(
            "Welcome to CIFIX LEARN, {user_name}!\n\n\
             Please verify your email address by opening the link below:\n{url}\n\n\
             This link will expire in {expiry_hours} hours.\n\n\
             If you didn't create an account with CIFIX LEARN, please ignore this email.\n\n\
             The CIFIX LEARN Team\n"
        ),
    }
}

pub fn welcome(app_url: &str, user_name: &str, student_name: &str) -> EmailContent {
    let dashboard = format!("{}/dashboard", app_url);
    let body = format!(
        "<p>Welcome aboard, {user_name}!</p>\
         <p>Your email is verified and {student_name} can start learning.</p>\
         <ol><li>Take the pathway assessment</li><li>Explore the learning modules</li>\
         <li>Track progress and earn achievements</li></ol>{}",
        button(&dashboard, "Start Learning"),
        user_name = escape(user_name),
        student_name = escape(student_name),
    );
    EmailContent {
        subject: format!("Welcome to CIFIX LEARN - {student_name} is ready to start!"),
        html: html_page("Welcome to CIFIX LEARN", "Account Verified! 🎉", &body),
        text: format!(
            "Welcome to CIFIX LEARN, {user_name}!\n\n\
             Your account has been verified. {student_name} is ready to start learning.\n\n\
             1. Take the pathway assessment\n\
             2. Explore the learning modules\n\
             3. Track progress and earn achievements\n\n\
             Get started at: {dashboard}\n\n\
             The CIFIX LEARN Team\n"
        ),
    }
}

pub fn assessment_complete(app_url: &str, user_name: &str, student_name: &str, path_name: &str) -> EmailContent {
    let modules = format!("{}/learning-modules", app_url);
    let body = format!(
        "<p>Great news, {user_name}!</p>\
         <p>{student_name} finished the pathway assessment. Their recommended path is:</p>\
         <h2 style=\"text-align: center; color: #5B47B0;\">{} {path_name}</h2>{}",
        path_icon(path_name),
        button(&modules, "Start Learning Modules"),
        user_name = escape(user_name),
        student_name = escape(student_name),
        path_name = escape(path_name),
    );
    EmailContent {
        subject: format!("🎯 {student_name}'s Perfect Learning Path: {path_name}"),
        html: html_page("Assessment complete", "Perfect Match Found! 🎯", &body),
        text: format!(
            "Great news, {user_name}!\n\n\
             {student_name} has completed the pathway assessment.\n\n\
             Recommended Learning Path: {path_name}\n\n\
             View Progress: {app_url}/dashboard\n\n\
             The CIFIX LEARN Team\n"
        ),
    }
}

pub fn progress_update(
    app_url: &str,
    user_name: &str,
    student_name: &str,
    module_title: &str,
    path_progress: i64,
) -> EmailContent {
    let dashboard = format!("{}/dashboard", app_url);
    let body = format!(
        "<p>Congratulations, {user_name}!</p>\
         <p>{student_name} just completed <strong>\"{module_title}\"</strong>.</p>\
         <p style=\"text-align: center; font-size: 18px; font-weight: bold;\">Learning path: {path_progress}% complete</p>{}",
        button(&dashboard, "View Full Progress"),
        user_name = escape(user_name),
        student_name = escape(student_name),
        module_title = escape(module_title),
    );
    EmailContent {
        subject: format!("🏆 {student_name} completed {module_title}!"),
        html: html_page("Module completed", "Module Completed! 🏆", &body),
        text: format!(
            "Congratulations, {user_name}!\n\n\
             {student_name} just completed \"{module_title}\".\n\n\
             Learning Path Progress: {path_progress}%\n\n\
             View Full Progress: {dashboard}\n\n\
             The CIFIX LEARN Team\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_link() {
        let email = verification("https://cifixlearn.online", "Ada", "tok123", 24);
        assert_eq!(email.subject, "Welcome to CIFIX LEARN - Please verify your email");
        assert!(email.text.contains("https://cifixlearn.online/verify-email/tok123"));
        assert!(email.html.contains("https://cifixlearn.online/verify-email/tok123"));
    }

    #[test]
    fn test_subjects_name_the_student() {
        assert_eq!(
            welcome("http://x", "Ada", "Byron").subject,
            "Welcome to CIFIX LEARN - Byron is ready to start!"
        );
        assert_eq!(
            assessment_complete("http://x", "Ada", "Byron", "Robotics").subject,
            "🎯 Byron's Perfect Learning Path: Robotics"
        );
        let progress = progress_update("http://x", "Ada", "Byron", "Scratch Programming", 33);
        assert_eq!(progress.subject, "🏆 Byron completed Scratch Programming!");
        assert!(progress.text.contains("33%"));
    }

    #[test]
    fn test_html_bodies_escape_names() {
        let email = welcome("http://x", "<b>Ada</b>", "Tom & \"Jerry\"");
        assert!(email.html.contains("&lt;b&gt;Ada&lt;/b&gt;"));
        assert!(email.html.contains("Tom &amp; &quot;Jerry&quot;"));
        assert!(!email.html.contains("<b>Ada</b>"));
        assert!(email.text.contains("<b>Ada</b>"));

        let progress = progress_update("http://x", "Ada", "<script>x</script>", "Intro", 10);
        assert!(!progress.html.contains("<script>"));
        assert!(progress.html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!verification("http://x", "<i>", "t", 24).html.contains("<i>"));
    }
}
