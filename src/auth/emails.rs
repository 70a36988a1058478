use crate::mailer::EmailMessage;

pub fn verification_email(to: &str, frontend_url: &str, token: &str) -> EmailMessage {
    let url = format!("{frontend_url}/verify-email?token={token}");
    EmailMessage {
        to: to.to_string(),
        subject: "Verify Email".into(),
        text: format!("Please verify your email by clicking on the following link: {url}"),
        html: format!(
            "<p>Please verify your email by clicking on the following link: \
             <a href=\"{url}\">{url}</a></p>"
        ),
    }
}

pub fn reset_email(to: &str, frontend_url: &str, token: &str) -> EmailMessage {
    let url = format!("{frontend_url}/reset-password?token={token}");
    EmailMessage {
        to: to.to_string(),
        subject: "Reset Password".into(),
        text: format!(
            "You requested a password reset. Please click on the following link: {url}"
        ),
        html: format!(
            "<p>You requested a password reset. Please click on the following link: \
             <a href=\"{url}\">{url}</a></p>"
        ),
    }
}
