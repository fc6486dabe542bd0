//! Template-based sales email generation.
//!
//! Four fixed templates with `{name}` placeholders. Rendering is a single
//! literal pass: values are inserted verbatim and never re-scanned, and the
//! first placeholder without a value aborts the render.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    ColdOutreach,
    FollowUp,
    Proposal,
    ThankYou,
}

impl EmailKind {
    pub const ALL: [EmailKind; 4] = [
        EmailKind::ColdOutreach,
        EmailKind::FollowUp,
        EmailKind::Proposal,
        EmailKind::ThankYou,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::ColdOutreach => "cold_outreach",
            EmailKind::FollowUp => "follow_up",
            EmailKind::Proposal => "proposal",
            EmailKind::ThankYou => "thank_you",
        }
    }

    pub fn template(&self) -> &'static EmailTemplate {
        match self {
            EmailKind::ColdOutreach => &COLD_OUTREACH,
            EmailKind::FollowUp => &FOLLOW_UP,
            EmailKind::Proposal => &PROPOSAL,
            EmailKind::ThankYou => &THANK_YOU,
        }
    }
}

impl FromStr for EmailKind {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmailKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TemplateError::UnknownTemplate {
                requested: s.to_string(),
                available: available_templates(),
            })
    }
}

impl fmt::Display for EmailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct EmailTemplate {
    pub subject: &'static str,
    pub body: &'static str,
}

static COLD_OUTREACH: EmailTemplate = EmailTemplate {
    subject: "Quick question about {company_name}",
    body: "Hi {contact_name},

I hope this email finds you well. I came across {company_name} and was impressed by your work in the industry.

I wanted to reach out because I believe we could help you {value_proposition}. Many companies similar to yours have seen significant improvements in {benefit_area}.

Would you be open to a brief 15-minute call next week to explore if this could be valuable for {company_name}?

Looking forward to hearing from you.

Best regards,
{sender_name}",
};

static FOLLOW_UP: EmailTemplate = EmailTemplate {
    subject: "Following up on our conversation",
    body: "Hi {contact_name},

I wanted to follow up on our recent conversation about {topic}.

I've prepared some additional information that I think you'll find valuable. {additional_info}

When would be a good time for a quick call to discuss the next steps?

Best regards,
{sender_name}",
};

static PROPOSAL: EmailTemplate = EmailTemplate {
    subject: "Proposal for {company_name}",
    body: "Hi {contact_name},

Thank you for your interest in our services. I'm excited to share how we can help {company_name} achieve {goals}.

Based on our discussion, I've outlined a customized proposal that addresses your specific needs:

{proposal_points}

I'd love to schedule a call to walk through this proposal and answer any questions you might have.

Best regards,
{sender_name}",
};

static THANK_YOU: EmailTemplate = EmailTemplate {
    subject: "Thank you for your time",
    body: "Hi {contact_name},

Thank you for taking the time to speak with me today. I really enjoyed learning more about {company_name} and your goals for {area}.

As discussed, I'll {next_steps}.

Please don't hesitate to reach out if you have any questions in the meantime.

Best regards,
{sender_name}",
};

impl EmailTemplate {
    /// Sorted, de-duplicated placeholder names used by subject and body.
    pub fn required_variables(&self) -> Vec<String> {
        PLACEHOLDER
            .captures_iter(self.subject)
            .chain(PLACEHOLDER.captures_iter(self.body))
            .map(|caps| caps[1].to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedEmail {
    pub subject: String,
    pub body: String,
    pub email_type: EmailKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown email type: {requested}")]
    UnknownTemplate {
        requested: String,
        available: Vec<String>,
    },
    #[error("Missing required context variable: '{variable}'")]
    MissingVariable {
        template: EmailKind,
        variable: String,
        required: Vec<String>,
    },
}

/// Keys of every template, in declaration order.
pub fn available_templates() -> Vec<String> {
    EmailKind::ALL
        .iter()
        .map(|kind| kind.as_str().to_string())
        .collect()
}

/// Renders the template named `email_type` with `context`.
pub fn generate_email(
    email_type: &str,
    context: &HashMap<String, String>,
) -> Result<GeneratedEmail, TemplateError> {
    let kind: EmailKind = email_type.parse()?;
    render(kind, context)
}

/// Renders a known template.
pub fn render(
    kind: EmailKind,
    context: &HashMap<String, String>,
) -> Result<GeneratedEmail, TemplateError> {
    let template = kind.template();
    let missing = |variable: &str| TemplateError::MissingVariable {
        template: kind,
        variable: variable.to_string(),
        required: template.required_variables(),
    };

    let subject = substitute(template.subject, context).map_err(missing)?;
    let body = substitute(template.body, context).map_err(missing)?;

    tracing::debug!(
        "Rendered '{}' email ({} chars)",
        kind,
        subject.len() + body.len()
    );

    Ok(GeneratedEmail {
        subject,
        body,
        email_type: kind,
    })
}

/// Replaces every placeholder in `text`; on failure returns the first unresolved name.
fn substitute<'t>(text: &'t str, context: &HashMap<String, String>) -> Result<String, &'t str> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = context.get(name.as_str()).ok_or(name.as_str())?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_cold_outreach_with_no_context_lists_all_placeholders() {
        let err = generate_email("cold_outreach", &HashMap::new()).unwrap_err();
        match err {
            TemplateError::MissingVariable {
                template,
                variable,
                required,
            } => {
                assert_eq!(template, EmailKind::ColdOutreach);
                // subject is scanned first
                assert_eq!(variable, "company_name");
                assert_eq!(
                    required,
                    vec![
                        "benefit_area",
                        "company_name",
                        "contact_name",
                        "sender_name",
                        "value_proposition"
                    ]
                );
            }
            other => panic!("Expected missing variable, got {:?}", other),
        }
    }

    #[test]
    fn test_follow_up_renders() {
        let email = generate_email(
            "follow_up",
            &context(&[
                ("contact_name", "Ana"),
                ("topic", "pricing"),
                ("additional_info", "See the attached sheet."),
                ("sender_name", "Bruno"),
            ]),
        )
        .unwrap();

        assert_eq!(email.subject, "Following up on our conversation");
        assert!(email.body.starts_with("Hi Ana,"));
        assert!(email.body.contains("conversation about pricing."));
        assert!(email.body.ends_with("Best regards,\nBruno"));
        assert_eq!(email.email_type, EmailKind::FollowUp);
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let email = generate_email(
            "thank_you",
            &context(&[
                ("contact_name", "{sender_name}"),
                ("company_name", "Acme"),
                ("area", "growth"),
                ("next_steps", "send the contract"),
                ("sender_name", "Carla"),
            ]),
        )
        .unwrap();

        assert!(email.body.starts_with("Hi {sender_name},"));
    }

    #[test]
    fn test_missing_body_variable_reported_after_subject_resolves() {
        let err = generate_email(
            "proposal",
            &context(&[("company_name", "Acme"), ("contact_name", "Dan")]),
        )
        .unwrap_err();

        assert_eq!(
            err,
            TemplateError::MissingVariable {
                template: EmailKind::Proposal,
                variable: "goals".to_string(),
                required: vec![
                    "company_name".to_string(),
                    "contact_name".to_string(),
                    "goals".to_string(),
                    "proposal_points".to_string(),
                    "sender_name".to_string(),
                ],
            }
        );
    }

    #[test]
    fn test_unknown_template() {
        let err = generate_email("break_up", &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnknownTemplate {
                requested: "break_up".to_string(),
                available: vec![
                    "cold_outreach".to_string(),
                    "follow_up".to_string(),
                    "proposal".to_string(),
                    "thank_you".to_string(),
                ],
            }
        );
        assert_eq!(err.to_string(), "Unknown email type: break_up");
    }

    #[test]
    fn test_extra_context_is_ignored() {
        let email = render(
            EmailKind::ThankYou,
            &context(&[
                ("contact_name", "Eve"),
                ("company_name", "Globex"),
                ("area", "expansion"),
                ("next_steps", "share a quote"),
                ("sender_name", "Fay"),
                ("unused", "x"),
            ]),
        )
        .unwrap();
        assert!(email.body.contains("As discussed, I'll share a quote."));
    }
}
