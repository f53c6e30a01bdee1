//! HTML bodies for every message the forms send.
//!
//! Rendered with maud, so submitted values are escaped wherever they land.

use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::forms::validation::{ContactFormData, Timeline};

/// Subject and body ready to hand to a [`Mailer`](super::Mailer).
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

const BRAND_CSS: &str = "\
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; line-height: 1.6; color: #333; }
.container { max-width: 600px; margin: 0 auto; padding: 20px; }
.header { background: #E07A5F; color: white; padding: 30px; text-align: center; border-radius: 8px 8px 0 0; }
.content { background: #F4F1DE; padding: 30px; border-radius: 0 0 8px 8px; }
.card { background: #F4F1DE; padding: 20px; margin: 15px 0; border-radius: 8px; }
.button { background: #E07A5F; color: white; padding: 16px 32px; text-decoration: none; border-radius: 6px; display: inline-block; font-weight: bold; }
.footer { text-align: center; margin-top: 30px; font-size: 14px; color: #666; }
a { color: #3D5A80; }";

const INTERNAL_CSS: &str = "\
body { font-family: monospace; line-height: 1.6; color: #333; }
.container { max-width: 800px; margin: 0 auto; padding: 20px; }
.section { background: #f5f5f5; padding: 15px; margin: 15px 0; border-left: 4px solid #E07A5F; }
.label { font-weight: bold; color: #3D5A80; }";

fn page(css: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                style { (PreEscaped(css)) }
            }
            body { (body) }
        }
    }
    .into_string()
}

fn brand_footer(site_url: &str) -> Markup {
    html! {
        div class="footer" {
            p { "Equity by Design | Design for Everyone" }
            p { a href=(site_url) { (site_url.trim_start_matches("https://").trim_start_matches("http://")) } }
        }
    }
}

fn priority_color(timeline: Timeline) -> &'static str {
    match timeline {
        Timeline::Urgent => "#FF6B6B",
        Timeline::Soon => "#FFA500",
        Timeline::Flexible | Timeline::Planning => "#81B29A",
    }
}

// ============================================================================
// Contact
// ============================================================================

/// Acknowledgement sent to the person who submitted the contact form.
pub fn contact_confirmation(data: &ContactFormData, site_url: &str) -> RenderedEmail {
    let body = html! {
        div class="container" {
            div class="header" {
                h1 { "Thank You, " (data.name) "!" }
            }
            div class="content" {
                p { "We've received your inquiry about working with Equity by Design for " (data.organization) "." }
                p { "Our team is reviewing your project details and will reach out within 24 hours to discuss next steps." }
                p { "In the meantime, feel free to:" }
                ul {
                    li { a href={ (site_url) "/work" } { "Explore our case studies" } }
                    li { a href={ (site_url) "/insights" } { "Read our latest insights" } }
                    li { a href={ (site_url) "/about" } { "Learn more about our team" } }
                }
                p { "If you have any immediate questions, just reply to this email." }
                p { "Looking forward to creating change together!" }
                p { strong { "The Equity by Design Team" } }
            }
            (brand_footer(site_url))
        }
    };

    RenderedEmail {
        subject: "We received your inquiry - Equity by Design".to_string(),
        html: page(BRAND_CSS, body),
    }
}

/// Inquiry summary for the internal team.
pub fn internal_notification(data: &ContactFormData) -> RenderedEmail {
    let mailto = format!("mailto:{}", data.email);
    let reply = format!("mailto:{}?subject=Re: Your Equity by Design inquiry", data.email);

    let body = html! {
        div class="container" {
            h1 { "New Project Inquiry" }

            div class="section" {
                h2 { "Contact Information" }
                p { span class="label" { "Name:" } " " (data.name) }
                p { span class="label" { "Email:" } " " a href=(mailto) { (data.email) } }
                @if let Some(phone) = data.phone.as_deref().filter(|p| !p.trim().is_empty()) {
                    p { span class="label" { "Phone:" } " " (phone) }
                }
                p { span class="label" { "Organization:" } " " (data.organization) }
                p { span class="label" { "Type:" } " " (data.organization_type) }
                @if let Some(size) = &data.organization_size {
                    p { span class="label" { "Size:" } " " (size) }
                }
            }

            div class={ "section priority-" (data.timeline.as_str()) }
                style={ "border-left-color: " (priority_color(data.timeline)) } {
                h2 { "Project Details" }
                p { span class="label" { "Services Requested:" } " " (data.project_type.join(", ")) }
                p { span class="label" { "Timeline:" } " " (data.timeline.as_str().to_uppercase()) }
                @if let Some(budget) = &data.budget {
                    p { span class="label" { "Budget:" } " " (budget) }
                }
                p { span class="label" { "Description:" } }
                p { (data.project_description) }
                @if let Some(goals) = &data.goals {
                    p { span class="label" { "Goals:" } " " (goals) }
                }
                @if let Some(info) = &data.additional_info {
                    p { span class="label" { "Additional Info:" } " " (info) }
                }
                @if let Some(source) = &data.referral_source {
                    p { span class="label" { "Heard about us via:" } " " (source) }
                }
                p { span class="label" { "Marketing consent:" } " " (if data.marketing_consent { "yes" } else { "no" }) }
            }

            div class="section" {
                h2 { "Next Steps" }
                ol {
                    li { "Review project details and assess fit" }
                    li { "Check team availability" }
                    li { "Respond within 24 hours" }
                    li { "Schedule discovery call if appropriate" }
                }
            }

            p style="margin-top: 30px;" {
                a href=(reply)
                    style="background: #E07A5F; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block;" {
                    "Reply to " (data.name)
                }
            }
        }
    };

    RenderedEmail {
        subject: format!("New Project Inquiry: {}", data.organization),
        html: page(INTERNAL_CSS, body),
    }
}

// ============================================================================
// Newsletter
// ============================================================================

/// Double opt-in message carrying the confirmation link.
pub fn newsletter_confirmation(confirm_url: &str, site_url: &str) -> RenderedEmail {
    let body = html! {
        div class="container" {
            h1 { "Welcome to Equity by Design!" }
            p { "Thanks for subscribing to our newsletter. We're excited to share insights on design, equity, and social impact with you." }
            p { "Please confirm your email address to complete your subscription:" }
            p style="text-align: center; margin: 30px 0;" {
                a href=(confirm_url) class="button" { "Confirm Subscription" }
            }
            p style="font-size: 14px; color: #666;" {
                "Or copy and paste this link into your browser:" br; (confirm_url)
            }
            p style="font-size: 14px; color: #666;" {
                "If you didn't sign up for this newsletter, you can safely ignore this email."
            }
            (brand_footer(site_url))
        }
    };

    RenderedEmail {
        subject: "Confirm your subscription to Equity by Design".to_string(),
        html: page(BRAND_CSS, body),
    }
}

/// Sent once a subscription is confirmed.
pub fn newsletter_welcome(site_url: &str, preferences_url: &str, unsubscribe_url: &str) -> RenderedEmail {
    let body = html! {
        div class="container" {
            h1 { "You're in!" }
            p { "Welcome to the Equity by Design community! You'll now receive our insights on design for equity, social impact, and creating meaningful change." }
            div class="card" {
                h3 { "What to expect:" }
                ul {
                    li { strong { "Weekly insights" } " on equity-centered design" }
                    li { strong { "Case studies" } " showing real-world impact" }
                    li { strong { "Practical tips" } " for creating inclusive experiences" }
                    li { strong { "Exclusive content" } " and early access to resources" }
                }
            }
            h3 { "While you wait for our next newsletter:" }
            ul {
                li { a href={ (site_url) "/work" } { "Explore our case studies" } }
                li { a href={ (site_url) "/insights" } { "Read our latest articles" } }
                li { a href={ (site_url) "/about" } { "Meet our team" } }
            }
            p { "Have questions or feedback? Just reply to this email. We'd love to hear from you!" }
            p { strong { "The Equity by Design Team" } }
            p style="margin-top: 40px; font-size: 12px; color: #666;" {
                a href=(preferences_url) { "Update preferences" }
                " | "
                a href=(unsubscribe_url) { "Unsubscribe" }
            }
        }
    };

    RenderedEmail {
        subject: "Welcome to the Equity by Design community!".to_string(),
        html: page(BRAND_CSS, body),
    }
}

pub fn newsletter_unsubscribed(site_url: &str) -> RenderedEmail {
    let body = html! {
        div class="container" {
            h2 { "You've been unsubscribed" }
            p { "We're sorry to see you go! You've been removed from our mailing list." }
            p { "If this was a mistake, you can " a href={ (site_url) "/newsletter" } { "resubscribe anytime" } "." }
            p { "Thanks for being part of our community!" }
        }
    };

    RenderedEmail {
        subject: "You've been unsubscribed".to_string(),
        html: page(BRAND_CSS, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::validation::fixtures::contact_payload;
    use crate::forms::validation::{parse, CONTACT_RULES};

    fn contact() -> ContactFormData {
        parse(CONTACT_RULES, &contact_payload()).unwrap()
    }

    #[test]
    fn test_submitted_values_are_escaped() {
        let mut data = contact();
        data.name = "<script>alert(1)</script>".to_string();
        let email = contact_confirmation(&data, "https://equitybydesign.test");
        assert!(!email.html.contains("<script>alert"));
        assert!(email.html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_internal_notification_optional_lines() {
        let mut data = contact();
        let email = internal_notification(&data);
        assert_eq!(email.subject, "New Project Inquiry: Riverside Literacy Project");
        assert!(!email.html.contains("Phone:"));
        assert!(email.html.contains("Budget:"));
        assert!(email.html.contains("SOON"));
        assert!(email.html.contains("#FFA500"));

        data.phone = Some("555-0100".to_string());
        data.budget = None;
        let email = internal_notification(&data);
        assert!(email.html.contains("555-0100"));
        assert!(!email.html.contains("Budget:"));
    }

    #[test]
    fn test_confirmation_link_present() {
        let url = "https://equitybydesign.test/newsletter/confirm?token=abc.def";
        let email = newsletter_confirmation(url, "https://equitybydesign.test");
        assert!(email.html.contains("href=\"https://equitybydesign.test/newsletter/confirm?token=abc.def\""));
    }

    #[test]
    fn test_welcome_and_unsubscribed_links() {
        let email = newsletter_welcome(
            "https://equitybydesign.test",
            "https://equitybydesign.test/newsletter/preferences?token=p",
            "https://equitybydesign.test/newsletter/unsubscribe?token=u",
        );
        assert!(email.html.contains("newsletter/preferences?token=p"));
        assert!(email.html.contains("newsletter/unsubscribe?token=u"));

        let email = newsletter_unsubscribed("https://equitybydesign.test");
        assert!(email.html.contains("https://equitybydesign.test/newsletter"));
    }
}
