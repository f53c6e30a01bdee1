//! Mint a newsletter token by hand, e.g. to build an unsubscribe link for a
//! support request. Signs with CONFIRMATION_SECRET from the environment/.env.

use std::env;

use equity_backend::config::DEFAULT_CONFIRMATION_SECRET;
use equity_backend::forms::tokens::{TokenIssuer, TokenPurpose};
use equity_backend::forms::validation::normalize_email;

fn main() {
    dotenvy::dotenv().ok();

    let mut args = env::args().skip(1);
    let email = args.next().unwrap_or_else(|| {
        eprintln!("Usage: cargo run --bin issue-token <EMAIL> [confirm|unsubscribe]");
        std::process::exit(1);
    });
    let purpose = match args.next().as_deref() {
        None | Some("unsubscribe") => TokenPurpose::Unsubscribe,
        Some("confirm") => TokenPurpose::Confirm,
        Some(other) => {
            eprintln!("Unknown purpose '{}', expected confirm or unsubscribe", other);
            std::process::exit(1);
        }
    };

    let secret = env::var("CONFIRMATION_SECRET").unwrap_or_else(|_| {
        eprintln!("warning: CONFIRMATION_SECRET not set, using the development default");
        DEFAULT_CONFIRMATION_SECRET.to_string()
    });
    let site_url = env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let email = normalize_email(&email);

    match TokenIssuer::new(&secret).issue(&email, purpose) {
        Ok(token) => {
            println!("\nEmail   : {}", email);
            println!("Purpose : {:?}", purpose);
            println!("Token   : {}\n", token);
            match purpose {
                TokenPurpose::Confirm => {
                    println!("{}/newsletter/confirm?token={}", site_url.trim_end_matches('/'), token)
                }
                TokenPurpose::Unsubscribe => println!(
                    "{}/newsletter/unsubscribe?email={}&token={}",
                    site_url.trim_end_matches('/'),
                    email.replace('@', "%40"),
                    token
                ),
            }
        }
        Err(e) => {
            eprintln!("Error issuing token: {}", e);
            std::process::exit(1);
        }
    }
}
