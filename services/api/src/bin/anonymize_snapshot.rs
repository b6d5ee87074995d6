//! services/api/src/bin/anonymize_snapshot.rs
//!
//! Anonymizes a classroom snapshot export so it can be used as a test fixture.
//!
//! Usage: `anonymize_snapshot <input.json> <output.json>`
//!
//! The real teacher is read from `ANONYMIZE_TEACHER_EMAIL` and
//! `ANONYMIZE_TEACHER_NAMES` (comma separated), and the student address
//! domain from `ANONYMIZE_STUDENT_DOMAIN`.

use classroom_cache_core::anonymize::{anonymize_snapshot, AnonymizeOptions};
use tracing::info;

fn options_from_env() -> AnonymizeOptions {
    let mut options = AnonymizeOptions::default();
    if let Ok(email) = std::env::var("ANONYMIZE_TEACHER_EMAIL") {
        options.teacher_email = Some(email);
    }
    if let Ok(names) = std::env::var("ANONYMIZE_TEACHER_NAMES") {
        options.teacher_names = names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect();
    }
    if let Ok(domain) = std::env::var("ANONYMIZE_STUDENT_DOMAIN") {
        options.student_domain = domain;
    }
    options
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let (Some(input), Some(output)) = (args.next(), args.next()) else {
        return Err("usage: anonymize_snapshot <input.json> <output.json>".into());
    };

    info!("Reading {}", input);
    let document: serde_json::Value = serde_json::from_slice(&std::fs::read(&input)?)?;

    let anonymized = anonymize_snapshot(&document, &options_from_env());

    std::fs::write(&output, serde_json::to_vec_pretty(&anonymized)?)?;
    info!("Anonymized snapshot written to {}", output);
    Ok(())
}
