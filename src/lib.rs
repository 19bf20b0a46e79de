//! lib.rs — командная строка lead-sheet
//! Parses the eight lead fields, resolves the configuration once and appends
//! the lead to the configured workbook.


use clap::Parser;
use lead_core::{AppendOutcome, CONFIG_FILENAME, Config, LeadAppender, LeadError, LeadRecord, SHEET_NAME};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::PathBuf;

/// Save sales lead information to a local Excel file.
#[derive(Parser, Debug)]
#[command(name = "lead-sheet", version, about)]
pub struct Cli {
    /// Configuration file naming the target workbook.
    #[arg(long, value_name = "PATH", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    /// Print a JSON object with `success` and `data` or `message`.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub lead: LeadArgs,
}

#[derive(clap::Args, Debug)]
pub struct LeadArgs {
    /// Name of the visitor.
    #[arg(long = "visitor_name", visible_alias = "visitor-name")]
    pub visitor_name: String,
    /// Job title of the visitor.
    #[arg(long)]
    pub title: String,
    /// Company name.
    #[arg(long)]
    pub company: String,
    /// Solutions or products the visitor is interested in.
    #[arg(long = "interests_of_solutions", visible_alias = "interests-of-solutions")]
    pub interests_of_solutions: String,
    /// Whether the visitor is interested in a pilot (e.g., yes/no).
    #[arg(long = "interested_in_pilot", visible_alias = "interested-in-pilot")]
    pub interested_in_pilot: String,
    /// Email address.
    #[arg(long)]
    pub email: String,
    /// Phone number.
    #[arg(long = "phone_number", visible_alias = "phone-number")]
    pub phone_number: String,
    /// Agreed next steps or follow-up actions.
    #[arg(long = "next_steps", visible_alias = "next-steps")]
    pub next_steps: String,
}

impl From<LeadArgs> for LeadRecord {
    fn from(a: LeadArgs) -> Self {
        LeadRecord {
            visitor_name: a.visitor_name,
            title: a.title,
            company: a.company,
            interests_of_solutions: a.interests_of_solutions,
            interested_in_pilot: a.interested_in_pilot,
            email: a.email,
            phone_number: a.phone_number,
            next_steps: a.next_steps,
        }
    }
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Saved {
    pub path: PathBuf,
    pub sheet: &'static str,
    #[serde(flatten)]
    pub outcome: AppendOutcome,
}

/// Resolves the configuration and appends the lead.
pub fn run(cli: Cli) -> Result<Saved, LeadError> {
    tracing::debug!(config = %cli.config.display(), "resolving configuration");
    let config = Config::load(&cli.config)?;
    let appender = LeadAppender::new(&config);
    let outcome = appender.append(&cli.lead.into())?;
    Ok(Saved {
        path: appender.target().to_path_buf(),
        sheet: SHEET_NAME,
        outcome,
    })
}

/// Text for stdout (or stderr on failure) and whether the run succeeded.
pub fn render(result: &Result<Saved, LeadError>, as_json: bool) -> (String, bool) {
    match (result, as_json) {
        (Ok(saved), true) => (envelope_ok(saved).to_string(), true),
        (Err(err), true) => (envelope_err(err).to_string(), false),
        (Ok(saved), false) => (
            format!(
                "Lead saved to '{}' in sheet '{}' (row {}).",
                saved.path.display(),
                saved.sheet,
                saved.outcome.row
            ),
            true,
        ),
        (Err(err), false) => (format!("error [{}]: {err}", err.kind()), false),
    }
}

fn envelope_ok(saved: &Saved) -> Value {
    json!({ "success": true, "data": saved })
}

fn envelope_err(err: &LeadError) -> Value {
    json!({
        "success": false,
        "message": err.to_string(),
        "error": err.kind(),
    })
}
