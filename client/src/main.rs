//! ballot-admin - command-line front end for the ballot admin tool.
//!
//! Reads its configuration from the environment (and `.env`), keeps the
//! signed-in session in a local file between runs.

use ballot_client::models::{from_items, Candidate};
use ballot_client::{AdminApp, ClientError, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: ballot-admin <command>

commands:
  login <username> <password>   sign in and remember the session
  logout                        forget the session
  whoami                        show the signed-in user
  dashboard                     show totals and vote shares
  candidates                    list candidates
  vote <candidate-id>           vote as the signed-in user
  faq                           list FAQ entries";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ballot_client=info,ballot_admin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(api = %config.api_url, "configured");

    let app = AdminApp::new(config)?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let outcome = run(&app, &args).await;
    app.flush_audit().await;

    match outcome {
        Err(ClientError::NotSignedIn) | Err(ClientError::SessionExpired) => {
            eprintln!("not signed in, run `ballot-admin login <username> <password>`");
            std::process::exit(1);
        }
        other => other.map_err(Into::into),
    }
}

async fn run(app: &AdminApp, args: &[&str]) -> ballot_client::Result<()> {
    match args {
        ["login", username, password] => {
            match app.sign_in(username, password).await? {
                Some(session) => println!(
                    "signed in as {} ({})",
                    session.current_user.username,
                    session.current_user.roles.label()
                ),
                None => println!("sign-in superseded"),
            }
        }
        ["logout"] => {
            // An expired session still gets cleared.
            let _ = app.restore().await;
            app.sign_out().await?;
            println!("signed out");
        }
        ["whoami"] => {
            let session = app.restore().await?;
            let user = &session.current_user;
            println!("{} <{}>", user.username, user.email.as_deref().unwrap_or("-"));
            println!("role: {}", user.roles.label());
            let permissions = user.roles.permissions();
            if !permissions.is_empty() {
                println!("permissions: {}", permissions.join(", "));
            }
            println!("signed in at {}", session.issued_at.to_rfc3339());
        }
        ["dashboard"] => {
            app.restore().await?;
            let stats = app.dashboard().await?;
            println!("candidates: {}", stats.total_candidates);
            println!("users:      {} ({} voted)", stats.total_users, stats.users_voted);
            println!("votes:      {}", stats.total_votes);
            println!("faq:        {}", stats.total_faqs);
            match &stats.leader {
                Some(leader) => println!("leader:     {} ({}%)", leader.name, leader.percent),
                None => println!("leader:     -"),
            }
            for share in &stats.shares {
                println!("  {:<24} {:>6} {:>6.1}%", share.name, share.votes, share.percent);
            }
        }
        ["candidates"] => {
            app.restore().await?;
            for candidate in app.load_candidates().await? {
                println!(
                    "{:<16} {:<24} {:<16} {:>6}",
                    candidate.id,
                    candidate.name,
                    candidate.party.as_deref().unwrap_or("-"),
                    candidate.vote_count
                );
            }
        }
        ["vote", candidate_id] => {
            app.restore().await?;
            app.vote(candidate_id).await?;
            let items = app.candidates.items();
            let candidates: Vec<Candidate> = from_items(&items)?;
            if let Some(candidate) = candidates.iter().find(|c| c.id == *candidate_id) {
                println!("voted for {} ({} votes)", candidate.name, candidate.vote_count);
            }
        }
        ["faq"] => {
            app.restore().await?;
            for faq in app.load_faqs().await? {
                println!("Q: {}\nA: {}\n", faq.question, faq.answer);
            }
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
    Ok(())
}
