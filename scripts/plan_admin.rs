//! Sets a user's subscription plan directly in the store.
//!
//! Stands in for the billing flow, which is the only thing allowed to change a
//! plan. Stop the server first: sled holds an exclusive lock on the directory.
//! Run: cargo run --bin plan_admin -- owner@example.com business

use clap::Parser;

use adcraft::models::Plan;
use adcraft::storage::Storage;

#[derive(Parser)]
#[command(name = "plan_admin", about = "Change a user's plan (billing stand-in)")]
struct Args {
    /// Account email
    email: String,
    /// free, business or agency
    plan: Plan,
    #[arg(long, default_value = "adcraft_data")]
    data_dir: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let storage = Storage::open(&args.data_dir)?;

    let email = args.email.trim().to_lowercase();
    let user = storage
        .get_user(&email)?
        .ok_or_else(|| format!("no account for {}", email))?;

    let previous = storage.get_profile(&user.id)?.plan;
    let profile = storage.set_plan(&user.id, args.plan)?;
    storage.flush().await?;

    println!("{}: {} -> {}", email, previous, profile.plan);
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}
