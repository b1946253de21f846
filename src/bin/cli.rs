use clap::{Parser, Subcommand, ValueEnum};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use adcraft::draft::{CampaignDraft, DraftField};
use adcraft::export;
use adcraft::rest::{GENERATIONS_LIMIT_HEADER, GENERATIONS_USED_HEADER};

const TOKEN_FILE: &str = ".adcraft_token";

#[derive(Parser)]
#[command(name = "adcraft-cli")]
#[command(about = "CLI for the adcraft campaign generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:11111")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    /// Show this month's generation usage
    Usage,
    /// Generate a campaign draft from a business description
    Generate {
        #[arg(short, long)]
        prompt: String,
        /// Write the draft JSON here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replace one text in a saved draft, e.g. `headlines[0]` or `sitelinks[1].text`
    Edit {
        #[arg(short, long, default_value = "draft.json")]
        draft: PathBuf,
        #[arg(short, long)]
        field: String,
        #[arg(short, long)]
        text: String,
    },
    /// Render a saved draft as text or CSV
    Export {
        #[arg(short, long, default_value = "draft.json")]
        draft: PathBuf,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Text)]
        format: ExportFormat,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Text,
    Csv,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

fn read_token() -> String {
    fs::read_to_string(TOKEN_FILE).unwrap_or_default().trim().to_string()
}

fn read_draft(path: &Path) -> Result<CampaignDraft, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("cannot read draft {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_or_print(out: Option<&Path>, contents: &str) -> Result<(), Box<dyn std::error::Error>> {
    match out {
        Some(path) => {
            fs::write(path, contents)?;
            println!("Written to {}", path.display());
        }
        None => print!("{}", contents),
    }
    Ok(())
}

/// Prints the server's error message, with an upgrade hint when the quota is spent.
async fn report_failure(res: Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    eprintln!("Error ({}): {}", status.as_u16(), message);
    if status == StatusCode::TOO_MANY_REQUESTS {
        eprintln!("Upgrade to the business or agency plan for more generations this month.");
    }
    if status == StatusCode::UNAUTHORIZED {
        eprintln!("Run `adcraft-cli login` first.");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Register { email, password } => {
            let res = client.post(format!("{}/register", cli.url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                println!("Registered on the free plan. Run `adcraft-cli login` next.");
            } else {
                report_failure(res).await?;
            }
        }
        Commands::Login { email, password } => {
            let res = client.post(format!("{}/login", cli.url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: LoginResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.token)?;
                println!("Logged in. Token saved to {}", TOKEN_FILE);
            } else {
                report_failure(res).await?;
            }
        }
        Commands::Logout => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out (token removed).");
        }
        Commands::Usage => {
            let res = client.get(format!("{}/usage", cli.url))
                .bearer_auth(read_token())
                .send()
                .await?;
            if res.status().is_success() {
                let body: serde_json::Value = res.json().await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                report_failure(res).await?;
            }
        }
        Commands::Generate { prompt, out } => {
            let res = client.post(format!("{}/generate", cli.url))
                .bearer_auth(read_token())
                .json(&json!({ "prompt": prompt }))
                .send()
                .await?;
            if !res.status().is_success() {
                return report_failure(res).await;
            }

            let header = |name: &str| {
                res.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let used = header(GENERATIONS_USED_HEADER).unwrap_or_else(|| "?".to_string());
            let usage = match header(GENERATIONS_LIMIT_HEADER) {
                Some(limit) => format!("{} of {} generations used this month", used, limit),
                None => format!("{} generations used this month (unlimited plan)", used),
            };

            let draft: CampaignDraft = res.json().await?;
            let json = serde_json::to_string_pretty(&draft)? + "\n";
            write_or_print(out.as_deref(), &json)?;
            eprintln!("{}", usage);
        }
        Commands::Edit { draft, field, text } => {
            let field: DraftField = field.parse()?;
            let mut campaign = read_draft(&draft)?;
            let before = campaign.text(&field)?.to_string();
            campaign.replace_text(&field, &text)?;
            fs::write(&draft, serde_json::to_string_pretty(&campaign)? + "\n")?;
            println!("{}: {:?} -> {:?}", field, before, campaign.text(&field)?);
        }
        Commands::Export { draft, format, out } => {
            let campaign = read_draft(&draft)?;
            let rendered = match format {
                ExportFormat::Text => export::to_text(&campaign),
                ExportFormat::Csv => export::to_csv(&campaign),
            };
            write_or_print(out.as_deref(), &rendered)?;
        }
    }

    Ok(())
}
