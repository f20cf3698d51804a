//! Mediapress CLI - Command-line client for the Mediapress HTTP service
//!
//! The session cookie is kept in the user's data directory so successive invocations see
//! the same jobs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use reqwest::header::{CONTENT_DISPOSITION, COOKIE, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabled::{Table, Tabled};

const DEFAULT_URL: &str = "http://127.0.0.1:8000";
const SESSION_COOKIE: &str = "session_id";
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "mediapress")]
#[command(about = "Mediapress compression service CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Service base URL
    #[arg(long, env = "MEDIAPRESS_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Where the session cookie is stored (default: user data directory)
    #[arg(long, env = "MEDIAPRESS_SESSION_FILE")]
    session_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file for compression
    Upload {
        /// Image or video file
        file: PathBuf,

        /// facebook, instagram, high_quality, balanced, aggressive
        #[arg(short, long, default_value = "balanced")]
        preset: String,

        /// Output format for still images: jpg, png, webp
        #[arg(short = 'f', long, default_value = "jpg")]
        format: String,

        /// Poll until the job finishes
        #[arg(short, long)]
        wait: bool,
    },

    /// Show one job
    Status {
        /// Job ID
        job_id: String,
    },

    /// List this session's jobs
    List,

    /// Delete a job and its files
    Delete {
        /// Job ID
        job_id: String,
    },

    /// Delete every job of this session
    Clear,

    /// Download a compressed file
    Download {
        /// Job ID
        job_id: String,

        /// Target directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Download every completed file as one zip archive
    DownloadAll {
        /// Target directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Save a JPEG preview of the uploaded source
    Thumbnail {
        /// Job ID
        job_id: String,

        /// Target file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show service health
    Health,
}

#[derive(Deserialize)]
struct UploadResult {
    job_id: String,
    message: String,
}

#[derive(Deserialize)]
struct JobList {
    jobs: Vec<JobInfo>,
}

#[derive(Deserialize)]
struct MessageResult {
    message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Deserialize)]
struct Health {
    status: String,
    ffmpeg_available: bool,
    heic_support: bool,
}

#[derive(Debug, Deserialize)]
struct JobInfo {
    id: String,
    original_filename: String,
    preset: String,
    image_format: String,
    status: String,
    progress: u8,
    original_size: u64,
    compressed_size: Option<u64>,
    compression_ratio: Option<f64>,
    error_message: Option<String>,
    created_at: String,
    download_ready: bool,
}

impl JobInfo {
    fn is_finished(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed")
    }
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Preset")]
    preset: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Progress")]
    progress: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Saved")]
    saved: String,
}

impl From<&JobInfo> for JobRow {
    fn from(job: &JobInfo) -> Self {
        let size = match job.compressed_size {
            Some(out) => format!("{} → {}", human_size(job.original_size), human_size(out)),
            None => human_size(job.original_size),
        };
        Self {
            id: job.id.clone(),
            file: job.original_filename.clone(),
            preset: format!("{} ({})", job.preset, job.image_format),
            status: job.status.to_uppercase(),
            progress: format!("{}%", job.progress),
            size,
            saved: job
                .compression_ratio
                .map(|r| format!("{r:.1}%"))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// HTTP client that carries the session cookie across invocations
struct Client {
    http: reqwest::Client,
    base: String,
    session_file: PathBuf,
    session: Option<String>,
}

impl Client {
    fn new(base: &str, session_file: PathBuf) -> Self {
        let session = std::fs::read_to_string(&session_file)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
            session_file,
            session,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base, path));
        match &self.session {
            Some(session) => builder.header(COOKIE, format!("{SESSION_COOKIE}={session}")),
            None => builder,
        }
    }

    /// Send, remember any newly issued session, and turn error statuses into errors
    async fn send(&mut self, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .context("Failed to connect to service")?;

        let issued = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(session_from_set_cookie);
        if let Some(session) = issued {
            self.save_session(session)?;
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.detail)
            .unwrap_or_else(|_| status.to_string());
        anyhow::bail!("{} ({})", detail, status.as_u16())
    }

    fn save_session(&mut self, session: String) -> Result<()> {
        if let Some(parent) = self.session_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.session_file, &session)
            .with_context(|| format!("Failed to save session to {}", self.session_file.display()))?;
        self.session = Some(session);
        Ok(())
    }

    async fn get_job(&mut self, job_id: &str) -> Result<JobInfo> {
        let builder = self.request(Method::GET, &format!("/job/{job_id}"));
        let job = self
            .send(builder)
            .await?
            .json()
            .await
            .context("Failed to parse response")?;
        Ok(job)
    }
}

fn default_session_file() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "mediapress")
        .context("Could not determine a data directory; pass --session-file")?;
    Ok(dirs.data_dir().join("session"))
}

/// `session_id=<token>; HttpOnly; ...` -> `<token>`
fn session_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
}

/// `attachment; filename="x.mp4"` -> `x.mp4`, stripped of path components
fn attachment_filename(header: &str) -> Option<String> {
    let raw = header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');
    let name = Path::new(raw).file_name()?.to_string_lossy().into_owned();
    (!name.is_empty()).then_some(name)
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn print_job(job: &JobInfo) {
    println!("{}", Table::new(vec![JobRow::from(job)]));
    println!("  {} {}", "Created:".bold(), job.created_at);
    if let Some(error) = &job.error_message {
        println!("  {} {}", "Error:".bold(), error.red());
    }
    if job.download_ready {
        println!(
            "  {} mediapress-cli download {}",
            "Ready:".bold(),
            job.id
        );
    }
}

/// Save a download response under `dir`, naming it from Content-Disposition
async fn save_attachment(response: Response, dir: &Path, fallback: &str) -> Result<PathBuf> {
    let name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(attachment_filename)
        .unwrap_or_else(|| fallback.to_string());
    let bytes = response.bytes().await.context("Failed to read download")?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(name);
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let session_file = match cli.session_file {
        Some(path) => path,
        None => default_session_file()?,
    };
    let mut client = Client::new(&cli.url, session_file);

    match cli.command {
        Commands::Upload {
            file,
            preset,
            format,
            wait,
        } => {
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("Path has no file name")?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let form = Form::new()
                .part("file", Part::bytes(bytes).file_name(filename))
                .text("preset", preset)
                .text("image_format", format);
            let builder = client.request(Method::POST, "/upload").multipart(form);
            let result: UploadResult = client
                .send(builder)
                .await?
                .json()
                .await
                .context("Failed to parse response")?;

            println!("{}", format!("✓ {}", result.message).green().bold());
            println!("  {} {}", "Job ID:".bold(), result.job_id);

            if wait {
                let job = loop {
                    let job = client.get_job(&result.job_id).await?;
                    if job.is_finished() {
                        break job;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                };
                println!();
                print_job(&job);
            }
        }

        Commands::Status { job_id } => {
            let job = client.get_job(&job_id).await?;
            print_job(&job);
        }

        Commands::List => {
            let builder = client.request(Method::GET, "/jobs");
            let list: JobList = client
                .send(builder)
                .await?
                .json()
                .await
                .context("Failed to parse response")?;

            if list.jobs.is_empty() {
                println!("{}", "No jobs in this session".yellow());
            } else {
                let rows: Vec<JobRow> = list.jobs.iter().map(JobRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Delete { job_id } => {
            let builder = client.request(Method::DELETE, &format!("/job/{job_id}"));
            client.send(builder).await?;
            println!("{}", format!("✓ Job {} deleted", job_id).green().bold());
        }

        Commands::Clear => {
            let builder = client.request(Method::DELETE, "/jobs");
            let result: MessageResult = client
                .send(builder)
                .await?
                .json()
                .await
                .context("Failed to parse response")?;
            println!("{}", format!("✓ {}", result.message).green().bold());
        }

        Commands::Download { job_id, output } => {
            let builder = client.request(Method::GET, &format!("/download/{job_id}"));
            let response = client.send(builder).await?;
            let path = save_attachment(response, &output, &job_id).await?;
            println!("{} {}", "✓ Saved".green().bold(), path.display());
        }

        Commands::DownloadAll { output } => {
            let builder = client.request(Method::GET, "/download-all");
            let response = client.send(builder).await?;
            let path = save_attachment(response, &output, "compressed.zip").await?;
            println!("{} {}", "✓ Saved".green().bold(), path.display());
        }

        Commands::Thumbnail { job_id, output } => {
            let builder = client.request(Method::GET, &format!("/thumbnail/{job_id}"));
            let bytes = client
                .send(builder)
                .await?
                .bytes()
                .await
                .context("Failed to read thumbnail")?;
            let path = output.unwrap_or_else(|| PathBuf::from(format!("thumb_{job_id}.jpg")));
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "✓ Saved".green().bold(), path.display());
        }

        Commands::Health => {
            println!("{}", "Service Health".cyan().bold());
            println!();

            let builder = client.request(Method::GET, "/health");
            match client.send(builder).await {
                Ok(response) => {
                    let health: Health =
                        response.json().await.context("Failed to parse response")?;
                    let flag = |ok: bool| if ok { "yes".green() } else { "no".red() };
                    println!("  {} {}", "URL:".bold(), cli.url);
                    println!("  {} {}", "Status:".bold(), health.status.to_uppercase().green());
                    println!("  {} {}", "ffmpeg:".bold(), flag(health.ffmpeg_available));
                    println!("  {} {}", "HEIC:".bold(), flag(health.heic_support));
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "OFFLINE".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
