mod cleaner;
mod db;
mod report;
mod storage;
mod tts;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use cleaner::CleaningOutcome;

#[derive(Parser)]
#[command(name = "story_pipeline", about = "K-5 story cleanup and audio pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the story store schema
    Init,
    /// Import stories from a JSON file into the store
    Import {
        /// JSON array of story records
        file: PathBuf,
    },
    /// Detect textual defects and print an analysis report
    Analyze {
        /// Max stories to analyze (default: all in K-5 grades)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Also save the report to a file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Repair story text (dry run unless --apply)
    Clean {
        /// Persist repaired text to the store
        #[arg(long)]
        apply: bool,
        /// Max stories to process (default: all in K-5 grades)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Generate and upload audio for stories without it (dry run unless --apply)
    Synth {
        /// Generate audio and upload for real
        #[arg(long)]
        apply: bool,
        /// Voice key (see `voices`)
        #[arg(short, long, default_value = "chirp_female_1")]
        voice: String,
        /// Max stories to synthesize
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
        /// Process every pending story
        #[arg(long)]
        all: bool,
    },
    /// List available synthesis voices
    Voices,
    /// Verify cloud storage setup
    Verify,
    /// Show story store statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            println!("Story store ready.");
            Ok(())
        }
        Commands::Import { file } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let data = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let stories: Vec<db::Story> =
                serde_json::from_str(&data).context("Invalid story JSON")?;
            let inserted = db::insert_stories(&conn, &stories)?;
            println!(
                "Imported {} new stories ({} in file)",
                inserted,
                stories.len()
            );
            Ok(())
        }
        Commands::Analyze { limit, out } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let stories = db::fetch_grade_stories(&conn, limit)?;
            if stories.is_empty() {
                println!("No K-5 stories in the store. Run 'import' first.");
                return Ok(());
            }
            println!("Analyzing {} stories...", stories.len());
            let findings = analyze_stories(&stories);
            let rendered = report::render(&stories, &findings);
            println!("{}", rendered);
            if let Some(path) = out {
                report::save(&path, &rendered)?;
                println!("Analysis saved to {}", path.display());
            }
            Ok(())
        }
        Commands::Clean { apply, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let stories = db::fetch_grade_stories(&conn, limit)?;
            if stories.is_empty() {
                println!("No K-5 stories in the store. Run 'import' first.");
                return Ok(());
            }
            if !apply {
                println!("Running in dry-run mode (no changes will be made; use --apply)\n");
            }
            println!("Cleaning {} stories...", stories.len());
            let counts = clean_stories(&conn, &stories, apply)?;
            counts.print(stories.len(), apply);
            Ok(())
        }
        Commands::Synth {
            apply,
            voice,
            limit,
            all,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let limit = if all { None } else { Some(limit) };
            synth_stories(&conn, &voice, limit, apply).await
        }
        Commands::Voices => {
            let client = tts::TtsClient::new()?;
            let voices = client.list_voices().await?;
            print_voices(&voices);
            Ok(())
        }
        Commands::Verify => {
            let client = storage::StorageClient::new()?;
            client.verify_setup().await
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Total stories:  {}", s.total);
            println!("In K-5 grades:  {}", s.in_grades);
            println!("With audio:     {}", s.with_audio);
            println!("Pending audio:  {}", s.in_grades - s.with_audio);
            if !s.by_grade.is_empty() {
                println!("\nBy grade:");
                for (grade, count) in &s.by_grade {
                    println!("  {:<8} : {:>4}", grade, count);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

// ── Analyze ──

fn analyze_stories(stories: &[db::Story]) -> Vec<report::StoryFindings> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(stories.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut findings = Vec::new();
    for chunk in stories.chunks(500) {
        let tag_sets: Vec<_> = chunk
            .par_iter()
            .map(|s| cleaner::detect(&s.title, &s.text))
            .collect();

        for (story, tags) in chunk.iter().zip(tag_sets) {
            if !tags.is_empty() {
                findings.push(report::StoryFindings {
                    story_id: story.story_id.clone(),
                    title: story.title.clone(),
                    grade_level: story.grade_level.clone(),
                    tags,
                });
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    findings
}

// ── Clean ──

struct CleanCounts {
    cleaned: usize,
    unchanged: usize,
    rejected: usize,
}

impl CleanCounts {
    fn print(&self, total: usize, applied: bool) {
        println!("\n{}", "=".repeat(70));
        println!("CLEANUP SUMMARY");
        println!("{}", "=".repeat(70));
        println!("Total stories processed: {}", total);
        println!("Stories cleaned:         {}", self.cleaned);
        println!("Stories unchanged:       {}", self.unchanged);
        println!("Stories invalid:         {}", self.rejected);
        if applied {
            println!("\nChanges saved to the store");
        } else {
            println!("\nDry run: no changes were made (use --apply)");
        }
    }
}

fn clean_stories(
    conn: &rusqlite::Connection,
    stories: &[db::Story],
    apply: bool,
) -> anyhow::Result<CleanCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(stories.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = CleanCounts {
        cleaned: 0,
        unchanged: 0,
        rejected: 0,
    };
    let mut cleaned_log: Vec<(String, usize, usize)> = Vec::new();
    let mut rejected_log: Vec<(String, &'static str)> = Vec::new();

    for chunk in stories.chunks(500) {
        let outcomes: Vec<_> = chunk
            .par_iter()
            .map(|s| cleaner::clean_story(&s.title, &s.text))
            .collect();

        let mut updates = Vec::new();
        for (story, outcome) in chunk.iter().zip(outcomes) {
            match outcome {
                CleaningOutcome::Cleaned(text) => {
                    counts.cleaned += 1;
                    cleaned_log.push((
                        story.title.clone(),
                        story.text.chars().count(),
                        text.chars().count(),
                    ));
                    if apply {
                        updates.push((story.story_id.clone(), text));
                    }
                }
                CleaningOutcome::Unchanged => counts.unchanged += 1,
                CleaningOutcome::Rejected(reason) => {
                    counts.rejected += 1;
                    rejected_log.push((story.title.clone(), reason));
                }
            }
        }

        if apply && !updates.is_empty() {
            db::update_texts(conn, &updates)?;
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    for (title, before, after) in cleaned_log.iter().take(20) {
        println!(
            "Cleaned: {} ({} -> {} chars, {} removed)",
            report::truncate(title, 50),
            before,
            after,
            before - after
        );
    }
    if cleaned_log.len() > 20 {
        println!("... and {} more", cleaned_log.len() - 20);
    }
    for (title, reason) in &rejected_log {
        println!(
            "Invalid after cleaning: {}\n  Reason: {}",
            report::truncate(title, 50),
            reason
        );
    }

    Ok(counts)
}

// ── Synth ──

async fn synth_stories(
    conn: &rusqlite::Connection,
    voice_key: &str,
    limit: Option<usize>,
    apply: bool,
) -> anyhow::Result<()> {
    let voice = tts::voice_by_key(voice_key).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown voice '{}'. Available: {}",
            voice_key,
            tts::voice_keys().join(", ")
        )
    })?;
    println!("Using voice: {} ({})", voice.name, voice.description);

    let stories = db::fetch_without_audio(conn, limit)?;
    println!("Found {} stories without audio", stories.len());
    if stories.is_empty() {
        return Ok(());
    }

    let total_chars: usize = stories.iter().map(|s| s.text.chars().count()).sum();
    if !apply {
        println!("\nDry run: no audio will be generated (use --apply)");
        println!("Total characters: {}", total_chars);
        println!(
            "Estimated cost:   ${:.2}",
            report::tier_cost(total_chars, report::PREMIUM_RATE_PER_MILLION)
        );
        return Ok(());
    }

    let tts_client = tts::TtsClient::new()?;
    let store = storage::StorageClient::new()?;
    let total = stories.len();

    let mut generated = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;

    for (i, story) in stories.iter().enumerate() {
        println!(
            "\n[{}/{}] {}",
            i + 1,
            total,
            report::truncate(&story.title, 50)
        );
        println!("  Characters: {}", story.text.chars().count());

        // Only validated text goes to the synthesis sink
        if let Err(reason) = cleaner::validate(&story.text) {
            warn!("Skipping {}: {}", story.story_id, reason);
            skipped += 1;
            continue;
        }

        match synth_one(&tts_client, &store, conn, story, voice).await {
            Ok(url) => {
                println!("  Uploaded: {}", url);
                generated += 1;
            }
            Err(e) => {
                warn!("Synthesis failed for {}: {:#}", story.story_id, e);
                failed += 1;
            }
        }

        // Pace requests against the synthesis API
        if i + 1 < total {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    println!(
        "\nGenerated {} audio files ({} failed, {} skipped).",
        generated, failed, skipped
    );
    Ok(())
}

async fn synth_one(
    tts_client: &tts::TtsClient,
    store: &storage::StorageClient,
    conn: &rusqlite::Connection,
    story: &db::Story,
    voice: &tts::Voice,
) -> anyhow::Result<String> {
    let audio = tts_client.synthesize(&story.text, voice).await?;
    let path = tts::save_audio(&story.story_id, &audio)?;
    println!(
        "  Audio generated: {:.2} MB ({})",
        audio.len() as f64 / 1024.0 / 1024.0,
        path.display()
    );
    let url = store.upload_audio(&story.story_id, audio).await?;
    db::update_audio_url(conn, &story.story_id, &url)?;
    Ok(url)
}

// ── Voices ──

fn print_voices(voices: &[tts::VoiceInfo]) {
    let en_us: Vec<_> = voices
        .iter()
        .filter(|v| v.language_codes.iter().any(|c| c == "en-US"))
        .collect();

    let group = |marker: &str| -> Vec<&&tts::VoiceInfo> {
        en_us.iter().filter(|v| v.name.contains(marker)).collect()
    };

    println!("Chirp voices (Journey, recommended):");
    for v in group("Journey").iter().take(10) {
        println!("  {:<30} - {}", v.name, v.ssml_gender);
    }
    println!("\nStudio voices (high quality):");
    for v in group("Studio").iter().take(5) {
        println!("  {:<30} - {}", v.name, v.ssml_gender);
    }
    println!("\nNeural2 voices (older):");
    for v in group("Neural2").iter().take(3) {
        println!("  {:<30} - {}", v.name, v.ssml_gender);
    }

    println!("\nCurated keys for `synth --voice`:");
    for v in tts::VOICES {
        println!("  {:<16} {:<18} {:<6} {}", v.key, v.name, v.gender, v.description);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
