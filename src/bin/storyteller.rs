//! Storyteller CLI - runs the pipeline against a CSV file and prints the story

use anyhow::{bail, Context};
use clap::Parser;
use data_storyteller::ingestion::CleaningOptions;
use data_storyteller::llm::{NarrativeClient, OpenAiTransport};
use data_storyteller::report::column_summary_frame;
use data_storyteller::retry::RetryPolicy;
use data_storyteller::story::StoryConfig;
use data_storyteller::DataStoryteller;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storyteller", about = "Generate a narrative data story from a CSV file")]
struct Args {
    /// CSV file to analyze
    csv_path: PathBuf,

    /// Target audience: executive, marketing, technical or general
    #[arg(long, default_value = "general")]
    audience: String,

    /// Focus areas (repeatable): trend, outlier, correlation, action
    #[arg(long = "focus")]
    focus_areas: Vec<String>,

    /// Story length: short, medium or long
    #[arg(long, default_value = "medium")]
    length: String,

    /// Ask a specific question instead of generating a story
    #[arg(long)]
    question: Option<String>,

    /// Print extracted insights and the column summary, skip the model call
    #[arg(long)]
    insights_only: bool,

    /// Impute missing values before analysis
    #[arg(long)]
    impute_missing: bool,

    /// Clip numeric outliers to the IQR fences before analysis
    #[arg(long)]
    clip_outliers: bool,

    /// Model identifier sent to the endpoint
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Per-attempt request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let bytes = std::fs::read(&args.csv_path)
        .with_context(|| format!("failed to read {}", args.csv_path.display()))?;

    let cleaning = CleaningOptions {
        impute_missing: args.impute_missing,
        clip_outliers: args.clip_outliers,
    };

    if args.insights_only {
        let detector = data_storyteller::SchemaDetector::default();
        let raw = data_storyteller::ingestion::load_raw_table(&bytes)?;
        let table = data_storyteller::ingestion::clean(&detector.detect(&raw)?, &cleaning)?;
        let insights = data_storyteller::InsightExtractor::default().extract(&table)?;

        println!("{}", column_summary_frame(&table)?);
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    let Ok(api_key) = std::env::var("OPENAI_API_KEY") else {
        bail!("OPENAI_API_KEY is not set; export it or add it to a .env file");
    };

    let transport = OpenAiTransport::with_options(
        api_key,
        "https://api.openai.com/v1",
        args.model.as_str(),
        Duration::from_secs(args.timeout_secs),
    )?;
    let client = NarrativeClient::new(Arc::new(transport)).with_retry_policy(RetryPolicy::default());
    let pipeline = DataStoryteller::new(client).with_cleaning(cleaning);

    if let Some(question) = &args.question {
        let answer = pipeline.answer_question(&bytes, question).await?;
        println!("## Answer\n{}\n", answer.answer);
        println!("## Explanation\n{}\n", answer.explanation);
        println!("## Data points");
        for point in &answer.data_points {
            println!("- {point}");
        }
        println!("\n## Limitations\n{}", answer.limitations);
        return Ok(());
    }

    let config = StoryConfig::new(
        args.audience.as_str(),
        args.focus_areas.clone(),
        args.length.as_str(),
    );
    let story = pipeline.generate_story(&bytes, &config).await?;

    println!("## Summary\n{}\n", story.summary);
    println!("## Key findings");
    for finding in &story.key_findings {
        println!("- {finding}");
    }
    println!("\n## Action items");
    for action in &story.action_items {
        println!("- {action}");
    }

    Ok(())
}
