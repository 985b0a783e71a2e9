//! コマンドライン定義とサブコマンドのディスパッチ。
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::analysis::AnalysisParams;
use crate::app::{ComponentRegistry, build_router};
use crate::classification::{ClassWeight, LogisticRegressionParams, TfidfConfig};
use crate::pipeline::{self, IngestParams, PreprocessParams, TrainParams};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch paginated Atom feeds into data/raw
    Ingest(IngestArgs),
    /// Turn raw feeds into labelled records
    Preprocess(PreprocessArgs),
    /// Compute vocabulary and label statistics
    Analyze(AnalyzeArgs),
    /// Train the TF-IDF + logistic regression classifier
    Train(TrainArgs),
    /// Summarise the classification report
    Evaluate,
    /// Predict labels for the given texts with the saved model
    Predict(PredictArgs),
    /// Serve health, analytics and metrics endpoints
    Serve,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Search query passed to the feed API
    #[arg(long, env = "INGEST_QUERY", default_value = "cat:cs.AI")]
    pub query: String,

    /// Number of pages to fetch
    #[arg(long, env = "INGEST_BATCHES", default_value = "5")]
    pub batches: usize,

    /// Entries per page
    #[arg(long, env = "INGEST_BATCH_SIZE", default_value = "200")]
    pub batch_size: usize,

    /// Seconds to wait between page requests
    #[arg(long, env = "INGEST_SLEEP_SECS", default_value = "2.0")]
    pub sleep: f64,
}

impl IngestArgs {
    /// # Errors
    /// 待機時間が負または有限でない場合はエラーを返す。
    pub fn into_params(self) -> Result<IngestParams> {
        let sleep = Duration::try_from_secs_f64(self.sleep)
            .with_context(|| format!("invalid --sleep value {}", self.sleep))?;
        Ok(IngestParams {
            query: self.query,
            batches: self.batches,
            batch_size: self.batch_size,
            sleep,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct PreprocessArgs {
    /// Drop labels with fewer records than this
    #[arg(long, env = "PREPROCESS_MIN_LABEL_COUNT", default_value = "2")]
    pub min_label_count: usize,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Number of top terms to report
    #[arg(long, env = "ANALYZE_TOP_TERMS", default_value = "12")]
    pub top_terms: usize,

    /// Samples per label that contribute to term counts
    #[arg(long, env = "ANALYZE_MAX_PER_LABEL", default_value = "2000")]
    pub max_per_label: usize,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Fraction of samples held out for evaluation
    #[arg(long, env = "TRAIN_TEST_SIZE", default_value = "0.2")]
    pub test_size: f64,

    /// Seed for the train/test split
    #[arg(long, env = "TRAIN_SEED", default_value = "42")]
    pub seed: u64,

    /// Vocabulary size limit
    #[arg(long, env = "TRAIN_MAX_FEATURES", default_value = "50000")]
    pub max_features: usize,

    /// Largest word n-gram
    #[arg(long, env = "TRAIN_NGRAM_MAX", default_value = "2")]
    pub ngram_max: usize,

    /// Optimiser iteration limit
    #[arg(long, env = "TRAIN_MAX_ITER", default_value = "200")]
    pub max_iter: usize,

    /// Inverse regularisation strength
    #[arg(long = "c", env = "TRAIN_C", default_value = "1.0")]
    pub c: f64,

    /// Class weighting
    #[arg(long, env = "TRAIN_CLASS_WEIGHT", value_enum, default_value = "none")]
    pub class_weight: ClassWeight,
}

impl TrainArgs {
    /// # Errors
    /// 値が範囲外の場合はエラーを返す。
    pub fn into_params(self) -> Result<TrainParams> {
        ensure!(
            self.test_size > 0.0 && self.test_size < 1.0,
            "--test-size must be between 0 and 1, got {}",
            self.test_size
        );
        ensure!(self.c > 0.0, "--c must be positive, got {}", self.c);
        ensure!(self.ngram_max >= 1, "--ngram-max must be at least 1");
        ensure!(self.max_features >= 1, "--max-features must be at least 1");

        Ok(TrainParams {
            test_size: self.test_size,
            seed: self.seed,
            tfidf: TfidfConfig {
                ngram_min: 1,
                ngram_max: self.ngram_max,
                max_features: Some(self.max_features),
            },
            model: LogisticRegressionParams {
                c: self.c,
                max_iter: self.max_iter,
                tol: LogisticRegressionParams::default().tol,
                class_weight: self.class_weight,
            },
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Text to classify (repeatable)
    #[arg(long = "text", required = true)]
    pub texts: Vec<String>,
}

/// サブコマンドを実行する。
///
/// # Errors
/// 各ステージのエラーをそのまま返す。
pub async fn run(command: Command, registry: ComponentRegistry) -> Result<()> {
    let layout = registry.layout().clone();
    let metrics = registry.telemetry().metrics().clone();

    match command {
        Command::Ingest(args) => {
            let params = args.into_params()?;
            let client = registry.arxiv_client();
            pipeline::ingest::run(client.as_ref(), &layout, &params, &metrics).await?;
        }
        Command::Preprocess(args) => {
            let params = PreprocessParams {
                min_label_count: args.min_label_count,
            };
            let outcome = pipeline::preprocess::run(&layout, &params, &metrics)?;
            println!("Saved {} records; dropped {}.", outcome.saved, outcome.dropped);
        }
        Command::Analyze(args) => {
            let params = AnalysisParams {
                top_terms: args.top_terms,
                max_per_label: args.max_per_label,
            };
            pipeline::analyze::run(&layout, &params, &metrics)?;
        }
        Command::Train(args) => {
            let params = args.into_params()?;
            let outcome = pipeline::train::run(&layout, &params, &metrics)?;
            if !outcome.fit.converged {
                warn!(iterations = outcome.fit.iterations, "training stopped before convergence");
            }
        }
        Command::Evaluate => {
            pipeline::evaluate::run(&layout, &metrics)?;
        }
        Command::Predict(args) => {
            for (text, prediction) in args
                .texts
                .iter()
                .zip(pipeline::predict::run(&layout, &args.texts)?)
            {
                println!("{}\t{:.4}\t{}", prediction.label, prediction.probability, text);
            }
        }
        Command::Serve => serve(registry).await?,
    }
    Ok(())
}

async fn serve(registry: ComponentRegistry) -> Result<()> {
    let bind_addr = registry.config().http_bind();
    let router = build_router(registry);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {bind_addr}"))?;
    info!(%bind_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
