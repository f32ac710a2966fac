//! Phonoscore CLI: pronunciation assessment, phonemization and alignment.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use phonoscore_core::assess::align::{try_align, AlignmentOp, CostModel};
use phonoscore_core::audio::io::load_audio;
use phonoscore_core::feedback::{FeedbackGenerator, SummaryFeedback};
use phonoscore_core::language::g2p::PronunciationDictionary;
use phonoscore_core::language::recognize::{Recognizer, ScriptedRecognizer};
use phonoscore_core::types::{Locale, Phoneme, PhonemeSequence, PracticeSession};
use phonoscore_core::{AssessError, AssessmentConfig, AssessmentRequest, Assessor};

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "phonoscore",
    about = "Phoneme-level pronunciation assessment",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a spoken recording against its reference text
    Assess(AssessArgs),
    /// Show the phonemes of a text
    Phonemize(PhonemizeArgs),
    /// Align two phoneme strings and print the edit script
    Align(AlignArgs),
}

// ─── Assess ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct AssessArgs {
    /// Reference text the learner read aloud
    #[arg(long)]
    text: String,

    /// Recording (WAV, MP3, AAC, MP4)
    #[arg(long)]
    audio: PathBuf,

    /// Use this transcript instead of running speech recognition
    #[arg(long)]
    transcript: Option<String>,

    /// Recognized phonemes ("k ˈæ t" or "K AE1 T"), used instead of
    /// phonemizing the transcript
    #[arg(long)]
    hints: Option<String>,

    /// Recognizer confidence for --transcript / --hints
    #[arg(long, default_value_t = 1.0)]
    confidence: f64,

    /// Whisper model size
    #[cfg(feature = "whisper-native")]
    #[arg(long, default_value = "base", value_parser = ["tiny", "base", "small", "medium"])]
    whisper_model: String,

    /// CMU-format pronunciation dictionary
    #[arg(long)]
    dict: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Practice history JSON (word -> error count)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Add this attempt's errors to the history file
    #[arg(long, default_value_t = false, requires = "history")]
    update_history: bool,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Locale (en, en-US, en-GB)
    #[arg(long)]
    locale: Option<String>,

    /// Ignore stress differences
    #[arg(long, default_value_t = false)]
    lenient_stress: bool,

    /// Maximum number of drill words
    #[arg(long)]
    max_drills: Option<usize>,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Phonemize ───────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct PhonemizeArgs {
    /// Text to phonemize
    #[arg(long)]
    text: String,

    /// CMU-format pronunciation dictionary
    #[arg(long)]
    dict: Option<PathBuf>,

    /// Locale (en, en-US, en-GB)
    #[arg(long, default_value = "en-US")]
    locale: String,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Align ───────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct AlignArgs {
    /// Reference phonemes, e.g. "K AE1 T"
    #[arg(long)]
    reference: String,

    /// Recognized phonemes, e.g. "K EH1 T"
    #[arg(long)]
    recognized: String,

    /// Ignore stress differences
    #[arg(long, default_value_t = false)]
    lenient_stress: bool,

    /// Print the alignment as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    // Init logging
    let log_level = match &cli.command {
        Command::Assess(a) if a.verbose => "debug",
        Command::Phonemize(a) if a.verbose => "debug",
        Command::Align(a) if a.verbose => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Assess(args) => run_assess(args),
        Command::Phonemize(args) => run_phonemize(args),
        Command::Align(args) => run_align(args),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        let code = exit_code(&e);
        if code == 2 {
            log::info!("Try recording again with more speech and less background noise");
        }
        std::process::exit(code);
    }
}

/// 2 when the recording itself was unusable, 1 for every other failure.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AssessError>() {
        Some(e) if e.is_audio_error() => 2,
        _ => 1,
    }
}

fn load_dictionary(path: Option<&Path>) -> Result<Option<PronunciationDictionary>> {
    path.map(PronunciationDictionary::load).transpose()
}

fn build_recognizer(args: &AssessArgs) -> Result<Arc<dyn Recognizer>> {
    if args.transcript.is_some() || args.hints.is_some() {
        let transcript = args.transcript.as_deref().unwrap_or(&args.text);
        let mut recognizer = ScriptedRecognizer::new(transcript).with_confidence(args.confidence);
        if let Some(hints) = &args.hints {
            let phonemes = Phoneme::parse_list(hints);
            recognizer = recognizer.with_hints(PhonemeSequence::unsegmented(transcript, phonemes));
        }
        return Ok(Arc::new(recognizer));
    }

    #[cfg(feature = "whisper-native")]
    {
        let whisper = phonoscore_core::language::transcribe::WhisperRecognizer::load(
            &args.whisper_model,
            None,
        )?;
        Ok(Arc::new(whisper))
    }

    #[cfg(not(feature = "whisper-native"))]
    {
        bail!(
            "No speech recognizer available. Pass --transcript or --hints, \
             or build with: cargo build --features whisper-native"
        );
    }
}

// ─── Assess runner ───────────────────────────────────────────────

fn run_assess(args: AssessArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AssessmentConfig::load(path)?,
        None => AssessmentConfig::default(),
    };
    if let Some(locale) = &args.locale {
        config.locale = Locale::new(locale);
    }
    if args.lenient_stress {
        config.costs.lenient_stress = true;
    }
    if let Some(k) = args.max_drills {
        config.drills.max_drill_words = k;
    }

    let dictionary = load_dictionary(args.dict.as_deref())?;
    let phonemizer = Arc::new(Assessor::build_phonemizer(&config, dictionary));
    let recognizer = build_recognizer(&args)?;
    let assessor = Assessor::new(config, phonemizer, recognizer)?;

    let history = match &args.history {
        Some(path) if path.exists() => Some(PracticeSession::load(path)?),
        _ => None,
    };

    log::info!("Loading audio: {}", args.audio.display());
    let audio = load_audio(&args.audio)?;
    let audio_ref = args.audio.display().to_string();

    let mut request = AssessmentRequest::new(&args.text, audio).with_audio_ref(&audio_ref);
    if let Some(history) = history.clone() {
        request = request.with_history(history);
    }

    let report = assessor.assess(&request, None)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report.to_json_value())?;
        println!("{}", json);
    } else {
        print!("{}", SummaryFeedback.generate_feedback(&report)?);
    }

    if args.update_history {
        if let Some(path) = &args.history {
            let mut session = history.unwrap_or_default();
            session.record(&report);
            session
                .save(path)
                .with_context(|| format!("Failed to update history: {}", path.display()))?;
            log::info!("Updated practice history: {}", path.display());
        }
    }

    Ok(())
}

// ─── Phonemize runner ────────────────────────────────────────────

fn run_phonemize(args: PhonemizeArgs) -> Result<()> {
    let config = AssessmentConfig {
        locale: Locale::new(&args.locale),
        ..AssessmentConfig::default()
    };
    let dictionary = load_dictionary(args.dict.as_deref())?;
    let phonemizer = Assessor::build_phonemizer(&config, dictionary);

    let seq = phonemizer.phonemize(&args.text, &config.locale);
    if seq.words().is_empty() {
        bail!("No words found in text");
    }
    for (i, word) in seq.words().iter().enumerate() {
        let phonemes: Vec<String> = seq.word_phonemes(i).iter().map(|p| p.to_string()).collect();
        let marker = if word.fallback { "  (unknown)" } else { "" };
        println!("{:<16} {}{}", word.text, phonemes.join(" "), marker);
    }
    Ok(())
}

// ─── Align runner ────────────────────────────────────────────────

fn run_align(args: AlignArgs) -> Result<()> {
    let reference = PhonemeSequence::unsegmented("reference", Phoneme::parse_list(&args.reference));
    let recognized = PhonemeSequence::unsegmented("recognized", Phoneme::parse_list(&args.recognized));
    let costs = CostModel {
        lenient_stress: args.lenient_stress,
        ..CostModel::default()
    };

    let result = try_align(
        &reference,
        &recognized,
        &costs,
        AssessmentConfig::default().max_alignment_cells,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let symbol = |seq: &PhonemeSequence, idx: Option<usize>| {
        idx.and_then(|i| seq.phonemes().get(i))
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    for op in &result.ops {
        let label = match op {
            AlignmentOp::Match { .. } => "match".to_string(),
            AlignmentOp::Substitution { kind, .. } => format!("substitution ({:?})", kind),
            AlignmentOp::Insertion { .. } => "insertion".to_string(),
            AlignmentOp::Deletion { .. } => "deletion".to_string(),
        };
        println!(
            "{:>6} {:>6}  {:<28} {:.2}",
            symbol(&reference, op.reference_index()),
            symbol(&recognized, op.recognized_index()),
            label,
            op.cost()
        );
    }
    let counts = result.counts();
    println!(
        "Total cost: {:.2} ({} match, {} substitution, {} insertion, {} deletion)",
        result.total_cost, counts.matches, counts.substitutions, counts.insertions, counts.deletions
    );
    Ok(())
}
