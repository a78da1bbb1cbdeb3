use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, ErrorKind, Parser, Subcommand};

use refrain::detect;

#[derive(Debug, Subcommand)]
enum Commands {
    #[clap(
        arg_required_else_help = true,
        after_help = "Displays metadata stored in one or more frame vector artifacts: number of sampled frames, vector dimension, source framerate, sampling stride and covered duration."
    )]
    Inspect {
        #[clap(
            required = true,
            multiple_values = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "Frame vector artifacts, or directories containing them."
        )]
        paths: Vec<PathBuf>,
    },

    #[clap(
        arg_required_else_help = true,
        after_help = "Search for recurring segments (recaps, opening/closing credits, previews) among the episodes of a series. Each episode's frames are matched against every other episode's frames using the frame vector artifacts produced by the feature extraction step; frames that match unusually well are merged into detections anchored at the start or end of the episode."
    )]
    Detect {
        #[clap(
            required = true,
            multiple_values = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "Frame vector artifacts, or directories containing them. At least two episodes are required."
        )]
        paths: Vec<PathBuf>,

        #[clap(
            long,
            default_value_t = detect::DEFAULT_PERCENTILE,
            value_parser = clap::value_parser!(f32),
            help = "Percentile of best-match distances used as the per-episode threshold. A higher percentile improves recall at the cost of precision."
        )]
        percent: f32,

        #[clap(
            long,
            default_value_t = detect::DEFAULT_VIDEO_START_THRESHOLD_PERCENTILE,
            value_parser = clap::value_parser!(f32),
            help = "Percentage of the start of the video in which a match counts as a recap or opening. For example, if set to 20, only matching runs that end in the first 20% of the video are kept as openings."
        )]
        video_start_threshold_percentile: f32,

        #[clap(
            long,
            default_value_t = detect::DEFAULT_VIDEO_END_THRESHOLD_SECS,
            value_parser = clap::value_parser!(f32),
            help = "A match at the end of the video only counts as an ending if it finishes within this many seconds of the end."
        )]
        video_end_threshold_seconds: f32,

        #[clap(
            long,
            default_value_t = detect::DEFAULT_MIN_DETECTION_SIZE_SECS,
            value_parser = clap::value_parser!(f32),
            help = "Minimum detection duration, in seconds. Recurring segments rarely last only a few seconds, so shorter matches are treated as noise."
        )]
        min_detection_size_seconds: f32,

        #[clap(
            long,
            default_value_t = detect::DEFAULT_GAP_TOLERANCE_SECS,
            value_parser = clap::value_parser!(f32),
            help = "Matching runs separated by a non-matching gap of at most this many seconds are merged into one detection."
        )]
        gap_tolerance_seconds: f32,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "Path to a ground truth JSON file mapping each video file name to a list of [start_seconds, end_seconds] intervals. When provided, aggregate precision and recall are reported for the run."
        )]
        ground_truth: Option<PathBuf>,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Ignore detection files on disk. These are JSON files that store the result of a previous run alongside each video. When this flag is not set, a video whose detection file still matches its artifact is skipped."
        )]
        ignore_detection_files: bool,

        #[clap(
            long,
            default_value = "true",
            help = "Write detection files to disk after the search is completed. These are JSON files that store the result of the search alongside each video and enable incremental runs."
        )]
        write_detection_files: bool,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Do not display results of the search in stdout."
        )]
        no_display: bool,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Disable parallel matching across episodes."
        )]
        no_threading: bool,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

impl Cli {
    fn validate(&self) {
        let mut cmd = Cli::command();
        match self.command {
            Commands::Inspect { .. } => (),
            Commands::Detect {
                percent,
                video_start_threshold_percentile,
                video_end_threshold_seconds,
                min_detection_size_seconds,
                gap_tolerance_seconds,
                ..
            } => {
                if !(0.0..=100.0).contains(&percent) {
                    cmd.error(ErrorKind::InvalidValue, "percent must be between 0 and 100")
                        .exit();
                }
                if !(0.0..=100.0).contains(&video_start_threshold_percentile) {
                    cmd.error(
                        ErrorKind::InvalidValue,
                        "video_start_threshold_percentile must be between 0 and 100",
                    )
                    .exit();
                }
                if video_end_threshold_seconds < 0.0 {
                    cmd.error(
                        ErrorKind::InvalidValue,
                        "video_end_threshold_seconds must not be negative",
                    )
                    .exit();
                }
                if min_detection_size_seconds < 0.0 {
                    cmd.error(
                        ErrorKind::InvalidValue,
                        "min_detection_size_seconds must not be negative",
                    )
                    .exit();
                }
                if gap_tolerance_seconds < 0.0 {
                    cmd.error(
                        ErrorKind::InvalidValue,
                        "gap_tolerance_seconds must not be negative",
                    )
                    .exit();
                }
            }
        }
    }

    fn find_vector_artifacts(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        match refrain::util::find_vector_artifacts(paths) {
            Err(e) => {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
            }
            Ok(v) => v,
        }
    }
}

fn main() -> refrain::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let args = Cli::parse();
    args.validate();

    match args.command {
        Commands::Inspect { ref paths } => {
            let artifacts = args.find_vector_artifacts(paths);
            for path in artifacts {
                let vectors = detect::FrameVectors::from_path(&path)?;
                println!("\n{}\n", path.display());
                println!("* Frames: {}", vectors.num_frames());
                println!("* Dimension: {}", vectors.dimension());
                println!("* Framerate: {:.3}", vectors.framerate());
                println!("* Framejump: {}", vectors.framejump());
                println!(
                    "* Samples per second: {:.3}",
                    vectors.samples_per_second()
                );
                println!(
                    "* Duration: {}",
                    refrain::util::format_time(vectors.duration())
                );
            }
        }
        Commands::Detect {
            ref paths,
            percent,
            video_start_threshold_percentile,
            video_end_threshold_seconds,
            min_detection_size_seconds,
            gap_tolerance_seconds,
            ref ground_truth,
            ignore_detection_files,
            write_detection_files,
            no_display,
            no_threading,
        } => {
            let artifacts = args.find_vector_artifacts(paths);
            if artifacts.len() < 2 {
                let mut cmd = Cli::command();
                cmd.error(
                    ErrorKind::InvalidValue,
                    format!(
                        "need at least 2 frame vector artifacts, but only found {} in provided paths",
                        artifacts.len()
                    ),
                )
                .exit();
            }

            let ground_truth = match ground_truth {
                Some(path) => Some(detect::GroundTruth::from_path(path)?),
                None => None,
            };

            let detector = detect::Detector::from_files(artifacts)
                .with_percent(percent)
                .with_video_start_threshold_percentile(video_start_threshold_percentile)
                .with_video_end_threshold_seconds(video_end_threshold_seconds)
                .with_min_detection_size_seconds(min_detection_size_seconds)
                .with_gap_tolerance_seconds(gap_tolerance_seconds);
            let detections = detector.run(
                !no_display,
                !ignore_detection_files,
                write_detection_files,
                !no_threading,
            )?;

            if let Some(ground_truth) = ground_truth {
                let totals = ground_truth.evaluate(&detections);
                println!();
                match totals.precision() {
                    Some(precision) => println!("Total precision = {:.3}", precision),
                    None => println!("Total precision = N/A (nothing detected)"),
                }
                match totals.recall() {
                    Some(recall) => println!("Total recall = {:.3}", recall),
                    None => println!("Total recall = N/A (no ground truth intervals)"),
                }
            }
        }
    }

    Ok(())
}
