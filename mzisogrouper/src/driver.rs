use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use mzisogroup::{
    FeatureList, IsotopeGrouper, IsotopeGrouperParams, IsotopeGroupingError, MobilityTolerance,
    ProgressRecord, RtTolerance, SearchTolerance,
};

use crate::args::{non_negative_float_f32, ArgMobilityType, ArgMzTolerance, ArgRepresentative};
use crate::records::{FeatureListDocument, FeatureListRecord};

#[derive(Debug, Error)]
pub enum MZIsoGrouperError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read or write feature list JSON: {0}")]
    JSONError(
        #[source]
        #[from]
        serde_json::Error,
    ),
    #[error("Invalid grouping parameters: {0}")]
    GroupingError(
        #[source]
        #[from]
        IsotopeGroupingError,
    ),
    #[error("Invalid configuration: {0}")]
    ConfigurationError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("{0} feature list(s) could not be grouped and were written unchanged")]
    ListsFailed(usize),
}

/// How the processing of one feature list ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListOutcome {
    Grouped(ProgressRecord),
    Cancelled,
    Failed,
}

/// Isotope pattern grouping and charge state assignment of LC-MS feature lists.
///
/// Read a JSON document of feature lists from a file or stream, group the isotopic
/// features of each list, and write the grouped lists out as JSON.
#[derive(Parser, Debug, Clone, PartialEq, Deserialize, Serialize)]
#[command(author, version)]
#[serde(default)]
pub struct MZIsoGrouper {
    /// The path to read the input feature lists from, or if '-' is passed, read from STDIN
    #[arg()]
    pub input_file: String,

    /// The path to write the output feature lists to, or if '-' is passed, write to STDOUT.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzisogrouper.toml` in the working directory.
    /// Environment variables prefixed with `MZISOGROUPER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// Cancel any feature list still being processed after this many seconds and
    /// write it out unchanged
    #[arg(long = "max-seconds", value_parser = non_negative_float_f32)]
    pub max_seconds: Option<f32>,

    /// The highest charge state to consider for each isotopic pattern
    #[arg(
        short = 'z',
        long = "max-charge",
        default_value_t = 2,
        value_parser = clap::value_parser!(i32).range(1..),
    )]
    pub max_charge: i32,

    /// Only search for isotopes at higher m/z than the most intense feature
    #[arg(
        long = "monotonic-shape",
        default_value_t = true,
        action = clap::ArgAction::Set,
    )]
    pub monotonic_shape: bool,

    /// The m/z tolerance denoted (absolute):(ppm), the wider of the two applies
    #[arg(
        short = 'm',
        long = "mz-tolerance",
        default_value_t = ArgMzTolerance::default(),
        value_name = "ABS:PPM",
    )]
    pub mz_tolerance: ArgMzTolerance,

    /// The maximum retention time difference between features of one isotopic pattern
    #[arg(
        short = 'r',
        long = "rt-tolerance",
        default_value_t = 0.1,
        value_parser = non_negative_float_f32
    )]
    pub rt_tolerance: f32,

    /// The maximum ion mobility difference between features of one isotopic pattern
    #[arg(long = "mobility-tolerance", value_parser = non_negative_float_f32)]
    pub mobility_tolerance: Option<f32>,

    /// Use the default mobility tolerance of this instrument type when no explicit
    /// mobility tolerance is given
    #[arg(long = "mobility-type")]
    pub mobility_type: Option<ArgMobilityType>,

    /// Which feature of each isotopic pattern to keep
    #[arg(short = 'p', long = "representative", default_value = "most-intense")]
    pub representative: ArgRepresentative,

    /// Keep grouped features that have MS2 spectra in the output
    #[arg(
        short = 'k',
        long = "keep-ms2-members",
        default_value_t = true,
        action = clap::ArgAction::Set,
    )]
    pub keep_ms2_members: bool,

    /// The suffix appended to the name of every processed feature list
    #[arg(short = 's', long = "suffix", default_value = "deiso")]
    pub suffix: String,
}

impl Default for MZIsoGrouper {
    fn default() -> Self {
        Self {
            input_file: "-".to_string(),
            output_file: PathBuf::from("-"),
            log_file: None,
            config_file: None,
            threads: -1,
            max_seconds: None,
            max_charge: 2,
            monotonic_shape: true,
            mz_tolerance: ArgMzTolerance::default(),
            rt_tolerance: 0.1,
            mobility_tolerance: None,
            mobility_type: None,
            representative: ArgRepresentative::MostIntense,
            keep_ms2_members: true,
            suffix: "deiso".to_string(),
        }
    }
}

/// Sets a cancellation flag once a deadline passes, unless stopped first
struct Watchdog {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl Watchdog {
    fn spawn(timeout: Duration, cancel: Arc<AtomicBool>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = thread::spawn(move || {
            let deadline = Instant::now() + timeout;
            while !stop_flag.load(Ordering::Acquire) {
                let now = Instant::now();
                if now >= deadline {
                    warn!("Processing exceeded {timeout:0.2?}, cancelling remaining work");
                    cancel.store(true, Ordering::Release);
                    break;
                }
                thread::sleep((deadline - now).min(Duration::from_millis(25)));
            }
        });
        Self { stop, handle }
    }

    fn stop(self) {
        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.handle.join() {
            warn!("Failed to join watchdog thread: {e:?}");
        }
    }
}

impl MZIsoGrouper {
    fn create_threadpool(&self) -> io::Result<rayon::ThreadPool> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    /// Assemble the grouping parameters from the command line options
    pub fn make_params(&self) -> Result<IsotopeGrouperParams, IsotopeGroupingError> {
        let mobility = match (self.mobility_tolerance, self.mobility_type) {
            (Some(tol), _) => Some(MobilityTolerance(tol)),
            (None, Some(mobility_type)) => {
                Some(MobilityTolerance::for_instrument(mobility_type.into()))
            }
            (None, None) => None,
        };
        let mut params = IsotopeGrouperParams::new(
            self.max_charge,
            self.monotonic_shape,
            SearchTolerance::new(
                self.mz_tolerance.into(),
                RtTolerance(self.rt_tolerance),
                mobility,
            ),
            self.representative.into(),
            self.keep_ms2_members,
        );
        params.suffix.clone_from(&self.suffix);
        params.validate()?;
        Ok(params)
    }

    fn read_input(&self) -> Result<FeatureListDocument, MZIsoGrouperError> {
        let document = if self.input_file == "-" {
            serde_json::from_reader(io::stdin().lock())?
        } else {
            let fh = BufReader::new(fs::File::open(&self.input_file)?);
            serde_json::from_reader(fh)?
        };
        Ok(document)
    }

    fn write_output(&self, document: &FeatureListDocument) -> Result<(), MZIsoGrouperError> {
        if self.output_file == PathBuf::from("-") {
            let mut handle = io::stdout().lock();
            serde_json::to_writer_pretty(&mut handle, document)?;
            writeln!(handle)?;
            handle.flush()?;
        } else {
            let mut handle = BufWriter::new(fs::File::create(&self.output_file)?);
            serde_json::to_writer_pretty(&mut handle, document)?;
            handle.flush()?;
        }
        Ok(())
    }

    fn process_list(
        &self,
        record: FeatureListRecord,
        params: &IsotopeGrouperParams,
        cancel: &AtomicBool,
    ) -> (FeatureListRecord, ListOutcome) {
        let feature_list = FeatureList::from(record);
        let started = Instant::now();
        let mut grouper = IsotopeGrouper::new(params.clone()).with_cancellation(cancel);
        match grouper.run(&feature_list) {
            Ok(Some(result)) => {
                debug!(
                    "Grouped {} into {} features in {:0.3?}",
                    feature_list.name,
                    result.feature_list.len(),
                    started.elapsed()
                );
                (
                    FeatureListRecord::from(&result.feature_list),
                    ListOutcome::Grouped(result.progress),
                )
            }
            Ok(None) => {
                warn!(
                    "Grouping {} was cancelled, writing it unchanged",
                    feature_list.name
                );
                (
                    FeatureListRecord::from(&feature_list),
                    ListOutcome::Cancelled,
                )
            }
            Err(e) => {
                error!("Failed to group {}: {e}", feature_list.name);
                (FeatureListRecord::from(&feature_list), ListOutcome::Failed)
            }
        }
    }

    fn report(&self, outcomes: &[ListOutcome]) -> ProgressRecord {
        let prog: ProgressRecord = outcomes
            .iter()
            .filter_map(|o| match o {
                ListOutcome::Grouped(prog) => Some(*prog),
                _ => None,
            })
            .sum();
        let n_cancelled = outcomes
            .iter()
            .filter(|o| matches!(o, ListOutcome::Cancelled))
            .count();
        let n_failed = outcomes
            .iter()
            .filter(|o| matches!(o, ListOutcome::Failed))
            .count();
        info!(
            "Feature Lists: {} | Cancelled: {n_cancelled} | Failed: {n_failed}",
            outcomes.len()
        );
        info!("Features In: {}", prog.features_total);
        info!("Isotopic Groups: {}", prog.groups_found);
        info!(
            "Features Absorbed: {} | MS2 Members Retained: {}",
            prog.features_absorbed, prog.ms2_members_retained
        );
        info!("Features Out: {}", prog.features_out());
        prog
    }

    pub fn main(&self) -> Result<(), MZIsoGrouperError> {
        info!(
            "mzisogrouper v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input_file);
        info!("Output: {}", self.output_file.display());
        match toml::to_string_pretty(self) {
            Ok(text) => debug!("Configuration:\n{text}"),
            Err(e) => debug!("Could not render configuration: {e}"),
        }

        let params = self.make_params()?;
        let mut document = self.read_input()?;
        debug!("Read {} feature lists", document.feature_lists.len());

        let cancel = Arc::new(AtomicBool::new(false));
        let watchdog = self
            .max_seconds
            .map(|secs| Watchdog::spawn(Duration::from_secs_f32(secs), cancel.clone()));

        let started = Instant::now();
        let pool = self.create_threadpool()?;
        let records = std::mem::take(&mut document.feature_lists);
        let (records, outcomes): (Vec<_>, Vec<_>) = pool.install(|| {
            records
                .into_par_iter()
                .map(|record| self.process_list(record, &params, &cancel))
                .unzip()
        });
        if let Some(watchdog) = watchdog {
            watchdog.stop();
        }
        info!("Elapsed Time: {:0.3?}", started.elapsed());

        document.feature_lists = records;
        self.write_output(&document)?;

        self.report(&outcomes);
        let n_failed = outcomes
            .iter()
            .filter(|o| matches!(o, ListOutcome::Failed))
            .count();
        if n_failed > 0 {
            return Err(MZIsoGrouperError::ListsFailed(n_failed));
        }
        Ok(())
    }
}
