//! Genome archive for persisting trained policies and training statistics.
//!
//! Genomes are stored as flat JSON arrays of weights, so a file can be fed
//! back to [`load_genome`] or to any tool that understands JSON.
//!
//! Files are written to a sibling temporary file and renamed into place, so
//! an interrupted run leaves either the previous or the new contents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::compute::network::{NetworkError, Topology};
use crate::schema::{ArchiveConfig, EvolutionHistory, EvolutionProgress, Genome};

/// File name of the best genome seen across all generations.
pub const BEST_OVERALL_FILE: &str = "best_overall.json";

/// File name of the per-generation statistics.
pub const HISTORY_FILE: &str = "history.json";

/// Archive errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Genome does not fit the network: {0}")]
    Network(#[from] NetworkError),
}

/// Writes genomes and statistics below one output directory.
#[derive(Debug, Clone)]
pub struct GenomeArchive {
    output_dir: PathBuf,
    save_generation_best: bool,
    /// Statistics recorded so far, mirrored to [`HISTORY_FILE`].
    history: EvolutionHistory,
}

impl GenomeArchive {
    /// Create the archive, creating its output directory if needed.
    pub fn new(config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        Self::with_output_dir(&config.output_dir, config.save_generation_best)
    }

    pub fn with_output_dir<P: AsRef<Path>>(
        dir: P,
        save_generation_best: bool,
    ) -> Result<Self, ArchiveError> {
        let output_dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            save_generation_best,
            history: EvolutionHistory::default(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(HISTORY_FILE)
    }

    /// Statistics recorded through [`GenomeArchive::record`].
    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    /// Path of the per-generation genome file, e.g. `best_gen_0007.json`.
    pub fn generation_path(&self, generation: usize) -> PathBuf {
        self.output_dir.join(format!("best_gen_{generation:04}.json"))
    }

    /// Overwrite the best-overall genome file.
    pub fn save_best_overall(&self, genome: &Genome) -> Result<PathBuf, ArchiveError> {
        let path = self.output_dir.join(BEST_OVERALL_FILE);
        write_json(&path, genome)?;
        log::info!("Saved best genome to {}", path.display());
        Ok(path)
    }

    /// Save a generation's best genome. Returns `None` when per-generation
    /// files are disabled.
    pub fn save_generation_best(
        &self,
        generation: usize,
        genome: &Genome,
    ) -> Result<Option<PathBuf>, ArchiveError> {
        if !self.save_generation_best {
            return Ok(None);
        }
        let path = self.generation_path(generation);
        write_json(&path, genome)?;
        Ok(Some(path))
    }

    pub fn save_history(&self, history: &EvolutionHistory) -> Result<PathBuf, ArchiveError> {
        let path = self.history_path();
        write_json(&path, history)?;
        Ok(path)
    }

    /// Persist one progress report: the generation best, the best-overall
    /// file when the report set a new record, and the statistics so far.
    pub fn record(&mut self, progress: &EvolutionProgress) -> Result<(), ArchiveError> {
        if progress.improved {
            self.save_best_overall(&progress.generation_best)?;
        }
        self.save_generation_best(progress.stats.generation, &progress.generation_best)?;

        self.history.push(progress.stats);
        self.save_history(&self.history)?;
        log::debug!(
            "Recorded generation {} ({} in history)",
            progress.stats.generation,
            self.history.len()
        );
        Ok(())
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArchiveError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a genome file and check it against `topology`.
pub fn load_genome<P: AsRef<Path>>(path: P, topology: &Topology) -> Result<Genome, ArchiveError> {
    let content = fs::read_to_string(path)?;
    let genome: Genome = serde_json::from_str(&content)?;
    let expected = topology.parameter_count();
    if genome.len() != expected {
        return Err(NetworkError::GenomeLength {
            expected,
            actual: genome.len(),
        }
        .into());
    }
    Ok(genome)
}

/// Load a statistics history written by [`GenomeArchive::save_history`].
pub fn load_history<P: AsRef<Path>>(path: P) -> Result<EvolutionHistory, ArchiveError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
