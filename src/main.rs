//! Snake Evo CLI - Train snake policies and replay saved genomes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use snake_evo::{
    compute::{
        Action, GridWorld, NetworkError, PolicyNetwork, Topology, WorldError, argmax,
        evolution::{ArchiveError, EvolutionEngine, EvolutionError, GenomeArchive, load_genome},
        observation,
    },
    schema::{EvolutionConfig, EvolutionConfigError},
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Invalid seed {0:?}: expected an unsigned integer")]
    InvalidSeed(String),
    #[error("Error reading {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Error parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] EvolutionConfigError),
    #[error(transparent)]
    Evolution(#[from] EvolutionError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    World(#[from] WorldError),
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        Some("--example") => {
            print_example_config();
            Ok(())
        }
        Some("train") => train(args.get(2).map(PathBuf::from)),
        Some("replay") if args.len() > 2 => parse_seed(args.get(4).map(String::as_str))
            .and_then(|seed| replay(Path::new(&args[2]), args.get(3).map(PathBuf::from), seed)),
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        log::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {program} train [config.json]");
    eprintln!("  {program} replay <genome.json> [config.json] [seed]");
    eprintln!("  {program} --example");
    eprintln!();
    eprintln!("Train snake policies by neuroevolution, or watch a saved genome play.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json  Training configuration (default: built-in defaults)");
    eprintln!("  genome.json  Genome written by a training run");
    eprintln!("  seed         World seed for the replay (default: random)");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn parse_seed(arg: Option<&str>) -> Result<Option<u64>, CliError> {
    arg.map(|s| s.parse().map_err(|_| CliError::InvalidSeed(s.to_string())))
        .transpose()
}

fn load_config(path: Option<PathBuf>) -> Result<EvolutionConfig, CliError> {
    let config = match path {
        Some(path) => {
            let content =
                fs::read_to_string(&path).map_err(|source| CliError::Read { path, source })?;
            serde_json::from_str(&content)?
        }
        None => EvolutionConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn train(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let mut archive = GenomeArchive::new(&config.archive)?;

    println!("Snake Evo Training");
    println!("==================");
    println!(
        "Board: {}x{} ({:?} observation)",
        config.game.width, config.game.height, config.network.observation
    );
    println!(
        "Population: {}, generations: {}",
        config.population.size, config.population.max_generations
    );
    println!("Output: {}", archive.output_dir().display());
    println!();

    let mut engine = EvolutionEngine::new(config)?;
    println!(
        "Network: {:?} ({} parameters)",
        engine.evaluator().topology().widths(),
        engine.evaluator().topology().parameter_count()
    );

    let cancel = engine.cancel_handle();
    let mut archive_error = None;
    let start = Instant::now();

    let outcome = engine.run_with_callback(|progress| {
        let stats = &progress.stats;
        log::info!(
            "Generation {}/{}: best={:.2}, mean={:.2}, min={:.2}{}",
            stats.generation + 1,
            progress.total_generations,
            stats.best_fitness,
            stats.mean_fitness,
            stats.min_fitness,
            if progress.improved { " (new best)" } else { "" }
        );
        println!(
            "  Gen {:4}: best={:9.2} mean={:9.2} min={:9.2} | overall={:9.2} [{:.1}s]",
            stats.generation,
            stats.best_fitness,
            stats.mean_fitness,
            stats.min_fitness,
            progress.best_fitness,
            start.elapsed().as_secs_f32()
        );

        if let Err(e) = archive.record(progress) {
            archive_error = Some(e);
            cancel.store(true, Ordering::Relaxed);
        }
    });

    if let Some(e) = archive_error {
        return Err(e.into());
    }
    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            if !archive.history().is_empty() {
                log::warn!(
                    "Training failed after {} generations; statistics kept in {}",
                    archive.history().len(),
                    archive.history_path().display()
                );
            }
            return Err(e.into());
        }
    };
    let history_path = archive.save_history(&result.history)?;

    println!();
    println!(
        "Stopped after {} generations ({:?})",
        result.stats.generations, result.stats.stop_reason
    );
    println!("Best fitness: {:.2}", result.stats.best_fitness);
    println!(
        "Evaluations: {} in {:.2}s",
        result.stats.total_evaluations, result.stats.elapsed_seconds
    );
    println!("History: {}", history_path.display());
    Ok(())
}

fn replay(
    genome_path: &Path,
    config_path: Option<PathBuf>,
    seed: Option<u64>,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let topology = Topology::from_config(&config.network)?;
    let genome = load_genome(genome_path, &topology)?;
    let network = PolicyNetwork::from_genome(topology, genome.genes())?;

    let seed = seed.unwrap_or_else(rand::random);
    let mut world = GridWorld::new(&config.game, seed)?;
    let frame_delay = match config.visualization.fps {
        0 => Duration::ZERO,
        fps => Duration::from_secs_f32(1.0 / fps as f32),
    };

    log::info!("Replaying {} with world seed {seed}", genome_path.display());

    while !world.is_terminal() && world.steps() < config.evaluation.max_steps {
        let features = observation::encode(&world, config.network.observation);
        let activations = network.forward_debug(&features)?;
        let action = Action::try_from(argmax(activations.output()))?;

        if config.visualization.live {
            println!("{world}");
            println!(
                "step {} score {} energy {} | out {:?} -> {:?}",
                world.steps(),
                world.score(),
                world.energy(),
                activations.output(),
                action
            );
            println!();
            std::thread::sleep(frame_delay);
        }

        world.step(action)?;
    }

    println!("{world}");
    println!(
        "Score: {}, length: {}, steps: {}, end: {}",
        world.score(),
        world.len(),
        world.steps(),
        world
            .terminal_reason()
            .map_or("step limit", |reason| reason.as_str())
    );
    Ok(())
}

fn print_example_config() {
    let config = EvolutionConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => log::error!("Failed to serialize example config: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed(None).unwrap(), None);
        assert_eq!(parse_seed(Some("42")).unwrap(), Some(42));
        assert!(matches!(
            parse_seed(Some("forty-two")),
            Err(CliError::InvalidSeed(s)) if s == "forty-two"
        ));
        assert!(matches!(parse_seed(Some("-1")), Err(CliError::InvalidSeed(_))));
    }
}
