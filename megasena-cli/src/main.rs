mod display;
mod import;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::display::{
    display_combos, display_contests, display_frequencies, display_frequency_chart,
    display_import_summary, display_latest, display_odds, display_query, display_simulation,
};
use megasena_db::db::{count_contests, db_path, fetch_last_contests, load_dataset, migrate, open_db};
use megasena_db::rusqlite::Connection;
use megasena_engine::cooccurrence::DEFAULT_POOL_CAP;
use megasena_engine::odds::{bet_table, DEFAULT_UNIT_PRICE};
use megasena_engine::query::{query_inputs, split_pasted};
use megasena_engine::{CoOccurrenceAnalyzer, DrawGenerator, FrequencyAggregator, RunMode, Scheduler, SimulationConfig};

#[derive(Parser)]
#[command(name = "megasena", about = "Statistiques et simulateur Mega-Sena (6 numéros sur 60)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer l'historique depuis un fichier JSON
    Import {
        /// Historique : { "concours": [n1..n6], ... }
        #[arg(short, long, default_value = "assets/megasena.json")]
        file: PathBuf,

        /// Fichier analytique optionnel (dates et répartition des gains)
        #[arg(short, long)]
        analytic: Option<PathBuf>,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers concours
    List {
        /// Nombre de concours à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Dernier concours et répartition des gains
    Latest,

    /// Fréquence de chaque numéro dans l'historique
    Stats {
        /// Nombre de numéros à classer
        #[arg(short, long, default_value = "60")]
        top: usize,

        /// Afficher le graphique des fréquences
        #[arg(long)]
        chart: bool,
    },

    /// Combinaisons de 2 à 6 numéros sorties ensemble le plus souvent
    Combos {
        /// Nombre de numéros les plus fréquents à combiner
        #[arg(short, long, default_value = "6")]
        top: usize,

        /// Lignes affichées par taille de combinaison
        #[arg(short, long, default_value = "12")]
        show: usize,

        /// Plafond interne du nombre de numéros combinés
        #[arg(long, default_value_t = DEFAULT_POOL_CAP)]
        pool_cap: usize,
    },

    /// Concours où un ensemble de 2 à 6 numéros est sorti
    Query {
        /// Numéros (ou une seule chaîne collée, ex: "04 08 15 16")
        #[arg(required = true, allow_hyphen_values = true)]
        numbers: Vec<String>,
    },

    /// Simulateur continu de tirages aléatoires
    Simulate {
        /// Tirages par tick (1-50000)
        #[arg(short, long)]
        batch: Option<u32>,

        /// Intervalle entre deux ticks en ms (1-10000)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Arrêt automatique après ce nombre total de tirages
        #[arg(short, long)]
        limit: Option<u64>,

        /// Arrêt après cette durée (secondes)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,

        /// Configuration JSON (les options ci-dessus la complètent)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Nombre de numéros à classer à la fin
        #[arg(short, long, default_value = "6")]
        top: usize,
    },

    /// Prix et probabilités selon le nombre de numéros joués
    Odds {
        /// Prix d'un jeu simple (6 numéros)
        #[arg(short, long, default_value_t = DEFAULT_UNIT_PRICE)]
        price: f64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = db_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { file, analytic } => cmd_import(&conn, &file, analytic.as_deref()),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::List { last } => cmd_list(&conn, last),
        Command::Latest => cmd_latest(&conn),
        Command::Stats { top, chart } => cmd_stats(&conn, top, chart),
        Command::Combos { top, show, pool_cap } => cmd_combos(&conn, top, show, pool_cap),
        Command::Query { numbers } => cmd_query(&conn, &numbers),
        Command::Simulate {
            batch,
            interval,
            limit,
            duration,
            seed,
            config,
            top,
        } => cmd_simulate(batch, interval, limit, duration, seed, config.as_deref(), top),
        Command::Odds { price } => {
            display_odds(&bet_table(price));
            Ok(())
        }
    }
}

fn ensure_history(conn: &Connection) -> Result<bool> {
    if count_contests(conn)? == 0 {
        println!("Base vide. Lancez d'abord : megasena import");
        return Ok(false);
    }
    Ok(true)
}

fn cmd_import(conn: &Connection, file: &Path, analytic: Option<&Path>) -> Result<()> {
    let result = import::import_json(conn, file, analytic)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_list(conn: &Connection, last: u32) -> Result<()> {
    if !ensure_history(conn)? {
        return Ok(());
    }
    let contests = fetch_last_contests(conn, last)?;
    display_contests(&contests);
    Ok(())
}

fn cmd_latest(conn: &Connection) -> Result<()> {
    if !ensure_history(conn)? {
        return Ok(());
    }
    if let Some(contest) = fetch_last_contests(conn, 1)?.first() {
        display_latest(contest);
    }
    Ok(())
}

fn cmd_stats(conn: &Connection, top: usize, chart: bool) -> Result<()> {
    if !ensure_history(conn)? {
        return Ok(());
    }
    let dataset = load_dataset(conn)?;
    let frequencies = FrequencyAggregator::from_source(&dataset);
    display_frequencies(&frequencies, top);
    if chart {
        display_frequency_chart(&frequencies);
    }
    Ok(())
}

fn cmd_combos(conn: &Connection, top: usize, show: usize, pool_cap: usize) -> Result<()> {
    if !ensure_history(conn)? {
        return Ok(());
    }
    let dataset = load_dataset(conn)?;
    let report = CoOccurrenceAnalyzer::new()
        .with_pool_cap(pool_cap)
        .analyze_top(&dataset, top);
    display_combos(&report, show);
    Ok(())
}

fn cmd_query(conn: &Connection, numbers: &[String]) -> Result<()> {
    if !ensure_history(conn)? {
        return Ok(());
    }
    let inputs = match numbers {
        [pasted] => split_pasted(pasted),
        many => many.to_vec(),
    };
    let dataset = load_dataset(conn)?;
    let result = query_inputs(&dataset, inputs.as_slice())?;
    display_query(&result);
    Ok(())
}

fn load_config(path: &Path) -> Result<SimulationConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    let config: SimulationConfig = serde_json::from_str(&json)
        .with_context(|| format!("Configuration invalide dans {:?}", path))?;
    Ok(config)
}

/// True once a line is read. End of input or a read error never counts.
fn enter_pressed(reader: &mut impl BufRead) -> bool {
    let mut line = String::new();
    matches!(reader.read_line(&mut line), Ok(n) if n > 0)
}

fn cmd_simulate(
    batch: Option<u32>,
    interval: Option<u64>,
    limit: Option<u64>,
    duration: Option<u64>,
    seed: Option<u64>,
    config_path: Option<&Path>,
    top: usize,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => load_config(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(b) = batch {
        config.batch_size = b;
    }
    if let Some(ms) = interval {
        config.tick_interval_ms = ms;
    }
    if let Some(total) = limit {
        config.limit_enabled = true;
        config.limit_total = total;
    }
    let config = config.clamped();

    let mut scheduler = Scheduler::new(DrawGenerator::with_seed(seed), config);

    let pb = if config.limit_enabled {
        let pb = ProgressBar::new(config.limit_total);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("=> "),
        );
        pb
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {pos} tirages {msg}",
        )?);
        pb
    };
    println!("Entrée pour arrêter la simulation.");

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    thread::spawn(move || {
        if enter_pressed(&mut io::stdin().lock()) {
            let _ = stop_tx.send(());
        }
    });

    let deadline = duration.map(|s| Instant::now() + Duration::from_secs(s));
    scheduler.start();
    loop {
        thread::sleep(Duration::from_millis(100));
        let state = scheduler.snapshot();
        pb.set_position(state.total_generated());
        if let Some(draw) = state.last_draw() {
            pb.set_message(draw.to_string());
        }
        if state.run_mode() != RunMode::Running {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) || stop_rx.try_recv().is_ok() {
            scheduler.stop();
            break;
        }
    }
    pb.finish();

    display_simulation(&scheduler.snapshot(), top);
    Ok(())
}
