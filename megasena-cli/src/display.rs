use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use textplots::Plot;

use crate::import::ImportResult;
use megasena_db::models::{format_key, Contest};
use megasena_engine::cooccurrence::{MAX_COMBO, MIN_COMBO};
use megasena_engine::odds::BetOdds;
use megasena_engine::{CoOccurrenceReport, FrequencyAggregator, QueryResult, RunMode, SimulationState};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// `1234567.891` -> `"R$ 1.234.567,89"`.
pub fn format_brl(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, cents % 100)
}

fn bar(width_pct: f64) -> String {
    "█".repeat((width_pct / 5.0).round() as usize)
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Concours lus       : {}", result.total_records);
    println!("  Nouveaux           : {}", result.inserted);
    println!("  Mis à jour         : {}", result.updated);
    println!("  Dates associées    : {}", result.dated);
    if result.rejected > 0 {
        println!("  Rejetés            : {}", result.rejected);
    }
}

pub fn display_contests(contests: &[Contest]) {
    if contests.is_empty() {
        println!("Aucun concours à afficher.");
        return;
    }

    let mut table = new_table(vec!["Concours", "Date", "Numéros"]);
    for contest in contests {
        table.add_row(vec![
            contest.id.to_string(),
            contest.date.clone().unwrap_or_else(|| "—".to_string()),
            contest.draw.to_string(),
        ]);
    }
    println!("{table}");
}

pub fn display_latest(contest: &Contest) {
    println!("\n🏆 Concours {} ({})", contest.id, contest.date.as_deref().unwrap_or("date inconnue"));
    println!("   {}\n", contest.draw);

    if contest.prizes.is_empty() {
        println!("Pas de répartition des gains disponible.");
        return;
    }

    let mut table = new_table(vec!["Faixa", "Gagnants", "Gain"]);
    for tier in &contest.prizes {
        let winners = match tier.winners {
            Some(0) => Cell::new("accumulé").fg(Color::Yellow),
            Some(n) => Cell::new(n.to_string()),
            None => Cell::new("—"),
        };
        let prize = tier.prize.map(format_brl).unwrap_or_else(|| "—".to_string());
        table.add_row(vec![Cell::new(&tier.tier), winners, Cell::new(prize)]);
    }
    println!("{table}");
}

pub fn display_frequencies(frequencies: &FrequencyAggregator, top: usize) {
    let draws = frequencies.draws_ingested();
    println!("\n📊 Fréquences sur {} tirages\n", draws);

    let mut table = new_table(vec!["Rang", "Numéro", "Sorties", "%", ""]);
    for (rank, f) in frequencies.top_k(top).iter().enumerate() {
        let pct = if draws == 0 { 0.0 } else { 100.0 * f.count as f64 / draws as f64 };
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(format!("{:02}", f.number)),
            Cell::new(f.count),
            Cell::new(format!("{:.2}", pct)),
            Cell::new(bar(frequencies.relative_width(f.count))).fg(Color::Cyan),
        ]);
    }
    println!("{table}");
}

pub fn display_frequency_chart(frequencies: &FrequencyAggregator) {
    let points: Vec<(f32, f32)> = frequencies
        .table()
        .iter()
        .map(|(n, c)| (n as f32, c as f32))
        .collect();
    let y_max = frequencies.table().max() as f32;
    if y_max <= 0.0 {
        println!("  (Pas de données à afficher)");
        return;
    }
    let shape = textplots::Shape::Bars(&points);
    let mut chart = textplots::Chart::new_with_y_range(120, 40, 0.5, 60.5, 0.0, y_max * 1.05);
    println!("{}", chart.lineplot(&shape));
}

pub fn display_combos(report: &CoOccurrenceReport, show: usize) {
    println!(
        "\n🔗 Combinaisons les plus fréquentes parmi {} ({} tirages)\n",
        format_key(&report.pool),
        report.total_draws
    );
    if report.truncated {
        println!(
            "⚠ Top N trop élevé : limité à {} numéros pour garder un calcul rapide.\n",
            report.pool.len()
        );
    }

    for k in MIN_COMBO..=MAX_COMBO {
        println!("── {} numéros ──", k);
        let combos = report.top(k, show);
        if combos.is_empty() {
            println!("  Aucune combinaison de {} numéros dans l'historique.\n", k);
            continue;
        }
        let mut table = new_table(vec!["#", "Combinaison", "Sorties", "%"]);
        for (i, row) in combos.iter().enumerate() {
            table.add_row(vec![
                (i + 1).to_string(),
                row.key(),
                row.count.to_string(),
                format!("{:.2}", row.percent_of_total),
            ]);
        }
        println!("{table}\n");
    }
}

pub fn display_query(result: &QueryResult) {
    if result.never_occurred() {
        println!("L'ensemble {} n'est jamais sorti ensemble.", result.key);
        return;
    }

    println!("L'ensemble {} est sorti {} fois :", result.key, result.hits.len());
    let mut table = new_table(vec!["Concours", "Date"]);
    for hit in &result.hits {
        table.add_row(vec![hit.contest.to_string(), hit.date_label().to_string()]);
    }
    println!("{table}");
}

pub fn display_simulation(state: &SimulationState, top: usize) {
    let color = match state.run_mode() {
        RunMode::StoppedByLimit => Color::Green,
        RunMode::StoppedByUser => Color::Yellow,
        RunMode::Running | RunMode::Idle => Color::White,
    };
    let mut table = new_table(vec!["État", "Tirages simulés", "Ticks", "Dernier tirage"]);
    table.add_row(vec![
        Cell::new(state.run_mode().to_string()).fg(color),
        Cell::new(state.total_generated()),
        Cell::new(state.ticks()),
        Cell::new(state.last_draw().map(|d| d.to_string()).unwrap_or_else(|| "—".to_string())),
    ]);
    println!("\n🎲 Simulation\n");
    println!("{table}");

    display_frequencies(state.frequencies(), top);
}

pub fn display_odds(table_rows: &[BetOdds]) {
    println!("\n💰 Probabilités de la Sena par nombre de numéros joués\n");

    let mut table = new_table(vec!["Numéros", "Jeux", "Prix", "Probabilité"]);
    for row in table_rows {
        table.add_row(vec![
            row.numbers.to_string(),
            row.games.to_string(),
            format_brl(row.price),
            format!("1 sur {}", row.one_in),
        ]);
    }
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(0.0), "R$ 0,00");
        assert_eq!(format_brl(35.0), "R$ 35,00");
        assert_eq!(format_brl(1234.5), "R$ 1.234,50");
        assert_eq!(format_brl(1_234_567.891), "R$ 1.234.567,89");
        assert_eq!(format_brl(-12.3), "-R$ 12,30");
    }

    #[test]
    fn test_bar() {
        assert_eq!(bar(0.0), "");
        assert_eq!(bar(100.0).chars().count(), 20);
    }
}
