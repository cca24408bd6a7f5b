use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde_json::{Map, Value};

use megasena_db::db::upsert_contest;
use megasena_db::models::{Contest, Draw, PrizeTier};
use megasena_db::rusqlite::Connection;

const TIERS: [&str; 3] = ["Sena", "Quina", "Quadra"];
const WINNER_HINTS: [&str; 3] = ["qt", "qtd", "ganhador"];
const PRIZE_HINTS: [&str; 3] = ["vl", "valor", "rateio"];

/// Parses a Brazilian amount such as `"R$ 1.234.567,89"`.
pub fn parse_money_br(raw: &str) -> Option<f64> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if kept.is_empty() {
        return None;
    }
    let normalized = kept.replace('.', "").replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn money_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_money_br(s),
        _ => None,
    }
}

fn integer_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn normalize_tier(raw: &str) -> String {
    let upper = raw.to_uppercase();
    for tier in TIERS {
        if upper.contains(&tier.to_uppercase()) {
            return tier.to_string();
        }
    }
    if raw.trim().is_empty() {
        "Faixa".to_string()
    } else {
        raw.to_string()
    }
}

fn first_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn tier_label(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => normalize_tier(s),
        Some(Value::Number(n)) => normalize_tier(&n.to_string()),
        _ => normalize_tier(""),
    }
}

/// Prize breakdown from a contest object: the `premiacoes` array first, then loose keys
/// like `qtdGanhadoresSena` / `valorRateioQuina`. Tiers seen twice are merged.
pub fn extract_prizes(obj: &Map<String, Value>) -> Vec<PrizeTier> {
    let mut found = Vec::new();

    if let Some(Value::Array(entries)) = obj.get("premiacoes") {
        for entry in entries.iter().filter_map(Value::as_object) {
            found.push(PrizeTier {
                tier: tier_label(first_field(entry, &["acertos", "faixa", "descricao"])),
                winners: first_field(entry, &["vencedores", "quantidade", "qtd", "ganhadores"])
                    .and_then(integer_from)
                    .and_then(|n| u32::try_from(n).ok()),
                prize: first_field(entry, &["premio", "valorPremio", "valor", "rateio"])
                    .and_then(money_from),
            });
        }
    }

    for tier in TIERS {
        let word = tier.to_lowercase();
        let matching = |hints: &[&str]| {
            obj.iter().find(|(k, _)| {
                let k = k.to_lowercase();
                k.contains(&word) && hints.iter().any(|h| k.contains(h))
            })
        };
        let winners = matching(&WINNER_HINTS[..])
            .and_then(|(_, v)| integer_from(v))
            .and_then(|n| u32::try_from(n).ok());
        let prize = matching(&PRIZE_HINTS[..]).and_then(|(_, v)| money_from(v));
        if winners.is_some() || prize.is_some() {
            found.push(PrizeTier {
                tier: tier.to_string(),
                winners,
                prize,
            });
        }
    }

    let mut merged: Vec<PrizeTier> = Vec::new();
    for p in found {
        match merged.iter_mut().find(|m| m.tier == p.tier) {
            Some(m) => {
                m.winners = m.winners.or(p.winners);
                m.prize = match (m.prize, p.prize) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }
            None => merged.push(p),
        }
    }
    merged
}

/// `dd/mm/yyyy` becomes ISO `yyyy-mm-dd`; anything else is kept as given.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    match NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct AnalyticInfo {
    pub dates: HashMap<u32, String>,
    pub prizes: HashMap<u32, Vec<PrizeTier>>,
}

pub fn parse_analytic(json: &Value) -> AnalyticInfo {
    let mut info = AnalyticInfo::default();
    let Some(Value::Array(draws)) = json.get("draws") else {
        log::warn!("Fichier analytique sans tableau \"draws\"");
        return info;
    };
    for obj in draws.iter().filter_map(Value::as_object) {
        let Some(id) = obj
            .get("concurso")
            .and_then(integer_from)
            .and_then(|n| u32::try_from(n).ok())
        else {
            continue;
        };
        if let Some(Value::String(date)) = obj.get("data") {
            info.dates.insert(id, normalize_date(date));
        }
        let prizes = extract_prizes(obj);
        if !prizes.is_empty() {
            info.prizes.insert(id, prizes);
        }
    }
    info
}

#[derive(Debug, Default)]
pub struct ParsedHistory {
    pub contests: Vec<Contest>,
    pub total_records: u32,
    pub rejected: u32,
}

/// History file: `{ "<contest>": [n1, …, n6], … }`, numbers as JSON numbers or strings.
pub fn parse_history(json: &Value) -> Result<ParsedHistory> {
    let Some(entries) = json.as_object() else {
        bail!("Historique invalide : objet JSON attendu");
    };
    let mut parsed = ParsedHistory::default();
    for (key, value) in entries {
        parsed.total_records += 1;
        let id = key.trim().parse::<u32>().ok();
        let raw: Option<Vec<i64>> = value
            .as_array()
            .and_then(|arr| arr.iter().map(integer_from).collect::<Option<Vec<_>>>());
        match (id, raw.as_deref().and_then(Draw::from_raw)) {
            (Some(id), Some(draw)) => parsed.contests.push(Contest::new(id, draw)),
            _ => {
                log::warn!("Concours {} rejeté : {}", key, value);
                parsed.rejected += 1;
            }
        }
    }
    parsed.contests.sort_by_key(|c| c.id);
    Ok(parsed)
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("JSON invalide dans {:?}", path))
}

pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub updated: u32,
    pub rejected: u32,
    pub dated: u32,
}

pub fn import_json(conn: &Connection, history: &Path, analytic: Option<&Path>) -> Result<ImportResult> {
    let parsed = parse_history(&read_json(history)?)?;
    let info = match analytic {
        Some(path) => parse_analytic(&read_json(path)?),
        None => AnalyticInfo::default(),
    };

    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult {
        total_records: parsed.total_records,
        inserted: 0,
        updated: 0,
        rejected: parsed.rejected,
        dated: 0,
    };

    for mut contest in parsed.contests {
        if let Some(date) = info.dates.get(&contest.id) {
            contest.date = Some(date.clone());
            result.dated += 1;
        }
        if let Some(prizes) = info.prizes.get(&contest.id) {
            contest.prizes = prizes.clone();
        }
        if upsert_contest(&tx, &contest)? {
            result.inserted += 1;
        } else {
            result.updated += 1;
        }
    }

    tx.commit().context("Échec du commit")?;
    log::info!(
        "Import : {} nouveaux, {} mis à jour, {} rejetés",
        result.inserted,
        result.updated,
        result.rejected
    );
    Ok(result)
}
