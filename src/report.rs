use crate::logic::ranking::RankedBeach;
use crate::models::{
    BeachRef, FactorScore, FishingGuide, Forecast, LunarPhaseResult, ProbabilityResult,
    WeatherSnapshot,
};
use chrono::NaiveDate;
use std::fmt::Write;

/// Text rendering of results for the terminal.
pub fn probability(result: &ProbabilityResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", result.site);
    let _ = writeln!(out, "{}", result.evaluated_at.format("%d/%m/%Y %H:%M"));
    let _ = writeln!(
        out,
        "\n  Probabilidade: {}/10 {} {}",
        result.final_score,
        result.bucket.symbol(),
        result.bucket
    );
    let _ = writeln!(out, "  (soma ponderada {:.2})", result.raw_weighted_sum);

    let b = &result.breakdown;
    out.push('\n');
    factor(&mut out, "Maré", &b.tide);
    factor(&mut out, "Tempo", &b.weather);
    factor(&mut out, "Local", &b.site);
    factor(&mut out, "Restrições", &b.restrictions);

    if !result.penalties().is_empty() {
        let _ = writeln!(out, "\n  Penalidades:");
        for p in result.penalties() {
            let _ = writeln!(out, "    ! {}", p);
        }
    }

    let _ = writeln!(
        out,
        "\n  Marés ({}, confiança {:.0}%):",
        result.tides.source,
        result.tides.min_confidence() * 100.0
    );
    for event in &result.tides.events {
        let marker = match result.next_tide() {
            Some(next) if next.timestamp == event.timestamp => " <",
            _ => "",
        };
        let _ = writeln!(
            out,
            "    {} {:<5} {:.2}m{}",
            event.timestamp.format("%H:%M"),
            event.kind,
            event.height_m,
            marker
        );
    }
    if let Some(note) = &result.tides.note {
        let _ = writeln!(out, "    {}", note);
    }

    out.push('\n');
    out.push_str(&weather(&result.weather));
    let _ = writeln!(out, "  {}", lunar(&result.lunar));

    if let Some(guide) = &result.fishing {
        out.push('\n');
        out.push_str(&fishing(guide));
    }

    out
}

fn fishing(guide: &FishingGuide) -> String {
    let mut out = String::from("  Dicas de pesca:\n");
    for t in &guide.techniques {
        let _ = writeln!(out, "    {}: {}% de eficácia", t.name, t.effectiveness_pct);
    }
    if !guide.baits.is_empty() {
        let _ = writeln!(out, "    Iscas: {}", guide.baits.join(", "));
    }
    if let Some(e) = &guide.equipment {
        let _ = writeln!(out, "    Equipamento: vara {}, linha {}", e.rod, e.line);
    }
    if !guide.best_hours.is_empty() {
        let _ = writeln!(out, "    Melhores horários: {}", guide.best_hours.join(", "));
    }
    out
}

fn factor(out: &mut String, label: &str, score: &FactorScore) {
    let _ = writeln!(out, "  {:<11} {:>4.1}", label, score.score);
    for line in &score.narrative {
        let _ = writeln!(out, "      {}", line);
    }
}

pub fn weather(w: &WeatherSnapshot) -> String {
    let source = if w.is_fallback() {
        "estimado".to_string()
    } else {
        w.source_label.clone()
    };
    format!(
        "  Tempo ({}): {:.0}°C, {:.0} hPa, vento {:.1} m/s {}, umidade {:.0}%, {}\n",
        source,
        w.temperature_c,
        w.pressure_hpa,
        w.wind_speed_ms,
        w.wind_direction,
        w.humidity_pct,
        w.condition_text
    )
}

pub fn lunar(l: &LunarPhaseResult) -> String {
    format!(
        "Lua: {} {} ({:.0}% iluminada, pesca {:.0}/10)",
        l.phase.symbol(),
        l.phase,
        l.illumination * 100.0,
        l.fishing_score
    )
}

pub fn forecast(f: &Forecast) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Previsão: {}\n", f.site);

    for day in &f.days {
        let _ = writeln!(
            out,
            "  {:<7} {} {:<5} {:>6.0} hPa ({})  vento {:>4.1} m/s {} ({})  maré {} {}  {} {}",
            day.label(),
            day.bucket.symbol(),
            day.bucket,
            day.pressure_hpa,
            day.pressure_category,
            day.wind_speed_ms,
            day.wind_direction,
            day.wind_category,
            day.tide_stage.symbol(),
            day.tide_stage,
            day.lunar_phase.symbol(),
            day.lunar_phase
        );
    }

    if let Some(best) = f.best_day() {
        let _ = writeln!(out, "\n  Melhor dia: {} ({})", best.label(), best.bucket);
    }
    let _ = writeln!(out, "  Projeção estimada a partir das condições de hoje.");
    out
}

pub fn ranking(region: &str, ranked: &[RankedBeach]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Melhores praias em {}\n", region);
    for (i, r) in ranked.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {:<20} {:<12} {:>2}/10 {} {}",
            i + 1,
            r.name,
            r.city,
            r.result.final_score,
            r.result.bucket.symbol(),
            r.result.bucket
        );
    }
    if ranked.is_empty() {
        let _ = writeln!(out, "  Nenhuma praia cadastrada.");
    }
    out
}

pub fn search(query: &str, found: &[BeachRef<'_>]) -> String {
    let mut out = String::new();
    if found.is_empty() {
        let _ = writeln!(out, "Nenhuma praia encontrada para \"{}\"", query);
        return out;
    }
    for b in found {
        let verified = if b.beach.verified == Some(true) { " ✓" } else { "" };
        let _ = writeln!(
            out,
            "  {}/{}/{}{}  [{}] {}",
            b.region, b.city, b.name, verified, b.beach.kind, b.beach.coordinates
        );
        if !b.beach.description.is_empty() {
            let _ = writeln!(out, "      {}", b.beach.description);
        }
    }
    out
}

pub fn moon(phases: &[LunarPhaseResult], next_full: (NaiveDate, i64)) -> String {
    let mut out = String::new();
    for p in phases {
        let _ = writeln!(out, "  {}  {}", p.date.format("%d/%m"), lunar(p));
    }
    let (date, days) = next_full;
    let _ = writeln!(
        out,
        "\n  Próxima lua cheia: {} (em {} dias)",
        date.format("%d/%m/%Y"),
        days
    );
    out
}
